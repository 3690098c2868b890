pub mod aws;
pub mod config;
pub mod error;
pub mod gate;
pub mod io;
pub mod kubernetes;
pub mod paths;
pub mod poller;
pub mod requirements;
pub mod runner;
pub mod terraform;

pub use error::{HoistError, Result};
