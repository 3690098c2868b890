pub mod config;
pub mod deploy;
pub mod doctor;
pub mod infra;
pub mod init;
