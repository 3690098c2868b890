//! Subprocess invocation for the external tools hoist drives.
//!
//! Everything that shells out goes through the [`CommandRunner`] trait so the
//! orchestration layers can be exercised against scripted results. The real
//! implementation is [`SystemRunner`], a thin wrapper over `std::process`.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

use crate::error::{HoistError, Result};

// ---------------------------------------------------------------------------
// CommandResult / ExecOptions
// ---------------------------------------------------------------------------

/// Outcome of a single external command. Produced once per invocation and
/// never mutated.
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Per-invocation options. Environment variables are passed explicitly here,
/// never set on the parent process.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Mirror child output to our own stdout/stderr while capturing it.
    pub stream: bool,
    /// Fail with `CommandFailed` on non-zero exit. Callers that inspect exit
    /// codes themselves (poll probes) turn this off.
    pub auto_fail: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            env: Vec::new(),
            stream: true,
            auto_fail: true,
        }
    }
}

impl ExecOptions {
    /// Stream child output live for operator feedback (the default).
    pub fn streamed() -> Self {
        Self::default()
    }

    /// Capture quietly. Used for output that gets parsed, not read.
    pub fn captured() -> Self {
        Self {
            stream: false,
            ..Self::default()
        }
    }

    /// Capture quietly and return the result regardless of exit code.
    pub fn probe() -> Self {
        Self {
            stream: false,
            auto_fail: false,
            ..Self::default()
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// Seam between orchestration code and real subprocesses.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str], opts: &ExecOptions) -> Result<CommandResult>;
}

/// Runs commands on the host via `std::process::Command`.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], opts: &ExecOptions) -> Result<CommandResult> {
        debug!(program, ?args, cwd = ?opts.cwd, "executing");

        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        if let Some(cwd) = &opts.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &opts.env {
            cmd.env(k, v);
        }

        let result = if opts.stream {
            run_streamed(cmd)?
        } else {
            let output = cmd.output()?;
            CommandResult {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
        };

        if opts.auto_fail && !result.success() {
            return Err(HoistError::CommandFailed {
                command: render(program, args),
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }
}

/// Spawn with both pipes captured, mirroring lines to our own streams as they
/// arrive. Each pipe is drained on its own thread so a chatty child cannot
/// fill one buffer and deadlock on the other.
fn run_streamed(mut cmd: Command) -> Result<CommandResult> {
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = cmd.spawn()?;

    let out_handle = drain(child.stdout.take(), false);
    let err_handle = drain(child.stderr.take(), true);

    let status = child.wait()?;
    let stdout = out_handle.join().unwrap_or_default();
    let stderr = err_handle.join().unwrap_or_default();

    Ok(CommandResult {
        exit_code: status.code().unwrap_or(-1),
        stdout,
        stderr,
    })
}

fn drain(pipe: Option<impl Read + Send + 'static>, to_stderr: bool) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let Some(pipe) = pipe else {
            return String::new();
        };
        let mut collected = String::new();
        for line in BufReader::new(pipe).lines().map_while(|l| l.ok()) {
            if to_stderr {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
            collected.push_str(&line);
            collected.push('\n');
        }
        collected
    })
}

fn render(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

// ---------------------------------------------------------------------------
// Scripted runner for tests
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let result = SystemRunner
            .run("echo", &["hello"], &ExecOptions::captured())
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    fn auto_fail_surfaces_exit_code_and_stderr() {
        let err = SystemRunner
            .run(
                "sh",
                &["-c", "echo boom >&2; exit 3"],
                &ExecOptions::captured(),
            )
            .unwrap_err();
        match err {
            HoistError::CommandFailed {
                command,
                exit_code,
                stderr,
            } => {
                assert!(command.starts_with("sh -c"));
                assert_eq!(exit_code, 3);
                assert!(stderr.contains("boom"));
            }
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[test]
    fn probe_returns_nonzero_result() {
        let result = SystemRunner
            .run("sh", &["-c", "echo partial; exit 1"], &ExecOptions::probe())
            .unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stdout.trim(), "partial");
    }

    #[test]
    fn env_is_explicit_per_invocation() {
        let opts = ExecOptions::captured().with_env(vec![("HOIST_TEST_VAR".into(), "42".into())]);
        let result = SystemRunner
            .run("sh", &["-c", "echo $HOIST_TEST_VAR"], &opts)
            .unwrap();
        assert_eq!(result.stdout.trim(), "42");
        // Nothing leaked into our own environment.
        assert!(std::env::var("HOIST_TEST_VAR").is_err());
    }

    #[test]
    fn cwd_applies_to_child() {
        let dir = tempfile::TempDir::new().unwrap();
        let opts = ExecOptions::captured().with_cwd(dir.path());
        let result = SystemRunner.run("pwd", &[], &opts).unwrap();
        let reported = std::fs::canonicalize(result.stdout.trim()).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(reported, expected);
    }

    #[test]
    fn streamed_mode_still_captures() {
        let result = SystemRunner
            .run(
                "sh",
                &["-c", "echo out; echo err >&2"],
                &ExecOptions::streamed(),
            )
            .unwrap();
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
    }

    #[test]
    fn missing_program_is_io_error() {
        let err = SystemRunner
            .run(
                "hoist-test-no-such-binary",
                &[],
                &ExecOptions::captured(),
            )
            .unwrap_err();
        assert!(matches!(err, HoistError::Io(_)));
    }
}
