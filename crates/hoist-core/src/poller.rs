//! Bounded retry-until-condition loop.
//!
//! One primitive serves every wait in the crate (rollout completion, load
//! balancer provisioning); callers supply a probe and a success predicate.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::{HoistError, Result};

#[derive(Debug, Clone, Copy)]
pub struct Poller {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 12,
        }
    }
}

impl Poller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Evaluate `probe` immediately, then on a fixed interval, until
    /// `is_success` accepts its output or the attempt budget is spent.
    ///
    /// Parse-class probe errors count as "not ready yet" observations and the
    /// loop keeps going; any other probe error propagates. Returns the
    /// accepted output on success.
    pub fn poll_until<P, S>(&self, waiting_for: &str, mut probe: P, is_success: S) -> Result<String>
    where
        P: FnMut() -> Result<String>,
        S: Fn(&str) -> bool,
    {
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                thread::sleep(self.interval);
            }
            match probe() {
                Ok(output) => {
                    if is_success(&output) {
                        debug!(attempt, waiting_for, "condition met");
                        return Ok(output);
                    }
                    debug!(attempt, waiting_for, "not ready");
                }
                Err(e) if e.is_parse() => {
                    debug!(attempt, waiting_for, error = %e, "unparsable observation, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(HoistError::Timeout {
            what: waiting_for.to_string(),
            attempts: self.max_attempts,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant(max_attempts: u32) -> Poller {
        Poller::new(Duration::ZERO, max_attempts)
    }

    #[test]
    fn defaults_are_five_seconds_twelve_attempts() {
        let p = Poller::default();
        assert_eq!(p.interval, Duration::from_secs(5));
        assert_eq!(p.max_attempts, 12);
    }

    #[test]
    fn always_failing_probe_times_out_after_exactly_max_attempts() {
        let evaluations = Cell::new(0u32);
        let err = instant(3)
            .poll_until(
                "nothing",
                || {
                    evaluations.set(evaluations.get() + 1);
                    Ok("pending".to_string())
                },
                |_| false,
            )
            .unwrap_err();
        assert_eq!(evaluations.get(), 3);
        match err {
            HoistError::Timeout { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn success_on_second_probe_returns_after_exactly_two_evaluations() {
        let evaluations = Cell::new(0u32);
        let output = instant(12)
            .poll_until(
                "readiness",
                || {
                    evaluations.set(evaluations.get() + 1);
                    if evaluations.get() == 2 {
                        Ok("ready".to_string())
                    } else {
                        Ok("pending".to_string())
                    }
                },
                |out| out == "ready",
            )
            .unwrap();
        assert_eq!(evaluations.get(), 2);
        assert_eq!(output, "ready");
    }

    #[test]
    fn first_evaluation_is_immediate() {
        // A poller with a long interval must still succeed instantly when the
        // first probe is already good.
        let start = std::time::Instant::now();
        let output = Poller::new(Duration::from_secs(60), 2)
            .poll_until("instant success", || Ok("done".to_string()), |_| true)
            .unwrap();
        assert_eq!(output, "done");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn parse_errors_are_absorbed_as_not_ready() {
        let evaluations = Cell::new(0u32);
        let output = instant(5)
            .poll_until(
                "parsable output",
                || {
                    evaluations.set(evaluations.get() + 1);
                    if evaluations.get() < 3 {
                        Err(HoistError::Parse("garbage".to_string()))
                    } else {
                        Ok("ready".to_string())
                    }
                },
                |out| out == "ready",
            )
            .unwrap();
        assert_eq!(evaluations.get(), 3);
        assert_eq!(output, "ready");
    }

    #[test]
    fn parse_errors_still_count_toward_the_budget() {
        let err = instant(2)
            .poll_until(
                "anything",
                || Err::<String, _>(HoistError::Parse("garbage".to_string())),
                |_| true,
            )
            .unwrap_err();
        assert!(matches!(err, HoistError::Timeout { attempts: 2, .. }));
    }

    #[test]
    fn non_parse_errors_propagate_immediately() {
        let evaluations = Cell::new(0u32);
        let err = instant(5)
            .poll_until(
                "anything",
                || {
                    evaluations.set(evaluations.get() + 1);
                    Err(HoistError::CommandFailed {
                        command: "kubectl rollout status ds/api".to_string(),
                        exit_code: 127,
                        stderr: "kubectl: not found".to_string(),
                    })
                },
                |_| true,
            )
            .unwrap_err();
        assert_eq!(evaluations.get(), 1);
        assert!(matches!(err, HoistError::CommandFailed { .. }));
    }
}
