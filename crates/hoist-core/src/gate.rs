//! Confirmation gates in front of mutating actions.
//!
//! A soft gate is a yes/no prompt; a strong gate makes the operator type the
//! action back (`destroy infrastructure`). Both are bypassed by `--force`.

use std::io::{BufRead, BufReader, Stderr, Stdin, Write};

use crate::error::{HoistError, Result};

/// How much friction to put in front of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStyle {
    /// Yes/no prompt. Anything but an affirmative answer rejects.
    Soft,
    /// The operator must type `<action> <scope>` exactly.
    Strong,
}

/// Seam between operations and the interactive surface, so the plan/apply
/// flow can be driven in tests without a terminal.
pub trait Confirm {
    fn confirm(
        &mut self,
        action: &str,
        scope: &str,
        style: ConfirmationStyle,
        forced: bool,
    ) -> Result<()>;
}

/// Prompts on one stream, reads answers from another. Prompts go to stderr by
/// default so `--json` stdout stays machine-clean.
pub struct ConfirmationGate<R, W> {
    input: R,
    output: W,
}

impl ConfirmationGate<BufReader<Stdin>, Stderr> {
    pub fn interactive() -> Self {
        Self {
            input: BufReader::new(std::io::stdin()),
            output: std::io::stderr(),
        }
    }
}

impl<R: BufRead, W: Write> ConfirmationGate<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_answer(&mut self) -> Result<String> {
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Confirm for ConfirmationGate<R, W> {
    fn confirm(
        &mut self,
        action: &str,
        scope: &str,
        style: ConfirmationStyle,
        forced: bool,
    ) -> Result<()> {
        if forced {
            return Ok(());
        }
        match style {
            ConfirmationStyle::Soft => {
                write!(
                    self.output,
                    "You are about to run {action} within '{scope}'. \
                     Double-check the active configuration before continuing. \
                     Are you sure? [y/N] "
                )?;
                self.output.flush()?;
                let answer = self.read_answer()?;
                if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
                    Ok(())
                } else {
                    Err(HoistError::Rejected(format!(
                        "{action} of '{scope}' was not confirmed, not running anything"
                    )))
                }
            }
            ConfirmationStyle::Strong => {
                let phrase = format!("{action} {scope}");
                writeln!(
                    self.output,
                    "You are about to {action} all '{scope}' resources. There is no going back."
                )?;
                write!(self.output, "Type \"{phrase}\" to confirm: ")?;
                self.output.flush()?;
                let answer = self.read_answer()?;
                if answer == phrase {
                    Ok(())
                } else {
                    Err(HoistError::Rejected(
                        "response did not match, not destroying anything".to_string(),
                    ))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn gate(input: &str) -> ConfirmationGate<Cursor<Vec<u8>>, Vec<u8>> {
        ConfirmationGate::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn forced_bypasses_without_reading_input() {
        let mut g = gate("");
        g.confirm("apply", "infrastructure", ConfirmationStyle::Soft, true)
            .unwrap();
        g.confirm("destroy", "infrastructure", ConfirmationStyle::Strong, true)
            .unwrap();
        assert!(g.output.is_empty(), "forced gate must not prompt");
    }

    #[test]
    fn soft_accepts_y_and_yes() {
        for answer in ["y\n", "Y\n", "yes\n", "YES\n"] {
            let mut g = gate(answer);
            g.confirm("apply", "infrastructure", ConfirmationStyle::Soft, false)
                .unwrap();
        }
    }

    #[test]
    fn soft_rejects_everything_else() {
        for answer in ["n\n", "no\n", "\n", "maybe\n", "yess\n"] {
            let mut g = gate(answer);
            let err = g
                .confirm("apply", "infrastructure", ConfirmationStyle::Soft, false)
                .unwrap_err();
            assert!(matches!(err, HoistError::Rejected(_)), "answer {answer:?}");
        }
    }

    #[test]
    fn soft_prompt_names_action_and_scope() {
        let mut g = gate("y\n");
        g.confirm("apply", "platform", ConfirmationStyle::Soft, false)
            .unwrap();
        let prompt = String::from_utf8(g.output.clone()).unwrap();
        assert!(prompt.contains("apply"));
        assert!(prompt.contains("'platform'"));
    }

    #[test]
    fn strong_requires_exact_phrase() {
        let mut g = gate("destroy infrastructure\n");
        g.confirm("destroy", "infrastructure", ConfirmationStyle::Strong, false)
            .unwrap();
    }

    #[test]
    fn strong_rejects_near_misses() {
        for answer in [
            "destroy\n",
            "destroy Infrastructure\n",
            "destroy  infrastructure\n",
            "yes\n",
            "\n",
        ] {
            let mut g = gate(answer);
            let err = g
                .confirm("destroy", "infrastructure", ConfirmationStyle::Strong, false)
                .unwrap_err();
            assert!(matches!(err, HoistError::Rejected(_)), "answer {answer:?}");
        }
    }

    #[test]
    fn strong_prompt_spells_out_the_phrase() {
        let mut g = gate("destroy platform\n");
        g.confirm("destroy", "platform", ConfirmationStyle::Strong, false)
            .unwrap();
        let prompt = String::from_utf8(g.output.clone()).unwrap();
        assert!(prompt.contains("\"destroy platform\""));
    }

    #[test]
    fn answers_are_trimmed_before_matching() {
        // Leading/trailing whitespace is trimmed, interior is not.
        let mut g = gate("  destroy infrastructure  \n");
        g.confirm("destroy", "infrastructure", ConfirmationStyle::Strong, false)
            .unwrap();
    }
}
