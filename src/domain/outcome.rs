use serde::Serialize;

use crate::error::ErrorKind;

/// Summary of one strategy run, returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyOutcome {
    pub strategy_name: String,
    pub steps_attempted: u32,
    pub steps_succeeded: u32,
    pub aborted: bool,
    /// Stopped by the operator rather than by completion or abort
    pub cancelled: bool,
    #[serde(serialize_with = "serialize_kind")]
    pub first_error: Option<ErrorKind>,
    #[serde(serialize_with = "serialize_kind")]
    pub last_error: Option<ErrorKind>,
}

fn serialize_kind<S: serde::Serializer>(
    kind: &Option<ErrorKind>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match kind {
        Some(k) => serializer.serialize_some(&k.to_string()),
        None => serializer.serialize_none(),
    }
}

impl StrategyOutcome {
    pub fn new(strategy_name: &str) -> Self {
        Self {
            strategy_name: strategy_name.to_string(),
            steps_attempted: 0,
            steps_succeeded: 0,
            aborted: false,
            cancelled: false,
            first_error: None,
            last_error: None,
        }
    }

    pub fn record_success(&mut self) {
        self.steps_attempted += 1;
        self.steps_succeeded += 1;
    }

    pub fn record_failure(&mut self, kind: ErrorKind) {
        self.steps_attempted += 1;
        self.note_error(kind);
    }

    /// Remember an error that did not consume a step (e.g. a price read)
    pub fn note_error(&mut self, kind: ErrorKind) {
        if self.first_error.is_none() {
            self.first_error = Some(kind);
        }
        self.last_error = Some(kind);
    }

    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn steps_failed(&self) -> u32 {
        self.steps_attempted - self.steps_succeeded
    }

    pub fn saw_fatal(&self) -> bool {
        self.first_error == Some(ErrorKind::Fatal) || self.last_error == Some(ErrorKind::Fatal)
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        if self.aborted || self.saw_fatal() {
            1
        } else {
            0
        }
    }
}

impl std::fmt::Display for StrategyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}/{} steps succeeded",
            self.strategy_name, self.steps_succeeded, self.steps_attempted
        )?;
        if self.steps_failed() > 0 {
            write!(f, " ({} failed)", self.steps_failed())?;
        }
        if self.aborted {
            write!(f, ", aborted")?;
        }
        if self.cancelled {
            write!(f, ", cancelled")?;
        }
        if let Some(kind) = self.last_error {
            write!(f, ", last error {kind}")?;
        }
        Ok(())
    }
}
