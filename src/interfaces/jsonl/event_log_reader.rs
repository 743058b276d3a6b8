use crate::error::{PaymentError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::io::BufRead;

/// One recorded bus message: the queue it arrived on and its raw payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggedEvent {
    pub queue: String,
    pub payload: Value,
}

impl LoggedEvent {
    pub fn body(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.payload)?)
    }
}

/// Reads a JSON-lines event log.
///
/// Blank lines and lines starting with `#` are skipped. A line that is not a
/// valid record yields an error for that line only; reading continues.
pub struct EventLogReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> EventLogReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Returns an iterator that lazily reads and parses records.
    pub fn events(self) -> impl Iterator<Item = Result<LoggedEvent>> {
        self.source
            .lines()
            .enumerate()
            .filter_map(|(index, line)| match line {
                Err(e) => Some(Err(PaymentError::from(e))),
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        return None;
                    }
                    Some(serde_json::from_str(line).map_err(|e| {
                        PaymentError::ValidationError(format!("line {}: {e}", index + 1))
                    }))
                }
            })
    }
}
