//! Multi-line record assembly.
//!
//! Raw log events are appended to a growing buffer until a boundary line
//! flushes the buffer out as one record. The boundary decision is
//! `regex.is_match(line) == negate`; in `before` mode the line joins the
//! buffer ahead of the flush, in `after` mode the flush happens first and the
//! line starts the next record.

use regex::Regex;

use crate::config::{MatchMode, Multiline};
use crate::error::{Error, Result};

/// Compiled multiline settings for one prospector.
#[derive(Debug, Clone)]
pub struct MultilinePolicy {
    regex: Regex,
    negate: bool,
    match_mode: MatchMode,
}

impl MultilinePolicy {
    pub fn compile(settings: &Multiline) -> Result<Self> {
        let regex = Regex::new(&settings.pattern)
            .map_err(|e| Error::Config(format!("invalid multiline pattern: {e}")))?;
        Ok(Self {
            regex,
            negate: settings.negate,
            match_mode: settings.match_mode,
        })
    }

    fn is_boundary(&self, line: &str) -> bool {
        self.regex.is_match(line) == self.negate
    }
}

/// A record flushed out of the assembly buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flush {
    pub message: String,
    /// Timestamp of the raw event that triggered the flush, ms since epoch.
    pub timestamp: i64,
}

/// The line-assembly automaton. One instance per tailed stream.
#[derive(Debug)]
pub struct Assembler {
    buffer: String,
    policy: Option<MultilinePolicy>,
}

impl Assembler {
    /// With no policy every event is flushed through on its own.
    pub fn new(policy: Option<MultilinePolicy>) -> Self {
        Self {
            buffer: String::new(),
            policy,
        }
    }

    /// Feeds one raw event message through the automaton. Returns the
    /// assembled record when this event flushes the buffer.
    pub fn digest(&mut self, message: &str, timestamp: i64) -> Option<Flush> {
        let Some(policy) = &self.policy else {
            self.buffer.push_str(message);
            return self.flush(timestamp);
        };

        let boundary = policy.is_boundary(message);
        let match_mode = policy.match_mode;
        match match_mode {
            MatchMode::After => {
                let flushed = if boundary { self.flush(timestamp) } else { None };
                self.buffer.push_str(message);
                flushed
            }
            MatchMode::Before => {
                self.buffer.push_str(message);
                if boundary {
                    self.flush(timestamp)
                } else {
                    None
                }
            }
        }
    }

    /// Current partial record, persisted alongside the cursor.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Replaces the buffer with contents restored from the registry.
    pub fn restore(&mut self, contents: &str) {
        self.buffer.clear();
        self.buffer.push_str(contents);
    }

    fn flush(&mut self, timestamp: i64) -> Option<Flush> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(Flush {
            message: std::mem::take(&mut self.buffer),
            timestamp,
        })
    }
}
