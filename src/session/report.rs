//! Session outcomes and reports.

use crate::error::ScanError;
use chrono::{DateTime, Utc};

/// Where a detected code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    /// Confirmed by consensus over decoded frames.
    Camera,
    /// Entered by the user.
    Manual,
}

/// How a session ended. Mirrors the observer callback that fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Detected {
        code: String,
        source: DetectionSource,
    },
    Failed(ScanError),
    Closed,
}

impl SessionOutcome {
    pub fn code(&self) -> Option<&str> {
        match self {
            SessionOutcome::Detected { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOutcome::Detected { .. } => "detected",
            SessionOutcome::Failed(_) => "failed",
            SessionOutcome::Closed => "closed",
        }
    }
}

/// Summary of one finished session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session: u64,
    pub outcome: SessionOutcome,
    /// Constraint tier that produced the stream, if one was acquired.
    pub tier: Option<String>,
    /// Processed frames delivered by the decoder.
    pub frames_processed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn code(&self) -> Option<&str> {
        self.outcome.code()
    }
}

impl std::fmt::Display for SessionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "session {} {} after {} ms ({} frames, tier {})",
            self.session,
            self.outcome.as_str(),
            self.duration().num_milliseconds(),
            self.frames_processed,
            self.tier.as_deref().unwrap_or("none"),
        )
    }
}
