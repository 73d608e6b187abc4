//! Scan session lifecycle states.

/// Lifecycle state of one scan session.
///
/// ```text
/// Idle ──► AcquiringCamera ──► Decoding ──► Confirmed ──► Closed
///                 │                │
///                 └──► Failed ◄────┘ ──────────────────► Closed
/// ```
///
/// Any live state may also move straight to `Closed` on cancel, and a
/// manually entered code moves any live state to `Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    AcquiringCamera,
    Decoding,
    Confirmed,
    Failed,
    Closed,
}

impl SessionState {
    /// True while the session may still produce a result.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::AcquiringCamera | SessionState::Decoding
        )
    }

    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, AcquiringCamera) => true,
            (AcquiringCamera, Decoding) => true,
            (AcquiringCamera | Decoding, Failed) => true,
            (Idle | AcquiringCamera | Decoding, Confirmed) => true,
            (Closed, _) => false,
            (_, Closed) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AcquiringCamera => "acquiring_camera",
            SessionState::Decoding => "decoding",
            SessionState::Confirmed => "confirmed",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn test_happy_path() {
        assert!(Idle.can_transition_to(AcquiringCamera));
        assert!(AcquiringCamera.can_transition_to(Decoding));
        assert!(Decoding.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Closed));
    }

    #[test]
    fn test_cancel_from_any_state() {
        for state in [Idle, AcquiringCamera, Decoding, Confirmed, Failed] {
            assert!(state.can_transition_to(Closed), "{state} -> closed");
        }
        assert!(!Closed.can_transition_to(Closed));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Idle.can_transition_to(Decoding));
        assert!(!Confirmed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Confirmed));
        assert!(!Decoding.can_transition_to(AcquiringCamera));
        assert!(!Idle.can_transition_to(Failed));
    }
}
