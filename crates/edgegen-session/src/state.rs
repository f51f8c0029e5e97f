use std::fmt;

/// Lifecycle of a model session.
///
/// `Uninitialized → Loading → Ready → Destroyed`, with `Loading →
/// Uninitialized` when any load step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    /// Terminal.
    Destroyed,
}

impl SessionState {
    pub fn is_ready(self) -> bool {
        self == SessionState::Ready
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Loading => write!(f, "loading"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Destroyed => write!(f, "destroyed"),
        }
    }
}
