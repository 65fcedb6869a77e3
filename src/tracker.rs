//! Enrollment and progress tracking.
//!
//! Progress for a (student, lesson) pair is a small state machine. Every
//! progress write goes through `ProgressState::apply`: the repository locks
//! the stored row, applies the event and persists the resulting state.

use crate::{error::AppError, models::Progress};

/// ProgressState
///
/// `Completed` is terminal: no event un-completes a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    NotStarted,
    InProgress { position: i32 },
    Completed { position: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The player reported a new position, in seconds.
    Watched { position: i32 },
    MarkedComplete,
}

impl ProgressState {
    /// Derives the state from a stored row, if any.
    pub fn of(progress: Option<&Progress>) -> Self {
        match progress {
            None => ProgressState::NotStarted,
            Some(p) if p.completed => ProgressState::Completed {
                position: p.last_watched_position,
            },
            Some(p) => ProgressState::InProgress {
                position: p.last_watched_position,
            },
        }
    }

    pub fn apply(self, event: ProgressEvent) -> Self {
        match (self, event) {
            (ProgressState::Completed { .. }, ProgressEvent::Watched { position }) => {
                ProgressState::Completed { position }
            }
            (_, ProgressEvent::Watched { position }) => ProgressState::InProgress { position },
            (ProgressState::NotStarted, ProgressEvent::MarkedComplete) => {
                ProgressState::Completed { position: 0 }
            }
            (
                ProgressState::InProgress { position } | ProgressState::Completed { position },
                ProgressEvent::MarkedComplete,
            ) => ProgressState::Completed { position },
        }
    }

    pub fn is_completed(self) -> bool {
        matches!(self, ProgressState::Completed { .. })
    }

    pub fn position(self) -> i32 {
        match self {
            ProgressState::NotStarted => 0,
            ProgressState::InProgress { position } | ProgressState::Completed { position } => {
                position
            }
        }
    }
}

/// validate_position
///
/// Positions are whole seconds, non-negative and stored as a 32-bit integer.
pub fn validate_position(position: i64) -> Result<i32, AppError> {
    if position < 0 {
        return Err(AppError::validation("position must not be negative"));
    }
    i32::try_from(position).map_err(|_| AppError::validation("position is too large"))
}
