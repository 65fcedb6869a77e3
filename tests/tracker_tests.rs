use chrono::Utc;
use learning_portal::{
    error::AppError,
    models::Progress,
    tracker::{ProgressEvent, ProgressState, validate_position},
};
use uuid::Uuid;

fn row(completed: bool, position: i32) -> Progress {
    Progress {
        user_id: Uuid::new_v4(),
        lesson_id: Uuid::new_v4(),
        completed,
        last_watched_position: position,
        updated_at: Utc::now(),
    }
}

#[test]
fn test_state_from_stored_row() {
    assert_eq!(ProgressState::of(None), ProgressState::NotStarted);
    assert_eq!(
        ProgressState::of(Some(&row(false, 42))),
        ProgressState::InProgress { position: 42 }
    );
    assert_eq!(
        ProgressState::of(Some(&row(true, 7))),
        ProgressState::Completed { position: 7 }
    );
}

#[test]
fn test_watching_moves_to_in_progress() {
    let state = ProgressState::NotStarted.apply(ProgressEvent::Watched { position: 30 });
    assert_eq!(state, ProgressState::InProgress { position: 30 });
    assert!(!state.is_completed());
    assert_eq!(state.position(), 30);
}

#[test]
fn test_complete_without_watching_keeps_position_zero() {
    let state = ProgressState::NotStarted.apply(ProgressEvent::MarkedComplete);
    assert_eq!(state, ProgressState::Completed { position: 0 });
}

#[test]
fn test_completed_is_terminal() {
    let done = ProgressState::InProgress { position: 90 }.apply(ProgressEvent::MarkedComplete);
    assert_eq!(done, ProgressState::Completed { position: 90 });

    let rewatched = done.apply(ProgressEvent::Watched { position: 10 });
    assert!(rewatched.is_completed());
    assert_eq!(rewatched.position(), 10);

    assert_eq!(rewatched.apply(ProgressEvent::MarkedComplete), rewatched);
}

#[test]
fn test_validate_position_bounds() {
    assert_eq!(validate_position(0).ok(), Some(0));
    assert_eq!(validate_position(3600).ok(), Some(3600));
    assert!(matches!(validate_position(-1), Err(AppError::Validation(_))));
    assert!(matches!(
        validate_position(i64::from(i32::MAX) + 1),
        Err(AppError::Validation(_))
    ));
}
