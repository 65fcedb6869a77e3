//! Lesson ordering.
//!
//! Lessons in a journey carry a 1-based `order_number` that is always exactly
//! `1..=N`. The functions here plan the three mutations that touch ordering
//! (append, adjacent move, delete-and-renumber) over a snapshot of slots; the
//! repository executes the plan inside a transaction holding the journey lock.

use std::{fmt, str::FromStr};

use uuid::Uuid;

use crate::error::AppError;

/// LessonSlot
///
/// The ordering-relevant part of a lesson row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonSlot {
    pub id: Uuid,
    pub order_number: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        raw.parse()
    }
}

impl FromStr for Direction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            _ => Err(AppError::validation("direction must be up or down")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// OrderingError
///
/// Failures of move planning, converted into the service error at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    #[error("lesson is not part of this journey")]
    LessonNotFound,
    #[error("no neighbouring lesson in that direction")]
    Boundary,
}

impl From<OrderingError> for AppError {
    fn from(err: OrderingError) -> Self {
        match err {
            OrderingError::LessonNotFound => AppError::NotFound,
            OrderingError::Boundary => AppError::Boundary,
        }
    }
}

/// Swap
///
/// Two lessons exchanging order numbers. `moving` ends at `neighbour_order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swap {
    pub moving: Uuid,
    pub moving_order: i32,
    pub neighbour: Uuid,
    pub neighbour_order: i32,
}

/// Order number for a lesson appended after `slots`.
pub fn next_order(slots: &[LessonSlot]) -> i32 {
    slots.iter().map(|s| s.order_number).max().unwrap_or(0) + 1
}

/// plan_move
///
/// Finds the neighbour holding the order number adjacent to `lesson_id` in
/// `direction`. Nothing is mutated when this returns an error.
pub fn plan_move(
    slots: &[LessonSlot],
    lesson_id: Uuid,
    direction: Direction,
) -> Result<Swap, OrderingError> {
    let current = slots
        .iter()
        .find(|s| s.id == lesson_id)
        .ok_or(OrderingError::LessonNotFound)?;

    let target = match direction {
        Direction::Up => current.order_number - 1,
        Direction::Down => current.order_number + 1,
    };

    let neighbour = slots
        .iter()
        .find(|s| s.order_number == target)
        .ok_or(OrderingError::Boundary)?;

    Ok(Swap {
        moving: current.id,
        moving_order: current.order_number,
        neighbour: neighbour.id,
        neighbour_order: neighbour.order_number,
    })
}

/// plan_renumber
///
/// New order numbers for the survivors of a delete: ascending by current
/// order, starting at 1. Only slots whose number changes are returned.
pub fn plan_renumber(survivors: &[LessonSlot]) -> Vec<LessonSlot> {
    let mut sorted = survivors.to_vec();
    sorted.sort_by_key(|s| s.order_number);

    sorted
        .into_iter()
        .zip(1..)
        .filter(|(slot, position)| slot.order_number != *position)
        .map(|(slot, position)| LessonSlot {
            id: slot.id,
            order_number: position,
        })
        .collect()
}

/// True when the order numbers are exactly `1..=slots.len()`.
pub fn is_dense(slots: &[LessonSlot]) -> bool {
    let mut orders: Vec<i32> = slots.iter().map(|s| s.order_number).collect();
    orders.sort_unstable();
    orders.into_iter().zip(1..).all(|(order, expected)| order == expected)
}
