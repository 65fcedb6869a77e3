//! Router Module Index
//!
//! Routes are grouped by who may call them. Authentication is enforced by a
//! route layer in `create_router`; role and ownership rules are enforced per
//! handler through the access policy.

/// Anonymous routes: health and login.
pub mod public;

/// Any authenticated user: own account, journeys, lessons, progress, files.
pub mod authenticated;

/// Journey authoring, nested under `/teacher`.
pub mod teacher;

/// User management, nested under `/admin`.
pub mod admin;
