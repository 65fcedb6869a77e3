//! Access control policy.
//!
//! Every ownership and role rule of the portal lives in [`authorize`]. The
//! function is pure: callers hand it the identity, the action and a snapshot
//! of the resource (see [`crate::access`] for the loader that builds the
//! snapshot from the store), and it answers allow or deny with a reason.

use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, ConflictKind},
    models::Role,
};

/// Action
///
/// What the caller is trying to do. Journey-scoped actions also cover the
/// journey's lessons and materials, whose ownership is derived from the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// List, create or update user accounts.
    ManageUsers,
    /// Delete the account `target`.
    DeleteUser { target: Uuid },
    CreateJourney,
    /// Mutate or inspect-for-authoring a journey, its lessons or materials.
    EditJourney,
    ViewJourney,
    Enroll,
    /// Open a lesson, record progress, mark it complete or fetch its files.
    AttendLesson,
    /// Read or update something owned by `owner` (profile, progress).
    AccessOwn { owner: Uuid },
}

/// JourneyAccess
///
/// The slice of journey state the policy consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JourneyAccess {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub is_published: bool,
    /// Whether the identity being authorized holds an enrollment.
    pub enrolled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// The action targets no stored entity.
    None,
    /// The referenced entity does not exist.
    Missing,
    Journey(JourneyAccess),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    Forbidden,
    NotFound,
    AlreadyEnrolled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }

    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason.into()),
        }
    }
}

impl From<DenyReason> for AppError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => AppError::Unauthenticated,
            DenyReason::Forbidden => AppError::Forbidden,
            DenyReason::NotFound => AppError::NotFound,
            DenyReason::AlreadyEnrolled => AppError::Conflict(ConflictKind::AlreadyEnrolled),
        }
    }
}

const fn deny(reason: DenyReason) -> Decision {
    Decision::Deny(reason)
}

/// authorize
///
/// Decides whether `identity` may perform `action` on `resource`.
///
/// Rules are evaluated in a fixed precedence and the first match decides:
/// missing identity, admin-only user management, authoring (role then
/// ownership), journey visibility, enrollment, lesson attendance, and own
/// data. Anything not matched is forbidden.
pub fn authorize(identity: Option<&AuthUser>, action: &Action, resource: &Resource) -> Decision {
    let Some(user) = identity else {
        return deny(DenyReason::Unauthenticated);
    };
    let is_admin = user.role == Role::Admin;

    match (action, resource) {
        (Action::ManageUsers, _) => admin_only(is_admin),

        // Self-deletion is refused before the role check so admins hit it too.
        (Action::DeleteUser { target }, _) if *target == user.id => deny(DenyReason::Forbidden),
        (Action::DeleteUser { .. }, _) => admin_only(is_admin),

        (Action::CreateJourney, _) => {
            if user.role.can_author() {
                Decision::Allow
            } else {
                deny(DenyReason::Forbidden)
            }
        }

        (Action::EditJourney, _) if !user.role.can_author() => deny(DenyReason::Forbidden),
        (Action::EditJourney, Resource::Missing) => deny(DenyReason::NotFound),
        (Action::EditJourney, Resource::Journey(journey)) => {
            if is_admin || journey.teacher_id == user.id {
                Decision::Allow
            } else {
                deny(DenyReason::Forbidden)
            }
        }

        (Action::ViewJourney, Resource::Missing) => deny(DenyReason::NotFound),
        (Action::ViewJourney, Resource::Journey(journey)) => {
            if journey.is_published || journey.teacher_id == user.id || is_admin {
                Decision::Allow
            } else {
                deny(DenyReason::NotFound)
            }
        }

        (Action::Enroll, Resource::Missing) => deny(DenyReason::NotFound),
        (Action::Enroll, Resource::Journey(journey)) => {
            if !journey.is_published {
                deny(DenyReason::NotFound)
            } else if journey.enrolled {
                deny(DenyReason::AlreadyEnrolled)
            } else {
                Decision::Allow
            }
        }

        (Action::AttendLesson, Resource::Missing) => deny(DenyReason::NotFound),
        (Action::AttendLesson, Resource::Journey(journey)) => {
            if is_admin || journey.teacher_id == user.id || journey.enrolled {
                Decision::Allow
            } else if journey.is_published {
                deny(DenyReason::Forbidden)
            } else {
                deny(DenyReason::NotFound)
            }
        }

        (Action::AccessOwn { owner }, _) => {
            if *owner == user.id {
                Decision::Allow
            } else {
                deny(DenyReason::Forbidden)
            }
        }

        _ => deny(DenyReason::Forbidden),
    }
}

fn admin_only(is_admin: bool) -> Decision {
    if is_admin {
        Decision::Allow
    } else {
        deny(DenyReason::Forbidden)
    }
}
