use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::AppResult,
    policy::{self, Action, JourneyAccess, Resource},
    repository::Repository,
};

/// ResourceRef
///
/// What a request points at, before anything is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    None,
    Journey(Uuid),
}

/// ResourceLoader
///
/// Builds the snapshot [`policy::authorize`] consults. Lessons and materials
/// are authorized through their parent journey, so a journey reference is
/// the only kind that needs loading.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn load(&self, identity: &AuthUser, target: ResourceRef) -> AppResult<Resource>;
}

#[async_trait]
impl<R> ResourceLoader for R
where
    R: Repository + ?Sized,
{
    async fn load(&self, identity: &AuthUser, target: ResourceRef) -> AppResult<Resource> {
        let journey_id = match target {
            ResourceRef::None => return Ok(Resource::None),
            ResourceRef::Journey(id) => id,
        };

        let Some(journey) = self.get_journey(journey_id).await? else {
            return Ok(Resource::Missing);
        };
        let enrolled = self.is_enrolled(identity.id, journey.id).await?;

        Ok(Resource::Journey(JourneyAccess {
            id: journey.id,
            teacher_id: journey.teacher_id,
            is_published: journey.is_published,
            enrolled,
        }))
    }
}

/// check
///
/// Loads the target and authorizes `action` on it. Handlers call this before
/// touching any state; the returned snapshot saves them a second lookup of
/// ownership or enrollment.
pub async fn check<L>(
    loader: &L,
    identity: &AuthUser,
    action: Action,
    target: ResourceRef,
) -> AppResult<Resource>
where
    L: ResourceLoader + ?Sized,
{
    let resource = loader.load(identity, target).await?;
    let decision = policy::authorize(Some(identity), &action, &resource);
    if !decision.is_allowed() {
        tracing::debug!(user_id = %identity.id, ?action, ?decision, "access denied");
    }
    decision.into_result()?;
    Ok(resource)
}
