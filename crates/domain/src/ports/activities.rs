use crate::DomainResult;
use crate::activities::{Activity, Visibility};
use crate::entity::EntityReference;

/// Filter set handed to the store by `ActivityService::query` after cursor
/// decoding and limit normalization. `limit` already includes the +1
/// look-ahead row used to detect whether another page exists.
#[derive(Clone, Debug)]
pub struct ActivityRepositoryQuery {
    pub tenant_id: String,
    pub type_key: Option<String>,
    pub actor: Option<EntityReference>,
    pub targets_any: Vec<EntityReference>,
    pub tags_any: Vec<String>,
    pub visibility: Option<Visibility>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    pub cursor_occurred_at_ms: Option<i64>,
    pub cursor_activity_id: Option<String>,
    pub limit: usize,
}

/// Append-only activity store.
///
/// `create` must perform the idempotency-key lookup and the insert as one
/// atomic step and report `Conflict` when the `(tenant, system, key)` triple
/// is already taken; the publication service resolves the conflict by
/// re-reading the stored activity. `list` returns rows in
/// `(occurred_at_ms desc, activity_id desc)` order with the cursor applied.
pub trait ActivityRepository: Send + Sync {
    fn create(
        &self,
        activity: &Activity,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Activity>>;

    fn get(
        &self,
        tenant_id: &str,
        activity_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<Activity>>>;

    fn get_by_idempotency_key(
        &self,
        tenant_id: &str,
        system: &str,
        idempotency_key: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<Activity>>>;

    fn list(
        &self,
        query: &ActivityRepositoryQuery,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<Activity>>>;
}
