use crate::DomainResult;
use crate::entity::EntityReference;
use crate::relationships::{EdgeKind, EdgeScope, RelationshipEdge};

#[derive(Clone, Debug, Default)]
pub struct EdgeRepositoryQuery {
    pub tenant_id: String,
    pub from: Option<EntityReference>,
    pub to: Option<EntityReference>,
    pub kind: Option<EdgeKind>,
    pub scope: Option<EdgeScope>,
    pub is_active: Option<bool>,
}

/// Directed relationship edge store.
///
/// `upsert` matches on the `(tenant, from, to, kind, scope)` uniqueness key
/// inside a single critical section: on a hit it replaces filter/is_active
/// while preserving the stored edge's id and created_at; on a miss it stores
/// the candidate as given. `remove` of an unknown edge is a successful no-op.
pub trait RelationshipRepository: Send + Sync {
    fn upsert(
        &self,
        edge: &RelationshipEdge,
    ) -> crate::ports::BoxFuture<'_, DomainResult<RelationshipEdge>>;

    fn get(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<RelationshipEdge>>>;

    fn remove(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<()>>;

    fn query(
        &self,
        query: &EdgeRepositoryQuery,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<RelationshipEdge>>>;

    /// Every active edge leaving `from` within the tenant; the visibility
    /// evaluator calls this exactly once per decision.
    fn list_active_from(
        &self,
        tenant_id: &str,
        from: &EntityReference,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<RelationshipEdge>>>;
}
