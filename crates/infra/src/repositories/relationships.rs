use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use pulse_domain::DomainResult;
use pulse_domain::entity::EntityReference;
use pulse_domain::error::DomainError;
use pulse_domain::ports::relationships::{EdgeRepositoryQuery, RelationshipRepository};
use pulse_domain::relationships::RelationshipEdge;
use tokio::sync::RwLock;

const EDGES_UPSERTED_TOTAL: &str = "pulse_infra_edges_upserted_total";
const EDGES_REMOVED_TOTAL: &str = "pulse_infra_edges_removed_total";

/// Keyed by `(tenant_id, edge_id)`; uniqueness on
/// `(tenant, from, to, kind, scope)` is enforced by scanning inside the
/// upsert's write lock.
#[derive(Default)]
pub struct InMemoryRelationshipRepository {
    edges: Arc<RwLock<HashMap<(String, String), RelationshipEdge>>>,
}

impl InMemoryRelationshipRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RelationshipRepository for InMemoryRelationshipRepository {
    fn upsert(
        &self,
        edge: &RelationshipEdge,
    ) -> pulse_domain::ports::BoxFuture<'_, DomainResult<RelationshipEdge>> {
        let candidate = edge.clone();
        let edges = self.edges.clone();
        Box::pin(async move {
            let mut edges = edges.write().await;
            let existing_key = edges
                .iter()
                .find(|(_, stored)| stored.upsert_key_matches(&candidate))
                .map(|(key, _)| key.clone());
            let stored = match existing_key {
                Some(key) => {
                    let stored = edges.get_mut(&key).ok_or(DomainError::NotFound)?;
                    stored.filter = candidate.filter;
                    stored.is_active = candidate.is_active;
                    stored.clone()
                }
                None => {
                    let key = (candidate.tenant_id.clone(), candidate.edge_id.clone());
                    if edges.contains_key(&key) {
                        return Err(DomainError::Conflict);
                    }
                    edges.insert(key, candidate.clone());
                    candidate
                }
            };
            tracing::debug!(
                tenant_id = %stored.tenant_id,
                edge_id = %stored.edge_id,
                "relationship edge upserted"
            );
            counter!(EDGES_UPSERTED_TOTAL).increment(1);
            Ok(stored)
        })
    }

    fn get(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> pulse_domain::ports::BoxFuture<'_, DomainResult<Option<RelationshipEdge>>> {
        let key = (tenant_id.to_string(), edge_id.to_string());
        let edges = self.edges.clone();
        Box::pin(async move { Ok(edges.read().await.get(&key).cloned()) })
    }

    fn remove(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> pulse_domain::ports::BoxFuture<'_, DomainResult<()>> {
        let key = (tenant_id.to_string(), edge_id.to_string());
        let edges = self.edges.clone();
        Box::pin(async move {
            if edges.write().await.remove(&key).is_some() {
                counter!(EDGES_REMOVED_TOTAL).increment(1);
            }
            Ok(())
        })
    }

    fn query(
        &self,
        query: &EdgeRepositoryQuery,
    ) -> pulse_domain::ports::BoxFuture<'_, DomainResult<Vec<RelationshipEdge>>> {
        let query = query.clone();
        let edges = self.edges.clone();
        Box::pin(async move {
            let mut items: Vec<RelationshipEdge> = edges
                .read()
                .await
                .values()
                .filter(|edge| matches_query(edge, &query))
                .cloned()
                .collect();
            items.sort_by(|left, right| {
                left.created_at_ms
                    .cmp(&right.created_at_ms)
                    .then_with(|| left.edge_id.cmp(&right.edge_id))
            });
            Ok(items)
        })
    }

    fn list_active_from(
        &self,
        tenant_id: &str,
        from: &EntityReference,
    ) -> pulse_domain::ports::BoxFuture<'_, DomainResult<Vec<RelationshipEdge>>> {
        let tenant_id = tenant_id.to_string();
        let from = from.clone();
        let edges = self.edges.clone();
        Box::pin(async move {
            let items = edges
                .read()
                .await
                .values()
                .filter(|edge| {
                    edge.tenant_id == tenant_id && edge.is_active && edge.from == from
                })
                .cloned()
                .collect();
            Ok(items)
        })
    }
}

fn matches_query(edge: &RelationshipEdge, query: &EdgeRepositoryQuery) -> bool {
    if edge.tenant_id != query.tenant_id {
        return false;
    }
    if query.from.as_ref().is_some_and(|from| &edge.from != from) {
        return false;
    }
    if query.to.as_ref().is_some_and(|to| &edge.to != to) {
        return false;
    }
    if query.kind.is_some_and(|kind| edge.kind != kind) {
        return false;
    }
    if query.scope.is_some_and(|scope| edge.scope != scope) {
        return false;
    }
    if query
        .is_active
        .is_some_and(|is_active| edge.is_active != is_active)
    {
        return false;
    }
    true
}
