use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::activities::{Activity, Visibility};
use crate::entity::{EntityReference, ensure_reference};
use crate::error::DomainError;
use crate::identity::{Clock, IdGenerator};
use crate::ports::relationships::{EdgeRepositoryQuery, RelationshipRepository};
use crate::util::dedupe_normalized;
use crate::visibility::{self, VisibilityDecision};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Follow,
    Subscribe,
    Block,
    Mute,
    Allow,
    Deny,
}

/// Which part of an activity the edge governs: its actor, any target, its
/// owner, or any of the three.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeScope {
    Any,
    ActorOnly,
    TargetOnly,
    OwnerOnly,
}

/// Optional narrowing of an edge to a subset of activities. Empty lists are
/// vacuous; every populated list must match for the filter to match.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct EdgeFilter {
    pub type_keys: Vec<String>,
    pub type_key_prefixes: Vec<String>,
    pub required_tags_any: Vec<String>,
    pub excluded_tags_any: Vec<String>,
    pub allowed_visibilities: Vec<Visibility>,
}

impl EdgeFilter {
    pub fn is_empty(&self) -> bool {
        self.type_keys.is_empty()
            && self.type_key_prefixes.is_empty()
            && self.required_tags_any.is_empty()
            && self.excluded_tags_any.is_empty()
            && self.allowed_visibilities.is_empty()
    }
}

/// Directed, typed, scoped preference from one entity toward another.
/// Uniqueness key for upsert: `(tenant_id, from, to, kind, scope)`; filter
/// and is_active are the mutable fields.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RelationshipEdge {
    pub edge_id: String,
    pub tenant_id: String,
    pub from: EntityReference,
    pub to: EntityReference,
    pub kind: EdgeKind,
    pub scope: EdgeScope,
    pub filter: Option<EdgeFilter>,
    pub is_active: bool,
    pub created_at_ms: i64,
}

impl RelationshipEdge {
    pub fn upsert_key_matches(&self, other: &RelationshipEdge) -> bool {
        self.tenant_id == other.tenant_id
            && self.kind == other.kind
            && self.scope == other.scope
            && self.from == other.from
            && self.to == other.to
    }
}

#[derive(Clone, Debug)]
pub struct UpsertEdgeInput {
    pub tenant_id: String,
    pub from: EntityReference,
    pub to: EntityReference,
    pub kind: EdgeKind,
    pub scope: EdgeScope,
    pub filter: Option<EdgeFilter>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct EdgeListQuery {
    pub tenant_id: String,
    pub from: Option<EntityReference>,
    pub to: Option<EntityReference>,
    pub kind: Option<EdgeKind>,
    pub scope: Option<EdgeScope>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct RelationshipService {
    repository: Arc<dyn RelationshipRepository>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl RelationshipService {
    pub fn new(
        repository: Arc<dyn RelationshipRepository>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            repository,
            clock,
            ids,
        }
    }

    /// Create-or-replace by uniqueness key. A repeated upsert replaces the
    /// edge's filter and is_active while keeping its original edge_id and
    /// created_at_ms.
    pub async fn upsert(&self, input: UpsertEdgeInput) -> DomainResult<RelationshipEdge> {
        let input = validate_upsert_input(input)?;
        let candidate = RelationshipEdge {
            edge_id: self.ids.new_id(),
            tenant_id: input.tenant_id,
            from: input.from,
            to: input.to,
            kind: input.kind,
            scope: input.scope,
            filter: input.filter,
            is_active: input.is_active.unwrap_or(true),
            created_at_ms: self.clock.now_ms(),
        };
        self.repository.upsert(&candidate).await
    }

    /// Hard delete; removing an unknown edge succeeds so retries stay safe.
    pub async fn remove(&self, tenant_id: &str, edge_id: &str) -> DomainResult<()> {
        if tenant_id.trim().is_empty() {
            return Err(DomainError::Validation("tenant_id is required".into()));
        }
        if edge_id.trim().is_empty() {
            return Err(DomainError::Validation("edge_id is required".into()));
        }
        self.repository.remove(tenant_id.trim(), edge_id.trim()).await
    }

    pub async fn get(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> DomainResult<Option<RelationshipEdge>> {
        if tenant_id.trim().is_empty() {
            return Err(DomainError::Validation("tenant_id is required".into()));
        }
        if edge_id.trim().is_empty() {
            return Err(DomainError::Validation("edge_id is required".into()));
        }
        self.repository.get(tenant_id.trim(), edge_id.trim()).await
    }

    pub async fn query(&self, query: EdgeListQuery) -> DomainResult<Vec<RelationshipEdge>> {
        if query.tenant_id.trim().is_empty() {
            return Err(DomainError::Validation("tenant_id is required".into()));
        }
        let repo_query = EdgeRepositoryQuery {
            tenant_id: query.tenant_id.trim().to_string(),
            from: query.from,
            to: query.to,
            kind: query.kind,
            scope: query.scope,
            is_active: query.is_active,
        };
        self.repository.query(&repo_query).await
    }

    /// Decides whether `viewer` may see `activity`: one store call for the
    /// viewer's active outgoing edges, then the pure rule cascade.
    pub async fn can_see(
        &self,
        tenant_id: &str,
        viewer: &EntityReference,
        activity: &Activity,
    ) -> DomainResult<VisibilityDecision> {
        visibility::ensure_well_formed(tenant_id, viewer, activity)?;
        let edges = self
            .repository
            .list_active_from(tenant_id.trim(), viewer)
            .await?;
        let edges = visibility::EdgesByKind::partition(edges);
        Ok(visibility::evaluate(viewer, activity, &edges))
    }
}

fn validate_upsert_input(mut input: UpsertEdgeInput) -> DomainResult<UpsertEdgeInput> {
    input.tenant_id = input.tenant_id.trim().to_string();
    if input.tenant_id.is_empty() {
        return Err(DomainError::Validation("tenant_id is required".into()));
    }
    ensure_reference("from", &input.from)?;
    ensure_reference("to", &input.to)?;

    input.filter = input
        .filter
        .map(|filter| EdgeFilter {
            type_keys: dedupe_normalized(filter.type_keys),
            type_key_prefixes: dedupe_normalized(filter.type_key_prefixes),
            required_tags_any: dedupe_normalized(filter.required_tags_any),
            excluded_tags_any: dedupe_normalized(filter.excluded_tags_any),
            allowed_visibilities: filter.allowed_visibilities,
        })
        .filter(|filter| !filter.is_empty());

    Ok(input)
}
