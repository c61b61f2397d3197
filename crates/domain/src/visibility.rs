use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::activities::{Activity, Visibility};
use crate::entity::{EntityReference, ensure_reference};
use crate::error::DomainError;
use crate::relationships::{EdgeFilter, EdgeKind, EdgeScope, RelationshipEdge};
use crate::util::{contains_ignore_case, intersects_ignore_case};

pub const REASON_SELF_AUTHORED: &str = "self_authored";
pub const REASON_BLOCK: &str = "block";
pub const REASON_DENY_RULE: &str = "deny_rule";
pub const REASON_PRIVATE_VISIBILITY: &str = "private_visibility";
pub const REASON_MUTE: &str = "mute";
pub const REASON_ALLOW_RULE: &str = "allow_rule";
pub const REASON_DEFAULT: &str = "default";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Allowed,
    Denied,
    /// Excluded from feeds without being a security denial; callers may still
    /// count hidden activities.
    Hidden,
}

/// Outcome of evaluating one viewer against one activity. Transient; never
/// persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VisibilityDecision {
    pub kind: DecisionKind,
    pub allowed: bool,
    pub reason: String,
    pub matched_edge_id: Option<String>,
}

impl VisibilityDecision {
    fn allowed(reason: &str, matched_edge_id: Option<String>) -> Self {
        Self {
            kind: DecisionKind::Allowed,
            allowed: true,
            reason: reason.to_string(),
            matched_edge_id,
        }
    }

    fn denied(reason: &str, matched_edge_id: Option<String>) -> Self {
        Self {
            kind: DecisionKind::Denied,
            allowed: false,
            reason: reason.to_string(),
            matched_edge_id,
        }
    }

    fn hidden(reason: &str, matched_edge_id: Option<String>) -> Self {
        Self {
            kind: DecisionKind::Hidden,
            allowed: false,
            reason: reason.to_string(),
            matched_edge_id,
        }
    }
}

/// The viewer's active edges split by kind, built once per evaluation so
/// each rule works off the same single store query.
#[derive(Clone, Debug, Default)]
pub struct EdgesByKind {
    pub blocks: Vec<RelationshipEdge>,
    pub denies: Vec<RelationshipEdge>,
    pub mutes: Vec<RelationshipEdge>,
    pub allows: Vec<RelationshipEdge>,
}

impl EdgesByKind {
    pub fn partition(edges: Vec<RelationshipEdge>) -> Self {
        let mut partitioned = Self::default();
        for edge in edges {
            if !edge.is_active {
                continue;
            }
            match edge.kind {
                EdgeKind::Block => partitioned.blocks.push(edge),
                EdgeKind::Deny => partitioned.denies.push(edge),
                EdgeKind::Mute => partitioned.mutes.push(edge),
                EdgeKind::Allow => partitioned.allows.push(edge),
                // Follow/Subscribe edges shape feed assembly, not visibility.
                EdgeKind::Follow | EdgeKind::Subscribe => {}
            }
        }
        partitioned
    }
}

/// Rejects malformed input before any rule runs, so callers never get a
/// silent denial for a blank tenant or reference.
pub fn ensure_well_formed(
    tenant_id: &str,
    viewer: &EntityReference,
    activity: &Activity,
) -> DomainResult<()> {
    if tenant_id.trim().is_empty() {
        return Err(DomainError::Validation("tenant_id is required".into()));
    }
    ensure_reference("viewer", viewer)?;
    ensure_reference("activity.actor", &activity.actor)?;
    if let Some(owner) = &activity.owner {
        ensure_reference("activity.owner", owner)?;
    }
    for target in &activity.targets {
        ensure_reference("activity.target", target)?;
    }
    Ok(())
}

type Rule = fn(&EntityReference, &Activity, &EdgesByKind) -> Option<VisibilityDecision>;

/// Strict priority order; the first rule that produces a decision wins.
const RULES: [Rule; 6] = [
    self_authored,
    block_rule,
    deny_rule,
    private_visibility_rule,
    mute_rule,
    allow_rule,
];

/// Pure decision function over a pre-fetched, pre-partitioned edge set.
/// Never fails for well-formed input; falls through to an allow.
pub fn evaluate(
    viewer: &EntityReference,
    activity: &Activity,
    edges: &EdgesByKind,
) -> VisibilityDecision {
    for rule in RULES {
        if let Some(decision) = rule(viewer, activity, edges) {
            return decision;
        }
    }
    VisibilityDecision::allowed(REASON_DEFAULT, None)
}

/// Authors always see their own activities, even past a degenerate
/// self-block.
fn self_authored(
    viewer: &EntityReference,
    activity: &Activity,
    _edges: &EdgesByKind,
) -> Option<VisibilityDecision> {
    (viewer == &activity.actor)
        .then(|| VisibilityDecision::allowed(REASON_SELF_AUTHORED, None))
}

fn block_rule(
    _viewer: &EntityReference,
    activity: &Activity,
    edges: &EdgesByKind,
) -> Option<VisibilityDecision> {
    find_match(&edges.blocks, activity, false)
        .map(|edge| VisibilityDecision::denied(REASON_BLOCK, Some(edge.edge_id.clone())))
}

fn deny_rule(
    _viewer: &EntityReference,
    activity: &Activity,
    edges: &EdgesByKind,
) -> Option<VisibilityDecision> {
    find_match(&edges.denies, activity, true)
        .map(|edge| VisibilityDecision::denied(REASON_DENY_RULE, Some(edge.edge_id.clone())))
}

/// Private activities are only visible to the owner, a target, or the actor
/// (already allowed by the self-authored rule). Internal and Public fall
/// through for every viewer in the tenant.
fn private_visibility_rule(
    viewer: &EntityReference,
    activity: &Activity,
    _edges: &EdgesByKind,
) -> Option<VisibilityDecision> {
    if activity.visibility != Visibility::Private {
        return None;
    }
    let related = activity.owner.as_ref() == Some(viewer)
        || activity.targets.iter().any(|target| target == viewer);
    if related {
        // Related viewers fall through so a mute can still hide the row.
        None
    } else {
        Some(VisibilityDecision::denied(REASON_PRIVATE_VISIBILITY, None))
    }
}

fn mute_rule(
    _viewer: &EntityReference,
    activity: &Activity,
    edges: &EdgesByKind,
) -> Option<VisibilityDecision> {
    find_match(&edges.mutes, activity, true)
        .map(|edge| VisibilityDecision::hidden(REASON_MUTE, Some(edge.edge_id.clone())))
}

fn allow_rule(
    _viewer: &EntityReference,
    activity: &Activity,
    edges: &EdgesByKind,
) -> Option<VisibilityDecision> {
    find_match(&edges.allows, activity, true)
        .map(|edge| VisibilityDecision::allowed(REASON_ALLOW_RULE, Some(edge.edge_id.clone())))
}

fn find_match<'a>(
    edges: &'a [RelationshipEdge],
    activity: &Activity,
    with_filter: bool,
) -> Option<&'a RelationshipEdge> {
    edges.iter().find(|edge| {
        scope_matches(edge, activity)
            && (!with_filter || filter_matches(edge.filter.as_ref(), activity))
    })
}

fn scope_matches(edge: &RelationshipEdge, activity: &Activity) -> bool {
    let actor_hit = || edge.to == activity.actor;
    let target_hit = || activity.targets.iter().any(|target| *target == edge.to);
    let owner_hit = || activity.owner.as_ref() == Some(&edge.to);
    match edge.scope {
        EdgeScope::ActorOnly => actor_hit(),
        EdgeScope::TargetOnly => target_hit(),
        EdgeScope::OwnerOnly => owner_hit(),
        EdgeScope::Any => actor_hit() || target_hit() || owner_hit(),
    }
}

fn filter_matches(filter: Option<&EdgeFilter>, activity: &Activity) -> bool {
    let Some(filter) = filter else {
        return true;
    };

    let type_key_hit = if filter.type_keys.is_empty() && filter.type_key_prefixes.is_empty() {
        true
    } else {
        contains_ignore_case(&filter.type_keys, &activity.type_key)
            || filter.type_key_prefixes.iter().any(|prefix| {
                activity
                    .type_key
                    .to_ascii_lowercase()
                    .starts_with(&prefix.to_ascii_lowercase())
            })
    };
    if !type_key_hit {
        return false;
    }

    if !filter.required_tags_any.is_empty()
        && !intersects_ignore_case(&filter.required_tags_any, &activity.tags)
    {
        return false;
    }

    if !filter.excluded_tags_any.is_empty()
        && intersects_ignore_case(&filter.excluded_tags_any, &activity.tags)
    {
        return false;
    }

    if !filter.allowed_visibilities.is_empty()
        && !filter.allowed_visibilities.contains(&activity.visibility)
    {
        return false;
    }

    true
}
