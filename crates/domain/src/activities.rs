use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::cursor;
use crate::entity::{EntityReference, ensure_reference};
use crate::error::DomainError;
use crate::identity::{Clock, IdGenerator};
use crate::ports::activities::{ActivityRepository, ActivityRepositoryQuery};
use crate::util::{dedupe_normalized, trim_optional};

pub const MAX_TYPE_KEY_LENGTH: usize = 200;
pub const MAX_SUMMARY_LENGTH: usize = 500;
pub const MAX_TAG_COUNT: usize = 50;
pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Internal,
    Private,
}

/// Origin of a published activity. When both `system` and `idempotency_key`
/// are present, repeated publishes of the same logical event collapse to one
/// stored activity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivitySource {
    pub system: String,
    pub idempotency_key: Option<String>,
    pub correlation_id: Option<String>,
}

/// Immutable record of something that happened. Created once via publish,
/// never updated or deleted; the payload is stored and returned verbatim and
/// never inspected by this core.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub activity_id: String,
    pub tenant_id: String,
    pub type_key: String,
    pub occurred_at_ms: i64,
    pub created_at_ms: i64,
    pub actor: EntityReference,
    pub owner: Option<EntityReference>,
    pub targets: Vec<EntityReference>,
    pub visibility: Visibility,
    pub summary: Option<String>,
    pub payload: serde_json::Value,
    pub source: Option<ActivitySource>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct PublishActivityInput {
    pub activity_id: Option<String>,
    pub tenant_id: String,
    pub type_key: String,
    pub occurred_at_ms: i64,
    pub actor: EntityReference,
    pub owner: Option<EntityReference>,
    pub targets: Vec<EntityReference>,
    pub visibility: Visibility,
    pub summary: Option<String>,
    pub payload: serde_json::Value,
    pub source: Option<ActivitySource>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ActivityListQuery {
    pub tenant_id: String,
    pub type_key: Option<String>,
    pub actor: Option<EntityReference>,
    pub targets_any: Vec<EntityReference>,
    pub tags_any: Vec<String>,
    pub visibility: Option<Visibility>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityPage {
    pub items: Vec<Activity>,
    pub next_cursor: Option<String>,
}

#[derive(Clone)]
pub struct ActivityService {
    repository: Arc<dyn ActivityRepository>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    default_limit: usize,
    max_limit: usize,
}

impl ActivityService {
    pub fn new(
        repository: Arc<dyn ActivityRepository>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self::with_page_limits(repository, clock, ids, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT)
    }

    /// Page-size bounds usually come from deployment config rather than the
    /// built-in constants.
    pub fn with_page_limits(
        repository: Arc<dyn ActivityRepository>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        default_limit: usize,
        max_limit: usize,
    ) -> Self {
        Self {
            repository,
            clock,
            ids,
            default_limit,
            max_limit,
        }
    }

    /// Publishes an activity, deduplicating by `(tenant, source.system,
    /// source.idempotency_key)`. Replays return the stored activity with its
    /// original id; callers must not assume a fresh id on retries.
    pub async fn publish(&self, input: PublishActivityInput) -> DomainResult<Activity> {
        let input = validate_publish_input(input)?;

        let idempotency = input.source.as_ref().and_then(|source| {
            source
                .idempotency_key
                .as_ref()
                .map(|key| (source.system.clone(), key.clone()))
        });

        if let Some((system, key)) = idempotency.as_ref() {
            if let Some(existing) = self
                .repository
                .get_by_idempotency_key(&input.tenant_id, system, key)
                .await?
            {
                return Ok(existing);
            }
        }

        let activity = Activity {
            activity_id: input
                .activity_id
                .unwrap_or_else(|| self.ids.new_id()),
            tenant_id: input.tenant_id,
            type_key: input.type_key,
            occurred_at_ms: input.occurred_at_ms,
            created_at_ms: self.clock.now_ms(),
            actor: input.actor,
            owner: input.owner,
            targets: input.targets,
            visibility: input.visibility,
            summary: input.summary,
            payload: input.payload,
            source: input.source,
            tags: input.tags,
        };

        match self.repository.create(&activity).await {
            Ok(activity) => Ok(activity),
            Err(DomainError::Conflict) => {
                // Lost the check-and-set race against an identical retry;
                // the winner's row is the canonical one.
                let (system, key) = idempotency.ok_or(DomainError::Conflict)?;
                self.repository
                    .get_by_idempotency_key(&activity.tenant_id, &system, &key)
                    .await?
                    .ok_or(DomainError::Conflict)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn get(
        &self,
        tenant_id: &str,
        activity_id: &str,
    ) -> DomainResult<Option<Activity>> {
        if tenant_id.trim().is_empty() {
            return Err(DomainError::Validation("tenant_id is required".into()));
        }
        if activity_id.trim().is_empty() {
            return Err(DomainError::Validation("activity_id is required".into()));
        }
        self.repository.get(tenant_id.trim(), activity_id.trim()).await
    }

    /// Pages through the tenant's activities in `(occurred_at_ms desc,
    /// activity_id desc)` order. The cursor encodes the last returned row, so
    /// pages stay gap-free and duplicate-free under concurrent publishes.
    pub async fn query(&self, query: ActivityListQuery) -> DomainResult<ActivityPage> {
        if query.tenant_id.trim().is_empty() {
            return Err(DomainError::Validation("tenant_id is required".into()));
        }
        let limit = self.normalize_limit(query.limit)?;
        let (cursor_occurred_at_ms, cursor_activity_id) =
            cursor::decode_optional(query.cursor.as_deref())?;

        let repo_query = ActivityRepositoryQuery {
            tenant_id: query.tenant_id.trim().to_string(),
            type_key: trim_optional(query.type_key),
            actor: query.actor,
            targets_any: query.targets_any,
            tags_any: dedupe_normalized(query.tags_any),
            visibility: query.visibility,
            from_ms: query.from_ms,
            to_ms: query.to_ms,
            cursor_occurred_at_ms,
            cursor_activity_id,
            limit: limit + 1,
        };
        let mut items = self.repository.list(&repo_query).await?;

        let next_cursor = items
            .get(limit.saturating_sub(1))
            .filter(|_| items.len() > limit)
            .map(|activity| cursor::encode(activity.occurred_at_ms, &activity.activity_id));
        if items.len() > limit {
            items.truncate(limit);
        }
        Ok(ActivityPage { items, next_cursor })
    }

    fn normalize_limit(&self, limit: Option<usize>) -> DomainResult<usize> {
        let limit = limit.unwrap_or(self.default_limit);
        if !(1..=self.max_limit).contains(&limit) {
            Err(DomainError::Validation(format!(
                "limit must be between 1 and {}",
                self.max_limit
            )))
        } else {
            Ok(limit)
        }
    }
}

fn validate_publish_input(mut input: PublishActivityInput) -> DomainResult<PublishActivityInput> {
    input.tenant_id = input.tenant_id.trim().to_string();
    if input.tenant_id.is_empty() {
        return Err(DomainError::Validation("tenant_id is required".into()));
    }

    input.type_key = input.type_key.trim().to_string();
    if input.type_key.is_empty() {
        return Err(DomainError::Validation("type_key is required".into()));
    }
    if input.type_key.chars().count() > MAX_TYPE_KEY_LENGTH {
        return Err(DomainError::Validation(format!(
            "type_key exceeds max length of {MAX_TYPE_KEY_LENGTH}"
        )));
    }

    if input.occurred_at_ms == 0 {
        return Err(DomainError::Validation("occurred_at_ms is required".into()));
    }

    ensure_reference("actor", &input.actor)?;
    if let Some(owner) = &input.owner {
        ensure_reference("owner", owner)?;
    }
    for target in &input.targets {
        ensure_reference("target", target)?;
    }

    input.summary = trim_optional(input.summary);
    if let Some(summary) = &input.summary {
        if summary.chars().count() > MAX_SUMMARY_LENGTH {
            return Err(DomainError::Validation(format!(
                "summary exceeds max length of {MAX_SUMMARY_LENGTH}"
            )));
        }
    }

    input.tags = dedupe_normalized(input.tags);
    if input.tags.len() > MAX_TAG_COUNT {
        return Err(DomainError::Validation(format!(
            "tags exceeds max of {MAX_TAG_COUNT}"
        )));
    }

    input.activity_id = trim_optional(input.activity_id);
    input.source = match input.source {
        None => None,
        Some(source) => {
            let system = source.system.trim().to_string();
            if system.is_empty() {
                return Err(DomainError::Validation("source.system is required".into()));
            }
            Some(ActivitySource {
                system,
                idempotency_key: trim_optional(source.idempotency_key),
                correlation_id: trim_optional(source.correlation_id),
            })
        }
    };

    Ok(input)
}
