use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use pulse_domain::DomainResult;
use pulse_domain::activities::Activity;
use pulse_domain::error::DomainError;
use pulse_domain::ports::activities::{ActivityRepository, ActivityRepositoryQuery};
use pulse_domain::util::intersects_ignore_case;
use tokio::sync::RwLock;

const ACTIVITIES_CREATED_TOTAL: &str = "pulse_infra_activities_created_total";
const ACTIVITIES_CREATE_CONFLICT_TOTAL: &str = "pulse_infra_activities_create_conflict_total";

/// Keyed by `(tenant_id, activity_id)`; the idempotency index maps
/// `(tenant_id, source.system, idempotency_key)` to the stored activity id.
#[derive(Default)]
pub struct InMemoryActivityRepository {
    activities: Arc<RwLock<HashMap<(String, String), Activity>>>,
    by_idempotency: Arc<RwLock<HashMap<(String, String, String), String>>>,
}

impl InMemoryActivityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn idempotency_triple(activity: &Activity) -> Option<(String, String, String)> {
    let source = activity.source.as_ref()?;
    let key = source.idempotency_key.as_ref()?;
    Some((
        activity.tenant_id.clone(),
        source.system.to_lowercase(),
        key.clone(),
    ))
}

impl ActivityRepository for InMemoryActivityRepository {
    fn create(
        &self,
        activity: &Activity,
    ) -> pulse_domain::ports::BoxFuture<'_, DomainResult<Activity>> {
        let activity = activity.clone();
        let activities = self.activities.clone();
        let by_idempotency = self.by_idempotency.clone();
        Box::pin(async move {
            // Index lock is taken first and held across the insert so two
            // concurrent publishes with the same key cannot both land.
            let mut by_idempotency = by_idempotency.write().await;
            let triple = idempotency_triple(&activity);
            if let Some(triple) = &triple {
                if by_idempotency.contains_key(triple) {
                    counter!(ACTIVITIES_CREATE_CONFLICT_TOTAL).increment(1);
                    return Err(DomainError::Conflict);
                }
            }
            let mut activities = activities.write().await;
            let record_key = (activity.tenant_id.clone(), activity.activity_id.clone());
            if activities.contains_key(&record_key) {
                counter!(ACTIVITIES_CREATE_CONFLICT_TOTAL).increment(1);
                return Err(DomainError::Conflict);
            }
            if let Some(triple) = triple {
                by_idempotency.insert(triple, activity.activity_id.clone());
            }
            activities.insert(record_key, activity.clone());
            tracing::debug!(
                tenant_id = %activity.tenant_id,
                activity_id = %activity.activity_id,
                type_key = %activity.type_key,
                "activity stored"
            );
            counter!(ACTIVITIES_CREATED_TOTAL).increment(1);
            Ok(activity)
        })
    }

    fn get(
        &self,
        tenant_id: &str,
        activity_id: &str,
    ) -> pulse_domain::ports::BoxFuture<'_, DomainResult<Option<Activity>>> {
        let key = (tenant_id.to_string(), activity_id.to_string());
        let activities = self.activities.clone();
        Box::pin(async move { Ok(activities.read().await.get(&key).cloned()) })
    }

    fn get_by_idempotency_key(
        &self,
        tenant_id: &str,
        system: &str,
        idempotency_key: &str,
    ) -> pulse_domain::ports::BoxFuture<'_, DomainResult<Option<Activity>>> {
        let triple = (
            tenant_id.to_string(),
            system.to_lowercase(),
            idempotency_key.to_string(),
        );
        let activities = self.activities.clone();
        let by_idempotency = self.by_idempotency.clone();
        Box::pin(async move {
            let by_idempotency = by_idempotency.read().await;
            let Some(activity_id) = by_idempotency.get(&triple) else {
                return Ok(None);
            };
            let key = (triple.0.clone(), activity_id.clone());
            Ok(activities.read().await.get(&key).cloned())
        })
    }

    fn list(
        &self,
        query: &ActivityRepositoryQuery,
    ) -> pulse_domain::ports::BoxFuture<'_, DomainResult<Vec<Activity>>> {
        let query = query.clone();
        let activities = self.activities.clone();
        Box::pin(async move {
            let mut items: Vec<Activity> = activities
                .read()
                .await
                .values()
                .filter(|activity| matches_query(activity, &query))
                .cloned()
                .collect();
            items.sort_by(|left, right| {
                right
                    .occurred_at_ms
                    .cmp(&left.occurred_at_ms)
                    .then_with(|| right.activity_id.cmp(&left.activity_id))
            });
            if let Some(cursor_ms) = query.cursor_occurred_at_ms {
                let cursor_id = query.cursor_activity_id.clone().unwrap_or_default();
                items.retain(|activity| {
                    activity.occurred_at_ms < cursor_ms
                        || (activity.occurred_at_ms == cursor_ms
                            && activity.activity_id < cursor_id)
                });
            }
            items.truncate(query.limit);
            Ok(items)
        })
    }
}

fn matches_query(activity: &Activity, query: &ActivityRepositoryQuery) -> bool {
    if activity.tenant_id != query.tenant_id {
        return false;
    }
    if let Some(type_key) = &query.type_key {
        if !activity.type_key.eq_ignore_ascii_case(type_key) {
            return false;
        }
    }
    if let Some(actor) = &query.actor {
        if &activity.actor != actor {
            return false;
        }
    }
    if !query.targets_any.is_empty()
        && !query
            .targets_any
            .iter()
            .any(|target| activity.targets.contains(target))
    {
        return false;
    }
    if !query.tags_any.is_empty() && !intersects_ignore_case(&query.tags_any, &activity.tags) {
        return false;
    }
    if let Some(visibility) = query.visibility {
        if activity.visibility != visibility {
            return false;
        }
    }
    if query.from_ms.is_some_and(|from| activity.occurred_at_ms < from) {
        return false;
    }
    if query.to_ms.is_some_and(|to| activity.occurred_at_ms > to) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_domain::activities::{ActivitySource, Visibility};
    use pulse_domain::entity::EntityReference;

    fn activity(id: &str, occurred_at_ms: i64) -> Activity {
        Activity {
            activity_id: id.to_string(),
            tenant_id: "acme".to_string(),
            type_key: "invoice.paid".to_string(),
            occurred_at_ms,
            created_at_ms: occurred_at_ms,
            actor: EntityReference::new("user", "person", "u-1"),
            owner: None,
            targets: vec![EntityReference::new("invoice", "document", "332")],
            visibility: Visibility::Internal,
            summary: None,
            payload: serde_json::Value::Null,
            source: None,
            tags: vec!["billing".to_string()],
        }
    }

    fn query() -> ActivityRepositoryQuery {
        ActivityRepositoryQuery {
            tenant_id: "acme".to_string(),
            type_key: None,
            actor: None,
            targets_any: Vec::new(),
            tags_any: Vec::new(),
            visibility: None,
            from_ms: None,
            to_ms: None,
            cursor_occurred_at_ms: None,
            cursor_activity_id: None,
            limit: 10,
        }
    }

    #[tokio::test]
    async fn create_rejects_a_taken_idempotency_triple() {
        let repo = InMemoryActivityRepository::new();
        let mut first = activity("a-1", 1_000);
        first.source = Some(ActivitySource {
            system: "Billing".to_string(),
            idempotency_key: Some("evt-9".to_string()),
            correlation_id: None,
        });
        repo.create(&first).await.unwrap();

        let mut replay = activity("a-2", 2_000);
        replay.source = Some(ActivitySource {
            system: "billing".to_string(),
            idempotency_key: Some("evt-9".to_string()),
            correlation_id: None,
        });
        let err = repo.create(&replay).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict));

        let stored = repo
            .get_by_idempotency_key("acme", "BILLING", "evt-9")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.activity_id, "a-1");
    }

    #[tokio::test]
    async fn idempotency_keys_are_case_sensitive_unlike_systems() {
        let repo = InMemoryActivityRepository::new();
        let mut first = activity("a-1", 1_000);
        first.source = Some(ActivitySource {
            system: "billing".to_string(),
            idempotency_key: Some("evt-9".to_string()),
            correlation_id: None,
        });
        repo.create(&first).await.unwrap();

        let mut second = activity("a-2", 2_000);
        second.source = Some(ActivitySource {
            system: "billing".to_string(),
            idempotency_key: Some("EVT-9".to_string()),
            correlation_id: None,
        });
        repo.create(&second).await.unwrap();
    }

    #[tokio::test]
    async fn list_orders_newest_first_with_id_tiebreak() {
        let repo = InMemoryActivityRepository::new();
        repo.create(&activity("a-1", 1_000)).await.unwrap();
        repo.create(&activity("a-3", 2_000)).await.unwrap();
        repo.create(&activity("a-2", 2_000)).await.unwrap();

        let items = repo.list(&query()).await.unwrap();
        let ids: Vec<_> = items.iter().map(|item| item.activity_id.as_str()).collect();
        assert_eq!(ids, vec!["a-3", "a-2", "a-1"]);
    }

    #[tokio::test]
    async fn list_cursor_is_strictly_older() {
        let repo = InMemoryActivityRepository::new();
        repo.create(&activity("a-1", 1_000)).await.unwrap();
        repo.create(&activity("a-2", 2_000)).await.unwrap();
        repo.create(&activity("a-3", 2_000)).await.unwrap();

        let mut q = query();
        q.cursor_occurred_at_ms = Some(2_000);
        q.cursor_activity_id = Some("a-3".to_string());
        let items = repo.list(&q).await.unwrap();
        let ids: Vec<_> = items.iter().map(|item| item.activity_id.as_str()).collect();
        assert_eq!(ids, vec!["a-2", "a-1"]);
    }

    #[tokio::test]
    async fn list_filters_compose() {
        let repo = InMemoryActivityRepository::new();
        let mut tagged = activity("a-1", 1_000);
        tagged.tags = vec!["Billing".to_string()];
        repo.create(&tagged).await.unwrap();
        let mut other = activity("a-2", 2_000);
        other.type_key = "comment.created".to_string();
        other.tags = vec!["social".to_string()];
        repo.create(&other).await.unwrap();

        let mut q = query();
        q.type_key = Some("INVOICE.PAID".to_string());
        q.tags_any = vec!["billing".to_string()];
        let items = repo.list(&q).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].activity_id, "a-1");
    }

    #[tokio::test]
    async fn list_matches_any_of_the_requested_targets() {
        let repo = InMemoryActivityRepository::new();
        repo.create(&activity("a-1", 1_000)).await.unwrap();
        let mut other = activity("a-2", 2_000);
        other.targets = vec![EntityReference::new("order", "document", "777")];
        repo.create(&other).await.unwrap();

        let mut q = query();
        q.targets_any = vec![
            EntityReference::new(" INVOICE ", "Document", "332"),
            EntityReference::new("order", "document", "999"),
        ];
        let items = repo.list(&q).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].activity_id, "a-1");
    }

    #[tokio::test]
    async fn list_time_window_is_inclusive() {
        let repo = InMemoryActivityRepository::new();
        repo.create(&activity("a-1", 1_000)).await.unwrap();
        repo.create(&activity("a-2", 2_000)).await.unwrap();
        repo.create(&activity("a-3", 3_000)).await.unwrap();

        let mut q = query();
        q.from_ms = Some(1_000);
        q.to_ms = Some(2_000);
        let items = repo.list(&q).await.unwrap();
        let ids: Vec<_> = items.iter().map(|item| item.activity_id.as_str()).collect();
        assert_eq!(ids, vec!["a-2", "a-1"]);
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let repo = InMemoryActivityRepository::new();
        repo.create(&activity("a-1", 1_000)).await.unwrap();
        let mut foreign = activity("a-2", 2_000);
        foreign.tenant_id = "globex".to_string();
        repo.create(&foreign).await.unwrap();

        let items = repo.list(&query()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(repo.get("globex", "a-1").await.unwrap().is_none());
    }
}
