use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::error::DomainError;

/// Normalized identifier for any participant referenced by an activity or a
/// relationship edge: actor, owner, target, viewer.
///
/// Identity is structural: two references are equal iff kind, entity type,
/// and id match after trimming and ASCII-case-insensitive comparison. That
/// single equality contract drives edge matching, scope matching, upsert
/// uniqueness, and self-authorship checks. The display label never
/// participates in identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityReference {
    pub kind: String,
    pub entity_type: String,
    pub id: String,
    pub display_label: Option<String>,
}

impl EntityReference {
    pub fn new(
        kind: impl Into<String>,
        entity_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            entity_type: entity_type.into(),
            id: id.into(),
            display_label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.display_label = Some(label.into());
        self
    }

    fn normalized(&self) -> (String, String, String) {
        (
            self.kind.trim().to_ascii_lowercase(),
            self.entity_type.trim().to_ascii_lowercase(),
            self.id.trim().to_ascii_lowercase(),
        )
    }
}

impl PartialEq for EntityReference {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for EntityReference {}

impl Hash for EntityReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

/// Validates that a reference carries non-blank kind/type/id, naming the
/// owning field in the error.
pub fn ensure_reference(field: &str, reference: &EntityReference) -> DomainResult<()> {
    if reference.kind.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field}.kind is required")));
    }
    if reference.entity_type.trim().is_empty() {
        return Err(DomainError::Validation(format!(
            "{field}.entity_type is required"
        )));
    }
    if reference.id.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field}.id is required")));
    }
    Ok(())
}
