//! Audit metadata embedded in entities by composition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creation and modification metadata carried by every persisted entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    /// When the entity was first persisted.
    pub created_at: DateTime<Utc>,
    /// When the entity was last mutated.
    pub updated_at: DateTime<Utc>,
    /// Actor that created the entity, if known.
    pub created_by: Option<String>,
}

impl AuditInfo {
    /// Creates audit info stamped with the current time and no actor.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            created_by: None,
        }
    }

    /// Creates audit info attributed to an actor.
    pub fn for_actor(actor: impl Into<String>) -> Self {
        Self {
            created_by: Some(actor.into()),
            ..Self::new()
        }
    }

    /// Bumps the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for AuditInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_advances_updated_at() {
        let mut audit = AuditInfo::new();
        let created = audit.created_at;
        audit.touch();
        assert!(audit.updated_at >= created);
        assert_eq!(audit.created_at, created);
    }

    #[test]
    fn for_actor_records_creator() {
        let audit = AuditInfo::for_actor("checkout-api");
        assert_eq!(audit.created_by.as_deref(), Some("checkout-api"));
    }
}
