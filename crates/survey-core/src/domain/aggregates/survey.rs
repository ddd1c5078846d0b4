//! Survey Aggregate
//!
//! Root of the versioned form hierarchy. Owns its forms; `active_version` is a
//! non-owning pointer to the one form currently accepting answers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::RowId;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Survey {
    #[serde(skip)]
    pub id: RowId,
    pub uuid: Uuid,
    pub title: String,
    #[serde(skip)]
    pub created_by: RowId,
    #[serde(skip)]
    pub active_version: Option<RowId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Survey {
    /// New survey; the store assigns `id` on insert.
    pub fn new(title: impl Into<String>, created_by: RowId, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            uuid: Uuid::new_v4(),
            title: title.into(),
            created_by,
            active_version: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn rename(&mut self, title: impl Into<String>, now: DateTime<Utc>) {
        self.title = title.into();
        self.updated_at = now;
    }
}
