//! One-time survey links

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::RowId;
use crate::error::{SurveyError, SurveyResult};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OneTimeLink {
    #[serde(skip)]
    pub id: RowId,
    #[serde(skip)]
    pub survey_id: RowId,
    pub token: Uuid,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

impl OneTimeLink {
    pub fn new(survey_id: RowId, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            survey_id,
            token: Uuid::new_v4(),
            is_used: false,
            created_at: now,
        }
    }

    /// Write-once `false -> true` transition.
    pub fn redeem(&mut self) -> SurveyResult<()> {
        if self.is_used {
            return Err(SurveyError::LinkAlreadyUsed);
        }
        self.is_used = true;
        Ok(())
    }
}
