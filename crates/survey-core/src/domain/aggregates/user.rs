//! User accounts (authenticated by phone number)

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::value_objects::{PhoneNumber, Role, RowId};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct User {
    pub id: RowId,
    pub phone_number: PhoneNumber,
    pub role: Role,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    /// Regular account created on first login.
    pub fn new(phone_number: PhoneNumber, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            phone_number,
            role,
            is_staff: false,
            is_superuser: false,
            is_active: true,
            date_joined: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser
    }

    pub fn can_author_surveys(&self) -> bool {
        self.is_admin() || self.role.can_author()
    }
}
