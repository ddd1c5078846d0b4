//! Target audiences restrict who may answer a form.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::domain::aggregates::User;
use crate::domain::value_objects::{PhoneNumber, Role, RowId};
use crate::error::{FieldErrors, SurveyResult};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TargetAudience {
    pub id: RowId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub roles: BTreeSet<Role>,
    pub include_phone_numbers: BTreeSet<PhoneNumber>,
    pub exclude_phone_numbers: BTreeSet<PhoneNumber>,
    pub created_at: DateTime<Utc>,
}

impl TargetAudience {
    /// Build an audience; the phone sets must be disjoint.
    pub fn new(
        name: Option<String>,
        description: Option<String>,
        roles: BTreeSet<Role>,
        include_phone_numbers: BTreeSet<PhoneNumber>,
        exclude_phone_numbers: BTreeSet<PhoneNumber>,
        now: DateTime<Utc>,
    ) -> SurveyResult<Self> {
        let mut errors = FieldErrors::new();
        for phone in include_phone_numbers.intersection(&exclude_phone_numbers) {
            errors.add(
                "exclude_phone_numbers",
                format!("{} is listed in both include and exclude", phone),
            );
        }
        errors.into_result()?;

        Ok(Self {
            id: 0,
            name,
            description,
            roles,
            include_phone_numbers,
            exclude_phone_numbers,
            created_at: now,
        })
    }

    /// Every phone number named by this audience.
    pub fn phone_numbers(&self) -> impl Iterator<Item = &PhoneNumber> {
        self.include_phone_numbers
            .iter()
            .chain(self.exclude_phone_numbers.iter())
    }

    /// Role or explicit inclusion admits, explicit exclusion always wins.
    pub fn admits(&self, user: &User) -> bool {
        if self.exclude_phone_numbers.contains(&user.phone_number) {
            return false;
        }
        self.roles.contains(&user.role) || self.include_phone_numbers.contains(&user.phone_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone(value: &str) -> PhoneNumber {
        PhoneNumber::parse(value).unwrap()
    }

    fn phones(values: &[&str]) -> BTreeSet<PhoneNumber> {
        values.iter().map(|v| phone(v)).collect()
    }

    #[test]
    fn overlapping_phone_sets_are_rejected() {
        let err = TargetAudience::new(
            None,
            None,
            BTreeSet::new(),
            phones(&["09120000001", "09120000002"]),
            phones(&["09120000002"]),
            Utc::now(),
        )
        .unwrap_err();
        assert!(err.field_errors().unwrap().contains("exclude_phone_numbers"));
    }

    #[test]
    fn admits_by_role_or_inclusion_unless_excluded() {
        let audience = TargetAudience::new(
            Some("staff".into()),
            None,
            [Role::Employee].into_iter().collect(),
            phones(&["09120000001"]),
            phones(&["09120000002"]),
            Utc::now(),
        )
        .unwrap();

        let now = Utc::now();
        let employee = User::new(phone("09120000003"), Role::Employee, now);
        let included = User::new(phone("09120000001"), Role::Student, now);
        let excluded = User::new(phone("09120000002"), Role::Employee, now);
        let outsider = User::new(phone("09120000004"), Role::Student, now);

        assert!(audience.admits(&employee));
        assert!(audience.admits(&included));
        assert!(!audience.admits(&excluded));
        assert!(!audience.admits(&outsider));
    }
}
