use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::policy::Role;

/// A user's dashboard profile. `role` is `None` when the stored value is
/// missing or not one of the three known roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Option<Role>,
    pub brand_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Profile as stored, with the role still raw text.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Option<String>,
    pub brand_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            role: row.role.as_deref().and_then(Role::parse),
            brand_id: row.brand_id,
            created_at: row.created_at,
        }
    }
}

/// Login credentials. The id is shared with the profile it owns.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub phone_number: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

/// Everything written when an account is registered: the credential record,
/// the profile and the role's own record.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub brand_id: Option<Uuid>,
    pub contact: ContactDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Instructor {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
