use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ContactDetails;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub brand_id: Option<Uuid>,
    pub engagement_score: i32,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Editable student fields. Name and email are mirrored onto the profile.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentUpdate {
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub contact: ContactDetails,
}
