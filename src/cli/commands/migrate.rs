use serde_json::json;

use crate::cli::{utils::output_success, OutputFormat};
use crate::database::DatabaseManager;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = crate::config::config();
    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::apply_schema(&pool).await?;
    pool.close().await;

    output_success(
        &output_format,
        "Schema applied",
        Some(json!({ "tables": ["brands", "accounts", "profiles", "students", "instructors", "courses", "enrollments", "attendance"] })),
    )
}
