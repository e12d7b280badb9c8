use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, DatabaseConnection, Set};
use serde_json::Value;
use uuid::Uuid;

use crate::{entity::audit_logs::ActiveModel, error::AppResult};

pub async fn log_audit(
    conn: &DatabaseConnection,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        action: Set(action.to_string()),
        resource: Set(resource.map(str::to_string)),
        metadata: Set(metadata),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;

    Ok(())
}

/// Record an audit entry; a failed write is logged and swallowed.
pub async fn record(
    conn: &DatabaseConnection,
    user_id: Uuid,
    action: &str,
    resource: &str,
    metadata: Value,
) {
    if let Err(err) = log_audit(conn, Some(user_id), action, Some(resource), Some(metadata)).await
    {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
