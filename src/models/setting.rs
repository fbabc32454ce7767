use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Setting
///
/// A site-wide key/value toggle. `value` is arbitrary JSON.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Setting {
    pub id: Uuid,
    pub key: String,
    #[schema(value_type = Object)]
    #[ts(type = "unknown")]
    pub value: serde_json::Value,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingUpsert {
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    pub description: Option<String>,
}
