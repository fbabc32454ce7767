use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// ContentType
///
/// Rendering hint for a content value. The server stores the value verbatim.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ContentType {
    #[default]
    Text,
    Html,
    Image,
    Link,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Html => "html",
            ContentType::Image => "image",
            ContentType::Link => "link",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(ContentType::Text),
            "html" => Some(ContentType::Html),
            "image" => Some(ContentType::Image),
            "link" => Some(ContentType::Link),
            _ => None,
        }
    }
}

/// Content
///
/// One editable CMS row, keyed by a unique lowercase `key`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Content {
    pub id: Uuid,
    pub key: String,
    pub value: String,
    pub page: String,
    pub section: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// ContentUpsert
///
/// Create-or-replace payload. Omitted tagging fields fall back to defaults on insert and keep
/// their stored value on update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContentUpsert {
    pub key: String,
    pub value: String,
    pub page: Option<String>,
    pub section: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<ContentType>,
    pub order: Option<i32>,
    pub is_active: Option<bool>,
}

impl ContentUpsert {
    pub fn normalized_key(&self) -> String {
        self.key.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContentBulkRequest {
    pub items: Vec<ContentUpsert>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ContentQuery {
    pub page: Option<String>,
    pub section: Option<String>,
}

impl ContentQuery {
    /// Cache key for this filter combination.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}",
            self.page.as_deref().unwrap_or("*"),
            self.section.as_deref().unwrap_or("*")
        )
    }
}
