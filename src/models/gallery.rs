use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const MAX_GALLERY_IMAGES: usize = 20;

/// GalleryCategory
///
/// Fixed display categories for gallery posts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq, Default)]
#[ts(export)]
pub enum GalleryCategory {
    Meeting,
    Event,
    Celebration,
    Training,
    #[serde(rename = "Social Service")]
    SocialService,
    #[default]
    Other,
}

impl GalleryCategory {
    pub const ALL: [GalleryCategory; 6] = [
        GalleryCategory::Meeting,
        GalleryCategory::Event,
        GalleryCategory::Celebration,
        GalleryCategory::Training,
        GalleryCategory::SocialService,
        GalleryCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GalleryCategory::Meeting => "Meeting",
            GalleryCategory::Event => "Event",
            GalleryCategory::Celebration => "Celebration",
            GalleryCategory::Training => "Training",
            GalleryCategory::SocialService => "Social Service",
            GalleryCategory::Other => "Other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(raw))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GalleryImage {
    pub id: Uuid,
    pub url: String,
    pub mimetype: String,
    /// Storage-provider id needed to delete the object.
    pub public_id: String,
}

/// GalleryPost
///
/// A dated album. A post never outlives its last image.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GalleryPost {
    pub id: Uuid,
    pub title: String,
    pub category: GalleryCategory,
    pub date: String,
    pub images: Vec<GalleryImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct GalleryQuery {
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_round_trip_through_display_names() {
        assert_eq!(GalleryCategory::parse("social service"), Some(GalleryCategory::SocialService));
        assert_eq!(
            serde_json::to_value(GalleryCategory::SocialService).unwrap(),
            "Social Service"
        );
        assert_eq!(GalleryCategory::parse("Picnic"), None);
    }
}
