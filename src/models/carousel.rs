use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const MAX_CAROUSEL_IMAGES: usize = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum CarouselType {
    #[default]
    Home,
    Branch,
}

impl CarouselType {
    pub fn as_str(self) -> &'static str {
        match self {
            CarouselType::Home => "home",
            CarouselType::Branch => "branch",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" => Some(CarouselType::Home),
            "branch" => Some(CarouselType::Branch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CarouselImage {
    pub id: Uuid,
    pub url: String,
    pub mimetype: String,
    pub public_id: String,
    pub alt: String,
}

/// Carousel
///
/// A homepage or branch-page slideshow. `branch` holds a branch slug and is set exactly when
/// `carousel_type` is `branch`. `order` is advisory, scoped per (type, branch).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Carousel {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub carousel_type: CarouselType,
    pub branch: Option<String>,
    pub images: Vec<CarouselImage>,
    pub is_active: bool,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CarouselQuery {
    #[serde(rename = "type")]
    pub carousel_type: Option<String>,
    pub branch: Option<String>,
}
