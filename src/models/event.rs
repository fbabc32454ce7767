use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::storage::MediaCategory;

/// Hard cap on the number of files one event may carry.
pub const MAX_EVENT_FILES: usize = 10;
pub const MAX_EVENT_IMAGES: usize = 5;
pub const MAX_EVENT_VIDEOS: usize = 3;
pub const MAX_EVENT_DOCUMENTS: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EventFile {
    pub url: String,
    pub mimetype: String,
}

/// Event
///
/// A published event. `title` and `description` are stored lowercased; `title` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub files: Vec<EventFile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// check_event_files
///
/// Enforces both the raw cap and the per-category ceilings on a complete file list. Returns
/// the user-facing reason on violation.
pub fn check_event_files(files: &[EventFile]) -> Result<(), String> {
    if files.len() > MAX_EVENT_FILES {
        return Err(format!("An event can have at most {MAX_EVENT_FILES} files"));
    }
    let count = |category: MediaCategory| {
        files
            .iter()
            .filter(|f| MediaCategory::from_mime(&f.mimetype) == category)
            .count()
    };
    let limits = [
        (MediaCategory::Images, MAX_EVENT_IMAGES, "images"),
        (MediaCategory::Videos, MAX_EVENT_VIDEOS, "videos"),
        (MediaCategory::Documents, MAX_EVENT_DOCUMENTS, "documents"),
    ];
    for (category, max, label) in limits {
        if count(category) > max {
            return Err(format!("An event can have at most {max} {label}"));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EventSearchQuery {
    /// Case-insensitive substring of the title.
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RemoveFileRequest {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(mimetype: &str) -> EventFile {
        EventFile { url: format!("http://x/{}", Uuid::new_v4()), mimetype: mimetype.into() }
    }

    #[test]
    fn category_ceilings_apply_on_top_of_the_raw_cap() {
        let mut files: Vec<_> = (0..5).map(|_| file("image/png")).collect();
        assert!(check_event_files(&files).is_ok());
        files.push(file("image/jpeg"));
        assert_eq!(check_event_files(&files).unwrap_err(), "An event can have at most 5 images");

        let docs: Vec<_> = (0..3).map(|_| file("application/pdf")).collect();
        assert_eq!(check_event_files(&docs).unwrap_err(), "An event can have at most 2 documents");
    }

    #[test]
    fn more_than_ten_files_is_rejected() {
        let files: Vec<_> = (0..11).map(|_| file("text/plain")).collect();
        assert_eq!(check_event_files(&files).unwrap_err(), "An event can have at most 10 files");
    }
}
