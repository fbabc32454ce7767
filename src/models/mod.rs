//! Domain documents and request/response payloads.
//!
//! Every document carries an id and created/updated timestamps. JSON uses camelCase, the
//! shape both frontends consume; TypeScript bindings are exported with `ts-rs`.

pub mod branch;
pub mod carousel;
pub mod committee;
pub mod content;
pub mod event;
pub mod gallery;
pub mod setting;
pub mod user;

pub use branch::*;
pub use carousel::*;
pub use committee::*;
pub use content::*;
pub use event::*;
pub use gallery::*;
pub use setting::*;
pub use user::*;

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// LinkedUser
///
/// Display data borrowed from a member through a weak `userId` link. Never implies ownership.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LinkedUser {
    pub id: Uuid,
    pub name: String,
    pub surname: String,
    pub profile_pic: String,
}

impl From<&User> for LinkedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.profile.name.clone(),
            surname: user.profile.surname.clone(),
            profile_pic: user.profile_pic.clone(),
        }
    }
}

impl LinkedUser {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname).trim().to_string()
    }
}

/// DashboardStats
///
/// Output schema for the administrative dashboard (GET /dashboard/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardStats {
    pub pending_members: i64,
    pub approved_members: i64,
    pub events: i64,
    pub gallery_posts: i64,
    pub branches: i64,
    pub committee_members: i64,
}

/// Parses an optional boolean form/query value (`true`, `1`, `yes`, `on`).
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
