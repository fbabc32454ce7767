use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::LinkedUser;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq)]
#[ts(export)]
pub enum CommitteeRole {
    Chairman,
    #[serde(rename = "Vice Chairman")]
    ViceChairman,
    Secretary,
    Treasurer,
    #[serde(rename = "Assistant Secretary")]
    AssistantSecretary,
    Member,
    Advisor,
}

impl CommitteeRole {
    pub const ALL: [CommitteeRole; 7] = [
        CommitteeRole::Chairman,
        CommitteeRole::ViceChairman,
        CommitteeRole::Secretary,
        CommitteeRole::Treasurer,
        CommitteeRole::AssistantSecretary,
        CommitteeRole::Member,
        CommitteeRole::Advisor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommitteeRole::Chairman => "Chairman",
            CommitteeRole::ViceChairman => "Vice Chairman",
            CommitteeRole::Secretary => "Secretary",
            CommitteeRole::Treasurer => "Treasurer",
            CommitteeRole::AssistantSecretary => "Assistant Secretary",
            CommitteeRole::Member => "Member",
            CommitteeRole::Advisor => "Advisor",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(raw))
    }

    /// Display precedence within one committee.
    pub fn rank(self) -> u8 {
        match self {
            CommitteeRole::Chairman => 0,
            CommitteeRole::ViceChairman => 1,
            CommitteeRole::Secretary => 2,
            CommitteeRole::AssistantSecretary => 3,
            CommitteeRole::Treasurer => 4,
            CommitteeRole::Member => 5,
            CommitteeRole::Advisor => 6,
        }
    }
}

/// CommitteeMember
///
/// One seat on a committee roster. `start_date`/`end_date` are free text (may be a local
/// calendar date or "Current"). `user_id` is a weak link used only to borrow display data.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommitteeMember {
    pub id: Uuid,
    pub name: String,
    pub role: CommitteeRole,
    pub bio: String,
    pub committee_title: String,
    pub start_date: String,
    pub end_date: String,
    /// Picture owned by this record. Deleted with it.
    pub profile_pic: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// CommitteeMemberView
///
/// Read model with the weak link resolved. The record's own name/photo win over the linked
/// member's.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommitteeMemberView {
    #[serde(flatten)]
    pub member: CommitteeMember,
    pub display_name: String,
    pub display_photo: Option<String>,
    pub linked_user: Option<LinkedUser>,
}

impl CommitteeMemberView {
    pub fn resolve(member: CommitteeMember, linked: Option<LinkedUser>) -> Self {
        let display_name = if member.name.trim().is_empty() {
            linked.as_ref().map(LinkedUser::full_name).unwrap_or_default()
        } else {
            member.name.clone()
        };
        let display_photo = member.profile_pic.clone().or_else(|| {
            linked
                .as_ref()
                .map(|u| u.profile_pic.clone())
                .filter(|p| !p.is_empty())
        });
        Self { member, display_name, display_photo, linked_user: linked }
    }
}

/// Orders a roster by committee title, then role precedence, then name.
pub fn sort_roster(views: &mut [CommitteeMemberView]) {
    views.sort_by(|a, b| {
        a.member
            .committee_title
            .cmp(&b.member.committee_title)
            .then(a.member.role.rank().cmp(&b.member.role.rank()))
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct CommitteeQuery {
    pub committee_title: Option<String>,
}
