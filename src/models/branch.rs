use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::LinkedUser;

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct BranchContact {
    pub phone: String,
    pub mobile: String,
    pub email: String,
    pub contact_person: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct BranchService {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct UniqueProgram {
    pub title: String,
    pub description: String,
    pub schedule: String,
}

/// TeamMember
///
/// A branch staff entry. May link to a member (weak reference) to borrow name/photo; its own
/// values override the linked ones.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct TeamMember {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub position: String,
    pub experience: String,
    /// Own photo, or a URL borrowed for display only.
    pub profile_pic: Option<String>,
    /// Set when `profile_pic` was uploaded by this branch. Only such photos are deleted with it.
    pub photo_owned: bool,
}

/// Branch
///
/// A branch office page. `slug` is derived from `name` once and never silently disambiguated.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Branch {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub address: String,
    pub contact: BranchContact,
    pub working_hours: String,
    pub services: Vec<BranchService>,
    pub unique_programs: Vec<UniqueProgram>,
    pub team_members: Vec<TeamMember>,
    pub hero_image: Option<String>,
    pub is_active: bool,
    pub order: i32,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Branch {
    /// Files owned by this branch: hero image plus the team photos it uploaded itself.
    pub fn owned_files(&self) -> Vec<String> {
        self.hero_image
            .iter()
            .cloned()
            .chain(self.owned_team_photos())
            .collect()
    }

    pub fn owned_team_photos(&self) -> impl Iterator<Item = String> + '_ {
        self.team_members
            .iter()
            .filter(|m| m.photo_owned)
            .filter_map(|m| m.profile_pic.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TeamMemberView {
    #[serde(flatten)]
    pub member: TeamMember,
    pub display_name: String,
    pub display_photo: Option<String>,
    pub linked_user: Option<LinkedUser>,
}

impl TeamMemberView {
    pub fn resolve(member: TeamMember, linked: Option<LinkedUser>) -> Self {
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

/// BranchView
///
/// Read model: the stored branch plus its team with weak links resolved.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BranchView {
    #[serde(flatten)]
    pub branch: Branch,
    pub team: Vec<TeamMemberView>,
}

/// TeamMemberInput
///
/// Wire form of a team member on create/update. `photo_index` points into the ordered
/// `teamMemberPhotos` upload list; `profile_pic` keeps an already stored photo.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamMemberInput {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub position: String,
    pub experience: String,
    pub profile_pic: Option<String>,
    pub photo_index: Option<usize>,
}

#[derive(Debug, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct BranchStatusRequest {
    pub is_active: Option<bool>,
}

/// slugify
///
/// Lowercases and strips every non-alphanumeric character: "Pokhara Branch!!" becomes
/// "pokharabranch".
pub fn slugify(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_strips_everything_but_ascii_alphanumerics() {
        assert_eq!(slugify("Pokhara Branch!!"), "pokharabranch");
        assert_eq!(slugify("  Butwal-2 "), "butwal2");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn team_member_borrows_only_missing_values() {
        let linked = LinkedUser {
            id: Uuid::new_v4(),
            name: "Gita".into(),
            surname: "KC".into(),
            profile_pic: String::new(),
        };
        let view = TeamMemberView::resolve(
            TeamMember {
                user_id: Some(linked.id),
                position: "Coordinator".into(),
                ..Default::default()
            },
            Some(linked),
        );
        assert_eq!(view.display_name, "Gita KC");
        assert_eq!(view.display_photo, None);
    }

    #[test]
    fn only_uploaded_team_photos_are_owned() {
        let now = Utc::now();
        let branch = Branch {
            id: Uuid::new_v4(),
            name: "Butwal".into(),
            slug: "butwal".into(),
            description: String::new(),
            address: String::new(),
            contact: BranchContact::default(),
            working_hours: String::new(),
            services: Vec::new(),
            unique_programs: Vec::new(),
            team_members: vec![
                TeamMember {
                    profile_pic: Some("branches/butwal/Images/a.png".into()),
                    photo_owned: true,
                    ..Default::default()
                },
                TeamMember { profile_pic: Some("users/Images/b.png".into()), ..Default::default() },
            ],
            hero_image: Some("branches/butwal/Images/hero.png".into()),
            is_active: true,
            order: 1,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(
            branch.owned_files(),
            vec!["branches/butwal/Images/hero.png", "branches/butwal/Images/a.png"]
        );
    }
}
