use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    BranchRepository, CarouselFilter, CarouselRepository, CommitteeRepository, ContentRepository,
    EventRepository, GalleryRepository, Placement, RepoError, RepoResult, SettingRepository,
    StatsRepository, UserRepository,
};
use crate::models::{
    Branch, Carousel, CommitteeMember, Content, ContentUpsert, DashboardStats, Event,
    GalleryCategory, GalleryPost, IdentityProbe, MembershipStatus, NewUser, Setting,
    SettingUpsert, User, UserRecord,
};

#[derive(Default)]
struct Store {
    users: Vec<UserRecord>,
    committee: Vec<CommitteeMember>,
    branches: Vec<Branch>,
    events: Vec<Event>,
    gallery: Vec<GalleryPost>,
    carousels: Vec<Carousel>,
    contents: Vec<Content>,
    settings: Vec<Setting>,
}

/// InMemoryRepository
///
/// A process-local implementation of every repository trait. Backs the test-suite and the
/// `DATABASE_URL=memory` development mode. Unique checks run under the same write lock as the
/// mutation they guard.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Unique fields of `candidate` already held by a different user.
fn user_conflicts(users: &[UserRecord], candidate: &User) -> Vec<String> {
    let others: Vec<&User> = users
        .iter()
        .map(|r| &r.user)
        .filter(|u| u.id != candidate.id)
        .collect();
    let checks: [(&str, fn(&User) -> &str); 5] = [
        ("employeeId", |u| u.profile.employee_id.as_str()),
        ("email", |u| u.profile.email.as_str()),
        ("mobileNumber", |u| u.profile.mobile_number.as_str()),
        ("membershipNumber", |u| u.membership_number.as_str()),
        ("registrationNumber", |u| u.registration_number.as_str()),
    ];
    checks
        .into_iter()
        .filter(|(_, get)| others.iter().any(|u| get(u) == get(candidate)))
        .map(|(field, _)| field.to_string())
        .collect()
}

fn branch_conflicts(branches: &[Branch], candidate: &Branch) -> Vec<String> {
    let mut fields = Vec::new();
    let others = || branches.iter().filter(|b| b.id != candidate.id);
    if others().any(|b| b.name == candidate.name) {
        fields.push("name".to_string());
    }
    if others().any(|b| b.slug == candidate.slug) {
        fields.push("slug".to_string());
    }
    fields
}

fn next_order(orders: impl Iterator<Item = i32>) -> i32 {
    orders.max().unwrap_or(0) + 1
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            profile: new.profile,
            role: new.role,
            membership_status: new.membership_status,
            membership_number: new.membership_number,
            registration_number: new.registration_number,
            profile_pic: new.profile_pic,
            document: new.document,
            created_at: now,
            updated_at: now,
        };
        let conflicts = user_conflicts(&store.users, &user);
        if !conflicts.is_empty() {
            return Err(RepoError::Conflict(conflicts));
        }
        store.users.push(UserRecord {
            user: user.clone(),
            password_hash: new.password_hash,
            refresh_token: None,
        });
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|r| r.user.id == id).map(|r| r.user.clone()))
    }

    async fn find_user_record(&self, id: Uuid) -> RepoResult<Option<UserRecord>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|r| r.user.id == id).cloned())
    }

    async fn find_user_record_by_email(&self, email: &str) -> RepoResult<Option<UserRecord>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|r| r.user.profile.email == email).cloned())
    }

    async fn find_user_record_by_refresh_token(
        &self,
        token: &str,
    ) -> RepoResult<Option<UserRecord>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .iter()
            .find(|r| r.refresh_token.as_deref() == Some(token))
            .cloned())
    }

    async fn find_user_by_employee_id(&self, employee_id: &str) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .iter()
            .find(|r| r.user.profile.employee_id == employee_id)
            .map(|r| r.user.clone()))
    }

    async fn list_users(&self, status: Option<MembershipStatus>) -> RepoResult<Vec<User>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .iter()
            .rev()
            .filter(|r| status.is_none_or(|s| r.user.membership_status == s))
            .map(|r| r.user.clone())
            .collect())
    }

    async fn find_users_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .iter()
            .filter(|r| ids.contains(&r.user.id))
            .map(|r| r.user.clone())
            .collect())
    }

    async fn taken_identity_fields(&self, probe: &IdentityProbe) -> RepoResult<Vec<String>> {
        let store = self.store.read().await;
        let others: Vec<&User> = store
            .users
            .iter()
            .map(|r| &r.user)
            .filter(|u| Some(u.id) != probe.exclude_id)
            .collect();
        let checks: [(&str, Option<&String>, fn(&User) -> &str); 3] = [
            ("employeeId", probe.employee_id.as_ref(), |u| u.profile.employee_id.as_str()),
            ("email", probe.email.as_ref(), |u| u.profile.email.as_str()),
            ("mobileNumber", probe.mobile_number.as_ref(), |u| u.profile.mobile_number.as_str()),
        ];
        Ok(checks
            .into_iter()
            .filter_map(|(field, value, get)| {
                let value = value?;
                others.iter().any(|u| get(u) == value).then(|| field.to_string())
            })
            .collect())
    }

    async fn update_user(&self, user: &User) -> RepoResult<User> {
        let mut store = self.store.write().await;
        let conflicts = user_conflicts(&store.users, user);
        if !conflicts.is_empty() {
            return Err(RepoError::Conflict(conflicts));
        }
        let record = store
            .users
            .iter_mut()
            .find(|r| r.user.id == user.id)
            .ok_or_else(|| RepoError::NotFound("User".into()))?;
        record.user = User {
            created_at: record.user.created_at,
            updated_at: Utc::now(),
            // Issued numbers never change through an update.
            membership_number: record.user.membership_number.clone(),
            registration_number: record.user.registration_number.clone(),
            ..user.clone()
        };
        Ok(record.user.clone())
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> RepoResult<()> {
        let mut store = self.store.write().await;
        let record = store
            .users
            .iter_mut()
            .find(|r| r.user.id == id)
            .ok_or_else(|| RepoError::NotFound("User".into()))?;
        record.refresh_token = token.map(str::to_string);
        Ok(())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> RepoResult<()> {
        let mut store = self.store.write().await;
        let record = store
            .users
            .iter_mut()
            .find(|r| r.user.id == id)
            .ok_or_else(|| RepoError::NotFound("User".into()))?;
        record.password_hash = password_hash.to_string();
        record.refresh_token = None;
        record.user.updated_at = Utc::now();
        Ok(())
    }

    async fn transition_membership(
        &self,
        id: Uuid,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        let Some(record) = store
            .users
            .iter_mut()
            .find(|r| r.user.id == id && r.user.membership_status == from)
        else {
            return Ok(None);
        };
        record.user.membership_status = to;
        record.user.updated_at = Utc::now();
        Ok(Some(record.user.clone()))
    }

    async fn delete_user_if_status(
        &self,
        id: Uuid,
        status: MembershipStatus,
    ) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        let Some(pos) = store
            .users
            .iter()
            .position(|r| r.user.id == id && r.user.membership_status == status)
        else {
            return Ok(None);
        };
        Ok(Some(store.users.remove(pos).user))
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        let Some(pos) = store.users.iter().position(|r| r.user.id == id) else {
            return Ok(None);
        };
        Ok(Some(store.users.remove(pos).user))
    }
}

#[async_trait]
impl CommitteeRepository for InMemoryRepository {
    async fn insert_committee_member(
        &self,
        member: &CommitteeMember,
    ) -> RepoResult<CommitteeMember> {
        let mut store = self.store.write().await;
        store.committee.push(member.clone());
        Ok(member.clone())
    }

    async fn update_committee_member(
        &self,
        member: &CommitteeMember,
    ) -> RepoResult<CommitteeMember> {
        let mut store = self.store.write().await;
        let slot = store
            .committee
            .iter_mut()
            .find(|m| m.id == member.id)
            .ok_or_else(|| RepoError::NotFound("Committee member".into()))?;
        *slot = CommitteeMember {
            created_at: slot.created_at,
            updated_at: Utc::now(),
            ..member.clone()
        };
        Ok(slot.clone())
    }

    async fn find_committee_member(&self, id: Uuid) -> RepoResult<Option<CommitteeMember>> {
        let store = self.store.read().await;
        Ok(store.committee.iter().find(|m| m.id == id).cloned())
    }

    async fn list_committee_members(
        &self,
        committee_title: Option<&str>,
    ) -> RepoResult<Vec<CommitteeMember>> {
        let store = self.store.read().await;
        let mut members: Vec<_> = store
            .committee
            .iter()
            .filter(|m| committee_title.is_none_or(|t| m.committee_title == t))
            .cloned()
            .collect();
        members.sort_by(|a, b| {
            a.committee_title.cmp(&b.committee_title).then(a.created_at.cmp(&b.created_at))
        });
        Ok(members)
    }

    async fn delete_committee_member(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.committee.len();
        store.committee.retain(|m| m.id != id);
        Ok(store.committee.len() < before)
    }
}

#[async_trait]
impl BranchRepository for InMemoryRepository {
    async fn insert_branch(&self, branch: &Branch, placement: Placement) -> RepoResult<Branch> {
        let mut store = self.store.write().await;
        let conflicts = branch_conflicts(&store.branches, branch);
        if !conflicts.is_empty() {
            return Err(RepoError::Conflict(conflicts));
        }
        let order = match placement {
            Placement::Explicit(order) => order,
            Placement::Append => next_order(store.branches.iter().map(|b| b.order)),
        };
        let stored = Branch { order, ..branch.clone() };
        store.branches.push(stored.clone());
        Ok(stored)
    }

    async fn update_branch(&self, branch: &Branch) -> RepoResult<Branch> {
        let mut store = self.store.write().await;
        let conflicts = branch_conflicts(&store.branches, branch);
        if !conflicts.is_empty() {
            return Err(RepoError::Conflict(conflicts));
        }
        let slot = store
            .branches
            .iter_mut()
            .find(|b| b.id == branch.id)
            .ok_or_else(|| RepoError::NotFound("Branch".into()))?;
        *slot = Branch {
            created_at: slot.created_at,
            created_by: slot.created_by,
            updated_at: Utc::now(),
            ..branch.clone()
        };
        Ok(slot.clone())
    }

    async fn find_branch(&self, id: Uuid) -> RepoResult<Option<Branch>> {
        let store = self.store.read().await;
        Ok(store.branches.iter().find(|b| b.id == id).cloned())
    }

    async fn find_branch_by_slug(&self, slug: &str) -> RepoResult<Option<Branch>> {
        let store = self.store.read().await;
        Ok(store.branches.iter().find(|b| b.slug == slug).cloned())
    }

    async fn list_branches(&self, active_only: bool) -> RepoResult<Vec<Branch>> {
        let store = self.store.read().await;
        let mut branches: Vec<_> = store
            .branches
            .iter()
            .filter(|b| !active_only || b.is_active)
            .cloned()
            .collect();
        branches.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        Ok(branches)
    }

    async fn delete_branch(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.branches.len();
        store.branches.retain(|b| b.id != id);
        Ok(store.branches.len() < before)
    }
}

#[async_trait]
impl EventRepository for InMemoryRepository {
    async fn insert_event(&self, event: &Event) -> RepoResult<Event> {
        let mut store = self.store.write().await;
        if store.events.iter().any(|e| e.title == event.title) {
            return Err(RepoError::Conflict(vec!["title".into()]));
        }
        store.events.push(event.clone());
        Ok(event.clone())
    }

    async fn update_event(&self, event: &Event) -> RepoResult<Event> {
        let mut store = self.store.write().await;
        if store.events.iter().any(|e| e.id != event.id && e.title == event.title) {
            return Err(RepoError::Conflict(vec!["title".into()]));
        }
        let slot = store
            .events
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or_else(|| RepoError::NotFound("Event".into()))?;
        *slot = Event { created_at: slot.created_at, updated_at: Utc::now(), ..event.clone() };
        Ok(slot.clone())
    }

    async fn find_event(&self, id: Uuid) -> RepoResult<Option<Event>> {
        let store = self.store.read().await;
        Ok(store.events.iter().find(|e| e.id == id).cloned())
    }

    async fn list_events(&self, title_contains: Option<&str>) -> RepoResult<Vec<Event>> {
        let store = self.store.read().await;
        let needle = title_contains.map(str::to_lowercase);
        Ok(store
            .events
            .iter()
            .rev()
            .filter(|e| needle.as_deref().is_none_or(|n| e.title.to_lowercase().contains(n)))
            .cloned()
            .collect())
    }

    async fn delete_event(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.events.len();
        store.events.retain(|e| e.id != id);
        Ok(store.events.len() < before)
    }
}

#[async_trait]
impl GalleryRepository for InMemoryRepository {
    async fn insert_gallery_post(&self, post: &GalleryPost) -> RepoResult<GalleryPost> {
        let mut store = self.store.write().await;
        store.gallery.push(post.clone());
        Ok(post.clone())
    }

    async fn update_gallery_post(&self, post: &GalleryPost) -> RepoResult<GalleryPost> {
        let mut store = self.store.write().await;
        let slot = store
            .gallery
            .iter_mut()
            .find(|p| p.id == post.id)
            .ok_or_else(|| RepoError::NotFound("Gallery post".into()))?;
        *slot = GalleryPost { created_at: slot.created_at, updated_at: Utc::now(), ..post.clone() };
        Ok(slot.clone())
    }

    async fn find_gallery_post(&self, id: Uuid) -> RepoResult<Option<GalleryPost>> {
        let store = self.store.read().await;
        Ok(store.gallery.iter().find(|p| p.id == id).cloned())
    }

    async fn list_gallery_posts(
        &self,
        category: Option<GalleryCategory>,
    ) -> RepoResult<Vec<GalleryPost>> {
        let store = self.store.read().await;
        Ok(store
            .gallery
            .iter()
            .rev()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .cloned()
            .collect())
    }

    async fn delete_gallery_post(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.gallery.len();
        store.gallery.retain(|p| p.id != id);
        Ok(store.gallery.len() < before)
    }
}

#[async_trait]
impl CarouselRepository for InMemoryRepository {
    async fn insert_carousel(
        &self,
        carousel: &Carousel,
        placement: Placement,
    ) -> RepoResult<Carousel> {
        let mut store = self.store.write().await;
        let order = match placement {
            Placement::Explicit(order) => order,
            Placement::Append => next_order(
                store
                    .carousels
                    .iter()
                    .filter(|c| {
                        c.carousel_type == carousel.carousel_type && c.branch == carousel.branch
                    })
                    .map(|c| c.order),
            ),
        };
        let stored = Carousel { order, ..carousel.clone() };
        store.carousels.push(stored.clone());
        Ok(stored)
    }

    async fn update_carousel(&self, carousel: &Carousel) -> RepoResult<Carousel> {
        let mut store = self.store.write().await;
        let slot = store
            .carousels
            .iter_mut()
            .find(|c| c.id == carousel.id)
            .ok_or_else(|| RepoError::NotFound("Carousel".into()))?;
        *slot = Carousel {
            created_at: slot.created_at,
            updated_at: Utc::now(),
            ..carousel.clone()
        };
        Ok(slot.clone())
    }

    async fn find_carousel(&self, id: Uuid) -> RepoResult<Option<Carousel>> {
        let store = self.store.read().await;
        Ok(store.carousels.iter().find(|c| c.id == id).cloned())
    }

    async fn list_carousels(&self, filter: &CarouselFilter) -> RepoResult<Vec<Carousel>> {
        let store = self.store.read().await;
        let mut carousels: Vec<_> = store
            .carousels
            .iter()
            .filter(|c| filter.carousel_type.is_none_or(|t| c.carousel_type == t))
            .filter(|c| filter.branch.is_none() || c.branch == filter.branch)
            .filter(|c| !filter.active_only || c.is_active)
            .cloned()
            .collect();
        carousels.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        Ok(carousels)
    }

    async fn delete_carousel(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.carousels.len();
        store.carousels.retain(|c| c.id != id);
        Ok(store.carousels.len() < before)
    }
}

#[async_trait]
impl ContentRepository for InMemoryRepository {
    async fn upsert_content(&self, upsert: &ContentUpsert) -> RepoResult<Content> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        if let Some(row) = store.contents.iter_mut().find(|c| c.key == upsert.key) {
            row.value = upsert.value.clone();
            if let Some(page) = &upsert.page {
                row.page = page.clone();
            }
            if let Some(section) = &upsert.section {
                row.section = section.clone();
            }
            if let Some(content_type) = upsert.content_type {
                row.content_type = content_type;
            }
            if let Some(order) = upsert.order {
                row.order = order;
            }
            if let Some(is_active) = upsert.is_active {
                row.is_active = is_active;
            }
            row.updated_at = now;
            return Ok(row.clone());
        }
        let row = Content {
            id: Uuid::new_v4(),
            key: upsert.key.clone(),
            value: upsert.value.clone(),
            page: upsert.page.clone().unwrap_or_default(),
            section: upsert.section.clone().unwrap_or_default(),
            content_type: upsert.content_type.unwrap_or_default(),
            order: upsert.order.unwrap_or(0),
            is_active: upsert.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        store.contents.push(row.clone());
        Ok(row)
    }

    async fn find_content(&self, key: &str) -> RepoResult<Option<Content>> {
        let store = self.store.read().await;
        Ok(store.contents.iter().find(|c| c.key == key).cloned())
    }

    async fn list_content(
        &self,
        page: Option<&str>,
        section: Option<&str>,
    ) -> RepoResult<Vec<Content>> {
        let store = self.store.read().await;
        let mut rows: Vec<_> = store
            .contents
            .iter()
            .filter(|c| c.is_active)
            .filter(|c| page.is_none_or(|p| c.page == p))
            .filter(|c| section.is_none_or(|s| c.section == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.page.as_str(), a.section.as_str(), a.order)
                .cmp(&(b.page.as_str(), b.section.as_str(), b.order))
        });
        Ok(rows)
    }

    async fn delete_content(&self, key: &str) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.contents.len();
        store.contents.retain(|c| c.key != key);
        Ok(store.contents.len() < before)
    }
}

#[async_trait]
impl SettingRepository for InMemoryRepository {
    async fn upsert_setting(&self, key: &str, upsert: &SettingUpsert) -> RepoResult<Setting> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        if let Some(row) = store.settings.iter_mut().find(|s| s.key == key) {
            row.value = upsert.value.clone();
            if let Some(description) = &upsert.description {
                row.description = description.clone();
            }
            row.updated_at = now;
            return Ok(row.clone());
        }
        let row = Setting {
            id: Uuid::new_v4(),
            key: key.to_string(),
            value: upsert.value.clone(),
            description: upsert.description.clone().unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        store.settings.push(row.clone());
        Ok(row)
    }

    async fn find_setting(&self, key: &str) -> RepoResult<Option<Setting>> {
        let store = self.store.read().await;
        Ok(store.settings.iter().find(|s| s.key == key).cloned())
    }

    async fn list_settings(&self) -> RepoResult<Vec<Setting>> {
        let store = self.store.read().await;
        let mut rows = store.settings.clone();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    async fn delete_setting(&self, key: &str) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.settings.len();
        store.settings.retain(|s| s.key != key);
        Ok(store.settings.len() < before)
    }
}

#[async_trait]
impl StatsRepository for InMemoryRepository {
    async fn dashboard_stats(&self) -> RepoResult<DashboardStats> {
        let store = self.store.read().await;
        let count_status = |status: MembershipStatus| {
            store.users.iter().filter(|r| r.user.membership_status == status).count() as i64
        };
        Ok(DashboardStats {
            pending_members: count_status(MembershipStatus::Pending),
            approved_members: count_status(MembershipStatus::Approved),
            events: store.events.len() as i64,
            gallery_posts: store.gallery.len() as i64,
            branches: store.branches.len() as i64,
            committee_members: store.committee.len() as i64,
        })
    }
}
