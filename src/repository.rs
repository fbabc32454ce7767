use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Branch, Carousel, CarouselType, CommitteeMember, Content, ContentUpsert, DashboardStats, Event,
    GalleryCategory, GalleryPost, IdentityProbe, MembershipStatus, NewUser, Setting, SettingUpsert,
    User, UserRecord,
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
///
/// Failure modes every backend reports the same way. `Conflict` names the wire fields whose
/// unique constraint was hit.
#[derive(Debug, Error, PartialEq)]
pub enum RepoError {
    #[error("duplicate value for: {}", .0.join(", "))]
    Conflict(Vec<String>),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Database(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Placement
///
/// How an advisory `order` value is assigned on insert: taken as given, or appended after the
/// current maximum of its scope within the same statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Explicit(i32),
    Append,
}

/// CarouselFilter
///
/// Listing filter. `active_only` is set for the public listing.
#[derive(Debug, Clone, Default)]
pub struct CarouselFilter {
    pub carousel_type: Option<CarouselType>,
    pub branch: Option<String>,
    pub active_only: bool,
}

// --- Member accounts ---

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a member. Fails with `Conflict` naming the field when any unique identity is
    /// already taken; the check and the insert are one atomic step.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn find_user_record(&self, id: Uuid) -> RepoResult<Option<UserRecord>>;
    async fn find_user_record_by_email(&self, email: &str) -> RepoResult<Option<UserRecord>>;
    async fn find_user_record_by_refresh_token(
        &self,
        token: &str,
    ) -> RepoResult<Option<UserRecord>>;
    async fn find_user_by_employee_id(&self, employee_id: &str) -> RepoResult<Option<User>>;
    /// Newest first.
    async fn list_users(&self, status: Option<MembershipStatus>) -> RepoResult<Vec<User>>;
    async fn find_users_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<User>>;
    /// Wire names of the identity fields in `probe` already used by another member.
    async fn taken_identity_fields(&self, probe: &IdentityProbe) -> RepoResult<Vec<String>>;
    /// Replaces the profile, role, status and file references of an existing member.
    async fn update_user(&self, user: &User) -> RepoResult<User>;
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> RepoResult<()>;
    /// Stores a new password hash and ends every session by clearing the refresh token.
    async fn set_password(&self, id: Uuid, password_hash: &str) -> RepoResult<()>;
    /// Moves a member from `from` to `to` only if it is currently in `from`. `None` when it was
    /// not (or does not exist).
    async fn transition_membership(
        &self,
        id: Uuid,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> RepoResult<Option<User>>;
    /// Deletes a member only if it currently has `status`, returning the removed record.
    async fn delete_user_if_status(
        &self,
        id: Uuid,
        status: MembershipStatus,
    ) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> RepoResult<Option<User>>;
}

// --- Publishing ---

#[async_trait]
pub trait CommitteeRepository: Send + Sync {
    async fn insert_committee_member(
        &self,
        member: &CommitteeMember,
    ) -> RepoResult<CommitteeMember>;
    async fn update_committee_member(
        &self,
        member: &CommitteeMember,
    ) -> RepoResult<CommitteeMember>;
    async fn find_committee_member(&self, id: Uuid) -> RepoResult<Option<CommitteeMember>>;
    async fn list_committee_members(
        &self,
        committee_title: Option<&str>,
    ) -> RepoResult<Vec<CommitteeMember>>;
    async fn delete_committee_member(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait BranchRepository: Send + Sync {
    async fn insert_branch(&self, branch: &Branch, placement: Placement) -> RepoResult<Branch>;
    async fn update_branch(&self, branch: &Branch) -> RepoResult<Branch>;
    async fn find_branch(&self, id: Uuid) -> RepoResult<Option<Branch>>;
    async fn find_branch_by_slug(&self, slug: &str) -> RepoResult<Option<Branch>>;
    /// Ordered by `order`, then name.
    async fn list_branches(&self, active_only: bool) -> RepoResult<Vec<Branch>>;
    async fn delete_branch(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn insert_event(&self, event: &Event) -> RepoResult<Event>;
    async fn update_event(&self, event: &Event) -> RepoResult<Event>;
    async fn find_event(&self, id: Uuid) -> RepoResult<Option<Event>>;
    /// Newest first, optionally filtered by a case-insensitive title substring.
    async fn list_events(&self, title_contains: Option<&str>) -> RepoResult<Vec<Event>>;
    async fn delete_event(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait GalleryRepository: Send + Sync {
    async fn insert_gallery_post(&self, post: &GalleryPost) -> RepoResult<GalleryPost>;
    async fn update_gallery_post(&self, post: &GalleryPost) -> RepoResult<GalleryPost>;
    async fn find_gallery_post(&self, id: Uuid) -> RepoResult<Option<GalleryPost>>;
    async fn list_gallery_posts(
        &self,
        category: Option<GalleryCategory>,
    ) -> RepoResult<Vec<GalleryPost>>;
    async fn delete_gallery_post(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait CarouselRepository: Send + Sync {
    /// With `Placement::Append` the order is one past the maximum within the same
    /// (type, branch) scope.
    async fn insert_carousel(
        &self,
        carousel: &Carousel,
        placement: Placement,
    ) -> RepoResult<Carousel>;
    async fn update_carousel(&self, carousel: &Carousel) -> RepoResult<Carousel>;
    async fn find_carousel(&self, id: Uuid) -> RepoResult<Option<Carousel>>;
    /// Ordered by `order`, then creation time.
    async fn list_carousels(&self, filter: &CarouselFilter) -> RepoResult<Vec<Carousel>>;
    async fn delete_carousel(&self, id: Uuid) -> RepoResult<bool>;
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Inserts or replaces the row for `upsert.key` (already normalised).
    async fn upsert_content(&self, upsert: &ContentUpsert) -> RepoResult<Content>;
    async fn find_content(&self, key: &str) -> RepoResult<Option<Content>>;
    /// Active rows ordered by page, section, order.
    async fn list_content(
        &self,
        page: Option<&str>,
        section: Option<&str>,
    ) -> RepoResult<Vec<Content>>;
    async fn delete_content(&self, key: &str) -> RepoResult<bool>;
}

#[async_trait]
pub trait SettingRepository: Send + Sync {
    async fn upsert_setting(&self, key: &str, upsert: &SettingUpsert) -> RepoResult<Setting>;
    async fn find_setting(&self, key: &str) -> RepoResult<Option<Setting>>;
    async fn list_settings(&self) -> RepoResult<Vec<Setting>>;
    async fn delete_setting(&self, key: &str) -> RepoResult<bool>;
}

#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn dashboard_stats(&self) -> RepoResult<DashboardStats>;
}

/// Repository
///
/// Everything the handlers need from persistence. Implemented automatically for any type
/// that implements every entity trait, so backends only implement the parts.
pub trait Repository:
    UserRepository
    + CommitteeRepository
    + BranchRepository
    + EventRepository
    + GalleryRepository
    + CarouselRepository
    + ContentRepository
    + SettingRepository
    + StatsRepository
{
}

impl<T> Repository for T where
    T: UserRepository
        + CommitteeRepository
        + BranchRepository
        + EventRepository
        + GalleryRepository
        + CarouselRepository
        + ContentRepository
        + SettingRepository
        + StatsRepository
{
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
