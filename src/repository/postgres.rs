use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use super::{
    BranchRepository, CarouselFilter, CarouselRepository, CommitteeRepository, ContentRepository,
    EventRepository, GalleryRepository, Placement, RepoError, RepoResult, SettingRepository,
    StatsRepository, UserRepository,
};
use crate::models::{
    Attachment, Branch, Carousel, CarouselType, CommitteeMember, CommitteeRole, Content,
    ContentType, ContentUpsert, DashboardStats, Event, GalleryCategory, GalleryPost,
    IdentityProbe, MemberProfile, MembershipStatus, NewUser, Role, Setting, SettingUpsert, User,
    UserRecord,
};

/// Profile wire names paired with their column, in insert/update bind order.
const PROFILE_COLUMNS: [(&str, &str); 19] = [
    ("employeeId", "employee_id"),
    ("name", "name"),
    ("surname", "surname"),
    ("email", "email"),
    ("mobileNumber", "mobile_number"),
    ("phoneNumber", "phone_number"),
    ("dob", "dob"),
    ("province", "province"),
    ("district", "district"),
    ("municipality", "municipality"),
    ("wardNumber", "ward_number"),
    ("tole", "tole"),
    ("postAtRetirement", "post_at_retirement"),
    ("pensionLeaseNumber", "pension_lease_number"),
    ("office", "office"),
    ("serviceStartDate", "service_start_date"),
    ("retirementDate", "retirement_date"),
    ("fillUpDate", "fill_up_date"),
    ("place", "place"),
];

const USER_COLUMNS: &str = "id, employee_id, name, surname, email, mobile_number, phone_number, \
    dob, province, district, municipality, ward_number, tole, post_at_retirement, \
    pension_lease_number, office, service_start_date, retirement_date, fill_up_date, place, \
    password_hash, role, membership_status, membership_number, registration_number, profile_pic, \
    document, refresh_token, created_at, updated_at";

const COMMITTEE_COLUMNS: &str = "id, name, role, bio, committee_title, start_date, end_date, \
    profile_pic, user_id, created_at, updated_at";

const BRANCH_COLUMNS: &str = "id, name, slug, description, address, contact, working_hours, \
    services, unique_programs, team_members, hero_image, is_active, sort_order, created_by, \
    updated_by, created_at, updated_at";

const EVENT_COLUMNS: &str =
    "id, title, description, date, time, location, files, created_at, updated_at";

const GALLERY_COLUMNS: &str = "id, title, category, date, images, created_at, updated_at";

const CAROUSEL_COLUMNS: &str =
    "id, title, carousel_type, branch, images, is_active, sort_order, created_at, updated_at";

const CONTENT_COLUMNS: &str = "id, key, value, page, section, content_type, sort_order, \
    is_active, created_at, updated_at";

const SETTING_COLUMNS: &str = "id, key, value, description, created_at, updated_at";

/// Maps a named unique constraint to the wire field it protects.
fn field_for_constraint(constraint: &str) -> &'static str {
    match constraint {
        "users_employee_id_key" => "employeeId",
        "users_email_key" => "email",
        "users_mobile_number_key" => "mobileNumber",
        "users_membership_number_key" => "membershipNumber",
        "users_registration_number_key" => "registrationNumber",
        "branches_name_key" => "name",
        "branches_slug_key" => "slug",
        "events_title_key" => "title",
        "contents_key_key" | "settings_key_key" => "key",
        _ => "value",
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                let field = db_err.constraint().map(field_for_constraint).unwrap_or("value");
                return RepoError::Conflict(vec![field.to_string()]);
            }
        }
        tracing::error!(error = ?e, "database error");
        RepoError::Database(e.to_string())
    }
}

fn placement_value(placement: Placement) -> Option<i32> {
    match placement {
        Placement::Explicit(order) => Some(order),
        Placement::Append => None,
    }
}

// --- Row decoding ---

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let mut profile = MemberProfile::default();
    for (field, column) in PROFILE_COLUMNS {
        profile.set(field, row.try_get(column)?);
    }
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("membership_status")?;
    let document: Option<Json<Attachment>> = row.try_get("document")?;
    Ok(User {
        id: row.try_get("id")?,
        profile,
        role: Role::parse(&role).unwrap_or_default(),
        membership_status: MembershipStatus::parse(&status).unwrap_or_default(),
        membership_number: row.try_get("membership_number")?,
        registration_number: row.try_get("registration_number")?,
        profile_pic: row.try_get("profile_pic")?,
        document: document.map(|d| d.0),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn record_from_row(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
    Ok(UserRecord {
        user: user_from_row(row)?,
        password_hash: row.try_get("password_hash")?,
        refresh_token: row.try_get("refresh_token")?,
    })
}

fn committee_from_row(row: &PgRow) -> Result<CommitteeMember, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(CommitteeMember {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        role: CommitteeRole::parse(&role).unwrap_or(CommitteeRole::Member),
        bio: row.try_get("bio")?,
        committee_title: row.try_get("committee_title")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        profile_pic: row.try_get("profile_pic")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn branch_from_row(row: &PgRow) -> Result<Branch, sqlx::Error> {
    Ok(Branch {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        address: row.try_get("address")?,
        contact: row.try_get::<Json<_>, _>("contact")?.0,
        working_hours: row.try_get("working_hours")?,
        services: row.try_get::<Json<_>, _>("services")?.0,
        unique_programs: row.try_get::<Json<_>, _>("unique_programs")?.0,
        team_members: row.try_get::<Json<_>, _>("team_members")?.0,
        hero_image: row.try_get("hero_image")?,
        is_active: row.try_get("is_active")?,
        order: row.try_get("sort_order")?,
        created_by: row.try_get("created_by")?,
        updated_by: row.try_get("updated_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<Event, sqlx::Error> {
    Ok(Event {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        date: row.try_get("date")?,
        time: row.try_get("time")?,
        location: row.try_get("location")?,
        files: row.try_get::<Json<_>, _>("files")?.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn gallery_from_row(row: &PgRow) -> Result<GalleryPost, sqlx::Error> {
    let category: String = row.try_get("category")?;
    Ok(GalleryPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        category: GalleryCategory::parse(&category).unwrap_or_default(),
        date: row.try_get("date")?,
        images: row.try_get::<Json<_>, _>("images")?.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn carousel_from_row(row: &PgRow) -> Result<Carousel, sqlx::Error> {
    let carousel_type: String = row.try_get("carousel_type")?;
    Ok(Carousel {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        carousel_type: CarouselType::parse(&carousel_type).unwrap_or_default(),
        branch: row.try_get("branch")?,
        images: row.try_get::<Json<_>, _>("images")?.0,
        is_active: row.try_get("is_active")?,
        order: row.try_get("sort_order")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn content_from_row(row: &PgRow) -> Result<Content, sqlx::Error> {
    let content_type: String = row.try_get("content_type")?;
    Ok(Content {
        id: row.try_get("id")?,
        key: row.try_get("key")?,
        value: row.try_get("value")?,
        page: row.try_get("page")?,
        section: row.try_get("section")?,
        content_type: ContentType::parse(&content_type).unwrap_or_default(),
        order: row.try_get("sort_order")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn setting_from_row(row: &PgRow) -> Result<Setting, sqlx::Error> {
    Ok(Setting {
        id: row.try_get("id")?,
        key: row.try_get("key")?,
        value: row.try_get::<Json<serde_json::Value>, _>("value")?.0,
        description: row.try_get("description")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgresRepository
///
/// The persistence layer backed by PostgreSQL. Nested ordered lists live in JSONB columns so
/// each entity stays one row; uniqueness is enforced by named constraints.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users (id, employee_id, name, surname, email, mobile_number, \
             phone_number, dob, province, district, municipality, ward_number, tole, \
             post_at_retirement, pension_lease_number, office, service_start_date, \
             retirement_date, fill_up_date, place, password_hash, role, membership_status, \
             membership_number, registration_number, profile_pic, document) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27) \
             RETURNING {USER_COLUMNS}"
        );
        let mut query = sqlx::query(&sql).bind(Uuid::new_v4());
        for (field, _) in PROFILE_COLUMNS {
            query = query.bind(user.profile.get(field).unwrap_or_default());
        }
        let row = query
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.membership_status.as_str())
            .bind(&user.membership_number)
            .bind(&user.registration_number)
            .bind(&user.profile_pic)
            .bind(user.document.as_ref().map(Json))
            .fetch_one(&self.pool)
            .await?;
        Ok(user_from_row(&row)?)
    }

    async fn find_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn find_user_record(&self, id: Uuid) -> RepoResult<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    async fn find_user_record_by_email(&self, email: &str) -> RepoResult<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    async fn find_user_record_by_refresh_token(
        &self,
        token: &str,
    ) -> RepoResult<Option<UserRecord>> {
        let row =
            sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE refresh_token = $1"))
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.as_ref().map(record_from_row).transpose()?)
    }

    async fn find_user_by_employee_id(&self, employee_id: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE employee_id = $1"))
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn list_users(&self, status: Option<MembershipStatus>) -> RepoResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::text IS NULL OR membership_status = $1) \
             ORDER BY created_at DESC"
        ))
        .bind(status.map(MembershipStatus::as_str))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(user_from_row).collect::<Result<_, _>>()?)
    }

    async fn find_users_by_ids(&self, ids: &[Uuid]) -> RepoResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(user_from_row).collect::<Result<_, _>>()?)
    }

    async fn taken_identity_fields(&self, probe: &IdentityProbe) -> RepoResult<Vec<String>> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(bool_or(employee_id = $1), false) AS employee_id_taken,
                COALESCE(bool_or(email = $2), false) AS email_taken,
                COALESCE(bool_or(mobile_number = $3), false) AS mobile_number_taken
            FROM users
            WHERE ($4::uuid IS NULL OR id <> $4)
              AND (employee_id = $1 OR email = $2 OR mobile_number = $3)
            "#,
        )
        .bind(probe.employee_id.as_deref())
        .bind(probe.email.as_deref())
        .bind(probe.mobile_number.as_deref())
        .bind(probe.exclude_id)
        .fetch_one(&self.pool)
        .await?;

        let mut taken = Vec::new();
        for (column, field) in [
            ("employee_id_taken", "employeeId"),
            ("email_taken", "email"),
            ("mobile_number_taken", "mobileNumber"),
        ] {
            if row.try_get::<bool, _>(column)? {
                taken.push(field.to_string());
            }
        }
        Ok(taken)
    }

    async fn update_user(&self, user: &User) -> RepoResult<User> {
        let sql = format!(
            "UPDATE users SET employee_id = $2, name = $3, surname = $4, email = $5, \
             mobile_number = $6, phone_number = $7, dob = $8, province = $9, district = $10, \
             municipality = $11, ward_number = $12, tole = $13, post_at_retirement = $14, \
             pension_lease_number = $15, office = $16, service_start_date = $17, \
             retirement_date = $18, fill_up_date = $19, place = $20, role = $21, \
             membership_status = $22, profile_pic = $23, document = $24, updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let mut query = sqlx::query(&sql).bind(user.id);
        for (field, _) in PROFILE_COLUMNS {
            query = query.bind(user.profile.get(field).unwrap_or_default());
        }
        let row = query
            .bind(user.role.as_str())
            .bind(user.membership_status.as_str())
            .bind(&user.profile_pic)
            .bind(user.document.as_ref().map(Json))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepoError::NotFound("User".into()))?;
        Ok(user_from_row(&row)?)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> RepoResult<()> {
        let result = sqlx::query("UPDATE users SET refresh_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound("User".into()));
        }
        Ok(())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> RepoResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, refresh_token = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound("User".into()));
        }
        Ok(())
    }

    async fn transition_membership(
        &self,
        id: Uuid,
        from: MembershipStatus,
        to: MembershipStatus,
    ) -> RepoResult<Option<User>> {
        // Conditional update: a concurrent decision on the same member finds nothing to change.
        let row = sqlx::query(&format!(
            "UPDATE users SET membership_status = $3, updated_at = NOW() \
             WHERE id = $1 AND membership_status = $2 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn delete_user_if_status(
        &self,
        id: Uuid,
        status: MembershipStatus,
    ) -> RepoResult<Option<User>> {
        let row = sqlx::query(&format!(
            "DELETE FROM users WHERE id = $1 AND membership_status = $2 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }

    async fn delete_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query(&format!("DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(user_from_row).transpose()?)
    }
}

#[async_trait]
impl CommitteeRepository for PostgresRepository {
    async fn insert_committee_member(
        &self,
        member: &CommitteeMember,
    ) -> RepoResult<CommitteeMember> {
        let row = sqlx::query(&format!(
            "INSERT INTO committee_members ({COMMITTEE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {COMMITTEE_COLUMNS}"
        ))
        .bind(member.id)
        .bind(&member.name)
        .bind(member.role.as_str())
        .bind(&member.bio)
        .bind(&member.committee_title)
        .bind(&member.start_date)
        .bind(&member.end_date)
        .bind(&member.profile_pic)
        .bind(member.user_id)
        .bind(member.created_at)
        .bind(member.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(committee_from_row(&row)?)
    }

    async fn update_committee_member(
        &self,
        member: &CommitteeMember,
    ) -> RepoResult<CommitteeMember> {
        let row = sqlx::query(&format!(
            "UPDATE committee_members SET name = $2, role = $3, bio = $4, committee_title = $5, \
             start_date = $6, end_date = $7, profile_pic = $8, user_id = $9, updated_at = NOW() \
             WHERE id = $1 RETURNING {COMMITTEE_COLUMNS}"
        ))
        .bind(member.id)
        .bind(&member.name)
        .bind(member.role.as_str())
        .bind(&member.bio)
        .bind(&member.committee_title)
        .bind(&member.start_date)
        .bind(&member.end_date)
        .bind(&member.profile_pic)
        .bind(member.user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::NotFound("Committee member".into()))?;
        Ok(committee_from_row(&row)?)
    }

    async fn find_committee_member(&self, id: Uuid) -> RepoResult<Option<CommitteeMember>> {
        let row = sqlx::query(&format!(
            "SELECT {COMMITTEE_COLUMNS} FROM committee_members WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(committee_from_row).transpose()?)
    }

    async fn list_committee_members(
        &self,
        committee_title: Option<&str>,
    ) -> RepoResult<Vec<CommitteeMember>> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMITTEE_COLUMNS} FROM committee_members \
             WHERE ($1::text IS NULL OR committee_title = $1) \
             ORDER BY committee_title, created_at"
        ))
        .bind(committee_title)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(committee_from_row).collect::<Result<_, _>>()?)
    }

    async fn delete_committee_member(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM committee_members WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl BranchRepository for PostgresRepository {
    async fn insert_branch(&self, branch: &Branch, placement: Placement) -> RepoResult<Branch> {
        // The appended order is computed inside the INSERT, not in a separate read.
        let row = sqlx::query(&format!(
            "INSERT INTO branches ({BRANCH_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, \
             COALESCE($13, (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM branches)), \
             $14, $15, $16, $17) RETURNING {BRANCH_COLUMNS}"
        ))
        .bind(branch.id)
        .bind(&branch.name)
        .bind(&branch.slug)
        .bind(&branch.description)
        .bind(&branch.address)
        .bind(Json(&branch.contact))
        .bind(&branch.working_hours)
        .bind(Json(&branch.services))
        .bind(Json(&branch.unique_programs))
        .bind(Json(&branch.team_members))
        .bind(&branch.hero_image)
        .bind(branch.is_active)
        .bind(placement_value(placement))
        .bind(branch.created_by)
        .bind(branch.updated_by)
        .bind(branch.created_at)
        .bind(branch.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(branch_from_row(&row)?)
    }

    async fn update_branch(&self, branch: &Branch) -> RepoResult<Branch> {
        let row = sqlx::query(&format!(
            "UPDATE branches SET name = $2, slug = $3, description = $4, address = $5, \
             contact = $6, working_hours = $7, services = $8, unique_programs = $9, \
             team_members = $10, hero_image = $11, is_active = $12, sort_order = $13, \
             updated_by = $14, updated_at = NOW() WHERE id = $1 RETURNING {BRANCH_COLUMNS}"
        ))
        .bind(branch.id)
        .bind(&branch.name)
        .bind(&branch.slug)
        .bind(&branch.description)
        .bind(&branch.address)
        .bind(Json(&branch.contact))
        .bind(&branch.working_hours)
        .bind(Json(&branch.services))
        .bind(Json(&branch.unique_programs))
        .bind(Json(&branch.team_members))
        .bind(&branch.hero_image)
        .bind(branch.is_active)
        .bind(branch.order)
        .bind(branch.updated_by)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::NotFound("Branch".into()))?;
        Ok(branch_from_row(&row)?)
    }

    async fn find_branch(&self, id: Uuid) -> RepoResult<Option<Branch>> {
        let row = sqlx::query(&format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(branch_from_row).transpose()?)
    }

    async fn find_branch_by_slug(&self, slug: &str) -> RepoResult<Option<Branch>> {
        let row = sqlx::query(&format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(branch_from_row).transpose()?)
    }

    async fn list_branches(&self, active_only: bool) -> RepoResult<Vec<Branch>> {
        let rows = sqlx::query(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE (NOT $1 OR is_active) \
             ORDER BY sort_order, name"
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(branch_from_row).collect::<Result<_, _>>()?)
    }

    async fn delete_branch(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM branches WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl EventRepository for PostgresRepository {
    async fn insert_event(&self, event: &Event) -> RepoResult<Event> {
        let row = sqlx::query(&format!(
            "INSERT INTO events ({EVENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.date)
        .bind(&event.time)
        .bind(&event.location)
        .bind(Json(&event.files))
        .bind(event.created_at)
        .bind(event.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(event_from_row(&row)?)
    }

    async fn update_event(&self, event: &Event) -> RepoResult<Event> {
        let row = sqlx::query(&format!(
            "UPDATE events SET title = $2, description = $3, date = $4, time = $5, \
             location = $6, files = $7, updated_at = NOW() WHERE id = $1 \
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.date)
        .bind(&event.time)
        .bind(&event.location)
        .bind(Json(&event.files))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::NotFound("Event".into()))?;
        Ok(event_from_row(&row)?)
    }

    async fn find_event(&self, id: Uuid) -> RepoResult<Option<Event>> {
        let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(event_from_row).transpose()?)
    }

    async fn list_events(&self, title_contains: Option<&str>) -> RepoResult<Vec<Event>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE ($1::text IS NULL OR strpos(lower(title), lower($1)) > 0) \
             ORDER BY created_at DESC"
        ))
        .bind(title_contains)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(event_from_row).collect::<Result<_, _>>()?)
    }

    async fn delete_event(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl GalleryRepository for PostgresRepository {
    async fn insert_gallery_post(&self, post: &GalleryPost) -> RepoResult<GalleryPost> {
        let row = sqlx::query(&format!(
            "INSERT INTO gallery_posts ({GALLERY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {GALLERY_COLUMNS}"
        ))
        .bind(post.id)
        .bind(&post.title)
        .bind(post.category.as_str())
        .bind(&post.date)
        .bind(Json(&post.images))
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(gallery_from_row(&row)?)
    }

    async fn update_gallery_post(&self, post: &GalleryPost) -> RepoResult<GalleryPost> {
        let row = sqlx::query(&format!(
            "UPDATE gallery_posts SET title = $2, category = $3, date = $4, images = $5, \
             updated_at = NOW() WHERE id = $1 RETURNING {GALLERY_COLUMNS}"
        ))
        .bind(post.id)
        .bind(&post.title)
        .bind(post.category.as_str())
        .bind(&post.date)
        .bind(Json(&post.images))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::NotFound("Gallery post".into()))?;
        Ok(gallery_from_row(&row)?)
    }

    async fn find_gallery_post(&self, id: Uuid) -> RepoResult<Option<GalleryPost>> {
        let row = sqlx::query(&format!("SELECT {GALLERY_COLUMNS} FROM gallery_posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(gallery_from_row).transpose()?)
    }

    async fn list_gallery_posts(
        &self,
        category: Option<GalleryCategory>,
    ) -> RepoResult<Vec<GalleryPost>> {
        let rows = sqlx::query(&format!(
            "SELECT {GALLERY_COLUMNS} FROM gallery_posts \
             WHERE ($1::text IS NULL OR category = $1) ORDER BY created_at DESC"
        ))
        .bind(category.map(GalleryCategory::as_str))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(gallery_from_row).collect::<Result<_, _>>()?)
    }

    async fn delete_gallery_post(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM gallery_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CarouselRepository for PostgresRepository {
    async fn insert_carousel(
        &self,
        carousel: &Carousel,
        placement: Placement,
    ) -> RepoResult<Carousel> {
        let row = sqlx::query(&format!(
            "INSERT INTO carousels ({CAROUSEL_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, \
             COALESCE($7, (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM carousels \
                           WHERE carousel_type = $3 AND branch IS NOT DISTINCT FROM $4)), \
             $8, $9) RETURNING {CAROUSEL_COLUMNS}"
        ))
        .bind(carousel.id)
        .bind(&carousel.title)
        .bind(carousel.carousel_type.as_str())
        .bind(&carousel.branch)
        .bind(Json(&carousel.images))
        .bind(carousel.is_active)
        .bind(placement_value(placement))
        .bind(carousel.created_at)
        .bind(carousel.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(carousel_from_row(&row)?)
    }

    async fn update_carousel(&self, carousel: &Carousel) -> RepoResult<Carousel> {
        let row = sqlx::query(&format!(
            "UPDATE carousels SET title = $2, carousel_type = $3, branch = $4, images = $5, \
             is_active = $6, sort_order = $7, updated_at = NOW() WHERE id = $1 \
             RETURNING {CAROUSEL_COLUMNS}"
        ))
        .bind(carousel.id)
        .bind(&carousel.title)
        .bind(carousel.carousel_type.as_str())
        .bind(&carousel.branch)
        .bind(Json(&carousel.images))
        .bind(carousel.is_active)
        .bind(carousel.order)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepoError::NotFound("Carousel".into()))?;
        Ok(carousel_from_row(&row)?)
    }

    async fn find_carousel(&self, id: Uuid) -> RepoResult<Option<Carousel>> {
        let row = sqlx::query(&format!("SELECT {CAROUSEL_COLUMNS} FROM carousels WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(carousel_from_row).transpose()?)
    }

    async fn list_carousels(&self, filter: &CarouselFilter) -> RepoResult<Vec<Carousel>> {
        let rows = sqlx::query(&format!(
            "SELECT {CAROUSEL_COLUMNS} FROM carousels \
             WHERE ($1::text IS NULL OR carousel_type = $1) \
               AND ($2::text IS NULL OR branch = $2) \
               AND (NOT $3 OR is_active) \
             ORDER BY sort_order, created_at"
        ))
        .bind(filter.carousel_type.map(CarouselType::as_str))
        .bind(filter.branch.as_deref())
        .bind(filter.active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(carousel_from_row).collect::<Result<_, _>>()?)
    }

    async fn delete_carousel(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM carousels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ContentRepository for PostgresRepository {
    async fn upsert_content(&self, upsert: &ContentUpsert) -> RepoResult<Content> {
        let row = sqlx::query(&format!(
            "INSERT INTO contents (id, key, value, page, section, content_type, sort_order, is_active) \
             VALUES ($1, $2, $3, COALESCE($4, ''), COALESCE($5, ''), COALESCE($6, 'text'), \
                     COALESCE($7, 0), COALESCE($8, TRUE)) \
             ON CONFLICT (key) DO UPDATE SET \
                value = EXCLUDED.value, \
                page = COALESCE($4, contents.page), \
                section = COALESCE($5, contents.section), \
                content_type = COALESCE($6, contents.content_type), \
                sort_order = COALESCE($7, contents.sort_order), \
                is_active = COALESCE($8, contents.is_active), \
                updated_at = NOW() \
             RETURNING {CONTENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&upsert.key)
        .bind(&upsert.value)
        .bind(upsert.page.as_deref())
        .bind(upsert.section.as_deref())
        .bind(upsert.content_type.map(ContentType::as_str))
        .bind(upsert.order)
        .bind(upsert.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(content_from_row(&row)?)
    }

    async fn find_content(&self, key: &str) -> RepoResult<Option<Content>> {
        let row = sqlx::query(&format!("SELECT {CONTENT_COLUMNS} FROM contents WHERE key = $1"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(content_from_row).transpose()?)
    }

    async fn list_content(
        &self,
        page: Option<&str>,
        section: Option<&str>,
    ) -> RepoResult<Vec<Content>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM contents \
             WHERE is_active AND ($1::text IS NULL OR page = $1) \
               AND ($2::text IS NULL OR section = $2) \
             ORDER BY page, section, sort_order"
        ))
        .bind(page)
        .bind(section)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(content_from_row).collect::<Result<_, _>>()?)
    }

    async fn delete_content(&self, key: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM contents WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SettingRepository for PostgresRepository {
    async fn upsert_setting(&self, key: &str, upsert: &SettingUpsert) -> RepoResult<Setting> {
        let row = sqlx::query(&format!(
            "INSERT INTO settings (id, key, value, description) \
             VALUES ($1, $2, $3, COALESCE($4, '')) \
             ON CONFLICT (key) DO UPDATE SET \
                value = EXCLUDED.value, \
                description = COALESCE($4, settings.description), \
                updated_at = NOW() \
             RETURNING {SETTING_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(key)
        .bind(Json(&upsert.value))
        .bind(upsert.description.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(setting_from_row(&row)?)
    }

    async fn find_setting(&self, key: &str) -> RepoResult<Option<Setting>> {
        let row = sqlx::query(&format!("SELECT {SETTING_COLUMNS} FROM settings WHERE key = $1"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(setting_from_row).transpose()?)
    }

    async fn list_settings(&self) -> RepoResult<Vec<Setting>> {
        let rows = sqlx::query(&format!("SELECT {SETTING_COLUMNS} FROM settings ORDER BY key"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(setting_from_row).collect::<Result<_, _>>()?)
    }

    async fn delete_setting(&self, key: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl StatsRepository for PostgresRepository {
    /// Compiles every dashboard counter in a single round trip.
    async fn dashboard_stats(&self) -> RepoResult<DashboardStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE membership_status = 'pending') AS pending_members,
                (SELECT COUNT(*) FROM users WHERE membership_status = 'approved') AS approved_members,
                (SELECT COUNT(*) FROM events) AS events,
                (SELECT COUNT(*) FROM gallery_posts) AS gallery_posts,
                (SELECT COUNT(*) FROM branches) AS branches,
                (SELECT COUNT(*) FROM committee_members) AS committee_members
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(DashboardStats {
            pending_members: row.try_get("pending_members")?,
            approved_members: row.try_get("approved_members")?,
            events: row.try_get("events")?,
            gallery_posts: row.try_get("gallery_posts")?,
            branches: row.try_get("branches")?,
            committee_members: row.try_get("committee_members")?,
        })
    }
}
