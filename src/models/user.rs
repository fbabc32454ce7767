use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Role
///
/// RBAC field. `admin` unlocks every mutation endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// MembershipStatus
///
/// `pending -[approve]-> approved`; `pending -[decline]-> deleted`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MembershipStatus {
    #[default]
    Pending,
    Approved,
}

impl MembershipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Approved => "approved",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(MembershipStatus::Pending),
            "approved" => Some(MembershipStatus::Approved),
            _ => None,
        }
    }
}

/// MemberProfile
///
/// The identity, address and employment fields a member fills in. Dates are opaque strings:
/// members commonly enter them in the local calendar.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct MemberProfile {
    pub employee_id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub mobile_number: String,
    pub phone_number: String,
    pub dob: String,
    pub province: String,
    pub district: String,
    pub municipality: String,
    pub ward_number: String,
    pub tole: String,
    pub post_at_retirement: String,
    pub pension_lease_number: String,
    pub office: String,
    pub service_start_date: String,
    pub retirement_date: String,
    pub fill_up_date: String,
    pub place: String,
}

/// Every profile field by its wire name.
pub const PROFILE_FIELDS: &[&str] = &[
    "employeeId",
    "name",
    "surname",
    "email",
    "mobileNumber",
    "phoneNumber",
    "dob",
    "province",
    "district",
    "municipality",
    "wardNumber",
    "tole",
    "postAtRetirement",
    "pensionLeaseNumber",
    "office",
    "serviceStartDate",
    "retirementDate",
    "fillUpDate",
    "place",
];

/// Fields a member record cannot be saved without.
pub const REQUIRED_MEMBER_FIELDS: &[&str] = &[
    "employeeId",
    "name",
    "surname",
    "email",
    "mobileNumber",
    "dob",
    "province",
    "district",
    "municipality",
    "wardNumber",
    "postAtRetirement",
    "pensionLeaseNumber",
    "office",
    "serviceStartDate",
    "retirementDate",
    "fillUpDate",
    "place",
];

/// Fields that identify a member and must stay unique across users.
pub const IDENTITY_FIELDS: &[&str] = &["employeeId", "email", "mobileNumber"];

impl MemberProfile {
    pub fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "employeeId" => &self.employee_id,
            "name" => &self.name,
            "surname" => &self.surname,
            "email" => &self.email,
            "mobileNumber" => &self.mobile_number,
            "phoneNumber" => &self.phone_number,
            "dob" => &self.dob,
            "province" => &self.province,
            "district" => &self.district,
            "municipality" => &self.municipality,
            "wardNumber" => &self.ward_number,
            "tole" => &self.tole,
            "postAtRetirement" => &self.post_at_retirement,
            "pensionLeaseNumber" => &self.pension_lease_number,
            "office" => &self.office,
            "serviceStartDate" => &self.service_start_date,
            "retirementDate" => &self.retirement_date,
            "fillUpDate" => &self.fill_up_date,
            "place" => &self.place,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Sets a field by wire name. Returns false for unknown names.
    pub fn set(&mut self, field: &str, value: String) -> bool {
        let slot = match field {
            "employeeId" => &mut self.employee_id,
            "name" => &mut self.name,
            "surname" => &mut self.surname,
            "email" => &mut self.email,
            "mobileNumber" => &mut self.mobile_number,
            "phoneNumber" => &mut self.phone_number,
            "dob" => &mut self.dob,
            "province" => &mut self.province,
            "district" => &mut self.district,
            "municipality" => &mut self.municipality,
            "wardNumber" => &mut self.ward_number,
            "tole" => &mut self.tole,
            "postAtRetirement" => &mut self.post_at_retirement,
            "pensionLeaseNumber" => &mut self.pension_lease_number,
            "office" => &mut self.office,
            "serviceStartDate" => &mut self.service_start_date,
            "retirementDate" => &mut self.retirement_date,
            "fillUpDate" => &mut self.fill_up_date,
            "place" => &mut self.place,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Trims every field and lowercases the email.
    pub fn normalize(&mut self) {
        for field in PROFILE_FIELDS {
            let value = self.get(field).unwrap_or_default().trim().to_string();
            self.set(field, value);
        }
        self.email = self.email.to_lowercase();
    }

    /// Names of required fields that are empty, in declaration order.
    pub fn missing_fields(&self) -> Vec<String> {
        REQUIRED_MEMBER_FIELDS
            .iter()
            .filter(|field| self.get(field).is_none_or(|v| v.trim().is_empty()))
            .map(|field| field.to_string())
            .collect()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname).trim().to_string()
    }
}

/// Attachment
///
/// A stored file reference: public URL plus the mime type used to pick its storage folder.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Attachment {
    pub url: String,
    pub mimetype: String,
}

/// User
///
/// A member (or administrator) as exposed over the API. Credentials never live on this
/// struct; see `UserRecord`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    #[serde(flatten)]
    pub profile: MemberProfile,
    pub role: Role,
    pub membership_status: MembershipStatus,
    pub membership_number: String,
    pub registration_number: String,
    pub profile_pic: String,
    pub document: Option<Attachment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn username(&self) -> String {
        self.profile.full_name()
    }

    /// Every stored file this user owns, as `(url, mimetype)`.
    pub fn owned_files(&self) -> Vec<(String, String)> {
        let mut files = Vec::new();
        if !self.profile_pic.is_empty() {
            files.push((self.profile_pic.clone(), "image/*".to_string()));
        }
        if let Some(doc) = &self.document {
            files.push((doc.url.clone(), doc.mimetype.clone()));
        }
        files
    }
}

/// UserRecord
///
/// Internal view carrying the password hash and the current refresh token. Used only by the
/// session flows; never serialised.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub password_hash: String,
    pub refresh_token: Option<String>,
}

/// NewUser
///
/// Insert payload assembled by registration and bulk import.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub profile: MemberProfile,
    pub password_hash: String,
    pub role: Role,
    pub membership_status: MembershipStatus,
    pub membership_number: String,
    pub registration_number: String,
    pub profile_pic: String,
    pub document: Option<Attachment>,
}

/// IdentityProbe
///
/// Candidate identity values to test for prior use, optionally ignoring one user (updates).
#[derive(Debug, Clone, Default)]
pub struct IdentityProbe {
    pub employee_id: Option<String>,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub exclude_id: Option<Uuid>,
}

impl IdentityProbe {
    pub fn for_profile(profile: &MemberProfile, exclude_id: Option<Uuid>) -> Self {
        let non_empty = |v: &str| (!v.is_empty()).then(|| v.to_string());
        Self {
            employee_id: non_empty(&profile.employee_id),
            email: non_empty(&profile.email),
            mobile_number: non_empty(&profile.mobile_number),
            exclude_id,
        }
    }
}

// --- Request payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// BulkImportRequest
///
/// Raw spreadsheet rows. Values are loosely typed; each row is sanitised independently.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportRequest {
    #[schema(value_type = Vec<Object>)]
    pub members: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    /// `pending` or `approved`.
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    /// `employeeId`, `email` or `mobileNumber`.
    pub field: String,
    pub value: String,
}

// --- Response payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ForgotPasswordResponse {
    pub email: String,
    /// Present when the deployment exposes reset tokens directly.
    pub reset_token: Option<String>,
    pub expires_in_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Availability {
    pub field: String,
    pub value: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ImportFailure {
    /// 0-based index of the row in the submitted batch.
    pub index: usize,
    pub employee_id: String,
    pub email: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BulkImportReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<ImportFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_reported_in_order() {
        let mut profile = MemberProfile {
            employee_id: "E-1".into(),
            name: "Ram".into(),
            ..Default::default()
        };
        profile.surname = "   ".into();
        let missing = profile.missing_fields();
        assert_eq!(missing.first().map(String::as_str), Some("surname"));
        assert!(missing.contains(&"email".to_string()));
        assert!(!missing.contains(&"tole".to_string()));
    }

    #[test]
    fn normalize_trims_and_lowercases_email() {
        let mut profile = MemberProfile {
            email: "  Ram.Sharma@Example.COM ".into(),
            name: " Ram ".into(),
            ..Default::default()
        };
        profile.normalize();
        assert_eq!(profile.email, "ram.sharma@example.com");
        assert_eq!(profile.name, "Ram");
    }

    #[test]
    fn set_rejects_unknown_fields() {
        let mut profile = MemberProfile::default();
        assert!(profile.set("office", "District Office".into()));
        assert!(!profile.set("password", "secret".into()));
        assert_eq!(profile.get("office"), Some("District Office"));
    }

    #[test]
    fn user_json_is_flat_and_has_no_credentials() {
        let user = User {
            id: Uuid::nil(),
            profile: MemberProfile { employee_id: "E-9".into(), ..Default::default() },
            role: Role::User,
            membership_status: MembershipStatus::Pending,
            membership_number: "MEM-1".into(),
            registration_number: "REG-1".into(),
            profile_pic: String::new(),
            document: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["employeeId"], "E-9");
        assert_eq!(json["membershipStatus"], "pending");
        assert!(json.get("password").is_none());
        assert!(json.get("refreshToken").is_none());
    }
}
