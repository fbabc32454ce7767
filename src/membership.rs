//! Membership workflow helpers shared by registration, bulk import and export.

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{MemberProfile, MembershipStatus, NewUser, PROFILE_FIELDS, Role, User},
    repository::{RepoError, RepositoryState},
};

/// Attempts made when a freshly generated membership/registration number collides.
const IDENTIFIER_ATTEMPTS: usize = 3;

fn short_hex() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

pub fn membership_number() -> String {
    format!("MEM-{}", short_hex())
}

pub fn registration_number() -> String {
    format!("REG-{}", short_hex())
}

/// A throwaway password for imported members who did not supply one.
pub fn generated_password() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Renders a loosely typed spreadsheet cell as a trimmed string; null becomes empty.
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// ImportRow
///
/// One bulk-import row after sanitising. Role and status already fall back to safe defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub profile: MemberProfile,
    pub password: Option<String>,
    pub role: Role,
    pub membership_status: MembershipStatus,
}

pub fn sanitize_row(row: &Map<String, Value>) -> ImportRow {
    let mut profile = MemberProfile::default();
    for field in PROFILE_FIELDS {
        profile.set(field, cell_text(row.get(*field)));
    }
    profile.normalize();

    let password = Some(cell_text(row.get("password"))).filter(|p| !p.is_empty());
    let role = Role::parse(&cell_text(row.get("role"))).unwrap_or_default();
    let membership_status =
        MembershipStatus::parse(&cell_text(row.get("membershipStatus"))).unwrap_or_default();

    ImportRow { profile, password, role, membership_status }
}

/// create_member
///
/// Inserts a member with freshly generated membership and registration numbers, drawing new
/// ones when only those collide.
pub async fn create_member(
    repo: &RepositoryState,
    mut new_user: NewUser,
) -> AppResult<User> {
    for _ in 0..IDENTIFIER_ATTEMPTS {
        new_user.membership_number = membership_number();
        new_user.registration_number = registration_number();
        match repo.create_user(new_user.clone()).await {
            Err(RepoError::Conflict(fields))
                if fields
                    .iter()
                    .all(|f| f == "membershipNumber" || f == "registrationNumber") =>
            {
                tracing::debug!(?fields, "generated identifier collided, retrying");
            }
            other => return other.map_err(AppError::from),
        }
    }
    Err(AppError::Internal("could not allocate unique membership identifiers".into()))
}

/// Fixed column order of the member export.
pub const EXPORT_HEADERS: [&str; 24] = [
    "S.N.",
    "Membership No.",
    "Registration No.",
    "Employee ID",
    "Name",
    "Surname",
    "Email",
    "Mobile",
    "Phone",
    "Date of Birth",
    "Province",
    "District",
    "Municipality",
    "Ward No.",
    "Tole",
    "Post at Retirement",
    "Pension Lease No.",
    "Office",
    "Service Start",
    "Retirement Date",
    "Fill-up Date",
    "Place",
    "Status",
    "Role",
];

/// Every column after `S.N.`, in header order.
fn export_row(user: &User) -> [String; 23] {
    let p = &user.profile;
    [
        user.membership_number.clone(),
        user.registration_number.clone(),
        p.employee_id.clone(),
        p.name.clone(),
        p.surname.clone(),
        p.email.clone(),
        p.mobile_number.clone(),
        p.phone_number.clone(),
        p.dob.clone(),
        p.province.clone(),
        p.district.clone(),
        p.municipality.clone(),
        p.ward_number.clone(),
        p.tole.clone(),
        p.post_at_retirement.clone(),
        p.pension_lease_number.clone(),
        p.office.clone(),
        p.service_start_date.clone(),
        p.retirement_date.clone(),
        p.fill_up_date.clone(),
        p.place.clone(),
        user.membership_status.as_str().to_string(),
        user.role.as_str().to_string(),
    ]
}

fn write_workbook(users: &[User]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Members")?;

    for (col, header) in EXPORT_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    for (index, user) in users.iter().enumerate() {
        let row = index as u32 + 1;
        sheet.write_number(row, 0, (index + 1) as f64)?;
        for (offset, value) in export_row(user).into_iter().enumerate() {
            sheet.write_string(row, offset as u16 + 1, value)?;
        }
    }
    workbook.save_to_buffer()
}

/// Renders members as an `.xlsx` workbook held in memory.
pub fn export_members_xlsx(users: &[User]) -> AppResult<Vec<u8>> {
    write_workbook(users).map_err(|e| AppError::Internal(format!("xlsx export failed: {e}")))
}
