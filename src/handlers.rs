//! Request handlers, one module per resource. Access level is decided by the router a handler
//! is mounted on (see `routes`), not inside the handler.

use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::LinkedUser,
    repository::RepositoryState,
    storage::{PurgeReport, StorageService, purge},
};

pub mod branches;
pub mod carousel;
pub mod committee;
pub mod content;
pub mod dashboard;
pub mod events;
pub mod gallery;
pub mod session;
pub mod settings;
pub mod users;

/// Display data for every weak `userId` link in one batch. Dangling links are simply absent.
pub(crate) async fn linked_users(
    repo: &RepositoryState,
    ids: impl IntoIterator<Item = Uuid>,
) -> AppResult<HashMap<Uuid, LinkedUser>> {
    let mut ids: Vec<Uuid> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = repo.find_users_by_ids(&ids).await?;
    Ok(users.iter().map(|u| (u.id, LinkedUser::from(u))).collect())
}

/// Purges files that were referenced before an update and no longer are.
pub(crate) async fn purge_replaced(
    storage: &dyn StorageService,
    before: Vec<String>,
    after: &[String],
) -> PurgeReport {
    let orphaned: Vec<(String, String)> = before
        .into_iter()
        .filter(|url| !after.contains(url))
        .map(|url| (url, "image/*".to_string()))
        .collect();
    purge(storage, &orphaned).await
}

/// Success message for a delete that also removed stored files.
pub(crate) fn deletion_message(entity: &str, report: &PurgeReport) -> String {
    if report.is_clean() {
        format!("{entity} deleted successfully")
    } else {
        format!(
            "{entity} deleted; {} stored file(s) could not be removed",
            report.failed.len()
        )
    }
}
