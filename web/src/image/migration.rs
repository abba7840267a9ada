use log::{info, warn};

use crate::{
    result::Result,
    stores::{MigrationPatch, StorageType, User, UserStore, SCHEMA_VERSION},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub scanned: usize,
    pub updated: usize,
    pub unresolved: usize,
    pub failed: usize,
}

/// What bringing `user` to [`SCHEMA_VERSION`] takes, or `None` when there
/// is no way to tell where its image lives.
pub fn plan(user: &User) -> Option<MigrationPatch> {
    let image = match &user.image {
        Some(image) if image.storage_type.is_none() => image,
        _ => return Some(MigrationPatch::stamp(SCHEMA_VERSION)),
    };
    if image.data.is_some() {
        return Some(MigrationPatch {
            storage_type: Some(StorageType::Database),
            file_path: None,
            schema_version: SCHEMA_VERSION,
        });
    }
    let path = image
        .legacy_path
        .as_deref()
        .or(image.file_path.as_deref())
        .filter(|path| !path.is_empty())?;
    Some(MigrationPatch {
        storage_type: Some(StorageType::Filesystem),
        file_path: Some(path.to_owned()),
        schema_version: SCHEMA_VERSION,
    })
}

/// Back-fills `storageType` on records written before it existed.
///
/// Each record is read and patched on its own, so a malformed document or
/// a failed write only costs that record, and an interrupted pass just
/// leaves the rest for the next startup. Records that cannot be resolved keep
/// their old version and are reported again every run.
pub async fn migrate(store: &dyn UserStore) -> Result<MigrationReport> {
    let outdated = store.find_outdated(SCHEMA_VERSION).await?;
    let mut report = MigrationReport {
        scanned: outdated.len(),
        ..Default::default()
    };

    for user in outdated {
        let user = match user {
            Ok(user) => user,
            Err(err) => {
                warn!("cannot migrate {}", err);
                report.failed += 1;
                continue;
            }
        };
        let patch = match plan(&user.1) {
            Some(patch) => patch,
            None => {
                warn!(
                    "user {} has an image with neither data nor a path, leaving it unmigrated",
                    user.0
                );
                report.unresolved += 1;
                continue;
            }
        };
        match store.apply_migration(&user.0, &patch).await {
            Ok(true) => report.updated += 1,
            Ok(false) => {
                warn!("user {} disappeared during migration", user.0);
                report.failed += 1;
            }
            Err(err) => {
                warn!("failed to migrate user {}: {}", user.0, err);
                report.failed += 1;
            }
        }
    }

    info!(
        "migration to schema {}: {} scanned, {} updated, {} unresolved, {} failed",
        SCHEMA_VERSION, report.scanned, report.updated, report.unresolved, report.failed
    );
    Ok(report)
}
