//! Periodic thinning of backup history.
//!
//! Spawns a loop that, on every tick, sweeps the recent backup window for
//! each configured bucket width: within `[now - 2W, now]`, the first backup
//! a document has in each W-aligned slot survives and the rest are deleted.
//! Coarser widths later in the configuration thin older history further.
//! Runs until the cancellation token fires; sweep errors are logged and the
//! loop continues.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use vellum_db::models::document_backup::DocumentBackup;
use vellum_db::repositories::DocumentBackupRepo;
use vellum_db::DbPool;

use crate::config::RetentionConfig;

/// Run the backup retention loop until `cancel` is triggered.
pub async fn run(pool: DbPool, config: RetentionConfig, cancel: CancellationToken) {
    tracing::info!(
        tick_secs = config.tick_interval.as_secs(),
        levels = config.windows.len(),
        "backup retention job started"
    );

    let mut interval = tokio::time::interval(config.tick_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("backup retention job stopping");
                break;
            }
            _ = interval.tick() => {
                for window in &config.windows {
                    match sweep(&pool, *window).await {
                        Ok(0) => {
                            tracing::debug!(window_secs = window.as_secs(), "backup retention: nothing to thin");
                        }
                        Ok(deleted) => {
                            tracing::info!(deleted, window_secs = window.as_secs(), "backup retention: thinned backups");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, window_secs = window.as_secs(), "backup retention: sweep failed");
                        }
                    }
                }
            }
        }
    }
}

/// One retention pass for one bucket width. Returns the number of deleted
/// backups.
pub async fn sweep(pool: &DbPool, window: Duration) -> Result<u64, sqlx::Error> {
    let now = Utc::now();
    let span = chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::seconds(600));

    let backups = DocumentBackupRepo::list_updated_between(pool, now - span * 2, now).await?;
    let removals = plan_removals(&backups, window);
    if removals.is_empty() {
        return Ok(0);
    }

    let mut conn = pool.acquire().await?;
    DocumentBackupRepo::bulk_delete(&mut conn, &removals).await
}

/// Decide which backups to drop: for each document, keep the first backup
/// in every `window`-aligned time slot and mark the rest for deletion.
///
/// `backups` must be ordered by `updated_at` ascending, as returned by
/// `list_updated_between`.
fn plan_removals(backups: &[DocumentBackup], window: Duration) -> HashMap<Uuid, HashSet<i64>> {
    let width_secs = window.as_secs() as i64;
    if width_secs == 0 {
        return HashMap::new();
    }

    let mut kept_slot: HashMap<Uuid, i64> = HashMap::new();
    let mut removals: HashMap<Uuid, HashSet<i64>> = HashMap::new();

    for backup in backups {
        let slot = backup.updated_at.timestamp().div_euclid(width_secs);
        match kept_slot.get(&backup.id) {
            Some(&kept) if kept == slot => {
                removals.entry(backup.id).or_default().insert(backup.version);
            }
            _ => {
                kept_slot.insert(backup.id, slot);
            }
        }
    }

    removals
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vellum_core::types::Timestamp;

    fn backup(id: Uuid, version: i64, at: Timestamp) -> DocumentBackup {
        DocumentBackup {
            id,
            version,
            meta: Vec::new(),
            content: Vec::new(),
            links: Vec::new(),
            children: Vec::new(),
            kind: "text".into(),
            compression: "nop".into(),
            created_at: at,
            updated_at: at,
        }
    }

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn keeps_first_backup_per_slot() {
        let id = Uuid::new_v4();
        let window = Duration::from_secs(600);
        // Three backups in the same 10-minute slot, one in the next.
        let backups = vec![
            backup(id, 1, at(600)),
            backup(id, 2, at(700)),
            backup(id, 3, at(800)),
            backup(id, 4, at(1300)),
        ];

        let removals = plan_removals(&backups, window);
        let versions = removals.get(&id).expect("versions marked for removal");
        assert_eq!(versions, &HashSet::from([2, 3]));
    }

    #[test]
    fn sweeps_documents_independently() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let window = Duration::from_secs(600);
        // Interleaved: each document has two backups in the same slot. A
        // shared sweep cursor would miss one of the duplicates.
        let backups = vec![
            backup(a, 1, at(100)),
            backup(b, 1, at(150)),
            backup(a, 2, at(200)),
            backup(b, 2, at(250)),
        ];

        let removals = plan_removals(&backups, window);
        assert_eq!(removals.get(&a), Some(&HashSet::from([2])));
        assert_eq!(removals.get(&b), Some(&HashSet::from([2])));
    }

    #[test]
    fn one_backup_per_slot_is_untouched() {
        let id = Uuid::new_v4();
        let window = Duration::from_secs(600);
        let backups = vec![
            backup(id, 1, at(100)),
            backup(id, 2, at(700)),
            backup(id, 3, at(1300)),
        ];

        assert!(plan_removals(&backups, window).is_empty());
    }

    #[test]
    fn slot_boundary_is_floor_aligned() {
        let id = Uuid::new_v4();
        let window = Duration::from_secs(600);
        // 599 and 600 straddle a slot boundary: both survive.
        let backups = vec![backup(id, 1, at(599)), backup(id, 2, at(600))];

        assert!(plan_removals(&backups, window).is_empty());
    }

    #[test]
    fn zero_width_window_plans_nothing() {
        let id = Uuid::new_v4();
        let backups = vec![backup(id, 1, at(100)), backup(id, 2, at(100))];
        assert!(plan_removals(&backups, Duration::from_secs(0)).is_empty());
    }
}
