/// Schema migrations
///
/// The `.up.sql`/`.down.sql` pairs under the workspace `migrations/`
/// directory are compiled into the binary. `run_migrations` applies the
/// pending ones and is a no-op on an up-to-date database.

use sqlx::{migrate::Migrator, postgres::PgPool};
use tracing::{debug, error, info};

pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Applied versus embedded migration versions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied: Vec<i64>,
    pub pending: Vec<i64>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn latest_applied(&self) -> Option<i64> {
        self.applied.iter().copied().max()
    }
}

/// Versions of the embedded up migrations, ascending
pub fn embedded_versions() -> Vec<i64> {
    let mut versions: Vec<i64> = MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| m.version)
        .collect();
    versions.sort_unstable();
    versions
}

/// Applies every pending migration
///
/// # Errors
///
/// Fails if a migration errors or an applied migration no longer matches
/// its embedded checksum.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!(embedded = embedded_versions().len(), "Running database migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        error!(error = %e, "Migration failed");
        e
    })?;

    info!("Database schema is up to date");
    Ok(())
}

/// Compares the database's migration history with the embedded set
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let has_history: bool = sqlx::query_scalar("SELECT to_regclass('public._sqlx_migrations') IS NOT NULL")
        .fetch_one(pool)
        .await?;

    let applied: Vec<i64> = if has_history {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success ORDER BY version")
            .fetch_all(pool)
            .await?
    } else {
        debug!("No migration history table");
        Vec::new()
    };

    Ok(status_from(applied))
}

fn status_from(applied: Vec<i64>) -> MigrationStatus {
    let pending = embedded_versions()
        .into_iter()
        .filter(|version| !applied.contains(version))
        .collect();

    MigrationStatus { applied, pending }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_versions() {
        assert_eq!(
            embedded_versions(),
            vec![20250601000001, 20250601000002, 20250601000003, 20250601000004]
        );
    }

    #[test]
    fn test_status_lists_pending_versions() {
        let status = status_from(vec![20250601000001, 20250601000002]);
        assert!(!status.is_up_to_date());
        assert_eq!(status.pending, vec![20250601000003, 20250601000004]);
        assert_eq!(status.latest_applied(), Some(20250601000002));

        assert!(status_from(embedded_versions()).is_up_to_date());
        assert_eq!(status_from(Vec::new()).pending.len(), 4);
    }
}
