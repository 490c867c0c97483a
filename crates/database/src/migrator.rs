//! Versioned schema migrations.
//!
//! Migration files live in one directory as `NNNNNN_<name>.up.sql` and
//! `NNNNNN_<name>.down.sql` pairs. `sqlx` reads the leading number as the
//! migration version and records applied versions in `_sqlx_migrations`.

use crate::error::DbError;
use sqlx::PgPool;
use sqlx::migrate::{Migrate, MigrateError, Migrator};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// What a migration action changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Versions applied or reverted, in ascending order.
    Changed(Vec<i64>),
    NoChange,
}

/// Loads the migration set from `dir`.
pub async fn load(dir: &Path) -> Result<Migrator, DbError> {
    let migrator = Migrator::new(dir).await?;
    info!(dir = %dir.display(), count = migrator.iter().count(), "Loaded migrations");
    Ok(migrator)
}

/// Applies every pending migration.
pub async fn up(migrator: &Migrator, pool: &PgPool) -> Result<MigrationOutcome, DbError> {
    let before = applied_versions(pool).await?;
    migrator.run(pool).await?;
    let after = applied_versions(pool).await?;
    Ok(outcome(after.difference(&before)))
}

/// Reverts every applied migration.
pub async fn down(migrator: &Migrator, pool: &PgPool) -> Result<MigrationOutcome, DbError> {
    let before = applied_versions(pool).await?;
    migrator.undo(pool, 0).await?;
    let after = applied_versions(pool).await?;
    Ok(outcome(before.difference(&after)))
}

/// Applies only the oldest pending migration.
pub async fn up1(migrator: &Migrator, pool: &PgPool) -> Result<MigrationOutcome, DbError> {
    let mut conn = pool.acquire().await?;
    conn.ensure_migrations_table().await?;
    conn.lock().await?;

    let result = async {
        if let Some(version) = conn.dirty_version().await? {
            return Err(MigrateError::Dirty(version));
        }
        let applied: HashMap<i64, _> = conn
            .list_applied_migrations()
            .await?
            .into_iter()
            .map(|m| (m.version, m.checksum))
            .collect();

        // Applied migrations must still match their files, as `Migrator::run` checks.
        let mut next = None;
        for migration in migrator.iter().filter(|m| m.migration_type.is_up_migration()) {
            match applied.get(&migration.version) {
                Some(checksum) if *checksum != migration.checksum => {
                    return Err(MigrateError::VersionMismatch(migration.version));
                }
                Some(_) => {}
                None => {
                    next.get_or_insert(migration);
                }
            }
        }

        match next {
            Some(migration) => {
                let elapsed = conn.apply(migration).await?;
                info!(
                    version = migration.version,
                    description = %migration.description,
                    ?elapsed,
                    "Applied migration"
                );
                Ok(MigrationOutcome::Changed(vec![migration.version]))
            }
            None => Ok(MigrationOutcome::NoChange),
        }
    }
    .await;

    conn.unlock().await?;
    Ok(result?)
}

/// Reverts only the most recently applied migration.
pub async fn down1(migrator: &Migrator, pool: &PgPool) -> Result<MigrationOutcome, DbError> {
    let applied = applied_versions(pool).await?;
    let mut newest_first = applied.iter().rev();
    let Some(&latest) = newest_first.next() else {
        return Ok(MigrationOutcome::NoChange);
    };
    let target = newest_first.next().copied().unwrap_or(0);

    migrator.undo(pool, target).await?;
    info!(version = latest, "Reverted migration");
    Ok(MigrationOutcome::Changed(vec![latest]))
}

async fn applied_versions(pool: &PgPool) -> Result<BTreeSet<i64>, DbError> {
    let mut conn = pool.acquire().await?;
    conn.ensure_migrations_table().await?;
    let applied = conn.list_applied_migrations().await?;
    Ok(applied.into_iter().map(|m| m.version).collect())
}

fn outcome<'a>(versions: impl Iterator<Item = &'a i64>) -> MigrationOutcome {
    let versions: Vec<i64> = versions.copied().collect();
    if versions.is_empty() {
        MigrationOutcome::NoChange
    } else {
        MigrationOutcome::Changed(versions)
    }
}

/// Writes an empty up/down migration pair named after the next free sequence
/// number in `dir`, creating the directory if needed.
pub fn create(dir: &Path, name: &str) -> Result<(PathBuf, PathBuf), DbError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DbError::InvalidInput(format!(
            "migration name '{name}' must be non-empty and contain only letters, digits and '_'"
        )));
    }

    fs::create_dir_all(dir)?;
    let id = next_migration_id(dir)?;

    let up_file = dir.join(format!("{id}_{name}.up.sql"));
    let down_file = dir.join(format!("{id}_{name}.down.sql"));
    write_new(&up_file, "-- Write your UP migration SQL here\n")?;
    write_new(&down_file, "-- Write your DOWN migration SQL here\n")?;

    info!(up = %up_file.display(), down = %down_file.display(), "Migration files created");
    Ok((up_file, down_file))
}

/// Returns the highest sequence number found in `dir` plus one, zero-padded
/// to six digits.
pub fn next_migration_id(dir: &Path) -> Result<String, DbError> {
    let mut highest = 0;
    for entry in fs::read_dir(dir)? {
        let file_name = entry?.file_name();
        if let Some(seq) = file_name.to_str().and_then(sequence_number) {
            highest = highest.max(seq);
        }
    }
    let next = highest.checked_add(1).ok_or_else(|| {
        DbError::InvalidInput(format!(
            "migration sequence number {highest} in {} cannot be incremented",
            dir.display()
        ))
    })?;
    Ok(format!("{next:06}"))
}

fn sequence_number(file_name: &str) -> Option<u64> {
    let (prefix, _) = file_name.split_once('_')?;
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

fn write_new(path: &Path, contents: &str) -> Result<(), DbError> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_migration_is_000001() {
        let dir = TempDir::new().unwrap();
        assert_eq!(next_migration_id(dir.path()).unwrap(), "000001");
    }

    #[test]
    fn next_id_follows_the_highest_existing_prefix() {
        let dir = TempDir::new().unwrap();
        for name in [
            "000001_init_schema.up.sql",
            "000001_init_schema.down.sql",
            "000007_add_users.up.sql",
            "000003_add_index.up.sql",
            "README.md",
            "notes_000099.txt",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        assert_eq!(next_migration_id(dir.path()).unwrap(), "000008");
    }

    #[test]
    fn next_id_rejects_an_exhausted_sequence() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(format!("{}_last.up.sql", u64::MAX)), "").unwrap();

        let err = next_migration_id(dir.path()).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput(_)), "unexpected error: {err}");
        assert!(create(dir.path(), "one_more").is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn create_writes_a_pair_and_increments() {
        let dir = TempDir::new().unwrap();
        let migrations = dir.path().join("db").join("migration");

        let (up, down) = create(&migrations, "init_schema").unwrap();
        assert!(up.ends_with("000001_init_schema.up.sql"));
        assert!(down.ends_with("000001_init_schema.down.sql"));
        assert_eq!(
            fs::read_to_string(&up).unwrap(),
            "-- Write your UP migration SQL here\n"
        );
        assert_eq!(
            fs::read_to_string(&down).unwrap(),
            "-- Write your DOWN migration SQL here\n"
        );

        let (up, _) = create(&migrations, "add_users").unwrap();
        assert!(up.ends_with("000002_add_users.up.sql"));
    }

    #[test]
    fn create_rejects_bad_names() {
        let dir = TempDir::new().unwrap();
        for name in ["", "add users", "../escape", "drop;table"] {
            let err = create(dir.path(), name).unwrap_err();
            assert!(matches!(err, DbError::InvalidInput(_)), "accepted {name:?}");
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn sequence_number_needs_a_numeric_prefix() {
        assert_eq!(sequence_number("000012_accounts.up.sql"), Some(12));
        assert_eq!(sequence_number("12_x"), Some(12));
        assert_eq!(sequence_number("_x.sql"), None);
        assert_eq!(sequence_number("v1_x.sql"), None);
        assert_eq!(sequence_number("000001.sql"), None);
    }
}
