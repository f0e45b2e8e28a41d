use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{PipeType, Section, SectionId, UserId};

mod memory;

pub use memory::MemoryStore;

/// Key-value persistence for sections, keyed by `(user, section id)`.
#[async_trait]
pub trait SectionStore: Send + Sync {
    async fn list_sections(&self, user_id: &UserId) -> Result<Vec<Section>>;
    async fn upsert_section(&self, user_id: &UserId, section: &Section) -> Result<()>;
    async fn delete_section(&self, user_id: &UserId, section_id: &SectionId) -> Result<()>;
    /// Writes only the elapsed counter of an existing section.
    async fn update_elapsed_time(
        &self,
        user_id: &UserId,
        section_id: &SectionId,
        elapsed_seconds: u64,
    ) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every connection to an in-memory url opens its own empty database
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

#[async_trait]
impl SectionStore for Storage {
    async fn list_sections(&self, user_id: &UserId) -> Result<Vec<Section>> {
        let rows = sqlx::query(
            r#"
            SELECT section_id, name, start_time, duration_minutes, selected_days,
                   watering_type, elapsed_seconds
            FROM sections
            WHERE user_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list sections for user '{user_id}'"))?;

        rows.iter().map(section_from_row).collect()
    }

    async fn upsert_section(&self, user_id: &UserId, section: &Section) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sections (
                user_id, section_id, name, start_time, duration_minutes,
                selected_days, watering_type, elapsed_seconds
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, section_id) DO UPDATE SET
                name = excluded.name,
                start_time = excluded.start_time,
                duration_minutes = excluded.duration_minutes,
                selected_days = excluded.selected_days,
                watering_type = excluded.watering_type,
                elapsed_seconds = excluded.elapsed_seconds,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(user_id.as_str())
        .bind(section.id.as_str())
        .bind(&section.name)
        .bind(&section.start_time)
        .bind(i64::from(section.duration_minutes))
        .bind(&section.selected_days)
        .bind(section.watering_type.label())
        .bind(to_sql_counter(section.elapsed_seconds)?)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save section '{}'", section.id))?;
        Ok(())
    }

    async fn delete_section(&self, user_id: &UserId, section_id: &SectionId) -> Result<()> {
        sqlx::query("DELETE FROM sections WHERE user_id = ? AND section_id = ?")
            .bind(user_id.as_str())
            .bind(section_id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete section '{section_id}'"))?;
        Ok(())
    }

    async fn update_elapsed_time(
        &self,
        user_id: &UserId,
        section_id: &SectionId,
        elapsed_seconds: u64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sections
            SET elapsed_seconds = ?, updated_at = CURRENT_TIMESTAMP
            WHERE user_id = ? AND section_id = ?
            "#,
        )
        .bind(to_sql_counter(elapsed_seconds)?)
        .bind(user_id.as_str())
        .bind(section_id.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update elapsed time of section '{section_id}'"))?;
        Ok(())
    }
}

fn section_from_row(row: &SqliteRow) -> Result<Section> {
    let section_id: String = row.try_get("section_id")?;
    let duration_minutes: i64 = row.try_get("duration_minutes")?;
    let elapsed_seconds: i64 = row.try_get("elapsed_seconds")?;
    let watering_type: String = row.try_get("watering_type")?;

    Ok(Section {
        name: row.try_get("name")?,
        start_time: row.try_get("start_time")?,
        duration_minutes: u32::try_from(duration_minutes).with_context(|| {
            format!("section '{section_id}' has invalid duration {duration_minutes}")
        })?,
        selected_days: row.try_get("selected_days")?,
        watering_type: PipeType::from_str(&watering_type)?,
        elapsed_seconds: u64::try_from(elapsed_seconds).with_context(|| {
            format!("section '{section_id}' has invalid elapsed time {elapsed_seconds}")
        })?,
        id: SectionId(section_id),
    })
}

fn to_sql_counter(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("elapsed time {value} does not fit in sqlite"))
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
