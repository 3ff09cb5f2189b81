use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{fs, path::PathBuf, str::FromStr};
use tracing::debug;

use shared::domain::{name_key, Person, PersonDraft, PersonId};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        let database_url = normalize_sqlite_url(database_url);
        create_parent_dir(&database_url)?;

        let connect_options =
            SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens its own database.
        let pool = if is_memory_url(&database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(connect_options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(connect_options)
                .await?
        };
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_persons(&self) -> Result<Vec<Person>> {
        let rows = sqlx::query("SELECT id, name, number FROM persons ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .context("failed to list persons")?;
        rows.iter().map(person_from_row).collect()
    }

    pub async fn count_persons(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM persons")
            .fetch_one(&self.pool)
            .await
            .context("failed to count persons")?;
        Ok(count)
    }

    pub async fn find_person(&self, id: PersonId) -> Result<Option<Person>> {
        let row = sqlx::query("SELECT id, name, number FROM persons WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(person_from_row).transpose()
    }

    /// Looks a person up by [`name_key`].
    pub async fn find_person_by_name(&self, name: &str) -> Result<Option<Person>> {
        let row = sqlx::query("SELECT id, name, number FROM persons WHERE name_key = ?")
            .bind(name_key(name))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(person_from_row).transpose()
    }

    pub async fn create_person(&self, draft: &PersonDraft) -> Result<Person> {
        let row = sqlx::query(
            "INSERT INTO persons (name, name_key, number) VALUES (?, ?, ?)
             RETURNING id, name, number",
        )
        .bind(&draft.name)
        .bind(name_key(&draft.name))
        .bind(&draft.number)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert person '{}'", draft.name))?;
        let person = person_from_row(&row)?;
        debug!(person_id = person.id.0, "storage: person created");
        Ok(person)
    }

    /// Replaces name and number of an existing person. Returns `None` when no
    /// row matches `id`.
    pub async fn update_person(&self, id: PersonId, draft: &PersonDraft) -> Result<Option<Person>> {
        let row = sqlx::query(
            "UPDATE persons SET name = ?, name_key = ?, number = ?, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?
             RETURNING id, name, number",
        )
        .bind(&draft.name)
        .bind(name_key(&draft.name))
        .bind(&draft.number)
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to update person {id}"))?;
        row.as_ref().map(person_from_row).transpose()
    }

    /// Returns whether a row was removed.
    pub async fn delete_person(&self, id: PersonId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM persons WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete person {id}"))?;
        Ok(result.rows_affected() > 0)
    }
}

/// Whether `err` came from the unique name index rejecting a write.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.is_unique_violation()
    )
}

fn person_from_row(row: &SqliteRow) -> Result<Person> {
    Ok(Person {
        id: PersonId(row.try_get::<i64, _>("id")?),
        name: row.try_get("name")?,
        number: row.try_get("number")?,
    })
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

/// Accepts `sqlite:` urls, `sqlite::memory:` and bare file paths, and returns a
/// url sqlx can open.
pub fn normalize_sqlite_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("://") || is_memory_url(raw) {
        return raw.to_string();
    }
    let path = raw.strip_prefix("sqlite:").unwrap_or(raw).replace('\\', "/");
    format!("sqlite://{path}")
}

fn database_file(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) {
        return None;
    }
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

fn create_parent_dir(database_url: &str) -> Result<()> {
    let Some(file) = database_file(database_url) else {
        return Ok(());
    };
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}' for {database_url}", parent.display())),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
