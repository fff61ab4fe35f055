// src/db.rs
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{AppError, Result};
use crate::models::{Note, NoteId, User, UserId};
use crate::tags::TagSet;
use crate::validation::{NoteDraft, NotePatch};

pub type DbPool = SqlitePool;

pub static MIGRATOR: Migrator = sqlx::migrate!();

const NOTE_COLUMNS: &str = "id, owner_id, title, content, tags, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, password_hash, created_at";

// --- 初始化 ---

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Opens a connection pool, creating the database file if needed.
///
/// An in-memory database lives inside a single connection, so the pool is
/// pinned to exactly one long-lived connection in that case.
pub async fn init_db(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if is_in_memory(database_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections)
    };

    tracing::info!(database_url, "connecting to database");
    Ok(pool_options.connect_with(options).await?)
}

pub async fn migrate(pool: &DbPool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    tracing::info!("database migrations applied");
    Ok(())
}

// --- 行映射 ---

#[derive(FromRow)]
struct NoteRow {
    id: i64,
    owner_id: i64,
    title: String,
    content: String,
    tags: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NoteRow> for Note {
    type Error = AppError;

    fn try_from(row: NoteRow) -> Result<Self> {
        Ok(Note {
            id: NoteId::new(row.id),
            owner_id: UserId::new(row.owner_id),
            title: row.title,
            content: row.content,
            tags: serde_json::from_str(&row.tags)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::new(row.id),
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

fn tags_json(tags: &TagSet) -> Result<String> {
    Ok(serde_json::to_string(tags.as_slice())?)
}

// --- 用户 ---

pub async fn create_user_db(
    pool: &DbPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User> {
    let created_at = Utc::now();
    let result = sqlx::query(
        "INSERT INTO users (name, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(created_at)
    .execute(pool)
    .await?;

    Ok(User {
        id: UserId::new(result.last_insert_rowid()),
        name: name.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        created_at,
    })
}

pub async fn find_user_by_email_db(pool: &DbPool, email: &str) -> Result<Option<User>> {
    let row: Option<UserRow> =
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))
            .bind(email)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(User::from))
}

pub async fn get_user_db(pool: &DbPool, id: UserId) -> Result<Option<User>> {
    let row: Option<UserRow> =
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id.get())
            .fetch_optional(pool)
            .await?;
    Ok(row.map(User::from))
}

// --- 笔记的 CRUD 操作 ---
//
// Every statement filters on owner_id, so a foreign note and a missing one
// are the same thing to the caller.

pub async fn create_note_db(pool: &DbPool, owner: UserId, draft: NoteDraft) -> Result<Note> {
    insert_note_at(pool, owner, draft, Utc::now()).await
}

/// Inserts a note with an explicit creation instant.
pub async fn insert_note_at(
    pool: &DbPool,
    owner: UserId,
    draft: NoteDraft,
    created_at: DateTime<Utc>,
) -> Result<Note> {
    let result = sqlx::query(
        "INSERT INTO notes (owner_id, title, content, tags, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
    )
    .bind(owner.get())
    .bind(&draft.title)
    .bind(&draft.content)
    .bind(tags_json(&draft.tags)?)
    .bind(created_at)
    .execute(pool)
    .await?;

    let id = NoteId::new(result.last_insert_rowid());
    tracing::debug!(%owner, note_id = %id, "note created");

    Ok(Note {
        id,
        owner_id: owner,
        title: draft.title,
        content: draft.content,
        tags: draft.tags.into_vec(),
        created_at,
        updated_at: created_at,
    })
}

pub async fn get_note_db(pool: &DbPool, owner: UserId, id: NoteId) -> Result<Note> {
    let row: Option<NoteRow> = sqlx::query_as(&format!(
        "SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1 AND owner_id = ?2"
    ))
    .bind(id.get())
    .bind(owner.get())
    .fetch_optional(pool)
    .await?;

    row.ok_or_else(AppError::note_not_found)?.try_into()
}

/// The owner's notes, newest first, optionally narrowed by a search term.
pub async fn list_notes_db(pool: &DbPool, owner: UserId, search: Option<&str>) -> Result<Vec<Note>> {
    let rows: Vec<NoteRow> = sqlx::query_as(&format!(
        "SELECT {NOTE_COLUMNS} FROM notes WHERE owner_id = ?1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(owner.get())
    .fetch_all(pool)
    .await?;

    let notes = rows
        .into_iter()
        .map(Note::try_from)
        .collect::<Result<Vec<_>>>()?;

    Ok(match search.filter(|term| !term.is_empty()) {
        Some(term) => {
            let needle = term.to_lowercase();
            notes
                .into_iter()
                .filter(|note| note_matches(note, &needle))
                .collect()
        }
        None => notes,
    })
}

/// Case-insensitive substring match against title, content, or any one tag.
/// `needle` must already be lowercase.
pub fn note_matches(note: &Note, needle: &str) -> bool {
    note.title.to_lowercase().contains(needle)
        || note.content.to_lowercase().contains(needle)
        || note.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
}

pub async fn update_note_db(
    pool: &DbPool,
    owner: UserId,
    id: NoteId,
    patch: NotePatch,
) -> Result<Note> {
    let tags = patch.tags.as_ref().map(tags_json).transpose()?;

    let row: Option<NoteRow> = sqlx::query_as(&format!(
        "UPDATE notes
         SET title = COALESCE(?3, title),
             content = COALESCE(?4, content),
             tags = COALESCE(?5, tags),
             updated_at = ?6
         WHERE id = ?1 AND owner_id = ?2
         RETURNING {NOTE_COLUMNS}"
    ))
    .bind(id.get())
    .bind(owner.get())
    .bind(patch.title)
    .bind(patch.content)
    .bind(tags)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    tracing::debug!(%owner, note_id = %id, found = row.is_some(), "note update");
    row.ok_or_else(AppError::note_not_found)?.try_into()
}

pub async fn delete_note_db(pool: &DbPool, owner: UserId, id: NoteId) -> Result<()> {
    let result = sqlx::query("DELETE FROM notes WHERE id = ?1 AND owner_id = ?2")
        .bind(id.get())
        .bind(owner.get())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::note_not_found());
    }
    tracing::debug!(%owner, note_id = %id, "note deleted");
    Ok(())
}
