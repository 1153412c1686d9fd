//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{SessionRepo, SongRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: SongRepo + SessionRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    query_timeout: Duration,
}

impl SqliteStore {
    /// Open (creating if needed) a SQLite database and apply the schema.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout = Duration::from_secs(query_timeout_secs.unwrap_or(30));

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers instead of failing them.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout,
        };
        store.migrate().await?;

        tracing::debug!(
            path = %path.display(),
            query_timeout_secs = query_timeout.as_secs(),
            "SQLite metadata store ready (query timeout is advisory)"
        );

        Ok(store)
    }

    /// Run a query and log it if it outlives the configured timeout.
    ///
    /// SQLite cannot cancel statements, so slow queries are reported, not aborted.
    async fn timed<T: Send, F>(&self, operation: &'static str, fut: F) -> MetadataResult<T>
    where
        F: Future<Output = MetadataResult<T>> + Send,
    {
        let started = Instant::now();
        let result = fut.await;
        let elapsed = started.elapsed();
        if elapsed > self.query_timeout {
            tracing::warn!(
                operation,
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_secs = self.query_timeout.as_secs(),
                "metadata query exceeded timeout"
            );
        }
        result
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Refuse databases written by an incompatible layout rather than
        // failing later on the first query.
        let songs_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='songs')",
        )
        .fetch_one(&self.pool)
        .await?;

        if songs_exists {
            let columns: Vec<(i32, String, String, i32, Option<String>, i32)> =
                sqlx::query_as("PRAGMA table_info(songs)")
                    .fetch_all(&self.pool)
                    .await?;
            let has_asset_id = columns
                .iter()
                .any(|(_, name, _, _, _, _)| name == "asset_id");
            if !has_asset_id {
                return Err(MetadataError::Internal(
                    "incompatible database schema: songs table has no asset_id column".to_string(),
                ));
            }
        }

        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn is_unique_violation(err: &sqlx::Error) -> bool {
        matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
    }

    #[async_trait]
    impl SongRepo for SqliteStore {
        async fn create_song(&self, song: &SongRow) -> MetadataResult<()> {
            let result = self
                .timed("create_song", async {
                    sqlx::query(
                        r#"
                        INSERT INTO songs (
                            song_id, title, artist, album, genre, year, duration,
                            asset_id, owner_id, created_at, updated_at
                        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(song.song_id)
                    .bind(&song.title)
                    .bind(&song.artist)
                    .bind(&song.album)
                    .bind(&song.genre)
                    .bind(song.year)
                    .bind(&song.duration)
                    .bind(song.asset_id)
                    .bind(song.owner_id)
                    .bind(song.created_at)
                    .bind(song.updated_at)
                    .execute(&self.pool)
                    .await
                    .map_err(MetadataError::from)
                })
                .await;

            match result {
                Ok(_) => Ok(()),
                Err(MetadataError::Database(e)) if is_unique_violation(&e) => {
                    Err(MetadataError::AlreadyExists(format!(
                        "song_id {} already exists",
                        song.song_id
                    )))
                }
                Err(e) => Err(e),
            }
        }

        async fn get_song(&self, song_id: Uuid) -> MetadataResult<Option<SongRow>> {
            self.timed("get_song", async {
                let row = sqlx::query_as::<_, SongRow>("SELECT * FROM songs WHERE song_id = ?")
                    .bind(song_id)
                    .fetch_optional(&self.pool)
                    .await?;
                Ok(row)
            })
            .await
        }

        async fn get_song_by_asset(&self, asset_id: Uuid) -> MetadataResult<Option<SongRow>> {
            let row = sqlx::query_as::<_, SongRow>("SELECT * FROM songs WHERE asset_id = ?")
                .bind(asset_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn update_song(&self, song: &SongRow) -> MetadataResult<()> {
            let result = self
                .timed("update_song", async {
                    sqlx::query(
                        r#"
                        UPDATE songs
                        SET title = ?, artist = ?, album = ?, genre = ?, year = ?,
                            duration = ?, updated_at = ?
                        WHERE song_id = ?
                        "#,
                    )
                    .bind(&song.title)
                    .bind(&song.artist)
                    .bind(&song.album)
                    .bind(&song.genre)
                    .bind(song.year)
                    .bind(&song.duration)
                    .bind(song.updated_at)
                    .bind(song.song_id)
                    .execute(&self.pool)
                    .await
                    .map_err(MetadataError::from)
                })
                .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "song_id {} not found",
                    song.song_id
                )));
            }
            Ok(())
        }

        async fn delete_song(&self, song_id: Uuid) -> MetadataResult<()> {
            let result = self
                .timed("delete_song", async {
                    sqlx::query("DELETE FROM songs WHERE song_id = ?")
                        .bind(song_id)
                        .execute(&self.pool)
                        .await
                        .map_err(MetadataError::from)
                })
                .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "song_id {song_id} not found"
                )));
            }
            Ok(())
        }

        async fn list_songs(&self) -> MetadataResult<Vec<SongRow>> {
            self.timed("list_songs", async {
                let rows = sqlx::query_as::<_, SongRow>(
                    "SELECT * FROM songs ORDER BY created_at DESC, rowid DESC",
                )
                .fetch_all(&self.pool)
                .await?;
                Ok(rows)
            })
            .await
        }

        async fn list_referenced_asset_ids(&self) -> MetadataResult<Vec<Uuid>> {
            self.timed("list_referenced_asset_ids", async {
                let ids: Vec<Uuid> = sqlx::query_scalar("SELECT asset_id FROM songs")
                    .fetch_all(&self.pool)
                    .await?;
                Ok(ids)
            })
            .await
        }
    }

    #[async_trait]
    impl SessionRepo for SqliteStore {
        async fn create_session(&self, session: &SessionRow) -> MetadataResult<()> {
            let result = sqlx::query(
                r#"
                INSERT INTO sessions (
                    session_id, user_id, token_hash, created_at,
                    expires_at, revoked_at, last_seen_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session.session_id)
            .bind(session.user_id)
            .bind(&session.token_hash)
            .bind(session.created_at)
            .bind(session.expires_at)
            .bind(session.revoked_at)
            .bind(session.last_seen_at)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => Err(MetadataError::AlreadyExists(format!(
                    "session {} already exists",
                    session.session_id
                ))),
                Err(e) => Err(e.into()),
            }
        }

        async fn get_session_by_hash(
            &self,
            token_hash: &str,
        ) -> MetadataResult<Option<SessionRow>> {
            let row =
                sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE token_hash = ?")
                    .bind(token_hash)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn touch_session(
            &self,
            session_id: Uuid,
            seen_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            sqlx::query("UPDATE sessions SET last_seen_at = ? WHERE session_id = ?")
                .bind(seen_at)
                .bind(session_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn revoke_session(
            &self,
            session_id: Uuid,
            revoked_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE sessions SET revoked_at = ? WHERE session_id = ? AND revoked_at IS NULL",
            )
            .bind(revoked_at)
            .bind(session_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "active session {session_id} not found"
                )));
            }
            Ok(())
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Song metadata. asset_id points at a chunk store asset and never changes.
CREATE TABLE IF NOT EXISTS songs (
    song_id BLOB PRIMARY KEY,
    title TEXT NOT NULL,
    artist TEXT NOT NULL,
    album TEXT NOT NULL DEFAULT '',
    genre TEXT NOT NULL DEFAULT '',
    year INTEGER,
    duration TEXT NOT NULL DEFAULT '',
    asset_id BLOB NOT NULL UNIQUE,
    owner_id BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_songs_owner ON songs(owner_id);
CREATE INDEX IF NOT EXISTS idx_songs_created ON songs(created_at);

-- Login sessions, keyed by the SHA-256 of the bearer secret.
CREATE TABLE IF NOT EXISTS sessions (
    session_id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL,
    token_hash TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    revoked_at TEXT,
    last_seen_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
"#;
