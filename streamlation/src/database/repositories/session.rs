//! Session repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::PgPool;

use crate::database::models::SessionRow;
use crate::domain::TranslationSession;
use crate::{Error, Result};

/// Default number of sessions returned by a list.
pub const LIST_DEFAULT_LIMIT: u32 = 50;
/// Hard cap on the number of sessions returned by a list.
pub const LIST_MAX_LIMIT: u32 = 100;

/// Durable CRUD over translation sessions.
///
/// `create` is a compare-and-insert: an existing id fails with
/// [`Error::Duplicate`], distinct from generic I/O failures. `delete` of a
/// nonexistent id is a no-op so enqueue rollback stays idempotent.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &TranslationSession) -> Result<()>;
    async fn get(&self, id: &str) -> Result<TranslationSession>;
    async fn delete(&self, id: &str) -> Result<()>;
    /// Most-recent-first, up to `limit` (cap 100, default 50).
    async fn list(&self, limit: Option<u32>) -> Result<Vec<TranslationSession>>;
}

fn effective_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(LIST_DEFAULT_LIMIT).min(LIST_MAX_LIMIT)
}

/// SQLx implementation of [`SessionRepository`].
pub struct SqlxSessionRepository {
    pool: PgPool,
}

impl SqlxSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &TranslationSession) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions
                (id, source_type, source_uri, target_language,
                 enable_dubbing, latency_tolerance_ms, model_profile)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&session.id)
        .bind(session.source.kind.as_str())
        .bind(&session.source.uri)
        .bind(&session.target_language)
        .bind(session.options.enable_dubbing)
        .bind(session.options.latency_tolerance_ms as i32)
        .bind(session.options.model_profile.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    Err(Error::duplicate(&session.id))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn get(&self, id: &str) -> Result<TranslationSession> {
        sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("session", id))?
            .try_into()
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, limit: Option<u32>) -> Result<Vec<TranslationSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions ORDER BY created_at DESC LIMIT $1",
        )
        .bind(effective_limit(limit) as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

/// In-memory implementation of [`SessionRepository`] for test wiring and
/// the in-process deployment mode.
#[derive(Default)]
pub struct MemorySessionRepository {
    sessions: Mutex<Vec<(TranslationSession, DateTime<Utc>)>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn create(&self, session: &TranslationSession) -> Result<()> {
        let mut sessions = self.sessions.lock();
        if sessions.iter().any(|(s, _)| s.id == session.id) {
            return Err(Error::duplicate(&session.id));
        }
        sessions.push((session.clone(), Utc::now()));
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<TranslationSession> {
        self.sessions
            .lock()
            .iter()
            .find(|(s, _)| s.id == id)
            .map(|(s, _)| s.clone())
            .ok_or_else(|| Error::not_found("session", id))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.lock().retain(|(s, _)| s.id != id);
        Ok(())
    }

    async fn list(&self, limit: Option<u32>) -> Result<Vec<TranslationSession>> {
        let sessions = self.sessions.lock();
        Ok(sessions
            .iter()
            .rev()
            .take(effective_limit(limit) as usize)
            .map(|(s, _)| s.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SessionOptions, SourceKind, SourceSpec};

    fn session(id: &str) -> TranslationSession {
        TranslationSession {
            id: id.to_string(),
            source: SourceSpec {
                kind: SourceKind::Playlist,
                uri: "https://example.com/x.m3u8".into(),
            },
            target_language: "es".into(),
            options: SessionOptions::default(),
        }
    }

    #[tokio::test]
    async fn create_twice_surfaces_duplicate() {
        let repo = MemorySessionRepository::new();
        repo.create(&session("session-one")).await.unwrap();

        let err = repo.create(&session("session-one")).await.unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let repo = MemorySessionRepository::new();
        let err = repo.get("absent-session").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let repo = MemorySessionRepository::new();
        repo.create(&session("session-one")).await.unwrap();
        repo.delete("session-one").await.unwrap();
        repo.delete("session-one").await.unwrap();
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn list_is_most_recent_first_and_capped() {
        let repo = MemorySessionRepository::new();
        for i in 0..5 {
            repo.create(&session(&format!("session-{i}"))).await.unwrap();
        }

        let listed = repo.list(Some(3)).await.unwrap();
        assert_eq!(
            listed.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            vec!["session-4", "session-3", "session-2"]
        );

        let all = repo.list(None).await.unwrap();
        assert_eq!(all.len(), 5);
    }
}
