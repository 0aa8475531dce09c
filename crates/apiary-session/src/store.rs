use std::path::PathBuf;

use apiary_core::{ApiaryError, ApiaryResult};
use async_trait::async_trait;
use uuid::Uuid;

use crate::session::SwarmSession;

/// Boundary trait for durable session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists the session, overwriting any previous version.
    async fn save(&self, session: &SwarmSession) -> ApiaryResult<()>;
    /// Loads a session by id, or `None` if it was never saved.
    async fn load(&self, id: Uuid) -> ApiaryResult<Option<SwarmSession>>;
    /// Loads every session owned by `user_id`.
    async fn load_user_sessions(&self, user_id: Uuid) -> ApiaryResult<Vec<SwarmSession>>;
}

/// File-based session store (one JSON file per session).
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Creates the store, creating `dir` if needed.
    pub async fn new(dir: PathBuf) -> ApiaryResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn session_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, session: &SwarmSession) -> ApiaryResult<()> {
        let path = self.session_path(session.id);
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    async fn load(&self, id: Uuid) -> ApiaryResult<Option<SwarmSession>> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(path).await?;
        let session: SwarmSession = serde_json::from_str(&data)
            .map_err(|e| ApiaryError::Session(format!("failed to parse session {id}: {e}")))?;
        Ok(Some(session))
    }

    async fn load_user_sessions(&self, user_id: Uuid) -> ApiaryResult<Vec<SwarmSession>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(ToString::to_string) else {
                continue;
            };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            let Ok(id) = Uuid::parse_str(stem) else {
                continue;
            };
            if let Some(session) = self.load(id).await? {
                if session.user_id == user_id {
                    sessions.push(session);
                }
            }
        }
        Ok(sessions)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use apiary_core::{ComplexTask, TaskPriority};

    fn session_for(user_id: Uuid) -> SwarmSession {
        let coordinator = Uuid::new_v4();
        SwarmSession::new(
            user_id,
            vec![coordinator],
            coordinator,
            ComplexTask::new("persist me", TaskPriority::Low),
        )
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();

        let session = session_for(Uuid::new_v4());
        store.save(&session).await.unwrap();

        let loaded = store.load(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.task.description, "persist me");
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();
        assert!(store.load(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_user_sessions_filters_by_owner() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();

        let user = Uuid::new_v4();
        let mine_a = session_for(user);
        let mine_b = session_for(user);
        let theirs = session_for(Uuid::new_v4());
        store.save(&mine_a).await.unwrap();
        store.save(&mine_b).await.unwrap();
        store.save(&theirs).await.unwrap();

        let mine = store.load_user_sessions(user).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|s| s.user_id == user));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf()).await.unwrap();

        let mut session = session_for(Uuid::new_v4());
        store.save(&session).await.unwrap();
        session.set_status(crate::SessionStatus::Active).unwrap();
        store.save(&session).await.unwrap();

        let loaded = store.load(session.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, crate::SessionStatus::Active);
    }
}
