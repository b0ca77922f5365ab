use std::path::{Path, PathBuf};

use tokio::task::spawn_blocking;
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    lock::{self, LockGuard},
    model::Session,
};

const INSTANCE_LOCK_FILENAME: &str = "otui.lock";

/// CRUD over `<dataDir>/sessions/<uuid>.json`, with a PID-embedded lock
/// file per session and one instance-wide lock per data directory.
pub struct SessionStore {
    data_dir: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    fn session_path(&self, id: Uuid) -> PathBuf {
        self.sessions_dir().join(format!("{id}.json"))
    }

    fn lock_path(&self, id: Uuid) -> PathBuf {
        self.sessions_dir().join(format!("{id}.lock"))
    }

    /// Locks and loads a session. The returned [`LockGuard`] must be held
    /// for as long as the session is open in this instance; dropping it
    /// releases the lock.
    pub async fn open(&self, id: Uuid) -> Result<(Session, LockGuard)> {
        let path = self.session_path(id);
        let lock_path = self.lock_path(id);
        let data_dir = self.data_dir.to_string_lossy().to_string();

        spawn_blocking(move || -> Result<(Session, LockGuard)> {
            if !path.exists() {
                return Err(Error::NotFound { id });
            }
            let guard = lock::acquire(&lock_path, &data_dir, || Error::SessionLocked { id })?;
            let raw = std::fs::read_to_string(&path)?;
            let session = serde_json::from_str(&raw)?;
            Ok((session, guard))
        })
        .await?
    }

    /// Creates a new session file and locks it in one step.
    pub async fn create(&self, session: &Session) -> Result<LockGuard> {
        let path = self.session_path(session.id);
        let lock_path = self.lock_path(session.id);
        let data_dir = self.data_dir.to_string_lossy().to_string();
        let id = session.id;
        let serialized = serde_json::to_string_pretty(session)?;

        spawn_blocking(move || -> Result<LockGuard> {
            let guard = lock::acquire(&lock_path, &data_dir, || Error::SessionLocked { id })?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            write_atomic_0600(&path, serialized.as_bytes())?;
            Ok(guard)
        })
        .await?
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path(session.id);
        let serialized = serde_json::to_string_pretty(session)?;
        spawn_blocking(move || write_atomic_0600(&path, serialized.as_bytes())).await??;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let path = self.session_path(id);
        let lock_path = self.lock_path(id);
        spawn_blocking(move || -> Result<()> {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
            if lock_path.exists() {
                std::fs::remove_file(&lock_path)?;
            }
            Ok(())
        })
        .await??;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Uuid>> {
        let dir = self.sessions_dir();
        spawn_blocking(move || -> Result<Vec<Uuid>> {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                return Ok(Vec::new());
            };
            let mut ids = Vec::new();
            for entry in entries.flatten() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if let Some(stem) = name.strip_suffix(".json")
                    && let Ok(id) = Uuid::parse_str(stem)
                {
                    ids.push(id);
                }
            }
            Ok(ids)
        })
        .await?
    }

    /// Case-insensitive substring search over message content across all
    /// session files, one hit per session, newest session first.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let dir = self.sessions_dir();
        let query = query.to_lowercase();

        spawn_blocking(move || -> Result<Vec<SearchHit>> {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                return Ok(Vec::new());
            };
            let mut hits = Vec::new();
            for entry in entries.flatten() {
                if hits.len() >= max_results {
                    break;
                }
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Ok(raw) = std::fs::read_to_string(&path) else {
                    continue;
                };
                let Ok(session) = serde_json::from_str::<Session>(&raw) else {
                    continue;
                };
                for message in &session.messages {
                    if message.content.to_lowercase().contains(&query) {
                        hits.push(SearchHit {
                            session_id: session.id,
                            session_name: session.name.clone(),
                            snippet: snippet_around(&message.content, &query),
                        });
                        break;
                    }
                }
            }
            Ok(hits)
        })
        .await?
    }

    /// Locks the data directory for this instance. Call before touching any
    /// session in it.
    pub fn lock_instance(&self) -> Result<LockGuard> {
        let path = self.data_dir.join(INSTANCE_LOCK_FILENAME);
        let data_dir = self.data_dir.to_string_lossy().to_string();
        lock::acquire(&path, &data_dir, || Error::InstanceLocked { path: data_dir.clone() })
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub session_id: Uuid,
    pub session_name: String,
    pub snippet: String,
}

fn snippet_around(content: &str, query_lower: &str) -> String {
    let lower = content.to_lowercase();
    let pos = lower.find(query_lower).unwrap_or(0);
    let start = pos.saturating_sub(40);
    let end = (pos + query_lower.len() + 60).min(content.len());
    content[start..end].to_string()
}

fn write_atomic_0600(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use otui_common::types::{Message, Role};

    #[tokio::test]
    async fn create_open_round_trips() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session = Session::new("test", "ollama", "llama3.1");
        let id = session.id;
        let guard = store.create(&session).await.unwrap();
        drop(guard);

        let (loaded, _guard) = store.open(id).await.unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.name, "test");
    }

    #[tokio::test]
    async fn open_while_locked_fails() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session = Session::new("test", "ollama", "llama3.1");
        let id = session.id;
        let _held = store.create(&session).await.unwrap();

        let result = store.open(id).await;
        assert!(matches!(result, Err(Error::SessionLocked { .. })));
    }

    #[tokio::test]
    async fn open_missing_session_is_not_found() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let result = store.open(Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_returns_created_sessions() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let a = Session::new("a", "ollama", "llama3.1");
        let b = Session::new("b", "openai", "gpt-4o");
        let (id_a, id_b) = (a.id, b.id);
        drop(store.create(&a).await.unwrap());
        drop(store.create(&b).await.unwrap());

        let ids = store.list().await.unwrap();
        assert!(ids.contains(&id_a));
        assert!(ids.contains(&id_b));
    }

    #[tokio::test]
    async fn delete_removes_session_and_lock() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session = Session::new("test", "ollama", "llama3.1");
        let id = session.id;
        drop(store.create(&session).await.unwrap());
        store.delete(id).await.unwrap();

        assert!(store.open(id).await.is_err());
        assert!(!store.session_path(id).exists());
    }

    #[tokio::test]
    async fn search_finds_matching_message() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut session = Session::new("findme", "ollama", "llama3.1");
        session.push_message(Message::new(Role::User, "what is the weather in berlin", 0));
        drop(store.create(&session).await.unwrap());
        store.save(&session).await.unwrap();

        let hits = store.search("weather", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].session_id, session.id);
    }

    #[tokio::test]
    async fn instance_lock_conflicts_across_instances() {
        let dir = tempdir().unwrap();
        let store_a = SessionStore::new(dir.path());
        let store_b = SessionStore::new(dir.path());
        let _held = store_a.lock_instance().unwrap();

        assert!(matches!(store_b.lock_instance(), Err(Error::InstanceLocked { .. })));
    }
}
