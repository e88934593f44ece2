//! Audit storage backends.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::AuditError;
use crate::event::AuditEvent;
use crate::logger::AuditFilter;

/// Trait for audit storage backends.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Store an audit event.
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError>;

    /// Query audit events with filters.
    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError>;

    /// Get an audit event by ID.
    async fn get(&self, event_id: Uuid) -> Result<Option<AuditEvent>, AuditError>;
}

/// Console storage.
///
/// Writes human-readable lines to stderr; stdout belongs to the stdio
/// transport.
#[derive(Debug, Default)]
pub struct ConsoleStorage;

impl ConsoleStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditStorage for ConsoleStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        eprintln!("{}", event.to_log_line());
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(vec![])
    }

    async fn get(&self, _event_id: Uuid) -> Result<Option<AuditEvent>, AuditError> {
        Ok(None)
    }
}

/// File storage: JSON Lines appended to a log file.
///
/// Events already in the file are read back at startup so they can be
/// queried alongside new ones.
pub struct FileStorage {
    path: PathBuf,
    events: RwLock<Vec<AuditEvent>>,
    // Serializes appends from concurrent tool calls.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStorage {
    /// Open (or create) the log file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuditError::InitializationFailed(format!(
                    "cannot create audit directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let events = match std::fs::read_to_string(&path) {
            Ok(content) => parse_lines(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            events: RwLock::new(events),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_lines(content: &str) -> Vec<AuditEvent> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<AuditEvent>(line) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable audit line");
                None
            }
        })
        .collect()
}

#[async_trait]
impl AuditStorage for FileStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        {
            let _guard = self.write_lock.lock().await;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
        }

        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        let events = self.events.read().map_err(|e| {
            AuditError::StorageError(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut results: Vec<AuditEvent> = events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        // Newest first.
        results.reverse();

        let offset = filter.offset.unwrap_or(0);
        let results = results.into_iter().skip(offset);
        Ok(match filter.limit {
            Some(limit) => results.take(limit).collect(),
            None => results.collect(),
        })
    }

    async fn get(&self, event_id: Uuid) -> Result<Option<AuditEvent>, AuditError> {
        let events = self.events.read().map_err(|e| {
            AuditError::StorageError(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(events.iter().find(|e| e.event_id == event_id).cloned())
    }
}

/// File storage mirrored to the console.
pub struct DualStorage {
    file: FileStorage,
    console: ConsoleStorage,
}

impl DualStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        Ok(Self {
            file: FileStorage::new(path)?,
            console: ConsoleStorage::new(),
        })
    }
}

#[async_trait]
impl AuditStorage for DualStorage {
    async fn store(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.console.store(event.clone()).await?;
        self.file.store(event).await
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.file.query(filter).await
    }

    async fn get(&self, event_id: Uuid) -> Result<Option<AuditEvent>, AuditError> {
        self.file.get(event_id).await
    }
}

/// Storage that discards everything.
#[derive(Debug, Default)]
pub struct NullStorage;

impl NullStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditStorage for NullStorage {
    async fn store(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(vec![])
    }

    async fn get(&self, _event_id: Uuid) -> Result<Option<AuditEvent>, AuditError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AuditEventType, MutationKind};

    #[tokio::test]
    async fn test_console_storage() {
        let storage = ConsoleStorage::new();
        let event = AuditEvent::new(AuditEventType::MutationExecuted, MutationKind::Create, "app1");
        storage.store(event).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_storage_query() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("logs").join("audit.log")).unwrap();

        let event1 = AuditEvent::builder(AuditEventType::MutationExecuted, MutationKind::Create, "app1").build();
        let event2 = AuditEvent::builder(AuditEventType::MutationExecuted, MutationKind::Delete, "app2").build();

        storage.store(event1).await.unwrap();
        storage.store(event2).await.unwrap();

        let filter = AuditFilter {
            table_id: Some("app1".to_string()),
            ..Default::default()
        };
        let results = storage.query(filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].table_id, "app1");
    }

    #[tokio::test]
    async fn test_file_storage_reloads_existing_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");

        let event = AuditEvent::new(AuditEventType::MutationFailed, MutationKind::Update, "app1");
        let id = event.event_id;
        FileStorage::new(&path).unwrap().store(event).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);

        let reopened = FileStorage::new(&path).unwrap();
        assert!(reopened.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_null_storage_discards() {
        let storage = NullStorage::new();
        storage
            .store(AuditEvent::new(AuditEventType::MutationExecuted, MutationKind::Create, "a"))
            .await
            .unwrap();
        assert!(storage.query(AuditFilter::default()).await.unwrap().is_empty());
    }
}
