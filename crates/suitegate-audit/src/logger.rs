//! Audit logger implementation.

use std::sync::Arc;
use suitegate_core::AuditConfig;

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventType, MutationKind};
use crate::storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};

/// The main audit logger.
pub struct AuditLogger {
    config: AuditConfig,
    storage: Arc<dyn AuditStorage>,
}

impl AuditLogger {
    /// Create a new audit logger with the given configuration.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let storage: Arc<dyn AuditStorage> = if !config.enabled {
            Arc::new(NullStorage::new())
        } else if config.stdout {
            Arc::new(DualStorage::new(config.log_path())?)
        } else {
            Arc::new(FileStorage::new(config.log_path())?)
        };

        Ok(Self { config, storage })
    }

    /// Create a logger with a custom storage backend.
    pub fn with_storage(config: AuditConfig, storage: Arc<dyn AuditStorage>) -> Self {
        Self { config, storage }
    }

    /// Create a disabled (no-op) logger.
    pub fn disabled() -> Self {
        Self {
            config: AuditConfig {
                enabled: false,
                ..Default::default()
            },
            storage: Arc::new(NullStorage::new()),
        }
    }

    /// Create a console-only logger (useful for development).
    pub fn console_only() -> Self {
        Self {
            config: AuditConfig {
                enabled: true,
                stdout: true,
                ..Default::default()
            },
            storage: Arc::new(ConsoleStorage::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Log an audit event.
    pub async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        if !self.config.enabled {
            return Ok(());
        }

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            operation = %event.operation,
            table = %event.table_id,
            "Audit event"
        );

        self.storage.store(event).await
    }

    /// Log a mutation, deriving its reversal instruction when missing.
    pub async fn log_mutation(&self, mut event: AuditEvent) -> Result<(), AuditError> {
        if event.event_type == AuditEventType::MutationExecuted && event.reversal.is_none() {
            event.reversal = Some(crate::event::ReversalInstruction::for_mutation(
                event.operation,
                &event.record_ids,
                event.prior_state.as_ref(),
            ));
        }
        self.log(event).await
    }

    /// Log a mutation that failed at the API.
    pub async fn log_mutation_failed(
        &self,
        operation: MutationKind,
        table_id: &str,
        record_ids: Vec<String>,
        error: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::MutationFailed, operation, table_id)
            .record_ids(record_ids)
            .error(error)
            .build();
        self.log(event).await
    }

    /// Log a mutation refused by the safety gate.
    pub async fn log_blocked(
        &self,
        operation: MutationKind,
        table_id: &str,
        record_ids: Vec<String>,
        reason: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::MutationBlocked, operation, table_id)
            .record_ids(record_ids)
            .error(reason)
            .safety_level("RED")
            .build();
        self.log(event).await
    }

    /// Query audit events with filters.
    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.storage.query(filter).await
    }

    /// Get an audit event by ID.
    pub async fn get(&self, event_id: uuid::Uuid) -> Result<Option<AuditEvent>, AuditError> {
        self.storage.get(event_id).await
    }

    /// Most recent events for a table, newest first.
    pub async fn recent_for_table(
        &self,
        table_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditEvent>, AuditError> {
        self.query(AuditFilter {
            table_id: Some(table_id.to_string()),
            limit: Some(limit),
            ..Default::default()
        })
        .await
    }
}

/// Filter for querying audit events.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub table_id: Option<String>,
    pub record_id: Option<String>,
    pub operation: Option<MutationKind>,
    pub event_type: Option<AuditEventType>,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl AuditFilter {
    /// Whether an event passes every set criterion.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if self.table_id.as_ref().is_some_and(|t| &event.table_id != t) {
            return false;
        }
        if self
            .record_id
            .as_ref()
            .is_some_and(|r| !event.record_ids.contains(r))
        {
            return false;
        }
        if self.operation.is_some_and(|o| event.operation != o) {
            return false;
        }
        if self.event_type.is_some_and(|t| event.event_type != t) {
            return false;
        }
        if self.start_time.is_some_and(|s| event.occurred_at < s) {
            return false;
        }
        if self.end_time.is_some_and(|e| event.occurred_at > e) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_disabled_logger() {
        let logger = AuditLogger::disabled();
        assert!(!logger.is_enabled());

        logger
            .log_mutation_failed(MutationKind::Create, "app1", vec![], "boom")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_console_only_logger() {
        let logger = AuditLogger::console_only();
        assert!(logger.is_enabled());
        logger
            .log_blocked(MutationKind::BulkDelete, "app1", vec!["r1".into()], "requires confirmation")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_log_mutation_adds_reversal() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuditConfig {
            enabled: true,
            directory: dir.path().to_path_buf(),
            stdout: false,
        };
        let logger = AuditLogger::new(config).unwrap();

        let event = AuditEvent::builder(AuditEventType::MutationExecuted, MutationKind::Delete, "app1")
            .record_id("r1")
            .prior_state(json!({"id": "r1", "title": "Keep me"}))
            .build();
        logger.log_mutation(event).await.unwrap();

        let events = logger.recent_for_table("app1", 10).await.unwrap();
        assert_eq!(events.len(), 1);
        let reversal = events[0].reversal.as_ref().unwrap();
        assert_eq!(reversal.operation, MutationKind::Create);
        assert!(dir.path().join("audit.log").exists());
    }

    #[test]
    fn test_filter_matches() {
        let event = AuditEvent::builder(AuditEventType::MutationExecuted, MutationKind::Update, "app1")
            .record_id("r1")
            .build();

        assert!(AuditFilter::default().matches(&event));
        assert!(AuditFilter {
            record_id: Some("r1".into()),
            operation: Some(MutationKind::Update),
            ..Default::default()
        }
        .matches(&event));
        assert!(!AuditFilter {
            event_type: Some(AuditEventType::MutationBlocked),
            ..Default::default()
        }
        .matches(&event));
    }
}
