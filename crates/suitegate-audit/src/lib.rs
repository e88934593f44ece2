//! # suitegate-audit
//!
//! Audit logging of record mutations made through the Suitegate MCP server.
//!
//! - Every executed, failed, previewed or blocked mutation becomes an
//!   [`AuditEvent`]
//! - Executed mutations carry a [`ReversalInstruction`]: create is undone
//!   by delete, update by an update with the prior state, delete by a create
//!   with the prior state
//! - Events are stored as JSON Lines (file) and/or human-readable lines
//!   (stderr)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use suitegate_audit::{AuditEvent, AuditEventType, AuditLogger, MutationKind};
//! use suitegate_core::AuditConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let logger = AuditLogger::new(AuditConfig::default())?;
//!
//! let event = AuditEvent::builder(AuditEventType::MutationExecuted, MutationKind::Create, "app1")
//!     .record_id("rec_123")
//!     .build();
//! logger.log_mutation(event).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::AuditError;
pub use event::{AuditEvent, AuditEventBuilder, AuditEventType, MutationKind, ReversalInstruction};
pub use logger::{AuditFilter, AuditLogger};
pub use storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, NullStorage};
