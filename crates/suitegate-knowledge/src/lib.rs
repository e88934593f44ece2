//! # suitegate-knowledge
//!
//! Known SmartSuite API failure modes and the machinery that applies them to
//! an attempted operation:
//!
//! - [`KnowledgeBase`]: versioned corpus of [`KnowledgeEntry`] values, loaded
//!   from YAML/JSON and extended at runtime by a learning hook
//! - lookup with a bounded, time-limited [`MatchCache`]
//! - [`SafetyClassifier`]: GREEN/YELLOW/RED verdicts with confirmation gating
//! - [`CorrectionEngine`]: method, parameter and endpoint rewrites
//!
//! ```no_run
//! use suitegate_core::HttpMethod;
//! use suitegate_knowledge::{KnowledgeBase, KnowledgeProvider, OperationView, SafetyClassifier};
//!
//! let kb = KnowledgeBase::with_builtin();
//! let matches = kb
//!     .find_relevant_knowledge(HttpMethod::Get, "/applications/{id}/records", None)
//!     .unwrap_or_default();
//! let op = OperationView {
//!     method: HttpMethod::Get,
//!     endpoint: "/applications/{id}/records",
//!     payload: None,
//!     confirmed: false,
//! };
//! let verdict = SafetyClassifier::default().assess(&op, &matches);
//! println!("{} ({})", verdict.level, verdict.score);
//! ```

pub mod base;
pub mod cache;
pub mod correction;
pub mod entry;
pub mod error;
pub mod loader;
pub mod pattern;
pub mod safety;

pub use base::{
    KnowledgeBase, KnowledgeMatch, KnowledgeProvider, KnowledgeVersion, LearningResult, LoadSummary,
    ObservedOperation, OperationOutcome,
};
pub use cache::{CacheStats, MatchCache};
pub use correction::{
    CorrectableOperation, CorrectionEngine, CorrectionOutcome, finalize_endpoint, rename_parameter,
};
pub use entry::{
    Correction, EntryDefinition, EntryOrigin, FailureMode, KnowledgeEntry, SafetyLevel, Substitution,
};
pub use error::KnowledgeError;
pub use loader::{DocumentFormat, validate_file};
pub use pattern::{PatternMatcher, PayloadTrigger};
pub use safety::{
    CONFIRMATION_BLOCKER, CheckOutcome, OperationView, ProtocolValidation, SafetyAssessment,
    SafetyClassifier, SafetyWarning, WarningLevel, bulk_size, generate_warnings,
};
