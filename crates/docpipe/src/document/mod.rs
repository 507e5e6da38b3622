//! Document identity, lifecycle status, key conventions and the transition
//! rules shared by the ingest and processing handlers.

pub mod keys;
pub mod record;
pub mod status;
pub mod transition;

use chrono::{SecondsFormat, Utc};

pub use record::{AuditEntry, AuditEventType, DocumentRecord, ObjectLocation};
pub use status::{DocumentStatus, UnknownStatus};
pub use transition::{Transition, TransitionChanges, TransitionGuard, TransitionOutcome};

/// Value of the metadata record `version` field.
pub const RECORD_VERSION: i64 = 1;

/// Marker written into derived artifacts and the PROCESSED transition.
pub const PROCESSING_VERSION: u32 = 1;

/// Maximum length of a text preview, in characters.
pub const PREVIEW_MAX_CHARS: usize = 500;

/// Generates a new opaque document identity.
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current UTC time as an ISO-8601 string with microsecond precision.
///
/// Fixed width, so lexical order matches chronological order.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
