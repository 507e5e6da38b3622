use super::record::{AuditEventType, ObjectLocation};
use super::status::DocumentStatus;

/// Field changes carried by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionChanges {
    Uploaded {
        page_count: u32,
        text_preview: String,
    },
    Processed {
        processed_at: String,
        processing_version: u32,
        output: ObjectLocation,
    },
}

/// A single step along the status chain, plus the fields it sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: DocumentStatus,
    pub to: DocumentStatus,
    pub updated_at: String,
    pub changes: TransitionChanges,
}

impl Transition {
    /// `REGISTERED -> UPLOADED`, recording the extracted PDF metadata.
    pub fn uploaded(page_count: u32, text_preview: String, at: &str) -> Self {
        Self {
            from: DocumentStatus::Registered,
            to: DocumentStatus::Uploaded,
            updated_at: at.to_string(),
            changes: TransitionChanges::Uploaded {
                page_count,
                text_preview,
            },
        }
    }

    /// `UPLOADED -> PROCESSED`, recording the artifact location.
    pub fn processed(processing_version: u32, output: ObjectLocation, at: &str) -> Self {
        Self {
            from: DocumentStatus::Uploaded,
            to: DocumentStatus::Processed,
            updated_at: at.to_string(),
            changes: TransitionChanges::Processed {
                processed_at: at.to_string(),
                processing_version,
                output,
            },
        }
    }

    pub fn audit_event(&self) -> AuditEventType {
        AuditEventType::for_status(self.to)
    }
}

/// Write predicate for applying a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionGuard {
    /// Apply only if the stored status still equals `transition.from`.
    /// The status field is the fencing token.
    ExpectCurrent,
    /// Apply regardless of the stored status.
    Unconditional,
}

/// Result of applying a transition to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    /// The record exists but its status did not match the guard.
    /// Not an error: another delivery already advanced it.
    PreconditionFailed { current: DocumentStatus },
    /// No metadata record exists for the identity.
    Missing,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_follow_chain() {
        let uploaded = Transition::uploaded(3, "preview".to_string(), "t1");
        assert!(uploaded.from.can_advance_to(uploaded.to));
        assert_eq!(uploaded.audit_event(), AuditEventType::DocumentUploaded);

        let processed = Transition::processed(
            1,
            ObjectLocation::new("b", "documents/x/processed/summary.json"),
            "t2",
        );
        assert!(processed.from.can_advance_to(processed.to));
        assert_eq!(processed.audit_event(), AuditEventType::DocumentProcessed);
    }

    #[test]
    fn test_processed_transition_stamps_both_timestamps() {
        let t = Transition::processed(1, ObjectLocation::new("b", "k"), "2026-02-01T00:00:00Z");
        assert_eq!(t.updated_at, "2026-02-01T00:00:00Z");
        match t.changes {
            TransitionChanges::Processed { processed_at, .. } => {
                assert_eq!(processed_at, "2026-02-01T00:00:00Z")
            }
            other => panic!("unexpected changes: {:?}", other),
        }
    }

    #[test]
    fn test_outcome_is_applied() {
        assert!(TransitionOutcome::Applied.is_applied());
        assert!(!TransitionOutcome::Missing.is_applied());
        assert!(!TransitionOutcome::PreconditionFailed {
            current: DocumentStatus::Processed
        }
        .is_applied());
    }
}
