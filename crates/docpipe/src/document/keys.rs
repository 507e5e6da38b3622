//! Key conventions shared by the object store and the record store.
//!
//! Object keys:
//! - uploads: `documents/<id>/original/<filename>`
//! - derived artifacts: `documents/<id>/processed/summary.json`
//!
//! Record keys: partition `DOC#<id>`, metadata sort key `META#v1`,
//! audit sort key `AUDIT#<timestamp>`.

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

pub const DOCUMENTS_PREFIX: &str = "documents";
pub const ORIGINAL_SEGMENT: &str = "original";
pub const PROCESSED_SUMMARY: &str = "processed/summary.json";

pub const PARTITION_PREFIX: &str = "DOC#";
pub const META_SORT_KEY: &str = "META#v1";
pub const AUDIT_SORT_PREFIX: &str = "AUDIT#";

/// Characters left untouched when a key is placed in a notification.
/// Space is handled separately and becomes `+`.
const NOTIFICATION_KEY_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b' ');

pub fn original_key(document_id: &str, filename: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        DOCUMENTS_PREFIX, document_id, ORIGINAL_SEGMENT, filename
    )
}

pub fn processed_key(document_id: &str) -> String {
    format!("{}/{}/{}", DOCUMENTS_PREFIX, document_id, PROCESSED_SUMMARY)
}

pub fn partition_key(document_id: &str) -> String {
    format!("{}{}", PARTITION_PREFIX, document_id)
}

pub fn audit_sort_key(timestamp: &str) -> String {
    format!("{}{}", AUDIT_SORT_PREFIX, timestamp)
}

/// Extracts the identity from a `DOC#<id>` partition key.
pub fn document_id_from_partition_key(pk: &str) -> Option<&str> {
    pk.strip_prefix(PARTITION_PREFIX).filter(|id| !id.is_empty())
}

/// Extracts the identity from an upload key of the form
/// `documents/<id>/original/<filename>`.
///
/// Anything else (other prefix, missing segments, empty identity or
/// filename) is not a document upload and yields `None`. The filename
/// part may itself contain `/`.
pub fn document_id_from_object_key(key: &str) -> Option<&str> {
    let mut parts = key.splitn(4, '/');
    let prefix = parts.next()?;
    let document_id = parts.next()?;
    let segment = parts.next()?;
    let filename = parts.next()?;

    if prefix != DOCUMENTS_PREFIX
        || document_id.is_empty()
        || segment != ORIGINAL_SEGMENT
        || filename.is_empty()
    {
        return None;
    }

    Some(document_id)
}

/// Encodes a key the way object-created notifications carry it:
/// percent-encoded, with spaces as `+`.
pub fn encode_notification_key(key: &str) -> String {
    utf8_percent_encode(key, NOTIFICATION_KEY_SET)
        .to_string()
        .replace(' ', "+")
}

/// Reverses [`encode_notification_key`]. Returns `None` when the decoded
/// bytes are not valid UTF-8.
pub fn decode_notification_key(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}
