use lopdf::Document;

use super::{make_preview, PdfSummary};
use crate::error::ExtractError;

/// Extracts `(page_count, text_preview)` from PDF bytes.
///
/// The preview comes from the first page only. A first page whose text
/// cannot be decoded yields an empty preview rather than an error.
pub fn extract_metadata(bytes: &[u8]) -> Result<PdfSummary, ExtractError> {
    let _span = tracing::debug_span!("extract.pdf", bytes = bytes.len()).entered();

    if bytes.is_empty() {
        return Err(ExtractError::EmptyDocument);
    }

    let doc = Document::load_mem(bytes).map_err(|e| ExtractError::InvalidPdf(e.to_string()))?;
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;

    let text_preview = match pages.keys().next() {
        Some(&first) => match doc.extract_text(&[first]) {
            Ok(text) => make_preview(&text),
            Err(e) => {
                tracing::debug!("Could not extract text from page {}: {}", first, e);
                String::new()
            }
        },
        None => String::new(),
    };

    Ok(PdfSummary {
        page_count,
        text_preview,
    })
}
