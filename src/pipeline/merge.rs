//! Stage B: concatenate documents in the order given.

use crate::model::Document;
use tracing::debug;

/// One document holding every page of `documents`, input order first, page
/// order second. No input yields an empty document.
pub fn merge<I>(documents: I) -> Document
where
    I: IntoIterator<Item = Document>,
{
    let mut merged = Document::new();
    for (i, doc) in documents.into_iter().enumerate() {
        debug!("Merging document {} ({} pages)", i + 1, doc.page_count());
        merged.append(doc);
    }
    merged
}
