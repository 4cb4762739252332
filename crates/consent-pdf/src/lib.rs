//! Consent document PDF generation
//!
//! Turns plain consent text into a minimal paginated PDF using lopdf:
//! fixed margins, a single base-14 font and character-count word wrap.
//! Also hosts the small PDF checks the API applies to uploads.

pub mod error;
pub mod layout;
pub mod render;

pub use error::PdfError;
pub use layout::{wrap_text, TextLayout, A4_HEIGHT, A4_WIDTH};
pub use render::{encode_win_ansi, render_text, write_text_pdf, RenderedPdf};

/// PDF files start with this header
pub const PDF_MAGIC: &[u8] = b"%PDF-";

/// Cheap content sniff: does the buffer start with the PDF header?
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// Parse PDF bytes and return page count
pub fn page_count(bytes: &[u8]) -> Result<usize, PdfError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| PdfError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len())
}
