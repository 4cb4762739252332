use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Failed to render PDF: {0}")]
    RenderError(String),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
