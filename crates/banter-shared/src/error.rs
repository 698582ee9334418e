use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed rich-text document: {0}")]
    RichText(String),
}
