use thiserror::Error;

/// Failures from planning or applying a propagation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A clone selection names a source model absent from the config sheet.
    #[error("source model '{model}' not found in the config sheet")]
    NotFound { model: String },
    /// A derived model already exists and the active policy rejects it.
    #[error("derived model '{model}' already exists in the config sheet")]
    DuplicateModel { model: String },
    /// A plan no longer matches the tables it was built from. The apply is
    /// abandoned with both tables untouched.
    #[error("integrity violation: {0}")]
    Integrity(String),
}
