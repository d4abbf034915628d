#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),
    #[error("failed to serialize bundle: {0}")]
    Serialization(serde_json::Error),
}

pub type PreprocessResult<T> = std::result::Result<T, PreprocessError>;
