//! Error taxonomy for the expediente core.
//!
//! Every business-rule violation has its own variant with a stable message,
//! so the HTTP layer can render `{status, message}` pairs that clients can
//! branch on reliably. Unexpected store or serialization failures are
//! wrapped and reported as internal errors without leaking detail.

use crate::fields::FieldType;
use expediente_files::BlobError;
use expediente_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("missing mandatory fields")]
    MissingFields,
    #[error("patient names and last names are required")]
    MissingNameFields,
    #[error("invalid identifier")]
    InvalidIdentifier,

    #[error("doctor not found")]
    DoctorNotFound,
    #[error("template not found")]
    TemplateNotFound,
    #[error("record not found")]
    RecordNotFound,
    #[error("file not found")]
    FileNotFound,
    #[error("field not found: {name}")]
    FieldNotFound { name: String },

    #[error("doctor does not own this resource")]
    NotOwner,

    #[error("field name is reserved: {name}")]
    ReservedFieldName { name: String },
    #[error("duplicate field names in template")]
    DuplicateFieldNames,
    #[error("choice field requires at least one option: {name}")]
    ChoiceMissingOptions { name: String },
    #[error("field description is required: {name}")]
    MissingFieldDescription { name: String },

    #[error("template name already in use")]
    NameInUse,
    #[error("field name already in use: {name}")]
    NameConflict { name: String },

    #[error("invalid value type for field '{field}': expected {expected}")]
    InvalidFieldType { field: String, expected: FieldType },
    #[error("invalid value for field '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },
    #[error("missing required template field: {name}")]
    MissingFieldsInTemplate { name: String },
    #[error("field does not belong to template: {name}")]
    UnknownField { name: String },
    #[error("category does not belong to template: {category}")]
    UnknownCategory { category: String },

    #[error("unsupported operation '{operation}' for field type {field_type}")]
    UnsupportedOperation {
        operation: String,
        field_type: FieldType,
    },
    #[error("invalid number format in filter")]
    InvalidNumberFormat,
    #[error("invalid date format in filter")]
    InvalidDateFormat,

    #[error("operation rejected: template is still referenced")]
    OperationRejected,

    #[error(
        "write failed and compensation also failed: write={write_error}; cleanup={cleanup_error}"
    )]
    CleanupAfterWriteFailed {
        #[source]
        write_error: Box<RecordError>,
        cleanup_error: String,
    },

    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("document store failure: {0}")]
    Store(#[from] StoreError),
    #[error("blob store failure: {0}")]
    Blob(#[from] BlobError),
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;

impl RecordError {
    /// HTTP-class status code for this outcome.
    ///
    /// 400 missing/malformed input, 403 not owner, 404 not found, 405
    /// field-type/value violation, 406 field name in use, 409 template name
    /// in use or dependency blocks deletion, 500 unexpected.
    pub fn status(&self) -> u16 {
        match self {
            RecordError::MissingFields
            | RecordError::MissingNameFields
            | RecordError::InvalidIdentifier
            | RecordError::ReservedFieldName { .. }
            | RecordError::DuplicateFieldNames
            | RecordError::ChoiceMissingOptions { .. }
            | RecordError::MissingFieldDescription { .. }
            | RecordError::MissingFieldsInTemplate { .. }
            | RecordError::UnknownField { .. }
            | RecordError::UnknownCategory { .. }
            | RecordError::UnsupportedOperation { .. }
            | RecordError::InvalidNumberFormat
            | RecordError::InvalidDateFormat => 400,

            RecordError::NotOwner => 403,

            RecordError::DoctorNotFound
            | RecordError::TemplateNotFound
            | RecordError::RecordNotFound
            | RecordError::FileNotFound
            | RecordError::FieldNotFound { .. } => 404,

            RecordError::InvalidFieldType { .. } | RecordError::InvalidFieldValue { .. } => 405,

            RecordError::NameConflict { .. } => 406,

            RecordError::NameInUse | RecordError::OperationRejected => 409,

            // A stored value that cannot be cast by a filter is a malformed
            // request, not a server fault.
            RecordError::Store(StoreError::Cast { .. }) => 400,

            RecordError::CleanupAfterWriteFailed { .. }
            | RecordError::Serialization(_)
            | RecordError::Store(_)
            | RecordError::Blob(_) => 500,
        }
    }
}
