//! Constants used throughout the expediente core crate.
//!
//! This module contains collection names and reserved identifiers to ensure
//! consistency across the codebase and make maintenance easier.

/// Collection name for patient templates.
pub const PATIENT_TEMPLATES_COLLECTION: &str = "patient_templates";

/// Collection name for file templates.
pub const FILE_TEMPLATES_COLLECTION: &str = "file_templates";

/// Collection name for patient records.
pub const RECORDS_COLLECTION: &str = "records";

/// Collection name for clinical file documents.
pub const FILES_COLLECTION: &str = "files";

/// Collection name for doctors.
pub const DOCTORS_COLLECTION: &str = "doctors";

/// Field names a patient template may never define.
///
/// These names are taken by the record's own identity fields and would
/// shadow them inside the dynamic field array.
pub const RESERVED_PATIENT_FIELD_NAMES: &[&str] = &["Nombres", "Apellidos"];

/// Default page size for search operations when the caller supplies none.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Default directory for binary content when no explicit directory is configured.
pub const DEFAULT_BLOB_DIR: &str = "expediente_data/blobs";
