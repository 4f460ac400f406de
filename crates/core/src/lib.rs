//! # Expediente Core
//!
//! Domain engine of the expediente clinical-record system: schema-defined
//! templates, validated patient records, clinical file attachments and the
//! declarative search that spans them.
//!
//! ## Architecture
//!
//! The crate is a set of services over two collaborator traits:
//!
//! - [`expediente_store::DocumentStore`] holds the JSON documents
//!   (templates, records, files, doctors)
//! - [`expediente_files::BlobStore`] holds binary content
//!
//! Each service re-checks identity, existence and ownership on every call;
//! nothing is cached between requests. All typed validation funnels through
//! [`fields`], so a value accepted anywhere in the system was accepted by
//! the same rules.
//!
//! ## Module map
//!
//! - [`fields`] - the closed field type system and value validation
//! - [`templates`] - doctor-owned schemas for records and files
//! - [`records`] - patient records validated against their template
//! - [`attachments`] - binary files with template-validated metadata
//! - [`query`] - declarative filter/sort translation for searches
//! - [`doctors`] / [`guards`] - identity resolution and ownership checks

pub mod attachments;
pub mod config;
pub mod constants;
pub mod doctors;
pub mod error;
pub mod fields;
pub mod guards;
pub mod query;
pub mod records;
pub mod templates;

pub use attachments::{FileContent, FileSearch, FileService, FileSubmission, FileUpdate, FileView};
pub use config::CoreConfig;
pub use doctors::{Doctor, DoctorDirectory, StoreDoctorDirectory};
pub use error::{RecordError, RecordResult};
pub use fields::{FieldDefinition, FieldType, FieldValue, SubmittedField};
pub use query::{FilterClause, LogicGate, PageRequest, SortClause, SortMode};
pub use records::{
    PatientSubmission, RecordSearch, RecordService, RecordView, SearchResult,
};
pub use templates::{NewTemplate, Template, TemplateKind, TemplateService, TemplateView};
