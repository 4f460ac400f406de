//! Clinical file attachments.
//!
//! A clinical file ties three things together: a patient record it belongs
//! to, a file template whose metadata schema it satisfies, and a blob
//! holding the binary content. The document and the bytes are written to
//! different stores, so creation compensates a failed document insert by
//! removing the just-stored blob, and deletion only removes a blob once no
//! other file document references its key (content addressing means two
//! files with identical bytes share one blob).

use crate::constants::FILES_COLLECTION;
use crate::doctors::DoctorDirectory;
use crate::error::{RecordError, RecordResult};
use crate::fields::{FieldValue, SubmittedField};
use crate::guards::{active_doctor, ensure_owner, require_found};
use crate::query::{build_filter, build_sort, FilterClause, PageRequest, SortClause};
use crate::records::{validate_fields_against_template, Record, SearchResult};
use crate::templates::{Template, TemplateKind};
use chrono::{DateTime, Utc};
use expediente_files::{BlobMetadata, BlobStore};
use expediente_store::{DocumentStore, Predicate, Query};
use expediente_types::EntityId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Path of the validated metadata array inside a file document.
const METADATA_ARRAY: &str = "metadata";

/// A clinical file as stored in the `files` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalFile {
    pub id: EntityId,
    pub owner: EntityId,
    pub record: EntityId,
    pub template: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    pub metadata: Vec<FieldValue>,
    pub blob: BlobMetadata,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

/// Outward-facing file representation; the owner stays internal.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileView {
    pub file_id: EntityId,
    pub record: EntityId,
    pub template: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    pub metadata: Vec<FieldValue>,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl From<ClinicalFile> for FileView {
    fn from(file: ClinicalFile) -> Self {
        Self {
            file_id: file.id,
            record: file.record,
            template: file.template,
            name: file.name,
            category: file.category,
            pages: file.pages,
            metadata: file.metadata,
            size_bytes: file.blob.size_bytes,
            media_type: file.blob.media_type,
            created_at: file.created_at,
            last_update: file.last_update,
        }
    }
}

/// Input for file creation; the binary content travels separately.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileSubmission {
    pub record: EntityId,
    pub template: EntityId,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub pages: Option<u32>,
    #[serde(default)]
    pub metadata: Vec<SubmittedField>,
}

/// Input for editing a file's descriptive data; content is immutable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdate {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub pages: Option<u32>,
    #[serde(default)]
    pub metadata: Vec<SubmittedField>,
}

/// The bytes of a file plus what a client needs to serve them.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContent {
    pub name: String,
    pub bytes: Vec<u8>,
    pub media_type: Option<String>,
}

/// Declarative search request over the requester's files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileSearch {
    #[serde(default)]
    pub record: Option<EntityId>,
    #[serde(default)]
    pub template: Option<EntityId>,
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    #[serde(default)]
    pub sort: Vec<SortClause>,
    #[serde(default)]
    pub page: PageRequest,
}

/// Service owning all clinical-file operations.
pub struct FileService {
    store: Arc<dyn DocumentStore>,
    doctors: Arc<dyn DoctorDirectory>,
    blobs: Arc<dyn BlobStore>,
}

impl FileService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        doctors: Arc<dyn DoctorDirectory>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            store,
            doctors,
            blobs,
        }
    }

    async fn load_template(&self, template_id: EntityId) -> RecordResult<Option<Template>> {
        let document = self
            .store
            .find_by_id(TemplateKind::File.collection(), &template_id.to_string())
            .await?;
        match document {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn load_record(&self, record_id: EntityId) -> RecordResult<Option<Record>> {
        let document = self
            .store
            .find_by_id(
                crate::constants::RECORDS_COLLECTION,
                &record_id.to_string(),
            )
            .await?;
        match document {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn load_file(&self, file_id: EntityId) -> RecordResult<Option<ClinicalFile>> {
        let document = self
            .store
            .find_by_id(FILES_COLLECTION, &file_id.to_string())
            .await?;
        match document {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn load_owned(
        &self,
        requester: EntityId,
        file_id: EntityId,
    ) -> RecordResult<ClinicalFile> {
        let (doctor, file) = tokio::join!(
            active_doctor(self.doctors.as_ref(), requester),
            self.load_file(file_id)
        );
        doctor?;
        let file = require_found(file?, RecordError::FileNotFound)?;
        ensure_owner(file.owner, requester)?;
        Ok(file)
    }

    fn check_category(template: &Template, category: Option<&str>) -> RecordResult<()> {
        if template.categories.is_empty() {
            // Template declares no category vocabulary; anything goes.
            return Ok(());
        }
        match category {
            Some(c) if template.categories.iter().any(|known| known == c) => Ok(()),
            Some(c) => Err(RecordError::UnknownCategory {
                category: c.to_owned(),
            }),
            None => Err(RecordError::MissingFields),
        }
    }

    async fn blob_reference_count(&self, key: &str) -> RecordResult<u64> {
        Ok(self
            .store
            .count(
                FILES_COLLECTION,
                &Predicate::Eq {
                    path: "blob.key".into(),
                    value: key.into(),
                },
            )
            .await?)
    }

    /// Stores the content and creates the file document.
    ///
    /// The blob is written first; if the document insert then fails, the
    /// blob is removed again unless another file already shares it.
    pub async fn create_file(
        &self,
        requester: EntityId,
        submission: FileSubmission,
        content: &[u8],
    ) -> RecordResult<EntityId> {
        if submission.name.trim().is_empty() || content.is_empty() {
            return Err(RecordError::MissingFields);
        }

        let (doctor, template, record) = tokio::join!(
            active_doctor(self.doctors.as_ref(), requester),
            self.load_template(submission.template),
            self.load_record(submission.record)
        );
        doctor?;
        let template = require_found(template?, RecordError::TemplateNotFound)?;
        let record = require_found(record?, RecordError::RecordNotFound)?;
        ensure_owner(template.owner, requester)?;
        ensure_owner(record.owner, requester)?;

        Self::check_category(&template, submission.category.as_deref())?;
        let metadata = validate_fields_against_template(&template, &submission.metadata)?;

        let blob = self.blobs.put(content).await?;

        let now = Utc::now();
        let file = ClinicalFile {
            id: EntityId::new(),
            owner: requester,
            record: submission.record,
            template: submission.template,
            name: submission.name,
            category: submission.category,
            pages: submission.pages,
            metadata,
            blob,
            created_at: now,
            last_update: now,
        };

        if let Err(write_error) = self
            .store
            .insert(
                FILES_COLLECTION,
                &file.id.to_string(),
                serde_json::to_value(&file)?,
            )
            .await
        {
            let write_error = RecordError::from(write_error);
            // Content addressing: the blob may be shared, so only reap it
            // when no surviving document references the key.
            let cleanup = match self.blob_reference_count(&file.blob.key).await {
                Ok(0) => self
                    .blobs
                    .delete(&file.blob.key)
                    .await
                    .map_err(|e| e.to_string()),
                Ok(_) => Ok(()),
                Err(e) => Err(e.to_string()),
            };
            return match cleanup {
                Ok(()) => Err(write_error),
                Err(cleanup_error) => Err(RecordError::CleanupAfterWriteFailed {
                    write_error: Box::new(write_error),
                    cleanup_error,
                }),
            };
        }

        Ok(file.id)
    }

    /// Returns one owned file as its outward-facing view.
    pub async fn get_file(&self, requester: EntityId, file_id: EntityId) -> RecordResult<FileView> {
        let file = self.load_owned(requester, file_id).await?;
        Ok(file.into())
    }

    /// Returns the binary content of one owned file.
    pub async fn read_content(
        &self,
        requester: EntityId,
        file_id: EntityId,
    ) -> RecordResult<FileContent> {
        let file = self.load_owned(requester, file_id).await?;
        let bytes = self.blobs.get(&file.blob.key).await?;
        Ok(FileContent {
            name: file.name,
            bytes,
            media_type: file.blob.media_type,
        })
    }

    /// Replaces a file's descriptive data, re-validating the metadata
    /// against the template as it exists *now*. The content is immutable.
    pub async fn edit_file(
        &self,
        requester: EntityId,
        file_id: EntityId,
        update: FileUpdate,
    ) -> RecordResult<()> {
        if update.name.trim().is_empty() {
            return Err(RecordError::MissingFields);
        }

        let mut file = self.load_owned(requester, file_id).await?;
        let template = require_found(
            self.load_template(file.template).await?,
            RecordError::TemplateNotFound,
        )?;

        Self::check_category(&template, update.category.as_deref())?;
        file.metadata = validate_fields_against_template(&template, &update.metadata)?;
        file.name = update.name;
        file.category = update.category;
        file.pages = update.pages;
        file.last_update = Utc::now();

        let updated = self
            .store
            .update_by_id(
                FILES_COLLECTION,
                &file.id.to_string(),
                serde_json::to_value(&file)?,
            )
            .await?;
        if !updated {
            return Err(RecordError::FileNotFound);
        }
        Ok(())
    }

    /// Deletes one owned file. The document goes first; the blob is only
    /// removed once no other file references it, and a failed blob removal
    /// is logged rather than surfaced (the document is already gone).
    pub async fn delete_file(&self, requester: EntityId, file_id: EntityId) -> RecordResult<()> {
        let file = self.load_owned(requester, file_id).await?;

        let deleted = self
            .store
            .delete_by_id(FILES_COLLECTION, &file_id.to_string())
            .await?;
        if !deleted {
            return Err(RecordError::FileNotFound);
        }

        match self.blob_reference_count(&file.blob.key).await {
            Ok(0) => {
                if let Err(e) = self.blobs.delete(&file.blob.key).await {
                    tracing::warn!(
                        "failed to remove orphaned blob {} after deleting file {}: {}",
                        file.blob.key,
                        file_id,
                        e
                    );
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    "could not determine remaining references to blob {}: {}",
                    file.blob.key,
                    e
                );
            }
        }

        Ok(())
    }

    /// Searches the requester's files with declarative filters over the
    /// metadata array, plus sort and pagination.
    pub async fn search_files(
        &self,
        requester: EntityId,
        search: FileSearch,
    ) -> RecordResult<SearchResult<FileView>> {
        active_doctor(self.doctors.as_ref(), requester).await?;

        let mut scope = vec![Predicate::Eq {
            path: "owner".into(),
            value: requester.to_string().into(),
        }];
        if let Some(record_id) = search.record {
            scope.push(Predicate::Eq {
                path: "record".into(),
                value: record_id.to_string().into(),
            });
        }
        if let Some(template_id) = search.template {
            scope.push(Predicate::Eq {
                path: "template".into(),
                value: template_id.to_string().into(),
            });
        }
        scope.push(build_filter(&search.filters, METADATA_ARRAY)?);
        let predicate = Predicate::And(scope);

        let query = Query {
            predicate: predicate.clone(),
            sort: build_sort(&search.sort, METADATA_ARRAY),
            skip: search.page.skip(),
            limit: Some(search.page.limit),
        };

        let (documents, total) = tokio::join!(
            self.store.find(FILES_COLLECTION, &query),
            self.store.count(FILES_COLLECTION, &predicate)
        );

        let mut items = Vec::new();
        for document in documents? {
            let file: ClinicalFile = serde_json::from_value(document)?;
            items.push(file.into());
        }
        Ok(SearchResult {
            total: total?,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctors::{test_doctor, StoreDoctorDirectory};
    use crate::fields::{FieldDefinition, FieldType};
    use crate::query::LogicGate;
    use crate::records::{PatientSubmission, RecordService};
    use crate::templates::{NewTemplate, TemplateService};
    use expediente_files::LocalBlobStore;
    use expediente_store::memory::MemoryStore;
    use serde_json::json;

    struct Fixture {
        files: FileService,
        doctor_id: EntityId,
        record_id: EntityId,
        template_id: EntityId,
        _blob_dir: tempfile::TempDir,
    }

    /// Doctor, patient template + record, and a file template with a
    /// Laboratorio/Imagen category vocabulary and a described DATE field.
    async fn fixture() -> Fixture {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let directory = Arc::new(StoreDoctorDirectory::new(store.clone()));
        let doctor_id = EntityId::new();
        directory.register(test_doctor(doctor_id)).await.unwrap();

        let templates = TemplateService::new(store.clone(), directory.clone());
        let patient_template = templates
            .create_template(
                doctor_id,
                TemplateKind::Patient,
                NewTemplate {
                    name: "Consulta".into(),
                    fields: vec![FieldDefinition {
                        name: "Edad".into(),
                        field_type: FieldType::Number,
                        options: Vec::new(),
                        description: None,
                        required: true,
                    }],
                    categories: Vec::new(),
                },
            )
            .await
            .unwrap();

        let records = RecordService::new(store.clone(), directory.clone());
        let record_id = records
            .create_record(
                doctor_id,
                patient_template,
                PatientSubmission {
                    names: "Ana".into(),
                    last_names: "Perez".into(),
                    fields: vec![SubmittedField {
                        name: "Edad".into(),
                        value: json!(34),
                    }],
                },
            )
            .await
            .unwrap();

        let template_id = templates
            .create_template(
                doctor_id,
                TemplateKind::File,
                NewTemplate {
                    name: "Resultados".into(),
                    fields: vec![FieldDefinition {
                        name: "Fecha del Estudio".into(),
                        field_type: FieldType::Date,
                        options: Vec::new(),
                        description: Some("fecha en que se realizo el estudio".into()),
                        required: true,
                    }],
                    categories: vec!["Laboratorio".into(), "Imagen".into()],
                },
            )
            .await
            .unwrap();

        let blob_dir = tempfile::tempdir().expect("tempdir should create");
        let blobs = Arc::new(LocalBlobStore::new(blob_dir.path()).expect("blob store should open"));

        Fixture {
            files: FileService::new(store, directory, blobs),
            doctor_id,
            record_id,
            template_id,
            _blob_dir: blob_dir,
        }
    }

    fn submission(f: &Fixture, name: &str) -> FileSubmission {
        FileSubmission {
            record: f.record_id,
            template: f.template_id,
            name: name.into(),
            category: Some("Laboratorio".into()),
            pages: Some(2),
            metadata: vec![SubmittedField {
                name: "Fecha del Estudio".into(),
                value: json!("2024-03-01"),
            }],
        }
    }

    #[tokio::test]
    async fn test_create_get_and_read_content() {
        let f = fixture().await;
        let file_id = f
            .files
            .create_file(f.doctor_id, submission(&f, "Hemograma"), b"%PDF-1.4 fake")
            .await
            .expect("create should succeed");

        let view = f
            .files
            .get_file(f.doctor_id, file_id)
            .await
            .expect("get should succeed");
        assert_eq!(view.name, "Hemograma");
        assert_eq!(view.category.as_deref(), Some("Laboratorio"));
        assert_eq!(view.size_bytes, 13);

        let content = f
            .files
            .read_content(f.doctor_id, file_id)
            .await
            .expect("read should succeed");
        assert_eq!(content.bytes, b"%PDF-1.4 fake");
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let f = fixture().await;
        let err = f
            .files
            .create_file(f.doctor_id, submission(&f, "Vacio"), b"")
            .await
            .expect_err("empty content should fail");
        assert!(matches!(err, RecordError::MissingFields));
    }

    #[tokio::test]
    async fn test_category_outside_vocabulary_rejected() {
        let f = fixture().await;
        let mut s = submission(&f, "Hemograma");
        s.category = Some("Cardiologia".into());
        let err = f
            .files
            .create_file(f.doctor_id, s, b"bytes")
            .await
            .expect_err("unknown category should fail");
        assert!(matches!(
            err,
            RecordError::UnknownCategory { ref category } if category == "Cardiologia"
        ));

        let mut s = submission(&f, "Hemograma");
        s.category = None;
        let err = f
            .files
            .create_file(f.doctor_id, s, b"bytes")
            .await
            .expect_err("category is mandatory when the template declares a vocabulary");
        assert!(matches!(err, RecordError::MissingFields));
    }

    #[tokio::test]
    async fn test_metadata_validated_against_template() {
        let f = fixture().await;
        let mut s = submission(&f, "Hemograma");
        s.metadata = vec![SubmittedField {
            name: "Fecha del Estudio".into(),
            value: json!("01/03/2024"),
        }];
        let err = f
            .files
            .create_file(f.doctor_id, s, b"bytes")
            .await
            .expect_err("non-ISO date should fail");
        assert!(matches!(err, RecordError::InvalidFieldType { .. }));
    }

    #[tokio::test]
    async fn test_create_against_missing_record_fails() {
        let f = fixture().await;
        let mut s = submission(&f, "Hemograma");
        s.record = EntityId::new();
        let err = f
            .files
            .create_file(f.doctor_id, s, b"bytes")
            .await
            .expect_err("missing record should fail");
        assert!(matches!(err, RecordError::RecordNotFound));
    }

    #[tokio::test]
    async fn test_edit_updates_descriptive_data_only() {
        let f = fixture().await;
        let file_id = f
            .files
            .create_file(f.doctor_id, submission(&f, "Hemograma"), b"bytes")
            .await
            .unwrap();

        f.files
            .edit_file(
                f.doctor_id,
                file_id,
                FileUpdate {
                    name: "Hemograma Completo".into(),
                    category: Some("Imagen".into()),
                    pages: Some(3),
                    metadata: vec![SubmittedField {
                        name: "Fecha del Estudio".into(),
                        value: json!("2024-04-01"),
                    }],
                },
            )
            .await
            .expect("edit should succeed");

        let view = f.files.get_file(f.doctor_id, file_id).await.unwrap();
        assert_eq!(view.name, "Hemograma Completo");
        assert_eq!(view.category.as_deref(), Some("Imagen"));

        let content = f.files.read_content(f.doctor_id, file_id).await.unwrap();
        assert_eq!(content.bytes, b"bytes", "content is immutable");
    }

    #[tokio::test]
    async fn test_delete_removes_document_and_orphaned_blob() {
        let f = fixture().await;
        let file_id = f
            .files
            .create_file(f.doctor_id, submission(&f, "Hemograma"), b"unique-bytes")
            .await
            .unwrap();

        f.files
            .delete_file(f.doctor_id, file_id)
            .await
            .expect("delete should succeed");

        let err = f
            .files
            .get_file(f.doctor_id, file_id)
            .await
            .expect_err("deleted file should be gone");
        assert!(matches!(err, RecordError::FileNotFound));
    }

    #[tokio::test]
    async fn test_shared_blob_survives_deleting_one_referencing_file() {
        let f = fixture().await;
        let first = f
            .files
            .create_file(f.doctor_id, submission(&f, "Original"), b"same bytes")
            .await
            .unwrap();
        let second = f
            .files
            .create_file(f.doctor_id, submission(&f, "Copia"), b"same bytes")
            .await
            .unwrap();

        f.files.delete_file(f.doctor_id, first).await.unwrap();

        let content = f
            .files
            .read_content(f.doctor_id, second)
            .await
            .expect("surviving file must still resolve its content");
        assert_eq!(content.bytes, b"same bytes");
    }

    #[tokio::test]
    async fn test_search_filters_over_metadata() {
        let f = fixture().await;
        let mut early = submission(&f, "Estudio Enero");
        early.metadata = vec![SubmittedField {
            name: "Fecha del Estudio".into(),
            value: json!("2024-01-10"),
        }];
        f.files.create_file(f.doctor_id, early, b"a").await.unwrap();

        let mut late = submission(&f, "Estudio Junio");
        late.metadata = vec![SubmittedField {
            name: "Fecha del Estudio".into(),
            value: json!("2024-06-10"),
        }];
        f.files.create_file(f.doctor_id, late, b"b").await.unwrap();

        let result = f
            .files
            .search_files(
                f.doctor_id,
                FileSearch {
                    record: Some(f.record_id),
                    template: None,
                    filters: vec![FilterClause {
                        name: "Fecha del Estudio".into(),
                        field_type: FieldType::Date,
                        operation: "after".into(),
                        value: Some("2024-03-01".into()),
                        values: None,
                        logic_gate: LogicGate::And,
                    }],
                    sort: vec![],
                    page: PageRequest::default(),
                },
            )
            .await
            .expect("search should succeed");

        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].name, "Estudio Junio");
    }
}
