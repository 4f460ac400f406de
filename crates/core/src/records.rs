//! Patient record engine.
//!
//! A record is a patient document shaped by one patient template: the two
//! fixed identity fields plus a validated name/value field array. Every
//! write re-validates the submitted fields against the *current* state of
//! the owning template, so a record edited after its template changed must
//! satisfy the new schema. Validation is fail-fast: the first offending
//! field aborts the whole write.

use crate::constants::RECORDS_COLLECTION;
use crate::doctors::DoctorDirectory;
use crate::error::{RecordError, RecordResult};
use crate::fields::{self, FieldValue, SubmittedField};
use crate::guards::{active_doctor, ensure_owner, require_found};
use crate::query::{build_filter, build_sort, FilterClause, PageRequest, SortClause};
use crate::templates::{Template, TemplateKind};
use chrono::{DateTime, Utc};
use expediente_store::{DocumentStore, Predicate, Query};
use expediente_types::EntityId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Path of the validated field array inside a record document.
const FIELDS_ARRAY: &str = "fields";

/// A patient record as stored in the `records` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: EntityId,
    pub owner: EntityId,
    pub template: EntityId,
    pub names: String,
    pub last_names: String,
    pub fields: Vec<FieldValue>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

/// Outward-facing record representation; the owner stays internal.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    pub record_id: EntityId,
    pub template: EntityId,
    pub names: String,
    pub last_names: String,
    pub fields: Vec<FieldValue>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl From<Record> for RecordView {
    fn from(record: Record) -> Self {
        Self {
            record_id: record.id,
            template: record.template,
            names: record.names,
            last_names: record.last_names,
            fields: record.fields,
            created_at: record.created_at,
            last_update: record.last_update,
        }
    }
}

/// Patient data as submitted by a client, before validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientSubmission {
    pub names: String,
    pub last_names: String,
    #[serde(default)]
    pub fields: Vec<SubmittedField>,
}

/// Declarative search request over the requester's records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordSearch {
    /// Restricts results to records of one template.
    #[serde(default)]
    pub template: Option<EntityId>,
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    #[serde(default)]
    pub sort: Vec<SortClause>,
    #[serde(default)]
    pub page: PageRequest,
}

/// One page of search results plus the total match count.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T> {
    pub total: u64,
    pub items: Vec<T>,
}

/// Validates a field submission against a template, returning the canonical
/// field array.
///
/// Walks the template's fields in declaration order: a required field with
/// no submission fails with `MissingFieldsInTemplate`, an optional one is
/// skipped, and present values are canonicalised through
/// [`fields::validate_value`]. Submitted names the template does not declare
/// fail with `UnknownField`. CHOICE values carry their option list
/// denormalised so searches never join back to the template.
pub fn validate_fields_against_template(
    template: &Template,
    submitted: &[SubmittedField],
) -> RecordResult<Vec<FieldValue>> {
    if let Some(unknown) = submitted
        .iter()
        .find(|s| template.field(&s.name).is_none())
    {
        return Err(RecordError::UnknownField {
            name: unknown.name.clone(),
        });
    }

    let mut validated = Vec::with_capacity(template.fields.len());
    for definition in &template.fields {
        let Some(submission) = submitted.iter().find(|s| s.name == definition.name) else {
            if definition.required {
                return Err(RecordError::MissingFieldsInTemplate {
                    name: definition.name.clone(),
                });
            }
            continue;
        };

        let value = fields::validate_value(definition, &submission.value)?;
        validated.push(FieldValue {
            name: definition.name.clone(),
            value,
            options: (definition.field_type == fields::FieldType::Choice)
                .then(|| definition.options.clone()),
        });
    }
    Ok(validated)
}

/// Service owning all patient-record operations.
pub struct RecordService {
    store: Arc<dyn DocumentStore>,
    doctors: Arc<dyn DoctorDirectory>,
}

impl RecordService {
    pub fn new(store: Arc<dyn DocumentStore>, doctors: Arc<dyn DoctorDirectory>) -> Self {
        Self { store, doctors }
    }

    async fn load_template(&self, template_id: EntityId) -> RecordResult<Option<Template>> {
        let document = self
            .store
            .find_by_id(TemplateKind::Patient.collection(), &template_id.to_string())
            .await?;
        match document {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn load_record(&self, record_id: EntityId) -> RecordResult<Option<Record>> {
        let document = self
            .store
            .find_by_id(RECORDS_COLLECTION, &record_id.to_string())
            .await?;
        match document {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Loads a record after checking, concurrently, that the requester is
    /// an active doctor and the record exists; then checks ownership.
    async fn load_owned(&self, requester: EntityId, record_id: EntityId) -> RecordResult<Record> {
        let (doctor, record) = tokio::join!(
            active_doctor(self.doctors.as_ref(), requester),
            self.load_record(record_id)
        );
        doctor?;
        let record = require_found(record?, RecordError::RecordNotFound)?;
        ensure_owner(record.owner, requester)?;
        Ok(record)
    }

    async fn persist(&self, record: &Record) -> RecordResult<()> {
        let updated = self
            .store
            .update_by_id(
                RECORDS_COLLECTION,
                &record.id.to_string(),
                serde_json::to_value(record)?,
            )
            .await?;
        if !updated {
            return Err(RecordError::RecordNotFound);
        }
        Ok(())
    }

    /// Creates a record under one of the requester's patient templates.
    ///
    /// # Errors
    ///
    /// `MissingNameFields` when either identity field is blank (checked
    /// before anything else); `TemplateNotFound`/`NotOwner` from the
    /// template lookup; the field-validation errors of
    /// [`validate_fields_against_template`].
    pub async fn create_record(
        &self,
        requester: EntityId,
        template_id: EntityId,
        submission: PatientSubmission,
    ) -> RecordResult<EntityId> {
        if submission.names.trim().is_empty() || submission.last_names.trim().is_empty() {
            return Err(RecordError::MissingNameFields);
        }

        let (doctor, template) = tokio::join!(
            active_doctor(self.doctors.as_ref(), requester),
            self.load_template(template_id)
        );
        doctor?;
        let template = require_found(template?, RecordError::TemplateNotFound)?;
        ensure_owner(template.owner, requester)?;

        let fields = validate_fields_against_template(&template, &submission.fields)?;

        let now = Utc::now();
        let record = Record {
            id: EntityId::new(),
            owner: requester,
            template: template_id,
            names: submission.names,
            last_names: submission.last_names,
            fields,
            created_at: now,
            last_update: now,
        };
        self.store
            .insert(
                RECORDS_COLLECTION,
                &record.id.to_string(),
                serde_json::to_value(&record)?,
            )
            .await?;
        Ok(record.id)
    }

    /// Returns one owned record as its outward-facing view.
    pub async fn get_record(
        &self,
        requester: EntityId,
        record_id: EntityId,
    ) -> RecordResult<RecordView> {
        let record = self.load_owned(requester, record_id).await?;
        Ok(record.into())
    }

    /// Replaces a record's identity fields and field array, re-validating
    /// the submission against the template as it exists *now*.
    pub async fn edit_record(
        &self,
        requester: EntityId,
        record_id: EntityId,
        submission: PatientSubmission,
    ) -> RecordResult<()> {
        if submission.names.trim().is_empty() || submission.last_names.trim().is_empty() {
            return Err(RecordError::MissingNameFields);
        }

        let mut record = self.load_owned(requester, record_id).await?;
        let template = require_found(
            self.load_template(record.template).await?,
            RecordError::TemplateNotFound,
        )?;

        record.fields = validate_fields_against_template(&template, &submission.fields)?;
        record.names = submission.names;
        record.last_names = submission.last_names;
        record.last_update = Utc::now();
        self.persist(&record).await
    }

    /// Deletes one owned record.
    pub async fn delete_record(&self, requester: EntityId, record_id: EntityId) -> RecordResult<()> {
        self.load_owned(requester, record_id).await?;
        let deleted = self
            .store
            .delete_by_id(RECORDS_COLLECTION, &record_id.to_string())
            .await?;
        if !deleted {
            return Err(RecordError::RecordNotFound);
        }
        Ok(())
    }

    /// Searches the requester's records with declarative filters, sort and
    /// pagination. `total` counts every match, ignoring the page window.
    pub async fn search_records(
        &self,
        requester: EntityId,
        search: RecordSearch,
    ) -> RecordResult<SearchResult<RecordView>> {
        active_doctor(self.doctors.as_ref(), requester).await?;

        let mut scope = vec![Predicate::Eq {
            path: "owner".into(),
            value: requester.to_string().into(),
        }];
        if let Some(template_id) = search.template {
            scope.push(Predicate::Eq {
                path: "template".into(),
                value: template_id.to_string().into(),
            });
        }
        scope.push(build_filter(&search.filters, FIELDS_ARRAY)?);
        let predicate = Predicate::And(scope);

        let query = Query {
            predicate: predicate.clone(),
            sort: build_sort(&search.sort, FIELDS_ARRAY),
            skip: search.page.skip(),
            limit: Some(search.page.limit),
        };

        let (documents, total) = tokio::join!(
            self.store.find(RECORDS_COLLECTION, &query),
            self.store.count(RECORDS_COLLECTION, &predicate)
        );

        let mut items = Vec::new();
        for document in documents? {
            let record: Record = serde_json::from_value(document)?;
            items.push(record.into());
        }
        Ok(SearchResult {
            total: total?,
            items,
        })
    }
}
