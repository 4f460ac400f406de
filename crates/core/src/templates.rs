//! Template engine.
//!
//! Owns creation, mutation and consistency rules for the two template
//! variants (patient templates and file templates). A template is a
//! doctor-owned schema: an ordered set of named, typed, optionally
//! constrained fields that records and files are validated against.
//!
//! ## Consistency rules
//!
//! - Template names are unique per variant across *all* doctors (the
//!   variants live in separate collections, so the namespaces never
//!   collide with each other). See DESIGN.md for the open question on
//!   per-owner scoping.
//! - Field names are unique within one template, case-sensitive.
//! - Patient templates may not define the reserved identity field names.
//! - A template still referenced by records or files cannot be deleted.
//!
//! ## Atomicity
//!
//! Field mutations load the template, mutate it in memory and persist it
//! with a single whole-document replace, so a failed save leaves the
//! stored template untouched. The one genuinely two-step write (insert
//! template, then link it into the owning doctor's template list) is
//! compensated: if the link fails the inserted template is deleted again,
//! so no orphan survives a failed create.

use crate::constants::{
    FILES_COLLECTION, FILE_TEMPLATES_COLLECTION, PATIENT_TEMPLATES_COLLECTION, RECORDS_COLLECTION,
};
use crate::doctors::DoctorDirectory;
use crate::error::{RecordError, RecordResult};
use crate::fields::{self, FieldDefinition};
use crate::guards::{active_doctor, ensure_owner, require_found};
use chrono::{DateTime, Utc};
use expediente_store::{DocumentStore, Predicate, Query};
use expediente_types::{EntityId, NonEmptyText};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The two template variants. Same shape, separate namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Patient,
    File,
}

impl TemplateKind {
    /// Backing collection for this variant.
    pub fn collection(&self) -> &'static str {
        match self {
            TemplateKind::Patient => PATIENT_TEMPLATES_COLLECTION,
            TemplateKind::File => FILE_TEMPLATES_COLLECTION,
        }
    }

    /// Collection holding the documents that reference this variant.
    pub fn dependents_collection(&self) -> &'static str {
        match self {
            TemplateKind::Patient => RECORDS_COLLECTION,
            TemplateKind::File => FILES_COLLECTION,
        }
    }

    /// Parses the variant from its URL path segment.
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "patient" => Some(TemplateKind::Patient),
            "file" => Some(TemplateKind::File),
            _ => None,
        }
    }
}

/// A doctor-owned schema defining an ordered set of typed fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: EntityId,
    pub owner: EntityId,
    pub name: String,
    pub kind: TemplateKind,
    /// Allowed file categories; used by file templates only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    pub fields: Vec<FieldDefinition>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl Template {
    /// Returns the definition of the named field, if the template has one.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Outward-facing template representation.
///
/// Strips the owner and variant discriminator; the identifier is exposed
/// under the renamed `templateId` key.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateView {
    pub template_id: EntityId,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    pub fields: Vec<FieldDefinition>,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl From<Template> for TemplateView {
    fn from(template: Template) -> Self {
        Self {
            template_id: template.id,
            name: template.name,
            categories: template.categories,
            fields: template.fields,
            created_at: template.created_at,
            last_update: template.last_update,
        }
    }
}

/// Input for template creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Service owning all template operations.
pub struct TemplateService {
    store: Arc<dyn DocumentStore>,
    doctors: Arc<dyn DoctorDirectory>,
}

impl TemplateService {
    pub fn new(store: Arc<dyn DocumentStore>, doctors: Arc<dyn DoctorDirectory>) -> Self {
        Self { store, doctors }
    }

    fn name_in_use_predicate(name: &str, excluding: Option<EntityId>) -> Predicate {
        let name_eq = Predicate::Eq {
            path: "name".into(),
            value: name.into(),
        };
        match excluding {
            Some(id) => Predicate::And(vec![
                name_eq,
                Predicate::Ne {
                    path: "id".into(),
                    value: id.to_string().into(),
                },
            ]),
            None => name_eq,
        }
    }

    async fn load(&self, kind: TemplateKind, id: EntityId) -> RecordResult<Option<Template>> {
        let document = self
            .store
            .find_by_id(kind.collection(), &id.to_string())
            .await?;
        match document {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Loads a template after checking, concurrently, that the requester
    /// is an active doctor and the template exists; then checks ownership.
    async fn load_owned(
        &self,
        requester: EntityId,
        kind: TemplateKind,
        template_id: EntityId,
    ) -> RecordResult<Template> {
        let (doctor, template) = tokio::join!(
            active_doctor(self.doctors.as_ref(), requester),
            self.load(kind, template_id)
        );
        doctor?;
        let template = require_found(template?, RecordError::TemplateNotFound)?;
        ensure_owner(template.owner, requester)?;
        Ok(template)
    }

    async fn persist(&self, template: &Template) -> RecordResult<()> {
        let updated = self
            .store
            .update_by_id(
                template.kind.collection(),
                &template.id.to_string(),
                serde_json::to_value(template)?,
            )
            .await?;
        if !updated {
            return Err(RecordError::TemplateNotFound);
        }
        Ok(())
    }

    /// Creates a template and returns its id.
    ///
    /// # Errors
    ///
    /// `MissingFields` when name or fields are absent; the field-list
    /// errors of [`fields::validate_definitions`]; `DoctorNotFound` when
    /// the owner does not resolve to an active doctor; `NameInUse` when
    /// another template of the same variant already has this name.
    pub async fn create_template(
        &self,
        requester: EntityId,
        kind: TemplateKind,
        input: NewTemplate,
    ) -> RecordResult<EntityId> {
        let name =
            NonEmptyText::new(&input.name).map_err(|_| RecordError::MissingFields)?;
        if input.fields.is_empty() {
            return Err(RecordError::MissingFields);
        }
        fields::validate_definitions(&input.fields, kind)?;

        let name_predicate = Self::name_in_use_predicate(name.as_str(), None);
        let (doctor, name_clash) = tokio::join!(
            active_doctor(self.doctors.as_ref(), requester),
            self.store
                .find_one(kind.collection(), &name_predicate)
        );
        doctor?;
        if name_clash?.is_some() {
            return Err(RecordError::NameInUse);
        }

        let now = Utc::now();
        let template = Template {
            id: EntityId::new(),
            owner: requester,
            name: name.as_str().to_owned(),
            kind,
            categories: input.categories,
            fields: input.fields,
            created_at: now,
            last_update: now,
        };

        self.store
            .insert(
                kind.collection(),
                &template.id.to_string(),
                serde_json::to_value(&template)?,
            )
            .await?;

        // Compensate the insert if the owner link fails; no orphan
        // template may survive a failed create.
        if let Err(link_error) = self
            .doctors
            .link_template(requester, kind, template.id)
            .await
        {
            return match self
                .store
                .delete_by_id(kind.collection(), &template.id.to_string())
                .await
            {
                Ok(_) => Err(link_error),
                Err(cleanup_error) => Err(RecordError::CleanupAfterWriteFailed {
                    write_error: Box::new(link_error),
                    cleanup_error: cleanup_error.to_string(),
                }),
            };
        }

        Ok(template.id)
    }

    /// Renames a template. Ownership and name uniqueness are re-validated
    /// immediately before the write.
    pub async fn rename_template(
        &self,
        requester: EntityId,
        kind: TemplateKind,
        template_id: EntityId,
        new_name: &str,
    ) -> RecordResult<()> {
        let new_name = NonEmptyText::new(new_name).map_err(|_| RecordError::MissingFields)?;

        let mut template = self.load_owned(requester, kind, template_id).await?;

        let clash = self
            .store
            .find_one(
                kind.collection(),
                &Self::name_in_use_predicate(new_name.as_str(), Some(template_id)),
            )
            .await?;
        if clash.is_some() {
            return Err(RecordError::NameInUse);
        }

        template.name = new_name.as_str().to_owned();
        template.last_update = Utc::now();
        self.persist(&template).await
    }

    /// Deletes a template, refusing while records or files still reference it.
    pub async fn delete_template(
        &self,
        requester: EntityId,
        kind: TemplateKind,
        template_id: EntityId,
    ) -> RecordResult<()> {
        self.load_owned(requester, kind, template_id).await?;

        let dependents = self
            .store
            .count(
                kind.dependents_collection(),
                &Predicate::Eq {
                    path: "template".into(),
                    value: template_id.to_string().into(),
                },
            )
            .await?;
        if dependents > 0 {
            return Err(RecordError::OperationRejected);
        }

        let deleted = self
            .store
            .delete_by_id(kind.collection(), &template_id.to_string())
            .await?;
        if !deleted {
            return Err(RecordError::TemplateNotFound);
        }

        // A dangling id in the doctor's list is harmless; log and move on.
        if let Err(e) = self
            .doctors
            .unlink_template(requester, kind, template_id)
            .await
        {
            tracing::warn!(
                "failed to unlink deleted template {} from doctor {}: {}",
                template_id,
                requester,
                e
            );
        }

        Ok(())
    }

    /// Returns one owned template as its outward-facing view.
    pub async fn get_template(
        &self,
        requester: EntityId,
        kind: TemplateKind,
        template_id: EntityId,
    ) -> RecordResult<TemplateView> {
        let template = self.load_owned(requester, kind, template_id).await?;
        Ok(template.into())
    }

    /// Lists all templates of the given variant owned by the requester.
    pub async fn list_templates(
        &self,
        requester: EntityId,
        kind: TemplateKind,
    ) -> RecordResult<Vec<TemplateView>> {
        active_doctor(self.doctors.as_ref(), requester).await?;

        let documents = self
            .store
            .find(
                kind.collection(),
                &Query::filtered(Predicate::Eq {
                    path: "owner".into(),
                    value: requester.to_string().into(),
                }),
            )
            .await?;

        let mut views = Vec::with_capacity(documents.len());
        for document in documents {
            let template: Template = serde_json::from_value(document)?;
            views.push(template.into());
        }
        Ok(views)
    }

    /// Appends a field to a template after re-running full field validation
    /// against the existing field set.
    pub async fn add_field(
        &self,
        requester: EntityId,
        kind: TemplateKind,
        template_id: EntityId,
        field: FieldDefinition,
    ) -> RecordResult<()> {
        let mut template = self.load_owned(requester, kind, template_id).await?;

        fields::validate_definition(&field, kind)?;
        if template.field(&field.name).is_some() {
            return Err(RecordError::DuplicateFieldNames);
        }

        template.fields.push(field);
        template.last_update = Utc::now();
        self.persist(&template).await
    }

    /// Removes the named field from a template.
    pub async fn remove_field(
        &self,
        requester: EntityId,
        kind: TemplateKind,
        template_id: EntityId,
        field_name: &str,
    ) -> RecordResult<()> {
        let mut template = self.load_owned(requester, kind, template_id).await?;

        let index = template
            .fields
            .iter()
            .position(|f| f.name == field_name)
            .ok_or_else(|| RecordError::FieldNotFound {
                name: field_name.to_owned(),
            })?;

        template.fields.remove(index);
        template.last_update = Utc::now();
        self.persist(&template).await
    }

    /// Overwrites the named field in place with new data.
    ///
    /// The replacement is validated like a fresh field, and its name may
    /// not collide with a *different* existing field. The stored template
    /// only changes if the whole-document save succeeds.
    pub async fn update_field(
        &self,
        requester: EntityId,
        kind: TemplateKind,
        template_id: EntityId,
        old_field_name: &str,
        new_field: FieldDefinition,
    ) -> RecordResult<()> {
        let mut template = self.load_owned(requester, kind, template_id).await?;

        let index = template
            .fields
            .iter()
            .position(|f| f.name == old_field_name)
            .ok_or_else(|| RecordError::FieldNotFound {
                name: old_field_name.to_owned(),
            })?;

        fields::validate_definition(&new_field, kind)?;

        let collides = template
            .fields
            .iter()
            .enumerate()
            .any(|(i, f)| i != index && f.name == new_field.name);
        if collides {
            return Err(RecordError::NameConflict {
                name: new_field.name,
            });
        }

        template.fields[index] = new_field;
        template.last_update = Utc::now();
        self.persist(&template).await
    }
}
