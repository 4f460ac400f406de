//! Doctor identity and ownership resolution.
//!
//! The core never authenticates anybody; an external token-scope checker
//! hands it a doctor role id. This module resolves that id to a doctor
//! document (and its `is_active` flag) through the [`DoctorDirectory`]
//! collaborator, and keeps the doctor's lists of owned template ids in
//! sync as templates are created and deleted.

use crate::constants::DOCTORS_COLLECTION;
use crate::error::{RecordError, RecordResult};
use crate::templates::TemplateKind;
use async_trait::async_trait;
use expediente_store::DocumentStore;
use expediente_types::EntityId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A doctor as stored in the `doctors` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: EntityId,
    pub names: String,
    pub last_names: String,
    pub is_active: bool,
    #[serde(default)]
    pub patient_templates: Vec<EntityId>,
    #[serde(default)]
    pub file_templates: Vec<EntityId>,
}

impl Doctor {
    fn templates_mut(&mut self, kind: TemplateKind) -> &mut Vec<EntityId> {
        match kind {
            TemplateKind::Patient => &mut self.patient_templates,
            TemplateKind::File => &mut self.file_templates,
        }
    }
}

/// Identity/ownership resolver contract.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    /// Resolves a doctor role id to its document, if any.
    async fn find_by_role_id(&self, id: EntityId) -> RecordResult<Option<Doctor>>;

    /// Registers a doctor. Used by bootstrap and tests.
    async fn register(&self, doctor: Doctor) -> RecordResult<()>;

    /// Appends a template id to the doctor's owned-template list.
    async fn link_template(
        &self,
        doctor_id: EntityId,
        kind: TemplateKind,
        template_id: EntityId,
    ) -> RecordResult<()>;

    /// Removes a template id from the doctor's owned-template list.
    async fn unlink_template(
        &self,
        doctor_id: EntityId,
        kind: TemplateKind,
        template_id: EntityId,
    ) -> RecordResult<()>;
}

/// [`DoctorDirectory`] backed by the document store.
pub struct StoreDoctorDirectory {
    store: Arc<dyn DocumentStore>,
}

impl StoreDoctorDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn load(&self, id: EntityId) -> RecordResult<Option<Doctor>> {
        let document = self
            .store
            .find_by_id(DOCTORS_COLLECTION, &id.to_string())
            .await?;
        match document {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, doctor: &Doctor) -> RecordResult<()> {
        let updated = self
            .store
            .update_by_id(
                DOCTORS_COLLECTION,
                &doctor.id.to_string(),
                serde_json::to_value(doctor)?,
            )
            .await?;
        if !updated {
            return Err(RecordError::DoctorNotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl DoctorDirectory for StoreDoctorDirectory {
    async fn find_by_role_id(&self, id: EntityId) -> RecordResult<Option<Doctor>> {
        self.load(id).await
    }

    async fn register(&self, doctor: Doctor) -> RecordResult<()> {
        self.store
            .insert(
                DOCTORS_COLLECTION,
                &doctor.id.to_string(),
                serde_json::to_value(&doctor)?,
            )
            .await?;
        Ok(())
    }

    async fn link_template(
        &self,
        doctor_id: EntityId,
        kind: TemplateKind,
        template_id: EntityId,
    ) -> RecordResult<()> {
        let mut doctor = self
            .load(doctor_id)
            .await?
            .ok_or(RecordError::DoctorNotFound)?;
        let templates = doctor.templates_mut(kind);
        if !templates.contains(&template_id) {
            templates.push(template_id);
        }
        self.save(&doctor).await
    }

    async fn unlink_template(
        &self,
        doctor_id: EntityId,
        kind: TemplateKind,
        template_id: EntityId,
    ) -> RecordResult<()> {
        let mut doctor = self
            .load(doctor_id)
            .await?
            .ok_or(RecordError::DoctorNotFound)?;
        doctor.templates_mut(kind).retain(|id| *id != template_id);
        self.save(&doctor).await
    }
}

/// Builds an active doctor for use in tests across the crate.
#[cfg(test)]
pub(crate) fn test_doctor(id: EntityId) -> Doctor {
    Doctor {
        id,
        names: "Gabriela".into(),
        last_names: "Mendez".into(),
        is_active: true,
        patient_templates: Vec::new(),
        file_templates: Vec::new(),
    }
}
