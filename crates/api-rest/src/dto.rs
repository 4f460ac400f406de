//! Wire types for the REST surface.
//!
//! The HTTP layer owns its own request/response shapes and converts at the
//! boundary, so OpenAPI schema derives and JSON field naming never leak
//! into the core crates. Identifiers cross the wire as strings and are
//! parsed by the handlers.

use chrono::{DateTime, Utc};
use expediente_core::constants::DEFAULT_PAGE_SIZE;
use expediente_core::{
    FieldDefinition, FieldType, FieldValue, FileView, LogicGate, PageRequest, RecordView,
    SubmittedField, TemplateView,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Field types a template may declare.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldTypeDto {
    ShortText,
    Text,
    Number,
    Float,
    Date,
    Choice,
}

impl From<FieldTypeDto> for FieldType {
    fn from(dto: FieldTypeDto) -> Self {
        match dto {
            FieldTypeDto::ShortText => FieldType::ShortText,
            FieldTypeDto::Text => FieldType::Text,
            FieldTypeDto::Number => FieldType::Number,
            FieldTypeDto::Float => FieldType::Float,
            FieldTypeDto::Date => FieldType::Date,
            FieldTypeDto::Choice => FieldType::Choice,
        }
    }
}

impl From<FieldType> for FieldTypeDto {
    fn from(t: FieldType) -> Self {
        match t {
            FieldType::ShortText => FieldTypeDto::ShortText,
            FieldType::Text => FieldTypeDto::Text,
            FieldType::Number => FieldTypeDto::Number,
            FieldType::Float => FieldTypeDto::Float,
            FieldType::Date => FieldTypeDto::Date,
            FieldType::Choice => FieldTypeDto::Choice,
        }
    }
}

/// One field definition as sent and received over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FieldDefinitionDto {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldTypeDto,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl From<FieldDefinitionDto> for FieldDefinition {
    fn from(dto: FieldDefinitionDto) -> Self {
        FieldDefinition {
            name: dto.name,
            field_type: dto.field_type.into(),
            options: dto.options,
            description: dto.description,
            required: dto.required,
        }
    }
}

impl From<FieldDefinition> for FieldDefinitionDto {
    fn from(def: FieldDefinition) -> Self {
        FieldDefinitionDto {
            name: def.name,
            field_type: def.field_type.into(),
            options: def.options,
            description: def.description,
            required: def.required,
        }
    }
}

/// One submitted field value.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmittedFieldDto {
    pub name: String,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

impl From<SubmittedFieldDto> for SubmittedField {
    fn from(dto: SubmittedFieldDto) -> Self {
        SubmittedField {
            name: dto.name,
            value: dto.value,
        }
    }
}

/// One validated field value inside a record or file.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FieldValueDto {
    pub name: String,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl From<FieldValue> for FieldValueDto {
    fn from(v: FieldValue) -> Self {
        FieldValueDto {
            name: v.name,
            value: v.value,
            options: v.options,
        }
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplateReq {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinitionDto>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RenameReq {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRes {
    pub template_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    pub fields: Vec<FieldDefinitionDto>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub last_update: DateTime<Utc>,
}

impl From<TemplateView> for TemplateRes {
    fn from(view: TemplateView) -> Self {
        TemplateRes {
            template_id: view.template_id.to_string(),
            name: view.name,
            categories: view.categories,
            fields: view.fields.into_iter().map(Into::into).collect(),
            created_at: view.created_at,
            last_update: view.last_update,
        }
    }
}

/// Response for every creation endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedRes {
    pub id: String,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordReq {
    pub template_id: String,
    pub names: String,
    pub last_names: String,
    #[serde(default)]
    pub fields: Vec<SubmittedFieldDto>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditRecordReq {
    pub names: String,
    pub last_names: String,
    #[serde(default)]
    pub fields: Vec<SubmittedFieldDto>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordRes {
    pub record_id: String,
    pub template_id: String,
    pub names: String,
    pub last_names: String,
    pub fields: Vec<FieldValueDto>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub last_update: DateTime<Utc>,
}

impl From<RecordView> for RecordRes {
    fn from(view: RecordView) -> Self {
        RecordRes {
            record_id: view.record_id.to_string(),
            template_id: view.template.to_string(),
            names: view.names,
            last_names: view.last_names,
            fields: view.fields.into_iter().map(Into::into).collect(),
            created_at: view.created_at,
            last_update: view.last_update,
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogicGateDto {
    And,
    Or,
}

impl From<LogicGateDto> for LogicGate {
    fn from(dto: LogicGateDto) -> Self {
        match dto {
            LogicGateDto::And => LogicGate::And,
            LogicGateDto::Or => LogicGate::Or,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterClauseDto {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldTypeDto,
    pub operation: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub values: Option<Vec<String>>,
    #[serde(default)]
    pub logic_gate: Option<LogicGateDto>,
}

impl From<FilterClauseDto> for expediente_core::FilterClause {
    fn from(dto: FilterClauseDto) -> Self {
        expediente_core::FilterClause {
            name: dto.name,
            field_type: dto.field_type.into(),
            operation: dto.operation,
            value: dto.value,
            values: dto.values,
            logic_gate: dto.logic_gate.map(Into::into).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortModeDto {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SortClauseDto {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldTypeDto,
    pub mode: SortModeDto,
}

impl From<SortClauseDto> for expediente_core::SortClause {
    fn from(dto: SortClauseDto) -> Self {
        expediente_core::SortClause {
            name: dto.name,
            field_type: dto.field_type.into(),
            mode: match dto.mode {
                SortModeDto::Asc => expediente_core::SortMode::Asc,
                SortModeDto::Desc => expediente_core::SortMode::Desc,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct PageDto {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub page: u64,
}

fn default_limit() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageDto {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            page: 0,
        }
    }
}

impl From<PageDto> for PageRequest {
    fn from(dto: PageDto) -> Self {
        PageRequest {
            limit: dto.limit,
            page: dto.page,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchRecordsReq {
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterClauseDto>,
    #[serde(default)]
    pub sort: Vec<SortClauseDto>,
    #[serde(default)]
    pub page: Option<PageDto>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchRecordsRes {
    pub total: u64,
    pub items: Vec<RecordRes>,
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileReq {
    pub record_id: String,
    pub template_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub pages: Option<u32>,
    #[serde(default)]
    pub metadata: Vec<SubmittedFieldDto>,
    /// Base64-encoded binary content.
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditFileReq {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub pages: Option<u32>,
    #[serde(default)]
    pub metadata: Vec<SubmittedFieldDto>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileRes {
    pub file_id: String,
    pub record_id: String,
    pub template_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    pub metadata: Vec<FieldValueDto>,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String)]
    pub last_update: DateTime<Utc>,
}

impl From<FileView> for FileRes {
    fn from(view: FileView) -> Self {
        FileRes {
            file_id: view.file_id.to_string(),
            record_id: view.record.to_string(),
            template_id: view.template.to_string(),
            name: view.name,
            category: view.category,
            pages: view.pages,
            metadata: view.metadata.into_iter().map(Into::into).collect(),
            size_bytes: view.size_bytes,
            media_type: view.media_type,
            created_at: view.created_at,
            last_update: view.last_update,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileContentRes {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Base64-encoded binary content.
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilesReq {
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterClauseDto>,
    #[serde(default)]
    pub sort: Vec<SortClauseDto>,
    #[serde(default)]
    pub page: Option<PageDto>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchFilesRes {
    pub total: u64,
    pub items: Vec<FileRes>,
}

// ---------------------------------------------------------------------------
// Doctors and health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDoctorReq {
    pub names: String,
    pub last_names: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_clause_defaults_to_and_gate() {
        let dto: FilterClauseDto = serde_json::from_value(json!({
            "name": "Edad",
            "type": "NUMBER",
            "operation": "less_than",
            "value": "40"
        }))
        .unwrap();
        let clause: expediente_core::FilterClause = dto.into();
        assert_eq!(clause.logic_gate, LogicGate::And);
    }

    #[test]
    fn test_field_definition_round_trips_through_dto() {
        let def = FieldDefinition {
            name: "Estado Civil".into(),
            field_type: FieldType::Choice,
            options: vec!["Soltero".into(), "Casado".into()],
            description: None,
            required: true,
        };
        let dto: FieldDefinitionDto = def.clone().into();
        let back: FieldDefinition = dto.into();
        assert_eq!(back, def);
    }

    #[test]
    fn test_page_defaults_follow_core_page_size() {
        let parsed: PageDto = serde_json::from_value(json!({})).unwrap();
        assert_eq!(parsed.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(parsed.page, 0);
        assert_eq!(PageDto::default().limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_create_record_req_parses_camel_case() {
        let req: CreateRecordReq = serde_json::from_value(json!({
            "templateId": "a3a51e19-7a06-4a62-9ab1-0beef17dd512",
            "names": "Ana",
            "lastNames": "Perez",
            "fields": [{ "name": "Edad", "value": 34 }]
        }))
        .unwrap();
        assert_eq!(req.last_names, "Perez");
        assert_eq!(req.fields[0].value, json!(34));
    }
}
