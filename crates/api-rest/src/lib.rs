//! # API REST
//!
//! REST surface of the expediente record system.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON wire types, base64 content, CORS)
//!
//! All domain decisions live in `expediente-core`; handlers authenticate,
//! parse identifiers, convert wire types and translate core errors into
//! `{status, message}` responses.

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod dto;
pub mod files;
pub mod records;
pub mod response;
pub mod templates;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use dto::{CreatedRes, HealthRes, RegisterDoctorReq};
use expediente_core::{
    Doctor, DoctorDirectory, FileService, RecordError, RecordService, TemplateService,
};
use expediente_files::BlobStore;
use expediente_store::DocumentStore;
use expediente_types::EntityId;
use response::{ApiResult, ApiSuccess};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub templates: Arc<TemplateService>,
    pub records: Arc<RecordService>,
    pub files: Arc<FileService>,
    pub doctors: Arc<dyn DoctorDirectory>,
}

impl AppState {
    /// Wires the core services over the given collaborators.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        doctors: Arc<dyn DoctorDirectory>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            templates: Arc::new(TemplateService::new(store.clone(), doctors.clone())),
            records: Arc::new(RecordService::new(store.clone(), doctors.clone())),
            files: Arc::new(FileService::new(store, doctors.clone(), blobs)),
            doctors,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        register_doctor,
        templates::create_template,
        templates::list_templates,
        templates::get_template,
        templates::rename_template,
        templates::delete_template,
        templates::add_field,
        templates::update_field,
        templates::remove_field,
        records::create_record,
        records::get_record,
        records::edit_record,
        records::delete_record,
        records::search_records,
        files::create_file,
        files::get_file,
        files::read_file_content,
        files::edit_file,
        files::delete_file,
        files::search_files,
    ),
    components(schemas(
        dto::HealthRes,
        dto::RegisterDoctorReq,
        dto::CreatedRes,
        dto::FieldTypeDto,
        dto::FieldDefinitionDto,
        dto::SubmittedFieldDto,
        dto::FieldValueDto,
        dto::NewTemplateReq,
        dto::RenameReq,
        dto::TemplateRes,
        dto::CreateRecordReq,
        dto::EditRecordReq,
        dto::RecordRes,
        dto::LogicGateDto,
        dto::SortModeDto,
        dto::FilterClauseDto,
        dto::SortClauseDto,
        dto::PageDto,
        dto::SearchRecordsReq,
        dto::SearchRecordsRes,
        dto::CreateFileReq,
        dto::EditFileReq,
        dto::FileRes,
        dto::FileContentRes,
        dto::SearchFilesReq,
        dto::SearchFilesRes,
        response::ErrorBody,
    ))
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint used by monitoring and load balancers.
#[axum::debug_handler]
pub async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Expediente REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/doctors",
    request_body = RegisterDoctorReq,
    responses(
        (status = 201, description = "Doctor registered", body = CreatedRes),
        (status = 400, description = "Missing names")
    )
)]
/// Registers a doctor and returns the role id to present in `x-doctor-id`.
#[axum::debug_handler]
pub async fn register_doctor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterDoctorReq>,
) -> ApiResult<ApiSuccess<CreatedRes>> {
    auth::validate_api_key(&headers)?;
    if req.names.trim().is_empty() || req.last_names.trim().is_empty() {
        return Err(RecordError::MissingNameFields.into());
    }
    let doctor = Doctor {
        id: EntityId::new(),
        names: req.names,
        last_names: req.last_names,
        is_active: true,
        patient_templates: Vec::new(),
        file_templates: Vec::new(),
    };
    let id = doctor.id;
    state.doctors.register(doctor).await?;
    Ok(ApiSuccess::created(
        "Doctor registered",
        CreatedRes { id: id.to_string() },
    ))
}

/// Builds the complete application router, Swagger UI and CORS included.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/doctors", post(register_doctor))
        .route(
            "/templates/:kind",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/templates/:kind/:id",
            get(templates::get_template).delete(templates::delete_template),
        )
        .route("/templates/:kind/:id/name", put(templates::rename_template))
        .route("/templates/:kind/:id/fields", post(templates::add_field))
        .route(
            "/templates/:kind/:id/fields/:field_name",
            put(templates::update_field).delete(templates::remove_field),
        )
        .route("/records", post(records::create_record))
        .route("/records/search", post(records::search_records))
        .route(
            "/records/:id",
            get(records::get_record)
                .put(records::edit_record)
                .delete(records::delete_record),
        )
        .route("/files", post(files::create_file))
        .route("/files/search", post(files::search_files))
        .route(
            "/files/:id",
            get(files::get_file)
                .put(files::edit_file)
                .delete(files::delete_file),
        )
        .route("/files/:id/content", get(files::read_file_content))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
