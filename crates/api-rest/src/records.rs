//! Patient record endpoints.

use crate::auth::authenticate;
use crate::dto::{
    CreateRecordReq, CreatedRes, EditRecordReq, RecordRes, SearchRecordsReq, SearchRecordsRes,
};
use crate::response::{ApiResult, ApiSuccess};
use crate::AppState;
use axum::extract::{Path as AxumPath, State};
use axum::http::HeaderMap;
use axum::response::Json;
use expediente_core::guards::parse_identifier;
use expediente_core::{PatientSubmission, RecordSearch};

#[utoipa::path(
    post,
    path = "/records",
    request_body = CreateRecordReq,
    responses(
        (status = 201, description = "Record created", body = CreatedRes),
        (status = 400, description = "Missing patient names or malformed input"),
        (status = 404, description = "Template not found"),
        (status = 405, description = "A field value does not match its declared type")
    )
)]
/// Creates a patient record under one of the caller's patient templates.
#[axum::debug_handler]
pub async fn create_record(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateRecordReq>,
) -> ApiResult<ApiSuccess<CreatedRes>> {
    let doctor = authenticate(&headers)?;
    let template_id = parse_identifier(&req.template_id)?;
    let id = state
        .records
        .create_record(
            doctor,
            template_id,
            PatientSubmission {
                names: req.names,
                last_names: req.last_names,
                fields: req.fields.into_iter().map(Into::into).collect(),
            },
        )
        .await?;
    Ok(ApiSuccess::created(
        "Record created",
        CreatedRes { id: id.to_string() },
    ))
}

#[utoipa::path(
    get,
    path = "/records/{id}",
    responses(
        (status = 200, description = "Record", body = RecordRes),
        (status = 403, description = "Record belongs to another doctor"),
        (status = 404, description = "Record not found")
    )
)]
/// Returns one owned record.
#[axum::debug_handler]
pub async fn get_record(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> ApiResult<ApiSuccess<RecordRes>> {
    let doctor = authenticate(&headers)?;
    let record_id = parse_identifier(&id)?;
    let view = state.records.get_record(doctor, record_id).await?;
    Ok(ApiSuccess::ok("OK", view.into()))
}

#[utoipa::path(
    put,
    path = "/records/{id}",
    request_body = EditRecordReq,
    responses(
        (status = 200, description = "Record updated"),
        (status = 405, description = "A field value does not match its declared type")
    )
)]
/// Replaces a record's patient data, re-validated against the current template.
#[axum::debug_handler]
pub async fn edit_record(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
    Json(req): Json<EditRecordReq>,
) -> ApiResult<ApiSuccess<()>> {
    let doctor = authenticate(&headers)?;
    let record_id = parse_identifier(&id)?;
    state
        .records
        .edit_record(
            doctor,
            record_id,
            PatientSubmission {
                names: req.names,
                last_names: req.last_names,
                fields: req.fields.into_iter().map(Into::into).collect(),
            },
        )
        .await?;
    Ok(ApiSuccess::ok("Record updated", ()))
}

#[utoipa::path(
    delete,
    path = "/records/{id}",
    responses(
        (status = 200, description = "Record deleted"),
        (status = 404, description = "Record not found")
    )
)]
/// Deletes one owned record.
#[axum::debug_handler]
pub async fn delete_record(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> ApiResult<ApiSuccess<()>> {
    let doctor = authenticate(&headers)?;
    let record_id = parse_identifier(&id)?;
    state.records.delete_record(doctor, record_id).await?;
    Ok(ApiSuccess::ok("Record deleted", ()))
}

#[utoipa::path(
    post,
    path = "/records/search",
    request_body = SearchRecordsReq,
    responses(
        (status = 200, description = "Matching records with total count", body = SearchRecordsRes),
        (status = 400, description = "Malformed filter literal or unsupported operation")
    )
)]
/// Searches the caller's records with declarative filters, sort and paging.
#[axum::debug_handler]
pub async fn search_records(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SearchRecordsReq>,
) -> ApiResult<ApiSuccess<SearchRecordsRes>> {
    let doctor = authenticate(&headers)?;
    let template = match req.template_id.as_deref() {
        Some(raw) => Some(parse_identifier(raw)?),
        None => None,
    };
    let result = state
        .records
        .search_records(
            doctor,
            RecordSearch {
                template,
                filters: req.filters.into_iter().map(Into::into).collect(),
                sort: req.sort.into_iter().map(Into::into).collect(),
                page: req.page.unwrap_or_default().into(),
            },
        )
        .await?;
    Ok(ApiSuccess::ok(
        "OK",
        SearchRecordsRes {
            total: result.total,
            items: result.items.into_iter().map(Into::into).collect(),
        },
    ))
}
