//! Clinical file endpoints.
//!
//! Binary content crosses the wire base64-encoded inside the JSON body,
//! both on upload and on download.

use crate::auth::authenticate;
use crate::dto::{
    CreateFileReq, CreatedRes, EditFileReq, FileContentRes, FileRes, SearchFilesReq,
    SearchFilesRes,
};
use crate::response::{ApiError, ApiResult, ApiSuccess};
use crate::AppState;
use axum::extract::{Path as AxumPath, State};
use axum::http::HeaderMap;
use axum::response::Json;
use base64::{engine::general_purpose, Engine as _};
use expediente_core::guards::parse_identifier;
use expediente_core::{FileSearch, FileSubmission, FileUpdate};

#[utoipa::path(
    post,
    path = "/files",
    request_body = CreateFileReq,
    responses(
        (status = 201, description = "File created", body = CreatedRes),
        (status = 400, description = "Missing content, unknown category or malformed input"),
        (status = 404, description = "Record or file template not found")
    )
)]
/// Stores a clinical file: validated metadata plus base64 content.
#[axum::debug_handler]
pub async fn create_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateFileReq>,
) -> ApiResult<ApiSuccess<CreatedRes>> {
    let doctor = authenticate(&headers)?;
    let record = parse_identifier(&req.record_id)?;
    let template = parse_identifier(&req.template_id)?;
    let content = general_purpose::STANDARD
        .decode(&req.content)
        .map_err(|_| ApiError::bad_request("content is not valid base64"))?;

    let id = state
        .files
        .create_file(
            doctor,
            FileSubmission {
                record,
                template,
                name: req.name,
                category: req.category,
                pages: req.pages,
                metadata: req.metadata.into_iter().map(Into::into).collect(),
            },
            &content,
        )
        .await?;
    Ok(ApiSuccess::created(
        "File created",
        CreatedRes { id: id.to_string() },
    ))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    responses(
        (status = 200, description = "File descriptor", body = FileRes),
        (status = 403, description = "File belongs to another doctor"),
        (status = 404, description = "File not found")
    )
)]
/// Returns one owned file's descriptor (no content).
#[axum::debug_handler]
pub async fn get_file(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> ApiResult<ApiSuccess<FileRes>> {
    let doctor = authenticate(&headers)?;
    let file_id = parse_identifier(&id)?;
    let view = state.files.get_file(doctor, file_id).await?;
    Ok(ApiSuccess::ok("OK", view.into()))
}

#[utoipa::path(
    get,
    path = "/files/{id}/content",
    responses(
        (status = 200, description = "File content, base64 encoded", body = FileContentRes),
        (status = 404, description = "File not found")
    )
)]
/// Returns one owned file's binary content, base64 encoded.
#[axum::debug_handler]
pub async fn read_file_content(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> ApiResult<ApiSuccess<FileContentRes>> {
    let doctor = authenticate(&headers)?;
    let file_id = parse_identifier(&id)?;
    let content = state.files.read_content(doctor, file_id).await?;
    Ok(ApiSuccess::ok(
        "OK",
        FileContentRes {
            name: content.name,
            media_type: content.media_type,
            content: general_purpose::STANDARD.encode(content.bytes),
        },
    ))
}

#[utoipa::path(
    put,
    path = "/files/{id}",
    request_body = EditFileReq,
    responses(
        (status = 200, description = "File descriptor updated"),
        (status = 405, description = "A metadata value does not match its declared type")
    )
)]
/// Replaces a file's descriptive data; the content itself is immutable.
#[axum::debug_handler]
pub async fn edit_file(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
    Json(req): Json<EditFileReq>,
) -> ApiResult<ApiSuccess<()>> {
    let doctor = authenticate(&headers)?;
    let file_id = parse_identifier(&id)?;
    state
        .files
        .edit_file(
            doctor,
            file_id,
            FileUpdate {
                name: req.name,
                category: req.category,
                pages: req.pages,
                metadata: req.metadata.into_iter().map(Into::into).collect(),
            },
        )
        .await?;
    Ok(ApiSuccess::ok("File updated", ()))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    responses(
        (status = 200, description = "File deleted"),
        (status = 404, description = "File not found")
    )
)]
/// Deletes one owned file and, if unshared, its stored content.
#[axum::debug_handler]
pub async fn delete_file(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    headers: HeaderMap,
) -> ApiResult<ApiSuccess<()>> {
    let doctor = authenticate(&headers)?;
    let file_id = parse_identifier(&id)?;
    state.files.delete_file(doctor, file_id).await?;
    Ok(ApiSuccess::ok("File deleted", ()))
}

#[utoipa::path(
    post,
    path = "/files/search",
    request_body = SearchFilesReq,
    responses(
        (status = 200, description = "Matching files with total count", body = SearchFilesRes),
        (status = 400, description = "Malformed filter literal or unsupported operation")
    )
)]
/// Searches the caller's files with declarative metadata filters.
#[axum::debug_handler]
pub async fn search_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SearchFilesReq>,
) -> ApiResult<ApiSuccess<SearchFilesRes>> {
    let doctor = authenticate(&headers)?;
    let record = match req.record_id.as_deref() {
        Some(raw) => Some(parse_identifier(raw)?),
        None => None,
    };
    let template = match req.template_id.as_deref() {
        Some(raw) => Some(parse_identifier(raw)?),
        None => None,
    };
    let result = state
        .files
        .search_files(
            doctor,
            FileSearch {
                record,
                template,
                filters: req.filters.into_iter().map(Into::into).collect(),
                sort: req.sort.into_iter().map(Into::into).collect(),
                page: req.page.unwrap_or_default().into(),
            },
        )
        .await?;
    Ok(ApiSuccess::ok(
        "OK",
        SearchFilesRes {
            total: result.total,
            items: result.items.into_iter().map(Into::into).collect(),
        },
    ))
}
