//! Template endpoints.
//!
//! Both template variants share one set of routes; the `{kind}` path
//! segment selects `patient` or `file`.

use crate::auth::authenticate;
use crate::dto::{CreatedRes, FieldDefinitionDto, NewTemplateReq, RenameReq, TemplateRes};
use crate::response::{ApiError, ApiResult, ApiSuccess};
use crate::AppState;
use axum::extract::{Path as AxumPath, State};
use axum::http::HeaderMap;
use axum::response::Json;
use expediente_core::guards::parse_identifier;
use expediente_core::{NewTemplate, TemplateKind};

fn parse_kind(segment: &str) -> ApiResult<TemplateKind> {
    TemplateKind::from_path(segment)
        .ok_or_else(|| ApiError::bad_request("unknown template kind; use 'patient' or 'file'"))
}

#[utoipa::path(
    post,
    path = "/templates/{kind}",
    request_body = NewTemplateReq,
    responses(
        (status = 201, description = "Template created", body = CreatedRes),
        (status = 400, description = "Missing or malformed input"),
        (status = 409, description = "Template name already in use")
    )
)]
/// Creates a template of the given variant for the calling doctor.
#[axum::debug_handler]
pub async fn create_template(
    State(state): State<AppState>,
    AxumPath(kind): AxumPath<String>,
    headers: HeaderMap,
    Json(req): Json<NewTemplateReq>,
) -> ApiResult<ApiSuccess<CreatedRes>> {
    let doctor = authenticate(&headers)?;
    let kind = parse_kind(&kind)?;
    let id = state
        .templates
        .create_template(
            doctor,
            kind,
            NewTemplate {
                name: req.name,
                fields: req.fields.into_iter().map(Into::into).collect(),
                categories: req.categories,
            },
        )
        .await?;
    Ok(ApiSuccess::created(
        "Template created",
        CreatedRes { id: id.to_string() },
    ))
}

#[utoipa::path(
    get,
    path = "/templates/{kind}",
    responses(
        (status = 200, description = "Templates owned by the caller", body = [TemplateRes])
    )
)]
/// Lists the calling doctor's templates of the given variant.
#[axum::debug_handler]
pub async fn list_templates(
    State(state): State<AppState>,
    AxumPath(kind): AxumPath<String>,
    headers: HeaderMap,
) -> ApiResult<ApiSuccess<Vec<TemplateRes>>> {
    let doctor = authenticate(&headers)?;
    let kind = parse_kind(&kind)?;
    let views = state.templates.list_templates(doctor, kind).await?;
    Ok(ApiSuccess::ok(
        "OK",
        views.into_iter().map(Into::into).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/templates/{kind}/{id}",
    responses(
        (status = 200, description = "Template", body = TemplateRes),
        (status = 403, description = "Template belongs to another doctor"),
        (status = 404, description = "Template not found")
    )
)]
/// Returns one owned template.
#[axum::debug_handler]
pub async fn get_template(
    State(state): State<AppState>,
    AxumPath((kind, id)): AxumPath<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<ApiSuccess<TemplateRes>> {
    let doctor = authenticate(&headers)?;
    let kind = parse_kind(&kind)?;
    let template_id = parse_identifier(&id)?;
    let view = state.templates.get_template(doctor, kind, template_id).await?;
    Ok(ApiSuccess::ok("OK", view.into()))
}

#[utoipa::path(
    put,
    path = "/templates/{kind}/{id}/name",
    request_body = RenameReq,
    responses(
        (status = 200, description = "Template renamed"),
        (status = 409, description = "Template name already in use")
    )
)]
/// Renames one owned template.
#[axum::debug_handler]
pub async fn rename_template(
    State(state): State<AppState>,
    AxumPath((kind, id)): AxumPath<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<RenameReq>,
) -> ApiResult<ApiSuccess<()>> {
    let doctor = authenticate(&headers)?;
    let kind = parse_kind(&kind)?;
    let template_id = parse_identifier(&id)?;
    state
        .templates
        .rename_template(doctor, kind, template_id, &req.name)
        .await?;
    Ok(ApiSuccess::ok("Template renamed", ()))
}

#[utoipa::path(
    delete,
    path = "/templates/{kind}/{id}",
    responses(
        (status = 200, description = "Template deleted"),
        (status = 409, description = "Template is still referenced by records or files")
    )
)]
/// Deletes one owned template, unless records or files still reference it.
#[axum::debug_handler]
pub async fn delete_template(
    State(state): State<AppState>,
    AxumPath((kind, id)): AxumPath<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<ApiSuccess<()>> {
    let doctor = authenticate(&headers)?;
    let kind = parse_kind(&kind)?;
    let template_id = parse_identifier(&id)?;
    state
        .templates
        .delete_template(doctor, kind, template_id)
        .await?;
    Ok(ApiSuccess::ok("Template deleted", ()))
}

#[utoipa::path(
    post,
    path = "/templates/{kind}/{id}/fields",
    request_body = FieldDefinitionDto,
    responses(
        (status = 200, description = "Field added"),
        (status = 400, description = "Invalid field definition")
    )
)]
/// Appends a field to one owned template.
#[axum::debug_handler]
pub async fn add_field(
    State(state): State<AppState>,
    AxumPath((kind, id)): AxumPath<(String, String)>,
    headers: HeaderMap,
    Json(req): Json<FieldDefinitionDto>,
) -> ApiResult<ApiSuccess<()>> {
    let doctor = authenticate(&headers)?;
    let kind = parse_kind(&kind)?;
    let template_id = parse_identifier(&id)?;
    state
        .templates
        .add_field(doctor, kind, template_id, req.into())
        .await?;
    Ok(ApiSuccess::ok("Field added", ()))
}

#[utoipa::path(
    put,
    path = "/templates/{kind}/{id}/fields/{field_name}",
    request_body = FieldDefinitionDto,
    responses(
        (status = 200, description = "Field updated"),
        (status = 404, description = "Field not found"),
        (status = 406, description = "New field name collides with another field")
    )
)]
/// Overwrites the named field of one owned template.
#[axum::debug_handler]
pub async fn update_field(
    State(state): State<AppState>,
    AxumPath((kind, id, field_name)): AxumPath<(String, String, String)>,
    headers: HeaderMap,
    Json(req): Json<FieldDefinitionDto>,
) -> ApiResult<ApiSuccess<()>> {
    let doctor = authenticate(&headers)?;
    let kind = parse_kind(&kind)?;
    let template_id = parse_identifier(&id)?;
    state
        .templates
        .update_field(doctor, kind, template_id, &field_name, req.into())
        .await?;
    Ok(ApiSuccess::ok("Field updated", ()))
}

#[utoipa::path(
    delete,
    path = "/templates/{kind}/{id}/fields/{field_name}",
    responses(
        (status = 200, description = "Field removed"),
        (status = 404, description = "Field not found")
    )
)]
/// Removes the named field from one owned template.
#[axum::debug_handler]
pub async fn remove_field(
    State(state): State<AppState>,
    AxumPath((kind, id, field_name)): AxumPath<(String, String, String)>,
    headers: HeaderMap,
) -> ApiResult<ApiSuccess<()>> {
    let doctor = authenticate(&headers)?;
    let kind = parse_kind(&kind)?;
    let template_id = parse_identifier(&id)?;
    state
        .templates
        .remove_field(doctor, kind, template_id, &field_name)
        .await?;
    Ok(ApiSuccess::ok("Field removed", ()))
}
