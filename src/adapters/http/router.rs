//! Request routing for the JSON API.
//!
//! `route` is a plain synchronous function from an `ApiRequest` to an
//! `ApiResponse`; the hyper server in `server.rs` only moves bytes in and out.
//!
//! ## Checklists
//! - `GET /checklists?projectId=&status=&makerId=`
//! - `GET /checklists/{id}`, `PUT /checklists/{id}`
//! - `POST /checklists`
//! - `POST /checklists/{id}/submit|check|submit-approval|approve`
//! - `GET /users/{id}/worklist`
//!
//! ## Catalog
//! - `GET|POST /projects`, `PUT|DELETE /projects/{id}` (same for `/users`, `/formats`)
//!
//! ## Photos
//! - `POST /photos/upload?entityType=&entityId=&itemIndex=&fileName=` (raw body)
//! - `GET /photos/{entityType}/{entityId}`
//! - `GET|DELETE /photos/{id}`
//!
//! ## Misc
//! - `GET /activities?limit=N`, `GET /health`

use bytes::Bytes;
use hyper::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::error;

use crate::app::App;
use crate::core::errors::{ErrorKind, Result, SitecheckError};
use crate::core::models::catalog::{CatalogRecord, Format, Project, User};
use crate::core::models::checklist::{ChecklistItem, ChecklistPatch, ChecklistStatus, Decision};
use crate::core::models::photo::PhotoTarget;
use crate::core::services::photo_service::PhotoUpload;
use crate::core::services::workflow_service::{
    ApproveRequest, CheckRequest, ChecklistFilter, NewChecklist,
};

/// Number of activity entries returned when no `limit` is given.
pub const DEFAULT_ACTIVITY_LIMIT: usize = 100;

const JSON: &str = "application/json";
const OCTET_STREAM: &str = "application/octet-stream";

/// A request with its body already read.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    /// Value of the `X-User-Id` header.
    pub user_id: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (path_and_query.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            user_id: None,
            content_type: None,
            body: Bytes::new(),
        }
    }

    fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Err(SitecheckError::validation("Request body must be a JSON object"));
        }
        serde_json::from_slice(&self.body).map_err(|e| SitecheckError::validation(e.to_string()))
    }

    fn query<T: DeserializeOwned>(&self) -> Result<T> {
        serde_urlencoded::from_str(self.query.as_deref().unwrap_or(""))
            .map_err(|e| SitecheckError::validation(format!("Invalid query string: {e}")))
    }
}

/// A response ready to be written to the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

impl ApiResponse {
    fn json(status: StatusCode, value: &Value) -> Self {
        Self {
            status,
            content_type: JSON.into(),
            body: Bytes::from(value.to_string()),
        }
    }

    fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            content_type: JSON.into(),
            body: Bytes::new(),
        }
    }

    #[cfg(test)]
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// `{ "<key>": value }`
fn listing<T: Serialize>(key: &str, value: &T) -> Result<ApiResponse> {
    let mut body = Map::new();
    body.insert(key.into(), serde_json::to_value(value)?);
    Ok(ApiResponse::json(StatusCode::OK, &Value::Object(body)))
}

/// `{ "success": true, "<key>": value }`
fn success<T: Serialize>(key: &str, value: &T) -> Result<ApiResponse> {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert(key.into(), serde_json::to_value(value)?);
    Ok(ApiResponse::json(StatusCode::OK, &Value::Object(body)))
}

fn error_response(action: &str, err: &SitecheckError) -> ApiResponse {
    let status = match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(action, error = %err, "Request failed");
        format!("Failed to {action}: {err}")
    } else {
        err.to_string()
    };
    ApiResponse::json(status, &json!({ "error": message }))
}

fn not_found() -> ApiResponse {
    ApiResponse::json(StatusCode::NOT_FOUND, &json!({ "error": "Not found" }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateChecklistBody {
    project_id: String,
    format_id: String,
    #[serde(default)]
    location: String,
    maker_id: String,
    #[serde(default)]
    items: Option<Vec<ChecklistItem>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody {
    checker_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckBody {
    checker_id: String,
    items: Vec<ChecklistItem>,
    status: String,
    #[serde(default)]
    comments: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitApprovalBody {
    approver_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApproveBody {
    approver_id: String,
    status: String,
    #[serde(default)]
    comments: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ChecklistQuery {
    project_id: Option<String>,
    status: Option<String>,
    maker_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct ActivityQuery {
    limit: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UploadQuery {
    entity_type: Option<String>,
    entity_id: Option<String>,
    item_index: Option<String>,
    file_name: Option<String>,
}

/// Dispatch one request.
pub fn route(app: &App, req: &ApiRequest) -> ApiResponse {
    if req.method == Method::OPTIONS {
        return ApiResponse::no_content();
    }

    let segments: Vec<&str> = req.path.split('/').filter(|s| !s.is_empty()).collect();
    let caller = req.user_id.as_deref();

    let (action, result) = match (&req.method, segments.as_slice()) {
        (&Method::GET, ["health"]) => (
            "check health",
            Ok(ApiResponse::json(StatusCode::OK, &json!({ "status": "ok" }))),
        ),

        // Checklists
        (&Method::GET, ["checklists"]) => ("get checklists", list_checklists(app, req)),
        (&Method::POST, ["checklists"]) => ("create checklist", create_checklist(app, req, caller)),
        (&Method::GET, ["checklists", id]) => (
            "get checklist",
            app.workflow.get(id).and_then(|c| listing("checklist", &c)),
        ),
        (&Method::PUT, ["checklists", id]) => (
            "update checklist",
            req.json::<ChecklistPatch>()
                .and_then(|patch| app.workflow.update(id, patch))
                .and_then(|c| success("checklist", &c)),
        ),
        (&Method::POST, ["checklists", id, "submit"]) => (
            "submit checklist",
            req.json::<SubmitBody>()
                .and_then(|b| app.workflow.submit(caller, id, &b.checker_id))
                .and_then(|c| success("checklist", &c)),
        ),
        (&Method::POST, ["checklists", id, "check"]) => (
            "check checklist",
            req.json::<CheckBody>()
                .and_then(|b| {
                    let request = CheckRequest {
                        checker_id: b.checker_id,
                        items: b.items,
                        decision: Decision::parse(&b.status),
                        comments: b.comments,
                    };
                    app.workflow.check(caller, id, request)
                })
                .and_then(|c| success("checklist", &c)),
        ),
        (&Method::POST, ["checklists", id, "submit-approval"]) => (
            "submit for approval",
            req.json::<SubmitApprovalBody>()
                .and_then(|b| app.workflow.submit_for_approval(caller, id, &b.approver_id))
                .and_then(|c| success("checklist", &c)),
        ),
        (&Method::POST, ["checklists", id, "approve"]) => (
            "approve checklist",
            req.json::<ApproveBody>()
                .and_then(|b| {
                    let request = ApproveRequest {
                        approver_id: b.approver_id,
                        decision: Decision::parse(&b.status),
                        comments: b.comments,
                    };
                    app.workflow.approve(caller, id, request)
                })
                .and_then(|c| success("checklist", &c)),
        ),
        (&Method::GET, ["users", id, "worklist"]) => (
            "get worklist",
            app.workflow.worklist(id).and_then(|w| listing("worklist", &w)),
        ),

        (&Method::GET, ["activities"]) => ("get activities", list_activities(app, req)),

        // Catalog
        (_, ["projects", rest @ ..]) => catalog::<Project>(app, req, rest),
        (_, ["users", rest @ ..]) => catalog::<User>(app, req, rest),
        (_, ["formats", rest @ ..]) => catalog::<Format>(app, req, rest),

        // Photos
        (&Method::POST, ["photos", "upload"]) => ("upload photo", upload_photo(app, req)),
        (&Method::GET, ["photos", target, entity_id]) => (
            "get photos",
            target
                .parse::<PhotoTarget>()
                .and_then(|t| app.photos.list(t, entity_id))
                .and_then(|p| listing("photos", &p)),
        ),
        (&Method::GET, ["photos", id]) => ("get photo", photo_content(app, id)),
        (&Method::DELETE, ["photos", id]) => (
            "delete photo",
            app.photos
                .delete(id)
                .map(|()| ApiResponse::json(StatusCode::OK, &json!({ "success": true }))),
        ),

        _ => return not_found(),
    };

    result.unwrap_or_else(|e| error_response(action, &e))
}

fn list_checklists(app: &App, req: &ApiRequest) -> Result<ApiResponse> {
    let query: ChecklistQuery = req.query()?;
    let filter = ChecklistFilter {
        project_id: query.project_id,
        status: query.status.as_deref().map(str::parse::<ChecklistStatus>).transpose()?,
        maker_id: query.maker_id,
    };
    listing("checklists", &app.workflow.list(&filter)?)
}

fn create_checklist(app: &App, req: &ApiRequest, caller: Option<&str>) -> Result<ApiResponse> {
    let body: CreateChecklistBody = req.json()?;
    let checklist = app.workflow.create(
        caller,
        NewChecklist {
            project_id: body.project_id,
            format_id: body.format_id,
            location: body.location,
            maker_id: body.maker_id,
            items: body.items,
        },
    )?;
    success("checklist", &checklist)
}

fn list_activities(app: &App, req: &ApiRequest) -> Result<ApiResponse> {
    let query: ActivityQuery = req.query()?;
    let limit = match query.limit.as_deref() {
        None | Some("") => DEFAULT_ACTIVITY_LIMIT,
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            SitecheckError::validation(format!("limit must be a non-negative integer, got '{raw}'"))
        })?,
    };
    listing("activities", &app.activities.list(limit)?)
}

/// Plural collection name and singular record name, e.g. `projects` / `project`.
fn catalog_names<T: CatalogRecord>() -> (String, String) {
    let singular = T::ENTITY_TYPE.to_string();
    (format!("{singular}s"), singular)
}

fn catalog<T: CatalogRecord>(
    app: &App,
    req: &ApiRequest,
    rest: &[&str],
) -> (&'static str, Result<ApiResponse>) {
    let (plural, singular) = catalog_names::<T>();
    match (&req.method, rest) {
        (&Method::GET, []) => (
            "list records",
            app.catalog.list::<T>().and_then(|all| listing(&plural, &all)),
        ),
        (&Method::POST, []) => (
            "create record",
            req.json::<Value>()
                .and_then(|body| app.catalog.create::<T>(body))
                .and_then(|record| success(&singular, &record)),
        ),
        (&Method::PUT, [id]) => (
            "update record",
            req.json::<Value>()
                .and_then(|body| app.catalog.update::<T>(id, body))
                .and_then(|record| success(&singular, &record)),
        ),
        (&Method::DELETE, [id]) => (
            "delete record",
            app.catalog
                .delete::<T>(id)
                .map(|()| ApiResponse::json(StatusCode::OK, &json!({ "success": true }))),
        ),
        _ => ("route request", Ok(not_found())),
    }
}

fn upload_photo(app: &App, req: &ApiRequest) -> Result<ApiResponse> {
    let query: UploadQuery = req.query()?;
    let target = query
        .entity_type
        .ok_or_else(|| SitecheckError::validation("entityType is required"))?
        .parse::<PhotoTarget>()?;
    let entity_id = query
        .entity_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SitecheckError::validation("entityId is required"))?;
    let item_index = query
        .item_index
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            raw.parse::<usize>().map_err(|_| {
                SitecheckError::validation(format!("itemIndex must be a non-negative integer, got '{raw}'"))
            })
        })
        .transpose()?;

    let record = app.photos.upload(PhotoUpload {
        target,
        entity_id,
        item_index,
        file_name: query.file_name.unwrap_or_else(|| "upload".into()),
        content_type: req
            .content_type
            .clone()
            .unwrap_or_else(|| OCTET_STREAM.into()),
        bytes: req.body.to_vec(),
    })?;

    Ok(ApiResponse::json(
        StatusCode::OK,
        &json!({ "success": true, "photoId": record.id, "url": record.url }),
    ))
}

fn photo_content(app: &App, id: &str) -> Result<ApiResponse> {
    let (record, bytes) = app.photos.content(id)?;
    Ok(ApiResponse {
        status: StatusCode::OK,
        content_type: served_content_type(&record.content_type),
        body: Bytes::from(bytes),
    })
}

/// Uploads are served back as given only when they are raster images.
/// Anything else, SVG included, goes out as an opaque download.
fn served_content_type(uploaded: &str) -> String {
    let mime = uploaded
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.strip_prefix("image/") {
        Some(subtype) if !subtype.is_empty() && !subtype.starts_with("svg") => mime,
        _ => OCTET_STREAM.into(),
    }
}
