//! HTTP server for the leadbase API.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                              |
//! |--------|-------------------|------------------------------------------|
//! | GET    | `/health`         | Health check                             |
//! | POST   | `/api/demo-login` | Set the demo identity cookie             |
//! | GET    | `/api/leads`      | List leads, newest first                 |
//! | POST   | `/api/leads`      | Create a lead                            |
//! | GET    | `/api/leads/{id}` | Lead detail with recent history          |
//! | PUT    | `/api/leads/{id}` | Update a lead (optimistic concurrency)   |
//! | DELETE | `/api/leads/{id}` | Delete a lead (history cascades)         |
//! | POST   | `/api/import`     | Bulk import leads from a CSV upload      |
//! | GET    | `/api/export`     | Download all leads as CSV                |
//! | GET    | `/api/logs`       | SSE stream of import progress logs       |
//!
//! Mutating routes require the demo cookie; failures come back as typed
//! JSON bodies (field errors, row errors) rather than opaque messages.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Sse},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::auth::{demo_user_from_cookie, serialize_demo_cookie, DemoUser};
use super::logs::LOG_BROADCASTER;
use super::types::{
    error_response, row_errors_response, validation_response, ImportResponse, LeadDetail, LeadPayload,
};
use crate::error::{ImportError, LeadError, StoreError};
use crate::import::{leads_to_csv, parse_leads};
use crate::models::Lead;
use crate::service::{LeadService, Requester};

/// History entries shown on the detail endpoint.
const HISTORY_PREVIEW: u32 = 5;

type ApiError = (StatusCode, Json<Value>);

/// Start the HTTP server.
pub async fn start_server(service: LeadService, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/demo-login", post(demo_login))
        .route("/api/leads", get(list_leads).post(create_lead))
        .route("/api/leads/{id}", get(get_lead).put(update_lead).delete(delete_lead))
        .route("/api/import", post(import_csv))
        .route("/api/export", get(export_csv))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(service);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 leadbase server running on http://localhost:{}", port);
    println!("   POST /api/demo-login  - Set demo identity");
    println!("   GET  /api/leads       - List leads");
    println!("   POST /api/import      - Bulk CSV import");
    println!("   GET  /api/logs        - SSE progress stream");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "leadbase",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// Auth & error plumbing
// =============================================================================

fn requester(headers: &HeaderMap) -> Result<Requester, ApiError> {
    let cookie = headers.get(header::COOKIE).and_then(|v| v.to_str().ok());
    let user = demo_user_from_cookie(cookie)
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, Json(error_response("Not authenticated"))))?;
    Ok(Requester::new(user.id, client_key(headers)))
}

/// Throttling identity: forwarded client IP when present, `unknown` otherwise.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn store_error(err: StoreError) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response(&err.to_string())))
}

fn lead_error(err: LeadError) -> ApiError {
    match err {
        LeadError::NotFound => (StatusCode::NOT_FOUND, Json(error_response("lead not found"))),
        LeadError::NotOwner => (StatusCode::FORBIDDEN, Json(error_response(&err.to_string()))),
        LeadError::Conflict => (StatusCode::CONFLICT, Json(error_response(&err.to_string()))),
        LeadError::RateLimited { reset_at } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "too many requests, please try again later", "resetAt": reset_at })),
        ),
        LeadError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(validation_response(&errors))),
        LeadError::Store(inner) => store_error(inner),
    }
}

fn import_error(err: ImportError) -> ApiError {
    match err {
        ImportError::Rows(errors) => (StatusCode::BAD_REQUEST, Json(row_errors_response(&errors))),
        ImportError::RateLimited { reset_at } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "too many import requests, please try again later", "resetAt": reset_at })),
        ),
        ImportError::Store(inner) => store_error(inner),
        structural => (StatusCode::BAD_REQUEST, Json(error_response(&structural.to_string()))),
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn demo_login(Json(user): Json<DemoUser>) -> Result<impl IntoResponse, ApiError> {
    if user.id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(error_response("id is required"))));
    }
    let cookie = serialize_demo_cookie(&user);
    Ok(([(header::SET_COOKIE, cookie)], Json(json!({ "ok": true, "user": user }))))
}

async fn list_leads(State(service): State<LeadService>) -> Result<Json<Vec<Lead>>, ApiError> {
    service.list_leads().map(Json).map_err(store_error)
}

async fn get_lead(
    State(service): State<LeadService>,
    Path(id): Path<Uuid>,
) -> Result<Json<LeadDetail>, ApiError> {
    let lead = service
        .get_lead(id)
        .map_err(store_error)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(error_response("lead not found"))))?;
    let history = service.history_for(id, HISTORY_PREVIEW).map_err(store_error)?;
    Ok(Json(LeadDetail { lead, history }))
}

async fn create_lead(
    State(service): State<LeadService>,
    headers: HeaderMap,
    Json(payload): Json<LeadPayload>,
) -> Result<(StatusCode, Json<Lead>), ApiError> {
    let requester = requester(&headers)?;
    let lead = service.create_lead(&requester, &payload.to_raw()).map_err(lead_error)?;
    Ok((StatusCode::CREATED, Json(lead)))
}

async fn update_lead(
    State(service): State<LeadService>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<LeadPayload>,
) -> Result<Json<Lead>, ApiError> {
    let requester = requester(&headers)?;
    let stamp = payload
        .updated_at
        .as_deref()
        .ok_or_else(|| (StatusCode::BAD_REQUEST, Json(error_response("updatedAt is required"))))?;
    let stamp: DateTime<Utc> = stamp.parse().map_err(|_| {
        (StatusCode::BAD_REQUEST, Json(error_response("updatedAt must be an RFC 3339 timestamp")))
    })?;

    let lead = service
        .update_lead(&requester, id, stamp, &payload.to_raw())
        .map_err(lead_error)?;
    Ok(Json(lead))
}

async fn delete_lead(
    State(service): State<LeadService>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let requester = requester(&headers)?;
    service.delete_lead(&requester, id).map_err(lead_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Bulk import endpoint: multipart upload with a `file` field.
async fn import_csv(
    State(service): State<LeadService>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, ApiError> {
    let requester = requester(&headers)?;

    let mut file_data: Option<Vec<u8>> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, Json(error_response(&format!("Multipart error: {}", e))))
    })? {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.map_err(|e| {
                (StatusCode::BAD_REQUEST, Json(error_response(&format!("Read error: {}", e))))
            })?;
            file_data = Some(bytes.to_vec());
        }
    }
    let bytes = file_data
        .ok_or_else(|| (StatusCode::BAD_REQUEST, Json(error_response("No file provided"))))?;

    let validated = parse_leads(&bytes).map_err(import_error)?;
    let imported = service.import_leads(&requester, validated).map_err(import_error)?;

    Ok(Json(ImportResponse { success: true, imported }))
}

/// Stream every lead out on the same 14-column surface the importer accepts.
async fn export_csv(State(service): State<LeadService>) -> Result<impl IntoResponse, ApiError> {
    let leads = service.list_leads().map_err(store_error)?;
    let csv = leads_to_csv(&leads)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response(&e.to_string()))))?;

    let filename = format!("leads-export-{}.csv", Utc::now().format("%Y-%m-%d"));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        csv,
    ))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
