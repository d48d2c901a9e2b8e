//! dossier-api - HTTP API server for dossier

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::{Config, SwaggerUi};
use uuid::Uuid;

use dossier_core::{
    decode_transit_payload, defaults, resolve_content_type, AttachmentOrigin, AttachmentOwner,
    AttachmentOwnerKind, AttachmentRepository, AttachmentSummary, CreateAttachmentRequest,
    CreateOrderRequest, CreatePartnerRequest, ListOrdersRequest, OrderRepository,
    PartnerRepository, PurchaseOrder,
};
use dossier_db::Database;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically, which is
/// useful for log correlation and debugging production incidents.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Global rate limiter type (direct quota, no keyed bucketing).
type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    /// Global rate limiter (None if rate limiting is disabled).
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

/// OpenAPI documentation metadata. The full spec is maintained in
/// `openapi.yaml` and served at `/openapi.yaml`; Swagger UI at `/docs`
/// fetches from that endpoint. `/openapi.json` serves this generated
/// skeleton for tooling that prefers JSON.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dossier API",
        version = "0.3.0",
        description = "Purchase order document management with merged-PDF synchronization"
    ),
    tags(
        (name = "Orders", description = "Purchase order CRUD and merged document retrieval"),
        (name = "Attachments", description = "Binary document attachments"),
        (name = "Partners", description = "Business partners and their documents"),
        (name = "System", description = "Health checks and system info")
    )
)]
struct ApiDoc;

async fn openapi_yaml() -> impl IntoResponse {
    const SPEC: &str = include_str!("openapi.yaml");
    ([(header::CONTENT_TYPE, "application/yaml")], SPEC)
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Parse allowed origins from a comma-separated environment variable.
///
/// Enforces strict origin whitelisting for CORS instead of allowing any
/// website to call the API.
///
/// # Environment Variable
/// `ALLOWED_ORIGINS` - Comma-separated list of allowed origins
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

    if origins_str.trim().is_empty() {
        return vec![
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ];
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

// =============================================================================
// RATE LIMITING MIDDLEWARE
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    // If rate limiting is disabled, pass through
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!("Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

/// Get rate limiting status.
async fn rate_limit_status(State(state): State<AppState>) -> impl IntoResponse {
    if state.rate_limiter.is_some() {
        Json(serde_json::json!({
            "enabled": true,
            "message": "Rate limiting is active"
        }))
    } else {
        Json(serde_json::json!({
            "enabled": false,
            "message": "Rate limiting is disabled"
        }))
    }
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// ORDER HANDLERS
// =============================================================================

/// Request body for creating a purchase order.
#[derive(Debug, Deserialize)]
struct CreateOrderBody {
    reference: String,
    partner_id: Option<Uuid>,
    /// Attachments already present at creation time.
    #[serde(default)]
    attachments: Vec<UploadAttachmentBody>,
}

/// Order response with the attachment count the order form displays.
#[derive(Debug, Serialize)]
struct OrderResponse {
    #[serde(flatten)]
    order: PurchaseOrder,
    attachment_count: i64,
}

#[derive(Debug, Deserialize)]
struct ListOrdersQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    partner_id: Option<Uuid>,
}

async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderBody>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(partner_id) = body.partner_id {
        if !state.db.partners.exists(partner_id).await? {
            return Err(ApiError::BadRequest(format!(
                "Unknown partner: {}",
                partner_id
            )));
        }
    }

    let order_id = state
        .db
        .orders
        .insert(CreateOrderRequest {
            reference: body.reference,
            partner_id: body.partner_id,
        })
        .await?;

    let owner = AttachmentOwner::order(order_id);
    let has_initial_attachments = !body.attachments.is_empty();
    for upload in body.attachments {
        store_attachment(&state.db, owner, upload).await?;
    }

    // Creation trigger: only fires when the record already carries
    // attachments at creation time.
    if has_initial_attachments {
        state
            .db
            .merge
            .attachment_changed(&owner, AttachmentOrigin::User)
            .await;
    }

    let response = order_response(&state.db, order_id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn order_response(db: &Database, order_id: Uuid) -> Result<OrderResponse, ApiError> {
    let order = db.orders.fetch(order_id).await?;
    let attachment_count = db
        .attachments
        .count_for_owner(&AttachmentOwner::order(order_id))
        .await?;
    Ok(OrderResponse {
        order,
        attachment_count,
    })
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .db
        .orders
        .list(ListOrdersRequest {
            limit: query.limit,
            offset: query.offset,
            partner_id: query.partner_id,
        })
        .await?;
    Ok(Json(response))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(order_response(&state.db, id).await?))
}

async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.orders.delete(id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Order deleted successfully"
    })))
}

// =============================================================================
// ATTACHMENT HANDLERS
// =============================================================================

/// Request body for uploading document attachments.
#[derive(Debug, Deserialize)]
struct UploadAttachmentBody {
    filename: String,
    /// Declared MIME type; resolved against magic bytes when missing or
    /// generic.
    content_type: Option<String>,
    /// Base64-encoded file data.
    data: String,
}

/// Response for file download with base64-encoded content.
#[derive(Debug, Serialize)]
struct DownloadAttachmentResponse {
    data: String,
    content_type: String,
    filename: String,
}

/// Decode, classify, and persist one uploaded attachment.
///
/// The payload is stored in its transit form; the decoded bytes are used
/// only for validation, sizing, and content-type sniffing.
async fn store_attachment(
    db: &Database,
    owner: AttachmentOwner,
    body: UploadAttachmentBody,
) -> Result<AttachmentSummary, ApiError> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(body.data.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 data: {}", e)))?;

    let content_type = resolve_content_type(
        &body.filename,
        &decoded,
        body.content_type.as_deref().unwrap_or(""),
    );

    let attachment = db
        .attachments
        .insert(CreateAttachmentRequest {
            owner,
            filename: body.filename,
            content_type,
            payload: body.data.into_bytes(),
            size_bytes: decoded.len() as i64,
            origin: AttachmentOrigin::User,
        })
        .await?;

    Ok(attachment.summary())
}

/// List all attachments of a purchase order.
async fn list_order_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.orders.exists(id).await? {
        return Err(ApiError::NotFound(format!("Purchase order not found: {}", id)));
    }
    let attachments = state
        .db
        .attachments
        .list_for_owner(&AttachmentOwner::order(id))
        .await?;
    Ok(Json(attachments))
}

/// Upload a document attachment to a purchase order.
async fn upload_order_attachment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UploadAttachmentBody>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.orders.exists(id).await? {
        return Err(ApiError::NotFound(format!("Purchase order not found: {}", id)));
    }

    let owner = AttachmentOwner::order(id);
    let summary = store_attachment(&state.db, owner, body).await?;

    // Attachment-set-change trigger; sync failures are logged, the upload
    // itself succeeds.
    state
        .db
        .merge
        .attachment_changed(&owner, summary.origin)
        .await;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// Get attachment metadata.
async fn get_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let attachment = state.db.attachments.fetch(attachment_id).await?;
    Ok(Json(attachment.summary()))
}

/// Download a document attachment (returns base64-encoded data).
async fn download_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let attachment = state.db.attachments.fetch(attachment_id).await?;
    let raw = decode_transit_payload(&attachment.payload);

    Ok(Json(DownloadAttachmentResponse {
        data: base64::engine::general_purpose::STANDARD.encode(&raw),
        content_type: attachment.content_type,
        filename: attachment.filename,
    }))
}

/// Delete an attachment and re-sync whatever references it.
async fn delete_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    // Owner and origin are needed for trigger routing after the row is gone.
    let attachment = state.db.attachments.fetch(attachment_id).await?;
    state.db.attachments.delete(attachment_id).await?;

    state
        .db
        .merge
        .attachment_changed(&attachment.owner, attachment.origin)
        .await;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Attachment deleted successfully"
    })))
}

// =============================================================================
// MERGED DOCUMENT RETRIEVAL
// =============================================================================

/// Build a safe `Content-Disposition` header value for a download.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// Download the merged PDF artifact of a purchase order.
///
/// Makes one synchronous sync attempt first, so a stale or missing artifact
/// is recomputed on demand. A failed sync is logged and the previously
/// stored artifact, if any, is served; otherwise the response is 404.
async fn download_merged_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if let Err(e) = state.db.merge.sync_order(id).await {
        match e {
            dossier_core::Error::OrderNotFound(_) => {
                return Err(ApiError::NotFound(format!("Purchase order not found: {}", id)))
            }
            other => error!(
                subsystem = "api",
                op = "download_merged_document",
                order_id = %id,
                error = %other,
                "Merge sync failed; serving previously stored artifact if any"
            ),
        }
    }

    let artifact = state
        .db
        .orders
        .fetch_merged_document(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No merged document available".to_string()))?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&artifact.filename),
        ),
    ];
    Ok((headers, artifact.data))
}

// =============================================================================
// UI ACTION CONTRACTS
// =============================================================================

/// Structured navigation descriptor for "open the attachment list".
async fn action_open_attachments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.db.orders.fetch(id).await?;
    Ok(Json(serde_json::json!({
        "action": "open_attachment_list",
        "name": "Documents",
        "target": {
            "kind": AttachmentOwnerKind::PurchaseOrder,
            "id": order.id,
        },
        "url": format!("/api/v1/orders/{}/attachments", order.id),
    })))
}

/// Structured navigation descriptor for "view the merged PDF".
async fn action_view_merged_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.db.orders.fetch(id).await?;
    Ok(Json(serde_json::json!({
        "action": "view_merged_document",
        "name": order.merged_document_name,
        "available": order.has_merged_document,
        "url": format!("/api/v1/orders/{}/merged-document", order.id),
    })))
}

// =============================================================================
// PARTNER HANDLERS
// =============================================================================

/// Request body for creating a partner.
#[derive(Debug, Deserialize)]
struct CreatePartnerBody {
    name: String,
    email: Option<String>,
    /// Documents already present at creation time.
    #[serde(default)]
    documents: Vec<UploadAttachmentBody>,
}

async fn create_partner(
    State(state): State<AppState>,
    Json(body): Json<CreatePartnerBody>,
) -> Result<impl IntoResponse, ApiError> {
    let partner_id = state
        .db
        .partners
        .insert(CreatePartnerRequest {
            name: body.name,
            email: body.email,
        })
        .await?;

    let owner = AttachmentOwner::partner(partner_id);
    let has_initial_documents = !body.documents.is_empty();
    for upload in body.documents {
        store_attachment(&state.db, owner, upload).await?;
    }
    if has_initial_documents {
        state
            .db
            .merge
            .attachment_changed(&owner, AttachmentOrigin::User)
            .await;
    }

    let partner = state.db.partners.fetch(partner_id).await?;
    Ok((StatusCode::CREATED, Json(partner)))
}

/// Delete a partner and its documents. Orders referencing the partner
/// keep their merged artifact; only the reference is cleared.
async fn delete_partner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.partners.delete(id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Partner deleted successfully"
    })))
}

async fn get_partner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let partner = state.db.partners.fetch(id).await?;
    let document_count = state
        .db
        .attachments
        .count_for_owner(&AttachmentOwner::partner(id))
        .await?;
    Ok(Json(serde_json::json!({
        "id": partner.id,
        "name": partner.name,
        "email": partner.email,
        "document_count": document_count,
        "created_at": partner.created_at,
        "updated_at": partner.updated_at,
    })))
}

async fn list_partner_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.partners.exists(id).await? {
        return Err(ApiError::NotFound(format!("Partner not found: {}", id)));
    }
    let documents = state
        .db
        .attachments
        .list_for_owner(&AttachmentOwner::partner(id))
        .await?;
    Ok(Json(documents))
}

/// Upload a document to a partner. Fans re-synchronization out to every
/// purchase order referencing the partner.
async fn upload_partner_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UploadAttachmentBody>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.db.partners.exists(id).await? {
        return Err(ApiError::NotFound(format!("Partner not found: {}", id)));
    }

    let owner = AttachmentOwner::partner(id);
    let summary = store_attachment(&state.db, owner, body).await?;

    state
        .db
        .merge
        .attachment_changed(&owner, summary.origin)
        .await;

    Ok((StatusCode::CREATED, Json(summary)))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Database(dossier_core::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl From<dossier_core::Error> for ApiError {
    fn from(err: dossier_core::Error) -> Self {
        match &err {
            dossier_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            dossier_core::Error::OrderNotFound(_)
            | dossier_core::Error::PartnerNotFound(_)
            | dossier_core::Error::AttachmentNotFound(_) => ApiError::NotFound(err.to_string()),
            dossier_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            dossier_core::Error::Database(sqlx_err) => {
                let msg = sqlx_err.to_string();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    let friendly_msg = if msg.contains("reference") {
                        "An order with this reference already exists".to_string()
                    } else {
                        msg
                    };
                    return ApiError::Conflict(friendly_msg);
                }
                ApiError::Database(err)
            }
            _ => ApiError::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logging: LOG_FORMAT=json switches to structured JSON output.
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!(log_format = %log_format, "Logging initialized");

    // Get configuration from environment
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/dossier".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);
    let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::MAX_UPLOAD_BYTES);

    // Rate limiting configuration
    // RATE_LIMIT_REQUESTS: requests per period (default: 100)
    // RATE_LIMIT_PERIOD_SECS: period in seconds (default: 60)
    let rate_limit_requests: u64 = std::env::var("RATE_LIMIT_REQUESTS")
        .unwrap_or_else(|_| "100".to_string())
        .parse()
        .unwrap_or(100);
    let rate_limit_period_secs: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .unwrap_or(60);
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limit_enabled {
            "enabled"
        } else {
            "disabled"
        },
        rate_limit_requests,
        rate_limit_period_secs
    );

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Create rate limiter if enabled
    let rate_limiter = if rate_limit_enabled {
        let quota = Quota::with_period(std::time::Duration::from_secs(rate_limit_period_secs))
            .expect("Rate limit period must be non-zero")
            .allow_burst(
                NonZeroU32::new(rate_limit_requests as u32).expect("Rate limit must be non-zero"),
            );
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    let state = AppState { db, rate_limiter };

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // OpenAPI / Swagger UI
        .merge(
            SwaggerUi::new("/docs").config(
                Config::new(["/openapi.yaml"])
                    .try_it_out_enabled(true)
                    .filter(true)
                    .display_request_duration(true),
            ),
        )
        .route("/openapi.yaml", get(openapi_yaml))
        .route("/openapi.json", get(openapi_json))
        // Orders
        .route("/api/v1/orders", get(list_orders).post(create_order))
        .route("/api/v1/orders/:id", get(get_order).delete(delete_order))
        .route(
            "/api/v1/orders/:id/attachments",
            get(list_order_attachments).post(upload_order_attachment),
        )
        .route(
            "/api/v1/orders/:id/merged-document",
            get(download_merged_document),
        )
        // UI action contracts
        .route(
            "/api/v1/orders/:id/actions/attachments",
            get(action_open_attachments),
        )
        .route(
            "/api/v1/orders/:id/actions/merged-document",
            get(action_view_merged_document),
        )
        // Attachments
        .route(
            "/api/v1/attachments/:attachment_id",
            get(get_attachment).delete(delete_attachment),
        )
        .route(
            "/api/v1/attachments/:attachment_id/download",
            get(download_attachment),
        )
        // Partners
        .route("/api/v1/partners", post(create_partner))
        .route(
            "/api/v1/partners/:id",
            get(get_partner).delete(delete_partner),
        )
        .route(
            "/api/v1/partners/:id/documents",
            get(list_partner_documents).post(upload_partner_document),
        )
        // Rate limiting status endpoint
        .route("/api/v1/rate-limit/status", get(rate_limit_status))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600))
        })
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_plain_filename() {
        assert_eq!(
            content_disposition("documents_fusionnes.pdf"),
            "attachment; filename=\"documents_fusionnes.pdf\""
        );
    }

    #[test]
    fn test_content_disposition_strips_quotes_and_controls() {
        assert_eq!(
            content_disposition("evil\"name\r\n.pdf"),
            "attachment; filename=\"evilname.pdf\""
        );
    }

    #[test]
    fn test_content_disposition_strips_backslashes() {
        assert_eq!(
            content_disposition("a\\b.pdf"),
            "attachment; filename=\"ab.pdf\""
        );
    }

    #[test]
    fn test_api_error_from_not_found_variants() {
        let id = Uuid::nil();
        for err in [
            dossier_core::Error::OrderNotFound(id),
            dossier_core::Error::PartnerNotFound(id),
            dossier_core::Error::AttachmentNotFound(id),
        ] {
            match ApiError::from(err) {
                ApiError::NotFound(_) => {}
                other => panic!("expected NotFound mapping, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_api_error_from_invalid_input() {
        let err = dossier_core::Error::InvalidInput("bad".to_string());
        match ApiError::from(err) {
            ApiError::BadRequest(msg) => assert_eq!(msg, "bad"),
            other => panic!("expected BadRequest mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_api_error_from_merge_is_internal() {
        let err = dossier_core::Error::Merge("corrupt input".to_string());
        match ApiError::from(err) {
            ApiError::Database(_) => {}
            other => panic!("expected Database mapping, got {:?}", other),
        }
    }

    #[test]
    fn test_upload_body_accepts_missing_content_type() {
        let body: UploadAttachmentBody =
            serde_json::from_str(r#"{"filename": "a.pdf", "data": "aGVsbG8="}"#).unwrap();
        assert_eq!(body.filename, "a.pdf");
        assert!(body.content_type.is_none());
    }

    #[test]
    fn test_create_order_body_defaults_to_no_attachments() {
        let body: CreateOrderBody =
            serde_json::from_str(r#"{"reference": "PO-1"}"#).unwrap();
        assert!(body.attachments.is_empty());
        assert!(body.partner_id.is_none());
    }

    #[test]
    fn test_parse_allowed_origins_default() {
        // Default applies when the variable is unset.
        std::env::remove_var("ALLOWED_ORIGINS");
        let origins = parse_allowed_origins();
        assert!(!origins.is_empty());
    }
}
