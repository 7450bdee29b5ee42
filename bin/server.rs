// Allocation Intake - Web Server
// REST API with Axum: public forms + password-gated admin panel

use allocation_intake::admin::{check_password, AdminPanel, Export, StoreKind};
use allocation_intake::allocation::{bands_for, category_shares, resolve_labels, AllocationBreakdown, CapitalBand, CategoryShare, Tier};
use allocation_intake::config::Config;
use allocation_intake::error::{AccessError, IntakeError, LookupError, StorageError};
use allocation_intake::intake::{
    submit_investor, submit_profile, Attachment, AttachmentKind, InvestorForm, InvestorSubmission, ProfileForm,
    ProfileSubmission, UploadTarget,
};
use allocation_intake::logging::init_tracing;
use allocation_intake::upload::{DriveUploader, FileUploader};
use anyhow::Context as _;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, Request, State},
    http::{header, HeaderName, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";
const CONTENT_SHA256_HEADER: HeaderName = HeaderName::from_static("x-content-sha256");

/// Shared application state
#[derive(Clone)]
struct AppState {
    panel: AdminPanel,
    config: Arc<Config>,
    uploader: Option<Arc<dyn FileUploader>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = ApiResponse {
            success: false,
            data: (),
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

impl From<LookupError> for ApiError {
    fn from(e: LookupError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<AccessError> for ApiError {
    fn from(e: AccessError) -> Self {
        ApiError::Unauthorized(e.to_string())
    }
}

impl From<IntakeError> for ApiError {
    fn from(e: IntakeError) -> Self {
        match e {
            IntakeError::Validation(errors) => ApiError::BadRequest(
                errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "),
            ),
            IntakeError::Lookup(e) => e.into(),
            IntakeError::Storage(e) => e.into(),
        }
    }
}

/// Malformed or mistyped JSON bodies get the same envelope as other 400s
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_store(store: &str) -> ApiResult<StoreKind> {
    store.parse().map_err(ApiError::NotFound)
}

// ============================================================================
// Public handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

#[derive(Serialize)]
struct BandOption {
    band: CapitalBand,
    nominal: i64,
}

#[derive(Serialize)]
struct TierOption {
    tier: Tier,
    bands: Vec<BandOption>,
}

/// GET /api/tiers - Tiers with their selectable bands
async fn list_tiers() -> impl IntoResponse {
    let catalog: Vec<TierOption> = Tier::ALL
        .iter()
        .map(|&tier| TierOption {
            tier,
            bands: bands_for(tier)
                .iter()
                .map(|&band| BandOption {
                    band,
                    nominal: band.nominal(),
                })
                .collect(),
        })
        .collect();

    Json(ApiResponse::ok(catalog))
}

#[derive(Serialize)]
struct AllocationPreview {
    tier: Tier,
    capital_band: CapitalBand,
    breakdown: AllocationBreakdown,
    shares: Vec<CategoryShare>,
}

/// GET /api/allocation/:tier/:band - Breakdown without persisting
async fn preview_allocation(Path((tier, band)): Path<(String, String)>) -> ApiResult<Json<ApiResponse<AllocationPreview>>> {
    let (tier, capital_band, breakdown) = resolve_labels(&tier, &band)?;

    Ok(Json(ApiResponse::ok(AllocationPreview {
        tier,
        capital_band,
        shares: category_shares(&breakdown),
        breakdown,
    })))
}

/// POST /api/investors - Investor allocation form
async fn create_investor(
    State(state): State<AppState>,
    payload: Result<Json<InvestorForm>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<InvestorSubmission>>)> {
    let Json(form) = payload?;
    let submission = submit_investor(
        state.panel.store(StoreKind::Clients),
        &form,
        Some(&state.config.simulations_dir),
    )?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(submission))))
}

/// POST /api/profiles - Profile form: a JSON `profile` part plus optional logo/pdf/video files
async fn create_profile(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<ProfileSubmission>>)> {
    let bad_part = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(e.to_string());

    let mut form: Option<ProfileForm> = None;
    let mut attachments = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_part)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "profile" {
            let text = field.text().await.map_err(bad_part)?;
            let parsed = serde_json::from_str(&text)
                .map_err(|e| ApiError::BadRequest(format!("invalid profile JSON: {}", e)))?;
            form = Some(parsed);
        } else if let Some(kind) = AttachmentKind::from_field(&name) {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(bad_part)?;

            // Empty file inputs still arrive as parts
            if !file_name.is_empty() && !bytes.is_empty() {
                attachments.push(Attachment {
                    kind,
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
        } else {
            tracing::debug!(field = %name, "ignoring unknown multipart field");
        }
    }

    let form = form.ok_or_else(|| ApiError::BadRequest("missing \"profile\" part".to_string()))?;
    let target = UploadTarget {
        uploader: state.uploader.as_deref(),
        staging_dir: &state.config.upload_staging_dir,
        folder_id: state.config.drive_folder_id.as_deref(),
    };

    let submission = submit_profile(state.panel.store(StoreKind::Profiles), &target, form, attachments).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(submission))))
}

// ============================================================================
// Admin handlers
// ============================================================================

/// Rejects admin requests without the right `x-admin-password` header
async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> ApiResult<Response> {
    let provided = request
        .headers()
        .get(ADMIN_PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok());

    check_password(state.config.admin_password.as_deref(), provided)?;
    Ok(next.run(request).await)
}

/// GET /api/admin/:store/records
async fn admin_list(State(state): State<AppState>, Path(store): Path<String>) -> ApiResult<Response> {
    let rows = state.panel.list(parse_store(&store)?)?;
    Ok(Json(ApiResponse::ok(rows)).into_response())
}

#[derive(Serialize)]
struct Created {
    id: i64,
}

/// POST /api/admin/:store/records - Same insert path as the public forms
async fn admin_add(
    State(state): State<AppState>,
    Path(store): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Created>>)> {
    let Json(body) = payload?;
    let invalid = |e: serde_json::Error| ApiError::BadRequest(format!("invalid record: {}", e));

    let id = match parse_store(&store)? {
        StoreKind::Clients => {
            let form: InvestorForm = serde_json::from_value(body).map_err(invalid)?;
            state.panel.add_client(&form)?
        }
        StoreKind::Profiles => {
            let form: ProfileForm = serde_json::from_value(body).map_err(invalid)?;
            state.panel.add_profile(form)?
        }
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(Created { id }))))
}

#[derive(Serialize)]
struct Deleted {
    id: i64,
    deleted: bool,
}

/// DELETE /api/admin/:store/records/:id - Missing ids are not an error
async fn admin_delete(
    State(state): State<AppState>,
    Path((store, id)): Path<(String, i64)>,
) -> ApiResult<Json<ApiResponse<Deleted>>> {
    let deleted = state.panel.delete(parse_store(&store)?, id)?;
    Ok(Json(ApiResponse::ok(Deleted { id, deleted })))
}

fn download(export: Export) -> Response {
    (
        [
            (header::CONTENT_TYPE, export.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.file_name),
            ),
            (CONTENT_SHA256_HEADER, export.sha256),
        ],
        export.bytes,
    )
        .into_response()
}

/// GET /api/admin/:store/export - SQL dump download
async fn admin_export(State(state): State<AppState>, Path(store): Path<String>) -> ApiResult<Response> {
    let export = state.panel.export_dump(parse_store(&store)?)?;
    Ok(download(export))
}

/// GET /api/admin/:store/export.csv - Table as CSV
async fn admin_export_csv(State(state): State<AppState>, Path(store): Path<String>) -> ApiResult<Response> {
    let export = state.panel.export_csv(parse_store(&store)?)?;
    Ok(download(export))
}

// ============================================================================
// Router
// ============================================================================

fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/:store/records", get(admin_list).post(admin_add))
        .route("/:store/records/:id", delete(admin_delete))
        .route("/:store/export", get(admin_export))
        .route("/:store/export.csv", get(admin_export_csv))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/tiers", get(list_tiers))
        .route("/allocation/:tier/:band", get(preview_allocation))
        .route("/investors", post(create_investor))
        .route("/profiles", post(create_profile))
        .nest("/admin", admin_routes);

    let max_body = state.config.max_upload_bytes;

    // Cors needs an inner body with `Default`, so the limit wraps it from outside
    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body))
                .layer(CorsLayer::permissive()),
        )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    println!("🌐 Allocation Intake - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = Config::from_env()?;

    let panel = AdminPanel::from_config(&config);
    panel.ensure_schemas().context("could not prepare record stores")?;
    println!("✓ Stores ready: {:?}, {:?}", config.clients_db_path, config.profiles_db_path);

    let uploader: Option<Arc<dyn FileUploader>> = if config.google_token_path.exists() {
        Some(Arc::new(DriveUploader::new(
            config.drive_upload_url.clone(),
            config.google_token_path.clone(),
        )))
    } else {
        tracing::warn!(
            path = %config.google_token_path.display(),
            "token file not found, profile attachments will not be uploaded"
        );
        None
    };

    if config.admin_password.is_none() {
        tracing::warn!("ADMIN_PASSWORD not set, admin routes are disabled");
    }

    let port = config.port;
    let state = AppState {
        panel,
        config: Arc::new(config),
        uploader,
    };
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    println!("\n🚀 Server running on http://localhost:{}", port);
    println!("   API: http://localhost:{}/api/tiers", port);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocation_intake::db::RecordStore;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    fn test_app(password: Option<&str>) -> (tempfile::TempDir, Router) {
        test_app_with_limit(password, Config::default().max_upload_bytes)
    }

    fn test_app_with_limit(password: Option<&str>, max_upload_bytes: usize) -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            clients_db_path: dir.path().join("clientes.db"),
            profiles_db_path: dir.path().join("client_profiles.db"),
            admin_password: password.map(str::to_string),
            upload_staging_dir: dir.path().join("uploads"),
            simulations_dir: dir.path().join("simulations"),
            max_upload_bytes,
            ..Config::default()
        };
        let panel = AdminPanel::new(
            RecordStore::new(&config.clients_db_path),
            RecordStore::new(&config.profiles_db_path),
        );
        panel.ensure_schemas().unwrap();

        let state = AppState {
            panel,
            config: Arc::new(config),
            uploader: None,
        };
        (dir, build_router(state))
    }

    async fn send(app: &Router, request: HttpRequest<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    fn get_req(uri: &str, password: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(p) = password {
            builder = builder.header(ADMIN_PASSWORD_HEADER, p);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value, password: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(p) = password {
            builder = builder.header(ADMIN_PASSWORD_HEADER, p);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_tiers() {
        let (_dir, app) = test_app(None);

        let (status, body) = send(&app, get_req("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");

        let (_, body) = send(&app, get_req("/api/tiers", None)).await;
        let tiers = body["data"].as_array().unwrap();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[2]["tier"], "Advanced");
        assert_eq!(tiers[2]["bands"][0]["band"], "1M");
        assert_eq!(tiers[0]["bands"][0]["nominal"], 20_000);
    }

    #[tokio::test]
    async fn test_preview_rejects_invalid_pair() {
        let (_dir, app) = test_app(None);

        let (status, body) = send(&app, get_req("/api/allocation/Starter/20k", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["breakdown"]["total_net_worth"], 60_000);
        assert_eq!(body["data"]["shares"].as_array().unwrap().len(), 6);

        let (status, body) = send(&app, get_req("/api/allocation/Advanced/40k", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_investor_submission_and_admin_listing() {
        let (_dir, app) = test_app(Some("secret"));
        let form = serde_json::json!({
            "name": "Ana",
            "phone": "81 9999",
            "email": "ana@mail.com",
            "tier": "Intermediate",
            "capital_band": "200k"
        });

        let (status, body) = send(&app, post_json("/api/investors", form, None)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["record"]["total_net_worth"], 600_000);

        let (status, _) = send(&app, get_req("/api/admin/clients/records", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, get_req("/api/admin/clients/records", Some("wrong"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, get_req("/api/admin/clients/records", Some("secret"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["name"], "Ana");
        assert_eq!(body["data"][0]["id"], 1);
    }

    #[tokio::test]
    async fn test_missing_fields_rejected() {
        let (_dir, app) = test_app(None);
        let form = serde_json::json!({ "name": "", "tier": "Starter", "capital_band": "20k" });

        let (status, body) = send(&app, post_json("/api/investors", form, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("name"));
    }

    #[tokio::test]
    async fn test_missing_tier_and_malformed_json_use_error_envelope() {
        let (_dir, app) = test_app(None);
        let form = serde_json::json!({ "name": "Ana", "phone": "81 9999", "email": "ana@mail.com" });

        let (status, body) = send(&app, post_json("/api/investors", form, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("tier"));
        assert!(message.contains("capital_band"));

        let broken = HttpRequest::builder()
            .method("POST")
            .uri("/api/investors")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();
        let (status, body) = send(&app, broken).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());

        let wrong_type = serde_json::json!({ "name": 7, "tier": "Starter", "capital_band": "20k" });
        let (status, body) = send(&app, post_json("/api/investors", wrong_type, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_admin_add_profile_rejects_unknown_fields() {
        let (_dir, app) = test_app(Some("secret"));

        let profile = serde_json::json!({ "company_name": "Acme", "phone": "(81) 9999-0000", "site": "x.com" });
        let (status, _) = send(&app, post_json("/api/admin/profiles/records", profile, Some("secret"))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = send(&app, get_req("/api/admin/profiles/records", Some("secret"))).await;
        assert_eq!(body["data"][0]["phone"], "(81) 9999-0000");
        assert_eq!(body["data"][0]["website"], "x.com");

        let typo = serde_json::json!({ "company_name": "Acme", "telefone": "123" });
        let (status, body) = send(&app, post_json("/api/admin/profiles/records", typo, Some("secret"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("telefone"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_refused() {
        let (_dir, app) = test_app_with_limit(None, 64);
        let payload = serde_json::json!({ "name": "x".repeat(200), "tier": "Starter", "capital_band": "20k" }).to_string();

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/investors")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, payload.len())
            .body(Body::from(payload))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let (status, _) = send(&app, get_req("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_disabled_without_password() {
        let (_dir, app) = test_app(None);
        let (status, _) = send(&app, get_req("/api/admin/clients/records", Some("anything"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_add_delete_and_unknown_store() {
        let (_dir, app) = test_app(Some("secret"));
        let profile = serde_json::json!({ "company_name": "Acme", "services": "Consultoria, Outros" });

        let (status, body) = send(&app, post_json("/api/admin/profiles/records", profile, Some("secret"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["id"], 1);

        let delete_req = |id: i64| {
            HttpRequest::builder()
                .method("DELETE")
                .uri(format!("/api/admin/profiles/records/{}", id))
                .header(ADMIN_PASSWORD_HEADER, "secret")
                .body(Body::empty())
                .unwrap()
        };
        let (_, body) = send(&app, delete_req(1)).await;
        assert_eq!(body["data"]["deleted"], true);
        let (status, body) = send(&app, delete_req(1)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], false);

        let (status, _) = send(&app, get_req("/api/admin/orders/records", Some("secret"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_export_headers() {
        let (_dir, app) = test_app(Some("secret"));

        let response = app
            .clone()
            .oneshot(get_req("/api/admin/clients/export", Some("secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers().clone();
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"clientes.db.sql\""
        );
        let sha = headers["x-content-sha256"].to_str().unwrap().to_string();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(sha, allocation_intake::db::sha256_hex(&bytes));
        assert!(bytes.starts_with(b"BEGIN TRANSACTION;\n"));
    }
}
