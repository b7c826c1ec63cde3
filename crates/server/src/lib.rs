//! ACGE API server
//!
//! Handles:
//! - Session authentication (cookie or bearer JWT)
//! - Folder, document and notification CRUD
//! - The dossier approval workflow
//! - Reference tables and user administration
//! - Observability (logging, metrics, request ids)

pub mod bootstrap;
pub mod handlers;
pub mod middleware;

use acge_common::{
    auth::{AuthKeys, JwtManager},
    cache::TtlCache,
    config::AppConfig,
    db::{
        models::{NatureDocument, PosteComptable},
        DbPool, Repository,
    },
    errors::Result,
    storage::{self, BlobStore},
};
use axum::{
    extract::{DefaultBodyLimit, FromRef, Request},
    http::StatusCode,
    middleware::Next,
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Cached reference-table listings
pub struct ReferenceCache {
    pub natures_documents: TtlCache<&'static str, Vec<NatureDocument>>,
    pub postes_comptables: TtlCache<&'static str, Vec<PosteComptable>>,
}

impl ReferenceCache {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            natures_documents: TtlCache::named("natures_documents", ttl),
            postes_comptables: TtlCache::named("postes_comptables", ttl),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub jwt: Arc<JwtManager>,
    pub blobs: Arc<dyn BlobStore>,
    pub reference: Arc<ReferenceCache>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build the state; fails when the JWT secret is missing
    pub fn new(config: AppConfig, db: DbPool, metrics: Option<PrometheusHandle>) -> Result<Self> {
        let jwt = JwtManager::new(config.jwt_secret()?, config.auth.jwt_expiration_secs);
        let blobs = storage::from_config(&config.storage)?;
        let reference = ReferenceCache::new(config.reference_ttl());

        Ok(Self {
            config: Arc::new(config),
            db,
            jwt: Arc::new(jwt),
            blobs,
            reference: Arc::new(reference),
            metrics,
        })
    }

    /// Swap the blob store (tests use an in-memory one)
    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = blobs;
        self
    }

    pub fn repo(&self) -> Repository {
        Repository::new(self.db.clone())
    }
}

impl FromRef<AppState> for AuthKeys {
    fn from_ref(state: &AppState) -> Self {
        AuthKeys {
            jwt: state.jwt.clone(),
            cookie_name: state.config.auth.cookie_name.clone(),
        }
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    use handlers::{auth, documents, dossiers, folders, health, notifications, reference, users};

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        // Session
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))

        // Folders
        .route("/folders", get(folders::list_folders).post(folders::create_folder))
        .route(
            "/folders/{id}",
            get(folders::get_folder)
                .put(folders::update_folder)
                .delete(folders::delete_folder),
        )

        // Documents
        .route("/documents", get(documents::list_documents).post(documents::create_document))
        .route("/documents/upload", post(documents::upload_document))
        .route(
            "/documents/{id}",
            get(documents::get_document)
                .put(documents::update_document)
                .delete(documents::delete_document),
        )

        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/mark-all-read", put(notifications::mark_all_read))
        .route("/notifications/{id}/read", put(notifications::mark_read))
        .route("/notifications/{id}", delete(notifications::delete_notification))

        // Reference tables
        .route(
            "/natures-documents",
            get(reference::list_natures_documents).post(reference::create_nature_document),
        )
        .route(
            "/postes-comptables",
            get(reference::list_postes_comptables).post(reference::create_poste_comptable),
        )

        // Dossier workflow
        .route("/dossiers", get(dossiers::list_dossiers).post(dossiers::create_dossier))
        .route("/dossiers/queue", get(dossiers::queue))
        .route("/dossiers/{id}", get(dossiers::get_dossier))
        .route("/dossiers/{id}/actions", post(dossiers::perform_action))

        // Administration
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", put(users::update_user))
        .route("/users/{id}/reset-password", post(users::reset_password));

    let rate_limit = &state.config.rate_limit;
    if rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            rate_limit.requests_per_second,
            rate_limit.burst,
        );
        api_routes = api_routes.layer(axum::middleware::from_fn(move |req: Request, next: Next| {
            middleware::rate_limit::rate_limit_middleware(req, next, limiter.clone())
        }));
    }

    let max_upload = state.config.server.max_upload_bytes;
    let timeout = state.config.request_timeout();

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics))
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(request_id)
                .layer(propagate_id)
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
                .layer(CompressionLayer::new())
                .layer(cors),
        )
        .with_state(state)
}
