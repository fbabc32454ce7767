use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use std::any::Any;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod mail;
pub mod membership;
pub mod models;
pub mod repository;
pub mod response;
pub mod storage;

// Routing segregated by access level (public, authenticated, admin).
pub mod routes;
use auth::{AdminUser, AuthUser};
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use cache::ContentCache;
pub use config::{AppConfig, StorageBackend};
pub use error::{AppError, AppResult};
pub use mail::MailerState;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalStorage, MockStorageService, S3StorageClient, StorageState};

use handlers::{
    branches, carousel, committee, content, dashboard, events, gallery, session, settings, users,
};

/// Every API route lives under this prefix; `/health`, `/uploads` and the docs do not.
pub const API_PREFIX: &str = "/api/v1";

/// ApiDoc
///
/// OpenAPI document for every handler, served at `/api-docs/openapi.json` and rendered by
/// Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        session::register, session::login, session::logout, session::refresh_token,
        session::me, session::update_me, session::change_password,
        session::forgot_password, session::reset_password,
        users::list_users, users::get_user, users::update_user, users::delete_user,
        users::approve_membership, users::decline_membership, users::check_availability,
        users::find_by_employee_id, users::bulk_import, users::export_users,
        dashboard::dashboard_stats,
        committee::list_committee, committee::get_committee_member,
        committee::create_committee_member, committee::update_committee_member,
        committee::delete_committee_member,
        branches::list_branches, branches::list_all_branches, branches::get_branch,
        branches::get_branch_by_slug, branches::create_branch, branches::update_branch,
        branches::set_branch_status, branches::delete_branch,
        events::list_events, events::search_events, events::get_event, events::create_event,
        events::update_event, events::delete_event, events::remove_event_file,
        gallery::list_gallery, gallery::list_categories, gallery::get_gallery_post,
        gallery::create_gallery_post, gallery::update_gallery_post,
        gallery::delete_gallery_post, gallery::delete_gallery_image,
        carousel::list_carousels, carousel::list_all_carousels, carousel::get_carousel,
        carousel::create_carousel, carousel::update_carousel, carousel::delete_carousel,
        carousel::delete_carousel_image,
        content::list_content, content::get_content, content::upsert_content,
        content::bulk_upsert_content, content::delete_content, content::clear_content_cache,
        settings::list_settings, settings::get_setting, settings::upsert_setting,
        settings::delete_setting,
    ),
    components(
        schemas(
            models::User, models::MemberProfile, models::Role, models::MembershipStatus,
            models::Attachment, models::LoginRequest, models::LoginResponse, models::TokenPair,
            models::RefreshTokenRequest, models::ForgotPasswordRequest,
            models::ForgotPasswordResponse, models::ResetPasswordRequest,
            models::ChangePasswordRequest, models::BulkImportRequest, models::BulkImportReport,
            models::ImportFailure, models::Availability, models::DashboardStats,
            models::LinkedUser, models::CommitteeMember, models::CommitteeMemberView,
            models::CommitteeRole, models::Branch, models::BranchView, models::BranchContact,
            models::BranchService, models::UniqueProgram, models::TeamMember,
            models::TeamMemberView, models::TeamMemberInput, models::BranchStatusRequest,
            models::Event, models::EventFile, models::RemoveFileRequest, models::GalleryPost,
            models::GalleryImage, models::GalleryCategory, models::Carousel,
            models::CarouselImage, models::CarouselType, models::Content, models::ContentType,
            models::ContentUpsert, models::ContentBulkRequest, models::Setting,
            models::SettingUpsert, storage::PurgeReport,
        )
    ),
    tags(
        (name = "users", description = "Registration, sessions and membership administration"),
        (name = "dashboard", description = "Admin console counters"),
        (name = "committee", description = "Committee roster"),
        (name = "branches", description = "Branch directory"),
        (name = "events", description = "Events and their attachments"),
        (name = "gallery", description = "Photo gallery"),
        (name = "carousel", description = "Homepage and branch slideshows"),
        (name = "content", description = "Editable page content"),
        (name = "settings", description = "Site-wide settings")
    )
)]
struct ApiDoc;

/// AppState
///
/// Every service a handler may need, shared across requests. Handlers take the whole state;
/// the extractors in `auth` pull single components out of it through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub config: AppConfig,
    pub mailer: MailerState,
    pub content_cache: ContentCache,
}

impl AppState {
    /// Builds the state, deriving the mailer and content cache from `config`.
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> Self {
        let mailer = mail::build_mailer(config.smtp.as_ref());
        let content_cache = ContentCache::new(config.content_cache_ttl_secs);
        Self { repo, storage, config, mailer, content_cache }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Gate for the authenticated router. Extracting `AuthUser` is the whole check: a missing,
/// invalid or expired credential is rejected with 401 before the handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// Gate for the admin router: 401 without a valid session, 403 for a non-admin session.
async fn admin_middleware(_admin: AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routers, applies the access gates and the observability stack, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");
    let cors = cors_layer(&state.config);
    let body_limit = state.config.max_upload_bytes;
    let uploads = (state.config.storage_backend == StorageBackend::Local)
        .then(|| ServeDir::new(&state.config.upload_dir));

    let api = Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_middleware)),
        );

    let mut router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(|| async { "ok" }))
        .nest(API_PREFIX, api)
        .fallback(|| async { AppError::NotFound("Route not found".into()) });
    if let Some(uploads) = uploads {
        router = router.nest_service("/uploads", uploads);
    }

    router
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(CatchPanicLayer::custom(panic_response)),
        )
        .layer(cors)
}

/// origin_allowed
///
/// An origin passes when it is on the configured allow-list or is a local development
/// origin (`localhost` / `127.0.0.1`, any port, http or https).
pub fn origin_allowed(origin: &str, allow_list: &[String]) -> bool {
    if allow_list.iter().any(|allowed| allowed.trim_end_matches('/') == origin) {
        return true;
    }
    let Some(authority) = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
    else {
        return false;
    };
    let host = authority.split_once(':').map_or(authority, |(host, _)| host);
    matches!(host, "localhost" | "127.0.0.1")
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let allow_list = config.cors_origins.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin.to_str().is_ok_and(|o| origin_allowed(o, &allow_list))
        }))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(auth::ADMIN_FRONTEND_HEADER),
            HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([HeaderName::from_static("x-request-id"), header::CONTENT_DISPOSITION])
}

/// A panicking handler still answers with the error envelope.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");
    AppError::Internal(format!("handler panicked: {detail}")).into_response()
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, URI and the `x-request-id` set by `SetRequestIdLayer`, so
/// every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

#[cfg(test)]
mod tests {
    use super::origin_allowed;

    #[test]
    fn local_origins_pass_on_any_port() {
        assert!(origin_allowed("http://localhost:5173", &[]));
        assert!(origin_allowed("https://127.0.0.1", &[]));
        assert!(!origin_allowed("http://localhost.evil.com", &[]));
        assert!(!origin_allowed("file://localhost", &[]));
    }

    #[test]
    fn configured_origins_match_without_trailing_slash() {
        let allowed = vec!["https://portal.example.org/".to_string()];
        assert!(origin_allowed("https://portal.example.org", &allowed));
        assert!(!origin_allowed("https://other.example.org", &allowed));
    }
}
