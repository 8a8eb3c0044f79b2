use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use shared::jwt::{JwtConfig, JwtError};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware};
use crate::routes::{admin, auth, groups, health, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtConfig>,
}

pub fn create_app(config: Config, pool: PgPool) -> Result<Router, JwtError> {
    let config = Arc::new(config);

    let jwt = Arc::new(JwtConfig::new(
        &config.jwt.secret,
        config.jwt.access_token_expiry_secs,
        config.jwt.leeway_secs,
    )?);

    let state = AppState {
        pool,
        config: config.clone(),
        jwt,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/groups/code/:code", get(groups::get_group_by_code));

    // Authenticated routes; handlers take a UserAuth extractor
    let user_routes = Router::new()
        .route("/api/v1/users/me", get(users::get_current_user))
        .route(
            "/api/v1/users/:user_id/with-groups",
            get(users::get_user_with_groups),
        )
        .route("/api/v1/users/:user_id/plan", put(users::select_pack))
        .route("/api/v1/users/:user_id", patch(users::update_profile))
        .route("/api/v1/groups/join", post(groups::join_group))
        .route("/api/v1/groups/confirm-member", post(groups::confirm_member))
        .route("/api/v1/groups/first-group", post(groups::create_first_group))
        .route("/api/v1/groups/next-group", post(groups::create_next_group))
        .route("/api/v1/groups/:group_id", get(groups::get_group))
        .route(
            "/api/v1/groups/:group_id/members",
            get(groups::list_group_members),
        );

    // Admin routes; handlers take an AdminAuth extractor
    let admin_routes = Router::new()
        .route(
            "/api/v1/admin/users/pending",
            get(admin::list_pending_users),
        )
        .route(
            "/api/v1/admin/users/:user_id/status",
            put(admin::update_user_status),
        )
        .route(
            "/api/v1/admin/users/:user_id/advance",
            post(admin::advance_user),
        )
        .route(
            "/api/v1/admin/missing-next-group",
            get(admin::find_missing_next_group),
        )
        .route(
            "/api/v1/admin/missing-next-group/repair",
            post(admin::repair_missing_next_group),
        );

    let router = Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    Ok(router)
}
