//! ClearSpend Web Server
//!
//! Axum-based server for the ClearSpend expense tracker:
//! - Signature-verified provider webhooks feeding the message dispatcher
//! - A small bearer-token-authenticated CRUD + reporting API
//! - Restrictive CORS policy and security response headers
//! - Sanitized error responses
//!
//! The webhook path enforces a hard ordering: signature verification happens
//! before any user lookup, gateway call, or database write.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use clearspend_core::db::Database;
use clearspend_core::inference::{InferenceBackend, InferenceClient};
use clearspend_core::{Error as CoreError, MessageDispatcher, User};

mod handlers;
mod twiml;

pub use twiml::MessagingResponse;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Authorization header for API token auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Development-mode header naming the acting user when auth is disabled
const DEV_USER_HEADER: &str = "x-user-phone";

/// A bearer token bound to one user's phone number
///
/// Tokens are issued out of band and injected through configuration; this is
/// the identity seam for the REST API surface, separate from the webhook
/// pipeline's own sender resolution.
#[derive(Clone)]
pub struct ApiToken {
    pub token: String,
    pub phone_number: String,
}

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether the REST API requires authentication (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// Bearer token bindings for the REST API
    pub api_tokens: Vec<ApiToken>,
    /// Shared secret for webhook signature verification; the webhook route
    /// fails closed when unset
    pub twilio_auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_tokens: vec![],
            twilio_auth_token: None,
        }
    }
}

impl ServerConfig {
    /// Populate secrets from environment variables
    ///
    /// - `TWILIO_AUTH_TOKEN`: webhook signing secret
    /// - `CLEARSPEND_API_TOKENS`: comma-separated `token=phone` bindings
    pub fn from_env() -> Self {
        Self {
            twilio_auth_token: std::env::var("TWILIO_AUTH_TOKEN").ok(),
            api_tokens: std::env::var("CLEARSPEND_API_TOKENS")
                .map(|raw| parse_api_tokens(&raw))
                .unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// Parse comma-separated `token=phone` bindings
pub fn parse_api_tokens(input: &str) -> Vec<ApiToken> {
    input
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            match entry.split_once('=') {
                Some((token, phone)) if !token.is_empty() && !phone.is_empty() => Some(ApiToken {
                    token: token.to_string(),
                    phone_number: phone.to_string(),
                }),
                _ => {
                    warn!(entry = %entry, "Ignoring malformed API token binding");
                    None
                }
            }
        })
        .collect()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub dispatcher: MessageDispatcher,
}

/// Authentication middleware for the REST API routes
///
/// Bearer tokens are compared in constant time to prevent timing attacks.
/// The webhook routes are not behind this middleware; they carry their own
/// signature verification.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let token_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|token| lookup_api_token(token, &state.config.api_tokens).is_some())
        .unwrap_or(false);

    if token_valid {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized API request");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Find the binding for a presented token using constant-time comparison
fn lookup_api_token<'a>(provided: &str, tokens: &'a [ApiToken]) -> Option<&'a ApiToken> {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();
    for binding in tokens {
        let token_bytes = binding.token.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == token_bytes.len()
            && bool::from(provided_bytes.ct_eq(token_bytes))
        {
            return Some(binding);
        }
    }
    None
}

/// Resolve the acting user for a REST API request
///
/// With auth enabled the bearer token names the bound phone number; with auth
/// disabled (local development) the `X-User-Phone` header does.
pub(crate) fn acting_user(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let phone = if state.config.require_auth {
        let token = headers
            .get(AUTHORIZATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?;
        lookup_api_token(token, &state.config.api_tokens)
            .map(|binding| binding.phone_number.clone())
            .ok_or_else(|| AppError::unauthorized("Authentication required"))?
    } else {
        headers
            .get(DEV_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::unauthorized("X-User-Phone header required when auth is disabled")
            })?
    };

    let user = state
        .db
        .resolve_contact(clearspend_core::strip_transport_prefix(&phone))
        .map_err(AppError::from_core)?;
    Ok(user)
}

/// Create the application router, building the inference client from the
/// environment
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    let gateway = InferenceClient::from_env();
    info!("Inference gateway configured: {}", gateway.describe());
    create_router_with_gateway(db, config, gateway)
}

/// Create the application router with an explicit inference client (for
/// testing)
pub fn create_router_with_gateway(
    db: Database,
    config: ServerConfig,
    gateway: InferenceClient,
) -> Router {
    let dispatcher = MessageDispatcher::new(db.clone(), gateway);

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        dispatcher,
    });

    let api_routes = Router::new()
        // Acting user
        .route("/me", get(handlers::get_me))
        // Expenses
        .route(
            "/expenses",
            get(handlers::list_expenses).post(handlers::create_expense),
        )
        .route("/expenses/stats", get(handlers::expense_stats))
        .route(
            "/expenses/:id",
            get(handlers::get_expense)
                .put(handlers::update_expense)
                .delete(handlers::delete_expense),
        )
        // Reports
        .route("/reports", get(handlers::get_report))
        // Monthly limit
        .route("/limit", put(handlers::update_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let webhook_routes = Router::new()
        .route("/twilio/incoming", post(handlers::twilio_incoming))
        .route("/twilio/status", post(handlers::twilio_status))
        .route("/telegram", post(handlers::telegram_incoming));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .nest("/webhooks", webhook_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ))
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(db, host, port, ServerConfig::from_env()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  API authentication disabled - do not expose to network!");
    }
    if config.twilio_auth_token.is_none() {
        warn!("⚠️  TWILIO_AUTH_TOKEN not set - inbound webhooks will be rejected");
    }

    check_gateway_connection().await;

    let app = create_router(db, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log inference gateway status
async fn check_gateway_connection() {
    let gateway = InferenceClient::from_env();
    if gateway.health_check().await {
        info!("✅ Inference gateway configured: {}", gateway.describe());
    } else {
        warn!(
            "⚠️  Inference endpoints not configured ({}); text falls back to local parsing",
            gateway.describe()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map core errors onto HTTP statuses, keeping messages sanitized
    pub fn from_core(err: CoreError) -> Self {
        match err {
            CoreError::InvalidData(msg) => Self::bad_request(&msg),
            CoreError::NotFound(msg) => Self::not_found(&msg),
            CoreError::Config(msg) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Server misconfiguration".to_string(),
                internal: Some(anyhow::anyhow!(msg)),
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "An internal error occurred".to_string(),
                internal: Some(other.into()),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
