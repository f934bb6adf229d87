//! Axum host adapter.
//!
//! Wires the lifecycle hooks into an HTTP server: a middleware gates every
//! route except `/health`, resolving the visitor's per-context session from a
//! cookie and mapping the gate's `Outcome` onto responses.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use keygate_core::{Client, RequestContext, Timestamp};
use std::sync::Arc;
use url::Url;

use crate::config::RootConfig;
use crate::error::RootResult;
use crate::session::{SessionKey, SessionRegistry};
use crate::{on_after_initialise, on_user_after_logout, Outcome, REDIRECT_STATUS};

/// Session cookie of the public site.
pub const SITE_COOKIE: &str = "keygate_site";
/// Session cookie of the administrative context.
pub const ADMIN_COOKIE: &str = "keygate_admin";

/// Shared application state for Axum handlers.
pub struct AppState {
    pub config: RootConfig,
    pub app_root: Url,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: RootConfig) -> RootResult<Self> {
        config.validate()?;
        let app_root = config.server.app_root_url()?;
        let sessions = SessionRegistry::new(config.server.session_idle_secs);
        Ok(Self {
            config,
            app_root,
            sessions,
        })
    }

    /// Requests under the admin prefix belong to the administrative context.
    pub fn client_for(&self, path: &str) -> Client {
        if self.config.server.is_admin_path(path) {
            Client::Admin
        } else {
            Client::Site
        }
    }
}

/// Build the Axum router with all endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    let admin = state.config.server.admin_prefix().to_string();

    let gated = Router::new()
        .route("/", get(handle_site))
        .route(&admin, get(handle_admin))
        .route(&format!("{admin}/"), get(handle_admin))
        .route(
            &format!("{admin}/logout"),
            get(handle_logout).post(handle_logout),
        )
        .route(&format!("{admin}/{{*rest}}"), get(handle_admin))
        .fallback(handle_site)
        .layer(middleware::from_fn_with_state(state.clone(), gate_layer));

    Router::new()
        .route("/health", get(handle_health))
        .merge(gated)
        .with_state(state)
}

fn cookie_name(client: Client) -> &'static str {
    match client {
        Client::Admin => ADMIN_COOKIE,
        _ => SITE_COOKIE,
    }
}

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": message,
            "code": status.as_u16(),
        })),
    )
        .into_response()
}

/// Map a hook outcome onto an HTTP response.
pub fn render(outcome: Outcome) -> Response {
    match outcome {
        Outcome::Proceed => StatusCode::NO_CONTENT.into_response(),
        Outcome::Redirect { location } => {
            let status = StatusCode::from_u16(REDIRECT_STATUS).unwrap_or(StatusCode::SEE_OTHER);
            (status, [(header::LOCATION, location.to_string())]).into_response()
        }
        Outcome::Raise(err) => {
            let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::UNAUTHORIZED);
            error_response(status, &err.message)
        }
    }
}

/// Middleware: run the gate before any gated handler.
async fn gate_layer(State(state): State<Arc<AppState>>, mut request: Request, next: Next) -> Response {
    let client = state.client_for(request.uri().path());
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let existing = read_cookie(request.headers(), cookie_name(client))
        .map(|id| SessionKey { client, id })
        .filter(|key| state.sessions.touch(key));
    let fresh = existing.is_none();
    let key = existing.unwrap_or_else(|| state.sessions.issue_key(client));

    let mut ctx = match RequestContext::from_path(client, &state.app_root, &path_and_query) {
        Ok(ctx) => ctx,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let outcome = {
        let session = state.sessions.handle(key.clone());
        on_after_initialise(
            &mut ctx,
            &state.config.gate,
            &session,
            &state.config,
            Timestamp::now(),
        )
    };

    let mut response = match outcome {
        Ok(Outcome::Proceed) => {
            request.extensions_mut().insert(key.clone());
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Ok(other) => render(other),
        Err(e) => {
            tracing::error!(error = %e, "gate evaluation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    };

    // Cookie only once the gate stored something for this visitor
    if fresh && state.sessions.contains(&key) {
        let path = match client {
            Client::Admin => state.config.server.admin_prefix(),
            _ => "/",
        };
        let cookie = format!(
            "{}={}; Path={}; HttpOnly; SameSite=Lax",
            cookie_name(client),
            key.id,
            path
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!(error = %e, "could not encode session cookie"),
        }
    }

    response
}

/// GET /health -- server info, never gated
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "area": state.config.gate.area,
        "block_mode": state.config.gate.block_mode,
        "gate_configured": state.config.gate.is_configured(),
        "active_sessions": state.sessions.active_count(),
    }))
}

/// Public site pages.
async fn handle_site(Extension(ctx): Extension<RequestContext>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "context": "site",
        "path": ctx.route(),
    }))
}

/// Administrative pages.
async fn handle_admin(Extension(ctx): Extension<RequestContext>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "context": "administrator",
        "path": ctx.route(),
        "action": ctx.action(),
    }))
}

/// GET|POST {admin}/logout -- administrative logout
async fn handle_logout(
    State(state): State<Arc<AppState>>,
    Extension(key): Extension<SessionKey>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let session = state.sessions.handle(key);
    render(on_user_after_logout(&ctx, &session))
}
