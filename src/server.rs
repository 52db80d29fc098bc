use crate::auth::AuthUser;
use crate::error::{ImportError, Result};
use crate::tasks::{self, AppState, Credentials};
use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "menu-import",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn error_response(err: ImportError) -> Response {
    let status = match &err {
        ImportError::Json(_) | ImportError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ImportError::NotFound(_) => StatusCode::NOT_FOUND,
        ImportError::Forbidden(_) => StatusCode::FORBIDDEN,
        ImportError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

/// Resolves the caller from the `Authorization: Bearer` header.
fn require_user(state: &AppState, headers: &HeaderMap) -> Result<AuthUser> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ImportError::Unauthenticated("missing bearer token".to_string()))?;

    state
        .auth
        .authenticate(token)
        .ok_or_else(|| ImportError::Unauthenticated("invalid or expired token".to_string()))
}

async fn login(Extension(state): Extension<Arc<AppState>>, Json(creds): Json<Credentials>) -> Response {
    match tasks::login(&state, &creds).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => error_response(e),
    }
}

async fn register(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(creds): Json<Credentials>,
) -> Response {
    let user = match require_user(&state, &headers) {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };
    match tasks::register(&state, &user, &creds).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    /// Existing session token to re-preview into, when present.
    session: Option<String>,
}

async fn preview(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<PreviewQuery>,
    body: String,
) -> Response {
    match tasks::preview_import(&state, &body, query.session.as_deref()).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => error_response(e),
    }
}

async fn upload_images(
    Extension(state): Extension<Arc<AppState>>,
    Path(session): Path<String>,
    body: Bytes,
) -> Response {
    match tasks::upload_images(&state, &session, &body).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => error_response(e),
    }
}

async fn image_template(
    Extension(state): Extension<Arc<AppState>>,
    Path(session): Path<String>,
) -> Response {
    match tasks::image_template(&state, &session).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/zip"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"images-template.zip\"",
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn commit(
    Extension(state): Extension<Arc<AppState>>,
    Path(session): Path<String>,
) -> Response {
    match tasks::commit_import(&state, &session).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => error_response(e),
    }
}

async fn catalog(Extension(state): Extension<Arc<AppState>>) -> Response {
    match tasks::catalog(&state).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => error_response(e),
    }
}

async fn catalog_detail(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match tasks::catalog_detail(&state, &id).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => error_response(e),
    }
}

async fn pending_restaurants(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let user = match require_user(&state, &headers) {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };
    match tasks::pending_restaurants(&state, &user).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => error_response(e),
    }
}

async fn approve_restaurant(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let user = match require_user(&state, &headers) {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };
    match tasks::approve_restaurant(&state, &user, &id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn pending_menu_items(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let user = match require_user(&state, &headers) {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };
    match tasks::pending_menu_items(&state, &user).await {
        Ok(res) => Json(res).into_response(),
        Err(e) => error_response(e),
    }
}

async fn approve_menu_item(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let user = match require_user(&state, &headers) {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };
    match tasks::approve_menu_item(&state, &user, &id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// Create the HTTP server with all routes.
pub fn create_server(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // Anonymous import flow
        .route("/import/preview", post(preview))
        .route("/import/:session/images", post(upload_images))
        .route("/import/:session/template", get(image_template))
        .route("/import/:session/commit", post(commit))
        // Anonymous public catalog
        .route("/catalog", get(catalog))
        .route("/catalog/:id", get(catalog_detail))
        // Authenticated approval workflow
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route(
            "/approvals/restaurants",
            get(pending_restaurants),
        )
        .route("/approvals/restaurants/:id", post(approve_restaurant))
        .route("/approvals/menu-items", get(pending_menu_items))
        .route("/approvals/menu-items/:id", post(approve_menu_item))
        // Committed images are served straight from the upload root
        .nest_service("/uploads", ServeDir::new(&state.upload_root))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check:   http://localhost:{port}/health");
    println!("📥 Import preview: http://localhost:{port}/import/preview");
    println!("🍽  Public catalog: http://localhost:{port}/catalog");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
