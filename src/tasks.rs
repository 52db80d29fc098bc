use crate::auth::{AuthService, AuthUser};
use crate::domain::{ImportItem, MenuItem, Restaurant};
use crate::error::{ImportError, Result};
use crate::images;
use crate::importer::{build_import, ImportBatch};
use crate::staging::StagingStore;
use crate::storage::ItemStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Everything a request handler needs, shared across the HTTP surface and
/// the one-shot CLI paths.
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub staging: StagingStore,
    pub auth: AuthService,
    pub upload_root: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct PreviewResult {
    pub session: String,
    pub restaurants: usize,
    pub menu_items: usize,
    pub items: Vec<ImportItem>,
}

#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub files_written: usize,
}

#[derive(Debug, Serialize)]
pub struct CommitResult {
    pub committed: usize,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub token: String,
}

/// Parses the pasted/uploaded JSON and stages it under a session token.
/// Nothing is persisted until commit.
///
/// What gets staged is the normalized form of the batch, not the raw input:
/// generated ids must stay stable so the template folders, uploaded images
/// and approval calls all line up with what commit persists. Passing an
/// existing session token replaces that session's staged payload instead of
/// opening a new one.
pub async fn preview_import(
    state: &AppState,
    json_text: &str,
    session: Option<&str>,
) -> Result<PreviewResult> {
    if json_text.trim().is_empty() {
        return Err(ImportError::InvalidInput(
            "Please provide JSON content to import".to_string(),
        ));
    }

    let batch = build_import(json_text)?;
    if batch.is_empty() {
        return Err(ImportError::InvalidInput(
            "no recognizable restaurants or menu items in the payload".to_string(),
        ));
    }
    let normalized = serde_json::to_string(&batch.restaurants)?;
    let session = match session {
        Some(token) if state.staging.get(token).is_some() => {
            state.staging.replace(token, normalized);
            token.to_string()
        }
        _ => state.staging.put(normalized),
    };
    info!(
        session = %session,
        restaurants = batch.restaurants.len(),
        menu_items = batch.menu_items.len(),
        "Staged import preview"
    );

    Ok(PreviewResult {
        session,
        restaurants: batch.restaurants.len(),
        menu_items: batch.menu_items.len(),
        items: batch.into_items(),
    })
}

/// Extracts an uploaded zip of item images under the upload root. Requires a
/// live staged session so stray uploads cannot land without a pending
/// import.
pub async fn upload_images(state: &AppState, session: &str, bytes: &[u8]) -> Result<UploadResult> {
    staged_json(state, session)?;
    if bytes.is_empty() {
        return Err(ImportError::InvalidInput(
            "Please upload a .zip file containing item folders".to_string(),
        ));
    }

    let files_written = images::extract_archive(&state.upload_root, bytes)?;
    info!(session = %session, files_written, "Extracted image upload");
    Ok(UploadResult { files_written })
}

/// Builds the downloadable template zip with one folder per staged menu
/// item.
pub async fn image_template(state: &AppState, session: &str) -> Result<Vec<u8>> {
    let json = staged_json(state, session)?;
    let batch = build_import(&json)?;
    if batch.menu_items.is_empty() {
        return Err(ImportError::NotFound(
            "no staged menu items; start a new preview".to_string(),
        ));
    }

    let ids: Vec<String> = batch.menu_items.iter().map(|m| m.id.clone()).collect();
    images::template_archive(&ids)
}

/// Re-parses the staged JSON, attaches the first discovered image per menu
/// item, persists everything, and clears the staged session.
pub async fn commit_import(state: &AppState, session: &str) -> Result<CommitResult> {
    let json = staged_json(state, session)?;
    let batch = build_import(&json)?;
    let committed = persist_batch(state, batch).await?;

    state.staging.remove(session);
    info!(session = %session, committed, "Committed import");
    Ok(CommitResult { committed })
}

/// Shared persistence path for the web commit and the one-shot CLI import.
pub async fn persist_batch(state: &AppState, mut batch: ImportBatch) -> Result<usize> {
    for item in &mut batch.menu_items {
        let item_dir = state.upload_root.join(&item.id);
        if let Some(file_name) = images::first_image(&item_dir)? {
            item.image_path = Some(images::web_path(&item.id, &file_name));
        }
    }

    let committed = batch.len();
    for item in batch.into_items() {
        state.store.add_item(item).await?;
    }
    Ok(committed)
}

fn staged_json(state: &AppState, session: &str) -> Result<String> {
    state.staging.get(session).ok_or_else(|| {
        ImportError::NotFound("no staged import for this session; start a new preview".to_string())
    })
}

pub async fn login(state: &AppState, credentials: &Credentials) -> Result<LoginResult> {
    state
        .auth
        .login(&credentials.email, &credentials.password)
        .map(|token| LoginResult { token })
        .ok_or_else(|| ImportError::Unauthenticated("invalid email or password".to_string()))
}

/// Admin-gated owner registration, so owner-email approval has someone to
/// approve as.
pub async fn register(state: &AppState, user: &AuthUser, credentials: &Credentials) -> Result<()> {
    require_admin(user)?;
    state.auth.register(&credentials.email, &credentials.password)
}

pub async fn pending_restaurants(state: &AppState, user: &AuthUser) -> Result<Vec<Restaurant>> {
    require_admin(user)?;
    state.store.pending_restaurants().await
}

pub async fn approve_restaurant(state: &AppState, user: &AuthUser, id: &str) -> Result<()> {
    require_admin(user)?;
    if !state.store.approve_restaurant(id).await? {
        return Err(ImportError::NotFound(format!("restaurant {id}")));
    }
    info!(id = %id, admin = %user.email, "Approved restaurant");
    Ok(())
}

pub async fn pending_menu_items(state: &AppState, user: &AuthUser) -> Result<Vec<MenuItem>> {
    state.store.pending_menu_items_for_owner(&user.email).await
}

/// Menu-item approval: the caller's email must match the owning
/// restaurant's owner email, case-insensitively.
pub async fn approve_menu_item(state: &AppState, user: &AuthUser, id: &str) -> Result<()> {
    let Some((item, restaurant)) = state.store.get_menu_item(id).await? else {
        return Err(ImportError::NotFound(format!("menu item {id}")));
    };

    let authorized = restaurant
        .as_ref()
        .map(|r| r.owner_email.eq_ignore_ascii_case(&user.email))
        .unwrap_or(false);
    if !authorized {
        return Err(ImportError::Forbidden(format!(
            "{} does not own menu item {}",
            user.email, item.id
        )));
    }

    state.store.approve_menu_item(id).await?;
    info!(id = %id, owner = %user.email, "Approved menu item");
    Ok(())
}

pub async fn catalog(state: &AppState) -> Result<Vec<Restaurant>> {
    state.store.approved_restaurants().await
}

pub async fn catalog_detail(state: &AppState, id: &str) -> Result<Restaurant> {
    state
        .store
        .approved_restaurant(id)
        .await?
        .ok_or_else(|| ImportError::NotFound(format!("restaurant {id}")))
}

fn require_admin(user: &AuthUser) -> Result<()> {
    if user.is_admin {
        Ok(())
    } else {
        Err(ImportError::Forbidden(format!(
            "{} is not an administrator",
            user.email
        )))
    }
}
