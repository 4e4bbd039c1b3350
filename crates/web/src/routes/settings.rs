//! Lab configuration: letterhead, logo and tax mode.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{Multipart, Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use dentalab_core::{
    LabConfig, LabConfigId, LabConfigInput, PREVIEW_SUBTOTAL, TaxMode, TaxPreview, TaxSettings,
    parse_percent,
};

use super::{Layout, SelectOption, flash_redirect, sentence};
use crate::db::LabConfigRepository;
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::services::Notices;
use crate::state::AppState;

/// Largest accepted logo.
pub const MAX_LOGO_BYTES: usize = 1024 * 1024;

/// Accepted logo content types.
const LOGO_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(form).post(save))
        .route("/preview", get(preview))
}

// =============================================================================
// Logo upload
// =============================================================================

/// Rejected logo uploads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogoError {
    #[error("The logo must be a PNG, JPEG or WebP image.")]
    UnsupportedType,

    #[error("The logo is larger than 1 MiB.")]
    TooLarge,
}

/// Turn an uploaded file into a `data:` URL.
///
/// An empty upload (no file chosen) is `None`.
///
/// # Errors
///
/// Returns `LogoError` for a disallowed content type or an oversized file.
pub fn logo_data_url(content_type: Option<&str>, data: &[u8]) -> std::result::Result<Option<String>, LogoError> {
    if data.is_empty() {
        return Ok(None);
    }
    let mime = content_type
        .map(str::trim)
        .filter(|m| LOGO_TYPES.contains(m))
        .ok_or(LogoError::UnsupportedType)?;
    if data.len() > MAX_LOGO_BYTES {
        return Err(LogoError::TooLarge);
    }
    Ok(Some(format!("data:{mime};base64,{}", STANDARD.encode(data))))
}

// =============================================================================
// Templates
// =============================================================================

/// Tax mode, percentage and example computation.
#[derive(Debug, Clone)]
pub struct TaxPanel {
    pub modes: Vec<SelectOption>,
    /// Current mode's wire value, echoed as `previous_mode`.
    pub mode: &'static str,
    pub percent: String,
    pub preview: TaxPreview,
}

impl TaxPanel {
    #[must_use]
    pub fn new(settings: TaxSettings) -> Self {
        Self {
            modes: TaxMode::ALL
                .iter()
                .map(|m| SelectOption::new(m.as_str(), m.label(), *m == settings.mode))
                .collect(),
            mode: settings.mode.as_str(),
            percent: settings.percent.normalize().to_string(),
            preview: settings.apply(PREVIEW_SUBTOTAL),
        }
    }
}

/// Settings page.
#[derive(Template, WebTemplate)]
#[template(path = "settings/form.html")]
pub struct SettingsTemplate {
    pub layout: Layout,
    /// Identifier of the stored configuration, sent back on save.
    pub config_id: Option<LabConfigId>,
    pub form: LabConfigInput,
    pub logo: Option<String>,
    pub tax: TaxPanel,
}

/// Tax panel fragment for live preview.
#[derive(Template, WebTemplate)]
#[template(path = "settings/preview.html")]
pub struct TaxPanelTemplate {
    pub tax: TaxPanel,
}

fn input_of(config: &LabConfig) -> LabConfigInput {
    LabConfigInput {
        name: config.name.clone(),
        tax_id: config.tax_id.clone(),
        address: config.address.clone(),
        phone: config.phone.clone(),
        email: config.email.clone(),
        tax_mode: config.tax.mode.as_str().to_string(),
        tax_percent: config.tax.percent.normalize().to_string(),
    }
}

fn page(user: &CurrentUser, notices: Notices, config: Option<&LabConfig>) -> SettingsTemplate {
    SettingsTemplate {
        layout: Layout::new("Lab settings", "settings", Some(user), notices),
        config_id: config.map(|c| c.id),
        form: config.map(input_of).unwrap_or_else(|| LabConfigInput {
            tax_mode: TaxMode::default().as_str().to_string(),
            ..LabConfigInput::default()
        }),
        logo: config.and_then(|c| c.logo.clone()),
        tax: TaxPanel::new(config.map(|c| c.tax).unwrap_or_default()),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the settings form.
#[instrument(skip(state, session, user), fields(user_id = %user.id()))]
pub async fn form(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
) -> SettingsTemplate {
    let mut notices = Notices::take_flash(&session).await;
    let repo = LabConfigRepository::new(state.store(), &user.token, user.id());

    let config = match repo.get().await {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load lab configuration");
            notices.warning(format!(
                "Lab settings could not be loaded: {}",
                e.user_message()
            ));
            None
        }
    };

    page(&user, notices, config.as_ref())
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewQuery {
    pub tax_mode: Option<String>,
    pub tax_percent: Option<String>,
    pub previous_mode: Option<String>,
}

/// Resolve the tax panel for the values currently in the form.
///
/// Switching mode snaps the percentage to the new mode's default; otherwise
/// a valid typed percentage is kept.
#[must_use]
pub fn reconcile_panel(query: &PreviewQuery) -> TaxSettings {
    let mode = query
        .tax_mode
        .as_deref()
        .and_then(|m| m.parse().ok())
        .unwrap_or_default();
    let previous = query.previous_mode.as_deref().and_then(|m| m.parse().ok());
    let typed = query
        .tax_percent
        .as_deref()
        .and_then(|p| parse_percent(p).ok());
    TaxSettings::reconcile(previous, mode, typed)
}

/// Live tax preview fragment.
pub async fn preview(
    RequireAuth(_user): RequireAuth,
    Query(query): Query<PreviewQuery>,
) -> TaxPanelTemplate {
    TaxPanelTemplate {
        tax: TaxPanel::new(reconcile_panel(&query)),
    }
}

/// Multipart settings submission.
#[derive(Debug, Default)]
struct SettingsUpload {
    input: LabConfigInput,
    config_id: Option<LabConfigId>,
    logo: Option<String>,
    logo_error: Option<LogoError>,
}

async fn read_upload(mut multipart: Multipart) -> Result<SettingsUpload> {
    let mut upload = SettingsUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("multipart error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "logo" {
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("logo read error: {e}")))?;
            match logo_data_url(content_type.as_deref(), &data) {
                Ok(logo) => upload.logo = logo,
                Err(e) => upload.logo_error = Some(e),
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("field read error: {e}")))?;
        let input = &mut upload.input;
        match name.as_str() {
            "name" => input.name = value,
            "tax_id" => input.tax_id = value,
            "address" => input.address = value,
            "phone" => input.phone = value,
            "email" => input.email = value,
            "tax_mode" => input.tax_mode = value,
            "tax_percent" => input.tax_percent = value,
            "config_id" => upload.config_id = value.trim().parse().ok(),
            _ => {}
        }
    }

    Ok(upload)
}

/// Logo currently stored for the user, shown again after a rejected save.
async fn stored_logo(repo: &LabConfigRepository<'_>) -> Option<String> {
    match repo.get().await {
        Ok(config) => config.and_then(|c| c.logo),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to reload stored logo");
            None
        }
    }
}

/// The form as submitted, with the stored logo.
fn rejected_page(
    user: &CurrentUser,
    notices: Notices,
    upload: SettingsUpload,
    logo: Option<String>,
) -> SettingsTemplate {
    let tax = TaxPanel::new(reconcile_panel(&PreviewQuery {
        tax_mode: Some(upload.input.tax_mode.clone()),
        tax_percent: Some(upload.input.tax_percent.clone()),
        previous_mode: Some(upload.input.tax_mode.clone()),
    }));
    SettingsTemplate {
        layout: Layout::new("Lab settings", "settings", Some(user), notices),
        config_id: upload.config_id,
        form: upload.input,
        logo,
        tax,
    }
}

/// Validate and save the configuration (create or update).
#[instrument(skip(state, session, user, multipart), fields(user_id = %user.id()))]
pub async fn save(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Response> {
    let upload = read_upload(multipart).await?;
    let repo = LabConfigRepository::new(state.store(), &user.token, user.id());
    let mut notices = Notices::new();

    if let Some(e) = &upload.logo_error {
        tracing::warn!(error = %e, "Rejected logo upload");
        notices.error(e.to_string());
        let logo = stored_logo(&repo).await;
        return Ok(rejected_page(&user, notices, upload, logo).into_response());
    }

    let fields = match upload.input.validate() {
        Ok(fields) => fields,
        Err(e) => {
            notices.error(sentence(&e));
            let logo = stored_logo(&repo).await;
            return Ok(rejected_page(&user, notices, upload, logo).into_response());
        }
    };

    match repo.save(upload.config_id, &fields, upload.logo.clone()).await {
        Ok(config) => {
            tracing::info!(config_id = %config.id, "Lab configuration saved");
            notices.success("Lab settings saved.");
            Ok(flash_redirect(&session, notices, "/settings").await)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to save lab configuration");
            notices.error(e.user_message());
            let logo = stored_logo(&repo).await;
            Ok(rejected_page(&user, notices, upload, logo).into_response())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_logo_data_url() {
        let url = logo_data_url(Some("image/png"), &[0x89, b'P', b'N', b'G'])
            .unwrap()
            .unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(logo_data_url(Some("image/png"), &[]), Ok(None));
    }

    #[test]
    fn test_logo_rejections() {
        assert_eq!(
            logo_data_url(Some("image/svg+xml"), b"<svg/>"),
            Err(LogoError::UnsupportedType)
        );
        assert_eq!(logo_data_url(None, b"x"), Err(LogoError::UnsupportedType));
        let big = vec![0_u8; MAX_LOGO_BYTES + 1];
        assert_eq!(logo_data_url(Some("image/jpeg"), &big), Err(LogoError::TooLarge));
    }

    #[test]
    fn test_mode_change_snaps_percent() {
        let settings = reconcile_panel(&PreviewQuery {
            tax_mode: Some("withholding".to_string()),
            tax_percent: Some("19".to_string()),
            previous_mode: Some("vat".to_string()),
        });
        assert_eq!(settings.mode, TaxMode::Withholding);
        assert_eq!(settings.percent, TaxMode::Withholding.default_percent());
    }

    #[test]
    fn test_same_mode_keeps_typed_percent() {
        let settings = reconcile_panel(&PreviewQuery {
            tax_mode: Some("vat".to_string()),
            tax_percent: Some("16".to_string()),
            previous_mode: Some("vat".to_string()),
        });
        assert_eq!(settings.percent, Decimal::new(16, 0));
        let panel = TaxPanel::new(settings);
        assert_eq!(panel.preview.tax, Decimal::new(16_000, 0));
        assert_eq!(panel.preview.total, Decimal::new(84_000, 0));
    }
}
