use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::ConfigRow;

pub const DEFAULT_APP_NAME: &str = "Gestion Quittances";

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn default_empty() -> String {
    String::new()
}
fn default_zero() -> f64 {
    0.0
}
fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

// ---------- auth ----------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordInput {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordInput {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 6))]
    pub password: String,
}

// ---------- properties ----------

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default = "default_empty")]
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyPath {
    pub property_id: Uuid,
}

// ---------- tenants ----------

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TenantInput {
    #[validate(length(min = 1, max = 255))]
    pub last_name: String,
    #[serde(default = "default_empty")]
    pub first_name: String,
    pub email: Option<String>,
    #[serde(default = "default_zero")]
    #[validate(range(min = 0.0))]
    pub rent: f64,
    #[serde(default = "default_zero")]
    #[validate(range(min = 0.0))]
    pub charges: f64,
    #[serde(default = "default_empty")]
    pub address: String,
    pub property_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantPath {
    pub tenant_id: Uuid,
}

// ---------- config ----------

/// API shape of the per-user configuration. Every field is a plain string;
/// missing database columns surface as empty strings, never null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    #[serde(default)]
    pub owner: OwnerConfig,
    #[serde(default)]
    pub email: MailIdentityConfig,
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerConfig {
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub address: String,
    /// Signature image as a `data:image/...;base64,` URI, or empty.
    #[serde(default)]
    pub signature: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailIdentityConfig {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub oauth2: OAuth2Config,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Config {
    #[serde(default)]
    pub refresh_token: String,
}

impl UserConfig {
    pub fn from_row(row: ConfigRow) -> Self {
        Self {
            owner: OwnerConfig {
                last_name: row.owner_last_name.unwrap_or_default(),
                first_name: row.owner_first_name.unwrap_or_default(),
                address: row.owner_address.unwrap_or_default(),
                signature: row.owner_signature.unwrap_or_default(),
            },
            email: MailIdentityConfig {
                user: row.email_user.unwrap_or_default(),
                from: row.email_from.unwrap_or_default(),
                oauth2: OAuth2Config {
                    refresh_token: row.email_oauth_refresh_token.unwrap_or_default(),
                },
            },
            app_name: row
                .app_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(default_app_name),
        }
    }

    pub fn owner_full_name(&self) -> String {
        format!("{} {}", self.owner.first_name, self.owner.last_name)
            .trim()
            .to_string()
    }

    pub fn has_mail_identity(&self) -> bool {
        !self.email.user.trim().is_empty() && !self.email.oauth2.refresh_token.trim().is_empty()
    }

    /// Cache key for the SMTP transport; a new identity invalidates the
    /// cached handle.
    pub fn mail_identity_key(&self) -> String {
        format!("{}|{}", self.email.user, self.email.oauth2.refresh_token)
    }
}

// ---------- receipts ----------

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptInput {
    pub tenant_id: Uuid,
    #[validate(range(min = 1, max = 12))]
    pub month: u32,
    #[validate(range(min = 1900, max = 2200))]
    pub year: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRangeInput {
    pub tenant_id: Uuid,
    /// `YYYY-MM-DD`
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingExportQuery {
    pub property_id: Option<Uuid>,
    pub from: Option<String>,
    pub to: Option<String>,
}

// ---------- misc ----------

#[derive(Debug, Clone, Deserialize)]
pub struct SupportMessageInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionInput {
    pub price_id: Option<String>,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub customer_email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeCodeInput {
    pub code: String,
    pub client_id: String,
    pub client_secret: String,
}

#[cfg(test)]
mod tests {
    use super::{validate_input, SignupInput, TenantInput, UserConfig, DEFAULT_APP_NAME};
    use crate::models::ConfigRow;
    use uuid::Uuid;

    #[test]
    fn config_row_defaults_to_empty_strings() {
        let row = ConfigRow {
            user_id: Uuid::new_v4(),
            owner_last_name: None,
            owner_first_name: Some("Jean".to_string()),
            owner_address: None,
            owner_signature: None,
            email_user: None,
            email_from: None,
            email_oauth_refresh_token: None,
            app_name: None,
        };
        let config = UserConfig::from_row(row);
        assert_eq!(config.owner.last_name, "");
        assert_eq!(config.owner.first_name, "Jean");
        assert_eq!(config.email.oauth2.refresh_token, "");
        assert_eq!(config.app_name, DEFAULT_APP_NAME);
        assert!(!config.has_mail_identity());
    }

    #[test]
    fn owner_full_name_is_trimmed() {
        let mut config = UserConfig::default();
        config.owner.first_name = "Jean".to_string();
        assert_eq!(config.owner_full_name(), "Jean");
        config.owner.last_name = "Martin".to_string();
        assert_eq!(config.owner_full_name(), "Jean Martin");
    }

    #[test]
    fn rejects_negative_rent() {
        let input = TenantInput {
            last_name: "Dupont".to_string(),
            first_name: String::new(),
            email: None,
            rent: -1.0,
            charges: 0.0,
            address: String::new(),
            property_id: None,
        };
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn rejects_short_password() {
        let input = SignupInput {
            email: "user@example.com".to_string(),
            password: "12345".to_string(),
        };
        assert!(validate_input(&input).is_err());
    }
}
