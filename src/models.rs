use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub name: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub last_name: String,
    pub first_name: String,
    pub email: Option<String>,
    pub rent: f64,
    pub charges: f64,
    pub address: String,
    pub property_id: Option<Uuid>,
    pub last_receipt_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// "Dupont Marie" style display name; trailing space trimmed when the
    /// first name is empty.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
            .trim()
            .to_string()
    }

    pub fn total(&self) -> f64 {
        self.rent + self.charges
    }
}

/// Raw `configs` row; every column is nullable so first reads after the
/// lazy insert still deserialize.
#[derive(Debug, Clone, FromRow)]
pub struct ConfigRow {
    pub user_id: Uuid,
    pub owner_last_name: Option<String>,
    pub owner_first_name: Option<String>,
    pub owner_address: Option<String>,
    pub owner_signature: Option<String>,
    pub email_user: Option<String>,
    pub email_from: Option<String>,
    pub email_oauth_refresh_token: Option<String>,
    pub app_name: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PasswordReset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordReset {
    /// Valid while unconsumed and unexpired. Expired rows are simply
    /// ignored, never cleaned up.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::{PasswordReset, Tenant};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn tenant(last: &str, first: &str) -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            last_name: last.to_string(),
            first_name: first.to_string(),
            email: None,
            rent: 500.0,
            charges: 50.0,
            address: String::new(),
            property_id: None,
            last_receipt_sent_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn full_name_trims_missing_first_name() {
        assert_eq!(tenant("Dupont", "Marie").full_name(), "Dupont Marie");
        assert_eq!(tenant("Dupont", "").full_name(), "Dupont");
    }

    #[test]
    fn total_sums_rent_and_charges() {
        assert_eq!(tenant("Dupont", "Marie").total(), 550.0);
    }

    #[test]
    fn password_reset_validity() {
        let now = Utc::now();
        let mut reset = PasswordReset {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: String::new(),
            expires_at: now + Duration::hours(1),
            used_at: None,
            created_at: now,
        };
        assert!(reset.is_valid(now));

        reset.used_at = Some(now);
        assert!(!reset.is_valid(now));

        reset.used_at = None;
        reset.expires_at = now - Duration::seconds(1);
        assert!(!reset.is_valid(now));
    }
}
