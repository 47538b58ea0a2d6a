//! Accounting CSV export.
//!
//! One row per tenant with a recorded send; the data model only keeps
//! the most recent send per tenant, so multi-month history is not
//! representable here. Payment date mirrors the send date.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Property, Tenant};
use crate::repository::{properties, tenants};
use crate::schemas::AccountingExportQuery;
use crate::services::receipts::{format_amount, format_date};
use crate::state::AppState;

const BOM: &str = "\u{feff}";
const HEADERS: [&str; 8] = [
    "Date",
    "P\u{e9}riode",
    "Bien",
    "Locataire",
    "Loyer",
    "Charges",
    "Total",
    "Date de paiement",
];

#[derive(Debug, Default, Clone)]
pub struct ExportFilters {
    pub property_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ExportFilters {
    /// `from` is the start of its calendar day; `to` is forced to the very
    /// end of its day so the bound is inclusive to the millisecond.
    pub fn from_query(query: &AccountingExportQuery) -> AppResult<Self> {
        let from = query
            .from
            .as_deref()
            .map(|raw| parse_bound(raw, "from"))
            .transpose()?
            .map(|date| date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());
        let to = query
            .to
            .as_deref()
            .map(|raw| parse_bound(raw, "to"))
            .transpose()?
            .and_then(|date| date.and_hms_milli_opt(23, 59, 59, 999))
            .map(|naive| naive.and_utc());

        Ok(Self {
            property_id: query.property_id,
            from,
            to,
        })
    }

    fn matches(&self, tenant: &Tenant, sent_at: DateTime<Utc>) -> bool {
        if let Some(from) = self.from {
            if sent_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if sent_at > to {
                return false;
            }
        }
        if let Some(property_id) = self.property_id {
            if tenant.property_id != Some(property_id) {
                return false;
            }
        }
        true
    }
}

fn parse_bound(raw: &str, label: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid `{label}` date, expected YYYY-MM-DD.")))
}

/// Every field is quoted, internal quotes doubled.
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn row(fields: &[String]) -> String {
    fields
        .iter()
        .map(|field| quote(field))
        .collect::<Vec<_>>()
        .join(";")
}

/// Pure CSV assembly over already-loaded rows.
pub fn build_csv(tenants: &[Tenant], properties: &[Property], filters: &ExportFilters) -> String {
    let mut lines = Vec::new();
    lines.push(row(&HEADERS.map(String::from)));

    for tenant in tenants {
        let Some(sent_at) = tenant.last_receipt_sent_at else {
            continue;
        };
        if !filters.matches(tenant, sent_at) {
            continue;
        }

        let property_name = tenant
            .property_id
            .and_then(|id| properties.iter().find(|property| property.id == id))
            .map(|property| property.name.clone())
            .unwrap_or_default();

        let send_date = format_date(sent_at.date_naive());
        lines.push(row(&[
            send_date.clone(),
            sent_at.format("%m/%Y").to_string(),
            property_name,
            tenant.full_name(),
            format_amount(tenant.rent),
            format_amount(tenant.charges),
            format_amount(tenant.total()),
            send_date,
        ]));
    }

    format!("{BOM}{}\n", lines.join("\n"))
}

/// Load the caller's rows and produce the CSV plus its download filename.
pub async fn run_export(
    state: &AppState,
    user_id: Uuid,
    query: &AccountingExportQuery,
) -> AppResult<(String, String)> {
    let filters = ExportFilters::from_query(query)?;
    let pool = crate::state::db_pool(state)?;

    let tenant_rows = tenants::list_for_user(pool, user_id).await?;
    let property_rows = properties::list_for_user(pool, user_id).await?;

    let csv = build_csv(&tenant_rows, &property_rows, &filters);
    let filename = format!("export_compta_{}.csv", Utc::now().format("%Y-%m-%d"));
    Ok((csv, filename))
}

#[cfg(test)]
mod tests {
    use super::{build_csv, quote, ExportFilters, BOM};
    use crate::models::{Property, Tenant};
    use crate::schemas::AccountingExportQuery;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn tenant(
        user_id: Uuid,
        property_id: Option<Uuid>,
        sent_at: Option<chrono::DateTime<Utc>>,
    ) -> Tenant {
        Tenant {
            id: Uuid::new_v4(),
            user_id,
            last_name: "Dupont".to_string(),
            first_name: "Marie".to_string(),
            email: None,
            rent: 500.0,
            charges: 50.0,
            address: String::new(),
            property_id,
            last_receipt_sent_at: sent_at,
            created_at: Utc::now(),
        }
    }

    fn property(user_id: Uuid, name: &str) -> Property {
        Property {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            address: String::new(),
            created_at: Utc::now(),
        }
    }

    fn filters(from: Option<&str>, to: Option<&str>) -> ExportFilters {
        ExportFilters::from_query(&AccountingExportQuery {
            property_id: None,
            from: from.map(String::from),
            to: to.map(String::from),
        })
        .unwrap()
    }

    #[test]
    fn only_sent_tenants_produce_rows() {
        let user_id = Uuid::new_v4();
        let sent = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        let rows = [
            tenant(user_id, None, Some(sent)),
            tenant(user_id, None, None),
        ];
        let csv = build_csv(&rows, &[], &ExportFilters::default());

        assert!(csv.starts_with(BOM));
        assert_eq!(csv.trim_end().lines().count(), 2);
        assert!(csv.contains("\"05/03/2024\""));
        assert!(csv.contains("\"03/2024\""));
        assert!(csv.contains("\"Dupont Marie\""));
        assert!(csv.contains("\"550,00\""));
    }

    #[test]
    fn to_bound_is_inclusive_to_the_millisecond() {
        let user_id = Uuid::new_v4();
        let at_bound = Utc
            .with_ymd_and_hms(2024, 3, 31, 23, 59, 59)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(999))
            .unwrap();
        let past_bound = at_bound + chrono::Duration::milliseconds(1);

        let filters = filters(None, Some("2024-03-31"));
        assert!(filters.matches(&tenant(user_id, None, Some(at_bound)), at_bound));
        assert!(!filters.matches(&tenant(user_id, None, Some(past_bound)), past_bound));
    }

    #[test]
    fn from_bound_starts_at_midnight() {
        let user_id = Uuid::new_v4();
        let filters = filters(Some("2024-03-01"), None);
        let just_before = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        let at_midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(!filters.matches(&tenant(user_id, None, Some(just_before)), just_before));
        assert!(filters.matches(&tenant(user_id, None, Some(at_midnight)), at_midnight));
    }

    #[test]
    fn property_filter_matches_exactly() {
        let user_id = Uuid::new_v4();
        let home = property(user_id, "Appartement A");
        let other = property(user_id, "Appartement B");
        let sent = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();

        let rows = [
            tenant(user_id, Some(home.id), Some(sent)),
            tenant(user_id, Some(other.id), Some(sent)),
        ];
        let mut filters = ExportFilters::default();
        filters.property_id = Some(home.id);

        let csv = build_csv(&rows, &[home.clone(), other], &filters);
        assert_eq!(csv.trim_end().lines().count(), 2);
        assert!(csv.contains("\"Appartement A\""));
        assert!(!csv.contains("\"Appartement B\""));
    }

    #[test]
    fn unresolved_property_renders_empty() {
        let user_id = Uuid::new_v4();
        let sent = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
        let rows = [tenant(user_id, Some(Uuid::new_v4()), Some(sent))];
        let csv = build_csv(&rows, &[], &ExportFilters::default());
        assert!(csv.contains(";\"\";"));
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("a \"quoted\" name"), "\"a \"\"quoted\"\" name\"");
    }

    #[test]
    fn rejects_malformed_bounds() {
        let query = AccountingExportQuery {
            property_id: None,
            from: Some("31/03/2024".to_string()),
            to: None,
        };
        assert!(ExportFilters::from_query(&query).is_err());
    }
}
