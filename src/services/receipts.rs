//! Receipt generation and delivery, including the month-range batch loop.
//!
//! The batch loop is deliberately split from I/O: `run_range_send` only
//! knows about a `MonthSender`, so its counting and failure-isolation
//! behavior is unit-tested with an in-memory sender.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Tenant;
use crate::repository::{configs, tenants};
use crate::schemas::{ReceiptInput, ReceiptRangeInput, UserConfig};
use crate::services::{mailer, pdf};
use crate::state::AppState;

const MONTH_NAMES: [&str; 12] = [
    "janvier",
    "f\u{e9}vrier",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "ao\u{fb}t",
    "septembre",
    "octobre",
    "novembre",
    "d\u{e9}cembre",
];

/// French month name, 1-based. Out-of-range input is a caller bug and
/// falls back to the raw number.
pub fn month_name(month: u32) -> String {
    MONTH_NAMES
        .get(month.checked_sub(1).unwrap_or(12) as usize)
        .map(|name| (*name).to_string())
        .unwrap_or_else(|| month.to_string())
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
    }
}

/// End-of-day UTC instant of the last day of the month; this is the
/// value persisted as the last-sent marker after a range send.
pub fn end_of_month_instant(year: i32, month: u32) -> AppResult<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, last_day_of_month(year, month))
        .and_then(|date| date.and_hms_milli_opt(23, 59, 59, 999))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::Internal(format!("Invalid month {month}/{year}")))
}

/// Amounts are rendered the French way: two decimals, comma separator.
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}").replace('.', ",")
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn parse_day(raw: &str, label: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid `{label}` date, expected YYYY-MM-DD.")))
}

/// Parse and normalize a range request: both bounds snap to the first day
/// of their month, and an inverted range is rejected before any work
/// happens.
pub fn month_span(from: &str, to: &str) -> AppResult<(NaiveDate, NaiveDate)> {
    let from = parse_day(from, "from")?;
    let to = parse_day(to, "to")?;

    let from = from.with_day(1).unwrap_or(from);
    let to = to.with_day(1).unwrap_or(to);

    if from > to {
        return Err(AppError::BadRequest(
            "The start month must not be after the end month.".to_string(),
        ));
    }
    Ok((from, to))
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// One month's worth of render-and-deliver work. The production
/// implementation talks to the PDF layer and SMTP; tests substitute a
/// recorder.
#[async_trait]
pub trait MonthSender {
    async fn send_month(&self, month: u32, year: i32) -> AppResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeOutcome {
    pub sent_count: u32,
    pub last_sent: Option<DateTime<Utc>>,
}

/// Walk the months of `[from, to]` in ascending order, attempting one
/// send per month. A failed month is logged and skipped; it never stops
/// the remaining months. `last_sent` tracks the last *successful* month
/// only.
pub async fn run_range_send<S: MonthSender + Sync>(
    sender: &S,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<RangeOutcome> {
    let mut sent_count = 0u32;
    let mut last_sent = None;

    let (mut year, mut month) = (from.year(), from.month());
    let (end_year, end_month) = (to.year(), to.month());

    while (year, month) <= (end_year, end_month) {
        match sender.send_month(month, year).await {
            Ok(()) => {
                sent_count += 1;
                last_sent = Some(end_of_month_instant(year, month)?);
            }
            Err(error) => {
                tracing::warn!(month, year, error = %error, "Skipping failed month in range send");
            }
        }
        (year, month) = next_month(year, month);
    }

    Ok(RangeOutcome {
        sent_count,
        last_sent,
    })
}

struct LiveMonthSender<'a> {
    state: &'a AppState,
    tenant: &'a Tenant,
    config: &'a UserConfig,
}

#[async_trait]
impl MonthSender for LiveMonthSender<'_> {
    async fn send_month(&self, month: u32, year: i32) -> AppResult<()> {
        let pdf_bytes = pdf::render_receipt(self.config, self.tenant, month, year)?;
        mailer::send_receipt_email(self.state, self.config, self.tenant, &pdf_bytes, month, year)
            .await
    }
}

async fn load_tenant(state: &AppState, user_id: Uuid, tenant_id: Uuid) -> AppResult<Tenant> {
    let pool = crate::state::db_pool(state)?;
    tenants::find_by_id(pool, user_id, tenant_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tenant not found.".to_string()))
}

fn require_tenant_email(tenant: &Tenant) -> AppResult<()> {
    match tenant.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => Ok(()),
        _ => Err(AppError::BadRequest(
            "This tenant has no email address.".to_string(),
        )),
    }
}

/// Render one month's receipt without sending anything.
pub async fn generate_receipt(
    state: &AppState,
    user_id: Uuid,
    input: &ReceiptInput,
) -> AppResult<(Vec<u8>, String)> {
    let pool = crate::state::db_pool(state)?;
    let tenant = load_tenant(state, user_id, input.tenant_id).await?;
    let config = configs::get_or_create(pool, user_id).await?;

    let bytes = pdf::render_receipt(&config, &tenant, input.month, input.year)?;
    let filename = format!(
        "quittance_{}_{}_{}.pdf",
        tenant.last_name.to_lowercase().replace(' ', "_"),
        input.month,
        input.year
    );
    Ok((bytes, filename))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleSendResponse {
    pub success: bool,
    pub last_receipt_sent_at: DateTime<Utc>,
}

/// Render and deliver one month, then stamp the send time.
pub async fn send_receipt(
    state: &AppState,
    user_id: Uuid,
    input: &ReceiptInput,
) -> AppResult<SingleSendResponse> {
    let pool = crate::state::db_pool(state)?;
    let tenant = load_tenant(state, user_id, input.tenant_id).await?;
    require_tenant_email(&tenant)?;
    let config = configs::get_or_create(pool, user_id).await?;

    let pdf_bytes = pdf::render_receipt(&config, &tenant, input.month, input.year)?;
    mailer::send_receipt_email(state, &config, &tenant, &pdf_bytes, input.month, input.year)
        .await?;

    let sent_at = Utc::now();
    tenants::update_last_sent(pool, user_id, tenant.id, sent_at).await?;

    Ok(SingleSendResponse {
        success: true,
        last_receipt_sent_at: sent_at,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSendResponse {
    pub success: bool,
    pub sent_count: u32,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// The month-range batch send. Preconditions are checked before any
/// month is attempted; the last-sent marker is written once, after the
/// loop, and only when at least one month went out.
pub async fn send_receipt_range(
    state: &AppState,
    user_id: Uuid,
    input: &ReceiptRangeInput,
) -> AppResult<RangeSendResponse> {
    let (from, to) = month_span(&input.from, &input.to)?;

    let pool = crate::state::db_pool(state)?;
    let tenant = load_tenant(state, user_id, input.tenant_id).await?;
    require_tenant_email(&tenant)?;
    let config = configs::get_or_create(pool, user_id).await?;

    let sender = LiveMonthSender {
        state,
        tenant: &tenant,
        config: &config,
    };
    let outcome = run_range_send(&sender, from, to).await?;

    if let Some(last_sent) = outcome.last_sent {
        tenants::update_last_sent(pool, user_id, tenant.id, last_sent).await?;
    }

    Ok(RangeSendResponse {
        success: true,
        sent_count: outcome.sent_count,
        from,
        to,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        end_of_month_instant, format_amount, format_date, last_day_of_month, month_name,
        month_span, run_range_send, MonthSender, RangeOutcome,
    };
    use crate::error::{AppError, AppResult};
    use async_trait::async_trait;
    use chrono::{Datelike, NaiveDate, Timelike};
    use std::sync::Mutex;

    struct RecordingSender {
        calls: Mutex<Vec<(u32, i32)>>,
        failing: Vec<(u32, i32)>,
    }

    impl RecordingSender {
        fn new(failing: Vec<(u32, i32)>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failing,
            }
        }

        fn calls(&self) -> Vec<(u32, i32)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MonthSender for RecordingSender {
        async fn send_month(&self, month: u32, year: i32) -> AppResult<()> {
            self.calls.lock().unwrap().push((month, year));
            if self.failing.contains(&(month, year)) {
                return Err(AppError::MailSend("smtp refused".to_string()));
            }
            Ok(())
        }
    }

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn month_span_normalizes_to_first_of_month() {
        let (from, to) = month_span("2024-01-15", "2024-03-20").unwrap();
        assert_eq!(from, day(2024, 1, 1));
        assert_eq!(to, day(2024, 3, 1));
    }

    #[test]
    fn month_span_rejects_inverted_range() {
        assert!(month_span("2024-04-01", "2024-03-31").is_err());
    }

    #[test]
    fn month_span_rejects_garbage() {
        assert!(month_span("not-a-date", "2024-03-01").is_err());
        assert!(month_span("2024-03-01", "03/2024").is_err());
    }

    #[test]
    fn same_month_is_a_single_cycle() {
        let (from, to) = month_span("2024-05-03", "2024-05-28").unwrap();
        assert_eq!(from, to);
    }

    #[test]
    fn month_lengths() {
        assert_eq!(last_day_of_month(2024, 2), 29);
        assert_eq!(last_day_of_month(2023, 2), 28);
        assert_eq!(last_day_of_month(1900, 2), 28);
        assert_eq!(last_day_of_month(2000, 2), 29);
        assert_eq!(last_day_of_month(2024, 4), 30);
        assert_eq!(last_day_of_month(2024, 12), 31);
    }

    #[test]
    fn french_formatting() {
        assert_eq!(month_name(1), "janvier");
        assert_eq!(month_name(8), "ao\u{fb}t");
        assert_eq!(format_amount(550.0), "550,00");
        assert_eq!(format_amount(1234.5), "1234,50");
        assert_eq!(format_date(day(2024, 3, 7)), "07/03/2024");
    }

    #[tokio::test]
    async fn range_send_covers_every_month_once() {
        let sender = RecordingSender::new(vec![]);
        let outcome = run_range_send(&sender, day(2024, 1, 1), day(2024, 4, 1))
            .await
            .unwrap();

        assert_eq!(sender.calls(), vec![(1, 2024), (2, 2024), (3, 2024), (4, 2024)]);
        assert_eq!(outcome.sent_count, 4);
        let last = outcome.last_sent.unwrap();
        assert_eq!((last.year(), last.month(), last.day()), (2024, 4, 30));
        assert_eq!((last.hour(), last.minute(), last.second()), (23, 59, 59));
    }

    #[tokio::test]
    async fn range_send_crosses_year_boundary() {
        let sender = RecordingSender::new(vec![]);
        let outcome = run_range_send(&sender, day(2023, 11, 1), day(2024, 2, 1))
            .await
            .unwrap();

        assert_eq!(
            sender.calls(),
            vec![(11, 2023), (12, 2023), (1, 2024), (2, 2024)]
        );
        assert_eq!(outcome.sent_count, 4);
    }

    #[tokio::test]
    async fn failed_month_is_skipped_not_fatal() {
        let sender = RecordingSender::new(vec![(1, 2024), (3, 2024)]);
        let outcome = run_range_send(&sender, day(2024, 1, 1), day(2024, 3, 1))
            .await
            .unwrap();

        assert_eq!(sender.calls().len(), 3);
        assert_eq!(outcome.sent_count, 2);
        let last = outcome.last_sent.unwrap();
        assert_eq!((last.year(), last.month(), last.day()), (2024, 3, 31));
    }

    #[tokio::test]
    async fn marker_tracks_last_success_not_last_attempt() {
        // Trailing failure: the marker must stay on the last month that
        // actually went out.
        let sender = RecordingSender::new(vec![(3, 2024)]);
        let outcome = run_range_send(&sender, day(2024, 1, 1), day(2024, 3, 1))
            .await
            .unwrap();

        assert_eq!(outcome.sent_count, 2);
        let last = outcome.last_sent.unwrap();
        assert_eq!((last.year(), last.month(), last.day()), (2024, 2, 29));
    }

    #[tokio::test]
    async fn all_failures_leave_no_marker() {
        let sender = RecordingSender::new(vec![(1, 2024), (2, 2024)]);
        let outcome = run_range_send(&sender, day(2024, 1, 1), day(2024, 2, 1))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RangeOutcome {
                sent_count: 0,
                last_sent: None
            }
        );
    }

    #[test]
    fn end_of_month_instant_is_end_of_day() {
        let instant = end_of_month_instant(2024, 2).unwrap();
        assert_eq!((instant.month(), instant.day()), (2, 29));
        assert_eq!(instant.time().format("%H:%M:%S%.3f").to_string(), "23:59:59.999");
    }
}
