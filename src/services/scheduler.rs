//! Monthly receipt cron.
//!
//! A polling loop, not a job queue: on the 1st of each month at or after
//! 09:00 UTC it sends the current month's receipt for every eligible
//! tenant of the `CRON_USER_ID` account. Eligible means an email address
//! on file and rent above zero.

use std::time::Duration;

use chrono::{Datelike, Timelike, Utc};
use tokio::time::sleep;
use uuid::Uuid;

use crate::repository::{configs, tenants};
use crate::schemas::ReceiptInput;
use crate::services::receipts;
use crate::state::AppState;

pub async fn run_background_scheduler(state: AppState) {
    let Some(user_id) = cron_user_id(&state) else {
        tracing::info!("Scheduler: CRON_USER_ID not set, monthly sends disabled");
        return;
    };
    if state.db_pool.is_none() {
        tracing::warn!("Scheduler: no database pool configured, exiting");
        return;
    }

    tracing::info!(%user_id, "Background scheduler started");

    let mut last_daily_run: Option<u32> = None;

    loop {
        sleep(Duration::from_secs(15)).await;

        let now = Utc::now();
        let today = now.date_naive();

        // Once per calendar day, on the 1st, at or after 09:00 UTC.
        if last_daily_run == Some(today.ordinal()) {
            continue;
        }
        if today.day() != 1 || now.hour() < 9 {
            continue;
        }
        last_daily_run = Some(today.ordinal());

        tracing::info!(month = now.month(), year = now.year(), "Scheduler: monthly receipt run");
        run_monthly_send(&state, user_id, now.month(), now.year()).await;
    }
}

fn cron_user_id(state: &AppState) -> Option<Uuid> {
    let raw = state.config.cron_user_id.as_deref()?;
    match raw.parse() {
        Ok(user_id) => Some(user_id),
        Err(_) => {
            tracing::warn!(raw, "Scheduler: CRON_USER_ID is not a valid UUID");
            None
        }
    }
}

/// One pass over the account's tenants. Per-tenant failures are logged
/// and never stop the remaining tenants.
async fn run_monthly_send(state: &AppState, user_id: Uuid, month: u32, year: i32) {
    let pool = match crate::state::db_pool(state) {
        Ok(pool) => pool,
        Err(error) => {
            tracing::warn!(%error, "Scheduler: database unavailable");
            return;
        }
    };

    let config = match configs::get_or_create(pool, user_id).await {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!(%error, "Scheduler: could not load user config");
            return;
        }
    };
    if !config.has_mail_identity() {
        tracing::warn!(%user_id, "Scheduler: user has no mail identity, skipping run");
        return;
    }

    let tenant_rows = match tenants::list_for_user(pool, user_id).await {
        Ok(rows) => rows,
        Err(error) => {
            tracing::warn!(%error, "Scheduler: could not list tenants");
            return;
        }
    };

    let mut sent = 0u32;
    for tenant in tenant_rows {
        let eligible = tenant
            .email
            .as_deref()
            .is_some_and(|email| !email.trim().is_empty())
            && tenant.rent > 0.0;
        if !eligible {
            continue;
        }

        let input = ReceiptInput {
            tenant_id: tenant.id,
            month,
            year,
        };
        match receipts::send_receipt(state, user_id, &input).await {
            Ok(_) => sent += 1,
            Err(error) => {
                tracing::warn!(tenant_id = %tenant.id, month, year, %error,
                    "Scheduler: monthly send failed for tenant");
            }
        }
    }

    tracing::info!(sent, month, year, "Scheduler: monthly receipt run finished");
}
