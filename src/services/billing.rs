//! Stripe subscription checkout, REST only.

use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::schemas::CheckoutSessionInput;
use crate::state::AppState;

/// Create a subscription checkout session and return `{url, id}`.
pub async fn create_checkout_session(
    state: &AppState,
    input: &CheckoutSessionInput,
) -> AppResult<Value> {
    let secret_key = state
        .config
        .stripe_secret_key
        .as_deref()
        .ok_or_else(|| AppError::Dependency("STRIPE_SECRET_KEY is not configured.".to_string()))?;

    let price_id = input
        .price_id
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .or(state.config.stripe_price_id.as_deref())
        .ok_or_else(|| {
            AppError::BadRequest("No Stripe price configured for the checkout.".to_string())
        })?;

    let frontend = state.config.frontend_base_url();
    let success_url = input
        .success_url
        .clone()
        .unwrap_or_else(|| format!("{frontend}?abonnement=success"));
    let cancel_url = input
        .cancel_url
        .clone()
        .unwrap_or_else(|| format!("{frontend}?abonnement=cancel"));

    let mut form = vec![
        ("mode", "subscription".to_string()),
        ("line_items[0][price]", price_id.to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("success_url", success_url),
        ("cancel_url", cancel_url),
    ];
    if let Some(email) = input
        .customer_email
        .as_deref()
        .filter(|value| !value.trim().is_empty())
    {
        form.push(("customer_email", email.trim().to_string()));
    }

    let response = state
        .http_client
        .post("https://api.stripe.com/v1/checkout/sessions")
        .basic_auth(secret_key, None::<&str>)
        .form(&form)
        .send()
        .await
        .map_err(|error| {
            tracing::error!(%error, "Stripe API request failed");
            AppError::Dependency("Stripe API request failed.".to_string())
        })?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .unwrap_or(json!({"error": "failed to parse response"}));

    if !status.is_success() {
        let detail = body
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown Stripe error");
        return Err(AppError::Dependency(format!(
            "Stripe API error ({status}): {detail}"
        )));
    }

    Ok(json!({
        "url": body.get("url").cloned().unwrap_or(Value::Null),
        "id": body.get("id").cloned().unwrap_or(Value::Null),
    }))
}
