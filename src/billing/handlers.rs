use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::CurrentUser,
    billing::{
        dto::{
            BillingStatusResponse, CheckoutResponse, CheckoutSessionObject, WebhookAck,
            WebhookEvent,
        },
        idempotency::IdempotencyGate,
        webhook::WebhookVerifier,
    },
    db::User,
    entitlement,
    errors::ApiError,
    state::AppState,
};

/// Entitlement granted per completed checkout.
const ENTITLEMENT_PERIOD_DAYS: i64 = 30;

pub fn billing_routes() -> Router<AppState> {
    Router::new()
        .route("/billing/create-checkout-session", post(create_checkout_session))
        .route("/billing/webhook", post(webhook))
        .route("/billing/status", get(billing_status))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let checkout_url = state
        .payments
        .create_checkout_session(&user.email, user.id)
        .await
        .map_err(|e| {
            // processor detail stays server-side
            error!(error = %e, user_id = %user.id, "checkout session creation failed");
            ApiError::Upstream("Payment processor error".into())
        })?;

    info!(user_id = %user.id, "checkout session created");
    Ok(Json(CheckoutResponse { checkout_url }))
}

#[instrument(skip(state, headers, body))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::WebhookVerification("missing stripe-signature header".into()))?;

    let verifier = WebhookVerifier::new(state.config.stripe.webhook_secret.clone());
    let event = verifier.verify_and_parse(&body, signature).map_err(|e| {
        warn!(error = %e, "webhook rejected");
        ApiError::WebhookVerification(e.to_string())
    })?;

    let gate = IdempotencyGate::new(state.cache.clone());
    if !gate.admit(&event.id).await? {
        info!(event_id = %event.id, "duplicate webhook delivery skipped");
        return Ok(Json(WebhookAck {
            status: "already_processed",
        }));
    }

    if event.event_type == "checkout.session.completed" {
        if let Err(err) = apply_checkout_completed(&state, &event).await {
            // the side effect did not land; drop the marker so the
            // processor's redelivery gets a fresh attempt
            if let Err(e) = gate.release(&event.id).await {
                error!(error = %e, event_id = %event.id, "failed to release idempotency marker");
            }
            return Err(err);
        }
    } else {
        info!(event_id = %event.id, event_type = %event.event_type, "webhook event acknowledged");
    }

    Ok(Json(WebhookAck { status: "success" }))
}

/// Locates the user via the opaque reference carried in checkout metadata and
/// extends their entitlement. The email on the session is deliberately not
/// used for lookup; it can drift from the credential store.
async fn apply_checkout_completed(
    state: &AppState,
    event: &WebhookEvent,
) -> Result<(), ApiError> {
    let session: CheckoutSessionObject = serde_json::from_value(event.data.object.clone())
        .map_err(|e| ApiError::WebhookVerification(format!("invalid checkout session: {e}")))?;

    let user_id = session
        .metadata
        .user_id
        .as_deref()
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| {
            warn!(event_id = %event.id, "checkout session missing user reference");
            ApiError::WebhookVerification("event missing user reference".into())
        })?;

    let end_date = OffsetDateTime::now_utc() + Duration::days(ENTITLEMENT_PERIOD_DAYS);
    let updated = User::activate_subscription(
        &state.db,
        user_id,
        end_date,
        session.customer.as_deref(),
        session.subscription.as_deref(),
    )
    .await?;

    if !updated {
        warn!(%user_id, event_id = %event.id, "checkout completed for unknown user");
        return Err(ApiError::WebhookVerification(
            "no matching user for event".into(),
        ));
    }

    info!(%user_id, event_id = %event.id, "subscription activated");
    Ok(())
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn billing_status(
    CurrentUser(user): CurrentUser,
) -> Result<Json<BillingStatusResponse>, ApiError> {
    let plan = entitlement::describe_plan(&user, OffsetDateTime::now_utc());
    Ok(Json(BillingStatusResponse {
        plan: plan.plan,
        is_active: plan.is_active,
        subscription_end_date: plan.subscription_end_date,
        subscription_id: user.stripe_subscription_id,
    }))
}
