use axum::{extract::State, routing::get, Json, Router};
use rand::seq::SliceRandom;
use rand::Rng;
use time::OffsetDateTime;
use tracing::{instrument, warn};

use super::dto::{Signal, SignalsResponse};
use crate::{auth::CurrentUser, entitlement, errors::ApiError, state::AppState};

/// Non-active users see at most this many signals.
pub const FREE_SIGNAL_LIMIT: usize = 5;

const CACHE_KEY: &str = "market_signals";
const CACHE_TTL_SECS: u64 = 300;

const TICKERS: [&str; 10] = [
    "NIFTY 50",
    "RELIANCE",
    "TCS",
    "INFY",
    "HDFCBANK",
    "ICICIBANK",
    "SBIN",
    "BHARTIARTL",
    "ITC",
    "LT",
];

const ACTIONS: [&str; 3] = ["BUY", "SELL", "HOLD"];

pub fn signal_routes() -> Router<AppState> {
    Router::new().route("/signals", get(get_signals))
}

fn generate_market_data() -> Vec<Signal> {
    let mut rng = rand::thread_rng();
    TICKERS
        .iter()
        .map(|ticker| Signal {
            id: ticker.to_string(),
            action: ACTIONS.choose(&mut rng).unwrap_or(&"HOLD").to_string(),
            price: rng.gen_range(1000..=3000),
            timestamp: "Just Now".to_string(),
        })
        .collect()
}

fn visible_signals(mut signals: Vec<Signal>, active: bool) -> Vec<Signal> {
    if !active {
        signals.truncate(FREE_SIGNAL_LIMIT);
    }
    signals
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_signals(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<SignalsResponse>, ApiError> {
    let signals = match state.cache.get(CACHE_KEY).await {
        Ok(Some(cached)) => match serde_json::from_str::<Vec<Signal>>(&cached) {
            Ok(signals) => signals,
            Err(e) => {
                warn!(error = %e, "discarding unreadable signals cache entry");
                refresh_cache(&state).await?
            }
        },
        Ok(None) => refresh_cache(&state).await?,
        Err(e) => {
            // cache outage degrades to regeneration, not an error
            warn!(error = %e, "signals cache unavailable");
            generate_market_data()
        }
    };

    let active = entitlement::is_active(&user, OffsetDateTime::now_utc());
    let response = if active {
        SignalsResponse {
            status: "success",
            plan: "Pro",
            message: None,
            subscription_end_date: user.subscription_end_date,
            data: signals,
        }
    } else {
        SignalsResponse {
            status: "success",
            plan: "Free",
            message: Some("Upgrade to Pro to see all signals"),
            subscription_end_date: None,
            data: visible_signals(signals, false),
        }
    };

    Ok(Json(response))
}

async fn refresh_cache(state: &AppState) -> Result<Vec<Signal>, ApiError> {
    let signals = generate_market_data();
    let serialized = serde_json::to_string(&signals).map_err(anyhow::Error::from)?;
    if let Err(e) = state.cache.set_ex(CACHE_KEY, &serialized, CACHE_TTL_SECS).await {
        warn!(error = %e, "failed to cache signals");
    }
    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_one_signal_per_ticker() {
        let signals = generate_market_data();
        assert_eq!(signals.len(), TICKERS.len());
        for signal in &signals {
            assert!(ACTIONS.contains(&signal.action.as_str()));
            assert!((1000..=3000).contains(&signal.price));
        }
    }

    #[test]
    fn free_view_is_truncated() {
        let signals = generate_market_data();
        let visible = visible_signals(signals, false);
        assert_eq!(visible.len(), FREE_SIGNAL_LIMIT);
    }

    #[test]
    fn active_view_is_untouched() {
        let signals = generate_market_data();
        let visible = visible_signals(signals.clone(), true);
        assert_eq!(visible, signals);
    }

    #[test]
    fn truncation_handles_short_lists() {
        let signals = generate_market_data().into_iter().take(2).collect::<Vec<_>>();
        let visible = visible_signals(signals, false);
        assert_eq!(visible.len(), 2);
    }
}
