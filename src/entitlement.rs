use serde::Serialize;
use time::OffsetDateTime;

use crate::db::User;

/// Active iff the stored expiry is set and strictly in the future. All
/// comparisons happen in UTC; `now` is passed in so tests control the clock.
pub fn is_active(user: &User, now: OffsetDateTime) -> bool {
    match user.subscription_end_date {
        Some(end) => end > now,
        None => false,
    }
}

#[derive(Debug, Serialize)]
pub struct PlanStatus {
    pub plan: &'static str,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub subscription_end_date: Option<OffsetDateTime>,
}

/// Free plan for non-subscribed or expired users; Pro echoes the expiry back.
pub fn describe_plan(user: &User, now: OffsetDateTime) -> PlanStatus {
    if is_active(user, now) {
        PlanStatus {
            plan: "Pro",
            is_active: true,
            subscription_end_date: user.subscription_end_date,
        }
    } else {
        PlanStatus {
            plan: "Free",
            is_active: false,
            subscription_end_date: None,
        }
    }
}
