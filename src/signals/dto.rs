use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One mock market signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub id: String,
    pub action: String,
    pub price: i64,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct SignalsResponse {
    pub status: &'static str,
    pub plan: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub subscription_end_date: Option<OffsetDateTime>,
    pub data: Vec<Signal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_response_omits_expiry_and_keeps_message() {
        let response = SignalsResponse {
            status: "success",
            plan: "Free",
            message: Some("Upgrade to Pro to see all signals"),
            subscription_end_date: None,
            data: vec![],
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"plan\":\"Free\""));
        assert!(json.contains("Upgrade to Pro"));
        assert!(!json.contains("subscription_end_date"));
    }
}
