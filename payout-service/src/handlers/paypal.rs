use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::services::{Transmission, WebhookError, WebhookOutcome};
use crate::startup::AppState;

const TRANSMISSION_ID_HEADER: &str = "paypal-transmission-id";
const TRANSMISSION_TIME_HEADER: &str = "paypal-transmission-time";
const TRANSMISSION_SIG_HEADER: &str = "paypal-transmission-sig";

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self {
            WebhookError::InvalidSignature => {
                (StatusCode::BAD_REQUEST, "Invalid signature").into_response()
            }
            WebhookError::Processing(_) => (
                StatusCode::BAD_REQUEST,
                r#"Webhook error: "Webhook handler failed. View logs.""#,
            )
                .into_response(),
        }
    }
}

fn transmission(headers: &HeaderMap) -> Option<Transmission> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };

    Some(Transmission {
        id: header(TRANSMISSION_ID_HEADER)?,
        time: header(TRANSMISSION_TIME_HEADER)?,
        signature: header(TRANSMISSION_SIG_HEADER)?,
    })
}

/// PayPal payout-item notifications. The signature covers the raw body, so
/// the body is taken as bytes.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, WebhookError> {
    match state.webhooks.handle(transmission(&headers), &body).await? {
        WebhookOutcome::Processed => Ok("OK"),
        WebhookOutcome::Ignored => Ok("Unsupported event, skipping..."),
    }
}
