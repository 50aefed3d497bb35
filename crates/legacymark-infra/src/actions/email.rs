//! Resend email delivery.

use legacymark_core::workflow::step_runner::{ActionError, DeliveryReceipt, EmailMessage};
use legacymark_types::config::EmailConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

/// `POST {api_base}/emails` with bearer auth.
pub(super) async fn send_via_resend(
    client: &reqwest::Client,
    config: &EmailConfig,
    api_key: &SecretString,
    message: &EmailMessage,
) -> Result<DeliveryReceipt, ActionError> {
    let url = format!("{}/emails", config.api_base.trim_end_matches('/'));
    let request = SendEmailRequest {
        from: &config.from,
        to: [&message.to],
        subject: &message.subject,
        html: &message.body,
    };

    let response = client
        .post(&url)
        .bearer_auth(api_key.expose_secret())
        .json(&request)
        .send()
        .await
        .map_err(|e| ActionError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ActionError::Rejected(format!(
            "email provider returned {}: {}",
            status.as_u16(),
            body.trim()
        )));
    }

    let parsed: SendEmailResponse = response
        .json()
        .await
        .map_err(|e| ActionError::Transport(format!("invalid email provider response: {e}")))?;

    tracing::info!(to = %message.to, email_id = %parsed.id, "email sent");
    Ok(DeliveryReceipt { id: parsed.id })
}
