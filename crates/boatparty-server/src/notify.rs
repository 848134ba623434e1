//! Notification bridge: confirmation email via the Resend API and SMS via
//! the SendGrid email-to-SMS carrier gateway.
//!
//! Delivery failures never roll back an admission; the lifecycle controller
//! logs them and moves on. Only the standalone resend endpoints surface them.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

const RESEND_API_URL: &str = "https://api.resend.com/emails";
const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const EMAIL_SUBJECT: &str = "RSVP Confirmed - Halloween Boat Party";

#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Sms,
}

#[derive(Debug, Clone)]
pub struct ConfirmationData {
    pub name: String,
    pub guests: i32,
}

/// External message-sender boundary. Returns the provider message id.
#[async_trait]
pub trait NotificationBridge: Send + Sync {
    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        data: &ConfirmationData,
    ) -> Result<String, DeliveryError>;
}

#[derive(Clone)]
pub struct Notifier {
    http: reqwest::Client,
    resend_api_key: Option<String>,
    resend_from_email: String,
    sendgrid_api_key: Option<String>,
    sendgrid_from_email: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResendEmailBody {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct SendgridMailBody {
    personalizations: Vec<SendgridPersonalization>,
    from: SendgridAddress,
    subject: String,
    content: Vec<SendgridContent>,
}

#[derive(Debug, Serialize)]
struct SendgridPersonalization {
    to: Vec<SendgridAddress>,
}

#[derive(Debug, Serialize)]
struct SendgridAddress {
    email: String,
}

#[derive(Debug, Serialize)]
struct SendgridContent {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

impl Notifier {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            resend_api_key: config.resend_api_key.clone(),
            resend_from_email: config.resend_from_email.clone(),
            sendgrid_api_key: config.sendgrid_api_key.clone(),
            sendgrid_from_email: config.sendgrid_from_email.clone(),
        }
    }

    async fn send_email(
        &self,
        recipient: &str,
        data: &ConfirmationData,
    ) -> Result<String, DeliveryError> {
        let api_key = self
            .resend_api_key
            .as_deref()
            .ok_or_else(|| DeliveryError("RESEND_API_KEY is not configured".to_string()))?;

        let body = ResendEmailBody {
            from: self.resend_from_email.clone(),
            to: vec![recipient.to_string()],
            subject: EMAIL_SUBJECT.to_string(),
            html: confirmation_email_html(data),
        };

        let resp = self
            .http
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| DeliveryError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DeliveryError(format!("Resend returned {status}: {text}")));
        }

        let parsed: ResendEmailResponse = resp
            .json()
            .await
            .map_err(|e| DeliveryError(format!("invalid Resend response: {e}")))?;
        Ok(parsed.id)
    }

    async fn send_sms(
        &self,
        recipient: &str,
        data: &ConfirmationData,
    ) -> Result<String, DeliveryError> {
        let api_key = self
            .sendgrid_api_key
            .as_deref()
            .ok_or_else(|| DeliveryError("SENDGRID_API_KEY is not configured".to_string()))?;
        let from_email = self
            .sendgrid_from_email
            .as_deref()
            .ok_or_else(|| DeliveryError("SENDGRID_FROM_EMAIL is not configured".to_string()))?;

        let gateway_address = sms_gateway_address(recipient)
            .ok_or_else(|| DeliveryError(format!("unsupported phone number: {recipient}")))?;

        let text = confirmation_sms_text(data);
        let body = SendgridMailBody {
            personalizations: vec![SendgridPersonalization {
                to: vec![SendgridAddress {
                    email: gateway_address,
                }],
            }],
            from: SendgridAddress {
                email: from_email.to_string(),
            },
            subject: "Boat Party Confirmation".to_string(),
            content: vec![SendgridContent {
                kind: "text/plain".to_string(),
                value: text,
            }],
        };

        let resp = self
            .http
            .post(SENDGRID_API_URL)
            .bearer_auth(api_key)
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| DeliveryError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DeliveryError(format!("SendGrid returned {status}: {text}")));
        }

        // SendGrid replies 202 with an empty body; the id lives in a header.
        let message_id = resp
            .headers()
            .get("X-Message-Id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("accepted")
            .to_string();
        Ok(message_id)
    }
}

#[async_trait]
impl NotificationBridge for Notifier {
    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        data: &ConfirmationData,
    ) -> Result<String, DeliveryError> {
        match channel {
            Channel::Email => self.send_email(recipient, data).await,
            Channel::Sms => self.send_sms(recipient, data).await,
        }
    }
}

/// North-american numbers become `<10 digits>@txt.att.net`; anything else is
/// unsupported.
pub fn sms_gateway_address(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let national = match digits.len() {
        10 => digits,
        11 if digits.starts_with('1') => digits[1..].to_string(),
        _ => return None,
    };
    Some(format!("{national}@txt.att.net"))
}

fn confirmation_email_html(data: &ConfirmationData) -> String {
    let tickets = if data.guests == 1 { "ticket" } else { "tickets" };
    format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: Arial, sans-serif; background: #0a0a0a; color: #ff6666; padding: 20px;">
    <div style="max-width: 600px; margin: 0 auto; border: 3px solid #ff0000; border-radius: 20px; padding: 30px;">
      <h1 style="color: #ff0000; text-align: center;">RSVP Confirmed</h1>
      <p style="font-size: 1.2rem; text-align: center;">
        Hello <strong style="color: #ff0000;">{name}</strong>!<br>
        Your spot on the Halloween Boat Party is locked in.
      </p>
      <div style="border: 2px solid #ff0000; border-radius: 15px; padding: 20px; margin: 20px 0;">
        <h3 style="color: #ff0000; text-align: center;">Party Details</h3>
        <p>Date: October 25th</p>
        <p>Boarding: 9:15 PM &middot; Departure: 9:25 PM</p>
        <p>Location: 208 Barton Springs Road, Austin, TX 78704</p>
        <p>Guests: {guests} {tickets}</p>
      </div>
      <p>Arrive 15 minutes early for boarding and bring your ID.</p>
      <p style="text-align: center; opacity: 0.8;">See you on the water!</p>
    </div>
  </body>
</html>"#,
        name = data.name,
        guests = data.guests,
        tickets = tickets,
    )
}

fn confirmation_sms_text(data: &ConfirmationData) -> String {
    let tickets = if data.guests == 1 { "ticket" } else { "tickets" };
    format!(
        "CONGRATULATIONS {name}! You're confirmed for the Halloween Boat Party.\n\
         Date: October 25th, boarding 9:15 PM\n\
         Location: 208 Barton Springs Road, Austin, TX 78704\n\
         Guests: {guests} {tickets} confirmed\n\
         See you on the haunted waters!",
        name = data.name.to_uppercase(),
        guests = data.guests,
        tickets = tickets,
    )
}
