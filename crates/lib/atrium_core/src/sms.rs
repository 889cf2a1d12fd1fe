//! SMS dispatch for OTP codes.
//!
//! The gateway is an external collaborator. A failed dispatch is reported as
//! `SmsDispatch { success: false, .. }`, never as a panic or a transport
//! error; the OTP manager decides whether that is fatal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::phone::mask_phone;

/// Outcome reported by a gateway for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsDispatch {
    pub success: bool,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SmsDispatch {
    pub fn sent(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Delivery failure surfaced under a strict delivery policy.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SmsError(pub String);

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, phone: &str, code: &str, template_id: &str) -> SmsDispatch;
}

/// Request body posted to the HTTP gateway.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    to: &'a str,
    code: &'a str,
    template_id: &'a str,
}

/// JSON-over-HTTP SMS provider.
#[derive(Debug, Clone)]
pub struct HttpSmsGateway {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpSmsGateway {
    pub fn new(endpoint: Url, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, phone: &str, code: &str, template_id: &str) -> SmsDispatch {
        let mut request = self.client.post(self.endpoint.clone()).json(&SendRequest {
            to: phone,
            code,
            template_id,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(phone = %mask_phone(phone), "SMS gateway unreachable: {e}");
                return SmsDispatch::failed(format!("gateway unreachable: {e}"));
            }
        };
        let status = response.status();
        if !status.is_success() {
            warn!(phone = %mask_phone(phone), %status, "SMS gateway rejected message");
            return SmsDispatch::failed(format!("gateway returned {status}"));
        }
        match response.json::<SmsDispatch>().await {
            Ok(dispatch) => {
                debug!(
                    phone = %mask_phone(phone),
                    success = dispatch.success,
                    message_id = ?dispatch.message_id,
                    "SMS gateway responded"
                );
                dispatch
            }
            Err(e) => SmsDispatch::failed(format!("unreadable gateway response: {e}")),
        }
    }
}

/// Gateway used when no provider is configured: writes to the log instead.
///
/// With `reveal_codes` set (outside production) the code is logged and the
/// dispatch reports success. Without it nothing can reach the client, so
/// every dispatch reports failure.
#[derive(Debug, Clone)]
pub struct LogSmsGateway {
    reveal_codes: bool,
}

impl LogSmsGateway {
    pub fn new(reveal_codes: bool) -> Self {
        Self { reveal_codes }
    }
}

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send(&self, phone: &str, code: &str, template_id: &str) -> SmsDispatch {
        if !self.reveal_codes {
            warn!(phone = %mask_phone(phone), template_id, "no SMS gateway configured");
            return SmsDispatch::failed("no SMS gateway configured");
        }
        info!(phone = %mask_phone(phone), template_id, code, "OTP (log gateway)");
        SmsDispatch::sent(format!("log-{}", crate::store::new_id()))
    }
}
