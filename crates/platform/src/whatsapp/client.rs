//! HTTP client for the WhatsApp gateway.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};
use url::Url;

use brewline_core::PhoneNumber;

use super::error::WhatsAppError;
use crate::config::WhatsAppConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// What `GET /status` reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatus {
    pub connected: bool,
    /// Paired phone number, once connected.
    #[serde(default)]
    pub phone: Option<String>,
    /// Gateway session state (`open`, `connecting`, `qr`, `close`, ...).
    #[serde(default)]
    pub state: Option<String>,
}

/// Pairing QR code as a `data:image/png;base64,...` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrCode {
    pub qr: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    phone: &'a str,
    message: &'a str,
}

#[derive(Clone)]
pub struct WhatsAppClient {
    http: Client,
    base: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for WhatsAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppClient")
            .field("base", &self.base.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl WhatsAppClient {
    /// # Errors
    ///
    /// Returns `WhatsAppError::Config` if the HTTP client cannot be built.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, WhatsAppError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WhatsAppError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, WhatsAppError> {
        self.base
            .join(path)
            .map_err(|e| WhatsAppError::Config(format!("invalid gateway URL: {e}")))
    }

    /// # Errors
    ///
    /// Returns error if the gateway is unreachable or answers non-2xx.
    #[instrument(skip(self))]
    pub async fn status(&self) -> Result<GatewayStatus, WhatsAppError> {
        let response = self.send(self.http.get(self.endpoint("status")?)).await?;
        json(response).await
    }

    /// Fetch the pairing QR code.
    ///
    /// # Errors
    ///
    /// Returns `WhatsAppError::AlreadyConnected` when the gateway answers
    /// 404 because no pairing is pending.
    #[instrument(skip(self))]
    pub async fn qr(&self) -> Result<QrCode, WhatsAppError> {
        let response = self
            .http
            .get(self.endpoint("qr")?)
            .header("x-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| WhatsAppError::Request(e.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(WhatsAppError::AlreadyConnected);
        }
        json(check(response).await?).await
    }

    /// Start a new pairing session; a QR code becomes available shortly
    /// after.
    ///
    /// # Errors
    ///
    /// Returns error if the gateway is unreachable or answers non-2xx.
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<(), WhatsAppError> {
        self.send(self.http.post(self.endpoint("login")?)).await?;
        debug!("WhatsApp pairing started");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns error if the gateway is unreachable or answers non-2xx.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), WhatsAppError> {
        self.send(self.http.post(self.endpoint("logout")?)).await?;
        debug!("WhatsApp session logged out");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns error if the gateway is unreachable or refuses the message.
    #[instrument(skip(self, message), fields(phone = %phone))]
    pub async fn send_message(&self, phone: &PhoneNumber, message: &str) -> Result<(), WhatsAppError> {
        let body = SendMessage {
            phone: phone.as_str(),
            message,
        };
        self.send(self.http.post(self.endpoint("send-message")?).json(&body))
            .await?;
        debug!("WhatsApp message sent");
        Ok(())
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Response, WhatsAppError> {
        let response = builder
            .header("x-api-key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| WhatsAppError::Request(e.to_string()))?;
        check(response).await
    }
}

async fn check(response: Response) -> Result<Response, WhatsAppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or(body);
    error!(status = status.as_u16(), message = %message, "WhatsApp gateway error");
    Err(WhatsAppError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, WhatsAppError> {
    response
        .json()
        .await
        .map_err(|e| WhatsAppError::Response(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn client_for(server: &MockServer) -> WhatsAppClient {
        let config = WhatsAppConfig {
            base_url: Url::parse(&format!("{}/", server.uri())).expect("url"),
            api_key: SecretString::from("gateway-key"),
            poll_interval: Duration::from_secs(5),
        };
        WhatsAppClient::new(&config).expect("client")
    }

    #[tokio::test]
    async fn test_status_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .and(header("x-api-key", "gateway-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "connected": true,
                "phone": "6281234567890",
                "state": "open"
            })))
            .mount(&server)
            .await;

        let status = client_for(&server).status().await.expect("status");
        assert!(status.connected);
        assert_eq!(status.phone.as_deref(), Some("6281234567890"));
    }

    #[tokio::test]
    async fn test_qr_not_found_means_connected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/qr"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).qr().await.unwrap_err();
        assert!(matches!(err, WhatsAppError::AlreadyConnected));
    }

    #[tokio::test]
    async fn test_send_message_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send-message"))
            .and(body_json(json!({ "phone": "6281234567890", "message": "Halo" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let phone = PhoneNumber::parse("0812-3456-7890").expect("phone");
        client_for(&server)
            .send_message(&phone, "Halo")
            .await
            .expect("send");
    }

    #[tokio::test]
    async fn test_gateway_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({ "error": "session busy" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).login().await.unwrap_err();
        assert!(
            matches!(err, WhatsAppError::Api { status: 503, ref message } if message == "session busy")
        );
    }
}
