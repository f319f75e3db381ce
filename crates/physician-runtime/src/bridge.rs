//! [`BridgeOracle`] – HTTP bridge backend.
//!
//! Uploads the request to a bridge server (e.g. `http://localhost:8000`)
//! that fronts the reasoning model:
//!
//! ```text
//! POST {base}/verify
//! Content-Type: multipart/form-data
//!
//!   command = <intent, possibly "OVERRIDE: "-prefixed>
//!   image   = <frame bytes, declared mime type>
//! ```
//!
//! A 2xx answer carries the verdict document as its body; anything else is
//! a transport failure with no guaranteed body shape.  The bridge also
//! answers `GET {base}/` with a small health document, exposed here as
//! [`BridgeOracle::probe`].
//!
//! The mode directive is not sent: the bridge recognises the override
//! marker in `command` itself.

use async_trait::async_trait;
use physician_types::OracleError;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::oracle::Oracle;
use crate::request::VerificationRequest;

/// Upload name used when the frame carries none.
const DEFAULT_FILE_NAME: &str = "telemetry_frame";

/// Health document returned by `GET {base}/`.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeHealth {
    pub status: String,
    #[serde(default)]
    pub system: Option<String>,
}

impl BridgeHealth {
    pub fn is_online(&self) -> bool {
        self.status.eq_ignore_ascii_case("online")
    }
}

/// Multipart HTTP client for the verification bridge.
pub struct BridgeOracle {
    base_url: String,
    client: reqwest::Client,
}

impl BridgeOracle {
    /// Create a backend pointing at `base_url` (e.g. `"http://localhost:8000"`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn verify_url(&self) -> String {
        format!("{}/verify", self.base_url)
    }

    /// Ask the bridge whether it is live.
    ///
    /// # Errors
    ///
    /// [`OracleError::Unreachable`] / [`OracleError::Status`] on transport
    /// failure, [`OracleError::Protocol`] if the health document is not JSON.
    pub async fn probe(&self) -> Result<BridgeHealth, OracleError> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(unreachable)?;
        if !response.status().is_success() {
            return Err(OracleError::Status(response.status().as_u16()));
        }
        response
            .json::<BridgeHealth>()
            .await
            .map_err(|e| OracleError::Protocol(format!("health document: {e}")))
    }

    fn image_part(request: &VerificationRequest) -> Result<Part, OracleError> {
        let frame = &request.frame;
        let file_name = frame
            .file_name
            .clone()
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        Part::bytes(frame.data.clone())
            .file_name(file_name)
            .mime_str(&frame.mime_type)
            .map_err(|e| {
                OracleError::Protocol(format!("invalid mime type {:?}: {e}", frame.mime_type))
            })
    }
}

#[async_trait]
impl Oracle for BridgeOracle {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn consult(&self, request: &VerificationRequest) -> Result<String, OracleError> {
        let form = Form::new()
            .text("command", request.command.clone())
            .part("image", Self::image_part(request)?);

        let response = self
            .client
            .post(self.verify_url())
            .multipart(form)
            .send()
            .await
            .map_err(unreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }
        response.text().await.map_err(unreachable)
    }
}

fn unreachable(e: reqwest::Error) -> OracleError {
    OracleError::Unreachable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::build;
    use crate::test_http::{dead_endpoint, serve_once};
    use physician_types::TelemetryFrame;

    fn request(stress: bool) -> VerificationRequest {
        let frame = TelemetryFrame::new(b"JPEGDATA".to_vec(), "image/jpeg").with_file_name("arm.jpg");
        build(Some(&frame), "Pick up the glass bottle", stress).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let bridge = BridgeOracle::new("http://localhost:8000/");
        assert_eq!(bridge.verify_url(), "http://localhost:8000/verify");
        assert_eq!(bridge.name(), "bridge");
    }

    #[tokio::test]
    async fn consult_posts_command_and_image_parts() {
        let (url, server) = serve_once("200 OK", r#"{"status":"PASS"}"#).await;
        let bridge = BridgeOracle::new(url);

        let body = bridge.consult(&request(true)).await.unwrap();
        assert_eq!(body, r#"{"status":"PASS"}"#);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /verify"));
        assert!(raw.contains("multipart/form-data"));
        assert!(raw.contains("name=\"command\""));
        assert!(raw.contains("OVERRIDE: Pick up the glass bottle"));
        assert!(raw.contains("name=\"image\"; filename=\"arm.jpg\""));
        assert!(raw.to_ascii_lowercase().contains("content-type: image/jpeg"));
        assert!(raw.contains("JPEGDATA"));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#).await;
        let bridge = BridgeOracle::new(url);
        let err = bridge.consult(&request(false)).await.unwrap_err();
        assert_eq!(err, OracleError::Status(500));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let bridge = BridgeOracle::new(dead_endpoint().await);
        let err = bridge.consult(&request(false)).await.unwrap_err();
        assert!(matches!(err, OracleError::Unreachable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn invalid_mime_type_fails_before_sending() {
        let bridge = BridgeOracle::new(dead_endpoint().await);
        let mut req = request(false);
        req.frame.mime_type = "not a mime".into();
        let err = bridge.consult(&req).await.unwrap_err();
        assert!(matches!(err, OracleError::Protocol(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn probe_reads_health_document() {
        let (url, server) =
            serve_once("200 OK", r#"{"status":"online","system":"PHYSICIAN Kinematic Layer"}"#).await;
        let health = BridgeOracle::new(url).probe().await.unwrap();
        assert!(health.is_online());
        assert_eq!(health.system.as_deref(), Some("PHYSICIAN Kinematic Layer"));
        assert!(server.await.unwrap().starts_with("GET / "));
    }

    #[tokio::test]
    async fn probe_of_dead_bridge_fails() {
        let result = BridgeOracle::new(dead_endpoint().await).probe().await;
        assert!(matches!(result, Err(OracleError::Unreachable(_))));
    }
}
