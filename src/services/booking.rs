use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::models::job::{Job, JobId, JobRecord};

/// Remote authority for bookings, their status, and one-time codes.
pub trait BookingService: Send + Sync {
    /// Jobs currently assigned to the technician.
    fn assigned_jobs(&self) -> impl Future<Output = Result<Vec<Job>, BookingError>> + Send;

    /// Full detail for one job, including current status.
    fn job(&self, id: JobId) -> impl Future<Output = Result<Job, BookingError>> + Send;

    /// Issue a fresh one-time code to the job's customer, invalidating any earlier one.
    fn send_otp(&self, id: JobId) -> impl Future<Output = Result<(), BookingError>> + Send;

    /// Validate a code; on success the booking service marks the job completed.
    fn verify_otp(
        &self,
        id: JobId,
        otp: &str,
    ) -> impl Future<Output = Result<(), BookingError>> + Send;

    /// Jobs the technician has already completed.
    fn service_history(&self) -> impl Future<Output = Result<Vec<Job>, BookingError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid code: {0}")]
    InvalidCode(String),

    #[error("Code expired: {0}")]
    CodeExpired(String),

    #[error("Booking not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Booking service rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected booking service response: {0}")]
    Decode(String),
}

impl BookingError {
    /// Reason text suitable for showing to the technician.
    pub fn reason(&self) -> String {
        match self {
            BookingError::Transport(_) | BookingError::Decode(_) => "request failed".to_string(),
            BookingError::InvalidCode(_) => "invalid code".to_string(),
            BookingError::CodeExpired(_) => "code expired".to_string(),
            BookingError::NotFound(m)
            | BookingError::Unauthorized(m)
            | BookingError::Rejected { message: m, .. } => m.clone(),
        }
    }
}

/// Which booking endpoint a response came from; drives status interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    AssignedServices,
    ServiceDetail,
    SendOtp,
    VerifyOtp,
    ServiceHistory,
}

impl Endpoint {
    fn label(self) -> &'static str {
        match self {
            Endpoint::AssignedServices => "assigned_services",
            Endpoint::ServiceDetail => "service_detail",
            Endpoint::SendOtp => "send_otp",
            Endpoint::VerifyOtp => "verify_otp",
            Endpoint::ServiceHistory => "service_history",
        }
    }
}

/// Map a non-success booking response to an error.
pub fn classify_failure(endpoint: Endpoint, status: StatusCode, message: String) -> BookingError {
    let mentions_code = {
        let lower = message.to_lowercase();
        lower.contains("otp") || lower.contains("code")
    };

    match (endpoint, status) {
        (Endpoint::VerifyOtp, StatusCode::GONE) => BookingError::CodeExpired(message),
        (Endpoint::VerifyOtp, StatusCode::UNAUTHORIZED) if mentions_code => {
            BookingError::InvalidCode(message)
        }
        (_, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => BookingError::Unauthorized(message),
        (_, StatusCode::NOT_FOUND) => BookingError::NotFound(message),
        _ => BookingError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

#[derive(Deserialize)]
struct AssignedEnvelope {
    #[serde(default)]
    assigned_services: Vec<JobRecord>,
}

#[derive(Deserialize)]
struct DetailEnvelope {
    details: JobRecord,
}

#[derive(Deserialize, Default)]
struct MessageEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

/// Bearer-authenticated HTTP client for the booking service.
pub struct HttpBookingClient {
    http: Client,
    base_url: String,
    api_token: String,
}

impl HttpBookingClient {
    pub fn new(base_url: &str, api_token: &str, timeout: Duration) -> Result<Self, BookingError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tech-dispatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        path: &str,
    ) -> Result<T, BookingError> {
        let request = self.http.get(self.url(path)).bearer_auth(&self.api_token);
        let body = self.execute(endpoint, request).await?;
        serde_json::from_str(&body).map_err(|e| BookingError::Decode(e.to_string()))
    }

    async fn post_action(
        &self,
        endpoint: Endpoint,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(), BookingError> {
        let mut request = self.http.post(self.url(path)).bearer_auth(&self.api_token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let text = self.execute(endpoint, request).await?;

        let envelope: MessageEnvelope = serde_json::from_str(&text).unwrap_or_default();
        if envelope.success == Some(false) {
            return Err(BookingError::Rejected {
                status: StatusCode::OK.as_u16(),
                message: envelope.message.unwrap_or_else(|| "request rejected".to_string()),
            });
        }
        Ok(())
    }

    /// Send a request, record its latency, and return the body of a 2xx response.
    async fn execute(
        &self,
        endpoint: Endpoint,
        request: reqwest::RequestBuilder,
    ) -> Result<String, BookingError> {
        let start = Instant::now();
        let result = request.send().await;
        metrics::histogram!("booking_request_seconds", "endpoint" => endpoint.label())
            .record(start.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            tracing::warn!(endpoint = endpoint.label(), error = %e, "Booking service unreachable");
            BookingError::Transport(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        let message = serde_json::from_str::<MessageEnvelope>(&text)
            .ok()
            .and_then(|m| m.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

        tracing::warn!(
            endpoint = endpoint.label(),
            status = status.as_u16(),
            message = %message,
            "Booking service returned an error"
        );

        Err(classify_failure(endpoint, status, message))
    }
}

impl BookingService for HttpBookingClient {
    async fn assigned_jobs(&self) -> Result<Vec<Job>, BookingError> {
        let envelope: AssignedEnvelope = self
            .get_json(Endpoint::AssignedServices, "/assigned-services")
            .await?;
        Ok(envelope.assigned_services.into_iter().map(Job::from).collect())
    }

    async fn job(&self, id: JobId) -> Result<Job, BookingError> {
        let envelope: DetailEnvelope = self
            .get_json(Endpoint::ServiceDetail, &format!("/service/{id}"))
            .await?;
        Ok(envelope.details.into())
    }

    async fn send_otp(&self, id: JobId) -> Result<(), BookingError> {
        self.post_action(Endpoint::SendOtp, &format!("/service/{id}/send_otp"), None)
            .await
    }

    async fn verify_otp(&self, id: JobId, otp: &str) -> Result<(), BookingError> {
        let body = serde_json::json!({ "otp": otp });
        self.post_action(
            Endpoint::VerifyOtp,
            &format!("/service/{id}/verify_otp"),
            Some(body),
        )
        .await
    }

    async fn service_history(&self) -> Result<Vec<Job>, BookingError> {
        let envelope: AssignedEnvelope = self
            .get_json(Endpoint::ServiceHistory, "/service-history")
            .await?;
        Ok(envelope.assigned_services.into_iter().map(Job::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_invalid_code() {
        let err = classify_failure(Endpoint::VerifyOtp, StatusCode::UNAUTHORIZED, "Invalid OTP".into());
        assert!(matches!(err, BookingError::InvalidCode(_)));
        assert_eq!(err.reason(), "invalid code");
    }

    #[test]
    fn test_classify_expired() {
        let err = classify_failure(Endpoint::VerifyOtp, StatusCode::GONE, "OTP expired".into());
        assert!(matches!(err, BookingError::CodeExpired(_)));
    }

    #[test]
    fn test_classify_token_failure_on_verify_is_unauthorized() {
        let err = classify_failure(Endpoint::VerifyOtp, StatusCode::UNAUTHORIZED, "Invalid token!".into());
        assert!(matches!(err, BookingError::Unauthorized(_)));
    }

    #[test]
    fn test_classify_not_sent_is_rejected_with_reason() {
        let err = classify_failure(Endpoint::VerifyOtp, StatusCode::BAD_REQUEST, "OTP not sent".into());
        match err {
            BookingError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "OTP not sent");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classify_send_otp_forbidden() {
        let err = classify_failure(Endpoint::SendOtp, StatusCode::FORBIDDEN, "Unauthorized".into());
        assert!(matches!(err, BookingError::Unauthorized(_)));
        let err = classify_failure(Endpoint::ServiceDetail, StatusCode::NOT_FOUND, "Booking not found".into());
        assert_eq!(err.reason(), "Booking not found");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client =
            HttpBookingClient::new("http://localhost:5000/technician/", "t", Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.url("/service/4"), "http://localhost:5000/technician/service/4");
    }
}
