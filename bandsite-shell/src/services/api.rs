//! Backend API client
//!
//! Thin JSON wrapper over the site backend (newsletter list, contact and
//! booking inboxes, tour dates, releases). Every request carries the
//! configured timeout; any non-2xx status is an error.

use crate::error::ApiError;
use bandsite_common::config::ApiConfig;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

const USER_AGENT: &str = concat!("bandsite/", env!("CARGO_PKG_VERSION"));

/// Newsletter subscription payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
    pub list_ids: Vec<u32>,
    pub name: String,
    pub status: String,
    pub preconfirm_subscriptions: bool,
}

/// Contact form fields as entered by the visitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    /// `general`, `booking` or `press`
    pub kind: Option<String>,
}

/// Contact payload sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<&ContactForm> for ContactRequest {
    fn from(form: &ContactForm) -> Self {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());
        Self {
            name: form.name.clone(),
            email: form.email.clone(),
            subject: non_empty(&form.subject).unwrap_or_else(|| "General Inquiry".to_string()),
            message: form.message.clone(),
            kind: non_empty(&form.kind).unwrap_or_else(|| "general".to_string()),
        }
    }
}

/// Booking request payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub venue_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub event_date: Option<String>,
    pub event_type: Option<String>,
    pub budget: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: Option<String>,
}

/// Backend API client
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    list_ids: Vec<u32>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            list_ids: vec![1],
            timeout,
        })
    }

    /// Build from the `[api]` section; `None` when no base URL is configured
    pub fn from_config(config: &ApiConfig) -> Result<Option<Self>, ApiError> {
        let Some(base_url) = config.base_url.as_deref() else {
            return Ok(None);
        };
        let client = Self::new(base_url, Duration::from_millis(config.timeout_ms))?
            .with_list_ids(config.list_ids.clone());
        Ok(Some(client))
    }

    /// Newsletter lists new subscribers are added to
    pub fn with_list_ids(mut self, list_ids: Vec<u32>) -> Self {
        self.list_ids = list_ids;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn request<T, B>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(endpoint);
        debug!(method = %method, url = %url, "API request");

        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let result = async {
            let response = request.send().await.map_err(|e| self.transport_error(e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ApiError::Status(status.as_u16()));
            }

            response
                .json::<T>()
                .await
                .map_err(|e| ApiError::Parse(e.to_string()))
        }
        .await;

        if let Err(e) = &result {
            error!("{} {} failed: {}", method, url, e);
        }
        result
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.timeout.as_millis() as u64)
        } else {
            ApiError::from(err)
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request::<T, Value>(Method::GET, endpoint, None).await
    }

    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, endpoint, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.request::<T, Value>(Method::DELETE, endpoint, None).await
    }

    /// Add an address to the newsletter lists
    pub async fn subscribe_email(&self, email: &str) -> Result<Value, ApiError> {
        let body = SubscribeRequest {
            email: email.to_string(),
            list_ids: self.list_ids.clone(),
            name: String::new(),
            status: "enabled".to_string(),
            preconfirm_subscriptions: false,
        };
        let response = self.post("/subscribe", &body).await?;
        info!("Email subscribed");
        Ok(response)
    }

    pub async fn submit_contact_form(&self, form: &ContactForm) -> Result<Value, ApiError> {
        self.post("/contact", &ContactRequest::from(form)).await
    }

    pub async fn submit_booking_request(&self, booking: &BookingRequest) -> Result<Value, ApiError> {
        self.post("/booking", booking).await
    }

    /// Upcoming shows; empty when the backend is unreachable
    pub async fn get_tour_dates(&self) -> Vec<Value> {
        self.list_field("/tour-dates", "dates").await
    }

    /// Latest releases; empty when the backend is unreachable
    pub async fn get_latest_music(&self) -> Vec<Value> {
        self.list_field("/music/latest", "tracks").await
    }

    async fn list_field(&self, endpoint: &str, field: &str) -> Vec<Value> {
        match self.get::<Value>(endpoint).await {
            Ok(mut response) => match response.get_mut(field).map(Value::take) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            Err(_) => Vec::new(),
        }
    }

    /// True when `/health` answers `{"status": "ok"}`
    pub async fn health_check(&self) -> bool {
        match self.get::<HealthResponse>("/health").await {
            Ok(health) => health.status.as_deref() == Some("ok"),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_defaults() {
        let form = ContactForm {
            name: "Sam".to_string(),
            email: "sam@example.com".to_string(),
            subject: Some("  ".to_string()),
            message: "Play our venue please".to_string(),
            kind: None,
        };
        let request = ContactRequest::from(&form);
        assert_eq!(request.subject, "General Inquiry");
        assert_eq!(request.kind, "general");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "general");
    }

    #[test]
    fn test_from_config_requires_base_url() {
        let mut config = ApiConfig::default();
        assert!(ApiClient::from_config(&config).unwrap().is_none());

        config.base_url = Some("http://localhost:9000/api/".to_string());
        let client = ApiClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.url("/health"), "http://localhost:9000/api/health");
    }
}
