use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use reqwest::{
    Method,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::delegate::{DelegateError, DelegateErrorKind};

/// A fully rendered outbound request from an api_call node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Request timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Outbound API collaborator used by api_call nodes.
#[async_trait]
pub trait ApiDelegate: Send + Sync {
    /// Perform the request and return the response body as JSON.
    /// Non-JSON bodies come back as a JSON string.
    async fn call(
        &self,
        request: &ApiRequest,
    ) -> Result<Value, DelegateError>;
}

/// [`ApiDelegate`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpApiDelegate {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl Default for HttpApiDelegate {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl HttpApiDelegate {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_timeout,
        }
    }

    fn build_request(
        &self,
        request: &ApiRequest,
    ) -> Result<reqwest::RequestBuilder, DelegateError> {
        let bad_request = |msg: String| DelegateError::new(DelegateErrorKind::BadRequest, msg);

        let method: Method = request.method.to_uppercase().parse().map_err(|_| bad_request(format!("invalid method '{}'", request.method)))?;

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("accept"), HeaderValue::from_static("application/json, */*"));
        for (key, value) in &request.headers {
            headers.insert(
                key.parse::<HeaderName>().map_err(|err| bad_request(err.to_string()))?,
                value.parse::<HeaderValue>().map_err(|err| bad_request(err.to_string()))?,
            );
        }

        let timeout = request.timeout.map(Duration::from_millis).unwrap_or(self.default_timeout);
        let mut builder = self.client.request(method, &request.url).headers(headers).timeout(timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        Ok(builder)
    }
}

fn classify(err: reqwest::Error) -> DelegateError {
    if err.is_timeout() {
        DelegateError::new(DelegateErrorKind::Timeout, err.to_string())
    } else if let Some(status) = err.status() {
        DelegateError::from_status(status.as_u16(), err.to_string())
    } else if err.is_builder() {
        DelegateError::new(DelegateErrorKind::BadRequest, err.to_string())
    } else {
        DelegateError::new(DelegateErrorKind::Upstream, err.to_string())
    }
}

#[async_trait]
impl ApiDelegate for HttpApiDelegate {
    async fn call(
        &self,
        request: &ApiRequest,
    ) -> Result<Value, DelegateError> {
        let response = self.build_request(request)?.send().await.map_err(classify)?;

        let status = response.status();
        let text = response.text().await.map_err(classify)?;
        if !status.is_success() {
            return Err(DelegateError::from_status(status.as_u16(), format!("{} {}: {}", request.method, request.url, text)));
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_rejects_bad_method() {
        let delegate = HttpApiDelegate::default();
        let request = ApiRequest {
            method: "FETCH ME".into(),
            url: "http://localhost/x".into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        };
        let err = delegate.build_request(&request).unwrap_err();
        assert_eq!(err.kind, DelegateErrorKind::BadRequest);
    }

    #[test]
    fn test_build_request_with_headers_and_body() {
        let delegate = HttpApiDelegate::default();
        let request = ApiRequest {
            method: "post".into(),
            url: "http://localhost/orders".into(),
            headers: HashMap::from([("x-tenant".to_string(), "acme".to_string())]),
            body: Some(serde_json::json!({"id": 1})),
            timeout: Some(500),
        };
        let built = delegate.build_request(&request).unwrap().build().unwrap();
        assert_eq!(built.method(), Method::POST);
        assert_eq!(built.headers()["x-tenant"], "acme");
        assert_eq!(built.timeout(), Some(&Duration::from_millis(500)));
    }
}
