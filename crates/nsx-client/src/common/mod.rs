//! Common utilities for the NSX Policy API client
//!
//! Provides the authenticated HTTP wrapper and cursor pagination used by
//! every typed call in `client.rs`.

pub mod query;

use crate::error::NsxError;
use crate::models::ListResult;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// HTTP client wrapper with basic authentication
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, username: String, password: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a policy path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else if path.starts_with("/policy/") {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/policy/api/v1{}", self.base_url, path)
        }
    }

    /// Map a non-success response to an error, keeping the body for context
    async fn check(method: &str, path: &str, response: Response) -> Result<Response, NsxError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(NsxError::NotFound(format!("{} - {}", path, body))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(NsxError::Authentication(
                format!("{} {} returned {}", method, path, status),
            )),
            StatusCode::BAD_REQUEST => Err(NsxError::InvalidRequest(format!(
                "{} {} - {}",
                method, path, body
            ))),
            _ => Err(NsxError::Api(format!(
                "{} {} failed: {} - {}",
                method, path, status, body
            ))),
        }
    }

    /// Make a GET request
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, NsxError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await?;

        let response = Self::check("GET", path, response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            NsxError::Api(format!(
                "error decoding response body: {} - Response (first 500 chars): {}",
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Make a PATCH request. NSX answers PATCH with an empty body.
    pub async fn patch(&self, path: &str, body: &serde_json::Value) -> Result<(), NsxError> {
        let url = self.build_url(path);
        debug!(
            "PATCH {} with body: {}",
            url,
            serde_json::to_string(body).unwrap_or_default()
        );

        let response = self
            .client
            .patch(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        Self::check("PATCH", path, response).await?;
        Ok(())
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<(), NsxError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await?;

        Self::check("DELETE", path, response).await?;
        Ok(())
    }

    /// Fetch every page of a list endpoint by following `cursor`
    pub async fn fetch_all_pages<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
    ) -> Result<Vec<T>, NsxError> {
        let mut all_results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page_path = page_path(path, cursor.as_deref());
            debug!("Fetching page: {}", page_path);

            let page: ListResult<T> = self.get(&page_path).await?;
            all_results.extend(page.results);

            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(all_results)
    }
}

/// Append a cursor to a path that may already carry a query string
fn page_path(path: &str, cursor: Option<&str>) -> String {
    match cursor {
        None => path.to_string(),
        Some(cursor) => {
            let separator = if path.contains('?') { '&' } else { '?' };
            format!("{}{}cursor={}", path, separator, urlencoding::encode(cursor))
        }
    }
}
