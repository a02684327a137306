//! HTTP response wrapper.

use std::collections::HashMap;

use reqwest::{Response, StatusCode};

use super::HttpError;

/// HTTP response wrapper.
pub struct HttpResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HashMap<String, String>,
    pub(crate) response: Response,
}

impl HttpResponse {
    pub(crate) fn from_response(url: &str, response: Response) -> Self {
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }
        Self {
            url: url.to_string(),
            status: response.status(),
            headers,
            response,
        }
    }

    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turn a non-success status into `HttpError::Status`.
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HttpError::Status {
                url: self.url,
                status: self.status.as_u16(),
            })
        }
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Get the filename from Content-Disposition header.
    pub fn content_disposition_filename(&self) -> Option<String> {
        self.headers
            .get("content-disposition")
            .and_then(|h| parse_content_disposition_filename(h))
    }

    /// Get response body as bytes.
    pub async fn bytes(self) -> Result<Vec<u8>, HttpError> {
        let url = self.url;
        self.response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|source| HttpError::Transport { url, source })
    }

    /// Get response body as text.
    pub async fn text(self) -> Result<String, HttpError> {
        let url = self.url;
        self.response
            .text()
            .await
            .map_err(|source| HttpError::Transport { url, source })
    }
}

/// Parse filename from Content-Disposition header value.
/// Parses both `filename="name.pdf"` and `filename*=UTF-8''name.pdf` formats.
pub fn parse_content_disposition_filename(header: &str) -> Option<String> {
    // RFC 5987 form wins when both are present
    if let Some(start) = header.find("filename*=") {
        let rest = &header[start + 10..];
        if let Some(quote_start) = rest.find("''") {
            let encoded = rest[quote_start + 2..].split([';', ' ']).next()?;
            if let Ok(decoded) = urlencoding::decode(encoded) {
                let filename = decoded.trim().to_string();
                if !filename.is_empty() {
                    return Some(filename);
                }
            }
        }
    }

    if let Some(start) = header.find("filename=") {
        let rest = &header[start + 9..];
        let filename = if let Some(quoted) = rest.strip_prefix('"') {
            quoted.split('"').next()
        } else {
            rest.split([';', ' ']).next()
        };

        if let Some(name) = filename {
            let name = name.trim().to_string();
            if !name.is_empty() {
                return Some(name);
            }
        }
    }

    None
}
