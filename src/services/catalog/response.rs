//! Catalog upload response interpretation.

use serde::Deserialize;

use crate::models::UploadOutcome;

const MAX_BODY_IN_MESSAGE: usize = 200;

/// Body of `POST /pdfs/upload`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub data: Option<UploadData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadData {
    #[serde(default)]
    pub total_flyers_created: u64,
    #[serde(default)]
    pub total_duplicates_skipped: u64,
    #[serde(default)]
    pub total_uploaded: u64,
    #[serde(default)]
    pub created_flyers: Vec<CreatedFlyer>,
    #[serde(default)]
    pub skipped_duplicates: Option<Vec<SkippedDuplicate>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFlyer {
    #[serde(default)]
    pub flyer_id: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SkippedDuplicate {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_IN_MESSAGE {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(MAX_BODY_IN_MESSAGE).collect();
        format!("{}...", head)
    }
}

fn id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn mentions_duplicate(text: Option<&str>) -> bool {
    text.is_some_and(|t| t.to_lowercase().contains("duplicat"))
}

/// Classify an upload response by status code and raw body.
pub fn interpret_response(status: u16, body: &str) -> UploadOutcome {
    if status != 200 {
        return UploadOutcome::failed(format!("HTTP {}: {}", status, truncate(body)));
    }

    let response: UploadResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => return UploadOutcome::failed(format!("invalid JSON response: {}", e)),
    };

    if !response.success {
        let message = response
            .message
            .clone()
            .or_else(|| response.reason.clone());
        if mentions_duplicate(response.message.as_deref()) || mentions_duplicate(response.reason.as_deref()) {
            return UploadOutcome::Duplicate { message };
        }
        return UploadOutcome::failed(message.unwrap_or_else(|| "upload rejected".to_string()));
    }

    let data = response.data.unwrap_or_default();
    if data.total_flyers_created > 0 {
        let id = data
            .created_flyers
            .iter()
            .find_map(|f| f.flyer_id.as_ref().and_then(id_to_string));
        return UploadOutcome::Created {
            id,
            message: response.message,
        };
    }

    if data.total_duplicates_skipped > 0 {
        let reason = data
            .skipped_duplicates
            .as_ref()
            .and_then(|d| d.iter().find_map(|s| s.reason.clone()));
        return UploadOutcome::Duplicate {
            message: reason.or(response.message),
        };
    }

    UploadOutcome::failed(
        response
            .message
            .unwrap_or_else(|| "catalog created no flyers".to_string()),
    )
}
