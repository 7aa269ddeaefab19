use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::ai::AiSetting;
use crate::ai::settings::mask_secret;
use crate::entities::ConfigEntry;

const MAX_KEY_LEN: usize = 128;

const SECRET_MARKERS: [&str; 4] = ["API_KEY", "SECRET", "TOKEN", "PASSWORD"];

/// `true` when values stored under `key` must be masked in responses.
pub fn is_secret_key(key: &str) -> bool {
    if AiSetting::from_str(key).is_ok_and(|s| s.is_secret()) {
        return true;
    }
    let upper = key.to_ascii_uppercase();
    SECRET_MARKERS.iter().any(|m| upper.contains(m))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub key: String,
    /// Secret values come back masked.
    pub value: String,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ConfigEntry> for ConfigResponse {
    fn from(e: ConfigEntry) -> Self {
        let value = if is_secret_key(&e.key) {
            mask_secret(&e.value)
        } else {
            e.value
        };
        Self {
            key: e.key,
            value,
            description: e.description,
            updated_at: e.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct UpsertConfigRequest {
    #[validate(custom(function = "validate_key"))]
    pub key: String,
    pub value: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

/// Keys are stored trimmed, so the trimmed form is what gets checked.
fn validate_key(key: &str) -> Result<(), ValidationError> {
    let len = key.trim().chars().count();
    if (1..=MAX_KEY_LEN).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::new("key")
            .with_message(format!("key must be 1-{MAX_KEY_LEN} non-blank characters").into()))
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct PatchConfigRequest {
    pub value: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}
