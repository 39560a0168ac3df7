//! Client for the Game of Claude profile service.
//!
//! Every call is a single blocking request: no retries, no caller-specified
//! timeout. A failure aborts the command that made it.

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::identity::Identity;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}{}", detail_suffix(.body))]
    Status { status: u16, body: String },
    #[error("could not reach {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A quest as reported on the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `"daily"` or `"progressive"`
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub goal: u64,
    #[serde(default)]
    pub current: u64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub xp_reward: u64,
}

impl Quest {
    pub fn is_daily(&self) -> bool {
        self.kind == "daily"
    }
}

/// Profile as computed by the service. Nothing here is validated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub character_name: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub level_title: String,
    #[serde(default)]
    pub total_xp: u64,
    #[serde(default)]
    pub xp_in_level: u64,
    #[serde(default)]
    pub xp_to_next_level: u64,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default)]
    pub total_commits: u64,
    #[serde(default)]
    pub total_test_passes: u64,
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub quests: Vec<Quest>,
    #[serde(default)]
    pub member_since: String,
}

/// Remote operations the CLI commands depend on.
pub trait ProfileService {
    /// `POST /api/devices`
    fn register_device(&self, identity: &Identity) -> Result<(), ApiError>;

    /// `PATCH /api/profile/{device_id}`
    fn rename(&self, identity: &Identity, character_name: &str) -> Result<(), ApiError>;

    /// `DELETE /api/me`
    fn delete_profile(&self, identity: &Identity) -> Result<(), ApiError>;

    /// `GET /api/profile/{device_id}`
    fn fetch_profile(&self, device_id: &str) -> Result<Profile, ApiError>;
}

/// [`ProfileService`] over HTTP.
pub struct HttpService {
    client: Client,
    api_base: String,
}

impl HttpService {
    pub fn new(api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn send(&self, url: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        tracing::debug!(%url, "sending request");
        let response = request.send().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        tracing::debug!(%url, status = status.as_u16(), "response received");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: error_detail(&body),
            });
        }
        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.send(&url, self.client.get(&url))?;
        response
            .json()
            .map_err(|source| ApiError::Decode { url, source })
    }
}

impl ProfileService for HttpService {
    fn register_device(&self, identity: &Identity) -> Result<(), ApiError> {
        let url = self.url("/api/devices");
        let body = json!({
            "device_id": identity.device_id,
            "character_name": identity.character_name,
        });
        self.send(&url, self.client.post(&url).json(&body))?;
        Ok(())
    }

    fn rename(&self, identity: &Identity, character_name: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/profile/{}", identity.device_id));
        let request = self
            .client
            .patch(&url)
            .header("Authorization", identity.bearer())
            .json(&json!({ "character_name": character_name }));
        self.send(&url, request)?;
        Ok(())
    }

    fn delete_profile(&self, identity: &Identity) -> Result<(), ApiError> {
        let url = self.url("/api/me");
        let request = self
            .client
            .delete(&url)
            .header("Authorization", identity.bearer());
        self.send(&url, request)?;
        Ok(())
    }

    fn fetch_profile(&self, device_id: &str) -> Result<Profile, ApiError> {
        self.get_json(&format!("/api/profile/{}", device_id))
    }
}

fn detail_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {}", body)
    }
}

/// Pulls `detail` out of a JSON error body, falling back to the raw text.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile() {
        let json = r#"{
            "character_name": "ByteKnight",
            "level": 3,
            "level_title": "Apprentice",
            "total_xp": 340,
            "xp_in_level": 40,
            "xp_to_next_level": 200,
            "current_streak": 2,
            "longest_streak": 5,
            "total_commits": 12,
            "total_test_passes": 7,
            "total_sessions": 9,
            "member_since": "2026-01-02T10:00:00Z",
            "quests": [
                {"id": "daily_commit", "name": "Ship It", "description": "Make a commit",
                 "type": "daily", "goal": 1, "current": 1, "completed": true, "xp_reward": 25},
                {"id": "century", "name": "Centurion", "description": "100 commits",
                 "type": "progressive", "goal": 100, "current": 12, "completed": false, "xp_reward": 500}
            ]
        }"#;

        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.character_name, "ByteKnight");
        assert_eq!(profile.level, 3);
        assert_eq!(profile.quests.len(), 2);
        assert!(profile.quests[0].is_daily());
        assert!(!profile.quests[1].is_daily());
        assert_eq!(profile.quests[1].current, 12);
    }

    #[test]
    fn test_parse_profile_missing_fields_default() {
        let profile: Profile = serde_json::from_str(r#"{"character_name": "New"}"#).unwrap();
        assert_eq!(profile.level, 0);
        assert_eq!(profile.total_xp, 0);
        assert!(profile.quests.is_empty());
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(error_detail(r#"{"detail": "Profile not found"}"#), "Profile not found");
        assert_eq!(error_detail("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_detail(""), "");
    }

    #[test]
    fn test_status_error_display() {
        let err = ApiError::Status {
            status: 404,
            body: "Profile not found".into(),
        };
        assert_eq!(err.to_string(), "HTTP 404: Profile not found");

        let err = ApiError::Status {
            status: 500,
            body: String::new(),
        };
        assert_eq!(err.to_string(), "HTTP 500");
    }

    #[test]
    fn test_http_service_trims_base() {
        let service = HttpService::new("http://localhost:8000/");
        assert_eq!(service.url("/api/me"), "http://localhost:8000/api/me");
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        // Port 9 (discard) on localhost is reliably closed in test environments.
        let service = HttpService::new("http://127.0.0.1:9");
        let err = service.fetch_profile("dev-1").unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }
}
