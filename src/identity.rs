//! Local installation identity.
//!
//! Stored in `~/.claude/gamify.json`. Created once by `install`, read by
//! every command, and rewritten only by `install` and `rename`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::persist::{read_optional, write_json_atomic};

/// Record identifying this machine to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque device token, also used as the bearer credential
    pub device_id: String,
    /// Display name chosen by the user
    pub character_name: String,
    /// API endpoint the device was registered against
    pub api_base: String,
}

impl Identity {
    /// Creates an identity with a freshly generated device id.
    pub fn new(character_name: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self::with_device_id(generate_device_id(), character_name, api_base)
    }

    pub fn with_device_id(
        device_id: impl Into<String>,
        character_name: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            character_name: character_name.into(),
            api_base: api_base.into(),
        }
    }

    /// Returns a copy with a new display name. The device id is unchanged.
    pub fn renamed(&self, character_name: impl Into<String>) -> Self {
        Self {
            character_name: character_name.into(),
            ..self.clone()
        }
    }

    /// `Authorization` header value for authenticated API calls.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.device_id)
    }

    /// Loads the identity, returning `None` if no installation exists.
    ///
    /// An unreadable or unparseable file is an error; callers must not
    /// overwrite it silently.
    pub fn load(path: &Path) -> Result<Option<Identity>> {
        let Some(contents) = read_optional(path)? else {
            return Ok(None);
        };
        let identity: Identity = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse identity file: {:?}", path))?;
        if identity.device_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(identity))
    }

    /// Writes the identity file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}

/// Generates a new random device id (UUID v4).
pub fn generate_device_id() -> String {
    Uuid::new_v4().to_string()
}
