//! Claude Code hook registration.
//!
//! The settings file (`~/.claude/settings.json`) belongs to Claude Code and
//! may hold arbitrary user configuration. We only ever touch the hook
//! groups we own, and ownership is decided by a substring of the hook URL:
//! the settings schema has no room for a provenance field.
//!
//! Layout of the relevant part of the document:
//!
//! ```json
//! {
//!   "hooks": {
//!     "PostToolUse": [
//!       { "matcher": "Bash", "hooks": [{ "type": "http", "url": "...", "headers": {}, "async": true }] }
//!     ]
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::persist::{read_optional, write_json_atomic};

/// Any hook whose URL contains this is ours.
///
/// Third-party hooks pointing at a URL with this fragment would be
/// treated as ours too. Accepted limitation.
pub const OWNERSHIP_MARKER: &str = "gameofclaude.dev";

/// Path of the event ingestion endpoint, relative to the API base.
pub const EVENTS_PATH: &str = "/api/events";

const HOOKS_KEY: &str = "hooks";

/// A single hook callback as Claude Code stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    /// Transport, e.g. `"http"`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(rename = "async", default)]
    pub is_async: bool,
}

impl Hook {
    #[cfg(test)]
    pub(crate) fn is_owned(&self) -> bool {
        self.url.contains(OWNERSHIP_MARKER)
    }

    fn to_value(&self) -> Value {
        let headers: Map<String, Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        let mut obj = Map::new();
        obj.insert("type".into(), Value::String(self.kind.clone()));
        obj.insert("url".into(), Value::String(self.url.clone()));
        obj.insert("headers".into(), Value::Object(headers));
        obj.insert("async".into(), Value::Bool(self.is_async));
        Value::Object(obj)
    }
}

/// Hooks sharing one optional matcher under an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    #[serde(default)]
    pub hooks: Vec<Hook>,
}

impl HookGroup {
    pub fn new(matcher: Option<&str>, hooks: Vec<Hook>) -> Self {
        Self {
            matcher: matcher.map(str::to_string),
            hooks,
        }
    }

    fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(matcher) = &self.matcher {
            obj.insert("matcher".into(), Value::String(matcher.clone()));
        }
        obj.insert(
            HOOKS_KEY.into(),
            Value::Array(self.hooks.iter().map(Hook::to_value).collect()),
        );
        Value::Object(obj)
    }
}

/// Event name → hook groups, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookMap {
    events: Vec<(String, Vec<HookGroup>)>,
}

impl HookMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds groups for an event, appending to any already present.
    pub fn with(mut self, event: &str, groups: Vec<HookGroup>) -> Self {
        match self.events.iter_mut().find(|(name, _)| name == event) {
            Some((_, existing)) => existing.extend(groups),
            None => self.events.push((event.to_string(), groups)),
        }
        self
    }

    #[cfg(test)]
    pub(crate) fn get(&self, event: &str) -> Option<&[HookGroup]> {
        self.events
            .iter()
            .find(|(name, _)| name == event)
            .map(|(_, groups)| groups.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[HookGroup])> {
        self.events
            .iter()
            .map(|(name, groups)| (name.as_str(), groups.as_slice()))
    }

    pub fn group_count(&self) -> usize {
        self.events.iter().map(|(_, groups)| groups.len()).sum()
    }
}

/// URL the registered hooks post events to.
pub fn events_url(api_base: &str) -> String {
    format!("{}{}", api_base.trim_end_matches('/'), EVENTS_PATH)
}

/// The hook groups this tool registers for a device.
///
/// One HTTP hook per monitored event category, authenticated with the
/// device id as a bearer token.
pub fn desired_hooks(device_id: &str, api_base: &str) -> HookMap {
    let hook = Hook {
        kind: "http".to_string(),
        url: events_url(api_base),
        headers: BTreeMap::from([(
            "Authorization".to_string(),
            format!("Bearer {}", device_id),
        )]),
        is_async: true,
    };

    HookMap::new()
        .with("SessionStart", vec![HookGroup::new(None, vec![hook.clone()])])
        .with("SessionEnd", vec![HookGroup::new(None, vec![hook.clone()])])
        .with(
            "PostToolUse",
            vec![
                HookGroup::new(Some("Bash"), vec![hook.clone()]),
                HookGroup::new(Some("Edit|Write"), vec![hook]),
            ],
        )
}

/// True if a raw hook entry has a string `url` containing the marker.
pub fn is_owned_hook(hook: &Value) -> bool {
    hook.get("url")
        .and_then(Value::as_str)
        .is_some_and(|url| url.contains(OWNERSHIP_MARKER))
}

/// True if any hook inside a raw hook group is owned.
///
/// Ownership is decided per group: a foreign hook sharing a group with one
/// of ours goes wherever the group goes.
pub fn is_owned_group(group: &Value) -> bool {
    group
        .get(HOOKS_KEY)
        .and_then(Value::as_array)
        .is_some_and(|hooks| hooks.iter().any(is_owned_hook))
}

/// Structural problems in a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("settings is not a JSON object")]
    NotAnObject,
    #[error("settings \"hooks\" is not an object")]
    HooksNotAnObject,
    #[error("settings hooks for \"{0}\" is not an array")]
    EventNotAnArray(String),
}

/// Parsed Claude Code settings.
///
/// Everything except the `hooks` mapping is opaque and round-trips
/// unchanged, key order included.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SettingsDocument {
    root: Map<String, Value>,
}

impl SettingsDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Validates the shape of the document.
    ///
    /// Only the parts we rewrite are checked: `hooks` must be an object and
    /// each event under it an array.
    pub fn from_value(value: Value) -> Result<Self, SettingsError> {
        let Value::Object(root) = value else {
            return Err(SettingsError::NotAnObject);
        };

        if let Some(hooks) = root.get(HOOKS_KEY) {
            let hooks = hooks.as_object().ok_or(SettingsError::HooksNotAnObject)?;
            if let Some((event, _)) = hooks.iter().find(|(_, groups)| !groups.is_array()) {
                return Err(SettingsError::EventNotAnArray(event.clone()));
            }
        }

        Ok(Self { root })
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    pub fn has_hooks(&self) -> bool {
        self.root.contains_key(HOOKS_KEY)
    }

    /// Groups registered for an event, if any.
    #[cfg(test)]
    pub(crate) fn event_groups(&self, event: &str) -> Option<&Vec<Value>> {
        self.root
            .get(HOOKS_KEY)?
            .get(event)?
            .as_array()
    }

    fn hooks_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.root
            .entry(HOOKS_KEY)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
    }
}

/// Installs `desired` into `doc`, replacing any groups we registered before.
///
/// For every event in `desired`, owned groups are dropped from the existing
/// sequence and the desired groups are appended after what remains. Events
/// not in `desired` are left alone. Running this twice is the same as
/// running it once.
pub fn merge_hooks(doc: &mut SettingsDocument, desired: &HookMap) {
    let Some(hooks) = doc.hooks_mut() else {
        return;
    };

    for (event, groups) in desired.iter() {
        let slot = hooks
            .entry(event)
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(seq) = slot {
            seq.retain(|group| !is_owned_group(group));
            seq.extend(groups.iter().map(HookGroup::to_value));
        }
    }
}

/// Removes every owned group and returns how many were removed.
///
/// When anything was removed, every event left with no groups is deleted,
/// and so is `hooks` if nothing is left in it. A document with nothing to
/// remove is not modified.
pub fn remove_owned_hooks(doc: &mut SettingsDocument) -> usize {
    let Some(Value::Object(hooks)) = doc.root.get_mut(HOOKS_KEY) else {
        return 0;
    };

    let mut removed = 0;
    for groups in hooks.values_mut() {
        if let Value::Array(seq) = groups {
            let before = seq.len();
            seq.retain(|group| !is_owned_group(group));
            removed += before - seq.len();
        }
    }

    if removed == 0 {
        return 0;
    }

    hooks.retain(|_event, groups| groups.as_array().map_or(true, |seq| !seq.is_empty()));
    if hooks.is_empty() {
        doc.root.shift_remove(HOOKS_KEY);
    }

    removed
}

/// Owned groups currently registered, with their event names.
///
/// Groups that don't match the typed hook layout are skipped.
pub fn owned_groups(doc: &SettingsDocument) -> Vec<(String, HookGroup)> {
    let Some(Value::Object(hooks)) = doc.root.get(HOOKS_KEY) else {
        return Vec::new();
    };

    hooks
        .iter()
        .filter_map(|(event, groups)| Some((event, groups.as_array()?)))
        .flat_map(|(event, groups)| {
            groups
                .iter()
                .filter(|group| is_owned_group(group))
                .filter_map(|group| serde_json::from_value::<HookGroup>(group.clone()).ok())
                .map(move |group| (event.clone(), group))
        })
        .collect()
}

/// Loads the settings file, returning `None` if it does not exist.
pub fn load_settings(path: &Path) -> Result<Option<SettingsDocument>> {
    let Some(contents) = read_optional(path)? else {
        return Ok(None);
    };
    let doc = SettingsDocument::from_json(&contents)
        .with_context(|| format!("Could not parse {}", path.display()))?;
    Ok(Some(doc))
}

/// Overwrites the settings file with `doc`.
pub fn save_settings(path: &Path, doc: &SettingsDocument) -> Result<()> {
    write_json_atomic(path, doc)
}
