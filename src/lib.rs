pub mod api;
pub mod commands;
pub mod config;
pub mod hooks;
pub mod identity;
pub mod logging;
pub mod persist;

pub use api::{ApiError, HttpService, Profile, ProfileService, Quest};
pub use commands::{Commands, Prompter, TerminalPrompter};
pub use config::{Config, Paths};
pub use hooks::{
    desired_hooks, merge_hooks, remove_owned_hooks, Hook, HookGroup, HookMap, SettingsDocument,
    OWNERSHIP_MARKER,
};
pub use identity::Identity;
