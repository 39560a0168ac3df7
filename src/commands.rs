//! CLI command flows.
//!
//! Each command reads local state, makes at most one remote call, then
//! rewrites local files as its last step. Remote calls always come first so
//! a failed registration never leaves hooks pointing at an unknown device.

use std::io::Write;

use anyhow::{bail, Context, Result};

use crate::api::{Profile, ProfileService};
use crate::config::{Config, Paths};
use crate::hooks::{
    desired_hooks, load_settings, merge_hooks, owned_groups, remove_owned_hooks, save_settings,
    OWNERSHIP_MARKER,
};
use crate::identity::Identity;

/// User interaction needed by the flows.
pub trait Prompter {
    /// Free-text answer, trimmed.
    fn input(&mut self, prompt: &str) -> Result<String>;
    /// Yes/no question defaulting to no.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// [`Prompter`] on the controlling terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str) -> Result<String> {
        let answer: String = dialoguer::Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .context("Failed to read answer")?;
        Ok(answer.trim().to_string())
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read answer")
    }
}

/// Runs commands against one set of local paths and one remote service.
pub struct Commands<S, P, W> {
    paths: Paths,
    config: Config,
    service: S,
    prompter: P,
    out: W,
}

impl<S: ProfileService, P: Prompter, W: Write> Commands<S, P, W> {
    pub fn new(paths: Paths, config: Config, service: S, prompter: P, out: W) -> Self {
        Self {
            paths,
            config,
            service,
            prompter,
            out,
        }
    }

    /// Consumes the runner and returns the output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Creates (or refreshes) the identity, registers it, and installs hooks.
    pub fn install(&mut self) -> Result<()> {
        writeln!(self.out, "\nGame of Claude installer\n")?;

        let existing = Identity::load(&self.paths.identity)?;
        if let Some(identity) = &existing {
            writeln!(self.out, "Already installed. Device: {}", identity.device_id)?;
            if !self.prompter.confirm("Re-install?")? {
                writeln!(self.out, "Cancelled.")?;
                return Ok(());
            }
        }

        let name = self
            .prompter
            .input("Choose your character name (e.g. \"ByteKnight\")")?;
        if name.is_empty() {
            bail!("Character name cannot be empty.");
        }

        let identity = match existing {
            Some(previous) => {
                Identity::with_device_id(previous.device_id, name, &self.config.api_base)
            }
            None => Identity::new(name, &self.config.api_base),
        };

        if !identity.api_base.contains(OWNERSHIP_MARKER) {
            tracing::warn!(
                api_base = %identity.api_base,
                marker = OWNERSHIP_MARKER,
                "API base does not contain the ownership marker; `stop` will not find these hooks"
            );
        }

        write!(self.out, "Registering... ")?;
        self.out.flush()?;
        self.service
            .register_device(&identity)
            .context("Failed to reach backend")?;
        writeln!(self.out, "done.")?;
        tracing::info!(device_id = %identity.device_id, "device registered");

        let mut settings = load_settings(&self.paths.settings)?.unwrap_or_default();
        let desired = desired_hooks(&identity.device_id, &identity.api_base);
        merge_hooks(&mut settings, &desired);
        save_settings(&self.paths.settings, &settings)?;
        tracing::info!(
            path = %self.paths.settings.display(),
            groups = desired.group_count(),
            "hooks installed"
        );

        identity.save(&self.paths.identity)?;

        writeln!(self.out, "\nYou're in the game, {}!", identity.character_name)?;
        writeln!(
            self.out,
            "\nDashboard: {}",
            self.config.dashboard_url(&identity.device_id)
        )?;
        writeln!(self.out, "   (bookmark this, it's your personal quest board)\n")?;
        Ok(())
    }

    /// Removes our hooks from the settings file. Server data is kept.
    pub fn stop(&mut self) -> Result<()> {
        let Some(mut settings) = load_settings(&self.paths.settings)? else {
            writeln!(self.out, "No Claude settings file found.")?;
            return Ok(());
        };

        if !settings.has_hooks() {
            writeln!(self.out, "No hooks found. Already stopped.")?;
            return Ok(());
        }

        let removed = remove_owned_hooks(&mut settings);
        if removed > 0 {
            save_settings(&self.paths.settings, &settings)?;
        }
        tracing::info!(removed, "hooks removed");

        writeln!(
            self.out,
            "Removed {} hook entries. Run `game-of-claude delete-data` to erase server data.",
            removed
        )?;
        Ok(())
    }

    /// Permanently deletes server data, then removes our hooks.
    ///
    /// The identity record is kept; a later `install` re-registers the same
    /// device id.
    pub fn delete_data(&mut self) -> Result<()> {
        let Some(identity) = Identity::load(&self.paths.identity)? else {
            writeln!(self.out, "Not installed. Nothing to delete.")?;
            return Ok(());
        };

        let answer = self.prompter.input(
            "This will permanently delete ALL your XP, quests, and stats. Type 'yes' to confirm",
        )?;
        if !answer.eq_ignore_ascii_case("yes") {
            writeln!(self.out, "Cancelled.")?;
            return Ok(());
        }

        write!(self.out, "Deleting data... ")?;
        self.out.flush()?;
        self.service
            .delete_profile(&identity)
            .context("Failed to delete data")?;
        writeln!(self.out, "done.")?;

        self.stop()?;

        writeln!(self.out, "\nAll data deleted. Thanks for playing.")?;
        Ok(())
    }

    /// Changes the display name remotely, then locally.
    pub fn rename(&mut self) -> Result<()> {
        let Some(identity) = Identity::load(&self.paths.identity)? else {
            writeln!(self.out, "Not installed. Run: game-of-claude install")?;
            return Ok(());
        };

        let name = self.prompter.input(&format!(
            "New character name (current: {})",
            identity.character_name
        ))?;
        if name.is_empty() {
            writeln!(self.out, "Cancelled.")?;
            return Ok(());
        }

        self.service
            .rename(&identity, &name)
            .context("Failed to rename character")?;
        identity.renamed(name.as_str()).save(&self.paths.identity)?;

        writeln!(self.out, "Character renamed to: {}", name)?;
        Ok(())
    }

    /// Prints the profile, daily quests and local hook state.
    pub fn status(&mut self, json: bool) -> Result<()> {
        let Some(identity) = Identity::load(&self.paths.identity)? else {
            writeln!(self.out, "Not installed. Run: game-of-claude install")?;
            return Ok(());
        };

        let profile = self
            .service
            .fetch_profile(&identity.device_id)
            .context("Could not reach backend")?;

        if json {
            writeln!(self.out, "{}", serde_json::to_string_pretty(&profile)?)?;
            return Ok(());
        }

        let hooks = match load_settings(&self.paths.settings) {
            Ok(Some(settings)) => HookState::Active(owned_groups(&settings).len()),
            Ok(None) => HookState::Active(0),
            Err(e) => {
                tracing::warn!(error = %e, "could not inspect settings");
                HookState::Unreadable
            }
        };

        let dashboard = self.config.dashboard_url(&identity.device_id);
        write!(self.out, "{}", render_status(&profile, hooks, &dashboard))?;
        Ok(())
    }
}

/// Local hook registration state shown by `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    /// Number of owned hook groups in the settings file
    Active(usize),
    Unreadable,
}

/// Renders `[█████░░░░░]` for `current` out of `goal`.
pub fn progress_bar(current: u64, goal: u64, width: usize) -> String {
    let filled = if goal == 0 {
        0
    } else {
        let ratio = current.min(goal) as f64 / goal as f64;
        ((ratio * width as f64).round() as usize).min(width)
    };
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

/// Text shown by `status`.
pub fn render_status(profile: &Profile, hooks: HookState, dashboard_url: &str) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}  -  Level {} {}\n",
        profile.character_name, profile.level, profile.level_title
    ));
    out.push_str(&format!(
        "XP  {} {}/{} to Level {}\n",
        progress_bar(profile.xp_in_level, profile.xp_to_next_level, 20),
        profile.xp_in_level,
        profile.xp_to_next_level,
        profile.level.saturating_add(1)
    ));
    out.push_str(&format!(
        "Streak: {} days  |  Commits: {}  |  Tests: {}\n\n",
        profile.current_streak, profile.total_commits, profile.total_test_passes
    ));

    let daily: Vec<_> = profile.quests.iter().filter(|q| q.is_daily()).collect();
    if !daily.is_empty() {
        out.push_str("Daily Quests:\n");
        for quest in daily {
            let done = if quest.completed { "[x]" } else { "[ ]" };
            out.push_str(&format!(
                "  {} {} {} - {}\n",
                done,
                progress_bar(quest.current, quest.goal, 10),
                quest.name,
                quest.description
            ));
        }
    }

    match hooks {
        HookState::Active(0) => out.push_str("\nHooks: not installed (run `game-of-claude install`)\n"),
        HookState::Active(n) => out.push_str(&format!("\nHooks: {} active\n", n)),
        HookState::Unreadable => out.push_str("\nHooks: settings file unreadable\n"),
    }

    out.push_str(&format!("\n{}\n", dashboard_url));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Quest;

    fn profile() -> Profile {
        Profile {
            character_name: "ByteKnight".into(),
            level: 3,
            level_title: "Apprentice".into(),
            total_xp: 340,
            xp_in_level: 50,
            xp_to_next_level: 200,
            current_streak: 4,
            longest_streak: 9,
            total_commits: 12,
            total_test_passes: 7,
            total_sessions: 20,
            quests: vec![
                Quest {
                    id: "daily_commit".into(),
                    name: "Ship It".into(),
                    description: "Make a commit".into(),
                    kind: "daily".into(),
                    goal: 1,
                    current: 1,
                    completed: true,
                    xp_reward: 25,
                },
                Quest {
                    id: "century".into(),
                    name: "Centurion".into(),
                    description: "100 commits".into(),
                    kind: "progressive".into(),
                    goal: 100,
                    current: 12,
                    completed: false,
                    xp_reward: 500,
                },
            ],
            member_since: String::new(),
        }
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0, 10, 4), "[░░░░]");
        assert_eq!(progress_bar(5, 10, 4), "[██░░]");
        assert_eq!(progress_bar(10, 10, 4), "[████]");
    }

    #[test]
    fn test_progress_bar_clamps_overflow() {
        assert_eq!(progress_bar(50, 10, 4), "[████]");
    }

    #[test]
    fn test_progress_bar_zero_goal_is_empty() {
        assert_eq!(progress_bar(3, 0, 4), "[░░░░]");
    }

    #[test]
    fn test_render_status() {
        let text = render_status(&profile(), HookState::Active(4), "https://d/dashboard?id=x");
        assert!(text.contains("ByteKnight  -  Level 3 Apprentice"));
        assert!(text.contains("50/200 to Level 4"));
        assert!(text.contains("Streak: 4 days  |  Commits: 12  |  Tests: 7"));
        assert!(text.contains("[x] [██████████] Ship It - Make a commit"));
        assert!(!text.contains("Centurion"));
        assert!(text.contains("Hooks: 4 active"));
        assert!(text.contains("https://d/dashboard?id=x"));
    }

    #[test]
    fn test_render_status_max_level_does_not_overflow() {
        let mut profile = profile();
        profile.level = u32::MAX;
        let text = render_status(&profile, HookState::Active(4), "url");
        assert!(text.contains(&format!("to Level {}", u32::MAX)));
    }

    #[test]
    fn test_render_status_without_hooks_or_daily_quests() {
        let mut profile = profile();
        profile.quests.clear();
        let text = render_status(&profile, HookState::Active(0), "url");
        assert!(!text.contains("Daily Quests"));
        assert!(text.contains("Hooks: not installed"));

        let text = render_status(&profile, HookState::Unreadable, "url");
        assert!(text.contains("settings file unreadable"));
    }
}
