//! # Output Configuration
//!
//! Utilities for controlling how the CLI renders reports, based on terminal
//! capabilities and user preferences.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use profile_fragments::output::{outcome_marker, OutputConfig};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! println!("{} git", outcome_marker(&config, &LoadOutcome::Loaded));
//! ```

use std::env;
use std::time::Duration;

use console::style;

use crate::fragment::FragmentStatus;
use crate::phases::loading::LoadOutcome;

/// Output configuration for controlling colors.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// - `always`: Force colors on (overrides NO_COLOR)
    /// - `never`: Force colors off
    /// - `auto`: Detect based on environment
    ///
    /// In auto mode, colors are disabled if `NO_COLOR` is set, `CLICOLOR=0`,
    /// `TERM=dumb`, or stdout is not a TTY (unless `CLICOLOR_FORCE=1`).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // Presence alone disables colors, even if empty
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Fixed-width marker for a load outcome: `[ok]`, `[skip]` or `[FAIL]`.
pub fn outcome_marker(config: &OutputConfig, outcome: &LoadOutcome) -> String {
    let (text, color) = match outcome {
        LoadOutcome::Loaded => ("[ok]  ", Color::Green),
        LoadOutcome::Skipped => ("[skip]", Color::Dim),
        LoadOutcome::Failed(_) => ("[FAIL]", Color::Red),
    };
    paint(config, text, color)
}

/// Status label as shown by `which` and `plan`.
pub fn status_label(config: &OutputConfig, status: FragmentStatus) -> String {
    let color = match status {
        FragmentStatus::Loaded => Color::Green,
        FragmentStatus::Failed => Color::Red,
        FragmentStatus::Loading => Color::Yellow,
        FragmentStatus::Unloaded => Color::Dim,
    };
    paint(config, &status.to_string(), color)
}

/// A warning line prefix.
pub fn warning_prefix(config: &OutputConfig) -> String {
    paint(config, "warning:", Color::Yellow)
}

/// Render a duration in milliseconds with two decimals.
pub fn millis(duration: Duration) -> String {
    format!("{:.2}ms", duration.as_secs_f64() * 1000.0)
}

#[derive(Debug, Clone, Copy)]
enum Color {
    Green,
    Red,
    Yellow,
    Dim,
}

fn paint(config: &OutputConfig, text: &str, color: Color) -> String {
    if !config.use_color {
        return text.to_string();
    }
    let styled = style(text).force_styling(true);
    let styled = match color {
        Color::Green => styled.green(),
        Color::Red => styled.red().bold(),
        Color::Yellow => styled.yellow(),
        Color::Dim => styled.dim(),
    };
    styled.to_string()
}
