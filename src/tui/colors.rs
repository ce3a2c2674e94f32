//! Color constants for the terminal user interface.

use ratatui::style::Color;

// These brand the three screen families: planner,
// project browsing, and quest detail.

/// Title bars and the dashboard accent.
pub const DEEP_PURPLE: Color = Color::Rgb(79, 70, 134);
/// Selected row highlight.
pub const RASPBERRY: Color = Color::Rgb(217, 3, 104);
/// Active form field border.
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Delete confirmation popup background.
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
