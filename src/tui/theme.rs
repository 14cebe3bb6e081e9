//! Color themes for the terminal UI.
//!
//! Built-ins: default, dracula, nord, gruvbox, monochrome. Selected with
//! `--theme` or cycled with Ctrl+T; the last one is saved to prefs.

use ratatui::style::Color;
use std::borrow::Cow;

use webtrace::state::{RowState, Status};

/// All themeable colors in the application
#[derive(Clone, Debug)]
pub struct Theme {
    name: Cow<'static, str>,

    // UI chrome
    pub border: Color,
    pub text: Color,
    pub text_dim: Color,

    // Status and loss
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    /// Hops the backend has hidden
    pub stale: Color,

    // Accents
    pub shortcut: Color,
    pub header: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::default_theme()
    }
}

impl Theme {
    pub fn default_theme() -> Self {
        Self {
            name: Cow::Borrowed("default"),
            border: Color::Cyan,
            text: Color::White,
            text_dim: Color::Gray,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            stale: Color::DarkGray,
            shortcut: Color::Yellow,
            header: Color::Cyan,
        }
    }

    pub fn dracula() -> Self {
        Self {
            name: Cow::Borrowed("dracula"),
            border: Color::Rgb(189, 147, 249),
            text: Color::Rgb(248, 248, 242),
            text_dim: Color::Rgb(98, 114, 164),
            success: Color::Rgb(80, 250, 123),
            warning: Color::Rgb(255, 184, 108),
            error: Color::Rgb(255, 85, 85),
            stale: Color::Rgb(98, 114, 164),
            shortcut: Color::Rgb(241, 250, 140),
            header: Color::Rgb(255, 121, 198),
        }
    }

    pub fn nord() -> Self {
        Self {
            name: Cow::Borrowed("nord"),
            border: Color::Rgb(136, 192, 208),
            text: Color::Rgb(236, 239, 244),
            text_dim: Color::Rgb(129, 161, 193),
            success: Color::Rgb(163, 190, 140),
            warning: Color::Rgb(235, 203, 139),
            error: Color::Rgb(191, 97, 106),
            stale: Color::Rgb(76, 86, 106),
            shortcut: Color::Rgb(235, 203, 139),
            header: Color::Rgb(136, 192, 208),
        }
    }

    pub fn gruvbox() -> Self {
        Self {
            name: Cow::Borrowed("gruvbox"),
            border: Color::Rgb(254, 128, 25),
            text: Color::Rgb(235, 219, 178),
            text_dim: Color::Rgb(168, 153, 132),
            success: Color::Rgb(184, 187, 38),
            warning: Color::Rgb(250, 189, 47),
            error: Color::Rgb(251, 73, 52),
            stale: Color::Rgb(124, 111, 100),
            shortcut: Color::Rgb(250, 189, 47),
            header: Color::Rgb(254, 128, 25),
        }
    }

    /// Grayscale; failures in plain white so they still stand out
    pub fn monochrome() -> Self {
        Self {
            name: Cow::Borrowed("monochrome"),
            border: Color::Rgb(200, 200, 200),
            text: Color::Rgb(230, 230, 230),
            text_dim: Color::Rgb(150, 150, 150),
            success: Color::Rgb(190, 190, 190),
            warning: Color::Rgb(170, 170, 170),
            error: Color::Rgb(255, 255, 255),
            stale: Color::Rgb(90, 90, 90),
            shortcut: Color::Rgb(210, 210, 210),
            header: Color::Rgb(255, 255, 255),
        }
    }

    /// Get a theme by name
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "dracula" => Self::dracula(),
            "nord" => Self::nord(),
            "gruvbox" => Self::gruvbox(),
            "monochrome" | "mono" => Self::monochrome(),
            _ => Self::default_theme(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// List all available theme names
    pub fn list() -> &'static [&'static str] {
        &["default", "dracula", "nord", "gruvbox", "monochrome"]
    }

    /// Color for the status line
    pub fn status_color(&self, status: Status) -> Color {
        match status {
            Status::Working => self.shortcut,
            Status::Finished => self.success,
            Status::Timeout => self.warning,
            Status::Error | Status::Aborted => self.error,
        }
    }

    /// Color for a formatted loss cell such as `12.5%`
    pub fn loss_color(&self, loss: &str) -> Color {
        match loss.trim_end_matches('%').parse::<f64>() {
            Ok(pct) if pct > 50.0 => self.error,
            Ok(pct) if pct > 10.0 => self.warning,
            Ok(_) => self.success,
            Err(_) => self.text_dim,
        }
    }

    /// Foreground for a whole hop row
    pub fn row_color(&self, state: RowState) -> Color {
        match state {
            RowState::Live => self.text,
            RowState::Stale => self.stale,
            RowState::Unknown => self.text_dim,
        }
    }
}
