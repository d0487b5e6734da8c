//! Color palette and style helpers for the dashboard TUI.

use ratatui::style::{Color, Modifier, Style};

use pupdash_core::model::{LogLevel, ProcessStatus};

/// Color palette tokens for the theme
#[derive(Clone, Debug)]
pub struct Palette {
    /// Panel border color
    pub panel_border: Color,
    /// Primary text color
    pub text: Color,
    /// Dimmed text (secondary info)
    pub text_dim: Color,
    /// Muted text (timestamps, placeholders)
    pub text_muted: Color,
    /// Accent color (highlights, focus)
    pub accent: Color,
    /// Running, info
    pub success: Color,
    /// Paused, warnings, busy controls
    pub warn: Color,
    pub error: Color,
    pub info: Color,
    /// Debug lines
    pub debug: Color,
    /// Key hint text
    pub key_hint: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self::dark()
    }
}

impl Palette {
    /// VS Code-esque dark theme
    pub fn dark() -> Self {
        Self {
            panel_border: Color::Rgb(60, 60, 60),
            text: Color::Rgb(212, 212, 212),
            text_dim: Color::Rgb(150, 150, 150),
            text_muted: Color::Rgb(100, 100, 100),
            accent: Color::Rgb(79, 193, 255),  // Light blue
            success: Color::Rgb(78, 201, 176), // Teal green
            warn: Color::Rgb(220, 180, 100),   // Amber
            error: Color::Rgb(244, 135, 113),  // Coral red
            info: Color::Rgb(156, 220, 254),   // Light cyan
            debug: Color::Rgb(181, 137, 214),  // Lavender
            key_hint: Color::Rgb(206, 145, 120), // Soft orange
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Theme {
    pub palette: Palette,
}

impl Theme {
    pub fn status_style(&self, status: &ProcessStatus) -> Style {
        let color = match status {
            ProcessStatus::Running => self.palette.success,
            ProcessStatus::Paused => self.palette.warn,
            ProcessStatus::Stopped => self.palette.text_muted,
            ProcessStatus::Unknown => self.palette.error,
        };
        Style::default().fg(color)
    }

    pub fn status_icon(&self, status: &ProcessStatus) -> &'static str {
        match status {
            ProcessStatus::Running => "●",
            ProcessStatus::Paused => "◐",
            ProcessStatus::Stopped => "○",
            ProcessStatus::Unknown => "?",
        }
    }

    /// Log level badge style, matching the web dashboard's level colors.
    pub fn level_style(&self, level: &LogLevel) -> Style {
        let color = match level {
            LogLevel::Debug => self.palette.debug,
            LogLevel::Info => self.palette.info,
            LogLevel::Warn => self.palette.warn,
            LogLevel::Error => self.palette.error,
            LogLevel::Other(_) => self.palette.text_dim,
        };
        let style = Style::default().fg(color);
        if matches!(level, LogLevel::Error) {
            style.add_modifier(Modifier::BOLD)
        } else {
            style
        }
    }

    fn fg(&self, color: Color) -> Style {
        Style::default().fg(color)
    }
}

static DEFAULT_THEME: std::sync::OnceLock<Theme> = std::sync::OnceLock::new();

pub fn theme() -> &'static Theme {
    DEFAULT_THEME.get_or_init(Theme::default)
}

/// Shorthands over the default theme
pub mod styles {
    use super::*;

    pub fn status(status: &ProcessStatus) -> Style {
        theme().status_style(status)
    }

    pub fn status_icon(status: &ProcessStatus) -> &'static str {
        theme().status_icon(status)
    }

    pub fn level(level: &LogLevel) -> Style {
        theme().level_style(level)
    }

    pub fn key_hint() -> Style {
        let t = theme();
        t.fg(t.palette.key_hint)
    }

    pub fn border_subtle() -> Style {
        let t = theme();
        t.fg(t.palette.panel_border)
    }

    pub fn border_focused() -> Style {
        let t = theme();
        t.fg(t.palette.accent)
    }

    pub fn text() -> Style {
        let t = theme();
        t.fg(t.palette.text)
    }

    pub fn text_dim() -> Style {
        let t = theme();
        t.fg(t.palette.text_dim)
    }

    pub fn text_muted() -> Style {
        let t = theme();
        t.fg(t.palette.text_muted)
    }

    pub fn accent() -> Style {
        let t = theme();
        t.fg(t.palette.accent)
    }

    pub fn accent_bold() -> Style {
        accent().add_modifier(Modifier::BOLD)
    }

    pub fn success() -> Style {
        let t = theme();
        t.fg(t.palette.success)
    }

    pub fn warn() -> Style {
        let t = theme();
        t.fg(t.palette.warn)
    }

    pub fn info() -> Style {
        let t = theme();
        t.fg(t.palette.info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_level_is_bold() {
        let style = styles::level(&LogLevel::Error);
        assert!(style.add_modifier.contains(Modifier::BOLD));
        assert!(!styles::level(&LogLevel::Info).add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_every_status_has_distinct_icon() {
        let icons: std::collections::BTreeSet<_> = [
            ProcessStatus::Running,
            ProcessStatus::Paused,
            ProcessStatus::Stopped,
            ProcessStatus::Unknown,
        ]
        .iter()
        .map(styles::status_icon)
        .collect();
        assert_eq!(icons.len(), 4);
    }
}
