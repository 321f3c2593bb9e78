use ratatui::style::Color;

/// Theme configuration for the TUI
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: &'static str,
    pub bg: Color,
    pub fg: Color,
    /// Pad for the side that clicked last
    pub pad_active: Color,
    pub pad_idle: Color,
    pub label: Color,
    pub running: Color,
    pub warning: Color,
    pub border: Color,
    pub highlight: Color,
    pub dimmed: Color,
}

impl Theme {
    /// Default theme - uses terminal's ANSI colors
    pub fn default_theme() -> Self {
        Self {
            name: "default",
            bg: Color::Reset,
            fg: Color::Reset,
            pad_active: Color::Green,
            pad_idle: Color::DarkGray,
            label: Color::Cyan,
            running: Color::Red,
            warning: Color::Yellow,
            border: Color::White,
            highlight: Color::Magenta,
            dimmed: Color::DarkGray,
        }
    }

    /// Classic green CRT phosphor look
    pub fn phosphor_green() -> Self {
        Self {
            name: "phosphor-green",
            bg: Color::Black,
            fg: Color::Rgb(0, 255, 0),
            pad_active: Color::Rgb(0, 255, 0),
            pad_idle: Color::Rgb(0, 80, 0),
            label: Color::Rgb(0, 200, 0),
            running: Color::Rgb(0, 255, 0),
            warning: Color::Rgb(180, 255, 180),
            border: Color::Rgb(0, 180, 0),
            highlight: Color::Rgb(150, 255, 150),
            dimmed: Color::Rgb(0, 60, 0),
        }
    }

    /// Warm amber monochrome CRT
    pub fn amber_crt() -> Self {
        Self {
            name: "amber-crt",
            bg: Color::Black,
            fg: Color::Rgb(255, 176, 0),
            pad_active: Color::Rgb(255, 176, 0),
            pad_idle: Color::Rgb(80, 55, 0),
            label: Color::Rgb(200, 140, 0),
            running: Color::Rgb(255, 176, 0),
            warning: Color::Rgb(255, 220, 150),
            border: Color::Rgb(180, 125, 0),
            highlight: Color::Rgb(255, 220, 150),
            dimmed: Color::Rgb(60, 40, 0),
        }
    }

    /// Cool blue terminal tones
    pub fn blue_terminal() -> Self {
        Self {
            name: "blue-terminal",
            bg: Color::Black,
            fg: Color::Rgb(100, 180, 255),
            pad_active: Color::Rgb(100, 180, 255),
            pad_idle: Color::Rgb(30, 60, 100),
            label: Color::Rgb(80, 150, 220),
            running: Color::Rgb(100, 180, 255),
            warning: Color::Rgb(180, 220, 255),
            border: Color::Rgb(70, 130, 200),
            highlight: Color::Rgb(180, 220, 255),
            dimmed: Color::Rgb(25, 50, 80),
        }
    }

    /// Stark black and white high contrast
    pub fn high_contrast() -> Self {
        Self {
            name: "high-contrast",
            bg: Color::Black,
            fg: Color::White,
            pad_active: Color::White,
            pad_idle: Color::Rgb(60, 60, 60),
            label: Color::White,
            running: Color::White,
            warning: Color::White,
            border: Color::White,
            highlight: Color::White,
            dimmed: Color::Rgb(80, 80, 80),
        }
    }

    /// Get theme by name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default_theme()),
            "phosphor-green" => Some(Self::phosphor_green()),
            "amber-crt" => Some(Self::amber_crt()),
            "blue-terminal" => Some(Self::blue_terminal()),
            "high-contrast" => Some(Self::high_contrast()),
            _ => None,
        }
    }

    /// List all available theme names
    pub fn available_themes() -> &'static [&'static str] {
        &[
            "default",
            "phosphor-green",
            "amber-crt",
            "blue-terminal",
            "high-contrast",
        ]
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::default_theme()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_theme_resolves() {
        for name in Theme::available_themes() {
            let theme = Theme::from_name(name).unwrap();
            assert_eq!(theme.name, *name);
        }
        assert!(Theme::from_name("neon").is_none());
    }
}
