//! Theme and styling for the flowref terminal views.
//!
//! Dark palette with a blue accent; reference tags switch to the warning
//! color when the reference they show is not usable.

use ratatui::style::{Color, Modifier, Style};

/// Accent color for badges, highlights and focus indicators.
pub const ACCENT: Color = Color::Rgb(8, 171, 237);

/// Primary foreground color for normal text.
pub const FG: Color = Color::Rgb(224, 224, 230);

/// Muted foreground color for labels, hints and remainders.
pub const FG_MUTED: Color = Color::Rgb(168, 168, 175);

/// Default border color.
pub const BORDER: Color = Color::Rgb(72, 72, 80);

/// Focused border color.
pub const BORDER_FOCUS: Color = ACCENT;

/// Background of the focused input row.
pub const BG_HIGHLIGHT: Color = Color::Rgb(20, 32, 44);

/// Warning color for invalid references and validation errors.
pub const WARN: Color = Color::Rgb(220, 96, 110);

/// Creates a border style based on focus state.
pub fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(BORDER_FOCUS)
    } else {
        Style::default().fg(BORDER)
    }
}

/// Titles and fixed labels.
pub fn title_style() -> Style {
    Style::default().fg(FG_MUTED).add_modifier(Modifier::BOLD)
}

pub fn text_style() -> Style {
    Style::default().fg(FG)
}

pub fn text_muted() -> Style {
    Style::default().fg(FG_MUTED)
}

/// Focused input rows keep a subtle background hint.
pub fn highlight_style() -> Style {
    Style::default().fg(FG).bg(BG_HIGHLIGHT)
}

/// Step badge of a reference tag.
pub fn badge_style(valid: bool) -> Style {
    let color = if valid { ACCENT } else { WARN };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Output name of a reference tag; editable tags are underlined.
pub fn tag_style(valid: bool, editable: bool) -> Style {
    let style = if valid { text_style() } else { Style::default().fg(WARN) };
    if editable { style.add_modifier(Modifier::UNDERLINED) } else { style }
}

pub fn error_style() -> Style {
    Style::default().fg(WARN)
}
