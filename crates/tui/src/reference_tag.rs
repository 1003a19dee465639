//! Inline rendering of reference tags.

use flowref_engine::ReferenceTag;
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::theme;

const ELLIPSIS: &str = "…";
const INVALID_MARKER: &str = "! ";
const STEP_SEPARATOR: &str = " / ";

/// Styled line for `tag`, at most `max_width` columns wide.
///
/// Invalid tags are prefixed with a marker and drawn in the warning color.
/// When the line does not fit, the step name is shortened first, then the
/// output name and remainder.
pub fn tag_line(tag: &ReferenceTag, max_width: usize) -> Line<'static> {
    let valid = tag.is_valid();
    let mut spans = Vec::new();
    if !valid {
        spans.push(Span::styled(INVALID_MARKER, theme::error_style()));
    }
    if let Some(badge) = tag.badge() {
        spans.push(Span::styled(format!("{badge} "), theme::badge_style(valid)));
    }

    let fixed_width: usize = spans.iter().map(|span| span.content.width()).sum();
    let output_label = format!("{}{}", tag.output_name, tag.suffix());
    let available = max_width.saturating_sub(fixed_width);
    let step_budget = available.saturating_sub(output_label.width());
    if !tag.step_name.is_empty() && step_budget > STEP_SEPARATOR.width() {
        let step_name = truncate_to_width(&tag.step_name, step_budget - STEP_SEPARATOR.width());
        spans.push(Span::styled(format!("{step_name}{STEP_SEPARATOR}"), theme::text_muted()));
    }
    spans.push(Span::styled(
        truncate_to_width(&output_label, available),
        theme::tag_style(valid, tag.editable),
    ));
    Line::from(spans)
}

/// Message line for an invalid tag, empty for valid ones.
pub fn issue_line(tag: &ReferenceTag) -> Line<'static> {
    match tag.issue {
        Some(issue) => Line::from(Span::styled(issue.message(), theme::error_style())),
        None => Line::default(),
    }
}

/// Shortens `text` to `max_width` columns, ending in an ellipsis when cut.
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let budget = max_width - ELLIPSIS.width();
    let mut used = 0;
    let mut shortened = String::new();
    for c in text.chars() {
        let width = c.width().unwrap_or(0);
        if used + width > budget {
            break;
        }
        used += width;
        shortened.push(c);
    }
    shortened.push_str(ELLIPSIS);
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowref_engine::ReferenceIssue;

    fn tag() -> ReferenceTag {
        ReferenceTag {
            token: "__2.rows.0".into(),
            ordinal: Some(3),
            icon: Some("python".into()),
            step_name: "Run python".into(),
            output_name: "rows".into(),
            remainder: "0".into(),
            issue: None,
            editable: true,
        }
    }

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn valid_tags_show_badge_step_output_and_suffix() {
        let line = tag_line(&tag(), 80);
        assert_eq!(text(&line), "3 Run python / rows.0");
        assert_eq!(line.spans[0].style, theme::badge_style(true));
        assert_eq!(line.spans.last().unwrap().style, theme::tag_style(true, true));
    }

    #[test]
    fn invalid_tags_are_marked() {
        let mut invalid = tag();
        invalid.issue = Some(ReferenceIssue::OutOfScope);
        let line = tag_line(&invalid, 80);
        assert_eq!(text(&line), "! 3 Run python / rows.0");
        assert_eq!(
            text(&issue_line(&invalid)),
            "cannot reference a variable from a later step; please reselect"
        );
        assert!(issue_line(&tag()).spans.is_empty());
    }

    #[test]
    fn narrow_widths_shorten_the_step_name_first() {
        let line = tag_line(&tag(), 14);
        assert_eq!(text(&line), "3 Ru… / rows.0");
        assert!(text(&line).width() <= 14);

        let tight = tag_line(&tag(), 6);
        assert_eq!(text(&tight), "3 row…");
    }

    #[test]
    fn truncation_respects_wide_characters() {
        assert_eq!(truncate_to_width("変数の値", 5), "変数…");
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("anything", 0), "");
    }
}
