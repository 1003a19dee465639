//! Remainder editor modal.
//!
//! The modal wraps a [`ReferenceField`] in editing mode. Keys edit the
//! nested path; Enter confirms through the field (an empty path keeps the
//! modal open with an error), Esc cancels and leaves the value untouched.
//! When opened for a step, the header shows the reference tag as the field
//! would, following the draft as it changes.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use flowref_engine::{
    ExecutionOrder, FieldChange, FieldError, ReferenceField, ReferenceTag, ScopeRules, StepGraph, Translate, render_step_tag,
};
use flowref_types::OutputRegistry;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::prelude::CrosstermBackend;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Widget};
use ratatui::{Frame, Terminal};
use serde_json::Value;
use tracing::debug;

use crate::reference_tag::{issue_line, tag_line};
use crate::remainder_input::RemainderInput;
use crate::theme;

const MODAL_WIDTH: u16 = 60;
const MODAL_HEIGHT: u16 = 8;
const PLACEHOLDER: &str = "nested path, e.g. 0.name";

/// Result of feeding one key to the modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorOutcome {
    Pending,
    Confirmed(FieldChange),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct VariableEditorModal {
    field: ReferenceField,
    input: RemainderInput,
    error: Option<String>,
    tag: Option<ReferenceTag>,
}

impl VariableEditorModal {
    /// Opens the editor for `value`. Fails for literals, unresolved
    /// references and non-container outputs.
    pub fn open(value: Value, registry: &OutputRegistry, translator: &dyn Translate) -> Result<Self, FieldError> {
        let mut field = ReferenceField::new(value);
        let draft = field.begin_edit(registry, translator)?.draft().to_string();
        Ok(Self {
            field,
            input: RemainderInput::new(draft),
            error: None,
            tag: None,
        })
    }

    /// Opens the editor for a field of `scope_step_id`, with the field's tag
    /// in the header.
    pub fn for_step(
        value: Value,
        graph: &StepGraph,
        scope_step_id: &str,
        rules: &dyn ScopeRules,
        translator: &dyn Translate,
    ) -> Result<Self, FieldError> {
        let tag = render_step_tag(&value, scope_step_id, graph, rules, translator);
        let mut modal = Self::open(value, graph.outputs(), translator)?;
        modal.tag = tag;
        Ok(modal)
    }

    pub fn tag(&self) -> Option<&ReferenceTag> {
        self.tag.as_ref()
    }

    pub fn input(&self) -> &RemainderInput {
        &self.input
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn label(&self) -> String {
        self.field.editor().map(|editor| editor.label()).unwrap_or_default()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> EditorOutcome {
        if key.kind != KeyEventKind::Press {
            return EditorOutcome::Pending;
        }
        match key.code {
            KeyCode::Esc => {
                self.field.cancel_edit();
                return EditorOutcome::Cancelled;
            }
            KeyCode::Enter => return self.confirm(),
            KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => self.input.delete_segment(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.input.insert_char(c),
            KeyCode::Backspace => self.input.backspace(),
            KeyCode::Delete => self.input.delete(),
            KeyCode::Left => self.input.move_left(),
            KeyCode::Right => self.input.move_right(),
            KeyCode::Home => self.input.move_home(),
            KeyCode::End => self.input.move_end(),
            _ => return EditorOutcome::Pending,
        }
        self.error = None;
        if let Some(editor) = self.field.editor_mut() {
            editor.set_draft(self.input.input());
        }
        if let Some(tag) = self.tag.as_mut() {
            tag.remainder = self.input.input().trim().to_string();
        }
        EditorOutcome::Pending
    }

    fn confirm(&mut self) -> EditorOutcome {
        match self.field.confirm_edit() {
            Ok(change) => EditorOutcome::Confirmed(change),
            Err(error) => {
                debug!(%error, "Remainder edit rejected");
                self.error = Some(error.to_string());
                EditorOutcome::Pending
            }
        }
    }

    /// Centered modal area inside `area`.
    pub fn modal_area(area: Rect) -> Rect {
        let width = MODAL_WIDTH.min(area.width);
        let height = MODAL_HEIGHT.min(area.height);
        Rect::new(
            area.x + (area.width - width) / 2,
            area.y + (area.height - height) / 2,
            width,
            height,
        )
    }

    /// Terminal cursor position for a modal drawn in `area`.
    pub fn cursor_position(&self, area: Rect) -> Position {
        let [_, _, _, input_row, ..] = Self::rows(Self::modal_area(area));
        let column = (self.input.cursor_column() as u16).min(input_row.width.saturating_sub(1));
        Position::new(input_row.x + column, input_row.y)
    }

    /// Tag, issue, label, input, message and hint rows.
    fn rows(modal: Rect) -> [Rect; 6] {
        let inner = Block::default().borders(Borders::ALL).inner(modal);
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .areas(inner)
    }
}

impl Widget for &VariableEditorModal {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let modal = VariableEditorModal::modal_area(area);
        Clear.render(modal, buf);
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme::border_style(true))
            .title(Line::from(Span::styled(" Edit variable path ", theme::title_style())))
            .render(modal, buf);

        let [tag_row, issue_row, label_row, input_row, message_row, hint_row] = VariableEditorModal::rows(modal);
        if let Some(tag) = &self.tag {
            Paragraph::new(tag_line(tag, tag_row.width as usize)).render(tag_row, buf);
            Paragraph::new(issue_line(tag)).render(issue_row, buf);
        }
        Paragraph::new(Line::from(Span::styled(self.label(), theme::text_muted()))).render(label_row, buf);
        let input_line = if self.input.is_empty() {
            Line::from(Span::styled(PLACEHOLDER, theme::text_muted()))
        } else {
            Line::from(Span::styled(self.input.input().to_string(), theme::highlight_style()))
        };
        Paragraph::new(input_line).style(theme::highlight_style()).render(input_row, buf);
        if let Some(error) = &self.error {
            Paragraph::new(Line::from(Span::styled(error.clone(), theme::error_style()))).render(message_row, buf);
        }
        Paragraph::new(Line::from(vec![
            Span::styled("Enter", theme::title_style()),
            Span::styled(" confirm  ", theme::text_muted()),
            Span::styled("Esc", theme::title_style()),
            Span::styled(" cancel  ", theme::text_muted()),
            Span::styled("Ctrl+W", theme::title_style()),
            Span::styled(" drop segment", theme::text_muted()),
        ]))
        .render(hint_row, buf);
    }
}

/// Runs the modal full screen for a field of `scope_step_id` until the user
/// confirms or cancels.
///
/// Returns the new encoded value, or `None` when cancelled.
pub fn run_editor(value: Value, graph: &StepGraph, scope_step_id: &str, translator: &dyn Translate) -> Result<Option<String>> {
    let mut modal = VariableEditorModal::for_step(value, graph, scope_step_id, &ExecutionOrder, translator)?;
    let mut terminal = setup_terminal()?;
    let outcome = event_loop(&mut terminal, &mut modal);
    cleanup_terminal(&mut terminal)?;
    match outcome? {
        EditorOutcome::Confirmed(change) => Ok(Some(change.value)),
        EditorOutcome::Cancelled | EditorOutcome::Pending => Ok(None),
    }
}

fn event_loop(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, modal: &mut VariableEditorModal) -> Result<EditorOutcome> {
    loop {
        terminal.draw(|frame| draw(frame, modal))?;
        if let Event::Key(key) = event::read()? {
            match modal.handle_key(key) {
                EditorOutcome::Pending => continue,
                outcome => return Ok(outcome),
            }
        }
    }
}

fn draw(frame: &mut Frame, modal: &VariableEditorModal) {
    let area = frame.area();
    frame.render_widget(modal, area);
    frame.set_cursor_position(modal.cursor_position(area));
}

/// Put the terminal into raw mode and enter the alternate screen.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<std::io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal settings and leave the alternate screen.
fn cleanup_terminal(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowref_engine::{ActionCatalog, EditorError, IdentityTranslator, ReferenceIssue};
    use flowref_types::{FlowDocument, StepOutputDescriptor};
    use serde_json::json;

    fn registry() -> OutputRegistry {
        OutputRegistry::from_entries([
            ("__2.rows", StepOutputDescriptor::custom(".rows", "rows", "array")),
            ("__3.text", StepOutputDescriptor::new(".text", "EATextJoinOutputText", "string")),
        ])
        .unwrap()
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn row(buf: &Buffer, y: u16) -> String {
        (buf.area.x..buf.area.x + buf.area.width).map(|x| buf[(x, y)].symbol()).collect()
    }

    #[test]
    fn typing_and_confirming_emits_the_new_value() {
        let mut modal = VariableEditorModal::open(json!("{{__2.rows.0}}"), &registry(), &IdentityTranslator).unwrap();
        assert_eq!(modal.input().input(), "0");
        for c in ".name".chars() {
            assert_eq!(modal.handle_key(press(KeyCode::Char(c))), EditorOutcome::Pending);
        }
        assert_eq!(
            modal.handle_key(press(KeyCode::Enter)),
            EditorOutcome::Confirmed(FieldChange {
                value: "{{__2.rows.0.name}}".into()
            })
        );
    }

    #[test]
    fn empty_paths_keep_the_modal_open() {
        let mut modal = VariableEditorModal::open(json!("{{__2.rows.0}}"), &registry(), &IdentityTranslator).unwrap();
        modal.handle_key(KeyEvent::new(KeyCode::Char('w'), KeyModifiers::CONTROL));
        assert_eq!(modal.input().input(), "");
        assert_eq!(modal.handle_key(press(KeyCode::Enter)), EditorOutcome::Pending);
        assert_eq!(modal.error(), Some(FieldError::Editor(EditorError::EmptyRemainder).to_string().as_str()));

        modal.handle_key(press(KeyCode::Char('1')));
        assert!(modal.error().is_none());
        assert_eq!(modal.handle_key(press(KeyCode::Esc)), EditorOutcome::Cancelled);
    }

    #[test]
    fn scalar_outputs_cannot_be_opened() {
        let error = VariableEditorModal::open(json!("{{__3.text}}"), &registry(), &IdentityTranslator).unwrap_err();
        assert_eq!(error, FieldError::NotEditable);
    }

    #[test]
    fn renders_label_input_and_hints() {
        let modal = VariableEditorModal::open(json!("{{__2.rows.0}}"), &registry(), &IdentityTranslator).unwrap();
        let area = Rect::new(0, 0, 60, 8);
        let mut buf = Buffer::empty(area);
        (&modal).render(area, &mut buf);

        assert!(row(&buf, 0).contains("Edit variable path"));
        assert!(row(&buf, 1).trim_matches(['│', ' ']).is_empty());
        assert!(row(&buf, 3).contains("__2.rows (rows)"));
        assert!(row(&buf, 4).starts_with("│0 "));
        assert!(row(&buf, 6).contains("Enter confirm"));
        assert_eq!(modal.cursor_position(area), Position::new(2, 4));
    }

    #[test]
    fn empty_input_shows_a_placeholder() {
        let mut modal = VariableEditorModal::open(json!("{{__2.rows.0}}"), &registry(), &IdentityTranslator).unwrap();
        modal.handle_key(press(KeyCode::Backspace));
        let area = Rect::new(0, 0, 60, 8);
        let mut buf = Buffer::empty(area);
        (&modal).render(area, &mut buf);
        assert!(row(&buf, 4).contains(PLACEHOLDER));
    }

    fn step_graph() -> StepGraph {
        let flow: FlowDocument = serde_json::from_value(json!({
            "steps": [
                { "id": "0", "operator": "@trigger/manual" },
                { "id": "1", "operator": "@internal/tool/py3",
                  "parameters": { "code": "x", "output_params": [ { "key": "rows", "type": "array" } ] } },
                { "id": "2", "operator": "@internal/text/join", "parameters": { "texts": ["{{__1.rows.0}}"] } },
                { "id": "3", "operator": "@internal/text/join", "parameters": { "texts": ["{{__4.rows}}"] } },
                { "id": "4", "operator": "@internal/tool/py3",
                  "parameters": { "code": "x", "output_params": [ { "key": "rows", "type": "array" } ] } }
            ]
        }))
        .unwrap();
        StepGraph::build(&flow, &ActionCatalog::builtin()).unwrap()
    }

    #[test]
    fn header_shows_the_tag_and_follows_the_draft() {
        let graph = step_graph();
        let mut modal = VariableEditorModal::for_step(json!("{{__1.rows.0}}"), &graph, "2", &ExecutionOrder, &IdentityTranslator).unwrap();
        let area = Rect::new(0, 0, 60, 8);

        let mut buf = Buffer::empty(area);
        (&modal).render(area, &mut buf);
        assert!(row(&buf, 1).starts_with("│2 EAToolPy3 / rows.0 "));
        assert!(row(&buf, 2).trim_matches(['│', ' ']).is_empty());

        for c in ".name".chars() {
            modal.handle_key(press(KeyCode::Char(c)));
        }
        assert_eq!(modal.tag().unwrap().remainder, "0.name");
        let mut buf = Buffer::empty(area);
        (&modal).render(area, &mut buf);
        assert!(row(&buf, 1).starts_with("│2 EAToolPy3 / rows.0.name "));
    }

    #[test]
    fn header_reports_references_to_later_steps() {
        let graph = step_graph();
        let modal = VariableEditorModal::for_step(json!("{{__4.rows}}"), &graph, "3", &ExecutionOrder, &IdentityTranslator).unwrap();
        assert_eq!(modal.tag().unwrap().issue, Some(ReferenceIssue::OutOfScope));

        let area = Rect::new(0, 0, 60, 8);
        let mut buf = Buffer::empty(area);
        (&modal).render(area, &mut buf);
        assert!(row(&buf, 1).starts_with("│! 5 EAToolPy3 / rows "));
        assert!(row(&buf, 2).contains("cannot reference a variable from a later step"));
    }
}
