use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::ui::commands::{CommandEntry, COMMAND_ENTRIES, ParsedCommand, parse_slash_command};

const PLACEHOLDER: &str = "Type your message...";

/// Result of a key press in the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    /// Non-blank input submitted. The content stays in the editor until the
    /// application accepts the submission and calls [`Composer::clear`].
    Submitted(String),
    /// Input parsed as a slash command
    Command(ParsedCommand),
    None,
}

/// Single-line input editor. The cursor is tracked in characters, not bytes,
/// so multibyte input edits cleanly.
#[derive(Debug, Default)]
pub struct Composer {
    content: String,
    cursor: usize,
}

/// Convert a character index to a byte index for UTF-8 safe string edits
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Replace the content, placing the cursor at the end. Used when a
    /// suggested prompt is picked.
    pub fn set_content(&mut self, content: &str) {
        self.content = content.to_string();
        self.cursor = self.content.chars().count();
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    /// Slash-command entries matching the current input, for the hint row.
    pub fn command_hints(&self) -> Vec<&'static CommandEntry> {
        let Some(query) = self.content.strip_prefix('/') else {
            return Vec::new();
        };
        if query.contains(char::is_whitespace) {
            return Vec::new();
        }
        COMMAND_ENTRIES
            .iter()
            .filter(|entry| entry.keyword.starts_with(query))
            .collect()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ComposerResult {
        match key.code {
            KeyCode::Enter => {
                if self.content.trim().is_empty() {
                    return ComposerResult::None;
                }
                if let Some(command) = parse_slash_command(&self.content) {
                    self.clear();
                    return ComposerResult::Command(command);
                }
                ComposerResult::Submitted(self.content.clone())
            }
            KeyCode::Char(c) => {
                let byte_pos = char_to_byte_index(&self.content, self.cursor);
                self.content.insert(byte_pos, c);
                self.cursor += 1;
                ComposerResult::None
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let byte_pos = char_to_byte_index(&self.content, self.cursor);
                    self.content.remove(byte_pos);
                }
                ComposerResult::None
            }
            KeyCode::Delete => {
                if self.cursor < self.content.chars().count() {
                    let byte_pos = char_to_byte_index(&self.content, self.cursor);
                    self.content.remove(byte_pos);
                }
                ComposerResult::None
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                ComposerResult::None
            }
            KeyCode::Right => {
                if self.cursor < self.content.chars().count() {
                    self.cursor += 1;
                }
                ComposerResult::None
            }
            KeyCode::Home => {
                self.cursor = 0;
                ComposerResult::None
            }
            KeyCode::End => {
                self.cursor = self.content.chars().count();
                ComposerResult::None
            }
            _ => ComposerResult::None,
        }
    }
}

impl Widget for &Composer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Gray));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height == 0 {
            return;
        }

        if self.content.is_empty() {
            let placeholder = Line::from(vec![
                Span::styled("▌", Style::default().fg(Color::White)),
                Span::styled(PLACEHOLDER, Style::default().fg(Color::DarkGray)),
            ]);
            buf.set_line(inner.x, inner.y, &placeholder, inner.width);
            return;
        }

        let mut display: String = self.content.clone();
        let byte_pos = char_to_byte_index(&display, self.cursor);
        display.insert(byte_pos, '▌');

        // Keep the cursor in view when the content outgrows the box.
        let width = inner.width as usize;
        let chars: Vec<char> = display.chars().collect();
        let start = chars.len().saturating_sub(width).min(
            (self.cursor + 1).saturating_sub(width),
        );
        let visible: String = chars[start..].iter().collect();

        let line = Line::from(Span::raw(visible));
        buf.set_line(inner.x, inner.y, &line, inner.width);
    }
}
