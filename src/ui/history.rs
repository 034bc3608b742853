use std::cell::Cell;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::conversation::{Conversation, Message, Role};
use crate::markdown;

const SCROLL_STEP: usize = 4;

/// Scrolling transcript of the conversation. Messages are laid out top to
/// bottom and the view stays anchored to the newest message unless the user
/// scrolls back.
pub struct TranscriptView {
    /// Lines scrolled back from the bottom
    scroll_offset: usize,
    /// Animation counter advanced by the UI tick
    tick: usize,
    /// Scrollback limit observed at the last render
    max_offset: Cell<usize>,
    show_timestamps: bool,
}

impl TranscriptView {
    pub fn new(show_timestamps: bool) -> Self {
        Self {
            scroll_offset: 0,
            tick: 0,
            max_offset: Cell::new(0),
            show_timestamps,
        }
    }

    pub fn on_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = (self.scroll_offset + SCROLL_STEP).min(self.max_offset.get());
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(SCROLL_STEP);
    }

    /// Snap back to the newest message (on submit and on resolve).
    pub fn follow_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn render(&self, conversation: &Conversation, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title(" palaver ");
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        if conversation.is_empty() {
            self.render_welcome(inner, buf);
            return;
        }

        let wrap_width = inner.width.saturating_sub(2) as usize;
        let mut lines: Vec<Line<'static>> = Vec::new();
        for message in conversation.messages() {
            self.append_message(message, wrap_width, &mut lines);
            lines.push(Line::default());
        }

        let height = inner.height as usize;
        let total = lines.len();
        let max_offset = total.saturating_sub(height);
        self.max_offset.set(max_offset);

        let offset = self.scroll_offset.min(max_offset);
        let start = total.saturating_sub(height + offset);
        let end = (start + height).min(total);

        for (i, line) in lines[start..end].iter().enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }

    fn render_welcome(&self, inner: Rect, buf: &mut Buffer) {
        let welcome = [
            Line::from(Span::styled(
                "Hi! I am palaver.",
                Style::default().fg(Color::Green),
            )),
            Line::from(Span::styled(
                "How can I help you?",
                Style::default().fg(Color::Gray),
            )),
            Line::default(),
            Line::from(Span::styled(
                "Press Enter to send. Tab cycles the suggested prompts, /help lists commands.",
                Style::default().fg(Color::DarkGray),
            )),
        ];

        for (i, line) in welcome.iter().enumerate() {
            if i < inner.height as usize {
                buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
            }
        }
    }

    fn append_message(&self, message: &Message, width: usize, lines: &mut Vec<Line<'static>>) {
        let icon = match message.role {
            Role::User => "👤",
            Role::Assistant => "🤖",
        };
        let header = if self.show_timestamps {
            format!(
                "{} {} {}",
                icon,
                message.timestamp.format("%H:%M:%S"),
                "─".repeat(20)
            )
        } else {
            format!("{} {}", icon, "─".repeat(20))
        };
        lines.push(Line::from(Span::styled(
            header,
            Style::default().fg(Color::DarkGray),
        )));

        if message.pending {
            lines.push(indented(thinking_line(self.tick)));
            return;
        }

        let body = match message.role {
            Role::User => message
                .text
                .lines()
                .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(Color::Blue))))
                .collect::<Vec<_>>(),
            Role::Assistant => markdown::render(&message.text),
        };

        for line in body {
            if line_width(&line) > width {
                for wrapped in markdown::wrap_line(&line, width) {
                    lines.push(indented(wrapped));
                }
            } else {
                lines.push(indented(line));
            }
        }
    }
}

fn line_width(line: &Line<'_>) -> usize {
    line.spans
        .iter()
        .map(|s| s.content.chars().count())
        .sum()
}

fn indented(line: Line<'static>) -> Line<'static> {
    if line.spans.is_empty() {
        return line;
    }
    let mut spans = line.spans;
    spans.insert(0, Span::raw("  "));
    Line::from(spans)
}

fn thinking_line(tick: usize) -> Line<'static> {
    let dots = match tick % 4 {
        0 => ".",
        1 => "..",
        2 => "...",
        _ => "",
    };
    Line::from(vec![
        Span::styled("Thinking", Style::default().fg(Color::Green)),
        Span::styled(dots.to_string(), Style::default().fg(Color::Yellow)),
    ])
}
