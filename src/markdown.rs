//! Markdown rendering for assistant replies: pulldown-cmark events mapped
//! onto styled ratatui lines, plus the span-preserving word wrap used by the
//! transcript view.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Render a markdown document into styled lines. Lines are unwrapped; the
/// caller wraps them to the viewport with [`wrap_line`].
pub fn render(text: &str) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut renderer = LineBuilder::default();
    for event in Parser::new_ext(text, options) {
        renderer.push_event(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct LineBuilder {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    needs_blank: bool,
    // inline state
    heading: Option<HeadingLevel>,
    bold: usize,
    italic: usize,
    strikethrough: usize,
    link: usize,
    quote_depth: usize,
    in_code_block: bool,
    // one counter per open list; None for bullet lists
    list_stack: Vec<Option<u64>>,
}

impl LineBuilder {
    fn push_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    self.push_code_block_text(&text);
                } else {
                    self.spans
                        .push(Span::styled(text.into_string(), self.current_style()));
                }
            }
            Event::Code(code) => {
                self.spans.push(Span::styled(
                    code.into_string(),
                    Style::default().fg(Color::Yellow),
                ));
            }
            Event::SoftBreak => {
                self.spans
                    .push(Span::styled(" ".to_string(), self.current_style()));
            }
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.separate_block();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(24),
                    Style::default().fg(Color::DarkGray),
                )));
                self.needs_blank = true;
            }
            // Raw HTML, footnotes and task markers from the endpoint are
            // dropped rather than echoed as markup.
            Event::Html(_) | Event::FootnoteReference(_) | Event::TaskListMarker(_) => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                // Tight list items carry their own prefix span already.
                if self.spans.is_empty() {
                    self.separate_block();
                }
            }
            Tag::Heading(level, _, _) => {
                self.separate_block();
                self.heading = Some(level);
            }
            Tag::BlockQuote => {
                self.separate_block();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(_) => {
                self.separate_block();
                self.in_code_block = true;
            }
            Tag::List(start) => {
                if self.list_stack.is_empty() {
                    self.separate_block();
                }
                self.list_stack.push(start);
            }
            Tag::Item => {
                self.flush_line();
                let depth = self.list_stack.len().saturating_sub(1);
                let marker = match self.list_stack.last_mut() {
                    Some(Some(counter)) => {
                        let marker = format!("{}. ", counter);
                        *counter += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.spans.push(Span::styled(
                    format!("{}{}", "  ".repeat(depth), marker),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Tag::Emphasis => self.italic += 1,
            Tag::Strong => self.bold += 1,
            Tag::Strikethrough => self.strikethrough += 1,
            Tag::Link(_, _, _) => self.link += 1,
            Tag::Image(_, _, _) | Tag::FootnoteDefinition(_) => {}
            Tag::Table(_) | Tag::TableHead | Tag::TableRow | Tag::TableCell => {}
        }
    }

    fn end_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.flush_line();
                self.needs_blank = true;
            }
            Tag::Heading(_, _, _) => {
                self.flush_line();
                self.heading = None;
                self.needs_blank = true;
            }
            Tag::BlockQuote => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.needs_blank = true;
            }
            Tag::CodeBlock(_) => {
                self.flush_line();
                self.in_code_block = false;
                self.needs_blank = true;
            }
            Tag::List(_) => {
                self.flush_line();
                self.list_stack.pop();
                if self.list_stack.is_empty() {
                    self.needs_blank = true;
                }
            }
            Tag::Item => self.flush_line(),
            Tag::Emphasis => self.italic = self.italic.saturating_sub(1),
            Tag::Strong => self.bold = self.bold.saturating_sub(1),
            Tag::Strikethrough => self.strikethrough = self.strikethrough.saturating_sub(1),
            Tag::Link(_, url, _) => {
                self.link = self.link.saturating_sub(1);
                self.spans.push(Span::styled(
                    format!(" ({})", url),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Tag::Image(_, _, _) | Tag::FootnoteDefinition(_) => {}
            Tag::Table(_) | Tag::TableHead | Tag::TableRow | Tag::TableCell => {}
        }
    }

    fn push_code_block_text(&mut self, text: &str) {
        for code_line in text.lines() {
            self.lines.push(Line::from(Span::styled(
                format!("  {}", code_line),
                Style::default().fg(Color::Cyan),
            )));
        }
    }

    fn current_style(&self) -> Style {
        let mut style = Style::default();
        if let Some(level) = self.heading {
            style = match level {
                HeadingLevel::H1 | HeadingLevel::H2 => style
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
                _ => style.add_modifier(Modifier::BOLD),
            };
        }
        if self.bold > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.strikethrough > 0 {
            style = style.add_modifier(Modifier::CROSSED_OUT);
        }
        if self.link > 0 {
            style = style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED);
        }
        if self.quote_depth > 0 {
            style = style.fg(Color::Gray).add_modifier(Modifier::ITALIC);
        }
        style
    }

    fn separate_block(&mut self) {
        self.flush_line();
        if self.needs_blank && !self.lines.is_empty() {
            self.lines.push(Line::default());
        }
        self.needs_blank = false;
    }

    fn flush_line(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let mut spans = std::mem::take(&mut self.spans);
        if self.quote_depth > 0 {
            spans.insert(
                0,
                Span::styled("▌ ".to_string(), Style::default().fg(Color::DarkGray)),
            );
        }
        self.lines.push(Line::from(spans));
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        self.lines
    }
}

/// Word-wrap a styled line to the given width, preserving span styles across
/// breaks. Words longer than the width get a line of their own and are left
/// for the renderer to truncate.
pub fn wrap_line(line: &Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 {
        return vec![line.clone()];
    }

    let mut wrapped: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut current_width = 0usize;

    for span in &line.spans {
        for word in span.content.split_whitespace() {
            let needed = if current_width == 0 {
                word.chars().count()
            } else {
                word.chars().count() + 1
            };

            if current_width > 0 && current_width + needed > width {
                wrapped.push(Line::from(std::mem::take(&mut current)));
                current_width = 0;
            }

            let text = if current_width == 0 {
                word.to_string()
            } else {
                format!(" {}", word)
            };
            current_width += text.chars().count();
            current.push(Span::styled(text, span.style));
        }
    }

    if !current.is_empty() {
        wrapped.push(Line::from(current));
    }
    if wrapped.is_empty() {
        wrapped.push(Line::default());
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|s| s.content.as_ref())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn heading_is_bold() {
        let lines = render("# Hello");
        assert_eq!(plain(&lines), vec!["Hello"]);
        assert!(
            lines[0].spans[0]
                .style
                .add_modifier
                .contains(Modifier::BOLD)
        );
    }

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        let lines = render("first paragraph\n\nsecond paragraph");
        assert_eq!(plain(&lines), vec!["first paragraph", "", "second paragraph"]);
    }

    #[test]
    fn soft_breaks_join_into_one_line() {
        let lines = render("one\ntwo");
        assert_eq!(plain(&lines), vec!["one two"]);
    }

    #[test]
    fn bullet_and_ordered_lists_get_markers() {
        let lines = render("- alpha\n- beta");
        assert_eq!(plain(&lines), vec!["• alpha", "• beta"]);

        let lines = render("1. alpha\n2. beta");
        assert_eq!(plain(&lines), vec!["1. alpha", "2. beta"]);
    }

    #[test]
    fn inline_code_is_highlighted() {
        let lines = render("call `fetch` now");
        let code_span = lines[0]
            .spans
            .iter()
            .find(|s| s.content == "fetch")
            .unwrap();
        assert_eq!(code_span.style.fg, Some(Color::Yellow));
    }

    #[test]
    fn fenced_code_block_keeps_its_lines() {
        let lines = render("```\nlet x = 1;\nlet y = 2;\n```");
        assert_eq!(plain(&lines), vec!["  let x = 1;", "  let y = 2;"]);
    }

    #[test]
    fn strong_text_is_bold() {
        let lines = render("**very** plain");
        let strong = lines[0].spans.iter().find(|s| s.content == "very").unwrap();
        assert!(strong.style.add_modifier.contains(Modifier::BOLD));
        let rest = lines[0]
            .spans
            .iter()
            .find(|s| s.content.contains("plain"))
            .unwrap();
        assert!(!rest.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn link_text_is_followed_by_url() {
        let lines = render("[docs](https://example.com)");
        assert_eq!(plain(&lines), vec!["docs (https://example.com)"]);
    }

    #[test]
    fn blockquote_is_prefixed() {
        let lines = render("> quoted words");
        assert_eq!(plain(&lines), vec!["▌ quoted words"]);
    }

    #[test]
    fn wrap_line_breaks_on_word_boundaries() {
        let line = Line::from(Span::raw("alpha beta gamma delta"));
        let wrapped = wrap_line(&line, 11);
        assert_eq!(plain(&wrapped), vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn wrap_line_preserves_span_styles() {
        let line = Line::from(vec![
            Span::styled("bold words here", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" and plain tail"),
        ]);
        let wrapped = wrap_line(&line, 10);
        for out in &wrapped {
            for span in &out.spans {
                if ["bold", "words", "here"]
                    .iter()
                    .any(|w| span.content.trim() == *w)
                {
                    assert!(span.style.add_modifier.contains(Modifier::BOLD));
                }
            }
        }
    }

    #[test]
    fn wrap_line_handles_empty_input() {
        let wrapped = wrap_line(&Line::default(), 10);
        assert_eq!(wrapped.len(), 1);
        assert!(wrapped[0].spans.is_empty());
    }
}
