use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Duration;

use crate::client::{CompletionClient, CompletionEvent};
use crate::config::Config;
use crate::conversation::Conversation;
use crate::prompts::{PromptSuggestions, SUGGESTED_PROMPTS};
use crate::session::{Session, SessionStore};
use crate::tui::{self, EventHandler, Tui, TuiEvent};
use crate::ui::commands::{ParsedCommand, SlashCommand, get_help_text};
use crate::ui::composer::{Composer, ComposerResult};
use crate::ui::history::TranscriptView;

const TICK_RATE: Duration = Duration::from_millis(300);

/// Top-level application state: the conversation, its input surfaces, and at
/// most one in-flight completion request.
pub struct App {
    config: Config,
    session: Session,
    session_store: SessionStore,
    conversation: Conversation,
    composer: Composer,
    suggestions: PromptSuggestions,
    transcript: TranscriptView,
    client: CompletionClient,
    completion_rx: Option<mpsc::Receiver<CompletionEvent>>,
    status: Option<String>,
    show_help: bool,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let session_store = SessionStore::new(&config);
        let session = session_store.load_or_create()?;
        let client = CompletionClient::new(&config)?;

        Ok(Self {
            session,
            session_store,
            conversation: Conversation::new(),
            composer: Composer::new(),
            suggestions: PromptSuggestions::new(config.ui.show_suggestions),
            transcript: TranscriptView::new(config.ui.show_timestamps),
            client,
            completion_rx: None,
            status: None,
            show_help: false,
            should_quit: false,
            config,
        })
    }

    /// Run the TUI until the user quits.
    pub async fn run(mut self) -> Result<()> {
        let mut terminal = tui::init()?;
        let mut events = EventHandler::new(TICK_RATE);
        let result = self.event_loop(&mut terminal, &mut events).await;
        tui::restore()?;
        result
    }

    async fn event_loop(&mut self, terminal: &mut Tui, events: &mut EventHandler) -> Result<()> {
        while !self.should_quit() {
            self.poll_completion();
            terminal.draw(|frame| self.draw(frame))?;

            match events.next().await {
                Some(TuiEvent::Key(key)) => self.handle_key(key),
                Some(TuiEvent::Tick) => self.transcript.on_tick(),
                Some(TuiEvent::Resize(_, _)) => {}
                None => break,
            }
        }
        Ok(())
    }

    /// Drain the in-flight request, if any. The transcript is only ever
    /// mutated here, on the event loop, never from the request task.
    fn poll_completion(&mut self) {
        let Some(rx) = &mut self.completion_rx else {
            return;
        };

        match rx.try_recv() {
            Ok(CompletionEvent::Completed(text)) => {
                self.conversation.complete(text);
                self.transcript.follow_bottom();
                self.completion_rx = None;
            }
            Ok(CompletionEvent::Failed(detail)) => {
                self.conversation.fail();
                self.status = Some(detail);
                self.transcript.follow_bottom();
                self.completion_rx = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                // Request task died without reporting; same single failure kind.
                self.conversation.fail();
                self.completion_rx = None;
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        if self.show_help {
            self.show_help = false;
            return;
        }

        match key.code {
            KeyCode::PageUp => {
                self.transcript.scroll_up();
                return;
            }
            KeyCode::PageDown => {
                self.transcript.scroll_down();
                return;
            }
            KeyCode::Tab if self.suggestions.is_visible() => {
                self.suggestions.select_next();
                return;
            }
            KeyCode::Esc if self.suggestions.is_visible() => {
                self.suggestions.dismiss();
                return;
            }
            KeyCode::Enter if self.composer.is_empty() && self.suggestions.is_visible() => {
                if let Some(prompt) = self.suggestions.take() {
                    self.composer.set_content(prompt);
                }
                return;
            }
            _ => {}
        }

        match self.composer.handle_key(key) {
            ComposerResult::Submitted(input) => self.submit(input),
            ComposerResult::Command(command) => self.execute_command(command),
            ComposerResult::None => {}
        }
    }

    /// Stage the query and dispatch the completion request. On rejection
    /// (blank, or a reply still pending) the composer keeps its content.
    fn submit(&mut self, input: String) {
        let Some(query) = self.conversation.submit(&input) else {
            if self.conversation.has_pending() {
                self.status = Some("Still waiting on the previous reply".to_string());
            }
            return;
        };

        self.composer.clear();
        self.suggestions.dismiss();
        self.status = None;
        self.transcript.follow_bottom();
        self.completion_rx = Some(self.client.request(query, &self.session));
    }

    fn execute_command(&mut self, command: ParsedCommand) {
        match command.command {
            SlashCommand::New => match self.session_store.reset() {
                Ok(session) => {
                    self.session = session;
                    self.conversation.clear();
                    self.completion_rx = None;
                    self.transcript.follow_bottom();
                    self.status = Some("Started a fresh thread".to_string());
                }
                Err(e) => self.status = Some(format!("Could not reset session: {}", e)),
            },
            SlashCommand::Context => {
                let target = command
                    .context_target()
                    .unwrap_or(!self.session.context_enabled);
                let mut session = self.session.clone();
                match self.session_store.set_context_enabled(&mut session, target) {
                    Ok(()) => {
                        self.session = session;
                        self.status = Some(format!(
                            "Context {}",
                            if target { "enabled" } else { "disabled" }
                        ));
                    }
                    Err(e) => self.status = Some(format!("Could not update session: {}", e)),
                }
            }
            SlashCommand::Help => self.show_help = true,
            SlashCommand::Bye => self.should_quit = true,
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let mut constraints = vec![Constraint::Min(5)];
        if self.suggestions.is_visible() {
            constraints.push(Constraint::Length(SUGGESTED_PROMPTS.len() as u16 + 2));
        }
        constraints.push(Constraint::Length(1));
        constraints.push(Constraint::Length(3));

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(frame.size());

        let mut idx = 0;
        frame.render_widget(
            TranscriptWidget {
                view: &self.transcript,
                conversation: &self.conversation,
            },
            chunks[idx],
        );
        idx += 1;

        if self.suggestions.is_visible() {
            frame.render_widget(self.suggestions_widget(), chunks[idx]);
            idx += 1;
        }

        frame.render_widget(self.status_line(), chunks[idx]);
        frame.render_widget(&self.composer, chunks[idx + 1]);

        if self.show_help {
            self.draw_help(frame);
        }
    }

    fn suggestions_widget(&self) -> Paragraph<'_> {
        let lines: Vec<Line> = SUGGESTED_PROMPTS
            .iter()
            .enumerate()
            .map(|(i, prompt)| {
                let style = if i == self.suggestions.selected() {
                    Style::default().fg(Color::Black).bg(Color::Cyan)
                } else {
                    Style::default().fg(Color::Gray)
                };
                Line::from(vec![Span::raw("  "), Span::styled(*prompt, style)])
            })
            .collect();

        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Suggested prompts (Tab to cycle, Enter to pick) ")
                .style(Style::default().fg(Color::DarkGray)),
        )
    }

    /// One line between suggestions and composer: command hints while typing
    /// a slash command, otherwise the latest status, otherwise session info.
    fn status_line(&self) -> Paragraph<'_> {
        let hints = self.composer.command_hints();
        let line = if !hints.is_empty() {
            let mut spans = Vec::new();
            for (i, entry) in hints.iter().enumerate() {
                if i > 0 {
                    spans.push(Span::styled("  ", Style::default()));
                }
                spans.push(Span::styled(
                    format!("/{}", entry.keyword),
                    Style::default().fg(Color::Cyan),
                ));
                spans.push(Span::styled(
                    format!(" {}", entry.description),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            Line::from(spans)
        } else if let Some(status) = &self.status {
            Line::from(Span::styled(
                status.clone(),
                Style::default().fg(Color::Yellow),
            ))
        } else {
            let thread = self.session.thread_id.get(..8).unwrap_or("");
            Line::from(Span::styled(
                format!(
                    " thread {} · context {} · {}",
                    thread,
                    if self.session.context_enabled {
                        "on"
                    } else {
                        "off"
                    },
                    self.config.endpoint
                ),
                Style::default().fg(Color::DarkGray),
            ))
        };

        Paragraph::new(line)
    }

    fn draw_help(&self, frame: &mut Frame) {
        let area = centered_rect(frame.size(), 56, 10);
        frame.render_widget(Clear, area);

        let lines: Vec<Line> = get_help_text()
            .lines()
            .map(|l| Line::from(l.to_string()))
            .collect();
        let help = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help (press any key to close) ")
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(help, area);
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    #[cfg(test)]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[cfg(test)]
    pub fn composer_content(&self) -> &str {
        self.composer.content()
    }

    #[cfg(test)]
    pub fn suggestions_visible(&self) -> bool {
        self.suggestions.is_visible()
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }
}

struct TranscriptWidget<'a> {
    view: &'a TranscriptView,
    conversation: &'a Conversation,
}

impl Widget for TranscriptWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.view.render(self.conversation, area, buf);
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn test_app(dir: &std::path::Path) -> App {
        let mut config = Config::load_from_dir(dir.join(".palaver")).unwrap();
        // Reserved TEST-NET-1 address so no test ever reaches a live endpoint.
        config.endpoint = "http://192.0.2.1:9/query".to_string();
        config.request_timeout_secs = 1;
        App::new(config).unwrap()
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn picking_a_suggested_prompt_fills_composer_and_hides_bar() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        assert!(app.suggestions_visible());

        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.composer_content(), SUGGESTED_PROMPTS[1]);
        assert!(!app.suggestions_visible());
        assert!(app.conversation().is_empty());
    }

    #[test]
    fn escape_dismisses_suggestions_without_filling_composer() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());

        app.handle_key(key(KeyCode::Esc));
        assert!(!app.suggestions_visible());
        assert!(app.composer_content().is_empty());
    }

    #[tokio::test]
    async fn submitting_appends_pair_and_clears_composer() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());

        type_str(&mut app, "what is an API?");
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.conversation().len(), 2);
        assert!(app.conversation().has_pending());
        assert!(app.composer_content().is_empty());
        assert!(!app.suggestions_visible());
    }

    #[tokio::test]
    async fn second_submission_while_pending_keeps_composer_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());

        type_str(&mut app, "first");
        app.handle_key(key(KeyCode::Enter));
        type_str(&mut app, "second");
        app.handle_key(key(KeyCode::Enter));

        assert_eq!(app.conversation().len(), 2);
        assert_eq!(app.composer_content(), "second");
    }

    #[tokio::test]
    async fn new_command_resets_thread_and_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let original_thread = app.session().thread_id.clone();

        type_str(&mut app, "hello");
        app.handle_key(key(KeyCode::Enter));

        type_str(&mut app, "/new");
        app.handle_key(key(KeyCode::Enter));

        assert!(app.conversation().is_empty());
        assert_ne!(app.session().thread_id, original_thread);
    }

    #[test]
    fn context_command_toggles_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        assert!(!app.session().context_enabled);

        type_str(&mut app, "/context");
        app.handle_key(key(KeyCode::Enter));
        assert!(app.session().context_enabled);

        type_str(&mut app, "/context off");
        app.handle_key(key(KeyCode::Enter));
        assert!(!app.session().context_enabled);
    }

    #[test]
    fn bye_command_and_ctrl_c_quit() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());

        type_str(&mut app, "/bye");
        app.handle_key(key(KeyCode::Enter));
        assert!(app.should_quit());

        let mut app = test_app(dir.path());
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit());
    }
}
