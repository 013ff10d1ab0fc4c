use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use tokio::sync::mpsc;

use crate::commands::CommandHandler;
use crate::config::Settings;
use crate::discovery::Resolution;
use crate::entry::{EntryRequest, EntryResolver};
use crate::formatting::{format_summary_row, format_thread};
use crate::models::PeerId;
use crate::session::{MessagingSession, SessionView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    ConversationList,
    Input,
}

pub struct App {
    pub session: MessagingSession,
    pub entry: EntryResolver,
    pub settings: Settings,
    pub focus: Focus,
    pub selected_idx: usize,
    pub picker_idx: usize,
    pub status_message: Option<String>, // Notification bar at bottom
    pub status_expire: Option<std::time::Instant>,
    pub needs_redraw: bool,
    view: SessionView,
    // Background tasks report back through here
    notices_tx: mpsc::UnboundedSender<String>,
    notices_rx: mpsc::UnboundedReceiver<String>,
}

impl App {
    pub fn new(session: MessagingSession, entry: EntryResolver, settings: Settings) -> Self {
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        Self {
            session,
            entry,
            settings,
            focus: Focus::ConversationList,
            selected_idx: 0,
            picker_idx: 0,
            status_message: None,
            status_expire: None,
            needs_redraw: true,
            view: SessionView::default(),
            notices_tx,
            notices_rx,
        }
    }

    /// Load the list and open whatever the entry request points at.
    pub async fn activate(&mut self) {
        match self.session.activate(&mut self.entry).await {
            Some(Resolution::Unresolved(id)) => self.notify(&format!("User {} not found", id)),
            Some(_) => self.focus = Focus::Input,
            None => {}
        }
        self.sync().await;
    }

    /// Take a fresh snapshot of the session and collect background notices.
    pub async fn sync(&mut self) {
        self.view = self.session.view().await;

        while let Ok(notice) = self.notices_rx.try_recv() {
            self.notify(&notice);
        }

        let count = self.view.conversations.summaries.len();
        if self.selected_idx >= count {
            self.selected_idx = count.saturating_sub(1);
        }
        let results = self.view.picker.results.len();
        if self.picker_idx >= results {
            self.picker_idx = results.saturating_sub(1);
        }
        self.needs_redraw = true;
    }

    pub fn draw(&mut self, f: &mut Frame) {
        // Check status message expiry
        if let Some(expire) = self.status_expire {
            if std::time::Instant::now() >= expire {
                self.status_message = None;
                self.status_expire = None;
            }
        }

        let has_status = self.status_message.is_some();
        let main_constraints = if has_status {
            vec![Constraint::Min(0), Constraint::Length(1)]
        } else {
            vec![Constraint::Min(0)]
        };

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints(main_constraints)
            .split(f.area());

        let total_width = outer[0].width;
        let list_width = (total_width.saturating_mul(30) / 100).max(20);
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(list_width), Constraint::Min(0)])
            .split(outer[0]);

        self.draw_conversation_list(f, chunks[0]);
        self.draw_thread(f, chunks[1]);

        if self.view.picker.open {
            self.draw_picker(f, outer[0]);
        }

        if has_status {
            if let Some(ref msg) = self.status_message {
                let status = Paragraph::new(msg.as_str())
                    .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
                f.render_widget(status, outer[1]);
            }
        }
    }

    fn draw_conversation_list(&self, f: &mut Frame, area: Rect) {
        let conversations = &self.view.conversations;
        let max_width = area.width.saturating_sub(2).max(1) as usize;
        let open_peer = self.view.thread.peer.as_ref().map(|p| p.id);

        let items: Vec<ListItem> = if conversations.summaries.is_empty() {
            let placeholder = if !conversations.loaded {
                "Loading..."
            } else {
                "No conversations yet. /search to start one"
            };
            vec![ListItem::new(placeholder).style(Style::default().fg(Color::DarkGray))]
        } else {
            conversations
                .summaries
                .iter()
                .map(|summary| {
                    let mut style = Style::default();
                    if summary.unread_count > 0 {
                        style = style.add_modifier(Modifier::BOLD);
                    }
                    if Some(summary.peer.id) == open_peer {
                        style = style.fg(Color::Yellow);
                    }
                    ListItem::new(format_summary_row(summary, max_width)).style(style)
                })
                .collect()
        };

        let mut title = vec![Span::raw("Messages")];
        if let Some(ref badge) = self.view.badge {
            title.push(Span::raw(" "));
            title.push(Span::styled(
                format!("[{}]", badge),
                Style::default().fg(Color::White).bg(Color::Red),
            ));
        }
        if conversations.refreshing {
            title.push(Span::styled(" ...", Style::default().fg(Color::DarkGray)));
        }

        let border_style = if self.focus == Focus::ConversationList {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(Line::from(title))
                    .border_style(border_style),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        let mut state = ListState::default();
        if !conversations.summaries.is_empty() {
            state.select(Some(self.selected_idx));
        }
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_thread(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(area);

        let thread = &self.view.thread;
        let title = match thread.peer {
            Some(ref peer) if thread.loading => format!("{} (loading...)", peer.display_name),
            Some(ref peer) => peer.display_name.clone(),
            None => "No conversation".to_string(),
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
        let inner_height = chunks[0].height.saturating_sub(2) as usize;
        let inner_width = chunks[0].width.saturating_sub(2).max(1) as usize;

        let lines: Vec<Line> = match thread.peer {
            None => vec![Line::styled(
                "Pick a conversation on the left, or /search for someone",
                Style::default().fg(Color::DarkGray),
            )],
            Some(ref peer) if thread.messages.is_empty() && !thread.loading => vec![Line::styled(
                format!("Say hi to {}", peer.display_name),
                Style::default().fg(Color::DarkGray),
            )],
            Some(ref peer) => {
                let rendered = format_thread(
                    peer,
                    &thread.messages,
                    inner_width,
                    self.settings.show_timestamps,
                    self.settings.compact_mode,
                );
                // Stick to the bottom of the log
                let skip = rendered.len().saturating_sub(inner_height);
                rendered
                    .into_iter()
                    .skip(skip)
                    .map(|line| {
                        let style = if line.outgoing {
                            Style::default().fg(Color::Green)
                        } else {
                            Style::default()
                        };
                        Line::styled(line.text, style)
                    })
                    .collect()
            }
        };
        f.render_widget(Paragraph::new(lines).block(block), chunks[0]);

        self.draw_input(f, chunks[1]);
    }

    fn draw_input(&self, f: &mut Frame, area: Rect) {
        let composer = &self.view.composer;
        let focused = self.focus == Focus::Input;

        let (title, title_style) = if composer.sending {
            ("Sending...".to_string(), Style::default().fg(Color::Yellow))
        } else if let Some(ref err) = composer.last_error {
            (format!("Not sent: {}", err), Style::default().fg(Color::Red))
        } else if self.view.thread.peer.is_none() {
            ("Message (no conversation open)".to_string(), Style::default().fg(Color::DarkGray))
        } else {
            ("Message".to_string(), Style::default())
        };

        // Slash commands stay typeable; only sending is disabled
        let text_style = if composer.can_send || composer.input.starts_with('/') {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let mut input_text = composer.input.clone();
        if focused && !composer.sending {
            input_text.push('_');
        }

        let border_style = if focused {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        };
        let input = Paragraph::new(input_text)
            .style(text_style)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(Span::styled(title, title_style))
                    .border_style(border_style),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(input, area);
    }

    fn draw_picker(&self, f: &mut Frame, area: Rect) {
        let width = (area.width * 50 / 100).max(24).min(area.width);
        let height = (self.view.picker.results.len() as u16 + 2).clamp(3, area.height.max(3));
        let popup = Rect {
            x: area.x + area.width.saturating_sub(width) / 2,
            y: area.y + area.height.saturating_sub(height) / 2,
            width,
            height: height.min(area.height),
        };

        let items: Vec<ListItem> = if self.view.picker.results.is_empty() {
            vec![ListItem::new("No matches").style(Style::default().fg(Color::DarkGray))]
        } else {
            self.view
                .picker
                .results
                .iter()
                .map(|peer| ListItem::new(format!("{}  #{}", peer.display_name, peer.id)))
                .collect()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Search: {}", self.view.picker.query))
                    .border_style(Style::default().fg(Color::Magenta)),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        let mut state = ListState::default();
        if !self.view.picker.results.is_empty() {
            state.select(Some(self.picker_idx));
        }
        f.render_widget(Clear, popup);
        f.render_stateful_widget(list, popup, &mut state);
    }

    /// Show a status notification that auto-expires
    pub fn notify(&mut self, message: &str) {
        self.notify_with_duration(message, 3);
    }

    /// Show a status notification with custom timeout duration
    pub fn notify_with_duration(&mut self, message: &str, duration_secs: u64) {
        self.status_message = Some(message.to_string());
        self.status_expire =
            Some(std::time::Instant::now() + std::time::Duration::from_secs(duration_secs));
        self.needs_redraw = true;
    }

    // =========================================================================
    // Actions. Anything touching the network runs on its own task so the
    // event loop keeps drawing.
    // =========================================================================

    pub fn open_peer(&mut self, id: PeerId) {
        let discovery = self.session.discovery.clone();
        let notices = self.notices_tx.clone();
        self.focus = Focus::Input;
        tokio::spawn(async move {
            let notice = match discovery.resolve(id).await {
                Resolution::Existing(_) => None,
                Resolution::Started(peer) => {
                    Some(format!("New conversation with {}", peer.display_name))
                }
                Resolution::Unresolved(id) => Some(format!("User {} not found", id)),
            };
            if let Some(notice) = notice {
                let _ = notices.send(notice);
            }
        });
    }

    pub fn follow_link(&mut self, url: String) {
        self.entry.set_location(Some(url));
        match self.entry.next_request() {
            EntryRequest::Nothing => self.notify("That link has no user_id"),
            request => {
                if let Some(id) = request.peer_id() {
                    self.open_peer(id);
                }
            }
        }
    }

    pub fn refresh(&mut self) {
        let conversations = self.session.conversations.clone();
        let thread = self.session.thread.clone();
        let notices = self.notices_tx.clone();
        self.notify("Refreshing...");
        tokio::spawn(async move {
            let (listed, _) = futures::join!(conversations.refresh(), thread.reload());
            if !listed {
                let _ = notices.send("Could not refresh conversations".to_string());
            }
        });
    }

    pub async fn start_search(&mut self, query: String) {
        self.picker_idx = 0;
        let discovery = self.session.discovery.clone();
        if query.trim().is_empty() {
            // Opens the picker with nothing in it
            discovery.search("").await;
            self.notify("Usage: /search <name>");
            return;
        }
        tokio::spawn(async move {
            discovery.search(&query).await;
        });
    }

    fn open_selected_conversation(&mut self) {
        let Some(summary) = self.view.conversations.summaries.get(self.selected_idx) else {
            return;
        };
        let thread = self.session.thread.clone();
        let peer = summary.peer.clone();
        self.focus = Focus::Input;
        tokio::spawn(async move {
            thread.select(peer).await;
        });
    }

    fn pick_search_result(&mut self) {
        let discovery = self.session.discovery.clone();
        let index = self.picker_idx;
        self.focus = Focus::Input;
        tokio::spawn(async move {
            discovery.pick(index).await;
        });
    }

    async fn submit_input(&mut self) -> anyhow::Result<()> {
        let text = self.session.composer.input().await;
        if CommandHandler::handle(self, &text).await? {
            self.session.composer.set_input("").await;
            return Ok(());
        }

        if !self.session.composer.can_send().await {
            if self.view.thread.peer.is_none() && !text.trim().is_empty() {
                self.notify("Open a conversation first");
            }
            return Ok(());
        }

        let composer = self.session.composer.clone();
        tokio::spawn(async move {
            composer.send().await;
        });
        Ok(())
    }

    // =========================================================================
    // Key handlers
    // =========================================================================

    pub fn handle_tab(&mut self) {
        self.focus = match self.focus {
            Focus::ConversationList => Focus::Input,
            Focus::Input => Focus::ConversationList,
        };
    }

    pub fn handle_up(&mut self) {
        if self.view.picker.open {
            self.picker_idx = self.picker_idx.saturating_sub(1);
        } else if self.focus == Focus::ConversationList {
            self.selected_idx = self.selected_idx.saturating_sub(1);
        }
    }

    pub fn handle_down(&mut self) {
        if self.view.picker.open {
            if self.picker_idx + 1 < self.view.picker.results.len() {
                self.picker_idx += 1;
            }
        } else if self.focus == Focus::ConversationList
            && self.selected_idx + 1 < self.view.conversations.summaries.len()
        {
            self.selected_idx += 1;
        }
    }

    pub async fn handle_enter(&mut self) -> anyhow::Result<()> {
        if self.view.picker.open && !self.view.picker.results.is_empty() {
            self.pick_search_result();
            return Ok(());
        }
        match self.focus {
            Focus::ConversationList => self.open_selected_conversation(),
            Focus::Input => self.submit_input().await?,
        }
        Ok(())
    }

    pub async fn handle_esc(&mut self) {
        if self.view.picker.open {
            self.session.discovery.close_picker().await;
        } else {
            self.session.composer.clear_error().await;
        }
    }

    pub async fn handle_char(&mut self, c: char) {
        if self.focus == Focus::ConversationList {
            // Typing jumps to the input line
            self.focus = Focus::Input;
        }
        self.session.composer.push_char(c).await;
    }

    pub async fn handle_backspace(&mut self) {
        if self.focus == Focus::Input {
            self.session.composer.pop_char().await;
        }
    }
}
