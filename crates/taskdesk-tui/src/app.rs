use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use taskdesk_core::task::StatusFilter;
use taskdesk_service::TaskService;
use taskdesk_views::open::{LinkOpener, SystemOpener};
use taskdesk_views::{DetailSnapshot, Session, TaskDetailView, TaskListView};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::components::task_detail::{DetailPane, Focus};
use crate::components::task_list::TaskList;

/// What the app is currently showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Filtered task list with status tabs
    TaskList,
    /// One task with its checklist and attachments
    TaskDetail,
    /// Key binding overlay
    Help,
}

struct DetailScreen {
    view: TaskDetailView,
    pane: DetailPane,
}

pub struct App {
    rt: Runtime,
    service: Arc<dyn TaskService>,
    session: Session,
    opener: Box<dyn LinkOpener>,
    list_view: TaskListView,
    list: TaskList,
    detail: Option<DetailScreen>,
    mode: Mode,
    status_message: Option<String>,
}

impl App {
    pub fn new(service: Arc<dyn TaskService>, session: Session) -> Result<Self> {
        let rt = Runtime::new()?;
        let list_view = TaskListView::new(service.clone());
        let mut app = Self {
            rt,
            service,
            session,
            opener: Box::new(SystemOpener),
            list_view,
            list: TaskList::new(vec![]),
            detail: None,
            mode: Mode::TaskList,
            status_message: None,
        };
        app.load_list(StatusFilter::All);
        Ok(app)
    }

    /// Replace how attachment links are opened.
    pub fn with_opener(mut self, opener: Box<dyn LinkOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn filter(&self) -> StatusFilter {
        self.list_view.filter()
    }

    pub fn task_list(&self) -> &TaskList {
        &self.list
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn detail_snapshot(&self) -> Option<DetailSnapshot> {
        self.detail.as_ref().map(|d| d.view.snapshot())
    }

    /// `q` quits only from the task list; elsewhere it steps back.
    pub fn is_top_level(&self) -> bool {
        self.mode == Mode::TaskList
    }

    /// True while checklist writes are outstanding, so the event loop
    /// keeps redrawing until they settle.
    pub fn needs_polling(&self) -> bool {
        self.detail
            .as_ref()
            .map(|d| d.view.snapshot().pending_writes > 0)
            .unwrap_or(false)
    }

    /// Wait up to `timeout` for outstanding checklist writes. Returns
    /// false if some were still in flight.
    pub fn flush_writes(&self, timeout: Duration) -> bool {
        let Some(detail) = self.detail.as_ref() else {
            return true;
        };
        let mut rx = detail.view.subscribe();
        self.rt.block_on(async {
            matches!(
                tokio::time::timeout(timeout, rx.wait_for(|s| s.pending_writes == 0)).await,
                Ok(Ok(_))
            )
        })
    }

    fn load_list(&mut self, filter: StatusFilter) {
        match self.rt.block_on(self.list_view.load(filter)) {
            Ok(outcome) => debug!("task list load ({filter}): {outcome:?}"),
            Err(e) => warn!("task list load ({filter}) failed: {e}"),
        }
        self.list.set_cards(self.list_view.snapshot().cards());
    }

    fn change_filter(&mut self, filter: StatusFilter) {
        self.status_message = None;
        if let Err(e) = self.rt.block_on(self.list_view.set_filter(filter)) {
            warn!("switching to {filter} failed: {e}");
        }
        self.list.set_cards(self.list_view.snapshot().cards());
    }

    fn open_detail(&mut self, task_id: &str) {
        let view = {
            let _guard = self.rt.enter();
            TaskDetailView::new(self.service.clone(), task_id)
        };
        if let Err(e) = self.rt.block_on(view.load()) {
            warn!("opening task {task_id} failed: {e}");
        }
        info!("viewing task {task_id}");
        self.detail = Some(DetailScreen {
            view,
            pane: DetailPane::new(),
        });
        self.status_message = None;
        self.mode = Mode::TaskDetail;
    }

    fn close_detail(&mut self) {
        if let Some(detail) = self.detail.take() {
            if detail.view.snapshot().pending_writes > 0 {
                debug!(
                    "leaving task {} with writes in flight",
                    detail.view.task_id()
                );
            }
            detail.view.close();
        }
        self.mode = Mode::TaskList;
        self.status_message = None;
        // pick up checklist changes in the cards
        self.load_list(self.list_view.filter());
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            Mode::TaskList => self.handle_task_list(key),
            Mode::TaskDetail => self.handle_task_detail(key),
            Mode::Help => {
                self.mode = if self.detail.is_some() {
                    Mode::TaskDetail
                } else {
                    Mode::TaskList
                };
            }
        }
    }

    fn handle_task_list(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Tab | KeyCode::Char('l') | KeyCode::Right => {
                let next = self.list_view.filter().next();
                self.change_filter(next);
            }
            KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Left => {
                let prev = self.list_view.filter().prev();
                self.change_filter(prev);
            }
            KeyCode::Char(c @ '1'..='4') => {
                let idx = c as usize - '1' as usize;
                if let Some(filter) = StatusFilter::TABS.get(idx).copied() {
                    self.change_filter(filter);
                }
            }
            KeyCode::Char('r') => {
                self.status_message = None;
                self.load_list(self.list_view.filter());
            }
            KeyCode::Enter => {
                if let Some(id) = self.list.selected_card().map(|c| c.id.clone()) {
                    self.open_detail(&id);
                }
            }
            KeyCode::Char('?') => self.mode = Mode::Help,
            _ => self.list.handle_key(key),
        }
    }

    fn handle_task_detail(&mut self, key: KeyEvent) {
        let Some(detail) = self.detail.as_mut() else {
            self.mode = Mode::TaskList;
            return;
        };
        let snapshot = detail.view.snapshot();
        let (checklist_len, attachment_len) = snapshot
            .task
            .as_ref()
            .map(|t| (t.checklist.len(), t.attachments.len()))
            .unwrap_or((0, 0));

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Backspace => self.close_detail(),
            KeyCode::Char(' ') | KeyCode::Char('x') => {
                let index = detail.pane.checklist_cursor();
                if detail.view.toggle_checklist_item(index).is_none() {
                    debug!("nothing to toggle at {index}");
                }
            }
            KeyCode::Enter => match detail.pane.focus() {
                Focus::Checklist => {
                    detail.view.toggle_checklist_item(detail.pane.checklist_cursor());
                }
                Focus::Attachments => self.open_selected_attachment(),
            },
            KeyCode::Char('o') => self.open_selected_attachment(),
            KeyCode::Char('r') => {
                if let Err(e) = self.rt.block_on(detail.view.load()) {
                    warn!("reloading task {} failed: {e}", detail.view.task_id());
                }
            }
            KeyCode::Char('?') => self.mode = Mode::Help,
            _ => detail.pane.handle_key(key, checklist_len, attachment_len),
        }
    }

    fn open_selected_attachment(&mut self) {
        let Some(detail) = self.detail.as_ref() else {
            return;
        };
        let snapshot = detail.view.snapshot();
        let Some(link) = snapshot
            .task
            .as_ref()
            .and_then(|t| detail.pane.selected_attachment(t))
        else {
            self.status_message = Some("No attachment selected".into());
            return;
        };
        self.status_message = Some(match detail.view.open_attachment(link, self.opener.as_ref()) {
            Ok(url) => format!("Opened {url}"),
            Err(e) => {
                warn!("{e}");
                format!("{e}")
            }
        });
    }

    pub fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        self.render_title_bar(frame, layout[0]);
        match (&self.mode, &self.detail) {
            (Mode::TaskDetail, Some(detail)) | (Mode::Help, Some(detail)) => {
                detail.pane.render(frame, layout[1], &detail.view.snapshot())
            }
            _ => {
                let snap = self.list_view.snapshot();
                self.list.render(frame, layout[1], snap.filter, snap.loading)
            }
        }
        self.render_status_bar(frame, layout[2]);

        if self.mode == Mode::Help {
            self.render_help(frame, area);
        }
    }

    fn render_title_bar(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            " taskdesk ",
            Style::default().bold().fg(Color::Cyan),
        )];
        if let Some(user) = self.session.user() {
            spans.push(Span::raw("| "));
            spans.push(Span::styled(user.name, Style::default().fg(Color::Yellow)));
            spans.push(Span::styled(
                format!(" ({}) ", user.role),
                Style::default().fg(Color::DarkGray),
            ));
        }
        let snap = self.list_view.snapshot();
        for tab in &snap.tabs {
            let style = if tab.filter == snap.filter {
                Style::default().fg(Color::Black).bg(Color::Cyan).bold()
            } else {
                Style::default().fg(Color::Gray)
            };
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                format!(" {} {} ", tab.label(), tab.count),
                style,
            ));
        }
        frame.render_widget(Line::from(spans), area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let notice = match self.mode {
            Mode::TaskList => self.list_view.snapshot().notice,
            _ => self.detail.as_ref().and_then(|d| d.view.snapshot().notice),
        };
        let line = if let Some(msg) = self.status_message.clone().or(notice) {
            Line::from(Span::styled(
                format!(" {msg}"),
                Style::default().fg(Color::Yellow),
            ))
        } else {
            let hints = match self.mode {
                Mode::TaskList => " Tab/h/l:filter  j/k:move  Enter:open  r:refresh  ?:help  q:quit",
                _ => " space:toggle  Tab:section  o:open link  r:reload  Esc:back  ?:help",
            };
            Line::from(Span::styled(hints, Style::default().fg(Color::DarkGray)))
        };
        frame.render_widget(line, area);
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let popup = centered_rect(60, 60, area);
        let text = vec![
            Line::from(Span::styled("Task list", Style::default().bold())),
            Line::from("  Tab / h / l    switch status tab"),
            Line::from("  1-4            jump to tab"),
            Line::from("  j / k / g / G  move"),
            Line::from("  Enter          open task"),
            Line::from("  r              refresh"),
            Line::from(""),
            Line::from(Span::styled("Task", Style::default().bold())),
            Line::from("  space / x      toggle checklist item"),
            Line::from("  Tab            checklist / attachments"),
            Line::from("  o              open attachment"),
            Line::from("  Esc / q        back"),
        ];
        let block = Block::default()
            .title(" Keys ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(text).block(block), popup);
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
