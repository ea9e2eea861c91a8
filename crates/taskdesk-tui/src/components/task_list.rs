use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};
use taskdesk_core::task::{Priority, Status, StatusFilter};
use taskdesk_views::TaskCard;

pub struct TaskList {
    cards: Vec<TaskCard>,
    list_state: ListState,
}

impl TaskList {
    pub fn new(cards: Vec<TaskCard>) -> Self {
        let mut list_state = ListState::default();
        if !cards.is_empty() {
            list_state.select(Some(0));
        }
        Self { cards, list_state }
    }

    /// Replace the cards, keeping the cursor on the same task when it is
    /// still listed.
    pub fn set_cards(&mut self, cards: Vec<TaskCard>) {
        let keep = self.selected_card().map(|c| c.id.clone());
        self.cards = cards;
        let idx = keep
            .and_then(|id| self.cards.iter().position(|c| c.id == id))
            .or(if self.cards.is_empty() { None } else { Some(0) });
        self.list_state.select(idx);
    }

    pub fn cards(&self) -> &[TaskCard] {
        &self.cards
    }

    /// Returns the currently highlighted card, if any.
    pub fn selected_card(&self) -> Option<&TaskCard> {
        self.cards.get(self.list_state.selected()?)
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let len = self.cards.len();
        if len == 0 {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0);
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if current + 1 < len {
                    self.list_state.select(Some(current + 1));
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if current > 0 {
                    self.list_state.select(Some(current - 1));
                }
            }
            KeyCode::Char('g') => self.list_state.select(Some(0)),
            KeyCode::Char('G') => self.list_state.select(Some(len - 1)),
            _ => {}
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, filter: StatusFilter, loading: bool) {
        let suffix = if loading { " loading..." } else { "" };
        let block = Block::default()
            .title(format!(" {} ({}){suffix} ", filter.label(), self.cards.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        if self.cards.is_empty() {
            let empty = List::new(vec![ListItem::new(Span::styled(
                "No tasks",
                Style::default().fg(Color::DarkGray),
            ))])
            .block(block);
            frame.render_widget(empty, area);
            return;
        }

        let items: Vec<ListItem> = self.cards.iter().map(card_item).collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan).bold())
            .highlight_symbol("> ");

        let mut state = self.list_state.clone();
        frame.render_stateful_widget(list, area, &mut state);
    }
}

fn card_item(card: &TaskCard) -> ListItem<'_> {
    let header = Line::from(vec![
        Span::styled(
            format!("{:<2} ", card.priority.symbol()),
            priority_color(card.priority),
        ),
        Span::styled(
            format!("[{}] ", card.status.as_str()),
            status_color(card.status),
        ),
        Span::raw(card.title.as_str()),
    ]);
    let details = Line::from(vec![Span::styled(
        format!(
            "     {}/{} done  {:.0}%  due {}  {} attachment(s)  {} assignee(s)",
            card.completed_todo_count,
            card.checklist_len,
            card.progress,
            card.due_date,
            card.attachment_count,
            card.assignee_images.len(),
        ),
        Style::default().fg(Color::DarkGray),
    )]);
    ListItem::new(vec![header, details])
}

pub fn priority_color(priority: Priority) -> Style {
    match priority {
        Priority::High => Style::default().fg(Color::LightRed).bold(),
        Priority::Medium => Style::default().fg(Color::Yellow),
        Priority::Low => Style::default().fg(Color::Blue),
    }
}

pub fn status_color(status: Status) -> Style {
    match status {
        Status::Pending => Style::default().fg(Color::Magenta),
        Status::InProgress => Style::default().fg(Color::Cyan),
        Status::Completed => Style::default().fg(Color::Green),
    }
}
