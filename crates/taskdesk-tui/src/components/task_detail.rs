use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use taskdesk_core::attachment::normalize_link;
use taskdesk_core::task::Task;
use taskdesk_views::DetailSnapshot;

use super::task_list::{priority_color, status_color};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Checklist,
    Attachments,
}

/// Cursor state for the detail screen. The task itself lives in the view.
#[derive(Debug, Default)]
pub struct DetailPane {
    focus: Focus,
    checklist_cursor: usize,
    attachment_cursor: usize,
}

impl DetailPane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn checklist_cursor(&self) -> usize {
        self.checklist_cursor
    }

    pub fn attachment_cursor(&self) -> usize {
        self.attachment_cursor
    }

    /// The attachment under the cursor, as stored.
    pub fn selected_attachment<'a>(&self, task: &'a Task) -> Option<&'a str> {
        task.attachments
            .get(self.attachment_cursor)
            .map(String::as_str)
    }

    /// Move within the focused section. `len` bounds are taken from the
    /// current snapshot so the cursor never points past the end.
    pub fn handle_key(&mut self, key: KeyEvent, checklist_len: usize, attachment_len: usize) {
        match key.code {
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::Checklist => Focus::Attachments,
                    Focus::Attachments => Focus::Checklist,
                };
            }
            KeyCode::Char('j') | KeyCode::Down => {
                let (cursor, len) = self.cursor_mut(checklist_len, attachment_len);
                if *cursor + 1 < len {
                    *cursor += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                let (cursor, _) = self.cursor_mut(checklist_len, attachment_len);
                *cursor = cursor.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn cursor_mut(&mut self, checklist_len: usize, attachment_len: usize) -> (&mut usize, usize) {
        match self.focus {
            Focus::Checklist => (&mut self.checklist_cursor, checklist_len),
            Focus::Attachments => (&mut self.attachment_cursor, attachment_len),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, snapshot: &DetailSnapshot) {
        let Some(task) = snapshot.task.as_ref() else {
            let text = if snapshot.loading {
                "Loading task..."
            } else {
                "Task not available"
            };
            let block = Block::default().title(" Task ").borders(Borders::ALL);
            frame.render_widget(Paragraph::new(text).block(block), area);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(7),
                Constraint::Min(3),
                Constraint::Length(task.attachments.len().min(6) as u16 + 2),
            ])
            .split(area);

        self.render_header(frame, chunks[0], task, snapshot.pending_writes);
        self.render_checklist(frame, chunks[1], task);
        self.render_attachments(frame, chunks[2], task);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, task: &Task, pending: usize) {
        let assignees: Vec<&str> = task
            .assigned_to
            .iter()
            .map(|a| a.name.as_deref().unwrap_or("?"))
            .collect();
        let mut lines = vec![
            Line::from(vec![
                Span::styled(task.priority.as_str(), priority_color(task.priority)),
                Span::raw("  "),
                Span::styled(task.status.as_str(), status_color(task.status)),
                Span::raw(format!("  due {}", task.due_date_label())),
            ]),
            Line::from(Span::styled(
                format!("Assigned: {}", assignees.join(", ")),
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(""),
            Line::from(task.description.as_str()),
        ];
        if pending > 0 {
            lines.push(Line::from(Span::styled(
                format!("saving {pending} change(s)..."),
                Style::default().fg(Color::Yellow),
            )));
        }
        let block = Block::default()
            .title(format!(" {} ", task.title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
            area,
        );
    }

    fn render_checklist(&self, frame: &mut Frame, area: Rect, task: &Task) {
        let items: Vec<ListItem> = task
            .checklist
            .iter()
            .map(|item| {
                let mark = if item.completed { "[x] " } else { "[ ] " };
                let style = if item.completed {
                    Style::default().fg(Color::DarkGray).crossed_out()
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(vec![
                    Span::raw(mark),
                    Span::styled(item.text.as_str(), style),
                ]))
            })
            .collect();
        let title = format!(
            " Todo checklist ({}/{}) ",
            task.completed_todo_count(),
            task.checklist.len()
        );
        let list = List::new(items)
            .block(section_block(title, self.focus == Focus::Checklist))
            .highlight_symbol("> ");
        let mut state = ListState::default();
        if self.focus == Focus::Checklist && !task.checklist.is_empty() {
            state.select(Some(self.checklist_cursor));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_attachments(&self, frame: &mut Frame, area: Rect, task: &Task) {
        let items: Vec<ListItem> = task
            .attachments
            .iter()
            .enumerate()
            .map(|(i, link)| ListItem::new(format!("{:02} {}", i + 1, normalize_link(link))))
            .collect();
        let list = List::new(items)
            .block(section_block(
                " Attachments ".to_string(),
                self.focus == Focus::Attachments,
            ))
            .highlight_symbol("> ");
        let mut state = ListState::default();
        if self.focus == Focus::Attachments && !task.attachments.is_empty() {
            state.select(Some(self.attachment_cursor));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }
}

fn section_block(title: String, active: bool) -> Block<'static> {
    let border = if active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use ratatui::backend::TestBackend;
    use taskdesk_service::test_helpers::sample_tasks;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn cursor_is_bounded_by_checklist() {
        let mut pane = DetailPane::new();
        pane.handle_key(key(KeyCode::Up), 3, 2);
        assert_eq!(pane.checklist_cursor(), 0);
        for _ in 0..5 {
            pane.handle_key(key(KeyCode::Char('j')), 3, 2);
        }
        assert_eq!(pane.checklist_cursor(), 2);
    }

    #[test]
    fn tab_switches_section() {
        let mut pane = DetailPane::new();
        pane.handle_key(key(KeyCode::Tab), 3, 2);
        assert_eq!(pane.focus(), Focus::Attachments);
        pane.handle_key(key(KeyCode::Down), 3, 2);
        assert_eq!(pane.attachment_cursor(), 1);
        assert_eq!(pane.checklist_cursor(), 0);

        let task = &sample_tasks()[0];
        assert_eq!(pane.selected_attachment(task), Some("http://already.com"));
    }

    #[test]
    fn render_marks_completed_items_and_normalizes_links() {
        let snapshot = DetailSnapshot {
            task: Some(sample_tasks().remove(0)),
            ..Default::default()
        };
        let pane = DetailPane::new();
        let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
        terminal
            .draw(|f| pane.render(f, f.area(), &snapshot))
            .unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("[ ] A"));
        assert!(text.contains("[x] B"));
        assert!(text.contains("https://example.com/doc"));
        assert!(text.contains("(1/2)"));
    }

    #[test]
    fn render_without_task() {
        let snapshot = DetailSnapshot {
            loading: true,
            ..Default::default()
        };
        let mut terminal = Terminal::new(TestBackend::new(40, 5)).unwrap();
        terminal
            .draw(|f| DetailPane::new().render(f, f.area(), &snapshot))
            .unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("Loading task..."));
    }
}
