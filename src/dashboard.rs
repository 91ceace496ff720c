use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

use crate::listing::JobListing;

pub fn run_dashboard(title: &str, listings: &[JobListing]) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut table_state = TableState::default();
    table_state.select((!listings.is_empty()).then_some(0));

    let outcome = event_loop(&mut terminal, title, listings, &mut table_state);

    // Restore terminal even when the loop failed
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    outcome
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    title: &str,
    listings: &[JobListing],
    table_state: &mut TableState,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, title, listings, table_state))?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Down | KeyCode::Char('j') => {
                        table_state.select(next(table_state.selected(), listings.len()));
                    }
                    KeyCode::Up | KeyCode::Char('k') => {
                        table_state.select(previous(table_state.selected(), listings.len()));
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Selection after moving down, wrapping at the end.
fn next(selected: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match selected {
        Some(i) if i + 1 < len => i + 1,
        _ => 0,
    })
}

/// Selection after moving up, wrapping at the start.
fn previous(selected: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match selected {
        Some(0) | None => len - 1,
        Some(i) => i.min(len) - 1,
    })
}

fn ui(f: &mut Frame, title: &str, listings: &[JobListing], table_state: &mut TableState) {
    let rects = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(4)])
        .margin(1)
        .split(f.size());

    let selected_style = Style::default().add_modifier(Modifier::REVERSED).fg(Color::Yellow);
    let normal_style = Style::default().fg(Color::White);
    let synthetic_style = Style::default().fg(Color::DarkGray);

    let header_cells = ["Title", "Company", "Location", "Salary", "Experience", "Source"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).style(normal_style).height(1).bottom_margin(1);

    let rows = listings.iter().map(|job| {
        let cells = vec![
            Cell::from(job.title.clone()),
            Cell::from(job.company.clone()),
            Cell::from(job.location.clone()),
            Cell::from(job.salary.clone()),
            Cell::from(job.experience.clone()),
            Cell::from(job.source.as_str()),
        ];
        Row::new(cells).style(if job.synthetic { synthetic_style } else { normal_style })
    });

    let col_widths = [
        Constraint::Percentage(30), // Title
        Constraint::Percentage(20), // Company
        Constraint::Percentage(15), // Location
        Constraint::Percentage(13), // Salary
        Constraint::Percentage(12), // Experience
        Constraint::Percentage(10), // Source
    ];

    let synthetic = listings.iter().filter(|j| j.synthetic).count();
    let table = Table::new(rows, col_widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(format!(
            "{title} ({} jobs, {synthetic} synthetic)",
            listings.len()
        )))
        .highlight_style(selected_style)
        .highlight_symbol(">> ");

    f.render_stateful_widget(table, rects[0], table_state);

    let details = match table_state.selected().and_then(|i| listings.get(i)) {
        Some(job) => vec![
            Line::from(format!("{} | posted {}", job.apply_link, job.posted_date)),
            Line::from("↑/↓ move  q quit"),
        ],
        None => vec![Line::from("No listings.  q quit")],
    };
    f.render_widget(
        Paragraph::new(details).block(Block::default().borders(Borders::ALL).title("Apply")),
        rects[1],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_wraps_both_ways() {
        assert_eq!(next(Some(0), 3), Some(1));
        assert_eq!(next(Some(2), 3), Some(0));
        assert_eq!(next(None, 3), Some(0));
        assert_eq!(previous(Some(0), 3), Some(2));
        assert_eq!(previous(Some(2), 3), Some(1));
        assert_eq!(previous(None, 3), Some(2));
    }

    #[test]
    fn empty_table_has_no_selection() {
        assert_eq!(next(Some(0), 0), None);
        assert_eq!(previous(None, 0), None);
    }
}
