use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::db::Database;
use crate::groups;
use crate::layout::Layout as FormLayout;
use crate::models::Report;
use crate::pdf;
use crate::render::format_date;
use crate::validate;

struct AppState {
    reports: Vec<Report>,
    selected: usize,
    scroll_offset: u16,
    status: Option<String>,
}

impl AppState {
    fn new(reports: Vec<Report>) -> Self {
        Self {
            reports,
            selected: 0,
            scroll_offset: 0,
            status: None,
        }
    }

    fn current_report(&self) -> Option<&Report> {
        self.reports.get(self.selected)
    }

    fn next(&mut self) {
        if !self.reports.is_empty() && self.selected < self.reports.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    fn export_current(
        &self,
        layout: &FormLayout,
        template: Option<&Path>,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let Some(report) = self.current_report() else {
            return Err(anyhow::anyhow!("No report selected"));
        };
        let path = output_dir.join(pdf::default_file_name(report));
        let average = groups::summary_group_average(report, &self.reports);
        pdf::create_pdf(report, layout, Some(average), template, &path)?;
        Ok(path)
    }

    fn delete_current(&mut self, db: &Database) -> Result<()> {
        let Some(id) = self.current_report().and_then(|r| r.id) else {
            return Ok(());
        };
        db.delete_report(id)?;
        self.reports.remove(self.selected);
        if self.selected >= self.reports.len() && self.selected > 0 {
            self.selected -= 1;
        }
        self.scroll_offset = 0;
        Ok(())
    }
}

pub fn run_browse(
    db: &Database,
    layout: &FormLayout,
    template: Option<&Path>,
    output_dir: &Path,
) -> Result<()> {
    let reports = db.list_reports(None)?;
    if reports.is_empty() {
        println!("No reports found.");
        return Ok(());
    }

    let mut state = AppState::new(reports);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, db, layout, template, output_dir);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    db: &Database,
    layout: &FormLayout,
    template: Option<&Path>,
    output_dir: &Path,
) -> Result<()> {
    let mut list_state = ListState::default();
    list_state.select(Some(0));

    loop {
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let prev_selected = state.selected;
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char('p') => {
                    state.status = Some(match state.export_current(layout, template, output_dir) {
                        Ok(path) => format!("Wrote {}", path.display()),
                        Err(e) => {
                            warn!("export failed: {:#}", e);
                            format!("Export failed: {}", e)
                        }
                    });
                }
                KeyCode::Char('d') => {
                    state.status = Some(match state.delete_current(db) {
                        Ok(()) => "Deleted".to_string(),
                        Err(e) => format!("Delete failed: {}", e),
                    });
                    if state.reports.is_empty() {
                        break;
                    }
                    list_state.select(Some(state.selected));
                }
                _ => {}
            }
            if state.selected != prev_selected {
                list_state.select(Some(state.selected));
                state.status = None;
            }
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(frame.area());

    // Left panel: report list
    let items: Vec<ListItem> = state
        .reports
        .iter()
        .map(|report| {
            let valid_icon = if validate::violations(report).is_empty() {
                " "
            } else {
                "!"
            };
            let name = if report.name.is_empty() {
                "(unnamed)".to_string()
            } else if report.name.chars().count() > 24 {
                format!("{}...", report.name.chars().take(21).collect::<String>())
            } else {
                report.name.clone()
            };
            ListItem::new(format!(
                "{} #{:<4} {:<10} {}",
                valid_icon,
                report.id.unwrap_or_default(),
                report.report_type().title(),
                name
            ))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Reports ({}) ", state.reports.len())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: report detail
    let detail = build_detail(state);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Footer help
    let help_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    let footer = match &state.status {
        Some(status) => format!(" {}", status),
        None => " j/k:navigate  J/K:scroll  p:export PDF  d:delete  q:quit".to_string(),
    };
    let help = Paragraph::new(footer).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, help_area[1]);
}

fn heading(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
}

fn build_detail(state: &AppState) -> Text<'static> {
    let Some(report) = state.current_report() else {
        return Text::raw("No report selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(heading(&report.title()));
    lines.push(Line::from(format!(
        "{} {}  SSN {}  UIC {}  {}",
        report.rate, report.desig, report.ssn, report.uic, report.station
    )));
    let code = |c: Option<String>| c.unwrap_or_else(|| "-".to_string());
    lines.push(Line::from(format!(
        "Group: {}  Status: {}  Billet: {}",
        code(report.group.map(|g| g.to_string())),
        code(report.promotion_status.map(|s| s.to_string())),
        code(report.billet_subcategory.map(|b| b.to_string())),
    )));
    lines.push(Line::from(format!(
        "Period: {} to {}  Reported: {}  Counseled: {}",
        format_date(report.period_start),
        format_date(report.period_end),
        format_date(report.date_reported),
        format_date(report.date_counseled),
    )));
    if !report.senior_name.is_empty() {
        lines.push(Line::from(format!(
            "Senior: {} {} {}",
            report.senior_name, report.senior_grade, report.senior_title
        )));
    }
    lines.push(Line::from(""));

    lines.push(heading("Traits"));
    for t in report.trait_scores() {
        let score = match t.score {
            Some(0) => "NOB".to_string(),
            Some(s) => s.to_string(),
            None => "-".to_string(),
        };
        lines.push(Line::from(format!("  {:<40} {}", t.label, score)));
    }
    lines.push(Line::from(format!(
        "  Member average {}   Summary group average {}",
        report.member_average(),
        groups::summary_group_average(report, &state.reports)
    )));
    if let Some(rec) = report.indiv_promo_rec {
        lines.push(Line::from(format!("  Promotion recommendation: {}", rec.label())));
    }
    lines.push(Line::from(""));

    let violations = validate::violations(report);
    if violations.is_empty() {
        lines.push(Line::from(Span::styled(
            "Passes validation",
            Style::default().fg(Color::Green),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            format!("{} problem(s)", violations.len()),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        for v in violations {
            lines.push(Line::from(Span::styled(
                format!("  - {}", v),
                Style::default().fg(Color::Red),
            )));
        }
    }
    for w in validate::field_warnings(report) {
        lines.push(Line::from(Span::styled(
            format!("  ~ {}", w),
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.push(Line::from(""));

    if !report.comments.is_empty() {
        lines.push(heading("Comments"));
        for line in textwrap::fill(&report.comments, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }

    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportType;

    fn state_with(n: usize) -> AppState {
        let reports = (1..=n)
            .map(|id| {
                let mut r = Report::new(ReportType::Eval);
                r.id = Some(id as i64);
                r
            })
            .collect();
        AppState::new(reports)
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let mut state = state_with(2);
        state.prev();
        assert_eq!(state.selected, 0);
        state.next();
        state.next();
        assert_eq!(state.selected, 1);
        state.scroll_down();
        assert_eq!(state.scroll_offset, 3);
        state.prev();
        assert_eq!(state.scroll_offset, 0);
    }

    #[test]
    fn test_detail_lists_problems() {
        let state = state_with(1);
        let text = build_detail(&state);
        let rendered: Vec<String> = text.lines.iter().map(|l| l.to_string()).collect();
        assert!(rendered.iter().any(|l| l.contains("problem(s)")));
        assert!(rendered.iter().any(|l| l.contains("Member average 0.00")));
    }
}
