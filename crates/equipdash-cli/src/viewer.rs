use std::io;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use equipdash_core::{
    derive, DashboardAction, DashboardController, DashboardState, DashboardView, SummaryClient,
    SummaryPayload, UploadFile,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{BarChart, Block, Borders, Paragraph, Row, Table, Wrap};
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing::warn;

const KPI_COLORS: [Color; 4] = [Color::Blue, Color::Green, Color::Yellow, Color::Red];

#[derive(Default)]
struct ViewerState {
    /// Upload path being typed, when the prompt is open.
    prompt: Option<String>,
    notice: Option<String>,
}

enum KeyAction {
    None,
    Quit,
    Send(DashboardAction),
    SubmitPath(String),
}

impl ViewerState {
    fn on_key(&mut self, code: KeyCode, dashboard: &DashboardState) -> KeyAction {
        if let Some(path) = self.prompt.as_mut() {
            match code {
                KeyCode::Esc => self.prompt = None,
                KeyCode::Enter => {
                    let path = path.trim().to_string();
                    self.prompt = None;
                    return KeyAction::SubmitPath(path);
                }
                KeyCode::Backspace => {
                    path.pop();
                }
                KeyCode::Char(c) => path.push(c),
                _ => {}
            }
            return KeyAction::None;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
            KeyCode::Char('r') => {
                self.notice = None;
                KeyAction::Send(DashboardAction::Refresh)
            }
            KeyCode::Char('e') => {
                self.notice = Some("Report export requested.".to_string());
                KeyAction::Send(DashboardAction::Export)
            }
            KeyCode::Char('u') => {
                if dashboard.loading {
                    self.notice = Some("Upload already in progress.".to_string());
                } else {
                    self.notice = None;
                    self.prompt = Some(String::new());
                }
                KeyAction::None
            }
            _ => KeyAction::None,
        }
    }
}

pub async fn run_viewer<C: SummaryClient + 'static>(controller: DashboardController<C>) -> Result<()> {
    let updates = controller.subscribe();
    let (actions, rx) = mpsc::channel(16);
    let worker = tokio::spawn(controller.run(rx));
    actions.send(DashboardAction::Mount).await?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut viewer = ViewerState::default();

    let run_result = async {
        loop {
            let dashboard = updates.borrow().clone();

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    match viewer.on_key(key.code, &dashboard) {
                        KeyAction::None => {}
                        KeyAction::Quit => break,
                        KeyAction::Send(action) => actions.send(action).await?,
                        KeyAction::SubmitPath(path) => {
                            if let Some(file) = read_upload(&path, &mut viewer).await {
                                actions.send(DashboardAction::Upload(file)).await?;
                            }
                        }
                    }
                }
            }

            terminal.draw(|frame| draw_ui(frame.size(), frame, &dashboard, &viewer))?;
        }

        Ok::<(), anyhow::Error>(())
    }
    .await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    drop(actions);
    worker.abort();

    run_result
}

/// An empty path is forwarded as "no file selected" and ignored downstream.
async fn read_upload(path: &str, viewer: &mut ViewerState) -> Option<Option<UploadFile>> {
    if path.is_empty() {
        return Some(None);
    }
    match UploadFile::read(path).await {
        Ok(file) => Some(Some(file)),
        Err(err) => {
            warn!(%path, error = %err, "cannot read upload file");
            viewer.notice = Some(format!("Cannot read {path}: {err}"));
            None
        }
    }
}

fn draw_ui(area: Rect, frame: &mut ratatui::Frame<'_>, dashboard: &DashboardState, viewer: &ViewerState) {
    let banner_height = if dashboard.error.is_some() { 3 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(banner_height),
            Constraint::Length(4),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    frame.render_widget(render_header(dashboard), rows[0]);

    if let Some(message) = &dashboard.error {
        let banner = Paragraph::new(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Error"));
        frame.render_widget(banner, rows[1]);
    }

    if let Some(payload) = &dashboard.payload {
        let view = derive(payload);
        render_kpis(frame, rows[2], &view);

        let content = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
            .split(rows[3]);
        render_distribution(frame, content[0], &view);
        render_records(frame, content[1], &view);
    }

    frame.render_widget(render_footer(viewer), rows[4]);
}

fn render_header(dashboard: &DashboardState) -> Paragraph<'static> {
    let subtitle = match &dashboard.payload {
        Some(payload) => latest_label(payload),
        None => "Please upload a CSV file".to_string(),
    };
    let action = if dashboard.loading {
        Span::styled("Processing...", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    } else {
        Span::styled("[u] Upload CSV", Style::default().fg(Color::Cyan))
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("Dashboard Overview  ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            action,
            Span::raw("  [e] Download Report  [r] Refresh  [q] Quit"),
        ]),
        Line::from(Span::styled(subtitle, Style::default().fg(Color::Gray))),
    ];

    Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("equipdash"))
}

fn latest_label(payload: &SummaryPayload) -> String {
    match payload.uploaded_at {
        Some(ts) => format!("Latest Data: {} ({})", payload.filename, ts.format("%Y-%m-%d %H:%M")),
        None => format!("Latest Data: {}", payload.filename),
    }
}

fn render_kpis(frame: &mut ratatui::Frame<'_>, area: Rect, view: &DashboardView) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25); 4])
        .split(area);

    for ((kpi, color), col) in view.kpis.iter().zip(KPI_COLORS).zip(cols.iter().copied()) {
        let card = Paragraph::new(Line::from(vec![
            Span::styled(kpi.value.to_string(), Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::raw(" "),
            Span::styled(kpi.unit, Style::default().fg(Color::Gray)),
        ]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(kpi.title.to_uppercase()),
        );
        frame.render_widget(card, col);
    }
}

fn render_distribution(frame: &mut ratatui::Frame<'_>, area: Rect, view: &DashboardView) {
    let bars: Vec<(&str, u64)> = view.chart.pairs().collect();
    let slots = u16::try_from(bars.len().max(1)).unwrap_or(u16::MAX);
    let bar_width = (area.width.saturating_sub(2) / slots).saturating_sub(1).clamp(3, 12);

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("Equipment Distribution"))
        .bar_width(bar_width)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Blue))
        .value_style(Style::default().fg(Color::Black).bg(Color::Blue))
        .data(bars.as_slice());

    frame.render_widget(chart, area);
}

fn render_records(frame: &mut ratatui::Frame<'_>, area: Rect, view: &DashboardView) {
    let rows = view.preview_rows.iter().map(|row| {
        Row::new(vec![
            row.equipment_name.clone(),
            row.equipment_type.clone(),
            row.flowrate.to_string(),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(45),
            Constraint::Percentage(35),
            Constraint::Percentage(20),
        ],
    )
    .header(
        Row::new(vec!["Name", "Type", "Flow"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("Recent Records"));

    frame.render_widget(table, area);
}

fn render_footer(viewer: &ViewerState) -> Paragraph<'static> {
    let line = match (&viewer.prompt, &viewer.notice) {
        (Some(path), _) => Line::from(vec![
            Span::styled("CSV path: ", Style::default().fg(Color::Cyan)),
            Span::raw(path.clone()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
        (None, Some(notice)) => Line::from(notice.clone()),
        (None, None) => Line::from(" "),
    };

    Paragraph::new(line).block(Block::default().borders(Borders::ALL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_prompt_collects_path_and_submits() {
        let mut viewer = ViewerState::default();
        let dashboard = DashboardState::default();

        assert!(matches!(viewer.on_key(KeyCode::Char('u'), &dashboard), KeyAction::None));
        for c in "a.csvx".chars() {
            viewer.on_key(KeyCode::Char(c), &dashboard);
        }
        viewer.on_key(KeyCode::Backspace, &dashboard);

        match viewer.on_key(KeyCode::Enter, &dashboard) {
            KeyAction::SubmitPath(path) => assert_eq!(path, "a.csv"),
            _ => panic!("expected path submission"),
        }
        assert!(viewer.prompt.is_none());
    }

    #[test]
    fn upload_trigger_is_disabled_while_loading() {
        let mut viewer = ViewerState::default();
        let dashboard = DashboardState {
            loading: true,
            ..DashboardState::default()
        };

        viewer.on_key(KeyCode::Char('u'), &dashboard);

        assert!(viewer.prompt.is_none());
        assert!(viewer.notice.is_some());
    }

    #[test]
    fn quit_keys_are_ignored_inside_prompt() {
        let mut viewer = ViewerState::default();
        let dashboard = DashboardState::default();
        viewer.on_key(KeyCode::Char('u'), &dashboard);

        assert!(matches!(viewer.on_key(KeyCode::Char('q'), &dashboard), KeyAction::None));
        assert!(matches!(viewer.on_key(KeyCode::Esc, &dashboard), KeyAction::None));
        assert!(viewer.prompt.is_none());
        assert!(matches!(viewer.on_key(KeyCode::Char('q'), &dashboard), KeyAction::Quit));
    }

    #[test]
    fn refresh_and_export_map_to_actions() {
        let mut viewer = ViewerState::default();
        let dashboard = DashboardState::default();

        assert!(matches!(
            viewer.on_key(KeyCode::Char('r'), &dashboard),
            KeyAction::Send(DashboardAction::Refresh)
        ));
        assert!(matches!(
            viewer.on_key(KeyCode::Char('e'), &dashboard),
            KeyAction::Send(DashboardAction::Export)
        ));
    }

    #[tokio::test]
    async fn empty_path_is_forwarded_as_no_file() {
        let mut viewer = ViewerState::default();

        assert_eq!(read_upload("", &mut viewer).await, Some(None));
        assert!(viewer.notice.is_none());
    }

    #[tokio::test]
    async fn unreadable_path_sets_notice() {
        let mut viewer = ViewerState::default();

        assert_eq!(read_upload("/nonexistent/equipdash.csv", &mut viewer).await, None);
        assert!(viewer.notice.is_some());
    }
}
