use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset as ChartDataset, GraphType, Paragraph, Row,
        Table, TableState, Wrap,
    },
    Frame, Terminal,
};
use ratio_desk::{format_value, trend_series, value_bounds, DialogueEngine, YEAR_COLUMN};
use std::io;

const SERIES_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Red,
    Color::Blue,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Chat,
    Trends,
    Data,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Chat => Page::Trends,
            Page::Trends => Page::Data,
            Page::Data => Page::Chat,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Chat => Page::Data,
            Page::Trends => Page::Chat,
            Page::Data => Page::Trends,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Chat => "Chat",
            Page::Trends => "Trends",
            Page::Data => "Data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Bot,
}

pub struct App {
    pub engine: DialogueEngine,
    pub transcript: Vec<(Speaker, String)>,
    pub input: String,
    pub current_page: Page,
    /// Numeric columns available for charting
    pub metrics: Vec<String>,
    pub metric_index: usize,
    pub table_state: TableState,
}

impl App {
    pub fn new(engine: DialogueEngine) -> Self {
        let metrics: Vec<String> = engine
            .dataset()
            .numeric_columns()
            .into_iter()
            .filter(|c| c != YEAR_COLUMN)
            .collect();

        let mut table_state = TableState::default();
        if !engine.dataset().is_empty() {
            table_state.select(Some(0));
        }

        Self {
            engine,
            transcript: vec![(
                Speaker::Bot,
                "Ask me about a company's financials, e.g. \"What was Apple's profit in 2023?\"".to_string(),
            )],
            input: String::new(),
            current_page: Page::Chat,
            metrics,
            metric_index: 0,
            table_state,
        }
    }

    /// Send the input line to the dialogue engine
    pub fn submit(&mut self) {
        let utterance = self.input.trim().to_string();
        self.input.clear();
        if utterance.is_empty() {
            return;
        }

        let response = self.engine.respond(&utterance);
        self.transcript.push((Speaker::User, utterance));
        self.transcript.push((Speaker::Bot, response));
    }

    pub fn selected_metric(&self) -> Option<&str> {
        self.metrics.get(self.metric_index).map(String::as_str)
    }

    pub fn next_metric(&mut self) {
        if !self.metrics.is_empty() {
            self.metric_index = (self.metric_index + 1) % self.metrics.len();
        }
    }

    pub fn previous_metric(&mut self) {
        if !self.metrics.is_empty() {
            self.metric_index = (self.metric_index + self.metrics.len() - 1) % self.metrics.len();
        }
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next_row(&mut self) {
        let len = self.engine.dataset().len();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.table_state.select(Some(i));
    }

    pub fn previous_row(&mut self) {
        let len = self.engine.dataset().len();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.table_state.select(Some(i));
    }

    /// Returns false when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return false,
            KeyCode::Tab => self.next_page(),
            KeyCode::BackTab => self.previous_page(),
            _ => match self.current_page {
                Page::Chat => match key.code {
                    KeyCode::Enter => self.submit(),
                    KeyCode::Backspace => {
                        self.input.pop();
                    }
                    KeyCode::Char(c) => self.input.push(c),
                    _ => {}
                },
                Page::Trends => match key.code {
                    KeyCode::Char('q') => return false,
                    KeyCode::Right | KeyCode::Char('l') => self.next_metric(),
                    KeyCode::Left | KeyCode::Char('h') => self.previous_metric(),
                    _ => {}
                },
                Page::Data => match key.code {
                    KeyCode::Char('q') => return false,
                    KeyCode::Down | KeyCode::Char('j') => self.next_row(),
                    KeyCode::Up | KeyCode::Char('k') => self.previous_row(),
                    _ => {}
                },
            },
        }
        true
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "UI loop failed");
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if !app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Chat => render_chat(f, chunks[1], app),
        Page::Trends => render_trends(f, chunks[1], app),
        Page::Data => render_data(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Chat, Page::Trends, Page::Data].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    let dataset = app.engine.dataset();
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Records: {}", dataset.len()),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Companies: {}", dataset.companies().len()),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_chat(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let lines: Vec<Line> = app
        .transcript
        .iter()
        .map(|(speaker, text)| match speaker {
            Speaker::User => Line::from(vec![
                Span::styled("You: ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
                Span::raw(text.clone()),
            ]),
            Speaker::Bot => Line::from(vec![
                Span::styled("Bot: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
                Span::raw(text.clone()),
            ]),
        })
        .collect();

    // Keep the newest lines in view
    let visible = chunks[0].height.saturating_sub(2) as usize;
    let scroll = lines.len().saturating_sub(visible) as u16;

    let transcript = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Conversation"))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(transcript, chunks[0]);

    let input = Paragraph::new(format!("> {}", app.input))
        .block(Block::default().borders(Borders::ALL).title("Ask"));
    f.render_widget(input, chunks[1]);
}

fn render_trends(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL);

    let Some(metric) = app.selected_metric() else {
        f.render_widget(Paragraph::new("No numeric metrics available").block(block), area);
        return;
    };
    let Some(series) = trend_series(app.engine.dataset(), metric) else {
        f.render_widget(Paragraph::new(format!("No data for {}", metric)).block(block), area);
        return;
    };

    let points: Vec<Vec<(f64, f64)>> = series.iter().map(|s| s.plot_points()).collect();
    let datasets: Vec<ChartDataset> = series
        .iter()
        .zip(points.iter())
        .enumerate()
        .map(|(i, (s, pts))| {
            ChartDataset::default()
                .name(s.company.clone())
                .marker(Marker::Dot)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(SERIES_COLORS[i % SERIES_COLORS.len()]))
                .data(pts)
        })
        .collect();

    let years: Vec<f64> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.year as f64))
        .collect();
    let x_min = years.iter().cloned().fold(f64::INFINITY, f64::min);
    let x_max = years.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let (x_min, x_max) = if x_min.is_finite() { (x_min, x_max.max(x_min + 1.0)) } else { (0.0, 1.0) };

    let (y_min, y_max) = match value_bounds(&series) {
        Some((lo, hi)) if lo < hi => (lo, hi),
        Some((v, _)) => (v - 1.0, v + 1.0),
        None => (0.0, 1.0),
    };

    let chart = Chart::new(datasets)
        .block(block.title(format!("{} Trend  (←/→ to change metric)", metric)))
        .x_axis(
            Axis::default()
                .title("Year")
                .style(Style::default().fg(Color::Gray))
                .bounds([x_min, x_max])
                .labels(vec![
                    Span::raw(format!("{}", x_min as i64)),
                    Span::raw(format!("{}", x_max as i64)),
                ]),
        )
        .y_axis(
            Axis::default()
                .title(metric.to_string())
                .style(Style::default().fg(Color::Gray))
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::raw(format_value(Some(y_min), metric)),
                    Span::raw(format_value(Some(y_max), metric)),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_data(f: &mut Frame, area: Rect, app: &mut App) {
    let dataset = app.engine.dataset();
    let ratio_names: Vec<&str> = dataset.ratios().iter().map(|r| r.column_name()).collect();

    let header_cells = ["Company", "Year"]
        .iter()
        .chain(ratio_names.iter())
        .map(|h| {
            Cell::from(h.to_string()).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = dataset
        .records()
        .iter()
        .map(|record| {
            let mut cells = vec![
                Cell::from(truncate(&record.company, 24)),
                Cell::from(record.year.to_string()),
            ];
            for ratio in dataset.ratios() {
                let value = record.ratio(*ratio).flatten();
                let color = if value.is_none() { Color::DarkGray } else { Color::White };
                cells.push(
                    Cell::from(format_value(value, ratio.column_name())).style(Style::default().fg(color)),
                );
            }
            Row::new(cells).height(1)
        })
        .collect();

    let mut widths = vec![Constraint::Length(26), Constraint::Length(6)];
    widths.extend(ratio_names.iter().map(|_| Constraint::Length(24)));

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Derived Ratios"))
        .highlight_style(Style::default().bg(Color::Blue).add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");

    f.render_stateful_widget(table, area, &mut app.table_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let state = app.engine.state();
    let slot = |v: Option<String>| v.unwrap_or_else(|| "—".to_string());

    let help = match app.current_page {
        Page::Chat => "Enter: send | Tab: next page | Esc: quit",
        Page::Trends => "←/→: metric | Tab: next page | q/Esc: quit",
        Page::Data => "↑/↓: scroll | Tab: next page | q/Esc: quit",
    };

    let line = Line::from(vec![
        Span::styled("Company: ", Style::default().fg(Color::DarkGray)),
        Span::raw(slot(state.company.clone())),
        Span::styled("  Metric: ", Style::default().fg(Color::DarkGray)),
        Span::raw(slot(state.metric.clone())),
        Span::styled("  Year: ", Style::default().fg(Color::DarkGray)),
        Span::raw(slot(state.year.map(|y| y.to_string()))),
        Span::raw("  |  "),
        Span::styled(help, Style::default().fg(Color::Cyan)),
    ]);

    let status = Paragraph::new(vec![line]).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratio_desk::{run_pipeline, MetricVocabulary, RawTable};
    use std::sync::Arc;

    fn app() -> App {
        let table = RawTable::from_strs(
            &["Company", "Year", "Net Income", "Total Assets"],
            &[&["Apple", "2023", "50", "200"], &["Apple", "2024", "60", "300"]],
        );
        let dataset = run_pipeline(table).unwrap().dataset;
        App::new(DialogueEngine::with_phrase_recognizer(
            Arc::new(dataset),
            Arc::new(MetricVocabulary::new()),
            &[],
        ))
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_and_submit() {
        let mut app = app();
        for c in "Apple profit".chars() {
            assert!(app.handle_key(key(KeyCode::Char(c))));
        }
        app.handle_key(key(KeyCode::Enter));

        assert!(app.input.is_empty());
        let (speaker, last) = app.transcript.last().unwrap();
        assert_eq!(*speaker, Speaker::Bot);
        assert_eq!(last, "Here is the data: Apple's Net Income in 2024 was $60.00.");
    }

    #[test]
    fn test_q_types_on_chat_page_but_quits_elsewhere() {
        let mut app = app();
        assert!(app.handle_key(key(KeyCode::Char('q'))));
        assert_eq!(app.input, "q");

        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.current_page, Page::Trends);
        assert!(!app.handle_key(key(KeyCode::Char('q'))));
    }

    #[test]
    fn test_metric_cycling_wraps() {
        let mut app = app();
        // Net Income, Total Assets, ROA (%)
        assert_eq!(app.metrics.len(), 3);
        app.previous_metric();
        assert_eq!(app.selected_metric(), Some("ROA (%)"));
        app.next_metric();
        assert_eq!(app.selected_metric(), Some("Net Income"));
    }

    #[test]
    fn test_row_navigation_wraps() {
        let mut app = app();
        app.previous_row();
        assert_eq!(app.table_state.selected(), Some(1));
        app.next_row();
        assert_eq!(app.table_state.selected(), Some(0));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Apple", 10), "Apple");
        assert_eq!(truncate("Procter & Gamble Company", 10), "Procter...");
    }
}
