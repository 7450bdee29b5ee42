use allocation_intake::admin::{AdminPanel, AdminRows, StoreKind};
use allocation_intake::db::{RecordId, Stored};
use allocation_intake::records::{ClientRecord, ProfileRecord};
use allocation_intake::report::format_brl;
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;

const PAGE_STEP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Clients,
    Profiles,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Clients => Page::Profiles,
            Page::Profiles => Page::Clients,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Clients => "Investor Clients",
            Page::Profiles => "Client Profiles",
        }
    }

    pub fn store(&self) -> StoreKind {
        match self {
            Page::Clients => StoreKind::Clients,
            Page::Profiles => StoreKind::Profiles,
        }
    }
}

/// One table row flattened for display
#[derive(Debug, Clone)]
pub struct DisplayRow {
    pub id: RecordId,
    pub cells: Vec<String>,
    pub details: Vec<(&'static str, String)>,
}

impl From<&Stored<ClientRecord>> for DisplayRow {
    fn from(stored: &Stored<ClientRecord>) -> Self {
        let r = &stored.record;
        let b = &r.breakdown;

        DisplayRow {
            id: stored.id,
            cells: vec![
                stored.id.to_string(),
                r.name.clone(),
                r.email.clone(),
                r.tier.to_string(),
                r.capital_band.to_string(),
                format_brl(b.total_net_worth),
            ],
            details: vec![
                ("Name", r.name.clone()),
                ("Phone", r.phone.clone()),
                ("Email", r.email.clone()),
                ("Tier", r.tier.to_string()),
                ("Band", r.capital_band.to_string()),
                ("Total net worth", format_brl(b.total_net_worth)),
                ("Investment", format_brl(b.investment_contribution)),
                ("Emergency reserve", format_brl(b.emergency_reserve)),
                ("Setup costs", format_brl(b.setup_costs)),
                ("Traffic costs", format_brl(b.traffic_costs)),
                ("Training", format_brl(b.training_budget)),
                ("Infrastructure", format_brl(b.infrastructure_budget)),
                ("Submitted", r.submitted_at.format("%Y-%m-%d %H:%M").to_string()),
            ],
        }
    }
}

impl From<&Stored<ProfileRecord>> for DisplayRow {
    fn from(stored: &Stored<ProfileRecord>) -> Self {
        let r = &stored.record;
        let yes_no = |flag: bool| (if flag { "yes" } else { "no" }).to_string();
        let file = |path: &Option<String>| path.clone().unwrap_or_else(|| "-".to_string());

        DisplayRow {
            id: stored.id,
            cells: vec![
                stored.id.to_string(),
                r.company_name.clone(),
                r.contact_name.clone(),
                r.city.clone(),
                r.email.clone(),
                r.phone.clone(),
            ],
            details: vec![
                ("Company", r.company_name.clone()),
                ("Website", r.website.clone()),
                ("Contact", r.contact_name.clone()),
                ("Email", r.email.clone()),
                ("Phone", r.phone.clone()),
                ("City", r.city.clone()),
                ("Address", r.address.clone()),
                ("No physical address", yes_no(r.no_physical_address)),
                ("Client type", r.client_type.join(", ")),
                ("Market segment", r.market_segment.join(", ")),
                ("Services", r.services.join(", ")),
                ("Payment methods", r.payment_methods.join(", ")),
                ("Capital", r.capital.clone()),
                ("Desired revenue", r.desired_revenue.clone()),
                ("Business", format!("{} / {}", r.business_field, r.business_type)),
                ("Employees", r.employees.clone()),
                ("CNPJ/CPF", r.cnpj_or_cpf.clone()),
                ("Market analysis", yes_no(r.market_analysis)),
                ("Return time", r.return_time.clone()),
                ("Source", r.source.clone()),
                ("Difficulties", r.difficulties.clone()),
                ("Context", r.context.clone()),
                ("Logo", file(&r.logo_path)),
                ("PDF", file(&r.pdf_path)),
                ("Video", file(&r.video_path)),
            ],
        }
    }
}

fn display_rows(rows: &AdminRows) -> Vec<DisplayRow> {
    match rows {
        AdminRows::Clients(rows) => rows.iter().map(DisplayRow::from).collect(),
        AdminRows::Profiles(rows) => rows.iter().map(DisplayRow::from).collect(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

pub struct App {
    panel: AdminPanel,
    export_dir: PathBuf,
    pub rows: Vec<DisplayRow>,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub pending_delete: Option<RecordId>,
    pub message: Option<StatusMessage>,
}

impl App {
    pub fn new(panel: AdminPanel, export_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut app = Self {
            panel,
            export_dir: export_dir.into(),
            rows: Vec::new(),
            state: TableState::default(),
            current_page: Page::Clients,
            show_detail: false,
            pending_delete: None,
            message: None,
        };
        app.reload()?;
        Ok(app)
    }

    /// Re-read the current store, keeping the cursor in range
    pub fn reload(&mut self) -> Result<()> {
        let rows = self.panel.list(self.current_page.store())?;
        self.rows = display_rows(&rows);

        let selected = match (self.rows.len(), self.state.selected()) {
            (0, _) => None,
            (len, Some(i)) => Some(i.min(len - 1)),
            (_, None) => Some(0),
        };
        self.state.select(selected);
        Ok(())
    }

    fn info(&mut self, text: String) {
        self.message = Some(StatusMessage { text, is_error: false });
    }

    fn error(&mut self, text: String) {
        self.message = Some(StatusMessage { text, is_error: true });
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_row(&self) -> Option<&DisplayRow> {
        self.state.selected().and_then(|i| self.rows.get(i))
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.pending_delete = None;
        self.state.select(None);
        if let Err(e) = self.reload() {
            self.error(format!("Load failed: {}", e));
        }
    }

    pub fn next(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + PAGE_STEP).min(len - 1),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = self.state.selected().map(|i| i.saturating_sub(PAGE_STEP)).unwrap_or(0);
        self.state.select(Some(i));
    }

    /// Arm deletion of the selected row; `confirm_delete` performs it
    pub fn request_delete(&mut self) {
        if let Some(id) = self.selected_row().map(|r| r.id) {
            self.pending_delete = Some(id);
            self.info(format!("Delete record #{}? (y/n)", id));
        }
    }

    pub fn cancel_delete(&mut self) {
        if self.pending_delete.take().is_some() {
            self.info("Delete cancelled".to_string());
        }
    }

    pub fn confirm_delete(&mut self) {
        let Some(id) = self.pending_delete.take() else {
            return;
        };

        match self.panel.delete(self.current_page.store(), id) {
            Ok(true) => self.info(format!("Record #{} deleted", id)),
            Ok(false) => self.info(format!("Record #{} was already gone", id)),
            Err(e) => {
                self.error(format!("Delete failed: {}", e));
                return;
            }
        }

        if let Err(e) = self.reload() {
            self.error(format!("Reload failed: {}", e));
        }
    }

    /// Write the current store's SQL dump into the export directory
    pub fn export(&mut self) {
        let result = self
            .panel
            .export_dump(self.current_page.store())
            .map_err(anyhow::Error::from)
            .and_then(|export| {
                std::fs::create_dir_all(&self.export_dir)?;
                let path = self.export_dir.join(&export.file_name);
                std::fs::write(&path, &export.bytes)?;
                Ok((path, export.sha256))
            });

        match result {
            Ok((path, sha)) => self.info(format!("Exported {} (sha256 {})", path.display(), &sha[..12])),
            Err(e) => self.error(format!("Export failed: {}", e)),
        }
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
        println!("Error: {:?}", err);
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
            // A pending delete swallows every key except the answer
            if app.pending_delete.is_some() {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(),
                    _ => app.cancel_delete(),
                }
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab | KeyCode::BackTab => app.next_page(),
                KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
                KeyCode::Char('x') => app.export(),
                KeyCode::Char('r') => {
                    if let Err(e) = app.reload() {
                        app.error(format!("Reload failed: {}", e));
                    }
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => {
                    if !app.rows.is_empty() {
                        app.state.select(Some(0));
                    }
                }
                KeyCode::End => {
                    if !app.rows.is_empty() {
                        app.state.select(Some(app.rows.len() - 1));
                    }
                }
                _ => {}
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

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Clients, Page::Profiles].iter().enumerate() {
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

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Records: {}", app.rows.len()),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        app.panel.store(app.current_page.store()).file_name(),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let (titles, widths): ([&str; 6], [Constraint; 6]) = match app.current_page {
        Page::Clients => (
            ["ID", "Name", "Email", "Tier", "Band", "Net Worth"],
            [
                Constraint::Length(6),
                Constraint::Length(24),
                Constraint::Length(28),
                Constraint::Length(14),
                Constraint::Length(6),
                Constraint::Length(18),
            ],
        ),
        Page::Profiles => (
            ["ID", "Company", "Contact", "City", "Email", "Phone"],
            [
                Constraint::Length(6),
                Constraint::Length(24),
                Constraint::Length(20),
                Constraint::Length(14),
                Constraint::Length(28),
                Constraint::Length(18),
            ],
        ),
    };

    let header_cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.rows.iter().map(|row| {
        let cells = row
            .cells
            .iter()
            .zip(widths.iter())
            .map(|(text, width)| match width {
                Constraint::Length(w) => Cell::from(truncate(text, *w as usize - 2)),
                _ => Cell::from(text.clone()),
            });
        Row::new(cells).height(1)
    });

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} ", app.current_page.title())),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, app.rows.len()),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(message) = &app.message {
        let color = if message.is_error { Color::Red } else { Color::Green };
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(message.text.clone(), Style::default().fg(color)));
    }

    let keys = [
        ("Enter", " Details | "),
        ("Tab", " Store | "),
        ("d", " Delete | "),
        ("x", " Export | "),
        ("↑/↓", " Nav | "),
    ];
    status_spans.push(Span::raw(" | "));
    for (key, label) in keys {
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let title = format!(" {} Details ", app.current_page.title());

    let Some(row) = app.selected_row() else {
        let no_selection = Paragraph::new("No record selected").block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(title),
        );
        f.render_widget(no_selection, area);
        return;
    };

    let mut content = vec![
        Line::from(""),
        Line::from(vec![Span::styled(
            format!("  RECORD #{}", row.id),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(""),
    ];

    let value_width = (area.width as usize).saturating_sub(6).max(12);
    for (label, value) in &row.details {
        content.push(Line::from(vec![
            Span::styled(
                format!("  {}: ", label),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(truncate(value, value_width.saturating_sub(label.len()).max(4))),
        ]));
    }

    content.push(Line::from(""));
    content.push(Line::from(vec![Span::styled(
        "  Press Enter to close",
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )]));

    let detail_panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(title),
    );

    f.render_widget(detail_panel, area);
}

/// Cut to `max_len` characters, marking the cut with `...`
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
