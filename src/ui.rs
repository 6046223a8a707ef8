use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use item_config::{
    function, Collaborators, DirtyFlag, IconResolver, ItemListing, ItemRow, ItemStore,
    MessageLog, RemovalRequest,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

pub struct App<'a> {
    store: &'a dyn ItemStore,
    icons: &'a dyn IconResolver,
    pub listing: ItemListing,
    pub rows: Vec<ItemRow>,
    pub state: TableState,
    pub show_detail: bool,
    pub pending_removal: Option<RemovalRequest>,
    pub dirty: DirtyFlag,
    pub messages: MessageLog,
    pub status: String,
}

impl<'a> App<'a> {
    pub fn new(store: &'a dyn ItemStore, icons: &'a dyn IconResolver) -> Result<Self> {
        let listing = ItemListing::load(store)?;
        let mut app = Self {
            store,
            icons,
            rows: Vec::new(),
            listing,
            state: TableState::default(),
            show_detail: false,
            pending_removal: None,
            dirty: DirtyFlag::new(),
            messages: MessageLog::new(),
            status: String::new(),
        };
        app.rebuild_rows();
        Ok(app)
    }

    fn rebuild_rows(&mut self) {
        self.rows = self.listing.rows(self.icons);
        let selected = match self.state.selected() {
            _ if self.rows.is_empty() => None,
            Some(i) => Some(i.min(self.rows.len() - 1)),
            None => Some(0),
        };
        self.state.select(selected);
    }

    pub fn refresh(&mut self) {
        match self.listing.refresh(self.store) {
            Ok(()) => {
                self.dirty.reset();
                self.rebuild_rows();
            }
            Err(e) => self.status = format!("Refresh failed: {}", e),
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn request_removal(&mut self) {
        if let Some(index) = self.state.selected() {
            self.pending_removal = self.listing.request_removal(index);
        }
    }

    pub fn confirm_removal(&mut self) {
        let Some(request) = self.pending_removal.take() else {
            return;
        };
        let services = Collaborators::new(self.store, &self.dirty, &self.messages);
        match request.confirm(services) {
            Ok(_) => {
                self.status = self.messages.drain().join(" ");
                // The removal flow does not refresh on its own
                if self.dirty.is_dirty() {
                    self.refresh();
                }
            }
            Err(e) => self.status = format!("Removal failed: {}", e),
        }
    }

    pub fn cancel_removal(&mut self) {
        if let Some(request) = self.pending_removal.take() {
            request.cancel();
        }
    }

    pub fn next(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
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
        log::error!("UI error: {:?}", err);
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
            if app.pending_removal.is_some() {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Enter => app.confirm_removal(),
                    KeyCode::Char('n') | KeyCode::Esc => app.cancel_removal(),
                    _ => {}
                }
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Char('d') | KeyCode::Delete => app.request_removal(),
                KeyCode::Char('r') => app.refresh(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Item list
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[0]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[0], app);
    }

    render_status_bar(f, chunks[1], app);

    if let Some(request) = &app.pending_removal {
        render_confirm_dialog(f, &request.item().name);
    }
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Name", "Label", "Type", "Group Type", "Icon"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });
    let header = Row::new(header_cells).height(1);

    let rows = app.rows.iter().map(|row| {
        Row::new(vec![
            Cell::from(row.name.clone()),
            Cell::from(row.label.clone()),
            Cell::from(row.item_type.as_str()),
            Cell::from(row.group_type.clone().unwrap_or_default()),
            Cell::from(row.icon.clone()).style(Style::default().fg(Color::DarkGray)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(25),
            Constraint::Percentage(30),
            Constraint::Percentage(15),
            Constraint::Percentage(12),
            Constraint::Percentage(18),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Items ({}) ", app.rows.len())),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("> ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let item = match app.state.selected().and_then(|i| app.listing.get(i)) {
        Some(item) => item,
        None => return,
    };

    let function = match item.function.as_deref().map(function::decode) {
        Some(Ok(Some(f))) => f.to_string(),
        Some(Ok(None)) | None => "-".to_string(),
        Some(Err(e)) => format!("unreadable ({})", e),
    };

    let field = |name: &'static str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<11}", name), Style::default().fg(Color::Cyan)),
            Span::raw(value),
        ])
    };

    let lines = vec![
        field("Name", item.name.clone()),
        field("Label", item.label.clone()),
        field("Type", item.item_type.to_string()),
        field("Group type", item.group_type.map(|b| b.to_string()).unwrap_or_default()),
        field("Function", function),
        field("Category", item.category.clone().unwrap_or_default()),
        field("Tags", item.tags.iter().cloned().collect::<Vec<_>>().join(", ")),
        field("Groups", item.group_names.join(", ")),
    ];

    let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Details "));
    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = Vec::new();
    if !app.status.is_empty() {
        status_spans.push(Span::styled(
            format!(" {} ", app.status),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw("|"));
    }

    for (key, action) in [("Enter", "Details"), ("d", "Remove"), ("r", "Refresh"), ("↑/↓", "Nav")] {
        status_spans.push(Span::styled(format!(" {}", key), Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(format!(" {} |", action)));
    }
    status_spans.push(Span::styled(" q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_confirm_dialog(f: &mut Frame, name: &str) {
    let area = centered_rect(50, 5, f.size());
    let text = vec![
        Line::from(format!("Remove item {}?", name)),
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Red)),
            Span::raw(" remove   "),
            Span::styled("n", Style::default().fg(Color::Yellow)),
            Span::raw(" cancel"),
        ]),
    ];

    let dialog = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Remove Item ")
            .border_style(Style::default().fg(Color::Red)),
    );

    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let width = (u32::from(r.width) * u32::from(percent_x.min(100)) / 100) as u16;
    Rect {
        x: r.x + (r.width.saturating_sub(width)) / 2,
        y: r.y + (r.height.saturating_sub(height)) / 2,
        width,
        height: height.min(r.height),
    }
}
