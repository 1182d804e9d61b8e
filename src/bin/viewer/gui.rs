use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    style::{Color, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame, Terminal,
};
use std::{error::Error, io, time::Duration};

/// One dataset, already projected onto the unit disc.
pub struct Plot {
    pub title: String,
    pub points: Vec<(f64, f64)>,
}

struct App {
    plots: Vec<Plot>,
    current: usize,
    rim: Vec<(f64, f64)>,
}

impl App {
    fn new(plots: Vec<Plot>) -> App {
        let rim = (0..360)
            .step_by(5)
            .map(|d| {
                let theta = (d as f64).to_radians();
                (theta.cos(), theta.sin())
            })
            .collect();

        App {
            plots,
            current: 0,
            rim,
        }
    }

    fn next(&mut self) {
        self.current = (self.current + 1) % self.plots.len();
    }

    fn previous(&mut self) {
        self.current = (self.current + self.plots.len() - 1) % self.plots.len();
    }
}

pub fn engage_gui(plots: Vec<Plot>) -> Result<(), Box<dyn Error>> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, App::new(plots));

    // restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, &app))?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Right | KeyCode::Down => app.next(),
                    KeyCode::Left | KeyCode::Up => app.previous(),
                    _ => {}
                }
            }
        }
    }
}

fn ui(f: &mut Frame, app: &App) {
    let plot = &app.plots[app.current];
    let title = format!(
        " {} [{}/{}]  <Left>/<Right> switch  <Q> quit ",
        plot.title,
        app.current + 1,
        app.plots.len()
    );
    let labels = || -> Vec<Span<'static>> {
        ["-1.0", "0.0", "1.0"]
            .iter()
            .cloned()
            .map(Span::from)
            .collect()
    };

    let chart = Chart::new(vec![
        Dataset::default()
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::DarkGray))
            .data(&app.rim),
        Dataset::default()
            .name(plot.title.as_str())
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Magenta))
            .data(&plot.points),
    ])
    .block(Block::default().title(title).borders(Borders::ALL))
    .x_axis(
        Axis::default()
            .style(Style::default().fg(Color::White))
            .bounds([-1.1, 1.1])
            .labels(labels()),
    )
    .y_axis(
        Axis::default()
            .style(Style::default().fg(Color::White))
            .bounds([-1.1, 1.1])
            .labels(labels()),
    );

    f.render_widget(chart, f.size());
}
