use std::{io::stdout, path::PathBuf, time::Duration};

use crate::gui::error::GuiError;

use crossterm::{
    event::{self, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use log::info;
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
    Terminal,
};
use serial2::SerialPort;

/// What a key press does to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Moved(usize),
    Chosen(usize),
    Quit,
    Ignored,
}

fn on_key(code: KeyCode, cursor: usize, n_ports: usize) -> Selection {
    match code {
        KeyCode::Down => Selection::Moved((cursor + 1) % n_ports),
        KeyCode::Up => Selection::Moved((cursor + n_ports - 1) % n_ports),
        KeyCode::Enter => Selection::Chosen(cursor),
        KeyCode::Char('q') | KeyCode::Esc => Selection::Quit,
        _ => Selection::Ignored,
    }
}

/// Lets the operator pick one of `available_ports` from a full-screen list.
/// Returns `None` if they quit instead.
pub fn device_selector(
    heading: &str,
    mut available_ports: Vec<PathBuf>,
) -> Result<Option<PathBuf>, GuiError> {
    if available_ports.is_empty() {
        return Err(GuiError::NoDevices);
    }

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let selected = run_selector(heading, &available_ports);
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(selected?.map(|i| available_ports.swap_remove(i)))
}

fn run_selector(heading: &str, available_ports: &[PathBuf]) -> Result<Option<usize>, GuiError> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut cursor = 0;
    let mut list_state = ListState::default().with_selected(Some(cursor));
    let n_ports = available_ports.len();
    loop {
        let title = Title::from(Span::from(format!(" {} ", heading)).magenta().bold());
        let instructions = Title::from(Line::from(vec![
            " Navigate ".into(),
            "<Up>/<Down>".magenta().bold(),
            " Select ".into(),
            "<Enter>".magenta().bold(),
            " Quit ".into(),
            "<Q> ".magenta().bold(),
        ]));
        let block = Block::default()
            .title(title.alignment(Alignment::Center))
            .title(
                instructions
                    .alignment(Alignment::Center)
                    .position(Position::Bottom),
            )
            .borders(Borders::ALL);
        let port_names = available_ports.iter().map(|p| p.to_string_lossy());
        let list = List::new(port_names)
            .style(Style::default().fg(Color::White))
            .highlight_symbol(">>")
            .highlight_style(Style::default().fg(Color::Magenta))
            .block(block);
        list_state.select(Some(cursor));
        terminal.draw(|frame| {
            let area = frame.size();
            frame.render_stateful_widget(list, area, &mut list_state);
        })?;

        if event::poll(Duration::from_millis(16))? {
            if let event::Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match on_key(key.code, cursor, n_ports) {
                        Selection::Moved(to) => cursor = to,
                        Selection::Chosen(i) => return Ok(Some(i)),
                        Selection::Quit => return Ok(None),
                        Selection::Ignored => {}
                    }
                }
            }
        }
    }
}

/// Asks the operator which serial port the `what` device is on.
pub fn choose_serial_port(what: &str) -> Result<String, GuiError> {
    let ports = SerialPort::available_ports()?;
    let heading = format!("Select the {} port", what);
    let port = device_selector(&heading, ports)?.ok_or(GuiError::Cancelled)?;

    let port = port.to_string_lossy().into_owned();
    info!("Using {} for the {}", port, what);
    Ok(port)
}
