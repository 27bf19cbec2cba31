use std::{
    sync::mpsc::{Receiver, TryRecvError},
    time::Duration,
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, Event as CEvent, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use nettray_chart::{grid_lines, render, ChartFrame, ChartGeometry, ChartWindow, SegmentStatus};
use nettray_types::{events::StatusEvent, probe::ProbeResult};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Points},
        Block, Borders, Paragraph,
    },
    Frame, Terminal,
};

pub enum UiMessage {
    Status(StatusEvent),
}

pub struct UiContext {
    pub target: String,
    pub geometry: ChartGeometry,
    pub history: Vec<ProbeResult>,
}

/// Popup-style view state: the chart window plus the last known status.
struct ViewState {
    window: ChartWindow,
    // events at or before this instant are already part of the seed
    seeded_until: Option<DateTime<Utc>>,
    last_status: Option<StatusEvent>,
}

impl ViewState {
    fn new(history: &[ProbeResult]) -> Self {
        Self {
            window: ChartWindow::from_history(history),
            seeded_until: history.last().map(|r| r.timestamp()),
            last_status: history.last().map(StatusEvent::from),
        }
    }

    fn apply(&mut self, event: StatusEvent) {
        if matches!(self.seeded_until, Some(seed) if event.timestamp <= seed) {
            return;
        }
        self.window.push_event(&event);
        self.last_status = Some(event);
    }
}

pub fn run(receiver: Receiver<UiMessage>, context: UiContext) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let res = run_loop(&mut terminal, receiver, &context);

    terminal.show_cursor()?;
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    res
}

fn run_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    receiver: Receiver<UiMessage>,
    context: &UiContext,
) -> Result<()> {
    let mut view = ViewState::new(&context.history);
    let mut frame = render(&view.window.points(), &context.geometry);

    loop {
        let mut changed = false;
        loop {
            match receiver.try_recv() {
                Ok(UiMessage::Status(event)) => {
                    view.apply(event);
                    changed = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
        if changed {
            frame = render(&view.window.points(), &context.geometry);
        }

        terminal.draw(|f| draw(f, context, &view, &frame))?;

        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn draw(f: &mut Frame, context: &UiContext, view: &ViewState, chart: &ChartFrame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(f.size());

    let (dot_color, status_text) = match &view.last_status {
        Some(event) if event.online => (Color::Green, event.summary()),
        Some(event) => (Color::Red, event.summary()),
        None => (Color::DarkGray, "waiting for first probe".to_string()),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled("●", Style::default().fg(dot_color)),
        Span::raw(" "),
        Span::styled(
            "NetTray",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::raw(context.target.clone()),
        Span::raw("  "),
        Span::raw(status_text),
        Span::raw("  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" to quit"),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(header, chunks[0]);

    f.render_widget(chart_canvas(&context.geometry, chart), chunks[1]);

    let stats = &chart.stats;
    let footer = Paragraph::new(Line::from(vec![
        Span::styled("current ", Style::default().fg(Color::Magenta)),
        Span::raw(format_ms(stats.current_ms)),
        Span::raw("   "),
        Span::styled("average ", Style::default().fg(Color::Magenta)),
        Span::raw(format_ms(stats.average_ms)),
        Span::raw("   "),
        Span::styled("loss ", Style::default().fg(Color::Magenta)),
        Span::raw(format!("{:.1}%", stats.loss_percent)),
        Span::raw("   "),
        Span::styled("samples ", Style::default().fg(Color::Magenta)),
        Span::raw(stats.samples.to_string()),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Statistics"));
    f.render_widget(footer, chunks[2]);
}

fn chart_canvas<'a>(
    geometry: &'a ChartGeometry,
    chart: &'a ChartFrame,
) -> Canvas<'a, impl Fn(&mut ratatui::widgets::canvas::Context) + 'a> {
    let height = geometry.height();
    // chart geometry grows downwards, the terminal canvas upwards
    let flip = move |y: f64| height - y;

    Canvas::default()
        .block(Block::default().borders(Borders::ALL).title("Latency"))
        .marker(Marker::Braille)
        .x_bounds([0.0, geometry.width()])
        .y_bounds([0.0, height])
        .paint(move |ctx| {
            for line in grid_lines(geometry) {
                ctx.draw(&CanvasLine {
                    x1: line.x1,
                    y1: flip(line.y1),
                    x2: line.x2,
                    y2: flip(line.y2),
                    color: Color::DarkGray,
                });
            }
            ctx.layer();

            for segment in &chart.segments {
                let color = match segment.status {
                    SegmentStatus::Reachable => Color::Green,
                    SegmentStatus::Unreachable => Color::Red,
                };
                if segment.len() == 1 {
                    let point = segment.points[0];
                    ctx.draw(&Points {
                        coords: &[(point.x, flip(point.y))],
                        color,
                    });
                    continue;
                }
                for pair in segment.points.windows(2) {
                    ctx.draw(&CanvasLine {
                        x1: pair[0].x,
                        y1: flip(pair[0].y),
                        x2: pair[1].x,
                        y2: flip(pair[1].y),
                        color,
                    });
                }
            }
            ctx.layer();

            for label in &chart.labels {
                ctx.print(
                    0.0,
                    flip(label.y),
                    Span::styled(label.text.clone(), Style::default().fg(Color::Gray)),
                );
            }
        })
}

fn format_ms(value: Option<f64>) -> String {
    match value {
        Some(ms) => format!("{ms:.0} ms"),
        None => "--".to_string(),
    }
}
