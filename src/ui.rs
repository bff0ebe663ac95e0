pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::{
    geometry::{Point2D, Viewport},
    session::{Finish, GameState},
    verdict::Verdict,
    App, AppState,
};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;

const KEYPOINT_SYMBOL: &str = "·";
const PALM_SYMBOL: &str = "@";

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Playing => render_playing(self, area, buf),
            AppState::Results(finish) => render_results(finish, area, buf),
        }
    }
}

/// Maps a screen-space point onto a terminal cell inside `area`.
fn to_cell(p: Point2D, viewport: Viewport, area: Rect) -> Option<(u16, u16)> {
    if area.width == 0 || area.height == 0 || viewport.width <= 0.0 || viewport.height <= 0.0 {
        return None;
    }
    let fx = p.x / viewport.width;
    let fy = p.y / viewport.height;
    if !(0.0..=1.0).contains(&fx) || !(0.0..=1.0).contains(&fy) {
        return None;
    }
    let x = area.x + (fx * (area.width - 1) as f64).round() as u16;
    let y = area.y + (fy * (area.height - 1) as f64).round() as u16;
    Some((x, y))
}

fn put(buf: &mut Buffer, cell: Option<(u16, u16)>, symbol: &str, style: Style) {
    if let Some(c) = cell.and_then(|pos| buf.cell_mut(pos)) {
        c.set_symbol(symbol).set_style(style);
    }
}

pub(crate) fn render_playing(app: &App, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let near_style = Style::default().patch(bold_style).fg(Color::Yellow);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // play field
            Constraint::Length(1), // status
            Constraint::Length(1), // legend
        ])
        .split(area);

    let session = &app.session;
    let viewport = session.viewport();
    let near = session.state() == GameState::Near;

    let title = if session.is_timer_running() {
        format!(" palmseek  {}s ", app.elapsed_secs())
    } else {
        " palmseek  camera loading... ".to_string()
    };
    let mut block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(title, bold_style));
    if near {
        block = block
            .border_style(near_style)
            .title_bottom(Line::from(Span::styled(" NEAR ", near_style)).centered());
    }
    let field = block.inner(chunks[0]);
    block.render(chunks[0], buf);

    if app.reveal {
        let (left, top, right, bottom) = session.hitbox().bounds();
        let from = to_cell(
            Point2D::new(left.max(0.0), top.max(0.0)),
            viewport,
            field,
        );
        let to = to_cell(
            Point2D::new(right.min(viewport.width), bottom.min(viewport.height)),
            viewport,
            field,
        );
        if let (Some((x0, y0)), Some((x1, y1))) = (from, to) {
            for y in y0..=y1 {
                for x in x0..=x1 {
                    if let Some(c) = buf.cell_mut((x, y)) {
                        c.set_bg(Color::DarkGray);
                    }
                }
            }
        }
    }

    let active = app.puppet.active();
    for (idx, hand) in app.puppet.hands().iter().enumerate() {
        let style = if idx == active { bold_style } else { dim_style };
        for &p in hand.keypoints() {
            put(buf, to_cell(p, viewport, field), KEYPOINT_SYMBOL, style);
        }
        put(
            buf,
            to_cell(hand.palm_centroid(), viewport, field),
            PALM_SYMBOL,
            style.fg(Color::Cyan),
        );
    }

    let status = match (&app.last_error, app.last_cue) {
        (Some(err), _) => Span::styled(format!("estimator: {err}"), Style::default().fg(Color::Red)),
        (None, Some(cue)) => Span::styled(cue.to_string(), near_style),
        (None, None) => Span::styled(session.state().to_string(), dim_style),
    };
    Paragraph::new(status)
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        "arrows move / space show-hide / tab switch hand / (r)etry / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[2], buf);
}

pub(crate) fn render_results(finish: Finish, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let verdict = Verdict::from_elapsed(finish.elapsed_secs);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1), // elapsed
            Constraint::Length(2), // verdict
            Constraint::Min(1),
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Span::styled(
        format!("found it in {}s", finish.elapsed_secs),
        bold_style.fg(Color::Green),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        verdict.message(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .render(chunks[2], buf);

    Paragraph::new(Span::styled(
        "(r)etry / (esc)ape",
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[4], buf);
}
