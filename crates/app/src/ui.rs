use std::time::Instant;

use kubedeck_engine::{StatusLevel, TableView};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Row, Table, TableState};
use ratatui::Frame;

use crate::controller::Controller;
use crate::input::{Input, Mode};

/// Lines around the table: header, column titles, filter bar, status.
const CHROME_ROWS: u16 = 4;

/// Table viewport for a terminal of `width` x `height`.
pub fn table_viewport(width: u16, height: u16) -> (u16, u16) {
    (width, height.saturating_sub(CHROME_ROWS))
}

struct Theme;

impl Theme {
    fn header() -> Style { Style::default().fg(Color::White).bg(Color::DarkGray).add_modifier(Modifier::BOLD) }
    fn column_titles() -> Style { Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD) }
    fn row_selected() -> Style { Style::default().fg(Color::Black).bg(Color::LightCyan) }
    fn bar() -> Style { Style::default().fg(Color::Gray) }
    fn bar_active() -> Style { Style::default().fg(Color::Yellow) }
    fn status(level: StatusLevel) -> Style {
        match level {
            StatusLevel::Loading => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            StatusLevel::Info => Style::default().fg(Color::Green),
            StatusLevel::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        }
    }
}

pub fn draw(frame: &mut Frame, ctl: &Controller, input: &Input, now: Instant) {
    let [header, body, bar, status] =
        Layout::vertical([Constraint::Length(1), Constraint::Min(1), Constraint::Length(1), Constraint::Length(1)])
            .areas(frame.area());
    draw_header(frame, header, ctl);
    draw_table(frame, body, ctl);
    draw_bar(frame, bar, ctl, input);
    draw_status(frame, status, ctl, now);
}

fn draw_header(frame: &mut Frame, area: Rect, ctl: &Controller) {
    let mut spans = vec![Span::raw(" kubedeck")];
    if let Some(ctx) = ctl.context() {
        spans.push(Span::raw(format!(" | ctx: {}", ctx)));
    }
    if let Some(screen) = ctl.current() {
        spans.push(Span::raw(format!(" | {}", screen.title())));
        if screen.hidden_count() > 0 {
            spans.push(Span::raw(format!(" | +{} cols", screen.hidden_count())));
        }
    }
    if let Some(took) = ctl.last_refresh() {
        spans.push(Span::raw(format!(" | {}ms", took.as_millis())));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)).style(Theme::header()), area);
}

fn draw_table(frame: &mut Frame, area: Rect, ctl: &Controller) {
    let Some(screen) = ctl.current() else {
        return;
    };
    let model = screen.table();
    let widths: Vec<Constraint> = model.columns().iter().map(|c| Constraint::Length(c.width)).collect();
    let titles = Row::new(model.columns().iter().map(|c| c.title.clone())).style(Theme::column_titles());
    let rows: Vec<Row> = model.visible_rows().iter().map(|r| Row::new(r.iter().cloned())).collect();
    let selected = (!model.rows().is_empty()).then(|| model.cursor().saturating_sub(model.offset()));
    let table = Table::new(rows, widths)
        .header(titles)
        .column_spacing(ctl.config().column_padding)
        .row_highlight_style(Theme::row_selected());
    let mut state = TableState::default().with_selected(selected);
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_bar(frame: &mut Frame, area: Rect, ctl: &Controller, input: &Input) {
    let line = match input.mode() {
        Mode::Filter => Line::styled(format!("/{}", input.buffer()), Theme::bar_active()),
        Mode::Command => Line::styled(format!(":{}", input.buffer()), Theme::bar_active()),
        Mode::Normal => {
            let filter = ctl.current().map(|s| s.filter_text()).unwrap_or("");
            if filter.is_empty() {
                Line::styled("/ filter  : screen  enter open  esc back  q quit", Theme::bar())
            } else {
                Line::styled(format!("filter: {}", filter), Theme::bar())
            }
        }
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_status(frame: &mut Frame, area: Rect, ctl: &Controller, now: Instant) {
    let Some(st) = ctl.status(now) else {
        return;
    };
    frame.render_widget(Paragraph::new(Line::styled(st.text.clone(), Theme::status(st.level))), area);
}
