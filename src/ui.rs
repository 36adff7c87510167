use std::time::{Duration, Instant};

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table,
    },
};

use crate::domain::{CMDMode, NotifyKind};
use crate::model::{ColumnView, Model, UIData};
use crate::schema::{REASON_FIELD, reason_label};

pub const CMDLINE_HEIGH: usize = 2;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 2;
pub const COLUMN_WIDTH_COLLAPSED_COLUMN: usize = 3;

// How long a notification covers the status line
const NOTIFICATION_TTL: Duration = Duration::from_secs(5);
// Status messages dim once they are this old
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(30);

pub struct TableUI {
    notification: Option<(NotifyKind, String, Instant)>,
}

impl TableUI {
    pub fn new() -> Self {
        Self { notification: None }
    }

    /// Notification sink. Fetch failures (and clipboard results) land here
    /// and cover the status line for a few seconds.
    pub fn notify(&mut self, kind: NotifyKind, message: &str) {
        self.notification = Some((kind, message.to_string(), Instant::now()));
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let area = frame.area();

        let chunks = Layout::vertical([
            Constraint::Min(0),
            Constraint::Length(CMDLINE_HEIGH as u16),
        ])
        .split(area);

        self.draw_table(uidata, frame, chunks[0]);
        self.draw_statusline(uidata, frame, chunks[1]);

        if uidata.show_popup {
            self.draw_popup(uidata, frame, area);
        }
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if area.height == 0 || area.width == 0 {
            return;
        }

        if uidata.table.is_empty() {
            // Dedicated empty states instead of an empty grid
            let message = if uidata.no_data {
                "No data found"
            } else if uidata.loading {
                "Loading ..."
            } else {
                "Waiting for a complete query (:org <id>, :stream <name>, :alert <name>)"
            };
            frame.render_widget(Paragraph::new(message).dim().centered(), area);
            return;
        }

        let index_width = uidata.layout.index_width as u16;
        let header_height = TABLE_HEADER_HEIGHT as u16;

        // Row numbers to the left of the grid
        if index_width > 0 && !uidata.index.data.is_empty() && area.width > index_width {
            let index_area = Rect::new(
                area.x,
                area.y + header_height,
                index_width,
                area.height.saturating_sub(header_height),
            );
            let lines: Vec<Line> = uidata
                .index
                .data
                .iter()
                .map(|s| Line::from(s.clone()))
                .collect();
            frame.render_widget(
                Paragraph::new(lines).style(Style::new().dim()),
                index_area,
            );
        }

        let table_area = Rect::new(
            area.x + index_width,
            area.y,
            area.width
                .saturating_sub(index_width + SCROLLBAR_WIDTH as u16),
            area.height,
        );

        let header = Row::new(
            uidata
                .table
                .iter()
                .map(|column| Cell::from(column.name.clone().bold()))
                .collect::<Vec<Cell>>(),
        );

        let nrows = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let mut rows: Vec<Row> = Vec::with_capacity(nrows);
        for ridx in 0..nrows {
            let cells = uidata
                .table
                .iter()
                .enumerate()
                .map(|(cidx, column)| Self::render_cell(uidata, column, ridx, cidx))
                .collect::<Vec<Cell>>();
            rows.push(Row::new(cells));
        }

        let widths = uidata
            .table
            .iter()
            .map(|c| Constraint::Length(c.width as u16))
            .collect::<Vec<Constraint>>();

        let table = Table::new(rows, widths).header(header).column_spacing(1);
        frame.render_widget(table, table_area);

        if uidata.nrows > 0 {
            let mut scrollbar_state =
                ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
            frame.render_stateful_widget(
                Scrollbar::new(ScrollbarOrientation::VerticalRight),
                area,
                &mut scrollbar_state,
            );
        }
    }

    fn render_cell<'a>(
        uidata: &UIData,
        column: &'a ColumnView,
        ridx: usize,
        cidx: usize,
    ) -> Cell<'a> {
        // Trigger reason codes get their badge color, everything else is
        // rendered as is
        let (text, mut style) = if column.id == REASON_FIELD {
            let (label, color) = reason_label(&column.data[ridx]);
            (label, Style::new().fg(color))
        } else {
            (column.data[ridx].clone(), Style::new())
        };
        if ridx == uidata.selected_row && cidx == uidata.selected_column {
            style = style.add_modifier(Modifier::REVERSED);
        }
        Cell::from(Span::styled(text, style))
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if area.height < CMDLINE_HEIGH as u16 {
            return;
        }
        let chunks =
            Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).split(area);

        // A fresh notification covers the model status message
        let message = match &self.notification {
            Some((kind, message, at)) if at.elapsed() < NOTIFICATION_TTL => {
                let style = match kind {
                    NotifyKind::Negative => Style::new().fg(Color::Red).bold(),
                    NotifyKind::Positive => Style::new().fg(Color::Green),
                };
                Line::from(Span::styled(message.clone(), style))
            }
            _ if uidata.last_status_message_update.elapsed() > STATUS_MESSAGE_TTL => {
                Line::from(uidata.status_message.clone().dim())
            }
            _ => Line::from(uidata.status_message.clone()),
        };
        frame.render_widget(Paragraph::new(message), chunks[0]);

        let bottom = if uidata.prompt.active {
            let prefix = match uidata.prompt.mode {
                Some(CMDMode::SearchTable) => "/",
                _ => ":",
            };
            Line::from(vec![
                Span::raw(prefix),
                Span::raw(uidata.prompt.input.clone()),
                Span::styled("█", Style::new().dim()),
            ])
        } else {
            let row = if uidata.nrows == 0 {
                0
            } else {
                uidata.abs_selected_row + 1
            };
            let mut spans = vec![
                Span::styled(format!(" {} ", uidata.name), Style::new().bold()),
                Span::raw(format!(
                    "row {}/{} · page {}/{} · {}/page",
                    row, uidata.nrows, uidata.page + 1, uidata.total_pages, uidata.rows_per_page
                )),
            ];
            if uidata.loading {
                spans.push(Span::styled(" · loading ...", Style::new().fg(Color::Yellow)));
            }
            spans.push(Span::styled("  ? for help", Style::new().dim()));
            Line::from(spans)
        };
        frame.render_widget(Paragraph::new(bottom), chunks[1]);
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let popup = Self::centered_rect(area, 70, 80);
        frame.render_widget(Clear, popup);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .border_set(border::THICK);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.clone()).block(block),
            popup,
        );
    }

    fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let vertical = Layout::vertical([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
        let horizontal = Layout::horizontal([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);
        horizontal[1]
    }
}
