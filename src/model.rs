use std::cmp::Ordering;
use std::time::Instant;

use rayon::prelude::*;
use ratatui::crossterm::event::{KeyCode, KeyEvent};
use tracing::{debug, error, info, trace};

use crate::domain::{
    AVConfig, AVError, CMDMode, Effect, FetchError, Message, NotifyKind, QueryParams, RouteParams,
    FETCH_ERROR_FALLBACK, HELP_TEXT, ROWS_PER_PAGE_OPTIONS,
};
use crate::schema::{infer_columns, ColumnSpec, Record, Scalar};
use crate::ui::{
    CMDLINE_HEIGH, COLUMN_WIDTH_COLLAPSED_COLUMN, COLUMN_WIDTH_MARGIN, SCROLLBAR_WIDTH,
    TABLE_HEADER_HEIGHT,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    IDLE,
    LOADING,
    LOADED,
    ERROR,
    QUITTING,
}

// A fetched column with its rendered cells. The cells are kept as strings in
// base row order, the TableView below maps display order onto them.
pub struct Column {
    spec: ColumnSpec,
    status: ColumnStatus,
    max_width: usize,
    render_width: usize,
    data: Vec<String>,
}

impl Column {
    pub fn as_string(&self) -> String {
        format!(
            "\"{}\", {:?}, width_max: {}, render_width: {}, # rows {}",
            self.spec.id,
            self.status,
            self.max_width,
            self.render_width,
            self.data.len(),
        )
    }
}

#[derive(Debug, PartialEq)]
pub enum ColumnStatus {
    NORMAL,
    EXPANDED,
    COLLAPSED,
}

#[derive(Clone)]
pub struct ColumnView {
    pub id: String,
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

impl ColumnView {
    fn empty() -> Self {
        ColumnView {
            id: String::new(),
            name: "".to_string(),
            width: 0,
            data: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    POPUP,
    CMDINPUT,
}

// View local knob of the table, owned by the model. Changing it never
// triggers a reload.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationState {
    pub rows_per_page: usize,
}

pub struct TableView {
    rows: Vec<usize>, // Mapping of display row order to hit index, changed by sorting
    visible_columns: Vec<usize>, // Idx of the columns that are sent to the ui for rendering
    visible_width: usize,
    curser_row: usize,    // Within the visible page slice
    curser_column: usize, // Within visible_columns
    offset_column: usize,
    page: usize,
    data: Vec<ColumnView>,
    search_results: Vec<(usize, usize)>, // (display row, column idx), sorted
    search_idx: usize,
    show_index: bool,
    index: ColumnView,
    height: usize,
    width: usize,
}

impl TableView {
    fn empty() -> Self {
        TableView {
            rows: Vec::new(),
            visible_columns: Vec::new(),
            visible_width: 0,
            curser_row: 0,
            curser_column: 0,
            offset_column: 0,
            page: 0,
            data: Vec::new(),
            search_results: Vec::new(),
            search_idx: 0,
            show_index: false,
            index: ColumnView::empty(),
            height: 0,
            width: 0,
        }
    }

    fn build_index(&mut self, rbegin: usize, rend: usize) {
        let data = self.rows[rbegin..rend]
            .iter()
            .map(|idx| (idx + 1).to_string())
            .collect::<Vec<String>>();
        let width = data.iter().map(|s| s.len()).max().unwrap_or(3).max(3);
        self.index = ColumnView {
            id: String::new(),
            name: "".to_string(),
            width,
            data,
        }
    }
}

struct RecordView {
    header_data: Vec<String>,
    header_width: usize,
    header_view: ColumnView,
    row_data: Vec<String>,
    row_width: usize,
    row_view: ColumnView,
    record_idx: usize, // Display row the record view is looking at
    curser_row: usize,
    curser_offset: usize,
    height: usize,
    width: usize,
}

impl RecordView {
    fn empty() -> Self {
        RecordView {
            header_data: Vec::new(),
            header_width: 0,
            header_view: ColumnView::empty(),
            row_data: Vec::new(),
            row_width: 0,
            row_view: ColumnView::empty(),
            record_idx: 0,
            curser_row: 0,
            curser_offset: 0,
            height: 0,
            width: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptView {
    pub active: bool,
    pub mode: Option<CMDMode>,
    pub input: String,
}

pub struct UIData {
    pub name: String,
    pub table: Vec<ColumnView>,
    pub index: ColumnView,
    pub nrows: usize, // Total number of rows in the result set
    pub page: usize,
    pub total_pages: usize,
    pub rows_per_page: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub loading: bool,
    pub no_data: bool,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub prompt: PromptView,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            table: Vec::new(),
            index: ColumnView::empty(),
            nrows: 0,
            page: 0,
            total_pages: 1,
            rows_per_page: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            loading: false,
            no_data: false,
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            prompt: PromptView::default(),
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub index_width: usize,
    pub index_height: usize,
    pub statusline_width: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(index_width: usize, ui_width: usize, ui_height: usize) -> Self {
        let cmdline_height = CMDLINE_HEIGH;
        let cmdline_width = ui_width;

        let table_width = ui_width.saturating_sub(SCROLLBAR_WIDTH + index_width);
        let table_height = ui_height.saturating_sub(cmdline_height + TABLE_HEADER_HEIGHT);
        let index_height = table_height;

        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width,
            table_height,
            index_width,
            index_height,
            statusline_width: cmdline_width,
            statusline_height: cmdline_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: AVConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    route: RouteParams,
    // Tag of the latest issued fetch. Results carrying any other tag were
    // superseded while in flight and are dropped.
    requested: Option<QueryParams>,
    hits: Vec<Record>,
    columns: Vec<ColumnSpec>,
    data: Vec<Column>,
    pagination: PaginationState,
    table: TableView,
    record_view: RecordView,
    uilayout: UILayout,
    uidata: UIData,
    prompt: String,
    cmd_mode: Option<CMDMode>,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &AVConfig, ui_width: usize, ui_height: usize) -> Self {
        let rows_per_page = if ROWS_PER_PAGE_OPTIONS.contains(&config.rows_per_page) {
            config.rows_per_page
        } else {
            debug!(
                "Configured page size {} not in {:?}, falling back",
                config.rows_per_page, ROWS_PER_PAGE_OPTIONS
            );
            ROWS_PER_PAGE_OPTIONS[1]
        };

        let mut model = Self {
            config: config.clone(),
            status: Status::IDLE,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            route: RouteParams::default(),
            requested: None,
            hits: Vec::new(),
            columns: Vec::new(),
            data: Vec::new(),
            pagination: PaginationState { rows_per_page },
            table: TableView::empty(),
            record_view: RecordView::empty(),
            uilayout: UILayout::from_values(0, ui_width, ui_height),
            uidata: UIData::empty(),
            prompt: String::new(),
            cmd_mode: None,
            status_message: "Started av!".to_string(),
            last_status_message_update: Instant::now(),
        };
        model.update_uidata_for_table();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// Reduce one event into the next state and the effects the driver has
    /// to execute. All fetch, notification and clipboard side effects leave
    /// through the returned list, never directly from here.
    pub fn update(&mut self, message: Message) -> Result<Vec<Effect>, AVError> {
        let mut effects = Vec::new();

        // The fetch lifecycle and terminal housekeeping apply in every
        // modus, the rest is input handling for the active view.
        match message {
            Message::Quit => self.quit(),
            Message::Resize(width, height) => self.ui_resize(width, height),
            Message::ParamsChanged(route) => self.params_changed(route, &mut effects),
            Message::FetchResolved { params, hits } => self.fetch_resolved(params, hits),
            Message::FetchFailed { params, error } => {
                self.fetch_failed(params, error, &mut effects)
            }
            msg => match self.modus {
                Modus::TABLE => match msg {
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::MoveBeginning => self.move_table_selection_beginning(),
                    Message::MoveEnd => self.move_table_selection_end(),
                    Message::NextPage => self.next_page(),
                    Message::PrevPage => self.prev_page(),
                    Message::GrowRowsPerPage => self.cycle_rows_per_page(1),
                    Message::ShrinkRowsPerPage => self.cycle_rows_per_page(-1),
                    Message::SortAscending => self.sort_current_column(true),
                    Message::SortDescending => self.sort_current_column(false),
                    Message::ToggleColumnState => self.toggle_column_status(false),
                    Message::ToggleExpandColumnState => self.toggle_column_status(true),
                    Message::ToggleIndex => self.toggle_table_index(),
                    Message::CopyCell => self.copy_table_cell(&mut effects),
                    Message::CopyRow => self.copy_table_row(&mut effects),
                    Message::Enter => self.enter(),
                    Message::Help => self.show_help(),
                    Message::EnterCommand => self.enter_cmd_mode(CMDMode::Command),
                    Message::Search => self.enter_cmd_mode(CMDMode::SearchTable),
                    Message::SearchNext => self.search_next(1),
                    Message::SearchPrev => self.search_next(-1),
                    Message::Refresh => self.refresh(&mut effects),
                    _ => (),
                },
                Modus::RECORD => match msg {
                    Message::MoveDown => self.move_record_selection_down(1),
                    Message::MoveUp => self.move_record_selection_up(1),
                    Message::MoveLeft => self.previous_record(),
                    Message::MoveRight => self.next_record(),
                    Message::CopyCell => self.copy_record_cell(&mut effects),
                    Message::Exit => self.exit(),
                    Message::Help => self.show_help(),
                    Message::Refresh => self.refresh(&mut effects),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Exit | Message::Enter => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key, &mut effects)
                    }
                }
            },
        }

        Ok(effects)
    }

    // ---------------------- Fetch state machine --------------------------- //

    fn params_changed(&mut self, route: RouteParams, effects: &mut Vec<Effect>) {
        self.route = route;
        let params = match self.route.complete() {
            Some(params) => params,
            None => {
                // Pre navigation state, not an error. Whatever is on screen
                // stays on screen.
                trace!("Ignoring incomplete query parameters: {:?}", self.route);
                return;
            }
        };

        if self.requested.as_ref() == Some(&params) {
            trace!("Query parameters unchanged, skipping fetch");
            return;
        }

        info!("Query parameters changed: {:?}", params);
        self.set_status_message(format!(
            "Loading {}/{} ...",
            params.stream_name, params.alert_name
        ));
        self.requested = Some(params.clone());
        self.status = Status::LOADING;
        self.uidata.loading = true;
        effects.push(Effect::Fetch(params));
    }

    fn refresh(&mut self, effects: &mut Vec<Effect>) {
        match &self.requested {
            Some(params) => {
                let params = params.clone();
                self.set_status_message("Refreshing ...".to_string());
                self.status = Status::LOADING;
                self.uidata.loading = true;
                effects.push(Effect::Fetch(params));
            }
            None => trace!("Nothing to refresh, no resolved query parameters"),
        }
    }

    fn fetch_resolved(&mut self, params: QueryParams, hits: Vec<Record>) {
        if self.requested.as_ref() != Some(&params) {
            trace!("Discarding stale result for {:?}", params);
            return;
        }
        info!("Loaded {} rows for {:?}", hits.len(), params);

        // Rows and columns are replaced together, the ui never sees the new
        // rows under the old schema
        self.columns = infer_columns(&hits);
        self.hits = hits;
        self.rebuild_columns();

        let show_index = self.table.show_index;
        self.table = TableView::empty();
        self.table.show_index = show_index;
        self.table.rows = (0..self.hits.len()).collect();

        self.status = Status::LOADED;
        if self.modus == Modus::RECORD || self.modus == Modus::POPUP {
            // The record view and popup reference rows that are gone now
            self.modus = Modus::TABLE;
            self.previous_modus = Modus::TABLE;
        }
        if self.hits.is_empty() {
            self.set_status_message("No data found".to_string());
        } else {
            self.set_status_message(format!("Loaded {} rows", self.hits.len()));
        }
        self.rebuild_layout(self.uilayout.width, self.uilayout.height);
        self.update_table_data();
    }

    fn fetch_failed(&mut self, params: QueryParams, error: FetchError, effects: &mut Vec<Effect>) {
        if self.requested.as_ref() != Some(&params) {
            trace!("Discarding stale error for {:?}", params);
            return;
        }
        let message = error
            .message
            .unwrap_or_else(|| FETCH_ERROR_FALLBACK.to_string());
        error!("Fetch for {:?} failed: {}", params, message);

        // The previously loaded rows and columns stay on screen
        self.status = Status::ERROR;
        self.uidata.loading = false;
        effects.push(Effect::Notify(NotifyKind::Negative, message));
    }

    // ---------------------- Pagination ------------------------------------ //

    /// Change the page size. Values outside `ROWS_PER_PAGE_OPTIONS` are
    /// rejected. This is a view local change: no fetch, no status change.
    pub fn set_rows_per_page(&mut self, n: usize) {
        if !ROWS_PER_PAGE_OPTIONS.contains(&n) {
            debug!("Rejecting page size {n}, valid: {:?}", ROWS_PER_PAGE_OPTIONS);
            return;
        }
        // Keep the selected row on screen across the page size change
        let abs = self.abs_display_row();
        self.pagination.rows_per_page = n;
        self.table.page = abs / n;
        self.table.curser_row = abs % n;
        self.update_table_data();
    }

    fn cycle_rows_per_page(&mut self, step: i32) {
        let current = ROWS_PER_PAGE_OPTIONS
            .iter()
            .position(|&o| o == self.pagination.rows_per_page)
            .unwrap_or(0) as i32;
        let next = (current + step).clamp(0, ROWS_PER_PAGE_OPTIONS.len() as i32 - 1);
        if next != current {
            self.set_rows_per_page(ROWS_PER_PAGE_OPTIONS[next as usize]);
            self.set_status_message(format!("{} rows per page", self.pagination.rows_per_page));
        }
    }

    fn total_pages(&self) -> usize {
        self.table
            .rows
            .len()
            .div_ceil(self.pagination.rows_per_page)
            .max(1)
    }

    fn abs_display_row(&self) -> usize {
        self.table.page * self.pagination.rows_per_page + self.table.curser_row
    }

    // ---------------------- View data assembly ---------------------------- //

    fn rebuild_columns(&mut self) {
        self.data = self
            .columns
            .iter()
            .map(|spec| {
                let data: Vec<String> = self
                    .hits
                    .iter()
                    .map(|hit| {
                        hit.get(&spec.id)
                            .map(Scalar::render)
                            .unwrap_or_else(|| "∅".to_string())
                    })
                    .collect();
                let max_width = data.iter().map(String::len).max().unwrap_or(0);
                Column {
                    spec: spec.clone(),
                    status: ColumnStatus::NORMAL,
                    max_width,
                    render_width: 0, // Set on the next update_table_data
                    data,
                }
            })
            .collect();
        for c in self.data.iter() {
            debug!("Column: {}", c.as_string());
        }
    }

    fn update_table_data(&mut self) {
        if self.data.is_empty() {
            // Nothing fetched yet, or the backend returned no rows. The ui
            // renders its dedicated empty states instead of a table.
            self.table.data.clear();
            self.table.index = ColumnView::empty();
            self.update_uidata_for_table();
            return;
        }

        let rpp = self.pagination.rows_per_page;
        let max_column_width = self.config.max_column_width;
        let total_pages = self.total_pages();
        let table = &mut self.table;
        table.width = self.uilayout.table_width;
        table.height = self.uilayout.table_height;

        let total = table.rows.len();
        table.page = std::cmp::min(table.page, total_pages - 1);
        let rbegin = table.page * rpp;
        let page_rows = std::cmp::min(rpp, total.saturating_sub(rbegin));
        // The terminal can be shorter than the page
        let visible_rows = std::cmp::min(page_rows, table.height);
        let rend = rbegin + visible_rows;
        table.curser_row = std::cmp::min(table.curser_row, visible_rows.saturating_sub(1));

        trace!(
            "Table: I:{}, Cr {}, Cc {}, Oc {}, page {}/{}, Rb {}, Re {}, tw: {}, th: {}",
            table.show_index,
            table.curser_row,
            table.curser_column,
            table.offset_column,
            table.page + 1,
            total_pages,
            rbegin,
            rend,
            table.width,
            table.height
        );

        // Current render width for each column. This can change because a
        // column was expanded or collapsed
        for column in self.data.iter_mut() {
            column.render_width = Self::calculate_column_width(column, max_column_width);
        }

        table.offset_column = std::cmp::min(table.offset_column, self.data.len() - 1);

        // Collect the columns that fit into the table area
        table.visible_columns = Vec::new();
        let mut visible_width = 0;
        for (cidx, column) in self.data[table.offset_column..].iter_mut().enumerate() {
            if visible_width + column.render_width + 1 <= self.uilayout.table_width {
                table.visible_columns.push(cidx + table.offset_column);
                visible_width += column.render_width + 1;
            } else {
                // Add a last, partially visible column
                if visible_width < self.uilayout.table_width {
                    let remaining_width = self.uilayout.table_width - visible_width;
                    table.visible_columns.push(cidx + table.offset_column);
                    visible_width += remaining_width;
                    column.render_width = remaining_width;
                }
                break;
            }
        }
        table.visible_width = visible_width;

        if table.visible_columns.is_empty() {
            table.visible_columns.push(table.offset_column);
        }
        table.curser_column = std::cmp::min(table.curser_column, table.visible_columns.len() - 1);

        // Create ColumnViews for the visible slice
        table.data = Vec::with_capacity(table.visible_columns.len());
        for idx in table.visible_columns.iter() {
            if let Some(column) = self.data.get(*idx) {
                if column.status == ColumnStatus::COLLAPSED {
                    table.data.push(Self::get_collapsed_column(rend - rbegin));
                } else {
                    let cells = table.rows[rbegin..rend]
                        .iter()
                        .map(|&hit_idx| column.data[hit_idx].clone())
                        .collect();
                    table.data.push(ColumnView {
                        id: column.spec.id.clone(),
                        name: Self::get_visible_name(&column.spec.label, column.render_width),
                        width: column.render_width,
                        data: cells,
                    });
                }
            } else {
                error!("Trying to access column with unknown idx {idx}!");
            }
        }

        table.build_index(rbegin, rend);
        self.update_uidata_for_table();
    }

    fn update_uidata_for_table(&mut self) {
        self.uidata = UIData {
            name: self.view_name(),
            table: self.table.data.clone(),
            index: self.table.index.clone(),
            nrows: self.table.rows.len(),
            page: self.table.page,
            total_pages: self.total_pages(),
            rows_per_page: self.pagination.rows_per_page,
            selected_row: self.table.curser_row,
            selected_column: self.table.curser_column,
            abs_selected_row: self.abs_display_row(),
            loading: self.status == Status::LOADING,
            no_data: self.status == Status::LOADED && self.hits.is_empty(),
            show_popup: false,
            popup_message: String::new(),
            layout: self.uilayout.clone(),
            prompt: self.prompt_view(),
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    fn update_uidata_for_record(&mut self) {
        let record = &self.record_view;
        self.uidata = UIData {
            name: format!("R[{}]", self.view_name()),
            table: vec![record.header_view.clone(), record.row_view.clone()],
            index: ColumnView::empty(),
            nrows: self.table.rows.len(),
            page: self.table.page,
            total_pages: self.total_pages(),
            rows_per_page: self.pagination.rows_per_page,
            selected_row: record.curser_row,
            selected_column: 1,
            // Show which record we are looking at instead of the line within
            // the record view
            abs_selected_row: record.record_idx,
            loading: self.status == Status::LOADING,
            no_data: false,
            show_popup: false,
            popup_message: String::new(),
            layout: self.uilayout.clone(),
            prompt: self.prompt_view(),
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }

    fn view_name(&self) -> String {
        match &self.requested {
            Some(params) => format!("{}/{}", params.stream_name, params.alert_name),
            None => "no query".to_string(),
        }
    }

    fn prompt_view(&self) -> PromptView {
        PromptView {
            active: self.modus == Modus::CMDINPUT,
            mode: self.cmd_mode,
            input: self.prompt.clone(),
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_status_message_update = self.last_status_message_update;
    }

    fn rebuild_layout(&mut self, width: usize, height: usize) {
        let index_width = match self.modus {
            Modus::RECORD => 0,
            _ if self.table.show_index => std::cmp::max(self.table.index.width, 3),
            _ => 0,
        };
        self.uilayout = UILayout::from_values(index_width, width, height);
    }

    fn get_collapsed_column(nrows: usize) -> ColumnView {
        ColumnView {
            id: String::new(),
            name: "...".to_string(),
            width: COLUMN_WIDTH_COLLAPSED_COLUMN,
            data: vec!["⋮".to_string(); nrows],
        }
    }

    fn get_visible_name(name: &str, width: usize) -> String {
        if width < 3 {
            return "".to_string();
        }
        if name.len() > width {
            let mut reduced: String = name.chars().take(width - 3).collect();
            reduced.push_str("...");
            return reduced;
        }
        name.to_string()
    }

    fn calculate_column_width(column: &Column, max_column_width: usize) -> usize {
        let content =
            std::cmp::max(column.spec.label.len(), column.max_width) + COLUMN_WIDTH_MARGIN;
        let width = std::cmp::max(column.spec.width, content);
        match column.status {
            ColumnStatus::COLLAPSED => COLUMN_WIDTH_COLLAPSED_COLUMN,
            ColumnStatus::NORMAL => std::cmp::min(width, max_column_width),
            ColumnStatus::EXPANDED => width,
        }
    }

    // ---------------------- Control handling ------------------------------ //

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.rebuild_layout(width, height);
        match self.modus {
            Modus::TABLE => self.update_table_data(),
            Modus::RECORD => {
                let record = &mut self.record_view;
                record.height = self.uilayout.table_height;
                record.width = self.uilayout.table_width;
                record.row_width = record.width.saturating_sub(record.header_width);
                self.update_record_data();
            }
            Modus::POPUP => {}
            Modus::CMDINPUT => {}
        }
    }

    fn enter(&mut self) {
        if self.table.rows.is_empty() {
            return;
        }
        let record_idx = self.abs_display_row();
        self.modus = Modus::RECORD;
        self.previous_modus = Modus::TABLE;
        // The record view renders without the index column
        self.rebuild_layout(self.uilayout.width, self.uilayout.height);
        self.build_record_view(record_idx);
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::TABLE => {}
            Modus::RECORD => {
                self.previous_modus = Modus::RECORD;
                self.modus = Modus::TABLE;
                self.rebuild_layout(self.uilayout.width, self.uilayout.height);
                self.update_table_data();
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
                self.uidata.show_popup = false;
            }
            Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
        self.uidata.show_popup = true;
    }

    // ---------------------- Command input --------------------------------- //

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?} ...", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.prompt.clear();
        self.uidata.prompt = self.prompt_view();
    }

    fn raw_input(&mut self, key: KeyEvent, effects: &mut Vec<Effect>) {
        match key.code {
            KeyCode::Enter => {
                self.modus = self.previous_modus;
                self.previous_modus = Modus::CMDINPUT;
                self.handle_cmd_input(effects);
            }
            KeyCode::Esc => {
                trace!("Canceling command input");
                self.prompt.clear();
                self.cmd_mode = None;
                self.modus = self.previous_modus;
                self.previous_modus = Modus::CMDINPUT;
            }
            KeyCode::Backspace => {
                self.prompt.pop();
            }
            code => {
                if let Some(chr) = code.as_char() {
                    self.prompt.push(chr);
                }
            }
        }
        self.uidata.prompt = self.prompt_view();
    }

    fn handle_cmd_input(&mut self, effects: &mut Vec<Effect>) {
        let input = self.prompt.trim().to_string();
        self.prompt.clear();
        trace!("Handle cmd input {}", input);
        match self.cmd_mode.take() {
            Some(CMDMode::SearchTable) => self.search(&input),
            Some(CMDMode::Command) => self.handle_command(&input, effects),
            None => info!("Cmd mode is none!"),
        }
    }

    fn handle_command(&mut self, input: &str, effects: &mut Vec<Effect>) {
        let mut parts = input.splitn(2, ' ');
        let command = parts.next().unwrap_or("");
        let value = parts
            .next()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        let mut route = self.route.clone();
        match command {
            "org" => {
                route.org_id = value;
                self.params_changed(route, effects);
            }
            "stream" => {
                route.stream_name = value;
                self.params_changed(route, effects);
            }
            "alert" => {
                route.alert_name = value;
                self.params_changed(route, effects);
            }
            "rpp" => match value.and_then(|v| v.parse::<usize>().ok()) {
                Some(n) => self.set_rows_per_page(n),
                None => self.set_status_message(format!(
                    "Valid page sizes: {:?}",
                    ROWS_PER_PAGE_OPTIONS
                )),
            },
            _ => self.set_status_message(format!("Unknown command: {input}")),
        }
    }

    // ---------------------- Search and sort -------------------------------- //

    // Return display row positions whose rendered cell contains the term
    fn search_column(term: &str, column: &Column, rows: &[usize]) -> Vec<usize> {
        let mut matches = Vec::new();
        for (display_idx, &hit_idx) in rows.iter().enumerate() {
            if column.data[hit_idx].contains(term) {
                matches.push(display_idx);
            }
        }
        matches
    }

    fn search(&mut self, term: &str) {
        if term.is_empty() || self.data.is_empty() {
            return;
        }
        trace!("Starting search for {} ...", term);
        let start_time = Instant::now();

        let rows = &self.table.rows;
        let matching_rows: Vec<(usize, usize)> = self
            .data
            .par_iter()
            .enumerate()
            .flat_map(|(col_idx, column)| {
                Self::search_column(term, column, rows)
                    .into_iter()
                    .map(move |row_idx| (row_idx, col_idx))
                    .collect::<Vec<_>>()
            })
            .collect();

        let search_duration = start_time.elapsed().as_millis();
        trace!(
            "Search found {} matches in {}ms",
            matching_rows.len(),
            search_duration
        );

        if matching_rows.is_empty() {
            self.table.search_results.clear();
            self.set_status_message("Found no matches!".to_string());
        } else {
            let curser_ridx = self.abs_display_row();
            let table = &mut self.table;
            table.search_results = matching_rows;
            table.search_results.sort_unstable();

            // Jump to the first match at or after the current selection
            table.search_idx = table
                .search_results
                .iter()
                .position(|&(row, _col)| row >= curser_ridx)
                .unwrap_or(0);

            self.search_next(0);
            self.set_status_message(format!(
                "Found {} results",
                self.table.search_results.len()
            ));
        }
    }

    // Sets the curser to the next search result
    fn search_next(&mut self, step: i32) {
        // Note: step has to be -1, 0, 1
        let mut next_match: Option<(usize, usize)> = None;
        let mut next_match_idx = 0;
        let table = &mut self.table;
        let total_matches = table.search_results.len();
        if total_matches > 0 {
            if step >= 0 {
                let s = step as usize;
                if table.search_idx + s >= total_matches {
                    table.search_idx = 0;
                } else {
                    table.search_idx += s;
                }
            } else if table.search_idx as i32 + step < 0 {
                table.search_idx = total_matches - 1;
            } else {
                table.search_idx = (table.search_idx as i32 + step) as usize;
            }
            next_match = Some(table.search_results[table.search_idx]);
            next_match_idx = table.search_idx;
        }

        if let Some((row, column)) = next_match {
            self.select_cell(row, column);
            self.set_status_message(format!(
                "Search result {}/{}",
                next_match_idx + 1,
                total_matches
            ));
        }
    }

    fn select_cell(&mut self, row: usize, column: usize) {
        trace!("Select cell {}:{}", row, column);
        let rpp = self.pagination.rows_per_page;
        let table = &mut self.table;

        // If the column is already visible only move the curser, otherwise
        // shift the view
        if table.visible_columns.contains(&column) {
            table.curser_column = table
                .visible_columns
                .iter()
                .position(|&c| c == column)
                .unwrap_or(0);
        } else {
            table.offset_column = column;
            table.curser_column = 0;
        }

        table.page = row / rpp;
        table.curser_row = row % rpp;
        self.update_table_data();
    }

    fn compare_cells(a: Option<&Scalar>, b: Option<&Scalar>) -> Ordering {
        match (a, b) {
            (None | Some(Scalar::Null), None | Some(Scalar::Null)) => Ordering::Equal,
            // Missing values sort last
            (None | Some(Scalar::Null), _) => Ordering::Greater,
            (_, None | Some(Scalar::Null)) => Ordering::Less,
            (Some(Scalar::Number(x)), Some(Scalar::Number(y))) => {
                match (x.as_f64(), y.as_f64()) {
                    (Some(xf), Some(yf)) => xf.partial_cmp(&yf).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                }
            }
            (Some(Scalar::Bool(x)), Some(Scalar::Bool(y))) => x.cmp(y),
            (Some(Scalar::String(x)), Some(Scalar::String(y))) => x.cmp(y),
            // Mixed types compare by their rendering
            (Some(x), Some(y)) => x.render().cmp(&y.render()),
        }
    }

    fn sort_current_column(&mut self, ascending: bool) {
        let col_idx = self.current_column_idx();
        let column = match self.data.get(col_idx) {
            Some(column) => column,
            None => return,
        };
        if !column.spec.sortable {
            return;
        }
        let field = column.spec.id.clone();
        let label = column.spec.label.clone();

        let mut rows = self.table.rows.clone();
        rows.sort_by(|&a, &b| {
            let ord = Self::compare_cells(self.hits[a].get(&field), self.hits[b].get(&field));
            if ascending { ord } else { ord.reverse() }
        });
        self.table.rows = rows;

        // Sorting shuffles display positions, previous search hits point
        // nowhere
        self.table.search_results.clear();
        self.table.search_idx = 0;

        self.set_status_message(format!(
            "Sorted by {} ({})",
            label,
            if ascending { "ascending" } else { "descending" }
        ));
        self.update_table_data();
    }

    fn current_column_idx(&self) -> usize {
        self.table
            .visible_columns
            .get(self.table.curser_column)
            .copied()
            .unwrap_or(0)
    }

    // ---------------------- Table navigation ------------------------------ //

    fn visible_row_count(&self) -> usize {
        self.table.data.first().map(|c| c.data.len()).unwrap_or(0)
    }

    fn move_table_selection_beginning(&mut self) {
        self.table.page = 0;
        self.table.curser_row = 0;
        self.update_table_data();
    }

    fn move_table_selection_end(&mut self) {
        let total = self.table.rows.len();
        if total == 0 {
            return;
        }
        let rpp = self.pagination.rows_per_page;
        self.table.page = (total - 1) / rpp;
        self.table.curser_row = (total - 1) % rpp;
        self.update_table_data();
    }

    fn move_table_selection_up(&mut self, size: usize) {
        let rpp = self.pagination.rows_per_page;
        let table = &mut self.table;
        if table.curser_row > 0 {
            table.curser_row = table.curser_row.saturating_sub(size);
        } else if table.page > 0 {
            // At the top of the page, flip to the previous one
            table.page -= 1;
            table.curser_row = rpp - 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let visible = self.visible_row_count();
        let rpp = self.pagination.rows_per_page;
        let table = &mut self.table;
        if table.curser_row + 1 < visible {
            table.curser_row = std::cmp::min(table.curser_row + size, visible - 1);
            self.update_table_data();
        } else if (table.page + 1) * rpp < table.rows.len() {
            // At the bottom of the page, flip to the next one
            table.page += 1;
            table.curser_row = 0;
            self.update_table_data();
        }
    }

    fn next_page(&mut self) {
        let rpp = self.pagination.rows_per_page;
        if (self.table.page + 1) * rpp < self.table.rows.len() {
            self.table.page += 1;
            self.table.curser_row = 0;
            self.update_table_data();
        }
    }

    fn prev_page(&mut self) {
        if self.table.page > 0 {
            self.table.page -= 1;
            self.table.curser_row = 0;
            self.update_table_data();
        }
    }

    fn move_table_selection_left(&mut self) {
        let table = &mut self.table;
        if table.curser_column > 0 {
            table.curser_column = table.curser_column.saturating_sub(1);
        } else if table.offset_column > 0 {
            table.offset_column = table.offset_column.saturating_sub(1);
        }
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        let table = &mut self.table;
        if table.curser_column + table.offset_column < self.data.len().saturating_sub(1) {
            // Somewhere before the last column
            if table.curser_column + 1 < table.visible_columns.len() {
                table.curser_column += 1;
            } else {
                table.offset_column += 1;
            }
            self.update_table_data();
        } else if table.visible_width > table.width
            && table.offset_column < self.data.len().saturating_sub(1)
        {
            // The last visible column can be wider than the screen
            table.offset_column += 1;
            self.update_table_data();
        }
    }

    fn toggle_table_index(&mut self) {
        self.table.show_index = !self.table.show_index;
        self.rebuild_layout(self.uilayout.width, self.uilayout.height);
        self.update_table_data();
    }

    fn toggle_column_status(&mut self, toggle_to_expand: bool) {
        let col_idx = self.current_column_idx();
        let column = match self.data.get_mut(col_idx) {
            Some(column) => column,
            None => return,
        };
        if !column.spec.resizable {
            return;
        }
        column.status = if toggle_to_expand {
            match column.status {
                ColumnStatus::COLLAPSED => ColumnStatus::EXPANDED,
                ColumnStatus::NORMAL => ColumnStatus::EXPANDED,
                ColumnStatus::EXPANDED => ColumnStatus::COLLAPSED,
            }
        } else {
            match column.status {
                ColumnStatus::COLLAPSED => ColumnStatus::NORMAL,
                ColumnStatus::NORMAL => ColumnStatus::COLLAPSED,
                ColumnStatus::EXPANDED => ColumnStatus::COLLAPSED,
            }
        };
        self.update_table_data();
    }

    // ---------------------- Clipboard -------------------------------------- //

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn copy_table_cell(&mut self, effects: &mut Vec<Effect>) {
        if self.table.rows.is_empty() {
            return;
        }
        let hit_idx = self.table.rows[self.abs_display_row()];
        if let Some(column) = self.data.get(self.current_column_idx()) {
            let cell = column.data[hit_idx].clone();
            trace!("Cell content: {}", cell);
            effects.push(Effect::CopyToClipboard(cell));
        }
    }

    fn copy_table_row(&mut self, effects: &mut Vec<Effect>) {
        if self.table.rows.is_empty() {
            return;
        }
        let hit_idx = self.table.rows[self.abs_display_row()];
        let content = self
            .data
            .iter()
            .map(|c| Self::wrap_cell_content(&c.data[hit_idx]))
            .collect::<Vec<String>>();
        effects.push(Effect::CopyToClipboard(content.join(",")));
    }

    fn copy_record_cell(&mut self, effects: &mut Vec<Effect>) {
        let record = &self.record_view;
        if record.row_data.is_empty() {
            return;
        }
        let cell = record.row_data[record.curser_offset + record.curser_row].clone();
        trace!("Cell content: {}", cell);
        effects.push(Effect::CopyToClipboard(cell));
    }

    // ---------------------- Record view ------------------------------------ //

    fn build_record_view(&mut self, record_idx: usize) {
        trace!("Building record view ...");
        let max_column_width = self.config.max_column_width;
        let record = &mut self.record_view;
        record.header_data = self
            .data
            .iter()
            .map(|c| c.spec.label.chars().take(max_column_width).collect::<String>())
            .collect();

        record.curser_offset = 0;
        record.curser_row = 0;
        record.record_idx = record_idx;
        record.height = self.uilayout.table_height;
        record.width = self.uilayout.table_width;

        record.header_width = record
            .header_data
            .iter()
            .map(|h| h.len())
            .max()
            .unwrap_or(0);
        record.row_width = record.width.saturating_sub(record.header_width);

        self.update_record_data();
    }

    fn update_record_data(&mut self) {
        let record = &mut self.record_view;
        record.record_idx =
            std::cmp::min(record.record_idx, self.table.rows.len().saturating_sub(1));
        let hit_idx = self.table.rows[record.record_idx];
        record.row_data = self.data.iter().map(|c| c.data[hit_idx].clone()).collect();

        let rbegin = record.curser_offset;
        let rend = std::cmp::min(rbegin + record.height, record.row_data.len());

        trace!(
            "Record: rIdx {}, rb {}, re {}, rows {}",
            record.record_idx,
            rbegin,
            rend,
            record.row_data.len()
        );
        record.header_view = ColumnView {
            id: String::new(),
            name: "Field".to_string(),
            data: record.header_data[rbegin..rend].to_vec(),
            width: record.header_width,
        };
        record.row_view = ColumnView {
            id: String::new(),
            name: "Value".to_string(),
            data: record.row_data[rbegin..rend].to_vec(),
            width: record.row_width,
        };

        self.update_uidata_for_record();
    }

    fn move_record_selection_up(&mut self, size: usize) {
        let record = &mut self.record_view;
        if record.curser_row > 0 {
            record.curser_row = record.curser_row.saturating_sub(size);
        } else if record.curser_offset > 0 {
            record.curser_offset = record.curser_offset.saturating_sub(size);
        }
        self.update_record_data();
    }

    fn move_record_selection_down(&mut self, size: usize) {
        let record = &mut self.record_view;
        if record.curser_row + record.curser_offset + 1 < record.row_data.len() {
            if record.curser_row + 1 < record.height {
                record.curser_row = std::cmp::min(
                    record.curser_row + size,
                    record.row_view.data.len().saturating_sub(1),
                );
            } else {
                record.curser_offset = std::cmp::min(
                    record.curser_offset + size,
                    record.row_data.len().saturating_sub(1),
                );
                record.curser_row = std::cmp::min(
                    record.height.saturating_sub(1),
                    record.row_data.len() - record.curser_offset - 1,
                );
            }
            self.update_record_data();
        }
    }

    fn previous_record(&mut self) {
        let record = &mut self.record_view;
        record.record_idx = record.record_idx.saturating_sub(1);
        self.update_record_data();
    }

    fn next_record(&mut self) {
        if self.record_view.record_idx + 1 < self.table.rows.len() {
            self.record_view.record_idx += 1;
            self.update_record_data();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_model() -> Model {
        Model::init(&AVConfig::default(), 120, 30)
    }

    fn route(org: &str, alert: &str, stream: &str) -> RouteParams {
        RouteParams {
            org_id: Some(org.to_string()),
            alert_name: Some(alert.to_string()),
            stream_name: Some(stream.to_string()),
        }
    }

    fn params(org: &str, alert: &str, stream: &str) -> QueryParams {
        QueryParams {
            org_id: org.to_string(),
            alert_name: alert.to_string(),
            stream_name: stream.to_string(),
        }
    }

    fn s(v: &str) -> Scalar {
        Scalar::String(v.to_string())
    }

    fn n(v: i64) -> Scalar {
        Scalar::Number(v.into())
    }

    fn record(fields: &[(&str, Scalar)]) -> Record {
        fields
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    fn history_hit(alert: &str, next_run_at: i64) -> Record {
        record(&[("alert_name", s(alert)), ("next_run_at", n(next_run_at))])
    }

    // Mount the model with default parameters and resolve the fetch
    fn loaded_model(hits: Vec<Record>) -> (Model, QueryParams) {
        let mut model = test_model();
        let p = params("default", "cpu-high", "triggers");
        let effects = model
            .update(Message::ParamsChanged(route("default", "cpu-high", "triggers")))
            .unwrap();
        assert_eq!(effects, vec![Effect::Fetch(p.clone())]);
        model
            .update(Message::FetchResolved {
                params: p.clone(),
                hits,
            })
            .unwrap();
        (model, p)
    }

    fn key(code: KeyCode) -> Message {
        Message::RawKey(KeyEvent::from(code))
    }

    fn type_string(model: &mut Model, input: &str) {
        for chr in input.chars() {
            model.update(key(KeyCode::Char(chr))).unwrap();
        }
    }

    #[test]
    fn initial_params_trigger_a_fetch() {
        let mut model = test_model();
        assert_eq!(model.status, Status::IDLE);

        let effects = model
            .update(Message::ParamsChanged(route("default", "cpu-high", "triggers")))
            .unwrap();
        assert_eq!(
            effects,
            vec![Effect::Fetch(params("default", "cpu-high", "triggers"))]
        );
        assert_eq!(model.status, Status::LOADING);
    }

    #[test]
    fn identical_params_do_not_refetch() {
        let (mut model, _) = loaded_model(vec![history_hit("cpu-high", 1)]);

        let effects = model
            .update(Message::ParamsChanged(route("default", "cpu-high", "triggers")))
            .unwrap();
        assert_eq!(effects, Vec::new());
        assert_eq!(model.status, Status::LOADED);
    }

    #[test]
    fn incomplete_params_are_ignored_silently() {
        let (mut model, _) = loaded_model(vec![history_hit("cpu-high", 1)]);

        let mut partial = route("default", "cpu-high", "triggers");
        partial.stream_name = None;
        let effects = model.update(Message::ParamsChanged(partial)).unwrap();

        assert_eq!(effects, Vec::new());
        assert_eq!(model.status, Status::LOADED);
        assert_eq!(model.hits.len(), 1);
    }

    #[test]
    fn superseded_fetch_results_are_dropped() {
        let mut model = test_model();
        let p1 = params("default", "cpu-high", "triggers");
        let p2 = params("default", "mem-low", "triggers");

        model
            .update(Message::ParamsChanged(route("default", "cpu-high", "triggers")))
            .unwrap();
        model
            .update(Message::ParamsChanged(route("default", "mem-low", "triggers")))
            .unwrap();

        // The first fetch resolves after the second was issued
        model
            .update(Message::FetchResolved {
                params: p1,
                hits: vec![history_hit("cpu-high", 1)],
            })
            .unwrap();
        assert_eq!(model.status, Status::LOADING);
        assert!(model.hits.is_empty());

        model
            .update(Message::FetchResolved {
                params: p2,
                hits: vec![history_hit("mem-low", 2)],
            })
            .unwrap();
        assert_eq!(model.status, Status::LOADED);
        assert_eq!(model.hits[0]["alert_name"], s("mem-low"));
        assert_eq!(model.uidata.table[0].data, vec!["mem-low".to_string()]);
    }

    #[test]
    fn stale_errors_are_dropped() {
        let mut model = test_model();
        model
            .update(Message::ParamsChanged(route("default", "cpu-high", "triggers")))
            .unwrap();
        model
            .update(Message::ParamsChanged(route("default", "mem-low", "triggers")))
            .unwrap();

        let effects = model
            .update(Message::FetchFailed {
                params: params("default", "cpu-high", "triggers"),
                error: FetchError {
                    message: Some("org not found".to_string()),
                },
            })
            .unwrap();
        assert_eq!(effects, Vec::new());
        assert_eq!(model.status, Status::LOADING);
    }

    #[test]
    fn fetch_errors_notify_and_keep_previous_rows() {
        let (mut model, _) = loaded_model(vec![history_hit("cpu-high", 1)]);

        model
            .update(Message::ParamsChanged(route("other", "cpu-high", "triggers")))
            .unwrap();
        let effects = model
            .update(Message::FetchFailed {
                params: params("other", "cpu-high", "triggers"),
                error: FetchError {
                    message: Some("org not found".to_string()),
                },
            })
            .unwrap();

        assert_eq!(
            effects,
            vec![Effect::Notify(
                NotifyKind::Negative,
                "org not found".to_string()
            )]
        );
        assert_eq!(model.status, Status::ERROR);
        // The previously displayed rows stay on screen
        assert_eq!(model.hits.len(), 1);
        assert_eq!(model.columns.len(), 2);
        assert_eq!(model.uidata.table[0].data, vec!["cpu-high".to_string()]);
    }

    #[test]
    fn fetch_errors_fall_back_to_a_generic_message() {
        let mut model = test_model();
        model
            .update(Message::ParamsChanged(route("default", "cpu-high", "triggers")))
            .unwrap();
        let effects = model
            .update(Message::FetchFailed {
                params: params("default", "cpu-high", "triggers"),
                error: FetchError { message: None },
            })
            .unwrap();
        assert_eq!(
            effects,
            vec![Effect::Notify(
                NotifyKind::Negative,
                FETCH_ERROR_FALLBACK.to_string()
            )]
        );
    }

    #[test]
    fn empty_results_are_no_data_not_an_error() {
        let (model, _) = loaded_model(Vec::new());
        assert_eq!(model.status, Status::LOADED);
        assert!(model.uidata.no_data);
        assert!(model.uidata.table.is_empty());
        assert_eq!(model.uidata.nrows, 0);
    }

    #[test]
    fn alert_history_scenario_infers_labeled_columns() {
        let (model, _) = loaded_model(vec![history_hit("cpu-high", 1700000000000)]);

        let columns: Vec<(&str, &str)> = model
            .columns
            .iter()
            .map(|c| (c.id.as_str(), c.label.as_str()))
            .collect();
        assert_eq!(
            columns,
            vec![("alert_name", "Alert name"), ("next_run_at", "Next run at")]
        );
        assert_eq!(model.hits.len(), 1);
        assert_eq!(model.uidata.table[1].data, vec!["1700000000000".to_string()]);
    }

    #[test]
    fn set_rows_per_page_only_touches_pagination() {
        let (mut model, _) = loaded_model(vec![history_hit("cpu-high", 1)]);

        model.set_rows_per_page(50);
        assert_eq!(model.pagination.rows_per_page, 50);
        assert_eq!(model.status, Status::LOADED);
        assert_eq!(model.hits.len(), 1);
        assert_eq!(model.columns.len(), 2);
        assert_eq!(model.uidata.rows_per_page, 50);
    }

    #[test]
    fn set_rows_per_page_rejects_values_outside_the_allowed_set() {
        let (mut model, _) = loaded_model(vec![history_hit("cpu-high", 1)]);
        model.set_rows_per_page(33);
        assert_eq!(model.pagination.rows_per_page, 25);
        model.set_rows_per_page(0);
        assert_eq!(model.pagination.rows_per_page, 25);
    }

    #[test]
    fn rpp_command_updates_the_page_size() {
        let (mut model, _) = loaded_model(vec![history_hit("cpu-high", 1)]);

        model.update(Message::EnterCommand).unwrap();
        assert!(model.raw_keyevents());
        type_string(&mut model, "rpp 50");
        model.update(key(KeyCode::Enter)).unwrap();

        assert!(!model.raw_keyevents());
        assert_eq!(model.pagination.rows_per_page, 50);
    }

    #[test]
    fn stream_command_without_value_stays_put() {
        let (mut model, _) = loaded_model(vec![history_hit("cpu-high", 1)]);

        model.update(Message::EnterCommand).unwrap();
        type_string(&mut model, "stream");
        let effects = model.update(key(KeyCode::Enter)).unwrap();

        // Missing required field: no fetch, no state change
        assert_eq!(effects, Vec::new());
        assert_eq!(model.status, Status::LOADED);
        assert_eq!(model.hits.len(), 1);
    }

    #[test]
    fn stream_command_with_value_refetches() {
        let (mut model, _) = loaded_model(vec![history_hit("cpu-high", 1)]);

        model.update(Message::EnterCommand).unwrap();
        type_string(&mut model, "stream history");
        let effects = model.update(key(KeyCode::Enter)).unwrap();

        assert_eq!(
            effects,
            vec![Effect::Fetch(params("default", "cpu-high", "history"))]
        );
        assert_eq!(model.status, Status::LOADING);
    }

    #[test]
    fn pagination_navigation_moves_between_pages() {
        let hits = (0..60).map(|i| history_hit("cpu-high", i)).collect();
        let (mut model, _) = loaded_model(hits);
        assert_eq!(model.uidata.total_pages, 3);
        assert_eq!(model.uidata.page, 0);

        model.update(Message::NextPage).unwrap();
        assert_eq!(model.uidata.page, 1);
        assert_eq!(model.uidata.abs_selected_row, 25);

        model.update(Message::MoveEnd).unwrap();
        assert_eq!(model.uidata.page, 2);
        assert_eq!(model.uidata.abs_selected_row, 59);

        // Already on the last page
        model.update(Message::NextPage).unwrap();
        assert_eq!(model.uidata.page, 2);

        model.update(Message::PrevPage).unwrap();
        assert_eq!(model.uidata.page, 1);

        model.update(Message::MoveBeginning).unwrap();
        assert_eq!(model.uidata.page, 0);
        assert_eq!(model.uidata.abs_selected_row, 0);
    }

    #[test]
    fn moving_past_the_page_edge_flips_the_page() {
        let hits = (0..30).map(|i| history_hit("cpu-high", i)).collect();
        let (mut model, _) = loaded_model(hits);

        model.update(Message::MoveUp).unwrap();
        assert_eq!(model.uidata.abs_selected_row, 0);

        for _ in 0..24 {
            model.update(Message::MoveDown).unwrap();
        }
        assert_eq!(model.uidata.abs_selected_row, 24);
        model.update(Message::MoveDown).unwrap();
        assert_eq!(model.uidata.page, 1);
        assert_eq!(model.uidata.abs_selected_row, 25);

        model.update(Message::MoveUp).unwrap();
        assert_eq!(model.uidata.page, 0);
    }

    #[test]
    fn page_size_change_keeps_the_selected_row() {
        let hits = (0..60).map(|i| history_hit("cpu-high", i)).collect();
        let (mut model, _) = loaded_model(hits);

        model.update(Message::NextPage).unwrap();
        assert_eq!(model.uidata.abs_selected_row, 25);

        model.set_rows_per_page(10);
        assert_eq!(model.uidata.page, 2);
        assert_eq!(model.uidata.abs_selected_row, 25);
    }

    #[test]
    fn sorting_orders_rows_by_the_selected_column() {
        let hits = vec![
            record(&[("took", n(3))]),
            record(&[("took", n(1))]),
            record(&[("took", Scalar::Null)]),
            record(&[("took", n(2))]),
        ];
        let (mut model, _) = loaded_model(hits);

        model.update(Message::SortAscending).unwrap();
        assert_eq!(model.uidata.table[0].data, vec!["1", "2", "3", "∅"]);

        model.update(Message::SortDescending).unwrap();
        assert_eq!(model.uidata.table[0].data, vec!["∅", "3", "2", "1"]);
    }

    #[test]
    fn search_selects_the_matching_row() {
        let hits = (0..40)
            .map(|i| record(&[("alert_name", s(&format!("alert-{i}")))]))
            .collect();
        let (mut model, _) = loaded_model(hits);

        model.update(Message::Search).unwrap();
        type_string(&mut model, "alert-33");
        model.update(key(KeyCode::Enter)).unwrap();

        assert_eq!(model.uidata.abs_selected_row, 33);
        assert_eq!(model.uidata.page, 1);
        assert_eq!(model.uidata.status_message, "Found 1 results");
    }

    #[test]
    fn search_without_matches_reports_it() {
        let (mut model, _) = loaded_model(vec![history_hit("cpu-high", 1)]);
        model.update(Message::Search).unwrap();
        type_string(&mut model, "no-such-alert");
        model.update(key(KeyCode::Enter)).unwrap();

        assert_eq!(model.uidata.status_message, "Found no matches!");
        assert_eq!(model.uidata.abs_selected_row, 0);
    }

    #[test]
    fn search_next_cycles_through_matches() {
        let hits = (0..6)
            .map(|i| {
                record(&[(
                    "alert_name",
                    s(if i % 2 == 0 { "match" } else { "other" }),
                )])
            })
            .collect();
        let (mut model, _) = loaded_model(hits);

        model.update(Message::Search).unwrap();
        type_string(&mut model, "match");
        model.update(key(KeyCode::Enter)).unwrap();
        assert_eq!(model.uidata.abs_selected_row, 0);

        model.update(Message::SearchNext).unwrap();
        assert_eq!(model.uidata.abs_selected_row, 2);
        model.update(Message::SearchNext).unwrap();
        assert_eq!(model.uidata.abs_selected_row, 4);
        // Wraps around
        model.update(Message::SearchNext).unwrap();
        assert_eq!(model.uidata.abs_selected_row, 0);
        model.update(Message::SearchPrev).unwrap();
        assert_eq!(model.uidata.abs_selected_row, 4);
    }

    #[test]
    fn canceled_prompt_changes_nothing() {
        let (mut model, _) = loaded_model(vec![history_hit("cpu-high", 1)]);
        model.update(Message::Search).unwrap();
        type_string(&mut model, "cpu");
        model.update(key(KeyCode::Esc)).unwrap();

        assert!(!model.raw_keyevents());
        assert_eq!(model.uidata.prompt.input, "");
    }

    #[test]
    fn record_view_inspects_the_selected_row() {
        let hits = vec![history_hit("cpu-high", 1), history_hit("mem-low", 2)];
        let (mut model, _) = loaded_model(hits);

        model.update(Message::Enter).unwrap();
        assert_eq!(model.uidata.name, "R[triggers/cpu-high]");
        assert_eq!(model.uidata.table[0].data, vec!["Alert name", "Next run at"]);
        assert_eq!(model.uidata.table[1].data, vec!["cpu-high", "1"]);

        // Flip to the next record and back to the table
        model.update(Message::MoveRight).unwrap();
        assert_eq!(model.uidata.table[1].data, vec!["mem-low", "2"]);
        model.update(Message::Exit).unwrap();
        assert_eq!(model.uidata.name, "triggers/cpu-high");
    }

    #[test]
    fn copy_cell_requests_a_clipboard_effect() {
        let (mut model, _) = loaded_model(vec![history_hit("cpu-high", 1)]);
        let effects = model.update(Message::CopyCell).unwrap();
        assert_eq!(
            effects,
            vec![Effect::CopyToClipboard("cpu-high".to_string())]
        );
    }

    #[test]
    fn copy_row_builds_a_csv_line() {
        let (mut model, _) = loaded_model(vec![record(&[
            ("alert_name", s("cpu high")),
            ("took", n(42)),
        ])]);
        let effects = model.update(Message::CopyRow).unwrap();
        assert_eq!(
            effects,
            vec![Effect::CopyToClipboard("\"cpu high\",42".to_string())]
        );
    }

    #[test]
    fn wrap_cell_content_quotes_like_csv() {
        assert_eq!(Model::wrap_cell_content("plain"), "plain");
        assert_eq!(Model::wrap_cell_content("a,b"), "\"a,b\"");
        assert_eq!(Model::wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn refresh_refetches_the_current_params() {
        let (mut model, p) = loaded_model(vec![history_hit("cpu-high", 1)]);
        let effects = model.update(Message::Refresh).unwrap();
        assert_eq!(effects, vec![Effect::Fetch(p)]);
        assert_eq!(model.status, Status::LOADING);
    }

    #[test]
    fn refresh_without_params_is_a_noop() {
        let mut model = test_model();
        let effects = model.update(Message::Refresh).unwrap();
        assert_eq!(effects, Vec::new());
        assert_eq!(model.status, Status::IDLE);
    }

    #[test]
    fn quit_moves_to_quitting() {
        let mut model = test_model();
        model.update(Message::Quit).unwrap();
        assert_eq!(model.status, Status::QUITTING);
    }
}
