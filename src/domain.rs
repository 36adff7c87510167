use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

use crate::schema::Record;

// Hard application errors. Fetch failures are not listed here, they are
// events of the state machine and carry their own type below.
#[derive(Debug)]
pub enum AVError {
    IoError(Error),
    Config(String),
}

impl From<Error> for AVError {
    fn from(err: Error) -> Self {
        AVError::IoError(err)
    }
}

// Failure reported by the data access service. The message is whatever the
// backend provided, there might be none.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchError {
    pub message: Option<String>,
}

// Shown when the backend rejects a fetch without a usable message.
pub const FETCH_ERROR_FALLBACK: &str = "Failed to fetch alert history.";

// Page sizes the ui offers. `Model::set_rows_per_page` rejects anything else.
pub const ROWS_PER_PAGE_OPTIONS: [usize; 4] = [10, 25, 50, 100];

// A fully resolved query. All three fields are required, a partial parameter
// set never reaches the fetch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub org_id: String,
    pub alert_name: String,
    pub stream_name: String,
}

// Query parameters as they arrive from the outside (cli arguments, `:`
// commands). Individual fields can still be missing while the user is on
// the way to a complete query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    pub org_id: Option<String>,
    pub alert_name: Option<String>,
    pub stream_name: Option<String>,
}

impl RouteParams {
    pub fn complete(&self) -> Option<QueryParams> {
        Some(QueryParams {
            org_id: self.org_id.clone()?,
            alert_name: self.alert_name.clone()?,
            stream_name: self.stream_name.clone()?,
        })
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct AVConfig {
    pub base_url: String,
    pub token_file: Option<String>,
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub rows_per_page: usize,
}

impl Default for AVConfig {
    fn default() -> Self {
        AVConfig {
            base_url: "http://localhost:5080".to_string(),
            token_file: None,
            event_poll_time: 100,
            max_column_width: 48,
            rows_per_page: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MoveBeginning,
    MoveEnd,
    NextPage,
    PrevPage,
    GrowRowsPerPage,
    ShrinkRowsPerPage,
    SortAscending,
    SortDescending,
    ToggleColumnState,
    ToggleExpandColumnState,
    ToggleIndex,
    CopyCell,
    CopyRow,
    Enter,
    Exit,
    Help,
    EnterCommand,
    Search,
    SearchNext,
    SearchPrev,
    Refresh,
    Resize(usize, usize),
    RawKey(KeyEvent),
    ParamsChanged(RouteParams),
    FetchResolved {
        params: QueryParams,
        hits: Vec<Record>,
    },
    FetchFailed {
        params: QueryParams,
        error: FetchError,
    },
}

// Side effects requested by the reducer. The event loop in main executes
// them, the model itself never talks to the network, the notification sink
// or the clipboard.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Fetch(QueryParams),
    Notify(NotifyKind, String),
    CopyToClipboard(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyKind {
    Positive,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    Command,
    SearchTable,
}

pub const HELP_TEXT: &str = "
 Navigation
   Up/k Down/j     move row selection
   Left/h Right/l  move column selection
   PgUp/< PgDn/>   previous / next page
   g / G           first / last row

 Table
   s / S           sort by current column, ascending / descending
   x / X           collapse / expand current column
   i               toggle row index
   [ / ]           shrink / grow page size
   Enter           inspect selected record
   c / y           copy cell / copy row

 Query
   :               command: org <id> | stream <name> | alert <name> | rpp <n>
   /               search, n / N for next / previous match
   r               refresh current query

 q quit, Esc back, ? help
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_route_params_resolve() {
        let route = RouteParams {
            org_id: Some("default".to_string()),
            alert_name: Some("cpu-high".to_string()),
            stream_name: Some("triggers".to_string()),
        };
        assert_eq!(
            route.complete(),
            Some(QueryParams {
                org_id: "default".to_string(),
                alert_name: "cpu-high".to_string(),
                stream_name: "triggers".to_string(),
            })
        );
    }

    #[test]
    fn partial_route_params_do_not_resolve() {
        let mut route = RouteParams {
            org_id: Some("default".to_string()),
            alert_name: Some("cpu-high".to_string()),
            stream_name: Some("triggers".to_string()),
        };
        route.stream_name = None;
        assert_eq!(route.complete(), None);

        assert_eq!(RouteParams::default().complete(), None);
    }
}
