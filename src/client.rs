use std::fs;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::domain::{AVConfig, AVError, FetchError, Message, QueryParams};
use crate::schema::Record;

// Timeout policy lives here, not in the view controller.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<Record>,
}

pub trait DataAccess {
    fn fetch(&self, params: &QueryParams) -> Result<SearchResponse, FetchError>;
}

// Error payload shape of the backend. Anything that does not parse is passed
// through as raw text.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn parse_error_message(body: &str) -> Option<String> {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) if !body.trim().is_empty() => Some(body.trim().to_string()),
        Err(_) => None,
    }
}

pub struct HttpDataAccess {
    base_url: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpDataAccess {
    pub fn from_config(config: &AVConfig) -> Result<Self, AVError> {
        let token = match &config.token_file {
            Some(path) => {
                let expanded = shellexpand::full(path)
                    .map_err(|e| AVError::Config(format!("Bad token file path: {e}")))?;
                Some(fs::read_to_string(expanded.as_ref())?.trim().to_string())
            }
            None => None,
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AVError::Config(format!("Failed to build http client: {e}")))?;
        Ok(HttpDataAccess {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn history_url(&self, params: &QueryParams) -> String {
        format!(
            "{}/api/{}/{}/alerts/{}/history",
            self.base_url, params.org_id, params.stream_name, params.alert_name
        )
    }
}

impl DataAccess for HttpDataAccess {
    fn fetch(&self, params: &QueryParams) -> Result<SearchResponse, FetchError> {
        let url = self.history_url(params);
        debug!("Fetching {url}");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            trace!("Fetch rejected with {status}: {body}");
            return Err(FetchError {
                message: parse_error_message(&body),
            });
        }

        Ok(response.json::<SearchResponse>()?)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError {
            message: Some(err.to_string()),
        }
    }
}

/// Run a fetch on a worker thread and report the tagged result back on the
/// event channel. The tag travels with the result so the model can discard
/// anything that was superseded while the request was in flight, the worker
/// itself never looks at model state.
pub fn spawn_fetch<D>(access: Arc<D>, params: QueryParams, tx: Sender<Message>)
where
    D: DataAccess + Send + Sync + 'static,
{
    thread::spawn(move || {
        let message = match access.fetch(&params) {
            Ok(response) => Message::FetchResolved {
                params,
                hits: response.hits,
            },
            Err(error) => Message::FetchFailed { params, error },
        };
        if tx.send(message).is_err() {
            trace!("Event channel closed before the fetch completed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    use crate::schema::Scalar;

    fn params() -> QueryParams {
        QueryParams {
            org_id: "default".to_string(),
            alert_name: "cpu-high".to_string(),
            stream_name: "triggers".to_string(),
        }
    }

    struct MockDataAccess {
        calls: AtomicUsize,
        result: Result<SearchResponse, FetchError>,
    }

    impl DataAccess for MockDataAccess {
        fn fetch(&self, _params: &QueryParams) -> Result<SearchResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    #[test]
    fn history_url_contains_all_parameters() {
        let access = HttpDataAccess::from_config(
            &AVConfig::default().base_url("http://localhost:5080/"),
        )
        .unwrap();
        assert_eq!(
            access.history_url(&params()),
            "http://localhost:5080/api/default/triggers/alerts/cpu-high/history"
        );
    }

    #[test]
    fn error_message_prefers_the_json_body() {
        assert_eq!(
            parse_error_message(r#"{"code": 404, "message": "org not found"}"#),
            Some("org not found".to_string())
        );
        assert_eq!(
            parse_error_message("upstream unavailable"),
            Some("upstream unavailable".to_string())
        );
        assert_eq!(parse_error_message(""), None);
        assert_eq!(parse_error_message(r#"{"code": 500}"#), None);
    }

    #[test]
    fn search_response_preserves_field_order() {
        let raw = r#"{"hits": [{"stream": "default", "alert_name": "cpu-high", "fired": true, "note": null, "took": 42}]}"#;
        let response: SearchResponse = serde_json::from_str(raw).unwrap();
        let keys: Vec<&str> = response.hits[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["stream", "alert_name", "fired", "note", "took"]);
        assert_eq!(response.hits[0]["fired"], Scalar::Bool(true));
        assert_eq!(response.hits[0]["note"], Scalar::Null);
        assert_eq!(response.hits[0]["took"], Scalar::Number(42.into()));
    }

    #[test]
    fn fetch_worker_reports_tagged_results() {
        let access = Arc::new(MockDataAccess {
            calls: AtomicUsize::new(0),
            result: Ok(SearchResponse { hits: Vec::new() }),
        });
        let (tx, rx) = mpsc::channel();

        spawn_fetch(Arc::clone(&access), params(), tx);
        let message = rx.recv().unwrap();
        assert_eq!(
            message,
            Message::FetchResolved {
                params: params(),
                hits: Vec::new(),
            }
        );
        assert_eq!(access.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fetch_worker_reports_tagged_errors() {
        let access = Arc::new(MockDataAccess {
            calls: AtomicUsize::new(0),
            result: Err(FetchError {
                message: Some("org not found".to_string()),
            }),
        });
        let (tx, rx) = mpsc::channel();

        spawn_fetch(access, params(), tx);
        assert_eq!(
            rx.recv().unwrap(),
            Message::FetchFailed {
                params: params(),
                error: FetchError {
                    message: Some("org not found".to_string())
                },
            }
        );
    }
}
