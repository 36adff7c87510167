use std::process::ExitCode;
use std::sync::Arc;
use std::sync::mpsc;

use arboard::Clipboard;
use clap::Parser;
use tracing::{info, trace};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod controller;
mod domain;
mod model;
mod schema;
mod ui;

use client::{HttpDataAccess, spawn_fetch};
use controller::Controller;
use domain::{AVConfig, AVError, Effect, Message, NotifyKind, RouteParams};
use model::{Model, Status};
use ui::TableUI;

/// A tui based alert history and trigger viewer.
#[derive(Parser, Debug)]
#[command(name = "av", version, about)]
struct Args {
    /// Organization the alert belongs to
    #[arg(long)]
    org: Option<String>,

    /// Alert to show the history of
    #[arg(long)]
    alert: Option<String>,

    /// Stream holding the alert events
    #[arg(long)]
    stream: Option<String>,

    /// Base url of the backend
    #[arg(long, default_value = "http://localhost:5080")]
    base_url: String,

    /// File holding the api token, ~ expands
    #[arg(long)]
    token_file: Option<String>,

    /// Append logs to this file, the terminal belongs to the ui
    #[arg(long)]
    log_file: Option<String>,

    /// Rows per page, one of 10, 25, 50, 100
    #[arg(long, default_value_t = 25)]
    rows_per_page: usize,

    /// Terminal event poll interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Widest a column is rendered before it is cut off
    #[arg(long, default_value_t = 48)]
    max_column_width: usize,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

// Without a log file tracing stays uninitialized and all events are dropped
fn setup_tracing(log_file: &Option<String>) -> Result<(), AVError> {
    let path = match log_file {
        Some(path) => path,
        None => return Ok(()),
    };
    let expanded = shellexpand::full(path)
        .map_err(|e| AVError::Config(format!("Bad log file path: {e}")))?;
    let file = std::fs::File::create(expanded.as_ref())?;
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run() -> Result<(), AVError> {
    let args = Args::parse();
    setup_tracing(&args.log_file)?;
    info!("Starting av!");

    let config = AVConfig::default()
        .base_url(args.base_url)
        .token_file(args.token_file)
        .rows_per_page(args.rows_per_page)
        .event_poll_time(args.poll_ms)
        .max_column_width(args.max_column_width);

    let access = Arc::new(HttpDataAccess::from_config(&config)?);
    let (tx, rx) = mpsc::channel::<Message>();

    let mut terminal = ratatui::init();
    let size = terminal.size()?;

    let mut model = Model::init(&config, size.width as usize, size.height as usize);
    let mut ui = TableUI::new();
    let controller = Controller::new(&config);

    // Initial mount, the query parameters come from the cli. Missing ones
    // leave the model idle until they are completed with `:` commands.
    let mut pending = vec![Message::ParamsChanged(RouteParams {
        org_id: args.org,
        alert_name: args.alert,
        stream_name: args.stream,
    })];

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Terminal events and completed fetches feed the same reducer
        if let Some(message) = controller.handle_event(&model)? {
            pending.push(message);
        }
        while let Ok(message) = rx.try_recv() {
            pending.push(message);
        }

        for message in pending.drain(..) {
            for effect in model.update(message)? {
                run_effect(effect, &access, &tx, &mut ui);
            }
        }
    }

    Ok(())
}

fn run_effect(
    effect: Effect,
    access: &Arc<HttpDataAccess>,
    tx: &mpsc::Sender<Message>,
    ui: &mut TableUI,
) {
    match effect {
        Effect::Fetch(params) => spawn_fetch(Arc::clone(access), params, tx.clone()),
        Effect::Notify(kind, message) => ui.notify(kind, &message),
        Effect::CopyToClipboard(text) => {
            match Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text)) {
                Ok(_) => ui.notify(NotifyKind::Positive, "Copied to clipboard."),
                Err(e) => {
                    trace!("Error copying to clipboard: {:?}", e);
                    ui.notify(NotifyKind::Negative, "Clipboard copy failed.");
                }
            }
        }
    }
}
