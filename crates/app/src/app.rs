use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::Event;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use kubedeck_api::Repository;
use kubedeck_engine::Msg;
use kubedeck_store::{spawn_ingest, Source};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::Cli;
use crate::controller::Controller;
use crate::event::{spawn_event_reader, spawn_tasks};
use crate::fixture::FixtureSource;
use crate::input::{Command, Input};
use crate::ui::{self, table_viewport};

const INGEST_CAPACITY: usize = 4_096;

pub async fn run(cli: Cli) -> Result<()> {
    // Load before touching the terminal so errors print normally.
    let source = match &cli.fixture {
        Some(path) => FixtureSource::load(path)?,
        None => FixtureSource::empty(),
    };

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
        original_hook(info);
    }));

    enable_raw_mode().context("failed to enable raw mode")?;
    io::stdout().execute(EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, cli, source).await;

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, cli: Cli, source: FixtureSource) -> Result<()> {
    let source: Arc<dyn Source> = Arc::new(source);
    let store = spawn_ingest(INGEST_CAPACITY, Some(source));
    let ingest = store.sender();
    let repo: Arc<dyn Repository> = Arc::new(store);
    let mut ctl = Controller::new(cli.engine_config(), repo, Some(ingest));

    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<Msg>();
    let (width, height) = crossterm::terminal::size().context("reading terminal size")?;
    let (width, height) = table_viewport(width, height);
    spawn_tasks(ctl.update(Msg::Resize { width, height }), &msg_tx);
    spawn_tasks(ctl.start(&cli.screen), &msg_tx);
    info!(screen = %ctl.current_id(), "app: started");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    spawn_event_reader(event_tx);
    let mut input = Input::new();
    // Redraws let expired status lines disappear without input.
    let mut redraw = tokio::time::interval(Duration::from_millis(250));

    loop {
        terminal.draw(|frame| ui::draw(frame, &ctl, &input, Instant::now()))?;

        tokio::select! {
            Some(event) = event_rx.recv() => match event {
                Event::Resize(w, h) => {
                    let (width, height) = table_viewport(w, h);
                    spawn_tasks(ctl.update(Msg::Resize { width, height }), &msg_tx);
                }
                Event::Key(key) => {
                    let filter = ctl.current().map(|s| s.filter_text().to_string()).unwrap_or_default();
                    let tasks = match input.handle_key(key, &filter) {
                        Some(Command::Quit) => {
                            info!("app: quit");
                            return Ok(());
                        }
                        Some(Command::Back) => ctl.back(),
                        Some(Command::Open(name)) => ctl.open_by_name(&name),
                        Some(Command::Screen(action)) => ctl.update(Msg::Action(action)),
                        None => Vec::new(),
                    };
                    spawn_tasks(tasks, &msg_tx);
                }
                _ => {}
            },
            Some(msg) = msg_rx.recv() => spawn_tasks(ctl.update(msg), &msg_tx),
            _ = redraw.tick() => {}
        }
    }
}
