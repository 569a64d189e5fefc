use std::{
    fmt::Display,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use ansi_term::{Colour, Style};
use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    engine::{
        create_engine,
        error::SessionError,
        identity::StaticIdentity,
        session::{SessionStatus, SUGGESTED_ACTIVITIES},
        shutdown,
        ticker::{DisplayState, DisplayStatus},
        Ack, ActivityEngine, EngineConfig,
    },
    storage::activity_log::{ActivityLog, JsonLinesLog, MemoryLog},
    utils::{clock::DefaultClock, time::format_duration},
};

#[derive(Debug, Parser)]
pub struct TrackCommand {
    #[arg(long, help = "Keep history in memory only. Nothing is written to disk")]
    ephemeral: bool,
    #[arg(long, help = "Redraw the clock every second instead of only when its status changes")]
    live: bool,
    #[arg(
        long = "write-retries",
        default_value_t = 2,
        help = "How many more times to try saving a stopped activity before giving up"
    )]
    write_retries: u32,
}

/// Commands accepted by the tracking console, one per line.
#[derive(Debug, Parser)]
#[command(multicall = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum ConsoleCommand {
    #[command(about = "Start tracking an activity, for example `start study`")]
    Start {
        #[arg(required = true, num_args = 1..)]
        activity: Vec<String>,
    },
    #[command(about = "Stop the current activity and save it")]
    Stop,
    #[command(about = "Pause or resume the clock")]
    Pause,
    #[command(about = "Show the clock and today's total")]
    Status,
    #[command(about = "Today's report")]
    Today,
    #[command(about = "This week's report")]
    Week,
    #[command(about = "This month's report")]
    Month,
    #[command(about = "Today's report addressed to someone else")]
    Digest,
    #[command(about = "List suggested activities")]
    Activities,
    #[command(about = "Leave the tracker", alias = "exit")]
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Command to process `track` command. Runs the engine, its clock and an interactive console
/// until the user quits or presses Ctrl-C.
pub async fn process_track_command(
    TrackCommand {
        ephemeral,
        live,
        write_retries,
    }: TrackCommand,
    app_dir: PathBuf,
    identity: StaticIdentity,
) -> Result<()> {
    let config = EngineConfig {
        write_retries,
        ..Default::default()
    };
    if ephemeral {
        run_tracking(config, MemoryLog::new(), identity, live).await
    } else {
        let log = JsonLinesLog::new(app_dir)?;
        info!("Saving history into {:?}", log.path());
        run_tracking(config, log, identity, live).await
    }
}

async fn run_tracking<L: ActivityLog>(
    config: EngineConfig,
    log: L,
    identity: StaticIdentity,
    live: bool,
) -> Result<()> {
    let shutdown_token = CancellationToken::new();
    let (engine, ticker) = create_engine(
        config,
        log,
        Box::new(identity),
        Arc::new(DefaultClock),
        &shutdown_token,
    );

    println!("Tracking as {}. Type `help` for commands.", engine.current_identity());

    let (_, _, console_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        ticker.run(),
        async {
            let result = run_console(&engine, &shutdown_token, live).await;
            shutdown_token.cancel();
            result
        },
    );

    if engine.status() != SessionStatus::Ready {
        let shown = engine.display_state();
        warn!("Leaving with an unsaved session {shown}");
        println!("\n{shown} was not stopped and won't be saved");
    }

    console_result
}

async fn run_console<L: ActivityLog>(
    engine: &ActivityEngine<L>,
    shutdown: &CancellationToken,
    live: bool,
) -> Result<()> {
    let mut lines = spawn_stdin_reader();
    let mut display = engine.subscribe_display();
    let mut last_status = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            Some(state) = display.next() => {
                if live || last_status != Some(state.status) {
                    last_status = Some(state.status);
                    draw_clock(&state, live)?;
                }
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    return Ok(());
                };
                if execute(engine, &line?).await == Flow::Quit {
                    return Ok(());
                }
            }
        }
    }
}

/// Reads stdin on a plain thread. A blocking read can't be cancelled, and keeping it off the
/// runtime means an unfinished line never holds up shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<io::Result<String>> {
    let (sender, receiver) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in io::stdin().lines() {
            if sender.blocking_send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

fn paint_clock(state: &DisplayState) -> String {
    let style = match state.status {
        DisplayStatus::Live => Colour::Green.bold(),
        DisplayStatus::Paused => Colour::Yellow.bold(),
        DisplayStatus::Ready => Style::new().dimmed(),
    };
    style.paint(state.to_string()).to_string()
}

fn draw_clock(state: &DisplayState, redraw_in_place: bool) -> Result<(), io::Error> {
    let mut stdout = io::stdout().lock();
    if redraw_in_place {
        // Clears the current line before writing over it
        write!(stdout, "\r\x1b[2K{}", paint_clock(state))?;
    } else {
        writeln!(stdout, "{}", paint_clock(state))?;
    }
    stdout.flush()
}

/// Runs a single console line against the engine. Failures are shown to the user and never end
/// the session.
async fn execute<L: ActivityLog>(engine: &ActivityEngine<L>, line: &str) -> Flow {
    let line = line.trim();
    if line.is_empty() {
        return Flow::Continue;
    }

    let command = match ConsoleLine::try_parse_from(line.split_whitespace()) {
        Ok(v) => v.command,
        Err(e) => {
            println!("{e}");
            return Flow::Continue;
        }
    };

    let identity = engine.current_identity();
    match command {
        ConsoleCommand::Start { activity } => print_transition(engine.start(&activity.join(" "))),
        ConsoleCommand::Stop => print_transition(engine.stop().await),
        ConsoleCommand::Pause => print_transition(engine.toggle_pause()),
        ConsoleCommand::Status => {
            println!("{}", paint_clock(&engine.display_state()));
            match engine.today_total(&identity).await {
                Ok(total) => println!("Tracked today: {}", format_duration(total)),
                Err(e) => print_query_failure(e),
            }
        }
        ConsoleCommand::Today => print_report(engine.daily_report(&identity).await),
        ConsoleCommand::Week => print_report(engine.weekly_report(&identity).await),
        ConsoleCommand::Month => print_report(engine.monthly_report(&identity).await),
        ConsoleCommand::Digest => print_report(engine.digest(&identity).await),
        ConsoleCommand::Activities => println!("{}", SUGGESTED_ACTIVITIES.join(", ")),
        ConsoleCommand::Quit => return Flow::Quit,
    }
    Flow::Continue
}

fn print_transition(result: Result<Ack, SessionError>) {
    match result {
        Ok(ack) => println!("{}", Colour::Green.paint(ack.to_string())),
        Err(e @ SessionError::WriteFailure { .. }) => {
            println!("{}", Colour::Red.paint(e.to_string()))
        }
        Err(e) => println!("{}", Colour::Yellow.paint(e.to_string())),
    }
}

fn print_report(result: Result<impl Display>) {
    match result {
        Ok(report) => println!("{report}"),
        Err(e) => print_query_failure(e),
    }
}

fn print_query_failure(e: anyhow::Error) {
    error!("Report query failed {e:?}");
    println!("{}", Colour::Red.paint(format!("Couldn't read history: {e}")));
}
