pub mod report;
pub mod track;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use report::{process_report_command, ReportCommand};
use tracing::level_filters::LevelFilter;
use track::{process_track_command, TrackCommand};

use crate::{
    engine::{
        identity::{StaticIdentity, GUEST_IDENTITY},
        session::SUGGESTED_ACTIVITIES,
    },
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX, TRACK_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Studyclock", version, long_about = None)]
#[command(about = "Track time spent on study, sleep, exercise and other activities", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        short,
        global = true,
        env = "STUDYCLOCK_USER",
        default_value = GUEST_IDENTITY,
        help = "Who the activities are recorded for"
    )]
    user: String,
    #[arg(long, global = true, help = "Mirror logs to the console")]
    log: bool,
    #[arg(long = "log-filter", global = true)]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Open an interactive tracking session with a live clock")]
    Track {
        #[command(flatten)]
        command: TrackCommand,
    },
    #[command(about = "Print a daily, weekly or monthly report")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(about = "List suggested activities")]
    Activities {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .map_or_else(create_application_default_path, Ok)?;

    let prefix = match args.commands {
        Commands::Track { .. } => TRACK_PREFIX,
        Commands::Report { .. } | Commands::Activities {} => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir, args.log_filter, args.log)?;

    let identity = StaticIdentity::new(&args.user);

    match args.commands {
        Commands::Track { command } => process_track_command(command, app_dir, identity).await,
        Commands::Report { command } => process_report_command(command, app_dir, identity).await,
        Commands::Activities {} => {
            print_activities();
            Ok(())
        }
    }
}

fn print_activities() {
    for activity in SUGGESTED_ACTIVITIES {
        println!("{activity}");
    }
}
