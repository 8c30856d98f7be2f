pub mod autostart;
pub mod process;
pub mod stats;

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use process::{kill_previous_daemons, restart_daemon};
use stats::{process_stats_command, StatsCommand};
use tracing::{level_filters::LevelFilter, warn};

use crate::{
    daemon::{
        start_daemon,
        store::state_store::{StateStore, StateStoreImpl},
    },
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Keytally", version, long_about = None)]
#[command(about = "Background keystroke counter with daily statistics", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {},
    #[command(about = "Display keypress statistics")]
    Stats {
        #[command(flatten)]
        command: StatsCommand,
    },
    #[command(
        about = "Run a daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(about = "Manage launch at login")]
    Autostart {
        #[command(subcommand)]
        command: autostart::AutostartCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let app_dir = create_application_default_path()?;
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Init {} => {
            print_autostart_hint_once(&app_dir).await;
            restart_daemon()?;
            Ok(())
        }
        Commands::Stop {} => {
            let process_name = env::current_exe().expect("Can't operate without an executable");
            kill_previous_daemons(&process_name);
            Ok(())
        }
        Commands::Serve { dir } => {
            start_daemon(dir.map_or(app_dir, |v| v)).await?;
            Ok(())
        }
        Commands::Stats { command } => process_stats_command(command).await,
        Commands::Autostart { command } => autostart::process_autostart_command(command),
    }
}

/// Shown exactly once across the lifetime of the installation. The marker rides along in the
/// state document but isn't part of the counter state.
async fn print_autostart_hint_once(app_dir: &Path) {
    let result: Result<()> = async {
        let store = StateStoreImpl::new(app_dir.join("state"))?;
        let mut entity = store.load().await?;
        if entity.autostart_hinted {
            return Ok(());
        }
        println!("Tip: `keytally autostart enable` makes counting start when you log in.");
        entity.autostart_hinted = true;
        store.save(&entity).await?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        warn!("Couldn't handle the autostart hint {e:?}");
    }
}
