// Command line surface. Parses arguments, sets up logging and hands off
// to the UI layer.

use crate::api::ApiClient;
use crate::config::{AppDirs, CACHE_DIR_ENV, CONFIG_DIR_ENV};
use crate::share::resolve_sources;
use crate::ui::{self, ConfigureInput};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "papra-share",
    version,
    about = "Send files to a self-hosted Papra document server"
)]
pub struct Cli {
    /// Directory holding the settings store
    #[arg(long, global = true, env = CONFIG_DIR_ENV, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Directory used to stage files while they upload
    #[arg(long, global = true, env = CACHE_DIR_ENV, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Set server URL, API key and organization id
    Configure {
        /// Server address, with or without http(s)://
        #[arg(long)]
        server_url: Option<String>,
        /// API key created in the Papra web interface
        #[arg(long)]
        api_key: Option<String>,
        /// Organization the documents are added to
        #[arg(long)]
        organization_id: Option<String>,
        /// Use http:// instead of https:// when the URL has no scheme
        #[arg(long)]
        http: bool,
    },
    /// Print the stored settings (API key masked)
    Show,
    /// Upload files to the configured organization, one after another
    Send {
        /// Files to upload; `-` reads standard input
        #[arg(value_name = "FILES")]
        files: Vec<PathBuf>,
        /// File name to report for data read from standard input
        #[arg(long)]
        name: Option<String>,
    },
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn init_logging(verbose: u8) {
    let default = level_for(verbose).to_string().to_lowercase();
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .try_init();
}

pub fn run_cli() -> Result<ExitCode> {
    run(Cli::parse())
}

pub fn run(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose);
    let dirs = AppDirs::resolve(cli.config_dir, cli.cache_dir);
    log::debug!("using {:?}", dirs);

    match cli.command {
        Some(Command::Configure {
            server_url,
            api_key,
            organization_id,
            http,
        }) => {
            ui::configure(
                &dirs,
                ConfigureInput {
                    server_url,
                    api_key,
                    organization_id,
                    http,
                },
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Show) => {
            ui::show_settings(&dirs)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Send { files, name }) => {
            let api = ApiClient::new().context("Failed to build HTTP client")?;
            let sources = resolve_sources(&files, name.as_deref())?;
            let end = ui::send(&dirs, &api, &sources)?;
            Ok(if end.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        None => {
            let api = ApiClient::new().context("Failed to build HTTP client")?;
            ui::main_menu(&dirs, &api)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
