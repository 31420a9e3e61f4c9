// UI layer: prompts and menus with `dialoguer`, upload progress with
// `indicatif`. Everything here is synchronous; the session does the work
// and this module only renders what it reports.

use crate::api::ApiClient;
use crate::config::AppDirs;
use crate::error::ShareError;
use crate::session::{SessionState, UploadSession};
use crate::settings::Settings;
use crate::share::ShareSource;
use anyhow::{bail, Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// How long the success message stays up before we exit.
pub const DISMISS_DELAY: Duration = Duration::from_millis(1500);

/// Values given on the command line. Anything left `None` is prompted for.
#[derive(Debug, Default, Clone)]
pub struct ConfigureInput {
    pub server_url: Option<String>,
    pub api_key: Option<String>,
    pub organization_id: Option<String>,
    pub http: bool,
}

impl ConfigureInput {
    fn is_complete(&self) -> bool {
        self.server_url.is_some() && self.api_key.is_some() && self.organization_id.is_some()
    }
}

/// Main interactive menu, shown when no subcommand is given.
pub fn main_menu(dirs: &AppDirs, api: &ApiClient) -> Result<()> {
    loop {
        let items = ["Configure", "Upload files", "Show settings", "Exit"];
        let selection = Select::new()
            .with_prompt("Papra Share")
            .items(&items)
            .default(1)
            .interact()?;
        match selection {
            0 => {
                configure(dirs, ConfigureInput::default())?;
            }
            1 => {
                let paths = prompt_paths()?;
                match crate::share::resolve_sources(&paths, None) {
                    Ok(sources) => {
                        send(dirs, api, &sources)?;
                    }
                    Err(e) => eprintln!("{}", e.to_string().red()),
                }
            }
            2 => show_settings(dirs)?,
            _ => break,
        }
    }
    Ok(())
}

/// Settings screen: fill in whatever the flags left out, normalize and
/// save. Returns the stored values.
pub fn configure(dirs: &AppDirs, input: ConfigureInput) -> Result<Settings> {
    let mut prefs = dirs.open_preferences();
    let current = Settings::load(&prefs);
    let interactive = !input.is_complete();
    if interactive && !std::io::stdin().is_terminal() {
        bail!("--server-url, --api-key and --organization-id are required when not running in a terminal");
    }

    let server_url = match input.server_url {
        Some(url) => url,
        None => Input::new()
            .with_prompt("Server URL (e.g. papra.example.com)")
            .with_initial_text(current.server_url.clone())
            .interact_text()?,
    };
    let api_key = match input.api_key {
        Some(key) => key,
        None => {
            let typed = Password::new()
                .with_prompt("API key (leave empty to keep the current one)")
                .allow_empty_password(true)
                .interact()?;
            if typed.trim().is_empty() {
                current.api_key.clone()
            } else {
                typed
            }
        }
    };
    let organization_id = match input.organization_id {
        Some(id) => id,
        None => Input::new()
            .with_prompt("Organization id")
            .with_initial_text(current.organization_id.clone())
            .interact_text()?,
    };
    let use_https = if input.http {
        false
    } else if interactive {
        Confirm::new()
            .with_prompt("Use HTTPS when the URL has no scheme?")
            .default(current.use_https)
            .interact()?
    } else {
        true
    };

    let settings = Settings {
        server_url,
        api_key,
        organization_id,
        use_https,
    };
    let stored = settings
        .save(&mut prefs)
        .with_context(|| format!("Failed to save settings to {}", prefs.path().display()))?;

    println!("{}", "Settings saved".green());
    println!("Server URL: {}", display_or_unset(&stored.server_url));
    let missing = stored.missing_fields();
    if !missing.is_empty() {
        println!(
            "{}",
            format!("Still missing: {}", missing.join(", ")).yellow()
        );
    }
    Ok(stored)
}

pub fn show_settings(dirs: &AppDirs) -> Result<()> {
    let settings = dirs.load_settings();
    println!("Server URL:      {}", display_or_unset(&settings.server_url));
    println!("API key:         {}", display_or_unset(&settings.masked_api_key()));
    println!("Organization id: {}", display_or_unset(&settings.organization_id));
    println!(
        "Protocol:        {}",
        if settings.use_https { "HTTPS" } else { "HTTP" }
    );
    Ok(())
}

/// Upload flow: run one session over `sources` with a spinner, then
/// render where it ended. Unconfigured sessions redirect to the settings
/// prompts when a terminal is attached.
pub fn send(dirs: &AppDirs, api: &ApiClient, sources: &[Box<dyn ShareSource>]) -> Result<SessionState> {
    let settings = dirs.load_settings();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut session = UploadSession::new(api, &dirs.cache_dir);
    let end = session
        .run(&settings, sources, &mut |state: &SessionState| {
            if let SessionState::Uploading { current, total } = state {
                if *total > 1 {
                    spinner.set_message(format!("Uploading file {} of {}...", current + 1, total));
                } else {
                    spinner.set_message("Uploading...");
                }
            }
        })
        .clone();
    spinner.finish_and_clear();

    match &end {
        SessionState::Success { uploaded } => {
            let msg = if *uploaded > 1 {
                format!("{} files uploaded successfully", uploaded)
            } else {
                "File uploaded successfully".to_string()
            };
            println!("{}", msg.green().bold());
            if std::io::stdout().is_terminal() {
                thread::sleep(DISMISS_DELAY);
            }
        }
        SessionState::Failed { reason } => {
            eprintln!("{}", "Upload failed".red().bold());
            eprintln!("{}", reason);
        }
        SessionState::NotConfigured { missing } => {
            eprintln!("{}", ShareError::NotConfigured(missing.clone()).to_string().yellow());
            eprintln!("Please configure the Papra settings first.");
            if std::io::stdin().is_terminal() {
                configure(dirs, ConfigureInput::default())?;
                println!("Share the file again to upload it.");
            } else {
                eprintln!("Run `papra-share configure` to set them up.");
            }
        }
        SessionState::NothingToShare => {
            eprintln!("{}", ShareError::NothingToShare.to_string().yellow());
        }
        SessionState::Idle | SessionState::Uploading { .. } => {}
    }
    Ok(end)
}

/// Ask for file paths one per line until an empty line.
fn prompt_paths() -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    loop {
        let path: String = Input::new()
            .with_prompt("File path (empty to start the upload)")
            .allow_empty(true)
            .interact_text()?;
        let path = path.trim();
        if path.is_empty() {
            break;
        }
        paths.push(PathBuf::from(path));
    }
    Ok(paths)
}

fn display_or_unset(value: &str) -> String {
    if value.is_empty() {
        "(not set)".to_string()
    } else {
        value.to_string()
    }
}
