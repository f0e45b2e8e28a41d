use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{RealtimeDatabaseStore, SectionComposer, SectionError, SectionsClient};
use shared::domain::{PipeType, SectionId, UserId, Weekday};
use storage::{MemoryStore, SectionStore, Storage};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod console;

use config::{load_settings, prepare_database_url, validate, Settings, StoreKind};
use console::{print_pipes, print_sections, run_shell, ConsoleInteraction};

#[derive(Parser, Debug)]
#[command(name = "sections", about = "Irrigation sections and their watering timers")]
struct Cli {
    #[arg(long, default_value = "sections.toml")]
    config: PathBuf,
    #[arg(long)]
    user_id: Option<String>,
    #[arg(long, value_enum)]
    store: Option<StoreKind>,
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every section of the user.
    List,
    /// Print the available pipe types.
    Pipes,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        duration: String,
        #[arg(long)]
        pipe: String,
        #[arg(long = "day")]
        days: Vec<String>,
    },
    Edit {
        id: String,
    },
    Delete {
        id: String,
    },
    Reset {
        id: String,
    },
    /// Run the timers of the given sections, then pause them.
    Run {
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
    Shell,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut settings = load_settings(&cli.config)?;
    if let Some(user_id) = cli.user_id {
        settings.user_id = user_id;
    }
    if let Some(store) = cli.store {
        settings.store = store;
    }
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }
    validate(&settings)?;

    let filter = EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let store = open_store(&settings).await?;
    let console = Arc::new(ConsoleInteraction::default());
    let client = SectionsClient::new(UserId::new(settings.user_id.trim()), store, console.clone());
    info!(store = %settings.store, user_id = %client.user_id(), "sections client ready");

    let outcome = match client.load().await {
        Ok(_) => run_command(&client, &console, cli.command).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            client.report(&err).await;
            if err.code().is_user_visible() {
                Ok(ExitCode::FAILURE)
            } else {
                println!("{err}");
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn SectionStore>> {
    let store: Arc<dyn SectionStore> = match settings.store {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Sqlite => {
            let database_url = prepare_database_url(&settings.database_url);
            let storage = Storage::new(&database_url).await.map_err(|error| {
                error!(
                    %database_url,
                    %error,
                    "failed to open SQLite database; verify parent directory exists and permissions are correct"
                );
                error
            })?;
            Arc::new(storage)
        }
        StoreKind::Realtime => {
            let url = settings
                .realtime_url
                .as_deref()
                .context("realtime_url is not set")?;
            Arc::new(RealtimeDatabaseStore::new(url, settings.realtime_auth.clone())?)
        }
    };
    Ok(store)
}

async fn run_command(
    client: &SectionsClient,
    console: &ConsoleInteraction,
    command: Command,
) -> Result<(), SectionError> {
    match command {
        Command::List => print_sections(&client.sections()),
        Command::Pipes => print_pipes(),
        Command::Add {
            name,
            start,
            duration,
            pipe,
            days,
        } => {
            let mut composer = SectionComposer::new();
            composer.draft.name = name;
            composer.draft.start_time = start;
            composer.draft.duration = duration;
            composer.draft.pipe = Some(
                pipe.parse::<PipeType>()
                    .map_err(|err| SectionError::Validation(err.to_string()))?,
            );
            for day in days {
                let day = day
                    .parse::<Weekday>()
                    .map_err(|err| SectionError::Validation(err.to_string()))?;
                composer.toggle_day(day);
            }
            let section = client.add(&mut composer).await?;
            println!("added {} ({})", section.name, section.id);
        }
        Command::Edit { id } => {
            let section = client.edit(&SectionId::new(id)).await?;
            print_sections(&[section]);
        }
        Command::Delete { id } => {
            if client.delete(&SectionId::new(id.clone())).await? {
                println!("deleted {id}");
            }
        }
        Command::Reset { id } => {
            client.reset(&SectionId::new(id)).await?;
            print_sections(&client.sections());
        }
        Command::Run { ids, seconds } => {
            let ids: Vec<SectionId> = ids.into_iter().map(SectionId::new).collect();
            for id in &ids {
                client.start(id).await?;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
                _ = tokio::signal::ctrl_c() => info!("interrupted; pausing timers"),
            }
            for id in &ids {
                client.pause(id).await?;
            }
            print_sections(&client.sections());
        }
        Command::Shell => run_shell(client, console).await,
    }
    Ok(())
}
