use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    Confirm, ConfirmPrompt, ControllerConfig, DeleteOutcome, DirectoryView, FixedAnswer,
    HttpDirectoryClient, Polarity, ReconciliationController, SubmitOutcome,
};
use shared::domain::PersonId;
use tracing::info;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
struct Args {
    /// Collection url, e.g. http://localhost:3001/api/persons
    #[arg(long)]
    server_url: Option<String>,
    /// Answer yes to every confirmation prompt.
    #[arg(long)]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[arg(long, default_value = "")]
        filter: String,
    },
    Add {
        name: String,
        number: String,
    },
    Delete {
        id: i64,
    },
}

struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        print!("{} [y/N] ", prompt.message());
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => is_yes(&line),
            Err(_) => false,
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();
    let settings = load_settings();

    let server_url = args.server_url.unwrap_or(settings.server_url);
    let client = HttpDirectoryClient::with_timeout(&server_url, settings.request_timeout)?;
    let confirm: Arc<dyn Confirm> = if args.yes {
        Arc::new(FixedAnswer(true))
    } else {
        Arc::new(StdinConfirm)
    };
    let controller = ReconciliationController::with_config(
        Arc::new(client),
        confirm,
        ControllerConfig {
            notification_ttl: settings.notification_ttl,
        },
    );

    let count = controller.load().await?;
    info!(%server_url, count, "phonebook loaded");

    match args.command {
        Command::List { filter } => {
            controller.set_filter(&filter).await;
        }
        Command::Add { name, number } => match controller.submit(&name, &number).await {
            SubmitOutcome::Ignored => bail!("name must not be empty"),
            SubmitOutcome::Declined => println!("Nothing changed."),
            SubmitOutcome::Busy => println!("Another change to {name} is still in progress."),
            SubmitOutcome::Created(_)
            | SubmitOutcome::Updated(_)
            | SubmitOutcome::Evicted(_)
            | SubmitOutcome::Failed(_) => {}
        },
        Command::Delete { id } => match controller.delete(PersonId(id)).await {
            DeleteOutcome::UnknownTarget => bail!("no person with id {id}"),
            DeleteOutcome::Declined => println!("Nothing changed."),
            DeleteOutcome::Busy => println!("Another change to {id} is still in progress."),
            DeleteOutcome::Deleted(_)
            | DeleteOutcome::AlreadyGone(_)
            | DeleteOutcome::Failed(_) => {}
        },
    }

    let view = controller.snapshot().await;
    render(&view);

    if view.notification.is_some_and(|n| n.is_error()) {
        std::process::exit(1);
    }
    Ok(())
}

fn render(view: &DirectoryView) {
    if let Some(notification) = &view.notification {
        match notification.polarity {
            Polarity::Success => println!("{}", notification.message),
            Polarity::Error => eprintln!("error: {}", notification.message),
        }
    }

    println!("Numbers");
    for person in &view.visible {
        println!("  [{}] {} {}", person.id, person.name, person.number);
    }
}
