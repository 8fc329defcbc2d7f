use std::{error::Error, time::Duration};

use clap::{Args, Parser, Subcommand};
use engine::{Dispatcher, Engine, ResendTransport, RetryPolicy, resend::DEFAULT_BASE_URL};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "courier_admin")]
#[command(about = "Admin utilities for Courier (inspect delivery state, send email)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./courier.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Message(Message),
    Suppression(Suppression),
    /// Send one email through Resend, unless the recipient is suppressed.
    Send(SendArgs),
}

#[derive(Args, Debug)]
struct Message {
    #[command(subcommand)]
    command: MessageCommand,
}

#[derive(Subcommand, Debug)]
enum MessageCommand {
    /// Current status of a provider message.
    Show { provider_message_id: String },
    /// Every recorded event for a provider message.
    Events { provider_message_id: String },
}

#[derive(Args, Debug)]
struct Suppression {
    #[command(subcommand)]
    command: SuppressionCommand,
}

#[derive(Subcommand, Debug)]
enum SuppressionCommand {
    List,
    Check { email: String },
}

#[derive(Args, Debug)]
struct SendArgs {
    #[arg(long)]
    to: String,
    #[arg(long)]
    subject: String,
    #[arg(long)]
    html: String,
    #[arg(long, env = "RESEND_API_KEY", hide_env_values = true)]
    api_key: String,
    #[arg(long, env = "EMAIL_FROM")]
    from: String,
    #[arg(long, env = "RESEND_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// Attempts including the first one.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,
    /// Per-attempt timeout.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
    /// Wait after failed attempt `n` is `n` times this.
    #[arg(long, default_value_t = 1000)]
    backoff_base_ms: u64,
}

impl SendArgs {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            attempt_timeout: Duration::from_secs(self.timeout_secs),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
        }
    }
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter("courier_admin=info,engine=info")
        .with_writer(std::io::stderr)
        .init();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Message(Message {
            command: MessageCommand::Show {
                provider_message_id,
            },
        }) => {
            let Some(message) = engine.message(&provider_message_id).await? else {
                eprintln!("message not found: {provider_message_id}");
                std::process::exit(1);
            };
            println!(
                "{}\t{}\t{}\t{}",
                message.provider_message_id,
                message.recipient,
                message.status,
                message.last_event_at.to_rfc3339()
            );
            if let Some(error) = message.last_error {
                println!("last error: {error}");
            }
        }
        Command::Message(Message {
            command: MessageCommand::Events {
                provider_message_id,
            },
        }) => {
            let events = engine.events_for(&provider_message_id).await?;
            if events.is_empty() {
                eprintln!("no events for: {provider_message_id}");
                std::process::exit(1);
            }
            for event in events {
                println!(
                    "{}\t{}\t{}",
                    event.occurred_at.to_rfc3339(),
                    event.event_type,
                    event.error_text.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Suppression(Suppression {
            command: SuppressionCommand::List,
        }) => {
            for suppression in engine.suppressions().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    suppression.recipient,
                    suppression.reason,
                    suppression.provider_message_id,
                    suppression.created_at.to_rfc3339()
                );
            }
        }
        Command::Suppression(Suppression {
            command: SuppressionCommand::Check { email },
        }) => match engine.suppression(&email).await? {
            Some(suppression) => println!(
                "suppressed: {} ({}, {})",
                suppression.recipient, suppression.reason, suppression.provider_message_id
            ),
            None => println!("not suppressed: {email}"),
        },
        Command::Send(args) => {
            if engine.is_suppressed(&args.to).await? {
                eprintln!("recipient is suppressed: {}", args.to);
                std::process::exit(1);
            }

            let client = reqwest::Client::builder().build()?;
            let transport = ResendTransport::new(client, &args.api_key).base_url(&args.base_url);
            let dispatcher = Dispatcher::new(transport, &args.from).policy(args.retry_policy());
            let provider_message_id = dispatcher.send(&args.to, &args.subject, &args.html).await?;
            println!("sent: {provider_message_id}");
        }
    }

    Ok(())
}
