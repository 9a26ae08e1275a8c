use bankid::{
    BankId, COLLECT_INTERVAL, Error,
    config::Config,
    domain::models::{
        AuthenticationPayload, CancelPayload, CollectPayload, CollectResponse, SignPayload,
    },
    telemetry,
};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "bankid", about = "Drive BankID orders from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an authentication order
    Auth {
        /// IP address of the end user
        #[arg(long)]
        ip: String,
        #[arg(long)]
        personal_number: Option<String>,
        /// Keep collecting until the order is final
        #[arg(long)]
        poll: bool,
    },
    /// Start a sign order
    Sign {
        #[arg(long)]
        ip: String,
        /// Text shown to the user
        #[arg(long)]
        text: String,
        /// Data signed but not shown to the user
        #[arg(long)]
        hidden: Option<String>,
        #[arg(long)]
        personal_number: Option<String>,
        #[arg(long)]
        poll: bool,
    },
    /// Query an order once
    Collect { order_ref: String },
    /// Collect an order until it completes or fails
    Poll { order_ref: String },
    /// Cancel a pending order
    Cancel { order_ref: String },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cli = Cli::parse();
    let config = Config::load()?;
    tracing::info!(endpoint = config.bankid.endpoint(), "Loaded configuration");

    let client = BankId::new(config.bankid);

    match cli.command {
        Command::Auth {
            ip,
            personal_number,
            poll,
        } => {
            let mut payload = AuthenticationPayload::new(ip);
            if let Some(number) = personal_number {
                payload = payload.with_personal_number(number);
            }
            let response = client.authenticate(&payload).await?;
            print(&response)?;
            if poll {
                print(&poll_until_final(&client, &response.order_ref).await?)?;
            }
        }
        Command::Sign {
            ip,
            text,
            hidden,
            personal_number,
            poll,
        } => {
            let mut payload = SignPayload::new(ip, text);
            if let Some(hidden) = hidden {
                payload = payload.with_user_non_visible_data(hidden);
            }
            if let Some(number) = personal_number {
                payload = payload.with_personal_number(number);
            }
            let response = client.sign(&payload).await?;
            print(&response)?;
            if poll {
                print(&poll_until_final(&client, &response.order_ref).await?)?;
            }
        }
        Command::Collect { order_ref } => {
            print(&client.collect(&CollectPayload::new(order_ref)).await?)?;
        }
        Command::Poll { order_ref } => {
            print(&poll_until_final(&client, &order_ref).await?)?;
        }
        Command::Cancel { order_ref } => {
            print(&client.cancel(&CancelPayload::new(order_ref)).await?)?;
        }
    }

    Ok(())
}

/// Collects every [`COLLECT_INTERVAL`] until the order leaves the pending state.
async fn poll_until_final(client: &BankId, order_ref: &str) -> Result<CollectResponse, Error> {
    let payload = CollectPayload::new(order_ref);
    loop {
        match client.collect(&payload).await {
            Ok(response) if response.status.is_final() => return Ok(response),
            Ok(response) => {
                tracing::info!(hint = ?response.hint_code, "Order pending");
            }
            // The order may have moved on remotely, only a new collect can tell
            Err(Error::Timeout { .. }) => {
                tracing::warn!("Collect timed out, collecting again");
            }
            Err(e) => return Err(e),
        }
        tokio::time::sleep(COLLECT_INTERVAL).await;
    }
}

fn print(value: &impl Serialize) -> color_eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
