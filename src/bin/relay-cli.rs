use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management CLI for the configuration relay", long_about = None)]
struct Cli {
    #[arg(short, long, env = "RELAY_ADMIN_URL", default_value = "http://127.0.0.1:8888")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show refresh status, failures and active profiles
    Status,
    /// Print the active configuration snapshot
    Show,
    /// Print a single value by dotted key
    Get { key: String },
    /// Run a refresh cycle now
    Refresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/status", base)).send().await?,
        Commands::Show => client.get(format!("{}/config", base)).send().await?,
        Commands::Get { key } => client.get(format!("{}/config/{}", base, key)).send().await?,
        Commands::Refresh => client.post(format!("{}/refresh", base)).send().await?,
    };

    if !print_response(res).await? {
        std::process::exit(1);
    }
    Ok(())
}

/// Pretty-print the body; returns false for non-success statuses.
async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{}", rendered);
        Ok(true)
    } else {
        eprintln!("Error: admin API returned status {}", status);
        eprintln!("{}", rendered);
        Ok(false)
    }
}
