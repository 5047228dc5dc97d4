use clap::{Parser, Subcommand};
use reqwest::Url;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "allowlist-cli")]
#[command(about = "Management CLI for the allowlist manager", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:5000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the server is up
    Health,
    /// List allowlist entries
    List,
    /// Add an entry
    Add { entry: String },
    /// Remove an entry
    Remove { entry: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::List => client.get(format!("{}/api/allowlist", base)).send().await?,
        Commands::Add { entry } => {
            client
                .post(format!("{}/api/allowlist", base))
                .json(&serde_json::json!({ "entry": entry }))
                .send()
                .await?
        }
        Commands::Remove { entry } => {
            client.delete(entry_url(base, &entry)?).send().await?
        }
    };

    print_response(res).await
}

/// URL of a single entry, with the entry encoded as one path segment.
fn entry_url(base: &str, entry: &str) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| format!("{} cannot be a base URL", base))?
        .pop_if_empty()
        .extend(["api", "allowlist", entry]);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let json: Value = res.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
    }
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
