use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Management CLI for the webhook gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin API key (Bearer token). Falls back to ADMIN_API_KEY.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gate status and limiter occupancy
    Status,
    /// Reset the rate limit state of one identifier (e.g. "/webhooks/forms:203.0.113.5")
    Reset { identifier: String },
    /// Clear every rate limit
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let key = cli
        .key
        .or_else(|| std::env::var("ADMIN_API_KEY").ok())
        .ok_or("missing admin key: pass --key or set ADMIN_API_KEY")?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", key))?,
    );

    let base = Url::parse(&cli.url)?;
    let (method, url) = match &cli.command {
        Commands::Status => (Method::GET, endpoint(&base, &["admin", "status"])?),
        Commands::Reset { identifier } => (
            Method::DELETE,
            endpoint(&base, &["admin", "rate-limits", identifier.as_str()])?,
        ),
        Commands::Clear => (Method::DELETE, endpoint(&base, &["admin", "rate-limits"])?),
    };

    let res = client.request(method, url).headers(headers).send().await?;
    print_response(res).await
}

/// Append path segments, percent-encoding each one.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| "admin URL cannot be a base")?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
