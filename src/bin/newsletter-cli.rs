use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::{json, Value};
use url::Url;

#[derive(Parser)]
#[command(name = "newsletter-cli")]
#[command(about = "Command line client for the newsletter reader API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000", env = "NEWSLETTER_URL")]
    url: String,

    /// Bearer token for the debug routes.
    #[arg(short, long, env = "NEWSLETTER_DEBUG_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List newsletters, newest first
    List {
        /// Include archived newsletters
        #[arg(long)]
        all: bool,
    },
    /// Show one newsletter
    Get { id: String },
    /// Mark a newsletter read (or unread with --unread)
    Read {
        id: String,
        #[arg(long)]
        unread: bool,
    },
    /// Archive a newsletter (or restore it with --restore)
    Archive {
        id: String,
        #[arg(long)]
        restore: bool,
    },
    /// Delete a newsletter
    Delete { id: String },
    /// Show which store keys an id resolves through
    Probe { id: String },
    /// Check server and store health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);
    }

    let request = match &cli.command {
        Commands::List { all } => client
            .get(endpoint(&cli.url, &["api", "newsletters"])?)
            .query(&[("includeArchived", all)]),
        Commands::Get { id } => client.get(endpoint(&cli.url, &["api", "newsletters", id.as_str()])?),
        Commands::Read { id, unread } => client
            .request(Method::PATCH, endpoint(&cli.url, &["api", "newsletters", id.as_str()])?)
            .json(&json!({ "isRead": !unread })),
        Commands::Archive { id, restore } => client
            .request(Method::PATCH, endpoint(&cli.url, &["api", "newsletters", id.as_str()])?)
            .json(&json!({ "isArchived": !restore })),
        Commands::Delete { id } => client.delete(endpoint(&cli.url, &["api", "newsletters", id.as_str()])?),
        Commands::Probe { id } => client.get(endpoint(&cli.url, &["debug", "probe", id.as_str()])?),
        Commands::Health => client.get(endpoint(&cli.url, &["health"])?),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

/// `base` with each of `segments` appended as one encoded path segment.
fn endpoint(base: &str, segments: &[&str]) -> Result<Url, Box<dyn std::error::Error>> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| format!("{base} cannot be used as a base URL"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: server returned status {status}");
        if !text.is_empty() {
            eprintln!("Response: {text}");
        }
        std::process::exit(1);
    }

    if text.is_empty() {
        println!("{status}");
        return Ok(());
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
