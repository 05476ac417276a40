use clap::{Parser, Subcommand};
use url::Url;

use mirror_proxy::links;
use mirror_proxy::stats::StatsSnapshot;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Companion CLI for mirror-proxy", long_about = None)]
struct Cli {
    /// Public URL of the proxy.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show hit counters
    Stats {
        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },
    /// Print a `docker pull` command that goes through the proxy
    Docker { image: String },
    /// Print a proxied GitHub link
    Github { repo: String },
    /// Print a proxied link for any site
    Web { site: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let proxy = Url::parse(&cli.url)?;

    let line = match cli.command {
        Commands::Stats { json } => return print_stats(&proxy, json).await,
        Commands::Docker { image } => links::docker_pull_command(&proxy, &image),
        Commands::Github { repo } => links::github_link(&proxy, &repo),
        Commands::Web { site } => links::web_link(&proxy, &site),
    };

    match line {
        Some(line) => println!("{line}"),
        None => eprintln!("Error: input is empty"),
    }
    Ok(())
}

async fn print_stats(proxy: &Url, raw: bool) -> Result<(), Box<dyn std::error::Error>> {
    let res = reqwest::get(proxy.join("/_stats")?).await?;
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: stats endpoint returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let snapshot: StatsSnapshot = res.json().await?;
    if raw {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if !snapshot.real {
        println!("Stats: disabled");
        return Ok(());
    }
    println!("Total requests:  {}", snapshot.total);
    println!("Docker:          {} ({}%)", snapshot.docker_raw, snapshot.docker);
    println!("GitHub:          {} ({}%)", snapshot.github_raw, snapshot.github);
    Ok(())
}
