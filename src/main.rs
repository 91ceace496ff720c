use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use job_aggregator::listing::SearchResponse;
use job_aggregator::{dashboard, export, Query, ScraperConfig, ScraperService};

#[derive(Parser)]
#[command(name = "job-aggregator", about = "Search several job boards at once")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Role or skill to search for, e.g. "python developer"
    keyword: String,

    #[arg(short, long, default_value = Query::DEFAULT_LOCATION)]
    location: String,

    /// Maximum listings to return (capped by JOBS_MAX_RESULTS_LIMIT)
    #[arg(short, long, default_value_t = Query::DEFAULT_MAX_RESULTS)]
    max: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Run a search and print the results
    Search {
        #[command(flatten)]
        args: SearchArgs,

        /// Append the listings to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Browse results in a terminal table
    Dashboard {
        /// Keyword to search for; omit when using --from-csv
        keyword: Option<String>,

        #[arg(short, long, default_value = Query::DEFAULT_LOCATION)]
        location: String,

        #[arg(short, long, default_value_t = Query::DEFAULT_MAX_RESULTS)]
        max: usize,

        /// Browse a previously exported CSV instead of searching
        #[arg(long)]
        from_csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("job_aggregator=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ScraperConfig::from_env();

    match cli.command {
        Command::Search { args, csv, json } => {
            let service = ScraperService::from_config(config).context("building scraper service")?;
            let response = search(&service, &args.keyword, &args.location, args.max).await?;

            if let Some(path) = csv {
                let written = export::append_to_file(&path, &response.jobs)?;
                eprintln!("Appended {written} listings to {}", path.display());
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response);
            }
        }
        Command::Dashboard {
            keyword,
            location,
            max,
            from_csv,
        } => {
            let (title, jobs) = match (from_csv, keyword) {
                (Some(path), _) => {
                    let jobs = export::read_file(&path)?;
                    (path.display().to_string(), jobs)
                }
                (None, Some(keyword)) => {
                    let service = ScraperService::from_config(config).context("building scraper service")?;
                    let response = search(&service, &keyword, &location, max).await?;
                    (format!("{} in {}", response.keyword, response.location), response.jobs)
                }
                (None, None) => bail!("give a keyword or --from-csv <PATH>"),
            };
            dashboard::run_dashboard(&title, &jobs)?;
        }
    }

    Ok(())
}

async fn search(service: &ScraperService, keyword: &str, location: &str, max: usize) -> Result<SearchResponse> {
    let query = Query::new(keyword, location, max);
    if query.keyword.is_empty() {
        bail!("keyword must not be empty");
    }
    Ok(service.search(&query).await)
}

fn print_response(response: &SearchResponse) {
    let summary = &response.summary;
    println!(
        "{} jobs for \"{}\" in {} ({} synthetic, {:.2}s{})",
        summary.total_jobs,
        response.keyword,
        response.location,
        summary.synthetic_jobs,
        summary.duration_seconds,
        if summary.cached { ", cached" } else { "" }
    );
    for report in &summary.platforms {
        println!(
            "  {:<10} {:<10} real {:>2}  synthetic {:>2}{}",
            report.source.as_str(),
            report.status.as_str(),
            report.real,
            report.synthetic,
            report.error.as_deref().map(|e| format!("  ({e})")).unwrap_or_default()
        );
    }
    println!();
    for (i, job) in response.jobs.iter().enumerate() {
        let marker = if job.synthetic { "*" } else { " " };
        println!("{:>3}.{marker} {} | {} | {} | {}", i + 1, job.title, job.company, job.location, job.salary);
        println!("      {} ({})", job.apply_link, job.source);
    }
    if summary.synthetic_jobs > 0 {
        println!("\n* synthetic listing, not scraped");
    }
}
