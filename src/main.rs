use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use tracing::info;

mod config;
mod db;
mod display;
mod error;
mod filename;
mod images;
mod misreport;
mod models;
mod priority;
mod report;
mod sequence;
mod session;
mod store;

use config::Config;
use db::PgSubmissionStore;
use session::ReviewSession;
use store::Dashboard;

#[derive(Parser)]
#[command(name = "kant-daily-review")]
#[command(about = "Daily classroom-photo review for the Kant field program", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import submissions from a CSV export
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Rank the schools that submitted on a date, most suspicious first
    Schools {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        limit: Option<usize>,
        /// Print the ranking as JSON
        #[arg(long)]
        json: bool,
    },
    /// Review one school's submissions at a position in the ranking
    Review {
        #[arg(long)]
        date: NaiveDate,
        /// Zero-based position in the ranked school list
        #[arg(long, default_value_t = 0)]
        index: usize,
        /// Also write an HTML page with the photos inlined
        #[arg(long)]
        html: Option<PathBuf>,
        /// Keep reading navigation and suspect-list commands from stdin
        #[arg(long, short)]
        interactive: bool,
    },
    /// Write a markdown review of every school for a date
    Report {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Manage the suspect list
    Suspect {
        #[command(subcommand)]
        action: SuspectAction,
    },
}

#[derive(Subcommand)]
enum SuspectAction {
    /// Flag the submission a school made at an exact time
    Add {
        #[arg(long)]
        school: models::SchoolId,
        /// Submission time, `YYYY-MM-DD HH:MM:SS`
        #[arg(long, value_parser = parse_timestamp)]
        timestamp: NaiveDateTime,
    },
    /// Remove a flagged submission
    Remove {
        #[arg(long)]
        school: models::SchoolId,
        #[arg(long, value_parser = parse_timestamp)]
        timestamp: NaiveDateTime,
    },
    /// Show every flagged submission
    List,
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
        .map_err(|err| format!("expected YYYY-MM-DD HH:MM:SS: {err}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Starting kant-daily-review v{}", env!("CARGO_PKG_VERSION"));

    let pool = cli.config.connect().await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} submissions from {}.", csv.display());
        }
        Commands::Schools { date, limit, json } => {
            let mut dashboard = Dashboard::new(
                PgSubmissionStore::new(pool.clone()),
                cli.config.image_store(),
                cli.config.fetch_timeout(),
                cli.config.fetch_concurrency(),
            );
            let mut ranked = dashboard.rank_schools(date).await;
            if let Some(limit) = limit {
                ranked.truncate(limit);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&ranked)?);
            } else if ranked.is_empty() {
                println!("No school data found for {date}.");
            } else {
                println!("Schools for {date}, most suspicious first:");
                for school in &ranked {
                    println!(
                        "- {} ({}) priority {} across {} records",
                        school.school_name,
                        school.school_id,
                        school.priority.map_or_else(|| "-".to_string(), |p| p.to_string()),
                        school.record_count
                    );
                }
            }
        }
        Commands::Review {
            date,
            index,
            html,
            interactive,
        } => {
            let dashboard = Dashboard::new(
                PgSubmissionStore::new(pool.clone()),
                cli.config.image_store(),
                cli.config.fetch_timeout(),
                cli.config.fetch_concurrency(),
            );
            let mut session = ReviewSession::new(pool.clone(), dashboard, html);
            session.open(date, index).await;
            if interactive {
                session.run().await?;
            } else {
                session.show().await?;
            }
        }
        Commands::Report { date, out } => {
            let mut dashboard = Dashboard::new(
                PgSubmissionStore::new(pool.clone()),
                cli.config.image_store(),
                cli.config.fetch_timeout(),
                cli.config.fetch_concurrency(),
            );
            let ranked = dashboard.rank_schools(date).await;
            let mut sections = Vec::with_capacity(ranked.len());
            for school in ranked {
                let records = dashboard.records(school.school_id, date).await;
                sections.push((school, records));
            }
            let borrowed: Vec<_> = sections
                .iter()
                .map(|(school, records)| (school.clone(), records.as_slice()))
                .collect();

            let report = report::build_report(date, &borrowed, dashboard.images());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Suspect { action } => match action {
            SuspectAction::Add { school, timestamp } => {
                let records = db::fetch_records(&pool, school, timestamp.date()).await?;
                let record = records
                    .iter()
                    .find(|record| record.timestamp == timestamp)
                    .with_context(|| format!("no submission for school {school} at {timestamp}"))?;
                let check = misreport::check(record);
                db::append_suspect(&pool, record, &check.issues_text()).await?;
                println!("Record added to suspect list ({}).", check.summary());
            }
            SuspectAction::Remove { school, timestamp } => {
                let removed = db::remove_suspect(&pool, school, timestamp).await?;
                if removed == 0 {
                    println!("No suspect entry for school {school} at {timestamp}.");
                } else {
                    println!("Record removed from suspect list.");
                }
            }
            SuspectAction::List => {
                let entries = db::list_suspects(&pool).await?;
                if entries.is_empty() {
                    println!("Suspect list is empty.");
                }
                for entry in entries {
                    println!(
                        "- {} {} class {}{} by {} [{}] {}",
                        entry.school_id,
                        entry.timestamp,
                        entry.class,
                        entry.section,
                        entry.uploaded_by,
                        entry.class_pic,
                        if entry.issues.is_empty() { "-" } else { entry.issues.as_str() }
                    );
                }
            }
        },
    }

    Ok(())
}
