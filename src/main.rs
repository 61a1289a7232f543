use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use rank_scraper::config::RunConfig;
use rank_scraper::logging;
use rank_scraper::output::write_report;
use rank_scraper::pipeline::Pipeline;
use rank_scraper::types::{Partition, Position, Scoring, SourceKind};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rank_scraper")]
#[command(about = "Draft vs. consensus vs. final-performance ranking scraper")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest every partition, join the sources and compute metrics
    Run {
        /// Seasons as a range (2019-2024) or list (2021,2023)
        #[arg(long)]
        seasons: Option<String>,
        /// Scoring formats (comma-separated): ppr, half, std
        #[arg(long)]
        scorings: Option<String>,
        /// Positions (comma-separated): overall, qb, rb, wr, te, k, dst
        #[arg(long)]
        positions: Option<String>,
        /// Output directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Resolve one source table and print a summary
    Fetch {
        /// adp, ecr or stats
        kind: String,
        season: u16,
        scoring: String,
        position: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = RunConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Run {
            seasons,
            scorings,
            positions,
            out,
        } => {
            if let Some(s) = seasons {
                config.seasons = parse_seasons(&s)?;
            }
            if let Some(s) = scorings {
                config.scorings = parse_list::<Scoring>(&s)?;
            }
            if let Some(p) = positions {
                config.positions = parse_list::<Position>(&p)?;
            }
            if let Some(dir) = out {
                config.output_dir = dir;
            }
            config.validate()?;

            let _guard = logging::init_logging(&config.output_dir.join("logs"));
            let output_dir = config.output_dir.clone();
            let pipeline = Pipeline::from_config(config)?;
            let report = pipeline.run().await?;

            for outcome in &report.outcomes {
                println!("{}", outcome);
            }

            let summary = write_report(&report, &output_dir)
                .with_context(|| format!("writing output to {}", output_dir.display()))?;
            info!(
                "wrote {} canonical, {} joined and {} extremes tables",
                summary.canonical_files.len(),
                summary.joined_files.len(),
                summary.extremes_files.len()
            );
            match &summary.metrics_file {
                Some(path) => println!("wrote {} ({} rows)", path.display(), report.metrics.len()),
                None => {
                    warn!("no partition produced metrics");
                    println!("No metrics produced.");
                }
            }

            if report.aborted {
                bail!("run stopped early: a source table could not be mapped to the canonical schema");
            }
        }
        Commands::Fetch {
            kind,
            season,
            scoring,
            position,
        } => {
            let _guard = logging::init_logging(&config.output_dir.join("logs"));
            let kind: SourceKind = kind.parse().map_err(|e: String| anyhow!(e))?;
            let scoring: Scoring = scoring.parse().map_err(|e: String| anyhow!(e))?;
            let position: Position = position.parse().map_err(|e: String| anyhow!(e))?;
            let partition = Partition::new(season, scoring, position);

            let pipeline = Pipeline::from_config(config)?;
            let table = pipeline.canonical_table(kind, partition).await?;

            println!("{} {} from {}", kind, partition, table.source_url);
            println!("{} records", table.records.len());
            for r in table.records.iter().take(10) {
                println!(
                    "  {:<28} {:<4} {:<4} draft={:?} consensus={:?} points={:?} rank={:?}",
                    r.player_name,
                    r.team.as_deref().unwrap_or("-"),
                    r.position.map(|p| p.label()).unwrap_or("-"),
                    r.draft_value.or(r.draft_rank.map(f64::from)),
                    r.consensus_rank,
                    r.performance_score,
                    r.performance_rank,
                );
            }
        }
    }

    Ok(())
}

/// `2019-2024` or `2019,2021,2023`.
fn parse_seasons(raw: &str) -> anyhow::Result<Vec<u16>> {
    if let Some((start, end)) = raw.split_once('-') {
        let start: u16 = start.trim().parse().context("season range start")?;
        let end: u16 = end.trim().parse().context("season range end")?;
        if start > end {
            bail!("season range {} is inverted", raw);
        }
        return Ok((start..=end).collect());
    }
    raw.split(',')
        .map(|s| s.trim().parse::<u16>().with_context(|| format!("invalid season '{}'", s)))
        .collect()
}

fn parse_list<T>(raw: &str) -> anyhow::Result<Vec<T>>
where
    T: std::str::FromStr<Err = String>,
{
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<T>().map_err(|e| anyhow!(e)))
        .collect()
}
