use crate::constants::DRAFT_PLATFORMS;
use crate::error::Result;
use crate::pipeline::RunReport;
use crate::types::{CanonicalTable, ExtremeRow, JoinedRecord, MetricRow, Partition, SourceKind};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const METRICS_FILE: &str = "metrics.csv";

/// Files written for one run.
#[derive(Debug, Default)]
pub struct OutputSummary {
    pub canonical_files: Vec<PathBuf>,
    pub joined_files: Vec<PathBuf>,
    pub extremes_files: Vec<PathBuf>,
    pub metrics_file: Option<PathBuf>,
}

/// Materialize a run: canonical tables, joined tables, outperformer/bust
/// reports and the metrics table.
pub fn write_report(report: &RunReport, dir: &Path) -> Result<OutputSummary> {
    let mut summary = OutputSummary::default();
    for table in &report.canonical {
        summary.canonical_files.push(write_canonical(dir, table)?);
    }
    for (partition, joined) in &report.joined {
        summary.joined_files.push(write_joined(dir, *partition, joined)?);
    }
    for (partition, rows) in &report.extremes {
        summary.extremes_files.push(write_extremes(dir, *partition, rows)?);
    }
    summary.metrics_file = write_metrics(dir, &report.metrics)?;
    Ok(summary)
}

fn partition_stem(partition: &Partition) -> String {
    format!(
        "{}_{}_{}",
        partition.season,
        partition.scoring.as_slug(),
        partition.position.as_slug()
    )
}

/// Identity fields, kind fields, provenance, then extras in first-seen order.
pub fn write_canonical(dir: &Path, table: &CanonicalTable) -> Result<PathBuf> {
    let sub = dir.join("canonical");
    fs::create_dir_all(&sub)?;
    let path = sub.join(format!("{}_{}.csv", table.kind, partition_stem(&table.partition)));

    let platforms: Vec<&str> = DRAFT_PLATFORMS
        .iter()
        .copied()
        .filter(|p| table.records.iter().any(|r| r.draft_source(p).is_some()))
        .collect();
    let mut extras: Vec<&str> = Vec::new();
    for r in &table.records {
        for (name, _) in &r.extras {
            if !extras.contains(&name.as_str()) {
                extras.push(name);
            }
        }
    }

    let mut header: Vec<String> = ["player_key", "player_name", "team", "position", "bye_week"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    match table.kind {
        SourceKind::DraftPosition => {
            header.push("draft_rank".into());
            header.push("draft_value".into());
            header.extend(platforms.iter().map(|p| format!("adp_{}", p.to_ascii_lowercase())));
        }
        SourceKind::ConsensusRanking => {
            header.extend(["consensus_rank", "consensus_value", "tier"].map(String::from));
        }
        SourceKind::Performance => header.extend(
            ["performance_rank", "performance_score", "points_per_game", "games"].map(String::from),
        ),
    }
    header.extend(["season", "scoring", "position_scope", "source_url"].map(String::from));
    header.extend(extras.iter().map(|e| e.to_string()));

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(&header)?;
    for r in &table.records {
        let mut row = vec![
            r.player_key.clone(),
            r.player_name.clone(),
            r.team.clone().unwrap_or_default(),
            r.position.map(|p| p.label().to_string()).unwrap_or_default(),
            opt(r.bye_week),
        ];
        match table.kind {
            SourceKind::DraftPosition => {
                row.push(opt(r.draft_rank));
                row.push(opt(r.draft_value));
                row.extend(platforms.iter().map(|p| opt(r.draft_source(p))));
            }
            SourceKind::ConsensusRanking => {
                row.push(opt(r.consensus_rank));
                row.push(opt(r.consensus_value));
                row.push(opt(r.tier));
            }
            SourceKind::Performance => {
                row.push(opt(r.performance_rank));
                row.push(opt(r.performance_score));
                row.push(opt(r.points_per_game));
                row.push(opt(r.games));
            }
        }
        row.push(table.partition.season.to_string());
        row.push(table.partition.scoring.to_string());
        row.push(table.partition.position.to_string());
        row.push(table.source_url.clone());
        for name in &extras {
            let value = r
                .extras
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            row.push(value);
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(path)
}

/// One row per joined player with a rank and error column per predictor.
pub fn write_joined(dir: &Path, partition: Partition, joined: &[JoinedRecord]) -> Result<PathBuf> {
    let sub = dir.join("joined");
    fs::create_dir_all(&sub)?;
    let path = sub.join(format!("joined_{}.csv", partition_stem(&partition)));

    let predictors: Vec<String> = joined
        .first()
        .map(|j| j.predictions.iter().map(|p| p.predictor.clone()).collect())
        .unwrap_or_default();

    let mut header: Vec<String> = [
        "season",
        "scoring",
        "position_scope",
        "join_key",
        "player_key",
        "player_name",
        "team",
        "position",
        "draft_value",
        "consensus_value",
        "performance_score",
        "performance_rank",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for p in &predictors {
        header.push(format!("{}_rank", p.to_ascii_lowercase()));
        header.push(format!("{}_error", p.to_ascii_lowercase()));
    }

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(&header)?;
    for j in joined {
        let mut row = vec![
            partition.season.to_string(),
            partition.scoring.to_string(),
            partition.position.to_string(),
            j.join_key.clone(),
            j.player_key.clone(),
            j.player_name.clone(),
            j.team.clone().unwrap_or_default(),
            j.position.map(|p| p.label().to_string()).unwrap_or_default(),
            opt(j.draft_value),
            opt(j.consensus_value),
            opt(j.performance_score),
            j.performance_rank.to_string(),
        ];
        for p in &predictors {
            let prediction = j.prediction(p);
            row.push(opt(prediction.and_then(|x| x.rank)));
            row.push(opt(prediction.and_then(|x| x.error)));
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(path)
}

/// Outperformers then busts of each predictor, best placed first.
pub fn write_extremes(dir: &Path, partition: Partition, rows: &[ExtremeRow]) -> Result<PathBuf> {
    let sub = dir.join("extremes");
    fs::create_dir_all(&sub)?;
    let path = sub.join(format!("extremes_{}.csv", partition_stem(&partition)));

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "season",
        "scoring",
        "position_scope",
        "predictor",
        "list",
        "place",
        "player_name",
        "team",
        "predicted_rank",
        "performance_rank",
        "error",
    ])?;
    for r in rows {
        writer.write_record([
            partition.season.to_string(),
            partition.scoring.to_string(),
            partition.position.to_string(),
            r.predictor_name.clone(),
            r.kind.to_string(),
            r.place.to_string(),
            r.player_name.clone(),
            r.team.clone().unwrap_or_default(),
            opt(r.predicted_rank),
            r.performance_rank.to_string(),
            r.error.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(path)
}

/// Sorted by (season, scoring, position, predictor). Writes nothing and
/// returns `None` when there are no rows.
pub fn write_metrics(dir: &Path, metrics: &[MetricRow]) -> Result<Option<PathBuf>> {
    if metrics.is_empty() {
        return Ok(None);
    }
    fs::create_dir_all(dir)?;
    let path = dir.join(METRICS_FILE);

    let mut rows: Vec<&MetricRow> = metrics.iter().collect();
    rows.sort_by(|a, b| {
        (
            a.partition.season,
            a.partition.scoring.as_slug(),
            a.partition.position.as_slug(),
            &a.predictor_name,
        )
            .cmp(&(
                b.partition.season,
                b.partition.scoring.as_slug(),
                b.partition.position.as_slug(),
                &b.predictor_name,
            ))
    });

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record([
        "season",
        "scoring",
        "position_scope",
        "predictor",
        "rank_correlation",
        "mean_abs_error",
        "rmse",
        "mean_error",
        "top_k",
        "top_k_hit_rate",
        "sample_size",
    ])?;
    for m in &rows {
        writer.write_record([
            m.partition.season.to_string(),
            m.partition.scoring.to_string(),
            m.partition.position.to_string(),
            m.predictor_name.clone(),
            opt(m.rank_correlation),
            opt(m.mean_abs_error),
            opt(m.rmse),
            opt(m.mean_error),
            m.top_k.to_string(),
            opt(m.top_k_hit_rate),
            m.sample_size.to_string(),
        ])?;
    }
    writer.flush()?;
    info!("wrote {} ({} rows)", path.display(), rows.len());
    Ok(Some(path))
}

/// Missing values are written as empty cells.
fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
