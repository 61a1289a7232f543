use crate::config::RunConfig;
use crate::error::{Result, ScraperError};
use crate::fetch::Fetcher;
use crate::infra::http_client::ReqwestHttp;
use crate::infra::throttle::HostThrottle;
use crate::join::join;
use crate::metrics::{evaluate, extreme_rows};
use crate::normalize::{filter_position, normalize};
use crate::rank::{ensure_rank, RankField};
use crate::resolve::{discover_export_link, parse_export, resolve};
use crate::types::{
    CandidateTable, CanonicalTable, ExtremeRow, JoinedRecord, MetricRow, Partition, Position,
    Scoring, SourceKind,
};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

/// Tagged result of one attempted partition.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionOutcome {
    Success {
        partition: Partition,
        joined: usize,
        predictors: usize,
    },
    /// Upstream data was unavailable (fetch or extraction failure, empty join).
    Skipped { partition: Partition, reason: String },
    Failed {
        partition: Partition,
        reason: String,
        /// A header could not be mapped onto the canonical schema.
        schema: bool,
    },
}

impl PartitionOutcome {
    pub fn partition(&self) -> Partition {
        match self {
            PartitionOutcome::Success { partition, .. }
            | PartitionOutcome::Skipped { partition, .. }
            | PartitionOutcome::Failed { partition, .. } => *partition,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PartitionOutcome::Success { .. })
    }
}

impl fmt::Display for PartitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionOutcome::Success {
                partition,
                joined,
                predictors,
            } => write!(
                f,
                "[OK] {}: {} rows, {} predictors",
                partition, joined, predictors
            ),
            PartitionOutcome::Skipped { partition, reason } => {
                write!(f, "[SKIP] {}: {}", partition, reason)
            }
            PartitionOutcome::Failed {
                partition, reason, ..
            } => write!(f, "[ERR] {}: {}", partition, reason),
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Default)]
pub struct RunReport {
    pub run_id: String,
    pub outcomes: Vec<PartitionOutcome>,
    pub canonical: Vec<CanonicalTable>,
    pub joined: Vec<(Partition, Vec<JoinedRecord>)>,
    pub metrics: Vec<MetricRow>,
    /// Outperformer and bust lists per partition.
    pub extremes: Vec<(Partition, Vec<ExtremeRow>)>,
    /// The run stopped early on a schema failure.
    pub aborted: bool,
}

impl RunReport {
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    fn absorb(&mut self, group: RunReport) {
        self.outcomes.extend(group.outcomes);
        self.canonical.extend(group.canonical);
        self.joined.extend(group.joined);
        self.metrics.extend(group.metrics);
        self.extremes.extend(group.extremes);
        self.aborted |= group.aborted;
    }
}

/// Drives fetch → resolve → normalize → rank → join → evaluate for every
/// partition of a [`RunConfig`].
pub struct Pipeline {
    config: Arc<RunConfig>,
    fetcher: Arc<Fetcher>,
}

impl Pipeline {
    pub fn new(config: RunConfig, fetcher: Fetcher) -> Self {
        Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
        }
    }

    /// Wire the reqwest transport and the shared per-host throttle.
    pub fn from_config(config: RunConfig) -> Result<Self> {
        let client = Arc::new(ReqwestHttp::new(config.fetch.timeout())?);
        let throttle = Arc::new(HostThrottle::new(
            Duration::from_millis(config.fetch.delay_min_ms),
            Duration::from_millis(config.fetch.delay_max_ms),
        ));
        let fetcher = Fetcher::new(client, throttle, &config.fetch);
        Ok(Self::new(config, fetcher))
    }

    /// Run every partition. Partitions sharing a (season, scoring) pair form a
    /// group that fetches the overall consensus list once; groups run on a
    /// bounded pool.
    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", run_id = %run_id);
        let mut report = RunReport {
            run_id: run_id.clone(),
            ..Default::default()
        };

        let mut groups: BTreeMap<(u16, Scoring), Vec<Position>> = BTreeMap::new();
        for p in self.config.partitions() {
            let positions = groups.entry((p.season, p.scoring)).or_default();
            if !positions.contains(&p.position) {
                positions.push(p.position);
            }
        }
        info!(parent: &span, "starting run over {} group(s)", groups.len());

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_groups.max(1)));
        let abort = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for ((season, scoring), positions) in groups {
            let runner = GroupRunner::new(
                self.config.clone(),
                self.fetcher.clone(),
                season,
                scoring,
                abort.clone(),
            );
            let permits = permits.clone();
            let group_span = tracing::info_span!(parent: &span, "group", season, scoring = %scoring);
            tasks.spawn(
                async move {
                    // The semaphore is never closed while tasks are alive.
                    let _permit = permits.acquire_owned().await.ok();
                    runner.run(&positions).await
                }
                .instrument(group_span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(group) => report.absorb(group),
                Err(e) => error!(parent: &span, "group task panicked: {}", e),
            }
        }

        report.outcomes.sort_by_key(|o| o.partition());
        report.joined.sort_by_key(|(p, _)| *p);
        report.extremes.sort_by_key(|(p, _)| *p);
        info!(
            parent: &span,
            "run finished: {} attempted, {} succeeded{}",
            report.outcomes.len(),
            report.successes(),
            if report.aborted { " (aborted on schema failure)" } else { "" }
        );
        Ok(report)
    }

    /// One canonical table, for diagnostics. Consensus is filtered and
    /// re-ranked to the partition's position like a full run does.
    pub async fn canonical_table(
        &self,
        kind: SourceKind,
        partition: Partition,
    ) -> Result<CanonicalTable> {
        let mut runner = GroupRunner::new(
            self.config.clone(),
            self.fetcher.clone(),
            partition.season,
            partition.scoring,
            Arc::new(AtomicBool::new(false)),
        );
        match kind {
            SourceKind::DraftPosition => runner.draft(partition).await,
            SourceKind::ConsensusRanking => {
                let overall = runner.consensus_overall().await?;
                Ok(CanonicalTable {
                    kind,
                    partition,
                    source_url: overall.source_url.clone(),
                    records: filter_position(&overall.records, partition.position),
                })
            }
            SourceKind::Performance => runner.performance(partition.position).await,
        }
    }
}

/// Works through the partitions of one (season, scoring) group.
struct GroupRunner {
    config: Arc<RunConfig>,
    fetcher: Arc<Fetcher>,
    season: u16,
    scoring: Scoring,
    abort: Arc<AtomicBool>,
    performance_cache: HashMap<Position, CanonicalTable>,
}

impl GroupRunner {
    fn new(
        config: Arc<RunConfig>,
        fetcher: Arc<Fetcher>,
        season: u16,
        scoring: Scoring,
        abort: Arc<AtomicBool>,
    ) -> Self {
        Self {
            config,
            fetcher,
            season,
            scoring,
            abort,
            performance_cache: HashMap::new(),
        }
    }

    async fn run(mut self, positions: &[Position]) -> RunReport {
        let mut report = RunReport::default();
        if self.abort.load(Ordering::SeqCst) {
            return report;
        }

        let consensus = self.consensus_overall().await.map_err(Failure::from);

        for &position in positions {
            if self.abort.load(Ordering::SeqCst) {
                report.aborted = true;
                break;
            }
            let partition = Partition::new(self.season, self.scoring, position);
            let outcome = match &consensus {
                Ok(overall) => self.partition(partition, overall, &mut report).await,
                Err(e) => Err(e.clone()),
            };
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(failure) => failure.into_outcome(partition),
            };

            match &outcome {
                PartitionOutcome::Success { .. } => info!("{}", outcome),
                PartitionOutcome::Skipped { .. } => warn!("{}", outcome),
                PartitionOutcome::Failed { schema, .. } => {
                    error!("{}", outcome);
                    if *schema && self.config.strict_schema {
                        self.abort.store(true, Ordering::SeqCst);
                        report.aborted = true;
                    }
                }
            }
            report.outcomes.push(outcome);
        }
        report
    }

    #[instrument(skip(self, overall, report), fields(partition = %partition))]
    async fn partition(
        &mut self,
        partition: Partition,
        overall: &CanonicalTable,
        report: &mut RunReport,
    ) -> std::result::Result<PartitionOutcome, Failure> {
        let draft = self.draft(partition).await.map_err(Failure::from)?;
        let consensus = CanonicalTable {
            kind: SourceKind::ConsensusRanking,
            partition,
            source_url: overall.source_url.clone(),
            records: filter_position(&overall.records, partition.position),
        };
        let mut performance = self
            .performance(partition.position)
            .await
            .map_err(Failure::from)?;
        performance.partition = partition;

        let joined = join(
            &draft.records,
            &consensus.records,
            &performance.records,
            partition,
        );
        let metrics = evaluate(&joined, partition, self.config.top_k_for(partition.position));
        let predictors = metrics.len();
        let rows = joined.len();

        if self.config.write_canonical {
            report.canonical.push(draft);
            report.canonical.push(consensus);
            report.canonical.push(performance);
        }

        if joined.is_empty() {
            return Ok(PartitionOutcome::Skipped {
                partition,
                reason: "no players present in all three sources".to_string(),
            });
        }
        if self.config.extremes_count > 0 {
            let extremes = extreme_rows(&joined, partition, self.config.extremes_count);
            if !extremes.is_empty() {
                report.extremes.push((partition, extremes));
            }
        }
        report.joined.push((partition, joined));
        report.metrics.extend(metrics);
        Ok(PartitionOutcome::Success {
            partition,
            joined: rows,
            predictors,
        })
    }

    /// Overall consensus list for the group, ranked 1..N.
    async fn consensus_overall(&self) -> Result<CanonicalTable> {
        let partition = Partition::new(self.season, self.scoring, Position::Overall);
        let mut table = self.load(SourceKind::ConsensusRanking, partition).await?;
        ensure_rank(&mut table.records, RankField::Consensus);
        Ok(table)
    }

    async fn draft(&self, partition: Partition) -> Result<CanonicalTable> {
        let mut table = self.load(SourceKind::DraftPosition, partition).await?;
        if partition.position != Position::Overall {
            for r in &mut table.records {
                r.position.get_or_insert(partition.position);
            }
        }
        ensure_rank(&mut table.records, RankField::Draft);
        Ok(table)
    }

    /// Performance table of one position. The overall table is the union of
    /// every position page, re-ranked by score.
    async fn performance(&mut self, position: Position) -> Result<CanonicalTable> {
        if position != Position::Overall {
            return self.performance_page(position).await;
        }
        let mut records = Vec::new();
        let mut source_url = String::new();
        for p in Position::INDIVIDUAL {
            let page = self.performance_page(p).await?;
            if source_url.is_empty() {
                source_url = page.source_url.clone();
            }
            records.extend(page.records);
        }
        if records.iter().all(|r| r.performance_score.is_some()) {
            for r in &mut records {
                r.performance_rank = None;
            }
        }
        ensure_rank(&mut records, RankField::Performance);
        records.sort_by_key(|r| r.performance_rank);
        Ok(CanonicalTable {
            kind: SourceKind::Performance,
            partition: Partition::new(self.season, self.scoring, Position::Overall),
            source_url,
            records,
        })
    }

    async fn performance_page(&mut self, position: Position) -> Result<CanonicalTable> {
        if let Some(table) = self.performance_cache.get(&position) {
            return Ok(table.clone());
        }
        let partition = Partition::new(self.season, self.scoring, position);
        let mut table = self.load(SourceKind::Performance, partition).await?;
        for r in &mut table.records {
            r.position.get_or_insert(position);
        }
        ensure_rank(&mut table.records, RankField::Performance);
        self.performance_cache.insert(position, table.clone());
        Ok(table)
    }

    async fn load(&self, kind: SourceKind, partition: Partition) -> Result<CanonicalTable> {
        let url = self.config.url_for(kind, &partition);
        let candidate = self.acquire(kind, &url).await?;
        debug!(
            "{} {}: {:?} gave {} rows x {} columns",
            kind,
            partition,
            candidate.strategy,
            candidate.row_count(),
            candidate.column_count()
        );
        let records = normalize(&candidate, kind)?;
        Ok(CanonicalTable {
            kind,
            partition,
            source_url: candidate.source_url,
            records,
        })
    }

    /// Fetch and resolve one document. A consensus page that yields no table
    /// falls back to its linked CSV export when it offers one.
    async fn acquire(&self, kind: SourceKind, url: &str) -> Result<CandidateTable> {
        let doc = self.fetcher.fetch(url).await?;
        let err = match resolve(&doc, kind, self.config.min_table_rows) {
            Ok(table) => return Ok(table),
            Err(e) => e,
        };
        if kind != SourceKind::ConsensusRanking {
            return Err(err.into());
        }
        let Some(export_url) = discover_export_link(&doc) else {
            return Err(err.into());
        };
        info!("{} table not found in page; trying export {}", kind, export_url);
        let export = self.fetcher.fetch(&export_url).await?;
        parse_export(&export.body, kind, &export.final_url).map_err(|export_err| {
            debug!("export fallback failed: {}", export_err);
            ScraperError::from(err)
        })
    }
}

/// Cloneable summary of a failed source, so one consensus failure can be
/// reported against every partition of its group.
#[derive(Debug, Clone)]
struct Failure {
    skippable: bool,
    schema: bool,
    message: String,
}

impl From<ScraperError> for Failure {
    fn from(e: ScraperError) -> Self {
        Self {
            skippable: e.is_skippable(),
            schema: matches!(e, ScraperError::Normalization(_)),
            message: e.to_string(),
        }
    }
}

impl Failure {
    fn into_outcome(self, partition: Partition) -> PartitionOutcome {
        if self.skippable {
            PartitionOutcome::Skipped {
                partition,
                reason: self.message,
            }
        } else {
            PartitionOutcome::Failed {
                partition,
                reason: self.message,
                schema: self.schema,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_lines() {
        let p = Partition::new(2023, Scoring::Ppr, Position::Wr);
        let ok = PartitionOutcome::Success {
            partition: p,
            joined: 48,
            predictors: 4,
        };
        assert_eq!(ok.to_string(), "[OK] 2023 ppr wr: 48 rows, 4 predictors");
        let skip = PartitionOutcome::Skipped {
            partition: p,
            reason: "HTTP 404".into(),
        };
        assert_eq!(skip.to_string(), "[SKIP] 2023 ppr wr: HTTP 404");
    }

    #[test]
    fn failures_map_to_outcomes() {
        let p = Partition::new(2023, Scoring::Half, Position::Te);
        let fetch: Failure = ScraperError::from(crate::error::FetchError::Http {
            url: "u".into(),
            status: 500,
        })
        .into();
        assert!(matches!(fetch.into_outcome(p), PartitionOutcome::Skipped { .. }));

        let schema: Failure = ScraperError::from(crate::error::NormalizationError::UnresolvedField {
            kind: SourceKind::Performance,
            field: "player_name",
            columns: vec![],
        })
        .into();
        assert!(matches!(
            schema.into_outcome(p),
            PartitionOutcome::Failed { schema: true, .. }
        ));
    }
}
