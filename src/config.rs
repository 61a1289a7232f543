use crate::constants::{
    adp_slug, ecr_prefix, DEFAULT_BASE_URL, DEFAULT_CONSENSUS_TEMPLATE, DEFAULT_DRAFT_TEMPLATE,
    DEFAULT_PERFORMANCE_TEMPLATE,
};
use crate::error::{Result, ScraperError};
use crate::types::{Partition, Position, Scoring, SourceKind};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Everything a run needs. Built once at the entry point and passed down;
/// no component reads ambient global state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub seasons: Vec<u16>,
    pub scorings: Vec<Scoring>,
    pub positions: Vec<Position>,
    pub base_url: String,
    pub templates: UrlTemplates,
    pub fetch: FetchConfig,
    /// Minimum rows for the embedded-payload and selector strategies.
    pub min_table_rows: usize,
    /// Top-K cutoffs keyed by position label (`QB`, `WR`, ...). A partial
    /// table overrides only the labels it names.
    #[serde(deserialize_with = "merge_top_k")]
    pub top_k: BTreeMap<String, usize>,
    pub default_top_k: usize,
    /// Players per outperformer and bust list; 0 disables the report.
    pub extremes_count: usize,
    pub output_dir: PathBuf,
    pub max_concurrent_groups: usize,
    /// Stop the run when a table header cannot be mapped.
    pub strict_schema: bool,
    /// Also write the per-kind canonical tables, not just joined and metrics output.
    pub write_canonical: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UrlTemplates {
    pub draft: String,
    pub consensus: String,
    pub performance: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub timeout_seconds: u64,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
}

fn default_top_k() -> BTreeMap<String, usize> {
    [
        ("QB", 12),
        ("RB", 24),
        ("WR", 36),
        ("TE", 12),
        ("K", 12),
        ("DST", 12),
        ("OVERALL", 100),
    ]
    .into_iter()
    .map(|(p, k)| (p.to_string(), k))
    .collect()
}

fn merge_top_k<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<String, usize>::deserialize(deserializer)?;
    let mut top_k = default_top_k();
    for (label, k) in overrides {
        top_k.insert(label.trim().to_ascii_uppercase(), k);
    }
    Ok(top_k)
}

impl Default for RunConfig {
    fn default() -> Self {
        let top_k = default_top_k();
        Self {
            seasons: (2015..=2024).collect(),
            scorings: vec![Scoring::Ppr, Scoring::Half],
            positions: Position::INDIVIDUAL.to_vec(),
            base_url: DEFAULT_BASE_URL.to_string(),
            templates: UrlTemplates::default(),
            fetch: FetchConfig::default(),
            min_table_rows: 15,
            top_k,
            default_top_k: 12,
            extremes_count: 20,
            output_dir: PathBuf::from("output"),
            max_concurrent_groups: 1,
            strict_schema: true,
            write_canonical: true,
        }
    }
}

impl Default for UrlTemplates {
    fn default() -> Self {
        Self {
            draft: DEFAULT_DRAFT_TEMPLATE.to_string(),
            consensus: DEFAULT_CONSENSUS_TEMPLATE.to_string(),
            performance: DEFAULT_PERFORMANCE_TEMPLATE.to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 500,
            timeout_seconds: 30,
            delay_min_ms: 700,
            delay_max_ms: 1400,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl RunConfig {
    /// Load from an explicit path, else `config.toml` if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => PathBuf::from(DEFAULT_CONFIG_PATH),
            None => return Ok(Self::default()),
        };
        let content = fs::read_to_string(&path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: RunConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.seasons.is_empty() || self.scorings.is_empty() || self.positions.is_empty() {
            return Err(ScraperError::Config(
                "seasons, scorings and positions must each list at least one value".into(),
            ));
        }
        if self.fetch.max_attempts == 0 {
            return Err(ScraperError::Config("fetch.max_attempts must be >= 1".into()));
        }
        if self.fetch.delay_min_ms > self.fetch.delay_max_ms {
            return Err(ScraperError::Config(format!(
                "fetch delay window is inverted: {} > {}",
                self.fetch.delay_min_ms, self.fetch.delay_max_ms
            )));
        }
        if self.max_concurrent_groups == 0 {
            return Err(ScraperError::Config("max_concurrent_groups must be >= 1".into()));
        }
        Ok(())
    }

    pub fn top_k_for(&self, position: Position) -> usize {
        self.top_k
            .get(position.label())
            .copied()
            .unwrap_or(self.default_top_k)
    }

    /// Every partition of the run, in (season, scoring, position) order.
    pub fn partitions(&self) -> Vec<Partition> {
        let mut out = Vec::new();
        for &season in &self.seasons {
            for &scoring in &self.scorings {
                for &position in &self.positions {
                    out.push(Partition::new(season, scoring, position));
                }
            }
        }
        out
    }

    /// Document URL for one kind of source. Consensus ignores the position:
    /// the overall cheatsheet is fetched and filtered downstream.
    pub fn url_for(&self, kind: SourceKind, partition: &Partition) -> String {
        let template = match kind {
            SourceKind::DraftPosition => &self.templates.draft,
            SourceKind::ConsensusRanking => &self.templates.consensus,
            SourceKind::Performance => &self.templates.performance,
        };
        template
            .replace("{base}", self.base_url.trim_end_matches('/'))
            .replace("{season}", &partition.season.to_string())
            .replace("{scoring_query}", partition.scoring.query_value())
            .replace("{scoring}", partition.scoring.as_slug())
            .replace("{position}", partition.position.as_slug())
            .replace("{adp_slug}", &adp_slug(partition.scoring, partition.position))
            .replace("{ecr_prefix}", ecr_prefix(partition.scoring))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_urls_follow_site_layout() {
        let config = RunConfig::default();
        let p = Partition::new(2024, Scoring::Half, Position::Wr);
        assert_eq!(
            config.url_for(SourceKind::DraftPosition, &p),
            "https://www.fantasypros.com/nfl/adp/half-point-ppr-wr.php?year=2024"
        );
        assert_eq!(
            config.url_for(SourceKind::ConsensusRanking, &p),
            "https://www.fantasypros.com/nfl/rankings/half-point-ppr-cheatsheets.php?year=2024"
        );
        assert_eq!(
            config.url_for(SourceKind::Performance, &p),
            "https://www.fantasypros.com/nfl/stats/wr.php?scoring=HALF&year=2024"
        );
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let config: RunConfig = toml::from_str(
            r#"
            seasons = [2022, 2023]
            scorings = ["ppr"]
            positions = ["wr", "dst"]
            max_concurrent_groups = 2

            [fetch]
            delay_min_ms = 0
            delay_max_ms = 0

            [top_k]
            WR = 24
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.partitions().len(), 4);
        assert_eq!(config.fetch.max_attempts, 5);
        assert_eq!(config.top_k_for(Position::Wr), 24);
        assert_eq!(config.top_k_for(Position::Overall), 100);
        assert_eq!(config.min_table_rows, 15);
    }

    #[test]
    fn partial_top_k_keeps_other_defaults() {
        let config: RunConfig = toml::from_str("[top_k]\nWR = 24\nte = 6\n").unwrap();
        assert_eq!(config.top_k_for(Position::Wr), 24);
        assert_eq!(config.top_k_for(Position::Te), 6);
        assert_eq!(config.top_k_for(Position::Rb), 24);
        assert_eq!(config.top_k_for(Position::Qb), 12);
        assert_eq!(config.top_k_for(Position::Overall), 100);
    }

    #[test]
    fn inverted_delay_window_is_rejected() {
        let mut config = RunConfig::default();
        config.fetch.delay_min_ms = 10;
        config.fetch.delay_max_ms = 5;
        assert!(config.validate().is_err());
    }
}
