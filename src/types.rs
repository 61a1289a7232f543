use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// League scoring format a document or partition refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scoring {
    Ppr,
    Half,
    Std,
}

impl Scoring {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Scoring::Ppr => "ppr",
            Scoring::Half => "half",
            Scoring::Std => "std",
        }
    }

    /// Value the stats pages expect in their `scoring=` query parameter.
    pub fn query_value(&self) -> &'static str {
        match self {
            Scoring::Ppr => "PPR",
            Scoring::Half => "HALF",
            Scoring::Std => "STD",
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_slug())
    }
}

impl FromStr for Scoring {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ppr" => Ok(Scoring::Ppr),
            "half" | "half-ppr" | "half-point-ppr" => Ok(Scoring::Half),
            "std" | "standard" => Ok(Scoring::Std),
            other => Err(format!("unknown scoring format '{}'", other)),
        }
    }
}

/// Position scope of a partition. `Overall` spans every position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Overall,
    Qb,
    Rb,
    Wr,
    Te,
    K,
    Dst,
}

impl Position {
    pub const INDIVIDUAL: [Position; 6] = [
        Position::Qb,
        Position::Rb,
        Position::Wr,
        Position::Te,
        Position::K,
        Position::Dst,
    ];

    pub fn as_slug(&self) -> &'static str {
        match self {
            Position::Overall => "overall",
            Position::Qb => "qb",
            Position::Rb => "rb",
            Position::Wr => "wr",
            Position::Te => "te",
            Position::K => "k",
            Position::Dst => "dst",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Position::Overall => "OVERALL",
            Position::Qb => "QB",
            Position::Rb => "RB",
            Position::Wr => "WR",
            Position::Te => "TE",
            Position::K => "K",
            Position::Dst => "DST",
        }
    }

    /// Map a raw position cell (`WR12`, `D/ST`, `DEF`, `qb`) onto a position.
    pub fn from_token(raw: &str) -> Option<Position> {
        let letters: String = raw
            .trim()
            .chars()
            .take_while(|c| !c.is_ascii_digit())
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();
        match letters.as_str() {
            "QB" => Some(Position::Qb),
            "RB" => Some(Position::Rb),
            "WR" => Some(Position::Wr),
            "TE" => Some(Position::Te),
            "K" | "PK" => Some(Position::K),
            "DST" | "DEF" => Some(Position::Dst),
            _ => None,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_slug())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("overall") || s.eq_ignore_ascii_case("all") {
            return Ok(Position::Overall);
        }
        Position::from_token(s).ok_or_else(|| format!("unknown position '{}'", s))
    }
}

/// The (season, scoring, position scope) triple that scopes fetch, join and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Partition {
    pub season: u16,
    pub scoring: Scoring,
    pub position: Position,
}

impl Partition {
    pub fn new(season: u16, scoring: Scoring, position: Position) -> Self {
        Self {
            season,
            scoring,
            position,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.season, self.scoring, self.position)
    }
}

/// Which of the three upstream datasets a table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    DraftPosition,
    ConsensusRanking,
    Performance,
}

impl SourceKind {
    pub fn as_slug(&self) -> &'static str {
        match self {
            SourceKind::DraftPosition => "adp",
            SourceKind::ConsensusRanking => "ecr",
            SourceKind::Performance => "stats",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_slug())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adp" | "draft" => Ok(SourceKind::DraftPosition),
            "ecr" | "consensus" => Ok(SourceKind::ConsensusRanking),
            "stats" | "performance" => Ok(SourceKind::Performance),
            other => Err(format!("unknown source kind '{}'", other)),
        }
    }
}

/// A fetched document. Lives only for the duration of one partition group.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// How a candidate table was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStrategy {
    EmbeddedPayload,
    TargetedSelector,
    HeuristicScan,
    Export,
}

/// Tabular data pulled out of a document, headers already flattened.
#[derive(Debug, Clone)]
pub struct CandidateTable {
    pub kind: SourceKind,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub strategy: ResolveStrategy,
    pub source_url: String,
}

impl CandidateTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Cell accessor tolerant of ragged rows.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|s| s.as_str())
    }

    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |r| r.get(column).map(|s| s.as_str()).unwrap_or(""))
    }
}

/// A normalized row after schema resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub player_key: String,
    pub player_name: String,
    pub team: Option<String>,
    pub position: Option<Position>,
    pub bye_week: Option<u32>,
    pub draft_value: Option<f64>,
    /// Per-platform ADP values keyed by platform label (`ESPN`, `YAHOO`, ...).
    pub draft_sources: Vec<(String, f64)>,
    pub draft_rank: Option<u32>,
    pub consensus_value: Option<f64>,
    pub consensus_rank: Option<u32>,
    pub tier: Option<u32>,
    pub performance_score: Option<f64>,
    pub points_per_game: Option<f64>,
    pub games: Option<f64>,
    pub performance_rank: Option<u32>,
    /// Columns no canonical field claimed, in table order.
    pub extras: Vec<(String, String)>,
}

impl CanonicalRecord {
    pub fn draft_source(&self, platform: &str) -> Option<f64> {
        self.draft_sources
            .iter()
            .find(|(p, _)| p == platform)
            .map(|(_, v)| *v)
    }
}

/// A canonical table together with its provenance.
#[derive(Debug, Clone)]
pub struct CanonicalTable {
    pub kind: SourceKind,
    pub partition: Partition,
    pub source_url: String,
    pub records: Vec<CanonicalRecord>,
}

/// One predictor's view of a joined player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub predictor: String,
    pub rank: Option<f64>,
    pub error: Option<f64>,
}

/// A player present in all three sources of a partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedRecord {
    pub partition: Partition,
    pub join_key: String,
    pub player_key: String,
    pub player_name: String,
    pub team: Option<String>,
    pub position: Option<Position>,
    pub draft_value: Option<f64>,
    pub consensus_value: Option<f64>,
    pub performance_score: Option<f64>,
    pub performance_rank: u32,
    pub predictions: Vec<Prediction>,
}

impl JoinedRecord {
    pub fn prediction(&self, predictor: &str) -> Option<&Prediction> {
        self.predictions.iter().find(|p| p.predictor == predictor)
    }
}

/// Agreement statistics of one predictor within one partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub partition: Partition,
    pub predictor_name: String,
    pub rank_correlation: Option<f64>,
    pub mean_abs_error: Option<f64>,
    pub rmse: Option<f64>,
    pub mean_error: Option<f64>,
    pub top_k: usize,
    pub top_k_hit_rate: Option<f64>,
    pub sample_size: usize,
}

/// Which end of a predictor's error distribution a player sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtremeKind {
    /// Finished well ahead of where the predictor placed them.
    Outperformer,
    Bust,
}

impl fmt::Display for ExtremeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExtremeKind::Outperformer => "outperformer",
            ExtremeKind::Bust => "bust",
        })
    }
}

/// One player of the outperformer/bust report of a predictor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtremeRow {
    pub partition: Partition,
    pub predictor_name: String,
    pub kind: ExtremeKind,
    /// 1-based position within its list.
    pub place: usize,
    pub player_name: String,
    pub team: Option<String>,
    pub predicted_rank: Option<f64>,
    pub performance_rank: u32,
    pub error: f64,
}
