//! Mapping arbitrary table headers onto the canonical per-kind schema.

pub mod aliases;

use crate::error::NormalizationError;
use crate::identity::{derive_key, team_abbreviation};
use crate::rank::{rank_values, Order};
use crate::resolve::header_mentions;
use crate::types::{CandidateTable, CanonicalRecord, Position, SourceKind};
use aliases::{field_specs, normalize_header, Field, FieldSpec};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// `Ja'Marr Chase CIN (10)`: name, team, bye week.
static NAME_TEAM_BYE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s+([A-Z]{2,3})\s*\((\d{1,2})\)$").unwrap());
/// `Josh Allen (BUF)`: name, team.
static NAME_PAREN_TEAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*\(([A-Z]{2,3})\)$").unwrap());
static TEAM_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,4}$").unwrap());

/// How a column was matched to its field, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    Exact,
    Alias,
    Fragment,
    Containment,
    Positional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMatch {
    pub field: Field,
    pub column: usize,
    pub tier: MatchTier,
}

/// Result of header resolution for one table.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    pub matches: Vec<ColumnMatch>,
}

impl ColumnMap {
    pub fn column(&self, field: Field) -> Option<usize> {
        self.get(field).map(|m| m.column)
    }

    pub fn get(&self, field: Field) -> Option<&ColumnMatch> {
        self.matches.iter().find(|m| m.field == field)
    }

    fn is_claimed(&self, column: usize) -> bool {
        self.matches.iter().any(|m| m.column == column)
    }
}

/// Resolve every field of `kind` against the table's headers.
///
/// Tiers run across all fields before the next, weaker tier is tried, and a
/// column is claimed by at most one field.
pub fn map_columns(table: &CandidateTable, kind: SourceKind) -> ColumnMap {
    let specs = field_specs(kind);
    let normalized: Vec<String> = table.columns.iter().map(|c| normalize_header(c)).collect();
    let fragments: Vec<String> = table
        .columns
        .iter()
        .map(|c| normalize_header(c.rsplit('_').next().unwrap_or(c)))
        .collect();

    let mut map = ColumnMap::default();
    for tier in [
        MatchTier::Exact,
        MatchTier::Alias,
        MatchTier::Fragment,
        MatchTier::Containment,
    ] {
        for spec in &specs {
            if map.get(spec.field).is_some() {
                continue;
            }
            let found = (0..table.columns.len()).find(|&i| {
                !map.is_claimed(i)
                    && matches_at(tier, spec, &table.columns[i], &normalized[i], &fragments[i])
            });
            if let Some(column) = found {
                map.matches.push(ColumnMatch {
                    field: spec.field,
                    column,
                    tier,
                });
            }
        }
    }

    if map.get(Field::PlayerName).is_none() {
        if let Some(column) = positional_name_column(table, &map) {
            debug!(
                "player name resolved positionally to column '{}'",
                table.columns[column]
            );
            map.matches.push(ColumnMatch {
                field: Field::PlayerName,
                column,
                tier: MatchTier::Positional,
            });
        }
    }
    map
}

fn matches_at(
    tier: MatchTier,
    spec: &FieldSpec,
    header: &str,
    normalized: &str,
    fragment: &str,
) -> bool {
    match tier {
        MatchTier::Exact => spec.exact.contains(&header.trim()),
        MatchTier::Alias => spec.aliases.iter().any(|a| a == normalized),
        MatchTier::Fragment => !fragment.is_empty() && spec.aliases.iter().any(|a| a == fragment),
        MatchTier::Containment => spec.words.iter().any(|w| header_mentions(header, w)),
        MatchTier::Positional => false,
    }
}

/// First unclaimed column whose values look like player names.
fn positional_name_column(table: &CandidateTable, map: &ColumnMap) -> Option<usize> {
    (0..table.column_count()).find(|&i| !map.is_claimed(i) && looks_like_names(table.column_values(i)))
}

/// Values mostly contain a space and are not mostly short all-caps codes.
pub(crate) fn looks_like_names<'a>(values: impl Iterator<Item = &'a str>) -> bool {
    let values: Vec<&str> = values.map(str::trim).collect();
    if values.is_empty() {
        return false;
    }
    let total = values.len() as f64;
    let spaced = values.iter().filter(|v| v.contains(' ')).count() as f64;
    let codes = values.iter().filter(|v| TEAM_CODE.is_match(v)).count() as f64;
    spaced / total > 0.6 && codes / total <= 0.6
}

/// Normalize a candidate table into canonical records.
///
/// Rows without a usable player name are dropped. Numeric cells that do not
/// parse become missing values.
pub fn normalize(
    table: &CandidateTable,
    kind: SourceKind,
) -> Result<Vec<CanonicalRecord>, NormalizationError> {
    let map = map_columns(table, kind);
    check_required(&map, table, kind)?;

    let name_col = map.column(Field::PlayerName).unwrap_or_default();
    let team_col = map.column(Field::Team);
    let position_col = map.column(Field::Position);
    let bye_col = map.column(Field::ByeWeek);

    let mut records = Vec::with_capacity(table.row_count());
    for row in 0..table.row_count() {
        let text = |col: Option<usize>| -> Option<&str> {
            col.and_then(|c| table.cell(row, c))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        let Some(raw_name) = text(Some(name_col)) else {
            continue;
        };
        let cell = split_name_cell(raw_name);
        let player_key = derive_key(&cell.name);
        if player_key.is_empty() {
            continue;
        }

        let mut record = CanonicalRecord {
            player_key,
            player_name: cell.name,
            team: text(team_col).map(team_abbreviation).or(cell.team),
            position: text(position_col).and_then(Position::from_token),
            bye_week: text(bye_col).and_then(parse_whole).or(cell.bye),
            ..Default::default()
        };

        for m in &map.matches {
            let value = text(Some(m.column));
            match m.field {
                Field::DraftRank => record.draft_rank = value.and_then(parse_rank),
                Field::DraftValue => record.draft_value = value.and_then(parse_number),
                Field::Platform(label) => {
                    if let Some(v) = value.and_then(parse_number) {
                        record.draft_sources.push((label.to_string(), v));
                    }
                }
                Field::ConsensusRank => record.consensus_rank = value.and_then(parse_rank),
                Field::ConsensusValue => record.consensus_value = value.and_then(parse_number),
                Field::Tier => record.tier = value.and_then(parse_whole),
                Field::PerformanceRank => record.performance_rank = value.and_then(parse_rank),
                Field::PerformanceScore => record.performance_score = value.and_then(parse_number),
                Field::PointsPerGame => record.points_per_game = value.and_then(parse_number),
                Field::Games => record.games = value.and_then(parse_number),
                Field::PlayerName | Field::Team | Field::Position | Field::ByeWeek => {}
            }
        }

        record.extras = (0..table.column_count())
            .filter(|&c| !map.is_claimed(c))
            .map(|c| {
                (
                    table.columns[c].clone(),
                    table.cell(row, c).unwrap_or("").trim().to_string(),
                )
            })
            .collect();

        records.push(record);
    }

    debug!(
        "normalized {} {} records from {} rows ({} columns mapped)",
        records.len(),
        kind,
        table.row_count(),
        map.matches.len()
    );
    Ok(records)
}

fn check_required(
    map: &ColumnMap,
    table: &CandidateTable,
    kind: SourceKind,
) -> Result<(), NormalizationError> {
    let unresolved = |field: Field| NormalizationError::UnresolvedField {
        kind,
        field: field.name(),
        columns: table.columns.clone(),
    };
    if map.get(Field::PlayerName).is_none() {
        return Err(unresolved(Field::PlayerName));
    }
    match kind {
        SourceKind::Performance => {
            if map.get(Field::PerformanceScore).is_none()
                && map.get(Field::PerformanceRank).is_none()
            {
                return Err(unresolved(Field::PerformanceScore));
            }
        }
        SourceKind::DraftPosition => {
            let has_platform = map
                .matches
                .iter()
                .any(|m| matches!(m.field, Field::Platform(_)));
            if map.get(Field::DraftValue).is_none() && !has_platform {
                return Err(unresolved(Field::DraftValue));
            }
        }
        SourceKind::ConsensusRanking => {}
    }
    Ok(())
}

struct NameCell {
    name: String,
    team: Option<String>,
    bye: Option<u32>,
}

/// Split `Name TEAM (bye)` and `Name (TEAM)` cells into their parts.
fn split_name_cell(raw: &str) -> NameCell {
    if let Some(caps) = NAME_TEAM_BYE.captures(raw) {
        return NameCell {
            name: caps[1].trim().to_string(),
            team: Some(caps[2].to_string()),
            bye: caps[3].parse().ok(),
        };
    }
    if let Some(caps) = NAME_PAREN_TEAM.captures(raw) {
        return NameCell {
            name: caps[1].trim().to_string(),
            team: Some(caps[2].to_string()),
            bye: None,
        };
    }
    NameCell {
        name: raw.to_string(),
        team: None,
        bye: None,
    }
}

/// Lenient numeric coercion: thousands separators, percent signs and
/// placeholder dashes are tolerated.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '-') {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_rank(raw: &str) -> Option<u32> {
    parse_number(raw)
        .filter(|v| *v >= 1.0)
        .map(|v| v.round() as u32)
}

fn parse_whole(raw: &str) -> Option<u32> {
    parse_number(raw)
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u32)
}

/// Narrow an overall consensus list to one position and re-rank the subset
/// `1..=n` by overall rank. `Overall` returns the list unchanged.
pub fn filter_position(records: &[CanonicalRecord], position: Position) -> Vec<CanonicalRecord> {
    if position == Position::Overall {
        return records.to_vec();
    }
    let mut subset: Vec<CanonicalRecord> = records
        .iter()
        .filter(|r| r.position == Some(position))
        .cloned()
        .collect();
    let overall: Vec<Option<f64>> = subset
        .iter()
        .map(|r| r.consensus_rank.map(f64::from))
        .collect();
    for (record, rank) in subset.iter_mut().zip(rank_values(&overall, Order::Ascending)) {
        record.consensus_rank = Some(rank);
    }
    subset
}
