use crate::constants::{draft_predictor_name, CONSENSUS_PREDICTOR, DRAFT_AVERAGE_PREDICTOR, DRAFT_PLATFORMS};
use crate::identity::team_abbreviation;
use crate::rank::{rank_values, Order};
use crate::types::{CanonicalRecord, JoinedRecord, Partition, Position, Prediction};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Join key of a record within a partition.
///
/// DST units join on the franchise abbreviation, the overall partition on
/// `player_key|POS` (plain `player_key` when the position is unknown), and
/// every other position on `player_key`.
pub fn join_key(record: &CanonicalRecord, partition: &Partition) -> String {
    match partition.position {
        Position::Dst => team_abbreviation(record.team.as_deref().unwrap_or(&record.player_name)),
        Position::Overall => match record.position {
            Some(pos) => format!("{}|{}", record.player_key, pos.label()),
            None => record.player_key.clone(),
        },
        _ => record.player_key.clone(),
    }
}

/// Predictor ranks over one source table, keyed by join key.
struct PredictorColumn {
    name: String,
    ranks: HashMap<String, f64>,
}

/// Strict inner join of the three canonical sources of one partition.
///
/// Only keys present in all three survive. Within a source the first row of a
/// duplicated key wins. Output is ordered by performance rank and every record
/// carries one prediction per predictor the partition supports.
pub fn join(
    draft: &[CanonicalRecord],
    consensus: &[CanonicalRecord],
    performance: &[CanonicalRecord],
    partition: Partition,
) -> Vec<JoinedRecord> {
    if draft.is_empty() || consensus.is_empty() || performance.is_empty() {
        info!(
            "{}: a source is empty (draft={}, consensus={}, performance={}); nothing to join",
            partition,
            draft.len(),
            consensus.len(),
            performance.len()
        );
        return Vec::new();
    }

    let draft = dedupe(draft, &partition);
    let consensus = dedupe(consensus, &partition);
    let mut performance = dedupe(performance, &partition);
    performance.sort_by_key(|(_, r)| r.performance_rank.unwrap_or(u32::MAX));

    let draft_index: HashMap<&str, &CanonicalRecord> =
        draft.iter().map(|(k, r)| (k.as_str(), *r)).collect();
    let consensus_index: HashMap<&str, &CanonicalRecord> =
        consensus.iter().map(|(k, r)| (k.as_str(), *r)).collect();

    let mut predictors = vec![PredictorColumn {
        name: CONSENSUS_PREDICTOR.to_string(),
        ranks: consensus
            .iter()
            .filter_map(|(k, r)| r.consensus_rank.map(|v| (k.clone(), f64::from(v))))
            .collect(),
    }];
    predictors.extend(draft_predictors(&draft));

    let mut joined = Vec::new();
    for (key, perf) in &performance {
        let Some(actual) = perf.performance_rank else {
            continue;
        };
        let (Some(d), Some(c)) = (draft_index.get(key.as_str()), consensus_index.get(key.as_str()))
        else {
            continue;
        };
        let predictions = predictors
            .iter()
            .map(|p| {
                let rank = p.ranks.get(key).copied();
                Prediction {
                    predictor: p.name.clone(),
                    rank,
                    error: rank.map(|r| r - f64::from(actual)),
                }
            })
            .collect();
        joined.push(JoinedRecord {
            partition,
            join_key: key.clone(),
            player_key: perf.player_key.clone(),
            player_name: perf.player_name.clone(),
            team: perf.team.clone().or_else(|| c.team.clone()).or_else(|| d.team.clone()),
            position: perf.position.or(c.position).or(d.position),
            draft_value: d.draft_value,
            consensus_value: c.consensus_value,
            performance_score: perf.performance_score,
            performance_rank: actual,
            predictions,
        });
    }

    debug!(
        "{}: joined {} of draft={}, consensus={}, performance={}",
        partition,
        joined.len(),
        draft.len(),
        consensus.len(),
        performance.len()
    );
    joined
}

fn dedupe<'a>(records: &'a [CanonicalRecord], partition: &Partition) -> Vec<(String, &'a CanonicalRecord)> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|r| (join_key(r, partition), r))
        .filter(|(k, _)| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

/// `ADP_AVG` from the average ADP (or the page's own rank when no average is
/// published) plus one `ADP_<PLATFORM>` per platform column that has values.
fn draft_predictors(draft: &[(String, &CanonicalRecord)]) -> Vec<PredictorColumn> {
    let mut out = Vec::new();

    let averages: Vec<Option<f64>> = draft.iter().map(|(_, r)| r.draft_value).collect();
    let average_source = if averages.iter().any(Option::is_some) {
        averages
    } else {
        draft
            .iter()
            .map(|(_, r)| r.draft_rank.map(f64::from))
            .collect()
    };
    if let Some(column) = ranked_column(DRAFT_AVERAGE_PREDICTOR.to_string(), draft, &average_source) {
        out.push(column);
    }

    for platform in DRAFT_PLATFORMS {
        let values: Vec<Option<f64>> = draft.iter().map(|(_, r)| r.draft_source(platform)).collect();
        if let Some(column) = ranked_column(draft_predictor_name(platform), draft, &values) {
            out.push(column);
        }
    }
    out
}

fn ranked_column(
    name: String,
    draft: &[(String, &CanonicalRecord)],
    values: &[Option<f64>],
) -> Option<PredictorColumn> {
    if values.iter().all(Option::is_none) {
        return None;
    }
    let ranks = rank_values(values, Order::Ascending);
    Some(PredictorColumn {
        name,
        ranks: draft
            .iter()
            .zip(values.iter().zip(ranks))
            .filter(|(_, (v, _))| v.is_some())
            .map(|((k, _), (_, rank))| (k.clone(), f64::from(rank)))
            .collect(),
    })
}
