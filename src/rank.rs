use crate::types::CanonicalRecord;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Lower values rank first (ADP, expert rank).
    Ascending,
    /// Higher values rank first (fantasy points).
    Descending,
}

/// The rank/value pair of a canonical record that a ranking pass works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankField {
    Draft,
    Consensus,
    Performance,
}

impl RankField {
    pub fn order(&self) -> Order {
        match self {
            RankField::Draft | RankField::Consensus => Order::Ascending,
            RankField::Performance => Order::Descending,
        }
    }

    fn rank(&self, r: &CanonicalRecord) -> Option<u32> {
        match self {
            RankField::Draft => r.draft_rank,
            RankField::Consensus => r.consensus_rank,
            RankField::Performance => r.performance_rank,
        }
    }

    fn value(&self, r: &CanonicalRecord) -> Option<f64> {
        match self {
            RankField::Draft => r.draft_value,
            RankField::Consensus => r.consensus_value,
            RankField::Performance => r.performance_score,
        }
    }

    fn set_rank(&self, r: &mut CanonicalRecord, rank: u32) {
        match self {
            RankField::Draft => r.draft_rank = Some(rank),
            RankField::Consensus => r.consensus_rank = Some(rank),
            RankField::Performance => r.performance_rank = Some(rank),
        }
    }
}

/// Guarantee every record carries a unique rank in `1..=N` for `field`.
///
/// A complete and duplicate-free rank column is kept as is. A complete column
/// with duplicates (the union of separately ranked pages) is re-ranked.
/// Otherwise ranks come from the value column, ties keeping input order,
/// and with no values at all the input order itself is the ranking.
pub fn ensure_rank(records: &mut [CanonicalRecord], field: RankField) {
    if records.is_empty() {
        return;
    }
    let ranks: Vec<Option<u32>> = records.iter().map(|r| field.rank(r)).collect();
    if ranks.iter().all(Option::is_some) {
        let distinct: HashSet<u32> = ranks.iter().flatten().copied().collect();
        if distinct.len() == records.len() {
            return;
        }
        debug!(
            "{:?} ranks hold {} duplicates across {} records; re-ranking",
            field,
            records.len() - distinct.len(),
            records.len()
        );
        rerank(records, field);
        return;
    }

    let values: Vec<Option<f64>> = records.iter().map(|r| field.value(r)).collect();
    let assigned = if values.iter().any(Option::is_some) {
        rank_values(&values, field.order())
    } else {
        (1..=records.len() as u32).collect()
    };
    for (record, rank) in records.iter_mut().zip(assigned) {
        field.set_rank(record, rank);
    }
}

/// Full re-rank: order by (existing rank, value, player_key), then assign `1..=N`.
/// Missing ranks and values sort last.
pub fn rerank(records: &mut [CanonicalRecord], field: RankField) {
    let order = field.order();
    let mut indexed: Vec<(usize, Option<u32>, Option<f64>, String)> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (i, field.rank(r), field.value(r), r.player_key.clone()))
        .collect();
    indexed.sort_by(|a, b| {
        missing_last(a.1, b.1, |x, y| x.cmp(y))
            .then_with(|| missing_last(a.2, b.2, |x, y| compare_values(*x, *y, order)))
            .then_with(|| a.3.cmp(&b.3))
    });
    let mut new_ranks = vec![0u32; records.len()];
    for (position, (index, ..)) in indexed.iter().enumerate() {
        new_ranks[*index] = position as u32 + 1;
    }
    for (record, rank) in records.iter_mut().zip(new_ranks) {
        field.set_rank(record, rank);
    }
}

/// Tie-safe ranking of a value column: ties keep input order, missing values
/// come after every present value.
pub fn rank_values(values: &[Option<f64>], order: Order) -> Vec<u32> {
    let mut indexed: Vec<(usize, Option<f64>)> = values.iter().copied().enumerate().collect();
    // sort_by is stable, so equal values stay in input order
    indexed.sort_by(|a, b| missing_last(a.1, b.1, |x, y| compare_values(*x, *y, order)));
    let mut ranks = vec![0u32; values.len()];
    for (position, (index, _)) in indexed.iter().enumerate() {
        ranks[*index] = position as u32 + 1;
    }
    ranks
}

fn compare_values(a: f64, b: f64, order: Order) -> Ordering {
    let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    match order {
        Order::Ascending => ord,
        Order::Descending => ord.reverse(),
    }
}

fn missing_last<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::derive_key;

    fn scored(name: &str, score: Option<f64>) -> CanonicalRecord {
        CanonicalRecord {
            player_key: derive_key(name),
            player_name: name.to_string(),
            performance_score: score,
            ..Default::default()
        }
    }

    fn ranks(records: &[CanonicalRecord]) -> Vec<u32> {
        records.iter().map(|r| r.performance_rank.unwrap()).collect()
    }

    #[test]
    fn first_seen_tie_break_scenario() {
        let mut records = vec![
            scored("A. Back (KC)", Some(300.0)),
            scored("B. Wide", Some(250.0)),
            scored("C. Slot", Some(250.0)),
        ];
        ensure_rank(&mut records, RankField::Performance);
        assert_eq!(ranks(&records), vec![1, 2, 3]);
        let keys: Vec<&str> = records.iter().map(|r| r.player_key.as_str()).collect();
        assert_eq!(keys, vec!["a back", "b wide", "c slot"]);
    }

    #[test]
    fn scores_produce_a_monotone_permutation() {
        let scores = [12.5, 80.0, 80.0, 3.0, 150.2, 44.0, 44.0, 44.0, 0.0];
        let mut records: Vec<CanonicalRecord> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| scored(&format!("Player {}", i), Some(*s)))
            .collect();
        ensure_rank(&mut records, RankField::Performance);

        let mut got = ranks(&records);
        got.sort_unstable();
        assert_eq!(got, (1..=scores.len() as u32).collect::<Vec<_>>());

        for a in &records {
            for b in &records {
                if a.performance_score > b.performance_score {
                    assert!(a.performance_rank < b.performance_rank);
                }
            }
        }
    }

    #[test]
    fn duplicate_rank_ones_are_reranked() {
        let mut records: Vec<CanonicalRecord> = [("Dee", 90.0), ("Cee", 120.0), ("Bee", 90.0), ("Ay", 60.0)]
            .iter()
            .map(|(n, s)| CanonicalRecord {
                performance_rank: Some(1),
                ..scored(n, Some(*s))
            })
            .collect();
        ensure_rank(&mut records, RankField::Performance);
        // rank ties -> score desc -> key asc
        assert_eq!(ranks(&records), vec![3, 1, 2, 4]);
    }

    #[test]
    fn complete_unique_ranks_are_kept() {
        let mut records = vec![
            CanonicalRecord {
                consensus_rank: Some(2),
                ..scored("X", None)
            },
            CanonicalRecord {
                consensus_rank: Some(1),
                ..scored("Y", None)
            },
        ];
        ensure_rank(&mut records, RankField::Consensus);
        assert_eq!(records[0].consensus_rank, Some(2));
        assert_eq!(records[1].consensus_rank, Some(1));
    }

    #[test]
    fn falls_back_to_input_order() {
        let mut records = vec![scored("X", None), scored("Y", None), scored("Z", None)];
        ensure_rank(&mut records, RankField::Draft);
        let got: Vec<Option<u32>> = records.iter().map(|r| r.draft_rank).collect();
        assert_eq!(got, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn rank_values_puts_missing_last() {
        let got = rank_values(&[Some(3.5), None, Some(1.2), Some(3.5)], Order::Ascending);
        assert_eq!(got, vec![2, 4, 1, 3]);
    }
}
