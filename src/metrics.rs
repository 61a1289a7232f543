//! Agreement statistics between predictor ranks and final performance ranks.

use crate::types::{ExtremeKind, ExtremeRow, JoinedRecord, MetricRow, Partition};

struct Sample {
    predicted: f64,
    actual: f64,
    error: f64,
}

/// One metric row per predictor present in `joined`, in predictor order.
///
/// Each predictor only sees the records it has a rank for, so `sample_size`
/// may differ between predictors of the same partition.
pub fn evaluate(joined: &[JoinedRecord], partition: Partition, top_k: usize) -> Vec<MetricRow> {
    predictor_names(joined)
        .into_iter()
        .map(|name| {
            let samples = samples(joined, &name);
            let errors: Vec<f64> = samples.iter().map(|s| s.error).collect();
            let predicted: Vec<f64> = samples.iter().map(|s| s.predicted).collect();
            let actual: Vec<f64> = samples.iter().map(|s| s.actual).collect();
            MetricRow {
                partition,
                predictor_name: name,
                rank_correlation: spearman(&predicted, &actual),
                mean_abs_error: mean(errors.iter().map(|e| e.abs())),
                rmse: mean(errors.iter().map(|e| e * e)).map(f64::sqrt),
                mean_error: mean(errors.iter().copied()),
                top_k,
                top_k_hit_rate: top_k_hit_rate(&predicted, &actual, top_k),
                sample_size: samples.len(),
            }
        })
        .collect()
}

fn predictor_names(joined: &[JoinedRecord]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in joined {
        for p in &record.predictions {
            if !names.contains(&p.predictor) {
                names.push(p.predictor.clone());
            }
        }
    }
    names
}

fn samples(joined: &[JoinedRecord], predictor: &str) -> Vec<Sample> {
    joined
        .iter()
        .filter_map(|j| {
            let p = j.prediction(predictor)?;
            let predicted = p.rank?;
            let actual = f64::from(j.performance_rank);
            Some(Sample {
                predicted,
                actual,
                error: p.error.unwrap_or(predicted - actual),
            })
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Spearman's rho: Pearson correlation of average ranks. `None` with fewer
/// than two pairs or when either side has no variance.
pub fn spearman(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    pearson(&average_ranks(xs), &average_ranks(ys))
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx) * (x - mx);
        vy += (y - my) * (y - my);
    }
    if vx <= f64::EPSILON || vy <= f64::EPSILON {
        return None;
    }
    Some(cov / (vx * vy).sqrt())
}

/// 1-based ranks where tied values share the mean of the ranks they span.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let shared = (i + j) as f64 / 2.0 + 1.0;
        for &index in &order[i..=j] {
            ranks[index] = shared;
        }
        i = j + 1;
    }
    ranks
}

/// `|predicted top K ∩ actual top K| / K`. Ties keep input order.
pub fn top_k_hit_rate(predicted: &[f64], actual: &[f64], k: usize) -> Option<f64> {
    if k == 0 || predicted.is_empty() || predicted.len() != actual.len() {
        return None;
    }
    let top = |values: &[f64]| -> Vec<usize> {
        let mut order: Vec<usize> = (0..values.len()).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        order.truncate(k);
        order
    };
    let predicted_top = top(predicted);
    let actual_top = top(actual);
    let hits = predicted_top.iter().filter(|i| actual_top.contains(i)).count();
    Some(hits as f64 / k as f64)
}

/// The `n` biggest outperformers (finished well ahead of the predictor, most
/// positive error) and busts (most negative error) for one predictor.
pub fn extremes<'a>(
    joined: &'a [JoinedRecord],
    predictor: &str,
    n: usize,
) -> (Vec<&'a JoinedRecord>, Vec<&'a JoinedRecord>) {
    let mut scored: Vec<(f64, &JoinedRecord)> = joined
        .iter()
        .filter_map(|j| j.prediction(predictor).and_then(|p| p.error).map(|e| (e, j)))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    let outperformers = scored.iter().take(n).map(|(_, j)| *j).collect();
    let busts = scored.iter().rev().take(n).map(|(_, j)| *j).collect();
    (outperformers, busts)
}

/// Outperformer and bust lists of every predictor in `joined`, `n` players each.
pub fn extreme_rows(joined: &[JoinedRecord], partition: Partition, n: usize) -> Vec<ExtremeRow> {
    let mut rows = Vec::new();
    for name in predictor_names(joined) {
        let (outperformers, busts) = extremes(joined, &name, n);
        for (kind, list) in [
            (ExtremeKind::Outperformer, outperformers),
            (ExtremeKind::Bust, busts),
        ] {
            for (i, record) in list.into_iter().enumerate() {
                let Some(prediction) = record.prediction(&name) else {
                    continue;
                };
                rows.push(ExtremeRow {
                    partition,
                    predictor_name: name.clone(),
                    kind,
                    place: i + 1,
                    player_name: record.player_name.clone(),
                    team: record.team.clone(),
                    predicted_rank: prediction.rank,
                    performance_rank: record.performance_rank,
                    error: prediction.error.unwrap_or_default(),
                });
            }
        }
    }
    rows
}
