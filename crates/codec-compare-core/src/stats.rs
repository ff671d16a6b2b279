//! メトリクス統計
//!
//! 対応付けた行の組ごとに `左の値 / 右の値` の比率を取り、メトリクスごとに集計する。

use serde::Serialize;

use crate::batch::Batch;
use crate::geometric_mean::GeometricMean;
use crate::matcher::Match;
use crate::metric::FieldMetric;

/// 1メトリクス分の集計結果。対応が1つも無ければ全て 1。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldMetricStats {
    /// 比率の幾何平均
    pub geometric_mean: f64,
    /// 比率の最小値
    pub min_ratio: f64,
    /// 比率の最大値
    pub max_ratio: f64,
    /// 左の合計と右の合計の比率（比率の平均ではない）
    pub arithmetic_mean: f64,
}

impl Default for FieldMetricStats {
    fn default() -> Self {
        Self {
            geometric_mean: 1.0,
            min_ratio: 1.0,
            max_ratio: 1.0,
            arithmetic_mean: 1.0,
        }
    }
}

/// ゼロ除算を定義した比率
///
/// `b == 0` のとき、`a == 0` なら 1、それ以外は `+inf`。
#[inline]
pub fn get_ratio(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        if a == 0.0 { 1.0 } else { f64::INFINITY }
    } else {
        a / b
    }
}

fn metric_stats(
    left: &Batch,
    right: &Batch,
    matches: &[Match],
    metric: &FieldMetric,
) -> FieldMetricStats {
    let mut stats = FieldMetricStats::default();
    let (Some(left_field), Some(right_field)) =
        (metric.field_index(left.index()), metric.field_index(right.index()))
    else {
        return stats;
    };

    let mut geometric_mean = GeometricMean::new();
    let mut left_sum = 0.0;
    let mut right_sum = 0.0;
    for m in matches {
        let (Some(left_value), Some(right_value)) = (
            left.number(m.left_index, left_field),
            right.number(m.right_index, right_field),
        ) else {
            continue;
        };
        let ratio = get_ratio(left_value, right_value);
        if geometric_mean.count() == 0 {
            stats.min_ratio = ratio;
            stats.max_ratio = ratio;
        } else {
            stats.min_ratio = stats.min_ratio.min(ratio);
            stats.max_ratio = stats.max_ratio.max(ratio);
        }
        geometric_mean.add(ratio);
        left_sum += left_value;
        right_sum += right_value;
    }

    if geometric_mean.count() > 0 {
        stats.geometric_mean = geometric_mean.get();
        stats.arithmetic_mean = get_ratio(left_sum, right_sum);
    }
    stats
}

/// メトリクスごとの統計を入力順に返す
pub fn compute_stats(
    left: &Batch,
    right: &Batch,
    matches: &[Match],
    metrics: &[FieldMetric],
) -> Vec<FieldMetricStats> {
    metrics.iter().map(|metric| metric_stats(left, right, matches, metric)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldId;
    use crate::metric::create_metrics;

    fn pair(left_sizes: &[f64], right_sizes: &[f64]) -> (Vec<Batch>, Vec<Match>) {
        let make = |index: usize, sizes: &[f64]| {
            Batch::from_columns(
                index,
                format!("b{index}"),
                vec![FieldId::OriginalName, FieldId::EncodedSize],
                sizes
                    .iter()
                    .enumerate()
                    .map(|(i, s)| vec![format!("img{i}").as_str().into(), (*s).into()])
                    .collect(),
            )
            .unwrap()
        };
        let matches = (0..left_sizes.len().min(right_sizes.len()))
            .map(|i| Match {
                left_index: i,
                right_index: i,
            })
            .collect();
        (vec![make(0, left_sizes), make(1, right_sizes)], matches)
    }

    #[test]
    fn ratio_handles_zero_divisor() {
        assert_eq!(get_ratio(0.0, 0.0), 1.0);
        assert_eq!(get_ratio(5.0, 0.0), f64::INFINITY);
        assert_eq!(get_ratio(0.0, 5.0), 0.0);
        assert_eq!(get_ratio(4.0, 2.0), 2.0);
    }

    #[test]
    fn empty_match_set_is_identity() {
        let (batches, _) = pair(&[1.0, 2.0], &[3.0, 4.0]);
        let metrics = create_metrics(&batches);
        let stats = compute_stats(&batches[0], &batches[1], &[], &metrics);
        assert_eq!(stats, vec![FieldMetricStats::default()]);
    }

    #[test]
    fn arithmetic_mean_is_ratio_of_sums() {
        let (batches, matches) = pair(&[1.0, 30.0], &[2.0, 10.0]);
        let metrics = create_metrics(&batches);
        let stats = compute_stats(&batches[0], &batches[1], &matches, &metrics)[0];
        assert_eq!(stats.min_ratio, 0.5);
        assert_eq!(stats.max_ratio, 3.0);
        // (1 + 30) / (2 + 10)、比率の平均 1.75 ではない
        assert!((stats.arithmetic_mean - 31.0 / 12.0).abs() < 1e-12);
        assert!((stats.geometric_mean - 1.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn min_max_start_from_first_ratio() {
        let (batches, matches) = pair(&[6.0, 8.0], &[2.0, 2.0]);
        let metrics = create_metrics(&batches);
        let stats = compute_stats(&batches[0], &batches[1], &matches, &metrics)[0];
        // 1 を初期値にすると min が 1 になってしまう
        assert_eq!(stats.min_ratio, 3.0);
        assert_eq!(stats.max_ratio, 4.0);
    }

    #[test]
    fn zero_and_infinite_ratios_propagate() {
        let (batches, matches) = pair(&[0.0, 5.0], &[4.0, 0.0]);
        let metrics = create_metrics(&batches);
        let stats = compute_stats(&batches[0], &batches[1], &matches, &metrics)[0];
        assert_eq!(stats.min_ratio, 0.0);
        assert_eq!(stats.max_ratio, f64::INFINITY);
        assert!(stats.geometric_mean.is_nan());
        assert_eq!(stats.arithmetic_mean, 5.0 / 4.0);

        let (batches, matches) = pair(&[3.0], &[0.0]);
        let metrics = create_metrics(&batches);
        let stats = compute_stats(&batches[0], &batches[1], &matches, &metrics)[0];
        assert_eq!(stats.geometric_mean, f64::INFINITY);
        assert_eq!(stats.arithmetic_mean, f64::INFINITY);
    }
}
