//! バッチの選択状態と派生データの導出
//!
//! [`BatchSelection`] は1つのバッチのフィルタと、そこから導出されるデータ
//! （フィルタ済み行、基準バッチとの対応、統計）を保持する。
//! 導出自体は純粋関数で、呼び出し順（行 → 対応 → 統計）は [`crate::Comparison`] が決める。

use crate::batch::Batch;
use crate::error::Result;
use crate::filter::{FilterSet, enable_default_filters, filtered_row_indices};
use crate::matcher::{Match, MatchOutcome, MatchPolicy, match_rows};
use crate::metric::FieldMetric;
use crate::stats::{FieldMetricStats, compute_stats};

/// 1バッチ分のフィルタと派生データ
#[derive(Debug, Clone)]
pub struct BatchSelection {
    batch_index: usize,
    filters: FilterSet,
    filtered_rows: Vec<usize>,
    match_outcome: MatchOutcome,
    stats: Vec<FieldMetricStats>,
}

impl BatchSelection {
    /// 値域全体のフィルタに既定フィルタを1度だけ適用して作る
    pub fn new(batch: &Batch) -> Result<BatchSelection> {
        let mut filters = FilterSet::for_batch(batch);
        enable_default_filters(batch, &mut filters);
        let filtered_rows = derive_filtered_rows(batch, &filters)?;
        Ok(BatchSelection {
            batch_index: batch.index(),
            filters,
            filtered_rows,
            match_outcome: MatchOutcome::default(),
            stats: Vec::new(),
        })
    }

    #[inline]
    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    #[inline]
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// フィルタを通過した行（昇順）
    #[inline]
    pub fn filtered_rows(&self) -> &[usize] {
        &self.filtered_rows
    }

    /// 基準バッチとの対応（このバッチが左、基準バッチが右）
    #[inline]
    pub fn matches(&self) -> &[Match] {
        &self.match_outcome.matches
    }

    #[inline]
    pub fn match_outcome(&self) -> &MatchOutcome {
        &self.match_outcome
    }

    /// メトリクスごとの統計（メトリクスカタログと同じ順）
    #[inline]
    pub fn stats(&self) -> &[FieldMetricStats] {
        &self.stats
    }

    pub(crate) fn filters_mut(&mut self) -> &mut FilterSet {
        &mut self.filters
    }

    pub(crate) fn set_filtered_rows(&mut self, rows: Vec<usize>) {
        self.filtered_rows = rows;
    }

    pub(crate) fn set_derived(&mut self, outcome: MatchOutcome, stats: Vec<FieldMetricStats>) {
        self.match_outcome = outcome;
        self.stats = stats;
    }
}

/// フィルタ済み行を導出する
pub fn derive_filtered_rows(batch: &Batch, filters: &FilterSet) -> Result<Vec<usize>> {
    let rows = filtered_row_indices(batch, filters)?;
    log::debug!(
        "batch {}: {} of {} rows pass the filters",
        batch.index(),
        rows.len(),
        batch.rows().len()
    );
    Ok(rows)
}

/// 選択中の行同士の対応を導出する（`selection` が左、`reference` が右）
pub fn derive_matches(
    batch: &Batch,
    selection: &BatchSelection,
    reference_batch: &Batch,
    reference: &BatchSelection,
    metrics: &[FieldMetric],
    policy: &MatchPolicy,
) -> Result<MatchOutcome> {
    match_rows(
        batch,
        selection.filtered_rows(),
        reference_batch,
        reference.filtered_rows(),
        metrics,
        policy,
    )
}

/// 対応から統計を導出する
pub fn derive_stats(
    batch: &Batch,
    reference_batch: &Batch,
    matches: &[Match],
    metrics: &[FieldMetric],
) -> Vec<FieldMetricStats> {
    compute_stats(batch, reference_batch, matches, metrics)
}
