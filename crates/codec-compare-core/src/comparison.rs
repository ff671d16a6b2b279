//! 比較全体の状態と再計算の順序
//!
//! フィルタが変わったバッチについて、次の順で同期的に再計算してから通知する。
//!
//! 1. フィルタ済み行
//! 2. 基準バッチとの対応（基準バッチ自身のフィルタが変わった場合は他の全バッチ）
//! 3. 統計
//! 4. [`SelectionListener::filtered_data_changed`]
//!
//! 通知を受けた時点で全ての派生データは更新済み。

use crate::batch::Batch;
use crate::error::{CompareError, Result};
use crate::filter::{FieldFilter, FilterSet};
use crate::matcher::{Match, MatchOutcome, MatchPolicy};
use crate::metric::{
    FieldMetric, PlotMetrics, create_metrics, enable_default_metrics, select_plot_metrics,
};
use crate::selection::{BatchSelection, derive_filtered_rows, derive_matches, derive_stats};
use crate::stats::FieldMetricStats;

/// フィルタ済みデータの変更通知を受け取る
///
/// 通知はバッチの番号だけを運ぶ。データは [`Comparison::selection`] で読み直す。
pub trait SelectionListener {
    fn filtered_data_changed(&mut self, batch_index: usize);
}

impl<F: FnMut(usize)> SelectionListener for F {
    fn filtered_data_changed(&mut self, batch_index: usize) {
        (*self)(batch_index)
    }
}

/// 読み込まれたバッチ群と、その選択状態・メトリクス・基準バッチ
pub struct Comparison {
    batches: Vec<Batch>,
    metrics: Vec<FieldMetric>,
    selections: Vec<BatchSelection>,
    reference_index: usize,
    policy: MatchPolicy,
    listeners: Vec<Box<dyn SelectionListener>>,
}

impl Comparison {
    /// バッチ群から比較状態を作る
    ///
    /// `batches[i].index() == i` であること。メトリクスの既定値と各バッチの既定フィルタは
    /// ここで1度だけ適用される。
    pub fn new(batches: Vec<Batch>, reference_index: usize, policy: MatchPolicy) -> Result<Self> {
        for (position, batch) in batches.iter().enumerate() {
            if batch.index() != position {
                return Err(CompareError::BatchIndexMismatch {
                    position,
                    index: batch.index(),
                });
            }
        }
        if reference_index >= batches.len() {
            return Err(CompareError::UnknownBatch(reference_index));
        }

        let mut metrics = create_metrics(&batches);
        enable_default_metrics(&batches[0], &mut metrics);
        let selections = batches.iter().map(BatchSelection::new).collect::<Result<Vec<_>>>()?;

        let mut comparison = Comparison {
            batches,
            metrics,
            selections,
            reference_index,
            policy,
            listeners: Vec::new(),
        };
        comparison.rederive_all()?;
        Ok(comparison)
    }

    /// 通知先を登録する
    pub fn add_listener<L: SelectionListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    #[inline]
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    #[inline]
    pub fn batch(&self, batch_index: usize) -> Option<&Batch> {
        self.batches.get(batch_index)
    }

    #[inline]
    pub fn metrics(&self) -> &[FieldMetric] {
        &self.metrics
    }

    #[inline]
    pub fn reference_index(&self) -> usize {
        self.reference_index
    }

    #[inline]
    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// バッチ番号から選択状態を引く
    #[inline]
    pub fn selection(&self, batch_index: usize) -> Option<&BatchSelection> {
        self.selections.get(batch_index)
    }

    /// バッチと基準バッチの対応。基準バッチ自身を指定するとエラー。
    pub fn matches_with_reference(&self, batch_index: usize) -> Result<&[Match]> {
        Ok(self.non_reference_selection(batch_index)?.matches())
    }

    /// バッチと基準バッチの統計。基準バッチ自身を指定するとエラー。
    pub fn stats_with_reference(&self, batch_index: usize) -> Result<&[FieldMetricStats]> {
        Ok(self.non_reference_selection(batch_index)?.stats())
    }

    fn non_reference_selection(&self, batch_index: usize) -> Result<&BatchSelection> {
        let selection =
            self.selections.get(batch_index).ok_or(CompareError::UnknownBatch(batch_index))?;
        if batch_index == self.reference_index {
            return Err(CompareError::SelfComparison { batch_index });
        }
        Ok(selection)
    }

    /// フィルタを1つ置き換えて再計算する
    pub fn update_filter(
        &mut self,
        batch_index: usize,
        field_index: usize,
        filter: FieldFilter,
    ) -> Result<()> {
        let batch = self.batches.get(batch_index).ok_or(CompareError::UnknownBatch(batch_index))?;
        self.selections[batch_index].filters_mut().set(batch, field_index, filter)?;
        self.filter_changed(batch_index)
    }

    /// フィルタ列を丸ごと置き換えて再計算する
    pub fn replace_filters(&mut self, batch_index: usize, filters: FilterSet) -> Result<()> {
        let batch = self.batches.get(batch_index).ok_or(CompareError::UnknownBatch(batch_index))?;
        let filters = FilterSet::from_filters(batch, filters.iter().cloned().collect())?;
        *self.selections[batch_index].filters_mut() = filters;
        self.filter_changed(batch_index)
    }

    /// フィルタを値域全体に戻して再計算する
    pub fn reset_filter(&mut self, batch_index: usize, field_index: usize) -> Result<()> {
        let batch = self.batches.get(batch_index).ok_or(CompareError::UnknownBatch(batch_index))?;
        let field = batch.fields().get(field_index).ok_or(CompareError::FieldOutOfRange {
            batch_index,
            field: field_index,
        })?;
        let filter = FieldFilter::for_field(field);
        self.update_filter(batch_index, field_index, filter)
    }

    /// 「バッチ `batch_index` のフィルタが変わった」ことを受けて再計算し、通知する
    pub fn filter_changed(&mut self, batch_index: usize) -> Result<()> {
        let batch = self.batches.get(batch_index).ok_or(CompareError::UnknownBatch(batch_index))?;
        let rows = derive_filtered_rows(batch, self.selections[batch_index].filters())?;
        self.selections[batch_index].set_filtered_rows(rows);

        if batch_index == self.reference_index {
            self.rederive_all()?;
        } else {
            self.rederive(batch_index)?;
        }

        for listener in &mut self.listeners {
            listener.filtered_data_changed(batch_index);
        }
        Ok(())
    }

    /// 基準バッチを切り替えて全バッチの対応と統計を再計算する
    pub fn set_reference(&mut self, batch_index: usize) -> Result<()> {
        if batch_index >= self.batches.len() {
            return Err(CompareError::UnknownBatch(batch_index));
        }
        if batch_index == self.reference_index {
            return Ok(());
        }
        log::debug!("reference batch {} -> {}", self.reference_index, batch_index);
        self.reference_index = batch_index;
        self.rederive_all()
    }

    /// メトリクスの有効・無効を切り替える（統計は全メトリクス分を常に保持している）
    pub fn set_metric_enabled(&mut self, metric_index: usize, enabled: bool) -> Result<()> {
        let metric =
            self.metrics.get_mut(metric_index).ok_or(CompareError::UnknownMetric(metric_index))?;
        metric.enabled = enabled;
        Ok(())
    }

    /// 既定のプロット軸
    pub fn plot_metrics(&self) -> PlotMetrics {
        select_plot_metrics(&self.batches[0], &self.metrics)
    }

    fn rederive_all(&mut self) -> Result<()> {
        for batch_index in 0..self.batches.len() {
            self.rederive(batch_index)?;
        }
        Ok(())
    }

    /// 対応と統計を導出し直す。基準バッチ自身は空の対応と恒等統計になる。
    fn rederive(&mut self, batch_index: usize) -> Result<()> {
        let batch = &self.batches[batch_index];
        let reference_batch = &self.batches[self.reference_index];
        let outcome = if batch_index == self.reference_index {
            MatchOutcome::default()
        } else {
            derive_matches(
                batch,
                &self.selections[batch_index],
                reference_batch,
                &self.selections[self.reference_index],
                &self.metrics,
                &self.policy,
            )?
        };
        let stats = derive_stats(batch, reference_batch, &outcome.matches, &self.metrics);
        self.selections[batch_index].set_derived(outcome, stats);
        Ok(())
    }
}
