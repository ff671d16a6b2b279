//! メトリクスカタログ
//!
//! 全バッチに共通して存在し、比較可能な数値フィールドを「メトリクス」として列挙する。
//! 列挙は最初のバッチのフィールド順を基準に行い、同じ入力には同じ結果を返す。

use crate::batch::Batch;
use crate::error::{CompareError, Result};
use crate::field::FieldId;

/// バッチ横断の比較単位
///
/// `field_indices[b]` はバッチ `b`（`Batch::index() == b`）のフィールド位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetric {
    field_indices: Vec<usize>,
    /// 既定で表示・集計するか
    pub enabled: bool,
}

impl FieldMetric {
    /// バッチごとのフィールド位置から作る
    ///
    /// 位置の数がバッチ数と一致すること、参照先が全て数値で互いに比較可能であることを検証する。
    pub fn new(field_indices: Vec<usize>, batches: &[Batch]) -> Result<FieldMetric> {
        if field_indices.len() != batches.len() {
            return Err(CompareError::MetricBatchCountMismatch {
                expected: batches.len(),
                actual: field_indices.len(),
            });
        }
        let mut first_field = None;
        for (batch, &field_index) in batches.iter().zip(&field_indices) {
            let field = batch.fields().get(field_index).ok_or(CompareError::FieldOutOfRange {
                batch_index: batch.index(),
                field: field_index,
            })?;
            let anchor = *first_field.get_or_insert(field);
            if !field.is_number() || !field.is_comparable_to(anchor) {
                return Err(CompareError::IncomparableMetricField {
                    batch_index: batch.index(),
                    field: field_index,
                });
            }
        }
        Ok(FieldMetric {
            field_indices,
            enabled: false,
        })
    }

    /// バッチ `batch_index` でのフィールド位置
    #[inline]
    pub fn field_index(&self, batch_index: usize) -> Option<usize> {
        self.field_indices.get(batch_index).copied()
    }

    #[inline]
    pub fn field_indices(&self) -> &[usize] {
        &self.field_indices
    }

    /// バッチ `batch` でのフィールドID
    pub fn field_id<'a>(&self, batch: &'a Batch) -> Option<&'a FieldId> {
        self.field_index(batch.index())
            .and_then(|i| batch.fields().get(i))
            .map(|f| f.id())
    }
}

/// メトリクスとして扱わない列（入力の寸法とエンコーダ設定）
fn is_excluded_from_metrics(id: &FieldId) -> bool {
    id.is_source_dimension() || id.is_encoder_setting()
}

/// 全バッチに共通する比較可能な数値フィールドを列挙する
///
/// 最初のバッチの各フィールドについて、他の全バッチから同じIDかつ同じ数値性の
/// フィールドを（位置ではなく）先頭から探す。1つのバッチでも見つからなければその候補は捨てる。
pub fn create_metrics(batches: &[Batch]) -> Vec<FieldMetric> {
    let Some(first) = batches.first() else {
        return Vec::new();
    };

    let mut metrics = Vec::new();
    for field in first.fields() {
        if !field.is_number() || is_excluded_from_metrics(field.id()) {
            continue;
        }
        let field_indices: Option<Vec<usize>> =
            batches.iter().map(|batch| batch.find_comparable_field(field)).collect();
        match field_indices {
            Some(field_indices) => metrics.push(FieldMetric {
                field_indices,
                enabled: false,
            }),
            None => log::debug!("{} is missing from some batch, not a metric", field.id()),
        }
    }
    metrics
}

/// 既定で有効にする測定結果
fn is_default_metric(id: &FieldId) -> bool {
    matches!(
        id,
        FieldId::EncodedSize | FieldId::EncodingDuration | FieldId::DecodingDuration
    )
}

/// サイズとエンコード・デコード時間のメトリクスを有効にし、それ以外を無効にする
pub fn enable_default_metrics(first_batch: &Batch, metrics: &mut [FieldMetric]) {
    for metric in metrics.iter_mut() {
        metric.enabled = metric.field_id(first_batch).is_some_and(is_default_metric);
    }
}

/// 既定の2次元プロットの軸（`metrics` 内の位置）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlotMetrics {
    pub x: Option<usize>,
    pub y: Option<usize>,
}

/// 既定のプロット軸を選ぶ
///
/// 優先順位:
/// 1. 有効なエンコードサイズを x、有効なエンコード時間（なければデコード時間）を y
/// 2. 最初の有効なメトリクスを x、2つ目の有効なメトリクスを y（1つしかなければ同じもの）
/// 3. 有効なものが無ければ最初のメトリクスを両軸に
/// 4. メトリクスが無ければ選択なし
pub fn select_plot_metrics(first_batch: &Batch, metrics: &[FieldMetric]) -> PlotMetrics {
    let find_enabled = |id: FieldId| {
        metrics
            .iter()
            .position(|m| m.enabled && m.field_id(first_batch) == Some(&id))
    };

    let x = find_enabled(FieldId::EncodedSize);
    let y = find_enabled(FieldId::EncodingDuration)
        .or_else(|| find_enabled(FieldId::DecodingDuration));
    if x.is_some() && y.is_some() {
        return PlotMetrics { x, y };
    }

    let mut enabled = metrics.iter().enumerate().filter(|(_, m)| m.enabled).map(|(i, _)| i);
    if let Some(x) = enabled.next() {
        let y = enabled.next().unwrap_or(x);
        return PlotMetrics {
            x: Some(x),
            y: Some(y),
        };
    }

    if metrics.is_empty() {
        PlotMetrics::default()
    } else {
        PlotMetrics {
            x: Some(0),
            y: Some(0),
        }
    }
}
