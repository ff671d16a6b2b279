//! フィルタエンジン
//!
//! フィールドごとに1つのフィルタを持ち、全フィルタを満たす行（AND）だけを残す。
//! 数値フィールドは閉区間 `[range_start, range_end]`、カテゴリフィールドは許可値の集合で判定する。

use std::collections::BTreeSet;

use crate::batch::Batch;
use crate::error::{CompareError, Result};
use crate::field::{Field, FieldDomain, FieldId, FieldValue};

/// 1フィールド分のフィルタ
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    /// 数値フィールド用の閉区間
    Range { range_start: f64, range_end: f64 },
    /// カテゴリフィールド用の許可値集合
    Values { accepted: BTreeSet<String> },
}

impl FieldFilter {
    /// フィールドの値域全体を受け入れるフィルタ（何も除外しない）
    pub fn for_field(field: &Field) -> FieldFilter {
        match field.domain() {
            FieldDomain::Numeric {
                range_start,
                range_end,
            } => FieldFilter::Range {
                range_start: *range_start,
                range_end: *range_end,
            },
            FieldDomain::Categorical { unique_values } => FieldFilter::Values {
                accepted: unique_values.clone(),
            },
        }
    }

    /// 値がフィルタを通過するか
    ///
    /// 範囲外の値・集合にない値・型の合わない値は通過しない（エラーにはしない）。
    #[inline]
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match self {
            FieldFilter::Range {
                range_start,
                range_end,
            } => value.as_number().is_some_and(|v| *range_start <= v && v <= *range_end),
            FieldFilter::Values { accepted } => accepted.contains(&*value.to_text()),
        }
    }

    /// フィルタの種類がフィールドの種類と一致するか
    pub fn matches_kind(&self, field: &Field) -> bool {
        matches!(
            (self, field.is_number()),
            (FieldFilter::Range { .. }, true) | (FieldFilter::Values { .. }, false)
        )
    }

    /// フィールドの値域全体を受け入れるか
    pub fn is_noop_for(&self, field: &Field) -> bool {
        match (self, field.domain()) {
            (
                FieldFilter::Range {
                    range_start,
                    range_end,
                },
                FieldDomain::Numeric {
                    range_start: domain_start,
                    range_end: domain_end,
                },
            ) => range_start <= domain_start && domain_end <= range_end,
            (FieldFilter::Values { accepted }, FieldDomain::Categorical { unique_values }) => {
                unique_values.is_subset(accepted)
            }
            _ => false,
        }
    }
}

/// バッチのフィールドと位置で対応するフィルタ列
///
/// 構築時にフィルタ数とフィルタの種類を検証するので、`filters[i]` は常に `fields[i]` 用。
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSet {
    filters: Vec<FieldFilter>,
}

impl FilterSet {
    /// 全フィールドについて値域全体を受け入れるフィルタ列
    pub fn for_batch(batch: &Batch) -> FilterSet {
        FilterSet {
            filters: batch.fields().iter().map(FieldFilter::for_field).collect(),
        }
    }

    /// 既存のフィルタ列から作る。数と種類を検証する。
    pub fn from_filters(batch: &Batch, filters: Vec<FieldFilter>) -> Result<FilterSet> {
        if filters.len() != batch.fields().len() {
            return Err(CompareError::FilterCountMismatch {
                expected: batch.fields().len(),
                actual: filters.len(),
            });
        }
        for (field_index, (field, filter)) in batch.fields().iter().zip(&filters).enumerate() {
            if !filter.matches_kind(field) {
                return Err(CompareError::FilterKindMismatch { field: field_index });
            }
        }
        Ok(FilterSet { filters })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    #[inline]
    pub fn get(&self, field_index: usize) -> Option<&FieldFilter> {
        self.filters.get(field_index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldFilter> {
        self.filters.iter()
    }

    /// `field_index` のフィルタを置き換える
    pub fn set(&mut self, batch: &Batch, field_index: usize, filter: FieldFilter) -> Result<()> {
        let field = batch.fields().get(field_index).ok_or(CompareError::FieldOutOfRange {
            batch_index: batch.index(),
            field: field_index,
        })?;
        if !filter.matches_kind(field) {
            return Err(CompareError::FilterKindMismatch { field: field_index });
        }
        self.check_count(batch)?;
        let slot = self.filters.get_mut(field_index).ok_or(CompareError::FieldOutOfRange {
            batch_index: batch.index(),
            field: field_index,
        })?;
        *slot = filter;
        Ok(())
    }

    /// 別のバッチ用に作られたフィルタ列でないか
    fn check_count(&self, batch: &Batch) -> Result<()> {
        if self.filters.len() != batch.fields().len() {
            return Err(CompareError::FilterCountMismatch {
                expected: batch.fields().len(),
                actual: self.filters.len(),
            });
        }
        Ok(())
    }

    /// 値域を狭めているフィルタの数
    pub fn active_count(&self, batch: &Batch) -> usize {
        batch
            .fields()
            .iter()
            .zip(&self.filters)
            .filter(|(field, filter)| !filter.is_noop_for(field))
            .count()
    }
}

/// フィルタを通過した行の番号（昇順・重複なし）
///
/// 値域全体を受け入れるフィルタは何も除外しない。値域の計算から外れる NaN もこのときは残す。
/// 計算量は O(行数 × フィールド数)。
pub fn filtered_row_indices(batch: &Batch, filters: &FilterSet) -> Result<Vec<usize>> {
    filters.check_count(batch)?;
    let keeps_nan: Vec<bool> = batch
        .fields()
        .iter()
        .zip(filters.iter())
        .map(|(field, filter)| filter.is_noop_for(field))
        .collect();
    let passes = |value: &FieldValue, filter: &FieldFilter, keeps_nan: bool| match value {
        FieldValue::Number(v) if v.is_nan() => keeps_nan,
        _ => filter.accepts(value),
    };
    Ok(batch
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            row.iter()
                .zip(filters.iter())
                .zip(&keeps_nan)
                .all(|((value, filter), keeps_nan)| passes(value, filter, *keeps_nan))
        })
        .map(|(row_index, _)| row_index)
        .collect())
}

/// 0 を「測定なし」の埋め値として扱う測定結果フィールド
fn zero_is_placeholder(id: &FieldId) -> bool {
    matches!(
        id,
        FieldId::EncodedSize
            | FieldId::EncodingDuration
            | FieldId::DecodingDuration
            | FieldId::RawDecodingDuration
    )
}

/// 初期表示用の既定フィルタを適用する
///
/// サイズ・時間の列で 0 は測定の欠落を表すので、正の値が存在する列では
/// 下限を最小の正の値まで引き上げて 0 の行を除外する。
/// [`crate::BatchSelection`] の作成時に1度だけ呼ぶ。
pub fn enable_default_filters(batch: &Batch, filters: &mut FilterSet) {
    for (field_index, field) in batch.fields().iter().enumerate() {
        if !zero_is_placeholder(field.id()) {
            continue;
        }
        let Some(FieldFilter::Range { range_start, .. }) = filters.filters.get_mut(field_index)
        else {
            continue;
        };
        if *range_start > 0.0 {
            continue;
        }
        let smallest_positive = batch
            .rows()
            .iter()
            .filter_map(|row| row[field_index].as_number())
            .filter(|v| *v > 0.0)
            .fold(f64::INFINITY, f64::min);
        if smallest_positive.is_finite() {
            log::debug!(
                "batch {}: default filter raises {} lower bound to {}",
                batch.index(),
                field.id(),
                smallest_positive
            );
            *range_start = smallest_positive;
        }
    }
}
