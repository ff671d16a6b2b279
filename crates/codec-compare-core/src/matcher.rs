//! 行マッチング
//!
//! 2つのバッチのフィルタ済みの行の間で「同じ入力・同じ設定」を表す行同士を対応付ける。
//! 対応の条件は、キー列（メトリクスでも測定値でもない列）の値が全て等しいこと。
//! 右バッチのキーをハッシュ表に載せるので計算量はフィルタ済み行数に線形。

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;

use crate::batch::Batch;
use crate::error::{CompareError, Result};
use crate::field::{FieldId, FieldValue};
use crate::metric::FieldMetric;

/// 左バッチの行と右バッチの行の対応
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Match {
    pub left_index: usize,
    pub right_index: usize,
}

/// マッチングのキーから除外するフィールド
///
/// 既定ではエンコーダ名・出力パス・エンコーダ設定（effort, quality）を除外する。
/// これらはバッチ間で異なるのが普通で、等しさを要求すると対応が取れない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPolicy {
    ignored: BTreeSet<FieldId>,
}

impl MatchPolicy {
    pub fn new<I: IntoIterator<Item = FieldId>>(ignored: I) -> Self {
        Self {
            ignored: ignored.into_iter().collect(),
        }
    }

    #[inline]
    pub fn ignores(&self, id: &FieldId) -> bool {
        self.ignored.contains(id)
    }

    pub fn ignored(&self) -> impl Iterator<Item = &FieldId> {
        self.ignored.iter()
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::new([
            FieldId::Encoder,
            FieldId::EncodedPath,
            FieldId::Effort,
            FieldId::Quality,
        ])
    }
}

/// マッチング結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// 左バッチのフィルタ済み順の対応
    pub matches: Vec<Match>,
    /// キーに使ったフィールドの組（左の位置, 右の位置）
    pub key_fields: Vec<(usize, usize)>,
    /// キーが重複していたため対応付けを見送った左の行の数
    pub ambiguous_rows: usize,
}

/// キーの1要素。数値は `0.0 == -0.0`、NaN同士も等しいものとして扱う。
#[derive(Debug, PartialEq, Eq, Hash)]
enum KeyPart<'a> {
    Number(u64),
    Text(Cow<'a, str>),
}

type RowKey<'a> = Vec<KeyPart<'a>>;

fn canonical_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

fn row_key<'a>(batch: &'a Batch, row: usize, fields: &[usize]) -> Option<RowKey<'a>> {
    let values = batch.rows().get(row)?;
    Some(
        fields
            .iter()
            .map(|&field_index| {
                let value = &values[field_index];
                if batch.fields()[field_index].is_number() {
                    if let FieldValue::Number(v) = value {
                        return KeyPart::Number(canonical_bits(*v));
                    }
                }
                KeyPart::Text(value.to_text())
            })
            .collect(),
    )
}

/// キー列の組を決める
///
/// 左バッチの各フィールドのうち、メトリクスでなく、測定値でもなく、除外対象でなく、
/// 右バッチに比較可能なフィールド（メトリクスでないもの）があるものをキーにする。
/// 一部のバッチにしか無い測定値はメトリクスにならないので、IDでも除外する。
fn key_fields(
    left: &Batch,
    right: &Batch,
    metrics: &[FieldMetric],
    policy: &MatchPolicy,
) -> Vec<(usize, usize)> {
    let left_metric_fields: HashSet<usize> =
        metrics.iter().filter_map(|m| m.field_index(left.index())).collect();
    let right_metric_fields: HashSet<usize> =
        metrics.iter().filter_map(|m| m.field_index(right.index())).collect();

    let mut pairs = Vec::new();
    for (left_field, field) in left.fields().iter().enumerate() {
        if left_metric_fields.contains(&left_field)
            || field.id().is_measured_outcome()
            || policy.ignores(field.id())
        {
            continue;
        }
        let counterpart = right
            .fields()
            .iter()
            .enumerate()
            .position(|(i, f)| !right_metric_fields.contains(&i) && f.is_comparable_to(field));
        match counterpart {
            Some(right_field) => pairs.push((left_field, right_field)),
            None => log::warn!(
                "batch {}: {} has no counterpart in batch {}, ignored for matching",
                left.index(),
                field.id(),
                right.index()
            ),
        }
    }
    pairs
}

enum RightSlot {
    Unique(usize),
    Ambiguous,
}

/// フィルタ済みの行同士を対応付ける
///
/// 結果は部分単射で、各行は高々1つの対応にしか現れない。
/// キーが同じ行が片側に複数ある場合、そのキーの行はどれも対応付けない。
/// 同じバッチ同士のマッチングは [`CompareError::SelfComparison`]。
pub fn match_rows(
    left: &Batch,
    left_rows: &[usize],
    right: &Batch,
    right_rows: &[usize],
    metrics: &[FieldMetric],
    policy: &MatchPolicy,
) -> Result<MatchOutcome> {
    if left.index() == right.index() {
        return Err(CompareError::SelfComparison {
            batch_index: left.index(),
        });
    }

    let key_fields = key_fields(left, right, metrics, policy);
    if key_fields.is_empty() {
        log::warn!(
            "batches {} and {} share no key field, every row has the same key",
            left.index(),
            right.index()
        );
    }
    let (left_key_fields, right_key_fields): (Vec<usize>, Vec<usize>) =
        key_fields.iter().copied().unzip();

    let mut right_index: HashMap<RowKey<'_>, RightSlot> = HashMap::with_capacity(right_rows.len());
    for &row in right_rows {
        let Some(key) = row_key(right, row, &right_key_fields) else {
            continue;
        };
        right_index
            .entry(key)
            .and_modify(|slot| *slot = RightSlot::Ambiguous)
            .or_insert(RightSlot::Unique(row));
    }

    let left_keys: Vec<(usize, RowKey<'_>)> = left_rows
        .iter()
        .filter_map(|&row| row_key(left, row, &left_key_fields).map(|key| (row, key)))
        .collect();
    let mut left_counts: HashMap<&RowKey<'_>, usize> = HashMap::with_capacity(left_keys.len());
    for (_, key) in &left_keys {
        *left_counts.entry(key).or_insert(0) += 1;
    }

    let mut matches = Vec::new();
    let mut ambiguous_rows = 0;
    for (row, key) in &left_keys {
        if left_counts.get(key).copied().unwrap_or(0) > 1 {
            ambiguous_rows += 1;
            continue;
        }
        match right_index.get(key) {
            Some(RightSlot::Unique(right_row)) => matches.push(Match {
                left_index: *row,
                right_index: *right_row,
            }),
            Some(RightSlot::Ambiguous) => ambiguous_rows += 1,
            None => {}
        }
    }

    if ambiguous_rows > 0 {
        log::warn!(
            "batch {} vs {}: {} rows skipped because their key is not unique",
            left.index(),
            right.index(),
            ambiguous_rows
        );
    }
    log::debug!(
        "batch {} vs {}: {} of {} rows matched",
        left.index(),
        right.index(),
        matches.len(),
        left_rows.len()
    );

    Ok(MatchOutcome {
        matches,
        key_fields,
        ambiguous_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::create_metrics;

    fn batch(index: usize, rows: &[(&str, f64, &str, f64)]) -> Batch {
        Batch::from_columns(
            index,
            format!("b{index}"),
            vec![
                FieldId::OriginalName,
                FieldId::Width,
                FieldId::Encoder,
                FieldId::EncodedSize,
            ],
            rows.iter()
                .map(|(name, width, encoder, size)| {
                    vec![(*name).into(), (*width).into(), (*encoder).into(), (*size).into()]
                })
                .collect(),
        )
        .unwrap()
    }

    fn all_rows(batch: &Batch) -> Vec<usize> {
        (0..batch.rows().len()).collect()
    }

    #[test]
    fn matches_on_non_metric_fields() {
        let left = batch(0, &[("a", 10.0, "webp", 100.0), ("b", 20.0, "webp", 200.0)]);
        let right = batch(1, &[("b", 20.0, "avif", 150.0), ("a", 10.0, "avif", 90.0)]);
        let batches = [left, right];
        let metrics = create_metrics(&batches);
        let outcome = match_rows(
            &batches[0],
            &all_rows(&batches[0]),
            &batches[1],
            &all_rows(&batches[1]),
            &metrics,
            &MatchPolicy::default(),
        )
        .unwrap();
        assert_eq!(
            outcome.matches,
            vec![
                Match {
                    left_index: 0,
                    right_index: 1
                },
                Match {
                    left_index: 1,
                    right_index: 0
                },
            ]
        );
        // original_name と width だけがキー
        assert_eq!(outcome.key_fields, vec![(0, 0), (1, 1)]);
        assert_eq!(outcome.ambiguous_rows, 0);
    }

    #[test]
    fn unfiltered_rows_never_match() {
        let left = batch(0, &[("a", 10.0, "webp", 100.0), ("b", 20.0, "webp", 200.0)]);
        let right = batch(1, &[("a", 10.0, "avif", 90.0), ("b", 20.0, "avif", 150.0)]);
        let batches = [left, right];
        let metrics = create_metrics(&batches);
        let outcome = match_rows(
            &batches[0],
            &[1],
            &batches[1],
            &[0],
            &metrics,
            &MatchPolicy::default(),
        )
        .unwrap();
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn ignored_field_must_otherwise_be_equal() {
        let left = batch(0, &[("a", 10.0, "webp", 100.0)]);
        let right = batch(1, &[("a", 10.0, "avif", 90.0)]);
        let batches = [left, right];
        let metrics = create_metrics(&batches);
        let outcome = match_rows(
            &batches[0],
            &[0],
            &batches[1],
            &[0],
            &metrics,
            &MatchPolicy::new([]),
        )
        .unwrap();
        assert!(outcome.matches.is_empty());
        assert_eq!(outcome.key_fields.len(), 3);
    }

    #[test]
    fn ambiguous_keys_are_skipped() {
        let left = batch(0, &[("a", 10.0, "webp", 1.0), ("b", 10.0, "webp", 2.0)]);
        let right = batch(
            1,
            &[
                ("a", 10.0, "avif", 1.0),
                ("a", 10.0, "avif", 3.0),
                ("b", 10.0, "avif", 2.0),
            ],
        );
        let batches = [left, right];
        let metrics = create_metrics(&batches);
        let outcome = match_rows(
            &batches[0],
            &all_rows(&batches[0]),
            &batches[1],
            &all_rows(&batches[1]),
            &metrics,
            &MatchPolicy::default(),
        )
        .unwrap();
        assert_eq!(
            outcome.matches,
            vec![Match {
                left_index: 1,
                right_index: 2
            }]
        );
        assert_eq!(outcome.ambiguous_rows, 1);
    }

    #[test]
    fn matching_is_injective_and_deterministic() {
        let left = batch(
            0,
            &[("a", 1.0, "x", 1.0), ("a", 1.0, "x", 2.0), ("c", 3.0, "x", 3.0), ("d", 4.0, "x", 4.0)],
        );
        let right = batch(
            1,
            &[("d", 4.0, "y", 1.0), ("a", 1.0, "y", 2.0), ("c", 3.0, "y", 3.0), ("c", 3.0, "y", 5.0)],
        );
        let batches = [left, right];
        let metrics = create_metrics(&batches);
        let run = || {
            match_rows(
                &batches[0],
                &all_rows(&batches[0]),
                &batches[1],
                &all_rows(&batches[1]),
                &metrics,
                &MatchPolicy::default(),
            )
            .unwrap()
        };
        let first = run();
        assert_eq!(first, run());
        let lefts: HashSet<usize> = first.matches.iter().map(|m| m.left_index).collect();
        let rights: HashSet<usize> = first.matches.iter().map(|m| m.right_index).collect();
        assert_eq!(lefts.len(), first.matches.len());
        assert_eq!(rights.len(), first.matches.len());
        assert_eq!(
            first.matches,
            vec![Match {
                left_index: 3,
                right_index: 0
            }]
        );
    }

    #[test]
    fn self_comparison_is_rejected() {
        let b = batch(0, &[("a", 1.0, "x", 1.0)]);
        let err = match_rows(&b, &[0], &b, &[0], &[], &MatchPolicy::default()).unwrap_err();
        assert_eq!(err, CompareError::SelfComparison { batch_index: 0 });
    }

    #[test]
    fn measured_outcome_missing_from_another_batch_is_not_a_key() {
        let scored = |index: usize, psnr: [f64; 2]| {
            Batch::from_columns(
                index,
                format!("b{index}"),
                vec![FieldId::OriginalName, FieldId::EncodedSize, FieldId::Psnr],
                vec![
                    vec!["a".into(), 100.0.into(), psnr[0].into()],
                    vec!["b".into(), 200.0.into(), psnr[1].into()],
                ],
            )
            .unwrap()
        };
        let unscored = Batch::from_columns(
            2,
            "b2",
            vec![FieldId::OriginalName, FieldId::EncodedSize],
            vec![vec!["a".into(), 90.0.into()], vec!["b".into(), 180.0.into()]],
        )
        .unwrap();
        let batches = [scored(0, [30.0, 31.0]), scored(1, [35.5, 36.5]), unscored];

        // psnr は batch 2 に無いのでメトリクスにならない
        let metrics = create_metrics(&batches);
        assert_eq!(metrics.len(), 1);

        let outcome = match_rows(
            &batches[1],
            &all_rows(&batches[1]),
            &batches[0],
            &all_rows(&batches[0]),
            &metrics,
            &MatchPolicy::default(),
        )
        .unwrap();
        assert_eq!(outcome.key_fields, vec![(0, 0)]);
        assert_eq!(
            outcome.matches,
            vec![
                Match {
                    left_index: 0,
                    right_index: 0
                },
                Match {
                    left_index: 1,
                    right_index: 1
                },
            ]
        );
    }

    #[test]
    fn signed_zero_keys_are_equal() {
        let left = batch(0, &[("a", 0.0, "x", 1.0)]);
        let right = batch(1, &[("a", -0.0, "y", 1.0)]);
        let batches = [left, right];
        let metrics = create_metrics(&batches);
        let outcome = match_rows(
            &batches[0],
            &[0],
            &batches[1],
            &[0],
            &metrics,
            &MatchPolicy::default(),
        )
        .unwrap();
        assert_eq!(outcome.matches.len(), 1);
    }
}
