//! バッチ（1回の実験結果の表）

use crate::error::{CompareError, Result};
use crate::field::{Field, FieldId, FieldValue};

/// 1回の実験結果の表
///
/// 行は `fields` と位置で対応する値の列。読み込み後は不変。
/// `index` は読み込まれたバッチ群の中での位置で、[`crate::FieldMetric`] の参照に使う。
#[derive(Debug, Clone)]
pub struct Batch {
    index: usize,
    name: String,
    fields: Vec<Field>,
    rows: Vec<Vec<FieldValue>>,
}

impl Batch {
    /// バッチを作る。行幅と数値列の値を検証する。
    pub fn new(
        index: usize,
        name: impl Into<String>,
        fields: Vec<Field>,
        rows: Vec<Vec<FieldValue>>,
    ) -> Result<Batch> {
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != fields.len() {
                return Err(CompareError::RowWidthMismatch {
                    row: row_index,
                    expected: fields.len(),
                    actual: row.len(),
                });
            }
            for (field_index, (field, value)) in fields.iter().zip(row).enumerate() {
                if field.is_number() && value.as_number().is_none() {
                    return Err(CompareError::NonNumericValue {
                        row: row_index,
                        field: field_index,
                    });
                }
            }
        }
        Ok(Batch {
            index,
            name: name.into(),
            fields,
            rows,
        })
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[inline]
    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    /// 行 `row` の列 `field` の値
    #[inline]
    pub fn value(&self, row: usize, field: usize) -> Option<&FieldValue> {
        self.rows.get(row).and_then(|r| r.get(field))
    }

    /// 行 `row` の列 `field` の数値
    #[inline]
    pub fn number(&self, row: usize, field: usize) -> Option<f64> {
        self.value(row, field).and_then(FieldValue::as_number)
    }

    /// `other` のフィールドと比較可能な、このバッチの最初のフィールドの位置
    pub fn find_comparable_field(&self, other: &Field) -> Option<usize> {
        self.fields.iter().position(|f| f.is_comparable_to(other))
    }

    /// 全列の値域をそのまま観測してバッチを作る（テスト・取り込み用）
    pub fn from_columns(
        index: usize,
        name: impl Into<String>,
        ids: Vec<FieldId>,
        rows: Vec<Vec<FieldValue>>,
    ) -> Result<Batch> {
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != ids.len() {
                return Err(CompareError::RowWidthMismatch {
                    row: row_index,
                    expected: ids.len(),
                    actual: row.len(),
                });
            }
        }
        let fields = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| Field::observe(id, rows.iter().map(|r| &r[i])))
            .collect();
        Batch::new(index, name, fields, rows)
    }
}
