//! バッチJSONの取り込み
//!
//! 実験ジェネレータが出力する形式:
//!
//! ```json
//! {
//!   "build_name": "avif-speed6",
//!   "constant_descriptions": [{"encoder": "avif"}],
//!   "field_descriptions": [{"name": "original_name", "description": "..."}],
//!   "results": [["a.png", 512, 512, 1234, 0.05]]
//! }
//! ```
//!
//! 定数は全行に同じ値を持つ列として追加する。`megapixels` と `encoded_bits_per_pixel` は
//! 元の列があり、かつ同名の列が無いときだけ導出して追加する。

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use codec_compare_core::{Batch, FieldId, FieldValue, get_ratio};
use serde::Deserialize;
use serde_json::Value;

use crate::common::io::read_input;

#[derive(Debug, Deserialize)]
struct BatchFile {
    #[serde(default)]
    build_name: Option<String>,
    #[serde(default)]
    constant_descriptions: Vec<BTreeMap<String, Value>>,
    field_descriptions: Vec<FieldDescription>,
    #[serde(default)]
    results: Vec<Vec<Value>>,
}

// `description` は表示用で比較には使わない
#[derive(Debug, Deserialize)]
struct FieldDescription {
    name: String,
}

/// ファイルからバッチを読み込む（`.gz` 可）
///
/// `build_name` が無ければファイル名（`.json` / `.gz` を除く）を名前にする。
pub fn load_batch(index: usize, path: &Path) -> Result<Batch> {
    let text = read_input(path).with_context(|| format!("failed to read {}", path.display()))?;
    let batch = parse_batch(index, &display_name(path), &text)
        .with_context(|| format!("failed to load batch from {}", path.display()))?;
    log::info!(
        "batch {}: '{}' with {} rows and {} fields",
        batch.index(),
        batch.name(),
        batch.rows().len(),
        batch.fields().len()
    );
    Ok(batch)
}

/// JSON文字列からバッチを作る
pub fn parse_batch(index: usize, fallback_name: &str, text: &str) -> Result<Batch> {
    let file: BatchFile = serde_json::from_str(text).context("invalid batch JSON")?;

    let width = file.field_descriptions.len();
    for (row, values) in file.results.iter().enumerate() {
        if values.len() != width {
            bail!("row {row} has {} values but {width} fields are described", values.len());
        }
    }
    let row_count = file.results.len();

    let mut ids: Vec<FieldId> =
        file.field_descriptions.iter().map(|d| FieldId::from_name(&d.name)).collect();
    let mut columns: Vec<Vec<FieldValue>> = (0..width)
        .map(|field| to_column(&file.results.iter().map(|row| &row[field]).collect::<Vec<_>>()))
        .collect();

    for constants in &file.constant_descriptions {
        for (name, value) in constants {
            ids.push(FieldId::from_name(name));
            columns.push(to_column(&vec![value; row_count]));
        }
    }
    append_derived_columns(&mut ids, &mut columns, row_count);

    let rows = (0..row_count).map(|row| columns.iter().map(|c| c[row].clone()).collect()).collect();
    let name = match file.build_name {
        Some(name) if !name.is_empty() => name,
        _ => fallback_name.to_string(),
    };
    Batch::from_columns(index, name, ids, rows).context("inconsistent batch contents")
}

fn display_name(path: &Path) -> String {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    name.strip_suffix(".json").unwrap_or(name).to_string()
}

/// 全ての値がJSONの数値なら数値列、そうでなければ全てテキスト列
fn to_column(values: &[&Value]) -> Vec<FieldValue> {
    if values.iter().all(|v| v.is_number()) {
        values.iter().map(|v| FieldValue::Number(v.as_f64().unwrap_or(f64::NAN))).collect()
    } else {
        values
            .iter()
            .map(|v| match v {
                Value::String(s) => FieldValue::Text(s.clone()),
                other => FieldValue::Text(other.to_string()),
            })
            .collect()
    }
}

fn numeric_column<'a>(
    ids: &[FieldId],
    columns: &'a [Vec<FieldValue>],
    id: &FieldId,
) -> Option<&'a [FieldValue]> {
    let position = ids.iter().position(|x| x == id)?;
    let column = &columns[position];
    column.iter().all(|v| v.as_number().is_some()).then_some(column.as_slice())
}

fn number_at(column: &[FieldValue], row: usize) -> f64 {
    column[row].as_number().unwrap_or(f64::NAN)
}

fn append_derived_columns(
    ids: &mut Vec<FieldId>,
    columns: &mut Vec<Vec<FieldValue>>,
    row_count: usize,
) {
    let width = numeric_column(ids, columns, &FieldId::Width);
    let height = numeric_column(ids, columns, &FieldId::Height);
    let (Some(width), Some(height)) = (width, height) else {
        return;
    };
    // frame_count が無い静止画は1フレーム
    let frames = numeric_column(ids, columns, &FieldId::FrameCount);
    let pixels: Vec<f64> = (0..row_count)
        .map(|row| {
            number_at(width, row)
                * number_at(height, row)
                * frames.map_or(1.0, |f| number_at(f, row))
        })
        .collect();

    let bits_per_pixel: Option<Vec<FieldValue>> =
        numeric_column(ids, columns, &FieldId::EncodedSize).map(|size| {
            pixels
                .iter()
                .enumerate()
                .map(|(row, p)| FieldValue::Number(get_ratio(number_at(size, row) * 8.0, *p)))
                .collect()
        });

    if !ids.contains(&FieldId::Megapixels) {
        ids.push(FieldId::Megapixels);
        columns.push(pixels.iter().map(|p| FieldValue::Number(p / 1e6)).collect());
    }
    if let Some(bits_per_pixel) = bits_per_pixel {
        if !ids.contains(&FieldId::EncodedBitsPerPixel) {
            ids.push(FieldId::EncodedBitsPerPixel);
            columns.push(bits_per_pixel);
        }
    }
}
