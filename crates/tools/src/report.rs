//! 比較結果のレポート（テキスト / JSON）

use std::io::{self, Write};

use codec_compare_core::{Comparison, FieldMetricStats};
use regex::Regex;
use serde::Serialize;

/// 表示するメトリクスの選び方
#[derive(Debug, Default)]
pub struct ReportOptions {
    /// 無効なメトリクスも表示する
    pub all_metrics: bool,
    /// 列名がこれにマッチするメトリクスだけ表示する
    pub metric_regex: Option<Regex>,
}

// ---------------------------------------------------------------------------
// レポート構造体（JSON出力と共用）
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Report {
    pub reference: BatchSummary,
    pub plot: PlotAxes,
    pub batches: Vec<BatchReport>,
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub index: usize,
    pub name: String,
    pub rows: usize,
    pub filtered_rows: usize,
}

/// 既定のプロット軸（列名）
#[derive(Debug, Serialize)]
pub struct PlotAxes {
    pub x: Option<String>,
    pub y: Option<String>,
}

/// 基準バッチ以外の1バッチ分
#[derive(Debug, Serialize)]
pub struct BatchReport {
    #[serde(flatten)]
    pub summary: BatchSummary,
    pub matched_rows: usize,
    pub ambiguous_rows: usize,
    pub metrics: Vec<MetricReport>,
}

#[derive(Debug, Serialize)]
pub struct MetricReport {
    pub field: String,
    pub enabled: bool,
    #[serde(flatten)]
    pub stats: FieldMetricStats,
}

fn summarize(comparison: &Comparison, batch_index: usize) -> BatchSummary {
    let batch = &comparison.batches()[batch_index];
    BatchSummary {
        index: batch_index,
        name: batch.name().to_string(),
        rows: batch.rows().len(),
        filtered_rows: comparison.selection(batch_index).map_or(0, |s| s.filtered_rows().len()),
    }
}

/// 比較状態からレポートを組み立てる
pub fn build_report(comparison: &Comparison, options: &ReportOptions) -> Report {
    let first_batch = &comparison.batches()[0];
    let metric_name = |metric_index: usize| {
        comparison.metrics()[metric_index]
            .field_id(first_batch)
            .map_or_else(|| format!("metric{metric_index}"), |id| id.name().to_string())
    };

    // 表示対象のメトリクス（位置, 列名）
    let shown: Vec<(usize, String)> = comparison
        .metrics()
        .iter()
        .enumerate()
        .filter(|(_, metric)| options.all_metrics || metric.enabled)
        .map(|(i, _)| (i, metric_name(i)))
        .filter(|(_, name)| options.metric_regex.as_ref().is_none_or(|re| re.is_match(name)))
        .collect();

    let reference_index = comparison.reference_index();
    let batches = (0..comparison.batches().len())
        .filter(|&i| i != reference_index)
        .filter_map(|i| {
            let selection = comparison.selection(i)?;
            let stats = selection.stats();
            Some(BatchReport {
                summary: summarize(comparison, i),
                matched_rows: selection.matches().len(),
                ambiguous_rows: selection.match_outcome().ambiguous_rows,
                metrics: shown
                    .iter()
                    .filter_map(|(metric_index, name)| {
                        Some(MetricReport {
                            field: name.clone(),
                            enabled: comparison.metrics()[*metric_index].enabled,
                            stats: *stats.get(*metric_index)?,
                        })
                    })
                    .collect(),
            })
        })
        .collect();

    let plot = comparison.plot_metrics();
    Report {
        reference: summarize(comparison, reference_index),
        plot: PlotAxes {
            x: plot.x.map(metric_name),
            y: plot.y.map(metric_name),
        },
        batches,
    }
}

// ---------------------------------------------------------------------------
// テキスト出力
// ---------------------------------------------------------------------------

pub fn write_text<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    let reference = &report.reference;
    writeln!(
        out,
        "基準バッチ: [{}] {}  行数: {}  フィルタ後: {}",
        reference.index, reference.name, reference.rows, reference.filtered_rows
    )?;
    writeln!(
        out,
        "プロット軸: x={} y={}",
        report.plot.x.as_deref().unwrap_or("-"),
        report.plot.y.as_deref().unwrap_or("-")
    )?;

    for batch in &report.batches {
        let summary = &batch.summary;
        writeln!(out)?;
        writeln!(out, "[{}] {}（比率 = このバッチ / 基準バッチ）", summary.index, summary.name)?;
        writeln!(out, "{}", "=".repeat(75))?;
        writeln!(
            out,
            "  行数: {}  フィルタ後: {}  対応: {}  曖昧で除外: {}",
            summary.rows, summary.filtered_rows, batch.matched_rows, batch.ambiguous_rows
        )?;
        if batch.metrics.is_empty() {
            writeln!(out, "  （表示するメトリクスなし）")?;
            continue;
        }
        writeln!(
            out,
            "  {:24} | {:>10} | {:>10} | {:>10} | {:>10}",
            "metric", "geomean", "min", "max", "sum ratio"
        )?;
        for metric in &batch.metrics {
            let marker = if metric.enabled { "" } else { " (off)" };
            writeln!(
                out,
                "  {:24} | {:>10.4} | {:>10.4} | {:>10.4} | {:>10.4}",
                format!("{}{}", metric.field, marker),
                metric.stats.geometric_mean,
                metric.stats.min_ratio,
                metric.stats.max_ratio,
                metric.stats.arithmetic_mean
            )?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON出力
// ---------------------------------------------------------------------------

/// 非有限の比率（0除算の `inf`、0とinfが混ざった幾何平均の `NaN`）は `null` になる
pub fn write_json<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec_compare_core::{Batch, FieldId, FieldValue, MatchPolicy};

    fn comparison() -> Comparison {
        let make = |index: usize, sizes: [f64; 2], durations: [f64; 2]| {
            Batch::from_columns(
                index,
                format!("b{index}"),
                vec![
                    FieldId::OriginalName,
                    FieldId::EncodedSize,
                    FieldId::EncodingDuration,
                    FieldId::Psnr,
                ],
                (0..2)
                    .map(|i| {
                        vec![
                            FieldValue::Text(format!("img{i}")),
                            sizes[i].into(),
                            durations[i].into(),
                            30.0.into(),
                        ]
                    })
                    .collect(),
            )
            .unwrap()
        };
        Comparison::new(
            vec![make(0, [100.0, 200.0], [1.0, 1.0]), make(1, [50.0, 100.0], [2.0, 2.0])],
            0,
            MatchPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn reports_enabled_metrics_by_default() {
        let report = build_report(&comparison(), &ReportOptions::default());
        assert_eq!(report.reference.index, 0);
        assert_eq!(report.batches.len(), 1);
        let batch = &report.batches[0];
        assert_eq!(batch.summary.index, 1);
        assert_eq!(batch.matched_rows, 2);
        assert_eq!(batch.ambiguous_rows, 0);
        let fields: Vec<&str> = batch.metrics.iter().map(|m| m.field.as_str()).collect();
        assert_eq!(fields, vec!["encoded_size", "encoding_duration"]);
        assert_eq!(batch.metrics[0].stats.arithmetic_mean, 0.5);
        assert_eq!(report.plot.x.as_deref(), Some("encoded_size"));
        assert_eq!(report.plot.y.as_deref(), Some("encoding_duration"));
    }

    #[test]
    fn all_metrics_and_regex_select_rows() {
        let options = ReportOptions {
            all_metrics: true,
            metric_regex: Some(Regex::new("^(psnr|encoded)").unwrap()),
        };
        let report = build_report(&comparison(), &options);
        let fields: Vec<(&str, bool)> = report.batches[0]
            .metrics
            .iter()
            .map(|m| (m.field.as_str(), m.enabled))
            .collect();
        assert_eq!(fields, vec![("encoded_size", true), ("psnr", false)]);
    }

    #[test]
    fn text_and_json_rendering() {
        let report = build_report(&comparison(), &ReportOptions::default());
        let mut text = Vec::new();
        write_text(&report, &mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("[1] b1"));
        assert!(text.contains("encoding_duration"));
        assert!(text.contains("2.0000"));

        let mut json = Vec::new();
        write_json(&report, &mut json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["reference"]["name"], "b0");
        assert_eq!(value["batches"][0]["matched_rows"], 2);
        let geometric_mean = value["batches"][0]["metrics"][1]["geometric_mean"].as_f64().unwrap();
        assert!((geometric_mean - 2.0).abs() < 1e-12);
        assert_eq!(value["plot"]["x"], "encoded_size");
    }
}
