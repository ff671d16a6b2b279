//! 比較設定（TOML）
//!
//! ```toml
//! reference = 0
//!
//! [matching]
//! ignore_fields = ["encoder", "encoded_path", "effort", "quality"]
//!
//! [metrics]
//! enable = ["ssimulacra2"]
//! disable = ["decoding_duration"]
//!
//! [[filters]]
//! batch = 1
//! field = "quality"
//! min = 50.0
//! max = 90.0
//! ```
//!
//! フィルタは既定フィルタの後に [`Comparison::update_filter`] で適用する。

use std::path::Path;

use anyhow::{Context, Result, bail};
use codec_compare_core::{Comparison, FieldFilter, FieldId, MatchPolicy};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompareConfig {
    /// 基準バッチの番号（コマンドラインの指定が優先）
    pub reference: Option<usize>,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    /// 行の対応付けに使わない列。指定すると既定の除外リストを置き換える。
    pub ignore_fields: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enable: Vec<String>,
    #[serde(default)]
    pub disable: Vec<String>,
}

/// 1列分のフィルタ。数値列は `min`/`max`、カテゴリ列は `values`。
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    pub batch: usize,
    pub field: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub values: Option<Vec<String>>,
}

impl CompareConfig {
    pub fn load(path: &Path) -> Result<CompareConfig> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        CompareConfig::parse(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<CompareConfig> {
        Ok(toml::from_str(text)?)
    }

    pub fn match_policy(&self) -> MatchPolicy {
        match &self.matching.ignore_fields {
            Some(names) => MatchPolicy::new(names.iter().map(|n| FieldId::from_name(n))),
            None => MatchPolicy::default(),
        }
    }

    /// メトリクスの有効化とフィルタを比較状態に適用する
    pub fn apply(&self, comparison: &mut Comparison) -> Result<()> {
        for name in &self.metrics.enable {
            set_metric(comparison, name, true)?;
        }
        for name in &self.metrics.disable {
            set_metric(comparison, name, false)?;
        }
        for filter in &self.filters {
            apply_filter(comparison, filter)
                .with_context(|| format!("filter on batch {} field '{}'", filter.batch, filter.field))?;
        }
        Ok(())
    }
}

fn set_metric(comparison: &mut Comparison, name: &str, enabled: bool) -> Result<()> {
    let first_batch = &comparison.batches()[0];
    let metric_index = comparison
        .metrics()
        .iter()
        .position(|m| m.field_id(first_batch).is_some_and(|id| id.name() == name));
    let Some(metric_index) = metric_index else {
        bail!("'{name}' is not a metric shared by all batches");
    };
    comparison.set_metric_enabled(metric_index, enabled)?;
    log::debug!("metric '{name}' enabled={enabled}");
    Ok(())
}

fn apply_filter(comparison: &mut Comparison, config: &FilterConfig) -> Result<()> {
    let Some(batch) = comparison.batch(config.batch) else {
        bail!("unknown batch {}", config.batch);
    };
    let Some(field_index) = batch.fields().iter().position(|f| f.id().name() == config.field)
    else {
        bail!("batch {} has no field '{}'", config.batch, config.field);
    };

    let filter = match (&config.values, config.min, config.max) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            bail!("`values` cannot be combined with `min`/`max`")
        }
        (Some(values), None, None) => FieldFilter::Values {
            accepted: values.iter().cloned().collect(),
        },
        (None, None, None) => bail!("one of `min`, `max` or `values` is required"),
        (None, min, max) => {
            // 片側だけの指定は現在のフィルタ（既定フィルタ込み）の反対側を残す
            let current = comparison
                .selection(config.batch)
                .and_then(|s| s.filters().get(field_index))
                .cloned()
                .unwrap_or_else(|| FieldFilter::for_field(&batch.fields()[field_index]));
            let (start, end) = match current {
                FieldFilter::Range {
                    range_start,
                    range_end,
                } => (range_start, range_end),
                FieldFilter::Values { .. } => (f64::NEG_INFINITY, f64::INFINITY),
            };
            FieldFilter::Range {
                range_start: min.unwrap_or(start),
                range_end: max.unwrap_or(end),
            }
        }
    };
    comparison.update_filter(config.batch, field_index, filter)?;
    Ok(())
}

/// 基準バッチの番号を決める（コマンドライン > 設定 > 0）
pub fn resolve_reference(cli: Option<usize>, config: &CompareConfig) -> usize {
    cli.or(config.reference).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codec_compare_core::{Batch, CompareError, FieldValue};

    fn batch(index: usize, sizes: &[f64]) -> Batch {
        let rows = sizes
            .iter()
            .enumerate()
            .map(|(i, s)| {
                vec![
                    FieldValue::Text(format!("img{i}")),
                    (*s).into(),
                    1.0.into(),
                    "fast".into(),
                ]
            })
            .collect();
        Batch::from_columns(
            index,
            format!("b{index}"),
            vec![
                FieldId::OriginalName,
                FieldId::EncodedSize,
                FieldId::Psnr,
                FieldId::Custom("preset".to_string()),
            ],
            rows,
        )
        .unwrap()
    }

    fn comparison() -> Comparison {
        Comparison::new(
            vec![batch(0, &[10.0, 20.0, 30.0]), batch(1, &[5.0, 40.0, 60.0])],
            0,
            MatchPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn parses_full_config() {
        let config = CompareConfig::parse(
            r#"
            reference = 1

            [matching]
            ignore_fields = ["encoder", "preset"]

            [metrics]
            enable = ["psnr"]
            disable = ["encoded_size"]

            [[filters]]
            batch = 1
            field = "encoded_size"
            min = 10.0

            [[filters]]
            batch = 0
            field = "original_name"
            values = ["img0", "img1"]
            "#,
        )
        .unwrap();
        assert_eq!(config.reference, Some(1));
        assert_eq!(config.filters.len(), 2);
        let policy = config.match_policy();
        assert!(policy.ignores(&FieldId::Custom("preset".to_string())));
        assert!(!policy.ignores(&FieldId::Quality));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = CompareConfig::parse("").unwrap();
        assert_eq!(resolve_reference(None, &config), 0);
        assert_eq!(resolve_reference(Some(2), &config), 2);
        assert_eq!(config.match_policy(), MatchPolicy::default());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(CompareConfig::parse("referense = 1").is_err());
    }

    #[test]
    fn applies_metrics_and_filters() {
        let config = CompareConfig::parse(
            r#"
            [metrics]
            enable = ["psnr"]
            disable = ["encoded_size"]

            [[filters]]
            batch = 1
            field = "encoded_size"
            max = 50.0

            [[filters]]
            batch = 0
            field = "original_name"
            values = ["img0", "img1"]
            "#,
        )
        .unwrap();
        let mut comparison = comparison();
        config.apply(&mut comparison).unwrap();

        let enabled: Vec<bool> = comparison.metrics().iter().map(|m| m.enabled).collect();
        assert_eq!(enabled, vec![false, true]);

        // min は現在のフィルタのまま
        assert_eq!(
            comparison.selection(1).unwrap().filters().get(1),
            Some(&FieldFilter::Range {
                range_start: 5.0,
                range_end: 50.0
            })
        );
        assert_eq!(comparison.selection(1).unwrap().filtered_rows(), &[0, 1]);
        assert_eq!(comparison.selection(0).unwrap().filtered_rows(), &[0, 1]);
        assert_eq!(comparison.matches_with_reference(1).unwrap().len(), 2);
    }

    #[test]
    fn unknown_names_are_errors() {
        let mut comparison = comparison();
        for text in [
            "[metrics]\nenable = [\"ssim\"]",
            "[[filters]]\nbatch = 5\nfield = \"encoded_size\"\nmin = 1.0",
            "[[filters]]\nbatch = 0\nfield = \"quality\"\nmin = 1.0",
            "[[filters]]\nbatch = 0\nfield = \"encoded_size\"",
            "[[filters]]\nbatch = 0\nfield = \"encoded_size\"\nmin = 1.0\nvalues = [\"1\"]",
        ] {
            let config = CompareConfig::parse(text).unwrap();
            assert!(config.apply(&mut comparison).is_err(), "{text}");
        }
    }

    #[test]
    fn range_on_categorical_field_is_a_kind_mismatch() {
        let mut comparison = comparison();
        let config =
            CompareConfig::parse("[[filters]]\nbatch = 0\nfield = \"preset\"\nmin = 1.0").unwrap();
        let err = config.apply(&mut comparison).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CompareError>(),
            Some(&CompareError::FilterKindMismatch { field: 3 })
        );
    }
}
