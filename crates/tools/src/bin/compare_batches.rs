/// コーデック実験バッチの比較ツール
///
/// 使い方:
///   # 最初のバッチを基準に比較
///   compare_batches avif.json webp.json.gz
///
///   # 基準バッチと設定ファイルを指定
///   compare_batches --reference 1 --config compare.toml a.json b.json c.json
///
///   # JSON出力・全メトリクス表示・列名で絞り込み
///   compare_batches --json --all-metrics --metric-regex 'duration$' a.json b.json
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use codec_compare_core::Comparison;
use regex::Regex;

use tools::common::io::Output;
use tools::config::{CompareConfig, resolve_reference};
use tools::ingest::load_batch;
use tools::report::{ReportOptions, build_report, write_json, write_text};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(about = "コーデック実験バッチを基準バッチと比較する")]
struct Cli {
    /// バッチのJSONファイル（.gz 可、2つ以上。指定順にバッチ番号 0, 1, ... を振る）
    #[arg(required = true, num_args = 2..)]
    batches: Vec<PathBuf>,

    /// 比較設定（TOML）
    #[arg(long)]
    config: Option<PathBuf>,

    /// 基準バッチの番号（設定ファイルより優先、既定 0）
    #[arg(long)]
    reference: Option<usize>,

    /// JSON出力モード
    #[arg(long)]
    json: bool,

    /// 列名がマッチするメトリクスだけを表示
    #[arg(long)]
    metric_regex: Option<String>,

    /// 無効なメトリクスも表示
    #[arg(long)]
    all_metrics: bool,

    /// 出力先（`-` は標準出力、.gz は圧縮）
    #[arg(long, default_value = "-")]
    output: PathBuf,
}

// ---------------------------------------------------------------------------
// メイン処理
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    if cli.batches.len() < 2 {
        bail!("at least two batches are required");
    }

    let config = match &cli.config {
        Some(path) => CompareConfig::load(path)?,
        None => CompareConfig::default(),
    };
    let metric_regex = cli
        .metric_regex
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("invalid --metric-regex")?;

    let batches = cli
        .batches
        .iter()
        .enumerate()
        .map(|(index, path)| load_batch(index, path))
        .collect::<Result<Vec<_>>>()?;

    let reference = resolve_reference(cli.reference, &config);
    if reference >= batches.len() {
        bail!("reference batch {reference} does not exist ({} batches loaded)", batches.len());
    }
    let mut comparison = Comparison::new(batches, reference, config.match_policy())
        .context("failed to set up the comparison")?;
    config.apply(&mut comparison)?;
    log::info!(
        "{} metrics shared by all batches, reference batch {}",
        comparison.metrics().len(),
        reference
    );

    let report = build_report(
        &comparison,
        &ReportOptions {
            all_metrics: cli.all_metrics,
            metric_regex,
        },
    );

    let mut out = Output::create(&cli.output)
        .with_context(|| format!("failed to create {}", cli.output.display()))?;
    if cli.json {
        write_json(&report, &mut out)?;
    } else {
        write_text(&report, &mut out)?;
    }
    out.finish().with_context(|| format!("failed to write {}", cli.output.display()))?;
    Ok(())
}
