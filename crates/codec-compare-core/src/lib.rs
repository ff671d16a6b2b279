//! コーデック実験バッチ比較のコア
//!
//! 1つのバッチは「エンコードしたサンプル1件 = 1行」の表で、列（field）は数値かカテゴリ値を持つ。
//! このクレートは次のパイプラインだけを扱う。
//!
//! 1. フィルタ（[`filter`]）: フィールドごとの条件で行を絞り込む
//! 2. 行マッチング（[`matcher`]）: 2つのバッチの行の対応を取る
//! 3. メトリクス統計（[`stats`]）: 対応行同士の比率を集計する
//!
//! 比較可能な列の発見は [`metric`]、再計算の順序と通知は [`comparison`] が担当する。
//! ファイルの読み込みや表示は外側（`tools` クレート）の責務。

pub mod batch;
pub mod comparison;
pub mod error;
pub mod field;
pub mod filter;
pub mod geometric_mean;
pub mod matcher;
pub mod metric;
pub mod selection;
pub mod stats;

pub use batch::Batch;
pub use comparison::{Comparison, SelectionListener};
pub use error::{CompareError, Result};
pub use field::{Field, FieldDomain, FieldId, FieldValue};
pub use filter::{FieldFilter, FilterSet, enable_default_filters, filtered_row_indices};
pub use geometric_mean::GeometricMean;
pub use matcher::{Match, MatchOutcome, MatchPolicy, match_rows};
pub use metric::{
    FieldMetric, PlotMetrics, create_metrics, enable_default_metrics, select_plot_metrics,
};
pub use selection::{BatchSelection, derive_filtered_rows, derive_matches, derive_stats};
pub use stats::{FieldMetricStats, compute_stats, get_ratio};
