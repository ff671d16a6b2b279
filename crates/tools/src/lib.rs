//! バッチ比較ツール群の共通部分
//!
//! バッチJSONの取り込み（[`ingest`]）、TOML設定（[`config`]）、レポート出力（[`report`]）。
//! 比較の中身は `codec_compare_core` にある。

pub mod common;
pub mod config;
pub mod ingest;
pub mod report;
