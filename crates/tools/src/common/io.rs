//! バッチファイルとレポート出力のI/O（gzip・標準入出力対応）
//!
//! パス `-` は標準入力／標準出力、拡張子 `.gz` は gzip として扱う。

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

const INPUT_BUF_CAP: usize = 128 * 1024; // 128 KiB

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

/// 入力を開く。`.gz` は透過的に展開する。
pub fn open_input(path: &Path) -> io::Result<Box<dyn BufRead>> {
    if is_stdio(path) {
        return Ok(Box::new(BufReader::with_capacity(INPUT_BUF_CAP, io::stdin())));
    }
    let file = File::open(path)?;
    if is_gzip(path) {
        return Ok(Box::new(BufReader::with_capacity(INPUT_BUF_CAP, GzDecoder::new(file))));
    }
    Ok(Box::new(BufReader::with_capacity(INPUT_BUF_CAP, file)))
}

/// 入力全体を文字列として読む
pub fn read_input(path: &Path) -> io::Result<String> {
    let mut text = String::new();
    open_input(path)?.read_to_string(&mut text)?;
    Ok(text)
}

/// レポートの出力先。gzip の終端を書くため [`Output::finish`] で閉じる。
#[must_use = "call .finish() to propagate compression/IO errors"]
pub enum Output {
    Stdout(io::Stdout),
    File(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Output {
    /// 出力先を作る。既存ファイルは上書きする。
    pub fn create(path: &Path) -> io::Result<Output> {
        if is_stdio(path) {
            return Ok(Output::Stdout(io::stdout()));
        }
        let file = BufWriter::new(File::create(path)?);
        if is_gzip(path) {
            return Ok(Output::Gzip(GzEncoder::new(file, Compression::default())));
        }
        Ok(Output::File(file))
    }

    /// ストリームを閉じて書き出しエラーを返す
    pub fn finish(self) -> io::Result<()> {
        match self {
            Output::Stdout(mut out) => out.flush(),
            Output::File(mut file) => file.flush(),
            Output::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(out) => out.write(buf),
            Output::File(file) => file.write(buf),
            Output::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(out) => out.flush(),
            Output::File(file) => file.flush(),
            Output::Gzip(encoder) => encoder.flush(),
        }
    }
}
