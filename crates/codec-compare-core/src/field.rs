//! フィールド（列）のメタデータ
//!
//! フィールドは意味的なID（[`FieldId`]）と値域（[`FieldDomain`]）を持つ。
//! バッチ間の比較可能性はIDと数値かどうかだけで決まり、観測された値域は関係しない。

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

/// フィールドの意味的ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldId {
    OriginalPath,
    OriginalName,
    Width,
    Height,
    FrameCount,
    Megapixels,
    Encoder,
    EncodedPath,
    EncodedSize,
    EncodedBitsPerPixel,
    EncodingDuration,
    DecodingDuration,
    RawDecodingDuration,
    Effort,
    Quality,
    ChromaSubsampling,
    Psnr,
    Ssim,
    Dssim,
    Msssim,
    Butteraugli,
    Ssimulacra,
    Ssimulacra2,
    /// 既知のIDに該当しない列（名前で識別する）
    Custom(String),
}

impl FieldId {
    /// 列名からIDを得る。未知の名前は `Custom` になる。
    pub fn from_name(name: &str) -> FieldId {
        match name {
            "original_path" => FieldId::OriginalPath,
            "original_name" => FieldId::OriginalName,
            "width" => FieldId::Width,
            "height" => FieldId::Height,
            "frame_count" => FieldId::FrameCount,
            "megapixels" => FieldId::Megapixels,
            "encoder" => FieldId::Encoder,
            "encoded_path" => FieldId::EncodedPath,
            "encoded_size" => FieldId::EncodedSize,
            "encoded_bits_per_pixel" => FieldId::EncodedBitsPerPixel,
            "encoding_duration" => FieldId::EncodingDuration,
            "decoding_duration" => FieldId::DecodingDuration,
            "raw_decoding_duration" => FieldId::RawDecodingDuration,
            "effort" => FieldId::Effort,
            "quality" => FieldId::Quality,
            "chroma_subsampling" => FieldId::ChromaSubsampling,
            "psnr" => FieldId::Psnr,
            "ssim" => FieldId::Ssim,
            "dssim" => FieldId::Dssim,
            "msssim" => FieldId::Msssim,
            "butteraugli" => FieldId::Butteraugli,
            "ssimulacra" => FieldId::Ssimulacra,
            "ssimulacra2" => FieldId::Ssimulacra2,
            other => FieldId::Custom(other.to_string()),
        }
    }

    /// 列名
    pub fn name(&self) -> &str {
        match self {
            FieldId::OriginalPath => "original_path",
            FieldId::OriginalName => "original_name",
            FieldId::Width => "width",
            FieldId::Height => "height",
            FieldId::FrameCount => "frame_count",
            FieldId::Megapixels => "megapixels",
            FieldId::Encoder => "encoder",
            FieldId::EncodedPath => "encoded_path",
            FieldId::EncodedSize => "encoded_size",
            FieldId::EncodedBitsPerPixel => "encoded_bits_per_pixel",
            FieldId::EncodingDuration => "encoding_duration",
            FieldId::DecodingDuration => "decoding_duration",
            FieldId::RawDecodingDuration => "raw_decoding_duration",
            FieldId::Effort => "effort",
            FieldId::Quality => "quality",
            FieldId::ChromaSubsampling => "chroma_subsampling",
            FieldId::Psnr => "psnr",
            FieldId::Ssim => "ssim",
            FieldId::Dssim => "dssim",
            FieldId::Msssim => "msssim",
            FieldId::Butteraugli => "butteraugli",
            FieldId::Ssimulacra => "ssimulacra",
            FieldId::Ssimulacra2 => "ssimulacra2",
            FieldId::Custom(name) => name,
        }
    }

    /// 入力画像の寸法（結果ではなく入力）
    pub fn is_source_dimension(&self) -> bool {
        matches!(
            self,
            FieldId::Width | FieldId::Height | FieldId::FrameCount | FieldId::Megapixels
        )
    }

    /// エンコーダの設定値（測定結果ではない）
    pub fn is_encoder_setting(&self) -> bool {
        matches!(self, FieldId::Effort | FieldId::Quality)
    }

    /// エンコード結果の測定値（サイズ・時間・画質スコア）
    ///
    /// 行ごとに異なるのが前提の値で、行の対応付けのキーにはならない。
    pub fn is_measured_outcome(&self) -> bool {
        matches!(
            self,
            FieldId::EncodedSize
                | FieldId::EncodedBitsPerPixel
                | FieldId::EncodingDuration
                | FieldId::DecodingDuration
                | FieldId::RawDecodingDuration
                | FieldId::Psnr
                | FieldId::Ssim
                | FieldId::Dssim
                | FieldId::Msssim
                | FieldId::Butteraugli
                | FieldId::Ssimulacra
                | FieldId::Ssimulacra2
        )
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// セルの値
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// 数値なら値を返す
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    /// カテゴリ値としての表現（数値は `Display` 表記）
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Number(v) => Cow::Owned(v.to_string()),
            FieldValue::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

/// フィールドの値域
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDomain {
    /// 数値列: 観測された最小値と最大値
    Numeric { range_start: f64, range_end: f64 },
    /// カテゴリ列: 観測された値の集合
    Categorical { unique_values: BTreeSet<String> },
}

/// 1列分のメタデータ。バッチ読み込み後は不変。
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    id: FieldId,
    domain: FieldDomain,
}

impl Field {
    pub fn new(id: FieldId, domain: FieldDomain) -> Field {
        Field { id, domain }
    }

    /// 列の値から値域を求めてフィールドを作る。
    ///
    /// 全ての値が数値なら数値列、1つでも文字列があればカテゴリ列になる。
    /// 数値列の範囲計算ではNaNを無視する。空の列は範囲 `[0, 0]` の数値列。
    pub fn observe<'a, I>(id: FieldId, column: I) -> Field
    where
        I: IntoIterator<Item = &'a FieldValue>,
    {
        let values: Vec<&FieldValue> = column.into_iter().collect();
        let is_number = values.iter().all(|v| v.as_number().is_some());

        let domain = if is_number {
            let mut range_start = f64::INFINITY;
            let mut range_end = f64::NEG_INFINITY;
            for v in values.iter().filter_map(|v| v.as_number()) {
                range_start = range_start.min(v);
                range_end = range_end.max(v);
            }
            if range_start > range_end {
                range_start = 0.0;
                range_end = 0.0;
            }
            FieldDomain::Numeric { range_start, range_end }
        } else {
            let unique_values = values.iter().map(|v| v.to_text().into_owned()).collect();
            FieldDomain::Categorical { unique_values }
        };
        Field { id, domain }
    }

    #[inline]
    pub fn id(&self) -> &FieldId {
        &self.id
    }

    #[inline]
    pub fn domain(&self) -> &FieldDomain {
        &self.domain
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self.domain, FieldDomain::Numeric { .. })
    }

    /// 他バッチのフィールドと比較可能か（IDと数値かどうかが一致）
    pub fn is_comparable_to(&self, other: &Field) -> bool {
        self.id == other.id && self.is_number() == other.is_number()
    }
}
