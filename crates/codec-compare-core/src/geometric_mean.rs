//! 幾何平均の逐次計算
//!
//! 積を直接取るとすぐにオーバーフロー・アンダーフローするので、対数の和で保持する。
//! 0 を加えると `ln(0) = -inf` となり結果は 0、`+inf` を加えると結果は `+inf` になる。
//! 0 と `+inf` の両方を加えた場合は NaN（積が定義できない）。

/// 非負の値の幾何平均
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GeometricMean {
    log_sum: f64,
    count: usize,
}

impl GeometricMean {
    pub const fn new() -> Self {
        Self {
            log_sum: 0.0,
            count: 0,
        }
    }

    /// 値を1つ加える
    #[inline]
    pub fn add(&mut self, value: f64) {
        self.log_sum += value.ln();
        self.count += 1;
    }

    /// 加えた値の数
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// 現在の幾何平均。値が1つもなければ 1。
    pub fn get(&self) -> f64 {
        if self.count == 0 {
            return 1.0;
        }
        (self.log_sum / self.count as f64).exp()
    }
}

impl Extend<f64> for GeometricMean {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}
