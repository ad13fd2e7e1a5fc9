//! P-value calculation from test statistics

use statrs::function::erf::erfc;

/// Two-sided p-value of a standard normal statistic
pub fn calculate_pvalue(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    // 2 * P(Z > |z|) = erfc(|z| / sqrt(2))
    erfc(z.abs() / std::f64::consts::SQRT_2).min(1.0)
}
