//! Volatility statistics behind the IV rank / IV percentile columns.
//!
//! All functions here are pure: one year of daily closes comes in from the
//! provider, and the rolling historical-volatility series derived from it
//! contextualizes the day's implied volatility. Units follow the sheet
//! convention: the HV series is in annualized fractions (0.25 = 25%), the
//! current IV argument is in percent.

/// Rolling window, in trading sessions, for the historical-volatility series.
pub const ROLLING_WINDOW: usize = 30;

/// Annualization factor for daily returns.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Daily log returns of a close series. Non-positive closes are skipped since
/// their ratio has no logarithm.
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|pair| pair[0] > 0.0 && pair[1] > 0.0)
        .map(|pair| (pair[1] / pair[0]).ln())
        .collect()
}

/// Rolling annualized volatility over a return series.
///
/// Each output value is the standard deviation of `window` consecutive
/// returns scaled by the square root of the trading year. Returns an empty
/// series when there are fewer returns than the window.
pub fn rolling_annualized_volatility(returns: &[f64], window: usize) -> Vec<f64> {
    let n = returns.len();
    if window == 0 || n < window {
        return Vec::new();
    }
    let annualize = TRADING_DAYS_PER_YEAR.sqrt();
    (0..=n - window)
        .map(|i| {
            let end = i + window;
            rust_ti::basic_indicators::single::standard_deviation(&returns[i..end]) * annualize
        })
        .collect()
}

/// IV rank: where today's IV sits between the year's volatility low and high.
///
/// `history` is the annualized HV series in fractions; `current_iv` is in
/// percent. Undefined when the series is empty or flat.
pub fn iv_rank(history: &[f64], current_iv: f64) -> Option<f64> {
    let high = history.iter().copied().fold(f64::NAN, f64::max) * 100.0;
    let low = history.iter().copied().fold(f64::NAN, f64::min) * 100.0;
    if !high.is_finite() || !low.is_finite() || high <= low {
        return None;
    }
    Some((current_iv - low) / (high - low) * 100.0)
}

/// IV percentile: share of the year's volatility observations strictly below
/// today's IV. Undefined when the series is empty.
pub fn iv_percentile(history: &[f64], current_iv: f64) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let below = history.iter().filter(|&&hv| hv * 100.0 < current_iv).count();
    Some(below as f64 / history.len() as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_returns_of_constant_series_are_zero() {
        let returns = log_returns(&[100.0; 5]);
        assert_eq!(returns.len(), 4);
        assert!(returns.iter().all(|r| r.abs() < 1e-12));
    }

    #[test]
    fn log_returns_match_known_ratio() {
        let returns = log_returns(&[100.0, 110.0]);
        assert_eq!(returns.len(), 1);
        assert!((returns[0] - 1.1_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn log_returns_skip_non_positive_closes() {
        let returns = log_returns(&[100.0, 0.0, 110.0]);
        assert!(returns.is_empty());
    }

    #[test]
    fn rolling_volatility_insufficient_data() {
        let returns = vec![0.01; 10];
        assert!(rolling_annualized_volatility(&returns, 30).is_empty());
    }

    #[test]
    fn rolling_volatility_of_constant_returns_is_zero() {
        let returns = vec![0.01; 40];
        let hv = rolling_annualized_volatility(&returns, 30);
        assert_eq!(hv.len(), 11);
        assert!(hv.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn rolling_volatility_annualizes_the_window_deviation() {
        // Alternating returns have a deterministic standard deviation.
        let returns: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 0.01 } else { -0.01 }).collect();
        let hv = rolling_annualized_volatility(&returns, 30);
        assert_eq!(hv.len(), 1);
        let expected = rust_ti::basic_indicators::single::standard_deviation(&returns)
            * TRADING_DAYS_PER_YEAR.sqrt();
        assert!((hv[0] - expected).abs() < 1e-12);
        assert!(hv[0] > 0.0);
    }

    #[test]
    fn iv_rank_midpoint() {
        // Year range 10%..30%, today at 20% -> rank 50.
        let history = vec![0.10, 0.30];
        assert_eq!(iv_rank(&history, 20.0), Some(50.0));
    }

    #[test]
    fn iv_rank_undefined_for_flat_or_empty_series() {
        assert_eq!(iv_rank(&[0.25, 0.25], 25.0), None);
        assert_eq!(iv_rank(&[], 25.0), None);
    }

    #[test]
    fn iv_percentile_counts_strictly_below() {
        let history = vec![0.10, 0.20, 0.30, 0.40];
        assert_eq!(iv_percentile(&history, 25.0), Some(50.0));
        assert_eq!(iv_percentile(&history, 5.0), Some(0.0));
        assert_eq!(iv_percentile(&history, 45.0), Some(100.0));
    }

    #[test]
    fn iv_percentile_undefined_for_empty_series() {
        assert_eq!(iv_percentile(&[], 25.0), None);
    }
}
