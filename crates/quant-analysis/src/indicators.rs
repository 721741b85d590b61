use statrs::statistics::Statistics;

/// Mean of the last `period` values, i.e. the simple moving average as of
/// the final observation.
pub fn trailing_sma(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period {
        return None;
    }

    Some(data[data.len() - period..].mean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_trailing_sma_uses_last_window() {
        let data: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_relative_eq!(trailing_sma(&data, 4).unwrap(), 8.5, epsilon = 1e-12); // (7+8+9+10)/4
        assert_relative_eq!(trailing_sma(&data, 10).unwrap(), 5.5, epsilon = 1e-12);
    }

    #[test]
    fn test_trailing_sma_short_input() {
        assert_eq!(trailing_sma(&[1.0, 2.0], 3), None);
        assert_eq!(trailing_sma(&[1.0, 2.0], 0), None);
    }
}
