use rust_decimal::Decimal;

/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: Decimal = prices.iter().rev().take(period).sum();
    Some(sum / Decimal::from(period))
}

/// Sample variance (denominator `n - 1`) of the last `period` prices around `mean`
pub fn sample_variance(prices: &[Decimal], period: usize, mean: Decimal) -> Option<Decimal> {
    if period < 2 || prices.len() < period {
        return None;
    }

    let sum_sq: Decimal = prices
        .iter()
        .rev()
        .take(period)
        .map(|p| {
            let diff = *p - mean;
            diff * diff
        })
        .sum();

    Some(sum_sq / Decimal::from(period - 1))
}
