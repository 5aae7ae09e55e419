/// Delay before the next long-poll attempt after `consecutive_failures` failed ones.
pub(crate) fn retry_delay_seconds(
    base_seconds: u64,
    max_seconds: u64,
    consecutive_failures: u32,
) -> u64 {
    if consecutive_failures <= 1 {
        return base_seconds.min(max_seconds);
    }

    let exponent = consecutive_failures.saturating_sub(1).min(20);
    let multiplier = 1_u64 << exponent;

    base_seconds.saturating_mul(multiplier).min(max_seconds)
}
