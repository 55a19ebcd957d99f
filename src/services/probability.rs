/// Tenths per unit: results carry one decimal place.
const SCALE: u32 = 10;

/// Rescale non-negative weights into probabilities with one decimal that
/// add up to exactly 1.0.
///
/// Uses largest-remainder rounding: every share is floored to a tenth, and
/// the tenths left over go to the shares with the biggest fractional parts
/// (earlier entries win ties). Returns `None` for empty input, all-zero
/// input, or any negative or non-finite weight.
pub fn normalize_distribution(weights: &[f64]) -> Option<Vec<f64>> {
    if weights.is_empty() || weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }

    let shares: Vec<f64> = weights.iter().map(|w| w / total * SCALE as f64).collect();
    let mut units: Vec<u32> = shares.iter().map(|s| s.floor() as u32).collect();

    let assigned: u32 = units.iter().sum();
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| {
        let frac_a = shares[a] - shares[a].floor();
        let frac_b = shares[b] - shares[b].floor();
        frac_b.total_cmp(&frac_a).then(a.cmp(&b))
    });
    for &i in order.iter().take(SCALE.saturating_sub(assigned) as usize) {
        units[i] += 1;
    }

    Some(units.into_iter().map(|u| u as f64 / SCALE as f64).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_in_tenths(values: &[f64]) -> i64 {
        values.iter().map(|v| (v * 10.0).round() as i64).sum()
    }

    #[test]
    fn test_already_normalised() {
        assert_eq!(normalize_distribution(&[0.2, 0.3, 0.5]), Some(vec![0.2, 0.3, 0.5]));
    }

    #[test]
    fn test_thirds_sum_to_one() {
        let out = normalize_distribution(&[1.0, 1.0, 1.0]).unwrap();
        assert_eq!(out, vec![0.4, 0.3, 0.3]);
        assert_eq!(sum_in_tenths(&out), 10);
    }

    #[test]
    fn test_unnormalised_weights() {
        // 0.5 / 0.4 / 0.4 sums to 1.3
        let out = normalize_distribution(&[0.5, 0.4, 0.4]).unwrap();
        assert_eq!(sum_in_tenths(&out), 10);
        assert!(out[0] >= out[1]);
        assert!((out.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_various_vectors_always_sum_to_one() {
        let cases: [&[f64]; 5] = [
            &[0.7, 0.2, 0.2],
            &[3.0, 0.0, 0.0],
            &[0.01, 0.01, 0.98],
            &[0.15, 0.15, 0.15, 0.55],
            &[2.0, 7.0],
        ];
        for case in cases {
            let out = normalize_distribution(case).unwrap();
            assert_eq!(out.len(), case.len());
            assert_eq!(sum_in_tenths(&out), 10, "{:?} -> {:?}", case, out);
        }
    }

    #[test]
    fn test_degenerate_input() {
        assert_eq!(normalize_distribution(&[]), None);
        assert_eq!(normalize_distribution(&[0.0, 0.0]), None);
        assert_eq!(normalize_distribution(&[0.5, -0.1]), None);
        assert_eq!(normalize_distribution(&[f64::NAN, 1.0]), None);
    }
}
