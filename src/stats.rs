//! Small statistical helpers shared across the binner family.

/// Sort `values` in place and return the fractile for each fraction in
/// `fractions` (each in `(0, 1)`), using nearest-rank selection: the
/// fractile for fraction `p` is `values_sorted[floor(p * len)]`.
pub fn calculate_fractiles(values: &mut Vec<f64>, fractions: &[f64]) -> Vec<f64> {
    assert!(!values.is_empty());
    values.sort_by(|a, b| a.partial_cmp(b).expect("NaN in bootstrap sample"));

    fractions
        .iter()
        .map(|&p| {
            assert!(p > 0.0 && p < 1.0);
            let pos = (p * values.len() as f64) as usize;
            values[pos.min(values.len() - 1)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractiles_of_uniform_range() {
        let mut values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let qs = calculate_fractiles(&mut values, &[0.1586553, 0.8413447]);
        assert_eq!(qs.len(), 2);
        assert!(qs[0] < qs[1]);
    }
}
