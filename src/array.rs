//! A small one-dimensional numeric array kernel.
//!
//! The original Muninn core is built on an N-dimensional array library
//! (`TArray`); this crate only ever binds energy to a one-dimensional
//! reaction coordinate (`spec.md` Non-goals), so the kernel here is
//! specialized to 1-D vectors. It still provides the full required surface:
//! element-wise arithmetic, shape/extend operations, boolean-mask iteration,
//! and a numerically stable log-sum-exp.
#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

/// An array of reals, indexed by bin.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct DArray(pub Vec<f64>);

/// An array of non-negative observation counts, indexed by bin.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct CArray(pub Vec<u64>);

/// An array of booleans, indexed by bin (used for support masks).
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
pub struct BArray(pub Vec<bool>);

macro_rules! impl_array_common {
    ($t:ty, $elem:ty) => {
        impl $t {
            /// Build a new array of the given length, filled with `fill`.
            pub fn filled(len: usize, fill: $elem) -> Self {
                Self(vec![fill; len])
            }

            /// Number of elements.
            pub fn len(&self) -> usize {
                self.0.len()
            }

            /// True if the array holds no elements.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Shape (a 1-element vector, since this kernel is 1-D only).
            pub fn shape(&self) -> Vec<usize> {
                vec![self.0.len()]
            }

            /// Pad the array on both ends, filling new entries with `fill`.
            pub fn extended(&self, add_under: usize, add_over: usize, fill: $elem) -> Self {
                let mut out = Vec::with_capacity(self.0.len() + add_under + add_over);
                out.resize(add_under, fill);
                out.extend_from_slice(&self.0);
                out.resize(out.len() + add_over, fill);
                Self(out)
            }
        }

        impl std::ops::Index<usize> for $t {
            type Output = $elem;
            fn index(&self, i: usize) -> &$elem {
                &self.0[i]
            }
        }

        impl std::ops::IndexMut<usize> for $t {
            fn index_mut(&mut self, i: usize) -> &mut $elem {
                &mut self.0[i]
            }
        }
    };
}

impl_array_common!(DArray, f64);
impl_array_common!(CArray, u64);
impl_array_common!(BArray, bool);

impl DArray {
    /// Build a new, zero-filled array.
    pub fn zeros(len: usize) -> Self {
        Self::filled(len, 0.0)
    }

    /// Sum of all elements.
    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Indices where `mask` is true.
    pub fn where_true<'a>(mask: &'a BArray) -> impl Iterator<Item = usize> + 'a {
        mask.0
            .iter()
            .enumerate()
            .filter_map(|(i, &b)| if b { Some(i) } else { None })
    }

    /// `argmax` restricted to the bins where `mask` is true. Returns `None`
    /// if no bin is masked in.
    pub fn arg_max_where(&self, mask: &BArray) -> Option<usize> {
        DArray::where_true(mask)
            .fold(None, |best: Option<usize>, i| match best {
                None => Some(i),
                Some(b) if self.0[i] > self.0[b] => Some(i),
                Some(b) => Some(b),
            })
    }
}

impl CArray {
    /// Build a new, zero-filled array.
    pub fn zeros(len: usize) -> Self {
        Self::filled(len, 0)
    }

    /// Sum of all elements.
    pub fn sum(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Element-wise `self >= min_count`.
    pub fn at_least(&self, min_count: u64) -> BArray {
        BArray(self.0.iter().map(|&n| n >= min_count).collect())
    }

    /// Sum restricted to the bins where `mask` is true.
    pub fn sum_where(&self, mask: &BArray) -> u64 {
        self.0
            .iter()
            .zip(mask.0.iter())
            .filter(|&(_, &m)| m)
            .map(|(&n, _)| n)
            .sum()
    }
}

impl BArray {
    /// Build a new, all-false array.
    pub fn falses(len: usize) -> Self {
        Self::filled(len, false)
    }

    /// Number of `true` entries.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }

    /// Element-wise OR, in place.
    pub fn or_assign(&mut self, other: &BArray) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a = *a || *b;
        }
    }

    /// Element-wise AND.
    pub fn and(&self, other: &BArray) -> BArray {
        BArray(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(&a, &b)| a && b)
                .collect(),
        )
    }

    /// Element-wise AND-NOT (`self && !other`).
    pub fn and_not(&self, other: &BArray) -> BArray {
        BArray(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(&a, &b)| a && !b)
                .collect(),
        )
    }
}

/// Numerically stable `ln(sum(exp(x_i)))`.
///
/// Subtracts the running maximum before exponentiating, so the result is
/// accurate even when entries differ by hundreds of orders of magnitude.
/// Returns `f64::NEG_INFINITY` for an empty slice or a slice that is
/// entirely `NEG_INFINITY` (i.e. "no support").
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|&x| (x - max).exp()).sum();
    max + sum.ln()
}

/// `log_sum_exp` of exactly two values, used by the `1/k` prefix recursion.
pub fn log_sum_exp2(a: f64, b: f64) -> f64 {
    if !a.is_finite() && !b.is_finite() {
        return f64::NEG_INFINITY;
    }
    if a > b {
        a + (1.0 + (b - a).exp()).ln()
    } else {
        b + (1.0 + (a - b).exp()).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sum_exp_empty_is_neg_infinity() {
        assert_eq!(log_sum_exp(&[]), f64::NEG_INFINITY);
    }

    #[test]
    fn log_sum_exp_shift_invariance() {
        let xs = [1.0_f64, 2.0, -3.0, 0.5];
        let c = 37.125;
        let shifted: Vec<f64> = xs.iter().map(|&x| x + c).collect();
        let lhs = log_sum_exp(&shifted);
        let rhs = log_sum_exp(&xs) + c;
        assert!((lhs - rhs).abs() < 1e-10);
    }

    #[test]
    fn log_sum_exp_at_least_max() {
        let xs = [1.0_f64, 5.0, -3.0, 0.5];
        let m = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(log_sum_exp(&xs) >= m);
    }

    #[test]
    fn log_sum_exp2_matches_general() {
        let a = 3.2;
        let b = -1.1;
        assert!((log_sum_exp2(a, b) - log_sum_exp(&[a, b])).abs() < 1e-12);
    }

    #[test]
    fn extend_pads_with_fill() {
        let arr = CArray(vec![1, 2, 3]);
        let extended = arr.extended(2, 1, 0);
        assert_eq!(extended.0, vec![0, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn arg_max_where_restricted_to_mask() {
        let d = DArray(vec![1.0, 9.0, 2.0, 8.0]);
        let mask = BArray(vec![true, false, true, true]);
        assert_eq!(d.arg_max_where(&mask), Some(3));
    }
}
