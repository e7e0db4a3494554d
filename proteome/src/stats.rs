use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Discrete, Hypergeometric, Normal};
use statrs::function::erf::erfc;

/// Cumulative probabilities of the -1σ, median and +1σ reference points
pub const QUANTILES: [f64; 3] = [0.1587, 0.5, 0.8413];

/// Relative tolerance used when comparing table probabilities
const FISHER_TOLERANCE: f64 = 1e-7;

#[inline]
pub fn mean(slice: &[f64]) -> f64 {
    slice.iter().sum::<f64>() / slice.len() as f64
}

/// Calculate the sample (n - 1) standard deviation of a slice. `NaN` for
/// fewer than two values
#[inline]
pub fn stddev(slice: &[f64]) -> f64 {
    if slice.len() < 2 {
        return f64::NAN;
    }
    let mean = mean(slice);
    let ss = slice.iter().fold(0.0, |acc, x| acc + (x - mean).powi(2));
    (ss / (slice.len() - 1) as f64).sqrt()
}

/// Upper tail probability of the standard normal at `z`
#[inline]
pub fn upper_tail(z: f64) -> f64 {
    erfc(z / std::f64::consts::SQRT_2) / 2.0
}

/// Inverse CDF of N(mean, std) at each of [`QUANTILES`].
///
/// Returns `None` when the distribution is undefined (`std <= 0` or not
/// finite).
pub fn normal_quantiles(mean: f64, std: f64) -> Option<[f64; 3]> {
    if !(std > 0.0) || !std.is_finite() || !mean.is_finite() {
        return None;
    }
    let n = Normal::new(mean, std).ok()?;
    Some([
        n.inverse_cdf(QUANTILES[0]),
        n.inverse_cdf(QUANTILES[1]),
        n.inverse_cdf(QUANTILES[2]),
    ])
}

/// 2x2 contingency table
///
/// ```text
///                  in term   not in term
/// significant         a           b
/// not significant     c           d
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Contingency {
    pub a: u64,
    pub b: u64,
    pub c: u64,
    pub d: u64,
}

impl Contingency {
    /// Build the table for a term with `term_significant` significant
    /// proteins out of `term_proteins`, given the table-wide totals
    pub fn new(term_significant: u64, term_proteins: u64, total_significant: u64, total: u64) -> Self {
        let a = term_significant;
        let b = total_significant.saturating_sub(a);
        let c = term_proteins.saturating_sub(a);
        let d = total.saturating_sub(a + b + c);
        Contingency { a, b, c, d }
    }

    pub fn total(&self) -> u64 {
        self.a + self.b + self.c + self.d
    }

    /// Two-sided Fisher's exact test: the summed probability of every table
    /// with the same margins that is no more likely than this one
    pub fn fisher_exact(&self) -> f64 {
        let population = self.total();
        let successes = self.a + self.b;
        let draws = self.a + self.c;
        if population == 0 {
            return 1.0;
        }

        let dist = match Hypergeometric::new(population, successes, draws) {
            Ok(d) => d,
            Err(_) => return f64::NAN,
        };

        let lo = (successes + draws).saturating_sub(population);
        let hi = successes.min(draws);
        // log space keeps large tables from overflowing the binomials
        let cutoff = dist.ln_pmf(self.a) + FISHER_TOLERANCE.ln_1p();

        let p = (lo..=hi)
            .map(|x| dist.ln_pmf(x))
            .filter(|lp| *lp <= cutoff)
            .map(f64::exp)
            .sum::<f64>();
        p.min(1.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn moments() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&v), 5.0);
        assert!(close(stddev(&v), (32.0f64 / 7.0).sqrt()));
        assert!(stddev(&[1.0]).is_nan());
    }

    #[test]
    fn tail() {
        assert!((upper_tail(0.0) - 0.5).abs() < 1e-15);
        assert!((upper_tail(1.0) - 0.15865525393145707).abs() < 1e-10);
        assert!((upper_tail(1.959963984540054) - 0.025).abs() < 1e-10);
    }

    #[test]
    fn quantiles() {
        let q = normal_quantiles(1.0, 2.0).unwrap();
        assert!((q[1] - 1.0).abs() < 1e-9);
        // 0.1587 / 0.8413 sit within a hair of one standard deviation
        assert!((q[0] - -1.0).abs() < 1e-3);
        assert!((q[2] - 3.0).abs() < 1e-3);
        assert!(q[0] < q[1] && q[1] < q[2]);
        assert!(normal_quantiles(0.0, 0.0).is_none());
        assert!(normal_quantiles(0.0, f64::NAN).is_none());
    }

    #[test]
    fn fisher() {
        let t = Contingency {
            a: 1,
            b: 9,
            c: 11,
            d: 3,
        };
        assert!(close(t.fisher_exact(), 0.002759456185220088));

        let t = Contingency {
            a: 5,
            b: 0,
            c: 0,
            d: 5,
        };
        assert!(close(t.fisher_exact(), 2.0 / 252.0));

        // Margins fixing a single possible table
        let t = Contingency {
            a: 3,
            b: 0,
            c: 0,
            d: 0,
        };
        assert!(close(t.fisher_exact(), 1.0));
    }

    #[test]
    fn large_table() {
        let t = Contingency::new(30, 60, 400, 5000);
        let p = t.fisher_exact();
        assert!(p.is_finite());
        assert!(p > 0.0 && p < 1e-10);
    }

    #[test]
    fn contingency_sums() {
        let t = Contingency::new(4, 10, 50, 1000);
        assert_eq!(t, Contingency { a: 4, b: 46, c: 6, d: 944 });
        assert_eq!(t.total(), 1000);
        assert_eq!(t.a + t.b, 50);
        assert_eq!(t.a + t.c, 10);
    }
}
