//! Intensity-binned significance estimation ("Significance B")
//!
//! For each sample, quantified protein groups are ranked by intensity and
//! cut into contiguous bins. A normal distribution fitted to each bin's
//! log-ratios gives the -1σ, median and +1σ reference points, and each
//! log-ratio is scored against the half of the distribution it falls in.
//! This keeps the estimate robust to skewed ratio distributions.
use super::*;
use rayon::prelude::*;
use std::ops::Range;

/// Significance estimation parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Significance {
    /// Proteins per intensity bin
    pub bin_size: usize,
    /// A protein is significant if any sample's p-value is at or below this
    pub p_value: f64,
}

impl Default for Significance {
    fn default() -> Self {
        Significance {
            bin_size: 300,
            p_value: 0.05,
        }
    }
}

/// Split `len` ranked items into contiguous bins of `bin_size`, with the
/// last bin absorbing the remainder
pub fn partition(len: usize, bin_size: usize) -> Vec<Range<usize>> {
    if len == 0 || bin_size == 0 {
        return Vec::new();
    }
    let count = (len / bin_size).max(1);
    (0..count)
        .map(|i| {
            let end = if i + 1 == count { len } else { (i + 1) * bin_size };
            i * bin_size..end
        })
        .collect()
}

/// Normal fit over one intensity bin
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Bin {
    /// Table rows in this bin, ascending by intensity
    pub rows: Vec<usize>,
    pub mean: f64,
    pub std: f64,
    /// `[r_-1, r_0, r_1]`, `None` if the fit is degenerate
    pub quantiles: Option<[f64; 3]>,
}

impl Bin {
    pub fn fit(rows: Vec<usize>, values: &[f64]) -> Bin {
        let mean = stats::mean(values);
        let std = stats::stddev(values);
        Bin {
            rows,
            mean,
            std,
            quantiles: stats::normal_quantiles(mean, std),
        }
    }

    /// Zero or undefined spread; every p-value in the bin is `NaN`
    pub fn is_degenerate(&self) -> bool {
        self.quantiles.is_none()
    }

    /// Distance from the median in units of the half-distribution it lies in
    pub fn z_score(&self, x: f64) -> f64 {
        match self.quantiles {
            Some([_, mid, hi]) if x > mid => (x - mid) / (hi - mid),
            Some([lo, mid, _]) => (mid - x) / (mid - lo),
            None => f64::NAN,
        }
    }

    pub fn p_value(&self, x: f64) -> f64 {
        let z = self.z_score(x);
        if z.is_nan() {
            return f64::NAN;
        }
        stats::upper_tail(z)
    }
}

/// Per-sample output of the estimator
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SampleSignificance {
    pub sample: String,
    pub bins: Vec<Bin>,
    /// One slot per table row; `None` where the row has no log-ratio
    pub p_values: Vec<Option<f64>>,
}

/// p-value bands used to grade results
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PClass {
    /// p > 0.05, or undefined
    NotSignificant,
    /// 0.01 < p <= 0.05
    P05,
    /// 0.001 < p <= 0.01
    P01,
    /// p <= 0.001
    P001,
}

impl PClass {
    pub fn from_p(p: f64) -> PClass {
        if p <= 0.001 {
            PClass::P001
        } else if p <= 0.01 {
            PClass::P01
        } else if p <= 0.05 {
            PClass::P05
        } else {
            PClass::NotSignificant
        }
    }

    /// Largest p-value falling into this band
    pub fn max_p(self) -> f64 {
        match self {
            PClass::NotSignificant => 1.0,
            PClass::P05 => 0.05,
            PClass::P01 => 0.01,
            PClass::P001 => 0.001,
        }
    }
}

/// Result of a significance run over a whole [`ProteinTable`]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SignificanceResult {
    pub threshold: f64,
    pub bin_size: usize,
    pub samples: Vec<SampleSignificance>,
    /// One flag per table row
    pub significant: Vec<bool>,
}

impl SignificanceResult {
    pub fn p_value(&self, row: usize, sample: usize) -> Option<f64> {
        *self.samples.get(sample)?.p_values.get(row)?
    }

    /// Smallest defined p-value of a row across samples
    pub fn min_p_value(&self, row: usize) -> Option<f64> {
        (0..self.samples.len())
            .filter_map(|s| self.p_value(row, s))
            .filter(|p| !p.is_nan())
            .min_by(f64::total_cmp)
    }

    pub fn is_significant(&self, row: usize) -> bool {
        self.significant.get(row).copied().unwrap_or(false)
    }

    pub fn significant_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.significant
            .iter()
            .enumerate()
            .filter(|(_, s)| **s)
            .map(|(row, _)| row)
    }

    /// Number of significant protein groups
    pub fn count(&self) -> usize {
        self.significant.iter().filter(|s| **s).count()
    }

    /// Rows with a p-value at or below `max_p` in `sample`
    pub fn rows_below(&self, sample: usize, max_p: f64) -> Vec<usize> {
        self.samples
            .get(sample)
            .map(|s| {
                s.p_values
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| matches!(p, Some(p) if *p <= max_p))
                    .map(|(row, _)| row)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn class(&self, row: usize, sample: usize) -> Option<PClass> {
        self.p_value(row, sample).map(PClass::from_p)
    }
}

impl Significance {
    pub fn validate(&self) -> Result<()> {
        if self.bin_size == 0 {
            return Err(Error::invalid("bin_size", self.bin_size));
        }
        if !(self.p_value > 0.0 && self.p_value <= 1.0) {
            return Err(Error::invalid("p_value", self.p_value));
        }
        Ok(())
    }

    fn sample(&self, table: &ProteinTable, sample: usize) -> SampleSignificance {
        let name = &table.samples()[sample];
        let intensity = table.column(sample, Field::Intensity);
        let log_ratio = table.column(sample, Field::LogRatio);

        // Stable sort, ties keep table order
        let mut ranked = (0..table.len())
            .filter(|&row| log_ratio[row].is_some())
            .collect::<Vec<usize>>();
        ranked.sort_by(|&a, &b| {
            let a = intensity[a].unwrap_or(0.0);
            let b = intensity[b].unwrap_or(0.0);
            a.total_cmp(&b)
        });

        let mut p_values = vec![None; table.len()];
        let mut bins = Vec::new();
        for range in partition(ranked.len(), self.bin_size) {
            let rows = ranked[range].to_vec();
            let values = rows
                .iter()
                .filter_map(|&row| log_ratio[row])
                .collect::<Vec<f64>>();
            let bin = Bin::fit(rows, &values);

            if bin.is_degenerate() {
                warn!(
                    "sample {}: bin of {} proteins has degenerate spread (std = {}), p-values are undefined",
                    name,
                    bin.rows.len(),
                    bin.std
                );
            } else {
                debug!(
                    "sample {}: bin of {} proteins, mean {:.4}, std {:.4}",
                    name,
                    bin.rows.len(),
                    bin.mean,
                    bin.std
                );
            }

            for (&row, &x) in bin.rows.iter().zip(&values) {
                p_values[row] = Some(bin.p_value(x));
            }
            bins.push(bin);
        }

        SampleSignificance {
            sample: name.clone(),
            bins,
            p_values,
        }
    }

    /// Estimate p-values for every sample of `table`. Samples are processed
    /// in parallel, each into its own slot.
    pub fn run(&self, table: &ProteinTable) -> Result<SignificanceResult> {
        self.validate()?;

        let samples = (0..table.samples().len())
            .into_par_iter()
            .map(|s| self.sample(table, s))
            .collect::<Vec<_>>();

        let significant = (0..table.len())
            .map(|row| {
                samples
                    .iter()
                    .any(|s| matches!(s.p_values[row], Some(p) if p <= self.p_value))
            })
            .collect::<Vec<bool>>();

        let result = SignificanceResult {
            threshold: self.p_value,
            bin_size: self.bin_size,
            samples,
            significant,
        };
        info!(
            "{} of {} protein groups significant at p <= {}",
            result.count(),
            table.len(),
            self.p_value
        );
        Ok(result)
    }
}
