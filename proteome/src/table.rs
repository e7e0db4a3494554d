//! Typed, sample-keyed view of a protein groups table
use super::*;

/// Per-sample quantity stored in a [`ProteinTable`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Ratio,
    LogRatio,
    Intensity,
}

/// Default log-ratio plot range
pub const HISTOGRAM_RANGE: (f64, f64) = (-10.0, 10.0);
/// Default number of histogram bins, one fewer than the number of edges
pub const HISTOGRAM_BINS: usize = 99;

/// Fixed-width histogram, the plot input for a sample's log-ratio
/// distribution
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Protein groups sharing one fixed set of samples.
///
/// Values are addressed by `(sample, Field)` rather than by column name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProteinTable {
    samples: Vec<String>,
    proteins: Vec<ProteinGroup>,
    /// protein group id -> row
    index: HashMap<u32, usize>,
}

impl ProteinTable {
    /// Build a table, checking that every group carries exactly one
    /// [`Quant`] per sample and that ids are unique
    pub fn new(samples: Vec<String>, proteins: Vec<ProteinGroup>) -> Result<ProteinTable> {
        let mut index = HashMap::with_capacity(proteins.len());
        for (row, pg) in proteins.iter().enumerate() {
            if pg.quant.len() != samples.len() {
                return Err(Error::SampleMismatch {
                    id: pg.id,
                    expected: samples.len(),
                    found: pg.quant.len(),
                });
            }
            if index.insert(pg.id, row).is_some() {
                return Err(Error::DuplicateId(pg.id));
            }
        }
        Ok(ProteinTable {
            samples,
            proteins,
            index,
        })
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn sample_index(&self, name: &str) -> Result<usize> {
        self.samples
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| Error::UnknownSample(name.into()))
    }

    pub fn proteins(&self) -> &[ProteinGroup] {
        &self.proteins
    }

    pub fn len(&self) -> usize {
        self.proteins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proteins.is_empty()
    }

    /// Row index of a protein group id
    pub fn row(&self, id: u32) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get(&self, id: u32) -> Option<&ProteinGroup> {
        self.proteins.get(self.row(id)?)
    }

    pub fn value(&self, row: usize, sample: usize, field: Field) -> Option<f64> {
        let q = self.proteins.get(row)?.quant.get(sample)?;
        match field {
            Field::Ratio => q.ratio,
            Field::LogRatio => q.log_ratio,
            Field::Intensity => Some(q.intensity),
        }
    }

    /// One value per row for a `(sample, field)` pair
    pub fn column(&self, sample: usize, field: Field) -> Vec<Option<f64>> {
        (0..self.proteins.len())
            .map(|row| self.value(row, sample, field))
            .collect()
    }

    /// Restrict the table to a subset of its samples, in the given order
    pub fn select<S: AsRef<str>>(self, samples: &[S]) -> Result<ProteinTable> {
        let keep = samples
            .iter()
            .map(|s| self.sample_index(s.as_ref()))
            .collect::<Result<Vec<usize>>>()?;

        let names = keep.iter().map(|&i| self.samples[i].clone()).collect();
        let proteins = self
            .proteins
            .into_iter()
            .map(|mut pg| {
                pg.quant = keep.iter().map(|&i| pg.quant[i]).collect();
                pg
            })
            .collect();
        ProteinTable::new(names, proteins)
    }

    pub fn filter(self, filter: &Filter) -> ProteinTable {
        let proteins: Vec<ProteinGroup> = self
            .proteins
            .into_iter()
            .filter_map(|pg| filter.filter(pg))
            .collect();
        let index = proteins
            .iter()
            .enumerate()
            .map(|(row, pg)| (pg.id, row))
            .collect();
        ProteinTable {
            samples: self.samples,
            proteins,
            index,
        }
    }

    /// Invert the H/L ratio of label-swapped samples
    pub fn swap_labels<S: AsRef<str>>(&mut self, samples: &[S]) -> Result<()> {
        let swap = samples
            .iter()
            .map(|s| self.sample_index(s.as_ref()))
            .collect::<Result<Vec<usize>>>()?;
        for pg in self.proteins.iter_mut() {
            for &s in &swap {
                pg.quant[s].invert();
            }
        }
        Ok(())
    }

    /// Ids of every protein group with an accession containing `text`
    pub fn search(&self, text: &str) -> Vec<u32> {
        self.proteins
            .iter()
            .filter(|pg| pg.matches(text))
            .map(|pg| pg.id)
            .collect()
    }

    /// Histogram of a sample's log-ratios over `[lo, hi]` with `bins` equal
    /// width bins. The last bin is closed on the right; values outside the
    /// range are not counted.
    pub fn histogram(&self, sample: usize, lo: f64, hi: f64, bins: usize) -> Result<Histogram> {
        if bins == 0 {
            return Err(Error::invalid("bins", bins));
        }
        if !(lo < hi) {
            return Err(Error::invalid("range", format!("{}..{}", lo, hi)));
        }
        if sample >= self.samples.len() {
            return Err(Error::UnknownSample(sample.to_string()));
        }

        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0; bins];
        for x in self.column(sample, Field::LogRatio).into_iter().flatten() {
            if x < lo || x > hi {
                continue;
            }
            let bin = (((x - lo) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }
        Ok(Histogram { edges, counts })
    }

    /// Histogram over [`HISTOGRAM_RANGE`] with [`HISTOGRAM_BINS`] bins
    pub fn default_histogram(&self, sample: usize) -> Result<Histogram> {
        let (lo, hi) = HISTOGRAM_RANGE;
        self.histogram(sample, lo, hi, HISTOGRAM_BINS)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    macro_rules! pg {
        ($id:expr, $ids:expr, $($r:expr),+) => {
            ProteinGroup::new($id, $ids, vec![$(Quant::new($r, 100.0)),+])
        };
    }

    fn table() -> ProteinTable {
        ProteinTable::new(
            vec!["A".into(), "B".into()],
            vec![
                pg!(1, "P1", Some(2.0), Some(0.5)),
                pg!(2, "P2;Q2", None, Some(4.0)),
                pg!(3, "P3", Some(1.0), None),
            ],
        )
        .unwrap()
    }

    #[test]
    fn columns() {
        let t = table();
        assert_eq!(t.sample_index("B").unwrap(), 1);
        assert!(t.sample_index("C").is_err());
        assert_eq!(
            t.column(0, Field::LogRatio),
            vec![Some(1.0), None, Some(0.0)]
        );
        assert_eq!(t.column(1, Field::Ratio), vec![Some(0.5), Some(4.0), None]);
        assert_eq!(t.value(1, 0, Field::Intensity), Some(100.0));
        assert_eq!(t.get(2).unwrap().protein_ids, vec!["P2", "Q2"]);
        assert_eq!(t.row(3), Some(2));
        assert_eq!(t.get(9), None);
    }

    #[test]
    fn invariants() {
        let err = ProteinTable::new(vec!["A".into()], vec![pg!(1, "P1", Some(1.0), Some(1.0))]);
        assert!(matches!(err, Err(Error::SampleMismatch { id: 1, .. })));

        let err = ProteinTable::new(
            vec!["A".into()],
            vec![pg!(1, "P1", Some(1.0)), pg!(1, "P2", Some(1.0))],
        );
        assert!(matches!(err, Err(Error::DuplicateId(1))));
    }

    #[test]
    fn select_samples() {
        let t = table().select(&["B"]).unwrap();
        assert_eq!(t.samples(), &["B".to_string()]);
        assert_eq!(t.column(0, Field::Ratio), vec![Some(0.5), Some(4.0), None]);
        assert!(table().select(&["Z"]).is_err());
    }

    #[test]
    fn filter_reindexes() {
        let t = table().filter(&Filter::new().add_protein_filter(ProteinFilter::ExcludeMatch(
            "P2".into(),
        )));
        assert_eq!(t.len(), 2);
        assert_eq!(t.row(3), Some(1));
        assert_eq!(t.row(2), None);
    }

    #[test]
    fn swap_labels() {
        let mut t = table();
        t.swap_labels(&["B"]).unwrap();
        assert_eq!(
            t.column(1, Field::LogRatio),
            vec![Some(1.0), Some(-2.0), None]
        );
        assert_eq!(t.column(0, Field::LogRatio)[0], Some(1.0));
    }

    #[test]
    fn search() {
        let t = table();
        assert_eq!(t.search("Q2"), vec![2]);
        assert_eq!(t.search("P"), vec![1, 2, 3]);
        assert!(t.search("X").is_empty());
    }

    #[test]
    fn histogram() {
        let t = table();
        let h = t.histogram(0, -2.0, 2.0, 4).unwrap();
        assert_eq!(h.edges, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        // log ratios 1.0 and 0.0; 1.0 falls into [1, 2]
        assert_eq!(h.counts, vec![0, 0, 1, 1]);
        assert!(t.histogram(0, 1.0, 1.0, 4).is_err());
        assert!(t.histogram(0, -1.0, 1.0, 0).is_err());
        assert!(t.histogram(5, -1.0, 1.0, 2).is_err());
    }

    #[test]
    fn default_histogram() {
        let t = table();
        let h = t.default_histogram(1).unwrap();
        assert_eq!(h.counts.len(), 99);
        assert_eq!(h.edges.len(), 100);
        assert_eq!(h.edges[0], -10.0);
        assert!((h.edges[99] - 10.0).abs() < 1e-9);
        // log ratios -1.0 and 2.0
        assert_eq!(h.counts.iter().sum::<usize>(), 2);
        assert!(t.default_histogram(2).is_err());
    }
}
