#[derive(Copy, Clone, Debug, Default, PartialEq)]
/// Quantification of a protein group in a single sample
pub struct Quant {
    /// Normalized H/L ratio. `None` if the group was not quantified
    pub ratio: Option<f64>,
    /// log2 of `ratio`, present only for positive, finite ratios
    pub log_ratio: Option<f64>,
    /// Summed intensity, only used for binning
    pub intensity: f64,
}

impl Quant {
    pub fn new(ratio: Option<f64>, intensity: f64) -> Quant {
        Quant {
            ratio,
            log_ratio: ratio.filter(|r| *r > 0.0 && r.is_finite()).map(f64::log2),
            intensity,
        }
    }

    /// Swap heavy and light channels: `ratio -> 1 / ratio`
    pub fn invert(&mut self) {
        *self = Quant::new(self.ratio.map(|r| 1.0 / r), self.intensity);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// One row of a protein groups table
pub struct ProteinGroup {
    pub id: u32,
    /// Constituent accessions, the first one being representative
    pub protein_ids: Vec<String>,
    pub reverse: bool,
    pub contaminant: bool,
    /// One entry per sample, in the sample order of the owning
    /// [`ProteinTable`]
    pub quant: Vec<Quant>,
}

impl ProteinGroup {
    pub fn new(id: u32, protein_ids: &str, quant: Vec<Quant>) -> ProteinGroup {
        ProteinGroup {
            id,
            protein_ids: ProteinGroup::split_ids(protein_ids),
            reverse: false,
            contaminant: false,
            quant,
        }
    }

    /// Split a semicolon-joined accession list
    pub fn split_ids(s: &str) -> Vec<String> {
        s.split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn representative(&self) -> Option<&str> {
        self.protein_ids.first().map(String::as_str)
    }

    pub fn quant(&self, sample: usize) -> Option<&Quant> {
        self.quant.get(sample)
    }

    pub fn ratio(&self, sample: usize) -> Option<f64> {
        self.quant.get(sample)?.ratio
    }

    pub fn log_ratio(&self, sample: usize) -> Option<f64> {
        self.quant.get(sample)?.log_ratio
    }

    pub fn intensity(&self, sample: usize) -> Option<f64> {
        self.quant.get(sample).map(|q| q.intensity)
    }

    /// Number of samples with a usable log-ratio
    pub fn quantified(&self) -> usize {
        self.quant.iter().filter(|q| q.log_ratio.is_some()).count()
    }

    /// Return true if any accession contains `text`
    pub fn matches(&self, text: &str) -> bool {
        self.protein_ids.iter().any(|id| id.contains(text))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn log_ratios() {
        let q = Quant::new(Some(4.0), 1e6);
        assert_eq!(q.log_ratio, Some(2.0));
        assert_eq!(Quant::new(Some(0.25), 0.0).log_ratio, Some(-2.0));
        assert_eq!(Quant::new(None, 0.0).log_ratio, None);
        assert_eq!(Quant::new(Some(0.0), 0.0).log_ratio, None);
        assert_eq!(Quant::new(Some(-1.0), 0.0).log_ratio, None);
    }

    #[test]
    fn invert() {
        let mut q = Quant::new(Some(8.0), 10.0);
        q.invert();
        assert_eq!(q.ratio, Some(0.125));
        assert_eq!(q.log_ratio, Some(-3.0));
        assert_eq!(q.intensity, 10.0);

        let mut q = Quant::new(None, 10.0);
        q.invert();
        assert_eq!(q, Quant::new(None, 10.0));
    }

    #[test]
    fn protein_ids() {
        let pg = ProteinGroup::new(
            7,
            "sp|P04637|P53_HUMAN;tr|Q1|Q1_HUMAN;",
            vec![Quant::new(Some(2.0), 1.0), Quant::new(None, 0.0)],
        );
        assert_eq!(pg.protein_ids.len(), 2);
        assert_eq!(pg.representative(), Some("sp|P04637|P53_HUMAN"));
        assert!(pg.matches("Q1_"));
        assert!(!pg.matches("MDM2"));
        assert_eq!(pg.log_ratio(0), Some(1.0));
        assert_eq!(pg.log_ratio(1), None);
        assert_eq!(pg.log_ratio(2), None);
        assert_eq!(pg.quantified(), 1);
    }
}
