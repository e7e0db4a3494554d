use super::*;

#[derive(Clone, Debug, PartialEq, PartialOrd)]
pub enum ProteinFilter {
    /// Drop decoy hits, flagged `+` in the `Reverse` column
    Reverse,
    /// Drop common contaminants
    Contaminant,
    /// Drop groups where any accession contains the pattern
    ExcludeMatch(String),
    /// Keep groups with a log-ratio in at least N samples
    Quantified(usize),
}

/// Composable collection of [`ProteinFilter`]s, applied once when a table
/// is built from raw rows
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    protein_filters: Vec<ProteinFilter>,
}

impl Filter {
    pub fn new() -> Self {
        Filter {
            protein_filters: Vec::new(),
        }
    }

    /// Decoy and contaminant removal, applied to every loaded table
    pub fn decoys() -> Self {
        Filter::new()
            .add_protein_filter(ProteinFilter::Reverse)
            .add_protein_filter(ProteinFilter::Contaminant)
    }

    pub fn add_protein_filter(mut self, f: ProteinFilter) -> Self {
        self.protein_filters.push(f);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.protein_filters.is_empty()
    }

    pub fn filter(&self, protein: ProteinGroup) -> Option<ProteinGroup> {
        for filter in &self.protein_filters {
            let pass = match filter {
                ProteinFilter::Reverse => !protein.reverse,
                ProteinFilter::Contaminant => !protein.contaminant,
                ProteinFilter::ExcludeMatch(s) => !protein.matches(s),
                ProteinFilter::Quantified(n) => protein.quantified() >= *n,
            };
            if !pass {
                return None;
            }
        }
        Some(protein)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn group(reverse: bool, contaminant: bool) -> ProteinGroup {
        let mut pg = ProteinGroup::new(1, "P1", vec![Quant::new(Some(1.0), 1.0)]);
        pg.reverse = reverse;
        pg.contaminant = contaminant;
        pg
    }

    #[test]
    fn reverse() {
        let filter = Filter::new().add_protein_filter(ProteinFilter::Reverse);
        assert_eq!(filter.filter(group(true, false)), None);
        assert!(filter.filter(group(false, true)).is_some());
    }

    #[test]
    fn decoys() {
        let filter = Filter::decoys();
        assert_eq!(filter.filter(group(true, false)), None);
        assert_eq!(filter.filter(group(false, true)), None);
        assert_eq!(filter.filter(group(false, false)), Some(group(false, false)));
    }

    #[test]
    fn exclude_and_quantified() {
        let filter = Filter::new()
            .add_protein_filter(ProteinFilter::ExcludeMatch("KRT".into()))
            .add_protein_filter(ProteinFilter::Quantified(1));

        let keratin = ProteinGroup::new(2, "P1;KRT10", vec![Quant::new(Some(1.0), 1.0)]);
        assert_eq!(filter.filter(keratin), None);

        let empty = ProteinGroup::new(3, "P2", vec![Quant::new(None, 1.0)]);
        assert_eq!(filter.filter(empty), None);
        assert!(filter.filter(group(false, false)).is_some());
    }
}
