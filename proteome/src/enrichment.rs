//! GO term enrichment among significant protein groups
//!
//! Every annotated term of the selected ontology is tested independently
//! with a two-sided Fisher's exact test. No multiple testing correction is
//! applied.
//!
//! The work is driven through [`Enricher`], an iterator yielding one `()`
//! per candidate term. Callers may interleave it with other work or stop
//! early; the partial [`EnrichmentResult`] stays readable throughout.
//!
//! ```rust,ignore
//! # use proteome::*;
//! let mut enricher = Enricher::new(&table, &significance, &annotations, Some(&dag), &params)?;
//! while let Some(()) = enricher.next() {
//!     if cancelled() {
//!         break;
//!     }
//! }
//! let partial = enricher.results();
//! ```
use super::*;
use ontology::{GoDag, Ontology};
use std::iter::FusedIterator;

/// Enrichment parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Enrichment {
    pub ontology: Ontology,
    /// Terms with a Fisher p-value at or below this are reported
    #[serde(rename = "p_value_go", alias = "p_value")]
    pub p_value: f64,
}

impl Default for Enrichment {
    fn default() -> Self {
        Enrichment {
            ontology: Ontology::BiologicalProcess,
            p_value: 0.05,
        }
    }
}

impl Enrichment {
    pub fn validate(&self) -> Result<()> {
        if !(self.p_value > 0.0 && self.p_value <= 1.0) {
            return Err(Error::invalid("p_value_go", self.p_value));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnrichedTerm {
    pub term_id: String,
    /// Term name, if the term is known to the hierarchy
    pub name: Option<String>,
    pub p_value: f64,
    /// Significant protein groups directly annotated with the term
    pub proteins: Vec<u32>,
    pub table: Contingency,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnrichmentResult {
    pub ontology: Ontology,
    pub cutoff: f64,
    /// Revision of the significance estimate the terms were tested against
    pub revision: u64,
    pub terms: BTreeMap<String, EnrichedTerm>,
}

impl EnrichmentResult {
    pub fn get(&self, term: &str) -> Option<&EnrichedTerm> {
        self.terms.get(term)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Reported terms in ascending p-value order
    pub fn ranked(&self) -> Vec<&EnrichedTerm> {
        let mut v = self.terms.values().collect::<Vec<_>>();
        v.sort_by(|a, b| a.p_value.total_cmp(&b.p_value).then(a.term_id.cmp(&b.term_id)));
        v
    }

    /// Protein count of a term relative to the largest reported term, in
    /// `(0, 1]`
    pub fn relative_size(&self, term: &str) -> Option<f64> {
        let n = self.terms.get(term)?.proteins.len();
        let max = self.terms.values().map(|t| t.proteins.len()).max()?;
        Some(n as f64 / max as f64)
    }
}

/// Lazy, restartable enrichment pass over the candidate terms of one
/// ontology
pub struct Enricher<'a> {
    cutoff: f64,
    dag: Option<&'a GoDag>,
    candidates: Vec<(&'a str, &'a BTreeSet<u32>)>,
    significant: HashSet<u32>,
    total: u64,
    pos: usize,
    results: EnrichmentResult,
}

impl<'a> Enricher<'a> {
    pub fn new(
        table: &ProteinTable,
        significance: &SignificanceResult,
        annotations: &'a Annotations,
        dag: Option<&'a GoDag>,
        params: &Enrichment,
    ) -> Result<Enricher<'a>> {
        params.validate()?;
        if significance.significant.len() != table.len() {
            return Err(Error::invalid(
                "significance",
                format!(
                    "{} rows estimated for a table of {}",
                    significance.significant.len(),
                    table.len()
                ),
            ));
        }

        let significant = significance
            .significant_rows()
            .map(|row| table.proteins()[row].id)
            .collect::<HashSet<u32>>();

        let mut excluded = 0;
        let candidates = annotations
            .for_ontology(params.ontology)
            .into_iter()
            .flatten()
            .filter(|(term, _)| {
                let other = dag
                    .and_then(|d| d.get(term))
                    .map_or(false, |t| t.ontology != params.ontology);
                excluded += other as usize;
                !other
            })
            .map(|(term, proteins)| (term.as_str(), proteins))
            .collect::<Vec<_>>();
        if excluded > 0 {
            warn!(
                "{} terms annotated as {} belong to another namespace and were excluded",
                excluded, params.ontology
            );
        }
        debug!(
            "{} candidate {} terms, {} significant of {} protein groups",
            candidates.len(),
            params.ontology,
            significant.len(),
            table.len()
        );

        Ok(Enricher {
            cutoff: params.p_value,
            dag,
            candidates,
            significant,
            total: table.len() as u64,
            pos: 0,
            results: EnrichmentResult {
                ontology: params.ontology,
                cutoff: params.p_value,
                revision: 0,
                terms: BTreeMap::new(),
            },
        })
    }

    /// Tag results with the significance revision they derive from
    pub fn at_revision(mut self, revision: u64) -> Self {
        self.results.revision = revision;
        self
    }

    /// Terms not yet tested
    pub fn remaining(&self) -> usize {
        self.candidates.len() - self.pos
    }

    /// Results accumulated so far
    pub fn results(&self) -> &EnrichmentResult {
        &self.results
    }

    pub fn into_results(self) -> EnrichmentResult {
        self.results
    }

    /// Drive the pass to completion
    pub fn finish(mut self) -> EnrichmentResult {
        self.by_ref().for_each(drop);
        info!(
            "{} of {} {} terms enriched at p <= {}",
            self.results.len(),
            self.candidates.len(),
            self.results.ontology,
            self.cutoff
        );
        self.results
    }

    /// Discard accumulated results and start over from the first term
    pub fn restart(&mut self) {
        self.pos = 0;
        self.results.terms.clear();
    }

    fn test(&mut self, term: &str, proteins: &BTreeSet<u32>) {
        let hits = proteins
            .iter()
            .copied()
            .filter(|id| self.significant.contains(id))
            .collect::<Vec<u32>>();
        if hits.is_empty() {
            return;
        }

        let table = Contingency::new(
            hits.len() as u64,
            proteins.len() as u64,
            self.significant.len() as u64,
            self.total,
        );
        let p_value = table.fisher_exact();
        debug!("{}: {:?} p = {:e}", term, table, p_value);

        if p_value <= self.cutoff {
            let name = self.dag.and_then(|d| d.get(term)).map(|t| t.name.clone());
            self.results.terms.insert(
                term.to_string(),
                EnrichedTerm {
                    term_id: term.to_string(),
                    name,
                    p_value,
                    proteins: hits,
                    table,
                },
            );
        }
    }
}

impl<'a> Iterator for Enricher<'a> {
    type Item = ();

    fn next(&mut self) -> Option<()> {
        let (term, proteins) = *self.candidates.get(self.pos)?;
        self.pos += 1;
        self.test(term, proteins);
        Some(())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl<'a> ExactSizeIterator for Enricher<'a> {}

impl<'a> FusedIterator for Enricher<'a> {}
