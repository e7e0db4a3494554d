//! A library for finding significantly changed proteins in SILAC
//! quantification data, testing them for GO term enrichment, and
//! clustering their ratio profiles.
//!
//! This library's API is based around several types that form
//! a data analysis pipeline.
//!
//! A MaxQuant `proteinGroups.txt` export is read into a [`Raw`] object,
//! which is filtered into a [`ProteinTable`]. Decoy and contaminant hits
//! are removed at this point and never seen again.
//!
//! ```rust,ignore
//! # use proteome::*;
//! let table = Raw::load("./data/proteinGroups.txt")?.table(&Filter::decoys())?;
//! ```
//!
//! [`Significance`] bins each sample's protein groups by intensity and
//! scores every log-ratio against its bin, producing a
//! [`SignificanceResult`]. A protein group is significant if it passes the
//! threshold in any sample.
//!
//! ```rust,ignore
//! # use proteome::*;
//! let sig = Significance { bin_size: 300, p_value: 0.05 }.run(&table)?;
//! println!("{} significant", sig.count());
//! ```
//!
//! Significant protein groups can then be tested for enrichment of GO
//! terms with an [`Enricher`], and clustered by [`Clustering`]. Both only
//! read the table and the significance result.
//!
//! [`Analysis`] ties the stages together for callers that run them
//! repeatedly with changing parameters. Re-running significance discards
//! the enrichment and clustering results derived from the previous run.
//!
//! ```rust,ignore
//! # use proteome::*;
//! let mut analysis = Analysis::load("./data/proteinGroups.txt", &Filter::decoys())?;
//! analysis.load_go("go-basic.obo", "goa_human.gaf")?;
//! analysis.find_significant()?;
//! let terms = analysis.find_go_terms()?;
//! let clusters = analysis.cluster()?;
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub mod annotation;
pub mod cluster;
pub mod config;
pub mod enrichment;
mod error;
mod filter;
mod parser;
mod protein;
pub mod significance;
pub mod stats;
mod table;

pub use annotation::{Annotations, IdPattern};
pub use cluster::{
    ClusterResult, Clustering, Criterion, Dendrogram, Linkage, Merge, Missing, Scope,
};
pub use config::Parameters;
pub use enrichment::{EnrichedTerm, Enricher, Enrichment, EnrichmentResult};
pub use error::{Error, Result};
pub use filter::{Filter, ProteinFilter};
pub use ontology::{Associations, GoDag, Ontology};
pub use parser::Raw;
pub use protein::{ProteinGroup, Quant};
pub use significance::{PClass, Significance, SignificanceResult};
pub use stats::Contingency;
pub use table::{Field, Histogram, ProteinTable, HISTOGRAM_BINS, HISTOGRAM_RANGE};

/// Pipeline context owning a protein table and the results derived from it.
///
/// Each stage reads the table and upstream results and stores its own
/// result. `revision` counts significance runs and table edits; enrichment
/// and clustering results record the revision they were computed at.
pub struct Analysis {
    table: ProteinTable,
    params: Parameters,
    id_pattern: IdPattern,
    dag: Option<GoDag>,
    associations: Option<Associations>,
    annotations: Option<Annotations>,
    significance: Option<SignificanceResult>,
    enrichment: Option<EnrichmentResult>,
    clusters: Option<ClusterResult>,
    revision: u64,
}

impl Analysis {
    pub fn new(table: ProteinTable) -> Analysis {
        Analysis {
            table,
            params: Parameters::default(),
            id_pattern: IdPattern::identity(),
            dag: None,
            associations: None,
            annotations: None,
            significance: None,
            enrichment: None,
            clusters: None,
            revision: 0,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P, filter: &Filter) -> Result<Analysis> {
        Ok(Analysis::new(Raw::load(path)?.table(filter)?))
    }

    pub fn table(&self) -> &ProteinTable {
        &self.table
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replace the analysis parameters. Nothing is recomputed, but a changed
    /// id pattern rebuilds the protein annotations.
    pub fn set_parameters(&mut self, params: Parameters) -> Result<()> {
        params.validate()?;
        let pattern = params.id_pattern()?;
        let rebuild = pattern != self.id_pattern;
        self.params = params;
        self.id_pattern = pattern;
        if rebuild {
            self.annotate();
        }
        Ok(())
    }

    /// Invert the ratios of label-swapped samples. All results are
    /// discarded.
    pub fn swap_labels<S: AsRef<str>>(&mut self, samples: &[S]) -> Result<()> {
        self.table.swap_labels(samples)?;
        self.invalidate();
        self.significance = None;
        Ok(())
    }

    fn invalidate(&mut self) {
        self.revision += 1;
        self.enrichment = None;
        self.clusters = None;
    }

    /// Estimate per-sample p-values and significance flags with the current
    /// parameters. Previous enrichment and cluster results are discarded.
    pub fn find_significant(&mut self) -> Result<&SignificanceResult> {
        let result = self.params.significance.run(&self.table)?;
        self.invalidate();
        Ok(self.significance.insert(result))
    }

    pub fn significance(&self) -> Option<&SignificanceResult> {
        self.significance.as_ref()
    }

    pub fn set_dag(&mut self, dag: GoDag) {
        self.dag = Some(dag);
        self.enrichment = None;
    }

    pub fn dag(&self) -> Option<&GoDag> {
        self.dag.as_ref()
    }

    /// Install gene associations, joining them against the table
    pub fn set_associations(&mut self, associations: Associations) {
        self.associations = Some(associations);
        self.annotate();
    }

    /// Read an OBO file and a gene association file in parallel
    pub fn load_go<P: AsRef<Path> + Sync>(&mut self, obo: P, associations: P) -> Result<()> {
        let (dag, assoc) = rayon::join(
            || ontology::obo::load(&obo),
            || ontology::association::load(&associations),
        );
        self.set_dag(dag?);
        self.set_associations(assoc?);
        Ok(())
    }

    fn annotate(&mut self) {
        self.enrichment = None;
        self.annotations = self
            .associations
            .as_ref()
            .map(|a| Annotations::build(&self.table, a, &self.id_pattern));
    }

    pub fn annotations(&self) -> Option<&Annotations> {
        self.annotations.as_ref()
    }

    /// Lazy enrichment pass with the current parameters. Drive it, then
    /// hand the outcome to [`Analysis::set_enrichment`].
    pub fn iterate_go_terms(&self) -> Result<Enricher<'_>> {
        let significance = self.significance.as_ref().ok_or(Error::NoSignificance)?;
        let annotations = self.annotations.as_ref().ok_or(Error::NoAnnotations)?;
        let enricher = Enricher::new(
            &self.table,
            significance,
            annotations,
            self.dag.as_ref(),
            &self.params.enrichment,
        )?;
        Ok(enricher.at_revision(self.revision))
    }

    /// Store an enrichment result. Results computed against an older
    /// significance estimate are rejected.
    pub fn set_enrichment(&mut self, result: EnrichmentResult) -> Result<()> {
        if result.revision != self.revision {
            return Err(Error::Stale {
                found: result.revision,
                current: self.revision,
            });
        }
        self.enrichment = Some(result);
        Ok(())
    }

    /// Run the whole enrichment pass
    pub fn find_go_terms(&mut self) -> Result<&EnrichmentResult> {
        let result = self.iterate_go_terms()?.finish();
        Ok(self.enrichment.insert(result))
    }

    pub fn enrichment(&self) -> Option<&EnrichmentResult> {
        self.enrichment.as_ref()
    }

    pub fn cluster(&mut self) -> Result<&ClusterResult> {
        let mut result = self
            .params
            .clustering
            .run(&self.table, self.significance.as_ref())?;
        result.revision = self.revision;
        Ok(self.clusters.insert(result))
    }

    pub fn clusters(&self) -> Option<&ClusterResult> {
        self.clusters.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn analysis() -> Analysis {
        let proteins = (0..60u32)
            .map(|i| {
                // Two extreme protein groups, the rest spread around zero
                let lr = match i {
                    0 => 6.0,
                    1 => -6.0,
                    _ => ((i % 10) as f64 - 4.5) / 10.0,
                };
                ProteinGroup::new(
                    i,
                    &format!("sp|P{}|X", i),
                    vec![Quant::new(Some(lr.exp2()), i as f64)],
                )
            })
            .collect();
        let mut a = Analysis::new(ProteinTable::new(vec!["A".into()], proteins).unwrap());
        let mut params = Parameters::default();
        params.significance.bin_size = 30;
        params.clustering.criterion = Criterion::MaxClusters(2);
        a.set_parameters(params).unwrap();
        a
    }

    #[test]
    fn stage_order() {
        let mut a = analysis();
        assert!(matches!(a.iterate_go_terms(), Err(Error::NoSignificance)));
        assert!(matches!(a.cluster(), Err(Error::NoSignificance)));

        let n = a.find_significant().unwrap().count();
        assert!(n >= 2);
        assert!(a.significance().unwrap().is_significant(0));
        assert!(matches!(a.iterate_go_terms(), Err(Error::NoAnnotations)));

        let clusters = a.cluster().unwrap();
        assert_eq!(clusters.assignments.len(), n);
        assert_eq!(clusters.revision, 1);
    }

    #[test]
    fn rerun_invalidates() {
        let mut a = analysis();
        let mut assoc = Associations::new();
        assoc.insert("sp|P0|X", "GO:1", Ontology::BiologicalProcess);
        assoc.insert("sp|P1|X", "GO:1", Ontology::BiologicalProcess);
        a.set_associations(assoc);
        assert_eq!(a.annotations().map(|a| a.len()), Some(1));

        a.find_significant().unwrap();
        let stale = a.iterate_go_terms().unwrap().finish();
        a.set_enrichment(stale.clone()).unwrap();
        assert!(a.enrichment().unwrap().get("GO:1").is_some());
        a.cluster().unwrap();

        a.find_significant().unwrap();
        assert_eq!(a.revision(), 2);
        assert!(a.enrichment().is_none());
        assert!(a.clusters().is_none());
        assert!(matches!(
            a.set_enrichment(stale),
            Err(Error::Stale {
                found: 1,
                current: 2
            })
        ));
        assert_eq!(a.find_go_terms().unwrap().revision, 2);
    }

    #[test]
    fn id_pattern_rebuilds_annotations() {
        let mut a = analysis();
        let mut assoc = Associations::new();
        assoc.insert("P3", "GO:1", Ontology::BiologicalProcess);
        a.set_associations(assoc);
        assert_eq!(a.annotations().map(|a| a.len()), Some(0));

        let mut params = a.parameters().clone();
        params.id_regex = r"\|(\w+)\|".into();
        a.set_parameters(params).unwrap();
        assert_eq!(a.annotations().map(|a| a.len()), Some(1));
    }

    #[test]
    fn swap_discards_results() {
        let mut a = analysis();
        a.find_significant().unwrap();
        a.swap_labels(&["A"]).unwrap();
        assert!(a.significance().is_none());
        assert_eq!(a.table().proteins()[0].log_ratio(0), Some(-6.0));
        assert!(a.swap_labels(&["B"]).is_err());
    }
}
