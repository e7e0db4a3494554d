//! Join of protein groups against a gene association table
//!
//! Each `;`-separated accession of a protein group is passed through an
//! [`IdPattern`] to recover the identifier used by the association file.
//! Accessions that don't match, or that have no associations, are simply
//! left out of the mapping.
use super::*;
use ontology::{Associations, Ontology};
use regex::Regex;

/// Extracts a canonical accession from a protein id token
#[derive(Clone, Debug, Default)]
pub struct IdPattern {
    regex: Option<Regex>,
}

impl IdPattern {
    /// Use each token unchanged
    pub fn identity() -> IdPattern {
        IdPattern { regex: None }
    }

    /// Compile a pattern. The first capture group is the accession; with no
    /// capture group the whole match is used. An empty pattern is the
    /// identity.
    pub fn new(pattern: &str) -> Result<IdPattern> {
        if pattern.is_empty() {
            return Ok(IdPattern::identity());
        }
        Ok(IdPattern {
            regex: Some(Regex::new(pattern)?),
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_ref().map(Regex::as_str).unwrap_or("")
    }

    pub fn extract<'a>(&self, token: &'a str) -> Option<&'a str> {
        let re = match &self.regex {
            Some(re) => re,
            None => return Some(token),
        };
        let caps = re.captures(token)?;
        caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
    }
}

impl PartialEq for IdPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

type TermMap = BTreeMap<String, BTreeSet<u32>>;

/// Per-ontology mapping of GO term id -> protein group ids
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Annotations {
    terms: BTreeMap<Ontology, TermMap>,
    /// Protein groups without a single association
    pub unresolved: usize,
}

impl Annotations {
    pub fn build(table: &ProteinTable, associations: &Associations, pattern: &IdPattern) -> Annotations {
        let mut terms: BTreeMap<Ontology, TermMap> = BTreeMap::new();
        let mut unresolved = 0;

        for pg in table.proteins() {
            let mut found = false;
            for token in &pg.protein_ids {
                let acc = match pattern.extract(token) {
                    Some(acc) => acc,
                    None => continue,
                };
                for (ontology, term) in associations.terms(acc) {
                    found = true;
                    terms
                        .entry(ontology)
                        .or_default()
                        .entry(term.to_string())
                        .or_default()
                        .insert(pg.id);
                }
            }
            if !found {
                unresolved += 1;
            }
        }

        for (ontology, map) in &terms {
            debug!("{}: {} annotated terms", ontology, map.len());
        }
        info!(
            "annotated {} of {} protein groups",
            table.len() - unresolved,
            table.len()
        );
        Annotations { terms, unresolved }
    }

    /// GO term id -> protein group ids for one ontology
    pub fn for_ontology(&self, ontology: Ontology) -> Option<&BTreeMap<String, BTreeSet<u32>>> {
        self.terms.get(&ontology)
    }

    pub fn proteins(&self, ontology: Ontology, term: &str) -> Option<&BTreeSet<u32>> {
        self.terms.get(&ontology)?.get(term)
    }

    /// Number of annotated terms across all ontologies
    pub fn len(&self) -> usize {
        self.terms.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.values().all(BTreeMap::is_empty)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn patterns() {
        let p = IdPattern::new(r"sp\|([A-Z0-9]+)\|").unwrap();
        assert_eq!(p.extract("sp|P04637|P53_HUMAN"), Some("P04637"));
        assert_eq!(p.extract("tr|Q1|Q1_HUMAN"), None);

        let p = IdPattern::new("(.*)").unwrap();
        assert_eq!(p.extract("P04637-2"), Some("P04637-2"));

        let p = IdPattern::new("^[A-Z][0-9]").unwrap();
        assert_eq!(p.extract("P04637"), Some("P0"));

        assert_eq!(IdPattern::identity().extract("x"), Some("x"));
        assert_eq!(IdPattern::new("").unwrap(), IdPattern::identity());
        assert!(IdPattern::new("(").is_err());
    }

    #[test]
    fn join() {
        let mut assoc = Associations::new();
        assoc.insert("P1", "GO:1", Ontology::BiologicalProcess);
        assoc.insert("P1", "GO:2", Ontology::MolecularFunction);
        assoc.insert("P2", "GO:1", Ontology::BiologicalProcess);
        assoc.insert("P9", "GO:3", Ontology::BiologicalProcess);

        let q = || vec![Quant::new(Some(1.0), 1.0)];
        let table = ProteinTable::new(
            vec!["A".into()],
            vec![
                ProteinGroup::new(10, "sp|P1|X", q()),
                ProteinGroup::new(11, "sp|Q5|Y;sp|P2|Z", q()),
                ProteinGroup::new(12, "sp|Q7|W", q()),
            ],
        )
        .unwrap();

        let pattern = IdPattern::new(r"\|(\w+)\|").unwrap();
        let ann = Annotations::build(&table, &assoc, &pattern);
        let bp = ann.for_ontology(Ontology::BiologicalProcess).unwrap();
        assert_eq!(bp.len(), 1);
        assert_eq!(
            bp["GO:1"].iter().copied().collect::<Vec<_>>(),
            vec![10, 11]
        );
        assert_eq!(
            ann.proteins(Ontology::MolecularFunction, "GO:2")
                .map(|s| s.len()),
            Some(1)
        );
        assert!(ann.for_ontology(Ontology::CellularComponent).is_none());
        assert_eq!(ann.unresolved, 1);
        assert_eq!(ann.len(), 2);

        // Without the pattern nothing joins
        let ann = Annotations::build(&table, &assoc, &IdPattern::identity());
        assert!(ann.is_empty());
        assert_eq!(ann.unresolved, 3);
    }
}
