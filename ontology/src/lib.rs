//! In-memory Gene Ontology term hierarchy and protein annotations
//!
//! # Data sources
//!
//! The term hierarchy is read from an OBO flat file (see [`obo`]), and
//! protein annotations are read from a tab-delimited gene association
//! file (see [`association`]).
//!
//! ```text
//! $ head go-basic.obo
//! [Term]
//! id: GO:0006915
//! name: apoptotic process
//! namespace: biological_process
//! is_a: GO:0012501 ! programmed cell death
//! ...
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! # use ontology::*;
//! let dag: GoDag = match obo::load("go-basic.obo") {
//!     Ok(dag) => dag,
//!     Err(e) => panic!("Error loading GO database: {}", e),
//! };
//! let ancestors = dag.ancestors("GO:0006915").unwrap();
//! ```
//!
//! Terms are stored in an id-keyed adjacency map rather than as an object
//! graph, and a term may have any number of parents.

pub mod association;
mod error;
pub mod obo;

pub use association::Associations;
pub use error::{Error, Result};

use memchr::{memchr_iter, Memchr};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Generalized wrapper around [`Memchr`] iterator for splitting `&[u8]` slices
/// by a byte.
pub(crate) struct Pitchfork<'a> {
    pos: usize,
    haystack: &'a [u8],
    inner: Memchr<'a>,
}

impl<'a> Pitchfork<'a> {
    pub fn new(needle: u8, haystack: &'a [u8]) -> Self {
        Self {
            pos: 0,
            haystack,
            inner: memchr_iter(needle, haystack),
        }
    }
}

impl<'a> Iterator for Pitchfork<'a> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let end = match self.inner.next() {
            Some(e) => e,
            None => {
                if self.pos < self.haystack.len() {
                    self.haystack.len()
                } else {
                    return None;
                }
            }
        };
        let slice = &self.haystack[self.pos..end];
        self.pos = end + 1;
        Some(slice)
    }
}

/// One of the three GO sub-ontologies
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ontology {
    MolecularFunction,
    BiologicalProcess,
    CellularComponent,
}

impl Ontology {
    pub const ALL: [Ontology; 3] = [
        Ontology::MolecularFunction,
        Ontology::BiologicalProcess,
        Ontology::CellularComponent,
    ];

    /// Aspect letter used in gene association files
    pub fn letter(self) -> char {
        match self {
            Ontology::MolecularFunction => 'F',
            Ontology::BiologicalProcess => 'P',
            Ontology::CellularComponent => 'C',
        }
    }

    /// Id of the root term of this ontology
    pub fn root(self) -> &'static str {
        match self {
            Ontology::MolecularFunction => "GO:0003674",
            Ontology::BiologicalProcess => "GO:0008150",
            Ontology::CellularComponent => "GO:0005575",
        }
    }

    /// OBO `namespace:` value
    pub fn namespace(self) -> &'static str {
        match self {
            Ontology::MolecularFunction => "molecular_function",
            Ontology::BiologicalProcess => "biological_process",
            Ontology::CellularComponent => "cellular_component",
        }
    }

    pub fn from_letter(letter: char) -> Option<Ontology> {
        match letter.to_ascii_uppercase() {
            'F' => Some(Ontology::MolecularFunction),
            'P' => Some(Ontology::BiologicalProcess),
            'C' => Some(Ontology::CellularComponent),
            _ => None,
        }
    }

    pub fn from_namespace(namespace: &str) -> Option<Ontology> {
        Ontology::ALL
            .iter()
            .copied()
            .find(|o| o.namespace() == namespace)
    }
}

impl fmt::Display for Ontology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Ontology::MolecularFunction => "Molecular Function",
            Ontology::BiologicalProcess => "Biological Process",
            Ontology::CellularComponent => "Cellular Component",
        };
        write!(f, "{}", name)
    }
}

/// Accepts the aspect letter (`"P"`), the OBO namespace
/// (`"biological_process"`) or the display name (`"Biological Process"`),
/// ignoring case.
impl FromStr for Ontology {
    type Err = Error;

    fn from_str(s: &str) -> Result<Ontology> {
        let s = s.trim();
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ontology::from_letter(c).ok_or_else(|| Error::UnknownOntology(s.into()));
        }
        let normalized = s.to_ascii_lowercase().replace(' ', "_");
        Ontology::from_namespace(&normalized).ok_or_else(|| Error::UnknownOntology(s.into()))
    }
}

impl Serialize for Ontology {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.letter().encode_utf8(&mut [0; 4]))
    }
}

impl<'de> Deserialize<'de> for Ontology {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq)]
/// A node in the GO hierarchy
pub struct Term {
    /// Stable GO identifier, e.g. `GO:0006915`
    pub id: String,
    pub name: String,
    pub ontology: Ontology,
    /// Ids of direct `is_a`/`part_of` parents
    pub parents: BTreeSet<String>,
    /// Ids of direct children, filled in by [`GoDag::new`]
    pub children: BTreeSet<String>,
    /// Secondary ids that resolve to this term
    pub alt_ids: Vec<String>,
}

impl Term {
    pub fn new<S: Into<String>>(id: S, name: S, ontology: Ontology) -> Term {
        Term {
            id: id.into(),
            name: name.into(),
            ontology,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
            alt_ids: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
/// Directed acyclic graph of GO terms, keyed by term id
pub struct GoDag {
    terms: HashMap<String, Term>,
    /// alt_id -> primary id
    alt: HashMap<String, String>,
}

impl GoDag {
    /// Build the hierarchy from a set of terms, deriving the child edges
    /// from each term's parents. Parent ids that do not resolve to a term
    /// are kept on the child but produce no edge.
    pub fn new<I: IntoIterator<Item = Term>>(terms: I) -> GoDag {
        let mut terms = terms
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect::<HashMap<String, Term>>();

        let mut edges = Vec::new();
        for term in terms.values_mut() {
            term.children.clear();
        }
        for term in terms.values() {
            for parent in &term.parents {
                edges.push((parent.clone(), term.id.clone()));
            }
        }
        for (parent, child) in edges {
            match terms.get_mut(&parent) {
                Some(t) => {
                    t.children.insert(child);
                }
                None => debug!("term {} references unknown parent {}", child, parent),
            }
        }

        let alt = terms
            .values()
            .flat_map(|t| t.alt_ids.iter().map(move |a| (a.clone(), t.id.clone())))
            .collect();

        GoDag { terms, alt }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Look up a term by its primary or alternative id
    pub fn get(&self, id: &str) -> Option<&Term> {
        self.terms
            .get(id)
            .or_else(|| self.terms.get(self.alt.get(id)?))
    }

    /// Look up a term by its primary or alternative id, failing with
    /// [`Error::NotFound`] if it is unknown
    pub fn term(&self, id: &str) -> Result<&Term> {
        self.get(id).ok_or_else(|| Error::NotFound(id.into()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.values()
    }

    /// All terms belonging to `ontology`
    pub fn ontology(&self, ontology: Ontology) -> impl Iterator<Item = &Term> {
        self.terms.values().filter(move |t| t.ontology == ontology)
    }

    /// Direct parents of a term
    pub fn parents(&self, id: &str) -> Result<&BTreeSet<String>> {
        Ok(&self.term(id)?.parents)
    }

    /// Direct children of a term
    pub fn children(&self, id: &str) -> Result<&BTreeSet<String>> {
        Ok(&self.term(id)?.children)
    }

    /// Transitive closure over the parent edges of a term, not including
    /// the term itself. Every ancestor is visited once, no matter how many
    /// paths lead to it.
    pub fn ancestors(&self, id: &str) -> Result<BTreeSet<&str>> {
        Ok(self
            .ancestor_edges(id)?
            .into_iter()
            .map(|(_, parent)| parent)
            .collect())
    }

    /// Every `(child, parent)` edge on a path from the term up to its
    /// root. This is the subgraph drawn when a single term is inspected.
    pub fn ancestor_edges(&self, id: &str) -> Result<BTreeSet<(&str, &str)>> {
        let start = self.term(id)?;
        let mut edges = BTreeSet::new();
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&Term> = VecDeque::new();
        visited.insert(&start.id);
        queue.push_back(start);

        while let Some(term) = queue.pop_front() {
            for parent in &term.parents {
                let parent = match self.terms.get(parent) {
                    Some(p) => p,
                    None => continue,
                };
                edges.insert((term.id.as_str(), parent.id.as_str()));
                if visited.insert(&parent.id) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(edges)
    }
}
