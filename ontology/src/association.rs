//! Utilities for parsing protein -> GO term annotations from a gene
//! association (GAF) file
//!
//! Lines starting with `!` are comments. Of the tab-delimited columns only
//! the protein accession (column 1), the qualifier (column 3), the GO id
//! (column 4) and the aspect letter (column 8) are read. Annotations with
//! a `NOT` qualifier are skipped.

use super::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;
use std::str;

const ACCESSION: usize = 1;
const QUALIFIER: usize = 3;
const GO_ID: usize = 4;
const ASPECT: usize = 8;

#[derive(Clone, Default, Debug, PartialEq)]
/// Many-to-many mapping of protein accessions to GO terms
pub struct Associations {
    inner: BTreeMap<String, BTreeSet<(Ontology, String)>>,
}

impl Associations {
    pub fn new() -> Associations {
        Associations::default()
    }

    pub fn insert<A: Into<String>, T: Into<String>>(
        &mut self,
        accession: A,
        term: T,
        ontology: Ontology,
    ) {
        self.inner
            .entry(accession.into())
            .or_insert_with(BTreeSet::new)
            .insert((ontology, term.into()));
    }

    /// Number of annotated accessions
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn accessions(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    /// All GO terms annotated to `accession`, in any ontology
    pub fn terms<'a>(&'a self, accession: &str) -> impl Iterator<Item = (Ontology, &'a str)> {
        self.inner
            .get(accession)
            .into_iter()
            .flat_map(|set| set.iter().map(|(o, t)| (*o, t.as_str())))
    }

    /// GO terms of a single ontology annotated to `accession`
    pub fn terms_for<'a>(
        &'a self,
        accession: &str,
        ontology: Ontology,
    ) -> impl Iterator<Item = &'a str> {
        self.terms(accession)
            .filter(move |(o, _)| *o == ontology)
            .map(|(_, t)| t)
    }
}

fn column<'a>(fields: &[&'a str], idx: usize, line: usize) -> Result<&'a str> {
    fields
        .get(idx)
        .copied()
        .ok_or_else(|| Error::parse(line, format!("expected at least {} columns", ASPECT + 1)))
}

/// Parse the contents of a gene association file
pub fn parse(input: &str) -> Result<Associations> {
    let mut ann = Associations::default();
    let mut skipped = 0;

    for (idx, line) in Pitchfork::new(b'\n', input.as_bytes()).enumerate() {
        let line_no = idx + 1;
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.iter().all(u8::is_ascii_whitespace) || line.starts_with(b"!") {
            continue;
        }

        let fields = Pitchfork::new(b'\t', line)
            .map(str::from_utf8)
            .collect::<std::result::Result<Vec<&str>, _>>()
            .map_err(|_| Error::parse(line_no, "invalid UTF-8"))?;
        let accession = column(&fields, ACCESSION, line_no)?;
        let qualifier = column(&fields, QUALIFIER, line_no)?;
        let term = column(&fields, GO_ID, line_no)?;
        let aspect = column(&fields, ASPECT, line_no)?;

        if qualifier.split('|').any(|q| q == "NOT") {
            skipped += 1;
            continue;
        }

        let ontology = aspect
            .chars()
            .next()
            .and_then(Ontology::from_letter)
            .ok_or_else(|| Error::parse(line_no, format!("unknown aspect '{}'", aspect)))?;

        ann.insert(accession, term, ontology);
    }

    debug!(
        "parsed associations for {} accessions ({} NOT annotations skipped)",
        ann.len(),
        skipped
    );
    Ok(ann)
}

/// Load a gene association file from disk
pub fn load<P: AsRef<Path>>(path: P) -> Result<Associations> {
    let mut buf = String::new();
    File::open(path)?.read_to_string(&mut buf)?;
    parse(&buf)
}

#[cfg(test)]
mod test {
    use super::*;

    const GAF: &str = "!gaf-version: 2.1
!generated-by: UniProt
UniProtKB\tP04637\tTP53\t\tGO:0006915\tPMID:1\tIDA\t\tP\tCellular tumor antigen p53\t\tprotein\ttaxon:9606\t20200101\tUniProt
UniProtKB\tP04637\tTP53\t\tGO:0005634\tPMID:1\tIDA\t\tC\tCellular tumor antigen p53\t\tprotein\ttaxon:9606\t20200101\tUniProt
UniProtKB\tP04637\tTP53\t\tGO:0006915\tPMID:2\tTAS\t\tP\tCellular tumor antigen p53\t\tprotein\ttaxon:9606\t20200101\tUniProt
UniProtKB\tQ00987\tMDM2\tNOT\tGO:0006915\tPMID:3\tIDA\t\tP\tE3 ubiquitin-protein ligase\t\tprotein\ttaxon:9606\t20200101\tUniProt
UniProtKB\tQ00987\tMDM2\t\tGO:0004842\tPMID:3\tIDA\t\tF\tE3 ubiquitin-protein ligase\t\tprotein\ttaxon:9606\t20200101\tUniProt
";

    #[test]
    fn parse_gaf() {
        let ann = parse(GAF).unwrap();
        assert_eq!(ann.len(), 2);
        assert_eq!(
            ann.terms_for("P04637", Ontology::BiologicalProcess)
                .collect::<Vec<_>>(),
            vec!["GO:0006915"]
        );
        assert_eq!(ann.terms("P04637").count(), 2);
        assert_eq!(
            ann.terms_for("Q00987", Ontology::BiologicalProcess).count(),
            0
        );
        assert_eq!(
            ann.terms_for("Q00987", Ontology::MolecularFunction)
                .collect::<Vec<_>>(),
            vec!["GO:0004842"]
        );
        assert_eq!(ann.terms("XXXXXX").count(), 0);
    }

    #[test]
    fn short_row() {
        match parse("UniProtKB\tP04637\tTP53\n") {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 1),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn crlf_and_empty_fields() {
        let ann = parse("!comment\r\nDB\tP9\tS\t\tGO:7\tREF\tIDA\t\tF\r\n\r\n").unwrap();
        assert_eq!(
            ann.terms_for("P9", Ontology::MolecularFunction)
                .collect::<Vec<_>>(),
            vec!["GO:7"]
        );
    }

    #[test]
    fn unknown_aspect() {
        assert!(parse("DB\tP1\tS\t\tGO:1\t\t\t\tX\n").is_err());
    }
}
