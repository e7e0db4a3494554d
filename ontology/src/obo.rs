//! Utilities for loading the GO term hierarchy from an OBO flat file
//!
//! Only `[Term]` stanzas are read. Within a stanza the `id`, `name`,
//! `namespace`, `alt_id`, `is_a`, `relationship: part_of` and
//! `is_obsolete` tags are used; everything else is ignored. Obsolete terms
//! are dropped.
use super::*;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;
use std::str;

#[derive(Default, Debug)]
struct Stanza {
    line: usize,
    id: Option<String>,
    name: String,
    namespace: Option<String>,
    parents: BTreeSet<String>,
    alt_ids: Vec<String>,
    obsolete: bool,
}

impl Stanza {
    fn new(line: usize) -> Stanza {
        Stanza {
            line,
            ..Stanza::default()
        }
    }

    fn tag(&mut self, key: &str, value: &str) {
        match key {
            "id" => self.id = Some(value.into()),
            "name" => self.name = value.into(),
            "namespace" => self.namespace = Some(value.into()),
            "alt_id" => self.alt_ids.push(value.into()),
            "is_a" => {
                self.parents.insert(value.into());
            }
            "relationship" => {
                let mut rel = value.split_whitespace();
                if let (Some("part_of"), Some(parent)) = (rel.next(), rel.next()) {
                    self.parents.insert(parent.into());
                }
            }
            "is_obsolete" => self.obsolete = value == "true",
            _ => {}
        }
    }

    fn finish(self) -> Result<Option<Term>> {
        if self.obsolete {
            return Ok(None);
        }
        let id = self
            .id
            .ok_or_else(|| Error::parse(self.line, "[Term] stanza without id"))?;
        let namespace = self
            .namespace
            .ok_or_else(|| Error::parse(self.line, format!("{} has no namespace", id)))?;
        let ontology = Ontology::from_namespace(&namespace).ok_or_else(|| {
            Error::parse(self.line, format!("{} has unknown namespace {}", id, namespace))
        })?;

        Ok(Some(Term {
            id,
            name: self.name,
            ontology,
            parents: self.parents,
            children: BTreeSet::new(),
            alt_ids: self.alt_ids,
        }))
    }
}

/// Split a `tag: value ! comment` line into its tag and value
fn split_tag(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let key = line[..colon].trim();
    let mut value = &line[colon + 1..];
    if let Some(bang) = value.find(" !") {
        value = &value[..bang];
    }
    Some((key, value.trim()))
}

/// Parse the contents of an OBO file into a [`GoDag`]
pub fn parse(input: &str) -> Result<GoDag> {
    let mut terms = Vec::new();
    let mut current: Option<Stanza> = None;

    for (idx, line) in Pitchfork::new(b'\n', input.as_bytes()).enumerate() {
        let line_no = idx + 1;
        let line = str::from_utf8(line)
            .map_err(|_| Error::parse(line_no, "invalid UTF-8"))?
            .trim();

        if line.is_empty() || line.starts_with('!') {
            continue;
        }

        if line.starts_with('[') {
            if let Some(stanza) = current.take() {
                terms.extend(stanza.finish()?);
            }
            if line == "[Term]" {
                current = Some(Stanza::new(line_no));
            }
            continue;
        }

        // Header tags and non-Term stanzas fall through here
        if let Some(stanza) = current.as_mut() {
            if let Some((key, value)) = split_tag(line) {
                stanza.tag(key, value);
            }
        }
    }

    if let Some(stanza) = current.take() {
        terms.extend(stanza.finish()?);
    }

    debug!("parsed {} GO terms", terms.len());
    Ok(GoDag::new(terms))
}

/// Build a [`GoDag`] from an OBO file on disk
pub fn load<P: AsRef<Path>>(path: P) -> Result<GoDag> {
    let mut buf = String::new();
    File::open(path)?.read_to_string(&mut buf)?;
    parse(&buf)
}

#[cfg(test)]
mod test {
    use super::*;

    const OBO: &str = "format-version: 1.2
ontology: go

[Term]
id: GO:0008150
name: biological_process
namespace: biological_process
alt_id: GO:0000004

[Term]
id: GO:0009987
name: cellular process
namespace: biological_process
is_a: GO:0008150 ! biological_process

[Term]
id: GO:0006915
name: apoptotic process
namespace: biological_process
is_a: GO:0009987 ! cellular process
relationship: part_of GO:0008219 ! cell death

[Term]
id: GO:0008219
name: cell death
namespace: biological_process
is_a: GO:0009987 ! cellular process

[Term]
id: GO:0000001
name: mitochondrion inheritance
namespace: biological_process
is_obsolete: true

[Typedef]
id: part_of
name: part of
";

    #[test]
    fn parse_terms() {
        let dag = parse(OBO).unwrap();
        assert_eq!(dag.len(), 4);
        let apoptosis = dag.term("GO:0006915").unwrap();
        assert_eq!(apoptosis.name, "apoptotic process");
        assert_eq!(apoptosis.ontology, Ontology::BiologicalProcess);
        assert_eq!(
            apoptosis.parents.iter().collect::<Vec<_>>(),
            vec!["GO:0008219", "GO:0009987"]
        );
        assert!(dag.get("GO:0000001").is_none());
        assert_eq!(dag.term("GO:0000004").unwrap().id, "GO:0008150");
    }

    #[test]
    fn parse_ancestors() {
        let dag = parse(OBO).unwrap();
        let anc = dag.ancestors("GO:0006915").unwrap();
        assert_eq!(
            anc.into_iter().collect::<Vec<_>>(),
            vec!["GO:0008150", "GO:0008219", "GO:0009987"]
        );
    }

    #[test]
    fn crlf_and_comments() {
        let input = "[Term]\r\nid: GO:0005575\r\nname: cellular_component\r\nnamespace: cellular_component ! root\r\n";
        let dag = parse(input).unwrap();
        assert_eq!(
            dag.term("GO:0005575").unwrap().ontology,
            Ontology::CellularComponent
        );
    }

    #[test]
    fn missing_namespace() {
        let input = "[Term]\nid: GO:0005575\nname: cellular_component\n";
        match parse(input) {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 1),
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(OBO.as_bytes()).unwrap();
        let dag = load(file.path()).unwrap();
        assert_eq!(dag.ontology(Ontology::BiologicalProcess).count(), 4);
    }
}
