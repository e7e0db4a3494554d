//! Structs and methods for loading a MaxQuant `proteinGroups.txt` export
//!
//! Sample names are taken from the `Ratio H/L normalized <NAME>` headers;
//! each sample must also have an `Intensity <NAME>` column.
use super::*;
use memchr::{memchr_iter, Memchr};
use std::io::prelude::*;
use std::str;

const ID: &str = "id";
const PROTEIN_IDS: &str = "Majority protein IDs";
const REVERSE: &str = "Reverse";
const CONTAMINANT: [&str; 2] = ["Potential contaminant", "Contaminant"];
const RATIO: &str = "Ratio H/L normalized ";
const INTENSITY: &str = "Intensity ";

/// Generalized wrapper around [`Memchr`] iterator for splitting `&[u8]` slices
/// by a byte.
struct Pitchfork<'a> {
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

/// Column positions resolved from the header line
struct Columns {
    id: usize,
    protein_ids: usize,
    reverse: usize,
    contaminant: usize,
    /// (name, ratio column, intensity column)
    samples: Vec<(String, usize, usize)>,
}

impl Columns {
    fn resolve(header: &[&str]) -> Result<Columns> {
        let find = |name: &str| header.iter().position(|h| *h == name);
        let mut missing = Vec::new();
        let mut require = |name: &str| {
            let idx = find(name);
            if idx.is_none() {
                missing.push(name.to_string());
            }
            idx.unwrap_or_default()
        };

        let id = require(ID);
        let protein_ids = require(PROTEIN_IDS);
        let reverse = require(REVERSE);
        let contaminant = match CONTAMINANT.iter().find_map(|c| find(c)) {
            Some(idx) => idx,
            None => {
                missing.push(CONTAMINANT[0].to_string());
                0
            }
        };

        let mut samples = Vec::new();
        for (idx, h) in header.iter().enumerate() {
            if let Some(name) = h.strip_prefix(RATIO) {
                let intensity = format!("{}{}", INTENSITY, name);
                match find(&intensity) {
                    Some(i) => samples.push((name.to_string(), idx, i)),
                    None => missing.push(intensity),
                }
            }
        }
        if samples.is_empty() && !missing.iter().any(|m| m.starts_with(INTENSITY)) {
            missing.push(format!("{}<NAME>", RATIO));
        }

        if !missing.is_empty() {
            return Err(Error::MissingColumns(missing));
        }
        Ok(Columns {
            id,
            protein_ids,
            reverse,
            contaminant,
            samples,
        })
    }
}

/// Split one line into its tab-delimited fields, dropping a trailing `\r`
fn split_fields(line: &[u8]) -> Option<Vec<&str>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Pitchfork::new(b'\t', line)
        .map(|field| str::from_utf8(field).ok())
        .collect()
}

fn ratio(s: &str) -> Option<Option<f64>> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Some(None);
    }
    s.parse::<f64>().ok().map(Some)
}

fn intensity(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Some(0.0);
    }
    s.parse::<f64>().ok().filter(|x| !x.is_nan())
}

/// Protein groups exactly as read from disk, before any filtering
#[derive(Clone, Debug, PartialEq)]
pub struct Raw {
    pub samples: Vec<String>,
    pub rows: Vec<ProteinGroup>,
    pub path: Option<PathBuf>,
}

impl Raw {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Raw> {
        let mut buffer = Vec::new();
        fs::File::open(path.as_ref())?.read_to_end(&mut buffer)?;
        let mut raw = Raw::parse(&buffer)?;
        raw.path = Some(path.as_ref().to_path_buf());
        Ok(raw)
    }

    /// Parse a tab-delimited protein groups table. Either every row loads or
    /// an error is returned.
    pub fn parse(buf: &[u8]) -> Result<Raw> {
        let mut lines = Pitchfork::new(b'\n', buf).enumerate();
        let header = lines.next().map(|(_, line)| line).unwrap_or_default();
        let header = split_fields(header).ok_or_else(|| Error::Parse {
            line: 1,
            column: "header".into(),
        })?;
        let cols = Columns::resolve(&header)?;

        let mut rows = Vec::new();
        for (idx, line) in lines {
            let line_no = idx + 1;
            let err = |column: &str| Error::Parse {
                line: line_no,
                column: column.into(),
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let fields = split_fields(line).ok_or_else(|| err("line"))?;
            let field = |idx: usize, name: &str| fields.get(idx).copied().ok_or_else(|| err(name));
            // A trailing empty field is not yielded by the splitter
            let blank = |idx: usize| fields.get(idx).copied().unwrap_or_default();

            let id = field(cols.id, ID)?
                .trim()
                .parse::<u32>()
                .map_err(|_| err(ID))?;

            let mut quant = Vec::with_capacity(cols.samples.len());
            for (name, r, i) in &cols.samples {
                let ratio_col = || format!("{}{}", RATIO, name);
                let intensity_col = || format!("{}{}", INTENSITY, name);
                let r = ratio(blank(*r)).ok_or_else(|| err(&ratio_col()))?;
                let i = intensity(blank(*i)).ok_or_else(|| err(&intensity_col()))?;
                quant.push(Quant::new(r, i));
            }

            let mut pg = ProteinGroup::new(id, field(cols.protein_ids, PROTEIN_IDS)?, quant);
            pg.reverse = blank(cols.reverse).trim() == "+";
            pg.contaminant = blank(cols.contaminant).trim() == "+";
            rows.push(pg);
        }

        debug!(
            "parsed {} protein groups across {} samples",
            rows.len(),
            cols.samples.len()
        );
        Ok(Raw {
            samples: cols.samples.into_iter().map(|(name, _, _)| name).collect(),
            rows,
            path: None,
        })
    }

    /// Build a [`ProteinTable`], dropping rows rejected by `filter`
    pub fn table(self, filter: &Filter) -> Result<ProteinTable> {
        let total = self.rows.len();
        let table = ProteinTable::new(self.samples, self.rows)?.filter(filter);
        info!(
            "loaded {} of {} protein groups ({} removed by filters)",
            table.len(),
            total,
            total - table.len()
        );
        Ok(table)
    }
}
