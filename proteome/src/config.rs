//! Analysis parameters, read from a JSON file
//!
//! ```json
//! {
//!   "significance": { "bin_size": 300, "p_value": 0.05 },
//!   "enrichment": { "ontology": "P", "p_value_go": 0.05 },
//!   "clustering": {
//!     "linkage": "average",
//!     "criterion": { "distance": 1.0 },
//!     "scope": "significant",
//!     "missing": "exclude"
//!   },
//!   "id_regex": "(.*)"
//! }
//! ```
//!
//! Every field is optional and falls back to the values shown.
use super::*;
use std::io::prelude::*;

/// Default protein id extraction pattern: the whole token
pub const DEFAULT_ID_REGEX: &str = "(.*)";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub significance: Significance,
    pub enrichment: Enrichment,
    pub clustering: Clustering,
    /// Applied to each `;`-separated protein id to recover the accession
    /// used by the association file
    pub id_regex: String,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            significance: Significance::default(),
            enrichment: Enrichment::default(),
            clustering: Clustering::default(),
            id_regex: DEFAULT_ID_REGEX.into(),
        }
    }
}

impl Parameters {
    pub fn from_json(s: &str) -> Result<Parameters> {
        let params: Parameters = serde_json::from_str(s)?;
        params.validate()?;
        Ok(params)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Parameters> {
        let mut buf = String::new();
        fs::File::open(path)?.read_to_string(&mut buf)?;
        Parameters::from_json(&buf)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.significance.validate()?;
        self.enrichment.validate()?;
        self.clustering.validate()?;
        self.id_pattern().map(drop)
    }

    pub fn id_pattern(&self) -> Result<IdPattern> {
        IdPattern::new(&self.id_regex)
    }
}
