//! Agglomerative hierarchical clustering of log-ratio profiles
//!
//! Each protein group in scope contributes one point whose coordinates are
//! its per-sample log-ratios. Points are merged pairwise by Euclidean
//! distance under the chosen [`Linkage`], producing a [`Dendrogram`] that
//! is then cut into flat clusters.
//!
//! Node ids follow the usual linkage-matrix convention: leaves are
//! `0..n`, and the cluster formed by merge `i` is node `n + i`.
use super::*;
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Closest pair of members
    Single,
    /// Farthest pair of members
    Complete,
    /// Mean of all pairwise member distances
    Average,
    /// Distance between cluster centroids
    Centroid,
}

impl Default for Linkage {
    fn default() -> Self {
        Linkage::Average
    }
}

impl FromStr for Linkage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Linkage> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Linkage::Single),
            "complete" => Ok(Linkage::Complete),
            "average" => Ok(Linkage::Average),
            "centroid" => Ok(Linkage::Centroid),
            _ => Err(Error::invalid("linkage", s)),
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Linkage::Single => "single",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
            Linkage::Centroid => "centroid",
        };
        f.write_str(s)
    }
}

/// How the dendrogram is cut into flat clusters
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// At most this many clusters
    #[serde(rename = "clusters")]
    MaxClusters(usize),
    /// Merge while the largest merge distance within a cluster is at or
    /// below the threshold
    Distance(f64),
}

impl Default for Criterion {
    fn default() -> Self {
        Criterion::Distance(1.0)
    }
}

/// Which protein groups are clustered
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    All,
    Significant,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Significant
    }
}

/// Treatment of protein groups lacking a log-ratio in some sample
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Missing {
    /// Leave the group out of clustering
    Exclude,
    /// Substitute a fixed log-ratio
    Impute(f64),
}

impl Default for Missing {
    fn default() -> Self {
        Missing::Exclude
    }
}

/// Clustering parameters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Clustering {
    pub linkage: Linkage,
    pub criterion: Criterion,
    pub scope: Scope,
    pub missing: Missing,
}

/// One agglomeration step
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Merge {
    /// Smaller of the two child node ids
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    /// Leaves under the new node
    pub size: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Dendrogram {
    /// Protein group id of each leaf
    pub leaves: Vec<u32>,
    /// `leaves.len() - 1` merges, in order
    pub merges: Vec<Merge>,
}

impl Dendrogram {
    /// Largest merge distance in the subtree of each merge
    pub fn max_dists(&self) -> Vec<f64> {
        let n = self.leaves.len();
        let mut out: Vec<f64> = Vec::with_capacity(self.merges.len());
        for m in &self.merges {
            let mut d = m.distance;
            for child in [m.left, m.right] {
                if child >= n {
                    d = d.max(out[child - n]);
                }
            }
            out.push(d);
        }
        out
    }

    /// Flat cluster id of every leaf, numbered from 1 in order of first
    /// appearance
    pub fn flatten(&self, criterion: Criterion) -> Vec<usize> {
        let n = self.leaves.len();
        let apply = match criterion {
            Criterion::MaxClusters(k) => {
                let take = n.saturating_sub(k.max(1));
                (0..self.merges.len()).map(|s| s < take).collect::<Vec<_>>()
            }
            Criterion::Distance(t) => self.max_dists().into_iter().map(|d| d <= t).collect(),
        };

        let mut parent = (0..n + self.merges.len()).collect::<Vec<usize>>();
        for (s, m) in self.merges.iter().enumerate() {
            if apply[s] {
                parent[m.left] = n + s;
                parent[m.right] = n + s;
            }
        }

        let mut ids: HashMap<usize, usize> = HashMap::new();
        (0..n)
            .map(|leaf| {
                let mut root = leaf;
                while parent[root] != root {
                    root = parent[root];
                }
                let next = ids.len() + 1;
                *ids.entry(root).or_insert(next)
            })
            .collect()
    }

    /// Leaf indices in left-to-right drawing order
    pub fn leaf_order(&self) -> Vec<usize> {
        let n = self.leaves.len();
        if self.merges.is_empty() {
            return (0..n).collect();
        }
        let mut order = Vec::with_capacity(n);
        let mut stack = vec![n + self.merges.len() - 1];
        while let Some(node) = stack.pop() {
            if node < n {
                order.push(node);
            } else {
                let m = &self.merges[node - n];
                stack.push(m.right);
                stack.push(m.left);
            }
        }
        order
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClusterResult {
    pub dendrogram: Dendrogram,
    /// Protein group id -> flat cluster id
    pub assignments: BTreeMap<u32, usize>,
    /// In-scope protein groups left out because of missing log-ratios
    pub excluded: Vec<u32>,
    /// Revision of the significance estimate used to select the scope
    pub revision: u64,
}

impl ClusterResult {
    pub fn cluster(&self, id: u32) -> Option<usize> {
        self.assignments.get(&id).copied()
    }

    /// Number of flat clusters
    pub fn len(&self) -> usize {
        self.sizes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Cluster id -> member count
    pub fn sizes(&self) -> BTreeMap<usize, usize> {
        let mut sizes = BTreeMap::new();
        for c in self.assignments.values() {
            *sizes.entry(*c).or_insert(0) += 1;
        }
        sizes
    }

    pub fn members(&self, cluster: usize) -> Vec<u32> {
        self.assignments
            .iter()
            .filter(|(_, c)| **c == cluster)
            .map(|(id, _)| *id)
            .collect()
    }
}

#[inline]
fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Upper triangle of a symmetric distance matrix
struct Condensed {
    n: usize,
    d: Vec<f64>,
}

impl Condensed {
    fn new(points: &[Vec<f64>]) -> Condensed {
        let n = points.len();
        let d = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| ((i + 1)..n).map(move |j| euclidean(&points[i], &points[j])))
            .collect();
        Condensed { n, d }
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        self.n * i - i * (i + 1) / 2 + j - i - 1
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> f64 {
        self.d[self.idx(i, j)]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, v: f64) {
        let idx = self.idx(i, j);
        self.d[idx] = v;
    }
}

/// Nearest active neighbour of `i`, lowest index on ties
fn nearest(dist: &Condensed, active: &[bool], i: usize) -> (usize, f64) {
    let mut best = (usize::MAX, f64::INFINITY);
    for k in 0..active.len() {
        if k != i && active[k] {
            let d = dist.get(i, k);
            if d < best.1 || best.0 == usize::MAX {
                best = (k, d);
            }
        }
    }
    best
}

/// Run the agglomeration over `points`, caching each cluster's nearest
/// neighbour so only rows touched by a merge are rescanned
pub fn agglomerate(points: &[Vec<f64>], linkage: Linkage) -> Vec<Merge> {
    let n = points.len();
    if n < 2 {
        return Vec::new();
    }

    let mut dist = Condensed::new(points);
    let mut active = vec![true; n];
    let mut node = (0..n).collect::<Vec<usize>>();
    let mut size = vec![1usize; n];
    let mut centroids = match linkage {
        Linkage::Centroid => points.to_vec(),
        _ => Vec::new(),
    };
    let mut nn = (0..n)
        .map(|i| nearest(&dist, &active, i))
        .collect::<Vec<_>>();

    let mut merges = Vec::with_capacity(n - 1);
    for step in 0..n - 1 {
        let mut i = usize::MAX;
        for k in 0..n {
            if active[k] && (i == usize::MAX || nn[k].1 < nn[i].1) {
                i = k;
            }
        }
        let (j, d) = nn[i];
        if j == usize::MAX {
            break;
        }

        let (si, sj) = (size[i] as f64, size[j] as f64);
        merges.push(Merge {
            left: node[i].min(node[j]),
            right: node[i].max(node[j]),
            distance: d,
            size: size[i] + size[j],
        });

        active[j] = false;
        if linkage == Linkage::Centroid {
            let merged = centroids[i]
                .iter()
                .zip(&centroids[j])
                .map(|(a, b)| (si * a + sj * b) / (si + sj))
                .collect();
            centroids[i] = merged;
        }
        for k in 0..n {
            if !active[k] || k == i {
                continue;
            }
            let (dik, djk) = (dist.get(i, k), dist.get(j, k));
            let v = match linkage {
                Linkage::Single => dik.min(djk),
                Linkage::Complete => dik.max(djk),
                Linkage::Average => (si * dik + sj * djk) / (si + sj),
                Linkage::Centroid => euclidean(&centroids[i], &centroids[k]),
            };
            dist.set(i, k, v);
        }
        size[i] += size[j];
        node[i] = n + step;

        nn[i] = nearest(&dist, &active, i);
        for k in 0..n {
            if !active[k] || k == i {
                continue;
            }
            if nn[k].0 == i || nn[k].0 == j {
                nn[k] = nearest(&dist, &active, k);
            } else {
                let d = dist.get(k, i);
                if d < nn[k].1 || (d == nn[k].1 && i < nn[k].0) {
                    nn[k] = (i, d);
                }
            }
        }
    }
    merges
}

impl Clustering {
    pub fn validate(&self) -> Result<()> {
        match self.criterion {
            Criterion::MaxClusters(0) => return Err(Error::invalid("clusters", 0)),
            Criterion::Distance(t) if !(t > 0.0) || !t.is_finite() => {
                return Err(Error::invalid("distance", t))
            }
            _ => {}
        }
        if let Missing::Impute(v) = self.missing {
            if !v.is_finite() {
                return Err(Error::invalid("missing", v));
            }
        }
        Ok(())
    }

    /// Cluster the log-ratio profiles of the protein groups in scope.
    /// [`Scope::Significant`] requires a significance estimate.
    pub fn run(
        &self,
        table: &ProteinTable,
        significance: Option<&SignificanceResult>,
    ) -> Result<ClusterResult> {
        self.validate()?;
        let in_scope = |row: usize| match (self.scope, significance) {
            (Scope::All, _) => Ok(true),
            (Scope::Significant, Some(s)) => Ok(s.is_significant(row)),
            (Scope::Significant, None) => Err(Error::NoSignificance),
        };

        let mut leaves = Vec::new();
        let mut points = Vec::new();
        let mut excluded = Vec::new();
        for (row, pg) in table.proteins().iter().enumerate() {
            if !in_scope(row)? {
                continue;
            }
            let profile = (0..table.samples().len())
                .map(|s| match (pg.log_ratio(s), self.missing) {
                    (Some(x), _) => Some(x),
                    (None, Missing::Impute(v)) => Some(v),
                    (None, Missing::Exclude) => None,
                })
                .collect::<Option<Vec<f64>>>();
            match profile {
                Some(p) => {
                    leaves.push(pg.id);
                    points.push(p);
                }
                None => excluded.push(pg.id),
            }
        }
        if !excluded.is_empty() {
            debug!(
                "{} protein groups excluded from clustering for missing log-ratios",
                excluded.len()
            );
        }

        let dendrogram = Dendrogram {
            merges: agglomerate(&points, self.linkage),
            leaves,
        };
        let flat = dendrogram.flatten(self.criterion);
        let assignments = dendrogram
            .leaves
            .iter()
            .copied()
            .zip(flat)
            .collect::<BTreeMap<u32, usize>>();

        let result = ClusterResult {
            dendrogram,
            assignments,
            excluded,
            revision: 0,
        };
        info!(
            "clustered {} protein groups into {} clusters ({} linkage)",
            result.assignments.len(),
            result.len(),
            self.linkage
        );
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::prelude::*;

    macro_rules! pts {
        ($($x:expr),+) => {
            vec![$(vec![$x]),+]
        };
    }

    fn dendrogram(points: &[Vec<f64>], linkage: Linkage) -> Dendrogram {
        Dendrogram {
            leaves: (0..points.len() as u32).collect(),
            merges: agglomerate(points, linkage),
        }
    }

    #[test]
    fn linkage_distances() {
        let points = pts!(0.0, 1.0, 5.0);
        let expected = [
            (Linkage::Single, 4.0),
            (Linkage::Complete, 5.0),
            (Linkage::Average, 4.5),
            (Linkage::Centroid, 4.5),
        ];
        for (linkage, d) in expected {
            let merges = agglomerate(&points, linkage);
            assert_eq!(
                merges[0],
                Merge {
                    left: 0,
                    right: 1,
                    distance: 1.0,
                    size: 2
                }
            );
            assert_eq!(merges[1].left, 2);
            assert_eq!(merges[1].right, 3);
            assert_eq!(merges[1].size, 3);
            assert!((merges[1].distance - d).abs() < 1e-12, "{:?}", linkage);
        }
    }

    #[test]
    fn cut_by_count() {
        let points = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![10.0, 10.0],
            vec![10.0, 11.0],
            vec![0.0, 0.5],
        ];
        let d = dendrogram(&points, Linkage::Average);
        assert_eq!(d.merges.len(), 4);
        assert_eq!(d.flatten(Criterion::MaxClusters(2)), vec![1, 1, 2, 2, 1]);
        assert_eq!(d.flatten(Criterion::MaxClusters(1)), vec![1; 5]);
        assert_eq!(d.flatten(Criterion::MaxClusters(10)), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn cut_by_distance() {
        let d = dendrogram(&pts!(0.0, 1.0, 3.0, 7.0), Linkage::Single);
        assert_eq!(d.flatten(Criterion::Distance(1.5)), vec![1, 1, 2, 3]);
        assert_eq!(d.flatten(Criterion::Distance(2.0)), vec![1, 1, 1, 2]);
        assert_eq!(d.flatten(Criterion::Distance(100.0)), vec![1, 1, 1, 1]);
        assert_eq!(d.max_dists(), vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn leaf_order() {
        let d = dendrogram(&pts!(0.0, 1.0, 5.0), Linkage::Average);
        assert_eq!(d.leaf_order(), vec![2, 0, 1]);
        let d = dendrogram(&pts!(3.0), Linkage::Average);
        assert!(d.merges.is_empty());
        assert_eq!(d.leaf_order(), vec![0]);
        assert_eq!(d.flatten(Criterion::Distance(1.0)), vec![1]);
    }

    #[test]
    fn deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        let points = (0..200)
            .map(|_| (0..3).map(|_| rng.gen_range(-3.0..3.0)).collect())
            .collect::<Vec<Vec<f64>>>();
        for linkage in [
            Linkage::Single,
            Linkage::Complete,
            Linkage::Average,
            Linkage::Centroid,
        ] {
            let a = dendrogram(&points, linkage);
            let b = dendrogram(&points, linkage);
            assert_eq!(a, b);
            assert_eq!(a.merges.len(), 199);
            assert_eq!(a.merges.last().map(|m| m.size), Some(200));
            let flat = a.flatten(Criterion::MaxClusters(8));
            assert_eq!(flat.iter().max(), Some(&8));
            assert_eq!(flat, b.flatten(Criterion::MaxClusters(8)));
        }
    }

    fn table() -> ProteinTable {
        let q = |r: Option<f64>| Quant::new(r.map(f64::exp2), 1.0);
        ProteinTable::new(
            vec!["A".into(), "B".into()],
            vec![
                ProteinGroup::new(1, "P1", vec![q(Some(0.0)), q(Some(0.0))]),
                ProteinGroup::new(2, "P2", vec![q(Some(0.1)), q(Some(0.0))]),
                ProteinGroup::new(3, "P3", vec![q(Some(4.0)), q(None)]),
                ProteinGroup::new(4, "P4", vec![q(Some(4.0)), q(Some(4.0))]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn scope_and_missing() {
        let t = table();
        let params = Clustering {
            scope: Scope::All,
            criterion: Criterion::MaxClusters(2),
            ..Clustering::default()
        };
        let res = params.run(&t, None).unwrap();
        assert_eq!(res.excluded, vec![3]);
        assert_eq!(res.assignments.len(), 3);
        assert_eq!(res.cluster(1), res.cluster(2));
        assert_ne!(res.cluster(1), res.cluster(4));
        assert_eq!(res.cluster(3), None);
        assert_eq!(res.sizes().values().sum::<usize>(), 3);
        assert_eq!(res.members(1), vec![1, 2]);

        let params = Clustering {
            missing: Missing::Impute(0.0),
            ..params
        };
        let res = params.run(&t, None).unwrap();
        assert!(res.excluded.is_empty());
        assert_eq!(res.assignments.len(), 4);

        let res = Clustering::default().run(&t, None);
        assert!(matches!(res, Err(Error::NoSignificance)));

        let sig = SignificanceResult {
            threshold: 0.05,
            bin_size: 300,
            samples: Vec::new(),
            significant: vec![true, false, true, true],
        };
        let res = Clustering::default().run(&t, Some(&sig)).unwrap();
        assert_eq!(res.dendrogram.leaves, vec![1, 4]);
        assert_eq!(res.excluded, vec![3]);
    }

    #[test]
    fn parse_params() {
        assert_eq!("Centroid".parse::<Linkage>().unwrap(), Linkage::Centroid);
        assert!("ward".parse::<Linkage>().is_err());

        let c: Clustering = serde_json::from_str(
            r#"{"linkage": "complete", "criterion": {"clusters": 4}, "missing": {"impute": 0.0}}"#,
        )
        .unwrap();
        assert_eq!(c.linkage, Linkage::Complete);
        assert_eq!(c.criterion, Criterion::MaxClusters(4));
        assert_eq!(c.scope, Scope::Significant);
        assert_eq!(c.missing, Missing::Impute(0.0));

        let c: Clustering = serde_json::from_str(r#"{"criterion": {"distance": 2.5}}"#).unwrap();
        assert_eq!(c.criterion, Criterion::Distance(2.5));
        assert_eq!(c.missing, Missing::Exclude);

        let bad = Clustering {
            criterion: Criterion::Distance(0.0),
            ..Clustering::default()
        };
        assert!(bad.validate().is_err());
        let bad = Clustering {
            criterion: Criterion::MaxClusters(0),
            ..Clustering::default()
        };
        assert!(bad.validate().is_err());
    }
}
