use anyhow::{Context, Result};
use clap::Parser;
use proteome::*;
use std::fs;
use std::io::{self, prelude::*, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Log progress every this many enrichment steps
const PROGRESS: usize = 1000;

#[derive(Parser, Debug)]
#[command(version, about = "Significance, GO enrichment and clustering of SILAC protein ratios")]
struct Args {
    /// MaxQuant proteinGroups.txt
    proteins: PathBuf,

    /// GO hierarchy in OBO format
    #[arg(long, requires = "associations")]
    obo: Option<PathBuf>,

    /// Gene association (GAF) file
    #[arg(long, requires = "obo")]
    associations: Option<PathBuf>,

    /// JSON parameter file; flags below override its values
    #[arg(long)]
    params: Option<PathBuf>,

    /// Restrict the analysis to these samples
    #[arg(long, value_delimiter = ',')]
    samples: Vec<String>,

    /// Label-swapped samples whose ratios are inverted
    #[arg(long, value_delimiter = ',')]
    swap: Vec<String>,

    #[arg(long)]
    bin_size: Option<usize>,

    #[arg(long)]
    p_value: Option<f64>,

    /// P, F or C
    #[arg(long)]
    ontology: Option<Ontology>,

    #[arg(long)]
    p_value_go: Option<f64>,

    /// single, complete, average or centroid
    #[arg(long)]
    linkage: Option<Linkage>,

    /// Cut the dendrogram into at most this many clusters
    #[arg(long, conflicts_with = "distance")]
    clusters: Option<usize>,

    /// Cut the dendrogram at this distance
    #[arg(long)]
    distance: Option<f64>,

    /// Cluster every protein group, not only significant ones
    #[arg(long)]
    all: bool,

    /// Log-ratio substituted for missing values when clustering
    #[arg(long)]
    impute: Option<f64>,

    #[arg(long)]
    id_regex: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out: PathBuf,
}

impl Args {
    fn parameters(&self) -> Result<Parameters> {
        let mut p = match &self.params {
            Some(path) => Parameters::load(path)
                .with_context(|| format!("reading parameters from {}", path.display()))?,
            None => Parameters::default(),
        };
        if let Some(v) = self.bin_size {
            p.significance.bin_size = v;
        }
        if let Some(v) = self.p_value {
            p.significance.p_value = v;
        }
        if let Some(v) = self.ontology {
            p.enrichment.ontology = v;
        }
        if let Some(v) = self.p_value_go {
            p.enrichment.p_value = v;
        }
        if let Some(v) = self.linkage {
            p.clustering.linkage = v;
        }
        if let Some(k) = self.clusters {
            p.clustering.criterion = Criterion::MaxClusters(k);
        }
        if let Some(t) = self.distance {
            p.clustering.criterion = Criterion::Distance(t);
        }
        if self.all {
            p.clustering.scope = Scope::All;
        }
        if let Some(v) = self.impute {
            p.clustering.missing = Missing::Impute(v);
        }
        if let Some(re) = &self.id_regex {
            p.id_regex = re.clone();
        }
        p.validate()?;
        Ok(p)
    }
}

fn create<P: AsRef<Path>>(dir: P, name: &str) -> io::Result<BufWriter<fs::File>> {
    Ok(BufWriter::new(fs::File::create(dir.as_ref().join(name))?))
}

fn fmt_p(p: Option<f64>) -> String {
    p.map(|p| format!("{:e}", p)).unwrap_or_default()
}

fn write_significance<W: Write>(mut f: W, table: &ProteinTable, sig: &SignificanceResult) -> io::Result<()> {
    write!(f, "id\tprotein_ids")?;
    for s in table.samples() {
        write!(f, "\tlog_ratio {}\tp_value {}", s, s)?;
    }
    writeln!(f, "\tmin_p_value\tsignificant")?;

    for (row, pg) in table.proteins().iter().enumerate() {
        write!(f, "{}\t{}", pg.id, pg.protein_ids.join(";"))?;
        for s in 0..table.samples().len() {
            let lr = pg.log_ratio(s).map(|x| x.to_string()).unwrap_or_default();
            write!(f, "\t{}\t{}", lr, fmt_p(sig.p_value(row, s)))?;
        }
        writeln!(
            f,
            "\t{}\t{}",
            fmt_p(sig.min_p_value(row)),
            sig.is_significant(row)
        )?;
    }
    f.flush()
}

fn write_clusters<W: Write>(mut f: W, table: &ProteinTable, clusters: &ClusterResult) -> io::Result<()> {
    writeln!(f, "id\tprotein\tcluster")?;
    for (id, cluster) in &clusters.assignments {
        let protein = table
            .get(*id)
            .and_then(|pg| pg.representative())
            .unwrap_or_default();
        writeln!(f, "{}\t{}\t{}", id, protein, cluster)?;
    }
    f.flush()
}

fn write_dendrogram<W: Write>(mut f: W, dendrogram: &Dendrogram) -> io::Result<()> {
    writeln!(f, "node\tleft\tright\tdistance\tsize")?;
    let n = dendrogram.leaves.len();
    for (i, m) in dendrogram.merges.iter().enumerate() {
        writeln!(f, "{}\t{}\t{}\t{}\t{}", n + i, m.left, m.right, m.distance, m.size)?;
    }
    f.flush()
}

fn write_enrichment<W: Write>(mut f: W, table: &ProteinTable, res: &EnrichmentResult) -> io::Result<()> {
    writeln!(f, "term\tname\tp_value\ta\tb\tc\td\trelative_size\tproteins")?;
    for term in res.ranked() {
        let proteins = term
            .proteins
            .iter()
            .filter_map(|id| table.get(*id)?.representative())
            .collect::<Vec<_>>()
            .join(";");
        let t = term.table;
        writeln!(
            f,
            "{}\t{}\t{:e}\t{}\t{}\t{}\t{}\t{:.3}\t{}",
            term.term_id,
            term.name.as_deref().unwrap_or_default(),
            term.p_value,
            t.a,
            t.b,
            t.c,
            t.d,
            res.relative_size(&term.term_id).unwrap_or_default(),
            proteins
        )?;
    }
    f.flush()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let params = args.parameters()?;
    fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;

    let mut table = Raw::load(&args.proteins)
        .with_context(|| format!("loading {}", args.proteins.display()))?
        .table(&Filter::decoys())?;
    if !args.samples.is_empty() {
        table = table.select(&args.samples)?;
    }
    info!("samples: {}", table.samples().join(", "));

    let mut analysis = Analysis::new(table);
    analysis.set_parameters(params)?;
    if !args.swap.is_empty() {
        analysis.swap_labels(&args.swap)?;
    }
    if let (Some(obo), Some(gaf)) = (&args.obo, &args.associations) {
        analysis
            .load_go(obo, gaf)
            .context("loading GO hierarchy and associations")?;
    }

    analysis.find_significant()?;
    analysis.cluster()?;
    if let (Some(sig), Some(clusters)) = (analysis.significance(), analysis.clusters()) {
        write_significance(create(&args.out, "significance.tsv")?, analysis.table(), sig)?;
        write_clusters(create(&args.out, "clusters.tsv")?, analysis.table(), clusters)?;
        write_dendrogram(create(&args.out, "dendrogram.tsv")?, &clusters.dendrogram)?;
    }

    if analysis.annotations().is_some() {
        let mut enricher = analysis.iterate_go_terms()?;
        let total = enricher.len();
        let mut done = 0;
        while enricher.next().is_some() {
            done += 1;
            if done % PROGRESS == 0 {
                info!("tested {}/{} terms, {} enriched", done, total, enricher.results().len());
            }
        }
        let result = enricher.into_results();
        analysis.set_enrichment(result)?;
        if let Some(res) = analysis.enrichment() {
            write_enrichment(create(&args.out, "enrichment.tsv")?, analysis.table(), res)?;
        }
    }

    fs::write(args.out.join("parameters.json"), analysis.parameters().to_json()?)?;
    Ok(())
}
