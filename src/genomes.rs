use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::{
    cli::Config,
    phenotypes::{Phenotype, PhenotypeTable},
};

/// Genome sequence files are named `<genome id><GENOME_SUFFIX>`
pub const GENOME_SUFFIX: &str = ".fna";

/// One classified genome sequence file
pub struct GenomeFile {
    path: PathBuf,
    phenotype: Phenotype,
    size: u64,
}

impl GenomeFile {
    pub(crate) fn new(path: PathBuf, phenotype: Phenotype, size: u64) -> Self {
        Self {
            path,
            phenotype,
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn phenotype(&self) -> Phenotype {
        self.phenotype
    }
}

/// The slice of genome files handled by one ingest thread
pub struct Shard {
    files: Vec<GenomeFile>,
    capacity: usize,
}

impl Shard {
    pub(crate) fn new(files: Vec<GenomeFile>, capacity: usize) -> Self {
        Self { files, capacity }
    }

    pub fn files(&self) -> &[GenomeFile] {
        &self.files
    }

    /// Starting slot count for the shard's counting table, sized from the
    /// largest file so typical shards never grow
    pub fn initial_capacity(&self) -> usize {
        self.capacity
    }
}

pub struct ShardPlan {
    shards: Vec<Shard>,
    genomes: usize,
}

impl ShardPlan {
    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    /// Total usable genomes across all shards
    pub fn genomes(&self) -> usize {
        self.genomes
    }
}

/// Find the classified genome files under the configured directory and
/// deal them out to the configured number of ingest shards
pub fn assign_genomes(cfg: &Config, phenotypes: &PhenotypeTable) -> anyhow::Result<ShardPlan> {
    let files = scan_genome_dir(cfg.genome_dir(), phenotypes)?;
    if files.is_empty() {
        return Err(anyhow!(
            "No classified genome files found in {}",
            cfg.genome_dir().display()
        ));
    }
    let plan = build_plan(files, cfg.threads());
    info!(
        "Assigned {} genomes to {} ingest shards",
        plan.genomes(),
        plan.shards().len()
    );
    Ok(plan)
}

fn scan_genome_dir(dir: &Path, phenotypes: &PhenotypeTable) -> anyhow::Result<Vec<GenomeFile>> {
    let rd = fs::read_dir(dir)
        .with_context(|| format!("Could not read genome directory {}", dir.display()))?;
    let mut files = Vec::new();
    let mut unclassified = 0;
    for entry in rd {
        let entry = entry
            .with_context(|| format!("Error reading genome directory {}", dir.display()))?;
        let fname = entry.file_name();
        let id = match fname.to_str().and_then(|s| s.strip_suffix(GENOME_SUFFIX)) {
            Some(s) => s,
            None => {
                debug!("Skipping {:?}: not a {} file", fname, GENOME_SUFFIX);
                continue;
            }
        };
        let phenotype = match phenotypes.get(id) {
            Some(p) => p,
            None => {
                unclassified += 1;
                debug!("Skipping {:?}: genome not classified in metadata", fname);
                continue;
            }
        };
        let meta = entry
            .metadata()
            .with_context(|| format!("Could not stat {}", entry.path().display()))?;
        if !meta.is_file() {
            debug!("Skipping {:?}: not a regular file", fname);
            continue;
        }
        files.push(GenomeFile::new(entry.path(), phenotype, meta.len()));
    }
    if unclassified > 0 {
        info!(
            "Skipped {} genome files with no phenotype classification",
            unclassified
        );
    }
    Ok(files)
}

/// Deal files round robin across `n_shards` buckets. Shards left empty when
/// there are fewer files than shards are dropped from the plan.
fn build_plan(files: Vec<GenomeFile>, n_shards: usize) -> ShardPlan {
    let genomes = files.len();
    let n = n_shards.max(1);
    let mut buckets: Vec<Vec<GenomeFile>> = Vec::new();
    buckets.resize_with(n, Vec::new);
    for (ix, f) in files.into_iter().enumerate() {
        buckets[ix % n].push(f);
    }
    let shards: Vec<_> = buckets
        .into_iter()
        .filter(|b| !b.is_empty())
        .map(|files| {
            let largest = files.iter().map(|f| f.size).max().expect("Empty shard");
            Shard::new(files, (largest as usize) << 1)
        })
        .collect();
    ShardPlan { shards, genomes }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{fs::File, io::Write};

    fn classified(id: u64, size: u64, phenotype: Phenotype) -> GenomeFile {
        GenomeFile::new(
            PathBuf::from(format!("{}{}", id, GENOME_SUFFIX)),
            phenotype,
            size,
        )
    }

    #[test]
    fn scan_keeps_only_classified_sequence_files() {
        let tmp = tempfile::tempdir().unwrap();
        for (name, content) in [
            ("83332.12.fna", "ACGT"),
            ("562.1.fna", "ACGA"),
            ("99287.1.fna", "TTTT"),
            ("notes.txt", "not a genome"),
        ] {
            let mut f = File::create(tmp.path().join(name)).unwrap();
            f.write_all(content.as_bytes()).unwrap();
        }
        let mut phenotypes = PhenotypeTable::new();
        phenotypes.insert("83332.12", Phenotype::Resistant);
        phenotypes.insert("562.1", Phenotype::Susceptible);

        let mut files = scan_genome_dir(tmp.path(), &phenotypes).unwrap();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("562.1.fna"));
        assert_eq!(files[0].phenotype(), Phenotype::Susceptible);
        assert_eq!(files[0].size, 4);
        assert!(files[1].path.ends_with("83332.12.fna"));
        assert_eq!(files[1].phenotype(), Phenotype::Resistant);
    }

    #[test]
    fn files_are_dealt_round_robin() {
        let files = (1..=5)
            .map(|i| classified(i, 100, Phenotype::Resistant))
            .collect();
        let plan = build_plan(files, 2);
        assert_eq!(plan.genomes(), 5);
        assert_eq!(plan.shards().len(), 2);
        let names: Vec<Vec<_>> = plan
            .shards()
            .iter()
            .map(|s| s.files().iter().map(|f| f.path().to_owned()).collect())
            .collect();
        assert_eq!(names[0], ["1.fna", "3.fna", "5.fna"].map(PathBuf::from));
        assert_eq!(names[1], ["2.fna", "4.fna"].map(PathBuf::from));
    }

    #[test]
    fn surplus_shards_are_dropped() {
        let files = (1..=2)
            .map(|i| classified(i, 100, Phenotype::Susceptible))
            .collect();
        let plan = build_plan(files, 4);
        assert_eq!(plan.shards().len(), 2);
        assert_eq!(plan.genomes(), 2);
    }

    #[test]
    fn capacity_is_twice_the_largest_file() {
        let files = vec![
            classified(1, 10, Phenotype::Resistant),
            classified(2, 100, Phenotype::Susceptible),
        ];
        let plan = build_plan(files, 1);
        assert_eq!(plan.shards()[0].initial_capacity(), 200);
    }
}
