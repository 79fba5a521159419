use std::{io::Read, num::NonZeroU32, path::Path, time::Instant};

use anyhow::Context;
use compress_io::compress::CompressIo;
use crossbeam_utils::thread;

use crate::{
    cli::Config,
    genomes::{Shard, ShardPlan},
    kmers::KmerCoder,
    table::ShardTable,
};

/// Read one genome sequence file into `buf`, replacing its contents. The
/// buffer is caller owned so one allocation serves a whole shard.
fn read_genome(path: &Path, buf: &mut Vec<u8>) -> anyhow::Result<()> {
    buf.clear();
    let mut rdr = CompressIo::new()
        .path(path)
        .bufreader()
        .with_context(|| format!("Could not open genome file {}", path.display()))?;
    rdr.read_to_end(buf)
        .with_context(|| format!("Error reading genome file {}", path.display()))?;
    Ok(())
}

/// Count every genome file of one shard into a private table. Genome ids
/// are sequential per shard starting at 1; combined with the per record
/// last genome marker this credits each (k-mer, genome) pair exactly once.
fn ingest_shard(k: usize, ix: usize, shard: &Shard) -> anyhow::Result<ShardTable> {
    debug!("Ingest task {ix} starting up");
    let mut table = ShardTable::with_capacity(shard.initial_capacity());
    let mut coder = KmerCoder::new(k);
    let mut buf = Vec::new();
    let mut genome_id = 0;
    for file in shard.files() {
        genome_id += 1;
        let genome = NonZeroU32::try_from(genome_id).unwrap();
        read_genome(file.path(), &mut buf)?;
        trace!(
            "Ingest task {ix} read {} ({} bytes)",
            file.path().display(),
            buf.len()
        );
        // Coarse growth check, once per file rather than per insert
        table.maybe_grow(buf.len());
        coder.clear();
        let phenotype = file.phenotype();
        for &c in buf.iter() {
            if let Some(value) = coder.add_byte(c) {
                table.upsert(value, genome, phenotype);
            }
        }
    }
    debug!(
        "Ingest task {ix} shutting down with {} distinct k-mers",
        table.records()
    );
    Ok(table)
}

/// Run one ingest thread per shard. Each thread owns its table outright;
/// nothing is shared until the finished tables are handed back for merging.
pub fn process(cfg: &Config, plan: &ShardPlan) -> anyhow::Result<Vec<ShardTable>> {
    let k = cfg.kmer_length();
    let start = Instant::now();

    let mut error = false;
    let mut tables = Vec::with_capacity(plan.shards().len());

    thread::scope(|scope| {
        let mut ingest_tasks = Vec::with_capacity(plan.shards().len());
        for (ix, shard) in plan.shards().iter().enumerate() {
            ingest_tasks.push(scope.spawn(move |_| ingest_shard(k, ix, shard)));
        }

        // Wait for ingest threads
        for jh in ingest_tasks.drain(..) {
            match jh.join().expect("Error joining ingest thread") {
                Err(e) => {
                    error!("{:?}", e);
                    error = true
                }
                Ok(t) => tables.push(t),
            }
        }
    })
    .expect("Error in scope generation");

    if error {
        Err(anyhow!("Error occurred during ingestion"))
    } else {
        info!(
            "Counted {} genomes in {:.2}s across {} ingest threads",
            plan.genomes(),
            start.elapsed().as_secs_f64(),
            tables.len()
        );
        Ok(tables)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{genomes::GenomeFile, merge::merge_tables, phenotypes::Phenotype, table::KmerRecord};
    use std::{fs::File, io::Write, path::PathBuf};

    fn genome_file(dir: &Path, name: &str, seq: &str, phenotype: Phenotype) -> GenomeFile {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(seq.as_bytes()).unwrap();
        GenomeFile::new(path, phenotype, seq.len() as u64)
    }

    fn sorted_records(records: Vec<KmerRecord>) -> Vec<(u64, u32, u32)> {
        let mut recs: Vec<_> = records
            .into_iter()
            .map(|r| (r.value(), r.resistant(), r.susceptible()))
            .collect();
        recs.sort_unstable_by_key(|r| r.0);
        recs
    }

    fn sorted_counts(table: ShardTable) -> Vec<(u64, u32, u32)> {
        sorted_records(table.into_records().collect())
    }

    #[test]
    fn two_genome_shard_counts_by_phenotype() {
        let tmp = tempfile::tempdir().unwrap();
        let a = genome_file(tmp.path(), "a.fna", "ACGT", Phenotype::Resistant);
        let b = genome_file(tmp.path(), "b.fna", "ACGA", Phenotype::Susceptible);
        let table = ingest_shard(2, 0, &Shard::new(vec![a, b], 8)).unwrap();
        assert_eq!(
            sorted_counts(table),
            vec![(1, 1, 1), (6, 1, 1), (8, 0, 1), (11, 1, 0)]
        );
    }

    #[test]
    fn genomes_in_separate_shards_merge_to_combined_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let a = genome_file(tmp.path(), "a.fna", "ACGT", Phenotype::Resistant);
        let b = genome_file(tmp.path(), "b.fna", "ACGA", Phenotype::Susceptible);
        let merged = merge_tables(vec![
            ingest_shard(2, 0, &Shard::new(vec![a], 8)).unwrap(),
            ingest_shard(2, 1, &Shard::new(vec![b], 32)).unwrap(),
        ]);
        assert_eq!(
            sorted_records(merged),
            vec![(1, 1, 1), (6, 1, 1), (8, 0, 1), (11, 1, 0)]
        );
    }

    #[test]
    fn growth_between_files_keeps_earlier_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let a = genome_file(tmp.path(), "a.fna", "ACGT", Phenotype::Resistant);
        let b = genome_file(tmp.path(), "b.fna", "ACGAACGAACGA", Phenotype::Susceptible);
        let table = ingest_shard(2, 0, &Shard::new(vec![a, b], 4)).unwrap();
        // The second file forces doublings while the first file's records are live
        assert!(table.capacity() >= 32);
        assert_eq!(
            sorted_counts(table),
            vec![(0, 0, 1), (1, 1, 1), (6, 1, 1), (8, 0, 1), (11, 1, 0)]
        );
    }

    #[test]
    fn repeats_within_a_genome_count_once() {
        let tmp = tempfile::tempdir().unwrap();
        let a = genome_file(tmp.path(), "a.fna", "AAAA", Phenotype::Resistant);
        let table = ingest_shard(2, 0, &Shard::new(vec![a], 8)).unwrap();
        assert_eq!(sorted_counts(table), vec![(0, 1, 0)]);
    }

    #[test]
    fn line_breaks_do_not_reset_the_window() {
        let tmp = tempfile::tempdir().unwrap();
        let a = genome_file(tmp.path(), "a.fna", "AC\nGT\n", Phenotype::Resistant);
        let table = ingest_shard(4, 0, &Shard::new(vec![a], 8)).unwrap();
        assert_eq!(sorted_counts(table), vec![(0b0001_1011, 1, 0)]);
    }

    #[test]
    fn tiny_initial_capacity_still_counts_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let seq: String = std::iter::repeat("ACGTTGCA").take(32).collect();
        let a = genome_file(tmp.path(), "a.fna", &seq, Phenotype::Susceptible);
        let table = ingest_shard(3, 0, &Shard::new(vec![a], 1)).unwrap();
        let recs = sorted_counts(table);
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|&(_, r, s)| r == 0 && s == 1));
    }

    #[test]
    fn shard_count_does_not_change_the_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let inputs = [
            ("a.fna", "ACGTGGT", Phenotype::Resistant),
            ("b.fna", "ACGAACG", Phenotype::Susceptible),
            ("c.fna", "TTACGTT", Phenotype::Resistant),
        ];
        for (name, seq, _) in &inputs {
            let mut f = File::create(tmp.path().join(name)).unwrap();
            f.write_all(seq.as_bytes()).unwrap();
        }
        let files = |picks: &[usize]| -> Vec<GenomeFile> {
            picks
                .iter()
                .map(|&i| {
                    let (name, seq, phenotype) = inputs[i];
                    GenomeFile::new(tmp.path().join(name), phenotype, seq.len() as u64)
                })
                .collect()
        };

        let one = merge_tables(vec![
            ingest_shard(3, 0, &Shard::new(files(&[0, 1, 2]), 16)).unwrap()
        ]);
        // Round robin over two shards puts a and c together, b alone
        let split = merge_tables(vec![
            ingest_shard(3, 0, &Shard::new(files(&[0, 2]), 8)).unwrap(),
            ingest_shard(3, 1, &Shard::new(files(&[1]), 32)).unwrap(),
        ]);
        assert_eq!(sorted_records(one), sorted_records(split));
    }

    #[test]
    fn missing_genome_file_is_an_error() {
        let missing = GenomeFile::new(
            PathBuf::from("/no/such/genome.fna"),
            Phenotype::Resistant,
            4,
        );
        assert!(ingest_shard(2, 0, &Shard::new(vec![missing], 8)).is_err());
    }
}
