use std::io::Write;

use anyhow::Context;
use compress_io::compress::CompressIo;

use crate::{cli::Config, table::KmerRecord};

/// Rank records into buckets indexed by total genome count. Totals run
/// from 1 to `n_genomes`, so a record lands in bucket `total - 1` and
/// reading the buckets back to front gives the descending ranking with
/// no comparison sort.
fn bucket_by_total(records: Vec<KmerRecord>, n_genomes: usize) -> Vec<Vec<KmerRecord>> {
    let mut buckets: Vec<Vec<KmerRecord>> = Vec::new();
    buckets.resize_with(n_genomes, Vec::new);
    for rec in records {
        let total = rec.total() as usize;
        debug_assert!((1..=n_genomes).contains(&total));
        buckets[total - 1].push(rec);
    }
    buckets
}

fn write_counts<W: Write>(
    wrt: &mut W,
    k: usize,
    n_genomes: usize,
    records: Vec<KmerRecord>,
) -> anyhow::Result<()> {
    writeln!(
        wrt,
        "{}-mer(convert to binary (2*k) to get nucleotides; 00=A,01=C,10=G,11=T),res,sus",
        k
    )?;
    for bucket in bucket_by_total(records, n_genomes).into_iter().rev() {
        for rec in bucket {
            writeln!(
                wrt,
                "{}, {},{}",
                rec.value(),
                rec.resistant(),
                rec.susceptible()
            )?;
        }
    }
    Ok(())
}

/// Write the ranked counts table, most widely shared k-mers first
pub fn output(cfg: &Config, n_genomes: usize, records: Vec<KmerRecord>) -> anyhow::Result<()> {
    debug!("Writing k-mer counts output");
    let rows = records.len();
    let path = cfg.output();
    let mut wrt = CompressIo::new()
        .path(path)
        .bufwriter()
        .with_context(|| format!("Could not open output file {}", path.display()))?;
    write_counts(&mut wrt, cfg.kmer_length(), n_genomes, records)
        .with_context(|| format!("Error writing output file {}", path.display()))?;
    wrt.flush()
        .with_context(|| format!("Error flushing output file {}", path.display()))?;
    info!("Wrote {} k-mer counts to {}", rows, path.display());
    Ok(())
}

mod test {
    #[allow(unused_imports)]
    use super::*;
    #[allow(unused_imports)]
    use crate::{phenotypes::Phenotype, table::ShardTable};
    #[allow(unused_imports)]
    use std::num::NonZeroU32;

    #[allow(dead_code)]
    fn records(counts: &[(u64, u32, u32)]) -> Vec<KmerRecord> {
        let mut t = ShardTable::with_capacity(64);
        for &(value, res, sus) in counts {
            let mut genome = 0;
            for _ in 0..res {
                genome += 1;
                t.upsert(value, NonZeroU32::new(genome).unwrap(), Phenotype::Resistant);
            }
            for _ in 0..sus {
                genome += 1;
                t.upsert(value, NonZeroU32::new(genome).unwrap(), Phenotype::Susceptible);
            }
        }
        t.into_records().collect()
    }

    #[test]
    fn rows_rank_by_total_descending() {
        let recs = records(&[(11, 1, 0), (1, 1, 1), (8, 0, 1), (6, 1, 1)]);
        let mut out = Vec::new();
        write_counts(&mut out, 2, 2, recs).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "2-mer(convert to binary (2*k) to get nucleotides; 00=A,01=C,10=G,11=T),res,sus"
        );
        assert_eq!(lines.len(), 5);
        // Totals of 2 outrank totals of 1; order within a rank is free
        let mut top: Vec<_> = lines[1..3].to_vec();
        top.sort_unstable();
        assert_eq!(top, vec!["1, 1,1", "6, 1,1"]);
        let mut rest: Vec<_> = lines[3..].to_vec();
        rest.sort_unstable();
        assert_eq!(rest, vec!["11, 1,0", "8, 0,1"]);
    }

    #[test]
    fn no_records_yields_header_only() {
        let mut out = Vec::new();
        write_counts(&mut out, 16, 3, Vec::new()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "16-mer(convert to binary (2*k) to get nucleotides; 00=A,01=C,10=G,11=T),res,sus\n"
        );
    }

    #[test]
    fn kmer_in_every_genome_ranks_first() {
        let recs = records(&[(3, 1, 0), (5, 2, 3)]);
        let mut out = Vec::new();
        write_counts(&mut out, 4, 5, recs).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[1], "5, 2,3");
        assert_eq!(lines[2], "3, 1,0");
    }
}
