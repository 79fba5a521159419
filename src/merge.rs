use std::cmp::Reverse;

use crate::table::{KmerRecord, ShardTable};

/// Collapse the per-shard tables into one record per distinct k-mer.
///
/// Slots are raw value modulo capacity, so whatever a table's capacity the
/// record for a value sits in one known slot and cross table lookup is a
/// single chain walk. Tables are drained smallest capacity first, each
/// drained record pulling its twins out of the remaining tables, so every
/// value surfaces exactly once. With one shard this is plain enumeration.
pub fn merge_tables(mut tables: Vec<ShardTable>) -> Vec<KmerRecord> {
    let upper: usize = tables.iter().map(|t| t.records()).sum();
    tables.sort_by_key(|t| Reverse(t.capacity()));
    let mut merged = Vec::with_capacity(upper);
    while let Some(t) = tables.pop() {
        for mut rec in t.into_records() {
            for other in tables.iter_mut() {
                if let Some(twin) = other.take(rec.value()) {
                    rec.absorb(twin);
                }
            }
            merged.push(rec);
        }
    }
    info!("Merged shard tables into {} distinct k-mers", merged.len());
    merged
}

mod test {
    #[allow(unused_imports)]
    use super::*;
    #[allow(unused_imports)]
    use crate::phenotypes::Phenotype;
    #[allow(unused_imports)]
    use std::num::NonZeroU32;

    #[allow(dead_code)]
    fn genome(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[allow(dead_code)]
    fn sorted_counts(records: Vec<KmerRecord>) -> Vec<(u64, u32, u32)> {
        let mut recs: Vec<_> = records
            .into_iter()
            .map(|r| (r.value(), r.resistant(), r.susceptible()))
            .collect();
        recs.sort_unstable_by_key(|r| r.0);
        recs
    }

    #[test]
    fn counts_combine_across_different_capacities() {
        let mut a = ShardTable::with_capacity(4);
        a.upsert(6, genome(1), Phenotype::Resistant);
        a.upsert(11, genome(1), Phenotype::Resistant);
        let mut b = ShardTable::with_capacity(8);
        b.upsert(6, genome(1), Phenotype::Susceptible);
        b.upsert(6, genome(2), Phenotype::Susceptible);
        assert_eq!(
            sorted_counts(merge_tables(vec![a, b])),
            vec![(6, 1, 2), (11, 1, 0)]
        );
    }

    #[test]
    fn single_table_passes_through() {
        let mut a = ShardTable::with_capacity(8);
        a.upsert(1, genome(1), Phenotype::Resistant);
        a.upsert(8, genome(2), Phenotype::Susceptible);
        assert_eq!(
            sorted_counts(merge_tables(vec![a])),
            vec![(1, 1, 0), (8, 0, 1)]
        );
    }

    #[test]
    fn value_in_every_shard_surfaces_once() {
        let mut tables = Vec::new();
        for (cap, phenotype) in [
            (2, Phenotype::Resistant),
            (4, Phenotype::Susceptible),
            (16, Phenotype::Resistant),
        ] {
            let mut t = ShardTable::with_capacity(cap);
            t.upsert(9, genome(1), phenotype);
            tables.push(t);
        }
        assert_eq!(sorted_counts(merge_tables(tables)), vec![(9, 2, 1)]);
    }

    #[test]
    fn value_absent_from_a_middle_table_still_combines() {
        let mut small = ShardTable::with_capacity(2);
        small.upsert(5, genome(1), Phenotype::Resistant);
        // 13 shares slot 5 of the 8 slot table but is a different value
        let mut middle = ShardTable::with_capacity(8);
        middle.upsert(13, genome(1), Phenotype::Susceptible);
        let mut large = ShardTable::with_capacity(32);
        large.upsert(5, genome(1), Phenotype::Susceptible);
        assert_eq!(
            sorted_counts(merge_tables(vec![middle, large, small])),
            vec![(5, 1, 1), (13, 0, 1)]
        );
    }

    #[test]
    fn disjoint_values_pass_through() {
        let mut a = ShardTable::with_capacity(4);
        a.upsert(0, genome(1), Phenotype::Resistant);
        a.upsert(27, genome(1), Phenotype::Resistant);
        let mut b = ShardTable::with_capacity(16);
        b.upsert(13, genome(1), Phenotype::Susceptible);
        assert_eq!(
            sorted_counts(merge_tables(vec![a, b])),
            vec![(0, 1, 0), (13, 0, 1), (27, 1, 0)]
        );
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        assert!(merge_tables(Vec::new()).is_empty());
    }
}
