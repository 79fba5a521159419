//! Per-shard counting table. Slots are indexed by the raw packed value
//! modulo capacity, with no hash function in between: the merge step
//! relies on a value landing in exactly one deterministic slot for a
//! given capacity.

use std::num::NonZeroU32;

use crate::{kmers::KmerValue, phenotypes::Phenotype};

/// Aggregate for one distinct k-mer within one shard: how many distinct
/// genomes of each class contained it at least once
#[derive(Debug, Clone)]
pub struct KmerRecord {
    value: KmerValue,
    res_genomes: u32,
    sus_genomes: u32,
    last_genome: Option<NonZeroU32>,
}

impl KmerRecord {
    fn new(value: KmerValue, genome: NonZeroU32, phenotype: Phenotype) -> Self {
        let mut rec = Self {
            value,
            res_genomes: 0,
            sus_genomes: 0,
            last_genome: Some(genome),
        };
        rec.credit(phenotype);
        rec
    }

    fn credit(&mut self, phenotype: Phenotype) {
        match phenotype {
            Phenotype::Resistant => self.res_genomes += 1,
            Phenotype::Susceptible => self.sus_genomes += 1,
        }
    }

    /// Fold a sibling record for the same value into this one
    pub fn absorb(&mut self, other: KmerRecord) {
        debug_assert_eq!(self.value, other.value);
        self.res_genomes += other.res_genomes;
        self.sus_genomes += other.sus_genomes;
    }

    #[inline]
    pub fn value(&self) -> KmerValue {
        self.value
    }

    #[inline]
    pub fn resistant(&self) -> u32 {
        self.res_genomes
    }

    #[inline]
    pub fn susceptible(&self) -> u32 {
        self.sus_genomes
    }

    /// Total number of genomes containing this k-mer; at least 1
    #[inline]
    pub fn total(&self) -> u32 {
        self.res_genomes + self.sus_genomes
    }
}

pub struct ShardTable {
    slots: Vec<Vec<KmerRecord>>,
    records: usize,
}

impl ShardTable {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(capacity.max(1), Vec::new);
        Self { slots, records: 0 }
    }

    #[inline]
    fn slot_of(&self, value: KmerValue) -> usize {
        (value % self.slots.len() as u64) as usize
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Live records in the table
    pub fn records(&self) -> usize {
        self.records
    }

    /// Record one occurrence of `value` in `genome`. The first occurrence
    /// per genome credits the genome's phenotype class; repeats within the
    /// same genome are no-ops, so each (record, genome) pair moves the
    /// class counts by at most one.
    pub fn upsert(&mut self, value: KmerValue, genome: NonZeroU32, phenotype: Phenotype) {
        let ix = self.slot_of(value);
        let chain = &mut self.slots[ix];
        match chain.iter_mut().find(|r| r.value == value) {
            Some(rec) => {
                if rec.last_genome != Some(genome) {
                    rec.credit(phenotype);
                    rec.last_genome = Some(genome);
                }
            }
            None => {
                chain.push(KmerRecord::new(value, genome, phenotype));
                self.records += 1;
            }
        }
    }

    /// Grow ahead of a file expected to add up to `estimate` new records,
    /// keeping the live count below half capacity. Doubling reindexes every
    /// record by value mod the new capacity; nothing is dropped. This is a
    /// per-file check, far coarser than per-insert.
    pub fn maybe_grow(&mut self, estimate: usize) {
        while self.records + estimate > self.slots.len() / 2 {
            self.grow();
        }
    }

    fn grow(&mut self) {
        let new_cap = self.slots.len() << 1;
        trace!("Growing shard table from {} to {} slots", self.slots.len(), new_cap);
        let mut slots: Vec<Vec<KmerRecord>> = Vec::new();
        slots.resize_with(new_cap, Vec::new);
        for chain in self.slots.drain(..) {
            for rec in chain {
                slots[(rec.value % new_cap as u64) as usize].push(rec);
            }
        }
        self.slots = slots;
    }

    /// Remove and return the record for `value`, if this shard holds one.
    /// Only the single slot `value mod capacity` is examined.
    pub fn take(&mut self, value: KmerValue) -> Option<KmerRecord> {
        let ix = self.slot_of(value);
        let chain = &mut self.slots[ix];
        let pos = chain.iter().position(|r| r.value == value)?;
        self.records -= 1;
        Some(chain.swap_remove(pos))
    }

    /// Every record exactly once, order unspecified
    pub fn into_records(self) -> impl Iterator<Item = KmerRecord> {
        self.slots.into_iter().flatten()
    }
}

mod test {
    #[allow(unused_imports)]
    use super::*;

    #[allow(dead_code)]
    fn genome(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn upsert_creates_then_counts_distinct_genomes() {
        let mut t = ShardTable::with_capacity(8);
        t.upsert(11, genome(1), Phenotype::Resistant);
        t.upsert(11, genome(2), Phenotype::Susceptible);
        t.upsert(11, genome(3), Phenotype::Resistant);
        assert_eq!(t.records(), 1);
        let rec = t.take(11).unwrap();
        assert_eq!((rec.resistant(), rec.susceptible()), (2, 1));
        assert_eq!(rec.total(), 3);
    }

    #[test]
    fn repeats_within_one_genome_count_once() {
        let mut t = ShardTable::with_capacity(8);
        for _ in 0..5 {
            t.upsert(6, genome(1), Phenotype::Resistant);
        }
        let rec = t.take(6).unwrap();
        assert_eq!((rec.resistant(), rec.susceptible()), (1, 0));
    }

    #[test]
    fn colliding_values_chain_in_one_slot() {
        // 3 and 11 share slot 3 of an 8-slot table
        let mut t = ShardTable::with_capacity(8);
        t.upsert(3, genome(1), Phenotype::Resistant);
        t.upsert(11, genome(1), Phenotype::Susceptible);
        assert_eq!(t.records(), 2);
        assert_eq!(t.take(3).unwrap().resistant(), 1);
        assert_eq!(t.take(11).unwrap().susceptible(), 1);
        assert_eq!(t.records(), 0);
    }

    #[test]
    fn take_misses_absent_values() {
        let mut t = ShardTable::with_capacity(8);
        t.upsert(3, genome(1), Phenotype::Resistant);
        assert!(t.take(11).is_none());
        assert_eq!(t.records(), 1);
    }

    #[test]
    fn growth_is_lossless() {
        let mut t = ShardTable::with_capacity(4);
        for v in 0..100u64 {
            t.upsert(v, genome(1), Phenotype::Resistant);
            t.upsert(v, genome(2), Phenotype::Susceptible);
        }
        // 100 live records in 4 slots; force doublings until they fit
        t.maybe_grow(100);
        assert!(t.capacity() >= 400);
        assert_eq!(t.records(), 100);
        for v in 0..100u64 {
            let rec = t.take(v).unwrap();
            assert_eq!(rec.value(), v);
            assert_eq!((rec.resistant(), rec.susceptible()), (1, 1));
        }
    }

    #[test]
    fn small_shards_never_grow() {
        let mut t = ShardTable::with_capacity(64);
        for v in 0..8u64 {
            t.upsert(v, genome(1), Phenotype::Susceptible);
        }
        t.maybe_grow(8);
        assert_eq!(t.capacity(), 64);
    }

    #[test]
    fn enumeration_visits_every_record_once() {
        let mut t = ShardTable::with_capacity(16);
        for v in [1u64, 6, 8, 11, 27] {
            t.upsert(v, genome(1), Phenotype::Resistant);
        }
        let mut values: Vec<_> = t.into_records().map(|r| r.value()).collect();
        values.sort_unstable();
        assert_eq!(values, vec![1, 6, 8, 11, 27]);
    }
}
