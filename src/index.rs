//! Sharded minimizer index.
//!
//! Records are partitioned by `key & (S - 1)` into `S = 1 << min(14, 2k)`
//! shards, so every occurrence of a key lives in exactly one shard. Each
//! shard keeps its records key-sorted in `runs` and a map from key to the
//! `(begin, count)` slice of that run.

use crossbeam_channel as chan;
use gxhash::{HashMap, HashMapExt};
use std::thread;

use crate::error::{Error, Result};
use crate::sketch::Minimizer;
use crate::utils::radix_sort;

#[derive(Debug, Default)]
pub(crate) struct Shard {
    runs: Vec<Minimizer>,
    map: HashMap<u64, (u32, u32)>,
}

impl Shard {
    /// Sort the shard by key and delimit each maximal equal-key run.
    fn finalize(&mut self, key_bits: u32) {
        radix_sort(&mut self.runs, key_bits, |m| m.key);

        self.map = HashMap::new();
        let mut c = 0u32;
        for i in 0..self.runs.len() {
            if i > 0 && self.runs[i - 1].key != self.runs[i].key {
                self.map.insert(self.runs[i - 1].key, (i as u32 - c, c));
                c = 0;
            }
            if i == self.runs.len() - 1 {
                self.map.insert(self.runs[i].key, (i as u32 - c, c + 1));
            }
            c += 1;
        }
    }
}

/// In-memory inverted index over minimizer keys.
#[derive(Debug)]
pub struct Index {
    shards: Vec<Shard>,
    bin_mask: u64,
    key_bits: u32,
    occurrence: u32,
}

impl Index {
    /// `k` must already be clamped to [1, 32].
    pub fn new(k: u32) -> Self {
        let num_shards = 1usize << 14.min(2 * k);
        let mut shards = Vec::with_capacity(num_shards);
        shards.resize_with(num_shards, Shard::default);
        Self {
            shards,
            bin_mask: num_shards as u64 - 1,
            key_bits: 2 * k,
            occurrence: u32::MAX,
        }
    }

    pub fn clear(&mut self) {
        for shard in self.shards.iter_mut() {
            shard.runs.clear();
            shard.map.clear();
        }
    }

    /// Scatter one sketch into the shards. Single-threaded by design: the
    /// parallel phase produces per-sequence sketches, the merge is serial.
    pub fn scatter(&mut self, records: &[Minimizer]) {
        for &record in records {
            self.shards[(record.key & self.bin_mask) as usize]
                .runs
                .push(record);
        }
    }

    /// Sort and runify every non-empty shard on `threads` workers.
    pub fn finalize(&mut self, threads: usize) {
        let key_bits = self.key_bits;
        thread::scope(|s| {
            let (tx, rx) = chan::unbounded::<&mut Shard>();
            for shard in self.shards.iter_mut() {
                if shard.runs.is_empty() {
                    continue;
                }
                let _ = tx.send(shard);
            }
            drop(tx);

            for _ in 0..threads.max(1) {
                let rx = rx.clone();
                s.spawn(move || {
                    while let Ok(shard) = rx.recv() {
                        shard.finalize(key_bits);
                    }
                });
            }
        });
    }

    /// The run of records for `key`, if any.
    pub fn lookup(&self, key: u64) -> Option<&[Minimizer]> {
        let shard = &self.shards[(key & self.bin_mask) as usize];
        let &(begin, count) = shard.map.get(&key)?;
        Some(&shard.runs[begin as usize..(begin + count) as usize])
    }

    /// Occurrence cutoff; runs longer than this are rejected at query time.
    pub fn occurrence(&self) -> u32 {
        self.occurrence
    }

    /// Set the occurrence cutoff from a frequency in [0, 1].
    ///
    /// `frequency` names the fraction of most frequent keys to suppress:
    /// the cutoff becomes one past the `(1 - f)`-quantile of run lengths,
    /// selected without a full sort. Zero disables the cutoff.
    pub fn filter(&mut self, frequency: f64) -> Result<()> {
        if !(0. ..=1.).contains(&frequency) {
            return Err(Error::InvalidFrequency(frequency));
        }

        if frequency == 0. {
            self.occurrence = u32::MAX;
            return Ok(());
        }

        let mut occurrences: Vec<u32> = self
            .shards
            .iter()
            .flat_map(|shard| shard.map.values().map(|&(_, count)| count))
            .collect();

        if occurrences.is_empty() {
            self.occurrence = u32::MAX;
            return Ok(());
        }

        let nth = (((1. - frequency) * occurrences.len() as f64) as usize)
            .min(occurrences.len() - 1);
        let (_, &mut selected, _) = occurrences.select_nth_unstable(nth);
        self.occurrence = selected + 1;
        Ok(())
    }

    /// Total number of indexed records.
    pub fn size(&self) -> u64 {
        self.shards.iter().map(|shard| shard.runs.len() as u64).sum()
    }
}
