//! The overlap engine.
//!
//! Owns the configuration and the minimizer index and exposes the public
//! mapping surface. Index construction runs on a small channel-fed worker
//! pool: sketching is parallel per sequence, the scatter into shards is a
//! serial merge, and the per-shard sort runs parallel again once all
//! records have landed.

use crossbeam_channel as chan;
use std::thread;

use crate::cfg::EngineCfg;
use crate::chain::{chain, Match};
use crate::error::Result;
use crate::index::Index;
use crate::sketch::{sketch, Minimizer, SketchOpts};
use crate::types::{Overlap, Sequence};
use crate::utils::radix_sort;

pub struct Engine {
    cfg: EngineCfg,
    index: Index,
    threads: usize,
}

impl Engine {
    /// Build an engine; `k` is clamped to [1, 32], other parameters are
    /// taken as given.
    pub fn new(mut cfg: EngineCfg, threads: usize) -> Self {
        cfg.k = cfg.k.clamp(1, 32);
        let index = Index::new(cfg.k);
        Self {
            cfg,
            index,
            threads: threads.max(1),
        }
    }

    pub fn cfg(&self) -> &EngineCfg {
        &self.cfg
    }

    /// Replace the index with one built over `sequences`.
    ///
    /// The previous index is cleared first. On error the index is left in
    /// its partial state and should be discarded by rebuilding.
    pub fn build_index(&mut self, sequences: &[Sequence]) -> Result<()> {
        self.index.clear();
        if sequences.is_empty() {
            return Ok(());
        }

        let cfg = self.cfg.clone();
        let threads = self.threads;
        let opts = SketchOpts::default();
        let index = &mut self.index;
        let mut first_err = None;

        thread::scope(|s| {
            let (job_tx, job_rx) = chan::bounded::<&Sequence>(threads * 2);
            let (out_tx, out_rx) = chan::bounded::<Result<Vec<Minimizer>>>(threads * 2);

            for _ in 0..threads {
                let job_rx = job_rx.clone();
                let out_tx = out_tx.clone();
                let cfg = &cfg;
                s.spawn(move || {
                    while let Ok(sequence) = job_rx.recv() {
                        if out_tx.send(sketch(sequence, cfg, &opts)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(job_rx);
            drop(out_tx);

            s.spawn(move || {
                for sequence in sequences {
                    if job_tx.send(sequence).is_err() {
                        break;
                    }
                }
            });

            // single consumer: shard scatter needs no locking
            while let Ok(result) = out_rx.recv() {
                match result {
                    Ok(records) => index.scatter(&records),
                    Err(e) => {
                        first_err.get_or_insert(e);
                    }
                }
            }
        });

        if let Some(e) = first_err {
            return Err(e);
        }

        self.index.finalize(self.threads);
        Ok(())
    }

    /// Set the occurrence cutoff from a frequency in [0, 1].
    pub fn set_frequency_cutoff(&mut self, frequency: f64) -> Result<()> {
        self.index.filter(frequency)
    }

    /// Total number of indexed minimizers.
    pub fn index_size(&self) -> u64 {
        self.index.size()
    }

    /// Map `query` against the index.
    ///
    /// `avoid_equal` drops hits on the target with the query's own id,
    /// `avoid_symmetric` drops hits on targets with a smaller id (so an
    /// all-vs-all run reports each pair once).
    pub fn map(
        &self,
        query: &Sequence,
        avoid_equal: bool,
        avoid_symmetric: bool,
        opts: &SketchOpts,
    ) -> Result<Vec<Overlap>> {
        let query_sketch = sketch(query, &self.cfg, opts)?;
        if query_sketch.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for it in &query_sketch {
            let Some(run) = self.index.lookup(it.key) else {
                continue;
            };
            if run.len() as u32 > self.index.occurrence() {
                continue;
            }
            for jt in run {
                let rhs_id = jt.id();
                if avoid_equal && query.id == rhs_id {
                    continue;
                }
                if avoid_symmetric && query.id > rhs_id {
                    continue;
                }
                matches.push(Match::pack(rhs_id, it.loc, jt.loc));
            }
        }

        Ok(chain(query.id, matches, &self.cfg))
    }

    /// Map a long query by its first and last `k_bases` bases only.
    ///
    /// Both sub-queries are mapped in full; begin/end hit pairs on the same
    /// target and strand are scanned in order of combined rank with a 1.08
    /// penalty per rank diagonal, and the best-fitting pair becomes a single
    /// spanning overlap. Queries of at most `4 * k_bases` bases fall back to
    /// a plain map.
    pub fn map_begin_end(
        &self,
        query: &Sequence,
        avoid_equal: bool,
        avoid_symmetric: bool,
        k_bases: u32,
    ) -> Result<Vec<Overlap>> {
        let size = query.data.len();
        if size <= 4 * k_bases as usize {
            return self.map(query, avoid_equal, avoid_symmetric, &SketchOpts::default());
        }

        let kb = k_bases as usize;
        let begin_seq = Sequence::new(query.id, query.name.clone(), query.data[..kb].to_vec());
        let end_seq = Sequence::new(
            query.id,
            query.name.clone(),
            query.data[size - kb..].to_vec(),
        );

        let begin_ovl = self.map(&begin_seq, avoid_equal, avoid_symmetric, &SketchOpts::default())?;
        let end_ovl = self.map(&end_seq, avoid_equal, avoid_symmetric, &SketchOpts::default())?;
        if begin_ovl.is_empty() || end_ovl.is_empty() {
            return Ok(Vec::new());
        }

        let mut min_diff = u64::MAX;
        let mut best: Option<(usize, usize)> = None;
        let mut penalty = 1.0f64;
        const PENALTY_MULT: f64 = 1.08;

        let max_index_sum = begin_ovl.len() + end_ovl.len() - 2;
        for index_sum in 0..=max_index_sum {
            for i in 0..=index_sum.min(begin_ovl.len() - 1) {
                let j = index_sum - i;
                if j >= end_ovl.len() {
                    continue;
                }

                let bov = &begin_ovl[i];
                let eov = &end_ovl[j];
                if bov.strand != eov.strand || bov.rhs_id != eov.rhs_id {
                    continue;
                }

                let (rhs_begin, rhs_end) = if eov.strand {
                    (bov.rhs_begin, eov.rhs_end)
                } else {
                    (eov.rhs_begin, bov.rhs_end)
                };
                if rhs_begin > rhs_end {
                    continue;
                }

                let candidate_len = (rhs_end - rhs_begin) as i64;
                let diff = (penalty * (candidate_len - size as i64).unsigned_abs() as f64) as u64;
                if diff < min_diff {
                    min_diff = diff;
                    best = Some((i, j));
                }
            }
            penalty *= PENALTY_MULT;
        }

        let Some((bi, ej)) = best else {
            return Ok(Vec::new());
        };
        let bov = &begin_ovl[bi];
        let eov = &end_ovl[ej];

        let (rhs_begin, rhs_end) = if bov.strand {
            (bov.rhs_begin, eov.rhs_end)
        } else {
            (eov.rhs_begin, bov.rhs_end)
        };
        let lhs_begin = bov.lhs_begin;
        let lhs_end = eov.lhs_end + (size - kb) as u32;

        Ok(vec![Overlap {
            lhs_id: query.id,
            lhs_begin,
            lhs_end,
            rhs_id: bov.rhs_id,
            rhs_begin,
            rhs_end,
            score: (lhs_end - lhs_begin).max(rhs_end - rhs_begin),
            strand: bov.strand,
        }])
    }

    /// Overlap two sequences directly, without an index.
    ///
    /// Equivalent to mapping `lhs` against a one-sequence index over `rhs`;
    /// `opts` applies to the `lhs` sketch only.
    pub fn map_pair(
        &self,
        lhs: &Sequence,
        rhs: &Sequence,
        opts: &SketchOpts,
    ) -> Result<Vec<Overlap>> {
        let mut lhs_sketch = sketch(lhs, &self.cfg, opts)?;
        if lhs_sketch.is_empty() {
            return Ok(Vec::new());
        }
        let mut rhs_sketch = sketch(rhs, &self.cfg, &SketchOpts::default())?;
        if rhs_sketch.is_empty() {
            return Ok(Vec::new());
        }

        radix_sort(&mut lhs_sketch, 2 * self.cfg.k, |m| m.key);
        radix_sort(&mut rhs_sketch, 2 * self.cfg.k, |m| m.key);

        let mut matches = Vec::new();
        let mut j = 0usize;
        for it in &lhs_sketch {
            while j < rhs_sketch.len() {
                if it.key < rhs_sketch[j].key {
                    break;
                } else if it.key == rhs_sketch[j].key {
                    for jt in &rhs_sketch[j..] {
                        if jt.key != it.key {
                            break;
                        }
                        matches.push(Match::pack(rhs.id, it.loc, jt.loc));
                    }
                    break;
                } else {
                    j += 1;
                }
            }
        }

        Ok(chain(lhs.id, matches, &self.cfg))
    }
}
