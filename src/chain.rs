//! Seed-match chaining.
//!
//! Matches arrive as 128-bit records whose high word bundles target id,
//! strand parity and diagonal, so one radix pass groups them into candidate
//! bands. Within a band a longest-increasing-subsequence pass recovers the
//! collinear seeds, long seed-free gaps split chains apart, and surviving
//! chains are scored by the bases they cover on the weaker side.

use crate::cfg::EngineCfg;
use crate::types::Overlap;
use crate::utils::radix_sort;

/// Diagonal bias keeping same-strand diagonals non-negative and disjoint
/// from the opposite-strand encoding.
const DIAGONAL_BIAS: u64 = 3 << 30;

/// Bands bundle matches whose high words differ by at most this much.
const BAND_TOLERANCE: u64 = 500;

/// One seed match between a query (lhs) and an indexed target (rhs).
///
/// `band` = `(rhs_id << 33) | (strand << 32) | diagonal`,
/// `pos` = `(lhs_pos << 32) | rhs_pos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub band: u64,
    pub pos: u64,
}

impl Match {
    /// Pack a match from two minimizer locations hitting the same key.
    ///
    /// `strand` is parity: true when both minimizers were canonical on the
    /// same strand. The diagonal is `rhs + lhs` across strands and
    /// `rhs - lhs` (biased) on the same strand, so collinear seeds share a
    /// nearly constant band value.
    #[inline]
    pub fn pack(rhs_id: u32, lhs_loc: u64, rhs_loc: u64) -> Self {
        let strand = (lhs_loc & 1) == (rhs_loc & 1);
        let lhs_pos = (lhs_loc << 32) >> 33;
        let rhs_pos = (rhs_loc << 32) >> 33;
        let diagonal = if !strand {
            rhs_pos + lhs_pos
        } else {
            rhs_pos + DIAGONAL_BIAS - lhs_pos
        };

        Match {
            band: ((((rhs_id as u64) << 1) | strand as u64) << 32) | diagonal,
            pos: (lhs_pos << 32) | rhs_pos,
        }
    }

    #[inline]
    fn lhs_pos(&self) -> u64 {
        self.pos >> 32
    }

    #[inline]
    fn rhs_pos(&self) -> u64 {
        self.pos & 0xffff_ffff
    }
}

/// Longest strictly monotone subsequence of a band.
///
/// Matches must already be sorted by `(lhs_pos, rhs_pos)`. The subsequence
/// is strictly increasing in `lhs_pos`; `cmp` supplies the strict order for
/// `rhs_pos` (less-than on the same strand, greater-than across strands).
/// Patience sorting with binary search, O(n log n); returns indices in
/// ascending order.
pub(crate) fn longest_subsequence<F>(matches: &[Match], cmp: F) -> Vec<usize>
where
    F: Fn(u64, u64) -> bool,
{
    if matches.is_empty() {
        return Vec::new();
    }

    let mut minimal = vec![0usize; matches.len() + 1];
    let mut predecessor = vec![0usize; matches.len()];

    let mut longest = 0usize;
    for (idx, it) in matches.iter().enumerate() {
        let mut lo = 1usize;
        let mut hi = longest;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let cand = &matches[minimal[mid]];
            if cand.lhs_pos() < it.lhs_pos() && cmp(cand.rhs_pos(), it.rhs_pos()) {
                lo = mid + 1;
            } else {
                hi = mid - 1;
            }
        }

        predecessor[idx] = minimal[lo - 1];
        minimal[lo] = idx;
        longest = longest.max(lo);
    }

    let mut dst = Vec::with_capacity(longest);
    let mut j = minimal[longest];
    for _ in 0..longest {
        dst.push(j);
        j = predecessor[j];
    }
    dst.reverse();
    dst
}

/// Chain matches into overlaps.
///
/// The trailing sentinel match forces the last chain of every band through
/// the gap-split emission, so chains ending flush with the final seed are
/// still reported.
pub fn chain(lhs_id: u32, mut matches: Vec<Match>, cfg: &EngineCfg) -> Vec<Overlap> {
    radix_sort(&mut matches, 64, |m| m.band);
    matches.push(Match {
        band: u64::MAX,
        pos: u64::MAX,
    });

    let mut intervals: Vec<(usize, usize)> = Vec::new();
    {
        let mut j = 0usize;
        for i in 1..matches.len() {
            if matches[i].band - matches[j].band > BAND_TOLERANCE {
                if (i - j) as u64 >= cfg.n {
                    match intervals.last_mut() {
                        Some(last) if last.1 > j => last.1 = i,
                        _ => intervals.push((j, i)),
                    }
                }
                j += 1;
                while j < i && matches[i].band - matches[j].band > BAND_TOLERANCE {
                    j += 1;
                }
            }
        }
    }

    let mut dst: Vec<Overlap> = Vec::new();
    for &(j, i) in &intervals {
        if ((i - j) as u64) < cfg.n {
            continue;
        }

        radix_sort(&mut matches[j..i], 64, |m| m.pos);

        let strand = (matches[j].band >> 32) & 1 == 1;
        let mut indices = if strand {
            longest_subsequence(&matches[j..i], |a, b| a < b)
        } else {
            longest_subsequence(&matches[j..i], |a, b| a > b)
        };

        if (indices.len() as u64) < cfg.n {
            continue;
        }

        // the global sentinel, expressed in band-local offsets
        indices.push(matches.len() - 1 - j);

        let mut l = 0usize;
        for ki in 1..indices.len() {
            let gap =
                matches[j + indices[ki]].lhs_pos() - matches[j + indices[ki - 1]].lhs_pos();
            if gap <= cfg.g {
                continue;
            }
            if ((ki - l) as u64) < cfg.n {
                l = ki;
                continue;
            }

            // non-overlapping covered bases per side; rhs reflected on the
            // opposite strand so the accumulator walks monotonically
            let mut lhs_cover = 0u32;
            let mut lhs_begin = 0u32;
            let mut lhs_end = 0u32;
            let mut rhs_cover = 0u32;
            let mut rhs_begin = 0u32;
            let mut rhs_end = 0u32;

            for mi in l..ki {
                let lhs_pos = matches[j + indices[mi]].lhs_pos() as u32;
                if lhs_pos > lhs_end {
                    lhs_cover += lhs_end - lhs_begin;
                    lhs_begin = lhs_pos;
                }
                lhs_end = lhs_pos + cfg.k;

                let mut rhs_pos = matches[j + indices[mi]].rhs_pos() as u32;
                if !strand {
                    rhs_pos = (1u32 << 31) - (rhs_pos + cfg.k - 1);
                }
                if rhs_pos > rhs_end {
                    rhs_cover += rhs_end - rhs_begin;
                    rhs_begin = rhs_pos;
                }
                rhs_end = rhs_pos + cfg.k;
            }
            lhs_cover += lhs_end - lhs_begin;
            rhs_cover += rhs_end - rhs_begin;

            if lhs_cover.min(rhs_cover) < cfg.m {
                l = ki;
                continue;
            }

            let first = &matches[j + indices[l]];
            let last = &matches[j + indices[ki - 1]];
            dst.push(Overlap {
                lhs_id,
                lhs_begin: first.lhs_pos() as u32,
                lhs_end: cfg.k + last.lhs_pos() as u32,
                rhs_id: (matches[j].band >> 33) as u32,
                rhs_begin: if strand {
                    first.rhs_pos() as u32
                } else {
                    last.rhs_pos() as u32
                },
                rhs_end: cfg.k
                    + if strand {
                        last.rhs_pos() as u32
                    } else {
                        first.rhs_pos() as u32
                    },
                score: lhs_cover.min(rhs_cover),
                strand,
            });

            l = ki;
        }
    }

    if cfg.best_n > 0 && (cfg.best_n as usize) < dst.len() {
        dst.sort_by(|a, b| b.score.cmp(&a.score));
        dst.truncate(cfg.best_n as usize);
    }
    dst
}
