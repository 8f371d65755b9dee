//! Minimizer sketching.
//!
//! A sketch is the ordered list of minimizers selected from one sequence by
//! sliding-window winnowing over hashed canonical k-mers. Records are
//! bit-packed so the index and the chainer can radix-sort them without
//! touching the sequence again.

use std::collections::VecDeque;

use crate::cfg::EngineCfg;
use crate::codec;
use crate::error::{Error, Result};
use crate::types::Sequence;
use crate::utils::radix_sort;

/// One selected minimizer.
///
/// `key` is the hashed canonical k-mer; `loc` packs
/// `(id << 32) | (pos << 1) | strand`, where `pos` is the k-mer start in
/// original (pre-compression) coordinates and `strand` is 1 when the
/// reverse complement was the canonical choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Minimizer {
    pub key: u64,
    pub loc: u64,
}

impl Minimizer {
    #[inline]
    pub fn id(&self) -> u32 {
        (self.loc >> 32) as u32
    }

    #[inline]
    pub fn pos(&self) -> u32 {
        ((self.loc << 32) >> 33) as u32
    }

    #[inline]
    pub fn strand(&self) -> bool {
        self.loc & 1 == 1
    }
}

/// Optional sketch post-filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SketchOpts {
    /// Keep only a small subset of the sketch, smallest keys first.
    pub micromize: bool,
    /// Subset size as a fraction of the sketch; 0 means `len / k` records.
    pub micromize_factor: f64,
    /// Preserve this many records verbatim at each end of the sketch.
    pub keep_ends: u8,
}

/// Invertible 64-bit mix confined to `mask` (Thomas Wang).
///
/// Masking after each additive step keeps the function a bijection on the
/// 2k-bit k-mer space, so distinct k-mers never collide through hashing.
#[inline]
pub fn hash64(mut key: u64, mask: u64) -> u64 {
    key = (!key).wrapping_add(key << 21) & mask;
    key ^= key >> 24;
    key = key.wrapping_add(key << 3).wrapping_add(key << 8) & mask;
    key ^= key >> 14;
    key = key.wrapping_add(key << 2).wrapping_add(key << 4) & mask;
    key ^= key >> 28;
    key = key.wrapping_add(key << 31) & mask;
    key
}

// Deque entries carry (hashed key, (pos << 1) | strand); the top bit of the
// location marks records already emitted so a minimizer that stays minimal
// across several windows is reported once.
const STORED: u64 = 1 << 63;

fn window_push(window: &mut VecDeque<(u64, u64)>, key: u64, loc: u64) {
    while let Some(back) = window.back() {
        if back.0 > key {
            window.pop_back();
        } else {
            break;
        }
    }
    window.push_back((key, loc));
}

/// Sketch one sequence.
///
/// Returns records in emission order. Sequences shorter than k produce an
/// empty sketch; bytes outside the codec table abort with
/// [`Error::InvalidCharacter`].
pub fn sketch(sequence: &Sequence, cfg: &EngineCfg, opts: &SketchOpts) -> Result<Vec<Minimizer>> {
    let data = &sequence.data;
    let k = cfg.k as u64;
    let w = cfg.w as u64;

    if (data.len() as u64) < k {
        return Ok(Vec::new());
    }

    let mask = u64::MAX >> (64 - 2 * cfg.k);
    let shift = (k - 1) * 2;
    let id = (sequence.id as u64) << 32;

    let mut fwd = 0u64;
    let mut rev = 0u64;
    let mut window: VecDeque<(u64, u64)> = VecDeque::new();
    let mut dst: Vec<Minimizer> = Vec::new();

    let mut win_span = 0usize;
    let mut kmer_span = 0usize;
    let mut base_cnt = 0u64;

    for i in 0..data.len() {
        if i > 0 {
            win_span += 1;
            kmer_span += 1;
        }

        let code = codec::code(data[i]);
        if code == codec::INVALID {
            return Err(Error::InvalidCharacter {
                name: sequence.name.clone(),
                pos: i,
                byte: data[i],
            });
        }

        // in HPC mode only the first base of a homopolymer run contributes
        if cfg.hpc && i > 0 && codec::code(data[i - 1]) == code {
            continue;
        }
        base_cnt += 1;

        if base_cnt > k {
            // evict the oldest base; its whole run leaves the k-mer span
            kmer_span -= 1;
            if cfg.hpc {
                let last = codec::code(data[i - kmer_span - 1]);
                while codec::code(data[i - kmer_span]) == last {
                    kmer_span -= 1;
                }
            }
        }

        fwd = ((fwd << 2) | code as u64) & mask;
        rev = (rev >> 2) | ((codec::complement(code) as u64) << shift);

        if base_cnt >= k {
            let pos = ((i - kmer_span) as u64) << 1;
            if fwd < rev {
                window_push(&mut window, hash64(fwd, mask), pos);
            } else if fwd > rev {
                // palindromic k-mers have no canonical strand and are skipped
                window_push(&mut window, hash64(rev, mask), pos | 1);
            }
        }

        if base_cnt >= k + w - 1 {
            let limit = if cfg.robust_winnowing && !window.is_empty() {
                1
            } else {
                window.len()
            };
            for idx in 0..limit {
                if window[idx].0 != window[0].0 {
                    break;
                }
                if window[idx].1 & STORED != 0 {
                    continue;
                }
                dst.push(Minimizer {
                    key: window[idx].0,
                    loc: id | window[idx].1,
                });
                window[idx].1 |= STORED;
            }

            win_span -= 1;
            if cfg.hpc {
                let last = codec::code(data[i - win_span - 1]);
                while codec::code(data[i - win_span]) == last {
                    win_span -= 1;
                }
            }

            let cutoff = (i - win_span) as u64;
            let mut popped = false;
            while let Some(front) = window.front() {
                if (front.1 << 32) >> 33 < cutoff {
                    window.pop_front();
                    popped = true;
                } else {
                    break;
                }
            }
            if cfg.robust_winnowing && popped {
                // drop repeat-induced ties so they are not re-emitted
                while window.len() > 1 && window[0].0 == window[1].0 {
                    window.pop_front();
                }
            }
        }
    }

    if opts.micromize {
        let mut take = data.len() / cfg.k as usize;
        if opts.micromize_factor > 0. {
            take = (dst.len() as f64 * opts.micromize_factor) as usize;
        }
        let keep = opts.keep_ends as usize;
        if take < dst.len() {
            if 2 * keep <= dst.len() {
                let len = dst.len();
                radix_sort(&mut dst[keep..len - keep], 2 * cfg.k, |m| m.key);
            }
            if keep < take {
                let tail: Vec<Minimizer> = dst[dst.len() - keep..].to_vec();
                let at = take - keep;
                dst.splice(at..at, tail);
            }
            dst.truncate(take);
        }
    }

    if cfg.reduce_win_sz > 0 {
        return Ok(reduce(&dst, cfg.reduce_win_sz));
    }
    Ok(dst)
}

/// Second-level reduction: sliding-window minima over an emitted sketch.
///
/// Keeps only records that are minimal by key in at least one window of
/// `win_sz` consecutive sketch entries; ties are all kept, once each.
pub(crate) fn reduce(dst: &[Minimizer], win_sz: u32) -> Vec<Minimizer> {
    if dst.is_empty() {
        return Vec::new();
    }

    let win_sz = win_sz as usize;
    if win_sz > dst.len() {
        let mut mini = 0;
        for i in 1..dst.len() {
            if dst[i].key < dst[mini].key {
                mini = i;
            }
        }
        return vec![dst[mini]];
    }

    let mut ret = Vec::new();
    let mut stored = vec![false; dst.len()];
    let mut window: VecDeque<(u64, usize)> = VecDeque::new();

    fn add(window: &mut VecDeque<(u64, usize)>, key: u64, at: usize) {
        while let Some(back) = window.back() {
            if back.0 > key {
                window.pop_back();
            } else {
                break;
            }
        }
        window.push_back((key, at));
    }

    fn collect(
        window: &VecDeque<(u64, usize)>,
        dst: &[Minimizer],
        stored: &mut [bool],
        ret: &mut Vec<Minimizer>,
    ) {
        for it in window.iter() {
            if it.0 != window[0].0 {
                break;
            }
            if stored[it.1] {
                continue;
            }
            stored[it.1] = true;
            ret.push(dst[it.1]);
        }
    }

    for (i, m) in dst.iter().take(win_sz).enumerate() {
        add(&mut window, m.key, i);
    }
    for (i, m) in dst.iter().enumerate().skip(win_sz) {
        collect(&window, dst, &mut stored, &mut ret);
        while let Some(front) = window.front() {
            if front.1 < i - win_sz + 1 {
                window.pop_front();
            } else {
                break;
            }
        }
        add(&mut window, m.key, i);
    }
    collect(&window, dst, &mut stored, &mut ret);

    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pseudo_dna(len: usize, seed: u64) -> Vec<u8> {
        let mut x = seed;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            x = x
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let b = match (x >> 62) & 3 {
                0 => b'A',
                1 => b'C',
                2 => b'G',
                _ => b'T',
            };
            out.push(b);
        }
        out
    }

    fn revcomp(seq: &[u8]) -> Vec<u8> {
        seq.iter()
            .rev()
            .map(|&b| match b {
                b'A' => b'T',
                b'C' => b'G',
                b'G' => b'C',
                _ => b'A',
            })
            .collect()
    }

    fn cfg(k: u32, w: u32) -> EngineCfg {
        EngineCfg {
            k,
            w,
            ..EngineCfg::default()
        }
    }

    fn seq(data: Vec<u8>) -> Sequence {
        Sequence::new(0, "s", data)
    }

    #[test]
    fn hash_is_injective_within_mask() {
        let mask = 0xff; // k = 4
        let mut seen = HashSet::new();
        for key in 0..=mask {
            assert!(seen.insert(hash64(key, mask)));
            assert!(hash64(key, mask) <= mask);
        }
        assert_eq!(seen.len(), 256);
    }

    #[test]
    fn hash_is_deterministic() {
        let mask = u64::MAX >> (64 - 30);
        for key in [0u64, 1, 12345, mask] {
            assert_eq!(hash64(key, mask), hash64(key, mask));
        }
    }

    #[test]
    fn short_input_yields_empty_sketch() {
        let s = seq(b"ACGTACGTAC".to_vec());
        let out = sketch(&s, &cfg(15, 5), &SketchOpts::default()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn sketch_is_deterministic() {
        let s = seq(pseudo_dna(2000, 42));
        let a = sketch(&s, &cfg(15, 5), &SketchOpts::default()).unwrap();
        let b = sketch(&s, &cfg(15, 5), &SketchOpts::default()).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_character_is_reported() {
        let mut data = pseudo_dna(100, 7);
        data[40] = b'E';
        let err = sketch(&seq(data), &cfg(15, 5), &SketchOpts::default()).unwrap_err();
        match err {
            Error::InvalidCharacter { pos, byte, .. } => {
                assert_eq!(pos, 40);
                assert_eq!(byte, b'E');
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn positions_are_valid_and_unique() {
        let n = 3000;
        let s = seq(pseudo_dna(n, 13));
        let out = sketch(&s, &cfg(15, 5), &SketchOpts::default()).unwrap();
        let mut locs = HashSet::new();
        for m in &out {
            assert!((m.pos() as usize) + 15 <= n);
            assert_eq!(m.id(), 0);
            assert!(locs.insert(m.loc));
        }
    }

    #[test]
    fn reverse_complement_mirrors_the_sketch() {
        let n = 3000;
        let data = pseudo_dna(n, 99);
        let fwd = sketch(&seq(data.clone()), &cfg(15, 5), &SketchOpts::default()).unwrap();
        let rc = sketch(&seq(revcomp(&data)), &cfg(15, 5), &SketchOpts::default()).unwrap();

        let fwd_set: HashSet<(u64, u32, bool)> =
            fwd.iter().map(|m| (m.key, m.pos(), m.strand())).collect();
        let rc_set: HashSet<(u64, u32, bool)> = rc
            .iter()
            .map(|m| (m.key, (n - 15) as u32 - m.pos(), !m.strand()))
            .collect();
        assert_eq!(fwd_set, rc_set);
    }

    #[test]
    fn hpc_keys_match_between_expanded_and_collapsed() {
        let collapsed = pseudo_dna(600, 21);
        // expand every third base into a short homopolymer run
        let mut expanded = Vec::new();
        for (i, &b) in collapsed.iter().enumerate() {
            expanded.push(b);
            if i % 3 == 0 {
                expanded.push(b);
                expanded.push(b);
            }
        }

        let mut c = cfg(15, 5);
        c.hpc = true;
        let a = sketch(&seq(collapsed), &c, &SketchOpts::default()).unwrap();
        let b = sketch(&seq(expanded), &c, &SketchOpts::default()).unwrap();

        let mut ka: Vec<u64> = a.iter().map(|m| m.key).collect();
        let mut kb: Vec<u64> = b.iter().map(|m| m.key).collect();
        ka.sort_unstable();
        kb.sort_unstable();
        assert!(!ka.is_empty());
        assert_eq!(ka, kb);
    }

    #[test]
    fn robust_winnowing_thins_repetitive_sketches() {
        // period 5 with window 11: windows hold up to three tied copies of
        // the minimal phase; classic winnowing emits every copy, robust
        // winnowing drops the middle ones
        let mut data = Vec::new();
        for _ in 0..400 {
            data.extend_from_slice(b"ACGGT");
        }
        let classic = sketch(&seq(data.clone()), &cfg(15, 11), &SketchOpts::default()).unwrap();
        let mut c = cfg(15, 11);
        c.robust_winnowing = true;
        let robust = sketch(&seq(data), &c, &SketchOpts::default()).unwrap();
        assert!(!robust.is_empty());
        assert!(robust.len() < classic.len());

        // on tie-free input both modes agree
        let plain = pseudo_dna(2000, 55);
        let classic = sketch(&seq(plain.clone()), &cfg(15, 5), &SketchOpts::default()).unwrap();
        let mut c = cfg(15, 5);
        c.robust_winnowing = true;
        let robust = sketch(&seq(plain), &c, &SketchOpts::default()).unwrap();
        assert_eq!(classic, robust);
    }

    #[test]
    fn micromize_caps_the_sketch() {
        let n = 3000;
        let s = seq(pseudo_dna(n, 5));
        let full = sketch(&s, &cfg(15, 5), &SketchOpts::default()).unwrap();
        let opts = SketchOpts {
            micromize: true,
            ..SketchOpts::default()
        };
        let small = sketch(&s, &cfg(15, 5), &opts).unwrap();
        assert!(full.len() > n / 15);
        assert_eq!(small.len(), n / 15);
    }

    #[test]
    fn micromize_preserves_end_anchors() {
        let s = seq(pseudo_dna(3000, 17));
        let full = sketch(&s, &cfg(15, 5), &SketchOpts::default()).unwrap();
        let opts = SketchOpts {
            micromize: true,
            micromize_factor: 0.2,
            keep_ends: 2,
        };
        let small = sketch(&s, &cfg(15, 5), &opts).unwrap();

        let take = (full.len() as f64 * 0.2) as usize;
        assert_eq!(small.len(), take);
        assert_eq!(&small[..2], &full[..2]);
        assert_eq!(&small[take - 2..], &full[full.len() - 2..]);
    }

    #[test]
    fn micromize_factor_scales_the_subset() {
        let s = seq(pseudo_dna(3000, 31));
        let full = sketch(&s, &cfg(15, 5), &SketchOpts::default()).unwrap();
        let opts = SketchOpts {
            micromize: true,
            micromize_factor: 0.5,
            keep_ends: 0,
        };
        let half = sketch(&s, &cfg(15, 5), &opts).unwrap();
        assert_eq!(half.len(), (full.len() as f64 * 0.5) as usize);
    }

    #[test]
    fn reduce_keeps_window_minima() {
        let mk = |key, pos: u64| Minimizer {
            key,
            loc: pos << 1,
        };
        let input = vec![mk(5, 0), mk(3, 1), mk(8, 2), mk(2, 3), mk(9, 4), mk(7, 5)];

        let out = reduce(&input, 3);
        let keys: Vec<u64> = out.iter().map(|m| m.key).collect();
        // window minima: [5 3 8] -> 3, [3 8 2] -> 2, [8 2 9] -> 2, [2 9 7] -> 2
        assert_eq!(keys, vec![3, 2]);

        // window larger than the sketch collapses to the global minimum
        let single = reduce(&input, 10);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].key, 2);

        assert!(reduce(&[], 3).is_empty());
    }

    #[test]
    fn second_level_reduction_shrinks_the_sketch() {
        let s = seq(pseudo_dna(2000, 3));
        let full = sketch(&s, &cfg(15, 5), &SketchOpts::default()).unwrap();
        let mut c = cfg(15, 5);
        c.reduce_win_sz = 4;
        let reduced = sketch(&s, &c, &SketchOpts::default()).unwrap();
        assert!(!reduced.is_empty());
        assert!(reduced.len() < full.len());

        let full_locs: HashSet<u64> = full.iter().map(|m| m.loc).collect();
        for m in &reduced {
            assert!(full_locs.contains(&m.loc));
        }
    }
}
