//! Configuration of the overlap engine.

/// Engine parameters.
///
/// This is the top-level knob bundle the engine is constructed from, either
/// directly or through a [`Preset`]. It covers:
/// - minimizer sampling (`k`, `w`, `robust_winnowing`, `hpc`, `reduce_win_sz`)
/// - chaining gates (`m`, `g`, `n`)
/// - output shaping (`best_n`)
#[derive(Debug, Clone)]
pub struct EngineCfg {
    /// Minimizer k-mer length. Clamped to [1, 32] at engine construction.
    pub k: u32,
    /// Minimizer window size (number of successive k-mers per window).
    pub w: u32,
    /// Minimum chain score (covered bases on the weaker side) to keep a chain.
    pub m: u32,
    /// Stop chain elongation when consecutive seeds are further apart than
    /// this many bases on the query.
    pub g: u64,
    /// Minimum number of seeds in a chain.
    pub n: u64,
    /// Keep only this many best-scoring overlaps per query (0 = all).
    pub best_n: u32,
    /// Second-level reduction window over the emitted sketch (0 = off).
    pub reduce_win_sz: u32,
    /// Keep one representative per window on ties instead of all of them.
    ///
    /// Suppresses repeat-induced bursts of identical minimizers; sketches of
    /// repetitive reads get noticeably smaller at a small sensitivity cost.
    pub robust_winnowing: bool,
    /// Collapse homopolymer runs when forming k-mers.
    ///
    /// Positions are still reported in original coordinates, so downstream
    /// intervals stay comparable with and without compression.
    pub hpc: bool,
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            k: 15,
            w: 5,
            m: 100,
            g: 10000,
            n: 4,
            best_n: 0,
            reduce_win_sz: 0,
            robust_winnowing: false,
            hpc: false,
        }
    }
}

/// High-level parameter presets.
///
/// These map to tuned bundles for the two common workloads; explicit flags
/// override individual fields afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Preset {
    /// All-vs-all read overlapping.
    Ava,
    /// Read-to-reference mapping.
    Map,
}

impl Preset {
    /// Return the tuned parameter bundle for this preset.
    pub fn tuning(self) -> EngineCfg {
        match self {
            Preset::Ava => EngineCfg {
                k: 19,
                w: 5,
                m: 100,
                g: 10000,
                n: 4,
                ..EngineCfg::default()
            },
            Preset::Map => EngineCfg {
                k: 19,
                w: 10,
                m: 40,
                g: 5000,
                n: 3,
                best_n: 5,
                ..EngineCfg::default()
            },
        }
    }
}
