use anyhow::Result;
use calm_io::stderrln;
use crossbeam_channel as chan;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use ovlx::{cli, io, Engine, EngineCfg, Overlap, Preset, Sequence, SketchOpts};

fn main() -> Result<()> {
    let args = cli::build_cli();

    let preset = args.get_one::<Preset>("preset").copied();
    let mut cfg = preset.map(Preset::tuning).unwrap_or_else(EngineCfg::default);

    // explicit flags override the preset
    if let Some(&k) = args.get_one::<u32>("k") {
        cfg.k = k;
    }
    if let Some(&w) = args.get_one::<u32>("w") {
        cfg.w = w;
    }
    if let Some(&m) = args.get_one::<u32>("m") {
        cfg.m = m;
    }
    if let Some(&g) = args.get_one::<u64>("g") {
        cfg.g = g;
    }
    if let Some(&n) = args.get_one::<u64>("n") {
        cfg.n = n;
    }

    let frequency = *args.get_one::<f64>("frequency").unwrap();
    let micromize = args.get_flag("micromize");
    let threads = args.get_one::<usize>("threads").copied().unwrap_or(1).max(1);

    let target_path = args.get_one::<PathBuf>("target").expect("target is required");
    let sequences_path = args.get_one::<PathBuf>("sequences");

    stderrln!(
        "[ovlx] using options: k = {}, w = {}, f = {}, M = {}, m = {}, g = {}, n = {}, x = {}, t = {}",
        cfg.k,
        cfg.w,
        frequency,
        micromize,
        cfg.m,
        cfg.g,
        cfg.n,
        preset.map(|p| p.to_string()).unwrap_or_else(|| "none".into()),
        threads
    )?;

    let total = Instant::now();

    let stage = Instant::now();
    let targets = io::read_sequences(target_path)?;
    stderrln!(
        "[ovlx] parsed {} targets {:.2}s",
        targets.len(),
        stage.elapsed().as_secs_f64()
    )?;

    let is_ava = sequences_path.map_or(true, |p| p == target_path);

    let stage = Instant::now();
    let mut engine = Engine::new(cfg, threads);
    engine.build_index(&targets)?;
    engine.set_frequency_cutoff(frequency)?;
    stderrln!(
        "[ovlx] minimized targets ({} minimizers) {:.2}s",
        engine.index_size(),
        stage.elapsed().as_secs_f64()
    )?;

    let query_store;
    let queries: &[Sequence] = if is_ava {
        &targets
    } else {
        let stage = Instant::now();
        query_store = io::read_sequences(sequences_path.expect("checked above"))?;
        stderrln!(
            "[ovlx] parsed {} sequences {:.2}s",
            query_store.len(),
            stage.elapsed().as_secs_f64()
        )?;
        &query_store
    };

    let opts = SketchOpts {
        micromize,
        ..SketchOpts::default()
    };

    let stage = Instant::now();
    let engine = &engine;
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());

    thread::scope(|s| -> Result<()> {
        let (job_tx, job_rx) = chan::bounded::<(u64, &Sequence)>(512);
        let (res_tx, res_rx) = chan::bounded::<(u64, ovlx::Result<Vec<Overlap>>)>(512);

        for _ in 0..threads {
            let job_rx = job_rx.clone();
            let res_tx = res_tx.clone();
            s.spawn(move || {
                while let Ok((idx, query)) = job_rx.recv() {
                    if res_tx.send((idx, engine.map(query, is_ava, is_ava, &opts))).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(res_tx);

        s.spawn(move || {
            for (idx, query) in queries.iter().enumerate() {
                if job_tx.send((idx as u64, query)).is_err() {
                    break;
                }
            }
        });

        // results come back in completion order; buffer and write in input order
        let mut next = 0u64;
        let mut pending: BTreeMap<u64, Vec<Overlap>> = BTreeMap::new();
        let mut mapped = 0u64;
        while let Ok((idx, result)) = res_rx.recv() {
            pending.insert(idx, result?);
            while let Some(overlaps) = pending.remove(&next) {
                for overlap in &overlaps {
                    io::write_paf(&mut out, overlap, queries, &targets)?;
                }
                next += 1;
                mapped += 1;
                if mapped % 5000 == 0 {
                    stderrln!(
                        "[ovlx] mapped {} sequences {:.2}s",
                        mapped,
                        stage.elapsed().as_secs_f64()
                    )?;
                }
            }
        }
        Ok(())
    })?;

    out.flush()?;
    stderrln!("[ovlx] {:.2}s", total.elapsed().as_secs_f64())?;

    Ok(())
}
