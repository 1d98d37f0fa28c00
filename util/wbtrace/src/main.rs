//! Records leakage traces of a circuit on random plaintexts.
//!
//! Trace `i` lands in `<traces_dir>/<circuit name>/` as `%04d.pt` (input),
//! `%04d.ct` (output) and `%04d.bin` (one bit per gate, most significant bit
//! first). With `--fingerprint` the BLAKE3 digest of each batched trace is
//! printed as it is recorded.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use fastckt_exec::trace::split_batch;
use fastckt_exec::{Circuit, Fingerprint, RandomSource, TraceReader, TraceWriter};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Instances per execution, one per lane of a `u64`.
const BATCH: usize = 64;

#[derive(Parser)]
#[command(name = "wbtrace")]
#[command(about = "Trace a boolean circuit on random inputs", long_about = None)]
#[command(version)]
struct Cli {
    /// Circuit descriptor file
    #[arg(value_name = "CIRCUIT")]
    circuit: PathBuf,

    /// Output directory (a subdirectory named after the circuit is created)
    #[arg(value_name = "TRACES_DIR")]
    traces_dir: PathBuf,

    /// Number of traces to record
    #[arg(short = 't', short_alias = 'T', long, default_value_t = 512)]
    n_traces: usize,

    /// Seed used to generate plaintexts
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Seed for RANDOM gates (taken from the clock when absent)
    #[arg(long)]
    rng_seed: Option<u64>,

    /// Print the BLAKE3 digest of every batched trace
    #[arg(long)]
    fingerprint: bool,
}

/// File name of the circuit without a trailing `.bin`.
fn circuit_name(path: &Path) -> Result<&str> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    Ok(name.strip_suffix(".bin").unwrap_or(name))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut circuit = Circuit::<u64>::load(&cli.circuit)
        .with_context(|| format!("failed to load {}", cli.circuit.display()))?;
    let prefix = cli.traces_dir.join(circuit_name(&cli.circuit)?);

    println!(
        "Tracing {} on {} traces",
        cli.circuit.display(),
        cli.n_traces
    );
    println!("Saving to {}", prefix.display());
    fs::create_dir_all(&prefix)
        .with_context(|| format!("failed to create {}", prefix.display()))?;

    let in_bytes = circuit.info().input_bytes();
    let out_bytes = circuit.info().output_bytes();

    let mut plaintexts = vec![0u8; cli.n_traces * in_bytes];
    ChaCha20Rng::seed_from_u64(cli.seed).fill_bytes(&mut plaintexts);
    let mut ciphertexts = vec![0u8; cli.n_traces * out_bytes];

    let mut rng = match cli.rng_seed {
        Some(seed) => RandomSource::new(seed),
        None => RandomSource::from_time(),
    };

    let batches = cli.n_traces.div_ceil(BATCH);
    let pb = ProgressBar::new(batches as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos:>7}/{len:7} [{elapsed_precise}] {msg}")?,
    );
    let start = Instant::now();

    for batch in 0..batches {
        let first = batch * BATCH;
        let count = BATCH.min(cli.n_traces - first);
        let chunk = prefix.join(format!(".chunk{batch:04}.bin"));

        let file = File::create(&chunk)
            .with_context(|| format!("failed to create {}", chunk.display()))?;
        let mut sink = Fingerprint::new(TraceWriter::new(BufWriter::new(file)));
        circuit
            .compute(
                &plaintexts[first * in_bytes..(first + count) * in_bytes],
                &mut ciphertexts[first * out_bytes..(first + count) * out_bytes],
                Some(&mut sink),
                count,
                &mut rng,
            )
            .with_context(|| format!("batch {batch} failed"))?;

        let (writer, digest) = sink.into_parts();
        drop(writer);
        if cli.fingerprint {
            pb.suspend(|| println!("batch {batch:04} trace {digest}"));
        }

        split_chunk(&chunk, &prefix, first, count)?;
        fs::remove_file(&chunk)
            .with_context(|| format!("failed to remove {}", chunk.display()))?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    for i in 0..cli.n_traces {
        fs::write(
            prefix.join(format!("{i:04}.pt")),
            &plaintexts[i * in_bytes..(i + 1) * in_bytes],
        )?;
        fs::write(
            prefix.join(format!("{i:04}.ct")),
            &ciphertexts[i * out_bytes..(i + 1) * out_bytes],
        )?;
    }

    println!(
        "Recorded {} traces of {} gates in {:.2?}",
        cli.n_traces,
        circuit.info().num_opcodes,
        start.elapsed()
    );
    Ok(())
}

/// Splits one batched trace into `%04d.bin` files for traces `first..first + count`.
fn split_chunk(chunk: &Path, prefix: &Path, first: usize, count: usize) -> Result<()> {
    let file = File::open(chunk).with_context(|| format!("failed to open {}", chunk.display()))?;
    let reader = TraceReader::<_, u64>::new(BufReader::new(file));

    let mut writers = (first..first + count)
        .map(|i| {
            let path = prefix.join(format!("{i:04}.bin"));
            File::create(&path)
                .map(BufWriter::new)
                .with_context(|| format!("failed to create {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let records = split_batch(reader, &mut writers)
        .with_context(|| format!("failed to split {}", chunk.display()))?;
    log::debug!(
        "split {records} records of {} into {count} traces",
        chunk.display()
    );
    Ok(())
}
