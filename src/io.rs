//! Sequence input and PAF output.
//!
//! These are the engine's external collaborators: FASTA/FASTQ parsing
//! (optionally gzipped, decided by extension) into [`Sequence`] batches with
//! densely packed ids, and the 12-column PAF printer used by the CLI.

use anyhow::Result;
use bio::io::{fasta, fastq};
use flate2::read::MultiGzDecoder;
use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::Path,
};

use crate::types::{Overlap, Sequence};

enum Format {
    Fasta,
    Fastq,
}

fn detect_format(path: &Path) -> Result<(Format, bool)> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let gzipped = name.ends_with(".gz");
    let base = name.strip_suffix(".gz").unwrap_or(name);

    if base.ends_with(".fasta") || base.ends_with(".fa") {
        Ok((Format::Fasta, gzipped))
    } else if base.ends_with(".fastq") || base.ends_with(".fq") {
        Ok((Format::Fastq, gzipped))
    } else {
        anyhow::bail!(
            "file {} has unsupported format extension \
             (valid extensions: .fasta, .fasta.gz, .fa, .fa.gz, .fastq, .fastq.gz, .fq, .fq.gz)",
            path.display()
        )
    }
}

fn open_reader(path: &Path, gzipped: bool) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    if gzipped {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Load every sequence from a FASTA/FASTQ file, plain or gzipped.
///
/// Ids are assigned densely from zero in file order, which is what the
/// engine's symmetric filters expect.
pub fn read_sequences<P: AsRef<Path>>(path: P) -> Result<Vec<Sequence>> {
    let path = path.as_ref();
    let (format, gzipped) = detect_format(path)?;
    let reader = open_reader(path, gzipped)?;

    let mut out = Vec::new();
    match format {
        Format::Fasta => {
            for record in fasta::Reader::from_bufread(reader).records() {
                let record = record?;
                out.push(Sequence::new(
                    out.len() as u32,
                    record.id(),
                    record.seq().to_vec(),
                ));
            }
        }
        Format::Fastq => {
            for record in fastq::Reader::from_bufread(reader).records() {
                let record = record?;
                out.push(Sequence::new(
                    out.len() as u32,
                    record.id(),
                    record.seq().to_vec(),
                ));
            }
        }
    }
    Ok(out)
}

/// Write one overlap as a PAF line.
///
/// Ids index into the query/target batches the overlap was produced from;
/// the trailing 255 is the unknown-mapping-quality placeholder.
pub fn write_paf<W: Write>(
    w: &mut W,
    overlap: &Overlap,
    queries: &[Sequence],
    targets: &[Sequence],
) -> Result<()> {
    let q = &queries[overlap.lhs_id as usize];
    let t = &targets[overlap.rhs_id as usize];
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t255",
        q.name,
        q.len(),
        overlap.lhs_begin,
        overlap.lhs_end,
        if overlap.strand { '+' } else { '-' },
        t.name,
        t.len(),
        overlap.rhs_begin,
        overlap.rhs_end,
        overlap.score,
        overlap.length(),
    )?;
    Ok(())
}
