//! `psisiarc`: reads an MPEG-2 Transport Stream, tracks a single program's
//! PAT/PMT pair (rewriting it down to a chosen set of elementary streams),
//! and archives the extracted PSI/SI sections as a dictionary-coded PSSC
//! file.

mod cli;
mod presets;

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::process::ExitCode;

use anyhow::Context;
use bytes::Bytes;
use clap::{CommandFactory, Parser};
use pssc::Archiver;
use ts::{PsiExtractor, TsPacket};

use cli::{parse_slash_list, Args};

const PACKET_SIZE: usize = 188;
const READ_CHUNK_PACKETS: usize = 348; // ~64 KiB of 188-byte packets

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if err.kind() == clap::error::ErrorKind::DisplayHelp
            || err.kind() == clap::error::ErrorKind::DisplayVersion =>
        {
            let _ = err.print();
            return ExitCode::from(2);
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.interval > 600 {
        anyhow::bail!("-i interval must be between 0 and 600 seconds, got {}", args.interval);
    }
    let maxbuf_kbytes = args.maxbuf_kbytes.clamp(8, 1024 * 1024);

    let mut extractor = match args.program {
        Some(0) | None => PsiExtractor::new(),
        Some(n) => PsiExtractor::new().with_program(n),
    };

    if let Some(preset) = args.preset {
        let expansion = presets::expand(preset);
        for pid in expansion.pids {
            extractor.add_target_pid(pid);
        }
        for stream_type in expansion.stream_types {
            extractor.add_target_stream_type(stream_type);
        }
    }
    if let Some(raw) = &args.pids {
        for pid in parse_slash_list::<u16>(raw).context("-p")? {
            if pid > 0x1FFF {
                anyhow::bail!("-p pid {pid} out of range (0..8191)");
            }
            extractor.add_target_pid(pid);
        }
    }
    if let Some(raw) = &args.stream_types {
        for stream_type in parse_slash_list::<u8>(raw).context("-t")? {
            extractor.add_target_stream_type(stream_type);
        }
    }

    let mut reader = open_input(&args.src)?;
    let mut writer = open_output(&args.dest)?;

    let write_interval_11khz = args.interval.saturating_mul(11_250);
    let mut archiver = Archiver::new(&mut writer)
        .with_write_interval(write_interval_11khz)
        .with_dictionary_max_buf_size(maxbuf_kbytes as usize * 1024);

    let mut scratch = vec![0u8; PACKET_SIZE * READ_CHUNK_PACKETS];
    let mut archive_err: Option<pssc::PsscError> = None;
    loop {
        let filled = fill_aligned(&mut *reader, &mut scratch)?;
        if filled == 0 {
            break;
        }
        for chunk in scratch[..filled].chunks_exact(PACKET_SIZE) {
            if chunk[0] != 0x47 {
                continue; // dropped frame, resync is an external concern
            }
            let packet = match TsPacket::parse(Bytes::copy_from_slice(chunk)) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let mut sink_err = None;
            extractor.add_packet(&packet, &mut |pid: u16, pcr: Option<u64>, section: &[u8]| {
                if sink_err.is_some() {
                    return;
                }
                if let Err(e) = archiver.add(pid, pcr, section) {
                    sink_err = Some(e);
                }
            });
            if let Some(e) = sink_err {
                archive_err = Some(e);
                break;
            }
        }
        if archive_err.is_some() {
            break;
        }
    }
    if let Some(e) = archive_err {
        return Err(e.into());
    }
    archiver.flush(false)?;
    drop(archiver);
    writer.flush().context("writing archive")?;
    Ok(())
}

/// Reads into `buf` until it is full, EOF, or a short read leaves a partial
/// trailing packet, which is dropped (the source is assumed pre-aligned to
/// 188-byte boundaries; resync onto a misaligned capture is out of scope).
fn fill_aligned(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled - (filled % PACKET_SIZE))
}

fn open_input(src: &str) -> anyhow::Result<Box<dyn Read>> {
    if src == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file = File::open(src).with_context(|| format!("opening '{src}'"))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

fn open_output(dest: &str) -> anyhow::Result<Box<dyn Write>> {
    if dest == "-" {
        Ok(Box::new(BufWriter::new(io::stdout())))
    } else {
        let file = File::create(dest).with_context(|| format!("creating '{dest}'"))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}
