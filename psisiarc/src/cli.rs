use clap::{Parser, ValueEnum};

/// Extracts PSI/SI tables from an MPEG-2 Transport Stream into a
/// dictionary-coded PSSC archive.
#[derive(Parser, Debug)]
#[command(name = "psisiarc", version, about)]
pub struct Args {
    /// Slash-separated PIDs (0..8191) to capture verbatim, e.g. `0x30/0x31`.
    #[arg(short = 'p', value_name = "pids")]
    pub pids: Option<String>,

    /// Program to track: positive selects by exact program_number, negative
    /// selects the |n|-th non-NIT program (1-based). 0 or omitted disables
    /// PAT/PMT synthesis entirely.
    #[arg(short = 'n', value_name = "prog_num_or_index", allow_negative_numbers = true)]
    pub program: Option<i32>,

    /// Slash-separated stream_type values (0..255) to include in the
    /// synthesized PMT, e.g. `13/14`.
    #[arg(short = 't', value_name = "stream_types")]
    pub stream_types: Option<String>,

    /// Shorthand for a preset PID and stream-type set.
    #[arg(short = 'r', value_name = "preset")]
    pub preset: Option<Preset>,

    /// Chunk write interval in seconds (0..600); 0 disables time-based
    /// rollover.
    #[arg(short = 'i', value_name = "interval", default_value_t = 0)]
    pub interval: u32,

    /// Dictionary memory cap in KiB, clamped to [8, 1048576].
    #[arg(short = 'b', value_name = "maxbuf_kbytes", default_value_t = 16 * 1024)]
    pub maxbuf_kbytes: u32,

    /// Increase log verbosity.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Input TS file, or `-` for stdin.
    pub src: String,

    /// Output PSSC archive file, or `-` for stdout.
    pub dest: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Preset {
    AribData,
    AribEpg,
}

/// `pids`/`stream_types` are slash-separated; bases are parsed C-style so
/// `0x..` hex literals are accepted alongside decimal.
pub fn parse_slash_list<T>(raw: &str) -> anyhow::Result<Vec<T>>
where
    T: TryFrom<u32>,
    T::Error: std::fmt::Display,
{
    raw.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                u32::from_str_radix(hex, 16)
            } else {
                s.parse::<u32>()
            }
            .map_err(|e| anyhow::anyhow!("invalid value '{s}': {e}"))?;
            T::try_from(value).map_err(|e| anyhow::anyhow!("value '{s}' out of range: {e}"))
        })
        .collect()
}
