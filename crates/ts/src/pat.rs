//! Program Association Table parsing and synthesis.

use crate::crc32::mpeg2_crc32;
use crate::error::TsError;
use crate::Result;

/// One `program_number -> pmt_pid` mapping from a PAT. `program_number == 0`
/// denotes the NIT reference rather than a real program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatProgram {
    pub program_number: u16,
    pub pmt_pid: u16,
}

/// A fully parsed PAT section.
#[derive(Debug, Clone)]
pub struct Pat {
    pub transport_stream_id: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub programs: Vec<PatProgram>,
}

impl Pat {
    /// Parse a complete PAT section (`table_id == 0x00`).
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(TsError::InsufficientData {
                expected: 8,
                actual: data.len(),
            });
        }
        let table_id = data[0];
        if table_id != 0x00 {
            return Err(TsError::InvalidTableId {
                expected: 0x00,
                actual: table_id,
            });
        }
        let section_length = (((data[1] as usize) & 0x0F) << 8) | data[2] as usize;
        if section_length < 5 || data.len() < 3 + section_length {
            return Err(TsError::InvalidSectionLength(section_length as u16));
        }
        let transport_stream_id = ((data[3] as u16) << 8) | data[4] as u16;
        let version_number = (data[5] >> 1) & 0x1F;
        let current_next_indicator = (data[5] & 0x01) != 0;

        let programs_end = 3 + section_length - 4; // exclude CRC32
        let mut programs = Vec::new();
        let mut offset = 8;
        while offset + 4 <= programs_end {
            let program_number = ((data[offset] as u16) << 8) | data[offset + 1] as u16;
            let pmt_pid = ((data[offset + 2] as u16 & 0x1F) << 8) | data[offset + 3] as u16;
            programs.push(PatProgram {
                program_number,
                pmt_pid,
            });
            offset += 4;
        }

        Ok(Pat {
            transport_stream_id,
            version_number,
            current_next_indicator,
            programs,
        })
    }

    pub fn network_pid(&self) -> Option<u16> {
        self.programs
            .iter()
            .find(|p| p.program_number == 0)
            .map(|p| p.pmt_pid)
    }
}

/// Caller-supplied selection rule for which program to track.
///
/// Mirrors the `-n` CLI contract: positive values select by exact
/// `program_number`; negative values select the `|n|`-th non-NIT program,
/// 1-based, in PAT order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramSelector(pub i32);

impl ProgramSelector {
    pub fn select<'a>(&self, programs: &'a [PatProgram]) -> Option<&'a PatProgram> {
        if self.0 < 0 {
            let mut k = -self.0;
            programs
                .iter()
                .filter(|p| p.program_number != 0)
                .find(|_| {
                    k -= 1;
                    k == 0
                })
        } else {
            let target = self.0 as u16;
            programs.iter().find(|p| p.program_number == target)
        }
    }
}

/// Builds minimal replacement PAT sections and applies the
/// reuse-vs-bump version/CRC rule across synthesis calls.
#[derive(Debug, Clone, Default)]
pub struct PatSynthesizer {
    last: Option<Vec<u8>>,
}

impl PatSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesize a PAT carrying exactly one program entry plus, if
    /// `nit_pid` is given, a leading NIT reference entry.
    pub fn synthesize(
        &mut self,
        transport_stream_id: u16,
        program_number: u16,
        pmt_pid: u16,
        nit_pid: Option<u16>,
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(21);
        buf.push(0x00);
        buf.push(0xB0);
        buf.push(if nit_pid.is_some() { 17 } else { 13 });
        buf.push((transport_stream_id >> 8) as u8);
        buf.push(transport_stream_id as u8);
        let version_byte = self
            .last
            .as_ref()
            .filter(|l| l.len() > 5)
            .map(|l| l[5])
            .unwrap_or(0xC1);
        buf.push(version_byte);
        buf.push(0);
        buf.push(0);
        if let Some(nit_pid) = nit_pid {
            buf.push(0);
            buf.push(0);
            buf.push(0xE0 | ((nit_pid >> 8) as u8));
            buf.push(nit_pid as u8);
        }
        buf.push((program_number >> 8) as u8);
        buf.push(program_number as u8);
        buf.push(0xE0 | ((pmt_pid >> 8) as u8));
        buf.push(pmt_pid as u8);

        finish_with_version_rule(&mut self.last, buf)
    }
}

/// Shared reuse-vs-bump version/CRC rule used by both PAT and PMT synthesis:
/// if `body` (everything before the CRC) matches the previous output
/// byte-for-byte, reuse its version byte and CRC; otherwise bump the 5-bit
/// version field (at `body[5]`) and recompute the CRC.
pub(crate) fn finish_with_version_rule(last: &mut Option<Vec<u8>>, mut body: Vec<u8>) -> Vec<u8> {
    if let Some(prev) = last.as_ref()
        && prev.len() == body.len() + 4
        && prev[..body.len()] == body[..]
    {
        body.extend_from_slice(&prev[prev.len() - 4..]);
    } else {
        body[5] = 0xC1 | ((((body[5] >> 1) as u32 + 1) & 0x1F) as u8) << 1;
        let crc = mpeg2_crc32(&body);
        body.extend_from_slice(&crc.to_be_bytes());
        *last = Some(body.clone());
    }
    body
}
