//! Program Map Table stream-type catalogue and synthesis.

use crate::pat::finish_with_version_rule;
use crate::target::TargetSet;

/// Buffer cap for one synthesized PMT; if copying elementary-stream entries
/// would overflow it the rewrite for that round is silently dropped.
pub const PMT_SYNTH_CAP: usize = 1024;

/// Stream types defined across MPEG-2 and common extensions, used to decide
/// whether an elementary stream belongs in the synthesized PMT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Mpeg1Video,
    Mpeg2Video,
    Mpeg1Audio,
    Mpeg2Audio,
    Mpeg2PrivateSections,
    Mpeg2PrivatePes,
    AdtsAac,
    Mpeg4Visual,
    LatmAac,
    H264,
    Mpeg4Audio,
    H265,
    H266,
    Ac3,
    Dts,
    EAc3,
    Unknown(u8),
}

impl From<u8> for StreamType {
    fn from(value: u8) -> Self {
        match value {
            0x01 => StreamType::Mpeg1Video,
            0x02 => StreamType::Mpeg2Video,
            0x03 => StreamType::Mpeg1Audio,
            0x04 => StreamType::Mpeg2Audio,
            0x05 => StreamType::Mpeg2PrivateSections,
            0x06 => StreamType::Mpeg2PrivatePes,
            0x0F => StreamType::AdtsAac,
            0x10 => StreamType::Mpeg4Visual,
            0x11 => StreamType::LatmAac,
            0x1B => StreamType::H264,
            0x1C => StreamType::Mpeg4Audio,
            0x24 => StreamType::H265,
            0x33 => StreamType::H266,
            0x81 => StreamType::Ac3,
            0x82 => StreamType::Dts,
            0x84 => StreamType::EAc3,
            other => StreamType::Unknown(other),
        }
    }
}

impl From<StreamType> for u8 {
    fn from(value: StreamType) -> u8 {
        match value {
            StreamType::Mpeg1Video => 0x01,
            StreamType::Mpeg2Video => 0x02,
            StreamType::Mpeg1Audio => 0x03,
            StreamType::Mpeg2Audio => 0x04,
            StreamType::Mpeg2PrivateSections => 0x05,
            StreamType::Mpeg2PrivatePes => 0x06,
            StreamType::AdtsAac => 0x0F,
            StreamType::Mpeg4Visual => 0x10,
            StreamType::LatmAac => 0x11,
            StreamType::H264 => 0x1B,
            StreamType::Mpeg4Audio => 0x1C,
            StreamType::H265 => 0x24,
            StreamType::H266 => 0x33,
            StreamType::Ac3 => 0x81,
            StreamType::Dts => 0x82,
            StreamType::EAc3 => 0x84,
            StreamType::Unknown(v) => v,
        }
    }
}

/// Builds a minimal replacement PMT keeping only elementary streams whose
/// type is in the target set, and applies the reuse-vs-bump version/CRC
/// rule across calls.
#[derive(Debug, Clone, Default)]
pub struct PmtSynthesizer {
    last: Option<Vec<u8>>,
}

impl PmtSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `table` is the full PMT section body (`table_id` through CRC).
    /// Returns the synthesized section and the PID extracted from the
    /// original table's `PCR_PID` field, or `None` if the table is too
    /// short or the synthesized buffer would overflow [`PMT_SYNTH_CAP`].
    pub fn synthesize(&mut self, table: &[u8], targets: &mut TargetSet) -> Option<(Vec<u8>, u16)> {
        if table.len() < 12 {
            return None;
        }
        let section_length = (((table[1] as usize) & 0x0F) << 8) | table[2] as usize;
        if table.len() < 3 + section_length {
            return None;
        }
        let pcr_pid = ((table[8] as u16 & 0x1F) << 8) | table[9] as u16;
        let program_info_length = ((table[10] as usize) & 0x03) << 8 | table[11] as usize;
        let mut pos = 3 + 9 + program_info_length;
        if 3 + section_length < pos {
            return None;
        }

        let mut buf = vec![0u8; PMT_SYNTH_CAP];
        buf[0] = 0x02;
        buf[3] = table[3];
        buf[4] = table[4];
        buf[5] = self
            .last
            .as_ref()
            .filter(|l| l.len() > 5)
            .map(|l| l[5])
            .unwrap_or(0xC1);
        buf[6] = 0;
        buf[7] = 0;
        // replacement carries no PCR; timing travels via the archiver's time track
        buf[8] = 0xFF;
        buf[9] = 0xFF;
        buf[10] = table[10];
        buf[11] = table[11];
        if pos > PMT_SYNTH_CAP {
            return None;
        }
        buf[12..pos].copy_from_slice(&table[12..pos]);
        let mut buf_len = pos;

        let table_len = 3 + section_length - 4;
        while pos + 4 < table_len {
            let stream_type = table[pos];
            let es_pid = ((table[pos + 1] as u16 & 0x1F) << 8) | table[pos + 2] as u16;
            let es_info_length = ((table[pos + 3] as usize) & 0x03) << 8 | table[pos + 4] as usize;
            let entry_len = 5 + es_info_length;
            if pos + entry_len <= table_len {
                if targets.wants_stream_type(stream_type) {
                    if buf_len + entry_len > PMT_SYNTH_CAP {
                        return None;
                    }
                    buf[buf_len..buf_len + entry_len].copy_from_slice(&table[pos..pos + entry_len]);
                    buf_len += entry_len;
                    targets.mark_exists_on_pmt(es_pid);
                }
            }
            pos += entry_len;
        }

        targets.sweep_after_pmt();

        let section_len_field = buf_len + 4 - 3;
        buf[1] = 0xB0 | ((section_len_field >> 8) as u8);
        buf[2] = section_len_field as u8;
        buf.truncate(buf_len);

        let finished = finish_with_version_rule(&mut self.last, buf);
        Some((finished, pcr_pid))
    }
}
