//! Chunk writer: turns deduplicated PSI sections and a PCR-derived time
//! track into the fixed-layout PSSC archive format.

use std::io::Write;

use crate::dictionary::{DictEntry, DictPage, CODE_NUMBER_BEGIN};
use crate::error::Result;
use crate::time_track::{TimeTrack, UNKNOWN_TIME};

pub const MAGIC: [u8; 8] = [0x50, 0x73, 0x73, 0x63, 0x0D, 0x0A, 0x9A, 0x0A];
const CHUNK_HEADER_SIZE: usize = 32;
const DEFAULT_DICT_MAX_BUF_SIZE: usize = 16 * 1024 * 1024;
const MIN_DICT_MAX_BUF_SIZE: usize = 8 * 1024;
const MAX_DICT_MAX_BUF_SIZE: usize = 1024 * 1024 * 1024;
const TRAILER: [u8; 4] = [0x3D, 0x3D, 0x3D, 0x3D];

const MAX_TIME_RECORDS: usize = 65536 - 4;
const MAX_DICT_ENTRIES: usize = 65536 - CODE_NUMBER_BEGIN as usize;

/// Dictionary-coded PSI section archiver, writing chunks to `W` as the
/// sliding window rolls over.
pub struct Archiver<W: Write> {
    writer: W,

    time_track: TimeTrack,
    dict: DictPage,
    last_dict: DictPage,
    code_list: Vec<u8>,

    dictionary_data_size: usize,
    dictionary_buf_size: usize,
    dictionary_max_buf_size: usize,

    last_write_time: u32,
    write_interval: u32,
    trailer_size: usize,
}

impl<W: Write> Archiver<W> {
    pub fn new(writer: W) -> Self {
        Archiver {
            writer,
            time_track: TimeTrack::new(),
            dict: DictPage::new(),
            last_dict: DictPage::new(),
            code_list: Vec::new(),
            dictionary_data_size: 0,
            dictionary_buf_size: 0,
            dictionary_max_buf_size: DEFAULT_DICT_MAX_BUF_SIZE,
            last_write_time: UNKNOWN_TIME,
            write_interval: UNKNOWN_TIME,
            trailer_size: 0,
        }
    }

    /// `0` disables time-based rollover (chunks only roll when a capacity
    /// limit is hit).
    pub fn with_write_interval(mut self, interval_11khz_ticks: u32) -> Self {
        self.write_interval = if interval_11khz_ticks == 0 {
            UNKNOWN_TIME
        } else {
            interval_11khz_ticks
        };
        self
    }

    /// Clamped to `[8 KiB, 1 GiB]`.
    pub fn with_dictionary_max_buf_size(mut self, size: usize) -> Self {
        self.dictionary_max_buf_size = size.clamp(MIN_DICT_MAX_BUF_SIZE, MAX_DICT_MAX_BUF_SIZE);
        self
    }

    /// Append one PSI section. `pcr_90khz` is the current PCR base for this
    /// stream, or `None` if unknown; it is downsampled to 11.25 kHz for the
    /// time track.
    pub fn add(&mut self, pid: u16, pcr_90khz: Option<u64>, psi: &[u8]) -> Result<()> {
        if psi.is_empty() {
            return Ok(());
        }
        if self.last_write_time == UNKNOWN_TIME {
            self.last_write_time = self.time_track.current_time();
        }

        let over_capacity = self.time_track.record_count() >= MAX_TIME_RECORDS
            || self.dict.len() >= MAX_DICT_ENTRIES
            || self.dictionary_buf_size + 2 + 4096 > self.dictionary_max_buf_size
            || (self.time_track.current_time() != UNKNOWN_TIME
                && self.last_write_time != UNKNOWN_TIME
                && wrapping_diff(self.time_track.current_time(), self.last_write_time)
                    >= self.write_interval);
        if over_capacity {
            self.flush(true)?;
        }

        let pcr11khz = pcr_90khz.map(|p| (p >> 3) as u32).unwrap_or(UNKNOWN_TIME);
        self.time_track.add(pcr11khz);

        let dict_index = if let Some(idx) = self.dict.find(pid, psi) {
            idx
        } else {
            let carried = self.last_dict.find(pid, psi);
            let entry = match carried {
                None => {
                    self.dictionary_data_size += 2 + psi.len();
                    DictEntry {
                        code_or_size: (psi.len() - 1) as u16,
                        pid,
                        token: psi.to_vec(),
                    }
                }
                Some(last_idx) => {
                    let token = std::mem::take(&mut self.last_dict.entries[last_idx as usize].token);
                    DictEntry {
                        code_or_size: CODE_NUMBER_BEGIN + last_idx,
                        pid,
                        token,
                    }
                }
            };
            self.dictionary_buf_size += 2 + entry.token.len();
            self.dict.push(entry)
        };

        let code = CODE_NUMBER_BEGIN + dict_index;
        self.code_list.push(code as u8);
        self.code_list.push((code >> 8) as u8);
        Ok(())
    }

    /// Write the current chunk, if non-empty, and roll the dictionary
    /// window over. `suppress_trailer` defers the chunk's closing marker
    /// until the next `flush`, so a reader never sees a trailer it cannot
    /// yet tell is final.
    pub fn flush(&mut self, suppress_trailer: bool) -> Result<()> {
        if self.code_list.is_empty() {
            if !suppress_trailer && self.trailer_size > 0 {
                self.writer.write_all(&TRAILER[..self.trailer_size])?;
                self.trailer_size = 0;
                self.writer.flush()?;
            }
            return Ok(());
        }

        self.time_track.finish_pending();

        let mut dictionary_window_size = self.dict.len();
        if self.write_interval != UNKNOWN_TIME {
            for entry in &self.last_dict.entries {
                if entry.token.is_empty() {
                    continue;
                }
                if dictionary_window_size >= MAX_DICT_ENTRIES
                    || self.dictionary_buf_size + 2 + entry.token.len() > self.dictionary_max_buf_size
                {
                    break;
                }
                dictionary_window_size += 1;
                self.dictionary_buf_size += 2 + entry.token.len();
            }
        }

        if self.trailer_size > 0 {
            self.writer.write_all(&TRAILER[..self.trailer_size])?;
        }
        tracing::debug!(
            dict_entries = self.dict.len(),
            codes = self.code_list.len() / 2,
            window = dictionary_window_size,
            "writing chunk"
        );
        self.write_chunk(dictionary_window_size)?;

        let written_units = self.dict.len()
            + (self.dictionary_data_size + 1) / 2
            + self.code_list.len() / 2;
        self.trailer_size = if written_units % 2 != 0 { 2 } else { 4 };
        if !suppress_trailer {
            self.writer.write_all(&TRAILER[..self.trailer_size])?;
            self.trailer_size = 0;
        }
        self.writer.flush()?;

        self.roll_window(dictionary_window_size);
        Ok(())
    }

    fn write_chunk(&mut self, dictionary_window_size: usize) -> std::io::Result<()> {
        let mut header = [0u8; CHUNK_HEADER_SIZE];
        header[0..8].copy_from_slice(&MAGIC);
        let time_records = self.time_track.record_count() as u16;
        header[10..12].copy_from_slice(&time_records.to_le_bytes());
        header[12..14].copy_from_slice(&(self.dict.len() as u16).to_le_bytes());
        header[14..16].copy_from_slice(&(dictionary_window_size as u16).to_le_bytes());
        header[16..20].copy_from_slice(&(self.dictionary_data_size as u32).to_le_bytes());
        header[20..24].copy_from_slice(&(self.dictionary_buf_size as u32).to_le_bytes());
        header[24..28].copy_from_slice(&((self.code_list.len() / 2) as u32).to_le_bytes());

        self.writer.write_all(&header)?;
        self.writer.write_all(self.time_track.as_bytes())?;

        for entry in &self.dict.entries {
            self.writer.write_all(&entry.code_or_size.to_le_bytes())?;
        }
        for entry in &self.dict.entries {
            if entry.is_literal() {
                let pid_bytes = [entry.pid as u8, ((entry.pid >> 8) as u8) | 0xE0];
                self.writer.write_all(&pid_bytes)?;
            }
        }
        for entry in &self.dict.entries {
            if entry.is_literal() {
                self.writer.write_all(&entry.token)?;
            }
        }
        if self.dictionary_data_size % 2 != 0 {
            self.writer.write_all(&[0xFF])?;
        }
        self.writer.write_all(&self.code_list)
    }

    fn roll_window(&mut self, dictionary_window_size: usize) {
        // Leave unused previous-chunk entries available as back-reference
        // targets for the upcoming period, up to the advertised window size.
        for entry in self.last_dict.entries.iter_mut() {
            if self.dict.len() >= dictionary_window_size {
                break;
            }
            if entry.token.is_empty() {
                continue;
            }
            let token = std::mem::take(&mut entry.token);
            self.dict.push(DictEntry {
                code_or_size: 0,
                pid: entry.pid,
                token,
            });
        }

        self.time_track.reset();
        self.dict.swap(&mut self.last_dict);
        self.dict.clear();
        self.code_list.clear();
        self.dictionary_data_size = 0;
        self.dictionary_buf_size = 0;
        self.last_write_time = UNKNOWN_TIME;
    }
}

fn wrapping_diff(a: u32, b: u32) -> u32 {
    (0x4000_0000u32.wrapping_add(a).wrapping_sub(b)) & 0x3FFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(tag: u8, len: usize) -> Vec<u8> {
        vec![tag; len]
    }

    #[test]
    fn single_chunk_layout_round_trips_magic_and_counts() {
        let mut out = Vec::new();
        {
            let mut archiver = Archiver::new(&mut out);
            archiver.add(0x100, Some(900_000), &section(1, 10)).unwrap();
            archiver.add(0x100, Some(900_000), &section(1, 10)).unwrap(); // dup -> backref-free repeat
            archiver.add(0x101, Some(900_000), &section(2, 20)).unwrap();
            archiver.flush(false).unwrap();
        }
        assert_eq!(&out[0..8], &MAGIC);
        let dict_len = u16::from_le_bytes([out[12], out[13]]);
        assert_eq!(dict_len, 2); // two distinct sections, the dup reused dict_index
        let code_count = u32::from_le_bytes([out[24], out[25], out[26], out[27]]);
        assert_eq!(code_count, 3);
    }

    #[test]
    fn duplicate_within_chunk_reuses_dictionary_slot() {
        let mut out = Vec::new();
        let mut archiver = Archiver::new(&mut out);
        archiver.add(0x100, None, &section(9, 8)).unwrap();
        archiver.add(0x100, None, &section(9, 8)).unwrap();
        assert_eq!(archiver.dict.len(), 1);
        assert_eq!(archiver.code_list.len(), 4); // two 2-byte codes, same value
        assert_eq!(&archiver.code_list[0..2], &archiver.code_list[2..4]);
    }

    #[test]
    fn empty_psi_is_ignored() {
        let mut out = Vec::new();
        let mut archiver = Archiver::new(&mut out);
        archiver.add(0x100, None, &[]).unwrap();
        assert_eq!(archiver.dict.len(), 0);
        assert_eq!(archiver.code_list.len(), 0);
    }

    #[test]
    fn flush_with_nothing_pending_and_no_deferred_trailer_writes_nothing() {
        let mut out = Vec::new();
        let mut archiver = Archiver::new(&mut out);
        archiver.flush(false).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn carried_over_entry_is_reusable_as_backref_in_next_chunk() {
        let mut out = Vec::new();
        let mut archiver = Archiver::new(&mut out).with_write_interval(1);
        let body = section(7, 30);
        archiver.add(0x200, Some(0), &body).unwrap();
        archiver.flush(false).unwrap();
        // Re-adding the identical section in the next chunk should find it
        // via the carried-over (or rolled) dictionary rather than creating
        // a second literal entry.
        archiver.add(0x200, Some(0), &body).unwrap();
        assert_eq!(archiver.dict.len(), 1);
    }
}
