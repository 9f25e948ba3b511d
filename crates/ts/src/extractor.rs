//! PSI/SI extractor: the coordinator that drives the section reassembler,
//! PAT tracker, and PMT rewriter, and surfaces `(pid, pcr, section)` to a
//! sink.

use std::collections::HashMap;

use crate::packet::{TsPacket, PID_PAT};
use crate::pat::{Pat, PatSynthesizer, ProgramSelector};
use crate::pmt::PmtSynthesizer;
use crate::section::SectionBuffer;
use crate::target::TargetSet;

/// The only dynamic dispatch boundary in the extraction pipeline: one
/// callback receiving `(pid, pcr_90khz, section_bytes)` per emitted section.
/// Any `FnMut` with this signature implements it automatically.
pub trait SectionSink {
    fn on_section(&mut self, pid: u16, pcr_90khz: Option<u64>, section: &[u8]);
}

impl<F> SectionSink for F
where
    F: FnMut(u16, Option<u64>, &[u8]),
{
    fn on_section(&mut self, pid: u16, pcr_90khz: Option<u64>, section: &[u8]) {
        (self)(pid, pcr_90khz, section)
    }
}

/// Drives PAT/PMT synthesis and raw target-PID passthrough over a packet
/// stream. One instance tracks exactly one program.
pub struct PsiExtractor {
    program: Option<ProgramSelector>,
    targets: TargetSet,

    pat_buf: SectionBuffer,
    pmt_buf: SectionBuffer,
    target_bufs: HashMap<u16, SectionBuffer>,

    pat_synth: PatSynthesizer,
    pmt_synth: PmtSynthesizer,

    pat: Option<Pat>,
    pmt_pid: Option<u16>,
    nit_pid: u16,
    pcr_pid: Option<u16>,
    pcr: Option<u64>,
}

impl Default for PsiExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PsiExtractor {
    pub fn new() -> Self {
        PsiExtractor {
            program: None,
            targets: TargetSet::new(),
            pat_buf: SectionBuffer::new(),
            pmt_buf: SectionBuffer::new(),
            target_bufs: HashMap::new(),
            pat_synth: PatSynthesizer::new(),
            pmt_synth: PmtSynthesizer::new(),
            pat: None,
            pmt_pid: None,
            nit_pid: 0,
            pcr_pid: None,
            pcr: None,
        }
    }

    /// Select the program to track: positive selects by exact
    /// `program_number`, negative selects the `|n|`-th non-NIT program.
    /// Not calling this at all disables PAT/PMT synthesis entirely; only
    /// explicitly added target PIDs are then passed through verbatim.
    pub fn with_program(mut self, program_number_or_index: i32) -> Self {
        self.program = Some(ProgramSelector(program_number_or_index));
        self
    }

    pub fn add_target_pid(&mut self, pid: u16) {
        self.targets.add_pid(pid);
    }

    pub fn add_target_stream_type(&mut self, stream_type: u8) {
        self.targets.add_stream_type(stream_type);
    }

    /// Feed one 188-byte packet through the pipeline.
    pub fn add_packet(&mut self, packet: &TsPacket, sink: &mut impl SectionSink) {
        let pid = packet.pid;
        let payload = packet.payload.as_deref().unwrap_or(&[]);
        let unit_start = packet.payload_unit_start_indicator;
        let counter = packet.continuity_counter;

        if Some(pid) == self.pcr_pid
            && let Some(af) = packet.parse_adaptation_field()
            && let Some(pcr) = af.pcr
        {
            self.pcr = Some(pcr.base);
        }

        if pid == PID_PAT && self.program.is_some() {
            self.handle_pat(payload, unit_start, counter, sink);
            return;
        }

        if self.program.is_some() && self.pmt_pid == Some(pid) {
            self.handle_pmt(payload, unit_start, counter, sink);
        }

        if self.targets.contains(pid) {
            let pcr = self.pcr;
            let buf = self.target_bufs.entry(pid).or_default();
            buf.feed(payload, unit_start, counter, |section| {
                sink.on_section(pid, pcr, section)
            });
        }
    }

    fn handle_pat(
        &mut self,
        payload: &[u8],
        unit_start: bool,
        counter: u8,
        sink: &mut impl SectionSink,
    ) {
        let mut parsed = None;
        self.pat_buf.feed(payload, unit_start, counter, |section| {
            if let Ok(pat) = Pat::parse(section) {
                parsed = Some(pat);
            }
        });
        if let Some(pat) = parsed {
            self.pat = Some(pat);
        }

        let Some(pat) = self.pat.clone() else {
            return;
        };
        let selector = self.program.expect("guarded by caller");

        match selector.select(&pat.programs) {
            Some(prog) => {
                let program_number = prog.program_number;
                let pmt_pid = prog.pmt_pid;
                self.pmt_pid = Some(pmt_pid);

                if unit_start {
                    let nit_pid = pat.network_pid().filter(|&p| p != 0).unwrap_or(0);
                    if self.nit_pid != nit_pid {
                        if self.nit_pid != 0 {
                            self.targets.remove(self.nit_pid);
                            self.target_bufs.remove(&self.nit_pid);
                        }
                        if nit_pid != 0 {
                            self.targets.add_pid(nit_pid);
                        }
                        self.nit_pid = nit_pid;
                    }
                    let nit_opt = (nit_pid != 0).then_some(nit_pid);
                    let section = self.pat_synth.synthesize(
                        pat.transport_stream_id,
                        program_number,
                        pmt_pid,
                        nit_opt,
                    );
                    sink.on_section(PID_PAT, self.pcr, &section);
                }
            }
            None => {
                self.pcr_pid = None;
                self.pcr = None;
                self.pmt_pid = None;
            }
        }
    }

    fn handle_pmt(
        &mut self,
        payload: &[u8],
        unit_start: bool,
        counter: u8,
        sink: &mut impl SectionSink,
    ) {
        let pmt_pid = self.pmt_pid.expect("guarded by caller");
        let mut completed = Vec::new();
        self.pmt_buf.feed(payload, unit_start, counter, |section| {
            completed.push(section.to_vec());
        });

        for table in completed {
            if table.len() < 6 || table[0] != 0x02 || table[5] & 0x01 == 0 {
                continue;
            }

            if let Some((section, pcr_pid)) = self.pmt_synth.synthesize(&table, &mut self.targets)
            {
                if pcr_pid == 0x1FFF {
                    self.pcr_pid = None;
                    self.pcr = None;
                } else {
                    self.pcr_pid = Some(pcr_pid);
                }
                self.target_bufs.retain(|pid, _| self.targets.contains(*pid));
                sink.on_section(pmt_pid, self.pcr, &section);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc32::mpeg2_crc32;
    use bytes::Bytes;

    fn ts_packet(pid: u16, unit_start: bool, counter: u8, payload: &[u8]) -> TsPacket {
        let mut data = vec![0u8; 188];
        data[0] = 0x47;
        data[1] = (if unit_start { 0x40 } else { 0 }) | ((pid >> 8) as u8 & 0x1F);
        data[2] = pid as u8;
        data[3] = 0x10 | (counter & 0x0F); // payload only
        let mut p = vec![];
        if unit_start {
            p.push(0); // pointer_field
        }
        p.extend_from_slice(payload);
        let n = p.len().min(184);
        data[4..4 + n].copy_from_slice(&p[..n]);
        TsPacket::parse(Bytes::from(data)).unwrap()
    }

    fn pat_section(program_number: u16, pmt_pid: u16) -> Vec<u8> {
        let mut s = vec![
            0x00,
            0x80,
            0x00,
            0x00,
            0x01,
            0x01,
            0x00,
            0x00,
            (program_number >> 8) as u8,
            program_number as u8,
            0xE0 | ((pmt_pid >> 8) as u8),
            pmt_pid as u8,
        ];
        let crc = mpeg2_crc32(&s);
        s.extend_from_slice(&crc.to_be_bytes());
        let len = s.len() - 3;
        s[1] = 0x80 | ((len >> 8) as u8 & 0x0F);
        s[2] = len as u8;
        // recompute crc with correct length bytes
        s.truncate(s.len() - 4);
        let crc = mpeg2_crc32(&s);
        s.extend_from_slice(&crc.to_be_bytes());
        s
    }

    fn pmt_section(program_number: u16, pcr_pid: u16, streams: &[(u8, u16)]) -> Vec<u8> {
        let mut s = vec![0x02u8, 0, 0];
        s.push((program_number >> 8) as u8);
        s.push(program_number as u8);
        s.push(0x01);
        s.push(0);
        s.push(0);
        s.push(0xE0 | ((pcr_pid >> 8) as u8));
        s.push(pcr_pid as u8);
        s.push(0);
        s.push(0);
        for &(stype, pid) in streams {
            s.push(stype);
            s.push(0xE0 | ((pid >> 8) as u8));
            s.push(pid as u8);
            s.push(0);
            s.push(0);
        }
        let len = s.len() - 3 + 4;
        s[1] = 0xB0 | ((len >> 8) as u8);
        s[2] = len as u8;
        let crc = mpeg2_crc32(&s);
        s.extend_from_slice(&crc.to_be_bytes());
        s
    }

    #[test]
    fn synthesizes_pat_and_pmt_for_selected_program() {
        let mut ext = PsiExtractor::new().with_program(1);
        ext.add_target_stream_type(0x1B);

        let sections: std::cell::RefCell<Vec<(u16, Vec<u8>)>> = std::cell::RefCell::new(Vec::new());
        let mut sink = |pid: u16, _pcr: Option<u64>, sec: &[u8]| {
            sections.borrow_mut().push((pid, sec.to_vec()));
        };

        let pat = pat_section(1, 0x1000);
        ext.add_packet(&ts_packet(0x0000, true, 0, &pat), &mut sink);
        assert_eq!(sections.borrow().len(), 1);
        assert_eq!(sections.borrow()[0].0, 0x0000);
        assert_eq!(mpeg2_crc32(&sections.borrow()[0].1), 0);

        let pmt = pmt_section(1, 0x100, &[(0x1B, 0x100)]);
        ext.add_packet(&ts_packet(0x1000, true, 0, &pmt), &mut sink);
        assert_eq!(sections.borrow().len(), 2);
        assert_eq!(sections.borrow()[1].0, 0x1000);
        assert_eq!(mpeg2_crc32(&sections.borrow()[1].1), 0);
        assert_eq!(&sections.borrow()[1].1[8..10], &[0xFF, 0xFF]);
    }

    #[test]
    fn negative_program_disappearing_clears_pcr_tracking() {
        let mut ext = PsiExtractor::new().with_program(1);
        let mut sink = |_: u16, _: Option<u64>, _: &[u8]| {};
        let pat = pat_section(2, 0x2000); // program 1 absent
        ext.add_packet(&ts_packet(0x0000, true, 0, &pat), &mut sink);
        assert!(ext.pmt_pid.is_none());
        assert!(ext.pcr.is_none());
    }

    #[test]
    fn raw_target_pid_passthrough_without_program_selection() {
        let mut ext = PsiExtractor::new();
        ext.add_target_pid(0x30);
        let mut sections = Vec::new();
        let mut sink = |pid: u16, _: Option<u64>, sec: &[u8]| sections.push((pid, sec.to_vec()));

        let mut body = vec![0x70u8, 0x80, 0x02, 0xAA, 0xBB];
        let crc = mpeg2_crc32(&body);
        body.extend_from_slice(&crc.to_be_bytes());
        ext.add_packet(&ts_packet(0x30, true, 0, &body), &mut sink);
        assert_eq!(sections, vec![(0x30, body)]);
    }
}
