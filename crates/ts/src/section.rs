//! Per-PID PSI section reassembly.
//!
//! Turns the payload stream of a single PID into complete, length-delimited
//! PSI sections. One [`SectionBuffer`] is kept per tracked PID; it owns a
//! fixed-capacity scratch area and a continuity-counter state machine so
//! discontinuities reset cleanly without the caller needing to track
//! anything beyond the raw packet fields.

/// Hard cap on the number of bytes a single PSI section can occupy.
pub const SECTION_BUFFER_CAP: usize = 4096;

/// Sticky bit recording "a unit_start has been observed at least once";
/// folded into the same 5-bit state as the tracked continuity counter so a
/// stream's first packet never accidentally looks continuous.
const SEEN: u8 = 0x20;
const COUNTER_MASK: u8 = 0x2F;

/// Reassembly state for one PID.
#[derive(Debug, Clone)]
pub struct SectionBuffer {
    cc: u8,
    data: Vec<u8>,
}

impl Default for SectionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionBuffer {
    pub fn new() -> Self {
        SectionBuffer {
            cc: 0,
            data: Vec::with_capacity(SECTION_BUFFER_CAP),
        }
    }

    /// Discard any in-progress section and forget the continuity counter.
    pub fn reset(&mut self) {
        self.cc = 0;
        self.data.clear();
    }

    fn section_length(&self) -> Option<usize> {
        if self.data.len() < 3 {
            return None;
        }
        Some((((self.data[1] as usize) & 0x0F) << 8) | self.data[2] as usize)
    }

    fn append_capped(&mut self, bytes: &[u8]) {
        let room = SECTION_BUFFER_CAP.saturating_sub(self.data.len());
        let take = room.min(bytes.len());
        self.data.extend_from_slice(&bytes[..take]);
    }

    /// Emit every complete, non-stuffing section sitting at the front of the
    /// buffer, shifting each one out as it is consumed.
    fn drain_complete(&mut self, mut emit: impl FnMut(&[u8])) {
        loop {
            if self.data.first() == Some(&0xFF) {
                return;
            }
            let Some(len) = self.section_length() else {
                return;
            };
            let total = 3 + len;
            if self.data.len() < total {
                return;
            }
            emit(&self.data[..total]);
            self.data.drain(..total);
        }
    }

    /// Feed one packet's payload into the reassembler.
    ///
    /// `counter` is the packet's 4-bit continuity_counter. `emit` is called
    /// once per completed, non-stuffing section.
    pub fn feed(
        &mut self,
        payload: &[u8],
        unit_start: bool,
        counter: u8,
        mut emit: impl FnMut(&[u8]),
    ) {
        let from = if unit_start {
            if payload.is_empty() {
                self.reset();
                return;
            }
            let pointer = payload[0] as usize;
            self.cc = (self.cc + 1) & COUNTER_MASK;

            if pointer > 0 && self.cc == (SEEN | counter) && 1 + pointer <= payload.len() {
                self.append_capped(&payload[1..1 + pointer]);
                if self.data.first() != Some(&0xFF)
                    && let Some(len) = self.section_length()
                    && self.data.len() >= 3 + len
                {
                    emit(&self.data[..3 + len]);
                }
            }

            self.cc = SEEN | counter;
            self.data.clear();
            (1 + pointer).min(payload.len())
        } else {
            if payload.is_empty() {
                return;
            }
            self.cc = (self.cc + 1) & COUNTER_MASK;
            if self.cc != (SEEN | counter) {
                self.reset();
                return;
            }
            0
        };

        self.append_capped(&payload[from..]);
        self.drain_complete(&mut emit);
    }
}
