//! The set of PIDs the extractor is asked to surface verbatim, plus the
//! elementary-stream PIDs discovered through PMT rewriting.

use std::collections::{HashMap, HashSet};

/// Per-PID bookkeeping for the target set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PsiState {
    /// Added directly by the caller (`-p`); survives PMT eviction passes.
    pub specified: bool,
    /// Set for the duration of one PMT rewrite if the PID showed up as an
    /// elementary stream of a target stream type; cleared after each pass.
    pub exists_on_pmt: bool,
}

/// `PID -> PsiState` plus the set of elementary stream types to capture.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    pids: HashMap<u16, PsiState>,
    stream_types: HashSet<u8>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pid(&mut self, pid: u16) {
        self.pids.entry(pid).or_default().specified = true;
    }

    pub fn add_stream_type(&mut self, stream_type: u8) {
        self.stream_types.insert(stream_type);
    }

    pub fn wants_stream_type(&self, stream_type: u8) -> bool {
        self.stream_types.contains(&stream_type)
    }

    pub fn contains(&self, pid: u16) -> bool {
        self.pids.contains_key(&pid)
    }

    /// Mark `pid` as present in the PMT just rewritten, creating the entry
    /// if it doesn't exist yet.
    pub fn mark_exists_on_pmt(&mut self, pid: u16) {
        self.pids.entry(pid).or_default().exists_on_pmt = true;
    }

    /// Drop the PID (used when the NIT PID changes).
    pub fn remove(&mut self, pid: u16) {
        self.pids.remove(&pid);
    }

    /// After a PMT rewrite pass: evict anything neither specified nor seen,
    /// and clear the transient flag on what remains.
    pub fn sweep_after_pmt(&mut self) {
        self.pids.retain(|_, s| s.specified || s.exists_on_pmt);
        for s in self.pids.values_mut() {
            s.exists_on_pmt = false;
        }
    }
}
