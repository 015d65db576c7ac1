//! Host port allocation for sandbox instances.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::Mutex;

use crate::error::PortError;

/// Hands out host ports from a fixed range, lowest first.
///
/// Ports are never returned to the pool: the allocator lives for one
/// orchestration run and supports at most `end - start` instances.
#[derive(Debug)]
pub struct PortAllocator {
    range: Range<u16>,
    in_use: Mutex<BTreeSet<u16>>,
}

impl PortAllocator {
    pub fn new(range: Range<u16>) -> Self {
        Self {
            range,
            in_use: Mutex::new(BTreeSet::new()),
        }
    }

    /// Claim the lowest port not yet handed out.
    pub fn assign_free_port(&self) -> Result<u16, PortError> {
        // Scan and insert under one lock so concurrent callers never race.
        let mut in_use = self.in_use.lock().unwrap_or_else(|e| e.into_inner());
        let port = self
            .range
            .clone()
            .find(|port| !in_use.contains(port))
            .ok_or(PortError::Exhausted {
                start: self.range.start,
                end: self.range.end,
            })?;
        in_use.insert(port);
        Ok(port)
    }

    /// Number of ports handed out so far.
    pub fn assigned(&self) -> usize {
        self.in_use.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn capacity(&self) -> usize {
        self.range.len()
    }
}
