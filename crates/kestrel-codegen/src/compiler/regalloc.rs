// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Virtual register allocation for one function.
//!
//! Named locals and parameters are allocated permanently. Temporaries are
//! checked out and released around the values they hold; a released
//! register goes back to the free pool and the lowest free number is handed
//! out next, so allocation is deterministic.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;

use crate::bytecode::VReg;
use crate::error::InternalError;

/// Register allocator for one function compilation.
#[derive(Debug, Default)]
pub struct RegisterAllocator {
    /// Size of the register file so far
    next: u32,
    /// Released temporaries available for reuse
    free: BTreeSet<u32>,
    /// Temporaries currently checked out
    live: FxHashSet<u32>,
}

impl RegisterAllocator {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks out a temporary register.
    pub fn acquire(&mut self) -> VReg {
        let index = self.take_lowest();
        self.live.insert(index);
        VReg::from(index)
    }

    /// Allocates a register for the lifetime of the function.
    pub fn acquire_local(&mut self) -> VReg {
        VReg::from(self.take_lowest())
    }

    /// Checks out `count` consecutive temporaries and returns the first.
    ///
    /// Call instructions address their arguments as a range, so the range
    /// is taken from the lowest run of free registers, extending the file
    /// where the run reaches its end.
    pub fn acquire_range(&mut self, count: u32) -> VReg {
        if count == 0 {
            return VReg::from(self.next);
        }
        let start = self
            .free
            .iter()
            .copied()
            .find(|&start| self.run_available(start, count))
            .unwrap_or(self.next);
        for index in start..start + count {
            if index >= self.next {
                self.next = index + 1;
            } else {
                self.free.remove(&index);
            }
            self.live.insert(index);
        }
        VReg::from(start)
    }

    /// Returns temporaries to the free pool.
    pub fn release(&mut self, regs: &[VReg]) -> Result<(), InternalError> {
        for &reg in regs {
            let index = reg.raw();
            if !self.live.remove(&index) {
                return Err(InternalError::ReleaseUnallocated { reg });
            }
            self.free.insert(index);
        }
        Ok(())
    }

    /// Number of temporaries currently checked out.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Whether a register is a checked-out temporary.
    pub fn is_live(&self, reg: VReg) -> bool {
        self.live.contains(&reg.raw())
    }

    /// Size of the register file: the high-water mark of all allocations.
    pub fn high_water(&self) -> u32 {
        self.next
    }

    fn take_lowest(&mut self) -> u32 {
        match self.free.pop_first() {
            Some(index) => index,
            None => {
                let index = self.next;
                self.next += 1;
                index
            }
        }
    }

    fn run_available(&self, start: u32, count: u32) -> bool {
        (start..start + count).all(|index| index >= self.next || self.free.contains(&index))
    }
}
