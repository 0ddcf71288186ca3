//! Interrupt controller state across a DeepSleep-RAM transition.
//!
//! The NVIC registers are not retained in DS-RAM. The enable and priority
//! registers are copied into an [`NvicSnapshot`] right before the core powers
//! down and written back by the warm-boot entry before the application resumes.
//!
//! ```no_run
//! use power_modes::nvic::{InterruptController, InterruptStateStore};
//!
//! fn before_dsram(nvic: &mut impl InterruptController, store: &InterruptStateStore) {
//!     store.save(nvic.save()).unwrap();
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::syspm::Error;

/// Number of external interrupt lines covered by a snapshot.
pub const MAX_IRQS: usize = 128;

/// Number of 32-bit enable words covering [`MAX_IRQS`].
pub const ENABLE_WORDS: usize = MAX_IRQS / 32;

/// Copy of the NVIC enable and priority registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvicSnapshot {
    /// `ISER` words, one bit per interrupt line.
    pub enabled: [u32; ENABLE_WORDS],
    /// `IPR` bytes, one per interrupt line.
    pub priority: [u8; MAX_IRQS],
}

impl NvicSnapshot {
    pub const fn empty() -> Self {
        Self {
            enabled: [0; ENABLE_WORDS],
            priority: [0; MAX_IRQS],
        }
    }

    pub fn is_enabled(&self, irq: usize) -> bool {
        irq < MAX_IRQS && self.enabled[irq / 32] & (1 << (irq % 32)) != 0
    }

    /// Number of interrupt lines enabled in this snapshot.
    pub fn enabled_count(&self) -> u32 {
        self.enabled.iter().map(|w| w.count_ones()).sum()
    }
}

impl Default for NvicSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Access to the interrupt controller registers that DS-RAM does not retain.
pub trait InterruptController {
    /// Read the current enable and priority configuration.
    fn save(&mut self) -> NvicSnapshot;

    /// Write a previously saved configuration back.
    ///
    /// Priorities are written before the enable bits so that no line fires at
    /// its reset priority.
    fn restore(&mut self, snapshot: &NvicSnapshot);
}

/// Single-slot store for the snapshot taken before a DS-RAM entry.
///
/// Lives in retained RAM (it is part of [`PowerContext`](crate::context::PowerContext)).
/// At most one snapshot is pending: [`save`](Self::save) refuses to overwrite
/// one that was never consumed.
pub struct InterruptStateStore {
    slot: Mutex<RefCell<Option<NvicSnapshot>>>,
}

impl InterruptStateStore {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(None)),
        }
    }

    /// Store a snapshot taken right before the transition.
    pub fn save(&self, snapshot: NvicSnapshot) -> Result<(), Error> {
        critical_section::with(|cs| {
            let mut slot = self.slot.borrow_ref_mut(cs);
            if slot.is_some() {
                return Err(Error::SnapshotPending);
            }
            *slot = Some(snapshot);
            Ok(())
        })
    }

    /// Consume the pending snapshot, leaving the slot empty.
    pub fn take(&self) -> Option<NvicSnapshot> {
        critical_section::with(|cs| self.slot.borrow_ref_mut(cs).take())
    }

    /// Drop a pending snapshot without restoring it. Returns whether one was pending.
    pub fn discard(&self) -> bool {
        self.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        critical_section::with(|cs| self.slot.borrow_ref(cs).is_some())
    }
}

impl Default for InterruptStateStore {
    fn default() -> Self {
        Self::new()
    }
}

cfg_if::cfg_if! {
    if #[cfg(all(feature = "rt", target_arch = "arm", target_os = "none"))] {
        use cortex_m::peripheral::NVIC;

        /// NVIC of the running Cortex-M core.
        ///
        /// Zero-sized; every instance accesses the same registers.
        pub struct CortexMNvic {
            _private: (),
        }

        impl CortexMNvic {
            /// # Safety
            ///
            /// The caller must be the only code touching `ISER`/`IPR` while the
            /// handle is used, which holds around a DS-RAM transition because
            /// interrupts are masked by the power manager.
            pub unsafe fn steal() -> Self {
                Self { _private: () }
            }
        }

        impl InterruptController for CortexMNvic {
            fn save(&mut self) -> NvicSnapshot {
                let nvic = unsafe { &*NVIC::PTR };
                let mut snapshot = NvicSnapshot::empty();
                for (i, word) in snapshot.enabled.iter_mut().enumerate() {
                    *word = nvic.iser[i].read();
                }
                for (i, prio) in snapshot.priority.iter_mut().enumerate() {
                    *prio = nvic.ipr[i].read();
                }
                snapshot
            }

            fn restore(&mut self, snapshot: &NvicSnapshot) {
                let nvic = unsafe { &*NVIC::PTR };
                unsafe {
                    for (i, prio) in snapshot.priority.iter().enumerate() {
                        nvic.ipr[i].write(*prio);
                    }
                    for (i, word) in snapshot.enabled.iter().enumerate() {
                        nvic.iser[i].write(*word);
                    }
                }
                cortex_m::asm::dsb();
                cortex_m::asm::isb();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(irqs: &[usize]) -> NvicSnapshot {
        let mut s = NvicSnapshot::empty();
        for &irq in irqs {
            s.enabled[irq / 32] |= 1 << (irq % 32);
            s.priority[irq] = 2 << 5;
        }
        s
    }

    #[test]
    fn snapshot_bit_layout() {
        let s = snapshot_with(&[0, 31, 32, 127]);
        assert!(s.is_enabled(0));
        assert!(s.is_enabled(31));
        assert!(s.is_enabled(32));
        assert!(s.is_enabled(127));
        assert!(!s.is_enabled(1));
        assert!(!s.is_enabled(MAX_IRQS));
        assert_eq!(s.enabled_count(), 4);
    }

    #[test]
    fn store_holds_at_most_one_snapshot() {
        let store = InterruptStateStore::new();
        assert!(!store.is_pending());

        store.save(snapshot_with(&[3])).unwrap();
        assert!(store.is_pending());
        assert_eq!(store.save(snapshot_with(&[4])), Err(Error::SnapshotPending));

        // The first snapshot survives the refused overwrite.
        let taken = store.take().unwrap();
        assert!(taken.is_enabled(3));
        assert!(!taken.is_enabled(4));
        assert!(store.take().is_none());

        store.save(snapshot_with(&[4])).unwrap();
        assert!(store.discard());
        assert!(!store.discard());
    }
}
