//! Process-wide power state shared between the button interrupts, the control
//! loop and the warm-boot entry.
//!
//! Every field has exactly one writer context and one reader context:
//!
//! | Field | Written by | Read by |
//! |---|---|---|
//! | power mode | button interrupts (same priority, never nested) | control loop; boot path on warm start |
//! | system toggle requests | button 2 interrupt | control loop |
//! | warm-boot flag | warm-boot entry (set), boot path (clear) | boot path |
//! | resume descriptor | boot path (once) | hardware/ROM on DS-RAM wake |
//! | interrupt snapshot | DS-RAM `BeforeTransition` | warm-boot entry |
//!
//! Plain atomic loads and stores are enough for this discipline; no
//! read-modify-write has to be atomic with respect to another writer.
//!
//! The whole struct is meant to live in a `static` placed in the retained RAM
//! region.
//!
//! ```no_run
//! use power_modes::context::PowerContext;
//!
//! static POWER: PowerContext = PowerContext::new();
//!
//! // GPIO falling-edge handler of user button 1
//! fn on_button1() {
//!     POWER.on_mode_button();
//! }
//! ```

use portable_atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use crate::mode::PowerMode;
use crate::nvic::InterruptStateStore;
use crate::syspm::Error;

//=============================================================================
// Resume descriptor
//=============================================================================

/// Warm-boot entry point handed to the ROM: `{stack_top, entry_fn}`.
///
/// `repr(C)` because the ROM reads it directly on a DS-RAM wake. Written once
/// during the first boot pass; later passes may only re-install the same values.
#[repr(C)]
pub struct ResumeDescriptor {
    stack_top: AtomicUsize,
    entry_fn: AtomicUsize,
}

impl ResumeDescriptor {
    pub const fn new() -> Self {
        Self {
            stack_top: AtomicUsize::new(0),
            entry_fn: AtomicUsize::new(0),
        }
    }

    /// Record the stack top and entry function used after a DS-RAM wake.
    ///
    /// Installing the values already present is a no-op, so the boot path can
    /// run this on every pass, warm or cold.
    pub fn install(&self, stack_top: usize, entry_fn: usize) -> Result<(), Error> {
        if stack_top == 0 || entry_fn == 0 {
            return Err(Error::InvalidResumeEntry);
        }

        if self.is_installed() {
            if self.stack_top() == stack_top && self.entry_fn() == entry_fn {
                return Ok(());
            }
            return Err(Error::ResumeEntryInstalled);
        }

        self.stack_top.store(stack_top, Ordering::SeqCst);
        self.entry_fn.store(entry_fn, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.entry_fn.load(Ordering::SeqCst) != 0
    }

    pub fn stack_top(&self) -> usize {
        self.stack_top.load(Ordering::SeqCst)
    }

    pub fn entry_fn(&self) -> usize {
        self.entry_fn.load(Ordering::SeqCst)
    }
}

impl Default for ResumeDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

//=============================================================================
// Power context
//=============================================================================

/// Shared power state, see the module docs for the access rules.
pub struct PowerContext {
    mode: AtomicU8,
    system_toggles: AtomicU8,
    warm_boot: AtomicBool,
    resume: ResumeDescriptor,
    interrupts: InterruptStateStore,
}

impl PowerContext {
    pub const fn new() -> Self {
        Self {
            mode: AtomicU8::new(PowerMode::Normal as u8),
            system_toggles: AtomicU8::new(0),
            warm_boot: AtomicBool::new(false),
            resume: ResumeDescriptor::new(),
            interrupts: InterruptStateStore::new(),
        }
    }

    // ---- interrupt context --------------------------------------------------

    /// Button 1: advance to the next power mode.
    pub fn on_mode_button(&self) {
        let next = self.mode().next();
        self.mode.store(next as u8, Ordering::Relaxed);
    }

    /// Button 2: request one power system switch and fall back to Normal.
    pub fn on_system_button(&self) {
        let pending = self.system_toggles.load(Ordering::Relaxed);
        self.system_toggles
            .store(pending.saturating_add(1), Ordering::Relaxed);
        self.mode.store(PowerMode::Normal as u8, Ordering::Relaxed);
    }

    // ---- control loop -------------------------------------------------------

    /// Current requested mode, read once per loop iteration.
    pub fn mode(&self) -> PowerMode {
        PowerMode::from_bits(self.mode.load(Ordering::Relaxed))
    }

    /// Consume pending power system switch requests.
    pub fn take_system_toggles(&self) -> u8 {
        self.system_toggles.swap(0, Ordering::Relaxed)
    }

    // ---- boot path ----------------------------------------------------------

    /// Put the mode back to Normal while re-initializing after a DS-RAM wake.
    ///
    /// Only called before the button interrupts are re-enabled.
    pub(crate) fn reset_mode(&self) {
        self.mode.store(PowerMode::Normal as u8, Ordering::Relaxed);
    }

    pub fn is_warm_boot(&self) -> bool {
        self.warm_boot.load(Ordering::SeqCst)
    }

    pub(crate) fn set_warm_boot(&self) {
        self.warm_boot.store(true, Ordering::SeqCst);
    }

    pub(crate) fn clear_warm_boot(&self) {
        self.warm_boot.store(false, Ordering::SeqCst);
    }

    pub fn resume_descriptor(&self) -> &ResumeDescriptor {
        &self.resume
    }

    pub fn interrupt_store(&self) -> &InterruptStateStore {
        &self.interrupts
    }
}

impl Default for PowerContext {
    fn default() -> Self {
        Self::new()
    }
}
