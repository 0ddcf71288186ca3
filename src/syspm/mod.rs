//! System power management: transition callbacks around the blocking power
//! primitives.
//!
//! [`SysPm`] owns the platform primitives ([`LowPowerHw`]) and a
//! [`CallbackRegistry`]. Every Sleep-class transition walks the registered
//! [`TransitionObserver`]s through the fixed phase order:
//!
//! ```text
//! CheckReady ──(refused)──> CheckFail, abort
//!     │
//! BeforeTransition ─> [hardware sleep] ─> AfterWfiTransition ─> AfterTransition
//! ```
//!
//! A DeepSleep-RAM entry that really powers the core down never comes back to
//! the caller; the warm-boot entry drives `AfterTransition` instead
//! (see [`crate::warm_boot`]).
//!
//! ```no_run
//! # fn enter_deep_sleep<H: power_modes::syspm::LowPowerHw>(hw: H, observer: &dyn power_modes::syspm::TransitionObserver) -> Result<(), power_modes::syspm::Error> {
//! use power_modes::syspm::{SysPm, TransitionType};
//! use power_modes::mode::DeepSleepMode;
//!
//! let mut pm = SysPm::new(hw);
//! pm.register_callback(observer, TransitionType::DeepSleep, 0)?;
//! pm.set_deep_sleep_mode(DeepSleepMode::DeepSleep);
//! pm.deep_sleep()?;
//! # Ok(()) }
//! ```

pub mod callback;

use heapless::Vec;

use crate::context::ResumeDescriptor;
use crate::mode::{DeepSleepMode, PowerSystem, ResetReason, WakePinPolarity};

//=============================================================================
// Types
//=============================================================================

/// Maximum number of observers per transition type.
pub const MAX_CALLBACKS: usize = 4;

/// Kind of power transition an observer is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransitionType {
    Sleep,
    DeepSleep,
    DeepSleepRam,
    Hibernate,
}

impl TransitionType {
    pub const COUNT: usize = 4;

    const fn index(self) -> usize {
        self as usize
    }

    pub const fn from_deep_sleep_mode(mode: DeepSleepMode) -> Self {
        match mode {
            DeepSleepMode::DeepSleep => TransitionType::DeepSleep,
            DeepSleepMode::DeepSleepRam => TransitionType::DeepSleepRam,
        }
    }
}

/// Checkpoint of the transition protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CallbackPhase {
    CheckReady,
    CheckFail,
    BeforeTransition,
    AfterWfiTransition,
    AfterTransition,
}

/// How a blocking power primitive came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wakeup {
    /// A wake source fired and execution continues after the WFI.
    Resumed,
    /// The core lost power. Real hardware never returns this: execution
    /// continues at the warm-boot entry (DS-RAM) or the reset vector
    /// (Hibernate). Simulated platforms report it instead of halting.
    PoweredDown,
}

/// Power management error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// A platform primitive reported failure.
    Hardware,
    /// An observer refused the transition in `CheckReady`.
    NotReady,
    /// No room left for another observer of this transition type.
    RegistryFull,
    /// A different warm-boot entry is already installed.
    ResumeEntryInstalled,
    /// Null stack top or entry function.
    InvalidResumeEntry,
    /// An interrupt snapshot is pending and was never restored.
    SnapshotPending,
}

//=============================================================================
// Observers
//=============================================================================

/// Hook invoked by [`SysPm`] at each phase of a transition it is registered for.
///
/// Every method defaults to doing nothing and reporting success. Observers run
/// in line with the transition; they must not block.
pub trait TransitionObserver {
    /// Return `Err` to refuse the transition.
    fn check_ready(&self, ty: TransitionType) -> Result<(), Error> {
        let _ = ty;
        Ok(())
    }

    /// A later observer refused the transition after this one accepted it.
    fn check_fail(&self, ty: TransitionType) {
        let _ = ty;
    }

    fn before_transition(&self, ty: TransitionType) {
        let _ = ty;
    }

    fn after_wfi_transition(&self, ty: TransitionType) {
        let _ = ty;
    }

    fn after_transition(&self, ty: TransitionType) {
        let _ = ty;
    }
}

struct Registration<'a> {
    observer: &'a dyn TransitionObserver,
    order: u8,
}

/// Observers per transition type, sorted by ascending `order`.
pub struct CallbackRegistry<'a> {
    lists: [Vec<Registration<'a>, MAX_CALLBACKS>; TransitionType::COUNT],
}

impl<'a> CallbackRegistry<'a> {
    pub const fn new() -> Self {
        Self {
            lists: [Vec::new(), Vec::new(), Vec::new(), Vec::new()],
        }
    }

    /// Register `observer` for `ty`.
    ///
    /// Observers with the same `order` run in registration order. Registering
    /// an observer that is already present for `ty` succeeds and leaves the
    /// list unchanged.
    pub fn register(
        &mut self,
        observer: &'a dyn TransitionObserver,
        ty: TransitionType,
        order: u8,
    ) -> Result<(), Error> {
        let list = &mut self.lists[ty.index()];

        if list.iter().any(|r| core::ptr::addr_eq(r.observer, observer)) {
            debug!("syspm: observer already registered for {:?}", ty);
            return Ok(());
        }

        let pos = list
            .iter()
            .position(|r| r.order > order)
            .unwrap_or(list.len());
        list.insert(pos, Registration { observer, order })
            .map_err(|_| Error::RegistryFull)
    }

    /// Remove `observer` from `ty`. Returns whether it was registered.
    pub fn unregister(&mut self, observer: &dyn TransitionObserver, ty: TransitionType) -> bool {
        let list = &mut self.lists[ty.index()];
        match list
            .iter()
            .position(|r| core::ptr::addr_eq(r.observer, observer))
        {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn len(&self, ty: TransitionType) -> usize {
        self.lists[ty.index()].len()
    }

    pub fn is_empty(&self, ty: TransitionType) -> bool {
        self.lists[ty.index()].is_empty()
    }

    /// Run one phase for every observer of `ty`.
    ///
    /// `CheckReady` and `BeforeTransition` run in ascending order, the other
    /// phases in reverse. A refused `CheckReady` sends `CheckFail` to the
    /// observers that had already accepted and returns [`Error::NotReady`].
    pub fn execute(&self, ty: TransitionType, phase: CallbackPhase) -> Result<(), Error> {
        let list = &self.lists[ty.index()];
        trace!("syspm: {:?} {:?} ({} observers)", ty, phase, list.len());

        match phase {
            CallbackPhase::CheckReady => {
                for (i, reg) in list.iter().enumerate() {
                    if let Err(e) = reg.observer.check_ready(ty) {
                        warn!("syspm: {:?} refused by observer {}: {:?}", ty, i, e);
                        for accepted in list[..i].iter().rev() {
                            accepted.observer.check_fail(ty);
                        }
                        return Err(Error::NotReady);
                    }
                }
            }
            CallbackPhase::CheckFail => {
                for reg in list.iter().rev() {
                    reg.observer.check_fail(ty);
                }
            }
            CallbackPhase::BeforeTransition => {
                for reg in list.iter() {
                    reg.observer.before_transition(ty);
                }
            }
            CallbackPhase::AfterWfiTransition => {
                for reg in list.iter().rev() {
                    reg.observer.after_wfi_transition(ty);
                }
            }
            CallbackPhase::AfterTransition => {
                for reg in list.iter().rev() {
                    reg.observer.after_transition(ty);
                }
            }
        }

        Ok(())
    }
}

impl<'a> Default for CallbackRegistry<'a> {
    fn default() -> Self {
        Self::new()
    }
}

//=============================================================================
// Platform primitives
//=============================================================================

/// Blocking power primitives and system queries of the platform.
///
/// Implementations only touch the hardware; callback sequencing is done by
/// [`SysPm`].
pub trait LowPowerHw {
    /// CPU sleep until any enabled interrupt fires.
    fn sleep(&mut self) -> Result<Wakeup, Error>;

    /// DeepSleep in the given sub-mode.
    ///
    /// For [`DeepSleepMode::DeepSleepRam`] a successful entry does not return
    /// on hardware; it only returns if the entry was aborted.
    fn deep_sleep(&mut self, mode: DeepSleepMode) -> Result<Wakeup, Error>;

    /// Hibernate, waking on `wake`. Only returns on failure.
    fn hibernate(&mut self, wake: WakePinPolarity) -> Result<Wakeup, Error>;

    fn system_state(&self) -> PowerSystem;

    fn set_system_state(&mut self, state: PowerSystem) -> Result<(), Error>;

    fn reset_reason(&self) -> ResetReason;

    /// Hand the warm-boot entry to the ROM.
    ///
    /// `debug_enabled` keeps the debug port accessible after the wake.
    fn set_warm_boot_entry(&mut self, descriptor: &ResumeDescriptor, debug_enabled: bool);

    /// Whether IO cells are still frozen after a Hibernate wake.
    fn io_frozen(&self) -> bool;

    fn io_unfreeze(&mut self);
}

//=============================================================================
// Power manager
//=============================================================================

/// Platform power manager: primitives plus transition callbacks.
///
/// Keep it in retained RAM; the warm-boot entry runs the DS-RAM
/// `AfterTransition` phase against the same registry.
pub struct SysPm<'a, H: LowPowerHw> {
    hw: H,
    callbacks: CallbackRegistry<'a>,
    deep_sleep_mode: DeepSleepMode,
}

impl<'a, H: LowPowerHw> SysPm<'a, H> {
    pub const fn new(hw: H) -> Self {
        Self {
            hw,
            callbacks: CallbackRegistry::new(),
            deep_sleep_mode: DeepSleepMode::DeepSleep,
        }
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn callbacks(&self) -> &CallbackRegistry<'a> {
        &self.callbacks
    }

    /// Register `observer` for every future transition of type `ty`.
    pub fn register_callback(
        &mut self,
        observer: &'a dyn TransitionObserver,
        ty: TransitionType,
        order: u8,
    ) -> Result<(), Error> {
        self.callbacks.register(observer, ty, order)?;
        debug!("syspm: observer registered for {:?} (order {})", ty, order);
        Ok(())
    }

    pub fn unregister_callback(&mut self, observer: &dyn TransitionObserver, ty: TransitionType) -> bool {
        self.callbacks.unregister(observer, ty)
    }

    /// Run a single phase outside of a transition, e.g. `AfterTransition`
    /// from the warm-boot entry.
    pub fn execute_callbacks(&self, ty: TransitionType, phase: CallbackPhase) -> Result<(), Error> {
        self.callbacks.execute(ty, phase)
    }

    /// Select the sub-mode used by the next [`deep_sleep`](Self::deep_sleep).
    pub fn set_deep_sleep_mode(&mut self, mode: DeepSleepMode) {
        self.deep_sleep_mode = mode;
    }

    pub fn deep_sleep_mode(&self) -> DeepSleepMode {
        self.deep_sleep_mode
    }

    pub fn sleep(&mut self) -> Result<Wakeup, Error> {
        self.transition(TransitionType::Sleep, |hw| hw.sleep())
    }

    /// DeepSleep in the sub-mode chosen with [`set_deep_sleep_mode`](Self::set_deep_sleep_mode).
    pub fn deep_sleep(&mut self) -> Result<Wakeup, Error> {
        let mode = self.deep_sleep_mode;
        self.transition(TransitionType::from_deep_sleep_mode(mode), |hw| {
            hw.deep_sleep(mode)
        })
    }

    pub fn hibernate(&mut self, wake: WakePinPolarity) -> Result<Wakeup, Error> {
        self.transition(TransitionType::Hibernate, |hw| hw.hibernate(wake))
    }

    pub fn system_state(&self) -> PowerSystem {
        self.hw.system_state()
    }

    pub fn set_system_state(&mut self, state: PowerSystem) -> Result<(), Error> {
        self.hw.set_system_state(state)
    }

    pub fn reset_reason(&self) -> ResetReason {
        self.hw.reset_reason()
    }

    pub fn set_warm_boot_entry(&mut self, descriptor: &ResumeDescriptor, debug_enabled: bool) {
        self.hw.set_warm_boot_entry(descriptor, debug_enabled);
    }

    pub fn io_frozen(&self) -> bool {
        self.hw.io_frozen()
    }

    pub fn io_unfreeze(&mut self) {
        self.hw.io_unfreeze();
    }

    fn transition<F>(&mut self, ty: TransitionType, enter: F) -> Result<Wakeup, Error>
    where
        F: FnOnce(&mut H) -> Result<Wakeup, Error>,
    {
        self.callbacks.execute(ty, CallbackPhase::CheckReady)?;
        self.callbacks.execute(ty, CallbackPhase::BeforeTransition)?;

        let result = enter(&mut self.hw);

        if let Ok(Wakeup::PoweredDown) = result {
            // The after phases belong to whoever regains control.
            return result;
        }
        if let Err(e) = result {
            warn!("syspm: {:?} entry failed: {:?}", ty, e);
        }

        self.callbacks.execute(ty, CallbackPhase::AfterWfiTransition)?;
        self.callbacks.execute(ty, CallbackPhase::AfterTransition)?;

        result
    }
}
