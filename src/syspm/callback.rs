//! Built-in transition observers.
//!
//! - [`FlowControlSafing`]: parks the UART RTS/CTS lines as analog high-Z
//!   inputs while the console peripheral is unpowered. The lines are wired to
//!   the on-board debug probe and leak current when left as outputs.
//! - [`InterruptSnapshot`]: saves the NVIC configuration right before a
//!   DeepSleep-RAM entry so the warm-boot entry can rebuild it.

use core::cell::RefCell;

use critical_section::Mutex;

use super::{TransitionObserver, TransitionType};
use crate::nvic::{InterruptController, InterruptStateStore};

//=============================================================================
// Flow-control GPIO
//=============================================================================

/// UART flow-control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowControlPin {
    Rts,
    Cts,
}

impl FlowControlPin {
    pub const ALL: [FlowControlPin; 2] = [FlowControlPin::Rts, FlowControlPin::Cts];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinDirection {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveMode {
    /// Analog, digital input buffer disabled (high impedance).
    Analog,
    /// Digital, no pull resistor.
    PullNone,
    /// Digital, strong drive.
    Strong,
}

/// The one GPIO capability the observers need.
pub trait FlowControlPins {
    fn configure(&mut self, pin: FlowControlPin, direction: PinDirection, drive: DriveMode);
}

/// Parks RTS/CTS before a transition and restores them afterwards.
///
/// Register it for [`TransitionType::DeepSleep`] and
/// [`TransitionType::DeepSleepRam`].
pub struct FlowControlSafing<G> {
    pins: Mutex<RefCell<G>>,
}

impl<G: FlowControlPins> FlowControlSafing<G> {
    pub const fn new(pins: G) -> Self {
        Self {
            pins: Mutex::new(RefCell::new(pins)),
        }
    }

    /// Run `f` with exclusive access to the pin handle.
    pub fn with_pins<R>(&self, f: impl FnOnce(&mut G) -> R) -> R {
        critical_section::with(|cs| f(&mut self.pins.borrow_ref_mut(cs)))
    }

    fn configure_all(&self, direction: PinDirection, drive: DriveMode) {
        self.with_pins(|pins| {
            for pin in FlowControlPin::ALL {
                pins.configure(pin, direction, drive);
            }
        });
    }
}

impl<G: FlowControlPins> TransitionObserver for FlowControlSafing<G> {
    fn before_transition(&self, ty: TransitionType) {
        trace!("flow control: park lines before {:?}", ty);
        self.configure_all(PinDirection::Input, DriveMode::Analog);
    }

    fn after_transition(&self, ty: TransitionType) {
        trace!("flow control: restore lines after {:?}", ty);
        self.configure_all(PinDirection::Output, DriveMode::PullNone);
    }
}

//=============================================================================
// NVIC snapshot
//=============================================================================

/// Snapshots the interrupt controller into the retained store before a
/// DeepSleep-RAM entry.
///
/// Register it for [`TransitionType::DeepSleepRam`] only. If the entry is
/// aborted (the primitive returns instead of powering down), the pending
/// snapshot is dropped in `AfterTransition` since the registers were never lost.
pub struct InterruptSnapshot<'a, I> {
    store: &'a InterruptStateStore,
    nvic: Mutex<RefCell<I>>,
}

impl<'a, I: InterruptController> InterruptSnapshot<'a, I> {
    pub const fn new(store: &'a InterruptStateStore, nvic: I) -> Self {
        Self {
            store,
            nvic: Mutex::new(RefCell::new(nvic)),
        }
    }
}

impl<'a, I: InterruptController> TransitionObserver for InterruptSnapshot<'a, I> {
    fn before_transition(&self, ty: TransitionType) {
        if ty != TransitionType::DeepSleepRam {
            return;
        }

        let snapshot = critical_section::with(|cs| self.nvic.borrow_ref_mut(cs).save());
        match self.store.save(snapshot) {
            Ok(()) => debug!(
                "nvic: saved {} enabled lines before DS-RAM",
                snapshot.enabled_count()
            ),
            Err(e) => error!("nvic: snapshot not saved: {:?}", e),
        }
    }

    fn after_transition(&self, ty: TransitionType) {
        if ty == TransitionType::DeepSleepRam && self.store.discard() {
            debug!("nvic: DS-RAM entry aborted, snapshot dropped");
        }
    }
}
