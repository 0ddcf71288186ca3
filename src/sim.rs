//! Host simulation of the platform collaborators.
//!
//! All handles share one [`Sim`] that keeps the "hardware" state and an ordered
//! event log. DS-RAM and Hibernate entries report [`Wakeup::PoweredDown`] and
//! wipe what real silicon would lose.

use std::cell::{Cell, RefCell};
use std::vec::Vec;

use embedded_hal_1::delay::DelayNs;

use crate::app::Board;
use crate::context::ResumeDescriptor;
use crate::mode::{DeepSleepMode, PowerSystem, ResetReason, WakePinPolarity};
use crate::nvic::{InterruptController, NvicSnapshot};
use crate::syspm::callback::{DriveMode, FlowControlPin, FlowControlPins, PinDirection};
use crate::syspm::{Error, LowPowerHw, Wakeup};
use crate::warm_boot::WarmBootHw;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Sleep,
    DeepSleep(DeepSleepMode),
    Hibernate(WakePinPolarity),
    /// Whether the flow-control lines were parked when the core stopped.
    PinsAtWfi(bool),
    SystemState(PowerSystem),
    WarmBootEntry { stack_top: usize, entry_fn: usize, debug: bool },
    IoUnfreeze,
    Pin(FlowControlPin, PinDirection, DriveMode),
    NvicSave,
    NvicRestore,
    BoardInit,
    ReleasePeripherals,
    UserLedInit,
    ButtonsInit(u8),
    InterruptsEnabled,
    ConsoleInit,
    UserLed(bool),
    SystemInit,
    MemoryEnable,
    MemoryInit,
    PinConfigRestore,
    DelayMs(u32),
}

pub struct Sim {
    events: RefCell<Vec<Event>>,
    system: Cell<PowerSystem>,
    reset_reason: Cell<ResetReason>,
    io_frozen: Cell<bool>,
    fail_sleep: Cell<bool>,
    abort_dsram: Cell<bool>,
    fail_step: Cell<Option<&'static str>>,
    pins: RefCell<[(PinDirection, DriveMode); 2]>,
    nvic: RefCell<NvicSnapshot>,
    led: Cell<bool>,
}

impl Sim {
    pub fn new() -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            system: Cell::new(PowerSystem::LowPower),
            reset_reason: Cell::new(ResetReason::PowerOn),
            io_frozen: Cell::new(false),
            fail_sleep: Cell::new(false),
            abort_dsram: Cell::new(false),
            fail_step: Cell::new(None),
            pins: RefCell::new([(PinDirection::Output, DriveMode::PullNone); 2]),
            nvic: RefCell::new(NvicSnapshot::empty()),
            led: Cell::new(false),
        }
    }

    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn count(&self, f: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| f(e)).count()
    }

    pub fn fail_next_sleep(&self) {
        self.fail_sleep.set(true);
    }

    /// Next DS-RAM entry returns as if a wake source was already pending.
    pub fn abort_next_dsram(&self) {
        self.abort_dsram.set(true);
    }

    /// Make the board step with this name fail.
    pub fn fail_board_step(&self, step: &'static str) {
        self.fail_step.set(Some(step));
    }

    pub fn enable_irqs(&self, irqs: &[usize]) {
        let mut nvic = self.nvic.borrow_mut();
        for &irq in irqs {
            nvic.enabled[irq / 32] |= 1 << (irq % 32);
            nvic.priority[irq] = 0x40;
        }
    }

    pub fn live_nvic(&self) -> NvicSnapshot {
        *self.nvic.borrow()
    }

    pub fn pins_parked(&self) -> bool {
        self.pins
            .borrow()
            .iter()
            .all(|&p| p == (PinDirection::Input, DriveMode::Analog))
    }

    pub fn parked_at_wfi(&self) -> Vec<bool> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::PinsAtWfi(parked) => Some(*parked),
                _ => None,
            })
            .collect()
    }

    pub fn pin_configs(&self) -> Vec<(FlowControlPin, PinDirection, DriveMode)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Pin(pin, dir, drive) => Some((*pin, *dir, *drive)),
                _ => None,
            })
            .collect()
    }

    pub fn reset_reason(&self) -> ResetReason {
        self.reset_reason.get()
    }

    pub fn led(&self) -> bool {
        self.led.get()
    }

    fn wfi(&self) {
        self.push(Event::PinsAtWfi(self.pins_parked()));
    }

    fn lose_power(&self) {
        *self.nvic.borrow_mut() = NvicSnapshot::empty();
        self.led.set(false);
    }

    fn step(&self, name: &'static str) -> Result<(), Error> {
        if self.fail_step.get() == Some(name) {
            Err(Error::Hardware)
        } else {
            Ok(())
        }
    }
}

pub struct SimHw<'s> {
    sim: &'s Sim,
}

impl<'s> SimHw<'s> {
    pub fn new(sim: &'s Sim) -> Self {
        Self { sim }
    }
}

impl<'s> LowPowerHw for SimHw<'s> {
    fn sleep(&mut self) -> Result<Wakeup, Error> {
        self.sim.push(Event::Sleep);
        if self.sim.fail_sleep.replace(false) {
            return Err(Error::Hardware);
        }
        self.sim.wfi();
        Ok(Wakeup::Resumed)
    }

    fn deep_sleep(&mut self, mode: DeepSleepMode) -> Result<Wakeup, Error> {
        self.sim.push(Event::DeepSleep(mode));
        self.sim.wfi();
        match mode {
            DeepSleepMode::DeepSleep => Ok(Wakeup::Resumed),
            DeepSleepMode::DeepSleepRam if self.sim.abort_dsram.replace(false) => Ok(Wakeup::Resumed),
            DeepSleepMode::DeepSleepRam => {
                self.sim.lose_power();
                Ok(Wakeup::PoweredDown)
            }
        }
    }

    fn hibernate(&mut self, wake: WakePinPolarity) -> Result<Wakeup, Error> {
        self.sim.push(Event::Hibernate(wake));
        self.sim.lose_power();
        self.sim.reset_reason.set(ResetReason::HibernateWakeup);
        self.sim.io_frozen.set(true);
        Ok(Wakeup::PoweredDown)
    }

    fn system_state(&self) -> PowerSystem {
        self.sim.system.get()
    }

    fn set_system_state(&mut self, state: PowerSystem) -> Result<(), Error> {
        self.sim.push(Event::SystemState(state));
        self.sim.system.set(state);
        Ok(())
    }

    fn reset_reason(&self) -> ResetReason {
        self.sim.reset_reason.get()
    }

    fn set_warm_boot_entry(&mut self, descriptor: &ResumeDescriptor, debug_enabled: bool) {
        self.sim.push(Event::WarmBootEntry {
            stack_top: descriptor.stack_top(),
            entry_fn: descriptor.entry_fn(),
            debug: debug_enabled,
        });
    }

    fn io_frozen(&self) -> bool {
        self.sim.io_frozen.get()
    }

    fn io_unfreeze(&mut self) {
        self.sim.push(Event::IoUnfreeze);
        self.sim.io_frozen.set(false);
    }
}

pub struct SimPins<'s> {
    sim: &'s Sim,
}

impl<'s> SimPins<'s> {
    pub fn new(sim: &'s Sim) -> Self {
        Self { sim }
    }
}

impl<'s> FlowControlPins for SimPins<'s> {
    fn configure(&mut self, pin: FlowControlPin, direction: PinDirection, drive: DriveMode) {
        self.sim.push(Event::Pin(pin, direction, drive));
        self.sim.pins.borrow_mut()[pin as usize] = (direction, drive);
    }
}

pub struct SimNvic<'s> {
    sim: &'s Sim,
}

impl<'s> SimNvic<'s> {
    pub fn new(sim: &'s Sim) -> Self {
        Self { sim }
    }
}

impl<'s> InterruptController for SimNvic<'s> {
    fn save(&mut self) -> NvicSnapshot {
        self.sim.push(Event::NvicSave);
        *self.sim.nvic.borrow()
    }

    fn restore(&mut self, snapshot: &NvicSnapshot) {
        self.sim.push(Event::NvicRestore);
        *self.sim.nvic.borrow_mut() = *snapshot;
    }
}

/// Board and warm-boot hardware.
pub struct SimBoard<'s> {
    sim: &'s Sim,
}

impl<'s> SimBoard<'s> {
    pub fn new(sim: &'s Sim) -> Self {
        Self { sim }
    }
}

impl<'s> Board for SimBoard<'s> {
    fn init(&mut self) -> Result<(), Error> {
        self.sim.push(Event::BoardInit);
        self.sim.step("board")
    }

    fn release_peripherals(&mut self) {
        self.sim.push(Event::ReleasePeripherals);
    }

    fn init_user_led(&mut self) -> Result<(), Error> {
        self.sim.push(Event::UserLedInit);
        self.sim.step("led")
    }

    fn init_buttons(&mut self, irq_priority: u8) -> Result<(), Error> {
        self.sim.push(Event::ButtonsInit(irq_priority));
        self.sim.step("buttons")
    }

    fn enable_interrupts(&mut self) {
        self.sim.push(Event::InterruptsEnabled);
    }

    fn init_console(&mut self) -> Result<(), Error> {
        self.sim.push(Event::ConsoleInit);
        self.sim.step("console")
    }

    fn set_user_led(&mut self, on: bool) {
        self.sim.push(Event::UserLed(on));
        self.sim.led.set(on);
    }
}

impl<'s> WarmBootHw for SimBoard<'s> {
    fn system_init(&mut self) {
        self.sim.push(Event::SystemInit);
    }

    fn enable_memory_interface(&mut self) {
        self.sim.push(Event::MemoryEnable);
    }

    fn init_memory_interface(&mut self) {
        self.sim.push(Event::MemoryInit);
    }

    fn restore_pin_config(&mut self) {
        self.sim.push(Event::PinConfigRestore);
    }
}

pub struct SimDelay<'s> {
    sim: &'s Sim,
}

impl<'s> SimDelay<'s> {
    pub fn new(sim: &'s Sim) -> Self {
        Self { sim }
    }
}

impl<'s> DelayNs for SimDelay<'s> {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.sim.push(Event::DelayMs(ms));
    }
}
