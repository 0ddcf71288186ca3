//! Application layer: the boot paths and the power mode control loop.
//!
//! Boot is a two-path protocol with a shared continuation:
//!
//! - **Cold** (power-on or Hibernate wake): full board bring-up.
//! - **Warm** (DS-RAM wake, entered through [`warm_boot::resume`](crate::warm_boot::resume)):
//!   the peripheral claims left in retained RAM are released instead, the
//!   requested mode falls back to Normal.
//!
//! Both paths then re-initialize the user LED, buttons and console, install
//! the resume entry, register the transition observers and hand over to
//! [`Controller::run`].
//!
//! ```rust,ignore
//! #[cortex_m_rt::entry]
//! fn main() -> ! {
//!     app_main(unsafe { &mut *PM.as_mut_ptr() })
//! }
//!
//! // Reached from `main` on a cold boot and from `warm_boot::resume` after a
//! // DS-RAM wake; either way `pm` is the only reference to the manager.
//! fn app_main(pm: &mut SysPm<'static, Hw>) -> ! {
//!     let entry = ResumeEntry::from_entry(dsram_entry);
//!     app::start(&POWER, &mut board, pm, CALLBACKS, entry, &Config::default());
//!     let mut controller = Controller::new(&POWER, delay, Config::default());
//!     controller.run(pm);
//!     power_modes::rt::halt()
//! }
//! ```

use embedded_hal_1::delay::DelayNs;

use crate::config::Config;
use crate::context::PowerContext;
use crate::mode::{DeepSleepMode, PowerMode};
use crate::syspm::{Error, LowPowerHw, SysPm, TransitionObserver, TransitionType, Wakeup};

//=============================================================================
// Board collaborator
//=============================================================================

/// Board services used by the boot paths.
pub trait Board {
    /// Full board bring-up. Cold boot only.
    fn init(&mut self) -> Result<(), Error>;

    /// Release console, LED and button handles still claimed in retained RAM.
    /// Warm boot only.
    fn release_peripherals(&mut self);

    fn init_user_led(&mut self) -> Result<(), Error>;

    /// Configure both user buttons as inputs with falling-edge interrupts
    /// at `irq_priority`.
    fn init_buttons(&mut self, irq_priority: u8) -> Result<(), Error>;

    /// Globally unmask interrupts.
    fn enable_interrupts(&mut self);

    fn init_console(&mut self) -> Result<(), Error>;

    fn set_user_led(&mut self, on: bool);
}

//=============================================================================
// Boot
//=============================================================================

/// Which boot path the current pass took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootKind {
    /// Power-on (or any reset other than a Hibernate wake).
    Cold,
    /// Cold boot caused by the Hibernate wake pin.
    HibernateWake,
    /// DS-RAM wake through the warm-boot entry.
    Warm,
}

/// Stack top and entry function recorded in the resume descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeEntry {
    pub stack_top: usize,
    pub entry_fn: usize,
}

impl ResumeEntry {
    pub const fn new(stack_top: usize, entry_fn: usize) -> Self {
        Self { stack_top, entry_fn }
    }
}

/// Observers registered on every boot pass.
#[derive(Clone, Copy)]
pub struct Callbacks<'a> {
    /// Flow-control line safing, registered for DeepSleep and DS-RAM.
    pub flow_control: &'a dyn TransitionObserver,
    /// NVIC snapshot, registered for DS-RAM right after `flow_control`.
    pub interrupt_snapshot: &'a dyn TransitionObserver,
}

/// Halt on a boot-time failure.
///
/// There is no retry: the hardware is in an unknown, partially initialized
/// state. The panic handler of the application does the halting.
pub fn fatal<T>(result: Result<T, Error>, what: &'static str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            error!("{} failed: {:?}", what, e);
            panic!("{} failed: {:?}", what, e);
        }
    }
}

/// Application start, shared by cold and warm boot.
///
/// Every bring-up step is fatal on its own. On the warm path the warm-boot
/// flag is observed at the beginning and cleared at the end of this pass.
pub fn start<'a, B, H>(
    ctx: &PowerContext,
    board: &mut B,
    pm: &mut SysPm<'a, H>,
    callbacks: Callbacks<'a>,
    entry: ResumeEntry,
    config: &Config,
) -> BootKind
where
    B: Board,
    H: LowPowerHw,
{
    let boot = if ctx.is_warm_boot() {
        BootKind::Warm
    } else if pm.reset_reason().is_hibernate_wakeup() {
        BootKind::HibernateWake
    } else {
        BootKind::Cold
    };
    debug!("boot: {:?} path", boot);

    match boot {
        BootKind::Warm => {
            ctx.reset_mode();
            board.release_peripherals();
        }
        BootKind::Cold | BootKind::HibernateWake => fatal(board.init(), "board init"),
    }

    fatal(board.init_user_led(), "user LED init");
    fatal(board.init_buttons(config.button_irq_priority), "button init");
    board.enable_interrupts();
    fatal(board.init_console(), "console init");

    match boot {
        BootKind::Warm => {
            board.set_user_led(true);
            info!("Warmboot(Wake from DS-RAM) : Running Switching Power Modes Application");
            info!("Press User Button 1 to continue switching power modes");
        }
        BootKind::HibernateWake => {
            if pm.io_frozen() {
                pm.io_unfreeze();
            }
            info!("Coldboot(Wake from Hibernate) : Running Switching Power Modes Application");
        }
        BootKind::Cold => {
            info!("**********Switching Power Modes*************");
            info!("| Press User Button 1 to Change Power mode   |");
            info!("| Press User Button 2 to change power system |");
        }
    }

    fatal(
        ctx.resume_descriptor().install(entry.stack_top, entry.entry_fn),
        "resume entry install",
    );
    pm.set_warm_boot_entry(ctx.resume_descriptor(), config.debug_after_wake);

    let dsram_order = config.dsram_callback_order;
    fatal(
        pm.register_callback(callbacks.flow_control, TransitionType::DeepSleepRam, dsram_order),
        "DS-RAM callback registration",
    );
    fatal(
        pm.register_callback(
            callbacks.interrupt_snapshot,
            TransitionType::DeepSleepRam,
            dsram_order.saturating_add(1),
        ),
        "DS-RAM snapshot callback registration",
    );
    fatal(
        pm.register_callback(
            callbacks.flow_control,
            TransitionType::DeepSleep,
            config.deep_sleep_callback_order,
        ),
        "DeepSleep callback registration",
    );

    if boot == BootKind::Warm {
        ctx.clear_warm_boot();
    }

    boot
}

//=============================================================================
// Control loop
//=============================================================================

/// Outcome of one control loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Mode is Normal, nothing to do.
    Idle,
    /// Came back from Sleep or DeepSleep (or an aborted deeper entry).
    Woke(PowerMode),
    /// The transition failed; the loop carries on without retrying it specially.
    Failed(PowerMode, Error),
    /// The core powered down in this mode.
    PoweredDown(PowerMode),
}

/// Power mode state machine driven by the button interrupts.
pub struct Controller<'c, D> {
    ctx: &'c PowerContext,
    delay: D,
    config: Config,
}

impl<'c, D: DelayNs> Controller<'c, D> {
    pub fn new(ctx: &'c PowerContext, delay: D, config: Config) -> Self {
        Self { ctx, delay, config }
    }

    /// Run the control loop.
    ///
    /// Only returns when the platform reports a power-down, which real
    /// hardware never does: DS-RAM resumes through the warm-boot entry and
    /// Hibernate through reset.
    pub fn run<H: LowPowerHw>(&mut self, pm: &mut SysPm<'_, H>) -> PowerMode {
        loop {
            if let Step::PoweredDown(mode) = self.step(pm) {
                return mode;
            }
        }
    }

    /// One iteration: apply pending power system switches, then act on the mode.
    pub fn step<H: LowPowerHw>(&mut self, pm: &mut SysPm<'_, H>) -> Step {
        self.switch_power_system(pm);

        let mode = self.ctx.mode();
        let result = match mode {
            PowerMode::Normal => return Step::Idle,
            PowerMode::Sleep => {
                info!("Going to Sleep : Running Switching Power Modes Application");
                pm.sleep()
            }
            PowerMode::DeepSleep => {
                info!("Going to Deep Sleep : Running Switching Power Modes Application");
                pm.set_deep_sleep_mode(DeepSleepMode::DeepSleep);
                pm.deep_sleep()
            }
            PowerMode::DeepSleepRam => {
                debug_assert!(!self.ctx.is_warm_boot());
                info!("Going to DeepSleep-RAM : Running Switching Power Modes Application");
                pm.set_deep_sleep_mode(DeepSleepMode::DeepSleepRam);
                pm.deep_sleep()
            }
            PowerMode::Hibernate => {
                info!("Going to Hibernate, press User Button 1 to wake up");
                // Let pending console output drain.
                self.delay.delay_ms(self.config.hibernate_flush_delay_ms);
                pm.hibernate(self.config.hibernate_wake_pin)
            }
        };

        match result {
            Ok(Wakeup::Resumed) => {
                info!("Wake from {} : Running Switching Power Modes Application", mode.name());
                Step::Woke(mode)
            }
            Ok(Wakeup::PoweredDown) => Step::PoweredDown(mode),
            Err(e) => {
                warn!("{} transition failed: {:?}", mode.name(), e);
                Step::Failed(mode, e)
            }
        }
    }

    fn switch_power_system<H: LowPowerHw>(&mut self, pm: &mut SysPm<'_, H>) {
        for _ in 0..self.ctx.take_system_toggles() {
            let target = pm.system_state().toggled();
            if let Err(e) = pm.set_system_state(target) {
                warn!("power system switch to {} failed: {:?}", target.name(), e);
                continue;
            }
            info!("Switching the System Power system : {}", pm.system_state().name());
        }
    }
}
