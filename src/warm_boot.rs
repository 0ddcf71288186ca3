//! DeepSleep-RAM warm-boot entry.
//!
//! On a DS-RAM wake the ROM skips the reset vector: it loads the stack pointer
//! and entry function recorded in the [`ResumeDescriptor`](crate::context::ResumeDescriptor)
//! and jumps there. Clocks, the external memory interface, pin registers and
//! the NVIC are all lost; only the retained RAM region survives. [`resume`]
//! rebuilds the minimum and then calls the normal application entry, which
//! sees the warm-boot flag and takes the reduced initialization path.
//!
//! The entry function, and everything it runs before the external memory is
//! back in step 3, must execute from retained RAM. [`resume`] is always
//! inlined into the entry that [`warm_boot_entry!`](crate::warm_boot_entry)
//! emits in the `.ramfunc` section, and it does not log before step 3.
//! The [`WarmBootHw`] methods of those first steps have the same constraint.
//!
//! There is no error path: every step assumes the previous one worked, and
//! the cold-boot context it could fall back to no longer exists.

use crate::context::PowerContext;
use crate::nvic::InterruptController;
use crate::syspm::{CallbackPhase, LowPowerHw, SysPm, TransitionType};

/// Hardware re-initialization needed after a DS-RAM wake.
///
/// `system_init`, `enable_memory_interface` and `init_memory_interface` run
/// while the external memory is still down. Implementations must be
/// `#[inline(always)]` or placed in `.ramfunc` themselves, and must not call
/// into code that lives in external memory.
pub trait WarmBootHw {
    /// Minimal system and clock tree setup; the clock configuration is not retained.
    ///
    /// Runs from retained RAM.
    fn system_init(&mut self);

    /// Power up the external memory interface.
    ///
    /// Runs from retained RAM.
    fn enable_memory_interface(&mut self);

    /// Configure the external memory interface so code and data in it are reachable.
    ///
    /// Runs from retained RAM.
    fn init_memory_interface(&mut self);

    /// Write the cached pin/peripheral configuration back to the registers.
    ///
    /// The configuration tables themselves are in retained RAM.
    fn restore_pin_config(&mut self);
}

/// Warm-boot sequence, run from the DS-RAM entry function.
///
/// 1. Set the warm-boot flag.
/// 2. Re-run system/clock init.
/// 3. Enable and init the external memory interface.
/// 4. Re-apply pin configuration.
/// 5. Restore the NVIC from the snapshot taken before the transition.
/// 6. Run the DS-RAM `AfterTransition` callbacks (restores the flow-control lines).
/// 7. Call the application entry with the power manager.
///
/// `pm` is handed on to `entry` instead of being re-borrowed from its static,
/// so the application keeps the only live reference to it. `entry` is a
/// direct call, not a reset; on hardware it never returns.
#[inline(always)]
pub fn resume<'a, W, I, H, R>(
    ctx: &PowerContext,
    hw: &mut W,
    nvic: &mut I,
    pm: &mut SysPm<'a, H>,
    entry: impl FnOnce(&mut SysPm<'a, H>) -> R,
) -> R
where
    W: WarmBootHw,
    I: InterruptController,
    H: LowPowerHw,
{
    // Retained RAM only until the memory interface is up.
    ctx.set_warm_boot();
    hw.system_init();
    hw.enable_memory_interface();
    hw.init_memory_interface();
    debug!("warm boot: system init done, memory interface up");

    hw.restore_pin_config();
    debug!("warm boot: pin configuration restored");

    match ctx.interrupt_store().take() {
        Some(snapshot) => {
            nvic.restore(&snapshot);
            debug!(
                "warm boot: NVIC restored ({} enabled lines)",
                snapshot.enabled_count()
            );
        }
        None => warn!("warm boot: no interrupt snapshot pending"),
    }

    // Only `CheckReady` can fail, and it is not run here.
    let _ = pm.execute_callbacks(TransitionType::DeepSleepRam, CallbackPhase::AfterTransition);

    debug!("warm boot: entering application");
    entry(pm)
}

/// Define the DS-RAM warm-boot entry function.
///
/// The function is placed in `.ramfunc` on bare-metal targets. Its address
/// goes into the resume descriptor, see [`crate::app::ResumeEntry`].
///
/// ```rust,ignore
/// power_modes::warm_boot_entry!(fn dsram_entry() {
///     // Sole reference to the power manager on this path.
///     let pm = unsafe { &mut *PM.as_mut_ptr() };
///     power_modes::warm_boot::resume(&POWER, &mut Board::steal(), &mut nvic, pm, app_main)
/// });
/// ```
#[macro_export]
macro_rules! warm_boot_entry {
    ($vis:vis fn $name:ident() $body:block) => {
        #[cfg_attr(target_os = "none", link_section = ".ramfunc.warm_boot")]
        #[inline(never)]
        #[no_mangle]
        $vis extern "C" fn $name() -> ! $body
    };
}
