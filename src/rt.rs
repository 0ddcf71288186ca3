//! Cortex-M runtime glue.
//!
//! Only built for bare-metal ARM with the `rt` feature. The linker script of
//! `cortex-m-rt` provides `_stack_start`, the initial main stack pointer, which
//! is also the stack the ROM loads on a DS-RAM wake.

use cortex_m_rt as _;

use crate::app::ResumeEntry;
pub use crate::nvic::CortexMNvic;

extern "C" {
    static _stack_start: u32;
}

/// Initial stack pointer from the linker script.
pub fn stack_top() -> usize {
    unsafe { core::ptr::addr_of!(_stack_start) as usize }
}

impl ResumeEntry {
    /// Resume entry using the initial stack and `entry`, usually a function
    /// defined with [`warm_boot_entry!`](crate::warm_boot_entry).
    pub fn from_entry(entry: extern "C" fn() -> !) -> Self {
        Self::new(stack_top(), entry as usize)
    }
}

/// Mask interrupts and wait for interrupt forever.
///
/// For panic handlers implementing the fatal boot policy.
pub fn halt() -> ! {
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::wfi();
    }
}
