#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod mode;
pub mod context;
pub mod nvic;
pub mod syspm;
pub mod warm_boot;
pub mod app;
#[cfg(all(feature = "rt", target_arch = "arm", target_os = "none"))]
pub mod rt;

#[cfg(test)]
mod sim;

/// Power controller configuration
pub mod config {
    use crate::mode::WakePinPolarity;

    /// Configuration passed to the boot path and the control loop.
    #[derive(Debug, Clone, Copy)]
    #[non_exhaustive]
    pub struct Config {
        /// Wait before entering Hibernate so pending console output drains.
        pub hibernate_flush_delay_ms: u32,
        /// Pin and level that wake the chip from Hibernate.
        pub hibernate_wake_pin: WakePinPolarity,
        /// Keep the debug port enabled after a DS-RAM wake.
        pub debug_after_wake: bool,
        /// NVIC priority of the user button interrupts.
        pub button_irq_priority: u8,
        /// Order of the flow-control observer for DeepSleep.
        pub deep_sleep_callback_order: u8,
        /// Order of the flow-control observer for DS-RAM; the NVIC snapshot
        /// observer runs right after it.
        pub dsram_callback_order: u8,
    }

    impl Default for Config {
        fn default() -> Self {
            Self {
                hibernate_flush_delay_ms: 1000,
                hibernate_wake_pin: WakePinPolarity::PinALow,
                debug_after_wake: false,
                button_irq_priority: 2,
                deep_sleep_callback_order: 0,
                dsram_callback_order: 0,
            }
        }
    }
}
pub use config::Config;

pub use context::PowerContext;
pub use mode::PowerMode;
pub use syspm::SysPm;
