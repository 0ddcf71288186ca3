//! Power modes, power system states and the small enums shared by the platform layer.

/// Power mode requested by the user button.
///
/// The discriminants follow the button press order; [`PowerMode::next`] wraps
/// from [`PowerMode::Hibernate`] back to [`PowerMode::Normal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PowerMode {
    /// Active mode, the control loop idles.
    Normal = 0,
    /// CPU sleep, peripherals stay clocked.
    Sleep = 1,
    /// DeepSleep, wake through an enabled interrupt.
    DeepSleep = 2,
    /// DeepSleep with retained RAM, wake through the warm-boot entry.
    DeepSleepRam = 3,
    /// Hibernate, only a wake pin or reset brings the chip back.
    Hibernate = 4,
}

impl PowerMode {
    /// Number of modes in the button cycle.
    pub const COUNT: u8 = 5;

    /// Decode a raw mode value, modulo [`PowerMode::COUNT`].
    pub const fn from_bits(bits: u8) -> Self {
        match bits % Self::COUNT {
            0 => PowerMode::Normal,
            1 => PowerMode::Sleep,
            2 => PowerMode::DeepSleep,
            3 => PowerMode::DeepSleepRam,
            _ => PowerMode::Hibernate,
        }
    }

    /// The mode selected by the next button press.
    pub const fn next(self) -> Self {
        Self::from_bits(self as u8 + 1)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PowerMode::Normal => "Active",
            PowerMode::Sleep => "Sleep",
            PowerMode::DeepSleep => "Deep Sleep",
            PowerMode::DeepSleepRam => "DeepSleep-RAM",
            PowerMode::Hibernate => "Hibernate",
        }
    }
}

/// Analog/regulator configuration of the system, orthogonal to [`PowerMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSystem {
    /// Low Power (LP) system, the reset default.
    LowPower,
    /// Ultra Low Power (ULP) system.
    UltraLowPower,
}

impl PowerSystem {
    pub const fn toggled(self) -> Self {
        match self {
            PowerSystem::LowPower => PowerSystem::UltraLowPower,
            PowerSystem::UltraLowPower => PowerSystem::LowPower,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PowerSystem::LowPower => "LP",
            PowerSystem::UltraLowPower => "ULP",
        }
    }
}

/// Sub-mode used by the deep-sleep primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeepSleepMode {
    /// Plain DeepSleep: registers retained, execution continues after WFI.
    DeepSleep,
    /// DeepSleep-RAM: only the retained region survives, wake goes through
    /// the warm-boot entry.
    DeepSleepRam,
}

/// Wake pin and level that bring the chip out of Hibernate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakePinPolarity {
    #[default]
    PinALow,
    PinAHigh,
    PinBLow,
    PinBHigh,
}

/// Cause of the last reset, as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetReason {
    /// Power-on or brown-out reset.
    PowerOn,
    /// Wake-up from Hibernate through the wake pin.
    HibernateWakeup,
    /// Software requested reset.
    Software,
    /// Watchdog expired.
    Watchdog,
    /// Anything else, raw cause bits.
    Other(u32),
}

impl ResetReason {
    pub fn is_hibernate_wakeup(&self) -> bool {
        matches!(self, ResetReason::HibernateWakeup)
    }
}
