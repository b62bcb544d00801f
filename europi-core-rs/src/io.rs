//! Hardware boundary of the module.
//!
//! The core never touches registers. Every physical jack, knob and button is
//! reached through a trait: [`AnalogIn`] for ADC readings, `embedded-hal`
//! [`InputPin`] / [`OutputPin`] for digital lines and [`SetDutyCycle`] for the
//! PWM-backed CV outputs. A board crate implements [`Platform`] once and hands
//! the concrete peripherals over in a [`Panel`].
//!
//! ```text
//!   knob_1 ─┐                      ┌─ gate 1..4 (trigger / gate)
//!   knob_2 ─┤                      │
//! analog_in ┤   Panel<P>  ──run──▶ ├─ cv 1..4   (16-bit duty, 0–3.3 V)
//! button_1 ─┤                      │
//! button_2 ─┤                      │
//! digital_in┤ (external clock)     │
//!   switch ─┘ (clock source)       │
//! ```

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal_async::delay::DelayNs;

use crate::time::Monotonic;

/// Largest unsigned 16-bit value; full scale of analog readings and CV writes.
pub const UINT_16: u16 = u16::MAX;

/// Number of digital gate/trigger outputs.
pub const GATE_COUNT: usize = 4;

/// Number of analog CV outputs.
pub const CV_COUNT: usize = 4;

// ── Analog input ─────────────────────────────────────────────────────────

/// A normalized analog reading (knob or CV input jack).
pub trait AnalogIn {
    /// Raw reading scaled to the full `[0, 65535]` range regardless of the
    /// ADC's native resolution.
    fn read_u16(&mut self) -> u16;

    /// Relative position in `[0, 1]`.
    fn percent(&mut self) -> f32 {
        self.read_u16() as f32 / UINT_16 as f32
    }

    /// Pick one of `options` choices from the current position.
    ///
    /// Knobs at their end stops can present values just outside the nominal
    /// range, so the result is clamped to `[0, options - 1]`. Zero options
    /// yields `0`.
    fn choice(&mut self, options: usize) -> usize {
        if options == 0 {
            return 0;
        }
        let scaled = (self.percent() - 0.001) * options as f32;
        clamp_index(scaled.max(0.0) as usize, options)
    }
}

impl<T: AnalogIn + ?Sized> AnalogIn for &mut T {
    fn read_u16(&mut self) -> u16 {
        T::read_u16(self)
    }
}

/// Clamp `index` into `[0, len - 1]`.
pub(crate) fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}

// ── Digital lines ────────────────────────────────────────────────────────

/// Which pin level counts as "pressed" or "present".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Pulled up; `0` means pressed. Used by the momentary buttons.
    ActiveLow,
    /// `1` means active. Used by the presence switch and clock input.
    ActiveHigh,
}

impl Polarity {
    /// Sample `pin` and report whether it is at its active level.
    ///
    /// A failed read is treated as inactive.
    pub fn is_active<P: InputPin>(self, pin: &mut P) -> bool {
        let level = match self {
            Polarity::ActiveLow => pin.is_low(),
            Polarity::ActiveHigh => pin.is_high(),
        };
        level.unwrap_or(false)
    }
}

// ── Board bundle ─────────────────────────────────────────────────────────

/// The concrete hardware types of one board.
pub trait Platform {
    /// Knobs and the analog input jack.
    type Analog: AnalogIn;
    /// The two momentary front-panel buttons.
    type Button: InputPin;
    /// Digital input jack and the presence switch.
    type Digital: InputPin;
    /// Gate/trigger output jacks.
    type Gate: OutputPin;
    /// CV output jacks.
    type Cv: SetDutyCycle;
    /// Millisecond monotonic clock.
    type Time: Monotonic;
    /// Cooperative delay.
    type Delay: DelayNs;
}

/// Every physical input and output of the module.
///
/// A `Panel` has exactly one owner at a time: the selection menu while idle,
/// and a [`Session`](crate::session::Session) while a pattern generator runs.
/// The session hands it back when the run ends.
pub struct Panel<P: Platform> {
    pub knob_1: P::Analog,
    pub knob_2: P::Analog,
    pub analog_in: P::Analog,
    pub button_1: P::Button,
    pub button_2: P::Button,
    pub digital_in: P::Digital,
    pub switch: P::Digital,
    pub gates: [P::Gate; GATE_COUNT],
    pub cvs: [P::Cv; CV_COUNT],
    pub time: P::Time,
    pub delay: P::Delay,
}

/// Scale a 16-bit CV value onto a PWM channel's duty range.
pub(crate) fn cv_to_duty(value: u16, max_duty: u16) -> u16 {
    ((value as u32 * max_duty as u32) / UINT_16 as u32) as u16
}
