//! Real-time core for EuroPi-style Eurorack control-voltage firmware.
//!
//! Every musical script on the module (arpeggiator, sequencer, clock
//! divider, ...) leans on the same three pieces, all running on one thread
//! with no preemption:
//!
//! - **[`Clock`]**: derives a stable beat from a jittery tempo knob or an
//!   external pulse line and suspends the caller until the next beat.
//! - **[`Scheduler`]**: the cooperative run-loop owning the outputs. Trigger
//!   pulses are fire-and-forget: the gate goes high immediately and is driven
//!   low at the next suspension point after its deadline, so pulses never
//!   block or jitter the tempo-locked main loop.
//! - **[`DebouncedInput`]**: classifies button presses as short or long
//!   using forward-in-time sampling only.
//!
//! A [`Session`] ties them together for one run of a [`PatternGenerator`],
//! borrowing the module's [`Panel`] and handing it back, with every output
//! off, when the operator holds both buttons.
//!
//! # Quick Start
//!
//! ```ignore
//! use europi_core::{ClockDivider, Session, SessionConfig};
//!
//! let session = Session::new(panel, ClockDivider::new(), SessionConfig::default());
//! let (panel, _divider) = session.run().await?;
//! ```
//!
//! # Crate Features
//!
//! - **`defmt`**: structured logging and [`defmt::Format`] on public types.
//! - **`embassy`**: [`EmbassyTime`](time::EmbassyTime), a [`Monotonic`]
//!   clock backed by `embassy-time`.

#![cfg_attr(not(test), no_std)]

pub mod clock;
pub mod debounce;
pub mod divider;
pub mod error;
pub mod io;
pub mod scheduler;
pub mod session;
pub mod time;
pub mod trigger;

#[cfg(test)]
mod testutil;

// ── Re-exports for convenience ───────────────────────────────────────────

pub use clock::{Clock, ClockConfig, ClockSource, MAX_BPM, MIN_BPM};
pub use debounce::{DebounceConfig, DebouncedInput, Handler, Press, PressState};
pub use divider::ClockDivider;
pub use error::{ConfigError, PulseError};
pub use io::{AnalogIn, Panel, Platform, Polarity, CV_COUNT, GATE_COUNT, UINT_16};
pub use scheduler::{idle, Scheduler, SchedulerConfig};
pub use session::{Buttons, Io, PatternGenerator, Session, SessionConfig};
pub use time::Monotonic;
pub use trigger::{OverlapPolicy, DEFAULT_TRIGGER_MS};
