//! Single-threaded cooperative run-loop for outputs and trigger pulses.
//!
//! The [`Scheduler`] owns every output line of the module. The pattern
//! generator's main loop writes outputs synchronously through it and spawns
//! trigger pulses with [`trigger()`](Scheduler::trigger), which returns
//! immediately. Pulses are retired only at suspension points:
//! [`sleep_ms()`](Scheduler::sleep_ms) and [`yield_now()`](Scheduler::yield_now).
//!
//! # Suspension points
//!
//! ```text
//! main loop ── step() ──▶ sleep_ms(wait) ─┬─ service pulses ─ hook(now) ─ delay ─┐
//!                                         │                                    │
//!                                         └──────────── until deadline ◀────────┘
//! ```
//!
//! Each wake-up first drives low every gate whose pulse has expired, then
//! calls the caller's poll hook (button sampling), then delays until the
//! earliest of: the sleep deadline, the next pulse deadline, or one poll
//! interval. A hook returning [`ControlFlow::Break`] aborts the sleep.
//!
//! Work done between suspension points delays everything else, including
//! pulse de-assertion; keep per-step work short.

use core::ops::ControlFlow;

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal_async::delay::DelayNs;

use crate::error::{ConfigError, PulseError};
use crate::io::{clamp_index, cv_to_duty, CV_COUNT, GATE_COUNT};
use crate::time::Monotonic;
use crate::trigger::{OverlapPolicy, PulseTable};

/// Poll hook that never interrupts.
pub fn idle(_now_ms: u64) -> ControlFlow<()> {
    ControlFlow::Continue(())
}

/// Tuning for a [`Scheduler`].
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulerConfig {
    /// Overlapping pulse policy. Default: [`OverlapPolicy::LatestDeadline`].
    pub overlap: OverlapPolicy,
    /// Longest uninterrupted delay inside a sleep; bounds hook latency.
    /// Default: 5.
    pub poll_interval_ms: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            overlap: OverlapPolicy::LatestDeadline,
            poll_interval_ms: 5,
        }
    }
}

/// Every output is driven off when the scheduler is dropped, including when
/// the future that owns it is cancelled mid-sleep.
pub struct Scheduler<G, A, T, D>
where
    G: OutputPin,
    A: SetDutyCycle,
{
    gates: [G; GATE_COUNT],
    gate_levels: [bool; GATE_COUNT],
    cvs: [A; CV_COUNT],
    time: T,
    delay: D,
    pulses: PulseTable,
    poll_interval_ms: u32,
}

impl<G, A, T, D> Scheduler<G, A, T, D>
where
    G: OutputPin,
    A: SetDutyCycle,
    T: Monotonic,
    D: DelayNs,
{
    /// Take ownership of the outputs and drive them all off.
    pub fn new(
        gates: [G; GATE_COUNT],
        cvs: [A; CV_COUNT],
        time: T,
        delay: D,
        config: SchedulerConfig,
    ) -> Result<Self, ConfigError> {
        if config.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        let mut scheduler = Self {
            gates,
            gate_levels: [false; GATE_COUNT],
            cvs,
            time,
            delay,
            pulses: PulseTable::new(config.overlap),
            poll_interval_ms: config.poll_interval_ms,
        };
        scheduler.all_off();
        Ok(scheduler)
    }

    pub fn now_ms(&self) -> u64 {
        self.time.now_ms()
    }

    // ── Outputs ──────────────────────────────────────────────────────

    /// Emit a trigger on `gate`: assert now, de-assert after `duration_ms`.
    ///
    /// Returns immediately. The gate is guaranteed to stay high for at least
    /// `duration_ms` unless the scheduler is [`reset()`](Self::reset).
    /// Out-of-range gate indices are clamped to the last gate.
    pub fn trigger(&mut self, gate: usize, duration_ms: u32) -> Result<(), PulseError> {
        let gate = clamp_index(gate, GATE_COUNT);
        // `now_ms()` is floored; count the pulse from the next whole
        // millisecond so it is never released early.
        let start = self.now_ms() + 1;
        if let Err(e) = self.pulses.emit(gate, start, duration_ms) {
            #[cfg(feature = "defmt")]
            defmt::warn!("trigger on gate {} dropped: {}", gate, e);
            return Err(e);
        }
        self.write_gate(gate, true);
        Ok(())
    }

    // ── Run-loop ─────────────────────────────────────────────────────

    /// Retire every expired pulse. Returns the time it ran at.
    pub fn service(&mut self) -> u64 {
        let now = self.now_ms();
        for gate in self.pulses.expire(now) {
            self.write_gate(gate, false);
        }
        now
    }

    /// Suspend for `ms`, servicing pulses and calling `hook` along the way.
    ///
    /// Returns [`ControlFlow::Break`] as soon as `hook` does.
    pub async fn sleep_ms<H>(&mut self, ms: u32, hook: &mut H) -> ControlFlow<()>
    where
        H: FnMut(u64) -> ControlFlow<()>,
    {
        let deadline = self.now_ms() + ms as u64;
        loop {
            let now = self.service();
            hook(now)?;
            if now >= deadline {
                return ControlFlow::Continue(());
            }

            let mut until = deadline.min(now + self.poll_interval_ms as u64);
            if let Some(next) = self.pulses.next_deadline() {
                until = until.min(next);
            }
            // `next` is always in the future after service().
            let span = until.saturating_sub(now).max(1);
            self.delay.delay_ms(span as u32).await;
        }
    }

    /// Service pulses, call `hook`, then give the executor one turn.
    pub async fn yield_now<H>(&mut self, hook: &mut H) -> ControlFlow<()>
    where
        H: FnMut(u64) -> ControlFlow<()>,
    {
        let now = self.service();
        hook(now)?;
        embassy_futures::yield_now().await;
        ControlFlow::Continue(())
    }
}

impl<G, A, T, D> Scheduler<G, A, T, D>
where
    G: OutputPin,
    A: SetDutyCycle,
{
    /// Synchronously set a gate level.
    ///
    /// Does not cancel a pulse in flight on the same gate; that pulse still
    /// drives the gate low at its deadline.
    pub fn set_gate(&mut self, gate: usize, high: bool) {
        self.write_gate(clamp_index(gate, GATE_COUNT), high);
    }

    /// Last level written to `gate`.
    pub fn gate_level(&self, gate: usize) -> bool {
        self.gate_levels[clamp_index(gate, GATE_COUNT)]
    }

    /// Write a 16-bit CV value (`0` → 0 V, `65535` → 3.3 V).
    pub fn set_cv(&mut self, cv: usize, value: u16) {
        let cv = clamp_index(cv, CV_COUNT);
        let channel = &mut self.cvs[cv];
        let duty = cv_to_duty(value, channel.max_duty_cycle());
        if channel.set_duty_cycle(duty).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("cv {} write failed", cv);
        }
    }

    /// Unconditionally drive every gate low and every CV to zero.
    ///
    /// Pending pulses are left in place; use [`reset()`](Self::reset) to
    /// discard them as well.
    pub fn all_off(&mut self) {
        for gate in 0..GATE_COUNT {
            self.write_gate(gate, false);
        }
        for cv in 0..CV_COUNT {
            self.set_cv(cv, 0);
        }
    }

    /// Discard every in-flight pulse and sweep all outputs off.
    pub fn reset(&mut self) {
        self.pulses.clear();
        self.all_off();
    }

    pub fn pending_pulses(&self) -> usize {
        self.pulses.len()
    }

    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.pulses.policy()
    }

    fn write_gate(&mut self, gate: usize, high: bool) {
        let pin = &mut self.gates[gate];
        let result = if high { pin.set_high() } else { pin.set_low() };
        if result.is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("gate {} write failed", gate);
        }
        self.gate_levels[gate] = high;
    }
}

impl<G, A, T, D> Drop for Scheduler<G, A, T, D>
where
    G: OutputPin,
    A: SetDutyCycle,
{
    fn drop(&mut self) {
        self.reset();
    }
}
