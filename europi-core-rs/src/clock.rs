//! Tempo clock driven by a knob or an external pulse line.
//!
//! # Internal source
//!
//! Each [`tempo()`](Clock::tempo) call samples the tempo knob, maps it
//! linearly onto `[min_bpm, max_bpm]` and pushes it into a fixed-length
//! running-average window. The window damps ADC reference jitter: a length of
//! 1 follows the knob exactly, longer windows trade responsiveness for a
//! steadier beat. [`wait()`](Clock::wait) then sleeps one quarter note.
//!
//! # External source
//!
//! [`wait()`](Clock::wait) polls the external line, yielding to the
//! scheduler between samples, and returns once the line has gone high and
//! back low since the previous call:
//!
//! ```text
//! line   ___/‾‾‾‾‾\______/‾‾‾‾\____
//!                 ▲              ▲
//!             wait() returns  wait() returns
//! ```
//!
//! With no pulses arriving the wait never returns. That is the idle state of a
//! module slaved to a stopped clock, not an error; the poll hook can still
//! break out of it.

use core::ops::ControlFlow;

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal_async::delay::DelayNs;
use heapless::Deque;

use crate::error::ConfigError;
use crate::io::{AnalogIn, Polarity};
use crate::scheduler::Scheduler;
use crate::time::Monotonic;

/// Default lower tempo bound.
pub const MIN_BPM: f32 = 20.0;

/// Default upper tempo bound.
pub const MAX_BPM: f32 = 280.0;

/// Largest supported smoothing window.
pub const MAX_WINDOW_LEN: usize = 32;

/// Tempo the smoothing window is seeded with, clamped into range.
const INITIAL_BPM: f32 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    Internal,
    External,
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    /// Tempo at the knob's minimum. Must be positive. Default: 20.
    pub min_bpm: f32,
    /// Tempo at the knob's maximum. Default: 280.
    pub max_bpm: f32,
    /// Running-average length, `1..=MAX_WINDOW_LEN`. Default: 1.
    pub window_len: usize,
    /// Starting source when no switch is attached. Default: internal.
    pub source: ClockSource,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            min_bpm: MIN_BPM,
            max_bpm: MAX_BPM,
            window_len: 1,
            source: ClockSource::Internal,
        }
    }
}

impl ClockConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Written to also reject NaN.
        if !(self.min_bpm > 0.0) {
            return Err(ConfigError::NonPositiveMinBpm);
        }
        if !(self.min_bpm < self.max_bpm) {
            return Err(ConfigError::InvalidTempoRange {
                min_bpm: self.min_bpm,
                max_bpm: self.max_bpm,
            });
        }
        if self.window_len == 0 || self.window_len > MAX_WINDOW_LEN {
            return Err(ConfigError::InvalidWindowLength(self.window_len));
        }
        Ok(())
    }
}

/// Round to one decimal place.
fn round_tenths(value: f32) -> f32 {
    libm::roundf(value * 10.0) / 10.0
}

pub struct Clock<K, L> {
    knob: K,
    switch: Option<L>,
    external: Option<L>,
    min_bpm: f32,
    max_bpm: f32,
    window: Deque<f32, MAX_WINDOW_LEN>,
    window_len: usize,
    edit_enabled: bool,
    source: ClockSource,
    prev_external_high: bool,
}

impl<K, L> Clock<K, L>
where
    K: AnalogIn,
    L: InputPin,
{
    pub fn new(knob: K, config: ClockConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let seed = INITIAL_BPM.clamp(config.min_bpm, config.max_bpm);
        let mut window = Deque::new();
        for _ in 0..config.window_len {
            // Bounded by validate().
            let _ = window.push_back(seed);
        }

        Ok(Self {
            knob,
            switch: None,
            external: None,
            min_bpm: config.min_bpm,
            max_bpm: config.max_bpm,
            window,
            window_len: config.window_len,
            edit_enabled: true,
            source: config.source,
            prev_external_high: false,
        })
    }

    /// Attach the external pulse line used in [`ClockSource::External`].
    pub fn with_external(mut self, line: L) -> Self {
        self.external = Some(line);
        self
    }

    /// Attach a presence switch. From now on the source follows the switch:
    /// asserted selects external, released selects internal.
    pub fn with_switch(mut self, switch: L) -> Self {
        self.switch = Some(switch);
        self.switch_source();
        self
    }

    // ── Tempo ────────────────────────────────────────────────────────

    /// Current tempo in bpm, rounded to one decimal place.
    ///
    /// With editing enabled this takes a new knob sample first; otherwise the
    /// window is left untouched and its average returned.
    pub fn tempo(&mut self) -> f32 {
        if self.edit_enabled {
            let span = self.max_bpm - self.min_bpm;
            let sample = (self.min_bpm + self.knob.percent() * span).clamp(self.min_bpm, self.max_bpm);
            if self.window.len() >= self.window_len {
                self.window.pop_front();
            }
            let _ = self.window.push_back(sample);
        }
        self.average()
    }

    fn average(&self) -> f32 {
        let sum: f32 = self.window.iter().sum();
        let avg = round_tenths(sum / self.window_len as f32);
        // Rounding can step a hair outside the configured bounds.
        avg.clamp(self.min_bpm, self.max_bpm)
    }

    /// Length of one quarter note at the current tempo, in milliseconds.
    pub fn wait_ms(&mut self) -> u32 {
        let tempo = self.tempo();
        libm::roundf(60_000.0 / (tempo * 4.0)) as u32
    }

    /// Enable or disable knob sampling. `None` toggles.
    ///
    /// While disabled the tempo is frozen, leaving the knob free for a
    /// generator's own controls.
    pub fn toggle_edit(&mut self, enabled: Option<bool>) {
        self.edit_enabled = enabled.unwrap_or(!self.edit_enabled);
    }

    pub fn edit_enabled(&self) -> bool {
        self.edit_enabled
    }

    pub fn min_bpm(&self) -> f32 {
        self.min_bpm
    }

    pub fn max_bpm(&self) -> f32 {
        self.max_bpm
    }

    // ── Source ───────────────────────────────────────────────────────

    /// Effective source. External needs an attached line.
    pub fn source(&self) -> ClockSource {
        match (self.source, &self.external) {
            (ClockSource::External, Some(_)) => ClockSource::External,
            _ => ClockSource::Internal,
        }
    }

    /// Re-read the presence switch, or flip the source if none is attached.
    ///
    /// Takes effect on the next [`wait()`](Self::wait).
    pub fn switch_source(&mut self) {
        self.source = match self.switch.as_mut() {
            Some(switch) => {
                if Polarity::ActiveHigh.is_active(switch) {
                    ClockSource::External
                } else {
                    ClockSource::Internal
                }
            }
            None => match self.source {
                ClockSource::Internal => ClockSource::External,
                ClockSource::External => ClockSource::Internal,
            },
        };

        #[cfg(feature = "defmt")]
        defmt::debug!("clock source: {}", self.source());
    }

    fn follow_switch(&mut self) {
        if self.switch.is_some() {
            self.switch_source();
        }
    }

    /// Feed one external line sample. Returns `true` when it completes a
    /// high→low cycle.
    pub fn observe_external(&mut self, high: bool) -> bool {
        if high == self.prev_external_high {
            return false;
        }
        self.prev_external_high = high;
        !high
    }

    // ── Waiting ──────────────────────────────────────────────────────

    /// Suspend until the next beat of the current source.
    ///
    /// `hook` is called at every wake-up with the current time; returning
    /// [`ControlFlow::Break`] ends the wait early and is passed through.
    pub async fn wait<G, A, T, D, H>(
        &mut self,
        sched: &mut Scheduler<G, A, T, D>,
        hook: &mut H,
    ) -> ControlFlow<()>
    where
        G: OutputPin,
        A: SetDutyCycle,
        T: Monotonic,
        D: DelayNs,
        H: FnMut(u64) -> ControlFlow<()>,
    {
        self.follow_switch();
        match self.source() {
            ClockSource::Internal => {
                let ms = self.wait_ms();
                sched.sleep_ms(ms, hook).await
            }
            ClockSource::External => self.wait_external(sched, hook).await,
        }
    }

    async fn wait_external<G, A, T, D, H>(
        &mut self,
        sched: &mut Scheduler<G, A, T, D>,
        hook: &mut H,
    ) -> ControlFlow<()>
    where
        G: OutputPin,
        A: SetDutyCycle,
        T: Monotonic,
        D: DelayNs,
        H: FnMut(u64) -> ControlFlow<()>,
    {
        loop {
            let high = match self.external.as_mut() {
                Some(line) => Polarity::ActiveHigh.is_active(line),
                None => return ControlFlow::Continue(()),
            };
            if self.observe_external(high) {
                return ControlFlow::Continue(());
            }

            sched.yield_now(hook).await?;

            self.follow_switch();
            if self.source() == ClockSource::Internal {
                return ControlFlow::Continue(());
            }
        }
    }

    /// Give back the knob, switch and external line.
    pub fn into_parts(self) -> (K, Option<L>, Option<L>) {
        (self.knob, self.switch, self.external)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::idle;
    use crate::testutil::{stays_pending, test_scheduler, FakeKnob, FakePin, ScriptedPin, TestTime};
    use embassy_futures::block_on;

    const HALF: u16 = u16::MAX / 2 + 1;

    fn clock(knob: &FakeKnob, window_len: usize) -> Clock<FakeKnob, ScriptedPin> {
        let config = ClockConfig {
            window_len,
            ..Default::default()
        };
        Clock::new(knob.clone(), config).unwrap()
    }

    // ── Configuration ────────────────────────────────────────────────

    #[test]
    fn rejects_invalid_configs() {
        let knob = FakeKnob::new(0);
        let cases = [
            (ClockConfig { min_bpm: 0.0, ..Default::default() }, ConfigError::NonPositiveMinBpm),
            (
                ClockConfig { min_bpm: 120.0, max_bpm: 120.0, ..Default::default() },
                ConfigError::InvalidTempoRange { min_bpm: 120.0, max_bpm: 120.0 },
            ),
            (ClockConfig { window_len: 0, ..Default::default() }, ConfigError::InvalidWindowLength(0)),
            (
                ClockConfig { window_len: MAX_WINDOW_LEN + 1, ..Default::default() },
                ConfigError::InvalidWindowLength(MAX_WINDOW_LEN + 1),
            ),
        ];
        for (config, expected) in cases {
            let result: Result<Clock<_, FakePin>, _> = Clock::new(knob.clone(), config);
            assert_eq!(result.err(), Some(expected));
        }
    }

    // ── Tempo ────────────────────────────────────────────────────────

    #[test]
    fn tempo_stays_in_range_for_every_reading() {
        let knob = FakeKnob::new(0);
        let mut clock = clock(&knob, 1);
        for raw in 0..=u16::MAX {
            knob.set(raw);
            let tempo = clock.tempo();
            assert!((MIN_BPM..=MAX_BPM).contains(&tempo), "raw {} gave {}", raw, tempo);
        }
    }

    #[test]
    fn half_knob_is_150_bpm_and_100_ms() {
        let knob = FakeKnob::new(HALF);
        let mut clock = clock(&knob, 1);
        assert_eq!(clock.tempo(), 150.0);
        assert_eq!(clock.wait_ms(), 100);
    }

    #[test]
    fn end_stops_hit_bounds() {
        let knob = FakeKnob::new(0);
        let mut clock = clock(&knob, 1);
        assert_eq!(clock.tempo(), MIN_BPM);
        assert_eq!(clock.wait_ms(), 750);
        knob.set(u16::MAX);
        assert_eq!(clock.tempo(), MAX_BPM);
        assert_eq!(clock.wait_ms(), 54);
    }

    #[test]
    fn constant_input_converges_within_window() {
        let knob = FakeKnob::new(HALF);
        let mut clock = clock(&knob, 4);

        // Seeded at 120.
        assert_eq!(clock.tempo(), 127.5);
        clock.tempo();
        clock.tempo();
        assert_eq!(clock.tempo(), 150.0);
        for _ in 0..10 {
            assert_eq!(clock.tempo(), 150.0);
        }
    }

    #[test]
    fn wait_ms_decreases_as_tempo_rises() {
        let knob = FakeKnob::new(0);
        let mut clock = clock(&knob, 1);
        let mut previous = u32::MAX;
        for step in 0..=10u32 {
            knob.set((u16::MAX as u32 * step / 10) as u16);
            let ms = clock.wait_ms();
            assert!(ms < previous, "step {}: {} !< {}", step, ms, previous);
            previous = ms;
        }
    }

    #[test]
    fn seed_is_clamped_into_range() {
        let knob = FakeKnob::new(0);
        let config = ClockConfig {
            min_bpm: 130.0,
            max_bpm: 200.0,
            window_len: 2,
            ..Default::default()
        };
        let mut clock: Clock<_, FakePin> = Clock::new(knob, config).unwrap();
        clock.toggle_edit(Some(false));
        assert_eq!(clock.tempo(), 130.0);
    }

    #[test]
    fn frozen_tempo_ignores_knob() {
        let knob = FakeKnob::new(HALF);
        let mut clock = clock(&knob, 1);
        assert_eq!(clock.tempo(), 150.0);

        clock.toggle_edit(Some(false));
        knob.set(u16::MAX);
        assert_eq!(clock.tempo(), 150.0);
        assert_eq!(clock.wait_ms(), 100);

        clock.toggle_edit(None);
        assert!(clock.edit_enabled());
        assert_eq!(clock.tempo(), MAX_BPM);
    }

    // ── Source selection ─────────────────────────────────────────────

    #[test]
    fn external_requires_a_line() {
        let knob = FakeKnob::new(0);
        let config = ClockConfig {
            source: ClockSource::External,
            ..Default::default()
        };
        let clock: Clock<_, FakePin> = Clock::new(knob.clone(), config).unwrap();
        assert_eq!(clock.source(), ClockSource::Internal);

        let clock = Clock::new(knob, config).unwrap().with_external(FakePin::new(false));
        assert_eq!(clock.source(), ClockSource::External);
    }

    #[test]
    fn switch_source_flips_without_switch() {
        let knob = FakeKnob::new(0);
        let mut clock = Clock::new(knob, ClockConfig::default())
            .unwrap()
            .with_external(FakePin::new(false));
        clock.switch_source();
        assert_eq!(clock.source(), ClockSource::External);
        clock.switch_source();
        assert_eq!(clock.source(), ClockSource::Internal);
    }

    #[test]
    fn switch_selects_source() {
        let knob = FakeKnob::new(0);
        let switch = FakePin::new(true);
        let mut clock = Clock::new(knob, ClockConfig::default())
            .unwrap()
            .with_external(FakePin::new(false))
            .with_switch(switch.clone());
        assert_eq!(clock.source(), ClockSource::External);

        switch.set(false);
        clock.switch_source();
        assert_eq!(clock.source(), ClockSource::Internal);
    }

    // ── Waiting ──────────────────────────────────────────────────────

    #[test]
    fn internal_wait_sleeps_one_quarter_note() {
        let time = TestTime::default();
        let mut sched = test_scheduler(&time);
        let knob = FakeKnob::new(HALF);
        let mut clock = clock(&knob, 1);

        let flow = block_on(clock.wait(&mut sched, &mut idle));

        assert_eq!(flow, ControlFlow::Continue(()));
        assert_eq!(time.now_ms(), 100);
    }

    #[test]
    fn external_high_then_low_completes_one_wait() {
        let time = TestTime::default();
        let mut sched = test_scheduler(&time);
        let line = ScriptedPin::new(&[true, false], false);
        let mut clock = Clock::new(FakeKnob::new(0), ClockConfig::default())
            .unwrap()
            .with_external(line);
        clock.switch_source();

        assert_eq!(block_on(clock.wait(&mut sched, &mut idle)), ControlFlow::Continue(()));
        // No further edges: the next wait must not return.
        assert!(stays_pending(clock.wait(&mut sched, &mut idle), 100));
    }

    #[test]
    fn external_high_only_never_returns() {
        let time = TestTime::default();
        let mut sched = test_scheduler(&time);
        let line = ScriptedPin::new(&[], true);
        let mut clock = Clock::new(FakeKnob::new(0), ClockConfig::default())
            .unwrap()
            .with_external(line);
        clock.switch_source();

        assert!(stays_pending(clock.wait(&mut sched, &mut idle), 100));
    }

    #[test]
    fn external_edge_detection_tracks_previous_level() {
        let mut clock: Clock<_, FakePin> = Clock::new(FakeKnob::new(0), ClockConfig::default()).unwrap();
        let completed: Vec<bool> = [false, true, true, false, false, true, false]
            .iter()
            .map(|&high| clock.observe_external(high))
            .collect();
        assert_eq!(completed, [false, false, false, true, false, false, true]);
    }

    #[test]
    fn external_wait_yields_to_hook_and_can_break() {
        let time = TestTime::default();
        let mut sched = test_scheduler(&time);
        let line = ScriptedPin::new(&[], true);
        let mut clock = Clock::new(FakeKnob::new(0), ClockConfig::default())
            .unwrap()
            .with_external(line);
        clock.switch_source();

        let mut polls = 0;
        let mut hook = |_: u64| {
            polls += 1;
            if polls == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        assert_eq!(block_on(clock.wait(&mut sched, &mut hook)), ControlFlow::Break(()));
        assert_eq!(polls, 3);
    }

    #[test]
    fn switching_back_to_internal_ends_external_wait() {
        let time = TestTime::default();
        let mut sched = test_scheduler(&time);
        // Switch reads asserted three times, then released.
        let mut clock = Clock::new(FakeKnob::new(0), ClockConfig::default())
            .unwrap()
            .with_external(ScriptedPin::new(&[], true))
            .with_switch(ScriptedPin::new(&[true, true, true], false));
        assert_eq!(clock.source(), ClockSource::External);

        assert_eq!(block_on(clock.wait(&mut sched, &mut idle)), ControlFlow::Continue(()));
        assert_eq!(clock.source(), ClockSource::Internal);
    }
}
