//! One run of a pattern generator.
//!
//! A [`Session`] borrows the whole [`Panel`] for the lifetime of a run and
//! builds the per-run components from it: the tempo [`Clock`] on knob 1
//! (external line on the digital input, source picked by the switch), a
//! [`DebouncedInput`] per button and the [`Scheduler`] over all outputs.
//!
//! # Control flow
//!
//! 1. Sweep all outputs off and let the generator register button handlers.
//! 2. Loop:
//!    - **step**: the generator computes and writes this beat's outputs.
//!    - **wait**: `clock.wait()` suspends until the next beat. Every wake-up
//!      retires expired pulses and samples both buttons, dispatching presses
//!      to the generator's handlers.
//! 3. A long press on either button while the other is held ends the run.
//!    In-flight pulses are discarded and every output is driven off before
//!    the panel and generator are handed back.

use core::ops::ControlFlow;

use crate::clock::{Clock, ClockConfig};
use crate::debounce::{DebounceConfig, DebouncedInput, Press};
use crate::error::ConfigError;
use crate::io::{Panel, Platform};
use crate::scheduler::{Scheduler, SchedulerConfig};

/// Scheduler over outputs borrowed from a [`Panel`].
pub type PanelScheduler<'p, P> = Scheduler<
    &'p mut <P as Platform>::Gate,
    &'p mut <P as Platform>::Cv,
    &'p <P as Platform>::Time,
    &'p mut <P as Platform>::Delay,
>;

/// Clock over inputs borrowed from a [`Panel`].
pub type PanelClock<'p, P> = Clock<&'p mut <P as Platform>::Analog, &'p mut <P as Platform>::Digital>;

/// Everything a generator may touch during one step.
pub struct Io<'a, 'p, P: Platform> {
    pub sched: &'a mut PanelScheduler<'p, P>,
    pub clock: &'a mut PanelClock<'p, P>,
    pub knob_2: &'a mut P::Analog,
    pub analog_in: &'a mut P::Analog,
}

/// The two front-panel buttons, dispatching to a context of type `C`.
pub struct Buttons<B, C> {
    pub button_1: DebouncedInput<B, C>,
    pub button_2: DebouncedInput<B, C>,
}

/// A selectable musical script.
pub trait PatternGenerator<P: Platform>: Sized {
    fn name(&self) -> &'static str;

    /// Register button handlers. Called once at the start of each run.
    fn setup(&mut self, _buttons: &mut Buttons<&mut P::Button, Self>) {}

    /// Compute and emit one beat. Must not block; pulses go through
    /// `io.sched.trigger()`.
    fn step(&mut self, io: &mut Io<'_, '_, P>);
}

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionConfig {
    pub clock: ClockConfig,
    pub button: DebounceConfig,
    pub scheduler: SchedulerConfig,
    /// Let the presence switch select the clock source. Default: false, the
    /// knob-driven internal clock. Enable only when an external clock is
    /// patched, since an unpatched switch input may read as asserted.
    pub follow_switch: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            button: DebounceConfig::default(),
            scheduler: SchedulerConfig::default(),
            follow_switch: false,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clock.validate()?;
        if self.scheduler.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}

pub struct Session<P: Platform, G> {
    panel: Panel<P>,
    generator: G,
    config: SessionConfig,
}

impl<P, G> Session<P, G>
where
    P: Platform,
    G: PatternGenerator<P>,
{
    pub fn new(panel: Panel<P>, generator: G, config: SessionConfig) -> Self {
        Self {
            panel,
            generator,
            config,
        }
    }

    /// Run until the reset gesture, then return the panel and generator.
    ///
    /// A configuration error is reported before any output is touched and
    /// consumes the panel.
    pub async fn run(self) -> Result<(Panel<P>, G), ConfigError> {
        let Session {
            mut panel,
            mut generator,
            config,
        } = self;

        if let Err(e) = config.validate() {
            #[cfg(feature = "defmt")]
            defmt::error!("session config rejected: {}", e);
            return Err(e);
        }

        {
            let Panel {
                knob_1,
                knob_2,
                analog_in,
                button_1,
                button_2,
                digital_in,
                switch,
                gates,
                cvs,
                time,
                delay,
            } = &mut panel;

            let mut sched = Scheduler::new(gates.each_mut(), cvs.each_mut(), &*time, delay, config.scheduler)?;
            let mut clock = Clock::new(knob_1, config.clock)?.with_external(digital_in);
            if config.follow_switch {
                clock = clock.with_switch(switch);
            }
            let mut buttons = Buttons {
                button_1: DebouncedInput::new(button_1, config.button),
                button_2: DebouncedInput::new(button_2, config.button),
            };

            generator.setup(&mut buttons);

            #[cfg(feature = "defmt")]
            defmt::info!("session start: {}", generator.name());

            loop {
                generator.step(&mut Io {
                    sched: &mut sched,
                    clock: &mut clock,
                    knob_2: &mut *knob_2,
                    analog_in: &mut *analog_in,
                });

                let mut hook = |now_ms: u64| poll_buttons(&mut buttons, &mut generator, now_ms);
                if clock.wait(&mut sched, &mut hook).await.is_break() {
                    break;
                }
            }

            sched.reset();

            #[cfg(feature = "defmt")]
            defmt::info!("session end: {}", generator.name());
        }

        Ok((panel, generator))
    }
}

/// Sample both buttons. Breaks on the reset gesture, otherwise dispatches
/// classified presses to `ctx`.
fn poll_buttons<B, C>(buttons: &mut Buttons<B, C>, ctx: &mut C, now_ms: u64) -> ControlFlow<()>
where
    B: embedded_hal::digital::InputPin,
{
    let press_1 = buttons.button_1.update(now_ms);
    let press_2 = buttons.button_2.update(now_ms);

    let reset = (press_1 == Some(Press::Long) && buttons.button_2.is_pressed())
        || (press_2 == Some(Press::Long) && buttons.button_1.is_pressed());
    if reset {
        return ControlFlow::Break(());
    }

    if let Some(press) = press_1 {
        buttons.button_1.dispatch(press, ctx);
    }
    if let Some(press) = press_2 {
        buttons.button_2.dispatch(press, ctx);
    }
    ControlFlow::Continue(())
}
