//! Debounced press classification for buttons and switches.
//!
//! A [`DebouncedInput`] is sampled forward in time by calling
//! [`update()`](DebouncedInput::update) (or [`poll()`](DebouncedInput::poll))
//! with the current time. Each physical press yields exactly one
//! [`Press::Short`] or [`Press::Long`], never both.
//!
//! ```text
//!            rising edge, gate open
//!   ┌──────┐ ─────────────────────▶ ┌───────┐  released < threshold
//!   │ Idle │                        │ Armed │ ─────────────────────▶ Short
//!   └──────┘ ◀──────────────────────└───────┘
//!      ▲        released                │ held ≥ threshold
//!      │                                ▼
//!      │     released             ┌──────────┐
//!      └───────────────────────── │ Latched  │ ◀── Long fires here
//!                                 └──────────┘
//! ```
//!
//! The debounce gate is re-armed on every accepted transition: a rising edge
//! is ignored unless more than `debounce_window_ms` have passed since the
//! last one.

use embedded_hal::digital::InputPin;

use crate::io::Polarity;

/// Press handler. Receives the context passed to
/// [`poll()`](DebouncedInput::poll), normally the running pattern generator.
///
/// Non-capturing closures coerce to this type.
pub type Handler<C> = fn(&mut C);

/// Classified press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Press {
    Short,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PressState {
    Idle,
    /// Edge accepted at `since`; waiting for release or the long threshold.
    Armed { since: u64 },
    /// Long press already reported; waiting for release.
    Latched,
}

/// Timing and polarity of a [`DebouncedInput`].
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DebounceConfig {
    /// Minimum spacing between accepted transitions. Default: 500.
    pub debounce_window_ms: u64,
    /// Hold time after which a press is long. Default: 500.
    pub long_press_threshold_ms: u64,
    /// Level that counts as pressed. Default: active-low.
    pub polarity: Polarity,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 500,
            long_press_threshold_ms: 500,
            polarity: Polarity::ActiveLow,
        }
    }
}

/// One physical button with short/long press classification.
pub struct DebouncedInput<B, C = ()> {
    pin: B,
    config: DebounceConfig,
    pressed: bool,
    last_event_ms: Option<u64>,
    state: PressState,
    on_short: Option<Handler<C>>,
    on_long: Option<Handler<C>>,
}

impl<B, C> DebouncedInput<B, C>
where
    B: InputPin,
{
    /// Wrap `pin`, taking its current level as the starting point.
    ///
    /// A button already held at construction does not produce an edge; it
    /// must be released and pressed again.
    pub fn new(mut pin: B, config: DebounceConfig) -> Self {
        let pressed = config.polarity.is_active(&mut pin);
        Self {
            pin,
            config,
            pressed,
            last_event_ms: None,
            state: PressState::Idle,
            on_short: None,
            on_long: None,
        }
    }

    // ── Handlers ─────────────────────────────────────────────────────

    /// Register the short-press handler, replacing any previous one.
    pub fn on_short(&mut self, handler: Handler<C>) {
        self.on_short = Some(handler);
    }

    /// Register the long-press handler, replacing any previous one.
    pub fn on_long(&mut self, handler: Handler<C>) {
        self.on_long = Some(handler);
    }

    pub fn clear_handlers(&mut self) {
        self.on_short = None;
        self.on_long = None;
    }

    // ── Sampling ─────────────────────────────────────────────────────

    /// Sample the pin at time `now_ms` and advance the state machine.
    ///
    /// Returns the press classified by this sample, if any. Handlers are not
    /// invoked; see [`poll()`](Self::poll).
    pub fn update(&mut self, now_ms: u64) -> Option<Press> {
        let was_pressed = self.pressed;
        self.pressed = self.config.polarity.is_active(&mut self.pin);

        match self.state {
            PressState::Idle => {
                if self.pressed && !was_pressed && self.gate_open(now_ms) {
                    self.state = PressState::Armed { since: now_ms };
                    self.last_event_ms = Some(now_ms);
                }
                None
            }
            PressState::Armed { since } => {
                if !self.pressed {
                    self.state = PressState::Idle;
                    self.last_event_ms = Some(now_ms);
                    Some(Press::Short)
                } else if now_ms.saturating_sub(since) >= self.config.long_press_threshold_ms {
                    self.state = PressState::Latched;
                    self.last_event_ms = Some(now_ms);
                    Some(Press::Long)
                } else {
                    None
                }
            }
            PressState::Latched => {
                if !self.pressed {
                    self.state = PressState::Idle;
                    self.last_event_ms = Some(now_ms);
                }
                None
            }
        }
    }

    /// [`update()`](Self::update), then invoke the matching handler with `ctx`.
    pub fn poll(&mut self, now_ms: u64, ctx: &mut C) -> Option<Press> {
        let press = self.update(now_ms);
        if let Some(press) = press {
            self.dispatch(press, ctx);
        }
        press
    }

    /// Invoke the handler registered for `press`, if any.
    pub fn dispatch(&self, press: Press, ctx: &mut C) {
        let handler = match press {
            Press::Short => self.on_short,
            Press::Long => self.on_long,
        };
        if let Some(handler) = handler {
            handler(ctx);
        }
    }

    fn gate_open(&self, now_ms: u64) -> bool {
        self.last_event_ms
            .map_or(true, |last| now_ms.saturating_sub(last) > self.config.debounce_window_ms)
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// Level seen by the most recent sample.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn state(&self) -> PressState {
        self.state
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Give the pin back, dropping any registered handlers.
    pub fn into_inner(self) -> B {
        self.pin
    }
}
