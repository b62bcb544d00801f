//! Clock divider: four gate outputs at divisions of the beat.
//!
//! Gate 1 fires every beat by default, gates 2–4 every 2nd, 4th and 8th
//! beat. Button 2 cycles which gate is being edited; knob 2 then picks that
//! gate's division from [`DIVISION_CHOICES`]. A division only changes when
//! the knob actually moves to a different choice, so selecting a gate never
//! jumps it to wherever the knob happened to be resting.

use crate::io::{AnalogIn, Platform, GATE_COUNT};
use crate::session::{Buttons, Io, PatternGenerator};
use crate::trigger::DEFAULT_TRIGGER_MS;

/// Divisions selectable with knob 2.
pub const DIVISION_CHOICES: [u32; 10] = [1, 2, 3, 4, 5, 6, 7, 8, 12, 16];

const MAX_DIVISION: u32 = 16;

pub struct ClockDivider {
    divisions: [u32; GATE_COUNT],
    selected: Option<usize>,
    previous_choice: Option<usize>,
    counter: u32,
}

impl Default for ClockDivider {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockDivider {
    pub const fn new() -> Self {
        Self {
            divisions: [1, 2, 4, 8],
            selected: None,
            previous_choice: None,
            counter: 1,
        }
    }

    pub fn divisions(&self) -> [u32; GATE_COUNT] {
        self.divisions
    }

    /// Gate currently edited by knob 2, if any.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    fn select_next(&mut self) {
        self.selected = Some(self.selected.map_or(0, |gate| (gate + 1) % GATE_COUNT));
    }

    fn edit_division(&mut self, choice: usize) {
        match (self.previous_choice, self.selected) {
            (None, _) => self.previous_choice = Some(choice),
            (Some(previous), Some(gate)) if previous != choice => {
                self.divisions[gate] = DIVISION_CHOICES[choice];
                self.previous_choice = Some(choice);
            }
            _ => {}
        }
    }
}

impl<P: Platform> PatternGenerator<P> for ClockDivider {
    fn name(&self) -> &'static str {
        "clock divider"
    }

    fn setup(&mut self, buttons: &mut Buttons<&mut P::Button, Self>) {
        buttons.button_2.on_short(ClockDivider::select_next);
    }

    fn step(&mut self, io: &mut Io<'_, '_, P>) {
        for (gate, &division) in self.divisions.iter().enumerate() {
            if self.counter % division == 0 {
                // A full pulse queue is logged by the scheduler; skip the beat.
                let _ = io.sched.trigger(gate, DEFAULT_TRIGGER_MS);
            }
        }

        let choice = io.knob_2.choice(DIVISION_CHOICES.len());
        self.edit_division(choice);

        self.counter = (self.counter + 1) % MAX_DIVISION;
    }
}
