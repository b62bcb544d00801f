//! Front-panel feedback using the four gate LEDs.

use embassy_time::Timer;
use embedded_hal::digital::{OutputPin, PinState};

/// Largest value [`display_choice`] can show.
pub const MAX_DISPLAY_CHOICE: usize = 15;

/// Show `choice` as 4-bit binary on the gates, most significant bit on gate 1.
///
/// Values above [`MAX_DISPLAY_CHOICE`] are clamped.
pub fn display_choice<G: OutputPin>(gates: &mut [G; 4], choice: usize) {
    let choice = choice.min(MAX_DISPLAY_CHOICE);
    for (i, gate) in gates.iter_mut().enumerate() {
        let bit = (choice >> (3 - i)) & 1 == 1;
        let _ = gate.set_state(PinState::from(bit));
    }
}

pub fn gates_off<G: OutputPin>(gates: &mut [G; 4]) {
    for gate in gates.iter_mut() {
        let _ = gate.set_low();
    }
}

/// Snake the gate LEDs back and forth three times.
pub async fn loading_animation<G: OutputPin>(gates: &mut [G; 4]) {
    gates_off(gates);
    Timer::after_millis(500).await;
    for gate in gates.iter_mut() {
        blink(gate, 50).await;
    }
    for _ in 0..3 {
        for gate in gates.iter_mut().rev() {
            blink(gate, 50).await;
        }
    }
    Timer::after_millis(500).await;
}

async fn blink<G: OutputPin>(gate: &mut G, ms: u64) {
    let _ = gate.set_high();
    Timer::after_millis(ms).await;
    let _ = gate.set_low();
}
