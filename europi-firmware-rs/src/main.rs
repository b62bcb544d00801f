//! europi-firmware
//!
//! Script selector firmware for the EuroPi (Raspberry Pi Pico, RP2040).
//!
//! 1. Boot plays a snake animation on the gate LEDs.
//! 2. Knob 1 picks a script; the choice is shown in binary on the gates.
//! 3. Button 1 starts the selected script in a `Session`.
//! 4. Holding both buttons ends the script and returns to the menu.

#![no_std]
#![no_main]

mod board;
mod ui;

use core::cell::RefCell;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{self, Adc, Channel};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::pwm::{self, Pwm, PwmOutput};
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Delay, Timer};
use europi_core::time::EmbassyTime;
use europi_core::{AnalogIn, ClockDivider, Panel, Session, SessionConfig};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use board::{AdcInput, EuroPi, SharedAdc};

// ---------------------------------------------------------------------------
// Static storage
// ---------------------------------------------------------------------------

/// The single ADC, shared by both knobs and the analog input jack.
static ADC: StaticCell<SharedAdc> = StaticCell::new();

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// PWM wrap value for the CV outputs (about 61 kHz at 125 MHz).
const CV_PWM_TOP: u16 = 2047;

/// Menu polling period.
const MENU_POLL_MS: u64 = 100;

/// Scripts selectable from the menu, in knob order.
#[derive(Clone, Copy, Format)]
enum Script {
    ClockDivider,
}

impl Script {
    const ALL: [Script; 1] = [Script::ClockDivider];

    async fn run(self, panel: Panel<EuroPi>) -> Panel<EuroPi> {
        let result = match self {
            Script::ClockDivider => {
                Session::new(panel, ClockDivider::new(), SessionConfig::default())
                    .run()
                    .await
                    .map(|(panel, _)| panel)
            }
        };
        match result {
            Ok(panel) => panel,
            Err(e) => defmt::panic!("session config rejected: {}", e),
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    info!("europi-firmware starting");

    // ── Pin assignments ─────────────────────────────────────────────────────────
    // knob 1      → GP28 (ADC2)    knob 2   → GP27 (ADC1)
    // analog in   → GP26 (ADC0)    digital in → GP0, switch → GP1
    // button 1    → GP15           button 2 → GP18   active-low, pull-up
    // cv 1..4     → GP14, GP11, GP10, GP7  (PWM 7A, 5B, 5A, 3B)
    // gate 1..4   → GP21, GP22, GP19, GP20
    // SMPS mode   → GP23 high: PWM mode, quieter ADC readings
    // ───────────────────────────────────────────────────────────────────────────

    let _smps_mode = Output::new(p.PIN_23, Level::High);

    let adc = ADC.init(Mutex::new(RefCell::new(Adc::new_blocking(
        p.ADC,
        adc::Config::default(),
    ))));
    let knob_1 = AdcInput::new(adc, Channel::new_pin(p.PIN_28, Pull::None));
    let knob_2 = AdcInput::new(adc, Channel::new_pin(p.PIN_27, Pull::None));
    let analog_in = AdcInput::new(adc, Channel::new_pin(p.PIN_26, Pull::None));

    let mut pwm_config = pwm::Config::default();
    pwm_config.top = CV_PWM_TOP;
    let (cv_1, _) = Pwm::new_output_a(p.PWM_SLICE7, p.PIN_14, pwm_config.clone()).split();
    let (cv_3, cv_2) =
        Pwm::new_output_ab(p.PWM_SLICE5, p.PIN_10, p.PIN_11, pwm_config.clone()).split();
    let (_, cv_4) = Pwm::new_output_b(p.PWM_SLICE3, p.PIN_7, pwm_config).split();
    let cvs: [PwmOutput<'static>; 4] = [unwrap!(cv_1), unwrap!(cv_2), unwrap!(cv_3), unwrap!(cv_4)];

    let mut panel: Panel<EuroPi> = Panel {
        knob_1,
        knob_2,
        analog_in,
        button_1: Input::new(p.PIN_15, Pull::Up),
        button_2: Input::new(p.PIN_18, Pull::Up),
        digital_in: Input::new(p.PIN_0, Pull::Down),
        switch: Input::new(p.PIN_1, Pull::Up),
        gates: [
            Output::new(p.PIN_21, Level::Low),
            Output::new(p.PIN_22, Level::Low),
            Output::new(p.PIN_19, Level::Low),
            Output::new(p.PIN_20, Level::Low),
        ],
        cvs,
        time: EmbassyTime,
        delay: Delay,
    };

    ui::loading_animation(&mut panel.gates).await;

    // ── Script selection ────────────────────────────────────────────────────────

    loop {
        let choice = panel.knob_1.choice(Script::ALL.len());
        let script = Script::ALL[choice];
        ui::display_choice(&mut panel.gates, choice);

        if panel.button_1.is_low() {
            info!("starting script {}: {}", choice, script);
            ui::gates_off(&mut panel.gates);
            Timer::after_millis(500).await;

            panel = script.run(panel).await;

            info!("script {} ended", script);
            ui::loading_animation(&mut panel.gates).await;
            // Both buttons are still held from the reset gesture.
            while panel.button_1.is_low() {
                Timer::after_millis(MENU_POLL_MS).await;
            }
        }

        Timer::after_millis(MENU_POLL_MS).await;
    }
}
