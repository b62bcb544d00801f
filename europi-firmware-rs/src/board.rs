//! EuroPi hardware bindings for the RP2040.
//!
//! The three analog sources (two knobs and the CV input jack) share the one
//! ADC peripheral, so each [`AdcInput`] holds a reference to a shared
//! blocking-mutex guarded [`Adc`] plus its own [`Channel`].

use core::cell::RefCell;

use defmt::warn;
use embassy_rp::adc::{self, Adc, Channel};
use embassy_rp::gpio::{Input, Output};
use embassy_rp::pwm::PwmOutput;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Delay;
use europi_core::time::EmbassyTime;
use europi_core::{AnalogIn, Platform};

/// The ADC peripheral, shared between all analog inputs.
pub type SharedAdc = Mutex<CriticalSectionRawMutex, RefCell<Adc<'static, adc::Blocking>>>;

/// Marker type selecting the concrete EuroPi peripheral types.
pub struct EuroPi;

impl Platform for EuroPi {
    type Analog = AdcInput;
    type Button = Input<'static>;
    type Digital = Input<'static>;
    type Gate = Output<'static>;
    type Cv = PwmOutput<'static>;
    type Time = EmbassyTime;
    type Delay = Delay;
}

/// One ADC channel, reporting readings on the full 16-bit scale.
pub struct AdcInput {
    adc: &'static SharedAdc,
    channel: Channel<'static>,
    last: u16,
}

impl AdcInput {
    pub fn new(adc: &'static SharedAdc, channel: Channel<'static>) -> Self {
        Self {
            adc,
            channel,
            last: 0,
        }
    }
}

impl AnalogIn for AdcInput {
    /// A failed conversion repeats the previous reading.
    fn read_u16(&mut self) -> u16 {
        let channel = &mut self.channel;
        match self.adc.lock(|adc| adc.borrow_mut().blocking_read(channel)) {
            Ok(raw) => self.last = widen_12_bit(raw),
            Err(_) => warn!("ADC read failed, holding {}", self.last),
        }
        self.last
    }
}

/// Stretch a 12-bit conversion onto `[0, 65535]` so full scale maps to full
/// scale.
fn widen_12_bit(raw: u16) -> u16 {
    let raw = raw & 0x0FFF;
    (raw << 4) | (raw >> 8)
}
