//! Host-side fakes for pins, knobs and time.
//!
//! Every fake is a cheap handle around shared cells: clone it, move one copy
//! into the component under test and keep the other to drive or observe it.

use core::convert::Infallible;
use core::future::Future;
use core::pin::pin;
use core::task::{Context, Poll, Waker};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType as DigitalErrorType, InputPin, OutputPin};
use embedded_hal::pwm::{ErrorType as PwmErrorType, SetDutyCycle};
use embedded_hal_async::delay::DelayNs;

use crate::io::{AnalogIn, Panel, Platform};
use crate::time::Monotonic;

// ── Time ─────────────────────────────────────────────────────────────────

/// Shared virtual clock, advanced only by [`FakeDelay`] or by hand.
#[derive(Clone, Default)]
pub struct TestTime {
    ns: Rc<Cell<u64>>,
}

impl TestTime {
    pub fn advance_ms(&self, ms: u64) {
        self.ns.set(self.ns.get() + ms * 1_000_000);
    }
}

impl Monotonic for TestTime {
    fn now_ms(&self) -> u64 {
        self.ns.get() / 1_000_000
    }
}

/// Delay that completes immediately after moving [`TestTime`] forward.
#[derive(Clone)]
pub struct FakeDelay {
    time: TestTime,
}

impl FakeDelay {
    pub fn new(time: &TestTime) -> Self {
        Self { time: time.clone() }
    }
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.time.ns.set(self.time.ns.get() + ns as u64);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.time.advance_ms(ms as u64);
    }
}

// ── Inputs ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct FakeKnob(Rc<Cell<u16>>);

impl FakeKnob {
    pub fn new(value: u16) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    pub fn set(&self, value: u16) {
        self.0.set(value);
    }
}

impl AnalogIn for FakeKnob {
    fn read_u16(&mut self) -> u16 {
        self.0.get()
    }
}

/// Digital input whose level is set by the test.
#[derive(Clone)]
pub struct FakePin(Rc<Cell<bool>>);

impl FakePin {
    pub fn new(high: bool) -> Self {
        Self(Rc::new(Cell::new(high)))
    }

    pub fn set(&self, high: bool) {
        self.0.set(high);
    }
}

impl DigitalErrorType for FakePin {
    type Error = Infallible;
}

impl InputPin for FakePin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

/// Digital input that replays a fixed sequence of levels, one per read,
/// then holds `rest` forever.
#[derive(Clone)]
pub struct ScriptedPin {
    levels: Rc<RefCell<VecDeque<bool>>>,
    rest: bool,
}

impl ScriptedPin {
    pub fn new(levels: &[bool], rest: bool) -> Self {
        Self {
            levels: Rc::new(RefCell::new(levels.iter().copied().collect())),
            rest,
        }
    }

    fn next(&mut self) -> bool {
        self.levels.borrow_mut().pop_front().unwrap_or(self.rest)
    }
}

impl DigitalErrorType for ScriptedPin {
    type Error = Infallible;
}

impl InputPin for ScriptedPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.next())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.next())
    }
}

/// Active-low button held down during the given `[from, until)` windows of
/// virtual time.
#[derive(Clone)]
pub struct HeldButton {
    time: TestTime,
    holds: Rc<RefCell<Vec<(u64, u64)>>>,
}

impl HeldButton {
    pub fn new(time: &TestTime) -> Self {
        Self {
            time: time.clone(),
            holds: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn hold(&self, from_ms: u64, until_ms: u64) {
        self.holds.borrow_mut().push((from_ms, until_ms));
    }

    fn pressed(&self) -> bool {
        let now = self.time.now_ms();
        self.holds.borrow().iter().any(|&(from, until)| now >= from && now < until)
    }
}

impl DigitalErrorType for HeldButton {
    type Error = Infallible;
}

impl InputPin for HeldButton {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.pressed())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.pressed())
    }
}

// ── Outputs ──────────────────────────────────────────────────────────────

/// Gate output recording its level and how many times it went high.
#[derive(Clone, Default)]
pub struct FakeGate {
    level: Rc<Cell<bool>>,
    rises: Rc<Cell<u32>>,
}

impl FakeGate {
    pub fn is_high(&self) -> bool {
        self.level.get()
    }

    pub fn rises(&self) -> u32 {
        self.rises.get()
    }
}

impl DigitalErrorType for FakeGate {
    type Error = Infallible;
}

impl OutputPin for FakeGate {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.level.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        if !self.level.get() {
            self.rises.set(self.rises.get() + 1);
        }
        self.level.set(true);
        Ok(())
    }
}

/// PWM channel with a 0..=1000 duty range.
#[derive(Clone, Default)]
pub struct FakeCv(Rc<Cell<u16>>);

impl FakeCv {
    pub const MAX_DUTY: u16 = 1000;

    pub fn duty(&self) -> u16 {
        self.0.get()
    }
}

impl PwmErrorType for FakeCv {
    type Error = Infallible;
}

impl SetDutyCycle for FakeCv {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.0.set(duty);
        Ok(())
    }
}

// ── Platform ─────────────────────────────────────────────────────────────

pub struct TestPlatform;

impl Platform for TestPlatform {
    type Analog = FakeKnob;
    type Button = HeldButton;
    type Digital = FakePin;
    type Gate = FakeGate;
    type Cv = FakeCv;
    type Time = TestTime;
    type Delay = FakeDelay;
}

/// A [`Panel`] of fakes plus the handles needed to drive and observe it.
pub struct TestRig {
    pub time: TestTime,
    pub knob_1: FakeKnob,
    pub knob_2: FakeKnob,
    pub button_1: HeldButton,
    pub button_2: HeldButton,
    pub digital_in: FakePin,
    pub switch: FakePin,
    pub gates: [FakeGate; 4],
    pub cvs: [FakeCv; 4],
}

impl TestRig {
    pub fn new() -> Self {
        let time = TestTime::default();
        Self {
            knob_1: FakeKnob::new(u16::MAX / 2 + 1),
            knob_2: FakeKnob::new(0),
            button_1: HeldButton::new(&time),
            button_2: HeldButton::new(&time),
            digital_in: FakePin::new(false),
            switch: FakePin::new(false),
            gates: Default::default(),
            cvs: Default::default(),
            time,
        }
    }

    pub fn panel(&self) -> Panel<TestPlatform> {
        Panel {
            knob_1: self.knob_1.clone(),
            knob_2: self.knob_2.clone(),
            analog_in: FakeKnob::new(0),
            button_1: self.button_1.clone(),
            button_2: self.button_2.clone(),
            digital_in: self.digital_in.clone(),
            switch: self.switch.clone(),
            gates: self.gates.clone(),
            cvs: self.cvs.clone(),
            time: self.time.clone(),
            delay: FakeDelay::new(&self.time),
        }
    }
}

// ── Futures ──────────────────────────────────────────────────────────────

/// Poll `fut` up to `polls` times; returns `true` if it never completed.
pub fn stays_pending<F: Future>(fut: F, polls: usize) -> bool {
    let mut fut = pin!(fut);
    let mut cx = Context::from_waker(Waker::noop());
    for _ in 0..polls {
        if let Poll::Ready(_) = fut.as_mut().poll(&mut cx) {
            return false;
        }
    }
    true
}

// ── Scheduler ────────────────────────────────────────────────────────────

pub type TestScheduler = crate::scheduler::Scheduler<FakeGate, FakeCv, TestTime, FakeDelay>;

/// Scheduler over fresh fake outputs with the default configuration.
pub fn test_scheduler(time: &TestTime) -> TestScheduler {
    crate::scheduler::Scheduler::new(
        Default::default(),
        Default::default(),
        time.clone(),
        FakeDelay::new(time),
        Default::default(),
    )
    .unwrap()
}
