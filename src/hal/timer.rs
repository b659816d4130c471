use avr_device::atmega128a::TC0;
use embedded_hal::blocking::delay::DelayMs;

use crate::config::CPU_FREQ_HZ;

#[derive(Clone, Copy)]
pub enum Prescaler {
    Stop = 0,
    Direct = 1,
    Div8 = 2,
    Div32 = 3,
    Div64 = 4,
    Div128 = 5,
    Div256 = 6,
    Div1024 = 7,
}

const PRESCALER_MASK: u8 = 0x07;

// Timer0 ticks per millisecond at clk/64
const TICKS_PER_MS: u8 = (CPU_FREQ_HZ / 64 / 1000) as u8;

/// Busy-wait delay on Timer0
pub struct Delay {
    timer: TC0,
}

impl Delay {
    pub fn new(timer: TC0) -> Self {
        timer.tccr0.write(|w| unsafe { w.bits(0) });
        timer.tcnt0.write(|w| unsafe { w.bits(0) });
        Self { timer }
    }

    pub fn release(self) -> TC0 {
        self.timer
    }

    fn start(&mut self, prescaler: Prescaler) {
        self.timer.tccr0.modify(|r, w| unsafe {
            w.bits((r.bits() & !PRESCALER_MASK) | (prescaler as u8 & PRESCALER_MASK))
        });
    }

    fn stop(&mut self) {
        self.timer
            .tccr0
            .modify(|r, w| unsafe { w.bits(r.bits() & !PRESCALER_MASK) });
    }
}

impl DelayMs<u16> for Delay {
    fn delay_ms(&mut self, ms: u16) {
        // 16MHz/64 = 250kHz, 250 ticks = 1ms
        self.timer.tcnt0.write(|w| unsafe { w.bits(0) });
        self.start(Prescaler::Div64);

        for _ in 0..ms {
            while self.timer.tcnt0.read().bits() < TICKS_PER_MS {}
            self.timer.tcnt0.write(|w| unsafe { w.bits(0) });
        }

        self.stop();
    }
}

impl DelayMs<u8> for Delay {
    fn delay_ms(&mut self, ms: u8) {
        DelayMs::<u16>::delay_ms(self, u16::from(ms));
    }
}
