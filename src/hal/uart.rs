use avr_device::atmega128a::{USART0, USART1};
use avr_device::interrupt::Mutex;
use core::cell::RefCell;
use core::convert::Infallible;
use embedded_hal::serial;

use crate::config::CPU_FREQ_HZ;

// Buffer size must be power of 2 for efficient masking
const BUFFER_SIZE: usize = 64;
const BUFFER_MASK: usize = BUFFER_SIZE - 1;

// UCSRnA / UCSRnB bits
const RXC: u8 = 1 << 7;
const UDRE: u8 = 1 << 5;
const DOR: u8 = 1 << 3;
const U2X: u8 = 1 << 1;
const RXCIE: u8 = 1 << 7;
const RXEN: u8 = 1 << 4;
const TXEN: u8 = 1 << 3;
// 8 data bits, no parity, 1 stop bit
const FRAME_8N1: u8 = 0x06;

pub struct Buffer {
    data: [u8; BUFFER_SIZE],
    write_idx: usize,
    read_idx: usize,
    overrun: bool,
}

impl Buffer {
    const fn new() -> Self {
        Self {
            data: [0; BUFFER_SIZE],
            write_idx: 0,
            read_idx: 0,
            overrun: false,
        }
    }

    fn write(&mut self, byte: u8) {
        let next_write = (self.write_idx + 1) & BUFFER_MASK;
        if next_write != self.read_idx {
            self.data[self.write_idx] = byte;
            self.write_idx = next_write;
        } else {
            self.overrun = true;
        }
    }

    fn read(&mut self) -> Option<u8> {
        if self.read_idx != self.write_idx {
            let byte = self.data[self.read_idx];
            self.read_idx = (self.read_idx + 1) & BUFFER_MASK;
            Some(byte)
        } else {
            None
        }
    }
}

// Filled by the receive interrupts
static RX0_BUFFER: Mutex<RefCell<Buffer>> = Mutex::new(RefCell::new(Buffer::new()));
static RX1_BUFFER: Mutex<RefCell<Buffer>> = Mutex::new(RefCell::new(Buffer::new()));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartError {
    /// Bytes were lost because the receive buffer was full
    Overrun,
}

/// Interrupt-driven receiver, polled transmitter
pub struct Uart<USART> {
    usart: USART,
}

// Double speed mode divisor, rounded to nearest
const fn ubrr(baud: u32) -> u16 {
    ((CPU_FREQ_HZ + baud * 4) / (baud * 8) - 1) as u16
}

macro_rules! impl_uart {
    ($USART:ident, $RX:ident, $vector:ident, $udr:ident, $ucsra:ident, $ucsrb:ident,
     $ucsrc:ident, $ubrrh:ident, $ubrrl:ident) => {
        impl Uart<$USART> {
            /// Configure 8N1 at `baud` and enable the receive interrupt
            pub fn new(usart: $USART, baud: u32) -> Self {
                let [hi, lo] = ubrr(baud).to_be_bytes();
                usart.$ubrrh.write(|w| unsafe { w.bits(hi) });
                usart.$ubrrl.write(|w| unsafe { w.bits(lo) });
                usart.$ucsra.write(|w| unsafe { w.bits(U2X) });
                usart.$ucsrc.write(|w| unsafe { w.bits(FRAME_8N1) });
                usart.$ucsrb.write(|w| unsafe { w.bits(RXEN | TXEN | RXCIE) });
                Self { usart }
            }

            pub fn release(self) -> $USART {
                self.usart.$ucsrb.write(|w| unsafe { w.bits(0) });
                self.usart
            }

            pub fn write_byte(&mut self, byte: u8) {
                while self.usart.$ucsra.read().bits() & UDRE == 0 {}
                self.usart.$udr.write(|w| unsafe { w.bits(byte) });
            }

            pub fn read_byte(&mut self) -> Option<u8> {
                avr_device::interrupt::free(|cs| $RX.borrow(cs).borrow_mut().read())
            }
        }

        impl serial::Read<u8> for Uart<$USART> {
            type Error = UartError;

            fn read(&mut self) -> nb::Result<u8, UartError> {
                avr_device::interrupt::free(|cs| {
                    let mut buffer = $RX.borrow(cs).borrow_mut();
                    if core::mem::take(&mut buffer.overrun) {
                        return Err(nb::Error::Other(UartError::Overrun));
                    }
                    buffer.read().ok_or(nb::Error::WouldBlock)
                })
            }
        }

        impl serial::Write<u8> for Uart<$USART> {
            type Error = Infallible;

            fn write(&mut self, byte: u8) -> nb::Result<(), Infallible> {
                if self.usart.$ucsra.read().bits() & UDRE == 0 {
                    return Err(nb::Error::WouldBlock);
                }
                self.usart.$udr.write(|w| unsafe { w.bits(byte) });
                Ok(())
            }

            fn flush(&mut self) -> nb::Result<(), Infallible> {
                if self.usart.$ucsra.read().bits() & UDRE == 0 {
                    Err(nb::Error::WouldBlock)
                } else {
                    Ok(())
                }
            }
        }

        impl ufmt::uWrite for Uart<$USART> {
            type Error = Infallible;

            fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
                for byte in s.bytes() {
                    self.write_byte(byte);
                }
                Ok(())
            }
        }

        #[avr_device::interrupt(atmega128a)]
        fn $vector() {
            // SAFETY: reading UDR only pops the receive FIFO of this USART
            let usart = unsafe { &*$USART::ptr() };
            if usart.$ucsra.read().bits() & (RXC | DOR) == 0 {
                return;
            }
            let overrun = usart.$ucsra.read().bits() & DOR != 0;
            let byte = usart.$udr.read().bits();
            avr_device::interrupt::free(|cs| {
                let mut buffer = $RX.borrow(cs).borrow_mut();
                buffer.overrun |= overrun;
                buffer.write(byte);
            });
        }
    };
}

impl_uart!(USART0, RX0_BUFFER, USART0_RX, udr0, ucsr0a, ucsr0b, ucsr0c, ubrr0h, ubrr0l);
impl_uart!(USART1, RX1_BUFFER, USART1_RX, udr1, ucsr1a, ucsr1b, ucsr1c, ubrr1h, ubrr1l);
