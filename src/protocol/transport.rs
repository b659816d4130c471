//! Transport layer: LF-terminated lines over a byte serial port

use embedded_hal::serial::Read;
use heapless::Vec;

use crate::config::LINE_BUFFER_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError<E> {
    /// The serial port reported an error
    Serial(E),
    /// No LF within the line buffer; the partial line was discarded
    BufferOverflow,
}

/// Accumulates bytes from a serial port until a line feed
pub struct LineReader<S> {
    serial: S,
    buffer: Vec<u8, LINE_BUFFER_SIZE>,
    complete: bool,
}

impl<S, E> LineReader<S>
where
    S: Read<u8, Error = E>,
{
    pub fn new(serial: S) -> Self {
        Self {
            serial,
            buffer: Vec::new(),
            complete: false,
        }
    }

    /// Read whatever is pending and return the line once its LF arrived.
    pub fn poll(&mut self) -> nb::Result<&[u8], LineError<E>> {
        let len = self.fill()?;
        Ok(&self.buffer[..len])
    }

    /// Block until a full line is available.
    pub fn read_line(&mut self) -> Result<&[u8], LineError<E>> {
        let len = nb::block!(self.fill())?;
        Ok(&self.buffer[..len])
    }

    /// Drain the port into the buffer; yields the line length when complete.
    pub fn fill(&mut self) -> nb::Result<usize, LineError<E>> {
        if self.complete {
            self.buffer.clear();
            self.complete = false;
        }

        loop {
            let byte = self.serial.read().map_err(|e| e.map(LineError::Serial))?;

            if self.buffer.push(byte).is_err() {
                self.buffer.clear();
                return Err(nb::Error::Other(LineError::BufferOverflow));
            }

            if byte == b'\n' {
                self.complete = true;
                return Ok(self.buffer.len());
            }
        }
    }

    /// Last complete line, empty while a line is still being received
    pub fn line(&self) -> &[u8] {
        if self.complete {
            &self.buffer
        } else {
            &[]
        }
    }

    pub fn bytes_buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn release(self) -> S {
        self.serial
    }
}
