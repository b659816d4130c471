//! GNSS receiver on a serial port

use embedded_hal::serial::Read;

use crate::config::REJECT_BAD_CHECKSUM;
use crate::protocol::{self, LineError, LineReader, ParseError, Sentence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GnssError<E> {
    Line(LineError<E>),
    Parse(ParseError),
}

impl<E> From<ParseError> for GnssError<E> {
    fn from(error: ParseError) -> Self {
        GnssError::Parse(error)
    }
}

impl<E> ufmt::uDisplay for GnssError<E> {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        match self {
            GnssError::Line(LineError::Serial(_)) => f.write_str("serial read failed"),
            GnssError::Line(LineError::BufferOverflow) => f.write_str("line too long"),
            GnssError::Parse(e) => ufmt::uwrite!(f, "{}", e),
        }
    }
}

/// Receive counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GnssStats {
    /// Complete lines received
    pub lines: u32,
    /// Sentences handed to the caller
    pub sentences: u32,
    /// Sentences whose checksum did not match
    pub checksum_errors: u32,
    /// Lines that did not parse at all
    pub framing_errors: u32,
    /// Lines dropped for not fitting the line buffer
    pub overflows: u32,
}

pub struct GnssReceiver<S> {
    reader: LineReader<S>,
    stats: GnssStats,
}

impl<S, E> GnssReceiver<S>
where
    S: Read<u8, Error = E>,
{
    pub fn new(serial: S) -> Self {
        Self {
            reader: LineReader::new(serial),
            stats: GnssStats::default(),
        }
    }

    /// Non-blocking receive of the next sentence
    pub fn poll(&mut self) -> nb::Result<Sentence<'_>, GnssError<E>> {
        self.fill_line()?;
        self.decode().map_err(nb::Error::Other)
    }

    /// Block until the next line arrives and decode it
    pub fn read(&mut self) -> Result<Sentence<'_>, GnssError<E>> {
        nb::block!(self.fill_line())?;
        self.decode()
    }

    pub fn stats(&self) -> GnssStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = GnssStats::default();
    }

    pub fn release(self) -> S {
        self.reader.release()
    }

    fn fill_line(&mut self) -> nb::Result<(), GnssError<E>> {
        match self.reader.fill() {
            Ok(_) => {
                self.stats.lines = self.stats.lines.wrapping_add(1);
                Ok(())
            }
            Err(nb::Error::WouldBlock) => Err(nb::Error::WouldBlock),
            Err(nb::Error::Other(e)) => {
                if matches!(e, LineError::BufferOverflow) {
                    self.stats.overflows = self.stats.overflows.wrapping_add(1);
                }
                Err(nb::Error::Other(GnssError::Line(e)))
            }
        }
    }

    fn decode(&mut self) -> Result<Sentence<'_>, GnssError<E>> {
        accept(&mut self.stats, protocol::parse(self.reader.line())).map_err(GnssError::Parse)
    }
}

// Applies the checksum policy and updates the counters.
fn accept<'a>(
    stats: &mut GnssStats,
    parsed: protocol::Result<Sentence<'a>>,
) -> protocol::Result<Sentence<'a>> {
    let sentence = match parsed {
        Ok(sentence) => sentence,
        Err(e) => {
            stats.framing_errors = stats.framing_errors.wrapping_add(1);
            return Err(e);
        }
    };

    if !sentence.checksum_valid() {
        stats.checksum_errors = stats.checksum_errors.wrapping_add(1);
        if REJECT_BAD_CHECKSUM {
            return sentence.verify();
        }
    }

    stats.sentences = stats.sentences.wrapping_add(1);
    Ok(sentence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LINE_BUFFER_SIZE;
    use crate::protocol::MessageType;
    use embedded_hal_mock::serial::{Mock as SerialMock, Transaction as SerialTransaction};
    use embedded_hal_mock::MockError;
    use std::io::ErrorKind;

    const RMC: &[u8] =
        b"$GPRMC,083559.00,A,4717.11437,N,00833.91522,E,0.004,77.52,091202,,,A*57\r\n";

    #[test]
    fn receives_sentence() {
        let expectations = [SerialTransaction::read_many(RMC)];
        let mut gnss = GnssReceiver::new(SerialMock::new(&expectations));

        {
            let sentence = gnss.read().unwrap();
            assert!(sentence.checksum_valid());
            assert_eq!(sentence.address().message, MessageType::Rmc);
            assert_eq!(sentence.field(9), Some("091202"));
            assert_eq!(sentence.len(), 13);
        }

        assert_eq!(
            gnss.stats(),
            GnssStats {
                lines: 1,
                sentences: 1,
                ..GnssStats::default()
            }
        );

        gnss.release().done();
    }

    #[test]
    fn poll_waits_for_line_feed() {
        let expectations = [
            SerialTransaction::read_many(b"$PQCFGNMEAMSGOK"),
            SerialTransaction::read_error(nb::Error::WouldBlock),
            SerialTransaction::read_many(b"*19\r\n"),
        ];
        let mut gnss = GnssReceiver::new(SerialMock::new(&expectations));

        assert!(matches!(gnss.poll(), Err(nb::Error::WouldBlock)));
        assert_eq!(gnss.stats().lines, 0);

        let ack = gnss.poll().unwrap().address().config_ack();
        assert_eq!(ack, Some(true));
        assert_eq!(gnss.stats().lines, 1);

        gnss.release().done();
    }

    #[test]
    fn checksum_policy() {
        let expectations = [SerialTransaction::read_many(b"$X,Y,Z*5C\r\n")];
        let mut gnss = GnssReceiver::new(SerialMock::new(&expectations));

        match gnss.read() {
            Ok(sentence) => {
                assert!(!REJECT_BAD_CHECKSUM);
                assert!(!sentence.checksum_valid());
                assert_eq!(sentence.field(1), Some("Y"));
            }
            Err(e) => {
                assert!(REJECT_BAD_CHECKSUM);
                assert_eq!(
                    e,
                    GnssError::Parse(ParseError::ChecksumMismatch {
                        claimed: 0x5C,
                        computed: 0x5B,
                    })
                );
            }
        }
        assert_eq!(gnss.stats().checksum_errors, 1);

        gnss.release().done();
    }

    #[test]
    fn counts_framing_errors_and_overflows() {
        let noise = [b'x'; LINE_BUFFER_SIZE + 1];
        let expectations = [
            SerialTransaction::read_many(b"garbage\r\n"),
            SerialTransaction::read_many(&noise[..]),
            SerialTransaction::read_many(b"$X,Y,Z*5B\r\n"),
        ];
        let mut gnss = GnssReceiver::new(SerialMock::new(&expectations));

        assert_eq!(
            gnss.read().err(),
            Some(GnssError::Parse(ParseError::FrameNotFound))
        );
        assert_eq!(
            gnss.read().err(),
            Some(GnssError::Line(LineError::BufferOverflow))
        );
        assert!(gnss.read().unwrap().checksum_valid());

        assert_eq!(
            gnss.stats(),
            GnssStats {
                lines: 2,
                sentences: 1,
                checksum_errors: 0,
                framing_errors: 1,
                overflows: 1,
            }
        );

        gnss.reset_stats();
        assert_eq!(gnss.stats(), GnssStats::default());

        gnss.release().done();
    }

    #[test]
    fn line_noise_counts_as_checksum_error() {
        let expectations = [SerialTransaction::read_many(b"$X,\xD9,Z*5B\r\n")];
        let mut gnss = GnssReceiver::new(SerialMock::new(&expectations));

        let accepted = gnss.read().is_ok();
        assert_eq!(accepted, !REJECT_BAD_CHECKSUM);

        let stats = gnss.stats();
        assert_eq!(stats.checksum_errors, 1);
        assert_eq!(stats.framing_errors, 0);

        gnss.release().done();
    }

    #[test]
    fn serial_error_is_passed_on() {
        let expectations = [
            SerialTransaction::read_many(b"$X,"),
            SerialTransaction::read_error(nb::Error::Other(MockError::Io(ErrorKind::Other))),
            SerialTransaction::read_many(b"Y,Z*5B\r\n"),
        ];
        let mut gnss = GnssReceiver::new(SerialMock::new(&expectations));

        assert_eq!(
            gnss.read().err(),
            Some(GnssError::Line(LineError::Serial(MockError::Io(ErrorKind::Other))))
        );
        // Bytes received before the error are kept
        assert!(gnss.read().unwrap().checksum_valid());
        assert_eq!(gnss.stats().lines, 1);

        gnss.release().done();
    }

    #[test]
    fn counters_wrap_instead_of_overflowing() {
        let mut stats = GnssStats {
            sentences: u32::MAX,
            checksum_errors: u32::MAX,
            ..GnssStats::default()
        };

        assert!(accept(&mut stats, protocol::parse(b"$X,Y,Z*5B")).is_ok());
        assert_eq!(stats.sentences, 0);

        let _ = accept(&mut stats, protocol::parse(b"$X,Y,Z*00"));
        assert_eq!(stats.checksum_errors, 0);
    }
}
