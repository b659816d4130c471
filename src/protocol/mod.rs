//! NMEA 0183 protocol stack implementation

pub mod address;
pub mod nmea;
pub mod transport;

pub use address::{Address, MessageType, Talker};
pub use nmea::{checksum, encode, parse, Sentence};
pub use transport::{LineError, LineReader};

/// Reasons a received line is not usable as an NMEA sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// No `$ ... *HH` frame in the line, or the checksum digits are cut off
    FrameNotFound,
    /// Too many fields, a field too long, or an output buffer too small
    BufferOverflow,
    /// The claimed checksum differs from the one computed over the content
    ChecksumMismatch { claimed: u8, computed: u8 },
    /// The two characters after `*` are not hexadecimal digits
    MalformedChecksum,
    /// A field handed to the encoder holds a delimiter or a non-printable byte
    InvalidCharacter,
}

pub type Result<T> = core::result::Result<T, ParseError>;

impl ParseError {
    /// Numeric error code, shared with the GNSS tooling on the host side
    pub fn code(&self) -> u8 {
        match self {
            ParseError::FrameNotFound => 179,
            ParseError::BufferOverflow => 168,
            ParseError::ChecksumMismatch { .. } => 172,
            ParseError::MalformedChecksum | ParseError::InvalidCharacter => 171,
        }
    }

    /// Fatal errors leave nothing usable in the line; a checksum mismatch
    /// still carries the fields.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ParseError::ChecksumMismatch { .. })
    }
}

impl ufmt::uDisplay for ParseError {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> core::result::Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        match self {
            ParseError::FrameNotFound => f.write_str("NMEA message was not found"),
            ParseError::BufferOverflow => f.write_str("buffer overflow"),
            ParseError::ChecksumMismatch { claimed, computed } => {
                ufmt::uwrite!(f, "checksum mismatch (claimed {}, computed {})", claimed, computed)
            }
            ParseError::MalformedChecksum => f.write_str("malformed checksum"),
            ParseError::InvalidCharacter => f.write_str("invalid character"),
        }
    }
}
