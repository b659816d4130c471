//! NMEA sentence framing, field splitting and checksum handling
//!
//! A sentence on the wire looks like `$GPGGA,123519,...,M,,*47\r\n`. The
//! checksum is the XOR of every byte strictly between `$` and `*`, written as
//! two hex digits after the `*`.

use heapless::Vec;

use super::{Address, ParseError, Result};
use crate::config::{NMEA_MAX_FIELDS, NMEA_MAX_FIELD_LEN};

const START: u8 = b'$';
const CHECKSUM_MARKER: u8 = b'*';
const SEPARATOR: u8 = b',';
const HEX_CHARS: [u8; 16] = *b"0123456789ABCDEF";

/// One framed sentence, borrowing its fields from the received line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence<'a> {
    fields: Vec<&'a [u8], NMEA_MAX_FIELDS>,
    claimed: u8,
    computed: u8,
}

impl<'a> Sentence<'a> {
    /// All fields in wire order as received; field 0 is the address
    /// (e.g. `GPRMC`)
    pub fn fields(&self) -> &[&'a [u8]] {
        &self.fields
    }

    pub fn raw_field(&self, index: usize) -> Option<&'a [u8]> {
        self.fields.get(index).copied()
    }

    /// Field as text; `None` when absent or when line noise left bytes
    /// outside printable ASCII in it.
    pub fn field(&self, index: usize) -> Option<&'a str> {
        let raw = self.raw_field(index)?;
        if !raw.iter().all(|b| (0x20..=0x7E).contains(b)) {
            return None;
        }
        core::str::from_utf8(raw).ok()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false: a framed sentence has at least one (possibly empty) field
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn address(&self) -> Address {
        Address::parse(self.field(0).unwrap_or(""))
    }

    /// Checksum written after the `*`
    pub fn claimed_checksum(&self) -> u8 {
        self.claimed
    }

    /// Checksum computed over the content
    pub fn computed_checksum(&self) -> u8 {
        self.computed
    }

    pub fn checksum_valid(&self) -> bool {
        self.claimed == self.computed
    }

    /// Strict variant for callers that must not use noisy lines
    pub fn verify(self) -> Result<Self> {
        if self.checksum_valid() {
            Ok(self)
        } else {
            Err(ParseError::ChecksumMismatch {
                claimed: self.claimed,
                computed: self.computed,
            })
        }
    }
}

/// XOR of all bytes in `content`
pub fn checksum(content: &[u8]) -> u8 {
    content.iter().fold(0, |sum, &byte| sum ^ byte)
}

/// Parse one line that holds at most one sentence.
///
/// Bytes before the last `$` preceding the first `*` are ignored, so line
/// noise and restarted sentences are tolerated. A checksum mismatch is not an
/// error here; it is reported through [`Sentence::checksum_valid`].
pub fn parse(line: &[u8]) -> Result<Sentence<'_>> {
    let (start, marker) = locate_frame(line)?;

    let digits = line
        .get(marker + 1..marker + 3)
        .ok_or(ParseError::FrameNotFound)?;
    let claimed = parse_hex_byte(digits).ok_or(ParseError::MalformedChecksum)?;

    let content = &line[start + 1..marker];

    // Corrupted bytes stay in their field and show up in the checksum
    let mut fields = Vec::new();
    for field in content.split(|&b| b == SEPARATOR) {
        if field.len() > NMEA_MAX_FIELD_LEN {
            return Err(ParseError::BufferOverflow);
        }
        fields.push(field).map_err(|_| ParseError::BufferOverflow)?;
    }

    Ok(Sentence {
        fields,
        claimed,
        computed: checksum(content),
    })
}

/// Write `$F0,F1,...*HH\r\n` into `buf` and return the used part.
pub fn encode<'b>(fields: &[&str], buf: &'b mut [u8]) -> Result<&'b [u8]> {
    if fields.len() > NMEA_MAX_FIELDS {
        return Err(ParseError::BufferOverflow);
    }

    let mut writer = SliceWriter { buf, len: 0 };
    let mut sum = 0u8;

    writer.push(START)?;
    for (i, field) in fields.iter().enumerate() {
        if field.len() > NMEA_MAX_FIELD_LEN {
            return Err(ParseError::BufferOverflow);
        }
        if i > 0 {
            writer.push(SEPARATOR)?;
            sum ^= SEPARATOR;
        }
        for &byte in field.as_bytes() {
            if !is_field_byte(byte) {
                return Err(ParseError::InvalidCharacter);
            }
            writer.push(byte)?;
            sum ^= byte;
        }
    }
    writer.push(CHECKSUM_MARKER)?;
    writer.push(HEX_CHARS[(sum >> 4) as usize])?;
    writer.push(HEX_CHARS[(sum & 0xF) as usize])?;
    writer.push(b'\r')?;
    writer.push(b'\n')?;

    let SliceWriter { buf, len } = writer;
    Ok(&buf[..len])
}

// Start is reset on every `$`; only a `*` seen after a start closes the frame.
fn locate_frame(line: &[u8]) -> Result<(usize, usize)> {
    let mut start = None;
    for (i, &byte) in line.iter().enumerate() {
        match byte {
            START => start = Some(i),
            CHECKSUM_MARKER => {
                if let Some(start) = start {
                    return Ok((start, i));
                }
            }
            _ => {}
        }
    }
    Err(ParseError::FrameNotFound)
}

fn parse_hex_byte(digits: &[u8]) -> Option<u8> {
    let high = hex_value(*digits.first()?)?;
    let low = hex_value(*digits.get(1)?)?;
    Some(high << 4 | low)
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

fn is_field_byte(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte) && !matches!(byte, START | CHECKSUM_MARKER | SEPARATOR)
}

struct SliceWriter<'b> {
    buf: &'b mut [u8],
    len: usize,
}

impl SliceWriter<'_> {
    fn push(&mut self, byte: u8) -> Result<()> {
        let slot = self.buf.get_mut(self.len).ok_or(ParseError::BufferOverflow)?;
        *slot = byte;
        self.len += 1;
        Ok(())
    }
}
