//! Decoding of the address field (talker + message type)

/// Source constellation of a sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Talker {
    /// GP: GPS only
    Gps,
    /// GL: GLONASS only
    Glonass,
    /// GA: Galileo only
    Galileo,
    /// GB: BeiDou only
    Beidou,
    /// GI: NavIC only
    Navic,
    /// GQ: QZSS only
    Qzss,
    /// GN: multi-constellation
    MultiConstellation,
    /// P...: vendor specific sentence
    Proprietary,
    Unknown,
}

/// Sentence formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageType {
    /// Recommended minimum specific GNSS data
    Rmc,
    /// Global positioning system fix data
    Gga,
    /// Geographic position, latitude and longitude
    Gll,
    /// GNSS satellites in view
    Gsv,
    /// GNSS DOP and active satellites
    Gsa,
    /// Course over ground and ground speed
    Vtg,
    /// Receiver rejected a configuration command
    ConfigError,
    /// Receiver accepted a configuration command
    ConfigOk,
    Other,
}

/// Decoded first field of a sentence, e.g. `GPRMC`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address {
    pub talker: Talker,
    pub message: MessageType,
}

const CONFIG_OK: &str = "PQCFGNMEAMSGOK";
const CONFIG_ERROR: &str = "PQCFGNMEAMSGERROR";

impl Address {
    pub fn parse(field: &str) -> Self {
        if field.starts_with('P') {
            let message = match field {
                CONFIG_OK => MessageType::ConfigOk,
                CONFIG_ERROR => MessageType::ConfigError,
                _ => MessageType::Other,
            };
            return Self {
                talker: Talker::Proprietary,
                message,
            };
        }

        match (field.get(..2), field.get(2..)) {
            (Some(talker), Some(message)) => Self {
                talker: Talker::from_code(talker),
                message: MessageType::from_code(message),
            },
            _ => Self {
                talker: Talker::Unknown,
                message: MessageType::Other,
            },
        }
    }

    /// Configuration acknowledgement carried by the sentence, if any
    pub fn config_ack(&self) -> Option<bool> {
        match self.message {
            MessageType::ConfigOk => Some(true),
            MessageType::ConfigError => Some(false),
            _ => None,
        }
    }
}

impl Talker {
    pub fn from_code(code: &str) -> Self {
        match code {
            "GP" => Talker::Gps,
            "GL" => Talker::Glonass,
            "GA" => Talker::Galileo,
            "GB" => Talker::Beidou,
            "GI" => Talker::Navic,
            "GQ" => Talker::Qzss,
            "GN" => Talker::MultiConstellation,
            _ => Talker::Unknown,
        }
    }
}

impl MessageType {
    pub fn from_code(code: &str) -> Self {
        match code {
            "RMC" => MessageType::Rmc,
            "GGA" => MessageType::Gga,
            "GLL" => MessageType::Gll,
            "GSV" => MessageType::Gsv,
            "GSA" => MessageType::Gsa,
            "VTG" => MessageType::Vtg,
            _ => MessageType::Other,
        }
    }
}
