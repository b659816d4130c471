pub mod calibration;
pub mod gnss;
pub mod mlx90632;
pub mod serial_console;

pub use calibration::{CalibrationRangeWarning, Coefficients, RawSample};
pub use gnss::{GnssError, GnssReceiver, GnssStats};
pub use mlx90632::{Measurement, Mlx90632, MlxError, Status};
pub use serial_console::{Level, SerialConsole};
