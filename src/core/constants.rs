//! Physical constants and system parameters

/// Speed of light in vacuum (m/s)
pub const SPEED_OF_LIGHT_VACUUM: f64 = 299_792_458.0;

/// Picoseconds per second, the default clock timestamp resolution
pub const PICOSECONDS_PER_SECOND: f64 = 1e12;

/// Speed of light in vacuum expressed in metres per picosecond
pub const SPEED_OF_LIGHT_M_PER_PS: f64 = SPEED_OF_LIGHT_VACUUM / PICOSECONDS_PER_SECOND;

/// Number of POLL/RESPONSE exchanges that make up one ranging round
pub const ROUND_EXCHANGE_COUNT: usize = 3;

/// Dimensionality of every solved position
pub const POSITION_DIMENSIONS: u8 = 2;
