//! Unified error types for the stepnode firmware.
//!
//! Most faults in this system are deliberately silent: framing errors,
//! address mismatches and busy-drops never surface anywhere, the link
//! layer simply resynchronizes. The types here cover the two places
//! where an error is actually observable: command validation (the `'?'`
//! rejection reply) and the boot/persistence path.

use core::fmt;

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A command payload failed structural validation.
    Command(CommandError),
    /// Configuration could not be persisted or is invalid.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command validation errors
// ---------------------------------------------------------------------------

/// Why an inbound command was rejected.
///
/// Every variant carries the offending command id so the dispatcher can
/// name it in the `'?'` reply — the only user-visible error signal in
/// the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Command id is not in the dispatch table.
    Unknown(u8),
    /// Payload length does not match the command's layout.
    BadLength(u8),
    /// A safety-complement check failed (address change / save config).
    BadCheck(u8),
}

impl CommandError {
    /// The command id to name in the rejection reply.
    pub fn id(&self) -> u8 {
        match *self {
            Self::Unknown(id) | Self::BadLength(id) | Self::BadCheck(id) => id,
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(id) => write!(f, "unknown command {:#04x}", id),
            Self::BadLength(id) => write!(f, "bad payload length for {:#04x}", id),
            Self::BadCheck(id) => write!(f, "complement check failed for {:#04x}", id),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from the configuration store.
///
/// Load failures are recovered locally (defaults) and never surfaced to
/// the bus; save failures turn into a `'?'` rejection of the save
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored image failed the validity marker or deserialization.
    Corrupted,
    /// A config field failed range validation before persisting.
    ValidationFailed(&'static str),
    /// Underlying storage I/O failed.
    Io,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "stored config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Io => write!(f, "storage I/O error"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
