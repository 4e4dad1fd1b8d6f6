use thiserror::Error;

/// Error types returned by this crate.
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// The buffer is too small to contain a frame header, or its length is
    /// otherwise inconsistent with the declared packet type.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// The header-declared CRC32 did not match the CRC32 computed over the
    /// received bytes.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// The serialised form of a packet would exceed
    /// [`crate::packet::MAX_PACKET_SIZE`].
    #[error("packet too large: {len} bytes exceeds maximum of {max}")]
    PacketTooLarge {
        /// The length the packet would have serialised to.
        len: usize,
        /// The protocol maximum.
        max: usize,
    },

    /// An operation was attempted that is illegal for the state machine's
    /// current state.
    ///
    /// This is a programmer error, not a recoverable runtime condition.
    #[error("invalid operation for current state: {0}")]
    InvalidState(&'static str),

    /// The server refused the supplied password.
    #[error("login refused by server")]
    LoginRefused,

    /// No `ServerLogin` reply was received before the login timeout elapsed.
    #[error("login timed out waiting for server reply")]
    LoginTimeout,

    /// A command's response was not received within `command_timeout`.
    #[error("command timed out: {0}")]
    RconCommand(String),

    /// The session has been torn down (explicitly, or by the reconnect
    /// supervisor) and can no longer serve requests.
    #[error("not connected")]
    NotConnected,

    /// All 256 command sequences are currently outstanding.
    #[error("no available command sequence")]
    NoAvailableSequence,

    /// The dedup window size in [`crate::checks::NonceCheck::new`] was 0 or
    /// greater than 255.
    #[error("invalid nonce window size: {0}")]
    InvalidNonceWindow(usize),

    /// An I/O error occurred while driving the connection.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(v: std::io::Error) -> Self {
        Self::Io(v.to_string())
    }
}
