use crate::packet::Packet;

/// Why a login attempt did not succeed (spec §6 `LoginFailure`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailureKind {
    /// The server rejected the supplied password. Not retried.
    Refused,
    /// No `ServerLogin` reply arrived before the configured timeout.
    Timeout,
}

/// Why a [`super::Session`] became disconnected (spec §4.3, §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The caller closed the session, or its handle was dropped.
    Closed,
    /// No datagram was received from the server within
    /// [`super::ConnectorConfig::server_silence_timeout`].
    ServerSilence,
    /// The underlying socket returned an error.
    Io(String),
    /// The reconnect supervisor gave up after
    /// [`super::ConnectorConfig::reconnect_max_attempts`].
    ReconnectExhausted,
}

/// The tagged event stream a [`super::Session`] publishes to its
/// subscribers (spec §4.4).
#[derive(Debug, Clone)]
pub enum Event {
    /// A raw decoded packet, published alongside every other event so
    /// collaborators that need the unparsed frame can inspect it (spec §6).
    RawPacket(Packet),

    /// The login handshake succeeded (or a reconnect re-authenticated).
    Login,

    /// The login handshake failed.
    LoginFailure(LoginFailureKind),

    /// A command's response has been fully assembled, in ascending
    /// fragment-index order.
    CommandResponse {
        /// The sequence this response correlates to.
        sequence: u8,
        /// The assembled response text.
        text: String,
    },

    /// A server-initiated message, delivered at most once per sequence
    /// within the configured dedup window.
    ServerMessage {
        /// The message's sequence.
        sequence: u8,
        /// The message text.
        text: String,
    },

    /// The session was torn down, whether by request or by the network.
    Disconnected(DisconnectCause),
}
