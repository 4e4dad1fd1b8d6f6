use crate::packet::Packet;

/// Events the [`super::client::ClientStateMachine`] emits for the
/// connector (or a test harness) to act on (spec §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The login handshake succeeded; the state machine has transitioned
    /// to `LOGGED_IN`.
    LoginSuccess,

    /// The server refused the supplied password; the state machine has
    /// transitioned to `CLOSED`.
    LoginRefused,

    /// A command's response has been fully assembled (all fragments
    /// present, concatenated in ascending index order).
    CommandResponse {
        /// The sequence this response correlates to.
        sequence: u8,
        /// The assembled response text.
        text: String,
    },

    /// A server-initiated message, delivered at most once per sequence
    /// within the dedup window.
    ServerMessage {
        /// The message's sequence.
        sequence: u8,
        /// The message text.
        text: String,
    },

    /// Emitted alongside every other event, carrying the raw decoded
    /// packet for collaborators that need it (spec §6).
    RawPacket(Packet),

    /// The state machine has transitioned to `CLOSED`.
    Closed,
}
