use std::collections::{HashMap, VecDeque};

use crate::checks::{Clock, NonceCheck, SystemClock};
use crate::error::Error;
use crate::packet::{Direction, Multipart, Packet};
use crate::proto::event::Event;
use crate::proto::pending::PendingCommand;

/// The client side of the BattlEye RCON protocol (spec §3 `ClientState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No login attempt has been made yet.
    NoAuth,
    /// A `ClientLogin` has been sent; awaiting `ServerLogin`.
    LoggingIn,
    /// Authenticated; commands may be issued and messages may arrive.
    LoggedIn,
    /// Terminal. No further operations (besides inspecting drained events)
    /// are valid.
    Closed,
}

/// The sans-I/O client protocol engine (spec §4.2).
///
/// This type never performs I/O, never sleeps, and never spawns
/// concurrency: it is a pure function of `(state, input) -> (state,
/// outgoing bytes, events)`. A connector (see [`crate::connector`]) drives
/// it against a real socket and clock.
pub struct ClientStateMachine {
    state: ClientState,
    nonce_window: usize,
    nonce: NonceCheck,
    clock: Box<dyn Clock>,
    pending: HashMap<u8, PendingCommand>,
    next_sequence: u8,
    outgoing: VecDeque<Vec<u8>>,
    events: VecDeque<Event>,
}

impl ClientStateMachine {
    /// Creates a new state machine with the production [`SystemClock`].
    ///
    /// Fails if `nonce_window` is not in `1..=255`.
    pub fn new(nonce_window: usize) -> Result<Self, Error> {
        Self::with_clock(nonce_window, Box::new(SystemClock))
    }

    /// Creates a new state machine using the supplied [`Clock`], for
    /// deterministic tests.
    pub fn with_clock(nonce_window: usize, clock: Box<dyn Clock>) -> Result<Self, Error> {
        Ok(Self {
            state: ClientState::NoAuth,
            nonce_window,
            nonce: NonceCheck::new(nonce_window)?,
            clock,
            pending: HashMap::new(),
            next_sequence: 0,
            outgoing: VecDeque::new(),
            events: VecDeque::new(),
        })
    }

    /// The current protocol state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    pub(crate) fn is_logged_in(&self) -> bool {
        self.state == ClientState::LoggedIn
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state == ClientState::Closed
    }

    /// Emits a `ClientLogin` and transitions to `LOGGING_IN`.
    ///
    /// Valid only from `NO_AUTH`.
    pub fn send_login(&mut self, password: &str) -> Result<(), Error> {
        if self.state != ClientState::NoAuth {
            return Err(Error::InvalidState("send_login is only valid in NO_AUTH"));
        }
        let bytes = Packet::ClientLogin {
            password: password.to_string(),
        }
        .encode()?;
        self.outgoing.push_back(bytes);
        self.state = ClientState::LoggingIn;
        Ok(())
    }

    /// Allocates a sequence, emits a `ClientCommand`, and records the
    /// sequence as outstanding.
    ///
    /// Valid only from `LOGGED_IN`. Fails with
    /// [`Error::NoAvailableSequence`] if all 256 sequences are currently
    /// outstanding.
    pub fn send_command(&mut self, text: &str) -> Result<u8, Error> {
        if self.state != ClientState::LoggedIn {
            return Err(Error::InvalidState("send_command is only valid in LOGGED_IN"));
        }
        let sequence = self.allocate_sequence()?;
        let bytes = Packet::ClientCommand {
            sequence,
            text: text.to_string(),
        }
        .encode()?;

        self.pending
            .insert(sequence, PendingCommand::new(sequence, self.clock.now()));
        self.outgoing.push_back(bytes);
        Ok(sequence)
    }

    fn allocate_sequence(&mut self) -> Result<u8, Error> {
        if self.pending.len() >= 256 {
            return Err(Error::NoAvailableSequence);
        }
        let start = self.next_sequence;
        loop {
            let candidate = self.next_sequence;
            self.next_sequence = self.next_sequence.wrapping_add(1);
            if !self.pending.contains_key(&candidate) {
                return Ok(candidate);
            }
            if self.next_sequence == start {
                return Err(Error::NoAvailableSequence);
            }
        }
    }

    /// Cancels an outstanding command, freeing its sequence for reuse.
    /// Returns `true` if a command with that sequence was outstanding.
    ///
    /// Called by the connector when a command's overall timeout elapses or
    /// the session is torn down (spec §5 "Cancellation").
    pub fn cancel_command(&mut self, sequence: u8) -> bool {
        self.pending.remove(&sequence).is_some()
    }

    /// Whether `sequence` currently has an outstanding command.
    pub fn is_outstanding(&self, sequence: u8) -> bool {
        self.pending.contains_key(&sequence)
    }

    /// Decodes and reacts to one inbound datagram.
    ///
    /// Malformed frames and CRC mismatches are dropped silently (spec §7);
    /// an input that is well-formed but illegal for the current state
    /// yields [`Error::InvalidState`] without mutating any state (spec §8
    /// property 6).
    pub fn receive_datagram(&mut self, buf: &[u8]) -> Result<(), Error> {
        let packet = match Packet::decode(buf, Direction::ServerToClient) {
            Ok(packet) => packet,
            Err(Error::MalformedPacket(reason)) => {
                log::debug!("dropping malformed datagram: {reason}");
                return Ok(());
            }
            Err(Error::ChecksumMismatch) => {
                log::debug!("dropping datagram with checksum mismatch");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match packet.clone() {
            Packet::ServerLogin { accepted } => self.on_server_login(accepted, packet),
            Packet::ServerCommand {
                sequence,
                multipart,
                text,
            } => self.on_server_command(sequence, multipart, text, packet),
            Packet::ServerMessage { sequence, text } => {
                self.on_server_message(sequence, text, packet)
            }
            Packet::ClientLogin { .. } | Packet::ClientCommand { .. } | Packet::ClientMessage { .. } => {
                // `Packet::decode` with `Direction::ServerToClient` never
                // produces these variants; guarded here only so the match
                // stays exhaustive as the enum evolves.
                Err(Error::InvalidState("unexpected client-direction packet"))
            }
        }
    }

    fn on_server_login(&mut self, accepted: bool, raw: Packet) -> Result<(), Error> {
        if self.state != ClientState::LoggingIn {
            return Err(Error::InvalidState("ServerLogin is only legal in LOGGING_IN"));
        }
        self.events.push_back(Event::RawPacket(raw));
        if accepted {
            self.state = ClientState::LoggedIn;
            self.events.push_back(Event::LoginSuccess);
        } else {
            self.state = ClientState::Closed;
            self.events.push_back(Event::LoginRefused);
        }
        Ok(())
    }

    fn on_server_command(
        &mut self,
        sequence: u8,
        multipart: Option<Multipart>,
        text: String,
        raw: Packet,
    ) -> Result<(), Error> {
        if self.state != ClientState::LoggedIn {
            return Err(Error::InvalidState("ServerCommand is only legal in LOGGED_IN"));
        }
        self.events.push_back(Event::RawPacket(raw));

        let Some(pending) = self.pending.get_mut(&sequence) else {
            log::debug!("ServerCommand for unknown or already-completed sequence {sequence}");
            return Ok(());
        };

        match pending.observe(multipart, text) {
            Ok(Some(assembled)) => {
                self.pending.remove(&sequence);
                self.events.push_back(Event::CommandResponse {
                    sequence,
                    text: assembled,
                });
            }
            Ok(None) => {}
            Err(e) => {
                log::debug!("dropping malformed fragment for sequence {sequence}: {e}");
            }
        }
        Ok(())
    }

    fn on_server_message(&mut self, sequence: u8, text: String, raw: Packet) -> Result<(), Error> {
        if self.state != ClientState::LoggedIn {
            return Err(Error::InvalidState("ServerMessage is only legal in LOGGED_IN"));
        }
        self.events.push_back(Event::RawPacket(raw));

        if self.nonce.insert(sequence) {
            self.events.push_back(Event::ServerMessage { sequence, text });
        }

        // Acknowledgements are always sent, duplicate or not (spec §4.2).
        let ack = Packet::ClientMessage { sequence }.encode()?;
        self.outgoing.push_back(ack);
        Ok(())
    }

    /// Transitions to `CLOSED` from any state, emitting [`Event::Closed`]
    /// if this is the first time.
    pub fn close(&mut self) {
        if self.state != ClientState::Closed {
            self.state = ClientState::Closed;
            self.events.push_back(Event::Closed);
        }
    }

    /// Resets the state machine for a fresh login attempt after a
    /// reconnect, retaining configuration (nonce window) but discarding
    /// all session state: outstanding commands, dedup history, and
    /// queued bytes/events.
    pub fn reset(&mut self) {
        self.state = ClientState::NoAuth;
        self.nonce.reset();
        self.pending.clear();
        self.next_sequence = 0;
        self.outgoing.clear();
        self.events.clear();
    }

    /// Drains and returns all bytes queued for transmission.
    pub fn events_to_send(&mut self) -> Vec<Vec<u8>> {
        self.outgoing.drain(..).collect()
    }

    /// Drains and returns all events produced since the last call.
    pub fn events_received(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }
}
