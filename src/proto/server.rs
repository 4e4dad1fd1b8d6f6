use std::collections::VecDeque;

use crate::error::Error;
use crate::packet::{Direction, Multipart, Packet};

/// The server side of the protocol (spec §3 `ServerState`).
///
/// Production BattlEye servers are out of scope (spec.md Non-goals); this
/// state machine exists so tests — and anyone embedding a protocol-correct
/// test double — have a symmetric counterpart to
/// [`crate::proto::ClientStateMachine`] without reimplementing the wire
/// codec logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No `ClientLogin` has been received yet.
    NoAuth,
    /// A client has authenticated.
    Authenticated,
    /// Terminal.
    Closed,
}

/// Events the [`ServerStateMachine`] emits as it decodes client-sent
/// datagrams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client attempted to log in with `password`.
    LoginAttempt {
        /// The password offered by the client.
        password: String,
    },
    /// A client issued a command.
    CommandRequest {
        /// The correlation sequence to reply with.
        sequence: u8,
        /// The command text.
        text: String,
    },
    /// A client acknowledged a `ServerMessage`.
    MessageAck {
        /// The sequence being acknowledged.
        sequence: u8,
    },
}

/// The sans-I/O server protocol engine, symmetric to
/// [`crate::proto::ClientStateMachine`].
pub struct ServerStateMachine {
    state: ServerState,
    outgoing: VecDeque<Vec<u8>>,
    events: VecDeque<ServerEvent>,
}

impl Default for ServerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStateMachine {
    /// Creates a new server state machine in `NO_AUTH`.
    pub fn new() -> Self {
        Self {
            state: ServerState::NoAuth,
            outgoing: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// The current protocol state.
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Decodes and reacts to one inbound datagram, mirroring
    /// [`crate::proto::ClientStateMachine::receive_datagram`]'s drop and
    /// error-propagation rules.
    pub fn receive_datagram(&mut self, buf: &[u8]) -> Result<(), Error> {
        let packet = match Packet::decode(buf, Direction::ClientToServer) {
            Ok(packet) => packet,
            Err(Error::MalformedPacket(_)) | Err(Error::ChecksumMismatch) => {
                log::debug!("dropping malformed datagram");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match packet {
            Packet::ClientLogin { password } => self.on_client_login(password),
            Packet::ClientCommand { sequence, text } => self.on_client_command(sequence, text),
            Packet::ClientMessage { sequence } => self.on_client_message(sequence),
            Packet::ServerLogin { .. } | Packet::ServerCommand { .. } | Packet::ServerMessage { .. } => {
                Err(Error::InvalidState("unexpected server-direction packet"))
            }
        }
    }

    fn on_client_login(&mut self, password: String) -> Result<(), Error> {
        if self.state != ServerState::NoAuth {
            return Err(Error::InvalidState("ClientLogin is only legal in NO_AUTH"));
        }
        self.events.push_back(ServerEvent::LoginAttempt { password });
        Ok(())
    }

    fn on_client_command(&mut self, sequence: u8, text: String) -> Result<(), Error> {
        if self.state != ServerState::Authenticated {
            return Err(Error::InvalidState("ClientCommand is only legal when authenticated"));
        }
        self.events.push_back(ServerEvent::CommandRequest { sequence, text });
        Ok(())
    }

    fn on_client_message(&mut self, sequence: u8) -> Result<(), Error> {
        if self.state != ServerState::Authenticated {
            return Err(Error::InvalidState("ClientMessage is only legal when authenticated"));
        }
        self.events.push_back(ServerEvent::MessageAck { sequence });
        Ok(())
    }

    /// Responds to the most recent login attempt, transitioning to
    /// `AUTHENTICATED` (accepted) or `CLOSED` (refused).
    ///
    /// Valid only from `NO_AUTH`.
    pub fn accept(&mut self, accepted: bool) -> Result<(), Error> {
        if self.state != ServerState::NoAuth {
            return Err(Error::InvalidState("accept is only valid in NO_AUTH"));
        }
        let bytes = Packet::ServerLogin { accepted }.encode()?;
        self.outgoing.push_back(bytes);
        self.state = if accepted {
            ServerState::Authenticated
        } else {
            ServerState::Closed
        };
        Ok(())
    }

    /// Sends a single-part command response. Valid only when
    /// `AUTHENTICATED`.
    pub fn send_command_response(&mut self, sequence: u8, text: &str) -> Result<(), Error> {
        self.send_command_response_multipart(sequence, None, text)
    }

    /// Sends one fragment of a command response, optionally with a
    /// `(total, index)` multipart header. Valid only when `AUTHENTICATED`.
    pub fn send_command_response_multipart(
        &mut self,
        sequence: u8,
        multipart: Option<Multipart>,
        text: &str,
    ) -> Result<(), Error> {
        if self.state != ServerState::Authenticated {
            return Err(Error::InvalidState(
                "command responses are only valid when authenticated",
            ));
        }
        let bytes = Packet::ServerCommand {
            sequence,
            multipart,
            text: text.to_string(),
        }
        .encode()?;
        self.outgoing.push_back(bytes);
        Ok(())
    }

    /// Sends an unsolicited message. Valid only when `AUTHENTICATED`.
    pub fn send_message(&mut self, sequence: u8, text: &str) -> Result<(), Error> {
        if self.state != ServerState::Authenticated {
            return Err(Error::InvalidState("messages are only valid when authenticated"));
        }
        let bytes = Packet::ServerMessage {
            sequence,
            text: text.to_string(),
        }
        .encode()?;
        self.outgoing.push_back(bytes);
        Ok(())
    }

    /// Transitions to `CLOSED` from any state.
    pub fn close(&mut self) {
        self.state = ServerState::Closed;
    }

    /// Drains and returns all bytes queued for transmission.
    pub fn events_to_send(&mut self) -> Vec<Vec<u8>> {
        self.outgoing.drain(..).collect()
    }

    /// Drains and returns all events produced since the last call.
    pub fn events_received(&mut self) -> Vec<ServerEvent> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_then_command_round_trip() {
        let mut server = ServerStateMachine::new();
        let login = Packet::ClientLogin {
            password: "secret".into(),
        }
        .encode()
        .unwrap();
        server.receive_datagram(&login).unwrap();
        assert_eq!(
            server.events_received(),
            vec![ServerEvent::LoginAttempt {
                password: "secret".into()
            }]
        );

        server.accept(true).unwrap();
        assert_eq!(server.state(), ServerState::Authenticated);

        let cmd = Packet::ClientCommand {
            sequence: 3,
            text: "players".into(),
        }
        .encode()
        .unwrap();
        server.receive_datagram(&cmd).unwrap();
        assert_eq!(
            server.events_received(),
            vec![ServerEvent::CommandRequest {
                sequence: 3,
                text: "players".into()
            }]
        );

        server.send_command_response(3, "lobby empty").unwrap();
        let out = server.events_to_send();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_refused_login_closes() {
        let mut server = ServerStateMachine::new();
        let login = Packet::ClientLogin {
            password: "wrong".into(),
        }
        .encode()
        .unwrap();
        server.receive_datagram(&login).unwrap();
        server.accept(false).unwrap();
        assert_eq!(server.state(), ServerState::Closed);
    }

    #[test]
    fn test_command_illegal_before_auth() {
        let mut server = ServerStateMachine::new();
        let cmd = Packet::ClientCommand {
            sequence: 0,
            text: "x".into(),
        }
        .encode()
        .unwrap();
        let err = server.receive_datagram(&cmd).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
