//! Per-kind packet bodies and the [`Packet`] enum that ties them to the
//! frame envelope in [`super::header`].

use crate::error::Error;
use crate::packet::header::{self, KIND_COMMAND, KIND_LOGIN, KIND_MESSAGE};

/// The protocol's maximum serialised frame size, header included.
pub const MAX_PACKET_SIZE: usize = 4096;

/// Which side of the connection a packet was sent from (or, for decoding,
/// which side's packets the caller is prepared to receive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Packets sent by the client, decoded by a server.
    ClientToServer,
    /// Packets sent by the server, decoded by a client.
    ServerToClient,
}

/// The `(total, index)` header on a fragmented [`Packet::ServerCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multipart {
    /// Total number of fragments in this response.
    pub total: u8,
    /// This fragment's zero-based position among `total`.
    pub index: u8,
}

/// A single BattlEye RCON wire packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Client -> server: the RCON password, sent once at the start of a
    /// session.
    ClientLogin {
        /// The plaintext password.
        password: String,
    },
    /// Server -> client: whether the login attempt was accepted.
    ServerLogin {
        /// `true` if the server accepted the password.
        accepted: bool,
    },
    /// Client -> server: a command to execute, tagged with a sequence used
    /// to correlate the eventual response.
    ClientCommand {
        /// The correlation sequence.
        sequence: u8,
        /// The command text.
        text: String,
    },
    /// Server -> client: a command response, single- or multi-part.
    ServerCommand {
        /// The sequence this response correlates to.
        sequence: u8,
        /// `Some` for a fragment of a multi-part response, `None` for a
        /// complete single-part response.
        multipart: Option<Multipart>,
        /// This frame's share of the response text.
        text: String,
    },
    /// Server -> client: an unsolicited message, tagged with a sequence
    /// used for deduplication and acknowledgement.
    ServerMessage {
        /// The message's dedup/ack sequence.
        sequence: u8,
        /// The message text.
        text: String,
    },
    /// Client -> server: acknowledgement of a [`Packet::ServerMessage`].
    ClientMessage {
        /// The sequence being acknowledged.
        sequence: u8,
    },
}

impl Packet {
    /// Serialises this packet, including the frame envelope.
    ///
    /// Fails with [`Error::PacketTooLarge`] if the serialised size would
    /// exceed [`MAX_PACKET_SIZE`], or [`Error::MalformedPacket`] if a
    /// [`Multipart`] header violates `total > 0` / `index < total`.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let kind = self.kind_byte();
        let body = self.encode_body()?;

        let len = header::HEADER_LEN + body.len();
        if len > MAX_PACKET_SIZE {
            return Err(Error::PacketTooLarge {
                len,
                max: MAX_PACKET_SIZE,
            });
        }

        Ok(header::frame(kind, &body))
    }

    /// Decodes a complete frame received from `direction`.
    ///
    /// The caller supplies `direction` because the wire format alone does
    /// not disambiguate e.g. a one-byte `ClientLogin` password from a
    /// `ServerLogin` status byte: a client only ever decodes
    /// [`Direction::ServerToClient`] packets and a server only ever
    /// decodes [`Direction::ClientToServer`] packets.
    pub fn decode(buf: &[u8], direction: Direction) -> Result<Packet, Error> {
        let parsed = header::parse(buf)?;
        match (parsed.kind, direction) {
            (KIND_LOGIN, Direction::ClientToServer) => decode_client_login(parsed.body),
            (KIND_LOGIN, Direction::ServerToClient) => decode_server_login(parsed.body),
            (KIND_COMMAND, Direction::ClientToServer) => decode_client_command(parsed.body),
            (KIND_COMMAND, Direction::ServerToClient) => decode_server_command(parsed.body),
            (KIND_MESSAGE, Direction::ClientToServer) => decode_client_message(parsed.body),
            (KIND_MESSAGE, Direction::ServerToClient) => decode_server_message(parsed.body),
            _ => Err(Error::MalformedPacket("unknown packet type")),
        }
    }

    fn kind_byte(&self) -> u8 {
        match self {
            Packet::ClientLogin { .. } | Packet::ServerLogin { .. } => KIND_LOGIN,
            Packet::ClientCommand { .. } | Packet::ServerCommand { .. } => KIND_COMMAND,
            Packet::ServerMessage { .. } | Packet::ClientMessage { .. } => KIND_MESSAGE,
        }
    }

    fn encode_body(&self) -> Result<Vec<u8>, Error> {
        let mut body = Vec::new();
        match self {
            Packet::ClientLogin { password } => body.extend_from_slice(password.as_bytes()),
            Packet::ServerLogin { accepted } => body.push(*accepted as u8),
            Packet::ClientCommand { sequence, text } => {
                body.push(*sequence);
                body.extend_from_slice(text.as_bytes());
            }
            Packet::ServerCommand {
                sequence,
                multipart,
                text,
            } => {
                body.push(*sequence);
                if let Some(mp) = multipart {
                    if mp.total == 0 || mp.index >= mp.total {
                        return Err(Error::MalformedPacket(
                            "multipart header requires total > 0 and index < total",
                        ));
                    }
                    body.push(0x00);
                    body.push(mp.total);
                    body.push(mp.index);
                }
                body.extend_from_slice(text.as_bytes());
            }
            Packet::ServerMessage { sequence, text } => {
                body.push(*sequence);
                body.extend_from_slice(text.as_bytes());
            }
            Packet::ClientMessage { sequence } => body.push(*sequence),
        }
        Ok(body)
    }
}

fn utf8(bytes: &[u8]) -> Result<String, Error> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::MalformedPacket("body is not valid utf-8"))
}

fn decode_client_login(body: &[u8]) -> Result<Packet, Error> {
    Ok(Packet::ClientLogin {
        password: utf8(body)?,
    })
}

fn decode_server_login(body: &[u8]) -> Result<Packet, Error> {
    if body.len() != 1 {
        return Err(Error::MalformedPacket("server login body must be one byte"));
    }
    let accepted = match body[0] {
        0x00 => false,
        0x01 => true,
        _ => return Err(Error::MalformedPacket("invalid server login status byte")),
    };
    Ok(Packet::ServerLogin { accepted })
}

fn decode_client_command(body: &[u8]) -> Result<Packet, Error> {
    if body.is_empty() {
        return Err(Error::MalformedPacket("client command body missing sequence"));
    }
    Ok(Packet::ClientCommand {
        sequence: body[0],
        text: utf8(&body[1..])?,
    })
}

fn decode_server_command(body: &[u8]) -> Result<Packet, Error> {
    if body.is_empty() {
        return Err(Error::MalformedPacket("server command body missing sequence"));
    }
    let sequence = body[0];

    // The multipart envelope is identified by a 0x00 sentinel at body
    // offset 1; single-part command text never starts with a NUL byte.
    if body.len() >= 2 && body[1] == 0x00 {
        if body.len() < 4 {
            return Err(Error::MalformedPacket("truncated multipart header"));
        }
        let total = body[2];
        let index = body[3];
        if total == 0 || index >= total {
            return Err(Error::MalformedPacket(
                "multipart header requires total > 0 and index < total",
            ));
        }
        return Ok(Packet::ServerCommand {
            sequence,
            multipart: Some(super::Multipart { total, index }),
            text: utf8(&body[4..])?,
        });
    }

    Ok(Packet::ServerCommand {
        sequence,
        multipart: None,
        text: utf8(&body[1..])?,
    })
}

fn decode_server_message(body: &[u8]) -> Result<Packet, Error> {
    if body.is_empty() {
        return Err(Error::MalformedPacket("server message body missing sequence"));
    }
    Ok(Packet::ServerMessage {
        sequence: body[0],
        text: utf8(&body[1..])?,
    })
}

fn decode_client_message(body: &[u8]) -> Result<Packet, Error> {
    if body.len() != 1 {
        return Err(Error::MalformedPacket("client message body must be one byte"));
    }
    Ok(Packet::ClientMessage { sequence: body[0] })
}
