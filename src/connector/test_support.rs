//! A minimal [`ServerStateMachine`]-driven UDP loopback server, used only
//! by this crate's own `#[tokio::test]` integration tests to exercise
//! [`super::Client`]/[`super::Session`] against real sockets without a
//! real BattlEye server.

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::packet::MAX_PACKET_SIZE;
use crate::proto::{ServerEvent, ServerStateMachine};

/// What the loopback server should do about a login attempt.
pub(crate) enum LoginPolicy {
    Accept,
    Refuse,
}

/// A running loopback server and a handle to script it.
pub(crate) struct LoopbackServer {
    pub(crate) addr: std::net::SocketAddr,
    events_rx: mpsc::UnboundedReceiver<ServerEvent>,
    actions_tx: mpsc::UnboundedSender<Action>,
    handle: JoinHandle<()>,
}

enum Action {
    Respond { sequence: u8, text: String },
    RespondMultipart {
        sequence: u8,
        parts: Vec<String>,
    },
    Message { sequence: u8, text: String },
}

impl LoopbackServer {
    /// Starts a loopback server bound to an ephemeral localhost port,
    /// applying `policy` to the first login attempt it sees and then
    /// authenticating (or not) accordingly.
    pub(crate) async fn start(policy: LoginPolicy) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (actions_tx, mut actions_rx) = mpsc::unbounded_channel::<Action>();

        let handle = tokio::spawn(async move {
            let mut sm = ServerStateMachine::new();
            let mut buf = vec![0u8; MAX_PACKET_SIZE];
            let mut peer = None;

            loop {
                tokio::select! {
                    recv = socket.recv_from(&mut buf) => {
                        let Ok((n, from)) = recv else { break };
                        peer = Some(from);
                        if sm.receive_datagram(&buf[..n]).is_err() {
                            break;
                        }
                        for event in sm.events_received() {
                            if let ServerEvent::LoginAttempt { .. } = event {
                                let accept = matches!(policy, LoginPolicy::Accept);
                                let _ = sm.accept(accept);
                            }
                            let _ = events_tx.send(event);
                        }
                        for frame in sm.events_to_send() {
                            let _ = socket.send_to(&frame, from).await;
                        }
                    }
                    action = actions_rx.recv() => {
                        let Some(action) = action else { break };
                        let Some(to) = peer else { continue };
                        match action {
                            Action::Respond { sequence, text } => {
                                let _ = sm.send_command_response(sequence, &text);
                            }
                            Action::RespondMultipart { sequence, parts } => {
                                let total = parts.len() as u8;
                                for (index, text) in parts.into_iter().enumerate() {
                                    let _ = sm.send_command_response_multipart(
                                        sequence,
                                        Some(crate::packet::Multipart { total, index: index as u8 }),
                                        &text,
                                    );
                                }
                            }
                            Action::Message { sequence, text } => {
                                let _ = sm.send_message(sequence, &text);
                            }
                        }
                        for frame in sm.events_to_send() {
                            let _ = socket.send_to(&frame, to).await;
                        }
                    }
                }
            }
        });

        Self {
            addr,
            events_rx,
            actions_tx,
            handle,
        }
    }

    pub(crate) async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events_rx.recv().await
    }

    pub(crate) fn respond(&self, sequence: u8, text: &str) {
        let _ = self.actions_tx.send(Action::Respond {
            sequence,
            text: text.to_string(),
        });
    }

    pub(crate) fn respond_multipart(&self, sequence: u8, parts: &[&str]) {
        let _ = self.actions_tx.send(Action::RespondMultipart {
            sequence,
            parts: parts.iter().map(|s| s.to_string()).collect(),
        });
    }

    pub(crate) fn send_message(&self, sequence: u8, text: &str) {
        let _ = self.actions_tx.send(Action::Message {
            sequence,
            text: text.to_string(),
        });
    }

    pub(crate) fn stop(self) {
        self.handle.abort();
    }
}
