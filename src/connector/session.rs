//! The caller-facing API (spec §6): [`Client::connect`] yields a scoped
//! [`Session`] handle backed by a background [`super::driver::Driver`]
//! task.

use std::sync::atomic::Ordering;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::connector::config::ConnectorConfig;
use crate::connector::driver::{Driver, DriverCommand, SharedState};
use crate::connector::event::Event;
use crate::error::Error;

/// Constructs [`Session`]s against a configured set of connector
/// parameters (spec §6 `Client::new`).
#[derive(Debug, Clone, Default)]
pub struct Client {
    config: ConnectorConfig,
}

impl Client {
    /// A client using [`ConnectorConfig::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A client using the supplied configuration.
    pub fn with_config(config: ConnectorConfig) -> Self {
        Self { config }
    }

    /// Binds a UDP endpoint, connects it to `(host, port)`, and runs the
    /// login handshake.
    ///
    /// Suspends until login succeeds or fails, or
    /// [`ConnectorConfig::connection_timeout`] elapses (spec §4.3 "Login
    /// handshake", §5 "Suspension points"). On success, returns a
    /// [`Session`] whose background driver task re-authenticates and
    /// retries automatically on disconnection.
    pub async fn connect(&self, host: &str, port: u16, password: &str) -> Result<Session, Error> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((host, port)).await?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let shared = SharedState::new();

        let driver = Driver::new(socket, self.config.clone(), password.to_string(), cmd_rx, shared.clone())?;
        let handle = tokio::spawn(driver.run(Some(ready_tx)));

        match tokio::time::timeout(self.config.connection_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(Session {
                cmd_tx,
                shared,
                handle: Some(handle),
            }),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_recv_error)) => Err(Error::NotConnected),
            Err(_elapsed) => {
                handle.abort();
                Err(Error::LoginTimeout)
            }
        }
    }
}

/// A scoped, authenticated connection to a BattlEye RCON server (spec §6
/// `Session`).
///
/// Dropping a `Session` tears down its background driver task. Prefer
/// [`Session::close`] when an async teardown point is available, since
/// `Drop` cannot wait for the task to join and aborts it instead (spec §5
/// "Cancellation").
#[derive(Debug)]
pub struct Session {
    cmd_tx: mpsc::UnboundedSender<DriverCommand>,
    shared: SharedState,
    handle: Option<JoinHandle<()>>,
}

impl Session {
    /// Issues a command and suspends until its assembled response
    /// arrives.
    ///
    /// Fails with [`Error::RconCommand`] if `command_timeout` elapses
    /// with retries exhausted, or [`Error::NotConnected`] if the session
    /// is torn down while the call is outstanding.
    pub async fn send_command(&self, text: &str) -> Result<String, Error> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(DriverCommand::Command {
                text: text.to_string(),
                reply,
            })
            .map_err(|_| Error::NotConnected)?;
        rx.await.map_err(|_| Error::NotConnected)?
    }

    /// Issues a command without waiting for its response (spec §6
    /// `Session::send`, fire-and-forget).
    pub fn send(&self, text: &str) -> Result<(), Error> {
        self.cmd_tx
            .send(DriverCommand::FireAndForget {
                text: text.to_string(),
            })
            .map_err(|_| Error::NotConnected)
    }

    /// Registers a new event consumer (spec §6 `Session::on_event`).
    ///
    /// Each call yields an independent receiver; every subscriber sees
    /// every event published from the point of registration onward.
    pub fn on_event(&self) -> Result<mpsc::UnboundedReceiver<Event>, Error> {
        let (sink, stream) = mpsc::unbounded_channel();
        self.cmd_tx
            .send(DriverCommand::Subscribe { sink })
            .map_err(|_| Error::NotConnected)?;
        Ok(stream)
    }

    /// Whether the driver task is still running (has not closed or
    /// exhausted its reconnect budget).
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Whether the UDP transport is currently connected (the driver has
    /// bound and connected a socket; does not imply login succeeded).
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Whether the protocol state machine is currently `LOGGED_IN`.
    pub fn is_logged_in(&self) -> bool {
        self.shared.logged_in.load(Ordering::Acquire)
    }

    /// Closes the session: signals the driver task to shut down and
    /// waits for it to finish (spec §5 "Cancellation").
    pub async fn close(mut self) {
        let _ = self.cmd_tx.send(DriverCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(DriverCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::connector::test_support::{LoginPolicy, LoopbackServer};
    use crate::Error;

    use super::*;

    #[tokio::test]
    async fn s1_login_ok() {
        let server = LoopbackServer::start(LoginPolicy::Accept).await;
        let client = Client::new();
        let session = client
            .connect("127.0.0.1", server.addr.port(), "correct horse")
            .await
            .unwrap();

        assert!(session.is_connected());
        assert!(session.is_logged_in());
        server.stop();
    }

    #[tokio::test]
    async fn s2_login_refused() {
        let server = LoopbackServer::start(LoginPolicy::Refuse).await;
        let client = Client::new();
        let err = client
            .connect("127.0.0.1", server.addr.port(), "wrong password")
            .await
            .unwrap_err();

        assert_eq!(err, Error::LoginRefused);
        server.stop();
    }

    #[tokio::test]
    async fn s3_simple_command_round_trip() {
        let mut server = LoopbackServer::start(LoginPolicy::Accept).await;
        let client = Client::new();
        let session = client
            .connect("127.0.0.1", server.addr.port(), "secret")
            .await
            .unwrap();

        // Drain the login attempt event before scripting the response.
        server.next_event().await;

        let task = tokio::spawn(async move { session.send_command("players").await });

        let request = server.next_event().await.unwrap();
        let crate::proto::ServerEvent::CommandRequest { sequence, text } = request else {
            panic!("expected a CommandRequest event");
        };
        assert_eq!(text, "players");
        server.respond(sequence, "lobby empty");

        let response = task.await.unwrap().unwrap();
        assert_eq!(response, "lobby empty");
        server.stop();
    }

    #[tokio::test]
    async fn s4_fragmented_command_round_trip() {
        let mut server = LoopbackServer::start(LoginPolicy::Accept).await;
        let client = Client::new();
        let session = client
            .connect("127.0.0.1", server.addr.port(), "secret")
            .await
            .unwrap();
        server.next_event().await;

        let response_task = {
            let text = "players";
            tokio::spawn(async move {
                let session = session;
                let resp = session.send_command(text).await;
                (session, resp)
            })
        };

        let request = server.next_event().await.unwrap();
        let crate::proto::ServerEvent::CommandRequest { sequence, .. } = request else {
            panic!("expected a CommandRequest event");
        };
        server.respond_multipart(sequence, &["AA", "BB", "CC"]);

        let (_session, response) = response_task.await.unwrap();
        assert_eq!(response.unwrap(), "AABBCC");
        server.stop();
    }

    #[tokio::test]
    async fn s5_server_message_delivered_and_acked() {
        let mut server = LoopbackServer::start(LoginPolicy::Accept).await;
        let client = Client::new();
        let session = client
            .connect("127.0.0.1", server.addr.port(), "secret")
            .await
            .unwrap();
        server.next_event().await;

        let mut events = session.on_event().unwrap();
        server.send_message(9, "Player connected");
        server.send_message(9, "Player connected");

        let first = events.recv().await.unwrap();
        assert!(matches!(
            first,
            Event::ServerMessage { sequence: 9, ref text } if text == "Player connected"
        ));

        let ack = server.next_event().await.unwrap();
        assert_eq!(ack, crate::proto::ServerEvent::MessageAck { sequence: 9 });
        let ack2 = server.next_event().await.unwrap();
        assert_eq!(ack2, crate::proto::ServerEvent::MessageAck { sequence: 9 });

        server.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn s6_command_timeout_fails_outstanding_waiter() {
        let mut server = LoopbackServer::start(LoginPolicy::Accept).await;
        let config = ConnectorConfig::new().command_timeout(Duration::from_millis(100));
        let client = Client::with_config(config);
        let session = client
            .connect("127.0.0.1", server.addr.port(), "secret")
            .await
            .unwrap();
        server.next_event().await;

        // The server never responds; the command must time out.
        let result = session.send_command("players").await;
        assert!(matches!(result, Err(Error::RconCommand(_))));
        server.stop();
    }

    #[tokio::test]
    async fn connect_times_out_against_a_silent_host() {
        // No server bound on this port; the login handshake never
        // completes within `connection_timeout`.
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dead_port = socket.local_addr().unwrap().port();
        drop(socket);

        let config = ConnectorConfig::new()
            .connection_timeout(Duration::from_millis(50))
            .login_timeout(Duration::from_millis(20));
        let client = Client::with_config(config);
        let err = client
            .connect("127.0.0.1", dead_port, "secret")
            .await
            .unwrap_err();
        assert_eq!(err, Error::LoginTimeout);
    }
}
