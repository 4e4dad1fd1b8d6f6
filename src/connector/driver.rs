//! The background task that drives [`crate::proto::ClientStateMachine`]
//! against a real [`UdpSocket`] (spec §4.3, §5).
//!
//! The four conceptual tasks spec §4.3 describes (reader, writer,
//! keep-alive, reconnect supervisor) are folded into a single
//! `tokio::select!` loop inside [`Driver::run`] rather than four spawned
//! tasks: since the state machine is the sole mutable resource and is
//! never reentrant (spec §5), one task owning it outright is a simpler
//! way to get the same exclusion a mutex would buy a multi-task design.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, sleep_until, Instant as TokioInstant};

use crate::connector::config::ConnectorConfig;
use crate::connector::event::{DisconnectCause, Event, LoginFailureKind};
use crate::connector::reconnect::Backoff;
use crate::error::Error;
use crate::packet::{Packet, MAX_PACKET_SIZE};
use crate::proto::{self, ClientStateMachine};

/// Evenly spaced retransmissions of an outstanding command within one
/// `command_timeout` window: `command_timeout / (N+1)` per spec §4.3,
/// with `N = RETRANSMIT_SLOTS - 1`.
const RETRANSMIT_SLOTS: u32 = 4;

/// A request sent from a [`super::Session`] to its [`Driver`] task.
pub(crate) enum DriverCommand {
    /// Issue a command and wait for its assembled response.
    Command {
        text: String,
        reply: oneshot::Sender<Result<String, Error>>,
    },
    /// Issue a command without waiting for a response (spec §6
    /// `Session::send`).
    FireAndForget { text: String },
    /// Register a new event subscriber.
    Subscribe { sink: mpsc::UnboundedSender<Event> },
    /// Tear down the session.
    Shutdown,
}

/// Shared, lock-free observability for [`super::Session`]'s `is_running` /
/// `is_connected` / `is_logged_in`.
#[derive(Debug, Clone)]
pub(crate) struct SharedState {
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) connected: Arc<AtomicBool>,
    pub(crate) logged_in: Arc<AtomicBool>,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            connected: Arc::new(AtomicBool::new(false)),
            logged_in: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Bookkeeping for one outstanding command's retransmit/timeout timers,
/// owned by the driver (spec §4.3 "Command lifecycle").
struct CommandTimers {
    /// The exact `ClientCommand` frame to resend verbatim.
    bytes: Vec<u8>,
    next_retransmit: TokioInstant,
    retransmit_interval: Duration,
    deadline: TokioInstant,
}

/// Drives one session: binds no socket itself (the caller already bound
/// and connected one), runs the login handshake, then pumps datagrams
/// until closed or disconnected, reconnecting with backoff in between.
pub(crate) struct Driver {
    socket: UdpSocket,
    sm: ClientStateMachine,
    config: ConnectorConfig,
    password: String,
    cmd_rx: mpsc::UnboundedReceiver<DriverCommand>,
    subscribers: Vec<mpsc::UnboundedSender<Event>>,
    waiters: HashMap<u8, oneshot::Sender<Result<String, Error>>>,
    shared: SharedState,
}

impl Driver {
    pub(crate) fn new(
        socket: UdpSocket,
        config: ConnectorConfig,
        password: String,
        cmd_rx: mpsc::UnboundedReceiver<DriverCommand>,
        shared: SharedState,
    ) -> Result<Self, Error> {
        Ok(Self {
            socket,
            sm: ClientStateMachine::new(config.nonce_window)?,
            config,
            password,
            cmd_rx,
            subscribers: Vec::new(),
            waiters: HashMap::new(),
            shared,
        })
    }

    fn retransmit_interval(&self) -> Duration {
        self.config.command_timeout / RETRANSMIT_SLOTS
    }

    fn publish(&mut self, event: Event) {
        self.subscribers
            .retain(|sink| sink.send(event.clone()).is_ok());
    }

    /// Drains any connector commands queued before the socket existed
    /// (`Subscribe` in particular, so a caller that subscribes before the
    /// first `Login` event doesn't miss it), without blocking.
    fn drain_pending_subscriptions(&mut self) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            if let DriverCommand::Subscribe { sink } = cmd {
                self.subscribers.push(sink);
            }
        }
    }

    /// Runs the driver to completion: authenticate, serve the session,
    /// reconnect on failure, repeat — until closed, login is refused, or
    /// the reconnect attempt budget is exhausted.
    ///
    /// `ready_tx`, if still `Some`, is resolved exactly once: with the
    /// outcome of the very first login attempt. [`super::Client::connect`]
    /// awaits it (under its own `connection_timeout`); subsequent
    /// reconnects instead publish [`Event::Login`] /
    /// [`Event::LoginFailure`].
    pub(crate) async fn run(mut self, mut ready_tx: Option<oneshot::Sender<Result<(), Error>>>) {
        let backoff = Backoff::new(&self.config);
        let mut attempt: u32 = 0;

        loop {
            self.drain_pending_subscriptions();

            match self.authenticate().await {
                Ok(()) => {
                    attempt = 0;
                    self.shared.connected.store(true, Ordering::Release);
                    self.shared.logged_in.store(true, Ordering::Release);
                    if let Some(tx) = ready_tx.take() {
                        let _ = tx.send(Ok(()));
                    } else {
                        self.publish(Event::Login);
                    }
                }
                Err(Error::LoginRefused) => {
                    if let Some(tx) = ready_tx.take() {
                        let _ = tx.send(Err(Error::LoginRefused));
                    } else {
                        self.publish(Event::LoginFailure(LoginFailureKind::Refused));
                    }
                    self.shared.running.store(false, Ordering::Release);
                    return;
                }
                Err(e) => {
                    log::warn!("login attempt failed: {e}");
                    if ready_tx.is_none() {
                        self.publish(Event::LoginFailure(LoginFailureKind::Timeout));
                    }
                    if self.reconnects_exhausted(attempt) {
                        if let Some(tx) = ready_tx.take() {
                            let _ = tx.send(Err(e));
                        }
                        self.shared.running.store(false, Ordering::Release);
                        return;
                    }
                    self.sm.reset();
                    let delay = backoff.delay(attempt);
                    attempt += 1;
                    sleep(delay).await;
                    continue;
                }
            }

            let cause = self.session_loop().await;

            self.shared.connected.store(false, Ordering::Release);
            self.shared.logged_in.store(false, Ordering::Release);
            self.sm.reset();
            self.publish(Event::Disconnected(cause.clone()));

            if cause == DisconnectCause::Closed {
                self.shared.running.store(false, Ordering::Release);
                return;
            }

            if self.reconnects_exhausted(attempt) {
                self.publish(Event::Disconnected(DisconnectCause::ReconnectExhausted));
                self.shared.running.store(false, Ordering::Release);
                return;
            }

            let delay = backoff.delay(attempt);
            attempt += 1;
            sleep(delay).await;
        }
    }

    fn reconnects_exhausted(&self, attempt: u32) -> bool {
        matches!(self.config.reconnect_max_attempts, Some(max) if attempt >= max)
    }

    /// Sends `ClientLogin`, then waits for `ServerLogin`, resending the
    /// same login frame every `login_timeout` until `connection_timeout`
    /// elapses overall (spec §4.3 "Login handshake").
    async fn authenticate(&mut self) -> Result<(), Error> {
        self.sm.send_login(&self.password)?;
        let login_bytes = match self.sm.events_to_send().into_iter().next() {
            Some(bytes) => bytes,
            None => {
                return Err(Error::Io(
                    "state machine produced no ClientLogin frame".to_string(),
                ))
            }
        };
        self.socket.send(&login_bytes).await?;

        let deadline = TokioInstant::now() + self.config.connection_timeout;
        let mut buf = vec![0u8; MAX_PACKET_SIZE];

        loop {
            let now = TokioInstant::now();
            if now >= deadline {
                return Err(Error::LoginTimeout);
            }
            let wait = (deadline - now).min(self.config.login_timeout);

            match tokio::time::timeout(wait, self.socket.recv(&mut buf)).await {
                Ok(Ok(n)) => {
                    self.sm.receive_datagram(&buf[..n])?;
                    for event in self.sm.events_received() {
                        match event {
                            proto::Event::LoginSuccess => return Ok(()),
                            proto::Event::LoginRefused => return Err(Error::LoginRefused),
                            _ => {}
                        }
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_elapsed) => {
                    log::debug!("no ServerLogin yet, resending ClientLogin");
                    self.socket.send(&login_bytes).await?;
                }
            }
        }
    }

    /// Serves one authenticated session until it ends, for whatever
    /// reason (spec §4.3's reader/writer/keep-alive loop).
    async fn session_loop(&mut self) -> DisconnectCause {
        let mut pending: HashMap<u8, CommandTimers> = HashMap::new();
        let mut buf = vec![0u8; MAX_PACKET_SIZE];

        let keep_alive_interval = self.config.keep_alive_interval;
        let silence_timeout = self.config.server_silence_timeout;

        tokio::pin! {
            let keep_alive = sleep(keep_alive_interval);
            let silence = sleep(silence_timeout);
        }

        let cause = loop {
            let next_command_deadline = pending
                .values()
                .map(|t| t.next_retransmit.min(t.deadline))
                .min();

            let command_tick = async {
                match next_command_deadline {
                    Some(instant) => sleep_until(instant).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;

                _ = &mut silence => break DisconnectCause::ServerSilence,

                _ = &mut keep_alive => {
                    self.send_keep_alive(&mut pending).await;
                    keep_alive.as_mut().reset(TokioInstant::now() + keep_alive_interval);
                }

                _ = command_tick => {
                    self.service_command_timers(&mut pending).await;
                }

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        None | Some(DriverCommand::Shutdown) => {
                            self.sm.close();
                            break DisconnectCause::Closed;
                        }
                        Some(DriverCommand::Subscribe { sink }) => {
                            self.subscribers.push(sink);
                        }
                        Some(DriverCommand::Command { text, reply }) => {
                            self.handle_send_command(text, Some(reply), &mut pending).await;
                            keep_alive.as_mut().reset(TokioInstant::now() + keep_alive_interval);
                        }
                        Some(DriverCommand::FireAndForget { text }) => {
                            self.handle_send_command(text, None, &mut pending).await;
                            keep_alive.as_mut().reset(TokioInstant::now() + keep_alive_interval);
                        }
                    }
                }

                recv = self.socket.recv(&mut buf) => {
                    match recv {
                        Ok(n) => {
                            silence.as_mut().reset(TokioInstant::now() + silence_timeout);
                            if let Err(e) = self.sm.receive_datagram(&buf[..n]) {
                                log::debug!("dropping datagram: {e}");
                            } else {
                                self.dispatch_events(&mut pending);
                                if let Err(e) = self.flush_outgoing().await {
                                    log::debug!("failed flushing queued frames: {e}");
                                }
                            }
                        }
                        Err(e) => break DisconnectCause::Io(e.to_string()),
                    }
                }
            }
        };

        self.fail_all_pending(&mut pending);
        cause
    }

    fn fail_all_pending(&mut self, pending: &mut HashMap<u8, CommandTimers>) {
        pending.clear();
        for (_, tx) in self.waiters.drain() {
            let _ = tx.send(Err(Error::NotConnected));
        }
    }

    async fn flush_outgoing(&mut self) -> Result<(), Error> {
        for frame in self.sm.events_to_send() {
            self.socket.send(&frame).await?;
        }
        Ok(())
    }

    async fn send_keep_alive(&mut self, pending: &mut HashMap<u8, CommandTimers>) {
        self.handle_send_command(String::new(), None, pending).await;
    }

    async fn handle_send_command(
        &mut self,
        text: String,
        reply: Option<oneshot::Sender<Result<String, Error>>>,
        pending: &mut HashMap<u8, CommandTimers>,
    ) {
        match self.sm.send_command(&text) {
            Ok(sequence) => {
                if let Some(tx) = reply {
                    self.waiters.insert(sequence, tx);
                }
                if let Ok(bytes) = (Packet::ClientCommand { sequence, text }).encode() {
                    let now = TokioInstant::now();
                    let retransmit_interval = self.retransmit_interval();
                    pending.insert(
                        sequence,
                        CommandTimers {
                            bytes,
                            next_retransmit: now + retransmit_interval,
                            retransmit_interval,
                            deadline: now + self.config.command_timeout,
                        },
                    );
                }
                if let Err(e) = self.flush_outgoing().await {
                    log::debug!("send failed for sequence {sequence}: {e}");
                }
            }
            Err(e) => {
                if let Some(tx) = reply {
                    let _ = tx.send(Err(e));
                }
            }
        }
    }

    async fn service_command_timers(&mut self, pending: &mut HashMap<u8, CommandTimers>) {
        let now = TokioInstant::now();
        let mut timed_out = Vec::new();
        let mut to_retransmit = Vec::new();

        for (&sequence, timers) in pending.iter_mut() {
            if now >= timers.deadline {
                timed_out.push(sequence);
            } else if now >= timers.next_retransmit {
                to_retransmit.push(sequence);
                timers.next_retransmit = now + timers.retransmit_interval;
            }
        }

        for sequence in to_retransmit {
            if let Some(timers) = pending.get(&sequence) {
                if let Err(e) = self.socket.send(&timers.bytes).await {
                    log::debug!("retransmit failed for sequence {sequence}: {e}");
                }
            }
        }

        for sequence in timed_out {
            pending.remove(&sequence);
            self.sm.cancel_command(sequence);
            if let Some(tx) = self.waiters.remove(&sequence) {
                let _ = tx.send(Err(Error::RconCommand(format!(
                    "no response for sequence {sequence} within the command timeout"
                ))));
            }
        }
    }

    fn dispatch_events(&mut self, pending: &mut HashMap<u8, CommandTimers>) {
        for event in self.sm.events_received() {
            if let proto::Event::CommandResponse { sequence, ref text } = event {
                pending.remove(&sequence);
                if let Some(tx) = self.waiters.remove(&sequence) {
                    let _ = tx.send(Ok(text.clone()));
                }
            }
            if let Some(public) = to_public_event(event) {
                self.publish(public);
            }
        }
    }
}

fn to_public_event(event: proto::Event) -> Option<Event> {
    match event {
        proto::Event::RawPacket(p) => Some(Event::RawPacket(p)),
        proto::Event::ServerMessage { sequence, text } => {
            Some(Event::ServerMessage { sequence, text })
        }
        proto::Event::CommandResponse { sequence, text } => {
            Some(Event::CommandResponse { sequence, text })
        }
        proto::Event::LoginSuccess | proto::Event::LoginRefused | proto::Event::Closed => None,
    }
}
