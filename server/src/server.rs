use std::collections::VecDeque;
use std::num::Wrapping;

use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::oneshot;

use system::{Action, ConnectionId, SessionId, UserStatus};

use crate::broadcast::{BroadcastHub, ConnectionTx};
use crate::connection::ConnectionEvent;
use crate::handler::SessionRequest;
use crate::history::HistoryStore;
use crate::session::{BrokerError, Left, SessionBroker};

pub type ServerTx = UnboundedSender<ServerCommand>;

#[derive(Debug)]
pub enum ServerCommand {
    Connect {
        tx: ConnectionTx,
    },
    Disconnect {
        from: ConnectionId,
    },
    Session {
        from: ConnectionId,
        request: SessionRequest,
    },
    Inspect(InspectCommand),
}

#[derive(Debug)]
pub enum InspectCommand {
    Status { tx: oneshot::Sender<SessionStatus> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub session_id: Option<SessionId>,
    pub participants: Vec<UserStatus>,
    pub history_len: usize,
    pub connections: usize,
}

/// Owns every piece of shared state. Commands are handled one at a time and
/// each runs to completion, which is what orders broadcasts globally.
#[derive(Default)]
pub struct Server {
    broker: SessionBroker,
    history: HistoryStore,
    connections: BroadcastHub,
    connection_id_source: Wrapping<ConnectionId>,
    unreachable: VecDeque<ConnectionId>,
}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_command(&mut self, command: ServerCommand) {
        match command {
            ServerCommand::Connect { tx } => self.connect(tx),
            ServerCommand::Disconnect { from } => self.disconnect(from),
            ServerCommand::Session { from, request } => self.handle_session_request(from, request),
            ServerCommand::Inspect(InspectCommand::Status { tx }) => {
                let _ = tx.send(self.status());
            }
        }

        while let Some(connection_id) = self.unreachable.pop_front() {
            log::warn!("Connection {} is unreachable, dropping it", connection_id);
            self.disconnect(connection_id);
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.broker.session_id(),
            participants: self.broker.list_statuses(),
            history_len: self.history.len(),
            connections: self.connections.len(),
        }
    }

    fn connect(&mut self, tx: ConnectionTx) {
        let connection_id = self.new_connection_id();
        self.connections.insert(connection_id, tx);
        log::info!("Connection {} opened", connection_id);
        self.deliver(connection_id, ConnectionEvent::Connected { connection_id });
    }

    fn disconnect(&mut self, connection_id: ConnectionId) {
        if self.connections.remove(&connection_id).is_some() {
            log::info!("Connection {} closed", connection_id);
        }
        match self.broker.leave(connection_id) {
            Left::NotMember => {}
            Left::Student { .. } => self.broadcast_roster(),
            Left::SessionClosed {
                session_id,
                detached,
            } => {
                log::info!(
                    "Session {} ended, detaching {} students",
                    session_id,
                    detached.len()
                );
                for student in detached {
                    self.deliver(
                        student,
                        ConnectionEvent::Detached {
                            reason: "The teacher left, the session has ended.".into(),
                        },
                    );
                }
            }
        }
    }

    fn handle_session_request(&mut self, from: ConnectionId, request: SessionRequest) {
        match request {
            SessionRequest::Join { username } => self.join(from, &username),
            SessionRequest::Draw(action) => {
                if self.accepts_drawing(from, &action) {
                    match self.history.append(action.clone()) {
                        Ok(()) => self.broadcast(&action),
                        Err(err) => log::warn!("Dropped drawing from {}: {}", from, err),
                    }
                }
            }
            SessionRequest::Clear => {
                if self.accepts_drawing(from, &Action::Clear) {
                    self.history.clear();
                    self.broadcast(&Action::Clear);
                }
            }
            SessionRequest::RequestPermission => match self.broker.request_permission(from) {
                Ok((teacher, student)) => {
                    log::info!("Forwarding permission request of {} to the teacher", student);
                    self.deliver(
                        teacher,
                        ConnectionEvent::Action(Action::IncomingPermissionRequest { student }),
                    );
                }
                Err(err) => log::warn!("Permission request from {} dropped: {}", from, err),
            },
            SessionRequest::SetPermission { student, change } => {
                match self.broker.set_permission(from, &student, change) {
                    Ok(target) => {
                        self.deliver(
                            target,
                            ConnectionEvent::Action(Action::PermissionStatusUpdate {
                                can_draw: change.granted(),
                                message: change.reason().into(),
                            }),
                        );
                        self.broadcast_roster();
                    }
                    Err(err) => log::warn!("Permission change from {} dropped: {}", from, err),
                }
            }
        }
    }

    /// Join reply, history replay and roster broadcast happen within one
    /// command, so no drawing can slip between the replay and live delivery.
    fn join(&mut self, from: ConnectionId, username: &str) {
        if !self.connections.contains(&from) {
            log::warn!("Join from closed connection {} ignored", from);
            return;
        }
        let joined = match self.broker.join(from, username) {
            Ok(joined) => joined,
            Err(err @ BrokerError::TeacherName(_)) => {
                log::warn!("Join from {} rejected: {}", from, err);
                self.deliver(
                    from,
                    ConnectionEvent::Detached {
                        reason: format!("{} is already teaching this session.", username),
                    },
                );
                return;
            }
            Err(err) => {
                log::warn!("Join from {} rejected: {}", from, err);
                return;
            }
        };

        if let Some(stale) = joined.replaced {
            self.deliver(
                stale,
                ConnectionEvent::Detached {
                    reason: "You joined the session from another connection.".into(),
                },
            );
        }
        self.deliver(
            from,
            ConnectionEvent::Action(Action::SessionJoinResult {
                session_id: joined.session_id,
                role: joined.role,
                can_draw: joined.can_draw,
            }),
        );
        let history = self.history.snapshot();
        log::debug!("Replaying {} actions to {}", history.len(), from);
        for action in history {
            self.deliver(from, ConnectionEvent::Action(action));
        }
        self.broadcast_roster();
    }

    fn accepts_drawing(&self, from: ConnectionId, action: &Action) -> bool {
        match self.broker.participant(from) {
            None => {
                log::info!("Rejected {} from {}: not in a session", action.name(), from);
                false
            }
            Some(participant) if !self.broker.can_draw(from) => {
                log::info!(
                    "Rejected {} from {}: no drawing permission",
                    action.name(),
                    participant.username
                );
                false
            }
            Some(_) => true,
        }
    }

    fn broadcast(&mut self, action: &Action) {
        let members = self.broker.members();
        let failed = self.connections.broadcast(&members, action);
        self.unreachable.extend(failed);
    }

    fn broadcast_roster(&mut self) {
        let statuses = self.broker.list_statuses();
        log::debug!(
            "Roster: {:?}",
            statuses.iter().map(|s| &s.username).collect::<Vec<_>>()
        );
        self.broadcast(&Action::UserListUpdate { statuses });
    }

    fn deliver(&mut self, to: ConnectionId, event: ConnectionEvent) {
        if !self.connections.send(&to, event) {
            self.unreachable.push_back(to);
        }
    }

    fn new_connection_id(&mut self) -> ConnectionId {
        loop {
            self.connection_id_source += Wrapping(1);
            let candidate = self.connection_id_source.0;
            if !self.connections.contains(&candidate) {
                return candidate;
            }
        }
    }
}

pub fn spawn_server() -> ServerTx {
    let (srv_tx, mut srv_rx) = unbounded_channel::<ServerCommand>();

    tokio::spawn(async move {
        let mut server = Box::new(Server::new());

        while let Some(command) = srv_rx.recv().await {
            server.handle_command(command);
        }
        log::info!("Session task terminated");
    });

    srv_tx
}
