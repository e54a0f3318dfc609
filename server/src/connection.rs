use std::sync::Arc;

use actix::{Actor, ActorContext, AsyncContext, Handler, Message, Running, StreamHandler};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use actix_web_actors::ws::{CloseCode, CloseReason};

use system::{decode_action, encode_action, Action, ConnectionId};

use crate::credentials::CredentialStore;
use crate::handler::{ConnectionHandler, SessionRequest, Step};
use crate::server::{ServerCommand, ServerTx};

/// Everything the session task can push to a connection.
#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { connection_id: ConnectionId },
    Action(Action),
    /// The connection is no longer part of the session it joined.
    Detached { reason: String },
}

#[derive(Message)]
#[rtype(result = "()")]
struct ConnectionActorMessage(ConnectionEvent);

enum ConnectionState {
    /// Waiting for the session task to assign an id; requests are held back.
    Idle(Vec<SessionRequest>),
    Connected(ConnectionId),
}

struct ConnectionActor {
    state: ConnectionState,
    handler: ConnectionHandler,
    srv_tx: ServerTx,
}

impl ConnectionActor {
    fn send_to_server(&self, command: ServerCommand, ctx: &mut ws::WebsocketContext<Self>) {
        if self.srv_tx.send(command).is_err() {
            log::error!("Session task is gone, closing connection");
            ctx.stop();
        }
    }

    fn forward(&mut self, request: SessionRequest, ctx: &mut ws::WebsocketContext<Self>) {
        match &mut self.state {
            ConnectionState::Idle(pending) => pending.push(request),
            ConnectionState::Connected(from) => {
                let from = *from;
                self.send_to_server(ServerCommand::Session { from, request }, ctx);
            }
        }
    }

    fn write(&self, action: &Action, ctx: &mut ws::WebsocketContext<Self>) {
        match encode_action(action) {
            Ok(bytes) => ctx.binary(bytes),
            Err(err) => log::error!("{}", err),
        }
    }

    fn handle_action(&mut self, action: Action, ctx: &mut ws::WebsocketContext<Self>) {
        match self.handler.handle(action) {
            Step::Reply(reply) => self.write(&reply, ctx),
            Step::Forward(request) => self.forward(request, ctx),
            Step::Logout => {
                log::info!(
                    "{} logged out",
                    self.handler.username().unwrap_or("[unauthenticated]")
                );
                ctx.close(Some(CloseReason {
                    code: CloseCode::Normal,
                    description: None,
                }));
                ctx.stop();
            }
            Step::Ignore => (),
        }
    }
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ConnectionEvent>();

        self.send_to_server(ServerCommand::Connect { tx }, ctx);

        let addr = ctx.address().recipient();
        let srv_tx = self.srv_tx.clone();

        tokio::spawn(async move {
            log::debug!("connection green thread - started");
            while let Some(msg) = rx.recv().await {
                // Dropping `rx` is how the session task learns this connection is gone.
                if !addr.connected() {
                    // Stopped before its id arrived, so `stopping` could not report it.
                    if let ConnectionEvent::Connected { connection_id } = msg {
                        let _ = srv_tx.send(ServerCommand::Disconnect {
                            from: connection_id,
                        });
                    }
                    break;
                }
                addr.do_send(ConnectionActorMessage(msg));
            }
            log::debug!("connection green thread - terminated");
        });
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(from) = self.state {
            let _ = self.srv_tx.send(ServerCommand::Disconnect { from });
        }

        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Binary(bin)) => {
                log::debug!("Ingress size: {}", bin.len());
                match decode_action(&bin) {
                    Ok(action) => {
                        log::debug!("Ingress {}", action.name());
                        self.handle_action(action, ctx);
                    }
                    Err(err) => {
                        log::warn!("Closing connection: {}", err);
                        ctx.close(Some(CloseReason {
                            code: CloseCode::Invalid,
                            description: None,
                        }));
                        ctx.stop();
                    }
                }
            }
            Ok(ws::Message::Close(_)) => ctx.stop(),
            Err(err) => {
                log::warn!("Closing connection after read failure: {}", err);
                ctx.stop();
            }
            // Text frames carry nothing in this protocol.
            _ => (),
        }
    }
}

/// Egress
impl Handler<ConnectionActorMessage> for ConnectionActor {
    type Result = ();

    fn handle(
        &mut self,
        msg: ConnectionActorMessage,
        ctx: &mut ws::WebsocketContext<Self>,
    ) -> Self::Result {
        match msg.0 {
            ConnectionEvent::Connected { connection_id } => {
                let pending = match std::mem::replace(
                    &mut self.state,
                    ConnectionState::Connected(connection_id),
                ) {
                    ConnectionState::Idle(pending) => pending,
                    ConnectionState::Connected(_) => Vec::new(),
                };
                for request in pending {
                    self.forward(request, ctx);
                }
            }
            ConnectionEvent::Action(action) => {
                log::debug!("Egress {}", action.name());
                self.write(&action, ctx);
            }
            ConnectionEvent::Detached { reason } => {
                self.handler.detach();
                self.write(&Action::SessionEnded { reason }, ctx);
            }
        }
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    srv_tx: web::Data<ServerTx>,
    credentials: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, Error> {
    let credentials: Arc<dyn CredentialStore> = credentials.into_inner();
    ws::start(
        ConnectionActor {
            state: ConnectionState::Idle(Vec::new()),
            handler: ConnectionHandler::new(credentials),
            srv_tx: srv_tx.get_ref().clone(),
        },
        &req,
        stream,
    )
}
