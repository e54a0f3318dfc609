use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::oneshot;

use system::euclid::default::{Point2D, Rect, Size2D};
use system::{Action, Color, ConnectionId, Geometry, Role, ShapeAction, ShapeKind};
use whiteboard_server::connection::ConnectionEvent;
use whiteboard_server::handler::SessionRequest;
use whiteboard_server::server::{spawn_server, InspectCommand, Server, ServerCommand};
use whiteboard_server::session::PermissionChange;

struct Client {
    id: ConnectionId,
    rx: UnboundedReceiver<ConnectionEvent>,
}

impl Client {
    fn connect(server: &mut Server) -> Self {
        let (tx, mut rx) = unbounded_channel();
        server.handle_command(ServerCommand::Connect { tx });
        match rx.try_recv() {
            Ok(ConnectionEvent::Connected { connection_id }) => Self {
                id: connection_id,
                rx,
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    fn join(server: &mut Server, username: &str) -> Self {
        let client = Self::connect(server);
        client.request(
            server,
            SessionRequest::Join {
                username: username.into(),
            },
        );
        client
    }

    fn request(&self, server: &mut Server, request: SessionRequest) {
        server.handle_command(ServerCommand::Session {
            from: self.id,
            request,
        });
    }

    fn draw(&self, server: &mut Server, action: Action) {
        self.request(server, SessionRequest::Draw(action));
    }

    fn events(&mut self) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Received actions, skipping roster updates.
    fn actions(&mut self) -> Vec<Action> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ConnectionEvent::Action(Action::UserListUpdate { .. }) => None,
                ConnectionEvent::Action(action) => Some(action),
                _ => None,
            })
            .collect()
    }

    fn last_roster(&mut self) -> Vec<(String, bool)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ConnectionEvent::Action(Action::UserListUpdate { statuses }) => Some(statuses),
                _ => None,
            })
            .last()
            .expect("no roster received")
            .into_iter()
            .map(|s| (s.username, s.has_permission))
            .collect()
    }
}

fn rectangle(x: f32) -> Action {
    Action::Shape(ShapeAction {
        kind: ShapeKind::Rectangle,
        geometry: Geometry::Rect(Rect::new(Point2D::new(x, 0.0), Size2D::new(10.0, 10.0))),
        color: Color { r: 0, g: 0, b: 255 },
        stroke_width: 2.0,
    })
}

fn grant(server: &mut Server, teacher: &Client, student: &str) {
    teacher.request(
        server,
        SessionRequest::SetPermission {
            student: student.into(),
            change: PermissionChange::Grant,
        },
    );
}

fn role_of(actions: &[Action]) -> Option<(Role, bool)> {
    actions.iter().find_map(|action| match action {
        Action::SessionJoinResult { role, can_draw, .. } => Some((*role, *can_draw)),
        _ => None,
    })
}

#[test]
fn teacher_and_student_roles() {
    let mut server = Server::new();
    let mut alice = Client::join(&mut server, "alice");
    let mut bob = Client::join(&mut server, "bob");
    let mut carol = Client::join(&mut server, "carol");

    assert_eq!(role_of(&alice.actions()), Some((Role::Teacher, true)));
    assert_eq!(role_of(&bob.actions()), Some((Role::Student, false)));
    assert_eq!(role_of(&carol.actions()), Some((Role::Student, false)));
}

#[test]
fn join_result_comes_before_replay_and_roster() {
    let mut server = Server::new();
    let alice = Client::join(&mut server, "alice");
    alice.draw(&mut server, rectangle(1.0));

    let mut bob = Client::join(&mut server, "bob");
    let events = bob.events();
    assert!(matches!(
        events[0],
        ConnectionEvent::Action(Action::SessionJoinResult { .. })
    ));
    assert!(matches!(&events[1], ConnectionEvent::Action(action) if *action == rectangle(1.0)));
    assert!(matches!(
        events[2],
        ConnectionEvent::Action(Action::UserListUpdate { .. })
    ));
    assert_eq!(events.len(), 3);
}

#[test]
fn student_drawing_is_rejected_until_granted() {
    let mut server = Server::new();
    let mut alice = Client::join(&mut server, "alice");
    let mut bob = Client::join(&mut server, "bob");
    alice.events();
    bob.events();

    bob.draw(&mut server, rectangle(1.0));
    assert!(alice.actions().is_empty());
    assert!(bob.actions().is_empty());
    assert_eq!(server.status().history_len, 0);

    grant(&mut server, &alice, "bob");
    assert_eq!(
        bob.actions(),
        vec![Action::PermissionStatusUpdate {
            can_draw: true,
            message: PermissionChange::Grant.reason().into(),
        }]
    );
    assert_eq!(
        alice.last_roster(),
        vec![("alice".to_string(), true), ("bob".to_string(), true)]
    );

    bob.draw(&mut server, rectangle(1.0));
    assert_eq!(server.status().history_len, 1);
    assert_eq!(alice.actions(), vec![rectangle(1.0)]);
    assert_eq!(bob.actions(), vec![rectangle(1.0)]);
}

#[test]
fn clear_empties_history_and_reaches_everyone() {
    let mut server = Server::new();
    let alice = Client::join(&mut server, "alice");
    let mut bob = Client::join(&mut server, "bob");
    alice.draw(&mut server, rectangle(1.0));
    alice.draw(&mut server, rectangle(2.0));
    bob.events();

    alice.request(&mut server, SessionRequest::Clear);
    assert_eq!(server.status().history_len, 0);
    assert_eq!(bob.actions(), vec![Action::Clear]);

    let mut carol = Client::join(&mut server, "carol");
    let replay: Vec<_> = carol
        .actions()
        .into_iter()
        .filter(|a| a.is_history_entry())
        .collect();
    assert!(replay.is_empty());
}

#[test]
fn students_cannot_clear_without_permission() {
    let mut server = Server::new();
    let alice = Client::join(&mut server, "alice");
    let bob = Client::join(&mut server, "bob");
    alice.draw(&mut server, rectangle(1.0));

    bob.request(&mut server, SessionRequest::Clear);
    assert_eq!(server.status().history_len, 1);
}

#[test]
fn replay_follows_acceptance_order() {
    let mut server = Server::new();
    let alice = Client::join(&mut server, "alice");
    let bob = Client::join(&mut server, "bob");
    grant(&mut server, &alice, "bob");

    alice.draw(&mut server, rectangle(1.0));
    bob.draw(&mut server, rectangle(2.0));
    alice.draw(&mut server, rectangle(3.0));

    let mut dave = Client::join(&mut server, "dave");
    let replay: Vec<_> = dave
        .actions()
        .into_iter()
        .filter(|a| a.is_history_entry())
        .collect();
    assert_eq!(replay, vec![rectangle(1.0), rectangle(2.0), rectangle(3.0)]);
}

#[test]
fn teacher_leaving_ends_the_session() {
    let mut server = Server::new();
    let alice = Client::join(&mut server, "alice");
    let mut bob = Client::join(&mut server, "bob");
    grant(&mut server, &alice, "bob");
    bob.events();

    server.handle_command(ServerCommand::Disconnect { from: alice.id });
    let events = bob.events();
    assert!(matches!(
        events.as_slice(),
        [ConnectionEvent::Detached { .. }]
    ));
    assert_eq!(server.status().session_id, None);

    bob.draw(&mut server, rectangle(1.0));
    assert_eq!(server.status().history_len, 0);
    assert!(bob.actions().is_empty());

    let mut carol = Client::join(&mut server, "carol");
    assert_eq!(role_of(&carol.actions()), Some((Role::Teacher, true)));

    // Bob's connection may start over once detached.
    bob.request(
        &mut server,
        SessionRequest::Join {
            username: "bob".into(),
        },
    );
    assert_eq!(role_of(&bob.actions()), Some((Role::Student, false)));
}

#[test]
fn student_leaving_updates_the_roster() {
    let mut server = Server::new();
    let mut alice = Client::join(&mut server, "alice");
    let bob = Client::join(&mut server, "bob");
    let _carol = Client::join(&mut server, "carol");
    alice.events();

    server.handle_command(ServerCommand::Disconnect { from: bob.id });
    assert_eq!(
        alice.last_roster(),
        vec![("alice".to_string(), true), ("carol".to_string(), false)]
    );
}

#[test]
fn revoke_undoes_grant() {
    let mut server = Server::new();
    let mut alice = Client::join(&mut server, "alice");
    let mut bob = Client::join(&mut server, "bob");
    grant(&mut server, &alice, "bob");
    alice.request(
        &mut server,
        SessionRequest::SetPermission {
            student: "bob".into(),
            change: PermissionChange::Revoke,
        },
    );

    let updates: Vec<_> = bob
        .actions()
        .into_iter()
        .filter_map(|a| match a {
            Action::PermissionStatusUpdate { can_draw, .. } => Some(can_draw),
            _ => None,
        })
        .collect();
    assert_eq!(updates, vec![true, false]);
    assert_eq!(
        alice.last_roster(),
        vec![("alice".to_string(), true), ("bob".to_string(), false)]
    );

    bob.draw(&mut server, rectangle(1.0));
    assert_eq!(server.status().history_len, 0);
}

#[test]
fn permission_requests_reach_only_the_teacher() {
    let mut server = Server::new();
    let mut alice = Client::join(&mut server, "alice");
    let bob = Client::join(&mut server, "bob");
    let mut carol = Client::join(&mut server, "carol");
    alice.events();
    carol.events();

    bob.request(&mut server, SessionRequest::RequestPermission);
    assert_eq!(
        alice.actions(),
        vec![Action::IncomingPermissionRequest {
            student: "bob".into()
        }]
    );
    assert!(carol.actions().is_empty());
}

#[test]
fn unknown_targets_and_non_teachers_change_nothing() {
    let mut server = Server::new();
    let mut alice = Client::join(&mut server, "alice");
    let bob = Client::join(&mut server, "bob");
    let mut carol = Client::join(&mut server, "carol");
    alice.events();
    carol.events();

    grant(&mut server, &alice, "mallory");
    grant(&mut server, &bob, "carol");

    assert!(alice.events().is_empty());
    assert!(carol.events().is_empty());
    assert!(server
        .status()
        .participants
        .iter()
        .all(|s| s.role == Role::Teacher || !s.has_permission));
}

#[test]
fn rejoining_under_the_same_name_detaches_the_old_connection() {
    let mut server = Server::new();
    let alice = Client::join(&mut server, "alice");
    let mut old_bob = Client::join(&mut server, "bob");
    grant(&mut server, &alice, "bob");
    old_bob.events();

    let mut new_bob = Client::join(&mut server, "bob");
    assert!(old_bob
        .events()
        .iter()
        .any(|e| matches!(e, ConnectionEvent::Detached { .. })));
    assert_eq!(role_of(&new_bob.actions()), Some((Role::Student, false)));

    old_bob.draw(&mut server, rectangle(1.0));
    assert_eq!(server.status().history_len, 0);
    assert_eq!(server.status().participants.len(), 2);
}

#[test]
fn a_second_login_of_the_teacher_is_turned_away() {
    let mut server = Server::new();
    let mut alice = Client::join(&mut server, "alice");
    alice.events();

    let mut second = Client::join(&mut server, "alice");
    let events = second.events();
    assert!(matches!(
        events.as_slice(),
        [ConnectionEvent::Detached { .. }]
    ));
    assert!(alice.events().is_empty());

    let roster: Vec<_> = server
        .status()
        .participants
        .into_iter()
        .map(|s| (s.username, s.role))
        .collect();
    assert_eq!(roster, vec![("alice".to_string(), Role::Teacher)]);
}

#[test]
fn status_serializes_for_the_http_view() {
    let mut server = Server::new();
    let _alice = Client::join(&mut server, "alice");
    let value = serde_json::to_value(server.status()).expect("");
    assert_eq!(value["participants"][0]["username"], "alice");
    assert_eq!(value["participants"][0]["role"], "Teacher");
    assert_eq!(value["history_len"], 0);
    assert_eq!(value["connections"], 1);
}

#[tokio::test]
async fn spawned_server_answers_status_queries() {
    let srv_tx = spawn_server();
    let (tx, mut rx) = unbounded_channel();
    srv_tx.send(ServerCommand::Connect { tx }).expect("");
    let id = match rx.recv().await {
        Some(ConnectionEvent::Connected { connection_id }) => connection_id,
        other => panic!("unexpected {:?}", other),
    };
    srv_tx
        .send(ServerCommand::Session {
            from: id,
            request: SessionRequest::Join {
                username: "alice".into(),
            },
        })
        .expect("");

    let (status_tx, status_rx) = oneshot::channel();
    srv_tx
        .send(ServerCommand::Inspect(InspectCommand::Status { tx: status_tx }))
        .expect("");
    let status = status_rx.await.expect("");
    assert!(status.session_id.is_some());
    assert_eq!(status.participants.len(), 1);

    match rx.recv().await {
        Some(ConnectionEvent::Action(Action::SessionJoinResult { role, .. })) => {
            assert_eq!(role, Role::Teacher)
        }
        other => panic!("unexpected {:?}", other),
    }
}
