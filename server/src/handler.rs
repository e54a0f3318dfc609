use std::sync::Arc;

use system::Action;

use crate::credentials::CredentialStore;
use crate::session::PermissionChange;

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Unauthenticated,
    Authenticated { username: String },
    InSession { username: String },
}

/// What a connection asks of the session task once it is authenticated.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionRequest {
    Join {
        username: String,
    },
    Draw(Action),
    Clear,
    RequestPermission,
    SetPermission {
        student: String,
        change: PermissionChange,
    },
}

#[derive(Debug, PartialEq)]
pub enum Step {
    Reply(Action),
    Forward(SessionRequest),
    Logout,
    /// Not allowed in the current phase; the connection stays open.
    Ignore,
}

/// Per-connection state machine: unauthenticated, authenticated, in session.
///
/// It never decides roles or permissions, it only decides which requests may
/// leave the connection at all.
pub struct ConnectionHandler {
    phase: Phase,
    credentials: Arc<dyn CredentialStore>,
}

impl ConnectionHandler {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            phase: Phase::Unauthenticated,
            credentials,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn username(&self) -> Option<&str> {
        match &self.phase {
            Phase::Unauthenticated => None,
            Phase::Authenticated { username } | Phase::InSession { username } => Some(username),
        }
    }

    /// The session this connection belonged to is gone; it may start or join a new one.
    pub fn detach(&mut self) {
        if let Phase::InSession { username } = &self.phase {
            self.phase = Phase::Authenticated {
                username: username.clone(),
            };
        }
    }

    pub fn handle(&mut self, action: Action) -> Step {
        match action {
            Action::Logout => Step::Logout,

            Action::Register { username, password } => match self.phase {
                Phase::Unauthenticated => Step::Reply(self.register(&username, &password)),
                _ => self.ignore("Register"),
            },
            Action::Login { username, password } => match self.phase {
                Phase::Unauthenticated => Step::Reply(self.login(username, &password)),
                _ => self.ignore("Login"),
            },

            Action::StartSession => match &self.phase {
                Phase::Authenticated { username } => {
                    let username = username.clone();
                    self.phase = Phase::InSession {
                        username: username.clone(),
                    };
                    Step::Forward(SessionRequest::Join { username })
                }
                _ => self.ignore("StartSession"),
            },

            action @ (Action::Shape(_) | Action::Text(_)) => {
                self.in_session(|| SessionRequest::Draw(action))
            }
            Action::Clear => self.in_session(|| SessionRequest::Clear),
            Action::PermissionRequest => self.in_session(|| SessionRequest::RequestPermission),
            Action::PermissionResponse { student, granted } => {
                self.in_session(|| SessionRequest::SetPermission {
                    student,
                    change: if granted {
                        PermissionChange::Grant
                    } else {
                        PermissionChange::Deny
                    },
                })
            }
            Action::RevokePermission { student } => {
                self.in_session(|| SessionRequest::SetPermission {
                    student,
                    change: PermissionChange::Revoke,
                })
            }

            Action::AuthResult { .. }
            | Action::SessionJoinResult { .. }
            | Action::SessionEnded { .. }
            | Action::UserListUpdate { .. }
            | Action::IncomingPermissionRequest { .. }
            | Action::PermissionStatusUpdate { .. } => self.ignore("server-only action"),
        }
    }

    fn in_session(&self, request: impl FnOnce() -> SessionRequest) -> Step {
        match self.phase {
            Phase::InSession { .. } => Step::Forward(request()),
            _ => self.ignore("session action outside a session"),
        }
    }

    fn ignore(&self, what: &str) -> Step {
        log::debug!("Ignoring {} in phase {:?}", what, self.phase);
        Step::Ignore
    }

    fn register(&self, username: &str, password: &str) -> Action {
        if username.trim().is_empty() || password.is_empty() {
            return auth_failure("Username and password must not be empty.");
        }
        match self.credentials.register(username, password) {
            Ok(true) => Action::AuthResult {
                success: true,
                message: "Registration succeeded, please log in.".into(),
                username: None,
            },
            Ok(false) => auth_failure("Registration failed, the username may already exist."),
            Err(err) => {
                log::error!("Registering {} failed: {}", username, err);
                auth_failure("Registration failed, please try again later.")
            }
        }
    }

    fn login(&mut self, username: String, password: &str) -> Action {
        if username.trim().is_empty() || password.is_empty() {
            return auth_failure("Username and password must not be empty.");
        }
        match self.credentials.verify(&username, password) {
            Ok(true) => {
                log::info!("{} logged in", username);
                self.phase = Phase::Authenticated {
                    username: username.clone(),
                };
                Action::AuthResult {
                    success: true,
                    message: "Login succeeded.".into(),
                    username: Some(username),
                }
            }
            Ok(false) => auth_failure("Login failed, wrong username or password."),
            Err(err) => {
                log::error!("Verifying {} failed: {}", username, err);
                auth_failure("Login failed, please try again later.")
            }
        }
    }
}

fn auth_failure(message: &str) -> Action {
    Action::AuthResult {
        success: false,
        message: message.into(),
        username: None,
    }
}
