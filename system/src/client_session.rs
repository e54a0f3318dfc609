use crate::{Action, Role, SessionMode, UserStatus};

/// Presentation side of a client. The session only ever hands it actions in
/// the order the server accepted them (or local ones in private mode).
pub trait DrawingSink {
    fn apply_drawing_action(&mut self, action: &Action);
    fn apply_clear(&mut self);

    fn auth_result(&mut self, _success: bool, _message: &str) {}
    fn role_assigned(&mut self, _role: Role, _can_draw: bool) {}
    fn permission_changed(&mut self, _can_draw: bool, _message: &str) {}
    fn permission_requested(&mut self, _student: &str) {}
    fn roster_changed(&mut self, _statuses: &[UserStatus]) {}
    fn session_ended(&mut self, _reason: &str) {}
}

pub struct ClientSession<S: DrawingSink> {
    sink: S,
    username: Option<String>,
    mode: Option<SessionMode>,
    role: Option<Role>,
    can_draw: bool,
    roster: Vec<UserStatus>,
}

impl<S: DrawingSink> ClientSession<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            username: None,
            mode: None,
            role: None,
            can_draw: false,
            roster: Vec::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn mode(&self) -> Option<SessionMode> {
        self.mode
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn can_draw(&self) -> bool {
        self.can_draw
    }

    pub fn roster(&self) -> &[UserStatus] {
        &self.roster
    }

    /// Returns the action to send to the server, if any.
    pub fn enter_mode(&mut self, mode: SessionMode) -> Option<Action> {
        if self.username.is_none() {
            log::warn!("Cannot enter {:?} mode before logging in", mode);
            return None;
        }
        if mode == SessionMode::Shared && self.in_shared_session() {
            log::debug!("Already in a shared session as {:?}", self.role);
            return None;
        }
        self.mode = Some(mode);
        match mode {
            SessionMode::Private => {
                self.role = Some(Role::Teacher);
                self.can_draw = true;
                self.sink.role_assigned(Role::Teacher, true);
                None
            }
            SessionMode::Shared => {
                self.role = None;
                self.can_draw = false;
                Some(Action::StartSession)
            }
        }
    }

    /// An action produced by local input; returns what to send to the server.
    /// In shared mode drawings are rendered once the server echoes them back,
    /// never before.
    pub fn submit_local(&mut self, action: Action) -> Option<Action> {
        if !action.is_drawing() {
            return self.outgoing_control(action);
        }
        match self.mode {
            Some(SessionMode::Private) => {
                self.apply(&action);
                None
            }
            Some(SessionMode::Shared) if self.can_draw => Some(action),
            _ => {
                log::debug!("Dropping local {} without drawing permission", action.name());
                None
            }
        }
    }

    pub fn handle_server_action(&mut self, action: Action) {
        match action {
            Action::AuthResult {
                success,
                message,
                username,
            } => {
                if success {
                    if let Some(username) = username {
                        self.username = Some(username);
                    }
                }
                self.sink.auth_result(success, &message);
            }
            Action::SessionJoinResult { role, can_draw, .. } => {
                self.role = Some(role);
                self.can_draw = can_draw;
                self.sink.role_assigned(role, can_draw);
            }
            Action::SessionEnded { reason } => {
                self.role = None;
                self.can_draw = false;
                self.roster.clear();
                self.sink.session_ended(&reason);
            }
            Action::UserListUpdate { statuses } => {
                if self.mode == Some(SessionMode::Shared) {
                    self.sink.roster_changed(&statuses);
                    self.roster = statuses;
                }
            }
            Action::IncomingPermissionRequest { student } => {
                if self.role == Some(Role::Teacher) {
                    self.sink.permission_requested(&student);
                }
            }
            Action::PermissionStatusUpdate { can_draw, message } => {
                self.can_draw = can_draw;
                self.sink.permission_changed(can_draw, &message);
            }
            action @ (Action::Shape(_) | Action::Text(_) | Action::Clear) => {
                if self.mode == Some(SessionMode::Shared) {
                    self.apply(&action);
                }
            }
            other => log::debug!("Ignoring unexpected {} from server", other.name()),
        }
    }

    fn in_shared_session(&self) -> bool {
        self.mode == Some(SessionMode::Shared) && self.role.is_some()
    }

    fn outgoing_control(&mut self, action: Action) -> Option<Action> {
        let allowed = match &action {
            Action::Register { .. } | Action::Login { .. } => self.username.is_none(),
            Action::Logout => self.username.is_some(),
            Action::StartSession => return self.enter_mode(SessionMode::Shared),
            Action::PermissionRequest => {
                self.in_shared_session() && self.role == Some(Role::Student)
            }
            Action::PermissionResponse { .. } | Action::RevokePermission { .. } => {
                self.in_shared_session() && self.role == Some(Role::Teacher)
            }
            _ => false,
        };
        if allowed {
            Some(action)
        } else {
            log::debug!("Not sending local {} in the current state", action.name());
            None
        }
    }

    fn apply(&mut self, action: &Action) {
        if let Action::Clear = action {
            self.sink.apply_clear();
        } else {
            self.sink.apply_drawing_action(action);
        }
    }
}
