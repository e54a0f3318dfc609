use std::collections::HashSet;

use system::{ConnectionId, Role, SessionId, UserStatus};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BrokerError {
    #[error("no session is running")]
    NoSession,
    #[error("connection {0} is not in the session")]
    NotMember(ConnectionId),
    #[error("connection {0} already joined the session")]
    AlreadyJoined(ConnectionId),
    #[error("connection {0} is not the teacher")]
    NotTeacher(ConnectionId),
    #[error("connection {0} is not a student")]
    NotStudent(ConnectionId),
    #[error("no student named {0:?} in the session")]
    UnknownTarget(String),
    #[error("{0:?} is already the teacher of the session")]
    TeacherName(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PermissionChange {
    Grant,
    Deny,
    Revoke,
}

impl PermissionChange {
    pub fn granted(&self) -> bool {
        matches!(self, Self::Grant)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::Grant => "The teacher granted you drawing permission.",
            Self::Deny => "The teacher declined your drawing request.",
            Self::Revoke => "The teacher revoked your drawing permission.",
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Joined {
    pub session_id: SessionId,
    pub role: Role,
    pub can_draw: bool,
    /// Stale connection that held the same student name before this join.
    pub replaced: Option<ConnectionId>,
}

#[derive(Debug, PartialEq)]
pub enum Left {
    NotMember,
    Student { username: String },
    /// The teacher left; every student that was still attached.
    SessionClosed {
        session_id: SessionId,
        detached: Vec<ConnectionId>,
    },
}

struct Session {
    id: SessionId,
    teacher: Participant,
    /// Join order is the roster order.
    students: Vec<Participant>,
    granted: HashSet<String>,
}

impl Session {
    fn student_by_name(&self, username: &str) -> Option<&Participant> {
        self.students.iter().find(|s| s.username == username)
    }

    fn member(&self, connection_id: ConnectionId) -> Option<&Participant> {
        if self.teacher.connection_id == connection_id {
            Some(&self.teacher)
        } else {
            self.students
                .iter()
                .find(|s| s.connection_id == connection_id)
        }
    }
}

/// Role assignment, membership and draw permission of the one shared session.
///
/// Not synchronized itself: the session task owns the only instance, which
/// makes every operation here mutually exclusive with every other.
#[derive(Default)]
pub struct SessionBroker {
    session: Option<Session>,
}

impl SessionBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        username: &str,
    ) -> Result<Joined, BrokerError> {
        let session = match self.session.as_mut() {
            None => {
                let session_id = SessionId::new_v4();
                log::info!(
                    "{} ({}) is the teacher of new session {}",
                    username,
                    connection_id,
                    session_id
                );
                self.session = Some(Session {
                    id: session_id,
                    teacher: Participant {
                        connection_id,
                        username: username.to_string(),
                        role: Role::Teacher,
                    },
                    students: Vec::new(),
                    granted: HashSet::new(),
                });
                return Ok(Joined {
                    session_id,
                    role: Role::Teacher,
                    can_draw: true,
                    replaced: None,
                });
            }
            Some(session) => session,
        };

        if session.member(connection_id).is_some() {
            return Err(BrokerError::AlreadyJoined(connection_id));
        }
        if session.teacher.username == username {
            return Err(BrokerError::TeacherName(username.to_string()));
        }

        let replaced = session
            .students
            .iter()
            .position(|s| s.username == username)
            .map(|pos| session.students.remove(pos).connection_id);
        if let Some(stale) = replaced {
            session.granted.remove(username);
            log::info!(
                "Student {} re-joined from {}, replacing {}",
                username,
                connection_id,
                stale
            );
        }

        session.students.push(Participant {
            connection_id,
            username: username.to_string(),
            role: Role::Student,
        });
        log::info!(
            "{} ({}) joined session {} as a student",
            username,
            connection_id,
            session.id
        );
        Ok(Joined {
            session_id: session.id,
            role: Role::Student,
            can_draw: false,
            replaced,
        })
    }

    pub fn leave(&mut self, connection_id: ConnectionId) -> Left {
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return Left::NotMember,
        };

        if session.teacher.connection_id == connection_id {
            if let Some(session) = self.session.take() {
                log::info!(
                    "Teacher {} left, closing session {}",
                    session.teacher.username,
                    session.id
                );
                return Left::SessionClosed {
                    session_id: session.id,
                    detached: session.students.iter().map(|s| s.connection_id).collect(),
                };
            }
            return Left::NotMember;
        }

        match session
            .students
            .iter()
            .position(|s| s.connection_id == connection_id)
        {
            Some(pos) => {
                let student = session.students.remove(pos);
                session.granted.remove(&student.username);
                log::info!("Student {} left session {}", student.username, session.id);
                Left::Student {
                    username: student.username,
                }
            }
            None => Left::NotMember,
        }
    }

    pub fn participant(&self, connection_id: ConnectionId) -> Option<&Participant> {
        self.session
            .as_ref()
            .and_then(|session| session.member(connection_id))
    }

    pub fn can_draw(&self, connection_id: ConnectionId) -> bool {
        match self.session.as_ref() {
            Some(session) => match session.member(connection_id) {
                Some(p) if p.role == Role::Teacher => true,
                Some(p) => session.granted.contains(&p.username),
                None => false,
            },
            None => false,
        }
    }

    /// Returns the teacher to notify and the name of the requesting student.
    pub fn request_permission(
        &self,
        connection_id: ConnectionId,
    ) -> Result<(ConnectionId, String), BrokerError> {
        let session = self.session.as_ref().ok_or(BrokerError::NoSession)?;
        let requester = session
            .member(connection_id)
            .ok_or(BrokerError::NotMember(connection_id))?;
        if requester.role != Role::Student {
            return Err(BrokerError::NotStudent(connection_id));
        }
        Ok((session.teacher.connection_id, requester.username.clone()))
    }

    /// Returns the connection of the student whose permission changed.
    pub fn set_permission(
        &mut self,
        caller: ConnectionId,
        student: &str,
        change: PermissionChange,
    ) -> Result<ConnectionId, BrokerError> {
        let session = self.session.as_mut().ok_or(BrokerError::NoSession)?;
        if session.teacher.connection_id != caller {
            return Err(BrokerError::NotTeacher(caller));
        }
        let target = session
            .student_by_name(student)
            .map(|s| s.connection_id)
            .ok_or_else(|| BrokerError::UnknownTarget(student.to_string()))?;

        if change.granted() {
            session.granted.insert(student.to_string());
        } else {
            session.granted.remove(student);
        }
        log::info!("Permission of {} changed: {:?}", student, change);
        Ok(target)
    }

    pub fn list_statuses(&self) -> Vec<UserStatus> {
        match self.session.as_ref() {
            Some(session) => std::iter::once(UserStatus {
                username: session.teacher.username.clone(),
                role: Role::Teacher,
                has_permission: true,
            })
            .chain(session.students.iter().map(|s| UserStatus {
                username: s.username.clone(),
                role: Role::Student,
                has_permission: session.granted.contains(&s.username),
            }))
            .collect(),
            None => Vec::new(),
        }
    }

    /// Snapshot of every member, teacher first.
    pub fn members(&self) -> Vec<ConnectionId> {
        match self.session.as_ref() {
            Some(session) => std::iter::once(session.teacher.connection_id)
                .chain(session.students.iter().map(|s| s.connection_id))
                .collect(),
            None => Vec::new(),
        }
    }
}
