use euclid::default::{Point2D, Rect};
use serde::{Deserialize, Serialize};

pub type ConnectionId = u32;
pub type SessionId = uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl std::default::Default for Color {
    fn default() -> Self {
        Self { r: 0, g: 0, b: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Teacher,
    Student,
}

/// Which canvas a client works on. Private mode never reaches the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    Private,
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    pub username: String,
    pub role: Role,
    pub has_permission: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    Line,
    Rectangle,
    Oval,
    Triangle,
    Eraser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Segment { from: Point2D<f32>, to: Point2D<f32> },
    Rect(Rect<f32>),
    Ellipse(Rect<f32>),
    Polygon(Vec<Point2D<f32>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeAction {
    pub kind: ShapeKind,
    pub geometry: Geometry,
    pub color: Color,
    pub stroke_width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    pub family: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
}

impl std::default::Default for Font {
    fn default() -> Self {
        Self {
            family: "sans-serif".into(),
            size: 14.0,
            bold: false,
            italic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAction {
    pub text: String,
    pub pos: Point2D<f32>,
    pub color: Color,
    pub font: Font,
}

/// Everything exchanged between a client and the server travels as one `Action` per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Register {
        username: String,
        password: String,
    },
    Login {
        username: String,
        password: String,
    },
    AuthResult {
        success: bool,
        message: String,
        username: Option<String>,
    },
    Logout,

    StartSession,
    SessionJoinResult {
        session_id: SessionId,
        role: Role,
        can_draw: bool,
    },
    SessionEnded {
        reason: String,
    },
    UserListUpdate {
        statuses: Vec<UserStatus>,
    },

    PermissionRequest,
    IncomingPermissionRequest {
        student: String,
    },
    PermissionResponse {
        student: String,
        granted: bool,
    },
    RevokePermission {
        student: String,
    },
    PermissionStatusUpdate {
        can_draw: bool,
        message: String,
    },

    Shape(ShapeAction),
    Text(TextAction),
    Clear,
}

impl Action {
    /// Actions that change what is on the shared canvas.
    pub fn is_drawing(&self) -> bool {
        matches!(self, Self::Shape(_) | Self::Text(_) | Self::Clear)
    }

    /// Only shapes and text are kept for replay; `Clear` resets the log instead.
    pub fn is_history_entry(&self) -> bool {
        matches!(self, Self::Shape(_) | Self::Text(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "Register",
            Self::Login { .. } => "Login",
            Self::AuthResult { .. } => "AuthResult",
            Self::Logout => "Logout",
            Self::StartSession => "StartSession",
            Self::SessionJoinResult { .. } => "SessionJoinResult",
            Self::SessionEnded { .. } => "SessionEnded",
            Self::UserListUpdate { .. } => "UserListUpdate",
            Self::PermissionRequest => "PermissionRequest",
            Self::IncomingPermissionRequest { .. } => "IncomingPermissionRequest",
            Self::PermissionResponse { .. } => "PermissionResponse",
            Self::RevokePermission { .. } => "RevokePermission",
            Self::PermissionStatusUpdate { .. } => "PermissionStatusUpdate",
            Self::Shape(_) => "Shape",
            Self::Text(_) => "Text",
            Self::Clear => "Clear",
        }
    }
}
