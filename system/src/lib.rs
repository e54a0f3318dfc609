pub extern crate bincode;
pub extern crate euclid;
pub extern crate serde;
pub extern crate uuid;

mod client_session;
mod codec;
mod message;

pub use client_session::*;
pub use codec::*;
pub use message::*;
