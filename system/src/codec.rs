use bincode::Options;
use thiserror::Error;

use crate::Action;

/// Upper bound for a single encoded action. A long stroke polygon fits comfortably.
pub const MAX_FRAME_LEN: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode {action}: {source}")]
    Encode {
        action: &'static str,
        source: bincode::Error,
    },
    #[error("malformed frame: {0}")]
    Decode(bincode::Error),
}

fn options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_FRAME_LEN)
}

pub fn encode_action(action: &Action) -> Result<Vec<u8>, CodecError> {
    options()
        .serialize(action)
        .map_err(|source| CodecError::Encode {
            action: action.name(),
            source,
        })
}

/// Decodes exactly one action. Trailing bytes after the record are an error.
pub fn decode_action(bytes: &[u8]) -> Result<Action, CodecError> {
    options().deserialize(bytes).map_err(CodecError::Decode)
}
