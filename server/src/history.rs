use system::Action;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum HistoryError {
    #[error("{0} is not a drawing that can be replayed")]
    NotDrawing(&'static str),
}

/// Accepted shapes and text since the last clear, in acceptance order.
///
/// Owned by the session task, so `append`, `clear` and `snapshot` never
/// interleave.
#[derive(Default)]
pub struct HistoryStore {
    entries: Vec<Action>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, action: Action) -> Result<(), HistoryError> {
        if !action.is_history_entry() {
            return Err(HistoryError::NotDrawing(action.name()));
        }
        self.entries.push(action);
        Ok(())
    }

    pub fn clear(&mut self) {
        log::info!("History cleared ({} entries dropped)", self.entries.len());
        self.entries.clear();
    }

    pub fn snapshot(&self) -> Vec<Action> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use system::euclid::default::Point2D;
    use system::{Color, Font, TextAction};

    fn text(s: &str) -> Action {
        Action::Text(TextAction {
            text: s.into(),
            pos: Point2D::new(0.0, 0.0),
            color: Color::default(),
            font: Font::default(),
        })
    }

    #[test]
    fn it_replays_in_append_order() {
        let mut history = HistoryStore::new();
        history.append(text("a")).expect("");
        history.append(text("b")).expect("");
        history.append(text("c")).expect("");
        assert_eq!(history.snapshot(), vec![text("a"), text("b"), text("c")]);
    }

    #[test]
    fn it_refuses_control_actions() {
        let mut history = HistoryStore::new();
        assert_eq!(
            history.append(Action::Clear),
            Err(HistoryError::NotDrawing("Clear"))
        );
        assert!(history.append(Action::PermissionRequest).is_err());
        assert!(history.is_empty());
    }

    #[test]
    fn it_keeps_only_entries_after_the_last_clear() {
        let mut history = HistoryStore::new();
        history.append(text("before")).expect("");
        let early = history.snapshot();
        history.clear();
        history.append(text("after")).expect("");

        assert_eq!(early, vec![text("before")]);
        assert_eq!(history.snapshot(), vec![text("after")]);
    }
}
