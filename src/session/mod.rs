//! Session-scoped dataset storage.
//!
//! A session is created when a file is loaded, read by every question
//! asked against it, and torn down when the interaction ends. Executions
//! receive the frame by reference and clone it themselves, so nothing a
//! question does can leak into the next one.

use std::collections::HashMap;

use uuid::Uuid;

use crate::dataset::Frame;

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    source: String,
    dataset: Frame,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name of the uploaded file.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn dataset(&self) -> &Frame {
        &self.dataset
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    /// Register a loaded dataset and return the new session id.
    pub fn create(&mut self, source: &str, dataset: Frame) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                source: source.to_string(),
                dataset,
            },
        );
        id
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::from_csv("a,b\n1,2\n".as_bytes()).unwrap()
    }

    #[test]
    fn lifecycle_create_read_teardown() {
        let mut store = SessionStore::default();
        let id = store.create("sales.csv", frame());
        assert_eq!(store.len(), 1);
        let session = store.get(&id).unwrap();
        assert_eq!(session.id(), id);
        assert_eq!(session.source(), "sales.csv");
        assert_eq!(session.dataset().n_rows(), 1);
        assert!(store.remove(&id));
        assert!(store.is_empty());
        assert!(!store.remove(&id));
    }

    #[test]
    fn ids_are_unique_per_session() {
        let mut store = SessionStore::default();
        let a = store.create("a.csv", frame());
        let b = store.create("b.csv", frame());
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }
}
