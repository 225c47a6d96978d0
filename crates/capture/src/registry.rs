//! Write-side session metadata and root resolution.
//!
//! A record needs its `rootSessionId` before it can be routed, so the
//! capture side keeps its own parent map and resolves roots by walking the
//! chain iteratively with a visited set. Malformed input can contain parent
//! cycles; resolution must terminate, so a revisited session is treated as
//! its own root.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct SessionMeta {
    pub session_id: String,
    pub parent_session_id: Option<String>,
    pub root_session_id: String,
    pub title: Option<String>,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_id: HashMap<String, SessionMeta>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.by_id.contains_key(session_id)
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionMeta> {
        self.by_id.get(session_id)
    }

    pub fn title(&self, session_id: &str) -> Option<&str> {
        self.by_id.get(session_id)?.title.as_deref()
    }

    /// Merge new metadata over what is already known, then recompute every
    /// root: a late-arriving parent link can reroot an entire subtree.
    pub fn upsert(
        &mut self,
        session_id: &str,
        parent_session_id: Option<&str>,
        title: Option<&str>,
    ) -> SessionMeta {
        let previous = self.by_id.get(session_id);
        let parent_session_id = parent_session_id
            .map(ToString::to_string)
            .or_else(|| previous.and_then(|meta| meta.parent_session_id.clone()));
        let title = title
            .map(ToString::to_string)
            .or_else(|| previous.and_then(|meta| meta.title.clone()));

        self.by_id.insert(
            session_id.to_string(),
            SessionMeta {
                session_id: session_id.to_string(),
                parent_session_id,
                root_session_id: session_id.to_string(),
                title,
            },
        );
        self.recompute_roots();
        self.by_id
            .get(session_id)
            .cloned()
            .expect("session just inserted")
    }

    /// Root of a registered session; `None` for unknown ids.
    pub fn root_of(&self, session_id: &str) -> Option<&str> {
        self.by_id
            .get(session_id)
            .map(|meta| meta.root_session_id.as_str())
    }

    fn recompute_roots(&mut self) {
        let ids: Vec<String> = self.by_id.keys().cloned().collect();
        for id in ids {
            let root = self.resolve_root(&id);
            if let Some(meta) = self.by_id.get_mut(&id) {
                meta.root_session_id = root;
            }
        }
    }

    fn resolve_root(&self, start: &str) -> String {
        let mut visited = HashSet::new();
        let mut current = start.to_string();
        loop {
            if !visited.insert(current.clone()) {
                // Cycle: stop and let the revisited session stand as root.
                return current;
            }
            let parent = self
                .by_id
                .get(&current)
                .and_then(|meta| meta.parent_session_id.clone());
            match parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_session_is_its_own_root() {
        let mut registry = SessionRegistry::new();
        let meta = registry.upsert("a", None, Some("main"));
        assert_eq!(meta.root_session_id, "a");
        assert_eq!(registry.root_of("a"), Some("a"));
    }

    #[test]
    fn children_resolve_through_the_chain() {
        let mut registry = SessionRegistry::new();
        registry.upsert("root", None, None);
        registry.upsert("child", Some("root"), None);
        registry.upsert("grandchild", Some("child"), None);

        assert_eq!(registry.root_of("grandchild"), Some("root"));
        assert_eq!(registry.root_of("child"), Some("root"));
    }

    #[test]
    fn late_parent_link_reroots_existing_children() {
        let mut registry = SessionRegistry::new();
        registry.upsert("child", Some("mid"), None);
        assert_eq!(registry.root_of("child"), Some("mid"));

        // `mid` turns out to have a parent of its own.
        registry.upsert("mid", Some("root"), None);
        assert_eq!(registry.root_of("child"), Some("root"));
        assert_eq!(registry.root_of("mid"), Some("root"));
    }

    #[test]
    fn parent_cycles_terminate() {
        let mut registry = SessionRegistry::new();
        registry.upsert("a", Some("b"), None);
        registry.upsert("b", Some("a"), None);

        // Deterministic self-root assignment, no hang.
        assert_eq!(registry.root_of("a"), Some("a"));
        assert_eq!(registry.root_of("b"), Some("b"));
    }

    #[test]
    fn upsert_merges_rather_than_clears() {
        let mut registry = SessionRegistry::new();
        registry.upsert("s", Some("root"), Some("first title"));
        registry.upsert("root", None, None);
        let meta = registry.upsert("s", None, None);

        assert_eq!(meta.parent_session_id.as_deref(), Some("root"));
        assert_eq!(meta.title.as_deref(), Some("first title"));

        let meta = registry.upsert("s", None, Some("renamed"));
        assert_eq!(meta.title.as_deref(), Some("renamed"));
    }

    #[test]
    fn parent_pointing_at_unregistered_session_still_resolves() {
        let mut registry = SessionRegistry::new();
        registry.upsert("child", Some("ghost"), None);
        assert_eq!(registry.root_of("child"), Some("ghost"));
        assert_eq!(registry.root_of("ghost"), None);
    }
}
