//! Navigation primitives
//!
//! This module provides:
//! - [`Location`]: the current path plus any navigation state
//! - [`Navigator`]: the capability components use to read the location and
//!   redirect
//! - [`MemoryHistory`]: an in-memory history stack implementing [`Navigator`]

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// Key of the entry a history starts with
pub const DEFAULT_LOCATION_KEY: &str = "default";

// =============================================================================
// Location
// =============================================================================

/// A position in the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Path portion, always starting with `/`
    pub pathname: String,
    /// Query string including the leading `?`, or empty
    #[serde(default)]
    pub search: String,
    /// Fragment including the leading `#`, or empty
    #[serde(default)]
    pub hash: String,
    /// Arbitrary state attached by whoever navigated here
    #[serde(default)]
    pub state: Option<Value>,
    /// Unique key of the history entry
    #[serde(default = "default_key")]
    pub key: String,
}

fn default_key() -> String {
    DEFAULT_LOCATION_KEY.to_string()
}

impl Default for Location {
    fn default() -> Self {
        Self::parse("/")
    }
}

impl Location {
    /// Parse `/path?query#hash` into a location with no state
    pub fn parse(path: &str) -> Self {
        let (rest, hash) = match path.find('#') {
            Some(idx) => (&path[..idx], &path[idx..]),
            None => (path, ""),
        };
        let (pathname, search) = match rest.find('?') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        let pathname = if pathname.starts_with('/') {
            pathname.to_string()
        } else {
            format!("/{}", pathname)
        };

        Self {
            pathname,
            search: if search == "?" { String::new() } else { search.to_string() },
            hash: if hash == "#" { String::new() } else { hash.to_string() },
            state: None,
            key: default_key(),
        }
    }

    /// Attach navigation state
    pub fn with_state(mut self, state: Option<Value>) -> Self {
        self.state = state;
        self
    }

    fn with_fresh_key(mut self) -> Self {
        self.key = uuid::Uuid::new_v4().to_string();
        self
    }

    /// Path, query and fragment joined back together
    pub fn href(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }

    /// Value of a query parameter, percent-decoded
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.search
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| decode(v))
    }

    /// The redirect state a guard attached, if any
    pub fn redirect_state(&self) -> Option<RedirectState> {
        self.state
            .as_ref()
            .and_then(|state| serde_json::from_value(state.clone()).ok())
    }

    /// Where to send the user after login: the guarded location they came from
    pub fn return_to(&self) -> Option<String> {
        self.redirect_state().map(|state| state.from.href())
    }
}

pub(crate) fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Navigation state attached to a redirect away from a guarded route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectState {
    /// The location the user tried to reach
    pub from: Location,
}

impl RedirectState {
    /// State remembering `from`
    pub fn new(from: Location) -> Self {
        Self { from }
    }

    /// JSON form stored in [`Location::state`]
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "from": self.from })
    }
}

/// How a navigation affects the history stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NavigateMode {
    /// Add a new entry
    #[default]
    Push,
    /// Overwrite the current entry
    Replace,
}

/// A declarative instruction to navigate elsewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redirect {
    /// Target path
    pub to: String,
    /// State to attach to the target location
    pub state: Option<Value>,
    /// Push or replace
    pub mode: NavigateMode,
}

impl Redirect {
    /// Carry out the redirect
    pub fn apply(&self, navigator: &dyn Navigator) {
        navigator.redirect(&self.to, self.state.clone(), self.mode);
    }
}

// =============================================================================
// Navigator
// =============================================================================

/// Routing capability handed to components
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    /// Snapshot of the current location
    fn current_location(&self) -> Location;

    /// Navigate to `path`, attaching `state`
    fn redirect(&self, path: &str, state: Option<Value>, mode: NavigateMode);
}

// =============================================================================
// Memory History
// =============================================================================

#[derive(Debug)]
struct HistoryInner {
    entries: Vec<Location>,
    index: usize,
}

impl HistoryInner {
    fn current(&self) -> &Location {
        &self.entries[self.index]
    }
}

/// In-memory history stack
///
/// Clones share the same stack and subscribers.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    inner: Arc<RwLock<HistoryInner>>,
    tx: Arc<watch::Sender<Location>>,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("/")
    }
}

impl MemoryHistory {
    /// Create a history with a single entry at `initial_path`
    pub fn new(initial_path: &str) -> Self {
        let initial = Location::parse(initial_path);
        let (tx, _) = watch::channel(initial.clone());
        Self {
            inner: Arc::new(RwLock::new(HistoryInner { entries: vec![initial], index: 0 })),
            tx: Arc::new(tx),
        }
    }

    /// The current location
    pub fn location(&self) -> Location {
        self.inner.read().current().clone()
    }

    /// Push a new entry, discarding any forward entries
    pub fn push(&self, path: &str, state: Option<Value>) -> Location {
        let location = Location::parse(path).with_state(state).with_fresh_key();
        {
            let mut inner = self.inner.write();
            let keep = inner.index + 1;
            inner.entries.truncate(keep);
            inner.entries.push(location.clone());
            inner.index = keep;
        }
        tracing::debug!(path = %location.href(), "History push");
        self.notify(location.clone());
        location
    }

    /// Replace the current entry
    pub fn replace(&self, path: &str, state: Option<Value>) -> Location {
        let location = Location::parse(path).with_state(state).with_fresh_key();
        {
            let mut inner = self.inner.write();
            let index = inner.index;
            inner.entries[index] = location.clone();
        }
        tracing::debug!(path = %location.href(), "History replace");
        self.notify(location.clone());
        location
    }

    /// Move `delta` entries; out-of-range moves do nothing and return `false`
    pub fn go(&self, delta: isize) -> bool {
        let location = {
            let mut inner = self.inner.write();
            let Some(target) = (inner.index as isize).checked_add(delta) else {
                return false;
            };
            if delta == 0 || target < 0 || target >= inner.entries.len() as isize {
                return false;
            }
            inner.index = target as usize;
            inner.current().clone()
        };
        self.notify(location);
        true
    }

    /// Go back one entry
    pub fn back(&self) -> bool {
        self.go(-1)
    }

    /// Go forward one entry
    pub fn forward(&self) -> bool {
        self.go(1)
    }

    /// Whether there is an entry behind the current one
    pub fn can_go_back(&self) -> bool {
        self.inner.read().index > 0
    }

    /// Whether there is an entry ahead of the current one
    pub fn can_go_forward(&self) -> bool {
        let inner = self.inner.read();
        inner.index + 1 < inner.entries.len()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether the history is empty (never true; there is always a current entry)
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Index of the current entry
    pub fn index(&self) -> usize {
        self.inner.read().index
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Vec<Location> {
        self.inner.read().entries.clone()
    }

    /// Subscribe to location changes
    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.tx.subscribe()
    }

    fn notify(&self, location: Location) {
        self.tx.send_replace(location);
    }
}

impl Navigator for MemoryHistory {
    fn current_location(&self) -> Location {
        self.location()
    }

    fn redirect(&self, path: &str, state: Option<Value>, mode: NavigateMode) {
        match mode {
            NavigateMode::Push => self.push(path, state),
            NavigateMode::Replace => self.replace(path, state),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_location() {
        let location = Location::parse("/search?q=rust%20lang&tab=user#top");

        assert_eq!(location.pathname, "/search");
        assert_eq!(location.search, "?q=rust%20lang&tab=user");
        assert_eq!(location.hash, "#top");
        assert_eq!(location.key, DEFAULT_LOCATION_KEY);
        assert_eq!(location.query_param("q"), Some("rust lang".to_string()));
        assert_eq!(location.query_param("missing"), None);
        assert_eq!(location.href(), "/search?q=rust%20lang&tab=user#top");
    }

    #[test]
    fn test_parse_normalizes_path() {
        assert_eq!(Location::parse("").pathname, "/");
        assert_eq!(Location::parse("dashboard").pathname, "/dashboard");
        assert_eq!(Location::parse("/a?").search, "");
    }

    #[test]
    fn test_redirect_state_round_trip() {
        let from = Location::parse("/dashboard?tab=2");
        let login = Location::parse("/login").with_state(Some(RedirectState::new(from).to_value()));

        let state = login.state.as_ref().unwrap();
        assert_eq!(state["from"]["pathname"], json!("/dashboard"));
        assert_eq!(login.return_to(), Some("/dashboard?tab=2".to_string()));
    }

    #[test]
    fn test_unrelated_state_is_not_redirect_state() {
        let location = Location::parse("/login").with_state(Some(json!({ "flash": "hi" })));
        assert!(location.redirect_state().is_none());
    }

    #[test]
    fn test_push_and_back() {
        let history = MemoryHistory::new("/");
        history.push("/a", None);
        history.push("/b", None);

        assert_eq!(history.len(), 3);
        assert!(history.back());
        assert_eq!(history.location().pathname, "/a");
        assert!(history.can_go_forward());
        assert!(history.forward());
        assert_eq!(history.location().pathname, "/b");
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let history = MemoryHistory::new("/");
        history.push("/a", None);
        history.push("/b", None);
        history.back();

        history.push("/c", None);

        let paths: Vec<String> = history.entries().into_iter().map(|l| l.pathname).collect();
        assert_eq!(paths, vec!["/", "/a", "/c"]);
        assert!(!history.can_go_forward());
    }

    #[test]
    fn test_go_with_huge_delta_is_out_of_range() {
        let history = MemoryHistory::new("/");
        history.push("/a", None);

        assert!(!history.go(isize::MAX));
        assert!(!history.go(isize::MIN));
        assert_eq!(history.location().pathname, "/a");
        assert_eq!(history.index(), 1);
    }

    #[test]
    fn test_back_forward_bounds() {
        let history = MemoryHistory::new("/");

        assert!(!history.back());
        assert!(!history.forward());
        assert!(!history.go(0));
        assert_eq!(history.index(), 0);
    }

    #[test]
    fn test_replace_keeps_length() {
        let history = MemoryHistory::new("/");
        history.push("/dashboard", None);
        let before = history.location().key;

        history.replace("/login", Some(json!({ "x": 1 })));

        assert_eq!(history.len(), 2);
        let current = history.location();
        assert_eq!(current.pathname, "/login");
        assert_ne!(current.key, before);
        assert!(history.back());
        assert_eq!(history.location().pathname, "/");
    }

    #[test]
    fn test_navigator_redirect_modes() {
        let history = MemoryHistory::new("/");

        history.redirect("/a", None, NavigateMode::Push);
        assert_eq!(history.len(), 2);

        history.redirect("/b", None, NavigateMode::Replace);
        assert_eq!(history.len(), 2);
        assert_eq!(history.current_location().pathname, "/b");
    }

    #[tokio::test]
    async fn test_subscribe() {
        let history = MemoryHistory::new("/");
        let mut rx = history.subscribe();

        history.push("/next", None);

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().pathname, "/next");
    }
}
