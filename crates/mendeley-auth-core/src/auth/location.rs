use std::sync::{Arc, Mutex, PoisonError};

use url::Url;

use super::AuthError;

/// Snapshot of the navigable location a session runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    href: Url,
}

impl PageLocation {
    pub fn new(href: Url) -> Self {
        Self { href }
    }

    pub fn parse(href: &str) -> Result<Self, AuthError> {
        Ok(Self::new(Url::parse(href)?))
    }

    pub fn href(&self) -> &Url {
        &self.href
    }

    /// Scheme including the trailing colon, e.g. `https:`.
    pub fn protocol(&self) -> String {
        format!("{}:", self.href.scheme())
    }

    /// Host name with the port when one is explicit.
    pub fn host(&self) -> String {
        let host = self.href.host_str().unwrap_or_default();
        match self.href.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        }
    }

    pub fn path(&self) -> &str {
        self.href.path()
    }

    /// Fragment without the leading `#`.
    pub fn fragment(&self) -> Option<&str> {
        self.href.fragment().filter(|fragment| !fragment.is_empty())
    }

    /// `protocol//host/path`, dropping query and fragment.
    pub fn without_query(&self) -> String {
        format!("{}//{}{}", self.protocol(), self.host(), self.path())
    }

    /// Resolve `target` the way a browser resolves a relative link on this page.
    pub fn resolve(&self, target: &str) -> Result<Url, AuthError> {
        Ok(self.href.join(target)?)
    }
}

/// Access to the current location and full-page navigation.
///
/// `assign` is terminal for the caller's logical session: a real navigation tears the
/// page down, so nothing after it should rely on further flow logic running.
pub trait Location {
    fn current(&self) -> PageLocation;
    fn assign(&self, url: &str) -> Result<(), AuthError>;
}

#[derive(Debug)]
struct MemoryLocationState {
    href: Url,
    assignments: Vec<String>,
}

/// In-memory location. Clones share state; every assignment is recorded verbatim and
/// the current location follows it when it resolves to a URL.
#[derive(Debug, Clone)]
pub struct MemoryLocation {
    inner: Arc<Mutex<MemoryLocationState>>,
}

impl MemoryLocation {
    pub fn new(href: Url) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryLocationState {
                href,
                assignments: vec![],
            })),
        }
    }

    pub fn parse(href: &str) -> Result<Self, AuthError> {
        Ok(Self::new(Url::parse(href)?))
    }

    pub fn href(&self) -> String {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.href.to_string()
    }

    pub fn assignments(&self) -> Vec<String> {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.assignments.clone()
    }

    pub fn last_assignment(&self) -> Option<String> {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.assignments.last().cloned()
    }
}

impl Location for MemoryLocation {
    fn current(&self) -> PageLocation {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        PageLocation::new(state.href.clone())
    }

    fn assign(&self, url: &str) -> Result<(), AuthError> {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.assignments.push(url.to_owned());
        if let Ok(next) = state.href.join(url) {
            state.href = next;
        }
        Ok(())
    }
}
