use std::cell::RefCell;
use std::env;

use url::Url;

use super::{AuthError, Location, PageLocation};

/// Location backed by the system browser.
///
/// `current()` is the page the session was started for. `assign` resolves the target
/// against it, hands it to the notify callback and, when enabled, opens it in the
/// system browser.
pub struct BrowserLocation<F> {
    page: PageLocation,
    open_browser: bool,
    notify: F,
    navigated_to: RefCell<Option<Url>>,
}

impl<F> BrowserLocation<F>
where
    F: Fn(&Url) -> Result<(), AuthError>,
{
    pub fn new(page: PageLocation, open_browser: bool, notify: F) -> Self {
        Self {
            page,
            open_browser,
            notify,
            navigated_to: RefCell::new(None),
        }
    }

    /// Target of the last navigation, if one happened.
    pub fn navigated_to(&self) -> Option<Url> {
        self.navigated_to.borrow().clone()
    }
}

impl<F> Location for BrowserLocation<F>
where
    F: Fn(&Url) -> Result<(), AuthError>,
{
    fn current(&self) -> PageLocation {
        self.page.clone()
    }

    fn assign(&self, url: &str) -> Result<(), AuthError> {
        let target = self.page.resolve(url)?;
        (self.notify)(&target)?;
        if self.open_browser {
            open::that(target.as_str()).map_err(|err| AuthError::BrowserLaunch(err.to_string()))?;
        }
        *self.navigated_to.borrow_mut() = Some(target);
        Ok(())
    }
}

/// Whether launching the system browser is likely to work in this environment.
pub fn browser_available() -> bool {
    if env::var_os("MENDELEY_AUTH_NO_BROWSER").is_some() {
        return false;
    }

    if env::var_os("SSH_CONNECTION").is_some() && env::var_os("DISPLAY").is_none() {
        return false;
    }

    if env::var_os("DISPLAY").is_some() || env::var_os("WAYLAND_DISPLAY").is_some() {
        return true;
    }

    cfg!(target_os = "windows") || cfg!(target_os = "macos")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn assign_resolves_and_notifies() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let notify = {
            let seen = seen.clone();
            move |url: &Url| {
                seen.lock().unwrap().push(url.to_string());
                Ok(())
            }
        };
        let page = PageLocation::parse("https://example.com/app#token=abc").unwrap();
        let location = BrowserLocation::new(page.clone(), false, notify);

        location.assign("/login?state=foo").unwrap();

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            ["https://example.com/login?state=foo"]
        );
        assert_eq!(
            location.navigated_to().unwrap().as_str(),
            "https://example.com/login?state=foo"
        );
        assert_eq!(location.current(), page);
    }

    #[test]
    fn notify_failure_aborts_navigation() {
        let page = PageLocation::parse("https://example.com/app").unwrap();
        let location = BrowserLocation::new(page, false, |_url: &Url| {
            Err(AuthError::BrowserLaunch("no display".into()))
        });
        let err = location.assign("/login").unwrap_err();
        assert!(matches!(err, AuthError::BrowserLaunch(_)));
        assert!(location.navigated_to().is_none());
    }
}
