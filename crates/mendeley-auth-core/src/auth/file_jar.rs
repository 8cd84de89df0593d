use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::ConfigLocator;

use super::cookie::{CookieEntries, CookieJar};
use super::AuthError;

const JAR_VERSION: u32 = 1;

/// Cookie jar persisted as JSON, keeping cookies across process runs the way a browser
/// keeps them across page loads.
#[derive(Debug, Clone)]
pub struct FileCookieJar {
    path: PathBuf,
}

impl FileCookieJar {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Jar for `host` inside the state directory.
    pub fn for_host(locator: &ConfigLocator, host: &str) -> Self {
        Self::new(locator.cookie_jar_file(host))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<CookieEntries, AuthError> {
        if !self.path.exists() {
            return Ok(CookieEntries::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        let envelope: JarEnvelope = serde_json::from_str(&raw)?;
        if envelope.version != JAR_VERSION {
            return Err(AuthError::UnsupportedJarVersion(envelope.version));
        }
        Ok(envelope.cookies)
    }

    fn save(&self, cookies: CookieEntries) -> Result<(), AuthError> {
        let envelope = JarEnvelope {
            version: JAR_VERSION,
            cookies,
        };
        let payload = serde_json::to_string_pretty(&envelope)?;
        write_file(&self.path, &payload)
    }
}

fn write_file(path: &Path, payload: &str) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(payload.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perm = file.metadata()?.permissions();
        perm.set_mode(0o600);
        fs::set_permissions(path, perm)?;
    }

    Ok(())
}

impl CookieJar for FileCookieJar {
    fn cookie_header(&self) -> Result<String, AuthError> {
        Ok(self.load()?.header(Utc::now()))
    }

    fn write_cookie(&self, cookie: &str) -> Result<(), AuthError> {
        let mut cookies = self.load()?;
        cookies.apply(cookie, Utc::now());
        self.save(cookies)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JarEnvelope {
    version: u32,
    cookies: CookieEntries,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenStore;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_an_empty_jar() {
        let temp_dir = TempDir::new().unwrap();
        let jar = FileCookieJar::new(temp_dir.path().join("cookies.json"));
        assert_eq!(jar.cookie_header().unwrap(), "");
    }

    #[test]
    fn token_survives_a_new_jar_instance() {
        let temp_dir = TempDir::new().unwrap();
        let locator = ConfigLocator::from_root_for_tests(temp_dir.path().to_path_buf());
        TokenStore::new(FileCookieJar::for_host(&locator, "example.com"), "accessToken")
            .store("persisted")
            .unwrap();

        let reopened =
            TokenStore::new(FileCookieJar::for_host(&locator, "example.com"), "accessToken");
        assert_eq!(reopened.get().unwrap(), "persisted");

        reopened.clear().unwrap();
        assert_eq!(reopened.get().unwrap(), "");
    }

    #[test]
    fn unknown_jar_version_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cookies.json");
        fs::write(&path, r#"{"version":2,"cookies":{"entries":[]}}"#).unwrap();
        let jar = FileCookieJar::new(path.clone());

        let err = jar.cookie_header().unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedJarVersion(2)));
        let err = jar.write_cookie("accessToken=abc").unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedJarVersion(2)));
        assert!(fs::read_to_string(&path).unwrap().contains(r#""version":2"#));
    }

    #[cfg(unix)]
    #[test]
    fn jar_file_is_user_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let jar = FileCookieJar::new(temp_dir.path().join("cookies.json"));
        jar.write_cookie("accessToken=abc").unwrap();
        let mode = fs::metadata(jar.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
