//! Capability traits implemented by the application layer.

use std::io;

/// A username/password pair supplied for cloud authentication.
///
/// Credentials are never persisted; they exist only long enough to perform a
/// password-grant exchange.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Source of interactive credentials.
///
/// The orchestrator calls [`CredentialSource::get`] only when upload is
/// enabled and no valid cached token exists. Implementations range from a
/// terminal prompt in the CLI to a fixed stub in tests.
pub trait CredentialSource: Send + Sync {
    /// Obtain credentials from the user (or the stub).
    fn get(&self) -> io::Result<Credentials>;
}

/// A fixed credential source, useful for tests and scripted runs.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            credentials: Credentials {
                username: username.into(),
                password: password.into(),
            },
        }
    }
}

impl CredentialSource for StaticCredentials {
    fn get(&self) -> io::Result<Credentials> {
        Ok(self.credentials.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_credentials() {
        let source = StaticCredentials::new("user", "secret");
        let creds = source.get().unwrap();
        assert_eq!(creds.username, "user");
        assert_eq!(creds.password, "secret");
    }
}
