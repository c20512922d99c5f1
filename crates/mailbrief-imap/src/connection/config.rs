//! Connection configuration.

use std::time::Duration;

/// Everything needed to open one account connection.
///
/// Connections are always implicit TLS; 993 is the default port and there is
/// no plaintext mode.
#[derive(Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login user name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl Config {
    /// Creates a configuration for the given host on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 993,
            username: String::new(),
            password: String::new(),
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the login credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the TCP connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

// Manual impl so the password never lands in logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
