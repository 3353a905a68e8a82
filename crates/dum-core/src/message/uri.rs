//! URIs and name-addr values
//!
//! The stack below hands these up already parsed. `FromStr` exists for
//! building messages in application code and tests; it understands the
//! `scheme:user@host:port` subset and nothing more.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DumError;

/// A SIP (or other scheme) URI
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri {
    /// Lower-cased scheme, e.g. `sip`, `sips`, `tel`
    pub scheme: String,
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl Uri {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
            user: None,
            host: host.into(),
            port: None,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = DumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| DumError::protocol(format!("URI without scheme: {}", s)))?;
        if scheme.is_empty() || rest.is_empty() {
            return Err(DumError::protocol(format!("Malformed URI: {}", s)));
        }

        // URI parameters and headers are not modelled
        let rest = rest.split([';', '?']).next().unwrap_or(rest);

        let (user, hostport) = match rest.rsplit_once('@') {
            Some((user, hostport)) => (Some(user.to_string()), hostport),
            None => (None, rest),
        };

        // IPv6 references keep their brackets; the port follows the closing one
        let port_split = match hostport.rfind(']') {
            Some(end) => hostport[end..].find(':').map(|i| end + i),
            None => hostport.rfind(':'),
        };
        let (host, port) = match port_split {
            Some(idx) => {
                let port = hostport[idx + 1..]
                    .parse::<u16>()
                    .map_err(|_| DumError::protocol(format!("Invalid port in URI: {}", s)))?;
                (hostport[..idx].to_string(), Some(port))
            }
            None => (hostport.to_string(), None),
        };

        if host.is_empty() {
            return Err(DumError::protocol(format!("URI without host: {}", s)));
        }

        Ok(Uri {
            scheme: scheme.to_ascii_lowercase(),
            user,
            host,
            port,
        })
    }
}

impl TryFrom<String> for Uri {
    type Error = DumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.to_string()
    }
}

/// A name-addr as carried by From, To and Contact, with its tag parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameAddr {
    pub display_name: Option<String>,
    pub uri: Uri,
    pub tag: Option<String>,
}

impl NameAddr {
    pub fn new(uri: Uri) -> Self {
        Self {
            display_name: None,
            uri,
            tag: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }
}

impl From<Uri> for NameAddr {
    fn from(uri: Uri) -> Self {
        NameAddr::new(uri)
    }
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.display_name {
            write!(f, "\"{}\" ", name)?;
        }
        write!(f, "<{}>", self.uri)?;
        if let Some(tag) = &self.tag {
            write!(f, ";tag={}", tag)?;
        }
        Ok(())
    }
}
