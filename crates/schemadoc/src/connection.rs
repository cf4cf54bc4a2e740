//! Connection parameters for the databases being documented.
//!
//! A submitted form is validated into [`ConnectionParams`]; the password is
//! held as a [`SecretString`] and never leaves this module in serialized
//! form. [`ConnectionSnapshot`] is the audit view stored with each job.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConnectionError;

/// Listener port used when a basic connection does not name one.
pub const DEFAULT_PORT: u16 = 1521;

/// Label used on the title page when the source does not name a service.
pub const DEFAULT_SERVICE_LABEL: &str = "Oracle Database";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Basic,
    Tns,
    ConnectionString,
    Sqlite,
}

impl ConnectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Basic => "basic",
            ConnectionKind::Tns => "tns",
            ConnectionKind::ConnectionString => "connection_string",
            ConnectionKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionKind {
    type Err = ConnectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "basic" => Ok(ConnectionKind::Basic),
            "tns" => Ok(ConnectionKind::Tns),
            "connection_string" => Ok(ConnectionKind::ConnectionString),
            "sqlite" => Ok(ConnectionKind::Sqlite),
            other => Err(ConnectionError::UnsupportedType(other.to_string())),
        }
    }
}

/// Database account used to sign in to the source.
#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// A parsed `tnsnames.ora` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TnsDescriptor {
    pub alias: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub service_name: Option<String>,
    /// The connect descriptor following the alias, e.g. `(DESCRIPTION=...)`.
    pub descriptor: String,
}

static RE_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bHOST\s*=\s*([^)]+)").unwrap());
static RE_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bPORT\s*=\s*(\d+)").unwrap());
static RE_SERVICE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSERVICE_NAME\s*=\s*([^)]+)").unwrap());

impl TnsDescriptor {
    /// Parses a single TNS entry. The alias is taken from the first line
    /// ending in `=` (or the text before `=` on a one-line entry).
    pub fn parse(text: &str) -> Result<Self, ConnectionError> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let mut alias = None;
        let mut body_lines: Vec<&str> = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            if line.ends_with('=') {
                alias = Some(line.trim_end_matches(['=', ' ']).trim().to_string());
                body_lines.extend(&lines[idx + 1..]);
                break;
            }
            if idx == 0 && !line.starts_with('(') {
                if let Some((name, rest)) = line.split_once('=') {
                    alias = Some(name.trim().to_string());
                    body_lines.push(rest.trim());
                    body_lines.extend(&lines[1..]);
                    break;
                }
            }
        }

        let alias = alias
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ConnectionError::InvalidTns("No TNS name found in configuration".into()))?;
        let descriptor = body_lines.join(" ").trim().to_string();
        if descriptor.is_empty() {
            return Err(ConnectionError::InvalidTns(format!(
                "TNS entry '{}' has no connect descriptor",
                alias
            )));
        }

        let capture = |re: &Regex| {
            re.captures(&descriptor)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        };
        let port = match capture(&RE_PORT) {
            Some(p) => Some(parse_port(&p)?),
            None => None,
        };

        Ok(Self {
            alias,
            host: capture(&RE_HOST),
            port,
            service_name: capture(&RE_SERVICE_NAME),
            descriptor,
        })
    }
}

/// Validated parameters for reaching a source database.
#[derive(Debug)]
pub enum ConnectionParams {
    Basic {
        host: String,
        port: u16,
        service_name: String,
        credentials: Credentials,
    },
    Tns {
        descriptor: TnsDescriptor,
        credentials: Credentials,
    },
    ConnectionString {
        host: String,
        port: u16,
        service_name: String,
        credentials: Credentials,
    },
    Sqlite {
        path: PathBuf,
    },
}

impl ConnectionParams {
    /// Parses `username/password@host:port/service_name`.
    pub fn parse_connection_string(value: &str) -> Result<Self, ConnectionError> {
        let invalid = |reason: &str| ConnectionError::InvalidConnectionString(reason.to_string());
        let value = value.trim();

        let (credentials, endpoint) = value.rsplit_once('@').ok_or_else(|| {
            invalid("expected format username/password@host:port/service_name")
        })?;
        let (username, password) = credentials
            .split_once('/')
            .ok_or_else(|| invalid("expected credentials as username/password"))?;
        let (host_port, service_name) = endpoint
            .split_once('/')
            .ok_or_else(|| invalid("expected host:port/service_name"))?;
        let (host, port) = host_port
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;

        if username.is_empty() || password.is_empty() {
            return Err(invalid("username and password must not be empty"));
        }
        if host.is_empty() || service_name.is_empty() {
            return Err(invalid("host and service name must not be empty"));
        }
        let port = parse_port(port)?;

        Ok(ConnectionParams::ConnectionString {
            host: host.to_string(),
            port,
            service_name: service_name.to_string(),
            credentials: Credentials::new(username, password),
        })
    }

    pub fn kind(&self) -> ConnectionKind {
        match self {
            ConnectionParams::Basic { .. } => ConnectionKind::Basic,
            ConnectionParams::Tns { .. } => ConnectionKind::Tns,
            ConnectionParams::ConnectionString { .. } => ConnectionKind::ConnectionString,
            ConnectionParams::Sqlite { .. } => ConnectionKind::Sqlite,
        }
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            ConnectionParams::Basic { credentials, .. }
            | ConnectionParams::Tns { credentials, .. }
            | ConnectionParams::ConnectionString { credentials, .. } => Some(credentials),
            ConnectionParams::Sqlite { .. } => None,
        }
    }

    /// Connect string understood by Oracle client libraries: Easy Connect
    /// for host/port/service sources, the raw descriptor for TNS entries.
    pub fn oracle_connect_string(&self) -> Option<String> {
        match self {
            ConnectionParams::Basic {
                host,
                port,
                service_name,
                ..
            }
            | ConnectionParams::ConnectionString {
                host,
                port,
                service_name,
                ..
            } => Some(format!("//{}:{}/{}", host, port, service_name)),
            ConnectionParams::Tns { descriptor, .. } => Some(descriptor.descriptor.clone()),
            ConnectionParams::Sqlite { .. } => None,
        }
    }

    /// Name printed on the report's title page.
    pub fn service_label(&self) -> String {
        match self {
            ConnectionParams::Basic { service_name, .. }
            | ConnectionParams::ConnectionString { service_name, .. } => service_name.clone(),
            ConnectionParams::Tns { descriptor, .. } => descriptor
                .service_name
                .clone()
                .unwrap_or_else(|| descriptor.alias.clone()),
            ConnectionParams::Sqlite { path } => path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .unwrap_or_else(|| DEFAULT_SERVICE_LABEL.to_string()),
        }
    }

    /// Audit view of these parameters. Never contains the password.
    pub fn snapshot(&self) -> ConnectionSnapshot {
        let username = self.credentials().map(|c| c.username.clone());
        match self {
            ConnectionParams::Basic {
                host,
                port,
                service_name,
                ..
            }
            | ConnectionParams::ConnectionString {
                host,
                port,
                service_name,
                ..
            } => ConnectionSnapshot {
                connection_type: self.kind(),
                host: Some(host.clone()),
                port: Some(*port),
                service_name: Some(service_name.clone()),
                username,
            },
            ConnectionParams::Tns { descriptor, .. } => ConnectionSnapshot {
                connection_type: self.kind(),
                host: descriptor.host.clone(),
                port: descriptor.port,
                service_name: descriptor
                    .service_name
                    .clone()
                    .or_else(|| Some(descriptor.alias.clone())),
                username,
            },
            ConnectionParams::Sqlite { path } => ConnectionSnapshot {
                connection_type: self.kind(),
                host: None,
                port: None,
                service_name: Some(crate::sanitize::redact_path(path)),
                username: None,
            },
        }
    }
}

/// Connection details recorded with a job for auditing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub connection_type: ConnectionKind,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub service_name: Option<String>,
    pub username: Option<String>,
}

/// Port as submitted by a client: JSON number or form text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(i64),
    Text(String),
}

/// Raw connection form as submitted over HTTP.
///
/// Not `Debug`: it carries the plain-text password.
#[derive(Default, Deserialize)]
pub struct ConnectionForm {
    #[serde(default)]
    pub connection_type: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<PortValue>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tns_config: Option<String>,
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default)]
    pub sqlite_path: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_port(value: &str) -> Result<u16, ConnectionError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConnectionError::InvalidPort(value.trim().to_string())),
    }
}

impl ConnectionForm {
    /// Validates the form into connection parameters.
    ///
    /// Missing fields are reported in form order: endpoint first, then
    /// credentials.
    pub fn into_params(self) -> Result<ConnectionParams, ConnectionError> {
        let kind = match non_blank(self.connection_type) {
            Some(kind) => kind.parse()?,
            None => ConnectionKind::Basic,
        };
        let label = kind.as_str();
        let require = |value: Option<String>, field: &'static str| {
            non_blank(value).ok_or(ConnectionError::MissingField { field, kind: label })
        };

        match kind {
            ConnectionKind::Basic => {
                let host = require(self.host, "host")?;
                let service_name = require(self.service_name, "service_name")?;
                let port = match self.port {
                    None => DEFAULT_PORT,
                    Some(PortValue::Number(n)) => u16::try_from(n)
                        .ok()
                        .filter(|p| *p != 0)
                        .ok_or_else(|| ConnectionError::InvalidPort(n.to_string()))?,
                    Some(PortValue::Text(t)) if t.trim().is_empty() => DEFAULT_PORT,
                    Some(PortValue::Text(t)) => parse_port(&t)?,
                };
                let username = require(self.username, "username")?;
                let password = self
                    .password
                    .filter(|p| !p.is_empty())
                    .ok_or(ConnectionError::MissingField {
                        field: "password",
                        kind: label,
                    })?;
                Ok(ConnectionParams::Basic {
                    host,
                    port,
                    service_name,
                    credentials: Credentials::new(username, password),
                })
            }
            ConnectionKind::Tns => {
                let config = require(self.tns_config, "tns_config")?;
                let username = require(self.username, "username")?;
                let password = self
                    .password
                    .filter(|p| !p.is_empty())
                    .ok_or(ConnectionError::MissingField {
                        field: "password",
                        kind: label,
                    })?;
                Ok(ConnectionParams::Tns {
                    descriptor: TnsDescriptor::parse(&config)?,
                    credentials: Credentials::new(username, password),
                })
            }
            ConnectionKind::ConnectionString => {
                let value = require(self.connection_string, "connection_string")?;
                ConnectionParams::parse_connection_string(&value)
            }
            ConnectionKind::Sqlite => {
                let path = require(self.sqlite_path, "sqlite_path")?;
                Ok(ConnectionParams::Sqlite {
                    path: PathBuf::from(path),
                })
            }
        }
    }
}

impl ConnectionError {
    /// Form field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ConnectionError::UnsupportedType(_) => "connection_type",
            ConnectionError::MissingField { field, .. } => field,
            ConnectionError::InvalidPort(_) => "port",
            ConnectionError::InvalidConnectionString(_) => "connection_string",
            ConnectionError::InvalidTns(_) => "tns_config",
        }
    }
}
