//! Connection string parsing
//!
//! Credentials arrive as `Key=Value;Key=Value` connection strings. Only the
//! parts needed to reach a namespace are interpreted; the raw string is kept
//! so it can be handed to the broker SDK unchanged.

use crate::error::{ConsoleError, ConsoleResult};
use std::fmt;

const ENDPOINT_SCHEME: &str = "sb://";

/// A validated broker credential
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    raw: String,
    namespace: String,
    key_name: Option<String>,
    entity_path: Option<String>,
}

impl Credential {
    /// Parses and validates a connection string.
    ///
    /// Requires an `Endpoint=sb://<host>` part plus either a
    /// `SharedAccessKeyName`/`SharedAccessKey` pair or a
    /// `SharedAccessSignature`. Keys are matched case-insensitively.
    pub fn parse(raw: &str) -> ConsoleResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConsoleError::InvalidCredential("empty connection string".into()));
        }

        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut signature = None;
        let mut entity_path = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                ConsoleError::InvalidCredential(format!("segment without '=': {}", redact(part)))
            })?;
            let value = value.trim();
            if value.is_empty() {
                return Err(ConsoleError::InvalidCredential(format!(
                    "empty value for {}",
                    name.trim()
                )));
            }
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.to_string()),
                "sharedaccesskeyname" => key_name = Some(value.to_string()),
                "sharedaccesskey" => key = Some(value.to_string()),
                "sharedaccesssignature" => signature = Some(value.to_string()),
                "entitypath" => entity_path = Some(value.to_string()),
                _ => {}
            }
        }

        let endpoint = endpoint
            .ok_or_else(|| ConsoleError::InvalidCredential("missing Endpoint".into()))?;
        let namespace = endpoint
            .strip_prefix(ENDPOINT_SCHEME)
            .map(|rest| rest.trim_end_matches('/'))
            .filter(|host| !host.is_empty() && !host.contains('/'))
            .ok_or_else(|| {
                ConsoleError::InvalidCredential(format!(
                    "Endpoint must look like {}<namespace host>",
                    ENDPOINT_SCHEME
                ))
            })?
            .to_string();

        let has_key_pair = key_name.is_some() && key.is_some();
        if !has_key_pair && signature.is_none() {
            return Err(ConsoleError::InvalidCredential(
                "expected SharedAccessKeyName and SharedAccessKey, or SharedAccessSignature".into(),
            ));
        }

        Ok(Self {
            raw: raw.to_string(),
            namespace,
            key_name,
            entity_path,
        })
    }

    /// Host name of the namespace, e.g. `contoso.servicebus.windows.net`
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key_name(&self) -> Option<&str> {
        self.key_name.as_deref()
    }

    pub fn entity_path(&self) -> Option<&str> {
        self.entity_path.as_deref()
    }

    /// The raw connection string, for handing to the SDK
    pub fn expose_raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("namespace", &self.namespace)
            .field("key_name", &self.key_name)
            .field("entity_path", &self.entity_path)
            .field("raw", &"<redacted>")
            .finish()
    }
}

fn redact(part: &str) -> String {
    part.chars().take(12).collect::<String>() + "…"
}
