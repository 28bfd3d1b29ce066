//! Connection string composition.

use std::fmt;

use url::Url;

use crate::config::{StorageConfig, StorageDescriptor};
use crate::storage::StorageError;

/// Composite connection target built from every configured descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Per-descriptor connection strings joined with `,`.
    pub uri: String,
    /// Host and port of every descriptor, in order.
    pub hosts: Vec<(String, u16)>,
    /// Shard-routing endpoint; the last descriptor declaring one wins.
    pub mongos: Option<String>,
    /// TLS flag; set when any descriptor enables it.
    pub ssl: bool,
}

impl ConnectionTarget {
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let descriptors = config.descriptors();
        if descriptors.is_empty() {
            return Err(StorageError::NoHosts);
        }

        let mut uris = Vec::with_capacity(descriptors.len());
        let mut hosts = Vec::with_capacity(descriptors.len());
        let mut mongos = None;
        let mut ssl = false;

        for (index, descriptor) in descriptors.iter().enumerate() {
            if descriptor.mongos.is_some() {
                mongos = descriptor.mongos.clone();
            }
            ssl |= descriptor.ssl;
            uris.push(connection_uri(descriptor).map_err(|reason| {
                StorageError::InvalidDescriptor { index, reason }
            })?);
            hosts.push((descriptor.host.clone(), descriptor.port));
        }

        Ok(Self {
            uri: uris.join(","),
            hosts,
            mongos,
            ssl,
        })
    }

    /// The composite URI with passwords masked, for logging.
    pub fn redacted(&self) -> Redacted<'_> {
        Redacted(&self.uri)
    }
}

/// Display adapter that masks credentials in a composite URI.
pub struct Redacted<'a>(&'a str);

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .split(',')
            .map(|part| match Url::parse(part) {
                Ok(mut url) if url.password().is_some() => {
                    let _ = url.set_password(Some("****"));
                    url.to_string()
                }
                _ => part.to_string(),
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Render one descriptor as `mongodb://[user:pass@]host:port/name`.
fn connection_uri(descriptor: &StorageDescriptor) -> Result<String, String> {
    if descriptor.host.trim().is_empty() {
        return Err("host is empty".to_string());
    }

    let creds = match (&descriptor.user, &descriptor.pass) {
        (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
            format!("{user}:{pass}@")
        }
        _ => String::new(),
    };
    let uri = format!(
        "mongodb://{}{}:{}/{}",
        creds, descriptor.host, descriptor.port, descriptor.name
    );

    Url::parse(&uri).map_err(|e| e.to_string())?;
    Ok(uri)
}
