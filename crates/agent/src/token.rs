use std::fmt;
use std::io;
use std::path::Path;

use tracing::{debug, info};

/// Opaque per-installation credential linking this agent to an account.
#[derive(Clone, PartialEq, Eq)]
pub struct AgentToken(String);

impl AgentToken {
    /// Returns `None` for a blank token.
    pub fn new(token: impl AsRef<str>) -> Option<Self> {
        let token = token.as_ref().trim();
        (!token.is_empty()).then(|| Self(token.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read the token file. A missing or blank file is `Ok(None)`.
    pub async fn load(path: &Path) -> io::Result<Option<Self>> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Self::new(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "agent token file not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Write the token file, creating parent directories as needed.
    pub async fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &self.0).await?;
        info!(path = %path.display(), "agent token saved");
        Ok(())
    }
}

impl fmt::Debug for AgentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AgentToken([REDACTED])")
    }
}
