//! Private control endpoint of one engine process
//!
//! - Unix: socket file `<temp>/nexus-radio-<token>.sock`, removed on cleanup
//! - Windows: named pipe `\\.\pipe\nexus-radio-<token>`
//!
//! The token is random per session, so concurrent sessions (crossfade
//! overlap) never share an endpoint.

use std::io;
#[cfg(unix)]
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;
use uuid::Uuid;

/// Read half of a control channel
pub type ChannelReader = Box<dyn AsyncRead + Send + Unpin>;
/// Write half of a control channel
pub type ChannelWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcEndpoint {
    #[cfg(unix)]
    path: PathBuf,
    #[cfg(windows)]
    name: String,
}

impl IpcEndpoint {
    /// Fresh endpoint named from a random token
    pub fn unique() -> Self {
        let token = Uuid::new_v4().simple().to_string();
        Self::for_token(&token)
    }

    #[cfg(unix)]
    pub fn for_token(token: &str) -> Self {
        Self {
            path: std::env::temp_dir().join(format!("nexus-radio-{}.sock", token)),
        }
    }

    #[cfg(windows)]
    pub fn for_token(token: &str) -> Self {
        Self {
            name: format!(r"\\.\pipe\nexus-radio-{}", token),
        }
    }

    /// Endpoint at an explicit socket path
    #[cfg(unix)]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Value handed to the engine's `--input-ipc-server`
    pub fn address(&self) -> String {
        #[cfg(unix)]
        {
            self.path.to_string_lossy().into_owned()
        }
        #[cfg(windows)]
        {
            self.name.clone()
        }
    }

    /// One connection attempt
    pub async fn connect(&self) -> io::Result<(ChannelReader, ChannelWriter)> {
        #[cfg(unix)]
        {
            let stream = tokio::net::UnixStream::connect(&self.path).await?;
            let (reader, writer) = stream.into_split();
            Ok((Box::new(reader), Box::new(writer)))
        }
        #[cfg(windows)]
        {
            let client = tokio::net::windows::named_pipe::ClientOptions::new().open(&self.name)?;
            let (reader, writer) = tokio::io::split(client);
            Ok((Box::new(reader), Box::new(writer)))
        }
    }

    /// Remove leftovers of the endpoint. Errors are ignored.
    pub fn cleanup(&self) {
        #[cfg(unix)]
        {
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!("Removed control socket {}", self.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => debug!("Could not remove control socket {}: {}", self.path.display(), e),
            }
        }
        #[cfg(windows)]
        {
            // Named pipes vanish with their last handle
            debug!("Control pipe {} released", self.name);
        }
    }
}
