//! Engine process spawning and termination

use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::engine::endpoint::IpcEndpoint;
use crate::error::{Error, Result};

/// Seconds of stream kept ahead of the playhead
const READAHEAD_SECS: u32 = 20;

/// Command-line arguments for one engine session
pub fn engine_args(endpoint: &IpcEndpoint, stream_url: &str, initial_volume: f64) -> Vec<String> {
    vec![
        "--no-video".to_string(),
        "--no-terminal".to_string(),
        format!("--input-ipc-server={}", endpoint.address()),
        format!("--volume={}", initial_volume.clamp(0.0, 100.0)),
        "--cache=yes".to_string(),
        format!("--cache-secs={}", READAHEAD_SECS),
        format!("--demuxer-readahead-secs={}", READAHEAD_SECS),
        "--demuxer-max-bytes=50MiB".to_string(),
        // Stay up across stream gaps instead of exiting
        "--loop-playlist=force".to_string(),
        "--keep-open=yes".to_string(),
        stream_url.to_string(),
    ]
}

/// Spawn the engine detached from our stdio, in its own process group
pub fn spawn_engine(command: &Path, args: &[String]) -> Result<Child> {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let child = cmd.spawn().map_err(|source| Error::SpawnFailed {
        command: command.display().to_string(),
        source,
    })?;
    debug!(pid = ?child.id(), "Engine process spawned");
    Ok(child)
}

/// Forcibly terminate the process and everything it started
///
/// Errors are logged and swallowed; the process may already be gone.
pub fn kill_tree(pid: u32) {
    #[cfg(unix)]
    {
        let Ok(pgid) = i32::try_from(pid) else {
            warn!(pid, "Process id out of range, not killing");
            return;
        };
        // Negative pid addresses the whole group started with process_group(0)
        let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
        if rc != 0 {
            debug!(pid, "Process group kill failed: {}", std::io::Error::last_os_error());
        }
    }

    #[cfg(windows)]
    {
        let result = std::process::Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T", "/F"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = result {
            warn!(pid, "taskkill failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_select_audio_only_and_private_endpoint() {
        let endpoint = IpcEndpoint::for_token("t0k3n");
        let args = engine_args(&endpoint, "http://stream/live.m4a", 0.0);

        assert!(args.contains(&"--no-video".to_string()));
        assert!(args.contains(&"--keep-open=yes".to_string()));
        assert!(args.contains(&"--volume=0".to_string()));
        assert!(args
            .iter()
            .any(|a| a.starts_with("--input-ipc-server=") && a.contains("t0k3n")));
        assert_eq!(args.last().map(String::as_str), Some("http://stream/live.m4a"));
    }

    #[test]
    fn test_initial_volume_is_clamped() {
        let endpoint = IpcEndpoint::for_token("x");
        let args = engine_args(&endpoint, "u", 250.0);
        assert!(args.contains(&"--volume=100".to_string()));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_is_spawn_failed() {
        let err = spawn_engine(Path::new("/nonexistent/nexus-engine"), &[]).unwrap_err();
        assert!(matches!(err, Error::SpawnFailed { .. }));
        assert!(err.to_string().contains("/nonexistent/nexus-engine"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_tree_terminates_process_group() {
        let mut child = spawn_engine(Path::new("sleep"), &["30".to_string()]).unwrap();
        let pid = child.id().unwrap();
        kill_tree(pid);
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }
}
