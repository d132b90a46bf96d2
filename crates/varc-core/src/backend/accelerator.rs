//! External accelerator transport.
//!
//! Drives an out-of-process download tool through a fixed argv contract:
//! `<tool> -d <dir> -o <filename> <url>` (aria2c-compatible). The tool is
//! opaque: success is inferred from the exit status and the presence of the
//! destination file, never from parsing tool output.

use super::TransportError;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Poll interval while waiting for the tool to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct Accelerator {
    tool: PathBuf,
    timeout: Duration,
}

impl Accelerator {
    pub fn from_config(cfg: &crate::config::VarcConfig) -> Result<Self> {
        let tool = cfg
            .accelerator_path
            .clone()
            .ok_or_else(|| anyhow::anyhow!("accelerator backend selected without accelerator_path"))?;
        Ok(Self {
            tool,
            timeout: Duration::from_secs(cfg.request_timeout_secs.max(1)),
        })
    }

    /// Fetch `url` into `dest` via the external tool, returning bytes written.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let dir = dest
            .parent()
            .ok_or_else(|| TransportError::Tool("destination has no parent directory".into()))?;
        let filename = dest
            .file_name()
            .ok_or_else(|| TransportError::Tool("destination has no filename".into()))?;

        // Stale output from a previous attempt must not count as success.
        if dest.exists() {
            std::fs::remove_file(dest)?;
        }

        let mut child = Command::new(&self.tool)
            .arg("-d")
            .arg(dir)
            .arg("-o")
            .arg(filename)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| TransportError::Tool(format!("failed to spawn {}: {}", self.tool.display(), e)))?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(TransportError::Tool(format!(
                            "timed out after {:?}",
                            self.timeout
                        )));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(TransportError::Tool(format!("wait failed: {}", e)));
                }
            }
        };

        if !status.success() {
            return Err(TransportError::Tool(format!("exited with {}", status)));
        }

        match std::fs::metadata(dest) {
            Ok(meta) if meta.len() > 0 => Ok(meta.len()),
            Ok(_) => Err(TransportError::Tool("output file is empty".into())),
            Err(_) => Err(TransportError::Tool("output file missing after exit 0".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VarcConfig;

    fn accel_with_tool(tool: &str) -> Accelerator {
        let mut cfg = VarcConfig::default();
        cfg.accelerator_path = Some(PathBuf::from(tool));
        cfg.request_timeout_secs = 5;
        Accelerator::from_config(&cfg).unwrap()
    }

    #[test]
    fn missing_tool_is_a_tool_error() {
        let accel = accel_with_tool("/nonexistent/tool-for-tests");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.mp4");
        match accel.fetch("http://localhost/never", &dest) {
            Err(TransportError::Tool(msg)) => assert!(msg.contains("spawn")),
            other => panic!("expected Tool error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn exit_zero_without_output_is_a_tool_error() {
        // `true` exits 0 but writes nothing; the contract requires the file.
        let accel = accel_with_tool("/bin/true");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.mp4");
        match accel.fetch("http://localhost/never", &dest) {
            Err(TransportError::Tool(msg)) => assert!(msg.contains("missing")),
            other => panic!("expected Tool error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn nonzero_exit_is_a_tool_error() {
        let accel = accel_with_tool("/bin/false");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.mp4");
        assert!(matches!(
            accel.fetch("http://localhost/never", &dest),
            Err(TransportError::Tool(_))
        ));
    }
}
