//! Direct HTTP GET transport (in-process, libcurl).
//!
//! Streams the response body sequentially into the destination file. Carries
//! one connection-level retry for low-level read/recv failures; that retry is
//! internal to the transport and distinct from the scheduler's item-level
//! retry policy.

use super::TransportError;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Connection-level attempts per fetch (the first plus one quick retry).
const CONNECT_ATTEMPTS: u32 = 2;

/// In-process curl transport with the run's headers and timeouts baked in.
pub struct Direct {
    user_agent: String,
    timeout: Duration,
}

impl Direct {
    pub fn new(cfg: &crate::config::VarcConfig) -> Self {
        Self {
            user_agent: cfg.user_agent.clone(),
            timeout: Duration::from_secs(cfg.request_timeout_secs.max(1)),
        }
    }

    /// Fetch `url` into `dest` (truncating it), returning bytes written.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let mut last_err: Option<TransportError> = None;
        for attempt in 1..=CONNECT_ATTEMPTS {
            match self.fetch_once(url, dest) {
                Ok(n) => return Ok(n),
                Err(e) => {
                    let retryable = matches!(
                        &e,
                        TransportError::Curl(ce)
                            if ce.is_read_error() || ce.is_recv_error() || ce.is_got_nothing()
                    );
                    if !retryable || attempt == CONNECT_ATTEMPTS {
                        return Err(e);
                    }
                    tracing::debug!(url, attempt, error = %e, "connection-level retry");
                    last_err = Some(e);
                }
            }
        }
        // Unreachable: the loop always returns. Kept for totality.
        Err(last_err.unwrap_or(TransportError::Http(0)))
    }

    fn fetch_once(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let file = File::create(dest)?;
        let written = Arc::new(AtomicU64::new(0));
        let written_cb = Arc::clone(&written);

        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.useragent(&self.user_agent)?;
        easy.connect_timeout(Duration::from_secs(30))?;
        easy.timeout(self.timeout)?;
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(Duration::from_secs(60))?;

        {
            let mut file = file;
            let mut transfer = easy.transfer();
            transfer.write_function(move |data| {
                match file.write_all(data) {
                    Ok(()) => {
                        written_cb.fetch_add(data.len() as u64, Ordering::Relaxed);
                        Ok(data.len())
                    }
                    Err(e) => {
                        tracing::warn!("write to temp file failed: {}", e);
                        Ok(0) // abort transfer
                    }
                }
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            let _ = std::fs::remove_file(dest);
            return Err(TransportError::Http(code));
        }
        Ok(written.load(Ordering::Relaxed))
    }
}
