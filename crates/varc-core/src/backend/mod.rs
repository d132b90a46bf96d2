//! Transfer backends.
//!
//! A closed set of transports: Direct (in-process curl), Accelerator (an
//! out-of-process tool driven through a fixed argv contract), and Hybrid
//! (accelerator with in-attempt fallback to direct). Selection is a static
//! config choice resolved once per run, never per item.

mod accelerator;
mod direct;
mod probe;

pub use accelerator::Accelerator;
pub use direct::Direct;
pub use probe::probe_content_length;

use crate::config::{BackendKind, VarcConfig};
use anyhow::Result;
use std::path::Path;
use thiserror::Error;

/// Transport-level failure for a single fetch. Classified by the retry
/// policy; storage failures are never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    /// libcurl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// The external accelerator tool failed: could not spawn, exited
    /// non-zero, timed out, or produced no output file.
    #[error("accelerator: {0}")]
    Tool(String),
    /// Disk write failed (disk full, permission denied). Not retried.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
}

/// The configured transport for this run.
pub enum Backend {
    Direct(Direct),
    Accelerator(Accelerator),
    Hybrid {
        accelerator: Accelerator,
        direct: Direct,
    },
}

impl Backend {
    /// Resolve the backend from config. Config validation has already
    /// guaranteed an accelerator path where one is required.
    pub fn from_config(cfg: &VarcConfig) -> Result<Self> {
        let direct = Direct::new(cfg);
        match cfg.backend {
            BackendKind::Direct => Ok(Backend::Direct(direct)),
            BackendKind::Accelerator => Ok(Backend::Accelerator(Accelerator::from_config(cfg)?)),
            BackendKind::Hybrid => Ok(Backend::Hybrid {
                accelerator: Accelerator::from_config(cfg)?,
                direct,
            }),
        }
    }

    /// Fetch `url` into `dest`, returning the number of bytes written.
    ///
    /// Hybrid tries the accelerator and falls back to direct on any of its
    /// failures within the same logical attempt; the fallback does not
    /// consume an item-level retry.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        match self {
            Backend::Direct(d) => d.fetch(url, dest),
            Backend::Accelerator(a) => a.fetch(url, dest),
            Backend::Hybrid { accelerator, direct } => match accelerator.fetch(url, dest) {
                Ok(n) => Ok(n),
                Err(TransportError::Storage(e)) => Err(TransportError::Storage(e)),
                Err(e) => {
                    tracing::warn!(url, error = %e, "accelerator failed, falling back to direct");
                    direct.fetch(url, dest)
                }
            },
        }
    }

    /// Short name for logs and the run summary.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Direct(_) => "direct",
            Backend::Accelerator(_) => "accelerator",
            Backend::Hybrid { .. } => "hybrid",
        }
    }
}
