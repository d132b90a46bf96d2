use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per item for transport failures (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
    /// Jitter fraction applied to each delay, in [0, 1].
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_secs: 0.5,
            max_delay_secs: 60,
            jitter: 0.25,
        }
    }
}

/// Transfer backend: direct (in-process curl), an external accelerator tool,
/// or hybrid (accelerator with direct fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Direct,
    Accelerator,
    Hybrid,
}

/// Global configuration loaded from `~/.config/varc/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarcConfig {
    /// Root directory for committed bundles (one subdirectory per item id).
    pub storage_root: PathBuf,
    /// Storage ceiling in GiB (fractional allowed); cumulative committed
    /// bytes never exceed this.
    pub max_storage_gb: f64,
    /// Number of items downloaded concurrently.
    pub parallel_downloads: usize,
    /// Delay between page fetches from the source feed, in milliseconds.
    pub request_delay_ms: u64,
    /// Pages per manifest batch.
    pub pages_per_batch: u32,
    /// Transfer backend selection: "direct", "accelerator", or "hybrid".
    #[serde(default)]
    pub backend: BackendKind,
    /// Path to the external accelerator tool (required for accelerator/hybrid).
    #[serde(default)]
    pub accelerator_path: Option<PathBuf>,
    /// Maximum item-level attempts for transient transport failures.
    pub max_retries: u32,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// User-Agent header sent by the direct backend.
    pub user_agent: String,
    /// Minimum acceptable video size in bytes.
    pub min_video_bytes: u64,
    /// Minimum acceptable thumbnail size in bytes.
    pub min_thumb_bytes: u64,
    /// If false, validation is reduced to exists/non-empty checks.
    pub validate_downloads: bool,
    /// Optional retry policy overrides; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for VarcConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("archive"),
            max_storage_gb: 100.0,
            parallel_downloads: 3,
            request_delay_ms: 1000,
            pages_per_batch: 10,
            backend: BackendKind::Direct,
            accelerator_path: None,
            max_retries: 3,
            request_timeout_secs: 120,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36".to_string(),
            min_video_bytes: 1024 * 1024,
            min_thumb_bytes: 100,
            validate_downloads: true,
            retry: None,
        }
    }
}

impl VarcConfig {
    /// Storage ceiling in bytes.
    pub fn max_storage_bytes(&self) -> u64 {
        (self.max_storage_gb * 1024.0 * 1024.0 * 1024.0) as u64
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("varc")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VarcConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = VarcConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: VarcConfig = toml::from_str(&data)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Reject configurations that cannot run (missing accelerator, zero ceiling).
pub fn validate(cfg: &VarcConfig) -> Result<()> {
    if cfg.max_storage_gb <= 0.0 {
        anyhow::bail!("max_storage_gb must be positive");
    }
    if cfg.parallel_downloads == 0 {
        anyhow::bail!("parallel_downloads must be at least 1");
    }
    if matches!(cfg.backend, BackendKind::Accelerator | BackendKind::Hybrid)
        && cfg.accelerator_path.is_none()
    {
        anyhow::bail!(
            "backend \"{}\" requires accelerator_path",
            match cfg.backend {
                BackendKind::Accelerator => "accelerator",
                _ => "hybrid",
            }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = VarcConfig::default();
        assert_eq!(cfg.parallel_downloads, 3);
        assert!((cfg.max_storage_gb - 100.0).abs() < 1e-9);
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.backend, BackendKind::Direct);
        assert_eq!(cfg.min_video_bytes, 1024 * 1024);
        assert!(cfg.validate_downloads);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = VarcConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: VarcConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.storage_root, cfg.storage_root);
        assert!((parsed.max_storage_gb - cfg.max_storage_gb).abs() < 1e-9);
        assert_eq!(parsed.parallel_downloads, cfg.parallel_downloads);
        assert_eq!(parsed.backend, cfg.backend);
    }

    #[test]
    fn config_toml_backend_variants() {
        let toml = r#"
            storage_root = "/srv/archive"
            max_storage_gb = 3
            parallel_downloads = 2
            request_delay_ms = 0
            pages_per_batch = 5
            backend = "hybrid"
            accelerator_path = "/usr/bin/aria2c"
            max_retries = 3
            request_timeout_secs = 30
            user_agent = "test"
            min_video_bytes = 2048
            min_thumb_bytes = 64
            validate_downloads = true
        "#;
        let cfg: VarcConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.backend, BackendKind::Hybrid);
        assert_eq!(
            cfg.accelerator_path.as_deref(),
            Some(std::path::Path::new("/usr/bin/aria2c"))
        );
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn accelerator_backend_requires_tool_path() {
        let mut cfg = VarcConfig::default();
        cfg.backend = BackendKind::Accelerator;
        assert!(validate(&cfg).is_err());
        cfg.accelerator_path = Some(PathBuf::from("/usr/bin/aria2c"));
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn config_toml_retry_section() {
        let toml = r#"
            storage_root = "archive"
            max_storage_gb = 100
            parallel_downloads = 3
            request_delay_ms = 1000
            pages_per_batch = 10
            max_retries = 3
            request_timeout_secs = 120
            user_agent = "test"
            min_video_bytes = 1048576
            min_thumb_bytes = 100
            validate_downloads = false

            [retry]
            max_attempts = 2
            base_delay_secs = 1.0
            max_delay_secs = 10
            jitter = 0.5
        "#;
        let cfg: VarcConfig = toml::from_str(toml).unwrap();
        let retry = cfg.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 2);
        assert!((retry.base_delay_secs - 1.0).abs() < 1e-9);
        assert_eq!(retry.max_delay_secs, 10);
        assert!(!cfg.validate_downloads);
    }

    #[test]
    fn ceiling_in_bytes() {
        let mut cfg = VarcConfig::default();
        cfg.max_storage_gb = 3.0;
        assert_eq!(cfg.max_storage_bytes(), 3 * 1024 * 1024 * 1024);
        // Fractional ceilings let small deployments (and tests) stay exact.
        cfg.max_storage_gb = 0.5;
        assert_eq!(cfg.max_storage_bytes(), 512 * 1024 * 1024);
    }
}
