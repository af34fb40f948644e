use std::str::FromStr;

/// Environment variable overriding [`RuntimeConfig::num_threads`].
pub const ENV_NUM_THREADS: &str = "TK_NUM_THREADS";
/// Environment variable overriding [`RuntimeConfig::gpu_max_partitions`].
pub const ENV_GPU_PARTITIONS: &str = "TK_GPU_PARTITIONS";
/// Environment variable overriding [`RuntimeConfig::device_name`].
pub const ENV_DEVICE_NAME: &str = "TK_DEVICE_NAME";

/// Configuration of the execution resources behind a compute context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Size of the CPU worker pool. `None` uses the available parallelism.
    pub num_threads: Option<usize>,
    /// Maximum number of sub-windows one GPU dispatch is split into.
    pub gpu_max_partitions: usize,
    /// Name of the device the command queue is created for.
    pub device_name: String,
    /// Prefix of the worker and device thread names.
    pub thread_name_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            num_threads: None,
            gpu_max_partitions: 1,
            device_name: "host-queue".to_string(),
            thread_name_prefix: "tk".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by the `TK_*` environment variables.
    ///
    /// Reads:
    /// - `TK_NUM_THREADS` -> num_threads (0 means automatic)
    /// - `TK_GPU_PARTITIONS` -> gpu_max_partitions (at least 1)
    /// - `TK_DEVICE_NAME` -> device_name
    ///
    /// Values that fail to parse are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = RuntimeConfig::default();
        if let Some(n) = parse_var::<usize>(&lookup, ENV_NUM_THREADS) {
            config.num_threads = (n > 0).then_some(n);
        }
        if let Some(n) = parse_var::<usize>(&lookup, ENV_GPU_PARTITIONS) {
            config.gpu_max_partitions = n.max(1);
        }
        if let Some(name) = lookup(ENV_DEVICE_NAME) {
            if !name.trim().is_empty() {
                config.device_name = name.trim().to_string();
            }
        }
        config
    }

    /// Number of CPU workers this configuration resolves to.
    pub fn resolved_num_threads(&self) -> usize {
        self.num_threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}
