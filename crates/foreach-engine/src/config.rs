//! Dispatch configuration.

/// Default number of elements per fused chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 65_536;

/// When to use the fused multi-tensor path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Fuse eligible batches on `Gpu` tensors only.
    #[default]
    Auto,
    /// Fuse every eligible batch, on any device.
    Fused,
    /// Always loop over the list with per-tensor ops.
    PerTensor,
}

impl DispatchMode {
    /// Parse `auto`, `fused` or `per-tensor` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(DispatchMode::Auto),
            "fused" => Some(DispatchMode::Fused),
            "per-tensor" | "per_tensor" | "pertensor" => Some(DispatchMode::PerTensor),
            _ => None,
        }
    }
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchMode::Auto => f.write_str("auto"),
            DispatchMode::Fused => f.write_str("fused"),
            DispatchMode::PerTensor => f.write_str("per-tensor"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
    /// Elements per fused chunk. Always at least 1.
    pub chunk_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Auto,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl DispatchConfig {
    pub fn new(mode: DispatchMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Build a config from the environment.
    ///
    /// Priority order:
    /// 1. `FOREACH_RS_DISPATCH` (`"auto"`, `"fused"` or `"per-tensor"`)
    /// 2. `FOREACH_RS_CHUNK_SIZE` (positive integer)
    /// 3. Defaults
    ///
    /// Unrecognized values are ignored.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("FOREACH_RS_DISPATCH").ok().as_deref(),
            std::env::var("FOREACH_RS_CHUNK_SIZE").ok().as_deref(),
        )
    }

    fn from_vars(dispatch: Option<&str>, chunk_size: Option<&str>) -> Self {
        let mut config = Self::default();
        if let Some(mode) = dispatch.and_then(DispatchMode::parse) {
            config.mode = mode;
        }
        if let Some(n) = chunk_size
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
        {
            config.chunk_size = n;
        }
        config
    }
}
