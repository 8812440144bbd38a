//! Runtime configuration.
//!
//! The external string strategy is chosen once at startup. It is taken from
//! the environment or set by the embedder before the context is built.

use lowmem_log::Level;

use crate::error::{Error, Result};
use crate::extstr::{DEFAULT_FLASH_CAPACITY, StoreKind};

/// Selects the external string strategy (`none`, `flash`, `constant` or `tracking`).
pub const EXTSTR_ENV: &str = "LOWMEM_EXTSTR";

/// Size of the flash area in bytes.
pub const FLASH_CAPACITY_ENV: &str = "LOWMEM_FLASH_CAPACITY";

/// Configuration of the external string store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// `None` disables external strings.
    pub kind: Option<StoreKind>,
    /// Capacity of the flash store; ignored by the other strategies.
    pub flash_capacity: usize,
}

impl StoreConfig {
    #[must_use]
    pub const fn new(kind: Option<StoreKind>) -> Self {
        Self {
            kind,
            flash_capacity: DEFAULT_FLASH_CAPACITY,
        }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(None)
    }

    #[must_use]
    pub const fn with_flash_capacity(mut self, capacity: usize) -> Self {
        self.flash_capacity = capacity;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(Some(StoreKind::Flash))
    }
}

/// Everything [`LowMemContext`](crate::context::LowMemContext) needs besides
/// the pool table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreConfig,
    pub heap_count: usize,
    /// Logger level to install; `None` keeps the current one.
    pub log_level: Option<Level>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            heap_count: 1,
            log_level: None,
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_store_kind(mut self, kind: Option<StoreKind>) -> Self {
        self.store.kind = kind;
        self
    }

    #[must_use]
    pub fn with_heap_count(mut self, heap_count: usize) -> Self {
        self.heap_count = heap_count;
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Reads [`EXTSTR_ENV`], [`FLASH_CAPACITY_ENV`] and
    /// [`lowmem_log::LOG_ENV`] on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(EXTSTR_ENV) {
            config.store.kind = parse_store_kind(&value)?;
        }

        if let Some(value) = lookup(FLASH_CAPACITY_ENV) {
            config.store.flash_capacity =
                value.trim().parse::<usize>().map_err(|_| Error::InvalidConfigValue {
                    key: FLASH_CAPACITY_ENV,
                    value: value.clone(),
                })?;
        }

        if let Some(value) = lookup(lowmem_log::LOG_ENV) {
            let level = value.parse::<Level>().map_err(|_| Error::InvalidConfigValue {
                key: lowmem_log::LOG_ENV,
                value: value.clone(),
            })?;
            config.log_level = Some(level);
        }

        Ok(config)
    }

    /// Installs the configured log level, if any.
    pub fn apply_logging(&self) {
        if let Some(level) = self.log_level {
            lowmem_log::set_level(level);
        }
    }
}

fn parse_store_kind(value: &str) -> Result<Option<StoreKind>> {
    match value.trim() {
        "" => Ok(None),
        v if v.eq_ignore_ascii_case("none") || v.eq_ignore_ascii_case("off") => Ok(None),
        v => v
            .parse::<StoreKind>()
            .map(Some)
            .map_err(|_| Error::InvalidConfigValue {
                key: EXTSTR_ENV,
                value: value.to_string(),
            }),
    }
}
