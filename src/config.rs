use crate::error::{Error, Result};
use crate::executor::PanicStrategy;
use std::time::Duration;

pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "homeward";

/// Sizing and naming of a [`ThreadPool`](crate::executor::ThreadPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub core_threads: usize,
    pub max_threads: usize,
    /// Idle time after which a worker retires. Applies to core workers too.
    pub keep_alive: Duration,
    pub queue_capacity: usize,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub panic_strategy: PanicStrategy,
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// Sizing derived from the number of available CPUs.
    ///
    /// At least 2 and at most 4 core threads, preferring one less than the
    /// CPU count so background work does not saturate the machine.
    pub fn for_parallelism(cpus: usize) -> Self {
        let cpus = cpus.max(1);
        Self {
            core_threads: cpus.saturating_sub(1).clamp(2, 4),
            max_threads: cpus * 2 + 1,
            keep_alive: DEFAULT_KEEP_ALIVE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            stack_size: None,
            panic_strategy: PanicStrategy::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.core_threads == 0 {
            return Err(Error::config("core_threads must be > 0"));
        }
        if self.max_threads == 0 {
            return Err(Error::config("max_threads must be > 0"));
        }
        if self.core_threads > self.max_threads {
            return Err(Error::config("core_threads must not exceed max_threads"));
        }
        if self.max_threads > 1024 {
            return Err(Error::config("max_threads too large (max 1024)"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be > 0"));
        }
        if self.keep_alive.is_zero() {
            return Err(Error::config("keep_alive must be non-zero"));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::for_parallelism(num_cpus::get())
    }
}

#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    pub fn core_threads(mut self, n: usize) -> Self {
        self.config.core_threads = n;
        self
    }

    pub fn max_threads(mut self, n: usize) -> Self {
        self.config.max_threads = n;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
