//! ExecutorBuilder - wiring for the task executor.
//!
//! Everything is resolved at `build()` time:
//! - config is validated
//! - every per-entity workload must name a registered entity
//! - workers are spawned last, once nothing can fail anymore

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::run_queue::RunQueue;
use super::worker::WorkerGroup;
use super::workloads::WorkloadRegistry;
use super::{Shared, TaskExecutor};
use crate::config::{ConfigError, ExecutorConfig};
use crate::events::EventBus;
use crate::impls::{BatchWorkload, TickingWorkload};
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator, Workload};
use crate::registry::Registry;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("workloads registered for unknown entities: {0:?}")]
    UnknownEntities(Vec<String>),

    #[error("a workload is already registered for '{0}'")]
    DuplicateWorkload(String),
}

/// Builds a [`TaskExecutor`] over a shared registry.
///
/// ```ignore
/// let executor = TaskExecutor::builder(registry)
///     .pool_size(2)
///     .workload("Image Retag", RetagWorkload::new(client))?
///     .build()
///     .await?;
/// ```
pub struct ExecutorBuilder {
    registry: Arc<Registry>,
    config: ExecutorConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    overrides: HashMap<String, Arc<dyn Workload>>,
    default_job: Option<Arc<dyn Workload>>,
    default_batch: Option<Arc<dyn Workload>>,
}

impl ExecutorBuilder {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            config: ExecutorConfig::default(),
            clock: None,
            ids: None,
            overrides: HashMap::new(),
            default_job: None,
            default_batch: None,
        }
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    /// Timestamps on events. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Run id source. Defaults to a ULID generator on the executor clock.
    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    /// Use `workload` for the entity called `name` instead of its kind default.
    pub fn workload(
        mut self,
        name: impl Into<String>,
        workload: impl Workload + 'static,
    ) -> Result<Self, BuildError> {
        let name = name.into();
        if self.overrides.contains_key(&name) {
            return Err(BuildError::DuplicateWorkload(name));
        }
        self.overrides.insert(name, Arc::new(workload));
        Ok(self)
    }

    /// Defaults to [`TickingWorkload`] driven by the config.
    pub fn default_job_workload(mut self, workload: impl Workload + 'static) -> Self {
        self.default_job = Some(Arc::new(workload));
        self
    }

    /// Defaults to [`BatchWorkload`] driven by the config.
    pub fn default_batch_workload(mut self, workload: impl Workload + 'static) -> Self {
        self.default_batch = Some(Arc::new(workload));
        self
    }

    pub async fn build(self) -> Result<TaskExecutor, BuildError> {
        self.config.validate()?;

        let mut unknown = Vec::new();
        for name in self.overrides.keys() {
            if !self.registry.contains(name).await {
                unknown.push(name.clone());
            }
        }
        if !unknown.is_empty() {
            unknown.sort();
            return Err(BuildError::UnknownEntities(unknown));
        }

        let config = self.config;
        let default_job = self.default_job.unwrap_or_else(|| {
            Arc::new(TickingWorkload::new(config.tick(), config.progress_step))
        });
        let default_batch = self.default_batch.unwrap_or_else(|| {
            Arc::new(BatchWorkload::new(config.batch_tick(), config.batch_waves))
        });
        let mut workloads = WorkloadRegistry::new(default_job, default_batch);
        for (name, workload) in self.overrides {
            workloads
                .register(name, workload)
                .map_err(BuildError::DuplicateWorkload)?;
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        let shared = Arc::new(Shared {
            registry: self.registry,
            bus: EventBus::new(config.event_capacity),
            clock,
            ids,
            queue: RunQueue::new(),
            workloads,
            active: Mutex::new(HashMap::new()),
            config,
        });

        let workers = WorkerGroup::spawn(shared.config.pool_size, Arc::clone(&shared));
        tracing::info!(
            pool_size = shared.config.pool_size,
            overrides = shared.workloads.len(),
            "executor started"
        );
        Ok(TaskExecutor { shared, workers })
    }
}
