use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::EntityKind;
use crate::ports::Workload;

/// Workloads keyed by entity name, with one default per kind.
///
/// Built by the executor builder (mutable), then shared read-only by the
/// workers. No lock needed.
pub(crate) struct WorkloadRegistry {
    by_name: HashMap<String, Arc<dyn Workload>>,
    default_job: Arc<dyn Workload>,
    default_batch: Arc<dyn Workload>,
}

impl WorkloadRegistry {
    pub fn new(default_job: Arc<dyn Workload>, default_batch: Arc<dyn Workload>) -> Self {
        Self {
            by_name: HashMap::new(),
            default_job,
            default_batch,
        }
    }

    /// Errors with the name if it already has a workload.
    pub fn register(
        &mut self,
        name: String,
        workload: Arc<dyn Workload>,
    ) -> Result<(), String> {
        if self.by_name.contains_key(&name) {
            return Err(name);
        }
        self.by_name.insert(name, workload);
        Ok(())
    }

    pub fn resolve(&self, name: &str, kind: EntityKind) -> Arc<dyn Workload> {
        if let Some(workload) = self.by_name.get(name) {
            return Arc::clone(workload);
        }
        match kind {
            EntityKind::Job => Arc::clone(&self.default_job),
            EntityKind::Batch => Arc::clone(&self.default_batch),
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }
}
