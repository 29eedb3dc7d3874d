//! Engine configuration.

/// Configuration for the consistency engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Conditional-create attempts before identifier allocation gives up
    /// with `AllocationExhausted` (default: 5).
    pub max_id_allocation_attempts: u32,
    /// Page size for full scans (audit) and the number of unsynced
    /// employees handled per reconciliation pass (default: 100).
    pub reconcile_batch_size: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_id_allocation_attempts: 5,
            reconcile_batch_size: 100,
        }
    }
}
