//! Capacity provider abstraction over the compute substrate.
//!
//! The pool manager never talks to a concrete provisioning mechanism; it
//! goes through [`CapacityProvider`], so the scheduling loop is decoupled
//! from how worker capacity actually comes into existence (managed cloud
//! fleet, local processes, a test fake).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use vfp_core::{UnitId, WorkerCapacityUnit};

/// Provisions and tears down worker capacity units.
///
/// Both operations may take non-trivial wall-clock time; callers treat them
/// as asynchronous and never hold locks across them.
#[async_trait]
pub trait CapacityProvider: Send + Sync {
    /// Bring up one capacity unit of the given size.
    async fn provision(&self, vcpus: u32, memory_mib: u32) -> anyhow::Result<WorkerCapacityUnit>;

    /// Tear down a capacity unit. Idempotent; deprovisioning an unknown
    /// unit is not an error.
    async fn deprovision(&self, unit_id: UnitId) -> anyhow::Result<()>;
}

/// In-process capacity provider modeling an elastic compute environment.
///
/// Units are plain in-memory records; the optional `provisioning_delay`
/// simulates the instance-launch latency of a real substrate.
pub struct ElasticProvider {
    provisioning_delay: Duration,
    provisioned: AtomicUsize,
    deprovisioned: AtomicUsize,
}

impl ElasticProvider {
    pub fn new(provisioning_delay: Duration) -> Self {
        Self {
            provisioning_delay,
            provisioned: AtomicUsize::new(0),
            deprovisioned: AtomicUsize::new(0),
        }
    }

    /// Total units ever provisioned.
    pub fn provisioned_count(&self) -> usize {
        self.provisioned.load(Ordering::SeqCst)
    }

    /// Total units ever deprovisioned.
    pub fn deprovisioned_count(&self) -> usize {
        self.deprovisioned.load(Ordering::SeqCst)
    }
}

impl Default for ElasticProvider {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[async_trait]
impl CapacityProvider for ElasticProvider {
    async fn provision(&self, vcpus: u32, memory_mib: u32) -> anyhow::Result<WorkerCapacityUnit> {
        if !self.provisioning_delay.is_zero() {
            tokio::time::sleep(self.provisioning_delay).await;
        }
        let unit = WorkerCapacityUnit::new(vcpus, memory_mib);
        self.provisioned.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(unit_id = %unit.id, vcpus, memory_mib, "Capacity unit provisioned");
        Ok(unit)
    }

    async fn deprovision(&self, unit_id: UnitId) -> anyhow::Result<()> {
        self.deprovisioned.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(unit_id = %unit_id, "Capacity unit deprovisioned");
        Ok(())
    }
}
