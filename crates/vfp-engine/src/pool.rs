//! Elastic worker capacity pool.
//!
//! Maintains worker capacity units between a configured minimum and maximum
//! vCPU ceiling. The scheduler calls [`reconcile`](ResourcePoolManager::reconcile)
//! every tick to scale the pool against queued demand; dispatch-side callers
//! only ever hit the non-blocking [`request_capacity`](ResourcePoolManager::request_capacity)
//! and [`release`](ResourcePoolManager::release).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use vfp_core::{CoreError, JobId, UnitId, WorkerCapacityUnit};

use crate::provider::CapacityProvider;

/// Pool sizing configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Floor the pool never shrinks below, in vCPUs.
    pub min_vcpus: u32,
    /// Ceiling the pool never grows above, in vCPUs.
    pub max_vcpus: u32,
    /// Initial capacity provisioned at bootstrap, in vCPUs. Steady-state
    /// sizing afterwards is demand-driven between min and max.
    pub desired_vcpus: u32,
    /// vCPUs per provisioned unit.
    pub unit_vcpus: u32,
    /// Memory per provisioned unit, in MiB.
    pub unit_memory_mib: u32,
    /// How long a unit beyond the minimum may sit idle before it is
    /// deprovisioned.
    pub idle_grace: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_vcpus: 1,
            max_vcpus: 8,
            desired_vcpus: 0,
            unit_vcpus: 1,
            unit_memory_mib: 512,
            idle_grace: Duration::from_secs(60),
        }
    }
}

/// Elastically sized pool of [`WorkerCapacityUnit`]s.
///
/// Invariants:
/// - total provisioned vCPUs never exceed `max_vcpus`;
/// - a unit holds at most one job, enforced at assignment time;
/// - `request_capacity` never blocks on provisioning; it either assigns an
///   idle unit or fails with the transient
///   [`CoreError::CapacityUnavailable`].
pub struct ResourcePoolManager {
    config: PoolConfig,
    provider: Arc<dyn CapacityProvider>,
    units: Mutex<HashMap<UnitId, WorkerCapacityUnit>>,
}

impl ResourcePoolManager {
    pub fn new(config: PoolConfig, provider: Arc<dyn CapacityProvider>) -> Self {
        Self {
            config,
            provider,
            units: Mutex::new(HashMap::new()),
        }
    }

    /// Provision the configured initial capacity (`desired_vcpus`, capped at
    /// `max_vcpus`). Called once at startup.
    pub async fn bootstrap(&self) -> anyhow::Result<()> {
        let target = self.config.desired_vcpus.min(self.config.max_vcpus);
        while self.total_vcpus() + self.config.unit_vcpus <= target {
            self.provision_one().await?;
        }
        Ok(())
    }

    /// Assign an idle unit that fits the request to `job_id`.
    ///
    /// Non-blocking: if no idle unit fits right now the call fails
    /// immediately with [`CoreError::CapacityUnavailable`] and the caller
    /// re-polls after the next reconcile pass.
    pub fn request_capacity(
        &self,
        job_id: JobId,
        vcpus: u32,
        memory_mib: u32,
    ) -> Result<WorkerCapacityUnit, CoreError> {
        let mut units = self.lock();
        let unit = units
            .values_mut()
            .filter(|unit| unit.is_idle() && unit.fits(vcpus, memory_mib))
            .min_by_key(|unit| (unit.vcpus, unit.memory_mib))
            .ok_or(CoreError::CapacityUnavailable)?;
        unit.assigned_job = Some(job_id);
        Ok(unit.clone())
    }

    /// Return a unit to the idle set, resetting its grace-period clock.
    ///
    /// Releasing a unit that has already been deprovisioned is harmless.
    pub fn release(&self, unit_id: UnitId) {
        let mut units = self.lock();
        match units.get_mut(&unit_id) {
            Some(unit) => {
                unit.assigned_job = None;
                unit.idle_since = Utc::now();
            }
            None => {
                tracing::warn!(unit_id = %unit_id, "Released unit is no longer in the pool");
            }
        }
    }

    /// Whether an idle unit fitting the request exists right now.
    pub fn has_idle_capacity(&self, vcpus: u32, memory_mib: u32) -> bool {
        self.lock()
            .values()
            .any(|unit| unit.is_idle() && unit.fits(vcpus, memory_mib))
    }

    /// One scaling pass against current queued demand (in vCPUs).
    ///
    /// Scale-up: provision units while queued demand is unserved by idle
    /// capacity and the ceiling permits, and always restore the configured
    /// minimum. Scale-down: deprovision units that have been idle longer
    /// than the grace period, keeping the minimum and never tearing down
    /// capacity that current demand would immediately need.
    ///
    /// Provisioning goes through the [`CapacityProvider`] and may take real
    /// wall-clock time; only the scheduler loop awaits it.
    pub async fn reconcile(&self, queued_demand_vcpus: u32) -> anyhow::Result<()> {
        // --- Scale up ---
        loop {
            let (total, idle) = self.vcpu_totals();
            let floor_deficit = self.config.min_vcpus.saturating_sub(total);
            let unserved = queued_demand_vcpus.saturating_sub(idle);
            let headroom = self.config.max_vcpus.saturating_sub(total);
            let want = floor_deficit.max(unserved).min(headroom);
            if want == 0 || self.config.unit_vcpus > headroom {
                break;
            }
            self.provision_one().await?;
        }

        // --- Scale down ---
        let now = Utc::now();
        let grace = chrono::Duration::from_std(self.config.idle_grace)
            .unwrap_or(chrono::Duration::MAX);
        loop {
            let candidate = {
                let units = self.lock();
                let (total, idle) = Self::totals_of(&units);
                let spare = idle.saturating_sub(queued_demand_vcpus);

                units
                    .values()
                    .filter(|unit| {
                        unit.is_idle()
                            && now.signed_duration_since(unit.idle_since) > grace
                            && total - unit.vcpus >= self.config.min_vcpus
                            && unit.vcpus <= spare
                    })
                    .min_by_key(|unit| unit.idle_since)
                    .map(|unit| unit.id)
            };
            let Some(unit_id) = candidate else { break };

            self.lock().remove(&unit_id);
            self.provider.deprovision(unit_id).await?;
            tracing::info!(unit_id = %unit_id, "Idle capacity unit deprovisioned");
        }

        Ok(())
    }

    /// Total provisioned vCPUs (idle + assigned).
    pub fn total_vcpus(&self) -> u32 {
        self.vcpu_totals().0
    }

    /// vCPUs currently assigned to running jobs.
    pub fn assigned_vcpus(&self) -> u32 {
        let (total, idle) = self.vcpu_totals();
        total - idle
    }

    /// Number of provisioned units.
    pub fn unit_count(&self) -> usize {
        self.lock().len()
    }

    /// Snapshot of every unit in the pool.
    pub fn units(&self) -> Vec<WorkerCapacityUnit> {
        self.lock().values().cloned().collect()
    }

    async fn provision_one(&self) -> anyhow::Result<()> {
        let unit = self
            .provider
            .provision(self.config.unit_vcpus, self.config.unit_memory_mib)
            .await?;
        tracing::info!(unit_id = %unit.id, vcpus = unit.vcpus, "Capacity unit joined the pool");
        self.lock().insert(unit.id, unit);
        Ok(())
    }

    fn vcpu_totals(&self) -> (u32, u32) {
        Self::totals_of(&self.lock())
    }

    fn totals_of(units: &HashMap<UnitId, WorkerCapacityUnit>) -> (u32, u32) {
        let total = units.values().map(|unit| unit.vcpus).sum();
        let idle = units
            .values()
            .filter(|unit| unit.is_idle())
            .map(|unit| unit.vcpus)
            .sum();
        (total, idle)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UnitId, WorkerCapacityUnit>> {
        self.units.lock().expect("pool lock poisoned")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ElasticProvider;
    use assert_matches::assert_matches;
    use uuid::Uuid;

    fn pool(config: PoolConfig) -> (ResourcePoolManager, Arc<ElasticProvider>) {
        let provider = Arc::new(ElasticProvider::default());
        let pool = ResourcePoolManager::new(config, Arc::clone(&provider) as Arc<dyn CapacityProvider>);
        (pool, provider)
    }

    #[tokio::test]
    async fn request_before_any_provisioning_is_unavailable() {
        let (pool, _) = pool(PoolConfig::default());
        assert_matches!(
            pool.request_capacity(Uuid::now_v7(), 1, 512),
            Err(CoreError::CapacityUnavailable)
        );
    }

    #[tokio::test]
    async fn reconcile_restores_minimum_without_demand() {
        let (pool, _) = pool(PoolConfig {
            min_vcpus: 2,
            ..PoolConfig::default()
        });
        pool.reconcile(0).await.unwrap();
        assert_eq!(pool.total_vcpus(), 2);
    }

    #[tokio::test]
    async fn reconcile_scales_to_demand_up_to_ceiling() {
        let (pool, provider) = pool(PoolConfig::default());
        // Demand for 10 vCPUs against a ceiling of 8.
        pool.reconcile(10).await.unwrap();
        assert_eq!(pool.total_vcpus(), 8);
        assert_eq!(provider.provisioned_count(), 8);

        // Re-reconciling at the ceiling provisions nothing further.
        pool.reconcile(10).await.unwrap();
        assert_eq!(pool.total_vcpus(), 8);
        assert_eq!(provider.provisioned_count(), 8);
    }

    #[tokio::test]
    async fn request_assigns_each_unit_at_most_once() {
        let (pool, _) = pool(PoolConfig::default());
        pool.reconcile(2).await.unwrap();

        let a = pool.request_capacity(Uuid::now_v7(), 1, 512).unwrap();
        let b = pool.request_capacity(Uuid::now_v7(), 1, 512).unwrap();
        assert_ne!(a.id, b.id);
        assert_matches!(
            pool.request_capacity(Uuid::now_v7(), 1, 512),
            Err(CoreError::CapacityUnavailable)
        );
        assert_eq!(pool.assigned_vcpus(), 2);
    }

    #[tokio::test]
    async fn release_makes_unit_reusable() {
        let (pool, _) = pool(PoolConfig::default());
        pool.reconcile(1).await.unwrap();

        let unit = pool.request_capacity(Uuid::now_v7(), 1, 512).unwrap();
        assert!(!pool.has_idle_capacity(1, 512));

        pool.release(unit.id);
        assert!(pool.has_idle_capacity(1, 512));
        assert_eq!(pool.assigned_vcpus(), 0);
    }

    #[tokio::test]
    async fn oversized_request_never_matches_small_units() {
        let (pool, _) = pool(PoolConfig::default());
        pool.reconcile(4).await.unwrap();
        assert_matches!(
            pool.request_capacity(Uuid::now_v7(), 4, 4096),
            Err(CoreError::CapacityUnavailable)
        );
    }

    #[tokio::test]
    async fn idle_units_beyond_minimum_deprovision_after_grace() {
        let (pool, provider) = pool(PoolConfig {
            min_vcpus: 1,
            idle_grace: Duration::from_millis(20),
            ..PoolConfig::default()
        });
        pool.reconcile(3).await.unwrap();
        assert_eq!(pool.total_vcpus(), 3);

        tokio::time::sleep(Duration::from_millis(40)).await;
        pool.reconcile(0).await.unwrap();

        // Two units torn down, the minimum retained.
        assert_eq!(pool.total_vcpus(), 1);
        assert_eq!(provider.deprovisioned_count(), 2);
    }

    #[tokio::test]
    async fn busy_units_are_never_deprovisioned() {
        let (pool, provider) = pool(PoolConfig {
            min_vcpus: 0,
            idle_grace: Duration::from_millis(10),
            ..PoolConfig::default()
        });
        pool.reconcile(1).await.unwrap();
        let unit = pool.request_capacity(Uuid::now_v7(), 1, 512).unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        pool.reconcile(0).await.unwrap();

        assert_eq!(pool.total_vcpus(), 1);
        assert_eq!(provider.deprovisioned_count(), 0);
        pool.release(unit.id);
    }

    #[tokio::test]
    async fn units_idle_with_standing_demand_are_kept() {
        let (pool, provider) = pool(PoolConfig {
            min_vcpus: 0,
            idle_grace: Duration::from_millis(10),
            ..PoolConfig::default()
        });
        pool.reconcile(2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Demand still covers the idle capacity: nothing is torn down.
        pool.reconcile(2).await.unwrap();
        assert_eq!(pool.total_vcpus(), 2);
        assert_eq!(provider.deprovisioned_count(), 0);
    }

    #[tokio::test]
    async fn bootstrap_provisions_desired_capacity() {
        let (pool, _) = pool(PoolConfig {
            desired_vcpus: 3,
            ..PoolConfig::default()
        });
        pool.bootstrap().await.unwrap();
        assert_eq!(pool.total_vcpus(), 3);
    }

    #[tokio::test]
    async fn release_of_unknown_unit_is_harmless() {
        let (pool, _) = pool(PoolConfig::default());
        pool.release(Uuid::now_v7());
        assert_eq!(pool.unit_count(), 0);
    }
}
