//! Hotplug test harness.
//!
//! Wires a [`MockBackend`], a [`Monitor`] and a [`DescriptorSet`] together the
//! way an application event loop does: the monitor's descriptor is registered
//! under a fixed ID and handles are registered next to it.

use std::sync::Arc;
use std::time::Duration;

use portwatch_core::mock::MockBackend;
use portwatch_core::{
    DescriptorSet, Device, DeviceFilter, DeviceInfo, Handle, Monitor, MonitorEvent,
};

use crate::error::{Result, TestError};
use crate::faults::FaultPlan;

/// ID the monitor is registered under unless configured otherwise.
pub const DEFAULT_MONITOR_ID: u32 = 2;

/// Mock-backed monitor plus descriptor set.
#[derive(Debug)]
pub struct HotplugHarness {
    backend: Arc<MockBackend>,
    monitor: Monitor,
    set: DescriptorSet,
    monitor_id: u32,
}

impl HotplugHarness {
    /// Creates a new harness builder.
    #[must_use]
    pub fn builder() -> HotplugHarnessBuilder {
        HotplugHarnessBuilder::default()
    }

    /// Harness watching every device, starting empty.
    ///
    /// # Errors
    /// Returns an error if the monitor cannot be created.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// The mock backend, for plugging devices and injecting faults.
    #[must_use]
    pub fn backend(&self) -> &Arc<MockBackend> {
        &self.backend
    }

    /// The monitor under test.
    #[must_use]
    pub const fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// The descriptor set.
    #[must_use]
    pub const fn set(&self) -> &DescriptorSet {
        &self.set
    }

    /// Mutable descriptor set, for registering extra waitables.
    pub fn set_mut(&mut self) -> &mut DescriptorSet {
        &mut self.set
    }

    /// ID of the monitor's descriptor.
    #[must_use]
    pub const fn monitor_id(&self) -> u32 {
        self.monitor_id
    }

    /// Simulates a device arrival.
    pub fn plug(&self, info: DeviceInfo) {
        self.backend.plug(info);
    }

    /// Simulates removal of every interface with `key`.
    pub fn unplug(&self, key: &str) {
        self.backend.unplug(key);
    }

    /// Queues `plan` on the backend.
    pub fn inject(&self, plan: &FaultPlan) {
        plan.apply(&self.backend);
    }

    /// Polls the set.
    ///
    /// # Errors
    /// Propagates the poll failure.
    pub fn poll(&self, timeout_ms: i32) -> Result<Vec<u32>> {
        Ok(self.set.poll(timeout_ms)?)
    }

    /// Applies pending hotplug notifications.
    ///
    /// # Errors
    /// Propagates the refresh failure.
    pub fn refresh(&mut self) -> Result<Vec<MonitorEvent>> {
        Ok(self.monitor.refresh()?)
    }

    /// Polls until the monitor fires, then refreshes it.
    ///
    /// # Errors
    /// `Timeout` if the monitor does not fire within `timeout_ms`.
    pub fn next_events(&mut self, timeout_ms: i32) -> Result<Vec<MonitorEvent>> {
        let start = portwatch_core::millis();
        loop {
            let remaining = portwatch_core::adjust_timeout(timeout_ms, start);
            let ready = self.set.poll(remaining)?;
            if ready.contains(&self.monitor_id) {
                return self.refresh();
            }
            if remaining == 0 || (ready.is_empty() && timeout_ms >= 0) {
                let waited = u64::try_from(timeout_ms).unwrap_or(0);
                return Err(TestError::Timeout(Duration::from_millis(waited)));
            }
        }
    }

    /// Opens `device` and registers its handle under `id`.
    ///
    /// # Errors
    /// Returns the open failure, or `Harness` when `id` cannot be registered.
    pub fn open_registered(&mut self, device: &Device, id: u32) -> Result<Handle> {
        let handle = device.open()?;
        self.set.add(id, handle.descriptor()).map_err(|e| {
            TestError::harness(format!("cannot register {device} as {id}: {e}"))
        })?;
        Ok(handle)
    }
}

/// Builder for [`HotplugHarness`].
#[derive(Debug, Default)]
pub struct HotplugHarnessBuilder {
    filter: DeviceFilter,
    initial: Vec<DeviceInfo>,
    capacity: Option<usize>,
    monitor_id: Option<u32>,
}

impl HotplugHarnessBuilder {
    /// Restricts the monitor to `filter`.
    #[must_use]
    pub const fn with_filter(mut self, filter: DeviceFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Attaches `info` before the monitor is created.
    #[must_use]
    pub fn with_device(mut self, info: DeviceInfo) -> Self {
        self.initial.push(info);
        self
    }

    /// Sets the descriptor set capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Registers the monitor under `id`.
    #[must_use]
    pub const fn with_monitor_id(mut self, id: u32) -> Self {
        self.monitor_id = Some(id);
        self
    }

    /// Builds the harness.
    ///
    /// # Errors
    /// Returns an error if the monitor cannot be created or registered.
    pub fn build(self) -> Result<HotplugHarness> {
        let backend = Arc::new(MockBackend::new());
        for info in self.initial {
            backend.attach(info);
        }

        let monitor = Monitor::new(backend.clone(), self.filter)?;
        let mut set = self
            .capacity
            .map_or_else(DescriptorSet::new, DescriptorSet::with_capacity);
        let monitor_id = self.monitor_id.unwrap_or(DEFAULT_MONITOR_ID);
        set.add(monitor_id, monitor.descriptor())?;

        tracing::debug!(monitor = %monitor.id(), monitor_id, "hotplug harness ready");
        Ok(HotplugHarness {
            backend,
            monitor,
            set,
            monitor_id,
        })
    }
}
