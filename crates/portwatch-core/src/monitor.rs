//! Hotplug monitoring and the device registry.
//!
//! A [`Monitor`] subscribes to backend notifications, then enumerates, so
//! nothing that changes between the two calls is lost. It owns the
//! authoritative list of matching devices, keyed by `(key, interface)`.
//! [`Monitor::refresh`] drains pending notifications and returns the changes
//! as [`MonitorEvent`]s.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::{Backend, Hotplug, HotplugSource};
use crate::device::{Device, DeviceFilter, DeviceInfo};
use crate::error::Result;
use crate::log;
use crate::poll::Waitable;

/// Process-unique monitor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorId(u64);

impl MonitorId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "monitor-{}", self.0)
    }
}

/// Liveness token devices point back to; dies with its monitor.
#[derive(Debug)]
pub(crate) struct MonitorToken {
    pub(crate) id: MonitorId,
}

/// A change applied by [`Monitor::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A new record, online.
    Added(Device),
    /// A record dropped from the list, now disconnected.
    Removed(Device),
}

impl MonitorEvent {
    /// The device the event is about.
    #[must_use]
    pub const fn device(&self) -> &Device {
        match self {
            Self::Added(device) | Self::Removed(device) => device,
        }
    }
}

type Identity = (String, u8);

/// Watches one device class and keeps its device list current.
pub struct Monitor {
    token: Arc<MonitorToken>,
    backend: Arc<dyn Backend>,
    filter: DeviceFilter,
    source: Box<dyn HotplugSource>,
    devices: BTreeMap<Identity, Device>,
}

impl Monitor {
    /// Subscribes to hotplug notifications and enumerates matching devices.
    ///
    /// # Errors
    /// Subscription or enumeration failures are returned unchanged.
    pub fn new(backend: Arc<dyn Backend>, filter: DeviceFilter) -> Result<Self> {
        let source = backend.subscribe(&filter)?;
        let initial = backend.enumerate(&filter)?;

        let mut monitor = Self {
            token: Arc::new(MonitorToken { id: MonitorId::next() }),
            backend,
            filter,
            source,
            devices: BTreeMap::new(),
        };
        for info in initial {
            let _ = monitor.insert(info);
        }
        log::debug(format!(
            "{} started on '{}' backend with {} device(s)",
            monitor.id(),
            monitor.backend.name(),
            monitor.devices.len()
        ));
        Ok(monitor)
    }

    /// Process-unique id, as reported by [`Device::monitor_id`].
    #[must_use]
    pub fn id(&self) -> MonitorId {
        self.token.id
    }

    /// The filter devices must match.
    #[must_use]
    pub const fn filter(&self) -> &DeviceFilter {
        &self.filter
    }

    /// Object that becomes ready when changes are pending.
    #[must_use]
    pub fn descriptor(&self) -> Waitable {
        self.source.waitable()
    }

    /// Applies pending hotplug notifications and returns the changes.
    ///
    /// A device that disappears and comes back yields `Removed` then a new
    /// `Added` record. Duplicate additions and unmatched devices are ignored.
    ///
    /// # Errors
    /// Returns the backend error when nothing could be drained; the list is
    /// left unchanged in that case.
    pub fn refresh(&mut self) -> Result<Vec<MonitorEvent>> {
        let mut notices = Vec::new();
        if let Err(err) = self.source.drain(&mut notices) {
            if notices.is_empty() {
                return Err(err);
            }
            log::warning(format!(
                "{}: applying {} notification(s) drained before failure: {err}",
                self.id(),
                notices.len()
            ));
        }

        let mut events = Vec::new();
        for notice in notices {
            match notice {
                Hotplug::Added(info) => {
                    if let Some(device) = self.insert(info) {
                        events.push(MonitorEvent::Added(device));
                    }
                }
                Hotplug::Removed { key } => {
                    events.extend(self.remove_key(&key).into_iter().map(MonitorEvent::Removed));
                }
            }
        }
        Ok(events)
    }

    /// Current devices in identity order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Looks up a device by key and interface number.
    #[must_use]
    pub fn find(&self, key: &str, interface_number: u8) -> Option<&Device> {
        self.devices.get(&(key.to_string(), interface_number))
    }

    /// Number of devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn insert(&mut self, info: DeviceInfo) -> Option<Device> {
        if !self.filter.matches(&info) {
            return None;
        }
        let identity = (info.key.clone(), info.interface_number);
        if self.devices.contains_key(&identity) {
            return None;
        }
        let device = Device::new(info, Arc::clone(&self.backend), Arc::downgrade(&self.token));
        log::debug(format!("{}: added {device}", self.id()));
        self.devices.insert(identity, device.clone());
        Some(device)
    }

    fn remove_key(&mut self, key: &str) -> Vec<Device> {
        let identities: Vec<Identity> = self
            .devices
            .keys()
            .filter(|(k, _)| k == key)
            .cloned()
            .collect();

        identities
            .into_iter()
            .filter_map(|identity| self.devices.remove(&identity))
            .inspect(|device| {
                device.mark_disconnected();
                log::debug(format!("{}: removed {device}", self.token.id));
            })
            .collect()
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("id", &self.token.id)
            .field("backend", &self.backend.name())
            .field("filter", &self.filter)
            .field("devices", &self.devices.len())
            .finish_non_exhaustive()
    }
}
