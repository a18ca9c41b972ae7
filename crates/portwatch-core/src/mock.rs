//! In-memory backend for tests.
//!
//! Devices are plain [`DeviceInfo`] values. Hotplug notifications and device
//! input travel over socket pairs, so monitor and handle descriptors behave
//! like real ones under `poll(2)`. Every backend entry point is counted and
//! can be made to fail once with [`MockBackend::fail_next`].

use std::collections::{HashMap, VecDeque};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::{Backend, Channel, Hotplug, HotplugSource};
use crate::device::{DeviceFilter, DeviceInfo};
use crate::error::{Error, ErrorCode, Result};
use crate::poll::{Waitable, wait_readable};
use crate::serial::SerialSettings;

/// Backend operation, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// [`Backend::enumerate`].
    Enumerate,
    /// [`Backend::subscribe`].
    Subscribe,
    /// [`HotplugSource::drain`].
    Drain,
    /// [`Backend::open`].
    Open,
    /// [`Channel::read`].
    Read,
    /// [`Channel::write`].
    Write,
    /// [`Channel::configure_serial`].
    ConfigureSerial,
    /// [`Channel::report_descriptor`].
    ReportDescriptor,
    /// Feature report transfers.
    FeatureReport,
}

impl MockOp {
    const COUNT: usize = 9;
}

#[derive(Debug, Default)]
struct DeviceState {
    endpoints: Vec<Weak<UnixStream>>,
    written: Vec<u8>,
    serial: Option<SerialSettings>,
    report_descriptor: Vec<u8>,
    features: HashMap<u8, Vec<u8>>,
}

#[derive(Debug)]
struct Subscriber {
    signal: UnixStream,
    queue: Weak<Mutex<VecDeque<Hotplug>>>,
}

#[derive(Debug)]
struct Shared {
    present: Mutex<Vec<DeviceInfo>>,
    subscribers: Mutex<Vec<Subscriber>>,
    devices: Mutex<HashMap<String, DeviceState>>,
    failures: Mutex<HashMap<MockOp, ErrorCode>>,
    calls: [AtomicUsize; MockOp::COUNT],
}

impl Shared {
    fn enter(&self, op: MockOp) -> Result<()> {
        self.calls[op as usize].fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().remove(&op) {
            Some(code) => Err(Error::new(code, format!("mock {op:?} failure"))),
            None => Ok(()),
        }
    }

    fn notify(&self, notice: &Hotplug) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| sub.queue.strong_count() > 0);
        for sub in subscribers.iter() {
            if let Some(queue) = sub.queue.upgrade() {
                queue.lock().push_back(notice.clone());
                let _ = (&sub.signal).write(&[1]);
            }
        }
    }
}

/// Scriptable backend backed by socket pairs.
#[derive(Debug, Clone)]
pub struct MockBackend {
    shared: Arc<Shared>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Creates a backend with no devices.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                present: Mutex::new(Vec::new()),
                subscribers: Mutex::new(Vec::new()),
                devices: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
                calls: [const { AtomicUsize::new(0) }; MockOp::COUNT],
            }),
        }
    }

    /// Makes a device present without notifying subscribers.
    pub fn attach(&self, info: DeviceInfo) {
        self.shared.present.lock().push(info);
    }

    /// Makes a device present and notifies subscribers.
    pub fn plug(&self, info: DeviceInfo) {
        self.attach(info.clone());
        self.shared.notify(&Hotplug::Added(info));
    }

    /// Removes every interface with `key` and notifies subscribers.
    pub fn unplug(&self, key: &str) {
        self.shared.present.lock().retain(|info| info.key != key);
        self.shared.notify(&Hotplug::Removed {
            key: key.to_string(),
        });
    }

    /// Number of calls made to `op`.
    #[must_use]
    pub fn calls(&self, op: MockOp) -> usize {
        self.shared.calls[op as usize].load(Ordering::SeqCst)
    }

    /// Makes the next call to `op` fail with `code`.
    pub fn fail_next(&self, op: MockOp, code: ErrorCode) {
        self.shared.failures.lock().insert(op, code);
    }

    /// Queues input on every open channel of the device at `path`.
    pub fn inject(&self, path: &str, data: &[u8]) {
        let devices = self.shared.devices.lock();
        let Some(state) = devices.get(path) else {
            return;
        };
        for endpoint in state.endpoints.iter().filter_map(Weak::upgrade) {
            let _ = (&*endpoint).write_all(data);
        }
    }

    /// Bytes written to the device at `path` so far.
    #[must_use]
    pub fn written(&self, path: &str) -> Vec<u8> {
        self.shared
            .devices
            .lock()
            .get(path)
            .map(|state| state.written.clone())
            .unwrap_or_default()
    }

    /// Last serial settings applied to the device at `path`.
    #[must_use]
    pub fn serial_settings(&self, path: &str) -> Option<SerialSettings> {
        self.shared.devices.lock().get(path).and_then(|state| state.serial)
    }

    /// Sets the report descriptor returned for the device at `path`.
    pub fn set_report_descriptor(&self, path: &str, raw: &[u8]) {
        self.shared
            .devices
            .lock()
            .entry(path.to_string())
            .or_default()
            .report_descriptor = raw.to_vec();
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn enumerate(&self, filter: &DeviceFilter) -> Result<Vec<DeviceInfo>> {
        self.shared.enter(MockOp::Enumerate)?;
        Ok(self
            .shared
            .present
            .lock()
            .iter()
            .filter(|info| filter.matches(info))
            .cloned()
            .collect())
    }

    fn subscribe(&self, _filter: &DeviceFilter) -> Result<Box<dyn HotplugSource>> {
        self.shared.enter(MockOp::Subscribe)?;
        let (signal, receiver) = socket_pair("subscribe")?;
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        self.shared.subscribers.lock().push(Subscriber {
            signal,
            queue: Arc::downgrade(&queue),
        });
        Ok(Box::new(MockSource {
            shared: Arc::clone(&self.shared),
            receiver,
            queue,
        }))
    }

    fn open(&self, info: &DeviceInfo) -> Result<Box<dyn Channel>> {
        self.shared.enter(MockOp::Open)?;
        if !self.shared.present.lock().iter().any(|p| p.path == info.path) {
            return Err(Error::not_found(format!("{} failed: device not found", info.path)));
        }
        let (host, device) = socket_pair("open")?;
        let device = Arc::new(device);
        self.shared
            .devices
            .lock()
            .entry(info.path.clone())
            .or_default()
            .endpoints
            .push(Arc::downgrade(&device));
        Ok(Box::new(MockChannel {
            shared: Arc::clone(&self.shared),
            path: info.path.clone(),
            host,
            device,
        }))
    }
}

fn socket_pair(context: &str) -> Result<(UnixStream, UnixStream)> {
    let (a, b) = UnixStream::pair().map_err(|e| Error::from_io(&e, context))?;
    a.set_nonblocking(true)
        .and_then(|()| b.set_nonblocking(true))
        .map_err(|e| Error::from_io(&e, context))?;
    Ok((a, b))
}

#[derive(Debug)]
struct MockSource {
    shared: Arc<Shared>,
    receiver: UnixStream,
    queue: Arc<Mutex<VecDeque<Hotplug>>>,
}

impl HotplugSource for MockSource {
    fn waitable(&self) -> Waitable {
        Waitable::Fd(self.receiver.as_raw_fd())
    }

    fn drain(&mut self, out: &mut Vec<Hotplug>) -> Result<()> {
        self.shared.enter(MockOp::Drain)?;
        let mut scratch = [0u8; 64];
        loop {
            match self.receiver.read(&mut scratch) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::from_io(&e, "mock drain")),
            }
        }
        out.extend(self.queue.lock().drain(..));
        Ok(())
    }
}

/// Device side echoes writes back as input.
#[derive(Debug)]
struct MockChannel {
    shared: Arc<Shared>,
    path: String,
    host: UnixStream,
    device: Arc<UnixStream>,
}

impl MockChannel {
    fn with_state<T>(&self, f: impl FnOnce(&mut DeviceState) -> T) -> T {
        let mut devices = self.shared.devices.lock();
        f(devices.entry(self.path.clone()).or_default())
    }
}

impl Channel for MockChannel {
    fn waitable(&self) -> Waitable {
        Waitable::Fd(self.host.as_raw_fd())
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        self.shared.enter(MockOp::Read)?;
        if !wait_readable(self.waitable(), timeout_ms)? {
            return Ok(0);
        }
        match self.host.read(buf) {
            Ok(0) => Err(Error::io(format!("I/O error while reading from '{}'", self.path))),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(Error::from_io(&e, &format!("read('{}')", self.path))),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.shared.enter(MockOp::Write)?;
        self.with_state(|state| state.written.extend_from_slice(buf));
        (&*self.device)
            .write_all(buf)
            .map_err(|e| Error::from_io(&e, &format!("write('{}')", self.path)))?;
        Ok(buf.len())
    }

    fn configure_serial(&mut self, settings: &SerialSettings) -> Result<()> {
        self.shared.enter(MockOp::ConfigureSerial)?;
        self.with_state(|state| state.serial = Some(*settings));
        Ok(())
    }

    fn report_descriptor(&mut self) -> Result<Vec<u8>> {
        self.shared.enter(MockOp::ReportDescriptor)?;
        Ok(self.with_state(|state| state.report_descriptor.clone()))
    }

    fn send_feature_report(&mut self, report: &[u8]) -> Result<usize> {
        self.shared.enter(MockOp::FeatureReport)?;
        let Some(&report_id) = report.first() else {
            return Ok(0);
        };
        self.with_state(|state| state.features.insert(report_id, report.to_vec()));
        Ok(report.len())
    }

    fn get_feature_report(&mut self, report_id: u8, buf: &mut [u8]) -> Result<usize> {
        self.shared.enter(MockOp::FeatureReport)?;
        let stored = self.with_state(|state| state.features.get(&report_id).cloned());
        let Some(report) = stored else {
            return Err(Error::io(format!(
                "Feature report {report_id} not available on '{}'",
                self.path
            )));
        };
        let n = report.len().min(buf.len());
        buf[..n].copy_from_slice(&report[..n]);
        Ok(n)
    }
}
