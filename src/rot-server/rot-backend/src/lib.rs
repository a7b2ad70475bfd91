// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::collections::HashMap;

use tokio::sync::watch;

use rot_core::{DynResult, Rotator, StatusCallback};

mod dummy;

pub use dummy::DummyRotator;

#[cfg(feature = "easycomm")]
use rot_backend_easycomm::EasyComm;
#[cfg(feature = "rci")]
use rot_backend_rci::Rci;
#[cfg(any(feature = "rci", feature = "easycomm"))]
use rot_core::{Offset, Transformer};

/// Connection details for instantiating a rotator backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RotatorAccess {
    Serial { path: String, baud: u32 },
    Tcp { addr: String },
    Simulated,
}

/// Everything a factory needs besides the status callback.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub access: RotatorAccess,
    pub azimuth_offset: f64,
    pub elevation_offset: f64,
    /// Observer latitude for mounts behind an equatorial transform.
    pub latitude: f64,
}

impl BackendConfig {
    pub fn new(access: RotatorAccess) -> Self {
        Self {
            access,
            azimuth_offset: 0.0,
            elevation_offset: 0.0,
            latitude: 0.0,
        }
    }
}

pub type BackendFactory =
    fn(&BackendConfig, StatusCallback, watch::Receiver<bool>) -> DynResult<Box<dyn Rotator>>;

/// Context for registering and instantiating rotator backends.
#[derive(Clone)]
pub struct RegistrationContext {
    factories: HashMap<String, BackendFactory>,
}

impl RegistrationContext {
    /// Create a new empty registration context.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory under a stable name (e.g. "rci").
    pub fn register_backend(&mut self, name: &str, factory: BackendFactory) {
        let key = normalize_name(name);
        self.factories.insert(key, factory);
    }

    pub fn is_backend_registered(&self, name: &str) -> bool {
        let key = normalize_name(name);
        self.factories.contains_key(&key)
    }

    /// List registered backend names.
    pub fn registered_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate a rotator based on the selected name. Status updates flow
    /// to `callback`; background link tasks stop when `shutdown_rx` flips.
    pub fn build_rotator(
        &self,
        name: &str,
        config: &BackendConfig,
        callback: StatusCallback,
        shutdown_rx: watch::Receiver<bool>,
    ) -> DynResult<Box<dyn Rotator>> {
        let key = normalize_name(name);
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| format!("Unknown rotator backend: {}", name))?;
        factory(config, callback, shutdown_rx)
    }

    /// Merge another registration context into this one.
    pub fn extend_from(&mut self, other: &RegistrationContext) {
        for (name, factory) in &other.factories {
            self.factories.insert(name.clone(), *factory);
        }
    }
}

impl Default for RegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Register all built-in backends enabled by features on a context.
pub fn register_builtin_backends_on(context: &mut RegistrationContext) {
    context.register_backend("dummy", dummy_factory);
    #[cfg(feature = "rci")]
    context.register_backend("rci", rci_factory);
    #[cfg(feature = "easycomm")]
    {
        context.register_backend("easycomm", easycomm_factory);
        context.register_backend("simulator", simulator_factory);
        context.register_backend("simulatorequ", simulator_equ_factory);
        context.register_backend("jlab", jlab_factory);
    }
}

fn dummy_factory(
    _config: &BackendConfig,
    callback: StatusCallback,
    _shutdown_rx: watch::Receiver<bool>,
) -> DynResult<Box<dyn Rotator>> {
    Ok(Box::new(DummyRotator::new(callback)))
}

/// RCI on a serial line, behind the pointing offset correction.
#[cfg(feature = "rci")]
fn rci_factory(
    config: &BackendConfig,
    callback: StatusCallback,
    shutdown_rx: watch::Receiver<bool>,
) -> DynResult<Box<dyn Rotator>> {
    let RotatorAccess::Serial { path, baud } = &config.access else {
        return Err("RCI only supports serial access".into());
    };
    let offset = Offset::wrap(
        config.azimuth_offset,
        config.elevation_offset,
        callback,
        |callback| Ok(Box::new(Rci::connect(path, *baud, callback, shutdown_rx))),
    )?;
    Ok(Box::new(offset))
}

#[cfg(feature = "easycomm")]
fn tcp_addr(config: &BackendConfig, name: &str) -> DynResult<String> {
    match &config.access {
        RotatorAccess::Tcp { addr } => Ok(addr.clone()),
        _ => Err(format!("{} only supports TCP access", name).into()),
    }
}

#[cfg(feature = "easycomm")]
fn easycomm_factory(
    config: &BackendConfig,
    callback: StatusCallback,
    shutdown_rx: watch::Receiver<bool>,
) -> DynResult<Box<dyn Rotator>> {
    let addr = tcp_addr(config, "EasyComm")?;
    Ok(Box::new(EasyComm::connect_tcp(&addr, callback, shutdown_rx)))
}

#[cfg(feature = "easycomm")]
fn simulator_factory(
    _config: &BackendConfig,
    callback: StatusCallback,
    shutdown_rx: watch::Receiver<bool>,
) -> DynResult<Box<dyn Rotator>> {
    Ok(Box::new(EasyComm::simulator(callback, shutdown_rx)))
}

/// Simulator driven as an equatorial mount.
#[cfg(feature = "easycomm")]
fn simulator_equ_factory(
    config: &BackendConfig,
    callback: StatusCallback,
    shutdown_rx: watch::Receiver<bool>,
) -> DynResult<Box<dyn Rotator>> {
    let transformer = Transformer::wrap(config.latitude, callback, |callback| {
        Ok(Box::new(EasyComm::simulator(callback, shutdown_rx)))
    })?;
    Ok(Box::new(transformer))
}

/// Equatorial mount speaking EasyComm over TCP.
#[cfg(feature = "easycomm")]
fn jlab_factory(
    config: &BackendConfig,
    callback: StatusCallback,
    shutdown_rx: watch::Receiver<bool>,
) -> DynResult<Box<dyn Rotator>> {
    let addr = tcp_addr(config, "jlab")?;
    let transformer = Transformer::wrap(config.latitude, callback, |callback| {
        Ok(Box::new(EasyComm::connect_tcp(&addr, callback, shutdown_rx)))
    })?;
    Ok(Box::new(transformer))
}
