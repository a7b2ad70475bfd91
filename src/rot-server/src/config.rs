// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for rot-server.
//!
//! Config is loaded from the `[rot-server]` section of `rot-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./rot-rs.toml`
//! 3. `~/.config/rot-rs/rot-rs.toml`
//! 4. `/etc/rot-rs/rot-rs.toml`

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use rot_app::{normalize_name, ConfigFile};

/// Rotator kinds understood by the composition root.
pub const ROTATOR_TYPES: [&str; 6] = [
    "rci",
    "easycomm",
    "simulator",
    "simulatorequ",
    "jlab",
    "dummy",
];

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub general: GeneralConfig,
    pub rotator: RotatorConfig,
    /// RF band sequencer on Modbus.
    pub sequencer: PeripheralConfig,
    /// CPS20 amplidyne controller on Modbus.
    pub amplidynes: AmplidyneConfig,
    pub http: HttpConfig,
    pub rotctld: RotctldConfig,
    pub tracking: TrackingConfig,
}

/// General application settings and the observing site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
    /// Antenna latitude (decimal degrees, WGS84)
    pub latitude: f64,
    /// Antenna longitude (decimal degrees, WGS84)
    pub longitude: f64,
    /// Antenna height (metres)
    pub height: f64,
    /// Ambient temperature (Celsius), for refraction
    pub temperature: f64,
    /// Ambient pressure (millibar), for refraction
    pub pressure: f64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            latitude: 42.360326,
            longitude: -71.089324,
            height: 100.0,
            temperature: 15.0,
            pressure: 1010.0,
        }
    }
}

/// Rotator backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotatorConfig {
    /// One of `rci`, `easycomm`, `simulator`, `simulatorequ`, `jlab`, `dummy`
    #[serde(rename = "type")]
    pub kind: String,
    /// RCI serial port
    pub serial_port: Option<String>,
    /// RCI baud rate
    pub baud: u32,
    /// EasyComm TCP peer (host:port)
    pub address: Option<String>,
    /// Azimuth pointing correction (degrees)
    pub azimuth_offset: f64,
    /// Elevation pointing correction (degrees)
    pub elevation_offset: f64,
    /// Shutdown codes cleared automatically
    pub acceptable_shutdowns: Vec<u8>,
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            kind: "simulator".to_string(),
            serial_port: None,
            baud: 9600,
            address: None,
            azimuth_offset: 5.5,
            elevation_offset: -5.5,
            acceptable_shutdowns: vec![11],
        }
    }
}

/// Modbus link for one peripheral: either a local serial port or a remote
/// HTTP tunnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    /// Local RTU serial port
    pub port: Option<String>,
    /// Baud rate for the serial port
    pub baud: u32,
    /// Remote tunnel URL
    pub url: Option<String>,
    /// Basic-Auth user for the tunnel
    pub username: Option<String>,
    /// Basic-Auth password for the tunnel
    pub password: Option<String>,
    /// Modbus unit identifier
    pub unit_id: u8,
    /// Delay between polls (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 19200,
            url: None,
            username: None,
            password: None,
            unit_id: 1,
            poll_interval_ms: 100,
        }
    }
}

impl PeripheralConfig {
    pub fn is_configured(&self) -> bool {
        self.port.is_some() || self.url.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmplidyneConfig {
    #[serde(flatten)]
    pub link: PeripheralConfig,
    /// Idle time before the amplidynes are switched off (seconds)
    pub spindown_secs: u64,
}

impl Default for AmplidyneConfig {
    fn default() -> Self {
        Self {
            link: PeripheralConfig::default(),
            spindown_secs: 600,
        }
    }
}

/// Status feed over HTTP and WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub listen: IpAddr,
    pub port: u16,
    /// Passwords granting write access, carried as the WebSocket subprotocol
    pub passwords: Vec<String>,
    /// File with one password per line
    pub password_file: Option<PathBuf>,
    /// Minimum delay between pushes to one client (milliseconds)
    pub period_ms: u64,
    /// Unacknowledged frames allowed to a throttled client
    pub max_in_flight: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8502,
            passwords: Vec::new(),
            password_file: None,
            period_ms: 25,
            max_in_flight: 5,
        }
    }
}

/// hamlib rotctld-compatible listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotctldConfig {
    pub enabled: bool,
    pub listen: IpAddr,
    pub port: u16,
}

impl Default for RotctldConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 4533,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Recompute interval for body tracking (milliseconds)
    pub interval_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self { interval_ms: 250 }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;
        validate_coordinates(self.general.latitude, self.general.longitude)?;

        let kind = normalize_name(&self.rotator.kind);
        if !ROTATOR_TYPES.contains(&kind.as_str()) {
            return Err(format!(
                "[rotator].type '{}' is invalid (expected one of: {})",
                self.rotator.kind,
                ROTATOR_TYPES.join(", ")
            ));
        }
        match kind.as_str() {
            "rci" => {
                if self.rotator.serial_port.as_deref().unwrap_or("").trim().is_empty() {
                    return Err("[rotator].serial_port must be set for type 'rci'".to_string());
                }
                if self.rotator.baud == 0 {
                    return Err("[rotator].baud must be > 0".to_string());
                }
            }
            "easycomm" | "jlab" => {
                if self.rotator.address.as_deref().unwrap_or("").trim().is_empty() {
                    return Err(format!(
                        "[rotator].address must be set for type '{}'",
                        kind
                    ));
                }
            }
            _ => {}
        }

        validate_peripheral("[sequencer]", &self.sequencer)?;
        validate_peripheral("[amplidynes]", &self.amplidynes.link)?;

        validate_passwords(&self.http.passwords)?;
        if self.http.enabled {
            if self.http.port == 0 {
                return Err("[http].port must be > 0 when http is enabled".to_string());
            }
            if self.http.max_in_flight == 0 {
                return Err("[http].max_in_flight must be > 0".to_string());
            }
        }
        if self.rotctld.enabled && self.rotctld.port == 0 {
            return Err("[rotctld].port must be > 0 when rotctld is enabled".to_string());
        }
        if self.tracking.interval_ms == 0 {
            return Err("[tracking].interval_ms must be > 0".to_string());
        }
        Ok(())
    }

    /// Generate an example configuration under the `[rot-server]` header.
    pub fn example_toml() -> String {
        let mut example = ServerConfig::default();
        example.general.log_level = Some("info".to_string());
        example.rotator.kind = "rci".to_string();
        example.rotator.serial_port = Some("/dev/ttyUSB0".to_string());
        example.sequencer.port = Some("/dev/ttyUSB1".to_string());
        example.amplidynes.link.port = Some("/dev/ttyUSB2".to_string());
        <ServerConfig as ConfigFile>::to_section_toml(&example)
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), String> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err("[general].latitude must be in range -90..=90".to_string());
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err("[general].longitude must be in range -180..=180".to_string());
    }
    Ok(())
}

fn validate_peripheral(section: &str, link: &PeripheralConfig) -> Result<(), String> {
    if link.port.is_some() && link.url.is_some() {
        return Err(format!("{section} must set either port or url, not both"));
    }
    if link.port.is_some() && link.baud == 0 {
        return Err(format!("{section}.baud must be > 0"));
    }
    if link.is_configured() && link.poll_interval_ms == 0 {
        return Err(format!("{section}.poll_interval_ms must be > 0"));
    }
    Ok(())
}

fn validate_passwords(passwords: &[String]) -> Result<(), String> {
    if passwords.iter().any(|p| p.trim().is_empty()) {
        return Err("[http].passwords must not contain empty passwords".to_string());
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "rot-server"
    }
}
