// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod http;
mod hub;
mod protocol;
mod rotctld;
mod throttle;

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use rot_app::{init_logging, normalize_name, read_lines, ConfigFile};
use rot_backend::{register_builtin_backends_on, BackendConfig, RegistrationContext, RotatorAccess};
use rot_core::DynResult;
use rot_ephem::{LowPrecision, Observer};
use rot_modbus::{Cps20, HttpTunnel, ModbusClient, ModbusTransport, RtuSerial, Sequencer};

use config::{HttpConfig, PeripheralConfig, ServerConfig};
use http::FeedSettings;
use hub::{Hub, HubOptions};

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - antenna rotator server");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Rotator type (rci, easycomm, simulator, simulatorequ, jlab, dummy)
    #[arg(short = 'r', long = "rotator")]
    rotator: Option<String>,
    /// Serial port for RCI
    #[arg(long = "serial", value_name = "PATH")]
    serial: Option<String>,
    /// host:port for EasyComm rotators
    #[arg(long = "address")]
    address: Option<String>,
    /// IP address for the HTTP and rotctld listeners
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
    /// Port for the HTTP status feed
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
    /// Port for the rotctld listener
    #[arg(long = "rotctld-port")]
    rotctld_port: Option<u16>,
}

/// Command-line values win over the config file.
fn apply_cli(cli: &Cli, cfg: &mut ServerConfig) {
    if let Some(ref kind) = cli.rotator {
        cfg.rotator.kind = kind.clone();
    }
    if let Some(ref serial) = cli.serial {
        cfg.rotator.serial_port = Some(serial.clone());
    }
    if let Some(ref address) = cli.address {
        cfg.rotator.address = Some(address.clone());
    }
    if let Some(listen) = cli.listen {
        cfg.http.listen = listen;
        cfg.rotctld.listen = listen;
    }
    if let Some(port) = cli.port {
        cfg.http.port = port;
    }
    if let Some(port) = cli.rotctld_port {
        cfg.rotctld.port = port;
    }
}

fn backend_config(cfg: &ServerConfig) -> BackendConfig {
    let access = match normalize_name(&cfg.rotator.kind).as_str() {
        "rci" => RotatorAccess::Serial {
            path: cfg.rotator.serial_port.clone().unwrap_or_default(),
            baud: cfg.rotator.baud,
        },
        "easycomm" | "jlab" => RotatorAccess::Tcp {
            addr: cfg.rotator.address.clone().unwrap_or_default(),
        },
        _ => RotatorAccess::Simulated,
    };
    BackendConfig {
        access,
        azimuth_offset: cfg.rotator.azimuth_offset,
        elevation_offset: cfg.rotator.elevation_offset,
        latitude: cfg.general.latitude,
    }
}

/// Modbus client for a peripheral, over its tunnel or its local port.
fn modbus_client(link: &PeripheralConfig) -> Option<ModbusClient> {
    let transport: Box<dyn ModbusTransport> = if let Some(ref url) = link.url {
        Box::new(HttpTunnel::new(
            url,
            link.username.clone(),
            link.password.clone(),
        ))
    } else if let Some(ref port) = link.port {
        Box::new(RtuSerial::new(port, link.baud))
    } else {
        return None;
    };
    Some(ModbusClient::new(link.unit_id, transport))
}

fn load_passwords(http: &HttpConfig) -> DynResult<Vec<String>> {
    let mut passwords: Vec<String> = http
        .passwords
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect();
    if let Some(ref path) = http.password_file {
        let lines = read_lines(path)
            .map_err(|e| format!("reading password file {}: {}", path.display(), e))?;
        passwords.extend(lines);
    }
    Ok(passwords)
}

fn hub_options(cfg: &ServerConfig, passwords: Vec<String>) -> HubOptions {
    HubOptions {
        observer: Observer {
            latitude: cfg.general.latitude,
            longitude: cfg.general.longitude,
            height: cfg.general.height,
            temperature: cfg.general.temperature,
            pressure: cfg.general.pressure,
        },
        passwords,
        spindown: Duration::from_secs(cfg.amplidynes.spindown_secs),
        tracking_interval: Duration::from_millis(cfg.tracking.interval_ms),
        acceptable_shutdowns: cfg.rotator.acceptable_shutdowns.iter().copied().collect::<HashSet<u8>>(),
    }
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let mut registry = RegistrationContext::new();
    register_builtin_backends_on(&mut registry);

    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = ServerConfig::load(cli.config.as_deref())?;
    apply_cli(&cli, &mut cfg);
    cfg.validate()
        .map_err(|e| format!("Invalid server configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let passwords = load_passwords(&cfg.http)?;
    if passwords.is_empty() {
        info!("No passwords configured; only local clients may send commands");
    }

    let kind = normalize_name(&cfg.rotator.kind);
    let backend = backend_config(&cfg);
    match &backend.access {
        RotatorAccess::Serial { path, baud } => {
            info!("Starting rot-server (rotator: {}, serial {} @ {} baud)", kind, path, baud)
        }
        RotatorAccess::Tcp { addr } => {
            info!("Starting rot-server (rotator: {}, tcp {})", kind, addr)
        }
        RotatorAccess::Simulated => info!("Starting rot-server (rotator: {}, simulated)", kind),
    }

    let mut task_handles: Vec<JoinHandle<()>> = Vec::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let hub = Hub::new(hub_options(&cfg, passwords), Box::new(LowPrecision));
    let rotator = registry.build_rotator(
        &kind,
        &backend,
        hub.rotator_callback(),
        shutdown_rx.clone(),
    )?;
    hub.attach_rotator(rotator)?;

    if let Some(client) = modbus_client(&cfg.sequencer) {
        info!("Sequencer on {}", client.describe());
        let sequencer = Sequencer::new(client, hub.sequencer_callback());
        task_handles.push(sequencer.spawn(
            Duration::from_millis(cfg.sequencer.poll_interval_ms),
            shutdown_rx.clone(),
        ));
        hub.attach_sequencer(sequencer)?;
    }

    if let Some(client) = modbus_client(&cfg.amplidynes.link) {
        info!(
            "Amplidynes on {}, spin-down after {}s idle",
            client.describe(),
            cfg.amplidynes.spindown_secs
        );
        let cps20 = Cps20::new(client, hub.amplidyne_callback());
        task_handles.push(cps20.spawn(
            Duration::from_millis(cfg.amplidynes.link.poll_interval_ms),
            shutdown_rx.clone(),
        ));
        hub.attach_amplidynes(cps20)?;
    }

    task_handles.push(hub.spawn_tracking(shutdown_rx.clone()));

    if cfg.http.enabled {
        let addr = SocketAddr::from((cfg.http.listen, cfg.http.port));
        let settings = FeedSettings {
            period: Duration::from_millis(cfg.http.period_ms),
            max_in_flight: cfg.http.max_in_flight,
        };
        task_handles.push(http::spawn(addr, hub.clone(), settings, shutdown_rx.clone()));
    }

    if cfg.rotctld.enabled {
        let addr = SocketAddr::from((cfg.rotctld.listen, cfg.rotctld.port));
        task_handles.push(rotctld::spawn(addr, hub.clone(), shutdown_rx.clone()));
    }

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    let _ = shutdown_tx.send(true);
    tokio::time::sleep(Duration::from_millis(400)).await;

    for handle in &task_handles {
        if !handle.is_finished() {
            handle.abort();
        }
    }
    for handle in task_handles {
        let _ = handle.await;
    }
    Ok(())
}
