// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! EasyComm III rotator driver over TCP or the built-in simulator.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, Duration};
use tracing::{debug, info, warn};

use rot_core::rotator::{RotatorAccessMethod, RotatorInfo};
use rot_core::{normalize, Rotator, StatusCallback};

pub mod parse;
pub mod simulator;

use parse::Telemetry;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Queries sent to the peer once per poll interval.
const POLL_QUERIES: [&str; 7] = ["\\?ENC", "AZ", "EL", "GS", "GE", "VE", "IP"];

struct Shared {
    link: Mutex<Option<mpsc::UnboundedSender<String>>>,
    telemetry: Mutex<Telemetry>,
    callback: StatusCallback,
}

impl Shared {
    fn telemetry(&self) -> MutexGuard<'_, Telemetry> {
        self.telemetry.lock().expect("easycomm telemetry mutex poisoned")
    }

    fn send(&self, command: String) {
        let link = self.link.lock().expect("easycomm link mutex poisoned");
        match link.as_ref() {
            Some(link) => {
                debug!("easycomm: sending {}", command);
                if link.send(format!("{}\n", command)).is_err() {
                    warn!("easycomm: link closed, dropping {}", command);
                }
            }
            None => debug!("easycomm: not connected, dropping {}", command),
        }
    }

    fn open_link(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.link.lock().expect("easycomm link mutex poisoned") = Some(tx);
        rx
    }

    fn close_link(&self) {
        *self.link.lock().expect("easycomm link mutex poisoned") = None;
    }

    /// Apply every token on a line, notifying once per token that changed
    /// the status.
    fn handle_line(&self, line: &str) {
        let mut telemetry = self.telemetry();
        for token in line.split_whitespace() {
            let before = telemetry.clone();
            if let Err(e) = telemetry.apply(token) {
                warn!("easycomm: parsing {:?}: {}", token, e);
                continue;
            }
            if *telemetry != before {
                (self.callback)(telemetry.snapshot());
            }
        }
    }

    async fn serve<R, W>(
        &self,
        reader: R,
        mut writer: W,
        mut outgoing: mpsc::UnboundedReceiver<String>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        let mut poll = interval(POLL_INTERVAL);
        loop {
            let out = tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        self.handle_line(&line);
                        continue;
                    }
                    Ok(None) => {
                        debug!("easycomm: link closed by peer");
                        break;
                    }
                    Err(e) => {
                        warn!("easycomm: reading link: {}", e);
                        break;
                    }
                },
                _ = poll.tick() => POLL_QUERIES.iter().map(|q| format!("{}\n", q)).collect::<String>(),
                out = outgoing.recv() => match out {
                    Some(out) => out,
                    None => break,
                },
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                    continue;
                }
            };
            if let Err(e) = writer.write_all(out.as_bytes()).await {
                warn!("easycomm: writing link: {}", e);
                break;
            }
        }
        self.close_link();
    }
}

/// EasyComm III rotator.
pub struct EasyComm {
    info: RotatorInfo,
    shared: Arc<Shared>,
}

impl EasyComm {
    pub fn new(info: RotatorInfo, callback: StatusCallback) -> Self {
        Self {
            info,
            shared: Arc::new(Shared {
                link: Mutex::new(None),
                telemetry: Mutex::new(Telemetry::default()),
                callback,
            }),
        }
    }

    /// Connect to a TCP peer, reconnecting every second until shutdown.
    pub fn connect_tcp(addr: &str, callback: StatusCallback, shutdown_rx: watch::Receiver<bool>) -> Self {
        let rotator = Self::new(
            RotatorInfo {
                manufacturer: "EasyComm".to_string(),
                model: "EasyComm III".to_string(),
                access: RotatorAccessMethod::Tcp {
                    addr: addr.to_string(),
                },
            },
            callback,
        );
        tokio::spawn(reconnect_loop(
            rotator.shared.clone(),
            addr.to_string(),
            shutdown_rx,
        ));
        rotator
    }

    /// Drive an in-process simulator.
    pub fn simulator(callback: StatusCallback, shutdown_rx: watch::Receiver<bool>) -> Self {
        let rotator = Self::new(
            RotatorInfo {
                manufacturer: "EasyComm".to_string(),
                model: "simulator".to_string(),
                access: RotatorAccessMethod::Simulated,
            },
            callback,
        );
        let (host, device) = tokio::io::duplex(64 * 1024);
        tokio::spawn(simulator::run(
            simulator::SimState::default(),
            device,
            shutdown_rx.clone(),
        ));
        rotator.attach(host, shutdown_rx);
        rotator
    }

    /// Drive the peer over an already open byte stream.
    pub fn attach<S>(&self, stream: S, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let outgoing = self.shared.open_link();
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(stream);
            shared.serve(reader, writer, outgoing, shutdown_rx).await;
        })
    }

    /// Run the link on separate halves until either side ends.
    pub async fn watch<R, W>(&self, reader: R, writer: W, shutdown_rx: watch::Receiver<bool>)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let outgoing = self.shared.open_link();
        self.shared.serve(reader, writer, outgoing, shutdown_rx).await;
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .link
            .lock()
            .expect("easycomm link mutex poisoned")
            .is_some()
    }
}

async fn reconnect_loop(shared: Arc<Shared>, addr: String, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = sleep(RECONNECT_DELAY) => {}
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
        let stream = match timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!("easycomm: opening {:?}: {}", addr, e);
                continue;
            }
            Err(_) => {
                warn!("easycomm: opening {:?}: timed out", addr);
                continue;
            }
        };
        info!("easycomm: opened {:?}", addr);
        let outgoing = shared.open_link();
        let (reader, writer) = stream.into_split();
        shared
            .serve(reader, writer, outgoing, shutdown_rx.clone())
            .await;
        if *shutdown_rx.borrow() {
            break;
        }
    }
}

fn velocity_command(velocity: f64, positive: char, negative: char) -> String {
    let dir = if velocity < 0.0 { negative } else { positive };
    format!("V{}{:03.0}", dir, velocity.abs() * 1000.0)
}

impl Rotator for EasyComm {
    fn info(&self) -> &RotatorInfo {
        &self.info
    }

    fn stop(&self) {
        self.shared.send("SA SE".to_string());
    }

    fn set_azimuth_position(&self, angle: f64) {
        self.shared.send(format!("AZ{:03.1}", normalize(angle)));
    }

    fn set_elevation_position(&self, angle: f64) {
        self.shared.send(format!("EL{:03.1}", normalize(angle)));
    }

    fn set_azimuth_velocity(&self, velocity: f64) {
        self.shared.send(velocity_command(velocity, 'R', 'L'));
    }

    fn set_elevation_velocity(&self, velocity: f64) {
        self.shared.send(velocity_command(velocity, 'U', 'D'));
    }
}

#[cfg(test)]
mod tests {
    use rot_core::{CommandMode, RotatorStatus};

    use super::*;

    fn recording() -> (EasyComm, Arc<Mutex<Vec<RotatorStatus>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: StatusCallback = Arc::new(move |status: RotatorStatus| {
            sink.lock().expect("status mutex poisoned").push(status);
        });
        let rotator = EasyComm::new(
            RotatorInfo {
                manufacturer: "EasyComm".to_string(),
                model: "test".to_string(),
                access: RotatorAccessMethod::Simulated,
            },
            callback,
        );
        (rotator, seen)
    }

    #[tokio::test]
    async fn reference_sequence_yields_expected_status() {
        let (rotator, seen) = recording();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let input = "AZ170.00\nEL45\nIP7,1.5,.5\nGS262\nGE6\n";
        rotator
            .watch(input.as_bytes(), tokio::io::sink(), shutdown_rx)
            .await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        let status = seen.last().expect("status");
        assert_eq!(status.az_pos, 170.0);
        assert_eq!(status.el_pos, 45.0);
        assert_eq!(status.az_vel, 1.5);
        assert_eq!(status.el_vel, 0.5);
        assert!(status.moving);
        assert_eq!(status.command_az_flags, CommandMode::Position);
        assert_eq!(status.command_el_flags, CommandMode::None);
        let detail = status.easycomm().expect("detail");
        assert!(detail.error_flags.sensor_error);
        assert!(detail.error_flags.homing_error);
        assert!(!rotator.is_connected());
    }

    #[tokio::test]
    async fn unchanged_and_bad_tokens_do_not_notify() {
        let (rotator, seen) = recording();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let input = "AZ10 AZ10\nbogus\nAZ10.0 EL0\n";
        rotator
            .watch(input.as_bytes(), tokio::io::sink(), shutdown_rx)
            .await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commands_are_formatted_on_the_wire() {
        let (rotator, _) = recording();
        let (host, device) = tokio::io::duplex(4096);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        rotator.attach(host, shutdown_rx);

        rotator.set_azimuth_position(-10.0);
        rotator.set_elevation_position(45.25);
        rotator.set_azimuth_velocity(-0.05);
        rotator.set_elevation_velocity(1.5);
        rotator.stop();

        let mut lines = BufReader::new(device).lines();
        let mut commands = Vec::new();
        while commands.len() < 5 {
            let line = lines.next_line().await.expect("read").expect("line");
            if !POLL_QUERIES.contains(&line.as_str()) {
                commands.push(line);
            }
        }
        assert_eq!(
            commands,
            vec!["AZ350.0", "EL45.2", "VL050", "VU1500", "SA SE"]
        );
    }

    #[tokio::test]
    async fn polls_peer_on_connect() {
        let (rotator, _) = recording();
        let (host, device) = tokio::io::duplex(4096);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        rotator.attach(host, shutdown_rx);
        let mut lines = BufReader::new(device).lines();
        for query in POLL_QUERIES {
            assert_eq!(lines.next_line().await.expect("read").as_deref(), Some(query));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn simulator_reaches_commanded_azimuth() {
        let seen = Arc::new(Mutex::new(Vec::<RotatorStatus>::new()));
        let sink = seen.clone();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let rotator = EasyComm::simulator(
            Arc::new(move |status: RotatorStatus| {
                sink.lock().expect("status mutex poisoned").push(status);
            }),
            shutdown_rx,
        );
        rotator.set_azimuth_position(150.0);
        sleep(Duration::from_secs(20)).await;
        shutdown_tx.send(true).expect("shutdown");

        let seen = seen.lock().unwrap();
        assert!(seen.iter().all(|s| s.az_vel.abs() <= simulator::MAX_VEL));
        let last = seen.last().expect("status");
        assert!((last.az_pos - 150.0).abs() < 0.5, "az {}", last.az_pos);
        assert_eq!(last.az_vel, 0.0);
        assert!(last.flags.simulator);
        assert_eq!(last.command_az_flags, CommandMode::Position);
    }
}
