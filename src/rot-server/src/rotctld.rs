// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! rotctld-compatible front end.
//!
//! Exposes the subset of the hamlib rotctld ASCII protocol that tracking
//! tools need: capabilities, stop, absolute and velocity moves, position
//! readout.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use rot_core::angle::to_signed;

use crate::hub::Hub;

const RPRT_OK: i32 = 0;
const RPRT_EINVAL: i32 = -22;
const RPRT_UNKNOWN: i32 = -1;

const DUMP_CAPS: &str = "Model name: RCI
Mfg name: Sigmet
Rot type: Az-El
Min Azimuth: -180.00
Max Aximuth: 180.00
Min Elevation: 0.00
Max Elevation: 90.00
Can set Position: Y
Can get Position: Y
Can Stop: Y
Can Park: N
Can Reset: N
Can Move: Y
Can get Info: N
";

pub fn spawn(
    listen_addr: SocketAddr,
    hub: Arc<Hub>,
    shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = serve(listen_addr, hub, shutdown_rx).await {
            error!("rotctld server error: {:?}", e);
        }
    })
}

async fn serve(
    listen_addr: SocketAddr,
    hub: Arc<Hub>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!("rotctld listening on {}", listen_addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("rotctld accept failed: {}", e);
                        continue;
                    }
                };
                info!("rotctld client connected: {}", addr);
                let hub = hub.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, addr, hub).await {
                        warn!("rotctld client {} error: {:?}", addr, e);
                    }
                });
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("rotctld shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_client(stream: TcpStream, addr: SocketAddr, hub: Arc<Hub>) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            debug!("rotctld client {} disconnected", addr);
            break;
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            continue;
        }
        match process_command(trimmed, &hub).await {
            CommandResult::Reply(resp) => writer.write_all(resp.as_bytes()).await?,
            CommandResult::Close => break,
        }
        writer.flush().await?;
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Reply(String),
    Close,
}

/// Split a line into command name, arguments and whether it used the
/// `+\name` extended form.
fn parse_line(line: &str) -> (&str, Vec<&str>, bool) {
    if let Some(rest) = line.strip_prefix("+\\").filter(|rest| !rest.is_empty()) {
        let mut parts = rest.split(' ');
        let name = parts.next().unwrap_or_default();
        return (name, parts.collect(), true);
    }
    // The space after a short command is optional.
    let split = line.chars().next().map_or(0, char::len_utf8);
    let (name, rest) = line.split_at(split);
    (name, rest.split_whitespace().collect(), false)
}

pub async fn process_command(line: &str, hub: &Hub) -> CommandResult {
    let (name, args, extended) = parse_line(line);
    debug!("rotctld command {:?} args {:?}", name, args);

    let mut resp = String::new();
    if extended {
        resp.push_str(name);
        resp.push_str(":\n");
    }
    // Mutating commands always report.
    let mut report = extended;
    let rprt = match name {
        "q" | "Q" | "quit" => return CommandResult::Close,
        "1" | "dump_caps" => {
            resp.push_str(DUMP_CAPS);
            RPRT_OK
        }
        "S" | "stop" => {
            report = true;
            outcome(hub.manual(|r| r.stop()).await)
        }
        "P" | "set_pos" => {
            report = true;
            match parse_pair::<f64>(&args) {
                Some((az, el)) => outcome(
                    hub.manual(|r| {
                        r.set_azimuth_position(az);
                        r.set_elevation_position(el);
                    })
                    .await,
                ),
                None => RPRT_EINVAL,
            }
        }
        "M" | "move" => {
            report = true;
            match parse_pair::<i32>(&args).and_then(|(dir, speed)| direction(dir, speed)) {
                // Speed is 0..100, mapped to 0..10 deg/s.
                Some(Axis::Elevation(speed)) => outcome(
                    hub.manual(|r| r.set_elevation_velocity(f64::from(speed) / 10.0))
                        .await,
                ),
                Some(Axis::Azimuth(speed)) => outcome(
                    hub.manual(|r| r.set_azimuth_velocity(f64::from(speed) / 10.0))
                        .await,
                ),
                None => RPRT_EINVAL,
            }
        }
        "p" | "get_pos" => {
            let status = hub.snapshot().rotator;
            // hamlib convention: (-180, 180]
            let az = to_signed(status.az_pos);
            if extended {
                resp.push_str(&format!(
                    "Azimuth: {:.6}\nElevation: {:.6}\n",
                    az, status.el_pos
                ));
            } else {
                resp.push_str(&format!("{:.6}\n{:.6}\n", az, status.el_pos));
            }
            RPRT_OK
        }
        _ => {
            warn!("rotctld unsupported command: {}", line);
            RPRT_UNKNOWN
        }
    };
    if report || rprt != RPRT_OK {
        resp.push_str(&format!("RPRT {}\n", rprt));
    }
    CommandResult::Reply(resp)
}

fn outcome<E: std::fmt::Display>(result: Result<(), E>) -> i32 {
    match result {
        Ok(()) => RPRT_OK,
        Err(e) => {
            warn!("rotctld command failed: {}", e);
            RPRT_UNKNOWN
        }
    }
}

fn parse_pair<T: std::str::FromStr>(args: &[&str]) -> Option<(T, T)> {
    match args {
        [a, b] => Some((a.parse().ok()?, b.parse().ok()?)),
        _ => None,
    }
}

#[derive(Debug, PartialEq)]
enum Axis {
    Azimuth(i32),
    Elevation(i32),
}

/// Map a rotctld direction bitmask onto a signed axis speed.
fn direction(dir: i32, speed: i32) -> Option<Axis> {
    match dir {
        2 => Some(Axis::Elevation(-speed)),
        4 => Some(Axis::Elevation(speed)),
        8 => Some(Axis::Azimuth(-speed)),
        16 => Some(Axis::Azimuth(speed)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::testing::hub;
    use crate::protocol::Command;

    async fn reply(line: &str, hub: &Hub) -> String {
        match process_command(line, hub).await {
            CommandResult::Reply(resp) => resp,
            CommandResult::Close => panic!("unexpected close"),
        }
    }

    #[test]
    fn line_forms() {
        assert_eq!(parse_line("+\\set_pos 1 2"), ("set_pos", vec!["1", "2"], true));
        assert_eq!(parse_line("P 1 2"), ("P", vec!["1", "2"], false));
        assert_eq!(parse_line("P1 2"), ("P", vec!["1", "2"], false));
        assert_eq!(parse_line("p"), ("p", vec![], false));
        assert_eq!(parse_line("+\\"), ("+", vec!["\\"], false));
    }

    #[test]
    fn directions() {
        assert_eq!(direction(2, 50), Some(Axis::Elevation(-50)));
        assert_eq!(direction(4, 50), Some(Axis::Elevation(50)));
        assert_eq!(direction(8, 30), Some(Axis::Azimuth(-30)));
        assert_eq!(direction(16, 30), Some(Axis::Azimuth(30)));
        assert_eq!(direction(3, 30), None);
    }

    #[tokio::test]
    async fn set_pos_then_get_pos_extended() {
        let (hub, _) = hub();
        hub.execute(Command::Track(2), true).await.expect("track");

        assert_eq!(
            reply("+\\set_pos 10.5 20.5", &hub).await,
            "set_pos:\nRPRT 0\n"
        );
        assert_eq!(hub.tracking_body(), 0);
        assert_eq!(
            reply("+\\get_pos", &hub).await,
            "get_pos:\nAzimuth: 10.500000\nElevation: 20.500000\nRPRT 0\n"
        );
    }

    #[tokio::test]
    async fn short_forms() {
        let (hub, recorded) = hub();
        assert_eq!(reply("P 270 10", &hub).await, "RPRT 0\n");
        assert_eq!(reply("p", &hub).await, "-90.000000\n10.000000\n");
        assert_eq!(reply("M 2 50", &hub).await, "RPRT 0\n");
        assert_eq!(reply("M16 100", &hub).await, "RPRT 0\n");
        assert_eq!(reply("S", &hub).await, "RPRT 0\n");
        let calls = recorded.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec!["az 270", "el 10", "elv -5", "azv 10", "stop"]
        );
    }

    #[tokio::test]
    async fn errors() {
        let (hub, recorded) = hub();
        assert_eq!(reply("P 1", &hub).await, "RPRT -22\n");
        assert_eq!(reply("P a b", &hub).await, "RPRT -22\n");
        assert_eq!(reply("+\\move 3 10", &hub).await, "move:\nRPRT -22\n");
        assert_eq!(reply("M 4 fast", &hub).await, "RPRT -22\n");
        assert_eq!(reply("x", &hub).await, "RPRT -1\n");
        assert_eq!(reply("+\\park", &hub).await, "park:\nRPRT -1\n");
        assert!(recorded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dump_caps_and_quit() {
        let (hub, _) = hub();
        let caps = reply("1", &hub).await;
        assert!(caps.starts_with("Model name: RCI\nMfg name: Sigmet\n"));
        assert!(caps.contains("Min Azimuth: -180.00\n"));
        assert!(caps.ends_with("Can get Info: N\n"));
        let caps = reply("+\\dump_caps", &hub).await;
        assert!(caps.starts_with("dump_caps:\nModel name: RCI\n"));
        assert!(caps.ends_with("RPRT 0\n"));
        assert_eq!(process_command("q", &hub).await, CommandResult::Close);
        assert_eq!(process_command("+\\quit", &hub).await, CommandResult::Close);
    }

    #[tokio::test]
    async fn missing_rotator_reports_failure() {
        let hub = Hub::new(
            crate::hub::testing::options(),
            Box::new(rot_ephem::LowPrecision),
        );
        assert_eq!(reply("S", &hub).await, "RPRT -1\n");
    }

    #[tokio::test]
    #[ignore = "requires TCP bind permissions"]
    async fn serves_over_tcp() {
        let (hub, _) = hub();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let handle = spawn(addr, hub, shutdown_rx);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let stream = TcpStream::connect(addr).await.expect("connect");
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        writer.write_all(b"+\\set_pos 1 2\n").await.expect("write");
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read");
        assert_eq!(line, "set_pos:\n");
        line.clear();
        reader.read_line(&mut line).await.expect("read");
        assert_eq!(line, "RPRT 0\n");

        let _ = shutdown_tx.send(true);
        handle.await.expect("join");
    }
}
