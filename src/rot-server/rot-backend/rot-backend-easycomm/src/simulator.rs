// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Physically modelled EasyComm peer used for demo mode and tests.

use rot_core::angle::difference;
use rot_core::CommandMode;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tokio::time::{interval, Duration};
use tracing::{debug, warn};

/// Maximum acceleration, deg/s^2.
pub const MAX_ACCEL: f64 = 30.0;
/// Maximum velocity, deg/s.
pub const MAX_VEL: f64 = 30.0;
/// Velocities below this snap to zero.
pub const MIN_VEL: f64 = 0.1;
/// Deceleration when coasting, deg/s^2.
pub const DRAG_ACCEL: f64 = 30.0;
pub const STEP: Duration = Duration::from_millis(25);

fn step_secs() -> f64 {
    STEP.as_secs_f64()
}

/// Velocity that drives `current` toward `target` along the short way.
fn pos_servo(current: f64, target: f64) -> f64 {
    let remaining = difference(target, current);
    let speed = (2.0 * remaining.abs()).min(MAX_VEL);
    speed.copysign(remaining)
}

/// Next velocity, acceleration limited and clamped.
fn vel_servo(current: f64, target: f64) -> f64 {
    let max_delta = MAX_ACCEL * step_secs();
    let next = current + (target - current).clamp(-max_delta, max_delta);
    if next.abs() < MIN_VEL {
        return 0.0;
    }
    next.clamp(-MAX_VEL, MAX_VEL)
}

fn drag(current: f64) -> f64 {
    let speed = (current.abs() - DRAG_ACCEL * step_secs()).max(0.0);
    speed.copysign(current)
}

/// Simulated mount state.
#[derive(Debug, Clone, PartialEq)]
pub struct SimState {
    pub az_pos: f64,
    pub el_pos: f64,
    pub az_vel: f64,
    pub el_vel: f64,
    pub az_mode: CommandMode,
    pub el_mode: CommandMode,
    pub command_az_pos: f64,
    pub command_el_pos: f64,
    pub command_az_vel: f64,
    pub command_el_vel: f64,
    pub temperature: f64,
    pub elevation_limit: u32,
    pub status_register: u32,
    pub error_register: u32,
    pub version: String,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            az_pos: 0.0,
            el_pos: 0.0,
            az_vel: 0.0,
            el_vel: 0.0,
            az_mode: CommandMode::None,
            el_mode: CommandMode::None,
            command_az_pos: 0.0,
            command_el_pos: 0.0,
            command_az_vel: 0.0,
            command_el_vel: 0.0,
            temperature: 0.0,
            elevation_limit: 0,
            status_register: 0,
            error_register: 0,
            version: "sim".to_string(),
        }
    }
}

enum Field {
    Float(f64),
    Int(u32),
    Text(String),
}

impl SimState {
    /// Advance the model by one step.
    pub fn step(&mut self) {
        let dt = step_secs();
        let (az_vel, az_status) = axis_step(
            self.az_mode,
            self.az_pos,
            self.az_vel,
            self.command_az_pos,
            self.command_az_vel,
        );
        let (el_vel, el_status) = axis_step(
            self.el_mode,
            self.el_pos,
            self.el_vel,
            self.command_el_pos,
            self.command_el_vel,
        );
        self.az_vel = az_vel;
        self.el_vel = el_vel;
        self.az_pos = (self.az_pos + self.az_vel * dt).rem_euclid(360.0);
        self.el_pos = (self.el_pos + self.el_vel * dt).rem_euclid(360.0);

        // Mechanical end stops.
        self.elevation_limit = 0;
        if self.el_pos > 180.0 {
            self.el_pos = 0.0;
            self.el_vel = 0.0;
            self.elevation_limit = 1;
        } else if self.el_pos > 90.0 {
            self.el_pos = 90.0;
            self.el_vel = 0.0;
            self.elevation_limit = 2;
        }
        self.status_register = az_status | (el_status << 8);
    }

    /// Apply one command token and return any reply lines.
    pub fn command(&mut self, token: &str) -> Result<Vec<String>, String> {
        let split = token
            .find(|c: char| !(c == '?' || c.is_ascii_uppercase()))
            .unwrap_or(token.len());
        let (cmd, arg) = token.split_at(split);
        if cmd.is_empty() {
            return Err(format!("unrecognized command {:?}", token));
        }
        let value = if arg.is_empty() {
            None
        } else {
            let first = arg.split(',').next().unwrap_or_default();
            Some(
                first
                    .parse::<f64>()
                    .map_err(|e| format!("{:?}: {}", token, e))?,
            )
        };
        match (cmd, value) {
            ("SA", _) => self.az_mode = CommandMode::None,
            ("SE", _) => self.el_mode = CommandMode::None,
            ("AZ", Some(v)) => {
                self.az_mode = CommandMode::Position;
                self.command_az_pos = v;
            }
            ("EL", Some(v)) => {
                self.el_mode = CommandMode::Position;
                self.command_el_pos = v;
            }
            ("VU" | "VD", Some(v)) => {
                self.el_mode = CommandMode::Velocity;
                let v = v / 1000.0;
                self.command_el_vel = if cmd == "VD" { -v } else { v };
            }
            ("VL" | "VR", Some(v)) => {
                self.az_mode = CommandMode::Velocity;
                let v = v / 1000.0;
                self.command_az_vel = if cmd == "VL" { -v } else { v };
            }
            ("VU" | "VD", None) => {
                let dir = if self.command_el_vel < 0.0 { "D" } else { "U" };
                return Ok(vec![format!("V{}{:.2}", dir, self.command_el_vel.abs())]);
            }
            ("VL" | "VR", None) => {
                let dir = if self.command_az_vel < 0.0 { "L" } else { "R" };
                return Ok(vec![format!("V{}{:.2}", dir, self.command_az_vel.abs())]);
            }
            (query, None) => return Ok(self.report(None, Some(query))),
            _ => return Err(format!("unknown command {:?}", token)),
        }
        Ok(Vec::new())
    }

    fn fields(&self) -> [(&'static str, Field); 13] {
        [
            ("AZ", Field::Float(self.az_pos)),
            ("EL", Field::Float(self.el_pos)),
            ("IP0,", Field::Float(self.temperature)),
            ("IP2,", Field::Int(self.elevation_limit)),
            ("IP7,", Field::Float(self.az_vel)),
            ("IP8,", Field::Float(self.el_vel)),
            ("CR10,", Field::Float(self.command_az_pos)),
            ("CR11,", Field::Float(self.command_el_pos)),
            ("CR12,", Field::Float(self.command_az_vel)),
            ("CR13,", Field::Float(self.command_el_vel)),
            ("GS", Field::Int(self.status_register)),
            ("GE", Field::Int(self.error_register)),
            ("VE", Field::Text(self.version.clone())),
        ]
    }

    /// Reply lines for the fields that differ from `previous` (all of them
    /// when there is none), or just the field tagged `only`.
    pub fn report(&self, previous: Option<&SimState>, only: Option<&str>) -> Vec<String> {
        let old = previous.map(|p| p.fields());
        self.fields()
            .into_iter()
            .enumerate()
            .filter(|(i, (tag, field))| match only {
                Some(only) => *tag == only,
                None => match &old {
                    Some(old) => !field.same(&old[*i].1),
                    None => true,
                },
            })
            .map(|(_, (tag, field))| match field {
                Field::Float(v) => format!("{}{:.2}", tag, v),
                Field::Int(v) => format!("{}{}", tag, v),
                Field::Text(v) => format!("{}{}", tag, v),
            })
            .collect()
    }
}

impl Field {
    fn same(&self, other: &Field) -> bool {
        match (self, other) {
            (Field::Float(a), Field::Float(b)) => a == b,
            (Field::Int(a), Field::Int(b)) => a == b,
            (Field::Text(a), Field::Text(b)) => a == b,
            _ => false,
        }
    }
}

/// One axis: new velocity and its status byte (4|2 position, 2 velocity,
/// 1 coasting).
fn axis_step(mode: CommandMode, pos: f64, vel: f64, command_pos: f64, command_vel: f64) -> (f64, u32) {
    match mode {
        CommandMode::Position => (vel_servo(vel, pos_servo(pos, command_pos)), 4 | 2),
        CommandMode::Velocity => (vel_servo(vel, command_vel), 2),
        _ => (drag(vel), 1),
    }
}

/// Run the simulator against `stream` until shutdown or the peer closes.
pub async fn run<S>(mut state: SimState, stream: S, mut shutdown_rx: watch::Receiver<bool>)
where
    S: AsyncRead + AsyncWrite + Send,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();
    let mut ticker = interval(STEP);
    let mut last: Option<SimState> = None;
    loop {
        let replies = tokio::select! {
            _ = ticker.tick() => {
                state.step();
                let replies = state.report(last.as_ref(), None);
                last = Some(state.clone());
                replies
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let mut replies = Vec::new();
                    for token in line.split_whitespace() {
                        debug!("srv->sim: {}", token);
                        match state.command(token) {
                            Ok(out) => replies.extend(out),
                            Err(e) => debug!("simulator: {}", e),
                        }
                    }
                    replies
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("simulator: reading: {}", e);
                    break;
                }
            },
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        };
        for reply in replies {
            if let Err(e) = writer.write_all(format!("{}\n", reply).as_bytes()).await {
                warn!("simulator: writing: {}", e);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_move_settles_without_exceeding_max_velocity() {
        let mut sim = SimState::default();
        sim.command("AZ150.0").expect("command");
        let mut peak: f64 = 0.0;
        for _ in 0..(20 * 40) {
            sim.step();
            peak = peak.max(sim.az_vel.abs());
            assert!(sim.az_vel.abs() <= MAX_VEL);
        }
        assert!(peak > 29.0);
        assert_eq!(sim.az_vel, 0.0);
        assert!((sim.az_pos - 150.0).abs() < 0.5, "az {}", sim.az_pos);
        assert_eq!(sim.status_register, 6 | (1 << 8));
    }

    #[test]
    fn position_move_takes_short_way_round() {
        let mut sim = SimState {
            az_pos: 350.0,
            ..Default::default()
        };
        sim.command("AZ10.0").expect("command");
        sim.step();
        assert!(sim.az_vel > 0.0);
        for _ in 0..400 {
            sim.step();
        }
        assert!(difference(sim.az_pos, 10.0).abs() < 0.5);
    }

    #[test]
    fn velocity_command_accelerates_and_coasts_to_rest() {
        let mut sim = SimState::default();
        sim.command("VL5000").expect("command");
        assert_eq!(sim.command_az_vel, -5.0);
        for _ in 0..40 {
            sim.step();
        }
        assert_eq!(sim.az_vel, -5.0);
        assert_eq!(sim.status_register & 0xFF, 2);

        sim.command("SA").expect("stop");
        for _ in 0..40 {
            sim.step();
        }
        assert_eq!(sim.az_vel, 0.0);
        assert_eq!(sim.status_register & 0xFF, 1);
    }

    #[test]
    fn elevation_end_stops() {
        let mut sim = SimState::default();
        sim.command("VU10000").expect("up");
        for _ in 0..(20 * 40) {
            sim.step();
        }
        assert_eq!(sim.el_pos, 90.0);
        assert_eq!(sim.elevation_limit, 2);

        sim.command("VD10000").expect("down");
        for _ in 0..(20 * 40) {
            sim.step();
        }
        assert_eq!(sim.el_pos, 0.0);
        assert_eq!(sim.elevation_limit, 1);
    }

    #[test]
    fn reports_only_changed_fields() {
        let mut sim = SimState::default();
        let all = sim.report(None, None);
        assert_eq!(all.len(), 13);
        assert!(all.contains(&"VEsim".to_string()));

        let before = sim.clone();
        sim.command("VR1000").expect("command");
        sim.step();
        let changed = sim.report(Some(&before), None);
        assert!(changed.contains(&"IP7,0.75".to_string()));
        assert!(changed.contains(&"CR12,1.00".to_string()));
        assert!(changed.contains(&"GS258".to_string()));
        assert!(!changed.iter().any(|l| l.starts_with("VE")));
        assert!(!changed.iter().any(|l| l.starts_with("EL")));
    }

    #[test]
    fn answers_queries() {
        let mut sim = SimState::default();
        assert_eq!(sim.command("VE").expect("query"), vec!["VEsim".to_string()]);
        assert_eq!(sim.command("AZ").expect("query"), vec!["AZ0.00".to_string()]);
        sim.command("VD2500").expect("command");
        assert_eq!(sim.command("VU").expect("query"), vec!["VD2.50".to_string()]);
        assert!(sim.command("\\?ENC").is_err());
        assert!(sim.command("XX1,2").is_err());
    }
}
