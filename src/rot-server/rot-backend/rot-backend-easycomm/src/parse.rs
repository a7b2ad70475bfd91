// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! EasyComm III reply parsing.

use rot_core::rotator::status::{EasyCommDetail, ErrorFlags, StatusDetail};
use rot_core::{normalize, CommandMode, RotatorStatus};
use tracing::warn;

/// Axis mode encoded in one byte of the `GS` status register.
pub fn mode_from_status_byte(value: u32) -> CommandMode {
    match value {
        1 => CommandMode::None,
        2 => CommandMode::Velocity,
        4 | 6 => CommandMode::Position,
        8 => CommandMode::Error,
        other => CommandMode::Unknown(other),
    }
}

/// Everything learned from the peer so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    pub status: RotatorStatus,
    pub detail: EasyCommDetail,
}

impl Telemetry {
    pub fn snapshot(&self) -> RotatorStatus {
        let mut status = self.status.clone();
        status.detail = Some(StatusDetail::EasyComm(self.detail.clone()));
        status
    }

    /// Apply one whitespace-delimited reply token.
    pub fn apply(&mut self, token: &str) -> Result<(), String> {
        if token.len() < 2 {
            return Err("truncated output".to_string());
        }
        if let Some(value) = token.strip_prefix("AZ") {
            self.status.az_pos = normalize(parse_float(value)?);
        } else if let Some(value) = token.strip_prefix("EL") {
            self.status.el_pos = parse_float(value)?;
        } else if let Some(value) = token.strip_prefix("GS") {
            self.apply_status_register(parse_register(value)?);
        } else if let Some(value) = token.strip_prefix("GE") {
            let reg = parse_register(value)?;
            self.detail.error_register = reg;
            self.detail.error_flags = ErrorFlags::from_register(reg);
        } else if let Some(value) = token.strip_prefix("VE") {
            self.detail.version = value.to_string();
            self.status.flags.simulator = value == "sim";
        } else if let Some(value) = token.strip_prefix("IP") {
            for (index, raw) in multiplexed(token, value) {
                self.apply_input(index, raw);
            }
        } else if let Some(value) = token.strip_prefix("CR") {
            for (index, raw) in multiplexed(token, value) {
                let value = raw.parse::<f64>().unwrap_or(0.0);
                match index {
                    10 => self.status.command_az_pos = value,
                    11 => self.status.command_el_pos = value,
                    12 => self.status.command_az_vel = value,
                    13 => self.status.command_el_vel = value,
                    _ => {}
                }
            }
        } else if let Some(value) = token.strip_prefix("\\?ENC") {
            let mut parts = value.split(',');
            for field in [
                &mut self.detail.raw_az_pos,
                &mut self.detail.raw_el_pos,
            ] {
                if let Some(Ok(v)) = parts.next().map(str::parse::<i32>) {
                    *field = v;
                }
            }
            for field in [&mut self.detail.raw_az_vel, &mut self.detail.raw_el_vel] {
                if let Some(Ok(v)) = parts.next().map(str::parse::<i32>) {
                    *field = v as f64;
                }
            }
        } else if let Some(value) = token.strip_prefix("\\?VEL") {
            let mut parts = value.split(',');
            let az = parts.next().ok_or("truncated list")?;
            let el = parts.next().ok_or("truncated list")?;
            self.status.az_vel = parse_float(az)?;
            self.status.el_vel = parse_float(el)?;
        } else {
            return Err("unknown rotator output".to_string());
        }
        Ok(())
    }

    /// Per axis byte, with a zero byte falling back to the low byte.
    fn apply_status_register(&mut self, reg: u32) {
        self.detail.status_register = reg;
        let mode = |axis: u32| {
            let mut value = (reg >> (axis * 8)) & 0xFF;
            if value == 0 {
                value = reg & 0xFF;
            }
            mode_from_status_byte(value)
        };
        self.status.command_az_flags = mode(0);
        self.status.command_el_flags = mode(1);
        self.status.moving = reg & 0x202 != 0;
    }

    fn apply_input(&mut self, index: usize, raw: &str) {
        let float = raw.parse::<f64>().unwrap_or(0.0);
        let int = raw.parse::<u32>().unwrap_or(0);
        match index {
            0 => self.detail.temperature = float,
            1 => {
                self.detail.azimuth_ccw = int & 1 == 1;
                self.detail.azimuth_cw = int & 2 == 2;
            }
            2 => {
                self.detail.elevation_limit = int;
                self.status.flags.elevation_lower = int & 1 == 1;
                self.status.flags.elevation_upper = int & 2 == 2;
            }
            5 => self.detail.raw_az_drive = float,
            6 => self.detail.raw_el_drive = float,
            7 => self.status.az_vel = float,
            8 => self.status.el_vel = float,
            _ => {}
        }
    }
}

fn parse_float(value: &str) -> Result<f64, String> {
    value
        .parse::<f64>()
        .map_err(|e| format!("{:?}: {}", value, e))
}

fn parse_register(value: &str) -> Result<u32, String> {
    value
        .parse::<i64>()
        .map(|v| v as u32)
        .map_err(|e| format!("{:?}: {}", value, e))
}

/// Split `n,v0,v1,...` into `(n, v0), (n + 1, v1), ...`.
fn multiplexed<'a>(token: &str, body: &'a str) -> Vec<(usize, &'a str)> {
    let mut parts = body.split(',');
    let first = parts.next().unwrap_or_default();
    match first.parse::<usize>() {
        Ok(start) => parts.enumerate().map(|(i, v)| (start + i, v)).collect(),
        Err(e) => {
            warn!("easycomm: {:?}: {}", token, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Telemetry {
        let mut telemetry = Telemetry::default();
        for token in input.split_whitespace() {
            telemetry.apply(token).expect("token");
        }
        telemetry
    }

    #[test]
    fn parses_reference_lines() {
        let cases: [(&str, fn(&mut Telemetry)); 9] = [
            ("AZ170.00", |t: &mut Telemetry| t.status.az_pos = 170.0),
            ("EL45", |t: &mut Telemetry| t.status.el_pos = 45.0),
            (
                "IP7,1.5,.5",
                |t: &mut Telemetry| {
                    t.status.az_vel = 1.5;
                    t.status.el_vel = 0.5;
                },
            ),
            (
                "GS262",
                |t: &mut Telemetry| {
                    t.detail.status_register = 262;
                    t.status.moving = true;
                    t.status.command_az_flags = CommandMode::Position;
                    t.status.command_el_flags = CommandMode::None;
                },
            ),
            (
                "GE6",
                |t: &mut Telemetry| {
                    t.detail.error_register = 6;
                    t.detail.error_flags.sensor_error = true;
                    t.detail.error_flags.homing_error = true;
                },
            ),
            ("IP0,35.6", |t: &mut Telemetry| t.detail.temperature = 35.6),
            (
                "IP1,2,1",
                |t: &mut Telemetry| {
                    t.detail.azimuth_cw = true;
                    t.detail.elevation_limit = 1;
                    t.status.flags.elevation_lower = true;
                },
            ),
            (
                "IP5,10,15 IP5,11 IP5,12",
                |t: &mut Telemetry| {
                    t.detail.raw_az_drive = 12.0;
                    t.detail.raw_el_drive = 15.0;
                },
            ),
            (
                "CR10,150,10.5",
                |t: &mut Telemetry| {
                    t.status.command_az_pos = 150.0;
                    t.status.command_el_pos = 10.5;
                },
            ),
        ];
        for (input, expect) in cases {
            let mut want = Telemetry::default();
            expect(&mut want);
            assert_eq!(parse(input), want, "input {:?}", input);
        }
    }

    #[test]
    fn reference_sequence_accumulates() {
        let t = parse("AZ170.00 EL45 IP7,1.5,.5 GS262 GE6");
        let status = t.snapshot();
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
        assert!(!detail.error_flags.no_error);
    }

    #[test]
    fn status_byte_modes() {
        let t = parse("GS520");
        assert_eq!(t.status.command_az_flags, CommandMode::Error);
        assert_eq!(t.status.command_el_flags, CommandMode::Velocity);
        assert!(t.status.moving);
        assert_eq!(mode_from_status_byte(3), CommandMode::Unknown(3));
    }

    #[test]
    fn encoder_and_version_replies() {
        let t = parse("\\?ENC100,-20,3,4 \\?VEL1.25,-0.5 VEsim");
        assert_eq!(t.detail.raw_az_pos, 100);
        assert_eq!(t.detail.raw_el_pos, -20);
        assert_eq!(t.detail.raw_az_vel, 3.0);
        assert_eq!(t.detail.raw_el_vel, 4.0);
        assert_eq!(t.status.az_vel, 1.25);
        assert_eq!(t.status.el_vel, -0.5);
        assert_eq!(t.detail.version, "sim");
        assert!(t.status.flags.simulator);
    }

    #[test]
    fn azimuth_is_normalized() {
        assert_eq!(parse("AZ-10").status.az_pos, 350.0);
        assert_eq!(parse("AZ360").status.az_pos, 0.0);
    }

    #[test]
    fn rejects_unknown_and_malformed_tokens() {
        let mut t = Telemetry::default();
        assert!(t.apply("X").is_err());
        assert!(t.apply("ZZTOP").is_err());
        assert!(t.apply("AZabc").is_err());
        assert!(t.apply("\\?VEL1").is_err());
        assert!(t.apply("IPx,1").is_ok());
        assert_eq!(t, Telemetry::default());
    }
}
