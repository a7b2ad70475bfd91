// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

use serde::{Serialize, Serializer};

/// Per-axis command mode reported by a rotator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandMode {
    #[default]
    None,
    Position,
    Velocity,
    Error,
    Unknown(u32),
}

impl CommandMode {
    /// Decode an RCI mode register.
    pub fn from_register(value: u16) -> Self {
        match value {
            0 => CommandMode::None,
            1 => CommandMode::Position,
            2 => CommandMode::Velocity,
            other => CommandMode::Unknown(other as u32),
        }
    }

    /// Encode as an RCI mode register value.
    pub fn to_register(self) -> u16 {
        match self {
            CommandMode::None => 0,
            CommandMode::Position => 1,
            CommandMode::Velocity => 2,
            CommandMode::Error => 0,
            CommandMode::Unknown(v) => v as u16,
        }
    }

    /// Whether a command is outstanding on this axis.
    pub fn is_active(self) -> bool {
        self != CommandMode::None
    }
}

impl fmt::Display for CommandMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandMode::None => f.write_str("NONE"),
            CommandMode::Position => f.write_str("POSITION"),
            CommandMode::Velocity => f.write_str("VELOCITY"),
            CommandMode::Error => f.write_str("ERROR"),
            CommandMode::Unknown(v) => write!(f, "UNKNOWN({})", v),
        }
    }
}

impl Serialize for CommandMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Named status bits shared by the rotator drivers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusFlags {
    pub local: bool,
    pub maintenance: bool,
    pub elevation_lower: bool,
    pub elevation_upper: bool,
    pub simulator: bool,
    pub bad_command: bool,
    pub host_okay: bool,
}

/// Native-frame position reported by the equatorial transformer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EquatorialPosition {
    pub hour_angle: f64,
    pub declination: f64,
}

/// EasyComm error register bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorFlags {
    pub no_error: bool,
    pub sensor_error: bool,
    pub homing_error: bool,
    pub motor_error: bool,
}

impl ErrorFlags {
    pub fn from_register(reg: u32) -> Self {
        Self {
            no_error: reg & 0x1 != 0,
            sensor_error: reg & 0x2 != 0,
            homing_error: reg & 0x4 != 0,
            motor_error: reg & 0x8 != 0,
        }
    }
}

/// Raw register view kept by the RCI driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RciDetail {
    pub diag: u16,
    pub command_diag: u16,
    pub read_registers: Vec<u16>,
    pub write_registers: Vec<u16>,
}

/// Telemetry reported by EasyComm peers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EasyCommDetail {
    pub raw_az_pos: i32,
    pub raw_el_pos: i32,
    pub raw_az_vel: f64,
    pub raw_el_vel: f64,
    pub temperature: f64,
    #[serde(rename = "AzimuthCCW")]
    pub azimuth_ccw: bool,
    #[serde(rename = "AzimuthCW")]
    pub azimuth_cw: bool,
    pub elevation_limit: u32,
    pub raw_az_drive: f64,
    pub raw_el_drive: f64,
    pub status_register: u32,
    pub error_register: u32,
    pub error_flags: ErrorFlags,
    pub version: String,
}

/// Driver-specific part of a status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatusDetail {
    Rci(RciDetail),
    EasyComm(EasyCommDetail),
}

/// Snapshot of a rotator, produced on every device update.
///
/// Serialized flat with PascalCase keys, which is the status feed wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RotatorStatus {
    pub az_pos: f64,
    pub el_pos: f64,
    pub az_vel: f64,
    pub el_vel: f64,
    pub command_az_flags: CommandMode,
    pub command_el_flags: CommandMode,
    pub command_az_pos: f64,
    pub command_el_pos: f64,
    pub command_az_vel: f64,
    pub command_el_vel: f64,
    /// Raw status bit vector, LSB-first per register word.
    pub status: Vec<bool>,
    #[serde(flatten)]
    pub flags: StatusFlags,
    pub shutdown_error: u8,
    pub moving: bool,
    pub moving_disabled: bool,
    #[serde(flatten)]
    pub equatorial: Option<EquatorialPosition>,
    #[serde(flatten)]
    pub detail: Option<StatusDetail>,
}

impl RotatorStatus {
    pub fn easycomm(&self) -> Option<&EasyCommDetail> {
        match &self.detail {
            Some(StatusDetail::EasyComm(d)) => Some(d),
            _ => None,
        }
    }

    pub fn rci(&self) -> Option<&RciDetail> {
        match &self.detail {
            Some(StatusDetail::Rci(d)) => Some(d),
            _ => None,
        }
    }
}
