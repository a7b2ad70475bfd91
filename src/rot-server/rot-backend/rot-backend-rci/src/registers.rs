// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! RCI register map and line format.

use rot_core::rotator::status::{RciDetail, StatusDetail, StatusFlags};
use rot_core::{CommandMode, RotatorStatus};

pub const READ_REGISTERS: usize = 12;
pub const WRITE_REGISTERS: usize = 11;

pub const DIAG: usize = 0;
pub const AZ_POSITION: usize = 1;
pub const AZ_VELOCITY: usize = 2;
pub const AZ_MODE: usize = 3;
pub const EL_POSITION: usize = 4;
pub const EL_VELOCITY: usize = 5;
pub const EL_MODE: usize = 6;
pub const SHUTDOWN_CONTROL: usize = 10;

const STATUS_BASE: usize = 5;
const FLAGS: usize = 8;
pub const STATUS_BITS: usize = 48;

pub const SERVO_NONE: u16 = 0;
pub const SERVO_POSITION: u16 = 1;
pub const SERVO_VELOCITY: u16 = 2;

/// Position register: unsigned fraction of a full turn.
pub fn unsigned_angle(reg: u16) -> f64 {
    360.0 * reg as f64 / 65536.0
}

/// Velocity and elevation registers: signed fraction of a full turn.
pub fn signed_angle(reg: u16) -> f64 {
    360.0 * (reg as i16) as f64 / 65536.0
}

/// Inverse of both conversions; negative angles wrap to two's complement.
pub fn angle_to_register(angle: f64) -> u16 {
    (angle / 360.0 * 65536.0) as i64 as u16
}

/// Parse the body of an `r` line: exactly twelve hex words.
pub fn parse_read_line(body: &str) -> Result<[u16; READ_REGISTERS], String> {
    let words: Vec<&str> = body.split_whitespace().collect();
    if words.len() != READ_REGISTERS {
        return Err(format!(
            "expected {} registers, got {}",
            READ_REGISTERS,
            words.len()
        ));
    }
    let mut registers = [0u16; READ_REGISTERS];
    for (slot, word) in registers.iter_mut().zip(words) {
        *slot = u16::from_str_radix(word, 16).map_err(|e| format!("{:?}: {}", word, e))?;
    }
    Ok(registers)
}

/// Render a register write: `w<reg> <value>...` in hex.
pub fn format_write(register: usize, values: &[u16]) -> String {
    let mut out = format!("w{:x}", register);
    for value in values {
        out.push_str(&format!(" {:x}", value));
    }
    out.push('\n');
    out
}

/// Decode a register image into a status snapshot. `moving` and
/// `moving_disabled` are left for the driver to fill in.
pub fn decode(
    read: &[u16; READ_REGISTERS],
    write: &[u16; WRITE_REGISTERS],
) -> RotatorStatus {
    let flags = read[FLAGS];
    let status = (0..STATUS_BITS)
        .map(|i| (read[STATUS_BASE + i / 16] >> (i % 16)) & 1 == 1)
        .collect();
    RotatorStatus {
        az_pos: unsigned_angle(read[AZ_POSITION]),
        el_pos: signed_angle(read[2]),
        az_vel: signed_angle(read[3]),
        el_vel: signed_angle(read[4]),
        command_az_flags: CommandMode::from_register(write[AZ_MODE]),
        command_el_flags: CommandMode::from_register(write[EL_MODE]),
        command_az_pos: unsigned_angle(write[AZ_POSITION]),
        command_el_pos: unsigned_angle(write[EL_POSITION]),
        command_az_vel: signed_angle(write[AZ_VELOCITY]),
        command_el_vel: signed_angle(write[EL_VELOCITY]),
        status,
        flags: StatusFlags {
            local: flags & 1 != 0,
            maintenance: flags & 2 != 0,
            elevation_lower: flags & 4 != 0,
            elevation_upper: flags & 8 != 0,
            simulator: flags & 16 != 0,
            bad_command: flags & 32 != 0,
            host_okay: flags & 64 != 0,
        },
        shutdown_error: (flags >> 10) as u8,
        detail: Some(StatusDetail::Rci(RciDetail {
            diag: read[DIAG],
            command_diag: write[DIAG],
            read_registers: read.to_vec(),
            write_registers: write.to_vec(),
        })),
        ..Default::default()
    }
}
