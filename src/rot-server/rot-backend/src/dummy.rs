// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Dummy rotator for development and testing.
//!
//! Every command takes effect immediately and is echoed back through the
//! status callback. No hardware required.

use std::sync::Mutex;

use rot_core::rotator::{RotatorAccessMethod, RotatorInfo};
use rot_core::{normalize, CommandMode, Rotator, RotatorStatus, StatusCallback};

pub struct DummyRotator {
    info: RotatorInfo,
    status: Mutex<RotatorStatus>,
    callback: StatusCallback,
}

impl DummyRotator {
    pub fn new(callback: StatusCallback) -> Self {
        Self {
            info: RotatorInfo {
                manufacturer: "Dummy".to_string(),
                model: "dummy".to_string(),
                access: RotatorAccessMethod::Simulated,
            },
            status: Mutex::new(RotatorStatus::default()),
            callback,
        }
    }

    fn update(&self, apply: impl FnOnce(&mut RotatorStatus)) {
        let mut status = self.status.lock().expect("dummy status mutex poisoned");
        apply(&mut status);
        status.flags.simulator = true;
        (self.callback)(status.clone());
    }
}

impl Rotator for DummyRotator {
    fn info(&self) -> &RotatorInfo {
        &self.info
    }

    fn stop(&self) {
        self.update(|s| {
            s.az_vel = 0.0;
            s.el_vel = 0.0;
            s.command_az_flags = CommandMode::None;
            s.command_el_flags = CommandMode::None;
        });
    }

    fn set_azimuth_position(&self, angle: f64) {
        let angle = normalize(angle);
        self.update(|s| {
            s.az_pos = angle;
            s.command_az_pos = angle;
            s.command_az_flags = CommandMode::Position;
        });
    }

    fn set_elevation_position(&self, angle: f64) {
        self.update(|s| {
            s.el_pos = angle;
            s.command_el_pos = angle;
            s.command_el_flags = CommandMode::Position;
        });
    }

    fn set_azimuth_velocity(&self, velocity: f64) {
        self.update(|s| {
            s.az_vel = velocity;
            s.command_az_vel = velocity;
            s.command_az_flags = CommandMode::Velocity;
        });
    }

    fn set_elevation_velocity(&self, velocity: f64) {
        self.update(|s| {
            s.el_vel = velocity;
            s.command_el_vel = velocity;
            s.command_el_flags = CommandMode::Velocity;
        });
    }
}
