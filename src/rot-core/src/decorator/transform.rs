// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Horizon (az/el) interface over an hour-angle/declination mount.

use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

use crate::angle::{difference, normalize};
use crate::rotator::status::{EquatorialPosition, RotatorStatus};
use crate::rotator::{
    MoveBlocker, Offsetter, RegisterWriter, Rotator, RotatorInfo, ShutdownControl, StatusCallback,
};
use crate::DynResult;

/// Step used to map native-axis rates into horizon rates.
const RATE_STEP_SECS: f64 = 0.1;

/// Convert between (azimuth, altitude) and (hour angle, declination).
///
/// The transform is its own inverse: feeding it (HA, Dec) yields (Az, El)
/// and vice versa. Azimuth is measured from north through east, hour angle
/// westward. All values in radians.
fn equhor_rad(x: f64, y: f64, phi: f64) -> (f64, f64) {
    let (sx, sy, sphi) = (x.sin(), y.sin(), phi.sin());
    let (cx, cy, cphi) = (x.cos(), y.cos(), phi.cos());

    let sq = (sy * sphi + cy * cphi * cx).clamp(-1.0, 1.0);
    let q = sq.asin();

    let denom = cphi * q.cos();
    let mut p = if denom.abs() < 1e-12 {
        0.0
    } else {
        ((sy - sphi * sq) / denom).clamp(-1.0, 1.0).acos()
    };
    if sx > 0.0 {
        p = 2.0 * PI - p;
    }
    (p, q)
}

/// Degree wrapper around the spherical transform; the first result is wrapped into `[0, 360)`.
pub fn equhor(x: f64, y: f64, latitude: f64) -> (f64, f64) {
    let (p, q) = equhor_rad(x.to_radians(), y.to_radians(), latitude.to_radians());
    (normalize(p.to_degrees()), q.to_degrees())
}

/// Horizon to equatorial: (azimuth, elevation) → (hour angle, declination).
pub fn hor_to_equ(azimuth: f64, elevation: f64, latitude: f64) -> (f64, f64) {
    equhor(azimuth, elevation, latitude)
}

/// Equatorial to horizon: (hour angle, declination) → (azimuth, elevation).
pub fn equ_to_hor(hour_angle: f64, declination: f64, latitude: f64) -> (f64, f64) {
    equhor(hour_angle, declination, latitude)
}

#[derive(Debug, Default)]
struct TransformState {
    /// Last requested horizon pair.
    requested: Option<(f64, f64)>,
    /// Last reported horizon pair.
    current: (f64, f64),
}

/// Presents an az/el rotator on top of a mount whose native axes are
/// hour angle and declination.
///
/// Position commands are recomputed jointly from the last requested pair.
/// Velocity commands act on the native axes.
pub struct Transformer {
    inner: Box<dyn Rotator>,
    latitude: f64,
    state: Arc<Mutex<TransformState>>,
}

impl Transformer {
    pub fn wrap<F>(latitude: f64, callback: StatusCallback, build: F) -> DynResult<Self>
    where
        F: FnOnce(StatusCallback) -> DynResult<Box<dyn Rotator>>,
    {
        let state = Arc::new(Mutex::new(TransformState::default()));
        let cb_state = state.clone();
        let intercept: StatusCallback = Arc::new(move |status: RotatorStatus| {
            let status = to_horizon(status, latitude);
            cb_state.lock().expect("transform state mutex poisoned").current =
                (status.az_pos, status.el_pos);
            callback(status);
        });
        let inner = build(intercept)?;
        Ok(Self {
            inner,
            latitude,
            state,
        })
    }

    fn command(&self, azimuth: Option<f64>, elevation: Option<f64>) {
        let (az, el) = {
            let mut state = self.state.lock().expect("transform state mutex poisoned");
            let (last_az, last_el) = state.requested.unwrap_or(state.current);
            let pair = (azimuth.unwrap_or(last_az), elevation.unwrap_or(last_el));
            state.requested = Some(pair);
            pair
        };
        let (ha, dec) = hor_to_equ(az, el, self.latitude);
        self.inner.set_azimuth_position(ha);
        self.inner.set_elevation_position(dec);
    }
}

fn to_horizon(mut status: RotatorStatus, latitude: f64) -> RotatorStatus {
    let (ha, dec) = (status.az_pos, status.el_pos);
    let (az, el) = equ_to_hor(ha, dec, latitude);
    let (ha_next, dec_next) = (
        ha + status.az_vel * RATE_STEP_SECS,
        dec + status.el_vel * RATE_STEP_SECS,
    );
    let (az_next, el_next) = equ_to_hor(ha_next, dec_next, latitude);

    let (cmd_az, cmd_el) = equ_to_hor(status.command_az_pos, status.command_el_pos, latitude);

    status.equatorial = Some(EquatorialPosition {
        hour_angle: ha,
        declination: dec,
    });
    status.az_pos = az;
    status.el_pos = el;
    status.az_vel = difference(az_next, az) / RATE_STEP_SECS;
    status.el_vel = (el_next - el) / RATE_STEP_SECS;
    status.command_az_pos = cmd_az;
    status.command_el_pos = cmd_el;
    status
}

impl Rotator for Transformer {
    fn info(&self) -> &RotatorInfo {
        self.inner.info()
    }

    fn stop(&self) {
        self.inner.stop();
    }

    fn set_azimuth_position(&self, angle: f64) {
        self.command(Some(angle), None);
    }

    fn set_elevation_position(&self, angle: f64) {
        self.command(None, Some(angle));
    }

    fn set_azimuth_velocity(&self, velocity: f64) {
        self.inner.set_azimuth_velocity(velocity);
    }

    fn set_elevation_velocity(&self, velocity: f64) {
        self.inner.set_elevation_velocity(velocity);
    }

    fn as_register_writer(&self) -> Option<&dyn RegisterWriter> {
        self.inner.as_register_writer()
    }

    fn as_shutdown_control(&self) -> Option<&dyn ShutdownControl> {
        self.inner.as_shutdown_control()
    }

    fn as_move_blocker(&self) -> Option<&dyn MoveBlocker> {
        self.inner.as_move_blocker()
    }

    fn as_offsetter(&self) -> Option<&dyn Offsetter> {
        self.inner.as_offsetter()
    }
}
