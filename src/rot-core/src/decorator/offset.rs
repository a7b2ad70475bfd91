// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::angle::add;
use crate::rotator::status::{CommandMode, RotatorStatus};
use crate::rotator::{
    MoveBlocker, Offsetter, RegisterWriter, Rotator, RotatorInfo, ShutdownControl, StatusCallback,
};
use crate::DynResult;

#[derive(Debug, Default)]
struct OffsetState {
    azimuth_offset: f64,
    elevation_offset: f64,
    /// Last uncorrected position requested by callers.
    last_azimuth: Option<f64>,
    last_elevation: Option<f64>,
    azimuth_mode: CommandMode,
    elevation_mode: CommandMode,
}

/// Applies a fixed angular correction to a wrapped rotator.
///
/// Reported positions have the offset added, commanded positions have it
/// subtracted. Velocities pass through untouched.
pub struct Offset {
    inner: Box<dyn Rotator>,
    state: Arc<Mutex<OffsetState>>,
}

impl Offset {
    /// Build the wrapped rotator through `build`, handing it a callback that
    /// corrects every status before forwarding it to `callback`.
    pub fn wrap<F>(
        azimuth_offset: f64,
        elevation_offset: f64,
        callback: StatusCallback,
        build: F,
    ) -> DynResult<Self>
    where
        F: FnOnce(StatusCallback) -> DynResult<Box<dyn Rotator>>,
    {
        let state = Arc::new(Mutex::new(OffsetState {
            azimuth_offset,
            elevation_offset,
            ..Default::default()
        }));
        let cb_state = state.clone();
        let intercept: StatusCallback = Arc::new(move |mut status: RotatorStatus| {
            {
                let mut state = cb_state.lock().expect("offset state mutex poisoned");
                state.azimuth_mode = status.command_az_flags;
                state.elevation_mode = status.command_el_flags;
                status.az_pos = add(status.az_pos, state.azimuth_offset);
                status.el_pos = add(status.el_pos, state.elevation_offset);
                status.command_az_pos = add(status.command_az_pos, state.azimuth_offset);
                status.command_el_pos = add(status.command_el_pos, state.elevation_offset);
            }
            callback(status);
        });
        let inner = build(intercept)?;
        Ok(Self { inner, state })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OffsetState> {
        self.state.lock().expect("offset state mutex poisoned")
    }
}

impl Rotator for Offset {
    fn info(&self) -> &RotatorInfo {
        self.inner.info()
    }

    fn stop(&self) {
        self.inner.stop();
    }

    fn set_azimuth_position(&self, angle: f64) {
        let target = {
            let mut state = self.lock();
            state.last_azimuth = Some(angle);
            add(angle, -state.azimuth_offset)
        };
        self.inner.set_azimuth_position(target);
    }

    fn set_elevation_position(&self, angle: f64) {
        let target = {
            let mut state = self.lock();
            state.last_elevation = Some(angle);
            add(angle, -state.elevation_offset)
        };
        self.inner.set_elevation_position(target);
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
        Some(self)
    }
}

impl Offsetter for Offset {
    fn set_azimuth_offset(&self, offset: f64) {
        let reissue = {
            let mut state = self.lock();
            state.azimuth_offset = offset;
            match (state.azimuth_mode, state.last_azimuth) {
                (CommandMode::Position, Some(last)) => Some(add(last, -offset)),
                _ => None,
            }
        };
        if let Some(target) = reissue {
            debug!("re-issuing azimuth position {:.3} for new offset", target);
            self.inner.set_azimuth_position(target);
        }
    }

    fn set_elevation_offset(&self, offset: f64) {
        let reissue = {
            let mut state = self.lock();
            state.elevation_offset = offset;
            match (state.elevation_mode, state.last_elevation) {
                (CommandMode::Position, Some(last)) => Some(add(last, -offset)),
                _ => None,
            }
        };
        if let Some(target) = reissue {
            debug!("re-issuing elevation position {:.3} for new offset", target);
            self.inner.set_elevation_position(target);
        }
    }

    fn offsets(&self) -> (f64, f64) {
        let state = self.lock();
        (state.azimuth_offset, state.elevation_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angle::normalize;
    use crate::rotator::testing::{Call, Recorder};

    struct Harness {
        offset: Offset,
        calls: Arc<Mutex<Vec<Call>>>,
        driver_cb: StatusCallback,
        reported: Arc<Mutex<Vec<RotatorStatus>>>,
    }

    fn harness(az: f64, el: f64) -> Harness {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = reported.clone();
        let callback: StatusCallback = Arc::new(move |status| {
            sink.lock().expect("reported").push(status);
        });
        let mut captured = None;
        let recorder_calls = calls.clone();
        let offset = Offset::wrap(az, el, callback, |cb| {
            captured = Some(cb);
            Ok(Box::new(Recorder::new(recorder_calls)) as Box<dyn Rotator>)
        })
        .expect("wrap");
        Harness {
            offset,
            calls,
            driver_cb: captured.expect("callback captured"),
            reported,
        }
    }

    fn last_call(calls: &Arc<Mutex<Vec<Call>>>) -> Option<Call> {
        calls.lock().expect("calls").last().copied()
    }

    #[test]
    fn position_round_trip() {
        let h = harness(0.0, 0.0);
        for (o, p) in [(5.5, 170.0), (-5.5, 2.0), (10.0, 3.0), (350.0, 100.0)] {
            h.offset.set_azimuth_offset(o);
            h.offset.set_azimuth_position(p);
            let Some(Call::AzimuthPosition(sent)) = last_call(&h.calls) else {
                panic!("expected azimuth command");
            };
            assert!((sent - normalize(p - o)).abs() < 1e-9);

            (h.driver_cb)(RotatorStatus {
                az_pos: sent,
                command_az_pos: sent,
                command_az_flags: CommandMode::Position,
                ..Default::default()
            });
            let reported = h.reported.lock().expect("reported").last().cloned().expect("status");
            assert!((reported.az_pos - normalize(p)).abs() < 1e-9);
            assert!((reported.command_az_pos - normalize(p)).abs() < 1e-9);
        }
    }

    #[test]
    fn offset_change_reissues_position_command() {
        let h = harness(5.5, -5.5);
        h.offset.set_elevation_position(30.0);
        assert_eq!(last_call(&h.calls), Some(Call::ElevationPosition(35.5)));

        (h.driver_cb)(RotatorStatus {
            command_el_flags: CommandMode::Position,
            ..Default::default()
        });
        h.offset.set_elevation_offset(-10.0);
        assert_eq!(last_call(&h.calls), Some(Call::ElevationPosition(40.0)));
        assert_eq!(h.offset.offsets(), (5.5, -10.0));
    }

    #[test]
    fn offset_change_without_position_command_is_silent() {
        let h = harness(5.5, -5.5);
        (h.driver_cb)(RotatorStatus {
            command_az_flags: CommandMode::Velocity,
            ..Default::default()
        });
        h.offset.set_azimuth_velocity(2.0);
        h.offset.set_azimuth_offset(1.0);
        assert_eq!(
            h.calls.lock().expect("calls").as_slice(),
            &[Call::AzimuthVelocity(2.0)]
        );
    }
}
