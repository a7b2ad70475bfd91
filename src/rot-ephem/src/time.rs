// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use chrono::{DateTime, Utc};

pub const J2000: f64 = 2_451_545.0;

/// Julian date of a UTC instant. UT1-UTC is ignored.
pub fn julian_day(time: DateTime<Utc>) -> f64 {
    let secs = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
    secs / 86_400.0 + 2_440_587.5
}

/// Julian centuries since J2000.0.
pub fn centuries(jd: f64) -> f64 {
    (jd - J2000) / 36_525.0
}

/// Greenwich mean sidereal time in degrees, `[0, 360)`.
pub fn gmst(jd: f64) -> f64 {
    let t = centuries(jd);
    let theta = 280.460_618_37 + 360.985_647_366_29 * (jd - J2000) + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0;
    theta.rem_euclid(360.0)
}
