// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Angle helpers shared by drivers, decorators and front ends.

/// Wrap an angle in degrees into `[0, 360)`.
pub fn normalize(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid of a tiny negative value rounds up to exactly 360.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Add two angles and wrap the result into `[0, 360)`.
pub fn add(a: f64, b: f64) -> f64 {
    normalize(a + b)
}

/// Shortest signed difference `a - b`, in `[-180, 180)`.
pub fn difference(a: f64, b: f64) -> f64 {
    normalize(a - b + 180.0) - 180.0
}

/// Convert a `[0, 360)` azimuth into the `(-180, 180]` convention used by hamlib.
pub fn to_signed(angle: f64) -> f64 {
    let angle = normalize(angle);
    if angle > 180.0 {
        angle - 360.0
    } else {
        angle
    }
}
