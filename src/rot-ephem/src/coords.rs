// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Spherical coordinate conversions. Angles in degrees.

pub fn sin_d(x: f64) -> f64 {
    x.to_radians().sin()
}

pub fn cos_d(x: f64) -> f64 {
    x.to_radians().cos()
}

pub fn tan_d(x: f64) -> f64 {
    x.to_radians().tan()
}

pub fn atan2_d(y: f64, x: f64) -> f64 {
    y.atan2(x).to_degrees()
}

pub fn asin_d(x: f64) -> f64 {
    x.clamp(-1.0, 1.0).asin().to_degrees()
}

/// Mean obliquity of the ecliptic.
pub fn obliquity(t: f64) -> f64 {
    23.439_291 - 0.013_004_2 * t
}

/// Ecliptic (longitude, latitude) to equatorial (right ascension, declination).
pub fn ecliptic_to_equatorial(lon: f64, lat: f64, eps: f64) -> (f64, f64) {
    let ra = atan2_d(
        sin_d(lon) * cos_d(eps) - lat.to_radians().tan() * sin_d(eps),
        cos_d(lon),
    );
    let dec = asin_d(sin_d(lat) * cos_d(eps) + cos_d(lat) * sin_d(eps) * sin_d(lon));
    (ra.rem_euclid(360.0), dec)
}

/// Precess J2000 mean coordinates to the mean equator of date (IAU 1976).
pub fn precess_from_j2000(ra: f64, dec: f64, t: f64) -> (f64, f64) {
    let zeta = (2306.2181 * t + 0.30188 * t * t + 0.017998 * t * t * t) / 3600.0;
    let z = (2306.2181 * t + 1.09468 * t * t + 0.018203 * t * t * t) / 3600.0;
    let theta = (2004.3109 * t - 0.42665 * t * t - 0.041833 * t * t * t) / 3600.0;

    let a = cos_d(dec) * sin_d(ra + zeta);
    let b = cos_d(theta) * cos_d(dec) * cos_d(ra + zeta) - sin_d(theta) * sin_d(dec);
    let c = sin_d(theta) * cos_d(dec) * cos_d(ra + zeta) + cos_d(theta) * sin_d(dec);

    ((atan2_d(a, b) + z).rem_euclid(360.0), asin_d(c))
}

/// Hour angle and declination to (azimuth from north through east, elevation).
pub fn equatorial_to_horizontal(hour_angle: f64, dec: f64, latitude: f64) -> (f64, f64) {
    let az = atan2_d(
        sin_d(hour_angle),
        cos_d(hour_angle) * sin_d(latitude) - dec.to_radians().tan() * cos_d(latitude),
    ) + 180.0;
    let el = asin_d(sin_d(latitude) * sin_d(dec) + cos_d(latitude) * cos_d(dec) * cos_d(hour_angle));
    (az.rem_euclid(360.0), el)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precession_is_identity_at_epoch() {
        let (ra, dec) = precess_from_j2000(123.4, -45.6, 0.0);
        assert!((ra - 123.4).abs() < 1e-9);
        assert!((dec + 45.6).abs() < 1e-9);
    }

    #[test]
    fn precession_moves_equinox_forward() {
        // A point on the equator at RA 0 drifts about 50" per year.
        let (ra, _) = precess_from_j2000(0.0, 0.0, 0.26);
        let drift_arcsec = ra * 3600.0 / 26.0;
        assert!((drift_arcsec - 46.1).abs() < 1.0, "{drift_arcsec}");
    }

    #[test]
    fn transit_is_due_south() {
        let (az, el) = equatorial_to_horizontal(0.0, 10.0, 42.0);
        assert!((az - 180.0).abs() < 1e-9);
        assert!((el - 58.0).abs() < 1e-9);
    }
}
