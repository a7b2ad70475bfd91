// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Low-precision Sun, Moon and planet positions.

use crate::body::Planet;
use crate::coords::{
    asin_d, atan2_d, cos_d, ecliptic_to_equatorial, obliquity, precess_from_j2000, sin_d,
};
use crate::time::J2000;

/// Geocentric apparent place of date.
#[derive(Debug, Clone, Copy)]
pub struct Place {
    pub ra: f64,
    pub dec: f64,
    /// Horizontal parallax in degrees.
    pub parallax: f64,
}

/// Sun, good to about 0.01 degree between 1950 and 2050.
pub fn sun(jd: f64) -> Place {
    let n = jd - J2000;
    let l = 280.460 + 0.985_647_4 * n;
    let g = 357.528 + 0.985_600_3 * n;
    let lambda = l + 1.915 * sin_d(g) + 0.020 * sin_d(2.0 * g);
    let eps = 23.439 - 0.000_000_4 * n;
    let (ra, dec) = ecliptic_to_equatorial(lambda.rem_euclid(360.0), 0.0, eps);
    Place {
        ra,
        dec,
        parallax: 0.0024,
    }
}

/// Moon, good to a few tenths of a degree.
pub fn moon(jd: f64) -> Place {
    let t = (jd - J2000) / 36_525.0;
    let lambda = 218.32 + 481_267.881 * t + 6.29 * sin_d(135.0 + 477_198.87 * t)
        - 1.27 * sin_d(259.3 - 413_335.36 * t)
        + 0.66 * sin_d(235.7 + 890_534.22 * t)
        + 0.21 * sin_d(269.9 + 954_397.74 * t)
        - 0.19 * sin_d(357.5 + 35_999.05 * t)
        - 0.11 * sin_d(186.5 + 966_404.03 * t);
    let beta = 5.13 * sin_d(93.3 + 483_202.02 * t) + 0.28 * sin_d(228.2 + 960_400.89 * t)
        - 0.28 * sin_d(318.3 + 6_003.15 * t)
        - 0.17 * sin_d(217.6 - 407_332.21 * t);
    let parallax = 0.9508
        + 0.0518 * cos_d(135.0 + 477_198.87 * t)
        + 0.0095 * cos_d(259.3 - 413_335.36 * t)
        + 0.0078 * cos_d(235.7 + 890_534.22 * t)
        + 0.0028 * cos_d(269.9 + 954_397.74 * t);
    let (ra, dec) = ecliptic_to_equatorial(lambda.rem_euclid(360.0), beta, obliquity(t));
    Place { ra, dec, parallax }
}

/// Mean orbital elements at J2000 and their rates per century:
/// a (AU), e, I, L, longitude of perihelion, longitude of ascending node.
struct Elements {
    base: [f64; 6],
    rate: [f64; 6],
}

const EARTH_MOON: Elements = Elements {
    base: [1.000_002_61, 0.016_711_23, -0.000_015_31, 100.464_571_66, 102.937_681_93, 0.0],
    rate: [0.000_005_62, -0.000_043_92, -0.012_946_68, 35_999.372_449_81, 0.323_273_64, 0.0],
};

fn elements(planet: Planet) -> Elements {
    match planet {
        Planet::Mercury => Elements {
            base: [0.387_099_27, 0.205_635_93, 7.004_979_02, 252.250_323_50, 77.457_796_28, 48.330_765_93],
            rate: [0.000_000_37, 0.000_019_06, -0.005_947_49, 149_472.674_111_75, 0.160_476_89, -0.125_340_81],
        },
        Planet::Venus => Elements {
            base: [0.723_335_66, 0.006_776_72, 3.394_676_05, 181.979_099_50, 131.602_467_18, 76.679_842_55],
            rate: [0.000_003_90, -0.000_041_07, -0.000_788_90, 58_517.815_387_29, 0.002_683_29, -0.277_694_18],
        },
        Planet::Mars => Elements {
            base: [1.523_710_34, 0.093_394_10, 1.849_691_42, -4.553_432_05, -23.943_629_59, 49.559_538_91],
            rate: [0.000_018_47, 0.000_078_82, -0.008_131_31, 19_140.302_684_99, 0.444_410_88, -0.292_573_43],
        },
        Planet::Jupiter => Elements {
            base: [5.202_887_00, 0.048_386_24, 1.304_396_95, 34.396_440_51, 14.728_479_83, 100.473_909_09],
            rate: [-0.000_116_07, -0.000_132_53, -0.001_837_14, 3_034.746_127_75, 0.212_526_68, 0.204_691_06],
        },
        Planet::Saturn => Elements {
            base: [9.536_675_94, 0.053_861_79, 2.485_991_87, 49.954_244_23, 92.598_878_31, 113.662_424_48],
            rate: [-0.001_250_60, -0.000_509_91, 0.001_936_09, 1_222.493_622_01, -0.418_972_16, -0.288_677_94],
        },
        Planet::Uranus => Elements {
            base: [19.189_164_64, 0.047_257_44, 0.772_637_83, 313.238_104_51, 170.954_276_30, 74.016_925_03],
            rate: [-0.001_961_76, -0.000_043_97, -0.002_429_39, 428.482_027_85, 0.408_052_81, 0.042_405_89],
        },
        Planet::Neptune => Elements {
            base: [30.069_922_76, 0.008_590_48, 1.770_043_47, -55.120_029_69, 44.964_762_27, 131.784_225_74],
            rate: [0.000_262_91, 0.000_051_05, 0.000_353_72, 218.459_453_25, -0.322_414_64, -0.005_086_64],
        },
        Planet::Pluto => Elements {
            base: [39.482_116_75, 0.248_827_30, 17.140_012_06, 238.929_038_33, 224.068_916_29, 110.303_936_84],
            rate: [-0.000_315_96, 0.000_051_70, 0.000_048_18, 145.207_805_15, -0.040_629_42, -0.011_834_82],
        },
    }
}

/// Heliocentric ecliptic J2000 rectangular coordinates in AU.
fn heliocentric(el: &Elements, t: f64) -> [f64; 3] {
    let v: [f64; 6] = std::array::from_fn(|i| el.base[i] + el.rate[i] * t);
    let (a, e, incl, l, peri, node) = (v[0], v[1], v[2], v[3], v[4], v[5]);
    let omega = peri - node;
    let m = (l - peri).rem_euclid(360.0).to_radians();

    let mut ecc_anomaly = m + e * m.sin();
    for _ in 0..10 {
        let delta = (ecc_anomaly - e * ecc_anomaly.sin() - m) / (1.0 - e * ecc_anomaly.cos());
        ecc_anomaly -= delta;
        if delta.abs() < 1e-12 {
            break;
        }
    }

    let xp = a * (ecc_anomaly.cos() - e);
    let yp = a * (1.0 - e * e).sqrt() * ecc_anomaly.sin();

    let (cw, sw) = (cos_d(omega), sin_d(omega));
    let (cn, sn) = (cos_d(node), sin_d(node));
    let (ci, si) = (cos_d(incl), sin_d(incl));

    [
        (cw * cn - sw * sn * ci) * xp + (-sw * cn - cw * sn * ci) * yp,
        (cw * sn + sw * cn * ci) * xp + (-sw * sn + cw * cn * ci) * yp,
        (sw * si) * xp + (cw * si) * yp,
    ]
}

/// Geocentric J2000 equatorial (ra, dec) and distance in AU.
pub fn planet_geocentric(planet: Planet, jd: f64) -> (f64, f64, f64) {
    let t = (jd - J2000) / 36_525.0;
    let p = heliocentric(&elements(planet), t);
    let earth = heliocentric(&EARTH_MOON, t);
    let (x, y, z) = (p[0] - earth[0], p[1] - earth[1], p[2] - earth[2]);

    let eps = obliquity(0.0);
    let (ye, ze) = (y * cos_d(eps) - z * sin_d(eps), y * sin_d(eps) + z * cos_d(eps));
    let ra = atan2_d(ye, x).rem_euclid(360.0);
    let dist = (x * x + ye * ye + ze * ze).sqrt();
    let dec = asin_d(ze / dist);
    (ra, dec, dist)
}

/// Planet, precessed to the equator of date.
pub fn planet(planet: Planet, jd: f64) -> Place {
    let (ra, dec, dist) = planet_geocentric(planet, jd);
    let (ra, dec) = precess_from_j2000(ra, dec, (jd - J2000) / 36_525.0);
    Place {
        ra,
        dec,
        parallax: 0.0024 / dist,
    }
}
