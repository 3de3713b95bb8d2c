use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Separations (radians) below this are treated as coincident. `acos` near 1 cannot resolve
/// anything finer than about 1.5e-8, so identical points may not come out as exactly 0.
const COINCIDENT_EPSILON: f64 = 1e-7;
/// Separations within this of PI (radians) are treated as antipodal.
const ANTIPODAL_EPSILON: f64 = 1e-6;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns `None` when either coordinate is non-finite or outside its range.
    pub fn checked(latitude: f64, longitude: f64) -> Option<Self> {
        if latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude)
        {
            Some(Self::new(latitude, longitude))
        } else {
            None
        }
    }

    /// Great-circle distance in kilometres (haversine, mean Earth radius).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let d_phi = phi2 - phi1;
        let d_lambda = (other.longitude - self.longitude).to_radians();

        let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
    }

    /// Initial great-circle bearing towards `other`, degrees clockwise from true north in `[0, 360)`.
    pub fn initial_bearing(&self, other: &GeoPoint) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let d_lambda = (other.longitude - self.longitude).to_radians();

        let y = d_lambda.sin() * phi2.cos();
        let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
        (y.atan2(x).to_degrees() + 360.0) % 360.0
    }

    fn to_cartesian(self) -> [f64; 3] {
        let phi = self.latitude.to_radians();
        let lambda = self.longitude.to_radians();
        [phi.cos() * lambda.cos(), phi.cos() * lambda.sin(), phi.sin()]
    }

    fn from_cartesian([x, y, z]: [f64; 3]) -> Self {
        let latitude = z.atan2((x * x + y * y).sqrt()).to_degrees();
        let longitude = y.atan2(x).to_degrees();
        Self::new(latitude, longitude)
    }
}

/// Decodes a Maidenhead locator (4 or 6 significant characters, case-insensitive) to the
/// center of its cell.
///
/// Characters past the sixth are ignored, as is a lone fifth character. Returns `None` for
/// absent, short or out-of-range input.
pub fn decode_locator(locator: &str) -> Option<GeoPoint> {
    let chars: Vec<char> = locator.trim().chars().map(|c| c.to_ascii_uppercase()).collect();
    if chars.len() < 4 {
        return None;
    }

    let field_lon = letter_index(chars[0], 'R')?;
    let field_lat = letter_index(chars[1], 'R')?;
    let square_lon = chars[2].to_digit(10)?;
    let square_lat = chars[3].to_digit(10)?;

    let mut longitude = -180.0 + f64::from(field_lon) * 20.0 + f64::from(square_lon) * 2.0;
    let mut latitude = -90.0 + f64::from(field_lat) * 10.0 + f64::from(square_lat);

    if chars.len() >= 6 {
        let sub_lon = letter_index(chars[4], 'X')?;
        let sub_lat = letter_index(chars[5], 'X')?;
        longitude += f64::from(sub_lon) * (2.0 / 24.0) + 1.0 / 24.0;
        latitude += f64::from(sub_lat) * (1.0 / 24.0) + 0.5 / 24.0;
    } else {
        longitude += 1.0;
        latitude += 0.5;
    }

    Some(GeoPoint::new(latitude, longitude))
}

fn letter_index(c: char, last: char) -> Option<u32> {
    if ('A'..=last).contains(&c) {
        Some(c as u32 - 'A' as u32)
    } else {
        None
    }
}

/// Lazily evaluated great-circle polyline from `a` to `b`. Clones are independent cursors,
/// so a clone taken before iterating replays the whole path.
#[derive(Debug, Clone)]
pub struct GreatCircle {
    a: GeoPoint,
    b: GeoPoint,
    steps: usize,
    next: usize,
    arc: ArcKind,
}

#[derive(Debug, Clone, Copy)]
enum ArcKind {
    Coincident,
    Slerp {
        start: [f64; 3],
        end: [f64; 3],
        d: f64,
    },
    /// Antipodal endpoints have no unique great circle; sweep PI radians from `start` along
    /// the fixed direction `towards`.
    Antipodal {
        start: [f64; 3],
        towards: [f64; 3],
    },
}

/// Produces `steps + 1` points along the great circle between `a` and `b`, `a` first and `b`
/// last.
pub fn interpolate_great_circle(a: GeoPoint, b: GeoPoint, steps: usize) -> GreatCircle {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();
    let cos_d = (phi1.sin() * phi2.sin() + phi1.cos() * phi2.cos() * d_lambda.cos()).clamp(-1.0, 1.0);
    let d = cos_d.acos();

    let arc = if d < COINCIDENT_EPSILON {
        ArcKind::Coincident
    } else if PI - d < ANTIPODAL_EPSILON {
        let start = a.to_cartesian();
        ArcKind::Antipodal {
            start,
            towards: antipodal_direction(start),
        }
    } else {
        ArcKind::Slerp {
            start: a.to_cartesian(),
            end: b.to_cartesian(),
            d,
        }
    };

    GreatCircle {
        a,
        b,
        steps,
        next: 0,
        arc,
    }
}

/// Unit vector perpendicular to `start` pointing along its meridian towards the north pole.
/// At the poles the prime meridian is used instead.
fn antipodal_direction(start: [f64; 3]) -> [f64; 3] {
    let north = [0.0, 0.0, 1.0];
    let candidate = reject(north, start);
    let norm = length(candidate);
    if norm > 1e-6 {
        scale(candidate, 1.0 / norm)
    } else {
        let prime = reject([1.0, 0.0, 0.0], start);
        scale(prime, 1.0 / length(prime))
    }
}

fn reject(v: [f64; 3], from: [f64; 3]) -> [f64; 3] {
    let dot = v[0] * from[0] + v[1] * from[1] + v[2] * from[2];
    [v[0] - dot * from[0], v[1] - dot * from[1], v[2] - dot * from[2]]
}

fn length(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

fn scale(v: [f64; 3], k: f64) -> [f64; 3] {
    [v[0] * k, v[1] * k, v[2] * k]
}

fn blend(p: [f64; 3], wp: f64, q: [f64; 3], wq: f64) -> [f64; 3] {
    [
        p[0] * wp + q[0] * wq,
        p[1] * wp + q[1] * wq,
        p[2] * wp + q[2] * wq,
    ]
}

impl GreatCircle {
    fn point_at(&self, i: usize) -> GeoPoint {
        if i == 0 {
            return self.a;
        }
        if i == self.steps {
            return self.b;
        }

        #[allow(clippy::cast_precision_loss)]
        let f = i as f64 / self.steps as f64;
        match self.arc {
            ArcKind::Coincident => self.a,
            ArcKind::Slerp { start, end, d } => {
                let sin_d = d.sin();
                let wa = ((1.0 - f) * d).sin() / sin_d;
                let wb = (f * d).sin() / sin_d;
                GeoPoint::from_cartesian(blend(start, wa, end, wb))
            }
            ArcKind::Antipodal { start, towards } => {
                let theta = f * PI;
                GeoPoint::from_cartesian(blend(start, theta.cos(), towards, theta.sin()))
            }
        }
    }
}

impl Iterator for GreatCircle {
    type Item = GeoPoint;

    fn next(&mut self) -> Option<GeoPoint> {
        if self.next > self.steps {
            return None;
        }
        let point = self.point_at(self.next);
        self.next += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.steps + 1).saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GreatCircle {}
