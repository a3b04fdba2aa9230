use std::f64::consts::PI;

pub const TWOPI: f64 = 2. * PI;
