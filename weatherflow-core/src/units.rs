//! Metric to imperial conversions. Each result is rounded to the precision it is displayed at.

const MPS_TO_MPH: f64 = 2.23694;
const MB_PER_INHG: f64 = 33.864;
const MM_PER_INCH: f64 = 25.4;
const KM_TO_MILE: f64 = 0.621371;

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    round_to(celsius * 9.0 / 5.0 + 32.0, 1)
}

pub fn mps_to_mph(mps: f64) -> f64 {
    round_to(mps * MPS_TO_MPH, 1)
}

pub fn millibar_to_inhg(mb: f64) -> f64 {
    round_to(mb / MB_PER_INHG, 3)
}

pub fn mm_to_inch(mm: f64) -> f64 {
    round_to(mm / MM_PER_INCH, 2)
}

pub fn inch_to_mm(inch: f64) -> f64 {
    round_to(inch * MM_PER_INCH, 2)
}

pub fn km_to_mile(km: f64) -> f64 {
    round_to(km * KM_TO_MILE, 1)
}
