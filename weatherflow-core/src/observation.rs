//! Decoding of the vendor's positional observation rows.
//!
//! The API sends each sample as a bare JSON array whose positions depend on the hardware family
//! named by the response `type` field. Each family gets its own row struct, deserialized straight
//! from the array, and [`NormalizedObservation`] is built from either with an exhaustive match.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationLayout {
    /// Tempest (`obs_st`), 22 fields.
    St,
    /// Sky (`obs_sky`), 17 fields.
    Sky,
}

impl ObservationLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationLayout::St => "obs_st",
            ObservationLayout::Sky => "obs_sky",
        }
    }

    pub fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "obs_st" => Some(ObservationLayout::St),
            "obs_sky" => Some(ObservationLayout::Sky),
            _ => None,
        }
    }

    pub const fn field_count(&self) -> usize {
        match self {
            ObservationLayout::St => 22,
            ObservationLayout::Sky => 17,
        }
    }
}

impl std::fmt::Display for ObservationLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("Observation response contained no rows")]
    MissingRow,

    #[error("Malformed {layout} observation row: {message}")]
    MalformedRow {
        layout: ObservationLayout,
        message: String,
    },

    #[error("Malformed observation summary: {0}")]
    MalformedSummary(String),
}

/// `obs_st` positions, in array order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StRow {
    pub epoch: i64,
    pub wind_lull: Option<f64>,
    pub wind_avg: Option<f64>,
    pub wind_gust: Option<f64>,
    pub wind_direction: Option<f64>,
    pub wind_interval: Option<f64>,
    pub pressure: Option<f64>,
    pub air_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub lux: Option<f64>,
    pub uv: Option<f64>,
    pub solar_radiation: Option<f64>,
    pub rain_accum: Option<f64>,
    pub precip_type: Option<u8>,
    pub avg_strike_distance: Option<f64>,
    pub strike_count: Option<u32>,
    pub battery: Option<f64>,
    pub report_interval: Option<f64>,
    pub lcl_day_rain_accum: Option<f64>,
    pub rain_accum_final: Option<f64>,
    pub lcl_day_rain_accum_final: Option<f64>,
    pub precip_analysis: Option<u8>,
}

/// `obs_sky` positions, in array order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SkyRow {
    pub epoch: i64,
    pub illuminance: Option<f64>,
    pub uv: Option<f64>,
    pub rain_accum: Option<f64>,
    pub wind_lull: Option<f64>,
    pub wind_avg: Option<f64>,
    pub wind_gust: Option<f64>,
    pub wind_direction: Option<f64>,
    pub battery: Option<f64>,
    pub report_interval: Option<f64>,
    pub solar_radiation: Option<f64>,
    pub lcl_day_rain_accum: Option<f64>,
    pub precip_type: Option<u8>,
    pub wind_interval: Option<f64>,
    pub rain_accum_final: Option<f64>,
    pub lcl_day_rain_accum_final: Option<f64>,
    pub precip_analysis: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawObservationRow {
    St(StRow),
    Sky(SkyRow),
}

impl RawObservationRow {
    pub fn parse(layout: ObservationLayout, row: &Value) -> Result<Self, DecodeError> {
        let malformed = |message: String| DecodeError::MalformedRow { layout, message };

        let fields = row
            .as_array()
            .ok_or_else(|| malformed(format!("expected an array, found {}", json_kind(row))))?;

        if fields.len() != layout.field_count() {
            return Err(malformed(format!(
                "expected {} fields, found {}",
                layout.field_count(),
                fields.len()
            )));
        }

        let parsed = match layout {
            ObservationLayout::St => StRow::deserialize(row).map(RawObservationRow::St),
            ObservationLayout::Sky => SkyRow::deserialize(row).map(RawObservationRow::Sky),
        };

        let parsed = parsed.map_err(|err| malformed(err.to_string()))?;

        if parsed.epoch().checked_mul(1000).is_none() {
            return Err(malformed(format!("epoch {} out of range", parsed.epoch())));
        }

        Ok(parsed)
    }

    /// Sample time in whole seconds.
    pub fn epoch(&self) -> i64 {
        match self {
            RawObservationRow::St(r) => r.epoch,
            RawObservationRow::Sky(r) => r.epoch,
        }
    }

    pub fn layout(&self) -> ObservationLayout {
        match self {
            RawObservationRow::St(_) => ObservationLayout::St,
            RawObservationRow::Sky(_) => ObservationLayout::Sky,
        }
    }

    /// Positional values in wire order, epoch in seconds.
    pub fn to_values(&self) -> Vec<Option<f64>> {
        let int = |v: Option<u8>| v.map(f64::from);

        match self {
            RawObservationRow::St(r) => vec![
                Some(r.epoch as f64),
                r.wind_lull,
                r.wind_avg,
                r.wind_gust,
                r.wind_direction,
                r.wind_interval,
                r.pressure,
                r.air_temp,
                r.humidity,
                r.lux,
                r.uv,
                r.solar_radiation,
                r.rain_accum,
                int(r.precip_type),
                r.avg_strike_distance,
                r.strike_count.map(f64::from),
                r.battery,
                r.report_interval,
                r.lcl_day_rain_accum,
                r.rain_accum_final,
                r.lcl_day_rain_accum_final,
                int(r.precip_analysis),
            ],
            RawObservationRow::Sky(r) => vec![
                Some(r.epoch as f64),
                r.illuminance,
                r.uv,
                r.rain_accum,
                r.wind_lull,
                r.wind_avg,
                r.wind_gust,
                r.wind_direction,
                r.battery,
                r.report_interval,
                r.solar_radiation,
                r.lcl_day_rain_accum,
                int(r.precip_type),
                r.wind_interval,
                r.rain_accum_final,
                r.lcl_day_rain_accum_final,
                int(r.precip_analysis),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Wind {
    pub lull: Option<f64>,
    pub avg: Option<f64>,
    pub gust: Option<f64>,
    pub direction: Option<f64>,
    /// Sample interval in minutes.
    pub interval: Option<f64>,
}

/// Derived values the API attaches to current observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationSummary {
    pub pressure_trend: Option<String>,
    pub strike_count_1h: Option<u32>,
    pub strike_count_3h: Option<u32>,
    pub precip_total_1h: Option<f64>,
    pub strike_last_dist: Option<f64>,
    pub strike_last_epoch: Option<i64>,
    pub precip_accum_local_yesterday: Option<f64>,
    pub precip_accum_local_yesterday_final: Option<f64>,
    pub feels_like: Option<f64>,
    pub heat_index: Option<f64>,
    pub wind_chill: Option<f64>,
}

/// One sample in vendor units: m/s, mb, °C, mm, km.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedObservation {
    /// Milliseconds since the Unix epoch.
    pub epoch: i64,
    pub wind: Wind,
    pub pressure: Option<f64>,
    pub air_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub lux: Option<f64>,
    #[serde(rename = "UV")]
    pub uv: Option<f64>,
    pub solar_radiation: Option<f64>,
    pub rain_accum: Option<f64>,
    pub rain_accum_final: Option<f64>,
    pub lcl_day_rain_accum: Option<f64>,
    pub lcl_day_rain_accum_final: Option<f64>,
    pub precip_type: Option<u8>,
    pub precip_analysis: Option<u8>,
    pub strike_count: Option<u32>,
    pub avg_strike_distance: Option<f64>,
    pub battery: Option<f64>,
    pub report_interval: Option<f64>,
    pub summary: Option<ObservationSummary>,
}

impl NormalizedObservation {
    /// Local-day rainfall, preferring the reprocessed value over the same-day estimate.
    pub fn daily_precip_mm(&self) -> Option<f64> {
        self.lcl_day_rain_accum_final.or(self.lcl_day_rain_accum)
    }

    /// Rebuilds the positional row for `layout`. Fields the layout has no slot for are dropped.
    pub fn to_raw(&self, layout: ObservationLayout) -> RawObservationRow {
        let epoch = self.epoch / 1000;
        match layout {
            ObservationLayout::St => RawObservationRow::St(StRow {
                epoch,
                wind_lull: self.wind.lull,
                wind_avg: self.wind.avg,
                wind_gust: self.wind.gust,
                wind_direction: self.wind.direction,
                wind_interval: self.wind.interval,
                pressure: self.pressure,
                air_temp: self.air_temp,
                humidity: self.humidity,
                lux: self.lux,
                uv: self.uv,
                solar_radiation: self.solar_radiation,
                rain_accum: self.rain_accum,
                precip_type: self.precip_type,
                avg_strike_distance: self.avg_strike_distance,
                strike_count: self.strike_count,
                battery: self.battery,
                report_interval: self.report_interval,
                lcl_day_rain_accum: self.lcl_day_rain_accum,
                rain_accum_final: self.rain_accum_final,
                lcl_day_rain_accum_final: self.lcl_day_rain_accum_final,
                precip_analysis: self.precip_analysis,
            }),
            ObservationLayout::Sky => RawObservationRow::Sky(SkyRow {
                epoch,
                illuminance: self.lux,
                uv: self.uv,
                rain_accum: self.rain_accum,
                wind_lull: self.wind.lull,
                wind_avg: self.wind.avg,
                wind_gust: self.wind.gust,
                wind_direction: self.wind.direction,
                battery: self.battery,
                report_interval: self.report_interval,
                solar_radiation: self.solar_radiation,
                lcl_day_rain_accum: self.lcl_day_rain_accum,
                precip_type: self.precip_type,
                wind_interval: self.wind.interval,
                rain_accum_final: self.rain_accum_final,
                lcl_day_rain_accum_final: self.lcl_day_rain_accum_final,
                precip_analysis: self.precip_analysis,
            }),
        }
    }
}

impl From<RawObservationRow> for NormalizedObservation {
    fn from(row: RawObservationRow) -> Self {
        match row {
            RawObservationRow::St(r) => NormalizedObservation {
                epoch: r.epoch.saturating_mul(1000),
                wind: Wind {
                    lull: r.wind_lull,
                    avg: r.wind_avg,
                    gust: r.wind_gust,
                    direction: r.wind_direction,
                    interval: r.wind_interval,
                },
                pressure: r.pressure,
                air_temp: r.air_temp,
                humidity: r.humidity,
                lux: r.lux,
                uv: r.uv,
                solar_radiation: r.solar_radiation,
                rain_accum: r.rain_accum,
                rain_accum_final: r.rain_accum_final,
                lcl_day_rain_accum: r.lcl_day_rain_accum,
                lcl_day_rain_accum_final: r.lcl_day_rain_accum_final,
                precip_type: r.precip_type,
                precip_analysis: r.precip_analysis,
                strike_count: r.strike_count,
                avg_strike_distance: r.avg_strike_distance,
                battery: r.battery,
                report_interval: r.report_interval,
                summary: None,
            },
            RawObservationRow::Sky(r) => NormalizedObservation {
                epoch: r.epoch.saturating_mul(1000),
                wind: Wind {
                    lull: r.wind_lull,
                    avg: r.wind_avg,
                    gust: r.wind_gust,
                    direction: r.wind_direction,
                    interval: r.wind_interval,
                },
                pressure: None,
                air_temp: None,
                humidity: None,
                lux: r.illuminance,
                uv: r.uv,
                solar_radiation: r.solar_radiation,
                rain_accum: r.rain_accum,
                rain_accum_final: r.rain_accum_final,
                lcl_day_rain_accum: r.lcl_day_rain_accum,
                lcl_day_rain_accum_final: r.lcl_day_rain_accum_final,
                precip_type: r.precip_type,
                precip_analysis: r.precip_analysis,
                strike_count: None,
                avg_strike_distance: None,
                battery: r.battery,
                report_interval: r.report_interval,
                summary: None,
            },
        }
    }
}

/// Decodes one positional row. The epoch field is always expected in whole seconds.
///
/// Never panics on malformed input: any shape problem comes back as a [`DecodeError`] and no
/// partially decoded record is produced. A `null` or absent summary leaves `summary` unset.
pub fn decode(
    row: &Value,
    layout: ObservationLayout,
    summary: Option<&Value>,
) -> Result<NormalizedObservation, DecodeError> {
    let raw = RawObservationRow::parse(layout, row)?;

    let summary = match summary {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            ObservationSummary::deserialize(value)
                .map_err(|err| DecodeError::MalformedSummary(err.to_string()))?,
        ),
    };

    let mut obs = NormalizedObservation::from(raw);
    obs.summary = summary;
    Ok(obs)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
