use chrono::{DateTime, Utc};
use serde::Serialize;

/// Station and selected device, filled in by [`crate::WeatherFlowClient::connect`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationMeta {
    pub public_name: String,
    pub station_id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub device_id: Option<u64>,
}

/// Current conditions in imperial units.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrentConditions {
    pub observed_at: Option<DateTime<Utc>>,
    pub temp_f: Option<f64>,
    pub feels_like_f: Option<f64>,
    pub wind_mph: Option<f64>,
    pub wind_gust_mph: Option<f64>,
    pub wind_direction: Option<f64>,
    pub pressure_inhg: Option<f64>,
    pub precip_today_in: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub last_strike_miles: Option<f64>,
}

/// Today's forecast in imperial units.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForecastSummary {
    pub max_temp_f: Option<f64>,
    pub min_temp_f: Option<f64>,
    pub max_wind_mph: Option<f64>,
    /// Sum of today's hourly forecast amounts.
    pub total_precip_in: Option<f64>,
    pub precip_chance_pct: Option<f64>,
}

/// Precipitation totals in inches. Fields are filled in pipeline order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub precip_last_7_days: Option<f64>,
    pub precip_last_14_days: Option<f64>,
    pub precip_last_28_days: Option<f64>,
    pub precip_year: Option<f64>,
    pub precip_month: Option<f64>,
    pub precip_event: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherData {
    pub current: Option<CurrentConditions>,
    pub forecast: Option<ForecastSummary>,
    pub history: Option<HistoryRecord>,
}

/// Everything the client knows about one station. Produced by `connect` and updated only by
/// the refresh operations it is handed to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientState {
    pub station: StationMeta,
    pub data: WeatherData,
}

impl ClientState {
    pub fn new(station: StationMeta) -> Self {
        Self {
            station,
            data: WeatherData::default(),
        }
    }
}
