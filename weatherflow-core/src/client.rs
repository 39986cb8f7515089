use chrono::{DateTime, Datelike, Local, NaiveDate};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    Config,
    error::{Result, WeatherFlowError},
    model::{ClientState, CurrentConditions, ForecastSummary, StationMeta},
    observation::{DecodeError, NormalizedObservation, ObservationLayout, decode},
    transport::{HttpTransport, Transport, check_status},
    units::{celsius_to_fahrenheit, km_to_mile, millibar_to_inhg, mm_to_inch, mps_to_mph},
};

/// Outcome of decoding one row: the record, or the fault that kept it from being built.
pub type ObservationResult = Result<NormalizedObservation, DecodeError>;

/// Client for the WeatherFlow Smart Weather REST API.
///
/// Construction only validates configuration. Call [`WeatherFlowClient::connect`] to look up the
/// station before issuing observation requests.
#[derive(Debug, Clone)]
pub struct WeatherFlowClient {
    api_key: String,
    device_override: Option<u64>,
    event_window_days: u32,
    transport: Arc<dyn Transport>,
}

impl WeatherFlowClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Self::with_transport(config, Arc::new(HttpTransport::new(config.base_url())))?;
        Ok(client)
    }

    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            WeatherFlowError::Configuration(
                "No API key configured.\n\
                 Hint: run `weatherflow configure` and enter your personal use token."
                    .to_string(),
            )
        })?;

        Ok(Self {
            api_key: api_key.to_string(),
            device_override: config.device_id,
            event_window_days: config.event_window_days(),
            transport,
        })
    }

    pub fn event_window_days(&self) -> u32 {
        self.event_window_days
    }

    pub(crate) async fn get(&self, path: &str, mut query: Vec<(&str, String)>) -> Result<Value> {
        query.push(("api_key", self.api_key.clone()));
        self.transport.get_json(path, &query).await
    }

    /// Looks up the first station on the account and picks its device.
    pub async fn connect(&self) -> Result<ClientState> {
        let body = self.get("/stations", Vec::new()).await?;
        check_status(&body)?;

        let parsed: WfStationsResponse =
            serde_json::from_value(body).map_err(|err| invalid("/stations", err))?;

        let station = parsed.stations.into_iter().next().ok_or_else(|| {
            WeatherFlowError::InvalidResponse {
                endpoint: "/stations".to_string(),
                message: "no stations are registered for this API key".to_string(),
            }
        })?;

        let meta = station_meta(station, self.device_override);
        match meta.device_id {
            Some(id) => info!("Connected to station '{}', device {id}", meta.public_name),
            None => warn!(
                "Station '{}' has no Tempest or Sky device; observation calls will fail",
                meta.public_name
            ),
        }

        Ok(ClientState::new(meta))
    }

    /// Latest observation for the station's device, converted to imperial units.
    pub async fn current(&self, station: &StationMeta) -> Result<CurrentConditions> {
        let device_id = require_device(station)?;
        let body = self
            .get("/observations/", vec![("device_id", device_id.to_string())])
            .await?;

        let obs = decode_observations(body)?
            .into_iter()
            .next()
            .unwrap_or(Err(DecodeError::MissingRow))?;
        debug!("Current observation: {obs:?}");

        Ok(current_conditions(&obs))
    }

    /// Today's forecast for the station's coordinates.
    pub async fn forecast(&self, station: &StationMeta) -> Result<ForecastSummary> {
        self.forecast_for(station, Local::now().date_naive()).await
    }

    pub async fn forecast_for(
        &self,
        station: &StationMeta,
        today: NaiveDate,
    ) -> Result<ForecastSummary> {
        require_device(station)?;
        let body = self
            .get(
                "/better_forecast",
                vec![
                    ("lat", station.latitude.to_string()),
                    ("lon", station.longitude.to_string()),
                ],
            )
            .await?;
        check_status(&body)?;

        let parsed: WfForecastResponse =
            serde_json::from_value(body).map_err(|err| invalid("/better_forecast", err))?;

        Ok(forecast_summary(&parsed.forecast, today))
    }

    /// Refreshes history, then current conditions, then the forecast, storing each as it lands.
    pub async fn refresh_all(&self, state: &mut ClientState) -> Result<()> {
        state.data.history = Some(self.refresh_history(&state.station).await?);
        state.data.current = Some(self.current(&state.station).await?);
        state.data.forecast = Some(self.forecast(&state.station).await?);
        Ok(())
    }
}

pub(crate) fn require_device(station: &StationMeta) -> Result<u64> {
    station.device_id.ok_or_else(|| {
        WeatherFlowError::Configuration(format!(
            "deviceID not set for station {}",
            station.station_id
        ))
    })
}

/// Checks the vendor status, picks the layout from `type` and decodes every row.
pub(crate) fn decode_observations(body: Value) -> Result<Vec<ObservationResult>> {
    check_status(&body)?;

    let kind = body.get("type").and_then(Value::as_str).unwrap_or_default();
    let layout = ObservationLayout::from_type(kind)
        .ok_or_else(|| WeatherFlowError::UnsupportedObservationType(kind.to_string()))?;

    let summary = body.get("summary");
    let rows: &[Value] = match body.get("obs") {
        Some(Value::Array(rows)) => rows.as_slice(),
        _ => &[],
    };

    let decoded = rows
        .iter()
        .map(|row| {
            let obs = decode(row, layout, summary);
            if let Err(err) = &obs {
                warn!("Failed to decode {layout} row: {err}");
            }
            obs
        })
        .collect();

    Ok(decoded)
}

fn invalid(endpoint: &str, err: serde_json::Error) -> WeatherFlowError {
    WeatherFlowError::InvalidResponse {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct WfDevice {
    device_id: u64,
    device_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WfStation {
    station_id: u64,
    name: Option<String>,
    public_name: Option<String>,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    devices: Vec<WfDevice>,
}

#[derive(Debug, Deserialize)]
struct WfStationsResponse {
    #[serde(default)]
    stations: Vec<WfStation>,
}

fn station_meta(station: WfStation, device_override: Option<u64>) -> StationMeta {
    let pick = |wanted: &str| {
        station
            .devices
            .iter()
            .find(|d| d.device_type.as_deref() == Some(wanted))
    };

    let device_id = device_override.or_else(|| {
        pick("ST")
            .or_else(|| pick("SKY"))
            .map(|device| device.device_id)
    });

    StationMeta {
        public_name: station
            .public_name
            .or(station.name)
            .unwrap_or_else(|| format!("Station {}", station.station_id)),
        station_id: station.station_id,
        latitude: station.latitude,
        longitude: station.longitude,
        device_id,
    }
}

fn current_conditions(obs: &NormalizedObservation) -> CurrentConditions {
    let summary = obs.summary.as_ref();

    CurrentConditions {
        observed_at: DateTime::from_timestamp_millis(obs.epoch),
        temp_f: obs.air_temp.map(celsius_to_fahrenheit),
        feels_like_f: summary.and_then(|s| s.feels_like).map(celsius_to_fahrenheit),
        wind_mph: obs.wind.avg.map(mps_to_mph),
        wind_gust_mph: obs.wind.gust.map(mps_to_mph),
        wind_direction: obs.wind.direction,
        pressure_inhg: obs.pressure.map(millibar_to_inhg),
        precip_today_in: obs.lcl_day_rain_accum.map(mm_to_inch),
        humidity_pct: obs.humidity,
        last_strike_miles: summary.and_then(|s| s.strike_last_dist).map(km_to_mile),
    }
}

#[derive(Debug, Deserialize)]
struct WfForecastDay {
    air_temp_high: Option<f64>,
    air_temp_low: Option<f64>,
    precip_probability: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WfForecastHour {
    local_day: u32,
    wind_avg: Option<f64>,
    precip: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WfForecast {
    #[serde(default)]
    daily: Vec<WfForecastDay>,
    #[serde(default)]
    hourly: Vec<WfForecastHour>,
}

#[derive(Debug, Deserialize)]
struct WfForecastResponse {
    forecast: WfForecast,
}

fn forecast_summary(forecast: &WfForecast, today: NaiveDate) -> ForecastSummary {
    let day = forecast.daily.first();
    let hours = forecast.hourly.iter().filter(|h| h.local_day == today.day());

    let (max_wind, total_precip) = hours.fold((0.0_f64, 0.0_f64), |(wind, precip), h| {
        (
            wind.max(h.wind_avg.unwrap_or(0.0)),
            precip + h.precip.unwrap_or(0.0),
        )
    });

    ForecastSummary {
        max_temp_f: day.and_then(|d| d.air_temp_high).map(celsius_to_fahrenheit),
        min_temp_f: day.and_then(|d| d.air_temp_low).map(celsius_to_fahrenheit),
        max_wind_mph: Some(mps_to_mph(max_wind)),
        total_precip_in: Some(mm_to_inch(total_precip)),
        precip_chance_pct: day.and_then(|d| d.precip_probability),
    }
}
