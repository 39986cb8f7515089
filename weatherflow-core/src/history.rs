//! Precipitation history built from one-sample-per-day range queries.
//!
//! Every window is evaluated relative to the day it is called on and re-fetched on every call.
//! Yesterday is the nearest day counted; today's partial total never is.

use chrono::{Datelike, Days, Local, NaiveDate, TimeZone};
use futures_util::future::join_all;
use log::{debug, info, warn};

use crate::{
    client::{ObservationResult, WeatherFlowClient, decode_observations, require_device},
    error::{Result, WeatherFlowError},
    model::{HistoryRecord, StationMeta},
    observation::DecodeError,
    units::mm_to_inch,
};

/// Seconds between `time_start` and `time_end` of a single-day query.
const DAY_QUERY_SPAN_SECS: i64 = 60;

/// Query bounds for `date` in Unix seconds: local 23:59:00 and one minute before it.
pub fn day_window(date: NaiveDate) -> Result<(i64, i64)> {
    let end = date
        .and_hms_opt(23, 59, 0)
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .ok_or_else(|| WeatherFlowError::InvalidDate(format!("{date} 23:59")))?
        .timestamp();

    Ok((end - DAY_QUERY_SPAN_SECS, end))
}

/// Days elapsed since "January 0" of `today`'s year, i.e. its ordinal.
///
/// Works on calendar dates, so a DST offset change between the two instants cannot shift it.
pub fn days_into_year(today: NaiveDate) -> u32 {
    let jan_0 = NaiveDate::from_ymd_opt(today.year(), 1, 1)
        .and_then(|jan_1| jan_1.pred_opt())
        .unwrap_or(today);
    (today - jan_0).num_days() as u32
}

/// Completed days of the current month before `today`.
pub fn days_into_month(today: NaiveDate) -> u32 {
    today.day() - 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventState {
    Accumulating,
    Ended,
}

/// Sum of the unbroken rainy run at the front of `daily_mm` (nearest day first).
fn event_total_mm(daily_mm: &[f64]) -> f64 {
    let mut state = EventState::Accumulating;
    let mut total = 0.0;

    for &mm in daily_mm {
        match state {
            EventState::Accumulating if mm == 0.0 => state = EventState::Ended,
            EventState::Accumulating => total += mm,
            EventState::Ended => {}
        }
    }

    total
}

/// One stage of [`WeatherFlowClient::refresh_history`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStep {
    Last7Days,
    Last14Days,
    Last28Days,
    YearToDate,
    MonthToDate,
    Event(u32),
}

impl HistoryStep {
    /// Stages in execution order.
    pub fn pipeline(event_window_days: u32) -> [HistoryStep; 6] {
        [
            HistoryStep::Last7Days,
            HistoryStep::Last14Days,
            HistoryStep::Last28Days,
            HistoryStep::YearToDate,
            HistoryStep::MonthToDate,
            HistoryStep::Event(event_window_days),
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            HistoryStep::Last7Days => "7 day precip",
            HistoryStep::Last14Days => "14 day precip",
            HistoryStep::Last28Days => "28 day precip",
            HistoryStep::YearToDate => "yearly precip",
            HistoryStep::MonthToDate => "monthly precip",
            HistoryStep::Event(_) => "precip event",
        }
    }

    fn assign(&self, record: &mut HistoryRecord, inches: f64) {
        let slot = match self {
            HistoryStep::Last7Days => &mut record.precip_last_7_days,
            HistoryStep::Last14Days => &mut record.precip_last_14_days,
            HistoryStep::Last28Days => &mut record.precip_last_28_days,
            HistoryStep::YearToDate => &mut record.precip_year,
            HistoryStep::MonthToDate => &mut record.precip_month,
            HistoryStep::Event(_) => &mut record.precip_event,
        };
        *slot = Some(inches);
    }
}

impl WeatherFlowClient {
    /// Decodes every sample the device reported between `start` and `end` (Unix seconds).
    pub async fn fetch_range(
        &self,
        device_id: u64,
        start: i64,
        end: i64,
    ) -> Result<Vec<ObservationResult>> {
        let body = self
            .get(
                "/observations/",
                vec![
                    ("device_id", device_id.to_string()),
                    ("time_start", start.to_string()),
                    ("time_end", end.to_string()),
                ],
            )
            .await?;

        decode_observations(body)
    }

    /// Last reading the device reported on `date`.
    ///
    /// Vendor and transport failures are errors; a row that cannot be decoded comes back as the
    /// inner `Err`.
    pub async fn fetch_day(
        &self,
        station: &StationMeta,
        date: NaiveDate,
    ) -> Result<ObservationResult> {
        let device_id = require_device(station)?;
        let (start, end) = day_window(date)?;
        debug!("Getting weather history for {date}, time_start = {start}, time_end = {end}");

        let rows = self.fetch_range(device_id, start, end).await?;
        Ok(rows.into_iter().next().unwrap_or(Err(DecodeError::MissingRow)))
    }

    /// Chosen daily rainfall (mm) for `today - 1 ..= today - days`, nearest day first.
    ///
    /// All days are fetched concurrently and all are awaited. The first failure in day order
    /// fails the window, including a day that decoded badly or reported no rain value at all.
    async fn daily_precip_mm(
        &self,
        station: &StationMeta,
        today: NaiveDate,
        days: u32,
    ) -> Result<Vec<f64>> {
        let fetches = (1..=days).map(move |back| async move {
            let date = today
                .checked_sub_days(Days::new(u64::from(back)))
                .ok_or_else(|| WeatherFlowError::InvalidDate(format!("{today} - {back} days")))?;
            let obs = self.fetch_day(station, date).await?;
            Ok::<_, WeatherFlowError>((date, obs))
        });

        join_all(fetches)
            .await
            .into_iter()
            .map(|fetched| -> Result<f64> {
                let (date, obs) = fetched?;
                let obs = obs.inspect_err(|err| warn!("Rain history for {date}: {err}"))?;
                let mm = obs
                    .daily_precip_mm()
                    .ok_or(WeatherFlowError::MissingPrecipitation { date })?;
                debug!(
                    "Rain for {date}: lclDayRainAccumFinal = {:?}, lclDayRainAccum = {:?}, using {mm} mm",
                    obs.lcl_day_rain_accum_final, obs.lcl_day_rain_accum
                );
                Ok(mm)
            })
            .collect()
    }

    async fn window_total(&self, station: &StationMeta, today: NaiveDate, days: u32) -> Result<f64> {
        let daily = self.daily_precip_mm(station, today, days).await?;
        Ok(mm_to_inch(daily.iter().sum()))
    }

    /// Rain (inches) over the `days_back` days before today.
    pub async fn accumulate(&self, station: &StationMeta, days_back: u32) -> Result<f64> {
        self.accumulate_from(station, Local::now().date_naive(), days_back)
            .await
    }

    /// Like [`Self::accumulate`], anchored at `today`. Summed in millimetres, converted once.
    pub async fn accumulate_from(
        &self,
        station: &StationMeta,
        today: NaiveDate,
        days_back: u32,
    ) -> Result<f64> {
        if days_back == 0 {
            return Err(WeatherFlowError::InvalidWindow);
        }
        self.window_total(station, today, days_back).await
    }

    /// Rain (inches) since the first of the month. Zero on the first, without any request.
    pub async fn month_to_date_from(&self, station: &StationMeta, today: NaiveDate) -> Result<f64> {
        self.window_total(station, today, days_into_month(today)).await
    }

    pub async fn year_to_date_from(&self, station: &StationMeta, today: NaiveDate) -> Result<f64> {
        self.window_total(station, today, days_into_year(today)).await
    }

    /// Rain (inches) of the wet spell leading up to today, looking back at most `days_back` days.
    pub async fn detect_event(&self, station: &StationMeta, days_back: u32) -> Result<f64> {
        self.detect_event_from(station, Local::now().date_naive(), days_back)
            .await
    }

    pub async fn detect_event_from(
        &self,
        station: &StationMeta,
        today: NaiveDate,
        days_back: u32,
    ) -> Result<f64> {
        if days_back == 0 {
            return Err(WeatherFlowError::InvalidWindow);
        }
        let daily = self.daily_precip_mm(station, today, days_back).await?;
        Ok(mm_to_inch(event_total_mm(&daily)))
    }

    pub async fn refresh_history(&self, station: &StationMeta) -> Result<HistoryRecord> {
        self.refresh_history_from(station, Local::now().date_naive())
            .await
    }

    /// Runs every [`HistoryStep`] one after another. The first failing step aborts the rest.
    pub async fn refresh_history_from(
        &self,
        station: &StationMeta,
        today: NaiveDate,
    ) -> Result<HistoryRecord> {
        let mut record = HistoryRecord::default();

        for step in HistoryStep::pipeline(self.event_window_days()) {
            let inches = match step {
                HistoryStep::Last7Days => self.accumulate_from(station, today, 7).await,
                HistoryStep::Last14Days => self.accumulate_from(station, today, 14).await,
                HistoryStep::Last28Days => self.accumulate_from(station, today, 28).await,
                HistoryStep::YearToDate => self.year_to_date_from(station, today).await,
                HistoryStep::MonthToDate => self.month_to_date_from(station, today).await,
                HistoryStep::Event(days) => self.detect_event_from(station, today, days).await,
            }
            .inspect_err(|err| warn!("Error getting {}: {err}", step.label()))?;

            info!("Setting {} {inches}", step.label());
            step.assign(&mut record, inches);
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Config,
        testing::{FakeTransport, rain_day, st_body, vendor_failure},
    };
    use serde_json::json;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn station() -> StationMeta {
        StationMeta {
            public_name: "Backyard".into(),
            station_id: 100,
            latitude: 41.5,
            longitude: -88.1,
            device_id: Some(2000),
        }
    }

    fn client(fake: FakeTransport) -> (WeatherFlowClient, Arc<FakeTransport>) {
        let fake = Arc::new(fake);
        let mut cfg = Config::default();
        cfg.set_api_key("TOKEN".into());
        let client = WeatherFlowClient::with_transport(&cfg, fake.clone()).expect("configured");
        (client, fake)
    }

    /// Registers `daily_mm[i]` as the final value for `today - (i + 1)`.
    fn with_days(today: NaiveDate, daily_mm: &[f64]) -> FakeTransport {
        daily_mm
            .iter()
            .enumerate()
            .fold(FakeTransport::default(), |fake, (i, mm)| {
                fake.with_day(today - Days::new(i as u64 + 1), rain_day(*mm))
            })
    }

    #[test]
    fn day_window_is_the_last_minute_before_2359() {
        let (start, end) = day_window(date(2024, 3, 5)).expect("valid day");

        assert_eq!(end - start, 60);
        let local_end = Local.timestamp_opt(end, 0).single().expect("unambiguous");
        assert_eq!(local_end.date_naive(), date(2024, 3, 5));
        assert_eq!(local_end.format("%H:%M:%S").to_string(), "23:59:00");
    }

    #[test]
    fn days_into_year_counts_from_january_zero() {
        assert_eq!(days_into_year(date(2024, 1, 1)), 1);
        assert_eq!(days_into_year(date(2024, 3, 1)), 61);
        assert_eq!(days_into_year(date(2023, 12, 31)), 365);
        assert_eq!(days_into_year(date(2024, 12, 31)), 366);
    }

    #[test]
    fn days_into_month_excludes_today() {
        assert_eq!(days_into_month(date(2024, 3, 1)), 0);
        assert_eq!(days_into_month(date(2024, 3, 15)), 14);
    }

    #[test]
    fn event_stops_at_first_dry_day() {
        assert_eq!(event_total_mm(&[2.0, 3.0, 0.0, 7.0]), 5.0);
        assert_eq!(event_total_mm(&[0.0, 3.0, 4.0]), 0.0);
        assert_eq!(event_total_mm(&[1.0, 1.0, 1.0]), 3.0);
        assert_eq!(event_total_mm(&[]), 0.0);
    }

    #[tokio::test]
    async fn accumulate_sums_in_mm_before_converting() {
        let today = date(2024, 6, 15);
        let (client, fake) = client(with_days(today, &[1.27; 7]));

        let inches = client
            .accumulate_from(&station(), today, 7)
            .await
            .expect("all days succeed");

        assert_eq!(inches, 0.35);
        assert_eq!(fake.requests().len(), 7);
    }

    #[tokio::test]
    async fn accumulate_skips_today_and_queries_each_prior_day() {
        let today = date(2024, 6, 15);
        let (client, fake) = client(with_days(today, &[1.0, 2.0, 3.0]));

        client
            .accumulate_from(&station(), today, 3)
            .await
            .expect("all days succeed");

        let today_end = day_window(today).expect("valid day").1.to_string();
        let ends: Vec<String> = fake
            .requests()
            .into_iter()
            .filter_map(|(_, q)| q.into_iter().find(|(k, _)| k == "time_end").map(|(_, v)| v))
            .collect();

        assert_eq!(ends.len(), 3);
        assert!(!ends.contains(&today_end));
        for back in 1..=3 {
            let end = day_window(today - Days::new(back)).expect("valid day").1;
            assert!(ends.contains(&end.to_string()), "day -{back} not queried");
        }
    }

    #[tokio::test]
    async fn provisional_value_is_used_only_without_final() {
        let today = date(2024, 6, 15);
        let fake = FakeTransport::default()
            .with_day(today - Days::new(1), st_body(None, Some(5.0)))
            .with_day(today - Days::new(2), st_body(Some(3.0), Some(5.0)));
        let (client, _) = client(fake);

        let inches = client
            .accumulate_from(&station(), today, 2)
            .await
            .expect("both days succeed");

        assert_eq!(inches, mm_to_inch(8.0));
    }

    #[tokio::test]
    async fn accumulate_grows_with_the_window() {
        let today = date(2024, 6, 15);
        let daily = [0.5, 0.0, 2.2, 1.1, 0.0, 3.3, 0.7, 4.0];
        let (client, _) = client(with_days(today, &daily));

        let mut previous = 0.0;
        for days in 1..=daily.len() as u32 {
            let inches = client
                .accumulate_from(&station(), today, days)
                .await
                .expect("all days succeed");
            assert!(inches >= previous, "{days} days gave {inches} < {previous}");
            previous = inches;
        }
    }

    #[tokio::test]
    async fn one_failed_day_fails_the_window_with_that_error() {
        let today = date(2024, 6, 15);
        let fake = with_days(today, &[1.27; 7])
            .with_day(today - Days::new(4), vendor_failure(3, "SERVER BUSY"));
        let (client, _) = client(fake);

        let err = client
            .accumulate_from(&station(), today, 7)
            .await
            .unwrap_err();

        match err {
            WeatherFlowError::VendorStatus { code, message } => {
                assert_eq!(code, 3);
                assert_eq!(message, "SERVER BUSY");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn undecodable_day_fails_the_window() {
        let today = date(2024, 6, 15);
        let fake = with_days(today, &[1.0, 1.0]).with_day(
            today - Days::new(2),
            json!({ "status": { "status_code": 0 }, "type": "obs_st", "obs": [[1, 2]] }),
        );
        let (client, _) = client(fake);

        let err = client
            .accumulate_from(&station(), today, 2)
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherFlowError::Decode(DecodeError::MalformedRow { .. })));
    }

    #[tokio::test]
    async fn day_without_any_rain_value_fails_the_window() {
        let today = date(2024, 6, 15);
        let fake = FakeTransport::default().with_day(today - Days::new(1), st_body(None, None));
        let (client, _) = client(fake);

        let err = client
            .accumulate_from(&station(), today, 1)
            .await
            .unwrap_err();

        assert!(
            matches!(err, WeatherFlowError::MissingPrecipitation { date: d } if d == date(2024, 6, 14))
        );
    }

    #[tokio::test]
    async fn empty_obs_is_a_missing_row() {
        let today = date(2024, 6, 15);
        let fake = FakeTransport::default().with_day(
            today - Days::new(1),
            json!({ "status": { "status_code": 0 }, "type": "obs_st", "obs": [] }),
        );
        let (client, _) = client(fake);

        let obs = client
            .fetch_day(&station(), today - Days::new(1))
            .await
            .expect("request succeeds");

        assert_eq!(obs, Err(DecodeError::MissingRow));
    }

    #[tokio::test]
    async fn fetch_day_without_device_fails_before_any_request() {
        let (client, fake) = client(FakeTransport::default());
        let mut station = station();
        station.device_id = None;

        let err = client
            .fetch_day(&station, date(2024, 6, 14))
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherFlowError::Configuration(_)));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn fetch_range_decodes_every_row() {
        let body = json!({
            "status": { "status_code": 0 },
            "type": "obs_sky",
            "obs": [
                [1596889800, 100, 0.1, 0, 0.5, 1.0, 1.5, 90, 3.4, 1, 10, 0.2, 0, 3, null, null, 1],
                [1596889860, 110, 0.1, 0, 0.5, 1.0, 1.5, 90, 3.4, 1, 10, 0.3, 0, 3, null, null, 1],
                "garbage"
            ]
        });
        let (client, _) = client(FakeTransport::default().with("/observations/@200", body));

        let rows = client.fetch_range(2000, 100, 200).await.expect("range");

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().map(|o| o.lux), Ok(Some(100.0)));
        assert_eq!(rows[1].as_ref().map(|o| o.epoch), Ok(1_596_889_860_000));
        assert!(rows[2].is_err());
    }

    #[tokio::test]
    async fn unsupported_observation_type_fails_the_day() {
        let today = date(2024, 6, 15);
        let fake = FakeTransport::default().with_day(
            today - Days::new(1),
            json!({ "status": { "status_code": 0 }, "type": "obs_air", "obs": [[1]] }),
        );
        let (client, _) = client(fake);

        let err = client
            .fetch_day(&station(), today - Days::new(1))
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherFlowError::UnsupportedObservationType(_)));
    }

    #[tokio::test]
    async fn event_ignores_rain_older_than_the_first_dry_day() {
        let today = date(2024, 6, 15);
        let (client, _) = client(with_days(today, &[2.0, 3.0, 0.0, 7.0]));

        let inches = client
            .detect_event_from(&station(), today, 4)
            .await
            .expect("all days succeed");

        assert_eq!(inches, 0.2);
    }

    #[tokio::test]
    async fn zero_day_windows_are_rejected() {
        let (client, fake) = client(FakeTransport::default());
        let today = date(2024, 6, 15);

        assert!(matches!(
            client.accumulate_from(&station(), today, 0).await,
            Err(WeatherFlowError::InvalidWindow)
        ));
        assert!(matches!(
            client.detect_event_from(&station(), today, 0).await,
            Err(WeatherFlowError::InvalidWindow)
        ));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn month_to_date_on_the_first_needs_no_requests() {
        let (client, fake) = client(FakeTransport::default());

        let inches = client
            .month_to_date_from(&station(), date(2024, 6, 1))
            .await
            .expect("empty window");

        assert_eq!(inches, 0.0);
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn refresh_history_fills_every_field() {
        let today = date(2024, 1, 3);
        // Three days back covers Jan 2, Jan 1 and Dec 31; 28 covers the rest.
        let mut daily = vec![2.54; 28];
        daily[2] = 0.0;
        let (client, fake) = client(with_days(today, &daily));

        let record = client
            .refresh_history_from(&station(), today)
            .await
            .expect("history");

        assert_eq!(record.precip_last_7_days, Some(mm_to_inch(2.54 * 6.0)));
        assert_eq!(record.precip_last_14_days, Some(mm_to_inch(2.54 * 13.0)));
        assert_eq!(record.precip_last_28_days, Some(mm_to_inch(2.54 * 27.0)));
        assert_eq!(record.precip_year, Some(mm_to_inch(2.54 * 2.0)));
        assert_eq!(record.precip_month, Some(mm_to_inch(2.54 * 2.0)));
        assert_eq!(record.precip_event, Some(mm_to_inch(2.54 * 2.0)));

        // 7 + 14 + 28 + year (3) + month (2) + event (7)
        assert_eq!(fake.requests().len(), 61);
    }

    #[tokio::test]
    async fn refresh_history_stops_at_first_failing_step() {
        let today = date(2024, 6, 15);
        // Only 7 days are served, so the 14 day step is the first to fail.
        let (client, fake) = client(with_days(today, &[1.0; 7]));

        let err = client
            .refresh_history_from(&station(), today)
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherFlowError::InvalidResponse { .. }));
        assert_eq!(fake.requests().len(), 7 + 14);
    }

    #[test]
    fn pipeline_order_is_fixed() {
        let labels: Vec<&str> = HistoryStep::pipeline(7).iter().map(|s| s.label()).collect();
        assert_eq!(
            labels,
            [
                "7 day precip",
                "14 day precip",
                "28 day precip",
                "yearly precip",
                "monthly precip",
                "precip event"
            ]
        );
    }
}
