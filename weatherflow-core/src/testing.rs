//! In-memory transport for unit tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::{collections::HashMap, sync::Mutex};

use crate::{
    error::{Result, WeatherFlowError},
    history::day_window,
    transport::Transport,
};

pub(crate) type Request = (String, Vec<(String, String)>);

/// Serves canned bodies keyed by path, or by `path@time_end` for range queries.
#[derive(Debug, Default)]
pub(crate) struct FakeTransport {
    responses: HashMap<String, Value>,
    requests: Mutex<Vec<Request>>,
}

impl FakeTransport {
    pub(crate) fn with(mut self, key: &str, body: Value) -> Self {
        self.responses.insert(key.to_string(), body);
        self
    }

    /// Registers the history response for one local day.
    pub(crate) fn with_day(self, date: NaiveDate, body: Value) -> Self {
        let (_, end) = day_window(date).expect("test dates exist in local time");
        self.with(&format!("/observations/@{end}"), body)
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let query: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        let key = match query.iter().find(|(k, _)| k == "time_end") {
            Some((_, end)) => format!("{path}@{end}"),
            None => path.to_string(),
        };

        self.requests
            .lock()
            .expect("requests lock")
            .push((path.to_string(), query));

        self.responses
            .get(&key)
            .cloned()
            .ok_or_else(|| WeatherFlowError::InvalidResponse {
                endpoint: key,
                message: "no canned response".to_string(),
            })
    }
}

/// A successful `obs_st` body whose local-day rain fields are set as given.
pub(crate) fn st_body(lcl_day_final: Option<f64>, lcl_day: Option<f64>) -> Value {
    json!({
        "status": { "status_code": 0, "status_message": "SUCCESS" },
        "device_id": 2000,
        "type": "obs_st",
        "obs": [[
            1596889860, 0.67, 1.23, 1.79, 141, 3, 1002.5, 20.9, 88, 15688, 0.62, 131, 0, 0, 0, 0,
            2.6, 1, lcl_day, null, lcl_day_final, 1
        ]]
    })
}

/// A history body with the final daily value set, in millimetres.
pub(crate) fn rain_day(mm: f64) -> Value {
    st_body(Some(mm), Some(mm))
}

pub(crate) fn vendor_failure(code: i64, message: &str) -> Value {
    json!({ "status": { "status_code": code, "status_message": message } })
}
