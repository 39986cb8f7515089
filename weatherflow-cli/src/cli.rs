use anyhow::{Context, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use inquire::Password;
use weatherflow_core::{
    ClientState, Config, CurrentConditions, ForecastSummary, HistoryRecord, WeatherFlowClient,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherflow", version, about = "WeatherFlow Tempest station CLI")]
pub struct Cli {
    /// Log every request and per-day rain value.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the personal use token used for every request.
    Configure,

    /// Show the station and device the token resolves to.
    Station,

    /// Show current conditions.
    Current,

    /// Show today's forecast.
    Forecast,

    /// Show 7/14/28 day, month, year and wet spell precipitation.
    History,

    /// Show the last reading of one past day.
    Day {
        /// Local date, YYYY-MM-DD.
        #[arg(long)]
        date: String,
    },

    /// Show rain of the current wet spell.
    Event {
        /// How many days back to look; defaults to the configured window.
        #[arg(long)]
        days: Option<u32>,
    },

    /// Refresh history, current conditions and forecast.
    All {
        /// Print the full state as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure => configure(&mut config)?,
            Command::Station => {
                let (_, state) = connect(&config).await?;
                print_station(&state);
            }
            Command::Current => {
                let (client, state) = connect(&config).await?;
                print_current(&client.current(&state.station).await?);
            }
            Command::Forecast => {
                let (client, state) = connect(&config).await?;
                print_forecast(&client.forecast(&state.station).await?);
            }
            Command::History => {
                let (client, state) = connect(&config).await?;
                print_history(&client.refresh_history(&state.station).await?);
            }
            Command::Day { date } => {
                let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .with_context(|| format!("Invalid date '{date}', expected YYYY-MM-DD"))?;
                if date >= Local::now().date_naive() {
                    bail!("{date} is not a past day");
                }
                let (client, state) = connect(&config).await?;
                let obs = client.fetch_day(&state.station, date).await??;
                println!("{}", serde_json::to_string_pretty(&obs)?);
            }
            Command::Event { days } => {
                let (client, state) = connect(&config).await?;
                let days = days.unwrap_or_else(|| client.event_window_days());
                let inches = client.detect_event(&state.station, days).await?;
                println!("Wet spell rain (last {days} days): {inches:.2} in");
            }
            Command::All { json } => {
                let (client, mut state) = connect(&config).await?;
                client.refresh_all(&mut state).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&state)?);
                } else {
                    print_station(&state);
                    if let Some(current) = &state.data.current {
                        print_current(current);
                    }
                    if let Some(forecast) = &state.data.forecast {
                        print_forecast(forecast);
                    }
                    if let Some(history) = &state.data.history {
                        print_history(history);
                    }
                }
            }
        }

        Ok(())
    }
}

fn configure(config: &mut Config) -> anyhow::Result<()> {
    let api_key = Password::new("Personal use token:")
        .without_confirmation()
        .prompt()
        .context("Failed to read token")?;

    config.set_api_key(api_key);
    config.save()?;
    println!("Saved to {}", Config::config_file_path()?.display());

    Ok(())
}

fn client_for(config: &Config) -> anyhow::Result<WeatherFlowClient> {
    if !config.is_configured() {
        bail!("No API key configured. Run `weatherflow configure` first.");
    }

    Ok(WeatherFlowClient::new(config)?)
}

async fn connect(config: &Config) -> anyhow::Result<(WeatherFlowClient, ClientState)> {
    let client = client_for(config)?;
    let state = client.connect().await?;
    Ok((client, state))
}

fn show(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v} {unit}"))
}

fn print_station(state: &ClientState) {
    let station = &state.station;
    println!("Station: {} (#{})", station.public_name, station.station_id);
    println!("  Location: {}, {}", station.latitude, station.longitude);
    match station.device_id {
        Some(id) => println!("  Device:   {id}"),
        None => println!("  Device:   none"),
    }
}

fn print_current(current: &CurrentConditions) {
    let observed = current
        .observed_at
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("Current conditions ({observed}):");
    println!("  Temperature: {}", show(current.temp_f, "°F"));
    println!("  Feels like:  {}", show(current.feels_like_f, "°F"));
    println!("  Humidity:    {}", show(current.humidity_pct, "%"));
    println!(
        "  Wind:        {} gusting {} from {}",
        show(current.wind_mph, "mph"),
        show(current.wind_gust_mph, "mph"),
        show(current.wind_direction, "°")
    );
    println!("  Pressure:    {}", show(current.pressure_inhg, "inHg"));
    println!("  Rain today:  {}", show(current.precip_today_in, "in"));
    if let Some(miles) = current.last_strike_miles {
        println!("  Last strike: {miles} mi");
    }
}

fn print_forecast(forecast: &ForecastSummary) {
    println!("Forecast (today):");
    println!(
        "  High / low:  {} / {}",
        show(forecast.max_temp_f, "°F"),
        show(forecast.min_temp_f, "°F")
    );
    println!("  Max wind:    {}", show(forecast.max_wind_mph, "mph"));
    println!("  Rain:        {}", show(forecast.total_precip_in, "in"));
    println!("  Rain chance: {}", show(forecast.precip_chance_pct, "%"));
}

fn print_history(history: &HistoryRecord) {
    println!("Rain history:");
    println!("  Last 7 days:  {}", show(history.precip_last_7_days, "in"));
    println!("  Last 14 days: {}", show(history.precip_last_14_days, "in"));
    println!("  Last 28 days: {}", show(history.precip_last_28_days, "in"));
    println!("  This month:   {}", show(history.precip_month, "in"));
    println!("  This year:    {}", show(history.precip_year, "in"));
    println!("  Wet spell:    {}", show(history.precip_event, "in"));
}
