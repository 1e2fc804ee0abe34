use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use weather_core::{Config, Unit, WeatherRecord, WeatherRequest, provider_from_config};
use weather_server::{AppState, SubscriptionRegistry, create_router};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-server", version, about = "Seniverse weather over Server-Sent Events")]
pub struct Cli {
    /// Defaults to `serve`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server.
    Serve {
        /// Overrides HOST and the config file.
        #[arg(long)]
        host: Option<String>,

        /// Overrides PORT and the config file.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Fetch current weather once and print it.
    Current {
        /// Location name, e.g. "beijing".
        location: String,

        #[arg(long)]
        language: Option<String>,

        /// "c" or "f".
        #[arg(long)]
        unit: Option<Unit>,
    },

    /// Store the Seniverse API key in the config file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command.unwrap_or(Command::Serve { host: None, port: None }) {
            Command::Serve { host, port } => serve(host, port).await,
            Command::Current { location, language, unit } => {
                current(location, language, unit).await
            }
            Command::Configure => configure(),
        }
    }
}

async fn serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let provider = provider_from_config(&config.seniverse)
        .context("Cannot start the server without a Seniverse API key")?;
    let state = AppState::new(provider, &config.seniverse);
    let subscriptions = state.subscriptions.clone();
    let app = create_router(state);

    let addr = config.bind_addr();
    let listener =
        TcpListener::bind(&addr).await.with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        %addr,
        base_url = %config.seniverse.base_url,
        language = %config.seniverse.default_language,
        unit = %config.seniverse.default_unit,
        "Starting weather server"
    );
    info!(
        "Open http://{}:{} in your browser",
        display_host(&config.server.host),
        config.server.port
    );

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(subscriptions)).await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn current(
    location: String,
    language: Option<String>,
    unit: Option<Unit>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let provider = provider_from_config(&config.seniverse)?;

    let request = WeatherRequest::new(location)
        .with_language(language.unwrap_or_else(|| config.seniverse.default_language.clone()))
        .with_unit(unit.unwrap_or(config.seniverse.default_unit));

    let record = provider.fetch_current_weather(&request).await?;
    println!("{}", render(&record));
    Ok(())
}

fn configure() -> anyhow::Result<()> {
    let api_key = inquire::Password::new("Seniverse API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let mut config = Config::load_file()?;
    config.set_api_key(api_key.trim().to_string());
    config.seniverse.require_api_key()?;
    config.save()?;

    println!("Saved API key to {}", Config::config_file_path()?.display());
    Ok(())
}

fn render(record: &WeatherRecord) -> String {
    let unit = match record.unit {
        Unit::C => "°C",
        Unit::F => "°F",
    };
    let mut out = format!(
        "{} ({}): {}{} {}",
        record.location_name, record.location, record.temperature, unit, record.condition
    );
    if let Some(humidity) = record.humidity {
        out.push_str(&format!(", humidity {humidity}%"));
    }
    if let Some(wind) = &record.wind {
        out.push_str(&format!(", wind {wind}"));
    }
    out.push_str(&format!("\nobserved at {}", record.observed_at.to_rfc3339()));
    out
}

fn display_host(host: &str) -> &str {
    if host == "0.0.0.0" { "localhost" } else { host }
}

/// Waits for Ctrl+C or SIGTERM, then ends open streams so connections can drain.
async fn shutdown_signal(subscriptions: SubscriptionRegistry) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }

    info!(open = subscriptions.len(), "Closing subscriptions");
    subscriptions.close_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::parse_from(["weather-server"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_current_with_unit() {
        let cli = Cli::parse_from(["weather-server", "current", "beijing", "--unit", "f"]);
        match cli.command {
            Some(Command::Current { location, unit, .. }) => {
                assert_eq!(location, "beijing");
                assert_eq!(unit, Some(Unit::F));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(Cli::try_parse_from(["weather-server", "current", "x", "--unit", "k"]).is_err());
    }

    #[test]
    fn render_includes_optional_fields() {
        let record = WeatherRecord {
            location: "beijing".into(),
            location_name: "北京".into(),
            temperature: 28.0,
            condition: "晴".into(),
            humidity: Some(40.0),
            wind: Some("西北".into()),
            wind_speed: None,
            wind_scale: None,
            feels_like: None,
            unit: Unit::C,
            observed_at: Utc.with_ymd_and_hms(2024, 1, 15, 4, 0, 0).unwrap(),
        };
        let text = render(&record);
        assert!(text.starts_with("北京 (beijing): 28°C 晴"));
        assert!(text.contains("humidity 40%"));
        assert!(text.contains("wind 西北"));
        assert!(text.contains("2024-01-15T04:00:00+00:00"));
    }

    #[test]
    fn wildcard_host_displays_as_localhost() {
        assert_eq!(display_host("0.0.0.0"), "localhost");
        assert_eq!(display_host("127.0.0.1"), "127.0.0.1");
    }
}
