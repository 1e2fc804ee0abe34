use thiserror::Error;

/// Failures of the weather client and its configuration.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Missing or unusable configuration (e.g. no API key).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The provider could not be reached, timed out, or answered with a non-success status.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// The provider answered, but the body lacks the expected fields.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl WeatherError {
    /// Stable error code exposed to HTTP callers.
    pub fn code(&self) -> &'static str {
        match self {
            WeatherError::Config(_) => "ConfigError",
            WeatherError::Upstream(_) => "UpstreamError",
            WeatherError::Parse(_) => "ParseError",
        }
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WeatherError::Upstream(format!("request timed out: {err}"))
        } else if err.is_decode() {
            WeatherError::Parse(err.to_string())
        } else {
            WeatherError::Upstream(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(WeatherError::Config("x".into()).code(), "ConfigError");
        assert_eq!(WeatherError::Upstream("x".into()).code(), "UpstreamError");
        assert_eq!(WeatherError::Parse("x".into()).code(), "ParseError");
    }

    #[test]
    fn display_includes_detail() {
        let err = WeatherError::Upstream("HTTP 403".into());
        assert_eq!(err.to_string(), "Upstream error: HTTP 403");
    }
}
