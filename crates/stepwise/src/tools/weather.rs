use std::time::Duration;

use reqwest::{Client, Url};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use stepwise_core::tool::{Approval, Tool, ToolResult};

/// The weather service queried by default.
pub const DEFAULT_WEATHER_URL: &str = "https://wttr.in";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// A place to get the weather for.
#[derive(Deserialize, JsonSchema)]
#[schemars(description = "The city or place name, e.g. `New York`.")]
pub struct Location(pub String);

/// Looks up the current weather with a text weather service.
///
/// Failures are reported in the output text, including the HTTP status
/// when the service answered with an error.
pub struct GetWeatherTool {
    parameter_schema: Value,
    client: Client,
    base_url: String,
}

impl GetWeatherTool {
    /// Creates a tool that queries [`DEFAULT_WEATHER_URL`].
    #[inline]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_WEATHER_URL)
    }

    /// Creates a tool that queries a custom service with the same API.
    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            parameter_schema: schema_for!(Location).to_value(),
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for GetWeatherTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for GetWeatherTool {
    type Input = Location;

    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a given location."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn make_approval(&self, _input: &Location) -> Option<Approval> {
        None
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: Location,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let url = weather_url(&self.base_url, &input.0);
        async move {
            let location = input.0;
            let url = match url {
                Ok(url) => url,
                Err(reason) => {
                    return Ok(format!("Failed to get weather data: {reason}"));
                }
            };
            trace!("fetching weather from {url}");

            let resp = match client
                .get(url)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    return Ok(format!("Failed to get weather data: {err}"));
                }
            };

            let status = resp.status();
            if !status.is_success() {
                debug!("weather service returned {status}");
                return Ok(format!(
                    "Failed to get weather data: {}",
                    status.as_u16()
                ));
            }
            Ok(match resp.text().await {
                Ok(body) => format!(
                    "The current weather in {location} is {}",
                    body.trim()
                ),
                Err(err) => format!("Failed to get weather data: {err}"),
            })
        }
    }
}

fn weather_url(base_url: &str, location: &str) -> Result<Url, String> {
    let mut url = Url::parse(base_url).map_err(|err| err.to_string())?;
    url.path_segments_mut()
        .map_err(|_| format!("invalid base URL `{base_url}`"))?
        .pop_if_empty()
        .push(location);
    url.set_query(Some("format=%C+%t"));
    Ok(url)
}
