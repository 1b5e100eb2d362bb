// Best-effort IP geolocation used to recenter the default viewport.
use crate::config::GeolocationConfig;
use crate::error::GeolocateError;
use crate::photo::GeoTag;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct LocationResponse {
    latitude: f64,
    longitude: f64,
}

impl LocationResponse {
    fn into_geotag(self) -> Result<GeoTag, GeolocateError> {
        let Self { latitude, longitude } = self;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeolocateError::OutOfRange { latitude, longitude });
        }
        Ok(GeoTag { latitude, longitude })
    }
}

#[derive(Debug, Clone)]
pub struct IpGeolocator {
    client: reqwest::Client,
    endpoint: String,
}

impl IpGeolocator {
    pub fn new(config: &GeolocationConfig) -> Result<Self, GeolocateError> {
        let client =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self { client, endpoint: config.endpoint.clone() })
    }

    pub async fn locate(&self) -> Result<GeoTag, GeolocateError> {
        debug!(endpoint = %self.endpoint, "looking up location by IP");
        let response: LocationResponse = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.into_geotag()
    }
}
