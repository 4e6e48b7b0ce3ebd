//! Google Maps geocoding.

use std::time::Duration;

use eventsync_core::Coordinates;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::calendar::BoxFuture;
use crate::geocode::{GeoPoint, GeoResolver, GeocodeError, GeocodeResult};

/// Default host of the geocoding API.
pub const DEFAULT_GEOCODING_DOMAIN: &str = "maps.googleapis.com";

const SERVICE_NAME: &str = "Google Maps";

/// Resolves addresses through the Google Maps geocoding API.
#[derive(Debug)]
pub struct GoogleGeocoder {
    http_client: reqwest::Client,
    domain: String,
    api_key: Option<String>,
}

impl GoogleGeocoder {
    /// Creates a geocoder for the given API host.
    pub fn new(domain: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("eventsync/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            domain: domain.into(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn request_url(&self, address: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("https://{}/maps/api/geocode/json", self.domain))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("address", address);
            if let Some(key) = &self.api_key {
                query.append_pair("key", key);
            }
        }
        Ok(url)
    }

    /// Looks up one address.
    pub async fn resolve(&self, address: &str) -> GeocodeResult<GeoPoint> {
        let url = self
            .request_url(address)
            .map_err(|e| GeocodeError::service(SERVICE_NAME, address, format!("bad URL: {}", e)))?;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| GeocodeError::service(SERVICE_NAME, address, e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GeocodeError::service(SERVICE_NAME, address, e.to_string()))?;

        if !status.is_success() {
            return Err(GeocodeError::service(
                SERVICE_NAME,
                address,
                format!("HTTP {}", status),
            ));
        }

        let point = interpret_response(SERVICE_NAME, address, &body)?;
        debug!(address, resolved = %point.address, "geocoded address");
        Ok(point)
    }
}

impl GeoResolver for GoogleGeocoder {
    fn service_name(&self) -> &str {
        SERVICE_NAME
    }

    fn resolve<'a>(&'a self, address: &'a str) -> BoxFuture<'a, GeocodeResult<GeoPoint>> {
        Box::pin(GoogleGeocoder::resolve(self, address))
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeMatch>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeMatch {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Reads a geocoding API response body.
///
/// Exactly one match resolves. Zero matches is `NotFound`; several matches are
/// ambiguous and reported as a service failure.
fn interpret_response(service: &str, address: &str, body: &str) -> GeocodeResult<GeoPoint> {
    let response: GeocodeResponse = serde_json::from_str(body).map_err(|e| {
        GeocodeError::service(service, address, format!("invalid response: {}", e))
    })?;

    match response.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => return Err(GeocodeError::not_found(service, address)),
        other => {
            let message = match response.error_message {
                Some(detail) => format!("{}: {}", other, detail),
                None => other.to_string(),
            };
            return Err(GeocodeError::service(service, address, message));
        }
    }

    let mut results = response.results;
    match results.len() {
        0 => Err(GeocodeError::not_found(service, address)),
        1 => {
            let found = results.remove(0);
            let coordinates =
                Coordinates::new(found.geometry.location.lat, found.geometry.location.lng)
                    .map_err(|e| GeocodeError::service(service, address, e.to_string()))?;
            Ok(GeoPoint {
                address: found.formatted_address,
                coordinates,
            })
        }
        n => Err(GeocodeError::service(
            service,
            address,
            format!("ambiguous address, {} matches", n),
        )),
    }
}
