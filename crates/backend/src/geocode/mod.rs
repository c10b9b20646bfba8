use std::sync::Arc;

use async_trait::async_trait;
use membermap_shared::models::{AddressKey, Coordinates};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::storage::{CacheError, GeocodeCache};

/// Location types precise enough to place a marker. Anything coarser
/// (GEOGRAPHIC_CENTER and friends) is treated as not found.
pub const ACCEPTED_LOCATION_TYPES: [&str; 3] = ["ROOFTOP", "RANGE_INTERPOLATED", "APPROXIMATE"];

/// Failures that leave an address unresolved for now. None of these are cached.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Geocode request was not able to complete: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Geocode was not completed successfully (status {0})")]
    Status(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// An external geocoding service.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a free-text address. `Ok(None)` means the service answered but
    /// had no sufficiently precise location.
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Coordinates,
    location_type: String,
}

/// Apply the status and precision policy to a decoded geocoder response.
fn interpret(response: GeocodeResponse) -> Result<Option<Coordinates>, GeocodeError> {
    if response.status != "OK" {
        return Err(GeocodeError::Status(response.status));
    }
    // Only the best candidate is considered
    Ok(response.results.into_iter().next().and_then(|result| {
        let precise = ACCEPTED_LOCATION_TYPES.contains(&result.geometry.location_type.as_str());
        precise.then_some(result.geometry.location)
    }))
}

/// Geocoder speaking the Google Maps geocoding JSON API.
pub struct GoogleGeocoder {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl GoogleGeocoder {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        GoogleGeocoder {
            client,
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let address = address.replace(',', "");
        let mut query = vec![("address", address.as_str())];
        if let Some(key) = &self.api_key {
            query.push(("key", key.as_str()));
        }

        let response: GeocodeResponse = self
            .client
            .get(&self.url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        interpret(response)
    }
}

/// Resolves addresses through the permanent cache, falling back to the geocoder.
#[derive(Clone)]
pub struct GeocodeResolver {
    cache: Arc<GeocodeCache>,
    geocoder: Arc<dyn Geocoder>,
}

impl GeocodeResolver {
    pub fn new(cache: Arc<GeocodeCache>, geocoder: Arc<dyn Geocoder>) -> Self {
        GeocodeResolver { cache, geocoder }
    }

    /// `Ok(None)` is a permanent answer: the address has been recorded as
    /// unresolvable and will never be sent to the geocoder again. Errors are
    /// not recorded, so the next call tries again.
    pub async fn resolve(&self, key: &AddressKey) -> Result<Option<Coordinates>, GeocodeError> {
        if let Some(cached) = self.cache.get(key)? {
            if cached.is_unresolvable() {
                return Ok(None);
            }
            return Ok(Some(cached));
        }

        match self.geocoder.geocode(key.as_str()).await? {
            Some(location) => {
                self.cache.put(key, location)?;
                Ok(Some(location))
            }
            None => {
                debug!(address = %key, "address is not precise enough, caching as unresolvable");
                self.cache.put(key, Coordinates::UNRESOLVABLE)?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGeocoder;
    use httpmock::prelude::*;

    fn response(json: serde_json::Value) -> GeocodeResponse {
        serde_json::from_value(json).unwrap()
    }

    fn single_result(location_type: &str) -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "results": [{
                "geometry": {
                    "location": { "lat": 30.2672, "lng": -97.7431 },
                    "location_type": location_type
                }
            }]
        })
    }

    fn temp_resolver(geocoder: Arc<FakeGeocoder>) -> (tempfile::TempDir, Arc<GeocodeCache>, GeocodeResolver) {
        let dir = tempfile::tempdir().unwrap();
        let cache = GeocodeCache::open(&dir.path().join("geocode.redb")).unwrap();
        let resolver = GeocodeResolver::new(cache.clone(), geocoder);
        (dir, cache, resolver)
    }

    #[test]
    fn test_interpret_accepts_precise_types() {
        for location_type in ACCEPTED_LOCATION_TYPES {
            let result = interpret(response(single_result(location_type))).unwrap();
            assert_eq!(result, Some(Coordinates::new(30.2672, -97.7431)));
        }
    }

    #[test]
    fn test_interpret_rejects_geographic_center() {
        let result = interpret(response(single_result("GEOGRAPHIC_CENTER"))).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_interpret_only_considers_first_result() {
        let json = serde_json::json!({
            "status": "OK",
            "results": [
                { "geometry": { "location": { "lat": 1.0, "lng": 1.0 }, "location_type": "GEOGRAPHIC_CENTER" } },
                { "geometry": { "location": { "lat": 2.0, "lng": 2.0 }, "location_type": "ROOFTOP" } }
            ]
        });
        assert_eq!(interpret(response(json)).unwrap(), None);
    }

    #[test]
    fn test_interpret_non_ok_status_is_error() {
        let json = serde_json::json!({ "status": "OVER_QUERY_LIMIT", "results": [] });
        match interpret(response(json)) {
            Err(GeocodeError::Status(status)) => assert_eq!(status, "OVER_QUERY_LIMIT"),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[test]
    fn test_interpret_ok_without_results_is_not_found() {
        let json = serde_json::json!({ "status": "OK", "results": [] });
        assert_eq!(interpret(response(json)).unwrap(), None);
    }

    #[tokio::test]
    async fn test_google_geocoder_strips_commas() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/geocode/json")
                .query_param("address", "1 Main St Austin TX 78701")
                .query_param("key", "secret");
            then.status(200).json_body(single_result("ROOFTOP"));
        });

        let geocoder = GoogleGeocoder::new(
            reqwest::Client::new(),
            server.url("/geocode/json"),
            Some("secret".to_string()),
        );
        let result = geocoder.geocode("1 Main St, Austin, TX, 78701").await.unwrap();

        mock.assert();
        assert_eq!(result, Some(Coordinates::new(30.2672, -97.7431)));
    }

    #[tokio::test]
    async fn test_google_geocoder_http_failure_is_transport_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/geocode/json");
            then.status(500);
        });

        let geocoder = GoogleGeocoder::new(reqwest::Client::new(), server.url("/geocode/json"), None);
        let result = geocoder.geocode("1 Main St").await;
        assert!(matches!(result, Err(GeocodeError::Transport(_))));
    }

    #[tokio::test]
    async fn test_resolve_caches_positive_result() {
        let geocoder = Arc::new(FakeGeocoder::new());
        geocoder.respond("1 Main St, Austin, TX, 78701", Some(Coordinates::new(30.0, -97.0)));
        let (_dir, cache, resolver) = temp_resolver(geocoder.clone());
        let key = AddressKey::from("1 Main St, Austin, TX, 78701");

        assert_eq!(resolver.resolve(&key).await.unwrap(), Some(Coordinates::new(30.0, -97.0)));
        assert_eq!(resolver.resolve(&key).await.unwrap(), Some(Coordinates::new(30.0, -97.0)));

        assert_eq!(geocoder.calls(), 1);
        assert_eq!(cache.get(&key).unwrap(), Some(Coordinates::new(30.0, -97.0)));
    }

    #[tokio::test]
    async fn test_resolve_not_found_is_cached_permanently() {
        let geocoder = Arc::new(FakeGeocoder::new());
        geocoder.respond("Texas, , , ", None);
        let (_dir, cache, resolver) = temp_resolver(geocoder.clone());
        let key = AddressKey::from("Texas, , , ");

        assert_eq!(resolver.resolve(&key).await.unwrap(), None);
        assert!(cache.get(&key).unwrap().unwrap().is_unresolvable());

        // Even if the geocoder would now succeed, the negative entry wins
        geocoder.respond("Texas, , , ", Some(Coordinates::new(31.0, -99.0)));
        assert_eq!(resolver.resolve(&key).await.unwrap(), None);
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_transport_error_is_not_cached() {
        let geocoder = Arc::new(FakeGeocoder::new());
        geocoder.fail("1 Main St, Austin, TX, 78701");
        let (_dir, cache, resolver) = temp_resolver(geocoder.clone());
        let key = AddressKey::from("1 Main St, Austin, TX, 78701");

        assert!(resolver.resolve(&key).await.is_err());
        assert_eq!(cache.get(&key).unwrap(), None);

        geocoder.respond("1 Main St, Austin, TX, 78701", Some(Coordinates::new(30.0, -97.0)));
        assert_eq!(resolver.resolve(&key).await.unwrap(), Some(Coordinates::new(30.0, -97.0)));
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn test_resolve_preseeded_marker_skips_geocoder() {
        let geocoder = Arc::new(FakeGeocoder::new());
        let (_dir, cache, resolver) = temp_resolver(geocoder.clone());
        let key = AddressKey::from("PO Box 1, Austin, TX, 78701");
        cache.put(&key, Coordinates::UNRESOLVABLE).unwrap();

        assert_eq!(resolver.resolve(&key).await.unwrap(), None);
        assert_eq!(geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_imprecise_result_end_to_end() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/geocode/json");
            then.status(200).json_body(single_result("GEOGRAPHIC_CENTER"));
        });
        let dir = tempfile::tempdir().unwrap();
        let cache = GeocodeCache::open(&dir.path().join("geocode.redb")).unwrap();
        let geocoder = Arc::new(GoogleGeocoder::new(
            reqwest::Client::new(),
            server.url("/geocode/json"),
            None,
        ));
        let resolver = GeocodeResolver::new(cache.clone(), geocoder);
        let key = AddressKey::from("Texas, , , ");

        assert_eq!(resolver.resolve(&key).await.unwrap(), None);
        assert_eq!(resolver.resolve(&key).await.unwrap(), None);

        mock.assert_hits(1);
        assert!(cache.get(&key).unwrap().unwrap().is_unresolvable());
    }
}
