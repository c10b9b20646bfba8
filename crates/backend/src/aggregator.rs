use std::sync::Arc;

use membermap_shared::models::AddressGroup;
use membermap_shared::protocol::AddressGroups;
use tracing::{debug, info, warn};

use crate::directory::{DirectoryClient, DirectoryError, MemberPage};
use crate::geocode::GeocodeResolver;

/// Address groups built from one directory page.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub groups: AddressGroups,
    pub page: u32,
    /// Records the directory returned, before addresses were filtered.
    pub api_count: usize,
}

impl PageResult {
    pub fn data_count(&self) -> usize {
        self.groups.len()
    }
}

/// Turns a page of directory members into geocoded address groups.
pub struct AddressAggregator {
    directory: Arc<dyn DirectoryClient>,
    resolver: GeocodeResolver,
}

impl AddressAggregator {
    pub fn new(directory: Arc<dyn DirectoryClient>, resolver: GeocodeResolver) -> Self {
        AddressAggregator {
            directory,
            resolver,
        }
    }

    /// Addresses are resolved one at a time, in directory order. Only a
    /// directory failure fails the page; an address that cannot be resolved
    /// is left out.
    pub async fn run_page(&self, page: u32, page_size: u32) -> Result<PageResult, DirectoryError> {
        let MemberPage { members, api_count } = self
            .directory
            .search_active_members_with_addresses(page_size, page)
            .await?;

        let mut groups = AddressGroups::new();
        for member in &members {
            let person = member.simple_person();

            for address in &member.addresses {
                let key = address.key();

                if let Some(group) = groups.get_mut(&key) {
                    group.people.push(person.clone());
                    continue;
                }

                match self.resolver.resolve(&key).await {
                    Ok(Some(location)) => groups.insert(
                        key,
                        AddressGroup {
                            location,
                            people: vec![person.clone()],
                        },
                    ),
                    Ok(None) => {
                        debug!(address = %key, member_id = %person.id, "address could not be geocoded, skipping");
                    }
                    Err(e) => {
                        warn!(address = %key, member_id = %person.id, error = %e, "geocoding failed, skipping address");
                    }
                }
            }
        }

        info!(page, api_count, groups = groups.len(), "address page aggregated");
        Ok(PageResult {
            groups,
            page,
            api_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::GeocodeCache;
    use crate::testing::{person_doc, FakeDirectory, FakeGeocoder};
    use membermap_shared::models::{AddressKey, Coordinates};

    const MAIN_ST: [&str; 4] = ["1 Main St", "Austin", "TX", "78701"];
    const ELM_ST: [&str; 4] = ["9 Elm St", "Dallas", "TX", "75201"];
    const TEXAS: [&str; 4] = ["", "", "TX", ""];

    struct Fixture {
        _dir: tempfile::TempDir,
        cache: Arc<GeocodeCache>,
        geocoder: Arc<FakeGeocoder>,
        aggregator: AddressAggregator,
    }

    fn fixture(directory: FakeDirectory) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let cache = GeocodeCache::open(&dir.path().join("geocode.redb")).unwrap();
        let geocoder = Arc::new(FakeGeocoder::new());
        geocoder.respond("1 Main St, Austin, TX, 78701", Some(Coordinates::new(30.0, -97.0)));
        geocoder.respond("9 Elm St, Dallas, TX, 75201", Some(Coordinates::new(32.8, -96.8)));
        geocoder.respond(", , TX, ", None);
        let resolver = GeocodeResolver::new(cache.clone(), geocoder.clone());
        Fixture {
            _dir: dir,
            cache,
            geocoder,
            aggregator: AddressAggregator::new(Arc::new(directory), resolver),
        }
    }

    fn key(parts: [&str; 4]) -> AddressKey {
        AddressKey::from_parts(parts[0], parts[1], parts[2], parts[3])
    }

    #[tokio::test]
    async fn test_members_sharing_an_address_form_one_group() {
        let directory = FakeDirectory::new().with_page(
            1,
            vec![
                person_doc("1", "Ada", "Lovelace", &[MAIN_ST]),
                person_doc("2", "Charles", "Babbage", &[MAIN_ST]),
            ],
        );
        let f = fixture(directory);

        let result = f.aggregator.run_page(1, 200).await.unwrap();

        assert_eq!(result.api_count, 2);
        assert_eq!(result.data_count(), 1);
        let group = result.groups.get(&key(MAIN_ST)).unwrap();
        let ids: Vec<&str> = group.people.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(f.geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_groups_follow_directory_order() {
        let directory = FakeDirectory::new().with_page(
            1,
            vec![
                person_doc("1", "Ada", "Lovelace", &[ELM_ST]),
                person_doc("2", "Charles", "Babbage", &[MAIN_ST, ELM_ST]),
            ],
        );
        let f = fixture(directory);

        let result = f.aggregator.run_page(1, 200).await.unwrap();

        let keys: Vec<AddressKey> = result.groups.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![key(ELM_ST), key(MAIN_ST)]);
        assert_eq!(result.groups.get(&key(ELM_ST)).unwrap().people.len(), 2);
    }

    #[tokio::test]
    async fn test_same_member_listing_address_twice_is_not_deduplicated() {
        let directory = FakeDirectory::new()
            .with_page(1, vec![person_doc("1", "Ada", "Lovelace", &[MAIN_ST, MAIN_ST])]);
        let f = fixture(directory);

        let result = f.aggregator.run_page(1, 200).await.unwrap();

        assert_eq!(result.groups.get(&key(MAIN_ST)).unwrap().people.len(), 2);
    }

    #[tokio::test]
    async fn test_imprecise_address_is_dropped_and_negatively_cached() {
        let directory = FakeDirectory::new().with_page(
            1,
            vec![
                person_doc("1", "Ada", "Lovelace", &[TEXAS, MAIN_ST]),
                person_doc("2", "Charles", "Babbage", &[TEXAS]),
            ],
        );
        let f = fixture(directory);

        let result = f.aggregator.run_page(1, 200).await.unwrap();

        assert_eq!(result.data_count(), 1);
        assert!(!result.groups.contains_key(&key(TEXAS)));
        // Ada still appears through her other address
        assert_eq!(result.groups.get(&key(MAIN_ST)).unwrap().people[0].id, "1");
        assert!(f.cache.get(&key(TEXAS)).unwrap().unwrap().is_unresolvable());
        // Second sighting of the unresolvable address is answered by the cache
        assert_eq!(f.geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn test_geocoder_failure_only_skips_that_address() {
        let directory = FakeDirectory::new().with_page(
            1,
            vec![
                person_doc("1", "Ada", "Lovelace", &[ELM_ST]),
                person_doc("2", "Charles", "Babbage", &[MAIN_ST]),
            ],
        );
        let f = fixture(directory);
        f.geocoder.fail("9 Elm St, Dallas, TX, 75201");

        let result = f.aggregator.run_page(1, 200).await.unwrap();

        assert_eq!(result.data_count(), 1);
        assert!(result.groups.contains_key(&key(MAIN_ST)));
        assert_eq!(f.cache.get(&key(ELM_ST)).unwrap(), None);
    }

    #[tokio::test]
    async fn test_directory_failure_fails_the_page() {
        let f = fixture(FakeDirectory::new().search_unavailable());
        assert!(f.aggregator.run_page(1, 200).await.is_err());
        assert_eq!(f.geocoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_page_past_the_end_reports_zero_api_count() {
        let directory = FakeDirectory::new()
            .with_page(1, vec![person_doc("1", "Ada", "Lovelace", &[MAIN_ST])]);
        let f = fixture(directory);

        let result = f.aggregator.run_page(2, 200).await.unwrap();

        assert_eq!(result.api_count, 0);
        assert_eq!(result.data_count(), 0);
        assert_eq!(result.page, 2);
    }

    #[tokio::test]
    async fn test_members_without_addresses_still_count() {
        let directory = FakeDirectory::new().with_page(
            1,
            vec![
                person_doc("1", "Ada", "Lovelace", &[]),
                person_doc("2", "Charles", "Babbage", &[]),
            ],
        );
        let f = fixture(directory);

        let result = f.aggregator.run_page(1, 200).await.unwrap();

        assert_eq!(result.api_count, 2);
        assert_eq!(result.data_count(), 0);
    }
}
