use serde::{Deserialize, Serialize};

/// Separator placed between address components when building an [`AddressKey`].
pub const ADDRESS_SEPARATOR: &str = ", ";

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// The (0, 0) marker stored for addresses known to be unresolvable.
    pub const UNRESOLVABLE: Coordinates = Coordinates { lat: 0.0, lng: 0.0 };

    pub fn new(lat: f64, lng: f64) -> Self {
        Coordinates { lat, lng }
    }

    pub fn is_unresolvable(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

/// The projection of a directory member that is sent to the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplePerson {
    #[serde(rename = "@id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
}

impl SimplePerson {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Identifies one physical address, exactly as the directory spelled it.
///
/// Components are joined verbatim: no case folding, whitespace trimming or
/// abbreviation expansion happens, so differently formatted spellings of the
/// same place are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressKey(String);

impl AddressKey {
    /// Build a key from street, city, state/province and postal code, in that order.
    pub fn from_parts(street: &str, city: &str, state: &str, postal_code: &str) -> Self {
        AddressKey([street, city, state, postal_code].join(ADDRESS_SEPARATOR))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AddressKey {
    fn from(s: String) -> Self {
        AddressKey(s)
    }
}

impl From<&str> for AddressKey {
    fn from(s: &str) -> Self {
        AddressKey(s.to_string())
    }
}

impl std::fmt::Display for AddressKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everyone living at one geocoded address within a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressGroup {
    pub location: Coordinates,
    pub people: Vec<SimplePerson>,
}
