//! The JSON envelope spoken between the service endpoint and the browser.
//!
//! Every response carries `status` ("OK" or "ERROR"), `data` and `dataCount`.
//! On error `data` is the human-readable message and `dataCount` is zero. Paged
//! responses additionally carry `page` and `apiCount`.

use indexmap::IndexMap;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::{AddressGroup, AddressKey, SimplePerson};

pub const OP_GET_ADDRESSES: &str = "getAddresses";
pub const OP_UPDATE_PERSON_NAME: &str = "updatePersonName";

pub const MSG_INVALID_PAGE: &str = "Invalid value for parameter: page";
pub const MSG_INVALID_ID: &str = "Missing or invalid parameter: id";
pub const MSG_MISSING_NAME: &str = "Missing parameters: name";
pub const MSG_NAME_TOO_SHORT: &str =
    "The name could not be updated. Make sure the name contains at least a first and last name.";
pub const MSG_INVALID_OPERATION: &str = "The specified operation is invalid.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

/// Pagination metadata attached to `getAddresses` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u32,
    /// Records the directory returned before local filtering. Zero means there are no more pages.
    pub api_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResponse<T> {
    Ok {
        data: T,
        data_count: usize,
        paging: Option<Paging>,
    },
    Error {
        message: String,
    },
}

impl<T> ServiceResponse<T> {
    pub fn ok(data: T, data_count: usize) -> Self {
        ServiceResponse::Ok {
            data,
            data_count,
            paging: None,
        }
    }

    pub fn paged(data: T, data_count: usize, page: u32, api_count: usize) -> Self {
        ServiceResponse::Ok {
            data,
            data_count,
            paging: Some(Paging { page, api_count }),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServiceResponse::Error {
            message: message.into(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            ServiceResponse::Ok { .. } => Status::Ok,
            ServiceResponse::Error { .. } => Status::Error,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeOut<'a, T: Serialize> {
    status: Status,
    data: EnvelopeData<'a, T>,
    data_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_count: Option<usize>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EnvelopeData<'a, T: Serialize> {
    Data(&'a T),
    Message(&'a str),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeIn {
    status: Status,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    data_count: usize,
    page: Option<u32>,
    api_count: Option<usize>,
}

impl<T: Serialize> Serialize for ServiceResponse<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let out = match self {
            ServiceResponse::Ok {
                data,
                data_count,
                paging,
            } => EnvelopeOut {
                status: Status::Ok,
                data: EnvelopeData::Data(data),
                data_count: *data_count,
                page: paging.map(|p| p.page),
                api_count: paging.map(|p| p.api_count),
            },
            ServiceResponse::Error { message } => EnvelopeOut {
                status: Status::Error,
                data: EnvelopeData::Message(message),
                data_count: 0,
                page: None,
                api_count: None,
            },
        };
        out.serialize(serializer)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for ServiceResponse<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = EnvelopeIn::deserialize(deserializer)?;
        match raw.status {
            Status::Error => {
                let message = match raw.data {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                Ok(ServiceResponse::Error { message })
            }
            Status::Ok => {
                let data = serde_json::from_value(raw.data).map_err(de::Error::custom)?;
                let paging = match (raw.page, raw.api_count) {
                    (Some(page), Some(api_count)) => Some(Paging { page, api_count }),
                    _ => None,
                };
                Ok(ServiceResponse::Ok {
                    data,
                    data_count: raw.data_count,
                    paging,
                })
            }
        }
    }
}

/// Address groups keyed by [`AddressKey`], kept in the order they were first seen.
///
/// Serializes as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressGroups(IndexMap<AddressKey, AddressGroup>);

impl AddressGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &AddressKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &AddressKey) -> Option<&AddressGroup> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &AddressKey) -> Option<&mut AddressGroup> {
        self.0.get_mut(key)
    }

    /// Insert a group. An existing key keeps its position and has its group replaced.
    pub fn insert(&mut self, key: AddressKey, group: AddressGroup) {
        self.0.insert(key, group);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AddressKey, &AddressGroup)> {
        self.0.iter()
    }
}

impl IntoIterator for AddressGroups {
    type Item = (AddressKey, AddressGroup);
    type IntoIter = indexmap::map::IntoIter<AddressKey, AddressGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(AddressKey, AddressGroup)> for AddressGroups {
    fn from_iter<I: IntoIterator<Item = (AddressKey, AddressGroup)>>(iter: I) -> Self {
        AddressGroups(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressesData {
    pub addresses: AddressGroups,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonData {
    pub person: SimplePerson,
}

pub type AddressesResponse = ServiceResponse<AddressesData>;
pub type PersonResponse = ServiceResponse<PersonData>;
