//! Client for the member directory (the people API).
//!
//! Person documents are kept whole inside [`MemberRecord`] so that a write-back
//! sends every field the directory returned, not just the ones this service
//! reads.

use async_trait::async_trait;
use membermap_shared::models::{AddressKey, SimplePerson};
use reqwest::header::ACCEPT;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

const SEARCH_FAILED: &str = "The search request could not be completed.";
const LOAD_FAILED: &str = "The person structure could not be loaded";
const UPDATE_FAILED: &str = "The person could not be updated";
const CREATE_FAILED: &str = "The person could not be created";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("API Error: {message}")]
    Transport {
        message: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("API Error: {0}")]
    Rejected(String),
    #[error("API Error: unexpected response from the directory: {0}")]
    Malformed(String),
}

/// How a record came to exist, which decides what saving it means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// Blank template; saving creates a new person.
    New,
    /// Loaded for editing; saving updates the existing person.
    Edit,
    /// Projection from a search page; read-only.
    FromSearch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl RawAddress {
    pub fn key(&self) -> AddressKey {
        AddressKey::from_parts(&self.street, &self.city, &self.state, &self.postal_code)
    }

    fn from_document(doc: &Value) -> Self {
        RawAddress {
            street: text_field(doc, "address1"),
            city: text_field(doc, "city"),
            state: text_field(doc, "stProvince"),
            postal_code: text_field(doc, "postalCode"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberRecord {
    pub mode: RecordMode,
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub addresses: Vec<RawAddress>,
    document: Value,
}

impl MemberRecord {
    /// Build a record from a directory person document (the object under `person`).
    pub fn from_document(mode: RecordMode, document: Value) -> Result<Self, DirectoryError> {
        if !document.is_object() {
            return Err(DirectoryError::Malformed(format!(
                "expected a person object, got {}",
                document
            )));
        }
        let addresses = document["addresses"]["address"]
            .as_array()
            .map(|list| list.iter().map(RawAddress::from_document).collect())
            .unwrap_or_default();

        Ok(MemberRecord {
            mode,
            id: text_field(&document, "@id"),
            first_name: text_field(&document, "firstName"),
            last_name: text_field(&document, "lastName"),
            addresses,
            document,
        })
    }

    pub fn simple_person(&self) -> SimplePerson {
        SimplePerson {
            id: self.id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }

    pub fn set_name(&mut self, first_name: &str, last_name: &str) {
        self.first_name = first_name.to_string();
        self.last_name = last_name.to_string();
        self.document["firstName"] = Value::String(first_name.to_string());
        self.document["lastName"] = Value::String(last_name.to_string());
    }

    /// Request body for a create or update.
    pub fn to_request_body(&self) -> Value {
        json!({ "person": self.document })
    }
}

/// Reads a string-ish field. Numbers are rendered, anything else is empty.
fn text_field(doc: &Value, name: &str) -> String {
    match &doc[name] {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn take_pointer(body: &mut Value, pointer: &str) -> Value {
    body.pointer_mut(pointer).map(Value::take).unwrap_or(Value::Null)
}

/// One page of search results.
#[derive(Debug, Clone)]
pub struct MemberPage {
    pub members: Vec<MemberRecord>,
    /// Records returned by the directory, before any local filtering.
    pub api_count: usize,
}

#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn search_active_members_with_addresses(
        &self,
        page_size: u32,
        page: u32,
    ) -> Result<MemberPage, DirectoryError>;

    async fn get_editable_member(&self, id: &str) -> Result<MemberRecord, DirectoryError>;

    async fn new_member_template(&self) -> Result<MemberRecord, DirectoryError>;

    async fn save_member(&self, member: MemberRecord) -> Result<MemberRecord, DirectoryError>;
}

/// Directory access token obtained from the authorization handshake.
#[derive(Clone)]
pub struct Credential {
    access_token: String,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Credential {
            access_token: access_token.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

pub struct HttpDirectoryClient {
    client: reqwest::Client,
    base_url: String,
    credential: Credential,
}

impl HttpDirectoryClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, credential: Credential) -> Self {
        HttpDirectoryClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        message: &'static str,
    ) -> Result<Value, DirectoryError> {
        let transport = |source| DirectoryError::Transport { message, source };
        self.client
            .get(url)
            .query(query)
            .bearer_auth(&self.credential.access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport)?
            .error_for_status()
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)
    }

    async fn load_person(&self, path: &str, mode: RecordMode) -> Result<MemberRecord, DirectoryError> {
        let mut body = self.get_json(&self.url(path), &[], LOAD_FAILED).await?;
        MemberRecord::from_document(mode, take_pointer(&mut body, "/person"))
    }

    async fn write_person(
        &self,
        request: reqwest::RequestBuilder,
        member: &MemberRecord,
        message: &'static str,
    ) -> Result<MemberRecord, DirectoryError> {
        let transport = |source| DirectoryError::Transport { message, source };
        let resp = request
            .bearer_auth(&self.credential.access_token)
            .header(ACCEPT, "application/json")
            .json(&member.to_request_body())
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), member_id = %member.id, "directory rejected person write");
            return Err(DirectoryError::Rejected(message.to_string()));
        }

        let mut body: Value = resp.json().await.map_err(transport)?;
        // A written person is editable again under its (possibly new) id
        MemberRecord::from_document(RecordMode::Edit, take_pointer(&mut body, "/person"))
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn search_active_members_with_addresses(
        &self,
        page_size: u32,
        page: u32,
    ) -> Result<MemberPage, DirectoryError> {
        let query = [
            ("status", "1".to_string()),
            ("include", "addresses".to_string()),
            ("includeInactive", "false".to_string()),
            ("includeDeceased", "false".to_string()),
            ("recordsPerPage", page_size.to_string()),
            ("page", page.to_string()),
        ];
        let mut body = self
            .get_json(&self.url("/v1/People/Search.json"), &query, SEARCH_FAILED)
            .await?;

        let people = match take_pointer(&mut body, "/results/person") {
            Value::Array(people) => people,
            Value::Null => Vec::new(),
            other => {
                return Err(DirectoryError::Malformed(format!(
                    "search results are not a list: {}",
                    other
                )))
            }
        };
        let members = people
            .into_iter()
            .map(|doc| MemberRecord::from_document(RecordMode::FromSearch, doc))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(page, page_size, api_count = members.len(), "directory search page loaded");
        Ok(MemberPage {
            api_count: members.len(),
            members,
        })
    }

    async fn get_editable_member(&self, id: &str) -> Result<MemberRecord, DirectoryError> {
        self.load_person(&format!("/v1/People/{}/Edit.json", id), RecordMode::Edit)
            .await
    }

    async fn new_member_template(&self) -> Result<MemberRecord, DirectoryError> {
        self.load_person("/v1/People/New.json", RecordMode::New).await
    }

    async fn save_member(&self, member: MemberRecord) -> Result<MemberRecord, DirectoryError> {
        match member.mode {
            RecordMode::New => {
                let request = self.client.post(self.url("/v1/People.json"));
                self.write_person(request, &member, CREATE_FAILED).await
            }
            RecordMode::Edit => {
                let request = self
                    .client
                    .put(self.url(&format!("/v1/People/{}.json", member.id)));
                self.write_person(request, &member, UPDATE_FAILED).await
            }
            RecordMode::FromSearch => Err(DirectoryError::Rejected(format!(
                "{}: search results are read-only, load the person for editing first",
                UPDATE_FAILED
            ))),
        }
    }
}
