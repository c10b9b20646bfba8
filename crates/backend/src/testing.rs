//! In-memory stand-ins for the external collaborators, with call counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use membermap_shared::models::Coordinates;
use serde_json::{json, Value};

use crate::directory::{DirectoryClient, DirectoryError, MemberPage, MemberRecord, RecordMode};
use crate::geocode::{GeocodeError, Geocoder};

enum Answer {
    Found(Option<Coordinates>),
    Fail,
}

/// Geocoder answering from a table. Unknown addresses are not found.
pub struct FakeGeocoder {
    answers: Mutex<HashMap<String, Answer>>,
    calls: AtomicUsize,
}

impl FakeGeocoder {
    pub fn new() -> Self {
        FakeGeocoder {
            answers: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn respond(&self, address: &str, location: Option<Coordinates>) {
        self.answers
            .lock()
            .unwrap()
            .insert(address.to_string(), Answer::Found(location));
    }

    pub fn fail(&self, address: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(address.to_string(), Answer::Fail);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answers.lock().unwrap().get(address) {
            Some(Answer::Found(location)) => Ok(*location),
            Some(Answer::Fail) => Err(GeocodeError::Status("UNKNOWN_ERROR".to_string())),
            None => Ok(None),
        }
    }
}

/// Build a directory person document with one entry per address.
pub fn person_doc(id: &str, first: &str, last: &str, addresses: &[[&str; 4]]) -> Value {
    let addresses: Vec<Value> = addresses
        .iter()
        .map(|[street, city, state, zip]| {
            json!({ "address1": street, "city": city, "stProvince": state, "postalCode": zip })
        })
        .collect();
    json!({
        "@id": id,
        "firstName": first,
        "lastName": last,
        "addresses": { "address": addresses }
    })
}

/// Directory serving fixed pages and an editable person store.
pub struct FakeDirectory {
    pages: Mutex<HashMap<u32, Vec<Value>>>,
    people: Mutex<HashMap<String, Value>>,
    search_down: Mutex<bool>,
    reject_saves: Mutex<Option<String>>,
    pub searches: AtomicUsize,
    pub loads: AtomicUsize,
    pub saves: AtomicUsize,
}

impl FakeDirectory {
    pub fn new() -> Self {
        FakeDirectory {
            pages: Mutex::new(HashMap::new()),
            people: Mutex::new(HashMap::new()),
            search_down: Mutex::new(false),
            reject_saves: Mutex::new(None),
            searches: AtomicUsize::new(0),
            loads: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn with_page(self, page: u32, people: Vec<Value>) -> Self {
        for doc in &people {
            if let Some(id) = doc["@id"].as_str() {
                self.people
                    .lock()
                    .unwrap()
                    .insert(id.to_string(), doc.clone());
            }
        }
        self.pages.lock().unwrap().insert(page, people);
        self
    }

    pub fn search_unavailable(self) -> Self {
        *self.search_down.lock().unwrap() = true;
        self
    }

    pub fn rejecting_saves(self, message: &str) -> Self {
        *self.reject_saves.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn stored(&self, id: &str) -> Option<Value> {
        self.people.lock().unwrap().get(id).cloned()
    }

    pub fn remote_calls(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
            + self.loads.load(Ordering::SeqCst)
            + self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn search_active_members_with_addresses(
        &self,
        _page_size: u32,
        page: u32,
    ) -> Result<MemberPage, DirectoryError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if *self.search_down.lock().unwrap() {
            return Err(DirectoryError::Malformed("directory offline".to_string()));
        }
        let docs = self
            .pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_default();
        let members = docs
            .into_iter()
            .map(|doc| MemberRecord::from_document(RecordMode::FromSearch, doc))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MemberPage {
            api_count: members.len(),
            members,
        })
    }

    async fn get_editable_member(&self, id: &str) -> Result<MemberRecord, DirectoryError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let doc = self
            .stored(id)
            .ok_or_else(|| DirectoryError::Rejected(format!("person {} not found", id)))?;
        MemberRecord::from_document(RecordMode::Edit, doc)
    }

    async fn new_member_template(&self) -> Result<MemberRecord, DirectoryError> {
        MemberRecord::from_document(RecordMode::New, person_doc("", "", "", &[]))
    }

    async fn save_member(&self, member: MemberRecord) -> Result<MemberRecord, DirectoryError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.reject_saves.lock().unwrap().clone() {
            return Err(DirectoryError::Rejected(message));
        }
        let body = member.to_request_body();
        self.people
            .lock()
            .unwrap()
            .insert(member.id.clone(), body["person"].clone());
        MemberRecord::from_document(RecordMode::Edit, body["person"].clone())
    }
}
