//! Browser-side map state: page loading, the marker registry, info windows and
//! inline name editing. Everything here is plain data so it can be driven and
//! tested without a browser.

use std::collections::HashMap;

use membermap_shared::models::{AddressKey, Coordinates, SimplePerson};
use membermap_shared::protocol::{AddressGroups, AddressesResponse, ServiceResponse};

pub const STATUS_STARTING: &str = "Loading member addresses...";
pub const STATUS_COMPLETE: &str = "Loading Complete.";

/// Where the page-loading sequence stands.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadPhase {
    Idle,
    /// A request for this page is in flight.
    Loading(u32),
    /// The response for this page is being merged.
    Merging(u32),
    Complete,
    /// Terminal until the page is reloaded.
    Failed(String),
}

/// Text shown when a request never produced a service response.
pub fn transport_failure_message(detail: &str) -> String {
    format!(
        "An error occured while processing the request ({}). Please refresh and try again.",
        detail
    )
}

/// Inline edit state of one person entry. Entries without one are being viewed.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryEdit {
    Editing { draft: String },
    Saving { draft: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientMarker {
    pub key: AddressKey,
    pub position: Coordinates,
    pub people: Vec<SimplePerson>,
    edits: HashMap<usize, EntryEdit>,
}

impl ClientMarker {
    fn new(key: AddressKey, position: Coordinates, people: Vec<SimplePerson>) -> Self {
        ClientMarker {
            key,
            position,
            people,
            edits: HashMap::new(),
        }
    }

    /// Markers are titled with their address.
    pub fn title(&self) -> &str {
        self.key.as_str()
    }

    pub fn edit_state(&self, index: usize) -> Option<&EntryEdit> {
        self.edits.get(&index)
    }
}

/// A name change that has been sent to the service and awaits its answer.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    pub key: AddressKey,
    pub index: usize,
    pub person_id: String,
    pub name: String,
}

/// One marker per address for the life of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerRegistry {
    markers: Vec<ClientMarker>,
    index: HashMap<AddressKey, usize>,
    open_windows: Vec<AddressKey>,
}

impl MarkerRegistry {
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn get(&self, key: &AddressKey) -> Option<&ClientMarker> {
        self.index.get(key).map(|&i| &self.markers[i])
    }

    fn get_mut(&mut self, key: &AddressKey) -> Option<&mut ClientMarker> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.markers[i]),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientMarker> {
        self.markers.iter()
    }

    /// Merge one page of groups: unseen addresses get a marker, known ones
    /// have the page's people appended. Returns how many markers were created.
    pub fn merge(&mut self, groups: AddressGroups) -> usize {
        let mut created = 0;
        for (key, group) in groups {
            match self.get_mut(&key) {
                Some(marker) => marker.people.extend(group.people),
                None => {
                    self.index.insert(key.clone(), self.markers.len());
                    self.markers
                        .push(ClientMarker::new(key, group.location, group.people));
                    created += 1;
                }
            }
        }
        created
    }

    /// Open a marker's info window, closing every other one first.
    pub fn open_info_window(&mut self, key: &AddressKey) -> bool {
        if !self.index.contains_key(key) {
            return false;
        }
        self.close_all_info_windows();
        self.open_windows.push(key.clone());
        true
    }

    pub fn close_info_window(&mut self, key: &AddressKey) {
        self.open_windows.retain(|open| open != key);
    }

    pub fn close_all_info_windows(&mut self) {
        self.open_windows.clear();
    }

    pub fn open_info_windows(&self) -> &[AddressKey] {
        &self.open_windows
    }

    /// Swap an entry into edit mode, pre-filled with the current name.
    pub fn begin_edit(&mut self, key: &AddressKey, index: usize) -> Option<String> {
        let marker = self.get_mut(key)?;
        let person = marker.people.get(index)?;
        if matches!(marker.edits.get(&index), Some(EntryEdit::Saving { .. })) {
            return None;
        }
        let draft = person.display_name();
        marker.edits.insert(
            index,
            EntryEdit::Editing {
                draft: draft.clone(),
            },
        );
        Some(draft)
    }

    pub fn update_draft(&mut self, key: &AddressKey, index: usize, text: &str) {
        if let Some(EntryEdit::Editing { draft }) =
            self.get_mut(key).and_then(|m| m.edits.get_mut(&index))
        {
            *draft = text.to_string();
        }
    }

    /// Drop the edit without sending anything.
    pub fn cancel_edit(&mut self, key: &AddressKey, index: usize) {
        if let Some(marker) = self.get_mut(key) {
            if let Some(EntryEdit::Editing { .. }) = marker.edits.get(&index) {
                marker.edits.remove(&index);
            }
        }
    }

    /// Move an entry from editing to saving and describe the request to send.
    pub fn begin_save(&mut self, key: &AddressKey, index: usize) -> Option<PendingSave> {
        let marker = self.get_mut(key)?;
        let person_id = marker.people.get(index)?.id.clone();
        let draft = match marker.edits.get(&index) {
            Some(EntryEdit::Editing { draft }) => draft.clone(),
            _ => return None,
        };
        marker.edits.insert(
            index,
            EntryEdit::Saving {
                draft: draft.clone(),
            },
        );
        Some(PendingSave {
            key: key.clone(),
            index,
            person_id,
            name: draft,
        })
    }

    /// Apply the service's answer and return the entry to viewing. On success
    /// the person at that index is replaced; on failure it is left as it was
    /// and the message is returned for display.
    pub fn finish_save(
        &mut self,
        pending: &PendingSave,
        outcome: Result<SimplePerson, String>,
    ) -> Option<String> {
        let marker = self.get_mut(&pending.key)?;
        marker.edits.remove(&pending.index);
        match outcome {
            Ok(person) => {
                if let Some(slot) = marker.people.get_mut(pending.index) {
                    *slot = person;
                }
                None
            }
            Err(message) => Some(message),
        }
    }
}

/// Drives the page sequence and owns the marker registry.
///
/// Requests are strictly serial: the next page is only handed out by
/// [`ClientMapState::on_page`] after the current page has been merged.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMapState {
    phase: LoadPhase,
    registry: MarkerRegistry,
    loaded: usize,
}

impl Default for ClientMapState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientMapState {
    pub fn new() -> Self {
        ClientMapState {
            phase: LoadPhase::Idle,
            registry: MarkerRegistry::default(),
            loaded: 0,
        }
    }

    pub fn phase(&self) -> &LoadPhase {
        &self.phase
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MarkerRegistry {
        &mut self.registry
    }

    /// Total address groups received so far.
    pub fn loaded(&self) -> usize {
        self.loaded
    }

    /// Begin loading. Returns the first page to request, or `None` if the
    /// sequence has already started.
    pub fn start(&mut self) -> Option<u32> {
        match self.phase {
            LoadPhase::Idle => {
                self.phase = LoadPhase::Loading(1);
                Some(1)
            }
            _ => None,
        }
    }

    /// Feed the outcome of the in-flight page request. `Err` carries the
    /// transport failure detail. Returns the next page to request, if any.
    pub fn on_page(&mut self, outcome: Result<AddressesResponse, String>) -> Option<u32> {
        let LoadPhase::Loading(page) = self.phase else {
            return None;
        };

        let (data, data_count, paging) = match outcome {
            Ok(ServiceResponse::Ok {
                data,
                data_count,
                paging,
            }) => (data, data_count, paging),
            Ok(ServiceResponse::Error { message }) => {
                self.phase = LoadPhase::Failed(message);
                return None;
            }
            Err(detail) => {
                self.phase = LoadPhase::Failed(transport_failure_message(&detail));
                return None;
            }
        };
        let Some(paging) = paging else {
            self.phase = LoadPhase::Failed(transport_failure_message(
                "response is missing paging information",
            ));
            return None;
        };

        self.phase = LoadPhase::Merging(page);
        self.registry.merge(data.addresses);
        self.loaded += data_count;

        if paging.api_count > 0 {
            self.phase = LoadPhase::Loading(page + 1);
            Some(page + 1)
        } else {
            self.phase = LoadPhase::Complete;
            None
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match &self.phase {
            LoadPhase::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn status_text(&self) -> String {
        match &self.phase {
            LoadPhase::Idle => STATUS_STARTING.to_string(),
            LoadPhase::Loading(_) | LoadPhase::Merging(_) => {
                format!("Loading people ({} loaded so far)...", self.loaded)
            }
            LoadPhase::Complete => STATUS_COMPLETE.to_string(),
            LoadPhase::Failed(message) => message.clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.phase,
            LoadPhase::Idle | LoadPhase::Loading(_) | LoadPhase::Merging(_)
        )
    }
}
