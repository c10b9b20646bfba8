use dioxus::prelude::*;
use dioxus::core::spawn_forever;
use membermap_shared::models::AddressKey;

use crate::api;
use crate::components::alert;
use crate::state::{ClientMapState, EntryEdit};

/// One person in an info window. Clicking the name swaps it for an inline
/// editor with [Save] and [Cancel].
#[component]
pub fn PersonEntry(state: Signal<ClientMapState>, address: AddressKey, index: usize) -> Element {
    let mut state = state;

    let (person, edit) = {
        let guard = state.read();
        let Some(marker) = guard.registry().get(&address) else {
            return rsx! {};
        };
        let Some(person) = marker.people.get(index).cloned() else {
            return rsx! {};
        };
        (person, marker.edit_state(index).cloned())
    };

    match edit {
        None => rsx! {
            li { class: "person",
                a {
                    href: "#",
                    onclick: {
                        let address = address.clone();
                        move |evt: Event<MouseData>| {
                            evt.prevent_default();
                            state.write().registry_mut().begin_edit(&address, index);
                        }
                    },
                    "{person.display_name()}"
                }
            }
        },
        Some(EntryEdit::Editing { draft }) => rsx! {
            li { class: "person editing",
                input {
                    r#type: "text",
                    value: "{draft}",
                    oninput: {
                        let address = address.clone();
                        move |evt: Event<FormData>| {
                            state.write().registry_mut().update_draft(&address, index, &evt.value());
                        }
                    },
                }
                a {
                    href: "#",
                    class: "action",
                    onclick: {
                        let address = address.clone();
                        move |evt: Event<MouseData>| {
                            evt.prevent_default();
                            let Some(pending) = state.write().registry_mut().begin_save(&address, index) else {
                                return;
                            };
                            // Must outlive this entry: the popup may close mid-save
                            spawn_forever(async move {
                                let outcome = api::update_person_name(&pending.person_id, &pending.name).await;
                                let failure = state.write().registry_mut().finish_save(&pending, outcome);
                                if let Some(message) = failure {
                                    alert(&message);
                                }
                            });
                        }
                    },
                    "[Save]"
                }
                a {
                    href: "#",
                    class: "action",
                    onclick: {
                        let address = address.clone();
                        move |evt: Event<MouseData>| {
                            evt.prevent_default();
                            state.write().registry_mut().cancel_edit(&address, index);
                        }
                    },
                    "[Cancel]"
                }
            }
        },
        Some(EntryEdit::Saving { draft }) => rsx! {
            li { class: "person saving",
                input { r#type: "text", value: "{draft}", disabled: true }
                span { class: "action", "Saving..." }
            }
        },
    }
}
