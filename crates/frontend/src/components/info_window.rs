use dioxus::prelude::*;
use membermap_shared::models::AddressKey;

use crate::components::person_entry::PersonEntry;
use crate::state::ClientMapState;

/// Popup listing everyone at one address, anchored at the marker.
#[component]
pub fn InfoWindow(state: Signal<ClientMapState>, address: AddressKey, left: f64, top: f64) -> Element {
    let mut state = state;

    let people = state
        .read()
        .registry()
        .get(&address)
        .map(|m| m.people.len())
        .unwrap_or(0);

    rsx! {
        div {
            class: "info-window",
            style: "left: {left}%; top: {top}%;",
            onmousedown: move |evt: Event<MouseData>| evt.stop_propagation(),
            onwheel: move |evt: Event<WheelData>| evt.stop_propagation(),

            div { class: "info-window-header",
                span { class: "info-window-title", "{address}" }
                button {
                    class: "info-window-close",
                    title: "Close",
                    onclick: {
                        let address = address.clone();
                        move |_| state.write().registry_mut().close_info_window(&address)
                    },
                    "×"
                }
            }
            ul { class: "people",
                for index in 0..people {
                    PersonEntry { key: "{index}", state, address: address.clone(), index }
                }
            }
        }
    }
}
