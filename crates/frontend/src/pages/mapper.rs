use dioxus::prelude::*;

use crate::api;
use crate::components::alert;
use crate::components::map_view::MapView;
use crate::state::{ClientMapState, LoadPhase};

#[component]
pub fn Mapper() -> Element {
    let mut state = use_signal(ClientMapState::new);

    // Pages are fetched one after another; the loop ends when the directory
    // runs dry or a page fails. Dropping the component drops the task.
    use_future(move || async move {
        let mut next = state.write().start();
        while let Some(page) = next {
            let outcome = api::get_addresses(page).await;
            next = state.write().on_page(outcome);
        }
        if let Some(message) = state.read().failure() {
            alert(message);
        }
    });

    let status = state.read().status_text();
    let status_class = match state.read().phase() {
        LoadPhase::Complete => "status complete",
        LoadPhase::Failed(_) => "status failed",
        _ => "status loading",
    };
    let markers = state.read().registry().len();

    rsx! {
        div { class: "app",
            div { class: "header",
                h1 { "Member Map" }
                span { class: "marker-count", "{markers} addresses" }
                span { class: "{status_class}", "{status}" }
            }
            MapView { state }
        }
    }
}
