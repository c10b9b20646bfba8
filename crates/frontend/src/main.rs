mod api;
mod components;
mod coords;
mod pages;
mod state;

use dioxus::prelude::*;

const CSS: Asset = asset!("/assets/main.css");

#[allow(non_snake_case)]
fn App() -> Element {
    rsx! {
        document::Stylesheet { href: CSS }
        pages::mapper::Mapper {}
    }
}

fn main() {
    launch(App);
}
