use dioxus::html::geometry::WheelDelta;
use dioxus::html::input_data::MouseButton;
use dioxus::prelude::*;
use membermap_shared::models::{AddressKey, Coordinates};

use crate::components::info_window::InfoWindow;
use crate::coords::{self, Viewport, VIEW_HEIGHT, VIEW_WIDTH};
use crate::state::ClientMapState;

const MAP_CONTAINER_ID: &str = "member-map-container";

/// Drag threshold in pixels. Movement below this is treated as a click.
const DRAG_THRESHOLD: f64 = 3.0;

const GRID_MAX_LINES: usize = 12;

/// Get the bounding client rect of the map container element.
fn container_rect() -> Option<web_sys::DomRect> {
    let document = web_sys::window()?.document()?;
    let element = document.get_element_by_id(MAP_CONTAINER_ID)?;
    Some(element.get_bounding_client_rect())
}

/// Convert a wheel delta (pixels / lines / pages) to a uniform pixel-like value.
fn wheel_delta_y(delta: WheelDelta) -> f64 {
    match delta {
        WheelDelta::Pixels(d) => d.y,
        WheelDelta::Lines(d) => d.y * 40.0,
        WheelDelta::Pages(d) => d.y * 400.0,
    }
}

/// Where a view box point ends up, as percentages of the container, once
/// zoom and pan are applied.
fn overlay_position(point: (f64, f64), zoom: f64, pan: (f64, f64)) -> (f64, f64) {
    (
        (point.0 * zoom + pan.0) / VIEW_WIDTH * 100.0,
        (point.1 * zoom + pan.1) / VIEW_HEIGHT * 100.0,
    )
}

fn format_degrees(value: f64, positive: char, negative: char) -> String {
    let hemisphere = if value < 0.0 { negative } else { positive };
    let magnitude = (value.abs() * 100.0).round() / 100.0;
    format!("{}°{}", magnitude, hemisphere)
}

/// Latitude/longitude grid drawn behind the markers.
fn build_graticule(viewport: &Viewport) -> String {
    let step = viewport.grid_step(GRID_MAX_LINES);
    let top_left = viewport.unproject((0.0, 0.0));
    let bottom_right = viewport.unproject((VIEW_WIDTH, VIEW_HEIGHT));
    let center = viewport.center();

    let mut svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {VIEW_WIDTH} {VIEW_HEIGHT}" width="100%" height="100%">"##
    );

    let first = (bottom_right.lat / step).ceil() as i64;
    let last = (top_left.lat / step).floor() as i64;
    for i in first..=last {
        let lat = i as f64 * step;
        let (_, y) = viewport.project(Coordinates::new(lat, center.lng));
        let label = format_degrees(lat, 'N', 'S');
        svg.push_str(&format!(
            r##"<line x1="0" y1="{y:.1}" x2="{VIEW_WIDTH}" y2="{y:.1}" class="grid-line"/><text x="4" y="{:.1}" class="grid-label">{label}</text>"##,
            y - 3.0
        ));
    }

    let first = (top_left.lng / step).ceil() as i64;
    let last = (bottom_right.lng / step).floor() as i64;
    for i in first..=last {
        let lng = i as f64 * step;
        let (x, _) = viewport.project(Coordinates::new(center.lat, lng));
        let label = format_degrees(lng, 'E', 'W');
        svg.push_str(&format!(
            r##"<line x1="{x:.1}" y1="0" x2="{x:.1}" y2="{VIEW_HEIGHT}" class="grid-line"/><text x="{:.1}" y="{}" class="grid-label">{label}</text>"##,
            x + 3.0,
            VIEW_HEIGHT - 4.0
        ));
    }

    svg.push_str("</svg>");
    svg
}

struct MarkerView {
    address: AddressKey,
    point: (f64, f64),
    people: usize,
}

#[component]
pub fn MapView(state: Signal<ClientMapState>) -> Element {
    let mut state = state;

    let mut zoom = use_signal(|| 1.0_f64);
    let mut pan = use_signal(|| (0.0_f64, 0.0_f64));
    let mut drag_start = use_signal(|| None::<((f64, f64), (f64, f64))>);
    let mut did_drag = use_signal(|| false);

    let (viewport, markers, open_window) = {
        let guard = state.read();
        let registry = guard.registry();
        let viewport = Viewport::fit(registry.iter().map(|m| m.position));
        let markers: Vec<MarkerView> = registry
            .iter()
            .map(|m| MarkerView {
                address: m.key.clone(),
                point: viewport.project(m.position),
                people: m.people.len(),
            })
            .collect();
        let open_window = registry.open_info_windows().first().cloned();
        (viewport, markers, open_window)
    };

    let graticule = build_graticule(&viewport);
    let z = *zoom.read();
    let (pan_x, pan_y) = *pan.read();
    let layer_style = format!(
        "transform: translate({}%, {}%) scale({}); transform-origin: 0 0;",
        pan_x / VIEW_WIDTH * 100.0,
        pan_y / VIEW_HEIGHT * 100.0,
        z
    );
    let counter_scale = 1.0 / z;

    let window_position = open_window.as_ref().and_then(|address| {
        markers
            .iter()
            .find(|m| &m.address == address)
            .map(|m| overlay_position(m.point, z, (pan_x, pan_y)))
    });

    rsx! {
        div {
            id: MAP_CONTAINER_ID,
            class: if drag_start.read().is_some() { "map-container dragging" } else { "map-container" },

            onwheel: move |evt: Event<WheelData>| {
                evt.prevent_default();

                let old_z = *zoom.read();
                let new_z = coords::wheel_zoom(old_z, wheel_delta_y(evt.data().delta()));
                if (new_z - old_z).abs() < 1e-9 {
                    return;
                }

                let Some(rect) = container_rect() else { return };
                let client = evt.data().client_coordinates();
                let Some(cursor) = coords::client_to_view(
                    (client.x, client.y),
                    (rect.left(), rect.top()),
                    rect.width(),
                ) else {
                    return;
                };

                let next = coords::zoom_pan_at_cursor(cursor, old_z, new_z, *pan.read());
                zoom.set(new_z);
                pan.set(coords::clamp_pan(next, new_z));
            },

            onmousedown: move |evt: Event<MouseData>| {
                if evt.trigger_button() != Some(MouseButton::Primary) {
                    return;
                }
                let client = evt.client_coordinates();
                drag_start.set(Some(((client.x, client.y), *pan.read())));
                did_drag.set(false);
            },

            onmousemove: move |evt: Event<MouseData>| {
                let Some((start, start_pan)) = *drag_start.read() else { return };
                let client = evt.client_coordinates();
                let dx = client.x - start.0;
                let dy = client.y - start.1;
                if !*did_drag.read() && dx.hypot(dy) > DRAG_THRESHOLD {
                    did_drag.set(true);
                }
                if !*did_drag.read() {
                    return;
                }

                let Some(rect) = container_rect() else { return };
                if rect.width() <= 0.0 {
                    return;
                }
                let scale = VIEW_WIDTH / rect.width();
                let next = (start_pan.0 + dx * scale, start_pan.1 + dy * scale);
                pan.set(coords::clamp_pan(next, *zoom.read()));
            },

            onmouseup: move |_| drag_start.set(None),
            onmouseleave: move |_| drag_start.set(None),

            div { class: "map-layer", style: "{layer_style}",
                div { class: "graticule", dangerous_inner_html: "{graticule}" }

                for marker in markers {
                    button {
                        key: "{marker.address}",
                        class: if marker.people > 1 { "marker marker-multi" } else { "marker" },
                        title: "{marker.address}",
                        style: format!(
                            "left: {}%; top: {}%; transform: translate(-50%, -50%) scale({});",
                            marker.point.0 / VIEW_WIDTH * 100.0,
                            marker.point.1 / VIEW_HEIGHT * 100.0,
                            counter_scale
                        ),
                        onclick: {
                            let address = marker.address.clone();
                            move |evt: Event<MouseData>| {
                                evt.stop_propagation();
                                if *did_drag.read() {
                                    return;
                                }
                                state.write().registry_mut().open_info_window(&address);
                            }
                        },
                        if marker.people > 1 {
                            "{marker.people}"
                        }
                    }
                }
            }

            if let (Some(address), Some((left, top))) = (open_window, window_position) {
                InfoWindow { state, address, left, top }
            }
        }
    }
}
