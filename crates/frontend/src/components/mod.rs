pub mod info_window;
pub mod map_view;
pub mod person_entry;

/// Show a blocking browser alert. Does nothing outside a browser window.
pub fn alert(message: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.alert_with_message(message);
    }
}
