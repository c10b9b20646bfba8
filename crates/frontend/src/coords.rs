use membermap_shared::models::Coordinates;

/// SVG view box the map is drawn into.
pub const VIEW_WIDTH: f64 = 1024.0;
pub const VIEW_HEIGHT: f64 = 640.0;

/// Margin kept free around the outermost markers.
const PADDING: f64 = 48.0;

/// Smallest span (degrees) the view is allowed to collapse to.
const MIN_SPAN_DEG: f64 = 0.02;

/// Where the map looks before any marker has arrived.
pub const DEFAULT_CENTER: Coordinates = Coordinates {
    lat: 32.814,
    lng: -96.913,
};
const DEFAULT_SPAN_DEG: f64 = 4.0;

pub const ZOOM_MIN: f64 = 1.0;
pub const ZOOM_MAX: f64 = 40.0;
pub const ZOOM_STEP: f64 = 1.15;

/// Equirectangular projection of lat/lng onto the view box, fitted to a set
/// of markers. Longitude is scaled by the cosine of the center latitude so
/// shapes keep their proportions at mid latitudes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    center: Coordinates,
    lng_factor: f64,
    scale: f64,
}

impl Viewport {
    /// Fit the view around `points`, or around [`DEFAULT_CENTER`] if there are none.
    pub fn fit(points: impl IntoIterator<Item = Coordinates>) -> Viewport {
        let mut bounds: Option<(f64, f64, f64, f64)> = None;
        for p in points {
            bounds = Some(match bounds {
                None => (p.lat, p.lat, p.lng, p.lng),
                Some((min_lat, max_lat, min_lng, max_lng)) => (
                    min_lat.min(p.lat),
                    max_lat.max(p.lat),
                    min_lng.min(p.lng),
                    max_lng.max(p.lng),
                ),
            });
        }

        let (min_lat, max_lat, min_lng, max_lng) = bounds.unwrap_or_else(|| {
            let half = DEFAULT_SPAN_DEG / 2.0;
            (
                DEFAULT_CENTER.lat - half,
                DEFAULT_CENTER.lat + half,
                DEFAULT_CENTER.lng - half,
                DEFAULT_CENTER.lng + half,
            )
        });

        let center = Coordinates::new((min_lat + max_lat) / 2.0, (min_lng + max_lng) / 2.0);
        let lng_factor = center.lat.to_radians().cos().abs().max(0.01);
        let span_x = ((max_lng - min_lng) * lng_factor).max(MIN_SPAN_DEG);
        let span_y = (max_lat - min_lat).max(MIN_SPAN_DEG);
        let scale = ((VIEW_WIDTH - 2.0 * PADDING) / span_x)
            .min((VIEW_HEIGHT - 2.0 * PADDING) / span_y);

        Viewport {
            center,
            lng_factor,
            scale,
        }
    }

    pub fn center(&self) -> Coordinates {
        self.center
    }

    /// Position of `point` in view box units. North is up.
    pub fn project(&self, point: Coordinates) -> (f64, f64) {
        let dx = (point.lng - self.center.lng) * self.lng_factor;
        let dy = self.center.lat - point.lat;
        (
            VIEW_WIDTH / 2.0 + dx * self.scale,
            VIEW_HEIGHT / 2.0 + dy * self.scale,
        )
    }

    /// Inverse of [`Viewport::project`].
    pub fn unproject(&self, point: (f64, f64)) -> Coordinates {
        let dx = (point.0 - VIEW_WIDTH / 2.0) / self.scale;
        let dy = (point.1 - VIEW_HEIGHT / 2.0) / self.scale;
        Coordinates::new(self.center.lat - dy, self.center.lng + dx / self.lng_factor)
    }

    /// Grid spacing in degrees giving at most `max_lines` lines across the view.
    pub fn grid_step(&self, max_lines: usize) -> f64 {
        let top_left = self.unproject((0.0, 0.0));
        let bottom_right = self.unproject((VIEW_WIDTH, VIEW_HEIGHT));
        let span = (top_left.lat - bottom_right.lat)
            .abs()
            .max((bottom_right.lng - top_left.lng).abs());
        GRID_STEPS
            .iter()
            .copied()
            .find(|step| span / step <= max_lines as f64)
            .unwrap_or(GRID_STEPS[GRID_STEPS.len() - 1])
    }
}

const GRID_STEPS: [f64; 9] = [0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0];

/// Keep the zoomed content covering the whole view box.
pub fn clamp_pan(pan: (f64, f64), zoom: f64) -> (f64, f64) {
    let min_x = -(VIEW_WIDTH * zoom - VIEW_WIDTH).max(0.0);
    let min_y = -(VIEW_HEIGHT * zoom - VIEW_HEIGHT).max(0.0);
    (pan.0.clamp(min_x, 0.0), pan.1.clamp(min_y, 0.0))
}

/// Compute new pan offsets so that `cursor` stays over the same content point
/// when zooming from `old_zoom` to `new_zoom`.
pub fn zoom_pan_at_cursor(
    cursor: (f64, f64),
    old_zoom: f64,
    new_zoom: f64,
    old_pan: (f64, f64),
) -> (f64, f64) {
    let content_x = (cursor.0 - old_pan.0) / old_zoom;
    let content_y = (cursor.1 - old_pan.1) / old_zoom;
    (
        cursor.0 - content_x * new_zoom,
        cursor.1 - content_y * new_zoom,
    )
}

/// Zoom factor after one wheel notch. Scrolling up zooms in.
pub fn wheel_zoom(current: f64, delta_y: f64) -> f64 {
    let factor = if delta_y < 0.0 {
        ZOOM_STEP
    } else {
        1.0 / ZOOM_STEP
    };
    (current * factor).clamp(ZOOM_MIN, ZOOM_MAX)
}

/// Convert a client-space point to view box units given the rendered size of
/// the map element.
pub fn client_to_view(
    client: (f64, f64),
    rect_origin: (f64, f64),
    rect_width: f64,
) -> Option<(f64, f64)> {
    if rect_width <= 0.0 {
        return None;
    }
    let scale = VIEW_WIDTH / rect_width;
    Some((
        (client.0 - rect_origin.0) * scale,
        (client.1 - rect_origin.1) * scale,
    ))
}
