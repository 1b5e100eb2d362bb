// Mapping-engine capability and an in-process engine.
// The core only sees these traits; tile rendering lives behind them.
use geo::{Coord, Rect};
use rustc_hash::FxHashMap;
use serde_json::{Value, json};

/// Initial camera of a freshly created map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub center: Coord<f64>,
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub padding: f64,
    pub max_zoom: f64,
}

/// What to draw for one photo.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: Coord<f64>,
    /// Preview handle url shown inside the marker
    pub thumbnail: Option<String>,
    pub popup_html: String,
}

pub trait MapEngine {
    type Map: MapInstance;

    fn create_map(&mut self, view: MapView) -> Self::Map;
}

pub trait MapInstance {
    type Marker;

    fn set_center(&mut self, center: Coord<f64>);
    fn set_zoom(&mut self, zoom: f64);
    fn fit_bounds(&mut self, bounds: Rect<f64>, options: FitOptions);
    fn add_marker(&mut self, marker: MarkerSpec) -> Self::Marker;
    fn remove_marker(&mut self, marker: Self::Marker);
}

/// Creates [`HeadlessMap`]s. Each instance gets its own generation number so
/// markers from a torn-down map cannot be mistaken for live ones.
#[derive(Debug, Default)]
pub struct HeadlessEngine {
    generation: u64,
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MapEngine for HeadlessEngine {
    type Map = HeadlessMap;

    fn create_map(&mut self, view: MapView) -> HeadlessMap {
        self.generation += 1;
        HeadlessMap {
            generation: self.generation,
            center: view.center,
            zoom: view.zoom,
            next_marker: 0,
            markers: FxHashMap::default(),
            fits: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadlessMarker {
    generation: u64,
    idx: u64,
}

/// Map that keeps its state in memory: markers, camera and fit requests.
#[derive(Debug)]
pub struct HeadlessMap {
    generation: u64,
    center: Coord<f64>,
    zoom: f64,
    next_marker: u64,
    markers: FxHashMap<u64, MarkerSpec>,
    fits: Vec<(Rect<f64>, FitOptions)>,
}

impl HeadlessMap {
    pub fn center(&self) -> Coord<f64> {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn markers(&self) -> impl Iterator<Item = &MarkerSpec> {
        self.markers.values()
    }

    /// Every fit_bounds request, oldest first.
    pub fn fit_requests(&self) -> &[(Rect<f64>, FitOptions)] {
        &self.fits
    }

    /// Markers as a GeoJSON FeatureCollection, in creation order.
    pub fn to_geojson(&self) -> Value {
        let mut entries: Vec<_> = self.markers.iter().collect();
        entries.sort_by_key(|(idx, _)| **idx);
        let features: Vec<Value> = entries
            .into_iter()
            .map(|(_, m)| {
                json!({
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [m.position.x, m.position.y] },
                    "properties": { "popup": m.popup_html, "thumbnail": m.thumbnail },
                })
            })
            .collect();
        json!({
            "type": "FeatureCollection",
            "features": features,
            "view": { "center": [self.center.x, self.center.y], "zoom": self.zoom },
        })
    }
}

impl MapInstance for HeadlessMap {
    type Marker = HeadlessMarker;

    fn set_center(&mut self, center: Coord<f64>) {
        self.center = center;
    }

    fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>, options: FitOptions) {
        self.center = bounds.center();
        self.zoom = zoom_for_bounds(&bounds).min(options.max_zoom);
        self.fits.push((bounds, options));
    }

    fn add_marker(&mut self, marker: MarkerSpec) -> HeadlessMarker {
        let idx = self.next_marker;
        self.next_marker += 1;
        self.markers.insert(idx, marker);
        HeadlessMarker { generation: self.generation, idx }
    }

    fn remove_marker(&mut self, marker: HeadlessMarker) {
        if marker.generation != self.generation {
            return;
        }
        self.markers.remove(&marker.idx);
    }
}

/// Rough web-mercator zoom that shows `bounds` on a 512px viewport.
fn zoom_for_bounds(bounds: &Rect<f64>) -> f64 {
    let span = bounds.width().max(bounds.height());
    if span <= f64::EPSILON {
        return f64::INFINITY;
    }
    (360.0 / span).log2().clamp(0.0, 22.0)
}
