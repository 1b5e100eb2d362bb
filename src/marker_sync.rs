// Keeps map markers in one-to-one correspondence with located photos and
// fits the viewport to each placed batch.
use crate::config::MapConfig;
use crate::gps_map::{FitOptions, MapEngine, MapInstance, MapView, MarkerSpec};
use crate::photo::{GeoTag, Photo};
use geo::{BoundingRect, MultiPoint, Point, Rect};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

type MarkerOf<E> = <<E as MapEngine>::Map as MapInstance>::Marker;

pub struct MarkerSync<E: MapEngine> {
    engine: E,
    map: Option<E::Map>,
    markers: FxHashMap<String, MarkerOf<E>>,
    config: MapConfig,
}

impl<E: MapEngine> MarkerSync<E> {
    pub fn new(engine: E, config: MapConfig) -> Self {
        Self { engine, map: None, markers: FxHashMap::default(), config }
    }

    fn default_view(&self) -> MapView {
        MapView { center: self.config.default_center.coord(), zoom: self.config.default_zoom }
    }

    pub fn is_mounted(&self) -> bool {
        self.map.is_some()
    }

    /// Create the map instance and place markers for photos already in the
    /// collection. Mounting twice replaces the previous instance.
    pub fn mount<'a>(&mut self, photos: impl IntoIterator<Item = &'a Photo>) {
        self.unmount();
        let view = self.default_view();
        self.map = Some(self.engine.create_map(view));
        let located: Vec<&Photo> = photos.into_iter().filter(|p| p.has_location()).collect();
        if !located.is_empty() {
            self.place_markers_for_batch(&located);
        }
    }

    /// Tear down the map. Marker handles of the old instance are dropped.
    pub fn unmount(&mut self) {
        self.markers.clear();
        self.map = None;
    }

    /// Place one marker per located photo and fit the viewport to the batch.
    /// Photos without a location and ids that already have a marker are skipped.
    pub fn place_markers_for_batch(&mut self, photos: &[&Photo]) {
        let Some(map) = self.map.as_mut() else {
            warn!(count = photos.len(), "no map mounted, markers not placed");
            return;
        };

        let mut coords = Vec::new();
        for photo in photos {
            let Some(location) = photo.location else { continue };
            if self.markers.contains_key(&photo.id) {
                debug!(id = %photo.id, "marker already placed");
                continue;
            }
            let marker = map.add_marker(MarkerSpec {
                position: location.coord(),
                thumbnail: Some(photo.preview.url().to_string()),
                popup_html: popup_html(photo),
            });
            self.markers.insert(photo.id.clone(), marker);
            coords.push(location);
        }

        if let Some(bounds) = bounds_of(&coords) {
            let options = FitOptions { padding: self.config.fit_padding, max_zoom: self.config.max_zoom };
            map.fit_bounds(bounds, options);
            debug!(markers = coords.len(), "viewport fitted");
        }
    }

    /// Remove the marker for `id`; a photo without a marker is a no-op.
    pub fn remove_marker(&mut self, id: &str) -> bool {
        let Some(marker) = self.markers.remove(id) else {
            return false;
        };
        if let Some(map) = self.map.as_mut() {
            map.remove_marker(marker);
        }
        true
    }

    /// Remove every marker and start over with a fresh map at the default view.
    pub fn clear_all(&mut self) {
        if let Some(map) = self.map.as_mut() {
            for (_, marker) in self.markers.drain() {
                map.remove_marker(marker);
            }
        }
        self.unmount();
        let view = self.default_view();
        self.map = Some(self.engine.create_map(view));
    }

    /// Move the camera to `center` at the default zoom.
    pub fn recenter(&mut self, center: GeoTag) {
        let zoom = self.config.default_zoom;
        if let Some(map) = self.map.as_mut() {
            map.set_center(center.coord());
            map.set_zoom(zoom);
        }
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn has_marker(&self, id: &str) -> bool {
        self.markers.contains_key(id)
    }

    pub fn map(&self) -> Option<&E::Map> {
        self.map.as_ref()
    }
}

/// Bounding box over coordinates in (lng, lat) order.
pub fn bounds_of(coords: &[GeoTag]) -> Option<Rect<f64>> {
    let points: MultiPoint<f64> = coords.iter().map(|c| Point::from(c.coord())).collect();
    points.bounding_rect()
}

fn popup_html(photo: &Photo) -> String {
    format!(
        "<strong>{}</strong><br>{}",
        escape_html(&photo.name),
        escape_html(&photo.formatted_date)
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps_map::HeadlessEngine;
    use crate::preview::PreviewRegistry;

    fn photo(registry: &PreviewRegistry, id: &str, location: Option<GeoTag>) -> Photo {
        Photo {
            id: id.to_string(),
            name: format!("{}.jpg", id),
            preview: registry.create("image/jpeg", vec![0]),
            location,
            captured_at: None,
            formatted_date: "Unknown Date".to_string(),
            file_extension: "jpg".to_string(),
            mime: "image/jpeg".to_string(),
            imported_at: 0,
        }
    }

    fn mounted() -> MarkerSync<HeadlessEngine> {
        let mut sync = MarkerSync::new(HeadlessEngine::new(), MapConfig::default());
        sync.mount(std::iter::empty());
        sync
    }

    #[test]
    fn test_only_located_photos_get_markers() {
        let registry = PreviewRegistry::new();
        let a = photo(&registry, "a", Some(GeoTag::new(1.0, 2.0)));
        let b = photo(&registry, "b", None);
        let c = photo(&registry, "c", Some(GeoTag::new(3.0, 4.0)));

        let mut sync = mounted();
        sync.place_markers_for_batch(&[&a, &b, &c]);
        assert_eq!(sync.marker_count(), 2);
        assert!(!sync.has_marker("b"));

        let map = sync.map().unwrap();
        assert_eq!(map.marker_count(), 2);
        let (bounds, _) = map.fit_requests()[0];
        assert_eq!((bounds.min().x, bounds.min().y), (2.0, 1.0));
        assert_eq!((bounds.max().x, bounds.max().y), (4.0, 3.0));
    }

    #[test]
    fn test_remove_marker() {
        let registry = PreviewRegistry::new();
        let a = photo(&registry, "a", Some(GeoTag::new(1.0, 2.0)));
        let mut sync = mounted();
        sync.place_markers_for_batch(&[&a]);

        assert!(sync.remove_marker("a"));
        assert!(!sync.remove_marker("a"));
        assert!(!sync.remove_marker("never-placed"));
        assert_eq!(sync.map().unwrap().marker_count(), 0);
    }

    #[test]
    fn test_batch_without_locations_does_not_fit() {
        let registry = PreviewRegistry::new();
        let a = photo(&registry, "a", None);
        let mut sync = mounted();
        sync.place_markers_for_batch(&[&a]);
        assert!(sync.map().unwrap().fit_requests().is_empty());
    }

    #[test]
    fn test_mount_places_existing_and_unmount_drops() {
        let registry = PreviewRegistry::new();
        let photos = vec![
            photo(&registry, "a", Some(GeoTag::new(1.0, 2.0))),
            photo(&registry, "b", None),
        ];
        let mut sync = MarkerSync::new(HeadlessEngine::new(), MapConfig::default());
        sync.place_markers_for_batch(&[&photos[0]]);
        assert_eq!(sync.marker_count(), 0);

        sync.mount(&photos);
        assert_eq!(sync.marker_count(), 1);

        sync.unmount();
        assert!(!sync.is_mounted());
        assert_eq!(sync.marker_count(), 0);
    }

    #[test]
    fn test_popup_is_escaped() {
        let registry = PreviewRegistry::new();
        let mut p = photo(&registry, "x", None);
        p.name = "<b>&.jpg".to_string();
        assert_eq!(popup_html(&p), "<strong>&lt;b&gt;&amp;.jpg</strong><br>Unknown Date");
    }
}
