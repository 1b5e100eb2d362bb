// The session owns everything the core needs: collection, store handle,
// marker synchronizer, id generator, preview registry and pending notices.
// All mutation goes through `&mut self`, so batches never interleave.
use crate::config::Config;
use crate::db::{PhotoStore, StoredRecord};
use crate::exif_extract::TagReader;
use crate::geolocate::IpGeolocator;
use crate::gps_map::MapEngine;
use crate::marker_sync::MarkerSync;
use crate::photo::{IdGenerator, Photo};
use crate::pipeline::{self, RawFile};
use crate::preview::PreviewRegistry;
use chrono::DateTime;
use std::fmt;
use tracing::{error, info, warn};

/// Non-blocking, user-visible message about a degraded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Photos work for this session only
    StoreUnavailable(String),
    /// The batch is shown but was not saved
    StoreWriteFailed { count: usize, reason: String },
    StoreDeleteFailed { id: String, reason: String },
    StoreClearFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::StoreUnavailable(reason) => {
                write!(f, "Photos will not be saved after this session ({})", reason)
            }
            Notice::StoreWriteFailed { count, reason } => {
                write!(f, "Could not save {} photo(s): {}", count, reason)
            }
            Notice::StoreDeleteFailed { id, reason } => {
                write!(f, "Could not remove {} from storage: {}", id, reason)
            }
            Notice::StoreClearFailed(reason) => write!(f, "Could not clear storage: {}", reason),
        }
    }
}

pub struct PhotoMapSession<E: MapEngine, R: TagReader> {
    config: Config,
    reader: R,
    store: Option<PhotoStore>,
    photos: Vec<Photo>,
    sync: MarkerSync<E>,
    previews: PreviewRegistry,
    ids: IdGenerator,
    notices: Vec<Notice>,
}

impl<E: MapEngine, R: TagReader> PhotoMapSession<E, R> {
    /// Open the store, rehydrate stored photos and mount the map.
    /// A store that cannot be opened leaves the session in memory-only mode.
    pub fn open(config: Config, engine: E, reader: R) -> Self {
        let mut notices = Vec::new();
        let store = match config.store.resolved_path() {
            Some(path) => match PhotoStore::open(&path, config.store.map_size) {
                Ok(store) => Some(store),
                Err(e) => {
                    error!(error = %e, "photo store unavailable, continuing in memory");
                    notices.push(Notice::StoreUnavailable(e.to_string()));
                    None
                }
            },
            None => {
                notices.push(Notice::StoreUnavailable("no cache directory".to_string()));
                None
            }
        };

        let sync = MarkerSync::new(engine, config.map.clone());
        let mut session = Self {
            config,
            reader,
            store,
            photos: Vec::new(),
            sync,
            previews: PreviewRegistry::new(),
            ids: IdGenerator::new(),
            notices,
        };
        session.rehydrate();
        session.sync.mount(&session.photos);
        session
    }

    fn rehydrate(&mut self) {
        let Some(store) = &self.store else { return };
        let mut records = match store.load_all() {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "failed to load stored photos");
                self.notices.push(Notice::StoreUnavailable(e.to_string()));
                return;
            }
        };
        records.sort_by(|a, b| a.imported_at.cmp(&b.imported_at).then_with(|| a.id.cmp(&b.id)));

        for record in records {
            self.ids.observe(record.imported_at);
            let preview = match self.previews.from_data_url(&record.preview_payload()) {
                Some(preview) => preview,
                None => {
                    warn!(id = %record.id, "stored preview is not a data url");
                    self.previews.create(&record.mime, Vec::new())
                }
            };
            self.photos.push(Photo {
                preview,
                captured_at: record
                    .captured_at
                    .and_then(|secs| DateTime::from_timestamp(secs, 0))
                    .map(|dt| dt.naive_utc()),
                id: record.id,
                name: record.name,
                location: record.location,
                formatted_date: record.formatted_date,
                file_extension: record.file_extension,
                mime: record.mime,
                imported_at: record.imported_at,
            });
        }
        info!(count = self.photos.len(), "rehydrated photo collection");
    }

    /// Import a batch, append it, persist it and place its markers.
    /// Returns the ids of the new photos in batch order.
    pub async fn import_batch(&mut self, files: Vec<RawFile>) -> Vec<String> {
        let batch = pipeline::import_batch(&self.reader, &self.previews, &mut self.ids, files).await;
        let start = self.photos.len();
        self.photos.extend(batch);
        let added = &self.photos[start..];

        if let Some(store) = &self.store {
            let records: Vec<StoredRecord> = added.iter().map(StoredRecord::from_photo).collect();
            // The collection is not rolled back; the notice reports the divergence
            if let Err(e) = store.upsert_batch(&records) {
                error!(error = %e, count = records.len(), "failed to persist import batch");
                self.notices
                    .push(Notice::StoreWriteFailed { count: records.len(), reason: e.to_string() });
            }
        }

        let refs: Vec<&Photo> = added.iter().collect();
        self.sync.place_markers_for_batch(&refs);
        info!(count = added.len(), total = self.photos.len(), "imported batch");
        added.iter().map(|p| p.id.clone()).collect()
    }

    /// Remove a photo, its marker and (when configured) its stored record,
    /// then release its preview. Returns false for unknown ids.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(idx) = self.photos.iter().position(|p| p.id == id) else {
            return false;
        };
        let mut photo = self.photos.remove(idx);
        self.sync.remove_marker(id);

        if self.config.store.purge_on_delete
            && let Some(store) = &self.store
            && let Err(e) = store.delete(id)
        {
            error!(id, error = %e, "failed to delete stored photo");
            self.notices.push(Notice::StoreDeleteFailed { id: id.to_string(), reason: e.to_string() });
        }

        photo.preview.release();
        info!(id, "photo deleted");
        true
    }

    /// Remove every photo and marker and reset the map to its default view.
    pub fn clear_all(&mut self) {
        for photo in &mut self.photos {
            photo.preview.release();
        }
        self.photos.clear();
        self.sync.clear_all();

        if self.config.store.purge_on_delete
            && let Some(store) = &self.store
            && let Err(e) = store.clear()
        {
            error!(error = %e, "failed to clear photo store");
            self.notices.push(Notice::StoreClearFailed(e.to_string()));
        }
        info!("cleared all photos");
    }

    /// Recenter the default view on the caller's IP location.
    /// Failure leaves the current view in place.
    pub async fn recenter_from_ip(&mut self, locator: &IpGeolocator) -> bool {
        match locator.locate().await {
            Ok(center) => {
                self.sync.recenter(center);
                true
            }
            Err(e) => {
                warn!(error = %e, "IP geolocation failed, keeping default view");
                false
            }
        }
    }

    /// Create a fresh map instance for a newly shown view and place markers
    /// for every located photo. A mounted map is replaced.
    pub fn mount_map(&mut self) {
        self.sync.mount(&self.photos);
        info!(markers = self.sync.marker_count(), "map mounted");
    }

    /// Tear down the map when its view goes away. Photos stay loaded and
    /// imports made while unmounted get markers on the next mount.
    pub fn unmount_map(&mut self) {
        self.sync.unmount();
        info!("map unmounted");
    }

    /// Unmount the map and release every preview.
    pub fn close(mut self) {
        self.sync.unmount();
        for photo in &mut self.photos {
            photo.preview.release();
        }
        self.photos.clear();
        info!("session closed");
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn get(&self, id: &str) -> Option<&Photo> {
        self.photos.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn markers(&self) -> &MarkerSync<E> {
        &self.sync
    }

    pub fn map(&self) -> Option<&E::Map> {
        self.sync.map()
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
