// Display handles for photo bytes.
//
// A handle is the in-process counterpart of a browser object URL: it has a
// `blob:` style url the map and UI use to refer to the bytes, and it must be
// released exactly once. The registry counts live handles so leaks show up.
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::cell::Cell;
use std::rc::Rc;

// Single-threaded: handles never leave the session thread.
#[derive(Debug, Default)]
struct Counters {
    next: Cell<u64>,
    live: Cell<usize>,
}

/// Issues preview handles and tracks how many are still live.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    counters: Rc<Counters>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, mime: &str, bytes: Vec<u8>) -> PreviewHandle {
        let seq = self.counters.next.get();
        self.counters.next.set(seq + 1);
        self.counters.live.set(self.counters.live.get() + 1);
        PreviewHandle {
            url: format!("blob:photomap/{}", seq),
            mime: mime.to_string(),
            bytes: bytes.into(),
            counters: Some(Rc::clone(&self.counters)),
        }
    }

    /// Rebuild a handle from a stored `data:` url.
    pub fn from_data_url(&self, data_url: &str) -> Option<PreviewHandle> {
        let (mime, bytes) = decode_data_url(data_url)?;
        Some(self.create(&mime, bytes))
    }

    /// Number of handles created and not yet released.
    pub fn live(&self) -> usize {
        self.counters.live.get()
    }
}

#[derive(Debug)]
pub struct PreviewHandle {
    url: String,
    mime: String,
    bytes: Box<[u8]>,
    counters: Option<Rc<Counters>>,
}

impl PreviewHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_released(&self) -> bool {
        self.counters.is_none()
    }

    /// Release the handle. A second call is a no-op.
    pub fn release(&mut self) {
        if let Some(counters) = self.counters.take() {
            counters.live.set(counters.live.get() - 1);
        }
    }

    /// `data:<mime>;base64,<payload>` form used for persistence.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release();
    }
}

pub fn decode_data_url(data_url: &str) -> Option<(String, Vec<u8>)> {
    let rest = data_url.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let bytes = STANDARD.decode(payload).ok()?;
    Some((mime.to_string(), bytes))
}
