// Storage codec for preview payloads.
// Payloads longer than CHUNK_SIZE characters are split into ordered pieces
// of CHUNK_SIZE characters; decoding concatenates them in stored order.
use serde::{Deserialize, Serialize};

pub const CHUNK_SIZE: usize = 500_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredPreview {
    Inline(String),
    Chunked(Vec<String>),
}

impl StoredPreview {
    pub fn is_chunked(&self) -> bool {
        matches!(self, StoredPreview::Chunked(_))
    }
}

pub fn encode_for_storage(payload: &str) -> StoredPreview {
    encode_with_chunk_size(payload, CHUNK_SIZE)
}

pub fn decode_from_storage(stored: &StoredPreview) -> String {
    match stored {
        StoredPreview::Inline(s) => s.clone(),
        StoredPreview::Chunked(chunks) => chunks.concat(),
    }
}

fn encode_with_chunk_size(payload: &str, size: usize) -> StoredPreview {
    if payload.chars().count() <= size {
        return StoredPreview::Inline(payload.to_string());
    }
    StoredPreview::Chunked(chunk_string(payload, size))
}

/// Split into pieces of `size` characters (the last one may be shorter).
fn chunk_string(s: &str, size: usize) -> Vec<String> {
    let mut chunks = Vec::with_capacity(s.len().div_ceil(size));
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in s.char_indices() {
        if count == size {
            chunks.push(s[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < s.len() {
        chunks.push(s[start..].to_string());
    }
    chunks
}
