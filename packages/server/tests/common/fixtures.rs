//! Request bodies and embedding vectors shared by the integration tests.

#![allow(dead_code)]

use base64::Engine;
use serde_json::{json, Value};

/// Dimensionality used by `TestDependencies` and the migration.
pub const DIMS: usize = 1536;

/// Bytes that look enough like a PNG for the mocks.
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake image body";

pub fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn upload_body(bytes: &[u8], mime_type: &str) -> Value {
    json!({ "file": encode(bytes), "mimeType": mime_type })
}

pub fn png_upload() -> Value {
    upload_body(FAKE_PNG, "image/png")
}

/// Unit vector in the plane of axes `a` and `b` whose cosine with axis `a` is
/// `cosine`.
pub fn vector_at(a: usize, b: usize, cosine: f32) -> Vec<f32> {
    let mut v = vec![0.0; DIMS];
    v[a] = cosine;
    v[b] = (1.0 - cosine * cosine).sqrt();
    v
}

/// Unit vector along one axis.
pub fn axis(a: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIMS];
    v[a] = 1.0;
    v
}
