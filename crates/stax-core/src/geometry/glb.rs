//! GLB validation, buffer consolidation and `.gltf` repacking.
//!
//! Documents are validated by `gltf`, then edited as plain JSON so unknown
//! extensions survive the round trip.

use base64::Engine;
use gltf::binary::{Glb, Header};
use serde_json::{json, Value};
use std::borrow::Cow;
use std::path::Path;

/// Pack a `.gltf` document and every buffer it references into one GLB.
pub fn repack_gltf(input: &Path, output: &Path) -> Result<String, String> {
    let text = std::fs::read(input).map_err(|e| format!("cannot read {}: {e}", input.display()))?;
    gltf::Gltf::from_slice(&text).map_err(|e| format!("invalid glTF: {e}"))?;

    let mut doc: Value = serde_json::from_slice(&text).map_err(|e| format!("invalid JSON: {e}"))?;
    let base_dir = input.parent().unwrap_or_else(|| Path::new("."));
    let count = buffer_count(&doc);
    let bin = consolidate(&mut doc, base_dir, None)?;
    write_glb(output, &doc, bin)?;
    Ok(format!("repacked {count} buffer(s) into GLB"))
}

/// Reload a GLB, and rewrite it if its buffers are not already a single
/// binary chunk. A file that fails to load is an error.
pub fn normalize_glb(path: &Path) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    gltf::Gltf::from_slice(&bytes).map_err(|e| format!("invalid GLB: {e}"))?;
    let glb = Glb::from_slice(&bytes).map_err(|e| format!("invalid GLB container: {e}"))?;

    let mut doc: Value =
        serde_json::from_slice(&glb.json).map_err(|e| format!("invalid GLB JSON: {e}"))?;
    if is_single_blob(&doc, glb.bin.is_some()) {
        return Ok("valid GLB with a single binary chunk".into());
    }

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let bin = consolidate(&mut doc, base_dir, glb.bin.as_deref())?;
    write_glb(path, &doc, bin)?;
    Ok("valid GLB; buffers consolidated into one binary chunk".into())
}

/// Serialize a document and binary payload into GLB bytes.
pub fn encode_glb(doc: &Value, bin: Option<Vec<u8>>) -> Result<Vec<u8>, String> {
    let json = serde_json::to_vec(doc).map_err(|e| e.to_string())?;
    let glb = Glb {
        // Length is recomputed on write.
        header: Header {
            magic: *b"glTF",
            version: 2,
            length: 0,
        },
        json: Cow::Owned(json),
        bin: bin.map(Cow::Owned),
    };
    glb.to_vec().map_err(|e| format!("cannot encode GLB: {e}"))
}

fn write_glb(path: &Path, doc: &Value, bin: Option<Vec<u8>>) -> Result<(), String> {
    let bytes = encode_glb(doc, bin)?;
    std::fs::write(path, bytes).map_err(|e| format!("cannot write {}: {e}", path.display()))
}

fn buffer_count(doc: &Value) -> usize {
    doc.get("buffers")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

fn is_single_blob(doc: &Value, has_bin: bool) -> bool {
    let buffers = doc.get("buffers").and_then(Value::as_array);
    match buffers.map(Vec::as_slice) {
        None | Some([]) => !has_bin,
        Some([only]) => has_bin && only.get("uri").is_none(),
        Some(_) => false,
    }
}

/// Merge every buffer into one blob and point all buffer views at it.
fn consolidate(
    doc: &mut Value,
    base_dir: &Path,
    glb_bin: Option<&[u8]>,
) -> Result<Option<Vec<u8>>, String> {
    let buffers = doc
        .get("buffers")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if buffers.is_empty() {
        if let Some(obj) = doc.as_object_mut() {
            obj.remove("buffers");
        }
        return Ok(None);
    }

    let mut blob = Vec::new();
    let mut offsets = Vec::with_capacity(buffers.len());
    for (index, buffer) in buffers.iter().enumerate() {
        let data = load_buffer(buffer, base_dir, glb_bin)?;
        let declared = buffer
            .get("byteLength")
            .and_then(Value::as_u64)
            .ok_or_else(|| format!("buffer {index} has no byteLength"))? as usize;
        if data.len() < declared {
            return Err(format!(
                "buffer {index} holds {} bytes, {declared} declared",
                data.len()
            ));
        }
        pad_to_four(&mut blob);
        offsets.push(blob.len() as u64);
        blob.extend_from_slice(&data[..declared]);
    }
    pad_to_four(&mut blob);

    if let Some(views) = doc.get_mut("bufferViews").and_then(Value::as_array_mut) {
        for (i, view) in views.iter_mut().enumerate() {
            let buffer = view.get("buffer").and_then(Value::as_u64).unwrap_or(0) as usize;
            let base = *offsets
                .get(buffer)
                .ok_or_else(|| format!("bufferView {i} references missing buffer {buffer}"))?;
            let offset = view.get("byteOffset").and_then(Value::as_u64).unwrap_or(0);
            view["buffer"] = json!(0);
            view["byteOffset"] = json!(base + offset);
        }
    }
    doc["buffers"] = json!([{ "byteLength": blob.len() }]);
    Ok(Some(blob))
}

fn load_buffer(buffer: &Value, base_dir: &Path, glb_bin: Option<&[u8]>) -> Result<Vec<u8>, String> {
    match buffer.get("uri").and_then(Value::as_str) {
        None => glb_bin
            .map(<[u8]>::to_vec)
            .ok_or_else(|| "buffer without uri and no binary chunk".to_string()),
        Some(uri) if uri.starts_with("data:") => {
            let (_, payload) = uri
                .split_once(";base64,")
                .ok_or_else(|| "data URI is not base64".to_string())?;
            base64::engine::general_purpose::STANDARD
                .decode(payload)
                .map_err(|e| format!("bad base64 buffer: {e}"))
        }
        Some(uri) => {
            let path = base_dir.join(uri);
            std::fs::read(&path).map_err(|e| format!("cannot read buffer {}: {e}", path.display()))
        }
    }
}

fn pad_to_four(blob: &mut Vec<u8>) {
    while blob.len() % 4 != 0 {
        blob.push(0);
    }
}
