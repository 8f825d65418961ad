//! In-process OBJ, STL and PLY to GLB export.

use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};
use serde_json::{json, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::glb::encode_glb;
use crate::pipeline::metadata::lower_extension;

const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

/// Triangles of every model in a file, merged into one primitive.
#[derive(Debug, Default)]
struct MergedMesh {
    positions: Vec<f32>,
    normals: Vec<f32>,
    indices: Vec<u32>,
}

impl MergedMesh {
    fn check(self) -> Result<Self, String> {
        if self.positions.is_empty() || self.indices.is_empty() {
            return Err("mesh contains no triangles".into());
        }
        let vertices = (self.positions.len() / 3) as u32;
        if self.indices.iter().any(|&i| i >= vertices) {
            return Err("face references a missing vertex".into());
        }
        Ok(self)
    }
}

/// Load `input` and write it as a GLB.
///
/// The export with normals is tried first; when it cannot be built the
/// positions-only export is written instead.
pub fn export_glb(input: &Path, output: &Path) -> Result<String, String> {
    let mesh = match lower_extension(input).as_deref() {
        Some("obj") => load_obj(input)?,
        Some("stl") => load_stl(input)?,
        Some("ply") => load_ply(input)?,
        _ => return Err("mesh library reads OBJ, STL and PLY only".into()),
    }
    .check()?;
    let vertices = mesh.positions.len() / 3;
    let triangles = mesh.indices.len() / 3;

    let (bytes, note) = match build(&mesh, true) {
        Ok(bytes) => (bytes, "full export"),
        Err(reason) => {
            tracing::debug!(%reason, "Falling back to minimal mesh export");
            (build(&mesh, false)?, "minimal export")
        }
    };
    std::fs::write(output, bytes).map_err(|e| format!("cannot write {}: {e}", output.display()))?;
    Ok(format!("{note}: {vertices} vertices, {triangles} triangles"))
}

fn load_obj(path: &Path) -> Result<MergedMesh, String> {
    let options = tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ..Default::default()
    };
    let (models, _materials) =
        tobj::load_obj(path, &options).map_err(|e| format!("cannot load OBJ: {e}"))?;

    let mut merged = MergedMesh::default();
    for model in models {
        let mesh = model.mesh;
        let offset = (merged.positions.len() / 3) as u32;
        let with_normals = mesh.normals.len() == mesh.positions.len();
        if with_normals {
            merged.normals.extend_from_slice(&mesh.normals);
        } else {
            // A model without normals invalidates the merged set.
            merged.normals.clear();
        }
        merged.positions.extend_from_slice(&mesh.positions);
        merged
            .indices
            .extend(mesh.indices.iter().map(|i| i + offset));
    }
    Ok(merged)
}

/// STL carries face normals only, so the export is positions-only.
fn load_stl(path: &Path) -> Result<MergedMesh, String> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let stl = stl_io::read_stl(&mut BufReader::new(file))
        .map_err(|e| format!("cannot load STL: {e}"))?;

    let mut merged = MergedMesh::default();
    for vertex in &stl.vertices {
        merged.positions.extend([vertex[0], vertex[1], vertex[2]]);
    }
    for face in &stl.faces {
        for &index in &face.vertices {
            let index = u32::try_from(index).map_err(|_| "STL index out of range".to_string())?;
            merged.indices.push(index);
        }
    }
    Ok(merged)
}

fn load_ply(path: &Path) -> Result<MergedMesh, String> {
    let file = File::open(path).map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(&mut BufReader::new(file))
        .map_err(|e| format!("cannot load PLY: {e}"))?;

    let mut merged = MergedMesh::default();
    let vertices = ply.payload.get("vertex").map(Vec::as_slice).unwrap_or_default();
    let mut with_normals = true;
    for vertex in vertices {
        for axis in ["x", "y", "z"] {
            let value = vertex
                .get(axis)
                .and_then(scalar)
                .ok_or_else(|| format!("PLY vertex without {axis}"))?;
            merged.positions.push(value);
        }
        match (
            vertex.get("nx").and_then(scalar),
            vertex.get("ny").and_then(scalar),
            vertex.get("nz").and_then(scalar),
        ) {
            (Some(x), Some(y), Some(z)) => merged.normals.extend([x, y, z]),
            _ => with_normals = false,
        }
    }
    if !with_normals {
        merged.normals.clear();
    }

    let faces = ply.payload.get("face").map(Vec::as_slice).unwrap_or_default();
    for face in faces {
        let polygon = face
            .get("vertex_indices")
            .or_else(|| face.get("vertex_index"))
            .and_then(indices)
            .ok_or_else(|| "PLY face without vertex indices".to_string())?;
        // Fan triangulation of each polygon.
        for i in 1..polygon.len().saturating_sub(1) {
            merged
                .indices
                .extend([polygon[0], polygon[i], polygon[i + 1]]);
        }
    }
    Ok(merged)
}

fn scalar(property: &Property) -> Option<f32> {
    match *property {
        Property::Float(v) => Some(v),
        Property::Double(v) => Some(v as f32),
        Property::Int(v) => Some(v as f32),
        Property::UInt(v) => Some(v as f32),
        Property::Short(v) => Some(v as f32),
        Property::UShort(v) => Some(v as f32),
        Property::Char(v) => Some(v as f32),
        Property::UChar(v) => Some(v as f32),
        _ => None,
    }
}

fn indices(property: &Property) -> Option<Vec<u32>> {
    match property {
        Property::ListInt(list) => list.iter().map(|&i| u32::try_from(i).ok()).collect(),
        Property::ListUInt(list) => Some(list.clone()),
        Property::ListShort(list) => list.iter().map(|&i| u32::try_from(i).ok()).collect(),
        Property::ListUShort(list) => Some(list.iter().map(|&i| u32::from(i)).collect()),
        Property::ListUChar(list) => Some(list.iter().map(|&i| u32::from(i)).collect()),
        _ => None,
    }
}

fn build(mesh: &MergedMesh, with_normals: bool) -> Result<Vec<u8>, String> {
    if with_normals && mesh.normals.len() != mesh.positions.len() {
        return Err("normals do not cover every vertex".into());
    }

    let mut bin = Vec::new();
    let mut views = Vec::new();
    let mut accessors = Vec::new();
    let count = mesh.positions.len() / 3;

    let (min, max) = bounds(&mesh.positions);
    push_view(&mut bin, &mut views, floats(&mesh.positions), ARRAY_BUFFER);
    accessors.push(json!({
        "bufferView": views.len() - 1,
        "componentType": FLOAT,
        "count": count,
        "type": "VEC3",
        "min": min,
        "max": max,
    }));
    let mut attributes = json!({ "POSITION": accessors.len() - 1 });

    if with_normals {
        push_view(&mut bin, &mut views, floats(&mesh.normals), ARRAY_BUFFER);
        accessors.push(json!({
            "bufferView": views.len() - 1,
            "componentType": FLOAT,
            "count": count,
            "type": "VEC3",
        }));
        attributes["NORMAL"] = json!(accessors.len() - 1);
    }

    let indices: Vec<u8> = mesh.indices.iter().flat_map(|i| i.to_le_bytes()).collect();
    push_view(&mut bin, &mut views, indices, ELEMENT_ARRAY_BUFFER);
    accessors.push(json!({
        "bufferView": views.len() - 1,
        "componentType": UNSIGNED_INT,
        "count": mesh.indices.len(),
        "type": "SCALAR",
    }));

    let doc = json!({
        "asset": { "version": "2.0", "generator": concat!("stax ", env!("CARGO_PKG_VERSION")) },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{
            "primitives": [{
                "attributes": attributes,
                "indices": accessors.len() - 1,
                "mode": 4,
            }]
        }],
        "accessors": accessors,
        "bufferViews": views,
        "buffers": [{ "byteLength": bin.len() }],
    });
    encode_glb(&doc, Some(bin))
}

fn floats(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn push_view(bin: &mut Vec<u8>, views: &mut Vec<Value>, data: Vec<u8>, target: u32) {
    let offset = bin.len();
    views.push(json!({
        "buffer": 0,
        "byteOffset": offset,
        "byteLength": data.len(),
        "target": target,
    }));
    bin.extend(data);
    while bin.len() % 4 != 0 {
        bin.push(0);
    }
}

fn bounds(positions: &[f32]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for vertex in positions.chunks_exact(3) {
        for axis in 0..3 {
            min[axis] = min[axis].min(vertex[axis]);
            max[axis] = max[axis].max(vertex[axis]);
        }
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "o quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";

    const QUAD_WITH_NORMALS: &str = "o quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
        vn 0 0 1\nf 1//1 2//1 3//1 4//1\n";

    fn write_obj(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("quad.obj");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_export_without_normals_falls_back_to_minimal() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_obj(dir.path(), QUAD);
        let output = dir.path().join("quad.glb");

        let note = export_glb(&input, &output).unwrap();
        assert!(note.starts_with("minimal export"), "{note}");
        assert!(note.contains("2 triangles"), "{note}");

        let gltf = gltf::Gltf::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        let primitive = gltf.meshes().next().unwrap().primitives().next().unwrap();
        assert!(primitive.get(&gltf::Semantic::Positions).is_some());
        assert!(primitive.get(&gltf::Semantic::Normals).is_none());
    }

    #[test]
    fn test_export_with_normals() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_obj(dir.path(), QUAD_WITH_NORMALS);
        let output = dir.path().join("quad.glb");

        let note = export_glb(&input, &output).unwrap();
        assert!(note.starts_with("full export"), "{note}");
        let gltf = gltf::Gltf::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        let primitive = gltf.meshes().next().unwrap().primitives().next().unwrap();
        assert!(primitive.get(&gltf::Semantic::Normals).is_some());
    }

    #[test]
    fn test_unsupported_extension_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.dae");
        std::fs::write(&input, b"<COLLADA/>").unwrap();
        let err = export_glb(&input, &dir.path().join("a.glb")).unwrap_err();
        assert!(err.contains("OBJ, STL and PLY only"));
    }

    #[test]
    fn test_ascii_stl_export() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("tri.stl");
        std::fs::write(
            &input,
            "solid tri\n\
             facet normal 0 0 1\n\
             outer loop\n\
             vertex 0 0 0\n\
             vertex 1 0 0\n\
             vertex 0 1 0\n\
             endloop\n\
             endfacet\n\
             endsolid tri\n",
        )
        .unwrap();
        let output = dir.path().join("tri.glb");

        let note = export_glb(&input, &output).unwrap();
        assert!(note.contains("3 vertices, 1 triangles"), "{note}");
        assert!(gltf::Gltf::from_slice(&std::fs::read(&output).unwrap()).is_ok());
    }

    #[test]
    fn test_ascii_ply_quad_with_normals() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("quad.ply");
        std::fs::write(
            &input,
            "ply\nformat ascii 1.0\n\
             element vertex 4\n\
             property float x\nproperty float y\nproperty float z\n\
             property float nx\nproperty float ny\nproperty float nz\n\
             element face 1\n\
             property list uchar int vertex_indices\n\
             end_header\n\
             0 0 0 0 0 1\n1 0 0 0 0 1\n1 1 0 0 0 1\n0 1 0 0 0 1\n\
             4 0 1 2 3\n",
        )
        .unwrap();
        let output = dir.path().join("quad.glb");

        let note = export_glb(&input, &output).unwrap();
        assert!(note.starts_with("full export"), "{note}");
        assert!(note.contains("2 triangles"), "{note}");
        let gltf = gltf::Gltf::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        let primitive = gltf.meshes().next().unwrap().primitives().next().unwrap();
        assert!(primitive.get(&gltf::Semantic::Normals).is_some());
    }

    #[test]
    fn test_out_of_range_face_is_rejected() {
        let mesh = MergedMesh {
            positions: vec![0.0; 9],
            normals: Vec::new(),
            indices: vec![0, 1, 7],
        };
        assert!(mesh.check().unwrap_err().contains("missing vertex"));
    }

    #[test]
    fn test_empty_obj_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_obj(dir.path(), "# nothing here\n");
        assert!(export_glb(&input, &dir.path().join("a.glb")).is_err());
    }

    #[test]
    fn test_bounds() {
        let (min, max) = bounds(&[0.0, -1.0, 2.0, 3.0, 1.0, -2.0]);
        assert_eq!(min, [0.0, -1.0, -2.0]);
        assert_eq!(max, [3.0, 1.0, 2.0]);
    }
}
