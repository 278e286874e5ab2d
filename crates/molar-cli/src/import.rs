//! Reading voxelizer input meshes.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use molar_math::Point3;
use molar_voxelize::TriangleMesh;

/// Load an `.obj` or binary `.stl` file.
pub fn load_mesh(path: &Path) -> Result<TriangleMesh> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext.to_lowercase().as_str() {
        "obj" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            parse_obj(&text).with_context(|| format!("parsing {}", path.display()))
        }
        "stl" => {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            parse_stl(&bytes).with_context(|| format!("parsing {}", path.display()))
        }
        _ => bail!("Unknown mesh format: {}", ext),
    }
}

/// Positions, texture coordinates and faces of a Wavefront OBJ. Polygons
/// are fan-triangulated; each distinct position/uv pair becomes a vertex.
pub fn parse_obj(text: &str) -> Result<TriangleMesh> {
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    let mut mesh = TriangleMesh::new();
    let mut vertex_ids: HashMap<(usize, Option<usize>), u32> = HashMap::new();
    let mut any_uv = false;

    for (line_no, line) in text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let [x, y, z] = parse_floats::<3>(&mut parts, line_no)?;
                positions.push(Point3::new(x, y, z));
            }
            Some("vt") => {
                let [u, v] = parse_floats::<2>(&mut parts, line_no)?;
                uvs.push([u, v]);
            }
            Some("f") => {
                let mut face = Vec::new();
                for token in parts {
                    let mut refs = token.split('/');
                    let v = resolve(refs.next(), positions.len(), line_no)?
                        .with_context(|| format!("line {}: face without position", line_no + 1))?;
                    let vt = resolve(refs.next(), uvs.len(), line_no)?;
                    any_uv |= vt.is_some();
                    let next = mesh.positions.len() as u32;
                    let id = *vertex_ids.entry((v, vt)).or_insert_with(|| {
                        mesh.positions.push(positions[v]);
                        mesh.uvs.push(vt.map_or([0.0, 0.0], |t| uvs[t]));
                        next
                    });
                    face.push(id);
                }
                if face.len() < 3 {
                    bail!("line {}: face with {} vertices", line_no + 1, face.len());
                }
                for k in 1..face.len() - 1 {
                    mesh.indices.extend_from_slice(&[face[0], face[k], face[k + 1]]);
                }
            }
            _ => {}
        }
    }
    if !any_uv {
        mesh.uvs.clear();
    }
    Ok(mesh)
}

fn parse_floats<const N: usize>(
    parts: &mut std::str::SplitWhitespace<'_>,
    line_no: usize,
) -> Result<[f32; N]> {
    let mut out = [0.0; N];
    for slot in &mut out {
        let token = parts
            .next()
            .with_context(|| format!("line {}: expected {N} numbers", line_no + 1))?;
        *slot = token
            .parse()
            .with_context(|| format!("line {}: bad number {token:?}", line_no + 1))?;
    }
    Ok(out)
}

/// 1-based or negative (relative) OBJ index into a list of `len` items.
fn resolve(token: Option<&str>, len: usize, line_no: usize) -> Result<Option<usize>> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let i: i64 = token
        .parse()
        .with_context(|| format!("line {}: bad index {token:?}", line_no + 1))?;
    let index = if i > 0 { i - 1 } else { len as i64 + i };
    if index < 0 || index >= len as i64 {
        bail!("line {}: index {i} out of range", line_no + 1);
    }
    Ok(Some(index as usize))
}

/// Binary STL. Vertices are not welded; there are no texture coordinates.
pub fn parse_stl(bytes: &[u8]) -> Result<TriangleMesh> {
    if bytes.len() < 84 {
        bail!("STL file too short");
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    let expected = 84 + count * 50;
    if bytes.len() < expected {
        bail!("STL declares {count} triangles but holds {} bytes", bytes.len());
    }

    let mut mesh = TriangleMesh::new();
    for t in 0..count {
        let record = &bytes[84 + t * 50..84 + (t + 1) * 50];
        for k in 0..3 {
            let base = 12 + k * 12;
            let f = |o: usize| {
                f32::from_le_bytes([
                    record[base + o],
                    record[base + o + 1],
                    record[base + o + 2],
                    record[base + o + 3],
                ])
            };
            mesh.positions.push(Point3::new(f(0), f(4), f(8)));
            mesh.indices.push((t * 3 + k) as u32);
        }
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obj_quad_is_fanned() {
        let mesh = parse_obj(
            "# quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\nf 1/1 2/2 3/3 4/4\n",
        )
        .unwrap();
        assert_eq!(mesh.num_triangles(), 2);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.uvs[2], [1.0, 1.0]);
    }

    #[test]
    fn test_obj_negative_indices_and_no_uvs() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3//1 -2//1 -1//1\n").unwrap();
        assert_eq!(mesh.num_triangles(), 1);
        assert_eq!(mesh.positions[1], Point3::new(1.0, 0.0, 0.0));
        assert!(mesh.uvs.is_empty());
    }

    #[test]
    fn test_obj_errors() {
        assert!(parse_obj("v 0 0\n").is_err());
        assert!(parse_obj("v 0 0 0\nf 1 2 3\n").is_err());
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nf 1 2\n").is_err());
    }

    #[test]
    fn test_stl_reads_exported_mesh() {
        let cube = TriangleMesh::cuboid([1.0, 2.0, 3.0]);
        let extracted = molar_isosurface::Mesh {
            vertices: (0..cube.num_triangles() * 3)
                .map(|i| {
                    let p = cube.positions[cube.indices[i] as usize];
                    molar_isosurface::Vertex {
                        position: [p.x, p.y, p.z],
                        ..Default::default()
                    }
                })
                .collect(),
            indices: (0..cube.num_triangles() as u32 * 3).collect(),
            bounds: cube.bounds(),
        };
        let mesh = parse_stl(&molar_isosurface::export::stl_bytes(&extracted)).unwrap();
        assert_eq!(mesh.num_triangles(), cube.num_triangles());
        assert!((mesh.signed_volume() - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_stl_truncated() {
        assert!(parse_stl(&[0u8; 10]).is_err());
        let mut bytes = vec![0u8; 84];
        bytes[80] = 2;
        assert!(parse_stl(&bytes).is_err());
    }
}
