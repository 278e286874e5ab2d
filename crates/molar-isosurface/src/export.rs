//! Mesh export to Wavefront OBJ and binary STL.

use std::io::{self, Write};

use crate::mesh::Mesh;

/// Write `mesh` as Wavefront OBJ with positions, texture coordinates and
/// normals. Face indices are 1-based.
pub fn write_obj<W: Write>(mesh: &Mesh, mut w: W) -> io::Result<()> {
    writeln!(w, "# molar surface, {} triangles", mesh.num_triangles())?;
    for v in &mesh.vertices {
        writeln!(w, "v {} {} {}", v.position[0], v.position[1], v.position[2])?;
    }
    for v in &mesh.vertices {
        writeln!(w, "vt {} {}", v.uv[0], v.uv[1])?;
    }
    for v in &mesh.vertices {
        writeln!(w, "vn {} {} {}", v.normal[0], v.normal[1], v.normal[2])?;
    }
    for tri in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] + 1, tri[1] + 1, tri[2] + 1];
        writeln!(w, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
    }
    Ok(())
}

/// Encode `mesh` as binary STL.
pub fn stl_bytes(mesh: &Mesh) -> Vec<u8> {
    let num_triangles = mesh.num_triangles();
    let mut data = Vec::with_capacity(84 + num_triangles * 50);

    let mut header = [b' '; 80];
    let title = b"molar STL export";
    header[..title.len()].copy_from_slice(title);
    data.extend_from_slice(&header);
    data.extend_from_slice(&(num_triangles as u32).to_le_bytes());

    for t in 0..num_triangles {
        let [a, b, c] = mesh.triangle(t);
        let n = (b - a)
            .cross(&(c - a))
            .try_normalize(1e-10)
            .unwrap_or_else(molar_math::Vec3::z);
        for f in [n.x, n.y, n.z] {
            data.extend_from_slice(&f.to_le_bytes());
        }
        for p in [a, b, c] {
            for f in [p.x, p.y, p.z] {
                data.extend_from_slice(&f.to_le_bytes());
            }
        }
        data.extend_from_slice(&0u16.to_le_bytes());
    }
    data
}
