//! The persisted voxel layout.
//!
//! A `.vox` file is, little-endian and without any header or version:
//!
//! ```text
//! i32 gx, i32 gy, i32 gz
//! f32 voxel_size
//! f32 density[gx * gy * gz]
//! f32 uv[gx * gy * gz][2]
//! ```
//!
//! Both arrays use the canonical flattening order.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use log::debug;

use crate::{DensityField, GridDims, GridError, Result, TexCoordField};

const HEADER_LEN: usize = 16;
const BYTES_PER_VOXEL: usize = 12;

/// A density field and its texture coordinates, as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    /// Edge length of one voxel in world units.
    pub voxel_size: f32,
    /// Signed density per voxel.
    pub density: DensityField,
    /// Texture coordinate per voxel.
    pub texcoords: TexCoordField,
}

impl GridSnapshot {
    /// Bundle a density field with its texture coordinates.
    pub fn new(voxel_size: f32, density: DensityField, texcoords: TexCoordField) -> Result<Self> {
        density.ensure_same_dims(&texcoords)?;
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(GridError::InvalidVoxelSize(voxel_size));
        }
        Ok(Self {
            voxel_size,
            density,
            texcoords,
        })
    }

    /// Grid dimensions.
    pub fn dims(&self) -> GridDims {
        self.density.dims()
    }

    /// Size of the encoded snapshot in bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.dims().volume() * BYTES_PER_VOXEL
    }

    /// Encode into `w`.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        let dims = self.dims();
        dims.validate()?;
        for n in [dims.x, dims.y, dims.z] {
            w.write_all(&(n as i32).to_le_bytes())?;
        }
        w.write_all(&self.voxel_size.to_le_bytes())?;
        for v in self.density.as_slice() {
            w.write_all(&v.to_le_bytes())?;
        }
        for [u, v] in self.texcoords.as_slice() {
            w.write_all(&u.to_le_bytes())?;
            w.write_all(&v.to_le_bytes())?;
        }
        w.flush()?;
        Ok(())
    }

    /// Decode from `r`. Reads exactly one snapshot and leaves any
    /// following bytes unread.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self> {
        let mut header = [0u8; HEADER_LEN];
        read_exact(&mut r, &mut header)?;
        let axis = |i: usize| -> Result<usize> {
            let n = i32::from_le_bytes(word(&header, i));
            usize::try_from(n)
                .map_err(|_| GridError::InvalidDims(format!("negative axis length {n}")))
        };
        let dims = GridDims::new(axis(0)?, axis(1)?, axis(2)?);
        dims.validate()?;
        let voxel_size = f32::from_le_bytes(word(&header, 3));

        let count = dims.volume();
        let mut buf = vec![0u8; count * 4];
        read_exact(&mut r, &mut buf)?;
        let density: Vec<f32> = buf
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        buf.resize(count * 8, 0);
        read_exact(&mut r, &mut buf)?;
        let texcoords: Vec<[f32; 2]> = buf
            .chunks_exact(8)
            .map(|c| {
                [
                    f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                    f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                ]
            })
            .collect();

        Self::new(
            voxel_size,
            DensityField::from_vec(dims, density)?,
            TexCoordField::from_vec(dims, texcoords)?,
        )
    }

    /// Write the snapshot to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))?;
        debug!("wrote {} grid to {}", self.dims(), path.display());
        Ok(())
    }

    /// Read a snapshot from a file, rejecting trailing data.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let snapshot = Self::read_from(&mut reader)?;
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest)?;
        if !rest.is_empty() {
            return Err(GridError::TrailingBytes(rest.len()));
        }
        debug!("read {} grid from {}", snapshot.dims(), path.display());
        Ok(snapshot)
    }
}

fn word(bytes: &[u8; HEADER_LEN], i: usize) -> [u8; 4] {
    [bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]]
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => GridError::Truncated,
        _ => GridError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GridSnapshot {
        let dims = GridDims::new(3, 4, 2);
        let density = DensityField::from_fn(dims, |x, y, z| {
            (x as f32 * 0.25 - y as f32 * 0.5 + z as f32).sin()
        });
        let texcoords = TexCoordField::from_fn(dims, |x, y, z| [x as f32 / 3.0, (y + z) as f32 / 7.0]);
        GridSnapshot::new(0.0125, density, texcoords).unwrap()
    }

    #[test]
    fn test_roundtrip_is_bit_identical() {
        let snap = sample();
        let mut bytes = Vec::new();
        snap.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), snap.encoded_len());

        let back = GridSnapshot::read_from(bytes.as_slice()).unwrap();
        assert_eq!(back.dims(), snap.dims());
        assert_eq!(back.voxel_size.to_bits(), snap.voxel_size.to_bits());
        for (a, b) in back.density.as_slice().iter().zip(snap.density.as_slice()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        for (a, b) in back.texcoords.as_slice().iter().zip(snap.texcoords.as_slice()) {
            assert_eq!(a[0].to_bits(), b[0].to_bits());
            assert_eq!(a[1].to_bits(), b[1].to_bits());
        }
    }

    #[test]
    fn test_layout_header_and_order() {
        let dims = GridDims::new(2, 1, 1);
        let density = DensityField::from_vec(dims, vec![1.0, -1.0]).unwrap();
        let texcoords = TexCoordField::from_vec(dims, vec![[0.1, 0.2], [0.3, 0.4]]).unwrap();
        let snap = GridSnapshot::new(0.5, density, texcoords).unwrap();
        let mut bytes = Vec::new();
        snap.write_to(&mut bytes).unwrap();

        assert_eq!(&bytes[0..4], &2i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &1i32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0.5f32.to_le_bytes());
        assert_eq!(&bytes[16..20], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[20..24], &(-1.0f32).to_le_bytes());
        assert_eq!(&bytes[24..28], &0.1f32.to_le_bytes());
        assert_eq!(&bytes[36..40], &0.4f32.to_le_bytes());
        assert_eq!(bytes.len(), 40);
    }

    #[test]
    fn test_truncated_stream() {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        let err = GridSnapshot::read_from(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, GridError::Truncated));
    }

    #[test]
    fn test_negative_dims_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-2i32).to_le_bytes());
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        let err = GridSnapshot::read_from(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, GridError::InvalidDims(_)));
    }

    #[test]
    fn test_invalid_voxel_size_rejected() {
        let dims = GridDims::cube(1);
        let err = GridSnapshot::new(
            0.0,
            DensityField::filled(dims, 1.0),
            TexCoordField::filled(dims, [0.0; 2]),
        )
        .unwrap_err();
        assert!(matches!(err, GridError::InvalidVoxelSize(_)));
    }

    #[test]
    fn test_save_load_file() {
        let path = std::env::temp_dir().join(format!("molar-grid-{}.vox", std::process::id()));
        let snap = sample();
        snap.save(&path).unwrap();
        let back = GridSnapshot::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(back, snap);
    }

    #[test]
    fn test_load_rejects_trailing_bytes() {
        let path = std::env::temp_dir().join(format!("molar-grid-trailing-{}.vox", std::process::id()));
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();
        bytes.extend_from_slice(&[0, 0]);
        std::fs::write(&path, &bytes).unwrap();
        let err = GridSnapshot::load(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, GridError::TrailingBytes(2)));
    }
}
