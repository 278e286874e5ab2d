//! Reading back the collision flags a carve leaves.

use molar_grid::{CollisionBuffer, VoxelRegion};
use rayon::prelude::*;

/// Whether, and how much, a tool touched solid material this step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CollisionReport {
    /// Any voxel flagged.
    pub collided: bool,
    /// Number of flagged voxels.
    pub flagged: usize,
    /// Flagged share of the scanned region, in `[0, 1]`.
    pub intensity: f32,
}

impl CollisionReport {
    /// Report for `flagged` voxels out of `scanned`.
    pub fn from_counts(flagged: usize, scanned: usize) -> Self {
        Self {
            collided: flagged > 0,
            flagged,
            intensity: if scanned == 0 {
                0.0
            } else {
                flagged as f32 / scanned as f32
            },
        }
    }

    /// Combine reports from several tools: any collision wins, counts add,
    /// the strongest intensity is kept.
    pub fn merge(self, other: Self) -> Self {
        Self {
            collided: self.collided || other.collided,
            flagged: self.flagged + other.flagged,
            intensity: self.intensity.max(other.intensity),
        }
    }
}

/// Count flagged voxels inside `region`.
pub fn read_collision(buffer: &CollisionBuffer, region: &VoxelRegion) -> CollisionReport {
    let dims = buffer.dims();
    let data = buffer.as_slice();
    let flagged = (region.min[2]..=region.max[2])
        .into_par_iter()
        .map(|z| {
            let mut n = 0;
            for y in region.min[1]..=region.max[1] {
                for x in region.min[0]..=region.max[0] {
                    if data[dims.index(x, y, z)] > 0.0 {
                        n += 1;
                    }
                }
            }
            n
        })
        .sum();
    CollisionReport::from_counts(flagged, region.voxel_count())
}

/// Reset every flag. Must follow each read so a collision does not carry
/// into the next step.
pub fn clear_collision(buffer: &mut CollisionBuffer) {
    buffer.as_mut_slice().par_iter_mut().for_each(|v| *v = 0.0);
}
