//! The parsed result type.

/// A 4×4 affine matrix, row-major, bottom row always `(0, 0, 0, 1)`.
///
/// CCP4's skew transformation (`LSKFLG`/`SKWMAT`/`SKWTRN`) and a symmetry
/// operator both parse into this shape; neither is applied to the voxel
/// grid by this crate.
pub type Matrix4 = [[f32; 4]; 4];

/// A parsed CCP4/MRC electron-density map.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityMap {
    /// Fast/medium/slow column counts along the stored axes (NC, NR, NS).
    pub size: (i32, i32, i32),
    /// Starting grid index per stored axis (NCSTART, NRSTART, NSSTART).
    pub start: (i32, i32, i32),
    /// Number of intervals along the cell axes (MX, MY, MZ).
    pub intervals: (i32, i32, i32),
    /// Permutation in {1,2,3} mapping stored axis order to crystallographic
    /// axis order (MAPC, MAPR, MAPS).
    pub axes: (i32, i32, i32),
    /// Unit cell edge lengths in Å (CELLA).
    pub cell_size: (f32, f32, f32),
    /// Unit cell angles in degrees (CELLB).
    pub angles: (f32, f32, f32),
    pub a_min: f32,
    pub a_max: f32,
    pub a_mean: f32,
    pub a_rms: f32,
    pub space_group_number: i32,
    /// Row-major in stored axis order, fastest-varying is x. Length is
    /// always `nx * ny * nz`.
    pub data: Vec<f32>,
    /// Parsed symmetry operators; empty when `NSYMBT == 0`.
    pub symmetry_ops: Vec<Matrix4>,
    /// The skew transformation, present only when the header's `LSKFLG`
    /// word is nonzero. Parsed but never applied to `data`.
    pub skew: Option<Matrix4>,
}

impl DensityMap {
    /// `nx * ny * nz`, the length `data` must have.
    pub fn voxel_count(&self) -> usize {
        let (nx, ny, nz) = self.size;
        nx as usize * ny as usize * nz as usize
    }
}
