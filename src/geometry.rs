use std::f32::consts::PI;

pub const SPHERE_WIDTH_SEGMENTS: u32 = 32;
pub const SPHERE_HEIGHT_SEGMENTS: u32 = 16;
/// Upper bound per axis so every vertex stays addressable by a `u16` index.
pub const MAX_SPHERE_SEGMENTS: u32 = 255;

/// Indexed triangle mesh with interleaved-free attribute arrays.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u16>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize { self.positions.len() / 3 }
}

/// Unit UV sphere. Degenerate triangles at the poles are skipped. Segment
/// counts are clamped to `[3, MAX_SPHERE_SEGMENTS]` and `[2, MAX_SPHERE_SEGMENTS]`.
pub fn sphere(width_segments: u32, height_segments: u32) -> Mesh {
    let ws = width_segments.clamp(3, MAX_SPHERE_SEGMENTS);
    let hs = height_segments.clamp(2, MAX_SPHERE_SEGMENTS);
    let mut positions = Vec::with_capacity(((ws + 1) * (hs + 1) * 3) as usize);
    let mut normals = Vec::with_capacity(positions.capacity());
    let mut grid = Vec::with_capacity((hs + 1) as usize);

    for iy in 0..=hs {
        let v = iy as f32 / hs as f32;
        let mut row = Vec::with_capacity((ws + 1) as usize);
        for ix in 0..=ws {
            let u = ix as f32 / ws as f32;
            let x = -(u * 2.0 * PI).cos() * (v * PI).sin();
            let y = (v * PI).cos();
            let z = (u * 2.0 * PI).sin() * (v * PI).sin();
            positions.extend_from_slice(&[x, y, z]);
            normals.extend_from_slice(&[x, y, z]);
            row.push((iy * (ws + 1) + ix) as u16);
        }
        grid.push(row);
    }

    let mut indices = Vec::new();
    for iy in 0..hs as usize {
        for ix in 0..ws as usize {
            let a = grid[iy][ix + 1];
            let b = grid[iy][ix];
            let c = grid[iy + 1][ix];
            let d = grid[iy + 1][ix + 1];
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != hs as usize - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    Mesh { positions, normals, indices }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sphere_counts() {
        let m = sphere(SPHERE_WIDTH_SEGMENTS, SPHERE_HEIGHT_SEGMENTS);
        assert_eq!(m.vertex_count(), 33 * 17);
        assert_eq!(m.indices.len(), (32 * 16 * 2 - 64) * 3);
        assert!(m.indices.iter().all(|&i| (i as usize) < m.vertex_count()));
    }

    #[test]
    fn oversized_request_stays_in_u16_range() {
        let m = sphere(1000, 400);
        assert_eq!(m.vertex_count(), 256 * 256);
        assert_eq!(*m.indices.iter().max().unwrap(), u16::MAX);
        assert!(m.indices.iter().all(|&i| (i as usize) < m.vertex_count()));
    }

    #[test]
    fn vertices_on_unit_sphere() {
        let m = sphere(8, 4);
        for p in m.positions.chunks_exact(3) {
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((r - 1.0).abs() < 1e-5);
        }
        assert_eq!(m.positions, m.normals);
    }
}
