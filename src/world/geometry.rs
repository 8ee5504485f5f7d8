//! Static level geometry
//!
//! Builds the watertight corridor mesh for a maze grid: one quad per
//! open/solid boundary plus unconditional floor and ceiling quads for
//! every open cell. Faces are emitted as four fresh vertices each (no
//! welding); normals and tangents are derived in full-mesh passes over
//! the finished index stream.

use crate::math::{Vec2, Vec3};
use crate::world::atlas::{AtlasLayout, TileUv};
use crate::world::map::MapGrid;

/// One mesh vertex. Color is a per-vertex tint (white unless a face
/// asks otherwise); tangents feed normal mapping.
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
    pub uv: Vec2,
    pub normal: Vec3,
    pub tangent: Vec3,
}

impl Vertex {
    fn at(position: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            color: Vec3::ONE,
            uv,
            normal: Vec3::ZERO,
            tangent: Vec3::ZERO,
        }
    }
}

/// Triangle mesh under construction: a vertex list plus an index list
/// in groups of three.
#[derive(Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a unit quad on one boundary plane of cell `(x, z)`.
    ///
    /// `axis` picks the plane (0 = X wall, 1 = floor/ceiling, 2 = Z
    /// wall); `positive` puts the quad on the far side of the cell and
    /// mirrors the winding so the face points back into the cell.
    /// Winding is `(0,1,2),(3,2,1)` for the near side and
    /// `(2,1,0),(1,2,3)` for the far side.
    pub fn add_face(&mut self, x: usize, z: usize, positive: bool, axis: usize, uv: &TileUv) {
        let offset = self.vertices.len() as u32;

        let side = if positive { 1.0 } else { 0.0 };
        let axis1 = (axis + 1) % 3;
        let axis2 = (axis + 2) % 3;

        let mut corners = [Vec3::ZERO; 4];
        for corner in &mut corners {
            corner.set_axis(axis, side);
        }
        corners[1].set_axis(axis1, 1.0);
        corners[2].set_axis(axis2, 1.0);
        corners[3].set_axis(axis1, 1.0);
        corners[3].set_axis(axis2, 1.0);

        // Z-plane quads sweep u along the first in-plane axis; X/Y
        // quads sweep v, keeping wall textures upright all the way
        // around a corner.
        let uvs = if axis == 2 {
            [
                Vec2::new(uv.u_max, uv.v_max),
                Vec2::new(uv.u_min, uv.v_max),
                Vec2::new(uv.u_max, uv.v_min),
                Vec2::new(uv.u_min, uv.v_min),
            ]
        } else {
            [
                Vec2::new(uv.u_max, uv.v_max),
                Vec2::new(uv.u_max, uv.v_min),
                Vec2::new(uv.u_min, uv.v_max),
                Vec2::new(uv.u_min, uv.v_min),
            ]
        };

        let cell_origin = Vec3::new(x as f32, 0.0, z as f32);
        for (corner, uv) in corners.iter().zip(uvs) {
            self.vertices.push(Vertex::at(*corner + cell_origin, uv));
        }

        if positive {
            self.indices.extend_from_slice(&[
                offset + 2, offset + 1, offset,
                offset + 1, offset + 2, offset + 3,
            ]);
        } else {
            self.indices.extend_from_slice(&[
                offset, offset + 1, offset + 2,
                offset + 3, offset + 2, offset + 1,
            ]);
        }
    }

    /// Face count so far (two triangles per quad).
    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    /// Derive vertex normals from the triangle stream: accumulate each
    /// triangle's face normal into its three vertices, then normalize.
    pub fn calculate_normals(&mut self) {
        for v in &mut self.vertices {
            v.normal = Vec3::ZERO;
        }

        for tri in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let edge1 = self.vertices[i1].position - self.vertices[i0].position;
            let edge2 = self.vertices[i2].position - self.vertices[i0].position;
            let normal = edge1.cross(edge2).normalize();

            for i in [i0, i1, i2] {
                self.vertices[i].normal = self.vertices[i].normal + normal;
            }
        }

        for v in &mut self.vertices {
            v.normal = v.normal.normalize();
        }
    }

    /// Derive tangents from positions and UVs, accumulated per triangle
    /// like the normals pass.
    pub fn calculate_tangents(&mut self) {
        for v in &mut self.vertices {
            v.tangent = Vec3::ZERO;
        }

        for tri in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let edge1 = self.vertices[i1].position - self.vertices[i0].position;
            let edge2 = self.vertices[i2].position - self.vertices[i0].position;
            let duv1 = self.vertices[i1].uv - self.vertices[i0].uv;
            let duv2 = self.vertices[i2].uv - self.vertices[i0].uv;

            let det = duv1.x * duv2.y - duv2.x * duv1.y;
            if det.abs() < 1e-8 {
                continue;
            }
            let r = 1.0 / det;
            let tangent = (edge1.scale(duv2.y) - edge2.scale(duv1.y)).scale(r);

            for i in [i0, i1, i2] {
                self.vertices[i].tangent = self.vertices[i].tangent + tangent;
            }
        }

        for v in &mut self.vertices {
            v.tangent = v.tangent.normalize();
        }
    }
}

/// Walk the grid interior and assemble the full static level mesh.
///
/// For every open cell: a wall quad toward each solid 4-neighbor, one
/// floor quad, one ceiling quad. The result is watertight — walls sit
/// exactly on solid/open boundaries and the border ring guarantees no
/// open cell ever faces the void.
pub fn build_level_mesh(grid: &MapGrid, atlas: &AtlasLayout) -> MeshData {
    let mut mesh = MeshData::new();

    for (x, z, cell) in grid.iter_interior() {
        if cell.solid {
            continue;
        }

        let wall_uv = atlas.tile_uv(cell.wall_value());
        let floor_uv = atlas.tile_uv(cell.floor_value());
        let ceiling_uv = atlas.tile_uv(cell.ceiling_value());

        if grid.is_solid(x - 1, z) {
            mesh.add_face(x, z, false, 0, &wall_uv);
        }
        if grid.is_solid(x, z - 1) {
            mesh.add_face(x, z, false, 2, &wall_uv);
        }
        if grid.is_solid(x + 1, z) {
            mesh.add_face(x, z, true, 0, &wall_uv);
        }
        if grid.is_solid(x, z + 1) {
            mesh.add_face(x, z, true, 2, &wall_uv);
        }

        mesh.add_face(x, z, false, 1, &floor_uv);
        mesh.add_face(x, z, true, 1, &ceiling_uv);
    }

    mesh.calculate_normals();
    mesh.calculate_tangents();
    mesh
}

/// The shared door slab: a thin cuboid with the four side faces and no
/// top/bottom caps (it sits embedded in a wall opening). Normals are
/// authored; tangents derived. Instanced per door with a runtime
/// transform of scale (0.5, 0.5, 0.05).
pub fn door_mesh() -> MeshData {
    let front = Vec3::new(0.0, 0.0, -1.0);
    let back = Vec3::new(0.0, 0.0, 1.0);

    let corners = [
        (Vec3::new(-1.0, -1.0, -1.0), Vec2::new(0.0, 1.0), front),
        (Vec3::new(1.0, -1.0, -1.0), Vec2::new(1.0, 1.0), front),
        (Vec3::new(-1.0, 1.0, -1.0), Vec2::new(0.0, 0.0), front),
        (Vec3::new(1.0, 1.0, -1.0), Vec2::new(1.0, 0.0), front),
        (Vec3::new(-1.0, -1.0, 1.0), Vec2::new(0.0, 1.0), back),
        (Vec3::new(1.0, -1.0, 1.0), Vec2::new(1.0, 1.0), back),
        (Vec3::new(-1.0, 1.0, 1.0), Vec2::new(0.0, 0.0), back),
        (Vec3::new(1.0, 1.0, 1.0), Vec2::new(1.0, 0.0), back),
    ];

    let mut mesh = MeshData::new();
    for (position, uv, normal) in corners {
        mesh.vertices.push(Vertex {
            position,
            color: Vec3::ONE,
            uv,
            normal,
            tangent: Vec3::ZERO,
        });
    }

    mesh.indices.extend_from_slice(&[
        0, 2, 3, 3, 1, 0, // front
        6, 4, 5, 7, 6, 5, // back
        1, 3, 7, 7, 5, 1, // right
        4, 6, 2, 0, 4, 2, // left
    ]);

    mesh.calculate_tangents();
    mesh
}

/// Unit quad in the XZ plane, centered on the origin, facing up. Used
/// for the sludge surface, scaled to cover the whole grid.
pub fn unit_quad() -> MeshData {
    let up = Vec3::UP;
    let right = Vec3::new(1.0, 0.0, 0.0);

    let corners = [
        (Vec3::new(-0.5, 0.0, -0.5), Vec2::new(0.0, 0.0)),
        (Vec3::new(-0.5, 0.0, 0.5), Vec2::new(0.0, 1.0)),
        (Vec3::new(0.5, 0.0, -0.5), Vec2::new(1.0, 0.0)),
        (Vec3::new(0.5, 0.0, 0.5), Vec2::new(1.0, 1.0)),
    ];

    let mut mesh = MeshData::new();
    for (position, uv) in corners {
        mesh.vertices.push(Vertex {
            position,
            color: Vec3::ONE,
            uv,
            normal: up,
            tangent: right,
        });
    }
    mesh.indices.extend_from_slice(&[0, 1, 2, 3, 2, 1]);
    mesh
}
