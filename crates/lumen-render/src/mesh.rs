//! Vertex layout, mesh loading and GPU upload.

use std::mem::{offset_of, size_of};
use std::path::Path;

use ash::vk;
use hashbrown::HashMap;
use lumen_gpu::memory::create_device_local_buffer;
use lumen_gpu::{CommandPool, GpuBuffer, GpuContext};
use tracing::info;

use crate::error::{RenderError, Result};

/// Interleaved vertex as consumed by the mesh shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl Vertex {
    pub const fn new(position: [f32; 3], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position,
            color,
            tex_coord,
        }
    }

    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    /// Locations 0, 1 and 2: position, color, texture coordinate.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Self, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Self, color) as u32),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(2)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(offset_of!(Self, tex_coord) as u32),
        ]
    }

    fn key(&self) -> [u32; 8] {
        bytemuck::cast(*self)
    }
}

/// CPU-side indexed triangle list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Two stacked textured quads.
    pub fn demo_quads() -> Self {
        const WHITE: [f32; 3] = [1.0, 1.0, 1.0];
        let corners = [
            ([-0.5, -0.5], [1.0, 0.0, 0.0], [0.0, 0.0]),
            ([0.5, -0.5], [0.0, 1.0, 0.0], [1.0, 0.0]),
            ([0.5, 0.5], [0.0, 0.0, 1.0], [1.0, 1.0]),
            ([-0.5, 0.5], WHITE, [0.0, 1.0]),
        ];

        let vertices = [0.0, -0.5]
            .into_iter()
            .flat_map(|z| {
                corners
                    .iter()
                    .map(move |&([x, y], color, uv)| Vertex::new([x, y, z], color, uv))
            })
            .collect();

        Self {
            vertices,
            indices: vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4],
        }
    }

    /// Load every model in a Wavefront OBJ file into one mesh.
    ///
    /// Faces are triangulated, texture V is flipped to Vulkan's top-left
    /// origin and vertex color is white. With `deduplicate`, identical
    /// vertices share one index.
    pub fn load_obj(path: &Path, deduplicate: bool) -> Result<Self> {
        let options = tobj::LoadOptions {
            single_index: false,
            triangulate: true,
            ..Default::default()
        };
        let (models, _materials) =
            tobj::load_obj(path, &options).map_err(|e| RenderError::Asset {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut builder = MeshBuilder::new(deduplicate);
        for model in &models {
            let mesh = &model.mesh;
            builder.add(
                &mesh.positions,
                &mesh.texcoords,
                &mesh.indices,
                &mesh.texcoord_indices,
            );
        }
        let data = builder.finish();

        if data.is_empty() {
            return Err(RenderError::Asset {
                path: path.display().to_string(),
                reason: "no triangles".to_string(),
            });
        }

        info!(
            "Loaded {}: {} vertices, {} indices",
            path.display(),
            data.vertices.len(),
            data.indices.len()
        );
        Ok(data)
    }
}

/// Accumulates OBJ index streams into a [`MeshData`].
#[derive(Debug, Default)]
pub struct MeshBuilder {
    data: MeshData,
    unique: Option<HashMap<[u32; 8], u32>>,
}

impl MeshBuilder {
    pub fn new(deduplicate: bool) -> Self {
        Self {
            data: MeshData::default(),
            unique: deduplicate.then(HashMap::new),
        }
    }

    /// Add one model given as flat position/texcoord arrays and separate
    /// index streams. An empty `texcoord_indices` reuses `indices`.
    pub fn add(
        &mut self,
        positions: &[f32],
        texcoords: &[f32],
        indices: &[u32],
        texcoord_indices: &[u32],
    ) {
        for (i, &index) in indices.iter().enumerate() {
            let p = index as usize * 3;
            let Some(position) = positions.get(p..p + 3) else {
                continue;
            };

            let t = texcoord_indices.get(i).copied().unwrap_or(index) as usize * 2;
            let tex_coord = texcoords
                .get(t..t + 2)
                .map_or([0.0, 0.0], |uv| [uv[0], 1.0 - uv[1]]);

            let vertex = Vertex::new(
                [position[0], position[1], position[2]],
                [1.0, 1.0, 1.0],
                tex_coord,
            );
            self.push(vertex);
        }
    }

    fn push(&mut self, vertex: Vertex) {
        let vertices = &mut self.data.vertices;
        let index = match &mut self.unique {
            Some(unique) => *unique.entry(vertex.key()).or_insert_with(|| {
                vertices.push(vertex);
                (vertices.len() - 1) as u32
            }),
            None => {
                vertices.push(vertex);
                (vertices.len() - 1) as u32
            }
        };
        self.data.indices.push(index);
    }

    pub fn finish(self) -> MeshData {
        self.data
    }
}

/// Device-local vertex and index buffers.
pub struct Mesh {
    pub vertex_buffer: GpuBuffer,
    pub index_buffer: GpuBuffer,
    pub index_count: u32,
}

impl Mesh {
    /// Upload through staging buffers; blocks until the copies finish.
    pub fn upload(gpu: &GpuContext, pool: &CommandPool, data: &MeshData) -> Result<Self> {
        if data.is_empty() {
            return Err(RenderError::Config("mesh has no indices".to_string()));
        }

        let vertex_buffer = create_device_local_buffer(
            gpu,
            pool,
            &data.vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            "Mesh vertices",
        )?;
        let index_buffer = match create_device_local_buffer(
            gpu,
            pool,
            &data.indices,
            vk::BufferUsageFlags::INDEX_BUFFER,
            "Mesh indices",
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                let mut vertex_buffer = vertex_buffer;
                gpu.allocator().lock().free_buffer(&mut vertex_buffer)?;
                return Err(e.into());
            }
        };

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: data.index_count(),
        })
    }

    /// Free both buffers. The device must be idle.
    pub fn destroy(&mut self, gpu: &GpuContext) -> Result<()> {
        let mut allocator = gpu.allocator().lock();
        allocator.free_buffer(&mut self.vertex_buffer)?;
        allocator.free_buffer(&mut self.index_buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_shader_inputs() {
        assert_eq!(size_of::<Vertex>(), 32);
        assert_eq!(Vertex::binding_description().stride, 32);

        let attributes = Vertex::attribute_descriptions();
        let offsets: Vec<u32> = attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        assert_eq!(attributes[2].format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn demo_quads_are_two_layers() {
        let mesh = MeshData::demo_quads();
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.index_count(), 12);
        assert_eq!(mesh.vertices[0].position, [-0.5, -0.5, 0.0]);
        assert_eq!(mesh.vertices[4].position, [-0.5, -0.5, -0.5]);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    // A unit quad as two triangles sharing an edge.
    const POSITIONS: [f32; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
    const TEXCOORDS: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    const INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

    #[test]
    fn deduplication_shares_vertices() {
        let mut builder = MeshBuilder::new(true);
        builder.add(&POSITIONS, &TEXCOORDS, &INDICES, &INDICES);
        let mesh = builder.finish();

        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn without_deduplication_every_corner_is_new() {
        let mut builder = MeshBuilder::new(false);
        builder.add(&POSITIONS, &TEXCOORDS, &INDICES, &INDICES);
        let mesh = builder.finish();

        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.indices, (0..6).collect::<Vec<u32>>());
    }

    #[test]
    fn texture_v_is_flipped_and_color_is_white() {
        let mut builder = MeshBuilder::new(true);
        builder.add(&POSITIONS, &TEXCOORDS, &INDICES, &[]);
        let mesh = builder.finish();

        assert_eq!(mesh.vertices[0].tex_coord, [0.0, 1.0]);
        assert_eq!(mesh.vertices[2].tex_coord, [1.0, 0.0]);
        assert!(mesh.vertices.iter().all(|v| v.color == [1.0, 1.0, 1.0]));
    }

    #[test]
    fn missing_texcoords_default_to_origin() {
        let mut builder = MeshBuilder::new(false);
        builder.add(&POSITIONS, &[], &INDICES[..3], &[]);
        let mesh = builder.finish();
        assert!(mesh.vertices.iter().all(|v| v.tex_coord == [0.0, 0.0]));
    }

    #[test]
    fn missing_file_is_an_asset_error() {
        let err = MeshData::load_obj(Path::new("does/not/exist.obj"), true).unwrap_err();
        assert!(matches!(err, RenderError::Asset { .. }));
    }
}
