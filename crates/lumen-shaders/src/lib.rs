//! Shaders for the Lumen renderer.
//!
//! GLSL sources live in `shaders/` and are compiled to SPIR-V at build time
//! using shaderc.

use std::sync::OnceLock;

/// Embedded SPIR-V shader bytecode (raw bytes, may not be aligned).
mod spirv_bytes {
    /// Mesh vertex shader: transforms by model/view/projection.
    pub static MESH_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/mesh.vert.spv"));

    /// Mesh fragment shader: texture sample modulated by vertex color.
    pub static MESH_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/mesh.frag.spv"));
}

/// Convert byte slice to aligned u32 Vec (SPIR-V requires 4-byte alignment).
fn bytes_to_spirv(bytes: &[u8]) -> Vec<u32> {
    assert!(
        bytes.len() % 4 == 0,
        "SPIR-V bytecode must be 4-byte aligned"
    );
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

static MESH_VERT_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();
static MESH_FRAG_SPIRV: OnceLock<Vec<u32>> = OnceLock::new();

/// Get the mesh vertex shader as u32 slice for Vulkan.
pub fn mesh_vertex_shader() -> &'static [u32] {
    MESH_VERT_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::MESH_VERT))
}

/// Get the mesh fragment shader as u32 slice for Vulkan.
pub fn mesh_fragment_shader() -> &'static [u32] {
    MESH_FRAG_SPIRV.get_or_init(|| bytes_to_spirv(spirv_bytes::MESH_FRAG))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn mesh_shaders_load() {
        for shader in [mesh_vertex_shader(), mesh_fragment_shader()] {
            assert_eq!(shader[0], SPIRV_MAGIC, "Invalid SPIR-V magic number");
            assert!(shader.len() > 20, "Shader too small");
        }
    }

    #[test]
    #[should_panic(expected = "4-byte aligned")]
    fn unaligned_bytecode_is_rejected() {
        bytes_to_spirv(&[0x03, 0x02, 0x23]);
    }
}
