//! Compiles every GLSL stage under `shaders/` to `$OUT_DIR/<name>.spv`.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::{env, fs};

use shaderc::{CompileOptions, Compiler, EnvVersion, OptimizationLevel, ShaderKind, TargetEnv};

/// Source file and pipeline stage, in the order the renderer binds them.
const STAGES: &[(&str, ShaderKind)] = &[
    ("mesh.vert", ShaderKind::Vertex),
    ("mesh.frag", ShaderKind::Fragment),
];

fn main() {
    if let Err(e) = compile_all() {
        panic!("shader build failed: {e}");
    }
}

fn compile_all() -> Result<(), Box<dyn Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let compiler = Compiler::new().ok_or("shaderc compiler unavailable")?;
    let mut options = CompileOptions::new().ok_or("shaderc options unavailable")?;
    options.set_target_env(TargetEnv::Vulkan, EnvVersion::Vulkan1_0 as u32);
    options.set_optimization_level(OptimizationLevel::Performance);

    for &(name, kind) in STAGES {
        let source_path = Path::new("shaders").join(name);
        println!("cargo:rerun-if-changed={}", source_path.display());

        let source = fs::read_to_string(&source_path)
            .map_err(|e| format!("{}: {e}", source_path.display()))?;
        let artifact = compiler
            .compile_into_spirv(&source, kind, name, "main", Some(&options))
            .map_err(|e| format!("{name}: {e}"))?;
        if artifact.get_num_warnings() > 0 {
            println!("cargo:warning={name}: {}", artifact.get_warning_messages());
        }

        let spv: &[u8] = bytemuck::cast_slice(artifact.as_binary());
        fs::write(out_dir.join(format!("{name}.spv")), spv)?;
    }
    Ok(())
}
