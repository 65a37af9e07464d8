// Build script for Vulkan shader compilation
//
// Compiles the GLSL sources under resources/shaders/ to SPIR-V with glslc
// when the Vulkan SDK is available. The binaries are loaded from disk at
// startup, so shader compilation stays a build-time concern.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn compile_shaders(shader_dir: &Path, glslc: &str) {
    let shader_files = match std::fs::read_dir(shader_dir) {
        Ok(files) => files,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return;
        }
    };

    for entry in shader_files.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension() else {
            continue;
        };
        if ext != "vert" && ext != "frag" {
            continue;
        }

        let out_file = {
            let mut name = path.file_name().unwrap().to_os_string();
            name.push(".spv");
            path.with_file_name(name)
        };

        let needs_compile = match (std::fs::metadata(&path), std::fs::metadata(&out_file)) {
            (Ok(src), Ok(dst)) => match (src.modified(), dst.modified()) {
                (Ok(src_time), Ok(dst_time)) => src_time > dst_time,
                _ => true,
            },
            _ => true,
        };
        if !needs_compile {
            continue;
        }

        let status = Command::new(glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {:?}", path.file_name().unwrap());
            }
            Ok(s) => {
                eprintln!(
                    "error: glslc failed for {:?} with exit code: {}",
                    path,
                    s.code().unwrap_or(-1)
                );
                panic!("Shader compilation failed");
            }
            Err(e) => {
                eprintln!("error: Failed to run glslc for {:?}: {}", path, e);
                panic!("Failed to execute shader compiler");
            }
        }
    }
}

fn main() {
    println!("cargo:rerun-if-changed=../resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };

    if !Path::new(&glslc).exists() {
        eprintln!("warning: glslc not found at {}; shader compilation skipped", glslc);
        return;
    }

    compile_shaders(&PathBuf::from("../resources/shaders"), &glslc);
}
