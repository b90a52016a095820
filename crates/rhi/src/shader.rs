//! SPIR-V shader modules.
//!
//! Shaders ship as precompiled `.spv` files (see `shaders/compile.sh`);
//! [`Shader`] loads one, validates the word stream, and hands pipeline
//! creation its `PipelineShaderStageCreateInfo`. Failing to load a shader is
//! a hard error at startup rather than something discovered mid-frame.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use aurora_rhi::device::Device;
//! use aurora_rhi::shader::{Shader, ShaderStage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), aurora_rhi::RhiError> {
//! let vert = Shader::from_spirv_file(
//!     device.clone(),
//!     Path::new("shaders/mesh.vert.spv"),
//!     ShaderStage::Vertex,
//!     "main",
//! )?;
//! let frag = Shader::from_spirv_file(
//!     device,
//!     Path::new("shaders/mesh.frag.spv"),
//!     ShaderStage::Fragment,
//!     "main",
//! )?;
//! let stages = [vert.stage_create_info(), frag.stage_create_info()];
//! # Ok(())
//! # }
//! ```

use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// First word of every valid SPIR-V binary.
const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Pipeline stage a shader module is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Reassembles raw bytes into the little-endian 32-bit words SPIR-V is
/// defined in, rejecting input that cannot be a SPIR-V binary.
///
/// Catches the two cheap-to-detect mistakes: a byte length that is not a
/// multiple of 4, and a first word that is not the SPIR-V magic number
/// (typically a GLSL source file passed in by accident).
fn spirv_words(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if !bytes.len().is_multiple_of(4) {
        return Err(RhiError::ShaderError(format!(
            "SPIR-V length must be a multiple of 4, got {} bytes",
            bytes.len()
        )));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect();

    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        Some(&other) => Err(RhiError::ShaderError(format!(
            "not a SPIR-V binary (first word {other:#010x}, expected {SPIRV_MAGIC:#010x})"
        ))),
        None => Err(RhiError::ShaderError("empty SPIR-V binary".into())),
    }
}

/// A `VkShaderModule` together with its stage and entry point.
///
/// That triple is exactly what pipeline creation needs; the module is
/// destroyed on drop.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: CString,
}

impl Shader {
    /// Reads a `.spv` file and creates a shader module from it.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not valid SPIR-V, or the
    /// driver rejects the module.
    pub fn from_spirv_file(
        device: Arc<Device>,
        path: &Path,
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("cannot read shader {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), size = bytes.len(), "loaded {stage} shader");

        Self::from_spirv_bytes(device, &bytes, stage, entry_point)
    }

    /// Creates a shader module from an in-memory SPIR-V binary.
    ///
    /// `entry_point` is the function the pipeline will invoke, `"main"` for
    /// anything produced by glslc.
    ///
    /// # Errors
    ///
    /// Fails when the bytes are not valid SPIR-V, the entry point name
    /// contains an interior NUL, or module creation fails.
    pub fn from_spirv_bytes(
        device: Arc<Device>,
        bytes: &[u8],
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        let code = spirv_words(bytes)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        let entry_point = CString::new(entry_point)
            .map_err(|e| RhiError::ShaderError(format!("bad entry point name: {e}")))?;

        info!(entry = ?entry_point, "{stage} shader module created");

        Ok(Self {
            device,
            module,
            stage,
            entry_point,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    pub fn entry_point(&self) -> &std::ffi::CStr {
        &self.entry_point
    }

    /// Stage create info for pipeline creation.
    ///
    /// Borrows the entry point name, so the returned struct must not
    /// outlive this shader.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
        debug!("{} shader module destroyed", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spirv_fixture(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_stage_flag_mapping() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(ShaderStage::Vertex.to_string(), "vertex");
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }

    #[test]
    fn test_words_roundtrip_little_endian() {
        let bytes = spirv_fixture(&[SPIRV_MAGIC, 0x0001_0000, 42]);
        let words = spirv_words(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000, 42]);
    }

    #[test]
    fn test_misaligned_input_is_rejected() {
        let mut bytes = spirv_fixture(&[SPIRV_MAGIC]);
        bytes.push(0);
        assert!(matches!(
            spirv_words(&bytes),
            Err(RhiError::ShaderError(_))
        ));
    }

    #[test]
    fn test_wrong_magic_is_rejected() {
        // Looks like a GLSL source file fed in by mistake.
        let bytes = *b"#version 450\0\0\0\0";
        let err = spirv_words(&bytes).unwrap_err();
        assert!(matches!(err, RhiError::ShaderError(_)));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(spirv_words(&[]).is_err());
    }
}
