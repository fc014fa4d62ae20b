//! SPIR-V loading and shader module creation.
//!
//! A [`Shader`] owns one `vk::ShaderModule` plus the stage and entry point
//! the pipeline needs to reference it. Blobs come from disk or memory;
//! either way the byte length must be a whole number of SPIR-V words.

use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Pipeline stage a shader module is compiled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn vk_flags(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A compiled shader module and the metadata to bind it to a pipeline.
pub struct Shader {
    device: Arc<Device>,
    raw: vk::ShaderModule,
    stage: ShaderStage,
    entry: CString,
}

impl Shader {
    /// Reads a SPIR-V file and creates the shader module from it.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, when its length is not a
    /// multiple of 4, or when module creation fails.
    pub fn from_spirv_file(
        device: Arc<Device>,
        file: &Path,
        stage: ShaderStage,
        entry: &str,
    ) -> RhiResult<Self> {
        debug!("Reading {} shader: {}", stage, file.display());

        let blob = std::fs::read(file)
            .map_err(|e| RhiError::ShaderError(format!("Cannot read {}: {}", file.display(), e)))?;

        Self::from_spirv_bytes(device, &blob, stage, entry)
    }

    /// Creates the shader module from an in-memory SPIR-V blob.
    ///
    /// `entry` is the function the pipeline stage starts at, conventionally
    /// `"main"`.
    ///
    /// # Errors
    ///
    /// Fails when the blob length is not a multiple of 4, when the entry
    /// point name contains an interior NUL, or when module creation fails.
    pub fn from_spirv_bytes(
        device: Arc<Device>,
        spirv: &[u8],
        stage: ShaderStage,
        entry: &str,
    ) -> RhiResult<Self> {
        let name = CString::new(entry)
            .map_err(|e| RhiError::ShaderError(format!("Bad entry point name: {}", e)))?;
        let code = spirv_words(spirv)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let raw = unsafe { device.handle().create_shader_module(&create_info, None)? };

        info!("Shader module created ({} stage, entry '{}')", stage, entry);

        Ok(Self { device, raw, stage, entry: name })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.raw
    }

    /// Builds the stage description for pipeline creation.
    ///
    /// The returned struct borrows this shader's module handle and entry
    /// point name and must not outlive it.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .module(self.raw)
            .stage(self.stage.vk_flags())
            .name(&self.entry)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_shader_module(self.raw, None) };
        debug!("Shader module destroyed ({} stage)", self.stage);
    }
}

/// Converts a SPIR-V byte stream into code words, enforcing 4-byte alignment.
fn spirv_words(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if !bytes.len().is_multiple_of(4) {
        return Err(RhiError::ShaderError(format!(
            "SPIR-V code must be 4-byte aligned, got {} bytes",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_flag_mapping() {
        assert_eq!(ShaderStage::Vertex.vk_flags(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(
            ShaderStage::Fragment.vk_flags(),
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ShaderStage::Vertex.name(), "vertex");
        assert_eq!(ShaderStage::Fragment.to_string(), "fragment");
    }

    #[test]
    fn test_misaligned_spirv_is_rejected() {
        let misaligned = vec![0u8; 5];
        assert!(matches!(
            spirv_words(&misaligned),
            Err(RhiError::ShaderError(_))
        ));
    }

    #[test]
    fn test_spirv_words_are_little_endian() {
        // The SPIR-V magic number, byte order as it appears on disk
        let bytes = [0x03, 0x02, 0x23, 0x07];
        let words = spirv_words(&bytes).unwrap();
        assert_eq!(words, vec![0x0723_0203]);
    }

    #[test]
    fn test_empty_spirv_produces_no_words() {
        let words = spirv_words(&[]).unwrap();
        assert!(words.is_empty());
    }
}
