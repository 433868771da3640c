use serde::{Deserialize, Serialize};

/// Module-wide settings, fixed when a [`Module`](crate::Module) is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// SPIR-V version, as `(major, minor)`.
    pub version: (u8, u8),

    /// Generator magic number (the upper 16 bits are a registered tool ID).
    pub generator: u32,

    pub execution_model: spirv::ExecutionModel,
    pub memory_model: spirv::MemoryModel,

    /// Origin convention added to fragment entry-points, `OriginUpperLeft` for
    /// Vulkan (or `OriginLowerLeft` for OpenGL).
    pub fragment_origin: spirv::ExecutionMode,

    /// Deepest expression nesting lowered before giving up.
    pub max_expr_depth: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            version: (1, 0),
            generator: 0,
            execution_model: spirv::ExecutionModel::Vertex,
            memory_model: spirv::MemoryModel::GLSL450,
            fragment_origin: spirv::ExecutionMode::OriginUpperLeft,
            max_expr_depth: 256,
        }
    }
}

impl BuildConfig {
    pub fn new(execution_model: spirv::ExecutionModel) -> Self {
        Self { execution_model, ..Self::default() }
    }

    /// The version word of the module header.
    pub fn version_word(&self) -> u32 {
        let (major, minor) = self.version;
        (u32::from(major) << 16) | (u32::from(minor) << 8)
    }
}
