// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Texture bindings: sampled, depth and storage textures.

use crate::bindings::visible_to::ShaderStages;
use crate::bindings::{BindingInfo, BindingKind};
use crate::imp::{BindingLayout, BindingResource, TextureHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSampleType {
    Float { filterable: bool },
    Depth,
    Sint,
    Uint,
}

impl Default for TextureSampleType {
    fn default() -> Self {
        TextureSampleType::Float { filterable: true }
    }
}

impl TextureSampleType {
    const fn as_str(self) -> &'static str {
        match self {
            TextureSampleType::Float { filterable: true } => "float",
            TextureSampleType::Float { filterable: false } => "unfilterable-float",
            TextureSampleType::Depth => "depth",
            TextureSampleType::Sint => "sint",
            TextureSampleType::Uint => "uint",
        }
    }
    const fn wgsl_scalar(self) -> &'static str {
        match self {
            TextureSampleType::Float { .. } | TextureSampleType::Depth => "f32",
            TextureSampleType::Sint => "i32",
            TextureSampleType::Uint => "u32",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureViewDimension {
    D1,
    #[default]
    D2,
    D2Array,
    Cube,
    CubeArray,
    D3,
}

impl TextureViewDimension {
    pub const fn wgsl_suffix(self) -> &'static str {
        match self {
            TextureViewDimension::D1 => "1d",
            TextureViewDimension::D2 => "2d",
            TextureViewDimension::D2Array => "2d_array",
            TextureViewDimension::Cube => "cube",
            TextureViewDimension::CubeArray => "cube_array",
            TextureViewDimension::D3 => "3d",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageTextureAccess {
    #[default]
    WriteOnly,
    ReadOnly,
    ReadWrite,
}

impl StorageTextureAccess {
    pub const fn wgsl_access(self) -> &'static str {
        match self {
            StorageTextureAccess::WriteOnly => "write",
            StorageTextureAccess::ReadOnly => "read",
            StorageTextureAccess::ReadWrite => "read_write",
        }
    }
}

/// Formats usable as storage textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageTextureFormat {
    #[default]
    Rgba8Unorm,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    R32Uint,
    R32Sint,
    Rg32Float,
}

impl StorageTextureFormat {
    pub const fn wgsl_name(self) -> &'static str {
        match self {
            StorageTextureFormat::Rgba8Unorm => "rgba8unorm",
            StorageTextureFormat::Rgba8Snorm => "rgba8snorm",
            StorageTextureFormat::Rgba8Uint => "rgba8uint",
            StorageTextureFormat::Rgba8Sint => "rgba8sint",
            StorageTextureFormat::Bgra8Unorm => "bgra8unorm",
            StorageTextureFormat::Rgba16Float => "rgba16float",
            StorageTextureFormat::Rgba32Float => "rgba32float",
            StorageTextureFormat::R32Float => "r32float",
            StorageTextureFormat::R32Uint => "r32uint",
            StorageTextureFormat::R32Sint => "r32sint",
            StorageTextureFormat::Rg32Float => "rg32float",
        }
    }
}

/// What kind of texture the shader expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureBindingType {
    Sampled {
        sample_type: TextureSampleType,
        view_dimension: TextureViewDimension,
        multisampled: bool,
    },
    Depth {
        view_dimension: TextureViewDimension,
        multisampled: bool,
    },
    Storage {
        format: StorageTextureFormat,
        access: StorageTextureAccess,
        view_dimension: TextureViewDimension,
    },
}

impl Default for TextureBindingType {
    fn default() -> Self {
        TextureBindingType::Sampled {
            sample_type: TextureSampleType::default(),
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        }
    }
}

impl TextureBindingType {
    fn kind(&self) -> BindingKind {
        match self {
            TextureBindingType::Sampled { .. } => BindingKind::Texture,
            TextureBindingType::Depth { .. } => BindingKind::Depth,
            TextureBindingType::Storage { .. } => BindingKind::StorageTexture,
        }
    }

    /// Everything but the visibility that must match between two layouts.
    fn layout_key(&self) -> String {
        match *self {
            TextureBindingType::Sampled {
                sample_type,
                view_dimension,
                multisampled,
            } => format!(
                "texture,{},{},{multisampled},",
                sample_type.as_str(),
                view_dimension.wgsl_suffix()
            ),
            TextureBindingType::Depth {
                view_dimension,
                multisampled,
            } => format!("depth,{},{multisampled},", view_dimension.wgsl_suffix()),
            TextureBindingType::Storage {
                format,
                access,
                view_dimension,
            } => format!(
                "storage,{},{},{},",
                format.wgsl_name(),
                access.wgsl_access(),
                view_dimension.wgsl_suffix()
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextureBindingParams {
    pub label: String,
    pub name: Option<String>,
    pub visibility: ShaderStages,
    pub binding_type: TextureBindingType,
    pub texture: Option<TextureHandle>,
}

#[derive(Debug, Clone)]
pub struct TextureBinding {
    info: BindingInfo,
    binding_type: TextureBindingType,
    texture: Option<TextureHandle>,
    resource_generation: u64,
    layout_generation: u64,
}

impl TextureBinding {
    pub fn new(params: TextureBindingParams) -> Self {
        let mut info = BindingInfo::new(
            &params.label,
            params.name.as_deref(),
            params.binding_type.kind(),
            params.visibility,
        );
        info.cache_key.push_str(&params.binding_type.layout_key());
        TextureBinding {
            info,
            binding_type: params.binding_type,
            texture: params.texture,
            resource_generation: 0,
            layout_generation: 0,
        }
    }

    pub fn info(&self) -> &BindingInfo {
        &self.info
    }

    pub fn binding_type(&self) -> TextureBindingType {
        self.binding_type
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    /// Points the binding at another texture view. Bind groups holding it rebuild their group.
    pub fn set_texture(&mut self, texture: TextureHandle) {
        self.texture = Some(texture);
        self.resource_generation += 1;
    }

    /// Changes what the shader expects. Bind groups holding it rebuild their layout.
    pub fn set_binding_type(&mut self, binding_type: TextureBindingType) {
        if binding_type == self.binding_type {
            return;
        }
        *self = TextureBinding {
            resource_generation: self.resource_generation,
            layout_generation: self.layout_generation + 1,
            ..TextureBinding::new(TextureBindingParams {
                label: self.info.label.clone(),
                name: Some(self.info.name.clone()),
                visibility: self.info.visibility,
                binding_type,
                texture: self.texture,
            })
        };
    }

    pub fn resource_layout_cache_key(&self) -> String {
        format!(
            "{}{},",
            self.binding_type.layout_key(),
            self.info.visibility.bits()
        )
    }

    pub(crate) fn layout(&self) -> BindingLayout {
        match self.binding_type {
            TextureBindingType::Sampled {
                sample_type,
                view_dimension,
                multisampled,
            } => BindingLayout::Texture {
                sample_type,
                view_dimension,
                multisampled,
            },
            TextureBindingType::Depth {
                view_dimension,
                multisampled,
            } => BindingLayout::Texture {
                sample_type: TextureSampleType::Depth,
                view_dimension,
                multisampled,
            },
            TextureBindingType::Storage {
                format,
                access,
                view_dimension,
            } => BindingLayout::StorageTexture {
                access,
                format,
                view_dimension,
            },
        }
    }

    pub(crate) fn resource(&self) -> Option<BindingResource> {
        self.texture.map(BindingResource::TextureView)
    }

    pub(crate) fn generations(&self) -> (u64, u64) {
        (self.resource_generation, self.layout_generation)
    }

    pub fn wgsl_group_fragment(&self) -> String {
        let ty = match self.binding_type {
            TextureBindingType::Sampled {
                sample_type,
                view_dimension,
                multisampled: false,
            } => format!(
                "texture_{}<{}>",
                view_dimension.wgsl_suffix(),
                sample_type.wgsl_scalar()
            ),
            TextureBindingType::Sampled {
                sample_type,
                view_dimension,
                multisampled: true,
            } => format!(
                "texture_multisampled_{}<{}>",
                view_dimension.wgsl_suffix(),
                sample_type.wgsl_scalar()
            ),
            TextureBindingType::Depth {
                view_dimension,
                multisampled: false,
            } => format!("texture_depth_{}", view_dimension.wgsl_suffix()),
            TextureBindingType::Depth {
                view_dimension,
                multisampled: true,
            } => format!("texture_depth_multisampled_{}", view_dimension.wgsl_suffix()),
            TextureBindingType::Storage {
                format,
                access,
                view_dimension,
            } => format!(
                "texture_storage_{}<{}, {}>",
                view_dimension.wgsl_suffix(),
                format.wgsl_name(),
                access.wgsl_access()
            ),
        };
        format!("var {}: {ty};", self.info.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wgsl_declarations() {
        let sampled = TextureBinding::new(TextureBindingParams {
            label: "albedo_map".to_string(),
            visibility: ShaderStages::FRAGMENT,
            ..Default::default()
        });
        assert_eq!(sampled.wgsl_group_fragment(), "var albedoMap: texture_2d<f32>;");
        assert_eq!(sampled.info().cache_key, "texture,2,texture,float,2d,false,");
        assert_eq!(sampled.resource_layout_cache_key(), "texture,float,2d,false,2,");

        let storage = TextureBinding::new(TextureBindingParams {
            label: "output".to_string(),
            visibility: ShaderStages::COMPUTE,
            binding_type: TextureBindingType::Storage {
                format: StorageTextureFormat::Rgba16Float,
                access: StorageTextureAccess::WriteOnly,
                view_dimension: TextureViewDimension::D2,
            },
            ..Default::default()
        });
        assert_eq!(
            storage.wgsl_group_fragment(),
            "var output: texture_storage_2d<rgba16float, write>;"
        );
        assert_eq!(storage.info().kind, BindingKind::StorageTexture);
    }

    #[test]
    fn changing_type_bumps_layout_generation() {
        let mut binding = TextureBinding::new(TextureBindingParams {
            label: "shadow".to_string(),
            ..Default::default()
        });
        binding.set_binding_type(TextureBindingType::default());
        assert_eq!(binding.generations(), (0, 0));
        binding.set_binding_type(TextureBindingType::Depth {
            view_dimension: TextureViewDimension::D2,
            multisampled: false,
        });
        assert_eq!(binding.generations(), (0, 1));
        assert_eq!(binding.wgsl_group_fragment(), "var shadow: texture_depth_2d;");
        binding.set_texture(TextureHandle(9));
        assert_eq!(binding.generations(), (1, 1));
    }
}
