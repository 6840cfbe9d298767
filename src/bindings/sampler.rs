// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Sampler bindings.

use crate::bindings::visible_to::ShaderStages;
use crate::bindings::{BindingInfo, BindingKind};
use crate::imp::{BindingLayout, BindingResource, SamplerHandle};

/// How shaders may use the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerBindingType {
    ///The sampler may interpolate between texels.
    #[default]
    Filtering,
    NonFiltering,
    ///Depth comparison sampler, `sampler_comparison` in WGSL.
    Comparison,
}

impl SamplerBindingType {
    pub const fn as_str(self) -> &'static str {
        match self {
            SamplerBindingType::Filtering => "filtering",
            SamplerBindingType::NonFiltering => "non-filtering",
            SamplerBindingType::Comparison => "comparison",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SamplerBindingParams {
    pub label: String,
    pub name: Option<String>,
    pub visibility: ShaderStages,
    pub binding_type: SamplerBindingType,
    pub sampler: Option<SamplerHandle>,
}

#[derive(Debug, Clone)]
pub struct SamplerBinding {
    info: BindingInfo,
    binding_type: SamplerBindingType,
    sampler: Option<SamplerHandle>,
    resource_generation: u64,
    layout_generation: u64,
}

impl SamplerBinding {
    pub fn new(params: SamplerBindingParams) -> Self {
        let mut info = BindingInfo::new(
            &params.label,
            params.name.as_deref(),
            BindingKind::Sampler,
            params.visibility,
        );
        info.cache_key
            .push_str(&format!("{},", params.binding_type.as_str()));
        SamplerBinding {
            info,
            binding_type: params.binding_type,
            sampler: params.sampler,
            resource_generation: 0,
            layout_generation: 0,
        }
    }

    pub fn info(&self) -> &BindingInfo {
        &self.info
    }

    pub fn binding_type(&self) -> SamplerBindingType {
        self.binding_type
    }

    pub fn sampler(&self) -> Option<SamplerHandle> {
        self.sampler
    }

    /// Swaps the sampler. Bind groups holding this binding rebuild on their next update.
    pub fn set_sampler(&mut self, sampler: SamplerHandle) {
        self.sampler = Some(sampler);
        self.resource_generation += 1;
    }

    /// Changes the sampler type. Bind groups holding this binding rebuild their layout.
    pub fn set_binding_type(&mut self, binding_type: SamplerBindingType) {
        if binding_type == self.binding_type {
            return;
        }
        *self = SamplerBinding {
            resource_generation: self.resource_generation,
            layout_generation: self.layout_generation + 1,
            ..SamplerBinding::new(SamplerBindingParams {
                label: self.info.label.clone(),
                name: Some(self.info.name.clone()),
                visibility: self.info.visibility,
                binding_type,
                sampler: self.sampler,
            })
        };
    }

    pub fn resource_layout_cache_key(&self) -> String {
        format!(
            "sampler,{},{},",
            self.binding_type.as_str(),
            self.info.visibility.bits()
        )
    }

    pub(crate) fn layout(&self) -> BindingLayout {
        BindingLayout::Sampler(self.binding_type)
    }

    pub(crate) fn resource(&self) -> Option<BindingResource> {
        self.sampler.map(BindingResource::Sampler)
    }

    pub(crate) fn generations(&self) -> (u64, u64) {
        (self.resource_generation, self.layout_generation)
    }

    pub fn wgsl_group_fragment(&self) -> String {
        let ty = match self.binding_type {
            SamplerBindingType::Comparison => "sampler_comparison",
            _ => "sampler",
        };
        format!("var {}: {ty};", self.info.name)
    }
}
