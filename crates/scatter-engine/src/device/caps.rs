/// Format of the linear offscreen target used by the gamma path.
pub const LINEAR_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// What the adapter can do that matters for pipeline selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// `Rgba16Float` can be rendered to.
    pub float_color_target: bool,
    /// `Rgba16Float` supports hardware blending.
    pub float_blend: bool,
    pub backend: wgpu::Backend,
    pub adapter_name: String,
}

impl Capabilities {
    pub fn detect(adapter: &wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        let features = adapter.get_texture_format_features(LINEAR_TARGET_FORMAT);
        let caps = Self::from_features(features, info.backend, info.name);
        log::debug!(
            "adapter '{}' ({:?}): float target={}, float blend={}",
            caps.adapter_name,
            caps.backend,
            caps.float_color_target,
            caps.float_blend
        );
        caps
    }

    pub fn from_features(
        features: wgpu::TextureFormatFeatures,
        backend: wgpu::Backend,
        adapter_name: String,
    ) -> Self {
        Self {
            float_color_target: features
                .allowed_usages
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING),
            float_blend: features.flags.contains(wgpu::TextureFormatFeatureFlags::BLENDABLE),
            backend,
            adapter_name,
        }
    }

    /// The gamma path needs both a float color target and float blending.
    #[inline]
    pub fn supports_gamma(&self) -> bool {
        self.float_color_target && self.float_blend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(usages: wgpu::TextureUsages, flags: wgpu::TextureFormatFeatureFlags) -> Capabilities {
        Capabilities::from_features(
            wgpu::TextureFormatFeatures { allowed_usages: usages, flags },
            wgpu::Backend::Noop,
            "test".into(),
        )
    }

    #[test]
    fn gamma_requires_target_and_blend() {
        let full = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        assert!(caps(full, wgpu::TextureFormatFeatureFlags::BLENDABLE).supports_gamma());
        assert!(!caps(full, wgpu::TextureFormatFeatureFlags::empty()).supports_gamma());
        assert!(
            !caps(wgpu::TextureUsages::TEXTURE_BINDING, wgpu::TextureFormatFeatureFlags::BLENDABLE)
                .supports_gamma()
        );
    }
}
