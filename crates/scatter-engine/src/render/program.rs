use anyhow::{bail, Result};

/// Runs `f` inside a validation error scope and turns a captured error into
/// `Err`.
///
/// Popping the scope waits on the device's error bookkeeping, not on queued
/// GPU work.
pub fn with_validation<T>(device: &wgpu::Device, what: &str, f: impl FnOnce() -> T) -> Result<T> {
    let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    if let Some(err) = pollster::block_on(scope.pop()) {
        log::error!("{what} failed validation: {err}");
        bail!("{what} failed validation: {err}");
    }
    Ok(value)
}

/// Compiles a WGSL module, logging compiler diagnostics.
pub fn compile(device: &wgpu::Device, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
    let module = with_validation(device, label, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    })?;

    let info = pollster::block_on(module.get_compilation_info());
    for msg in &info.messages {
        match msg.message_type {
            wgpu::CompilationMessageType::Error => log::error!("{label}: {}", msg.message),
            wgpu::CompilationMessageType::Warning => log::warn!("{label}: {}", msg.message),
            wgpu::CompilationMessageType::Info => log::debug!("{label}: {}", msg.message),
        }
    }
    if info
        .messages
        .iter()
        .any(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
    {
        bail!("shader '{label}' failed to compile");
    }
    Ok(module)
}
