use thiserror::Error;

/// Why an export produced no image.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: no frame has been rendered yet")]
    NoData,

    #[error("invalid export size {width}x{height} at device pixel ratio {dpr}")]
    InvalidDimensions { width: f32, height: f32, dpr: f32 },

    #[error("export of {width}x{height} px exceeds the per-axis limit of {max} px")]
    DimensionTooLarge { width: u32, height: u32, max: u32 },

    #[error("export of {pixels} px exceeds the limit of {max} px")]
    AreaTooLarge { pixels: u64, max: u64 },

    #[error("export rendering failed: {0}")]
    Gpu(String),
}

impl ExportError {
    pub(crate) fn gpu(err: anyhow::Error) -> Self {
        ExportError::Gpu(format!("{err:#}"))
    }
}
