pub mod bundle;
pub mod converter;
pub mod export;
pub mod labels;
pub mod pipeline;
pub mod predict;

#[cfg(test)]
pub(crate) mod test_graph;

pub use crate::domain::model::{ConversionSpec, ConvertedModel, SourceArtifacts};
pub use crate::domain::ports::{ConfigProvider, ExportPipeline, Storage};
pub use crate::utils::error::Result;
