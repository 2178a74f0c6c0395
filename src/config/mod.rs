pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::domain::model::{
    ImagePreprocessing, InputShape, ModelMetadata, DEFAULT_PREDICTED_FEATURE_NAME,
};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
fn parse_input_shape(value: &str) -> std::result::Result<InputShape, String> {
    InputShape::parse_arg(value).map_err(|e| e.to_string())
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "model-export")]
#[command(about = "Export a frozen TensorFlow classifier graph into a labelled model bundle")]
pub struct CliConfig {
    #[arg(long, default_value = "output/tf_files/retrained_graph.pb")]
    pub source_graph: String,

    #[arg(long, default_value = "../EmojiSketches.mlpack")]
    pub destination: String,

    #[arg(long, value_delimiter = ',', default_value = "final_result:0")]
    pub output_feature_names: Vec<String>,

    #[arg(long, default_value = "output/tf_files/retrained_labels.txt")]
    pub class_labels: String,

    /// Input tensor shape as NAME=D1,D2,... (repeatable)
    #[arg(long = "input-shape", value_parser = parse_input_shape, default_value = "input:0=1,224,224,3")]
    pub input_shapes: Vec<InputShape>,

    #[arg(long, value_delimiter = ',', default_value = "input:0")]
    pub image_input_names: Vec<String>,

    #[arg(long, default_value = "1.0")]
    pub image_scale: f32,

    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub red_bias: f32,

    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub green_bias: f32,

    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub blue_bias: f32,

    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub gray_bias: f32,

    #[arg(long, help = "Image inputs use BGR channel order")]
    pub is_bgr: bool,

    #[arg(long, default_value = "EmojiSketches")]
    pub model_name: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long)]
    pub license: Option<String>,

    #[arg(long, default_value = DEFAULT_PREDICTED_FEATURE_NAME)]
    pub predicted_feature_name: String,

    /// Directory that relative paths resolve against
    #[arg(long, default_value = ".")]
    pub base_dir: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU and memory usage per phase")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn source_graph(&self) -> &str {
        &self.source_graph
    }

    fn destination(&self) -> &str {
        &self.destination
    }

    fn output_feature_names(&self) -> &[String] {
        &self.output_feature_names
    }

    fn class_labels(&self) -> &str {
        &self.class_labels
    }

    fn input_shapes(&self) -> crate::utils::error::Result<Vec<InputShape>> {
        Ok(self.input_shapes.clone())
    }

    fn image_input_names(&self) -> &[String] {
        &self.image_input_names
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: self.model_name.clone(),
            short_description: self.description.clone(),
            author: self.author.clone(),
            license: self.license.clone(),
            version: None,
        }
    }

    fn preprocessing(&self) -> ImagePreprocessing {
        ImagePreprocessing {
            scale: self.image_scale,
            red_bias: self.red_bias,
            green_bias: self.green_bias,
            blue_bias: self.blue_bias,
            gray_bias: self.gray_bias,
            is_bgr: self.is_bgr,
        }
    }

    fn predicted_feature_name(&self) -> &str {
        &self.predicted_feature_name
    }
}
