use crate::utils::error::{ExportError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PREDICTED_FEATURE_NAME: &str = "classLabel";
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// A graph tensor reference, `node:output_index` (`input:0`, `final_result:0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TensorName {
    pub node: String,
    pub output_index: usize,
}

impl TensorName {
    pub fn new(node: impl Into<String>, output_index: usize) -> Self {
        Self {
            node: node.into(),
            output_index,
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let invalid = |reason: &str| ExportError::InvalidConfigValueError {
            field: "tensor_name".to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (node, output_index) = match value.rsplit_once(':') {
            Some((node, index)) => {
                let index = index
                    .parse::<usize>()
                    .map_err(|_| invalid("Output index must be a non-negative integer"))?;
                (node, index)
            }
            None => (value, 0),
        };

        if node.is_empty() {
            return Err(invalid("Node name cannot be empty"));
        }

        Ok(Self::new(node, output_index))
    }
}

/// Consumer-facing feature name of a graph tensor: `input:0` -> `input__0`.
pub fn feature_name(tensor: &str) -> String {
    let (node, index) = match tensor.rsplit_once(':') {
        Some((node, index)) => (node, Some(index)),
        None => (tensor, None),
    };
    let node: String = node
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    match index {
        Some(index) => format!("{}__{}", node, index),
        None => node,
    }
}

impl fmt::Display for TensorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.output_index)
    }
}

impl FromStr for TensorName {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TensorName {
    type Error = ExportError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TensorName> for String {
    fn from(name: TensorName) -> Self {
        name.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDims {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

/// Fixed shape pinned onto an input tensor at conversion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub tensor: TensorName,
    pub dims: Vec<usize>,
}

impl InputShape {
    pub fn new(tensor: TensorName, dims: Vec<usize>) -> Self {
        Self { tensor, dims }
    }

    /// 解析命令列格式 `input:0=1,224,224,3`
    pub fn parse_arg(value: &str) -> Result<Self> {
        let (name, dims) = value
            .split_once('=')
            .ok_or_else(|| ExportError::InvalidConfigValueError {
                field: "input_shape".to_string(),
                value: value.to_string(),
                reason: "Expected NAME=D1,D2,...".to_string(),
            })?;

        let dims = dims
            .split(',')
            .map(|d| {
                d.trim()
                    .parse::<usize>()
                    .map_err(|_| ExportError::InvalidConfigValueError {
                        field: "input_shape".to_string(),
                        value: value.to_string(),
                        reason: format!("'{}' is not a dimension", d.trim()),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(TensorName::parse(name)?, dims))
    }

    /// NHWC 影像維度；非四維時為 None
    pub fn image_dims(&self) -> Option<ImageDims> {
        match self.dims.as_slice() {
            [_, height, width, channels] => Some(ImageDims {
                height: *height,
                width: *width,
                channels: *channels,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        write!(f, "{}={}", self.tensor, dims.join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColorSpace {
    Rgb,
    Bgr,
    Grayscale,
}

/// Pixel preprocessing applied to image inputs: `pixel * scale + bias`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePreprocessing {
    pub scale: f32,
    pub red_bias: f32,
    pub green_bias: f32,
    pub blue_bias: f32,
    pub gray_bias: f32,
    pub is_bgr: bool,
}

impl Default for ImagePreprocessing {
    fn default() -> Self {
        Self {
            scale: 1.0,
            red_bias: 0.0,
            green_bias: 0.0,
            blue_bias: 0.0,
            gray_bias: 0.0,
            is_bgr: false,
        }
    }
}

impl ImagePreprocessing {
    pub fn color_space(&self, channels: usize) -> ColorSpace {
        match (channels, self.is_bgr) {
            (1, _) => ColorSpace::Grayscale,
            (_, true) => ColorSpace::Bgr,
            (_, false) => ColorSpace::Rgb,
        }
    }
}

impl Validate for ImagePreprocessing {
    fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ExportError::InvalidConfigValueError {
                field: "preprocessing.scale".to_string(),
                value: self.scale.to_string(),
                reason: "Scale must be a positive finite number".to_string(),
            });
        }

        for (field, bias) in [
            ("preprocessing.red_bias", self.red_bias),
            ("preprocessing.green_bias", self.green_bias),
            ("preprocessing.blue_bias", self.blue_bias),
            ("preprocessing.gray_bias", self.gray_bias),
        ] {
            if !bias.is_finite() {
                return Err(ExportError::InvalidConfigValueError {
                    field: field.to_string(),
                    value: bias.to_string(),
                    reason: "Bias must be finite".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The export configuration record: where to read, where to write and how the
/// graph's interface is fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSpec {
    pub source_graph: String,
    pub destination: String,
    pub output_features: Vec<TensorName>,
    pub class_labels: String,
    pub input_shapes: Vec<InputShape>,
    pub image_inputs: Vec<TensorName>,
    pub metadata: ModelMetadata,
    pub preprocessing: ImagePreprocessing,
    pub predicted_feature_name: String,
}

impl ConversionSpec {
    pub fn input_shape(&self, tensor: &TensorName) -> Option<&InputShape> {
        self.input_shapes.iter().find(|s| &s.tensor == tensor)
    }

    pub fn is_image_input(&self, tensor: &TensorName) -> bool {
        self.image_inputs.contains(tensor)
    }

    /// 分類器機率輸出：第一個輸出特徵
    pub fn probabilities_output(&self) -> Option<&TensorName> {
        self.output_features.first()
    }
}

impl Validate for ConversionSpec {
    fn validate(&self) -> Result<()> {
        validation::validate_path("source_graph", &self.source_graph)?;
        validation::validate_file_extensions(
            "source_graph",
            std::slice::from_ref(&self.source_graph),
            &["pb"],
        )?;
        validation::validate_path("destination", &self.destination)?;
        validation::validate_path("class_labels", &self.class_labels)?;
        validation::validate_non_empty_string(
            "predicted_feature_name",
            &self.predicted_feature_name,
        )?;

        validation::validate_non_empty_list("output_feature_names", &self.output_features)?;
        let outputs: Vec<String> = self.output_features.iter().map(|t| t.to_string()).collect();
        validation::validate_unique("output_feature_names", &outputs)?;

        validation::validate_non_empty_list("input_shapes", &self.input_shapes)?;
        let inputs: Vec<String> = self.input_shapes.iter().map(|s| s.tensor.to_string()).collect();
        validation::validate_unique("input_shapes", &inputs)?;

        for shape in &self.input_shapes {
            validation::validate_non_empty_list(&format!("input_shapes.{}", shape.tensor), &shape.dims)?;
            for dim in &shape.dims {
                validation::validate_positive_number(
                    &format!("input_shapes.{}", shape.tensor),
                    *dim,
                    1,
                )?;
            }
        }

        let mut seen_images = HashSet::new();
        for image in &self.image_inputs {
            if !seen_images.insert(image) {
                return Err(ExportError::InvalidConfigValueError {
                    field: "image_input_names".to_string(),
                    value: image.to_string(),
                    reason: "Duplicate entry".to_string(),
                });
            }

            let shape = self.input_shape(image).ok_or_else(|| {
                ExportError::ConfigValidationError {
                    field: "image_input_names".to_string(),
                    message: format!("Image input '{}' has no entry in the input shapes", image),
                }
            })?;

            let dims = shape
                .image_dims()
                .ok_or_else(|| ExportError::ConfigValidationError {
                    field: format!("input_shapes.{}", image),
                    message: format!(
                        "Image inputs need a rank-4 NHWC shape, got {:?}",
                        shape.dims
                    ),
                })?;

            if dims.channels != 1 && dims.channels != 3 {
                return Err(ExportError::ConfigValidationError {
                    field: format!("input_shapes.{}", image),
                    message: format!(
                        "Image inputs need 1 or 3 channels, got {}",
                        dims.channels
                    ),
                });
            }
        }

        if !self.image_inputs.is_empty() {
            self.preprocessing.validate()?;
        }

        validation::validate_non_empty_string("model.name", &self.metadata.name)?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassLabels(Vec<String>);

impl ClassLabels {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn from_vec(labels: Vec<String>) -> Self {
        Self(labels)
    }
}

/// Raw inputs gathered by the extract phase.
#[derive(Debug, Clone)]
pub struct SourceArtifacts {
    pub spec: ConversionSpec,
    pub graph: Vec<u8>,
    pub labels: ClassLabels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDescription {
    pub name: String,
    pub feature_name: String,
    pub shape: Option<Vec<usize>>,
    pub datum_type: String,
}

impl FeatureDescription {
    pub fn new(name: impl Into<String>, shape: Option<Vec<usize>>, datum_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            feature_name: feature_name(&name),
            name,
            shape,
            datum_type: datum_type.into(),
        }
    }
}

/// Output of the transform phase: the serialized model plus everything the
/// bundle manifest records about it.
#[derive(Debug, Clone)]
pub struct ConvertedModel {
    pub spec: ConversionSpec,
    pub labels: ClassLabels,
    pub inputs: Vec<FeatureDescription>,
    pub outputs: Vec<FeatureDescription>,
    pub model: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescription {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub color_space: ColorSpace,
    pub preprocessing: ImagePreprocessing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescription {
    #[serde(flatten)]
    pub feature: FeatureDescription,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierDescription {
    pub labels: ClassLabels,
    pub predicted_feature_name: String,
    pub predicted_probabilities_output: String,
    pub predicted_probabilities_feature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format_version: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub metadata: ModelMetadata,
    pub source_graph: String,
    pub model_entry: String,
    pub inputs: Vec<InputDescription>,
    pub outputs: Vec<FeatureDescription>,
    pub classifier: ClassifierDescription,
}

impl BundleManifest {
    pub fn input(&self, name: &str) -> Option<&InputDescription> {
        self.inputs.iter().find(|i| i.feature.name == name)
    }
}
