use crate::core::bundle::{load_bundled_model, ModelBundle};
use crate::domain::model::{ColorSpace, ImageDescription};
use crate::utils::error::{ExportError, Result};
use image::{imageops, DynamicImage};
use serde::Serialize;
use std::collections::BTreeMap;
use tract_tensorflow::prelude::*;

/// Classifier result: the predicted label plus one score per label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class_label: String,
    pub probabilities: BTreeMap<String, f32>,
}

impl Prediction {
    /// 依分數由高至低排列
    pub fn ranked(&self) -> Vec<(&str, f32)> {
        let mut ranked: Vec<(&str, f32)> = self
            .probabilities
            .iter()
            .map(|(label, score)| (label.as_str(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// Resizes the image to the bundled input size and applies the recorded
/// preprocessing (`pixel * scale + bias`), producing an NHWC tensor.
pub fn image_to_tensor(image: &DynamicImage, description: &ImageDescription) -> Result<Tensor> {
    let (width, height) = (description.width, description.height);
    let resized = image.resize_exact(width as u32, height as u32, imageops::FilterType::Triangle);
    let preprocessing = &description.preprocessing;

    let tensor: Tensor = match description.color_space {
        ColorSpace::Grayscale => {
            let luma = resized.to_luma8();
            tract_ndarray::Array4::from_shape_fn((1, height, width, 1), |(_, y, x, _)| {
                luma.get_pixel(x as u32, y as u32)[0] as f32 * preprocessing.scale
                    + preprocessing.gray_bias
            })
            .into()
        }
        ColorSpace::Rgb | ColorSpace::Bgr => {
            let rgb = resized.to_rgb8();
            let bgr = description.color_space == ColorSpace::Bgr;
            let biases = [
                preprocessing.red_bias,
                preprocessing.green_bias,
                preprocessing.blue_bias,
            ];
            tract_ndarray::Array4::from_shape_fn((1, height, width, 3), |(_, y, x, c)| {
                let channel = if bgr { 2 - c } else { c };
                rgb.get_pixel(x as u32, y as u32)[channel] as f32 * preprocessing.scale
                    + biases[channel]
            })
            .into()
        }
    };

    Ok(tensor)
}

/// Runs the bundled classifier on one image.
pub fn predict(bundle: &ModelBundle, image: &DynamicImage) -> Result<Prediction> {
    let manifest = &bundle.manifest;
    let [input] = manifest.inputs.as_slice() else {
        return Err(ExportError::PredictionError {
            message: format!(
                "Expected a single model input, bundle has {}",
                manifest.inputs.len()
            ),
        });
    };
    let description = input
        .image
        .as_ref()
        .ok_or_else(|| ExportError::PredictionError {
            message: format!("Input {} is not an image input", input.feature.name),
        })?;

    let tensor = image_to_tensor(image, description)?;
    tracing::debug!("Running {} on a {:?} tensor", manifest.metadata.name, tensor.shape());

    let plan = load_bundled_model(bundle)?
        .into_optimized()
        .and_then(|model| model.into_runnable())
        .map_err(|e| ExportError::PredictionError {
            message: format!("{:#}", e),
        })?;
    let outputs = plan
        .run(tvec!(tensor.into_tvalue()))
        .map_err(|e| ExportError::PredictionError {
            message: format!("{:#}", e),
        })?;

    let probabilities_output = &manifest.classifier.predicted_probabilities_output;
    let output = manifest
        .outputs
        .iter()
        .position(|o| &o.name == probabilities_output)
        .and_then(|ix| outputs.get(ix))
        .ok_or_else(|| ExportError::PredictionError {
            message: format!("Model produced no {} output", probabilities_output),
        })?;
    let scores = output
        .as_slice::<f32>()
        .map_err(|e| ExportError::PredictionError {
            message: format!("{:#}", e),
        })?;

    let labels = bundle.labels.as_slice();
    if scores.len() != labels.len() {
        return Err(ExportError::LabelCountMismatch {
            labels: labels.len(),
            classes: scores.len(),
        });
    }

    let (class_label, _) = labels
        .iter()
        .zip(scores)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| ExportError::PredictionError {
            message: "Bundle has no class labels".to_string(),
        })?;

    Ok(Prediction {
        class_label: class_label.clone(),
        probabilities: labels.iter().cloned().zip(scores.iter().copied()).collect(),
    })
}
