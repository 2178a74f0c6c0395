use crate::domain::model::{
    BundleManifest, ClassLabels, ClassifierDescription, ConvertedModel, ImageDescription,
    InputDescription, BUNDLE_FORMAT_VERSION, feature_name,
};
use crate::utils::error::{ExportError, Result};
use std::io::{Cursor, Read, Write};
use tract_tensorflow::prelude::*;
use zip::write::{FileOptions, ZipWriter};
use zip::ZipArchive;

pub const MANIFEST_ENTRY: &str = "manifest.json";
pub const LABELS_ENTRY: &str = "labels.txt";
pub const MODEL_ENTRY: &str = "model.nnef.tar";

/// A model bundle read back from disk.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub manifest: BundleManifest,
    pub labels: ClassLabels,
    pub model: Vec<u8>,
}

impl ModelBundle {
    /// Shape recorded for an input tensor, e.g. `input:0`.
    pub fn input_shape(&self, name: &str) -> Option<&[usize]> {
        self.manifest
            .input(name)
            .and_then(|i| i.feature.shape.as_deref())
    }
}

pub fn build_manifest(model: &ConvertedModel) -> Result<BundleManifest> {
    let spec = &model.spec;

    let inputs = model
        .inputs
        .iter()
        .map(|feature| {
            let image = spec
                .input_shapes
                .iter()
                .find(|s| s.tensor.to_string() == feature.name && spec.is_image_input(&s.tensor))
                .and_then(|s| s.image_dims())
                .map(|dims| ImageDescription {
                    width: dims.width,
                    height: dims.height,
                    channels: dims.channels,
                    color_space: spec.preprocessing.color_space(dims.channels),
                    preprocessing: spec.preprocessing.clone(),
                });

            InputDescription {
                feature: feature.clone(),
                image,
            }
        })
        .collect();

    let probabilities = spec
        .probabilities_output()
        .ok_or_else(|| ExportError::BundleError {
            message: "No output feature to attach class labels to".to_string(),
        })?;

    Ok(BundleManifest {
        format_version: BUNDLE_FORMAT_VERSION,
        created_at: chrono::Utc::now(),
        metadata: spec.metadata.clone(),
        source_graph: spec.source_graph.clone(),
        model_entry: MODEL_ENTRY.to_string(),
        inputs,
        outputs: model.outputs.clone(),
        classifier: ClassifierDescription {
            labels: model.labels.clone(),
            predicted_feature_name: spec.predicted_feature_name.clone(),
            predicted_probabilities_output: probabilities.to_string(),
            predicted_probabilities_feature: feature_name(&probabilities.to_string()),
        },
    })
}

pub fn write_bundle(model: &ConvertedModel) -> Result<Vec<u8>> {
    let manifest = build_manifest(model)?;

    tracing::debug!(
        "Creating bundle with {} labels and a {} byte model",
        model.labels.len(),
        model.model.len()
    );

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    zip.start_file::<_, ()>(MANIFEST_ENTRY, FileOptions::default())?;
    zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

    zip.start_file::<_, ()>(LABELS_ENTRY, FileOptions::default())?;
    zip.write_all(model.labels.to_text().as_bytes())?;

    // 模型本身已是 tar 封裝，不再壓縮
    zip.start_file::<_, ()>(
        MODEL_ENTRY,
        FileOptions::default().compression_method(zip::CompressionMethod::Stored),
    )?;
    zip.write_all(&model.model)?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(name).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => ExportError::BundleError {
            message: format!("Missing entry '{}'", name),
        },
        other => ExportError::ZipError(other),
    })?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    Ok(data)
}

pub fn read_bundle(data: &[u8]) -> Result<ModelBundle> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let manifest: BundleManifest = serde_json::from_slice(&read_entry(&mut archive, MANIFEST_ENTRY)?)?;
    if manifest.format_version != BUNDLE_FORMAT_VERSION {
        return Err(ExportError::BundleError {
            message: format!(
                "Unsupported bundle format version {}",
                manifest.format_version
            ),
        });
    }

    let labels = ClassLabels::from_bytes(&read_entry(&mut archive, LABELS_ENTRY)?)?;
    if labels != manifest.classifier.labels {
        return Err(ExportError::BundleError {
            message: format!(
                "'{}' disagrees with the labels recorded in '{}'",
                LABELS_ENTRY, MANIFEST_ENTRY
            ),
        });
    }

    let model = read_entry(&mut archive, &manifest.model_entry)?;

    Ok(ModelBundle {
        manifest,
        labels,
        model,
    })
}

/// 以 tract 重新載入 NNEF 模型，並核對輸入形狀與 manifest 一致
pub fn load_bundled_model(bundle: &ModelBundle) -> Result<TypedModel> {
    let model = tract_nnef::nnef()
        .with_tract_core()
        .model_for_read(&mut Cursor::new(bundle.model.as_slice()))
        .map_err(|e| ExportError::BundleError {
            message: format!("Cannot load '{}': {:#}", bundle.manifest.model_entry, e),
        })?;

    for (ix, described) in bundle.manifest.inputs.iter().enumerate() {
        let fact = model.input_fact(ix).map_err(|e| ExportError::BundleError {
            message: format!("{:#}", e),
        })?;
        let shape = fact.shape.as_concrete().map(|dims| dims.to_vec());
        if shape != described.feature.shape {
            return Err(ExportError::BundleError {
                message: format!(
                    "Model input {} has shape {:?}, manifest records {:?}",
                    described.feature.name, shape, described.feature.shape
                ),
            });
        }
    }

    Ok(model)
}
