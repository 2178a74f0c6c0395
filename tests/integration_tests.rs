use anyhow::Result;
use clap::Parser;
use model_export::core::bundle::{load_bundled_model, read_bundle};
use model_export::core::predict::predict;
use model_export::{CliConfig, ExportEngine, ExportError, LocalStorage, TractExportPipeline};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[path = "../src/core/test_graph.rs"]
mod test_graph;

const LABELS: &str = "smile\nlaugh\nsun\n";

/// Lays out `<tmp>/Training/output/tf_files/{retrained_graph.pb,retrained_labels.txt}`
/// and returns the Training directory, which acts as the working directory.
fn training_dir(temp_dir: &TempDir, labels: Option<&str>, graph: bool) -> PathBuf {
    let work = temp_dir.path().join("Training");
    let tf_files = work.join("output/tf_files");
    std::fs::create_dir_all(&tf_files).unwrap();

    if graph {
        std::fs::write(
            tf_files.join("retrained_graph.pb"),
            test_graph::classifier_graph("input", "final_result"),
        )
        .unwrap();
    }
    if let Some(labels) = labels {
        std::fs::write(tf_files.join("retrained_labels.txt"), labels).unwrap();
    }
    work
}

fn default_config(work: &Path) -> CliConfig {
    CliConfig::try_parse_from(["model-export", "--base-dir", work.to_str().unwrap()]).unwrap()
}

async fn run_export(config: CliConfig) -> model_export::Result<String> {
    let storage = LocalStorage::new(config.base_dir.clone());
    let pipeline = TractExportPipeline::new(storage, config);
    ExportEngine::new(pipeline).run().await
}

#[tokio::test]
async fn test_end_to_end_export_writes_bundle() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let work = training_dir(&temp_dir, Some(LABELS), true);

    let output = run_export(default_config(&work)).await?;
    assert_eq!(output, "../EmojiSketches.mlpack");

    // destination is one directory above the working directory
    let bundle_path = temp_dir.path().join("EmojiSketches.mlpack");
    assert!(bundle_path.exists());
    assert!(!temp_dir.path().join("EmojiSketches.mlpack.partial").exists());

    let bundle = read_bundle(&std::fs::read(&bundle_path)?)?;
    assert_eq!(bundle.manifest.metadata.name, "EmojiSketches");
    assert_eq!(bundle.manifest.classifier.predicted_probabilities_output, "final_result:0");
    assert_eq!(bundle.manifest.classifier.predicted_probabilities_feature, "final_result__0");
    assert_eq!(bundle.manifest.inputs[0].feature.feature_name, "input__0");
    Ok(())
}

#[tokio::test]
async fn test_labels_match_label_file_line_for_line() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let work = training_dir(&temp_dir, Some(LABELS), true);

    run_export(default_config(&work)).await?;
    let bundle = read_bundle(&std::fs::read(temp_dir.path().join("EmojiSketches.mlpack"))?)?;

    let expected: Vec<&str> = LABELS.lines().collect();
    assert_eq!(bundle.labels.as_slice(), expected.as_slice());
    assert_eq!(bundle.manifest.classifier.labels, bundle.labels);
    Ok(())
}

#[tokio::test]
async fn test_input_shape_is_pinned() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let work = training_dir(&temp_dir, Some(LABELS), true);

    run_export(default_config(&work)).await?;
    let bundle = read_bundle(&std::fs::read(temp_dir.path().join("EmojiSketches.mlpack"))?)?;

    assert_eq!(bundle.input_shape("input:0"), Some(&[1, 224, 224, 3][..]));
    let image = bundle.manifest.input("input:0").unwrap().image.as_ref().unwrap();
    assert_eq!((image.height, image.width, image.channels), (224, 224, 3));

    // the serialized model agrees with the manifest
    let model = load_bundled_model(&bundle)?;
    let fact = model.input_fact(0)?;
    assert_eq!(fact.shape.as_concrete(), Some(&[1, 224, 224, 3][..]));
    Ok(())
}

#[tokio::test]
async fn test_missing_source_graph_writes_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let work = training_dir(&temp_dir, Some(LABELS), false);

    let result = run_export(default_config(&work)).await;

    assert!(matches!(result, Err(ExportError::SourceNotFound { .. })));
    assert!(!temp_dir.path().join("EmojiSketches.mlpack").exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_label_file_writes_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let work = training_dir(&temp_dir, None, true);

    let result = run_export(default_config(&work)).await;

    assert!(matches!(result, Err(ExportError::SourceNotFound { .. })));
    assert!(!temp_dir.path().join("EmojiSketches.mlpack").exists());
    Ok(())
}

#[tokio::test]
async fn test_label_count_mismatch_writes_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let work = training_dir(
        &temp_dir,
        Some("smile\nlaugh\nsun\ncheckmark\ncroissant\nheart\ncloud\n"),
        true,
    );

    let result = run_export(default_config(&work)).await;

    assert!(matches!(
        result,
        Err(ExportError::LabelCountMismatch {
            labels: 7,
            classes: 3
        })
    ));
    assert!(!temp_dir.path().join("EmojiSketches.mlpack").exists());
    Ok(())
}

#[tokio::test]
async fn test_custom_destination_and_preprocessing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let work = training_dir(&temp_dir, Some(LABELS), true);

    let config = CliConfig::try_parse_from([
        "model-export",
        "--base-dir",
        work.to_str().unwrap(),
        "--destination",
        "models/Sketches.mlpack",
        "--image-scale",
        "0.00784313725",
        "--red-bias",
        "-1",
        "--green-bias",
        "-1",
        "--blue-bias",
        "-1",
        "--author",
        "MLMOJI",
    ])?;

    let output = run_export(config).await?;
    assert_eq!(output, "models/Sketches.mlpack");

    let bundle = read_bundle(&std::fs::read(work.join("models/Sketches.mlpack"))?)?;
    let image = bundle.manifest.inputs[0].image.as_ref().unwrap();
    assert_eq!(image.preprocessing.red_bias, -1.0);
    assert_eq!(bundle.manifest.metadata.author.as_deref(), Some("MLMOJI"));
    Ok(())
}

#[tokio::test]
async fn test_exported_bundle_classifies_image_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let work = training_dir(&temp_dir, Some(LABELS), true);

    let config = CliConfig::try_parse_from([
        "model-export",
        "--base-dir",
        work.to_str().unwrap(),
        "--input-shape",
        "input:0=1,1,1,3",
        "--image-scale",
        "0.00392156863",
    ])?;
    run_export(config).await?;
    let bundle = read_bundle(&std::fs::read(temp_dir.path().join("EmojiSketches.mlpack"))?)?;

    // 綠色圖片對應第二個類別
    let sketch = work.join("sketch.png");
    image::RgbImage::from_pixel(32, 32, image::Rgb([0, 255, 0])).save(&sketch)?;

    let prediction = predict(&bundle, &image::open(&sketch)?)?;
    assert_eq!(prediction.class_label, "laugh");
    assert_eq!(prediction.probabilities["smile"], 0.0);
    assert!((prediction.probabilities["laugh"] - 1.0).abs() < 0.01);
    Ok(())
}
