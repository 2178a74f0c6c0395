use crate::core::bundle::write_bundle;
use crate::core::converter::convert_graph;
use crate::core::{ConfigProvider, ExportPipeline, Storage};
use crate::domain::model::{ClassLabels, ConvertedModel, SourceArtifacts};
use crate::utils::error::{ExportError, Result};

/// Export pipeline backed by tract: reads the frozen graph and label file from
/// storage, converts the graph and writes a zipped model bundle.
pub struct TractExportPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> TractExportPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> ExportPipeline for TractExportPipeline<S, C> {
    async fn extract(&self) -> Result<SourceArtifacts> {
        let spec = self.config.conversion_spec()?;

        tracing::debug!("Reading frozen graph from: {}", spec.source_graph);
        let graph = self.storage.read_file(&spec.source_graph).await?;

        tracing::debug!("Reading class labels from: {}", spec.class_labels);
        let labels = ClassLabels::from_bytes(&self.storage.read_file(&spec.class_labels).await?)?;

        Ok(SourceArtifacts {
            spec,
            graph,
            labels,
        })
    }

    async fn transform(&self, source: SourceArtifacts) -> Result<ConvertedModel> {
        // tract 轉換為 CPU 密集工作，移到阻塞執行緒
        tokio::task::spawn_blocking(move || {
            convert_graph(&source.graph, &source.spec, &source.labels)
        })
        .await
        .map_err(|e| ExportError::ProcessingError {
            message: format!("Conversion task failed: {}", e),
        })?
    }

    async fn load(&self, model: ConvertedModel) -> Result<String> {
        let bundle = write_bundle(&model)?;

        tracing::debug!(
            "Writing bundle ({} bytes) to: {}",
            bundle.len(),
            model.spec.destination
        );
        self.storage
            .write_file(&model.spec.destination, &bundle)
            .await?;

        Ok(model.spec.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bundle::read_bundle;
    use crate::core::test_graph;
    use crate::domain::model::{ImagePreprocessing, InputShape, ModelMetadata};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn put_file(&self, path: &str, data: &[u8]) {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files
                .get(path)
                .cloned()
                .ok_or_else(|| ExportError::SourceNotFound {
                    path: path.to_string(),
                })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        output_feature_names: Vec<String>,
        image_input_names: Vec<String>,
        input_shapes: Vec<String>,
    }

    impl MockConfig {
        fn new() -> Self {
            Self {
                output_feature_names: vec!["final_result:0".to_string()],
                image_input_names: vec!["input:0".to_string()],
                input_shapes: vec!["input:0=1,224,224,3".to_string()],
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn source_graph(&self) -> &str {
            "tf_files/retrained_graph.pb"
        }

        fn destination(&self) -> &str {
            "EmojiSketches.mlpack"
        }

        fn output_feature_names(&self) -> &[String] {
            &self.output_feature_names
        }

        fn class_labels(&self) -> &str {
            "tf_files/retrained_labels.txt"
        }

        fn input_shapes(&self) -> Result<Vec<InputShape>> {
            self.input_shapes
                .iter()
                .map(|s| InputShape::parse_arg(s))
                .collect()
        }

        fn image_input_names(&self) -> &[String] {
            &self.image_input_names
        }

        fn metadata(&self) -> ModelMetadata {
            ModelMetadata {
                name: "EmojiSketches".to_string(),
                ..Default::default()
            }
        }

        fn preprocessing(&self) -> ImagePreprocessing {
            ImagePreprocessing::default()
        }

        fn predicted_feature_name(&self) -> &str {
            "classLabel"
        }
    }

    async fn seeded_storage(labels: &str) -> MockStorage {
        let storage = MockStorage::new();
        storage
            .put_file(
                "tf_files/retrained_graph.pb",
                &test_graph::classifier_graph("input", "final_result"),
            )
            .await;
        storage
            .put_file("tf_files/retrained_labels.txt", labels.as_bytes())
            .await;
        storage
    }

    #[tokio::test]
    async fn test_extract_reads_graph_and_labels() {
        let storage = seeded_storage("smile\nlaugh\nsun\n").await;
        let pipeline = TractExportPipeline::new(storage, MockConfig::new());

        let source = pipeline.extract().await.unwrap();

        assert!(!source.graph.is_empty());
        assert_eq!(source.labels.as_slice(), &["smile", "laugh", "sun"]);
        assert_eq!(source.spec.destination, "EmojiSketches.mlpack");
    }

    #[tokio::test]
    async fn test_extract_missing_graph() {
        let storage = MockStorage::new();
        storage
            .put_file("tf_files/retrained_labels.txt", b"smile\n")
            .await;
        let pipeline = TractExportPipeline::new(storage, MockConfig::new());

        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, ExportError::SourceNotFound { ref path } if path == "tf_files/retrained_graph.pb"));
    }

    #[tokio::test]
    async fn test_extract_rejects_invalid_config_before_reading() {
        let mut config = MockConfig::new();
        config.output_feature_names.clear();
        let pipeline = TractExportPipeline::new(MockStorage::new(), config);

        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, ExportError::InvalidConfigValueError { .. }));
    }

    #[tokio::test]
    async fn test_full_pipeline_writes_bundle() {
        let storage = seeded_storage("smile\nlaugh\nsun\n").await;
        let pipeline = TractExportPipeline::new(storage.clone(), MockConfig::new());

        let source = pipeline.extract().await.unwrap();
        let converted = pipeline.transform(source).await.unwrap();
        let destination = pipeline.load(converted).await.unwrap();

        assert_eq!(destination, "EmojiSketches.mlpack");
        let data = storage.get_file("EmojiSketches.mlpack").await.unwrap();
        let bundle = read_bundle(&data).unwrap();
        assert_eq!(bundle.labels.as_slice(), &["smile", "laugh", "sun"]);
        assert_eq!(bundle.input_shape("input:0"), Some(&[1, 224, 224, 3][..]));
    }

    #[tokio::test]
    async fn test_transform_label_mismatch_writes_nothing() {
        let storage = seeded_storage("smile\nlaugh\n").await;
        let pipeline = TractExportPipeline::new(storage.clone(), MockConfig::new());

        let source = pipeline.extract().await.unwrap();
        let err = pipeline.transform(source).await.unwrap_err();

        assert!(matches!(err, ExportError::LabelCountMismatch { .. }));
        assert!(storage.get_file("EmojiSketches.mlpack").await.is_none());
    }
}
