use crate::domain::model::{
    ConversionSpec, ConvertedModel, ImagePreprocessing, InputShape, ModelMetadata,
    SourceArtifacts, TensorName,
};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    /// Writes must be all-or-nothing: a failed write leaves no file at `path`.
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn source_graph(&self) -> &str;
    fn destination(&self) -> &str;
    fn output_feature_names(&self) -> &[String];
    fn class_labels(&self) -> &str;
    fn input_shapes(&self) -> Result<Vec<InputShape>>;
    fn image_input_names(&self) -> &[String];
    fn metadata(&self) -> ModelMetadata;
    fn preprocessing(&self) -> ImagePreprocessing;
    fn predicted_feature_name(&self) -> &str;

    /// 組合並驗證完整的轉換設定
    fn conversion_spec(&self) -> Result<ConversionSpec> {
        let spec = ConversionSpec {
            source_graph: self.source_graph().to_string(),
            destination: self.destination().to_string(),
            output_features: self
                .output_feature_names()
                .iter()
                .map(|n| TensorName::parse(n))
                .collect::<Result<_>>()?,
            class_labels: self.class_labels().to_string(),
            input_shapes: self.input_shapes()?,
            image_inputs: self
                .image_input_names()
                .iter()
                .map(|n| TensorName::parse(n))
                .collect::<Result<_>>()?,
            metadata: self.metadata(),
            preprocessing: self.preprocessing(),
            predicted_feature_name: self.predicted_feature_name().to_string(),
        };

        spec.validate()?;
        Ok(spec)
    }
}

#[async_trait]
pub trait ExportPipeline: Send + Sync {
    async fn extract(&self) -> Result<SourceArtifacts>;
    async fn transform(&self, source: SourceArtifacts) -> Result<ConvertedModel>;
    async fn load(&self, model: ConvertedModel) -> Result<String>;
}
