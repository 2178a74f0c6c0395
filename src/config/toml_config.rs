use crate::core::ConfigProvider;
use crate::domain::model::{
    ImagePreprocessing, InputShape, ModelMetadata, TensorName, DEFAULT_PREDICTED_FEATURE_NAME,
};
use crate::utils::error::{ExportError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub model: ModelConfig,
    pub source: SourceConfig,
    pub inputs: InputsConfig,
    pub outputs: OutputsConfig,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub license: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub graph_path: String,
    pub labels_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputsConfig {
    /// 張量名稱 -> 固定形狀
    pub shapes: BTreeMap<String, Vec<usize>>,
    #[serde(default)]
    pub image_inputs: Vec<String>,
    pub preprocessing: Option<ImagePreprocessing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsConfig {
    pub feature_names: Vec<String>,
    pub predicted_feature_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub destination: String,
    pub base_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ExportError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ExportError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${MODEL_DIR})，未定義者保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ExportError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("model.name", &self.model.name)?;
        validation::validate_path("source.graph_path", &self.source.graph_path)?;
        validation::validate_path("source.labels_path", &self.source.labels_path)?;
        validation::validate_path("load.destination", &self.load.destination)?;
        if let Some(base_dir) = &self.load.base_dir {
            validation::validate_path("load.base_dir", base_dir)?;
        }

        // 其餘欄位組合成完整設定後一併驗證
        self.conversion_spec()?;
        Ok(())
    }

    pub fn base_dir(&self) -> &str {
        self.load.base_dir.as_deref().unwrap_or(".")
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn source_graph(&self) -> &str {
        &self.source.graph_path
    }

    fn destination(&self) -> &str {
        &self.load.destination
    }

    fn output_feature_names(&self) -> &[String] {
        &self.outputs.feature_names
    }

    fn class_labels(&self) -> &str {
        &self.source.labels_path
    }

    fn input_shapes(&self) -> Result<Vec<InputShape>> {
        self.inputs
            .shapes
            .iter()
            .map(|(name, dims)| -> Result<InputShape> {
                Ok(InputShape::new(TensorName::parse(name)?, dims.clone()))
            })
            .collect()
    }

    fn image_input_names(&self) -> &[String] {
        &self.inputs.image_inputs
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: self.model.name.clone(),
            short_description: self.model.description.clone(),
            author: self.model.author.clone(),
            license: self.model.license.clone(),
            version: self.model.version.clone(),
        }
    }

    fn preprocessing(&self) -> ImagePreprocessing {
        self.inputs.preprocessing.clone().unwrap_or_default()
    }

    fn predicted_feature_name(&self) -> &str {
        self.outputs
            .predicted_feature_name
            .as_deref()
            .unwrap_or(DEFAULT_PREDICTED_FEATURE_NAME)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[model]
name = "EmojiSketches"
author = "MLMOJI"
license = "MIT"

[source]
graph_path = "output/tf_files/retrained_graph.pb"
labels_path = "output/tf_files/retrained_labels.txt"

[inputs]
image_inputs = ["input:0"]

[inputs.shapes]
"input:0" = [1, 224, 224, 3]

[outputs]
feature_names = ["final_result:0"]

[load]
destination = "../EmojiSketches.mlpack"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = TomlConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.model.name, "EmojiSketches");
        assert_eq!(config.source.graph_path, "output/tf_files/retrained_graph.pb");
        assert_eq!(config.base_dir(), ".");
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());

        let spec = config.conversion_spec().unwrap();
        assert_eq!(spec.input_shapes[0].dims, vec![1, 224, 224, 3]);
        assert_eq!(spec.predicted_feature_name, "classLabel");
        assert_eq!(spec.metadata.license.as_deref(), Some("MIT"));
        assert_eq!(spec.preprocessing, ImagePreprocessing::default());
    }

    #[test]
    fn test_preprocessing_section() {
        let content = BASIC.replace(
            "[outputs]",
            "[inputs.preprocessing]\nscale = 0.0078431\nred_bias = -1.0\ngreen_bias = -1.0\nblue_bias = -1.0\n\n[outputs]",
        );
        let config = TomlConfig::from_toml_str(&content).unwrap();
        let preprocessing = config.preprocessing();
        assert_eq!(preprocessing.red_bias, -1.0);
        assert_eq!(preprocessing.gray_bias, 0.0);
        assert!(!preprocessing.is_bgr);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_MODEL_EXPORT_DIR", "/tmp/retrain");

        let content = BASIC.replace(
            "output/tf_files/retrained_graph.pb",
            "${TEST_MODEL_EXPORT_DIR}/retrained_graph.pb",
        );
        let config = TomlConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.source.graph_path, "/tmp/retrain/retrained_graph.pb");

        std::env::remove_var("TEST_MODEL_EXPORT_DIR");
    }

    #[test]
    fn test_unknown_env_var_left_verbatim() {
        let content = BASIC.replace("EmojiSketches\"", "${TEST_MODEL_EXPORT_UNSET}\"");
        let config = TomlConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.model.name, "${TEST_MODEL_EXPORT_UNSET}");
    }

    #[test]
    fn test_config_validation() {
        let content = BASIC.replace("image_inputs = [\"input:0\"]", "image_inputs = [\"image:0\"]");
        let config = TomlConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        let content = BASIC.replace("[load]\ndestination = \"../EmojiSketches.mlpack\"\n", "");
        let err = TomlConfig::from_toml_str(&content).unwrap_err();
        assert!(matches!(err, ExportError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.model.name, "EmojiSketches");
    }
}
