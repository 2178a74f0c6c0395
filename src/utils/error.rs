use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Source file not found: {path}")]
    SourceNotFound { path: String },

    #[error("Class label file error: {message}")]
    LabelError { message: String },

    #[error("Conversion failed during {stage}: {message}")]
    ConversionError { stage: String, message: String },

    #[error("Classifier has {classes} classes but the label file lists {labels} labels")]
    LabelCountMismatch { labels: usize, classes: usize },

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Prediction failed: {message}")]
    PredictionError { message: String },

    #[error("Invalid model bundle: {message}")]
    BundleError { message: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Conversion,
    Output,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ExportError {
    pub fn conversion(stage: &str, error: impl std::fmt::Display) -> Self {
        ExportError::ConversionError {
            stage: stage.to_string(),
            message: error.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ExportError::ConfigError { .. }
            | ExportError::InvalidConfigValueError { .. }
            | ExportError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            ExportError::SourceNotFound { .. }
            | ExportError::LabelError { .. }
            | ExportError::ImageError(_) => ErrorCategory::Input,
            ExportError::ConversionError { .. }
            | ExportError::LabelCountMismatch { .. }
            | ExportError::PredictionError { .. } => ErrorCategory::Conversion,
            ExportError::ZipError(_)
            | ExportError::SerializationError(_)
            | ExportError::BundleError { .. } => ErrorCategory::Output,
            ExportError::IoError(_) | ExportError::ProcessingError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration
            | ErrorCategory::Input
            | ErrorCategory::Conversion
            | ErrorCategory::Output => ErrorSeverity::High,
            ErrorCategory::System => match self {
                // 暫時性 I/O 問題可重試
                ExportError::IoError(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::Interrupted | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    ErrorSeverity::Medium
                }
                _ => ErrorSeverity::Critical,
            },
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ExportError::SourceNotFound { path } => format!(
                "Make sure '{}' exists; train and freeze the graph before exporting",
                path
            ),
            ExportError::LabelError { .. } => {
                "Write one non-empty, unique label per line, in output index order".to_string()
            }
            ExportError::LabelCountMismatch { .. } => {
                "Use the label file produced together with this graph".to_string()
            }
            ExportError::ConversionError { stage, .. } => match stage.as_str() {
                "inputs" => "Check the input tensor names against the graph placeholders".to_string(),
                "outputs" => "Check the output feature names against the graph nodes".to_string(),
                _ => "Check that the graph is frozen and only uses supported operators".to_string(),
            },
            ExportError::InvalidConfigValueError { field, .. }
            | ExportError::ConfigValidationError { field, .. } => {
                format!("Fix the '{}' setting and run again", field)
            }
            ExportError::ConfigError { .. } => "Review the configuration file".to_string(),
            ExportError::ImageError(_) => {
                "Pass a PNG or JPEG image the image decoder can read".to_string()
            }
            ExportError::PredictionError { .. } => {
                "Re-export the bundle with an image input and check it with --load-model"
                    .to_string()
            }
            ExportError::BundleError { .. } | ExportError::ZipError(_) => {
                "Re-run the export to regenerate the bundle".to_string()
            }
            ExportError::IoError(_) => {
                "Check file permissions and available disk space".to_string()
            }
            ExportError::SerializationError(_) | ExportError::ProcessingError { .. } => {
                "Re-run with --verbose and report the log output".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Input problem: {}", self),
            ErrorCategory::Conversion => format!("Model conversion problem: {}", self),
            ErrorCategory::Output => format!("Could not produce the model bundle: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    /// 依嚴重程度對應的程序結束碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
