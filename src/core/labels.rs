use crate::domain::model::ClassLabels;
use crate::utils::error::{ExportError, Result};
use std::collections::HashSet;

impl ClassLabels {
    /// 解析標籤檔：每行一個標籤，順序即輸出索引
    pub fn parse(text: &str) -> Result<Self> {
        let mut labels = Vec::new();
        let mut seen = HashSet::new();

        for (index, line) in text.lines().enumerate() {
            let label = line.trim();

            if label.is_empty() {
                return Err(ExportError::LabelError {
                    message: format!("Line {} is blank", index + 1),
                });
            }

            if !seen.insert(label) {
                return Err(ExportError::LabelError {
                    message: format!("Label '{}' on line {} is a duplicate", label, index + 1),
                });
            }

            labels.push(label.to_string());
        }

        if labels.is_empty() {
            return Err(ExportError::LabelError {
                message: "Label file is empty".to_string(),
            });
        }

        tracing::debug!("Parsed {} class labels", labels.len());
        Ok(ClassLabels::from_vec(labels))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data).map_err(|e| ExportError::LabelError {
            message: format!("Label file is not valid UTF-8: {}", e),
        })?;
        Self::parse(text)
    }

    /// 以換行結尾的標籤檔內容
    pub fn to_text(&self) -> String {
        let mut text = self.as_slice().join("\n");
        text.push('\n');
        text
    }
}
