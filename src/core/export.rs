use crate::core::ExportPipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct ExportEngine<P: ExportPipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: ExportPipeline> ExportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    /// 依序執行 extract、transform、load；任何錯誤直接傳回，不重試
    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting model export...");
        self.monitor.log_stats("Start");

        tracing::info!("📥 Reading frozen graph and class labels...");
        let source = self.pipeline.extract().await?;
        tracing::info!(
            "Read {} byte graph with {} class labels",
            source.graph.len(),
            source.labels.len()
        );
        self.monitor.log_stats("Extract");

        tracing::info!("🔄 Converting graph...");
        let converted = self.pipeline.transform(source).await?;
        for input in &converted.inputs {
            tracing::info!("  input  {} {:?}", input.name, input.shape);
        }
        for output in &converted.outputs {
            tracing::info!("  output {} {:?}", output.name, output.shape);
        }
        self.monitor.log_stats("Transform");

        tracing::info!("💾 Writing model bundle...");
        let output_path = self.pipeline.load(converted).await?;
        tracing::info!("Model bundle saved to: {}", output_path);
        self.monitor.log_stats("Load");

        self.monitor.log_final_stats();
        Ok(output_path)
    }
}
