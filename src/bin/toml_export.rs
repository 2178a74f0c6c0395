use clap::Parser;
use model_export::core::ConfigProvider;
use model_export::utils::{logger, validation::Validate};
use model_export::{ExportEngine, LocalStorage, TomlConfig, TractExportPipeline};

#[derive(Parser)]
#[command(name = "toml-export")]
#[command(about = "Model export driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "export-config.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Dry run - show what would be converted without reading or writing models
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 載入 TOML 配置
    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌；設定檔的 log_level 僅在未設定 RUST_LOG 時生效
    if std::env::var_os("RUST_LOG").is_none() {
        if let Some(level) = config.log_level() {
            std::env::set_var("RUST_LOG", format!("model_export={}", level));
        }
    }
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting TOML-based model export");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");

    display_config_summary(&config, &args)?;

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No model files will be read or written");
        perform_dry_run(&config)?;
        return Ok(());
    }

    // 決定監控設定
    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.base_dir().to_string());
    let pipeline = TractExportPipeline::new(storage, config);
    let engine = ExportEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Model export completed successfully!");
            println!("✅ Model export completed successfully!");
            println!("📁 Bundle saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Model export failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) -> anyhow::Result<()> {
    let spec = config.conversion_spec()?;

    println!("📋 Configuration Summary:");
    println!(
        "  Model: {} {}",
        spec.metadata.name,
        spec.metadata.version.as_deref().unwrap_or("")
    );
    println!("  Source graph: {}", spec.source_graph);
    println!("  Class labels: {}", spec.class_labels);
    println!("  Destination: {}", spec.destination);
    println!("  Base dir: {}", config.base_dir());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
    Ok(())
}

fn perform_dry_run(config: &TomlConfig) -> anyhow::Result<()> {
    let spec = config.conversion_spec()?;

    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📥 Inputs:");
    for shape in &spec.input_shapes {
        let kind = if spec.is_image_input(&shape.tensor) {
            "image"
        } else {
            "tensor"
        };
        println!("  {} {:?} ({})", shape.tensor, shape.dims, kind);
    }

    if !spec.image_inputs.is_empty() {
        let p = &spec.preprocessing;
        println!();
        println!("🖼️ Image Preprocessing:");
        println!("  Scale: {}", p.scale);
        println!(
            "  Bias (R, G, B, gray): {}, {}, {}, {}",
            p.red_bias, p.green_bias, p.blue_bias, p.gray_bias
        );
        println!("  Channel order: {}", if p.is_bgr { "BGR" } else { "RGB" });
    }

    println!();
    println!("📤 Outputs:");
    for (ix, output) in spec.output_features.iter().enumerate() {
        let role = if ix == 0 { " (class probabilities)" } else { "" };
        println!("  {}{}", output, role);
    }
    println!("  Predicted label feature: {}", spec.predicted_feature_name);

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");

    Ok(())
}
