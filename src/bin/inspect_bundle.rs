use clap::Parser;
use model_export::core::bundle::{load_bundled_model, read_bundle};
use model_export::core::predict::predict;
use model_export::utils::error::ExportError;
use model_export::utils::logger;

#[derive(Parser)]
#[command(name = "inspect-bundle")]
#[command(about = "Show the contents of an exported model bundle")]
struct Args {
    /// Path to the .mlpack bundle
    bundle: String,

    /// Reload the model with tract and check its inputs against the manifest
    #[arg(long)]
    load_model: bool,

    /// Classify an image (PNG or JPEG) with the bundled model
    #[arg(long, value_name = "IMAGE")]
    predict: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let data = std::fs::read(&args.bundle)?;
    let bundle = match read_bundle(&data) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    };

    let manifest = &bundle.manifest;
    println!("📦 {}", args.bundle);
    println!("  Model: {}", manifest.metadata.name);
    if let Some(description) = &manifest.metadata.short_description {
        println!("  Description: {}", description);
    }
    if let Some(author) = &manifest.metadata.author {
        println!("  Author: {}", author);
    }
    if let Some(license) = &manifest.metadata.license {
        println!("  License: {}", license);
    }
    println!("  Created: {}", manifest.created_at.to_rfc3339());
    println!("  Source graph: {}", manifest.source_graph);

    println!();
    println!("📥 Inputs:");
    for input in &manifest.inputs {
        match &input.image {
            Some(image) => println!(
                "  {} {:?} image {}x{} {:?}",
                input.feature.name, input.feature.shape, image.width, image.height, image.color_space
            ),
            None => println!("  {} {:?}", input.feature.name, input.feature.shape),
        }
    }

    println!();
    println!("📤 Outputs:");
    for output in &manifest.outputs {
        println!("  {} {:?}", output.name, output.shape);
    }

    println!();
    println!(
        "🏷️ Classes ({}, via {}):",
        bundle.labels.len(),
        manifest.classifier.predicted_probabilities_output
    );
    for (ix, label) in bundle.labels.as_slice().iter().enumerate() {
        println!("  {:>3} {}", ix, label);
    }

    if let Some(image_path) = &args.predict {
        println!();
        let prediction = image::open(image_path)
            .map_err(ExportError::from)
            .and_then(|image| predict(&bundle, &image));
        match prediction {
            Ok(prediction) => {
                println!(
                    "🔮 {} = {}",
                    manifest.classifier.predicted_feature_name, prediction.class_label
                );
                for (label, score) in prediction.ranked() {
                    println!("  {:<20} {:.4}", label, score);
                }
            }
            Err(e) => {
                eprintln!("❌ {}", e.user_friendly_message());
                eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
                std::process::exit(e.exit_code());
            }
        }
    }

    if args.load_model {
        println!();
        match load_bundled_model(&bundle) {
            Ok(model) => println!("✅ Model reloaded: {} nodes", model.nodes().len()),
            Err(e) => {
                eprintln!("❌ {}", e.user_friendly_message());
                std::process::exit(e.exit_code());
            }
        }
    }

    Ok(())
}
