use crate::domain::model::{ClassLabels, ConversionSpec, ConvertedModel, FeatureDescription};
use crate::utils::error::{ExportError, Result};
use std::io::Cursor;
use tract_tensorflow::prelude::*;

/// Converts a frozen TensorFlow graph into an NNEF archive with the configured
/// input shapes pinned and only the configured outputs kept.
pub fn convert_graph(
    graph: &[u8],
    spec: &ConversionSpec,
    labels: &ClassLabels,
) -> Result<ConvertedModel> {
    tracing::debug!("Parsing frozen graph ({} bytes)", graph.len());
    let mut model = tract_tensorflow::tensorflow()
        .model_for_read(&mut Cursor::new(graph))
        .map_err(|e| ExportError::conversion("parse", format!("{:#}", e)))?;

    pin_input_shapes(&mut model, spec)?;

    let output_names: Vec<String> = spec.output_features.iter().map(|t| t.to_string()).collect();
    model
        .set_output_names(&output_names)
        .map_err(|e| ExportError::conversion("outputs", format!("{:#}", e)))?;
    tracing::debug!("Selected outputs: {}", output_names.join(", "));

    let typed = model
        .into_typed()
        .and_then(|m| m.into_decluttered())
        .map_err(|e| ExportError::conversion("typing", format!("{:#}", e)))?;

    let inputs = describe_inputs(&typed, spec)?;
    let outputs = describe_outputs(&typed, spec)?;
    check_classifier_width(&outputs, labels)?;

    let mut model_bytes = Vec::new();
    tract_nnef::nnef()
        .with_tract_core()
        .write_to_tar(&typed, &mut model_bytes)
        .map_err(|e| ExportError::conversion("serialization", format!("{:#}", e)))?;

    tracing::info!(
        "🔄 Converted graph: {} input(s), {} output(s), {} classes, {} bytes",
        inputs.len(),
        outputs.len(),
        labels.len(),
        model_bytes.len()
    );

    Ok(ConvertedModel {
        spec: spec.clone(),
        labels: labels.clone(),
        inputs,
        outputs,
        model: model_bytes,
    })
}

fn pin_input_shapes(model: &mut InferenceModel, spec: &ConversionSpec) -> Result<()> {
    let graph_inputs: Vec<String> = model
        .input_outlets()
        .map_err(|e| ExportError::conversion("inputs", format!("{:#}", e)))?
        .iter()
        .map(|outlet| format!("{}:{}", model.node(outlet.node).name, outlet.slot))
        .collect();

    for shape in &spec.input_shapes {
        let name = shape.tensor.to_string();
        let index = graph_inputs
            .iter()
            .position(|candidate| candidate == &name)
            .ok_or_else(|| {
                ExportError::conversion(
                    "inputs",
                    format!(
                        "Input tensor '{}' not found; graph inputs are [{}]",
                        name,
                        graph_inputs.join(", ")
                    ),
                )
            })?;

        let fact: InferenceFact = f32::fact(shape.dims.clone()).into();
        model
            .set_input_fact(index, fact)
            .map_err(|e| ExportError::conversion("inputs", format!("{:#}", e)))?;
        tracing::debug!("Pinned input {} to {:?}", name, shape.dims);
    }

    Ok(())
}

fn describe_inputs(model: &TypedModel, spec: &ConversionSpec) -> Result<Vec<FeatureDescription>> {
    let outlets = model
        .input_outlets()
        .map_err(|e| ExportError::conversion("inputs", format!("{:#}", e)))?;

    let mut inputs = Vec::new();
    for (ix, outlet) in outlets.iter().enumerate() {
        let fact = model
            .input_fact(ix)
            .map_err(|e| ExportError::conversion("inputs", format!("{:#}", e)))?;
        let name = format!("{}:{}", model.node(outlet.node).name, outlet.slot);

        let shape = fact.shape.as_concrete().map(|dims| dims.to_vec());
        if let Some(expected) = spec
            .input_shapes
            .iter()
            .find(|s| s.tensor.to_string() == name)
        {
            if shape.as_deref() != Some(expected.dims.as_slice()) {
                return Err(ExportError::conversion(
                    "inputs",
                    format!(
                        "Input '{}' resolved to {:?} instead of {:?}",
                        name, shape, expected.dims
                    ),
                ));
            }
        }

        inputs.push(FeatureDescription::new(
            name,
            shape,
            format!("{:?}", fact.datum_type),
        ));
    }
    Ok(inputs)
}

fn describe_outputs(
    model: &TypedModel,
    spec: &ConversionSpec,
) -> Result<Vec<FeatureDescription>> {
    spec.output_features
        .iter()
        .enumerate()
        .map(|(ix, name)| -> Result<FeatureDescription> {
            let fact = model
                .output_fact(ix)
                .map_err(|e| ExportError::conversion("outputs", format!("{:#}", e)))?;
            Ok(FeatureDescription::new(
                name.to_string(),
                fact.shape.as_concrete().map(|dims| dims.to_vec()),
                format!("{:?}", fact.datum_type),
            ))
        })
        .collect()
}

/// 機率輸出最後一維必須等於標籤數量
fn check_classifier_width(outputs: &[FeatureDescription], labels: &ClassLabels) -> Result<()> {
    let Some(output) = outputs.first() else {
        return Ok(());
    };
    let Some(shape) = output.shape.as_ref() else {
        tracing::warn!(
            "Classifier output {} has a symbolic shape; skipping label count check",
            output.name
        );
        return Ok(());
    };
    let Some(&classes) = shape.last() else {
        return Err(ExportError::conversion(
            "outputs",
            format!(
                "Classifier output {} is a scalar; expected one score per class",
                output.name
            ),
        ));
    };

    if classes != labels.len() {
        return Err(ExportError::LabelCountMismatch {
            labels: labels.len(),
            classes,
        });
    }
    Ok(())
}
