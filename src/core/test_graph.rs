// Minimal TensorFlow GraphDef messages for building frozen-graph fixtures.
// Field tags follow tensorflow/core/framework/{graph,node_def,attr_value}.proto.

use prost::Message;
use std::collections::HashMap;

const DT_FLOAT: i32 = 1;

#[derive(Clone, PartialEq, Message)]
pub struct GraphDef {
    #[prost(message, repeated, tag = "1")]
    pub node: Vec<NodeDef>,
}

#[derive(Clone, PartialEq, Message)]
pub struct NodeDef {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub op: String,
    #[prost(string, repeated, tag = "3")]
    pub input: Vec<String>,
    #[prost(map = "string, message", tag = "5")]
    pub attr: HashMap<String, AttrValue>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AttrValue {
    #[prost(int32, optional, tag = "6")]
    pub r#type: Option<i32>,
}

fn float_attr(key: &str) -> HashMap<String, AttrValue> {
    let mut attr = HashMap::new();
    attr.insert(
        key.to_string(),
        AttrValue {
            r#type: Some(DT_FLOAT),
        },
    );
    attr
}

/// `Placeholder(input) -> Relu(output)`: the output keeps the input shape, so
/// with an NHWC `[1, 224, 224, 3]` input the classifier width is 3.
pub fn classifier_graph(input: &str, output: &str) -> Vec<u8> {
    let graph = GraphDef {
        node: vec![
            NodeDef {
                name: input.to_string(),
                op: "Placeholder".to_string(),
                input: vec![],
                attr: float_attr("dtype"),
            },
            NodeDef {
                name: output.to_string(),
                op: "Relu".to_string(),
                input: vec![input.to_string()],
                attr: float_attr("T"),
            },
        ],
    };
    graph.encode_to_vec()
}
