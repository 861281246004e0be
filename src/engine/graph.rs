//! Encoder from pipeline values into the Earth Engine REST expression format.
//!
//! An [`Expression`] is a flat map of named value nodes plus the key of the result
//! node. Nodes refer to each other with `valueReference`, to function parameters with
//! `argumentReference`, and call server algorithms with `functionInvocationValue`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};
use strum::Display;

use crate::imagery::types::CLOUD_COVER_PROPERTY;
use crate::imagery::{
    BandExpr, BandOp, CollectionQuery, DateWindow, Region, TransformStep, Visualization,
};

use super::backend::CompositeRequest;

/// Name of the single parameter of every mapped function.
const MAPPING_VAR: &str = "_MAPPING_VAR_0_0";

/// Image used to check connectivity.
pub const PROBE_IMAGE: &str = "CGIAR/SRTM90_V4";

/// Band ids produced by `Image.visualize`.
pub const VISUALIZED_BANDS: [&str; 3] = ["vis-red", "vis-green", "vis-blue"];

/// Server algorithms used by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Algorithm {
    #[strum(serialize = "ImageCollection.load")]
    ImageCollectionLoad,
    #[strum(serialize = "Collection.filter")]
    CollectionFilter,
    #[strum(serialize = "Collection.map")]
    CollectionMap,
    #[strum(serialize = "Collection.size")]
    CollectionSize,
    #[strum(serialize = "Filter.intersects")]
    FilterIntersects,
    #[strum(serialize = "Filter.dateRangeContains")]
    FilterDateRangeContains,
    #[strum(serialize = "Filter.lessThan")]
    FilterLessThan,
    #[strum(serialize = "DateRange")]
    DateRange,
    #[strum(serialize = "GeometryConstructors.Rectangle")]
    Rectangle,
    #[strum(serialize = "Image.load")]
    ImageLoad,
    #[strum(serialize = "Image.bandNames")]
    ImageBandNames,
    #[strum(serialize = "Image.select")]
    ImageSelect,
    #[strum(serialize = "Image.constant")]
    ImageConstant,
    #[strum(serialize = "Image.add")]
    ImageAdd,
    #[strum(serialize = "Image.subtract")]
    ImageSubtract,
    #[strum(serialize = "Image.multiply")]
    ImageMultiply,
    #[strum(serialize = "Image.divide")]
    ImageDivide,
    #[strum(serialize = "Image.bitwiseAnd")]
    ImageBitwiseAnd,
    #[strum(serialize = "Image.eq")]
    ImageEq,
    #[strum(serialize = "Image.and")]
    ImageAnd,
    #[strum(serialize = "Image.addBands")]
    ImageAddBands,
    #[strum(serialize = "Image.updateMask")]
    ImageUpdateMask,
    #[strum(serialize = "Image.rename")]
    ImageRename,
    #[strum(serialize = "Image.visualize")]
    ImageVisualize,
    #[strum(serialize = "reduce.median")]
    ReduceMedian,
}

/// Serialized expression graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expression {
    /// Key of the result node.
    pub result: String,
    /// All nodes by key.
    pub values: BTreeMap<String, Value>,
}

impl Expression {
    /// Names of every algorithm invoked anywhere in the graph.
    pub fn algorithms(&self) -> Vec<String> {
        let mut out = Vec::new();
        for node in self.values.values() {
            collect_algorithms(node, &mut out);
        }
        out
    }
}

fn collect_algorithms(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("functionName") {
                out.push(name.clone());
            }
            map.values().for_each(|v| collect_algorithms(v, out));
        }
        Value::Array(items) => items.iter().for_each(|v| collect_algorithms(v, out)),
        _ => {}
    }
}

fn invoke<const N: usize>(algorithm: Algorithm, args: [(&str, Value); N]) -> Value {
    let arguments: Map<String, Value> = args
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    json!({
        "functionInvocationValue": {
            "functionName": algorithm.to_string(),
            "arguments": arguments,
        }
    })
}

fn constant(value: impl Serialize) -> Value {
    json!({ "constantValue": value })
}

fn argument(name: &str) -> Value {
    json!({ "argumentReference": name })
}

fn reference(key: &str) -> Value {
    json!({ "valueReference": key })
}

/// Incremental builder for an [`Expression`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    values: BTreeMap<String, Value>,
}

impl GraphBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, node: Value) -> String {
        let key = self.values.len().to_string();
        self.values.insert(key.clone(), node);
        key
    }

    /// Store `root` and close the graph.
    pub fn finish(mut self, root: Value) -> Expression {
        let result = self.intern(root);
        Expression {
            result,
            values: self.values,
        }
    }

    /// `Collection.map(collection, function(image) { ...step ops... })`.
    pub fn map_step(&mut self, collection: Value, step: &TransformStep) -> Value {
        let mut image = argument(MAPPING_VAR);
        let mut body = None;
        for op in &step.ops {
            let key = self.intern(op_node(&image, op));
            image = reference(&key);
            body = Some(key);
        }

        // An empty step maps every image to itself.
        let body = body.unwrap_or_else(|| self.intern(argument(MAPPING_VAR)));

        invoke(
            Algorithm::CollectionMap,
            [
                ("collection", collection),
                (
                    "baseAlgorithm",
                    json!({
                        "functionDefinitionValue": {
                            "argumentNames": [MAPPING_VAR],
                            "body": body,
                        }
                    }),
                ),
            ],
        )
    }

    /// Filtered collection, every pipeline step, bloom window, then median.
    pub fn composite(&mut self, request: &CompositeRequest) -> Value {
        let mut collection = filtered_collection(&request.query);
        for step in request.pipeline.steps() {
            collection = self.map_step(collection, step);
        }
        let key = self.intern(collection);

        let in_bloom = invoke(
            Algorithm::CollectionFilter,
            [
                ("collection", reference(&key)),
                ("filter", date_filter(&request.bloom_window)),
            ],
        );

        invoke(Algorithm::ReduceMedian, [("collection", in_bloom)])
    }
}

/// `GeometryConstructors.Rectangle` for a region.
pub fn rectangle(region: &Region) -> Value {
    invoke(
        Algorithm::Rectangle,
        [("coordinates", constant(region.corners()))],
    )
}

fn date_filter(window: &DateWindow) -> Value {
    let range = invoke(
        Algorithm::DateRange,
        [
            ("start", constant(window.start_str())),
            ("end", constant(window.end_str())),
        ],
    );
    invoke(
        Algorithm::FilterDateRangeContains,
        [
            ("leftValue", range),
            ("rightField", constant("system:time_start")),
        ],
    )
}

/// The archive filtered by bounds, date window and cloud cover.
pub fn filtered_collection(query: &CollectionQuery) -> Value {
    let load = invoke(
        Algorithm::ImageCollectionLoad,
        [("id", constant(&query.collection_id))],
    );

    let by_bounds = invoke(
        Algorithm::CollectionFilter,
        [
            ("collection", load),
            (
                "filter",
                invoke(
                    Algorithm::FilterIntersects,
                    [
                        ("leftField", constant(".all")),
                        ("rightValue", rectangle(&query.region)),
                    ],
                ),
            ),
        ],
    );

    let by_date = invoke(
        Algorithm::CollectionFilter,
        [
            ("collection", by_bounds),
            ("filter", date_filter(&query.window)),
        ],
    );

    invoke(
        Algorithm::CollectionFilter,
        [
            ("collection", by_date),
            (
                "filter",
                invoke(
                    Algorithm::FilterLessThan,
                    [
                        ("leftField", constant(CLOUD_COVER_PROPERTY)),
                        ("rightValue", constant(query.cloud_cover_ceiling)),
                    ],
                ),
            ),
        ],
    )
}

fn image_constant(value: f64) -> Value {
    invoke(Algorithm::ImageConstant, [("value", constant(value))])
}

fn binary(algorithm: Algorithm, a: Value, b: Value) -> Value {
    invoke(algorithm, [("image1", a), ("image2", b)])
}

/// Encode a band expression evaluated against `image`.
pub fn band_expr(image: &Value, expr: &BandExpr) -> Value {
    match expr {
        BandExpr::Band(name) => invoke(
            Algorithm::ImageSelect,
            [
                ("input", image.clone()),
                ("bandSelectors", constant([name])),
            ],
        ),
        BandExpr::Constant(v) => image_constant(*v),
        BandExpr::Add(a, b) => binary(
            Algorithm::ImageAdd,
            band_expr(image, a),
            band_expr(image, b),
        ),
        BandExpr::Subtract(a, b) => binary(
            Algorithm::ImageSubtract,
            band_expr(image, a),
            band_expr(image, b),
        ),
        BandExpr::Multiply(a, b) => binary(
            Algorithm::ImageMultiply,
            band_expr(image, a),
            band_expr(image, b),
        ),
        BandExpr::Divide(a, b) => binary(
            Algorithm::ImageDivide,
            band_expr(image, a),
            band_expr(image, b),
        ),
        BandExpr::BitwiseAnd(a, mask) => binary(
            Algorithm::ImageBitwiseAnd,
            band_expr(image, a),
            image_constant(f64::from(*mask)),
        ),
        BandExpr::Eq(a, b) => binary(
            Algorithm::ImageEq,
            band_expr(image, a),
            band_expr(image, b),
        ),
        BandExpr::And(a, b) => binary(
            Algorithm::ImageAnd,
            band_expr(image, a),
            band_expr(image, b),
        ),
    }
}

fn op_node(image: &Value, op: &BandOp) -> Value {
    match op {
        BandOp::Rescale {
            selector,
            scale,
            offset,
        } => {
            let selected = invoke(
                Algorithm::ImageSelect,
                [
                    ("input", image.clone()),
                    ("bandSelectors", constant([selector.pattern()])),
                ],
            );
            let scaled = binary(
                Algorithm::ImageAdd,
                binary(Algorithm::ImageMultiply, selected, image_constant(*scale)),
                image_constant(*offset),
            );
            invoke(
                Algorithm::ImageAddBands,
                [
                    ("dstImg", image.clone()),
                    ("srcImg", scaled),
                    ("overwrite", constant(true)),
                ],
            )
        }
        BandOp::UpdateMask { condition } => invoke(
            Algorithm::ImageUpdateMask,
            [
                ("image", image.clone()),
                ("mask", band_expr(image, condition)),
            ],
        ),
        BandOp::AddBand { name, expr } => {
            let renamed = invoke(
                Algorithm::ImageRename,
                [
                    ("input", band_expr(image, expr)),
                    ("names", constant([name])),
                ],
            );
            invoke(
                Algorithm::ImageAddBands,
                [("dstImg", image.clone()), ("srcImg", renamed)],
            )
        }
    }
}

/// `Collection.size` of the filtered archive.
pub fn collection_size(query: &CollectionQuery) -> Expression {
    GraphBuilder::new().finish(invoke(
        Algorithm::CollectionSize,
        [("collection", filtered_collection(query))],
    ))
}

/// Median composite rendered with a display stretch.
pub fn visualized_composite(request: &CompositeRequest, vis: &Visualization) -> Expression {
    let mut builder = GraphBuilder::new();
    let composite = builder.composite(request);
    let root = invoke(
        Algorithm::ImageVisualize,
        [
            ("image", composite),
            ("bands", constant(vis.bands)),
            ("min", constant(vis.min)),
            ("max", constant(vis.max)),
            ("gamma", constant(vis.gamma)),
        ],
    );
    builder.finish(root)
}

/// Band names of a well-known public image.
pub fn probe() -> Expression {
    let image = invoke(Algorithm::ImageLoad, [("id", constant(PROBE_IMAGE))]);
    GraphBuilder::new().finish(invoke(Algorithm::ImageBandNames, [("image", image)]))
}
