//! The Datacomp filtering pipeline.
//!
//! Implements the T-MARS recipe (<https://arxiv.org/abs/2307.03132>): text in
//! each image is detected and masked before the image is re-embedded, so the
//! CLIP score against the caption no longer rewards images that merely spell
//! out their caption. Rows scoring below the threshold are dropped.

use crate::base_path::BasePath;
use crate::config::DatacompConfig;
use crate::error::FilterResult;
use crate::pipeline::{ComponentOp, DataType, Pipeline, Resources, Schema};
use tracing::info;

pub const PIPELINE_NAME: &str = "datacomp-filtering-pipeline";
pub const PIPELINE_DESCRIPTION: &str = "A pipeline for filtering the Datacomp dataset";
pub const BASE_PATH: &str = "./fondant-artifacts";
pub const DATASET_NAME: &str = "nielsr/datacomp-small-with-text-embeddings";
/// `None` loads all rows
pub const N_ROWS_TO_LOAD: Option<u64> = Some(10);
pub const IMAGE_SIZE: u32 = 256;

/// Stage names in execution order
pub const STAGE_ORDER: [&str; 8] = [
    "load_from_hf_hub",
    "download_images",
    "resize_images",
    "detect_text",
    "mask_images",
    "embed_images",
    "add_clip_score",
    "filter_clip_score",
];

/// Columns of the source dataset
pub fn source_schema() -> Schema {
    Schema::new()
        .field("url", DataType::String)
        .field("original_width", DataType::Int64)
        .field("original_height", DataType::Int64)
        .field(
            "face_bboxes",
            DataType::list(DataType::list(DataType::Float64)),
        )
        .field("sha256", DataType::String)
        .field("text", DataType::String)
        .field("uid", DataType::String)
        .field("clip_b32_similarity_score", DataType::Float32)
        .field("clip_l14_similarity_score", DataType::Float32)
        .field(
            "clip_l14_text_embedding",
            DataType::list(DataType::Float64),
        )
}

fn gpu_resources(config: &DatacompConfig) -> Resources {
    let resources = Resources::gpu(config.gpus_per_stage);
    match (&config.node_pool_label, &config.node_pool_name) {
        (Some(label), Some(name)) => resources.node_pool(label.as_str(), name.as_str()),
        _ => resources,
    }
}

/// Declare the pipeline
///
/// A local base path is created before the pipeline is constructed.
pub fn build_pipeline(config: &DatacompConfig) -> FilterResult<Pipeline> {
    config.validate()?;

    let base_path = BasePath::parse(&config.base_path)?;
    base_path.ensure_exists()?;

    let mut pipeline = Pipeline::new(&config.pipeline_name, &config.description, base_path)?;

    let dataset = pipeline.read(
        ComponentOp::new("load_from_hf_hub")?
            .argument("dataset_name", config.dataset_name.as_str())
            .argument("n_rows_to_load", config.n_rows_to_load)
            .produces(source_schema()),
    )?;

    let images = pipeline.apply(
        &dataset,
        ComponentOp::new("download_images")?
            .consume("image_url", "url")
            .argument("retries", config.download_retries)
            .argument("min_image_size", config.min_image_size),
    )?;

    let resized_images = pipeline.apply(
        &images,
        ComponentOp::new("components/resize_images")?
            .argument("resize_width", config.image_size)
            .argument("resize_height", config.image_size),
    )?;

    let detected_text = pipeline.apply(
        &resized_images,
        ComponentOp::new("components/detect_text")?
            .argument("batch_size", config.detect_text_batch_size)
            .argument("image_size", config.image_size)
            .resources(gpu_resources(config)),
    )?;

    let masked_images = pipeline.apply(
        &detected_text,
        ComponentOp::new("components/mask_images")?,
    )?;

    let embedded_images = pipeline.apply(
        &masked_images,
        ComponentOp::new("embed_images")?
            .argument("batch_size", config.embed_batch_size)
            .resources(gpu_resources(config)),
    )?;

    let scored = pipeline.apply(
        &embedded_images,
        ComponentOp::new("components/add_clip_score")?
            .consume("text_embedding", "clip_l14_text_embedding"),
    )?;

    pipeline.apply(
        &scored,
        ComponentOp::new("components/filter_clip_score")?
            .argument("threshold_score", config.clip_score_threshold),
    )?;

    info!(
        target: "pipeline",
        "Declared pipeline '{}' with {} stages at {}",
        pipeline.name(),
        pipeline.stage_count(),
        pipeline.base_path()
    );

    Ok(pipeline)
}
