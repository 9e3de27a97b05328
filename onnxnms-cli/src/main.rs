use clap::Parser;
use onnxnms::{BoxFormat, BoxesView, NmsParams, NmsSelector, ScoresView, SelectedIndex, Selection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "ONNX NonMaxSuppression CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ParamsJson {
    center_point_box: i32,
    max_output_boxes_per_class: i64,
    iou_threshold: f32,
    score_threshold: f32,
    parallel: bool,
}

impl Default for ParamsJson {
    fn default() -> Self {
        let params = NmsParams::default();
        Self {
            center_point_box: params.box_format.as_flag(),
            max_output_boxes_per_class: 0,
            iou_threshold: params.iou_threshold,
            score_threshold: params.score_threshold,
            parallel: false,
        }
    }
}

impl ParamsJson {
    fn to_params(&self) -> Result<NmsParams, Box<dyn std::error::Error>> {
        Ok(NmsParams {
            box_format: BoxFormat::from_flag(self.center_point_box),
            max_output_boxes_per_class: usize::try_from(self.max_output_boxes_per_class.max(0))?,
            iou_threshold: self.iou_threshold,
            score_threshold: self.score_threshold,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    /// `[batch][spatial][4]`
    boxes: Vec<Vec<[f32; 4]>>,
    /// `[batch][class][spatial]`
    scores: Vec<Vec<Vec<f32>>>,
    params: ParamsJson,
    output_path: Option<String>,
    /// Also emit the padded `[output_length, 3]` tensor.
    padded: bool,
}

#[derive(Debug, Serialize)]
struct SelectionRecord {
    batch_index: usize,
    class_index: usize,
    box_index: usize,
}

impl From<&SelectedIndex> for SelectionRecord {
    fn from(value: &SelectedIndex) -> Self {
        Self {
            batch_index: value.batch_index,
            class_index: value.class_index,
            box_index: value.box_index,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    count: usize,
    capacity: usize,
    selected: Vec<SelectionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    padded: Option<Vec<[i32; 3]>>,
}

impl Output {
    fn new(selection: &Selection, padded: bool) -> Self {
        let padded = padded.then(|| {
            selection
                .to_output_buffer()
                .chunks_exact(3)
                .map(|slot| [slot[0], slot[1], slot[2]])
                .collect()
        });
        Self {
            count: selection.len(),
            capacity: selection.capacity(),
            selected: selection.indices().iter().map(SelectionRecord::from).collect(),
            padded,
        }
    }
}

/// Flattens nested tensors, checking that every row has the same length.
fn flatten_scores(
    scores: &[Vec<Vec<f32>>],
) -> Result<(Vec<f32>, usize, usize), Box<dyn std::error::Error>> {
    let num_classes = scores.first().map_or(0, Vec::len);
    let spatial = scores
        .first()
        .and_then(|classes| classes.first())
        .map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(scores.len() * num_classes * spatial);
    for classes in scores {
        if classes.len() != num_classes {
            return Err("every batch item in scores must have the same class count".into());
        }
        for row in classes {
            if row.len() != spatial {
                return Err("every score row must have the same length".into());
            }
            flat.extend_from_slice(row);
        }
    }
    Ok((flat, num_classes, spatial))
}

fn flatten_boxes(
    boxes: &[Vec<[f32; 4]>],
) -> Result<(Vec<f32>, usize), Box<dyn std::error::Error>> {
    let spatial = boxes.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(boxes.len() * spatial * 4);
    for batch in boxes {
        if batch.len() != spatial {
            return Err("every batch item in boxes must have the same box count".into());
        }
        flat.extend(batch.iter().flatten());
    }
    Ok((flat, spatial))
}

/// Runs selection over a parsed config.
fn run(config: &Config) -> Result<Output, Box<dyn std::error::Error>> {
    if config.boxes.len() != config.scores.len() {
        return Err("boxes and scores must have the same batch count".into());
    }

    let (boxes, spatial) = flatten_boxes(&config.boxes)?;
    let (scores, num_classes, score_spatial) = flatten_scores(&config.scores)?;
    // With no classes the score rows carry no spatial information.
    let score_spatial = if num_classes == 0 { spatial } else { score_spatial };
    let num_batches = config.boxes.len();

    let boxes_view = BoxesView::new(&boxes, num_batches, spatial)?;
    let scores_view = ScoresView::new(&scores, num_batches, num_classes, score_spatial)?;
    let selector =
        NmsSelector::new(config.params.to_params()?).with_parallel(config.params.parallel);
    let selection = selector.select(boxes_view, scores_view)?;
    Ok(Output::new(&selection, config.padded))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("onnxnms=trace".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    let output = run(&config)?;
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
