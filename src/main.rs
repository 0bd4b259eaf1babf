use clap::Parser;
use facegroup::simd::norm_simd;
use facegroup::{ClusterId, CreationTimes, FaceClusterer, FaceGroupConfig, FaceInput};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Cluster face embeddings into identities
#[derive(Parser, Debug)]
#[command(name = "facegroup")]
#[command(about = "Incremental face clustering", long_about = None)]
struct Args {
    /// JSON array of faces: [{"face_id", "cluster_id"?, "embedding": [..]}]
    #[arg(short, long)]
    input: PathBuf,

    /// JSON object mapping file id to creation time in microseconds
    #[arg(long)]
    creation_times: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the cosine distance threshold
    #[arg(long)]
    threshold: Option<f32>,

    /// Normalize embeddings to unit length before clustering
    #[arg(long, default_value_t = false)]
    normalize: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct FaceEntry {
    face_id: String,
    #[serde(default)]
    cluster_id: Option<ClusterId>,
    embedding: Vec<f32>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn to_input(entry: FaceEntry, normalize: bool) -> FaceInput {
    let mut values = entry.embedding;
    if normalize {
        let norm = norm_simd(&values);
        if norm > f32::EPSILON {
            values.iter_mut().for_each(|x| *x /= norm);
        }
    }
    FaceInput::from_values(entry.face_id, entry.cluster_id, &values)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries the result
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting FaceGroup v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => FaceGroupConfig::from_file(path)?,
        None => FaceGroupConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.clustering.distance_threshold = threshold;
    }
    info!("Distance threshold: {}", config.clustering.distance_threshold);

    let entries: Vec<FaceEntry> = read_json(&args.input)?;
    let batch: Vec<FaceInput> = entries
        .into_iter()
        .map(|entry| to_input(entry, args.normalize))
        .collect();
    info!("Loaded {} faces from {:?}", batch.len(), args.input);

    let creation_times = match &args.creation_times {
        Some(path) => Some(read_json::<CreationTimes>(path)?),
        None => None,
    };

    let clusterer = FaceClusterer::new(config)?;
    let result = clusterer.predict(batch, creation_times).await;
    clusterer.dispose();

    match result? {
        Some(delta) => {
            info!("Assigned {} faces", delta.len());
            println!("{}", serde_json::to_string_pretty(&delta)?);
        }
        None => {
            warn!("Nothing was clustered");
            println!("{{}}");
        }
    }

    Ok(())
}
