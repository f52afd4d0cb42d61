//! SmartLabel CLI - Bridge interface for the label service
//!
//! Commands: markets, render, batch, crisis
//! Outputs JSON to stdout, logs to stderr
//! Exit codes: 0 success, 1 input error, 2 render error

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use smartlabel_core::{
    CrisisInput, LabelConfig, LabelError, LabelPipeline, MockContentGenerator, PrintSpec,
    ProductInput, RenderRequest, RenderedLabel,
};

const INPUT_ERROR: u8 = 1;
const RENDER_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "smartlabel-cli")]
#[command(about = "SmartLabel CLI - market-aware nutrition label renderer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the engine config (JSON); defaults apply when absent
    #[arg(short, long, global = true, default_value = "smartlabel.json")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported markets
    Markets,

    /// Render one label
    Render(RenderArgs),

    /// Render the same product for several markets
    Batch {
        /// Comma-separated market ids
        #[arg(short, long, value_delimiter = ',', required = true)]
        markets: Vec<String>,

        /// JSON payload (product)
        #[arg(short, long)]
        payload: String,

        /// Write each PNG here instead of inlining base64
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Render a crisis label for one market
    Crisis {
        #[command(flatten)]
        render: RenderArgs,

        /// Crisis type: recall, allergen, contamination, regulatory
        #[arg(short = 't', long = "type")]
        crisis_type: String,

        #[arg(short, long, default_value = "")]
        details: String,
    },
}

#[derive(Args)]
struct RenderArgs {
    /// Market id
    #[arg(short, long)]
    market: String,

    /// JSON payload (product)
    #[arg(short, long)]
    payload: String,

    /// Write the PNG here instead of inlining base64
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Export at this DPI (72-1200) instead of the base resolution
    #[arg(long)]
    print_dpi: Option<u32>,

    /// Export at the configured print DPI
    #[arg(long)]
    print: bool,

    /// Include preview and thumbnail data URLs
    #[arg(long)]
    preview: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match LabelConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => return fail(INPUT_ERROR, json!({"success": false, "error": e.to_string()})),
    };
    let pipeline = LabelPipeline::from_config(MockContentGenerator, config);

    match cli.command {
        Commands::Markets => {
            let markets: Vec<_> = pipeline
                .regulations()
                .list()
                .map(|p| {
                    json!({
                        "id": p.market,
                        "title": p.title,
                        "language": p.language,
                        "regulation": p.regulation,
                        "energyUnit": p.energy_unit,
                        "certifications": p.certifications,
                    })
                })
                .collect();
            emit(&json!(markets));
            ExitCode::SUCCESS
        }

        Commands::Render(args) => run_render(&pipeline, &args, None),

        Commands::Crisis { render, crisis_type, details } => {
            let crisis = CrisisInput { crisis_type, details };
            run_render(&pipeline, &render, Some(crisis))
        }

        Commands::Batch { markets, payload, out_dir } => {
            let product = match parse_product(&payload) {
                Ok(p) => p,
                Err(code) => return code,
            };

            let mut failed = false;
            let results: Vec<Value> = pipeline
                .render_batch(&product, &markets, None)
                .into_iter()
                .map(|outcome| match outcome.result {
                    Ok(label) => {
                        let image = match &out_dir {
                            Some(dir) => write_image(&dir.join(&label.filename), &label.png_bytes),
                            None => Ok(json!({"imageBase64": STANDARD.encode(&label.png_bytes)})),
                        };
                        match image {
                            Ok(image) => json!({"market": outcome.market, "success": true, "label": label, "image": image}),
                            Err(e) => {
                                failed = true;
                                json!({"market": outcome.market, "success": false, "error": e, "kind": "io"})
                            }
                        }
                    }
                    Err(e) => {
                        failed = true;
                        error_json(&outcome.market, &e)
                    }
                })
                .collect();

            emit(&json!({"success": !failed, "results": results}));
            if failed {
                ExitCode::from(RENDER_ERROR)
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

fn run_render(
    pipeline: &LabelPipeline<MockContentGenerator>,
    args: &RenderArgs,
    crisis: Option<CrisisInput>,
) -> ExitCode {
    let product = match parse_product(&args.payload) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let request = RenderRequest {
        market: args.market.clone(),
        product,
        crisis,
    };

    let label = match pipeline.generate_label(&request) {
        Ok(label) => label,
        Err(e) => {
            let code = if e.is_input_error() { INPUT_ERROR } else { RENDER_ERROR };
            return fail(code, error_json(&args.market, &e));
        }
    };

    let spec = match (args.print_dpi, args.print) {
        (Some(dpi), _) => PrintSpec::from_user(dpi).map(Some).map_err(LabelError::from),
        (None, true) => pipeline.print_spec().map(Some),
        (None, false) => Ok(None),
    };
    let bytes = match spec {
        Ok(Some(spec)) => pipeline.print_export(&label, &spec),
        Ok(None) => Ok(label.png_bytes.clone()),
        Err(e) => Err(e),
    };
    let bytes = match bytes {
        Ok(b) => b,
        Err(e) => return fail(RENDER_ERROR, error_json(&args.market, &e)),
    };

    let image = match &args.out {
        Some(path) => write_image(path, &bytes),
        None => Ok(json!({"imageBase64": STANDARD.encode(&bytes)})),
    };
    let image = match image {
        Ok(v) => v,
        Err(e) => return fail(RENDER_ERROR, json!({"success": false, "error": e, "kind": "io"})),
    };

    let mut output = json!({"success": true, "label": label, "image": image});
    if args.preview {
        match previews(pipeline, &label) {
            Ok(p) => output["previews"] = p,
            Err(e) => return fail(RENDER_ERROR, error_json(&args.market, &e)),
        }
    }
    emit(&output);
    ExitCode::SUCCESS
}

fn previews(pipeline: &LabelPipeline<MockContentGenerator>, label: &RenderedLabel) -> Result<Value, LabelError> {
    Ok(json!({
        "preview": pipeline.preview_data_url(label)?,
        "thumbnail": pipeline.thumbnail_data_url(label)?,
    }))
}

fn parse_product(payload: &str) -> Result<ProductInput, ExitCode> {
    serde_json::from_str(payload).map_err(|e| {
        fail(
            INPUT_ERROR,
            json!({"success": false, "error": format!("Invalid payload: {e}"), "kind": "invalid_payload"}),
        )
    })
}

fn write_image(path: &Path, bytes: &[u8]) -> Result<Value, String> {
    fs::write(path, bytes).map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
    Ok(json!({"path": path.display().to_string(), "bytes": bytes.len()}))
}

fn error_json(market: &str, e: &LabelError) -> Value {
    json!({"market": market, "success": false, "error": e.to_string(), "kind": e.kind()})
}

fn emit(value: &Value) {
    println!("{value:#}");
}

fn fail(code: u8, value: Value) -> ExitCode {
    emit(&value);
    ExitCode::from(code)
}
