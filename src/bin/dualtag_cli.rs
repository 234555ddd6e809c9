//! DualTag CLI - thin adapter over the geometry engine
//!
//! Commands: validate, layout, build, digest, verify
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 when the inputs are rejected, 1 on any other failure

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dualtag_core::{
    config::{ConfigLoadError, ConfigOverrides, SlitOrientation},
    hashing::sha256_hex,
    print::PrintProfileError,
    BuildError, BuildOptions, ExportDocument, ExportError, Face, MaterialPreset, ModuleGrid, PrintProfile,
    QrError, TagBuild, TagConfig, TagPipeline, TextRequest,
};

#[derive(Parser)]
#[command(name = "dualtag-cli")]
#[command(about = "DualTag CLI - dual-side tag geometry engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Tag configuration (.yaml, .yml or .json); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: OverrideArgs,
}

/// Flags that win over values from the config file.
#[derive(Args)]
struct OverrideArgs {
    #[arg(long, global = true)]
    canvas_width: Option<f64>,

    #[arg(long, global = true)]
    canvas_height: Option<f64>,

    /// Target module count per side
    #[arg(long, global = true)]
    modules: Option<u32>,

    /// Module edge length in mm
    #[arg(long, global = true)]
    module_size: Option<f64>,

    #[arg(long, global = true)]
    quiet_modules: Option<u32>,

    #[arg(long, global = true)]
    total_thickness: Option<f64>,

    #[arg(long, global = true)]
    web_thickness: Option<f64>,

    #[arg(long, global = true, value_enum)]
    slit: Option<OrientationArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrientationArg {
    Vertical,
    Horizontal,
}

#[derive(Clone, Copy, ValueEnum)]
enum FaceArg {
    Front,
    Back,
}

impl From<FaceArg> for Face {
    fn from(f: FaceArg) -> Self {
        match f {
            FaceArg::Front => Face::Front,
            FaceArg::Back => Face::Back,
        }
    }
}

#[derive(Args)]
struct BuildArgs {
    /// Module matrix, one row per line ('#' dark, '.' light)
    #[arg(short, long)]
    matrix: PathBuf,

    /// Text requests (.yaml, .yml or .json list)
    #[arg(short, long)]
    text: Option<PathBuf>,

    /// Face that prints unmirrored on top
    #[arg(long, value_enum, default_value = "front")]
    canonical_face: FaceArg,

    /// Material preset (pla, petg, abs)
    #[arg(long)]
    preset: Option<String>,

    /// Layer height in mm; overrides the preset
    #[arg(long)]
    layer_height: Option<f64>,

    /// Stamp the build with the current time instead of the epoch
    #[arg(long)]
    timestamp: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration
    Validate,

    /// Print the computed layout and keep-out regions
    Layout,

    /// Build and write export.json, tag.svg and solid.json
    Build {
        #[command(flatten)]
        build: BuildArgs,

        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },

    /// Canonical digest of an existing export document
    Digest {
        document: PathBuf,
    },

    /// Build twice and compare digests of every artifact
    Verify {
        #[command(flatten)]
        build: BuildArgs,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid matrix {path}: {source}")]
    Matrix {
        path: String,
        #[source]
        source: QrError,
    },

    #[error("Invalid text requests {path}: {message}")]
    Text { path: String, message: String },

    #[error(transparent)]
    Print(#[from] PrintProfileError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Build(e) if e.is_rejection() => ExitCode::from(2),
            _ => ExitCode::FAILURE,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        let mut out = json!({
            "success": false,
            "error": self.to_string(),
        });
        if let CliError::Build(e) = self {
            match e {
                BuildError::Placement(v) => out["placement"] = json!(v),
                BuildError::Stacking(s) => out["stacking"] = json!(s),
                _ if !e.violations().is_empty() => out["violations"] = json!(e.violations()),
                _ => {}
            }
        }
        out
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CliError + '_ {
    move |source| CliError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn emit(value: &serde_json::Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(cli: &Cli) -> Result<TagConfig, CliError> {
    let base = match &cli.config {
        Some(path) => TagConfig::from_path(path)?,
        None => TagConfig::default(),
    };
    let o = &cli.overrides;
    let overrides = ConfigOverrides {
        canvas_width: o.canvas_width,
        canvas_height: o.canvas_height,
        modules: o.modules,
        module_size: o.module_size,
        quiet_modules: o.quiet_modules,
        total_thickness: o.total_thickness,
        web_thickness: o.web_thickness,
        slit_orientation: o.slit.map(|s| match s {
            OrientationArg::Vertical => SlitOrientation::Vertical,
            OrientationArg::Horizontal => SlitOrientation::Horizontal,
        }),
    };
    Ok(base.with_overrides(&overrides))
}

fn load_matrix(path: &Path) -> Result<ModuleGrid, CliError> {
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    content.parse().map_err(|source| CliError::Matrix {
        path: path.display().to_string(),
        source,
    })
}

fn load_requests(path: &Path) -> Result<Vec<TextRequest>, CliError> {
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    let text_err = |message: String| CliError::Text {
        path: path.display().to_string(),
        message,
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| text_err(e.to_string())),
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| text_err(e.to_string())),
        other => Err(text_err(format!("unsupported extension {:?}", other.unwrap_or("")))),
    }
}

fn build_options(args: &BuildArgs) -> Result<BuildOptions, CliError> {
    let material = args.preset.as_deref().map(str::parse::<MaterialPreset>).transpose()?;
    let print = match (args.layer_height, material) {
        (Some(h), m) => PrintProfile::from_user(h, m)?,
        (None, Some(m)) => PrintProfile::from_preset(m),
        (None, None) => PrintProfile::default(),
    };
    Ok(BuildOptions {
        deterministic: !args.timestamp,
        generated_at: None,
        canonical_face: args.canonical_face.into(),
        print,
    })
}

fn run_build(config: TagConfig, args: &BuildArgs) -> Result<TagBuild, CliError> {
    let grid = load_matrix(&args.matrix)?;
    let requests = match &args.text {
        Some(path) => load_requests(path)?,
        None => vec![],
    };
    let pipeline = TagPipeline::new(config, build_options(args)?);
    Ok(pipeline.build(&grid, &requests)?)
}

struct Artifacts {
    document: String,
    svg: String,
    solid: String,
}

impl Artifacts {
    fn render(build: &TagBuild) -> Result<Self, CliError> {
        Ok(Self {
            document: build.document.to_canonical_json()?,
            svg: build.vector().to_svg(),
            solid: build.solid().to_canonical_json()?,
        })
    }

    fn digests(&self) -> serde_json::Value {
        json!({
            "document": sha256_hex(self.document.as_bytes()),
            "svg": sha256_hex(self.svg.as_bytes()),
            "solid": sha256_hex(self.solid.as_bytes()),
        })
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    match &cli.command {
        Commands::Validate => {
            let config = load_config(&cli)?;
            let report = TagPipeline::new(config, BuildOptions::default()).validate();
            emit(&json!(report))?;
            Ok(if report.valid { ExitCode::SUCCESS } else { ExitCode::from(2) })
        }

        Commands::Layout => {
            let config = load_config(&cli)?;
            let pipeline = TagPipeline::new(config, BuildOptions::default());
            let computed = pipeline.layout()?;
            let stacking = pipeline.stacking()?;
            let keep_outs = dualtag_core::derive_keep_outs(pipeline.config(), &computed, &stacking);
            emit(&json!({ "computed": computed, "stacking": stacking, "keepOuts": keep_outs }))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Build { build, out } => {
            let config = load_config(&cli)?;
            let result = run_build(config, build)?;
            let artifacts = Artifacts::render(&result)?;

            fs::create_dir_all(out).map_err(io_err(out))?;
            let files = [
                ("export.json", &artifacts.document),
                ("tag.svg", &artifacts.svg),
                ("solid.json", &artifacts.solid),
            ];
            for (name, content) in files {
                let path = out.join(name);
                fs::write(&path, content).map_err(io_err(&path))?;
                debug!(path = %path.display(), "wrote artifact");
            }
            info!(out = %out.display(), "build written");

            emit(&json!({
                "success": true,
                "buildId": result.document.meta.build_id,
                "inputHash": result.document.meta.input_hash,
                "digest": result.digest()?,
                "lossy": result.resample.lossy,
                "warnings": result.report.warnings,
                "files": files.iter().map(|(name, _)| out.join(name).display().to_string()).collect::<Vec<_>>(),
            }))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Digest { document } => {
            let content = fs::read_to_string(document).map_err(io_err(document))?;
            let doc = ExportDocument::from_json(&content)?;
            doc.check_compatible()?;
            emit(&json!({
                "digest": doc.digest()?,
                "buildId": doc.meta.build_id,
                "version": doc.meta.version,
            }))?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Verify { build } => {
            let config = load_config(&cli)?;
            let first = Artifacts::render(&run_build(config.clone(), build)?)?.digests();
            let second = Artifacts::render(&run_build(config, build)?)?.digests();
            let deterministic = first == second;
            emit(&json!({
                "deterministic": deterministic,
                "first": first,
                "second": second,
            }))?;
            Ok(if deterministic { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            let out = e.to_json();
            match serde_json::to_string_pretty(&out) {
                Ok(s) => println!("{s}"),
                Err(_) => println!(r#"{{"success": false, "error": "{}"}}"#, e),
            }
            e.exit_code()
        }
    }
}
