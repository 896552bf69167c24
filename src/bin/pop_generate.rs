use anyhow::{Context, Result, anyhow};
use clap::Parser;
use popgen::azure::AzureClient;
use popgen::cli::{AzureArgs, PipelineArgs};
use popgen::config::setup_logging;
use popgen::constants::DEFAULT_OUTPUT_DIR;
use popgen::copy::CopyGenerator;
use popgen::state::GenerationState;
use popgen::synth::ImageSynthesizer;
use std::path::PathBuf;

/// Generate POP copy and images for one objective, without the web UI.
///
/// Minimal UX:
///   pop_generate "夏のセールを告知したい" --template Summer
#[derive(Parser, Debug)]
#[command(name = "pop_generate")]
#[command(about = "Generate POP ad copy and images from a marketing objective")]
struct Args {
    /// What the POP should achieve
    objective: String,

    /// Color template to apply; repeat for up to three
    #[arg(long = "template", short)]
    templates: Vec<String>,

    /// Output directory for the generated images
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR, env = "POPGEN_OUTPUT_DIR")]
    out_dir: PathBuf,

    /// Also write the generated copy to <out_dir>/copy.json
    #[arg(long)]
    save_copy: bool,

    /// Only generate the copy, skip the images
    #[arg(long)]
    copy_only: bool,

    #[arg(long, env = "POPGEN_DEBUG")]
    debug: bool,

    #[command(flatten)]
    azure: AzureArgs,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let _ = setup_logging(args.debug);

    let client = AzureClient::new(args.azure.azure_config()?)?;
    let catalog = args.pipeline.catalog()?;
    let prompt_options = args.pipeline.prompt_options();

    let mut state = GenerationState::new(args.objective.clone());
    for name in &args.templates {
        if catalog.get(name).is_none() {
            let known: Vec<&str> = catalog.templates().iter().map(|t| t.name.as_str()).collect();
            return Err(anyhow!(
                "Unknown template {name:?}, expected one of: {}",
                known.join(", ")
            ));
        }
        if !state.select_template(name, &catalog) {
            eprintln!("Skipping template {name}, at most three can be used");
        }
    }

    let generator = CopyGenerator::new(client.clone(), args.pipeline.generation_options()?);
    let copy = generator
        .generate(&args.objective)
        .await
        .context("Copy generation failed")?;
    println!("{}", serde_json::to_string_pretty(&copy)?);
    let state = state.with_copy(copy);

    if args.save_copy {
        tokio::fs::create_dir_all(&args.out_dir)
            .await
            .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;
        let path = args.out_dir.join("copy.json");
        tokio::fs::write(&path, serde_json::to_vec_pretty(&state.copy)?)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        eprintln!("Saved: {}", path.display());
    }
    if args.copy_only {
        return Ok(());
    }

    let synthesizer = ImageSynthesizer::new(client, args.pipeline.synthesis_options()?);
    let mut failures = 0usize;
    for job in state.synthesis_jobs(&catalog, &prompt_options) {
        let output = args.out_dir.join(&job.file_name);
        match synthesizer.synthesize(&job.prompt, &output).await {
            Ok(image) => eprintln!(
                "Saved: {} ({}x{}, {})",
                image.path.display(),
                image.width,
                image.height,
                job.label().unwrap_or("no template")
            ),
            Err(err) => {
                failures += 1;
                eprintln!("Image {} failed: {err}", job.file_name);
            }
        }
    }
    if failures > 0 {
        return Err(anyhow!("{failures} image(s) failed"));
    }
    Ok(())
}
