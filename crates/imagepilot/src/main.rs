use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use imagepilot_build::{
    BuildError, DockerEngine, DockerfileSpec, ImagePipeline, Instruction, PipelineConfig,
    Registry, RegistryCredentials,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "imagepilot")]
#[command(about = "ImagePilot automates Docker image creation and pushing", long_about = None)]
#[command(version)]
struct Cli {
    /// Name of the Docker image
    #[arg(short = 'n', long, env = "IMAGEPILOT_NAME")]
    name: String,

    /// Tag for the Docker image
    #[arg(short = 't', long, env = "IMAGEPILOT_TAG", default_value = "latest")]
    tag: String,

    /// Docker registry URL
    #[arg(short = 'r', long, env = "IMAGEPILOT_REGISTRY")]
    registry: String,

    /// Username for Docker registry
    #[arg(short = 'u', long, env = "IMAGEPILOT_USERNAME", default_value = "")]
    username: String,

    /// Password for Docker registry
    #[arg(
        short = 'p',
        long,
        env = "IMAGEPILOT_PASSWORD",
        default_value = "",
        hide_env_values = true,
        hide_default_value = true
    )]
    password: String,

    /// Base image for the Dockerfile
    #[arg(short = 'f', long, env = "IMAGEPILOT_FROM", default_value = "golang:1.20-alpine")]
    from: String,

    /// Additional Dockerfile instructions in KEY=value format (e.g., --add 'RUN=apk add git')
    ///
    /// From the environment, separate multiple instructions with newlines.
    #[arg(
        long = "add",
        value_name = "KEY=VALUE",
        env = "IMAGEPILOT_ADD",
        value_delimiter = '\n',
        value_parser = parse_instruction
    )]
    add: Vec<Instruction>,

    /// Build context directory (the Dockerfile is written here)
    #[arg(short = 'C', long, env = "IMAGEPILOT_CONTEXT", default_value = ".")]
    context: PathBuf,
}

impl Cli {
    fn dockerfile_spec(&self) -> Result<DockerfileSpec, BuildError> {
        DockerfileSpec::new(&self.from, self.add.clone())
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            image_name: self.name.clone(),
            tag: self.tag.clone(),
            registry: Registry::parse(&self.registry),
            credentials: RegistryCredentials::new(&self.username, &self.password),
            context_dir: self.context.clone(),
        }
    }
}

fn parse_instruction(s: &str) -> Result<Instruction, String> {
    s.parse::<Instruction>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run(&cli).await {
        match e.downcast_ref::<BuildError>() {
            Some(build_error) => {
                eprintln!("{} {}", "✗".red(), build_error.user_message());
            }
            None => eprintln!("{} {:#}", "✗".red(), e),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    println!("{}", "Starting ImagePilot...".green());

    // Dockerfile をビルドコンテキストに生成
    let spec = cli.dockerfile_spec()?;
    let dockerfile = spec.write_to(&cli.context)?;
    println!(
        "{} Dockerfile created: {}",
        "✓".green(),
        dockerfile.display()
    );

    let engine = DockerEngine::connect().context("Failed to create Docker client")?;
    let pipeline = ImagePipeline::new(engine);
    let image = pipeline.run(&cli.pipeline_config()).await?;

    println!(
        "{} Docker image {} built and pushed successfully.",
        "✓".green(),
        image.to_string().cyan()
    );
    Ok(())
}
