//! CLI for byokgen - image generation with your own provider keys.

use anyhow::Context;
use byokgen::image::{decode_data_uri, extension_for_mime};
use byokgen::{
    AdapterConfig, AdapterFactory, ImageGenerationOptions, ProviderAdapter, ProviderKind,
    ResponseFormat,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "byokgen")]
#[command(about = "Generate images via OpenAI, Imagen or xAI with your own API key")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate images from a text prompt
    Generate(GenerateArgs),

    /// Check an API key against the provider's model listing
    Validate(ValidateArgs),

    /// List available providers
    Providers,
}

#[derive(Args)]
struct ProviderArgs {
    /// Provider id (openai, imagen/gemini, xai/grok, mock)
    #[arg(short, long, default_value = "openai")]
    provider: String,

    /// API key (falls back to the provider's environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// Override the provider's API root
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    #[command(flatten)]
    provider: ProviderArgs,

    /// Number of images (clamped per provider)
    #[arg(short = 'n', long)]
    count: Option<u32>,

    /// Size as WxH
    #[arg(long)]
    size: Option<String>,

    /// Aspect ratio (e.g., 16:9)
    #[arg(long)]
    aspect_ratio: Option<String>,

    /// Quality tier (provider-specific)
    #[arg(long)]
    quality: Option<String>,

    /// Style (provider-specific)
    #[arg(long)]
    style: Option<String>,

    /// Model id (provider-specific)
    #[arg(short, long)]
    model: Option<String>,

    /// Return base64 data URIs instead of URLs
    #[arg(long)]
    base64: bool,

    /// Use the offline mock adapter
    #[arg(long)]
    mock: bool,

    /// Save base64 images into this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ValidateArgs {
    #[command(flatten)]
    provider: ProviderArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate(args, cli.json).await?,
        Commands::Validate(args) => validate(args, cli.json).await?,
        Commands::Providers => list_providers(cli.json)?,
    }

    Ok(())
}

/// Explicit key, else the provider's environment variables.
fn resolve_api_key(args: &ProviderArgs) -> String {
    if let Some(key) = args.api_key.clone() {
        return key;
    }
    ProviderKind::resolve(&args.provider)
        .env_vars()
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .unwrap_or_default()
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let api_key = resolve_api_key(&args.provider);
    let config =
        AdapterConfig::from_env(api_key).with_base_url(args.provider.base_url.as_deref());
    let adapter = AdapterFactory::create_with_config(&args.provider.provider, &config, args.mock);

    let mut options = ImageGenerationOptions::new();
    options.count = args.count;
    options.size = args.size;
    options.aspect_ratio = args.aspect_ratio;
    options.quality = args.quality;
    options.style = args.style;
    options.model = args.model;
    if args.base64 || args.output_dir.is_some() {
        options.response_format = Some(ResponseFormat::Base64);
    }

    let result = match adapter.generate_images(&args.prompt, &options).await {
        Ok(result) => result,
        Err(e) => {
            if json_output {
                let out = serde_json::json!({
                    "success": false,
                    "type": e.kind(),
                    "message": e.message(),
                    "statusCode": e.status_code(),
                    "retryable": e.is_retryable(),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                std::process::exit(1);
            }
            anyhow::bail!("{e}\n{}", e.user_hint());
        }
    };

    let saved = match &args.output_dir {
        Some(dir) => save_images(dir, &result.image_urls)?,
        None => Vec::new(),
    };

    if json_output {
        let out = serde_json::json!({
            "success": true,
            "provider": adapter.kind(),
            "imageUrls": if saved.is_empty() { result.image_urls.clone() } else { Vec::new() },
            "saved": saved,
            "metadata": result.metadata,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "Generated {} image(s) via {} ({})",
            result.image_urls.len(),
            adapter.name(),
            result.metadata.model
        );
        if saved.is_empty() {
            for url in &result.image_urls {
                println!("  {url}");
            }
        } else {
            for path in &saved {
                println!("  saved {}", path.display());
            }
        }
        println!("Duration: {}ms", result.metadata.duration_ms);
    }

    Ok(())
}

fn save_images(dir: &Path, image_urls: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let mut saved = Vec::new();
    for (i, uri) in image_urls.iter().enumerate() {
        if !uri.starts_with("data:") {
            eprintln!("skipping non-inline image {uri}");
            continue;
        }
        let (mime, bytes) = decode_data_uri(uri)?;
        let path = dir.join(format!("image-{}.{}", i + 1, extension_for_mime(&mime)));
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        saved.push(path);
    }
    Ok(saved)
}

async fn validate(args: ValidateArgs, json_output: bool) -> anyhow::Result<()> {
    let api_key = resolve_api_key(&args.provider);
    let adapter = AdapterFactory::create(
        &args.provider.provider,
        &api_key,
        args.provider.base_url.as_deref(),
        false,
    );
    let result = adapter.validate_api_key(&api_key).await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let status = if result.is_valid { "✓" } else { "✗" };
        println!("{status} {}: {}", adapter.name(), result.message);
    }

    if !result.is_valid {
        std::process::exit(1);
    }
    Ok(())
}

fn list_providers(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ProviderInfo {
        name: &'static str,
        id: &'static str,
        env_vars: &'static [&'static str],
        strict_ascii_prompt: bool,
    }

    let providers: Vec<ProviderInfo> = [
        ProviderKind::OpenAi,
        ProviderKind::Imagen,
        ProviderKind::Xai,
        ProviderKind::Mock,
    ]
    .into_iter()
    .map(|kind| ProviderInfo {
        name: kind.display_name(),
        id: kind.as_str(),
        env_vars: kind.env_vars(),
        strict_ascii_prompt: kind.requires_ascii_prompt(),
    })
    .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Available providers:\n");
        for p in &providers {
            println!("  {} ({})", p.name, p.id);
            if !p.env_vars.is_empty() {
                println!("    API key: {}", p.env_vars.join(" or "));
            }
        }
    }

    Ok(())
}
