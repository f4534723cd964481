//! Demonstrates swapping providers behind the adapter interface.
//!
//! Run with: `cargo run --example multi_provider`
//!
//! Uses whichever of `OPENAI_API_KEY`, `GEMINI_API_KEY` or `XAI_API_KEY` is
//! set, and falls back to the offline mock adapter otherwise.

use byokgen::{AdapterFactory, ImageGenerationOptions, ProviderAdapter};

#[tokio::main]
async fn main() -> byokgen::Result<()> {
    let (provider_id, api_key, use_mock) = if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        ("openai", key, false)
    } else if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        ("gemini", key, false)
    } else if let Ok(key) = std::env::var("XAI_API_KEY") {
        ("grok", key, false)
    } else {
        println!("No API key found, using the mock adapter");
        ("mock", "mock-key".to_string(), true)
    };

    let adapter = AdapterFactory::create(provider_id, &api_key, None, use_mock);
    println!("Provider: {} ({})", adapter.name(), adapter.kind());

    let check = adapter.validate_api_key(&api_key).await;
    println!("Key check: {} ({})", check.is_valid, check.message);
    if !check.is_valid {
        return Ok(());
    }

    let options = ImageGenerationOptions::new().with_aspect_ratio("16:9");
    match adapter
        .generate_images("A serene mountain lake at dawn", &options)
        .await
    {
        Ok(result) => {
            for url in &result.image_urls {
                println!("{url}");
            }
        }
        Err(e) => {
            eprintln!("{e} (retryable: {})", e.is_retryable());
            eprintln!("{}", e.user_hint());
        }
    }

    Ok(())
}
