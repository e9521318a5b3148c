// ABOUTME: NutriJudge terminal frontend - scan, grade, and chat from the command line
// ABOUTME: Drives the ScanSession controller over stdin/stdout
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriJudge
//!
//! Usage:
//! ```bash
//! # Grade a product by barcode
//! nutrijudge scan 3017620422003
//!
//! # Grade a product and chat about the verdict afterwards
//! nutrijudge scan 3017620422003 --chat
//!
//! # Free-standing chat with the nutritionist persona
//! nutrijudge chat
//!
//! # Check the LLM endpoint is reachable
//! nutrijudge health
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use nutrijudge::chat::ImageAttachment;
use nutrijudge::config::AppConfig;
use nutrijudge::external::OpenFoodFactsClient;
use nutrijudge::insights;
use nutrijudge::llm::{LlmProvider, OpenAiCompatibleProvider};
use nutrijudge::logging;
use nutrijudge::models::ChatTopic;
use nutrijudge::session::{ScanSession, Screen, UiEffect};

#[derive(Parser)]
#[command(
    name = "nutrijudge",
    about = "Barcode-to-verdict nutrition grader",
    long_about = "Looks up a product barcode on Open Food Facts, asks the nutritionist model \
                  for a letter-grade verdict, and lets you chat about the result."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[non_exhaustive]
#[derive(Subcommand)]
enum Command {
    /// Look up a barcode and grade the product
    Scan {
        /// Product barcode (prompted for when omitted)
        barcode: Option<String>,

        /// Open a chat about the verdict afterwards
        #[arg(long)]
        chat: bool,
    },

    /// Free-standing chat with the nutritionist persona
    Chat {
        /// Attach an image file to the first turn (vision model)
        #[arg(long)]
        image: Option<std::path::PathBuf>,
    },

    /// Check the LLM endpoint is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_from_env()?;

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    config.log_summary();

    let products = Arc::new(OpenFoodFactsClient::new(config.lookup.clone())?);
    let provider = Arc::new(OpenAiCompatibleProvider::from_llm_config(&config.llm)?);

    match cli.command {
        Command::Scan { barcode, chat } => {
            let session = ScanSession::new(products, provider, &config.llm);
            run_scan(&session, barcode, chat).await?;
        }
        Command::Chat { image } => {
            let session = ScanSession::new(products, provider, &config.llm);
            session.open_chat(None).await;
            if let Some(path) = image {
                send_image_file(&session, &path).await?;
            }
            run_chat_repl(&session).await?;
        }
        Command::Health => {
            let healthy = provider.health_check().await?;
            println!(
                "{} ({}): {}",
                provider.display_name(),
                provider.default_model(),
                if healthy { "ok" } else { "unhealthy" }
            );
        }
    }

    Ok(())
}

/// Drive the scan → confirm → result flow
async fn run_scan(session: &ScanSession, barcode: Option<String>, chat: bool) -> Result<()> {
    session.start_scanning();

    let barcode = match barcode {
        Some(code) => code,
        None => prompt("Barcode: ").await?,
    };

    render_effects(&session.submit_barcode(barcode.trim()).await);
    if session.screen() != Screen::Confirm {
        return Ok(());
    }

    if let Some(product) = session.product() {
        println!("Found: {}", product.display_name());
        let brands = product.brand_label();
        if !brands.is_empty() {
            println!("Brand: {brands}");
        }
    }

    println!("Analyzing...");
    render_effects(&session.confirm_product().await);
    if session.screen() != Screen::ResultCard {
        return Ok(());
    }

    render_result(session);

    if chat {
        session.open_chat(Some(ChatTopic::Health)).await;
        for entry in session.chat_history().await {
            println!("[{}] {}", entry.role.as_str(), entry.content);
        }
        run_chat_repl(session).await?;
    }

    Ok(())
}

/// Print the verdict card and its derived insights
fn render_result(session: &ScanSession) {
    let (Some(product), Some(verdict)) = (session.product(), session.verdict()) else {
        return;
    };

    println!();
    println!("Grade {}  {}", verdict.grade, verdict.reasoning);
    for risk in &verdict.health_risks {
        println!("  risk: {risk}");
    }

    println!();
    for check in insights::verdict_checks(&product) {
        println!("  {:<12} {:?} ({})", check.label, check.status, check.value);
    }

    for topic in [
        ChatTopic::Nutrition,
        ChatTopic::Ingredients,
        ChatTopic::Health,
        ChatTopic::Alternatives,
    ] {
        let points = insights::topic_points(&product, &verdict, topic);
        println!("  {:<12} {} / {}", topic.as_str(), points[0], points[1]);
    }
}

/// Interactive chat loop; empty line or "/quit" exits
async fn run_chat_repl(session: &ScanSession) -> Result<()> {
    println!("Chat open. Empty line or /quit to leave.");
    let mut reader = BufReader::new(tokio::io::stdin());
    loop {
        let mut line = String::new();
        write_prompt("> ").await?;
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() || text == "/quit" {
            break;
        }

        match session.send_chat_text(text).await {
            Some(reply) => println!("{}", reply.content),
            None => break,
        }
    }

    session.reset().await;
    debug!("Chat closed, session reset");
    Ok(())
}

/// Send an image file as the first chat turn
async fn send_image_file(session: &ScanSession, path: &std::path::Path) -> Result<()> {
    let data = tokio::fs::read(path).await?;
    let media_type = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };

    let attachment = ImageAttachment {
        media_type: media_type.to_owned(),
        data,
    };
    if let Some(reply) = session.send_chat_image(attachment, None).await {
        println!("{}", reply.content);
    }
    Ok(())
}

/// Print alert/haptic effects for a terminal frontend
fn render_effects(effects: &[UiEffect]) {
    for effect in effects {
        match effect {
            UiEffect::Alert(message) => println!("! {message}"),
            UiEffect::Haptic(pattern) => debug!("Haptic feedback {pattern:?}"),
        }
    }
}

/// Write a prompt label without a trailing newline
async fn write_prompt(label: &str) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Write a prompt and read one line from stdin
async fn prompt(label: &str) -> Result<String> {
    write_prompt(label).await?;
    let mut line = String::new();
    let mut reader = BufReader::new(tokio::io::stdin());
    reader.read_line(&mut line).await?;
    Ok(line)
}
