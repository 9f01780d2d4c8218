use anyhow::{bail, Result};
use asic_price_monitor::config::{ChannelConfig, Config};
use asic_price_monitor::parsers::{LineContext, MessageVerdict};
use asic_price_monitor::pipeline::{LineOutcome, Pipeline};
use asic_price_monitor::sources::{MessageSource, TelegramWebSource};
use asic_price_monitor::utils::http::create_client;
use chrono::Utc;
use std::fs;

/// Prints how every line of a channel's recent messages is classified.
/// Usage: inspect_channel <handle> [message limit]
#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(handle) = args.next() else {
        bail!("usage: inspect_channel <handle> [message limit]");
    };
    let limit = args.next().map(|n| n.parse()).transpose()?.unwrap_or(20);

    let config = Config::load()?;
    let pipeline = Pipeline::new(&config.rules, config.pipeline.clone())?;
    let client = create_client(&config.user_agent)?;

    let channel = ChannelConfig { handle, title: None };
    let source = TelegramWebSource::new(&channel, config.telegram_base_url.clone(), config.max_retries);

    println!("Fetching {}...", source.page_url(None)?);
    let page = source.fetch_page(&client, None).await?;
    let sample = format!("{}_posts.txt", channel.handle);
    fs::write(&sample, format!("{:#?}", page.posts))?;
    println!("Wrote {} raw posts to {}", page.posts.len(), sample);

    let messages = source.fetch(&client, limit).await?;
    println!("Channel '{}': {} messages\n", source.channel_title(), messages.len());

    let now = Utc::now();
    let mut listing_count = 0;
    for message in &messages {
        println!("=== {} ===", message.timestamp.format("%Y-%m-%d %H:%M"));
        let verdict = pipeline.screen_message(message, now);
        if verdict != MessageVerdict::Accept {
            println!("  [skipped: {:?}]\n", verdict);
            continue;
        }

        let mut context = LineContext::default();
        for raw in message.text.lines() {
            match pipeline.process_line(raw, &context, &message.source_channel, message.timestamp) {
                LineOutcome::RegionHeader(tag) => {
                    println!("  REGION {:<4} | {}", tag, raw.trim());
                    context = context.with_region(tag);
                }
                LineOutcome::Dropped(reason) => println!("  drop {:<16} | {}", reason.to_string(), raw.trim()),
                LineOutcome::Listings(listings) => {
                    for listing in &listings {
                        println!(
                            "  LIST {} @ {}T = ${} [{}]",
                            listing.name, listing.hashrate_th, listing.price_usd, listing.source
                        );
                    }
                    listing_count += listings.len();
                }
            }
        }
        println!();
    }

    println!("{} listings from {} messages", listing_count, messages.len());
    Ok(())
}
