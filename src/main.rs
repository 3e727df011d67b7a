//! azurite-core: command-line driver for the blob emulator core.
//!
//! `tags` evaluates a tag predicate against a tag set. `ranges` replays page
//! writes and clears against an in-memory page blob and prints its ranges.

use bytes::Bytes;
use clap::Parser;
use serde_json::json;
use std::collections::HashMap;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use azurite_core::query::{parse_predicate, TagBindings};
use azurite_core::ranges::fill_zero_ranges;
use azurite_core::{Args, BlobService, Command, Config, RequestContext, PAGE_SIZE};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const CONTAINER: &str = "cli";
const BLOB: &str = "pages";

#[tokio::main]
async fn main() -> CliResult<()> {
    let args = Args::parse();
    let config = Config::from(&args);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Tags {
            predicate,
            tags,
            container,
        } => run_tags(&predicate, &tags, container.as_deref()),
        Command::Ranges { ops, size } => run_ranges(config, &ops, size).await,
    }
}

fn run_tags(predicate: &str, pairs: &[String], container: Option<&str>) -> CliResult<()> {
    let expr = parse_predicate(predicate)?;

    let mut tags = HashMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("tag '{}' is not a KEY=VALUE pair", pair))?;
        tags.insert(key.to_string(), value.to_string());
    }

    let matched = expr.evaluate(&TagBindings::new(&tags, container));
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "predicate": expr.to_string(),
            "matched": matched,
        }))?
    );
    Ok(())
}

/// A page operation given on the command line.
enum PageOp {
    Write(u64, u64),
    Clear(u64, u64),
}

fn parse_op(op: &str) -> CliResult<PageOp> {
    let invalid = || format!("operation '{}' is not write:START-END or clear:START-END", op);

    let (kind, range) = op.split_once(':').ok_or_else(invalid)?;
    let (start, end) = range.split_once('-').ok_or_else(invalid)?;
    let start: u64 = start.trim().parse().map_err(|_| invalid())?;
    let end: u64 = end.trim().parse().map_err(|_| invalid())?;

    match kind {
        "write" => Ok(PageOp::Write(start, end)),
        "clear" => Ok(PageOp::Clear(start, end)),
        _ => Err(invalid().into()),
    }
}

async fn run_ranges(config: Config, ops: &[String], size: Option<u64>) -> CliResult<()> {
    let ops = ops.iter().map(|op| parse_op(op)).collect::<CliResult<Vec<_>>>()?;

    // Without --size, the blob is just large enough for every operation.
    let blob_size = size.unwrap_or_else(|| {
        let end = ops
            .iter()
            .map(|op| match op {
                PageOp::Write(_, end) | PageOp::Clear(_, end) => end + 1,
            })
            .max()
            .unwrap_or(0);
        end.div_ceil(PAGE_SIZE) * PAGE_SIZE
    });

    let account = config.account.clone();
    let service = BlobService::new(config);
    let container_ctx = || RequestContext::for_container(&account, CONTAINER);
    let blob_ctx = || RequestContext::for_blob(&account, CONTAINER, BLOB);

    service.create_container(&container_ctx()).await?;
    service
        .create_page_blob(
            &blob_ctx().with_header("x-ms-blob-content-length", &blob_size.to_string()),
        )
        .await?;

    for (index, op) in ops.iter().enumerate() {
        match *op {
            PageOp::Write(start, end) => {
                let fill = (index % 255 + 1) as u8;
                let body = Bytes::from(vec![fill; (end.saturating_sub(start) + 1) as usize]);
                let ctx = blob_ctx().with_header("x-ms-range", &format!("bytes={}-{}", start, end));
                service.upload_pages(&ctx, body).await?;
            }
            PageOp::Clear(start, end) => {
                let ctx = blob_ctx().with_header("x-ms-range", &format!("bytes={}-{}", start, end));
                service.clear_pages(&ctx).await?;
            }
        }
    }

    let ranges = service.get_page_ranges(&blob_ctx()).await?;
    info!(count = ranges.len(), size = blob_size, "Replayed page operations");

    let mut output = json!({ "size": blob_size, "ranges": ranges });
    if size.is_some() && blob_size > 0 {
        output["partition"] = json!(fill_zero_ranges(&ranges, 0, blob_size - 1)?);
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
