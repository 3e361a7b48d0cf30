//! Command implementations

use serde_json::Value;
use std::path::Path;

use crate::client::ApiClient;
use crate::{CliError, Result, StatusKind};

/// `intake sync [--start-page N]`
pub async fn sync(client: &ApiClient, start_page: Option<u32>) -> Result<()> {
    let body = client.trigger_sync(start_page).await?;

    let run_id = body
        .pointer("/data/run_id")
        .and_then(Value::as_str)
        .unwrap_or("?");
    println!("Sync started (run {run_id}).");
    println!("Poll with: intake status sync");
    Ok(())
}

/// `intake import FILE [--mode ..] [--layout ..] [--preview]`
pub async fn import(
    client: &ApiClient,
    file: &Path,
    mode: &str,
    layout: Option<&str>,
    preview_only: bool,
) -> Result<()> {
    if !file.exists() {
        return Err(CliError::api(format!("file not found: {}", file.display())));
    }

    if preview_only {
        let body = client.preview_import(file, layout).await?;
        print_preview(&body);
        return Ok(());
    }

    // Preview first so the operator-visible counts always come from the
    // same classification the server commits with.
    let body = client.preview_import(file, layout).await?;
    print_preview(&body);

    let Some(staged_file) = body.pointer("/data/staged_file").and_then(Value::as_str) else {
        println!("Nothing to import.");
        return Ok(());
    };

    let confirm = client.confirm_import(staged_file, mode).await?;
    let run_id = confirm
        .pointer("/data/run_id")
        .and_then(Value::as_str)
        .unwrap_or("?");
    println!("Import started (run {run_id}, mode {mode}).");
    println!("Poll with: intake status import");
    Ok(())
}

/// `intake status [import|sync]`
pub async fn status(client: &ApiClient, kind: StatusKind) -> Result<()> {
    let body = client.progress(kind).await?;
    println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    Ok(())
}

fn print_preview(body: &Value) {
    let new = count(body, "/data/new_records");
    let updates = count(body, "/data/update_records");
    let skips = body
        .pointer("/data/skip_count")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let rejected = body
        .pointer("/data/rejected_rows")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    println!("Preview: {new} new, {updates} updates, {skips} skips, {rejected} rejected rows");
}

fn count(body: &Value, pointer: &str) -> u64 {
    body.pointer(pointer)
        .and_then(Value::as_array)
        .map(|a| a.len() as u64)
        .unwrap_or(0)
}
