// SPDX-License-Identifier: GPL-3.0-only

//! Headless commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Streaming without the terminal UI
//! - Inspecting the configuration

use chrono::Local;
use futures::StreamExt;
use livestream::backends::gst::{GstStreamClient, list_cameras as enumerate_cameras};
use livestream::backends::{AttachedResources, connection_events};
use livestream::constants::format_bitrate;
use livestream::{Config, SessionController, SessionPhase, SessionState};
use std::sync::Arc;
use std::time::Duration;

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = enumerate_cameras()?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        if let Some(path) = &camera.path {
            println!("      Device: {}", path);
        }
    }
    println!();
    println!("Pass --device <path> (repeatable) to pick cameras.");

    Ok(())
}

/// Stream until `duration` elapses, Ctrl+C, or the session ends
pub fn stream(config: Config, duration: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Streaming to: {}", config.default_url);
    println!(
        "Format: {}x{}@{} {}",
        config.video.width,
        config.video.height,
        config.video.framerate,
        format_bitrate(config.video_bitrate_kbps())
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let (events_tx, events_rx) = connection_events();
        let client = Arc::new(GstStreamClient::new(config.clone(), events_tx)?);
        let controller = Arc::new(SessionController::from_config(&config));
        controller.attach(AttachedResources::from_backend(client));
        let pump = tokio::spawn(Arc::clone(&controller).pump_events(events_rx));

        let (stop_tx, mut stop_rx) = tokio::sync::mpsc::unbounded_channel();
        ctrlc::set_handler(move || {
            let _ = stop_tx.send(());
        })?;

        let mut snapshots = Box::pin(controller.subscribe());

        // Preview start waits on the camera; keep it off the runtime threads
        let starter = Arc::clone(&controller);
        tokio::task::spawn_blocking(move || {
            starter.start_preview();
            starter.request_start();
        })
        .await?;

        let deadline = async {
            match duration {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut went_live = false;
        loop {
            tokio::select! {
                Some(state) = snapshots.next() => {
                    print_snapshot(&state);
                    if let Some(err) = &state.last_error {
                        eprintln!("Session failed: {}", err);
                        break;
                    }
                    if state.phase() != SessionPhase::Idle {
                        went_live = true;
                    } else if went_live {
                        println!("Stream ended by server");
                        break;
                    }
                }
                _ = stop_rx.recv() => {
                    println!("Interrupted");
                    break;
                }
                _ = &mut deadline => {
                    println!("Duration reached");
                    break;
                }
            }
        }

        let stopper = Arc::clone(&controller);
        tokio::task::spawn_blocking(move || {
            stopper.request_stop();
            stopper.detach();
        })
        .await?;
        drop(controller);

        // Ends once the client and its event sender are gone
        let _ = tokio::time::timeout(Duration::from_secs(2), pump).await;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Print the configuration, optionally writing the defaults first
pub fn show_config(config: &Config, write_default: bool) -> Result<(), Box<dyn std::error::Error>> {
    if write_default {
        let path = Config::default().save()?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    if let Some(path) = Config::default_path() {
        println!("# {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn print_snapshot(state: &SessionState) {
    println!(
        "[{}] {:<10} preview={:<3} url={}{}",
        Local::now().format("%H:%M:%S"),
        state.phase().description(),
        if state.preview_on { "on" } else { "off" },
        state.trimmed_url(),
        state
            .last_error
            .as_ref()
            .map(|e| format!(" error={}", e))
            .unwrap_or_default()
    );
}
