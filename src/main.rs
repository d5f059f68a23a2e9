#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod gesture;
mod keyboard;
mod pipeline;
mod types;
mod ui;

use anyhow::{Context, Result};
use gpui::Application;
use gpui_component;

use config::AppConfig;

fn main() -> Result<()> {
    env_logger::init();

    let config = AppConfig::from_env().context("failed to read configuration")?;
    log::info!(
        "debounce {:?}, hit margin {}px, canvas {}x{}",
        config.session.debounce,
        config.session.hit_margin,
        config.canvas.0,
        config.canvas.1
    );

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, config) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
