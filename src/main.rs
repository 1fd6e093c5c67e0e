mod app;
mod application;
mod config;
mod domain;
mod engine;
mod ui;
mod utils;

use std::sync::Arc;

use iced::window;

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("simple_media_downloader=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> iced::Result {
    init_tracing();

    let config = Arc::new(config::AppConfig::from_env());
    if let Err(e) = config.ensure_destination() {
        tracing::error!("{}", e);
    }
    tracing::info!(
        destination = %config.destination_dir.display(),
        engine = %config.engine_binary.display(),
        "Configuration resolved"
    );

    let icon_data = include_bytes!("../assets/icon.png");

    let icon = match image::load_from_memory(icon_data) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            window::icon::from_rgba(rgba.into_raw(), width, height).ok()
        }
        Err(_) => None,
    };

    iced::application(
        move || app::DownloadApp::new(Arc::clone(&config)),
        app::update,
        app::view,
    )
    .title("Video / Audio Downloader")
    .window(window::Settings {
        icon,
        size: iced::Size::new(550.0, 480.0),
        ..Default::default()
    })
    .run()
}
