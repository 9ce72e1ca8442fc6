use anyhow::{Context, Result};
use clap::Parser;

use glove_feedback::app;
use glove_feedback::config::Config;
use glove_feedback::gestures::GestureImages;
use glove_feedback::session::Session;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    log::info!("Starting glove feedback display");
    log::info!("Bridge: {} (port {})", config.bridge_exe.display(), config.port);

    let images = GestureImages::load(&config.images).with_context(|| {
        format!(
            "Create the images folder {:?} and add one picture per gesture (0.png .. 15.png, -1.png)",
            config.images
        )
    })?;

    let mut session = Session::new();
    session.start_bridge(&config.bridge(), config.shutdown_timeout());

    app::run(session, images, config.poll_interval())
}
