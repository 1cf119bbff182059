use {
    base::log,
    relay::{Annotated, IouTracker, NoopDetector, Relay, RelayConfig},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RelayConfig::from_env()?;
    match config.log_dir() {
        Some(dir) => base::init_file_logger(dir)?,
        None => base::init_stdout_logger(),
    }

    log::info!("Edge video relay");
    log::info!(
        "Frames {} at {} fps detection, {} fps forward, JPEG quality {}",
        config.size(),
        config.frame_rate(),
        config.forward_rate(),
        config.jpeg_quality()
    );

    let stage = Annotated::new(NoopDetector, IouTracker::default());
    let relay = Relay::start(config, stage).await?;
    log::info!("Camera endpoint: ws://{}", relay.camera_addr());
    log::info!("Viewer endpoint: ws://{}", relay.viewer_addr());
    log::info!("Control endpoint: ws://{}", relay.control_addr());

    tokio::signal::ctrl_c().await?;
    log::info!("Interrupted");
    relay.stop().await;
    Ok(())
}
