//! # Desktop Device Simulator
//!
//! Runs the playback core against the desktop bridges: PCM is written to a
//! file, the control channel is a TCP connection carrying JSON lines.
//!
//! Run with:
//!
//! ```text
//! cargo run --example simulator --package core-service -- [url]
//! ```
//!
//! Environment:
//! - `DEVICE_CONTROL_ADDR` (default `127.0.0.1:8765`)
//! - `DEVICE_BACKEND_URL` (optional, enables default-track resolution)
//! - `DEVICE_PCM_OUT` (default `device-audio.pcm` in the temp directory)
//! - `DEVICE_LOG` / `DEVICE_LOG_FORMAT` (log filter and `pretty|json|compact`)
//!
//! With a `url` argument the track is started right away; otherwise the
//! default track is resolved through the backend.

use anyhow::Context;
use bridge_desktop::{
    DesktopCompetingAudio, PcmFileOutput, StaticDeviceInfo, TcpControlTransport, TracingFeedback,
};
use bridge_traits::PcmFormat;
use core_playback::TrackId;
use core_runtime::config::DeviceConfig;
use core_runtime::logging::{init_logging, LoggingConfig};
use core_service::{bootstrap, ServiceOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::from_env()?).context("initializing logging")?;

    let control_addr =
        std::env::var("DEVICE_CONTROL_ADDR").unwrap_or_else(|_| "127.0.0.1:8765".to_string());
    let pcm_out = std::env::var("DEVICE_PCM_OUT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("device-audio.pcm"));

    let mut builder = DeviceConfig::builder()
        .audio_output(Arc::new(PcmFileOutput::to_file(&pcm_out, PcmFormat::default())))
        .control_transport(Arc::new(TcpControlTransport::spawn(
            control_addr.clone(),
            Duration::from_secs(5),
        )))
        .device_info(Arc::new(
            StaticDeviceInfo::new("02:00:00:00:00:01", env!("CARGO_PKG_VERSION"))
                .with_signal_strength(-55),
        ))
        .competing_audio(Arc::new(DesktopCompetingAudio::new()))
        .feedback(Arc::new(TracingFeedback));
    if let Ok(backend) = std::env::var("DEVICE_BACKEND_URL") {
        builder = builder.backend_base_url(backend);
    }
    let config = builder.build().context("building device config")?;

    println!("Control channel: {}", control_addr);
    println!("PCM output:      {}", pcm_out.display());

    let service = bootstrap(config, ServiceOptions::default())
        .await
        .context("starting playback core")?;

    match std::env::args().nth(1) {
        Some(url) => {
            service
                .controller()
                .start(url, "Simulator", TrackId::NONE)
                .await
        }
        None => service.play_default().await,
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    service.shutdown().await;
    Ok(())
}
