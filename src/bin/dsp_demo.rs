//! DSP smoke demo
//!
//! Plays one of the built-in generators through the default output device
//! so the signal path can be checked by ear. Pass `white`, `pink` or
//! `tone` as the first argument.

use anyhow::{bail, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use airband_radio::audio::device::AudioDevice;
use airband_radio::audio::{
    PinkNoiseGenerator, SampleSource, SineToneSource, WhiteNoiseGenerator,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let kind = std::env::args().nth(1).unwrap_or_else(|| "pink".into());
    let source: Box<dyn SampleSource> = match kind.as_str() {
        "white" => Box::new(WhiteNoiseGenerator::new(0.3)),
        "pink" => Box::new(PinkNoiseGenerator::new(0.3)),
        "tone" => Box::new(SineToneSource::new(440.0)),
        other => bail!("unknown source {other:?}; expected white, pink or tone"),
    };

    let mut device = AudioDevice::new();
    device.open_output(source)?;
    tracing::info!(source = %kind, "playing, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    if let Some(err) = device.check_error() {
        tracing::warn!(error = %err, "stream reported an error");
    }
    device.close();
    tracing::info!("stopped");
    Ok(())
}
