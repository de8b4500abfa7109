use super::{PlatformResult, PlayableAudio};
use crate::error::PlatformError;
use async_trait::async_trait;
use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use tracing::debug;

/// Encoded audio (WAV or MP3) played on the default output device.
pub struct DecodedAudio {
    bytes: Vec<u8>,
}

impl DecodedAudio {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

fn play_blocking(bytes: Vec<u8>) -> PlatformResult<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    let (_stream, handle) = OutputStream::try_default()
        .map_err(|err| PlatformError::Unavailable(format!("no audio output: {err}")))?;
    let sink = Sink::try_new(&handle)
        .map_err(|err| PlatformError::Unavailable(format!("playback blocked: {err}")))?;
    let source = Decoder::new(Cursor::new(bytes))
        .map_err(|err| PlatformError::Transport(format!("undecodable audio: {err}")))?;
    sink.append(source);
    sink.sleep_until_end();
    debug!("speech playback finished");
    Ok(())
}

#[async_trait]
impl PlayableAudio for DecodedAudio {
    async fn play(self: Box<Self>) -> PlatformResult<()> {
        // The rodio stream is not Send; keep it on one blocking thread for its whole life.
        let bytes = self.bytes;
        tokio::task::spawn_blocking(move || play_blocking(bytes))
            .await
            .map_err(|err| PlatformError::Unavailable(format!("playback task failed: {err}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_audio_plays_without_a_device() {
        Box::new(DecodedAudio::new(Vec::new()))
            .play()
            .await
            .expect("empty audio is a no-op");
    }
}
