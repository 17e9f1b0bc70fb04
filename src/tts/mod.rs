//! Text-to-speech backends.

pub mod http;
pub mod wav;

use crate::config::{TtsConfig, TtsProvider};
use crate::error::{Result, StagecueError};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use std::sync::{Arc, Mutex, PoisonError};

pub use http::HttpSynthesizer;
pub use wav::{PcmSpec, pcm_to_wav};

/// Trait for speech synthesis.
///
/// This trait allows swapping implementations (HTTP backend vs mock).
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes `text` into encoded audio (a WAV container).
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// Synthesizes `text` as a sequence of independently playable WAV chunks.
    ///
    /// The default yields the whole [`synthesize`](Self::synthesize) result
    /// as a single chunk.
    fn synthesize_stream<'a>(&'a self, text: &'a str) -> BoxStream<'a, Result<Vec<u8>>> {
        stream::once(self.synthesize(text)).boxed()
    }

    /// Name for logging.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: Synthesizer + ?Sized> Synthesizer for Arc<T> {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        (**self).synthesize(text).await
    }

    fn synthesize_stream<'a>(&'a self, text: &'a str) -> BoxStream<'a, Result<Vec<u8>>> {
        (**self).synthesize_stream(text)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Creates the synthesizer selected in the configuration.
pub fn create_synthesizer(config: &TtsConfig) -> Result<Arc<dyn Synthesizer>> {
    match config.provider {
        TtsProvider::OpenAiCompatible => {
            let Some(base_url) = config.base_url.as_deref().filter(|u| !u.trim().is_empty())
            else {
                return Err(StagecueError::ConfigInvalidValue {
                    key: "tts.base_url".to_string(),
                    message: "required for provider 'openai_compatible'".to_string(),
                });
            };
            Ok(Arc::new(HttpSynthesizer::new(base_url, config)))
        }
        TtsProvider::Silent => Ok(Arc::new(SilentSynthesizer)),
    }
}

/// Produces no audio. `say_aloud` events then carry no media.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSynthesizer;

#[async_trait]
impl Synthesizer for SilentSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "silent"
    }
}

/// Mock synthesizer for testing
#[derive(Debug, Clone)]
pub struct MockSynthesizer {
    audio: Vec<u8>,
    chunks: Option<Vec<Vec<u8>>>,
    should_fail: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockSynthesizer {
    /// Create a mock returning a fixed payload
    pub fn new() -> Self {
        Self {
            audio: b"RIFFmock".to_vec(),
            chunks: None,
            should_fail: false,
            calls: Arc::default(),
        }
    }

    /// Configure the mock to return specific bytes
    pub fn with_audio(mut self, audio: &[u8]) -> Self {
        self.audio = audio.to_vec();
        self
    }

    /// Configure the mock to stream these chunks, in order
    pub fn with_chunks<I, C>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        self.chunks = Some(chunks.into_iter().map(|c| c.as_ref().to_vec()).collect());
        self
    }

    /// Configure the mock to fail on synthesize.
    ///
    /// When streaming, the failure follows the configured chunks.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Texts received so far. Clones share the record.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, text: &str) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }

    fn failure() -> StagecueError {
        StagecueError::Synthesis {
            message: "mock synthesis failure".to_string(),
        }
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.record(text);
        if self.should_fail {
            Err(Self::failure())
        } else if let Some(chunks) = &self.chunks {
            Ok(chunks.concat())
        } else {
            Ok(self.audio.clone())
        }
    }

    fn synthesize_stream<'a>(&'a self, text: &'a str) -> BoxStream<'a, Result<Vec<u8>>> {
        let Some(chunks) = &self.chunks else {
            return stream::once(self.synthesize(text)).boxed();
        };
        self.record(text);
        let mut items: Vec<Result<Vec<u8>>> = chunks.iter().cloned().map(Ok).collect();
        if self.should_fail {
            items.push(Err(Self::failure()));
        }
        stream::iter(items).boxed()
    }

    fn name(&self) -> &str {
        "mock"
    }
}
