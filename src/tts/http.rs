//! Synthesizer for OpenAI-compatible `/audio/speech` endpoints.

use crate::config::{AudioResponseFormat, TtsConfig};
use crate::error::{Result, StagecueError};
use crate::tts::Synthesizer;
use crate::tts::wav::{PcmSpec, pcm_to_wav};
use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};

/// Posts text to `{base_url}/audio/speech` and returns WAV bytes.
///
/// Backends that answer with raw PCM are wrapped in a WAV container using
/// the configured sample layout.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    voice: String,
    format: AudioResponseFormat,
    pcm: PcmSpec,
}

impl HttpSynthesizer {
    pub fn new(base_url: &str, config: &TtsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/audio/speech", base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            voice: config.voice.clone(),
            format: config.response_format,
            pcm: PcmSpec {
                sample_rate: config.sample_rate,
                channels: config.channels,
                bits_per_sample: config.bits_per_sample,
            },
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "response_format": self.format.as_str(),
        })
    }

    fn request(&self, text: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(&self.endpoint).json(&self.request_body(text));
        if self.api_key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.api_key)
        }
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let response = request.send().await.map_err(|e| StagecueError::Synthesis {
        message: format!("Speech request failed: {}", e),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(StagecueError::Synthesis {
            message: format!("Speech endpoint returned status {}", status),
        });
    }
    Ok(response)
}

type ByteStream = BoxStream<'static, reqwest::Result<Vec<u8>>>;

enum PcmStream {
    Request(reqwest::RequestBuilder),
    Reading { body: ByteStream, carry: Vec<u8> },
    Finished,
}

/// Reads until at least one whole frame is buffered and wraps all complete
/// frames as one WAV chunk. Leftover bytes wait for the next read.
async fn next_pcm_chunk(
    mut body: ByteStream,
    mut carry: Vec<u8>,
    pcm: PcmSpec,
) -> Option<(Result<Vec<u8>>, PcmStream)> {
    let align = pcm.block_align();
    loop {
        match body.next().await {
            Some(Ok(bytes)) => {
                carry.extend_from_slice(&bytes);
                let whole = carry.len() - carry.len() % align;
                if whole == 0 {
                    continue;
                }
                let frames: Vec<u8> = carry.drain(..whole).collect();
                return Some((pcm_to_wav(&frames, pcm), PcmStream::Reading { body, carry }));
            }
            Some(Err(e)) => {
                let error = StagecueError::Synthesis {
                    message: format!("Speech stream interrupted: {}", e),
                };
                return Some((Err(error), PcmStream::Finished));
            }
            None => {
                if !carry.is_empty() {
                    tracing::debug!(bytes = carry.len(), "Dropping trailing partial PCM frame");
                }
                return None;
            }
        }
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let response = send(self.request(text)).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| StagecueError::Synthesis {
                message: format!("Failed to read speech response: {}", e),
            })?;

        if body.is_empty() {
            return Err(StagecueError::Synthesis {
                message: "Speech endpoint returned no audio".to_string(),
            });
        }

        match self.format {
            AudioResponseFormat::Wav => Ok(body.to_vec()),
            AudioResponseFormat::Pcm => pcm_to_wav(&body, self.pcm),
        }
    }

    /// Raw PCM responses are forwarded as they arrive, one WAV chunk per
    /// read. A WAV response is only playable once complete, so it stays a
    /// single chunk.
    fn synthesize_stream<'a>(&'a self, text: &'a str) -> BoxStream<'a, Result<Vec<u8>>> {
        if self.format != AudioResponseFormat::Pcm {
            return stream::once(self.synthesize(text)).boxed();
        }
        if let Err(e) = self.pcm.check() {
            return stream::once(async move { Err(e) }).boxed();
        }

        let pcm = self.pcm;
        stream::unfold(PcmStream::Request(self.request(text)), move |state| async move {
            match state {
                PcmStream::Request(request) => match send(request).await {
                    Ok(response) => {
                        let body = response
                            .bytes_stream()
                            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                            .boxed();
                        next_pcm_chunk(body, Vec::new(), pcm).await
                    }
                    Err(e) => Some((Err(e), PcmStream::Finished)),
                },
                PcmStream::Reading { body, carry } => next_pcm_chunk(body, carry, pcm).await,
                PcmStream::Finished => None,
            }
        })
        .boxed()
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_and_body() {
        let config = TtsConfig {
            model: "tts-1".to_string(),
            voice: "nova".to_string(),
            response_format: AudioResponseFormat::Pcm,
            ..Default::default()
        };
        let synth = HttpSynthesizer::new("http://localhost:9880/v1/", &config);

        assert_eq!(synth.endpoint(), "http://localhost:9880/v1/audio/speech");
        let body = synth.request_body("你好");
        assert_eq!(body["input"], "你好");
        assert_eq!(body["voice"], "nova");
        assert_eq!(body["response_format"], "pcm");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_synthesis_error() {
        let synth = HttpSynthesizer::new("http://127.0.0.1:9", &TtsConfig::default());
        assert!(matches!(
            synth.synthesize("x").await,
            Err(StagecueError::Synthesis { .. })
        ));

        let pcm = TtsConfig {
            response_format: AudioResponseFormat::Pcm,
            ..Default::default()
        };
        let synth = HttpSynthesizer::new("http://127.0.0.1:9", &pcm);
        let chunks: Vec<Result<Vec<u8>>> = synth.synthesize_stream("x").collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(matches!(chunks[0], Err(StagecueError::Synthesis { .. })));
    }

    /// Serves one HTTP response with `body` and returns the base URL.
    async fn serve_once(body: Vec<u8>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // Headers, then the JSON body announced by Content-Length
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: audio/pcm\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_pcm_stream_yields_wav_chunks_of_whole_frames() {
        let samples: [i16; 3] = [1, -2, 3];
        let mut body: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        body.push(9);
        let base = serve_once(body).await;
        let config = TtsConfig {
            response_format: AudioResponseFormat::Pcm,
            ..Default::default()
        };
        let synth = HttpSynthesizer::new(&base, &config);

        let chunks: Vec<Vec<u8>> = synth
            .synthesize_stream("你好")
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;

        assert!(!chunks.is_empty());
        let mut decoded = Vec::new();
        for chunk in chunks {
            assert_eq!(&chunk[..4], b"RIFF");
            let mut reader = hound::WavReader::new(std::io::Cursor::new(chunk)).unwrap();
            decoded.extend(reader.samples::<i16>().map(|s| s.unwrap()));
        }
        assert_eq!(decoded, samples);
    }
}
