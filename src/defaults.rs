//! Default configuration constants for stagecue.
//!
//! Shared by the config types, the pipeline and the orchestrator so that the
//! same values are used everywhere.

/// Default set of boundary characters that end a speakable unit.
///
/// Covers sentence-final and clause punctuation in Latin and CJK scripts.
/// The first character doubles as the forced flush unit at end of turn.
pub const BOUNDARY_CHARS: &str = "\n,.:;?!，。：；？！";

/// Prefix added to the next user message after an in-flight reply was cut off.
pub const INTERRUPT_MARKER: &str = "(打断了你) ";

/// Default server address for the transport layer.
pub const SERVER_URL: &str = "localhost:8000";

/// Default agent name, used in the endpoint path `/ws/agent/{name}`.
pub const AGENT_NAME: &str = "stagecue";

/// Number of most recent history entries sent to the model per call.
pub const MAX_CONTEXT_LENGTH: usize = 11;

/// Default chat model for the OpenAI provider.
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Default chat model for the GLM provider.
pub const GLM_MODEL: &str = "glm-4-flash";

/// Base URL of the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL of the Zhipu GLM OpenAI-compatible API.
pub const GLM_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

/// Default speech model for OpenAI-compatible speech endpoints.
pub const TTS_MODEL: &str = "tts-1";

/// Default voice for OpenAI-compatible speech endpoints.
pub const TTS_VOICE: &str = "alloy";

/// Output sample rate of raw PCM speech backends, in Hz.
pub const TTS_SAMPLE_RATE: u32 = 24000;

/// Channel count of raw PCM speech backends.
pub const TTS_CHANNELS: u16 = 1;

/// Bit depth of raw PCM speech backends.
pub const TTS_BITS_PER_SAMPLE: u16 = 16;

/// Audio container announced in every `say_aloud` event.
pub const AUDIO_FORMAT: &str = "wav";

/// Capacity of the outbound event channel between orchestrator and writer.
pub const OUTBOUND_BUFFER: usize = 64;

/// Characters per delta emitted by the offline echo model.
pub const ECHO_CHUNK_CHARS: usize = 2;
