//! Provider family classification.

/// Providers known to speak the OpenAI chat/model-listing wire protocol.
pub const OPENAI_COMPATIBLE_IDS: &[&str] = &[
    "openai",
    "openai_compat",
    "openai-compatible",
    "openai-compatible-audio-speech",
    "openai-compatible-audio-transcription",
    "openai-audio-speech",
    "openai-audio-transcription",
    "openrouter-ai",
    "ollama",
    "lm-studio",
    "vllm",
    "deepseek",
    "302-ai",
    "alibaba-cloud-model-studio",
    "volcengine",
    "comet-api",
    "cerebras-ai",
    "together-ai",
    "azure-ai-foundry",
    "xai",
    "novita-ai",
    "fireworks-ai",
    "featherless-ai",
    "cloudflare-workers-ai",
    "perplexity-ai",
    "mistral-ai",
    "moonshot-ai",
    "modelscope",
    "player2",
    "groq",
    "glm",
];

/// Bot-orchestration platforms with their own validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotPlatform {
    Dify,
    FastGpt,
    Coze,
}

impl BotPlatform {
    fn from_id(provider_id: &str) -> Option<Self> {
        match provider_id {
            "dify" => Some(BotPlatform::Dify),
            "fastgpt" => Some(BotPlatform::FastGpt),
            "coze" => Some(BotPlatform::Coze),
            _ => None,
        }
    }

    /// Extra config field the platform needs to address a bot, if any.
    pub fn required_field(&self) -> Option<&'static str> {
        match self {
            BotPlatform::Coze => Some("bot_id"),
            BotPlatform::Dify | BotPlatform::FastGpt => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BotPlatform::Dify => "Dify",
            BotPlatform::FastGpt => "FastGPT",
            BotPlatform::Coze => "Coze",
        }
    }
}

/// Behavioral family of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    OpenAiCompatible,
    BotStyle(BotPlatform),
    BasicAuth,
}

/// Classify a provider identifier. Total over all strings.
///
/// Rules, in priority order:
/// 1. Known bot platform
/// 2. Known OpenAI-compatible id, or any id containing `"openai"`
/// 3. Everything else is basic-auth
pub fn classify(provider_id: &str) -> Family {
    if let Some(platform) = BotPlatform::from_id(provider_id) {
        return Family::BotStyle(platform);
    }
    if OPENAI_COMPATIBLE_IDS.contains(&provider_id) {
        return Family::OpenAiCompatible;
    }
    // Catches vendor-prefixed variants such as "azure-openai".
    if provider_id.contains("openai") {
        return Family::OpenAiCompatible;
    }
    Family::BasicAuth
}
