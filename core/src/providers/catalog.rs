use crate::records::GenerationKind;

/// Static description of an upstream provider.
pub struct ProviderSeed {
    pub id: &'static str,
    pub display: &'static str,
    pub credential_env: &'static str,
    pub base_url_env: &'static str,
    pub default_base_url: &'static str,
    pub kinds: &'static [GenerationKind],
}

pub const OPENAI: &str = "openai";
pub const XAI: &str = "xai";
pub const STABILITY: &str = "stability";
pub const ELEVENLABS: &str = "elevenlabs";

pub const PROVIDER_SEEDS: &[ProviderSeed] = &[
    ProviderSeed {
        id: OPENAI,
        display: "OpenAI",
        credential_env: "OPENAI_API_KEY",
        base_url_env: "OPENAI_BASE_URL",
        default_base_url: "https://api.openai.com/v1",
        kinds: &[GenerationKind::Text, GenerationKind::Image, GenerationKind::Speech],
    },
    ProviderSeed {
        id: XAI,
        display: "xAI Grok",
        credential_env: "XAI_API_KEY",
        base_url_env: "XAI_BASE_URL",
        default_base_url: "https://api.x.ai/v1",
        kinds: &[GenerationKind::Text],
    },
    ProviderSeed {
        id: STABILITY,
        display: "Stability AI",
        credential_env: "STABILITY_API_KEY",
        base_url_env: "STABILITY_BASE_URL",
        default_base_url: "https://api.stability.ai",
        kinds: &[GenerationKind::Image],
    },
    ProviderSeed {
        id: ELEVENLABS,
        display: "ElevenLabs",
        credential_env: "ELEVENLABS_API_KEY",
        base_url_env: "ELEVENLABS_BASE_URL",
        default_base_url: "https://api.elevenlabs.io/v1",
        kinds: &[GenerationKind::Speech],
    },
];

/// Fallback order per generation kind, highest priority first.
pub fn fallback_order(kind: GenerationKind) -> &'static [&'static str] {
    match kind {
        GenerationKind::Text => &[XAI, OPENAI],
        GenerationKind::Image => &[STABILITY, OPENAI],
        GenerationKind::Speech => &[ELEVENLABS, OPENAI],
    }
}

pub fn seed(id: &str) -> Option<&'static ProviderSeed> {
    PROVIDER_SEEDS.iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_chains_only_name_capable_providers() {
        for kind in GenerationKind::ALL {
            for id in fallback_order(kind) {
                let seed = seed(id).expect("provider listed in catalogue");
                assert!(seed.kinds.contains(&kind), "{id} cannot serve {kind}");
            }
        }
    }

    #[test]
    fn openai_is_the_last_resort_everywhere() {
        for kind in GenerationKind::ALL {
            assert_eq!(fallback_order(kind).last(), Some(&OPENAI));
        }
    }
}
