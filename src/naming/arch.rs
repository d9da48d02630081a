use super::TensorKind::{self, *};
use crate::error::ConvertError;
use std::fmt;
use std::str::FromStr;

/// Model families the runtime can apply adapters to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Architecture {
    #[default]
    Llama,
    Falcon,
    Baichuan,
    Gpt2,
    GptJ,
    GptNeoX,
    Mpt,
    StarCoder,
    Refact,
    Bert,
    Bloom,
    StableLm,
    Qwen,
    Qwen2,
    Qwen2Moe,
    Phi2,
    Phi3,
    Gemma,
    StarCoder2,
    InternLm2,
    CommandR,
    Olmo,
    MiniCpm,
}

impl Architecture {
    pub const ALL: [Architecture; 23] = [
        Architecture::Llama,
        Architecture::Falcon,
        Architecture::Baichuan,
        Architecture::Gpt2,
        Architecture::GptJ,
        Architecture::GptNeoX,
        Architecture::Mpt,
        Architecture::StarCoder,
        Architecture::Refact,
        Architecture::Bert,
        Architecture::Bloom,
        Architecture::StableLm,
        Architecture::Qwen,
        Architecture::Qwen2,
        Architecture::Qwen2Moe,
        Architecture::Phi2,
        Architecture::Phi3,
        Architecture::Gemma,
        Architecture::StarCoder2,
        Architecture::InternLm2,
        Architecture::CommandR,
        Architecture::Olmo,
        Architecture::MiniCpm,
    ];

    /// Tag used on the command line and by the runtime
    pub fn tag(self) -> &'static str {
        match self {
            Architecture::Llama => "llama",
            Architecture::Falcon => "falcon",
            Architecture::Baichuan => "baichuan",
            Architecture::Gpt2 => "gpt2",
            Architecture::GptJ => "gptj",
            Architecture::GptNeoX => "gptneox",
            Architecture::Mpt => "mpt",
            Architecture::StarCoder => "starcoder",
            Architecture::Refact => "refact",
            Architecture::Bert => "bert",
            Architecture::Bloom => "bloom",
            Architecture::StableLm => "stablelm",
            Architecture::Qwen => "qwen",
            Architecture::Qwen2 => "qwen2",
            Architecture::Qwen2Moe => "qwen2moe",
            Architecture::Phi2 => "phi2",
            Architecture::Phi3 => "phi3",
            Architecture::Gemma => "gemma",
            Architecture::StarCoder2 => "starcoder2",
            Architecture::InternLm2 => "internlm2",
            Architecture::CommandR => "command-r",
            Architecture::Olmo => "olmo",
            Architecture::MiniCpm => "minicpm",
        }
    }

    /// All valid tags, in declaration order
    pub fn tags() -> Vec<&'static str> {
        Self::ALL.iter().map(|a| a.tag()).collect()
    }

    /// Source tensors that have no place in the output and are dropped.
    ///
    /// These are the vision-to-text projection weights some multimodal
    /// adapters (MiniGPT-4 style) ship next to the LoRA factors.
    pub fn skipped_tensors(self) -> &'static [&'static str] {
        &["llama_proj.weight", "llama_proj.bias"]
    }

    /// Canonical tensors this architecture defines
    pub fn tensor_kinds(self) -> &'static [TensorKind] {
        match self {
            Architecture::Llama => &[
                TokenEmbd, OutputNorm, Output, RopeFreqs, AttnNorm, AttnQ, AttnK, AttnV,
                AttnOut, AttnRotEmbd, FfnGateInp, FfnNorm, FfnGate, FfnDown, FfnUp,
                FfnGateExp, FfnDownExp, FfnUpExp,
            ],
            Architecture::Falcon => &[
                TokenEmbd, OutputNorm, Output, AttnNorm, AttnNorm2, AttnQkv, AttnOut,
                FfnDown, FfnUp,
            ],
            Architecture::Baichuan => &[
                TokenEmbd, OutputNorm, Output, RopeFreqs, AttnNorm, AttnQ, AttnK, AttnV,
                AttnOut, AttnRotEmbd, FfnNorm, FfnGate, FfnDown, FfnUp,
            ],
            Architecture::Gpt2 | Architecture::StarCoder => &[
                TokenEmbd, PosEmbd, OutputNorm, Output, AttnNorm, AttnQkv, AttnOut,
                FfnNorm, FfnDown, FfnUp,
            ],
            Architecture::GptJ => &[
                TokenEmbd, OutputNorm, Output, AttnNorm, AttnQ, AttnK, AttnV, AttnOut,
                FfnDown, FfnUp,
            ],
            Architecture::GptNeoX => &[
                TokenEmbd, OutputNorm, Output, AttnNorm, AttnQkv, AttnOut, FfnNorm,
                FfnDown, FfnUp,
            ],
            Architecture::Mpt => &[
                TokenEmbd, OutputNorm, Output, AttnNorm, AttnQkv, AttnOut, FfnNorm,
                FfnDown, FfnUp, FfnAct, AttnQNorm, AttnKNorm, PosEmbd,
            ],
            Architecture::Refact | Architecture::InternLm2 => &[
                TokenEmbd, OutputNorm, Output, AttnNorm, AttnQ, AttnK, AttnV, AttnOut,
                AttnRotEmbd, FfnNorm, FfnGate, FfnDown, FfnUp,
            ],
            Architecture::Bert => &[
                TokenEmbd, TokenEmbdNorm, TokenTypes, PosEmbd, OutputNorm, AttnOutNorm,
                AttnQ, AttnK, AttnV, AttnOut, FfnDown, FfnUp, LayerOutNorm,
            ],
            Architecture::Bloom => &[
                TokenEmbd, TokenEmbdNorm, OutputNorm, Output, AttnNorm, AttnQkv, AttnOut,
                FfnNorm, FfnDown, FfnUp,
            ],
            Architecture::StableLm => &[
                TokenEmbd, OutputNorm, Output, RopeFreqs, AttnNorm, AttnQ, AttnK, AttnV,
                AttnOut, FfnNorm, FfnGate, FfnDown, FfnUp, AttnQNorm, AttnKNorm,
            ],
            Architecture::Qwen => &[
                TokenEmbd, OutputNorm, Output, RopeFreqs, AttnNorm, AttnQkv, AttnOut,
                AttnRotEmbd, FfnNorm, FfnGate, FfnDown, FfnUp,
            ],
            Architecture::Qwen2 => &[
                TokenEmbd, OutputNorm, Output, AttnNorm, AttnQ, AttnK, AttnV, AttnOut,
                FfnNorm, FfnGate, FfnDown, FfnUp,
            ],
            Architecture::Qwen2Moe => &[
                TokenEmbd, OutputNorm, Output, AttnNorm, AttnQ, AttnK, AttnV, AttnOut,
                FfnNorm, FfnGateInp, FfnGateExp, FfnDownExp, FfnUpExp, FfnGateInpShexp,
                FfnGateShexp, FfnDownShexp, FfnUpShexp,
            ],
            Architecture::Phi2 => &[
                TokenEmbd, OutputNorm, Output, AttnNorm, AttnQkv, AttnQ, AttnK, AttnV,
                AttnOut, FfnDown, FfnUp,
            ],
            Architecture::Phi3 => &[
                TokenEmbd, OutputNorm, Output, AttnNorm, AttnQkv, AttnQ, AttnK, AttnV,
                AttnOut, FfnNorm, FfnDown, FfnUp,
            ],
            Architecture::Gemma => &[
                TokenEmbd, OutputNorm, AttnNorm, AttnQ, AttnK, AttnV, AttnOut, FfnGate,
                FfnDown, FfnUp, FfnNorm,
            ],
            Architecture::StarCoder2 => &[
                TokenEmbd, OutputNorm, Output, RopeFreqs, AttnNorm, AttnQ, AttnK, AttnV,
                AttnOut, AttnRotEmbd, FfnNorm, FfnDown, FfnUp,
            ],
            Architecture::CommandR => &[
                TokenEmbd, OutputNorm, AttnNorm, AttnQ, AttnK, AttnV, AttnOut, FfnGate,
                FfnDown, FfnUp, AttnKNorm, AttnQNorm,
            ],
            Architecture::Olmo => &[
                TokenEmbd, Output, AttnQ, AttnK, AttnV, AttnOut, FfnGate, FfnDown, FfnUp,
            ],
            Architecture::MiniCpm => &[
                TokenEmbd, OutputNorm, RopeFreqs, AttnNorm, AttnQ, AttnK, AttnV, AttnOut,
                AttnRotEmbd, FfnGateInp, FfnNorm, FfnGate, FfnDown, FfnUp, FfnGateExp,
                FfnDownExp, FfnUpExp,
            ],
        }
    }

    /// Architectures whose checkpoints may come from a bare decoder with
    /// no `model.` wrapper around `layers`.
    pub fn accepts_bare_decoder(self) -> bool {
        matches!(
            self,
            Architecture::Llama
                | Architecture::Baichuan
                | Architecture::Refact
                | Architecture::InternLm2
                | Architecture::Qwen2
                | Architecture::Qwen2Moe
                | Architecture::StableLm
                | Architecture::Gemma
                | Architecture::StarCoder2
                | Architecture::CommandR
                | Architecture::MiniCpm
        )
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Architecture {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.tag() == s)
            .ok_or_else(|| ConvertError::UnsupportedArchitecture(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for arch in Architecture::ALL {
            assert_eq!(arch.tag().parse::<Architecture>().unwrap(), arch);
        }
        assert_eq!(Architecture::tags().len(), Architecture::ALL.len());
    }

    #[test]
    fn test_unknown_tag() {
        let err = "llama3000".parse::<Architecture>().unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedArchitecture(ref t) if t == "llama3000"));
    }

    #[test]
    fn test_default_is_llama() {
        assert_eq!(Architecture::default(), Architecture::Llama);
        assert!(Architecture::Llama.tensor_kinds().contains(&TensorKind::AttnQ));
        assert!(!Architecture::Falcon.tensor_kinds().contains(&TensorKind::AttnQ));
    }
}
