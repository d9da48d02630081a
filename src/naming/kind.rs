
/// Canonical tensor roles known to the runtime
///
/// Declaration order matters: when two kinds claim the same source spelling
/// for one architecture, the later kind wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorKind {
    TokenEmbd,
    TokenEmbdNorm,
    TokenTypes,
    PosEmbd,
    Output,
    OutputNorm,
    RopeFreqs,
    AttnNorm,
    AttnNorm2,
    AttnQkv,
    AttnQ,
    AttnK,
    AttnV,
    AttnOut,
    AttnOutNorm,
    AttnRotEmbd,
    AttnQNorm,
    AttnKNorm,
    FfnNorm,
    FfnGateInp,
    FfnGateInpShexp,
    FfnUp,
    FfnUpExp,
    FfnUpShexp,
    FfnAct,
    FfnGate,
    FfnGateExp,
    FfnGateShexp,
    FfnDown,
    FfnDownExp,
    FfnDownShexp,
    LayerOutNorm,
}

impl TensorKind {
    pub const ALL: [TensorKind; 32] = [
        TensorKind::TokenEmbd,
        TensorKind::TokenEmbdNorm,
        TensorKind::TokenTypes,
        TensorKind::PosEmbd,
        TensorKind::Output,
        TensorKind::OutputNorm,
        TensorKind::RopeFreqs,
        TensorKind::AttnNorm,
        TensorKind::AttnNorm2,
        TensorKind::AttnQkv,
        TensorKind::AttnQ,
        TensorKind::AttnK,
        TensorKind::AttnV,
        TensorKind::AttnOut,
        TensorKind::AttnOutNorm,
        TensorKind::AttnRotEmbd,
        TensorKind::AttnQNorm,
        TensorKind::AttnKNorm,
        TensorKind::FfnNorm,
        TensorKind::FfnGateInp,
        TensorKind::FfnGateInpShexp,
        TensorKind::FfnUp,
        TensorKind::FfnUpExp,
        TensorKind::FfnUpShexp,
        TensorKind::FfnAct,
        TensorKind::FfnGate,
        TensorKind::FfnGateExp,
        TensorKind::FfnGateShexp,
        TensorKind::FfnDown,
        TensorKind::FfnDownExp,
        TensorKind::FfnDownShexp,
        TensorKind::LayerOutNorm,
    ];

    /// Canonical name template; `{bid}` is the block index, `{xid}` the expert index.
    pub fn canonical(self) -> &'static str {
        match self {
            TensorKind::TokenEmbd => "token_embd",
            TensorKind::TokenEmbdNorm => "token_embd_norm",
            TensorKind::TokenTypes => "token_types",
            TensorKind::PosEmbd => "position_embd",
            TensorKind::Output => "output",
            TensorKind::OutputNorm => "output_norm",
            TensorKind::RopeFreqs => "rope_freqs",
            TensorKind::AttnNorm => "blk.{bid}.attn_norm",
            TensorKind::AttnNorm2 => "blk.{bid}.attn_norm_2",
            TensorKind::AttnQkv => "blk.{bid}.attn_qkv",
            TensorKind::AttnQ => "blk.{bid}.attn_q",
            TensorKind::AttnK => "blk.{bid}.attn_k",
            TensorKind::AttnV => "blk.{bid}.attn_v",
            TensorKind::AttnOut => "blk.{bid}.attn_output",
            TensorKind::AttnOutNorm => "blk.{bid}.attn_output_norm",
            TensorKind::AttnRotEmbd => "blk.{bid}.attn_rot_embd",
            TensorKind::AttnQNorm => "blk.{bid}.attn_q_norm",
            TensorKind::AttnKNorm => "blk.{bid}.attn_k_norm",
            TensorKind::FfnNorm => "blk.{bid}.ffn_norm",
            TensorKind::FfnGateInp => "blk.{bid}.ffn_gate_inp",
            TensorKind::FfnGateInpShexp => "blk.{bid}.ffn_gate_inp_shexp",
            TensorKind::FfnUp => "blk.{bid}.ffn_up",
            TensorKind::FfnUpExp => "blk.{bid}.ffn_up.{xid}",
            TensorKind::FfnUpShexp => "blk.{bid}.ffn_up_shexp",
            TensorKind::FfnAct => "blk.{bid}.ffn",
            TensorKind::FfnGate => "blk.{bid}.ffn_gate",
            TensorKind::FfnGateExp => "blk.{bid}.ffn_gate.{xid}",
            TensorKind::FfnGateShexp => "blk.{bid}.ffn_gate_shexp",
            TensorKind::FfnDown => "blk.{bid}.ffn_down",
            TensorKind::FfnDownExp => "blk.{bid}.ffn_down.{xid}",
            TensorKind::FfnDownShexp => "blk.{bid}.ffn_down_shexp",
            TensorKind::LayerOutNorm => "blk.{bid}.layer_output_norm",
        }
    }

    /// Source spellings used by the model families' reference checkpoints
    pub fn sources(self) -> &'static [&'static str] {
        match self {
            TensorKind::TokenEmbd => &[
                "gpt_neox.embed_in",
                "transformer.wte",
                "transformer.word_embeddings",
                "word_embeddings",
                "model.embed_tokens",
                "tok_embeddings",
                "embeddings.word_embeddings",
                "language_model.embedding.word_embeddings",
                "wte",
                "transformer.embd.wte",
                "model.tok_embeddings",
                "model.embedding",
                "transformer.embedding",
            ],
            TensorKind::TokenEmbdNorm => &[
                "word_embeddings_layernorm",
                "embeddings.LayerNorm",
                "emb_ln",
                "transformer.word_embeddings_layernorm",
            ],
            TensorKind::TokenTypes => &["embeddings.token_type_embeddings"],
            TensorKind::PosEmbd => &[
                "transformer.wpe",
                "embeddings.position_embeddings",
                "wpe",
            ],
            TensorKind::Output => &[
                "embed_out",
                "lm_head",
                "output",
                "word_embeddings_for_head",
                "lm_head.linear",
            ],
            TensorKind::OutputNorm => &[
                "gpt_neox.final_layer_norm",
                "transformer.ln_f",
                "model.norm",
                "norm",
                "transformer.norm_f",
                "ln_f",
                "language_model.encoder.final_layernorm",
                "model.final_layernorm",
                "lm_head.ln",
                "model.norm_f",
            ],
            TensorKind::RopeFreqs => &["rope.freqs", "model.rotary_emb.inv_freq"],
            TensorKind::AttnNorm => &[
                "gpt_neox.layers.{bid}.input_layernorm",
                "transformer.h.{bid}.ln_1",
                "transformer.blocks.{bid}.norm_1",
                "transformer.h.{bid}.input_layernorm",
                "h.{bid}.input_layernorm",
                "transformer.h.{bid}.ln_mlp",
                "model.layers.{bid}.input_layernorm",
                "layers.{bid}.attention_norm",
                "language_model.encoder.layers.{bid}.input_layernorm",
                "model.layers.{bid}.ln1",
                "h.{bid}.ln_1",
                "transformer.h.{bid}.ln",
                "model.layers.{bid}.attention_norm",
                "model.layers.{bid}.norm",
            ],
            TensorKind::AttnNorm2 => &["transformer.h.{bid}.ln_attn"],
            TensorKind::AttnQkv => &[
                "gpt_neox.layers.{bid}.attention.query_key_value",
                "transformer.h.{bid}.attn.c_attn",
                "transformer.blocks.{bid}.attn.Wqkv",
                "transformer.h.{bid}.self_attention.query_key_value",
                "h.{bid}.self_attention.query_key_value",
                "language_model.encoder.layers.{bid}.self_attention.query_key_value",
                "model.layers.{bid}.self_attn.query_key_value",
                "h.{bid}.attn.c_attn",
                "transformer.h.{bid}.mixer.Wqkv",
                "model.layers.{bid}.self_attn.qkv_proj",
            ],
            TensorKind::AttnQ => &[
                "model.layers.{bid}.self_attn.q_proj",
                "layers.{bid}.attention.wq",
                "encoder.layer.{bid}.attention.self.query",
                "transformer.h.{bid}.attn.q_proj",
                "model.layers.{bid}.attention.wq",
            ],
            TensorKind::AttnK => &[
                "model.layers.{bid}.self_attn.k_proj",
                "layers.{bid}.attention.wk",
                "encoder.layer.{bid}.attention.self.key",
                "transformer.h.{bid}.attn.k_proj",
                "model.layers.{bid}.attention.wk",
            ],
            TensorKind::AttnV => &[
                "model.layers.{bid}.self_attn.v_proj",
                "layers.{bid}.attention.wv",
                "encoder.layer.{bid}.attention.self.value",
                "transformer.h.{bid}.attn.v_proj",
                "model.layers.{bid}.attention.wv",
            ],
            TensorKind::AttnOut => &[
                "gpt_neox.layers.{bid}.attention.dense",
                "transformer.h.{bid}.attn.c_proj",
                "transformer.blocks.{bid}.attn.out_proj",
                "transformer.h.{bid}.self_attention.dense",
                "h.{bid}.self_attention.dense",
                "model.layers.{bid}.self_attn.o_proj",
                "layers.{bid}.attention.wo",
                "encoder.layer.{bid}.attention.output.dense",
                "transformer.h.{bid}.attn.out_proj",
                "language_model.encoder.layers.{bid}.self_attention.dense",
                "model.layers.{bid}.self_attn.dense",
                "h.{bid}.attn.c_proj",
                "transformer.h.{bid}.mixer.out_proj",
                "model.layers.{bid}.attention.wo",
            ],
            TensorKind::AttnOutNorm => &["encoder.layer.{bid}.attention.output.LayerNorm"],
            TensorKind::AttnRotEmbd => &[
                "model.layers.{bid}.self_attn.rotary_emb.inv_freq",
                "layers.{bid}.attention.inner_attention.rope.freqs",
                "transformer.h.{bid}.attn.rotary_emb.inv_freq",
            ],
            TensorKind::AttnQNorm => &[
                "language_model.encoder.layers.{bid}.self_attention.q_layernorm",
                "model.layers.{bid}.self_attn.q_layernorm",
                "model.layers.{bid}.self_attn.q_norm",
                "transformer.blocks.{bid}.attn.q_ln",
            ],
            TensorKind::AttnKNorm => &[
                "language_model.encoder.layers.{bid}.self_attention.k_layernorm",
                "model.layers.{bid}.self_attn.k_layernorm",
                "model.layers.{bid}.self_attn.k_norm",
                "transformer.blocks.{bid}.attn.k_ln",
            ],
            TensorKind::FfnNorm => &[
                "gpt_neox.layers.{bid}.post_attention_layernorm",
                "transformer.h.{bid}.ln_2",
                "h.{bid}.post_attention_layernorm",
                "transformer.blocks.{bid}.norm_2",
                "model.layers.{bid}.post_attention_layernorm",
                "layers.{bid}.ffn_norm",
                "language_model.encoder.layers.{bid}.post_attention_layernorm",
                "model.layers.{bid}.ln2",
                "h.{bid}.ln_2",
                "model.layers.{bid}.ffn_norm",
            ],
            TensorKind::FfnGateInp => &[
                "layers.{bid}.feed_forward.gate",
                "model.layers.{bid}.block_sparse_moe.gate",
                "model.layers.{bid}.mlp.gate",
            ],
            TensorKind::FfnGateInpShexp => &["model.layers.{bid}.mlp.shared_expert_gate"],
            TensorKind::FfnUp => &[
                "gpt_neox.layers.{bid}.mlp.dense_h_to_4h",
                "transformer.h.{bid}.mlp.c_fc",
                "transformer.blocks.{bid}.ffn.up_proj",
                "transformer.h.{bid}.mlp.dense_h_to_4h",
                "h.{bid}.mlp.dense_h_to_4h",
                "model.layers.{bid}.mlp.up_proj",
                "layers.{bid}.feed_forward.w3",
                "encoder.layer.{bid}.intermediate.dense",
                "transformer.h.{bid}.mlp.fc_in",
                "transformer.h.{bid}.mlp.linear_3",
                "language_model.encoder.layers.{bid}.mlp.dense_h_to_4h",
                "model.layers.{bid}.mlp.dense_h_to_4h",
                "transformer.h.{bid}.mlp.w1",
                "h.{bid}.mlp.c_fc",
                "transformer.h.{bid}.mlp.fc1",
                "model.layers.{bid}.mlp.fc1",
                "model.layers.{bid}.mlp.gate_up_proj",
                "model.layers.{bid}.feed_forward.w3",
            ],
            TensorKind::FfnUpExp => &[
                "layers.{bid}.feed_forward.experts.{xid}.w3",
                "model.layers.{bid}.block_sparse_moe.experts.{xid}.w3",
                "model.layers.{bid}.mlp.experts.{xid}.up_proj",
            ],
            TensorKind::FfnUpShexp => &["model.layers.{bid}.mlp.shared_expert.up_proj"],
            TensorKind::FfnAct => &["transformer.blocks.{bid}.ffn.act"],
            TensorKind::FfnGate => &[
                "model.layers.{bid}.mlp.gate_proj",
                "layers.{bid}.feed_forward.w1",
                "transformer.h.{bid}.mlp.w2",
                "transformer.h.{bid}.mlp.c_fc2",
                "model.layers.{bid}.feed_forward.w1",
            ],
            TensorKind::FfnGateExp => &[
                "layers.{bid}.feed_forward.experts.{xid}.w1",
                "model.layers.{bid}.block_sparse_moe.experts.{xid}.w1",
                "model.layers.{bid}.mlp.experts.{xid}.gate_proj",
            ],
            TensorKind::FfnGateShexp => &["model.layers.{bid}.mlp.shared_expert.gate_proj"],
            TensorKind::FfnDown => &[
                "gpt_neox.layers.{bid}.mlp.dense_4h_to_h",
                "transformer.h.{bid}.mlp.c_proj",
                "transformer.blocks.{bid}.ffn.down_proj",
                "transformer.h.{bid}.mlp.dense_4h_to_h",
                "h.{bid}.mlp.dense_4h_to_h",
                "model.layers.{bid}.mlp.down_proj",
                "layers.{bid}.feed_forward.w2",
                "encoder.layer.{bid}.output.dense",
                "transformer.h.{bid}.mlp.fc_out",
                "language_model.encoder.layers.{bid}.mlp.dense_4h_to_h",
                "model.layers.{bid}.mlp.dense_4h_to_h",
                "h.{bid}.mlp.c_proj",
                "transformer.h.{bid}.mlp.fc2",
                "model.layers.{bid}.mlp.fc2",
                "model.layers.{bid}.feed_forward.w2",
            ],
            TensorKind::FfnDownExp => &[
                "layers.{bid}.feed_forward.experts.{xid}.w2",
                "model.layers.{bid}.block_sparse_moe.experts.{xid}.w2",
                "model.layers.{bid}.mlp.experts.{xid}.down_proj",
            ],
            TensorKind::FfnDownShexp => &["model.layers.{bid}.mlp.shared_expert.down_proj"],
            TensorKind::LayerOutNorm => &["encoder.layer.{bid}.output.LayerNorm"],
        }
    }

    /// Whether the canonical name carries a block index
    pub fn is_block(self) -> bool {
        self.canonical().contains("{bid}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_block_source_names_a_block() {
        for kind in TensorKind::ALL {
            for source in kind.sources() {
                assert_eq!(
                    source.contains("{bid}"),
                    kind.is_block(),
                    "{kind:?} source {source}"
                );
                assert_eq!(
                    source.contains("{xid}"),
                    kind.canonical().contains("{xid}"),
                    "{kind:?} source {source}"
                );
            }
        }
    }
}
