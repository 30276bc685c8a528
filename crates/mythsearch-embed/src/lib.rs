//! mythsearch-embed
//!
//! Query encoders. `MiniLmEmbedder` runs the all-MiniLM-L6-v2 sentence
//! transformer locally with candle (mean pooling + L2 normalization, matching
//! how the story vectors were produced). `FakeEmbedder` is a deterministic
//! hashing encoder for tests and development.

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use mythsearch_core::config::EmbeddingSettings;
pub use mythsearch_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;

pub struct MiniLmEmbedder { model: BertModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize, pad_id: u32 }

impl MiniLmEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        info!(dir = %model_dir.display(), "loading sentence-transformer model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow!("Failed to read {}: {}", config_path.display(), e))?;
        let config: BertConfig = serde_json::from_str(&raw_config)?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw_config)?
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)
            .map_err(|e| anyhow!("Failed to read weights {}: {}", weights_path.display(), e))?;
        let weights_map: std::collections::HashMap<String, candle_core::Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
        info!(dim, max_len, "sentence-transformer model loaded");
        Ok(Self { model, tokenizer, device, dim, max_len, pad_id })
    }

    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let out: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 { warn!(?elapsed, batch = texts.len(), "slow embedding"); } else { debug!(?elapsed, batch = texts.len(), "embedded"); }
        Ok(out)
    }
}

impl Embedder for MiniLmEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        self.encode(texts)
    }
}

/// Hashes whitespace tokens into buckets; deterministic and L2-normalized.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Builds the encoder described by `settings`. `APP_USE_FAKE_EMBEDDINGS=1`
/// forces the fake encoder regardless of settings.
pub fn get_default_embedder(settings: &EmbeddingSettings, model_dir: &Path) -> Result<Box<dyn Embedder>> {
    let forced = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if settings.use_fake || forced {
        info!(dim = settings.dimension, "using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(settings.dimension)));
    }
    let dir = resolve_model_dir(model_dir)?;
    Ok(Box::new(MiniLmEmbedder::load(&dir, settings.max_len)?))
}

fn resolve_model_dir(configured: &Path) -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { info!(dir = %p.display(), "using {var}"); return Ok(p); }
        }
    }
    if configured.exists() { return Ok(configured.to_path_buf()); }
    Err(anyhow!("Could not locate embedding model directory {}", configured.display()))
}
