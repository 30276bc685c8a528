use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Tokenizes a batch, truncating to `max_len` and right-padding every sequence
/// with `pad_id` to the longest one. Returns `(input_ids, attention_mask)`,
/// both shaped `[B, T]`.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, pad_id: u32, device: &Device) -> Result<(Tensor, Tensor)> {
    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        if ids.len() > max_len { ids.truncate(max_len); mask.truncate(max_len); }
        rows.push((ids, mask));
    }
    let seq_len = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let mut flat_ids = Vec::with_capacity(rows.len() * seq_len);
    let mut flat_mask = Vec::with_capacity(rows.len() * seq_len);
    for (ids, mask) in rows {
        let pad = seq_len - ids.len();
        flat_ids.extend(ids.into_iter().chain(std::iter::repeat(pad_id).take(pad)));
        flat_mask.extend(mask.into_iter().chain(std::iter::repeat(0).take(pad)));
    }
    let batch = texts.len();
    let input_ids = Tensor::from_vec(flat_ids, (batch, seq_len), device)?;
    let attention_mask = Tensor::from_vec(flat_mask, (batch, seq_len), device)?;
    Ok((input_ids, attention_mask))
}
