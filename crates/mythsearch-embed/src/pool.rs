use anyhow::{Result, bail};
use candle_core::{DType, Tensor};

/// Mean of the unmasked token states, L2-normalized. `hidden` is `[B,T,H]`,
/// `attention_mask` is `[B,T]`; the result is `[B,H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let dims = hidden.dims();
    if dims.len() != 3 { bail!("hidden shape must be [B,T,H], got {:?}", dims); }
    let batch = dims[0];
    let hidden_dim = dims[2];

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?;
    let mask_broadcast = mask_3d.broadcast_as(hidden.shape())?;
    let masked = (hidden * &mask_broadcast)?;
    let sum = masked.sum(1)?;
    let eps_val = match hidden.dtype() { DType::F16 => 1e-6f64, _ => 1e-12f64 };
    // Clamp so an all-padding row yields a zero vector instead of NaN.
    let lengths = mask.sum(1)?.unsqueeze(1)?.to_dtype(sum.dtype())?.maximum(1.0)?;
    let mean = sum.broadcast_div(&lengths)?;
    let norm = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + eps_val)?;
    let mean = mean.broadcast_div(&norm)?;
    if mean.dims() != [batch, hidden_dim] { bail!("pooled shape {:?} != [{batch}, {hidden_dim}]", mean.dims()); }
    Ok(mean)
}
