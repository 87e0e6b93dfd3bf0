// ============================================================
// Layer 5 — UNet
// ============================================================
// Encoder-decoder segmentation network with skip connections.
// Every 3×3 convolution is unpadded, so each DoubleConvBlock
// trims 4 pixels from both spatial dimensions. Skip tensors are
// bilinearly resized to the decoder's size before concatenation,
// and the logits are resized back to the input size at the end.
//
//   x ─ input ─ enc1 ─ enc2 ─ enc3 ─ center
//        │       │      │      │       │
//        │       │      │      └──── dec3
//        │       │      └─────────── dec2
//        │       └────────────────── dec1
//        └───────────────────────── final ─ output ─ resize → [B, K, H, W]
//
// With base_channels = c the widths are
//   c, 2c, 4c, 8c, (16c bottleneck), 8c, 4c, 2c, c → num_classes
//
// Reference: Ronneberger et al. (2015) U-Net
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::{activation::relu, TensorData},
};

use crate::ml::criterion::PixelCrossEntropy;

/// Pixels a DoubleConvBlock removes from each spatial dimension
const DOUBLE_CONV_SHRINK: usize = 4;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct UNetConfig {
    pub in_channels: usize,
    pub num_classes: usize,
    #[config(default = 64)]
    pub base_channels: usize,
    /// Dropout after each encoder's convolutions; 0 disables the layer
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl UNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UNet<B> {
        let c = self.base_channels;
        UNet {
            input:  self.encoder(self.in_channels, c, device),
            enc1:   self.encoder(c, 2 * c, device),
            enc2:   self.encoder(2 * c, 4 * c, device),
            enc3:   self.encoder(4 * c, 8 * c, device),
            center: DecoderBlock::new(8 * c, 16 * c, 8 * c, device),
            dec3:   DecoderBlock::new(16 * c, 8 * c, 4 * c, device),
            dec2:   DecoderBlock::new(8 * c, 4 * c, 2 * c, device),
            dec1:   DecoderBlock::new(4 * c, 2 * c, c, device),
            final_block: DoubleConvBlock::new(2 * c, c, device),
            output: Conv2dConfig::new([c, self.num_classes], [1, 1]).init(device),
        }
    }

    fn encoder<B: Backend>(&self, in_ch: usize, out_ch: usize, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock::new(in_ch, out_ch, self.dropout, device)
    }

    /// Spatial size of the logits before the final resize, or None if
    /// a square input of side `size` shrinks to nothing on the way.
    pub fn output_spatial(&self, size: usize) -> Option<usize> {
        let conv = |s: usize| s.checked_sub(DOUBLE_CONV_SHRINK).filter(|&s| s > 0);
        let enc  = |s: usize| conv(s).map(|s| s / 2).filter(|&s| s > 0);
        let dec  = |s: usize| conv(s).map(|s| s * 2);

        let mut s = size;
        for _ in 0..4 {
            s = enc(s)?;
        }
        // center + dec3 + dec2 + dec1
        for _ in 0..4 {
            s = dec(s)?;
        }
        conv(s)
    }

    /// Smallest square input the network accepts.
    pub fn min_input_size(&self) -> usize {
        let mut size = 1;
        while self.output_spatial(size).is_none() {
            size += 1;
        }
        size
    }
}

// ─── Building blocks ──────────────────────────────────────────────────────────

/// Two unpadded 3×3 convolutions, each followed by a ReLU.
#[derive(Module, Debug)]
pub struct DoubleConvBlock<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
}

impl<B: Backend> DoubleConvBlock<B> {
    pub fn new(in_ch: usize, out_ch: usize, device: &B::Device) -> Self {
        let conv = |i, o| {
            Conv2dConfig::new([i, o], [3, 3])
                .with_padding(PaddingConfig2d::Valid)
                .init(device)
        };
        Self { conv1: conv(in_ch, out_ch), conv2: conv(out_ch, out_ch) }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.conv1.forward(x));
        relu(self.conv2.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub double_conv: DoubleConvBlock<B>,
    pub dropout:     Option<Dropout>,
    pub pool:        MaxPool2d,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn new(in_ch: usize, out_ch: usize, drop_p: f64, device: &B::Device) -> Self {
        Self {
            double_conv: DoubleConvBlock::new(in_ch, out_ch, device),
            dropout:     (drop_p > 0.0).then(|| DropoutConfig::new(drop_p).init()),
            pool:        MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.double_conv.forward(x);
        if let Some(dropout) = &self.dropout {
            x = dropout.forward(x);
        }
        self.pool.forward(x)
    }
}

/// DoubleConv followed by a 2×2 stride-2 transposed convolution.
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub double_conv: DoubleConvBlock<B>,
    pub up:          ConvTranspose2d<B>,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn new(in_ch: usize, mid_ch: usize, out_ch: usize, device: &B::Device) -> Self {
        Self {
            double_conv: DoubleConvBlock::new(in_ch, mid_ch, device),
            up: ConvTranspose2dConfig::new([mid_ch, out_ch], [2, 2])
                .with_stride([2, 2])
                .init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.up.forward(self.double_conv.forward(x))
    }
}

// ─── UNet ─────────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    pub input:       EncoderBlock<B>,
    pub enc1:        EncoderBlock<B>,
    pub enc2:        EncoderBlock<B>,
    pub enc3:        EncoderBlock<B>,
    pub center:      DecoderBlock<B>,
    pub dec3:        DecoderBlock<B>,
    pub dec2:        DecoderBlock<B>,
    pub dec1:        DecoderBlock<B>,
    pub final_block: DoubleConvBlock<B>,
    pub output:      Conv2d<B>,
}

impl<B: Backend> UNet<B> {
    /// x: [batch, in_channels, H, W] → logits: [batch, num_classes, H, W]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = x.dims();

        let inp    = self.input.forward(x);
        let enc1   = self.enc1.forward(inp.clone());
        let enc2   = self.enc2.forward(enc1.clone());
        let enc3   = self.enc3.forward(enc2.clone());
        let center = self.center.forward(enc3.clone());

        let dec3 = self.dec3.forward(concat_skip(center, enc3));
        let dec2 = self.dec2.forward(concat_skip(dec3, enc2));
        let dec1 = self.dec1.forward(concat_skip(dec2, enc1));
        let fin  = self.final_block.forward(concat_skip(dec1, inp));

        let out = self.output.forward(fin);
        resize_bilinear(out, [height, width])
    }

    /// Forward pass plus the criterion's loss against `masks` [batch, H, W].
    pub fn forward_loss(
        &self,
        images:    Tensor<B, 4>,
        masks:     Tensor<B, 3, Int>,
        criterion: &PixelCrossEntropy<B>,
    ) -> (Tensor<B, 1>, Tensor<B, 4>) {
        let logits = self.forward(images);
        (criterion.forward(logits.clone(), masks), logits)
    }
}

/// Resize `skip` to the spatial size of `x` and stack it after `x` on the
/// channel axis.
fn concat_skip<B: Backend>(x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, h, w] = x.dims();
    let skip = resize_bilinear(skip, [h, w]);
    Tensor::cat(vec![x, skip], 1)
}

/// Bilinear resize of the two spatial dims (`align_corners = false`).
/// Applied as two matmuls against fixed interpolation matrices, which
/// keeps it differentiable on backends without an interpolate backward.
fn resize_bilinear<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [batch, channels, h, w] = x.dims();
    let [out_h, out_w] = size;
    if [h, w] == size {
        return x;
    }
    let device = x.device();
    let planes = batch * channels;

    // width: [N·C·H, W] × [W, out_w]
    let x = x
        .reshape([planes * h, w])
        .matmul(interpolation_matrix::<B>(w, out_w, &device));

    // height: [N·C·out_w, H] × [H, out_h]
    let x = x
        .reshape([planes, h, out_w])
        .swap_dims(1, 2)
        .reshape([planes * out_w, h])
        .matmul(interpolation_matrix::<B>(h, out_h, &device));

    x.reshape([planes, out_w, out_h])
        .swap_dims(1, 2)
        .reshape([batch, channels, out_h, out_w])
}

/// `[input, output]` weights; column `o` blends the two input samples
/// around the half-pixel-centred source coordinate of output `o`.
fn interpolation_matrix<B: Backend>(input: usize, output: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut weights = vec![0.0f32; input * output];
    let scale = input as f32 / output as f32;

    for o in 0..output {
        let src  = ((o as f32 + 0.5) * scale - 0.5).max(0.0);
        let i0   = (src.floor() as usize).min(input - 1);
        let i1   = (i0 + 1).min(input - 1);
        let frac = src - i0 as f32;
        weights[i0 * output + o] += 1.0 - frac;
        weights[i1 * output + o] += frac;
    }

    Tensor::from_data(TensorData::new(weights, [input, output]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> UNetConfig {
        UNetConfig::new(3, 4).with_base_channels(2)
    }

    #[test]
    fn test_output_spatial_chain() {
        let cfg = tiny_config();
        assert_eq!(cfg.output_spatial(188), Some(4));
        assert_eq!(cfg.output_spatial(187), None);
        assert_eq!(cfg.output_spatial(16), None);
        assert_eq!(cfg.min_input_size(), 188);
    }

    #[test]
    fn test_forward_keeps_input_size() {
        let device = Default::default();
        let model: UNet<TestBackend> = tiny_config().init(&device);

        let x = Tensor::<TestBackend, 4>::zeros([1, 3, 188, 188], &device);
        let out = model.forward(x);

        assert_eq!(out.dims(), [1, 4, 188, 188]);
    }

    #[test]
    fn test_forward_non_square_input() {
        let device = Default::default();
        let model: UNet<TestBackend> = tiny_config().init(&device);

        let x = Tensor::<TestBackend, 4>::ones([2, 3, 188, 196], &device);
        assert_eq!(model.forward(x).dims(), [2, 4, 188, 196]);
    }

    #[test]
    fn test_dropout_layer_only_when_enabled() {
        let device = Default::default();
        let plain: UNet<TestBackend> = tiny_config().init(&device);
        assert!(plain.input.dropout.is_none());

        let dropped: UNet<TestBackend> = tiny_config().with_dropout(0.2).init(&device);
        assert!(dropped.enc3.dropout.is_some());
    }

    #[test]
    fn test_layer_widths_follow_base_channels() {
        let device = Default::default();
        let model: UNet<TestBackend> = UNetConfig::new(3, 2).with_base_channels(4).init(&device);
        // c in the first block, 16c in the bottleneck, 2c into the final block
        assert_eq!(model.input.double_conv.conv1.weight.dims(), [4, 3, 3, 3]);
        assert_eq!(model.center.double_conv.conv1.weight.dims(), [64, 32, 3, 3]);
        assert_eq!(model.final_block.conv1.weight.dims(), [4, 8, 3, 3]);
        assert_eq!(model.output.weight.dims(), [2, 4, 1, 1]);
    }

    #[test]
    fn test_bilinear_matches_half_pixel_sampling() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::from_floats([[[[0.0, 1.0]]]], &device);
        let up: Vec<f32> = resize_bilinear(x, [1, 4]).into_data().to_vec().unwrap();
        let expected = [0.0, 0.25, 0.75, 1.0];
        for (got, want) in up.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{up:?}");
        }

        let x = Tensor::<TestBackend, 4>::from_floats([[[[0.0], [1.0], [2.0], [3.0]]]], &device);
        let down: Vec<f32> = resize_bilinear(x, [2, 1]).into_data().to_vec().unwrap();
        assert!((down[0] - 0.5).abs() < 1e-6 && (down[1] - 2.5).abs() < 1e-6, "{down:?}");
    }

    #[test]
    fn test_resize_keeps_planes_apart() {
        let device = Default::default();
        // two channels with different constants must not bleed into each other
        let a = Tensor::<TestBackend, 4>::ones([1, 1, 3, 5], &device);
        let x = Tensor::cat(vec![a.clone(), a.mul_scalar(7.0)], 1);
        let out: Vec<f32> = resize_bilinear(x, [6, 4]).into_data().to_vec().unwrap();
        assert!(out[..24].iter().all(|v| (v - 1.0).abs() < 1e-5));
        assert!(out[24..].iter().all(|v| (v - 7.0).abs() < 1e-5));
    }

    #[test]
    fn test_loss_backward_reaches_first_layer() {
        use crate::ml::criterion::CriterionConfig;
        use burn::backend::Autodiff;
        type AdBackend = Autodiff<NdArray>;

        let device = Default::default();
        let model: UNet<AdBackend> = UNetConfig::new(1, 2).with_base_channels(1).init(&device);
        let criterion = CriterionConfig::default().init::<AdBackend>(&device);

        let images = Tensor::<AdBackend, 4>::ones([1, 1, 188, 188], &device);
        let masks  = Tensor::<AdBackend, 3, Int>::zeros([1, 188, 188], &device);
        let (loss, _) = model.forward_loss(images, masks, &criterion);

        let grads = loss.backward();
        assert!(model.input.double_conv.conv1.weight.grad(&grads).is_some());
    }

    #[test]
    fn test_default_base_channels() {
        let cfg = UNetConfig::new(3, 2);
        assert_eq!(cfg.base_channels, 64);
        assert_eq!(cfg.dropout, 0.0);
    }
}
