use std::{fmt::Display, path::Path};

use crate::{
    errors::{RecenterError, Result},
    imageops_ai::{
        mask,
        padding::{center_offset, padding},
    },
    traits::ImageSegmentationModel,
};
use image::{imageops, imageops::FilterType, DynamicImage, ImageBuffer, Luma, Rgb, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};
use parking_lot::Mutex;

/// u2net 系モデルの入力解像度（入力形状が動的な場合に使用）
pub const DEFAULT_IMAGE_SIZE: u32 = 320;

/// ImageNet の平均・標準偏差（u2net 系モデルの学習時正規化）
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

pub type Mask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// ONNX Runtime で動く背景除去モデル
pub struct Model {
    pub image_size: u32,
    input_name: String,
    output_name: String,
    session: Mutex<Session>,
}

fn model_error<E: Display>(operation: impl Into<String>) -> impl FnOnce(E) -> RecenterError {
    let operation = operation.into();
    move |e| RecenterError::Model {
        operation,
        source: e.to_string().into(),
    }
}

impl Model {
    pub fn new(model_path: &Path, device_id: i32) -> Result<Self> {
        let mut session = SessionBuilder::new()
            .map_err(model_error("セッションビルダー初期化"))?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(model_error("実行プロバイダー設定"))?
            .with_memory_pattern(true)
            .map_err(model_error("メモリパターン設定"))?
            .commit_from_file(model_path)
            .map_err(model_error(format!(
                "モデルファイル読み込み: {}",
                model_path.display()
            )))?;

        let input = session.inputs.first().ok_or_else(|| RecenterError::Model {
            operation: "モデル入力取得".to_string(),
            source: "モデルに入力がありません".into(),
        })?;
        let output = session.outputs.first().ok_or_else(|| RecenterError::Model {
            operation: "モデル出力取得".to_string(),
            source: "モデルに出力がありません".into(),
        })?;
        let input_name = input.name.clone();
        let output_name = output.name.clone();

        // NCHW; 動的な次元は負の値で表される
        let image_size = input
            .input_type
            .tensor_shape()
            .and_then(|shape| shape.get(2).copied())
            .filter(|&size| size > 0)
            .map_or(DEFAULT_IMAGE_SIZE, |size| size as u32);

        // initialize model
        let data = Array4::<f32>::zeros((1, 3, image_size as usize, image_size as usize));
        session
            .run(ort::inputs![input_name.as_str() => TensorRef::from_array_view(&data)
                .map_err(model_error("初期化テンソル作成"))?])
            .map_err(model_error("モデル初期化実行"))?;

        tracing::debug!(
            image_size,
            input = %input_name,
            output = %output_name,
            "loaded segmentation model {}",
            model_path.display()
        );

        Ok(Self {
            image_size,
            input_name,
            output_name,
            session: Mutex::new(session),
        })
    }

    /// Runs the network and returns the first mask plane of the first output.
    pub fn predict(&self, tensor: ArrayView4<f32>) -> Result<Array2<f32>> {
        let mut binding = self.session.lock();
        let tensor = tensor.as_standard_layout();
        let outputs = binding
            .run(ort::inputs![self.input_name.as_str() => TensorRef::from_array_view(&tensor)
                .map_err(model_error("入力テンソル作成"))?])
            .map_err(model_error("推論実行"))?;
        let output = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(model_error("出力テンソル取得"))?;

        let (height, width) = match output.shape() {
            [.., height, width] => (*height, *width),
            shape => {
                return Err(RecenterError::Model {
                    operation: "出力テンソル形状確認".to_string(),
                    source: format!("2次元以上の出力を想定しましたが {:?} でした", shape).into(),
                })
            }
        };
        let plane = output.iter().take(height * width).copied().collect();
        Ok(Array2::from_shape_vec((height, width), plane)?)
    }
}

impl ImageSegmentationModel for Model {
    fn segment_image(&self, img: &DynamicImage) -> Result<DynamicImage> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();
        let (tensor, crop) = preprocess(&rgb_img, self.image_size)?;
        let mask = self.predict(tensor.view())?;
        let mask = postprocess_mask(mask.view(), self.image_size, crop, width, height)?;

        apply_mask_to_image(img, &mask)
    }
}

/// 既存の透過を保ったままマスクを前景のアルファとして適用
pub fn apply_mask_to_image(img: &DynamicImage, mask: &Mask) -> Result<DynamicImage> {
    let rgba_img = img.to_rgba8();
    let result = mask::apply(&rgba_img, mask, false).map_err(|e| RecenterError::Model {
        operation: "マスク適用".to_string(),
        source: e.into(),
    })?;
    Ok(DynamicImage::ImageRgba8(result))
}

/// Letterboxes `image` into an `image_size` square and normalises it into an
/// NCHW tensor. Also returns the `[x, y, w, h]` rectangle the picture
/// occupies inside the square.
pub fn preprocess(image: &RgbImage, image_size: u32) -> Result<(Array4<f32>, [u32; 4])> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(RecenterError::Validation {
            field: "image".to_string(),
            reason: format!("has empty dimensions {}x{}", width, height),
        });
    }

    let scale = image_size as f32 / width.max(height) as f32;
    let w = ((width as f32 * scale).round() as u32).clamp(1, image_size);
    let h = ((height as f32 * scale).round() as u32).clamp(1, image_size);
    let resized = imageops::resize(image, w, h, FilterType::Lanczos3);

    let letterbox_error = || RecenterError::Validation {
        field: "image".to_string(),
        reason: format!("{}x{} does not fit into {}", w, h, image_size),
    };
    let (x, y) = center_offset(w, h, image_size, image_size).ok_or_else(letterbox_error)?;
    let padded =
        padding(&resized, image_size, image_size, Rgb([0, 0, 0])).ok_or_else(letterbox_error)?;

    let mut tensor = padded
        .as_ndarray3()
        .mapv(|v| f32::from(v) / 255.0)
        .insert_axis(Axis(0));
    for (channel, (mean, std)) in MEAN.iter().zip(STD.iter()).enumerate() {
        tensor
            .slice_mut(s![0, channel, .., ..])
            .mapv_inplace(|v| (v - mean) / std);
    }

    Ok((tensor, [x as u32, y as u32, w, h]))
}

/// Min-max normalises the raw mask, cuts the letterbox away and scales it back
/// to `width`x`height`.
pub fn postprocess_mask(
    mask: ArrayView2<f32>,
    image_size: u32,
    crop: [u32; 4],
    width: u32,
    height: u32,
) -> Result<Mask> {
    let (rows, cols) = mask.dim();
    if rows == 0 || cols == 0 {
        return Err(RecenterError::Model {
            operation: "マスク画像変換".to_string(),
            source: "モデルが空のマスクを返しました".into(),
        });
    }

    let (min, max) = mask
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    let normalized = mask
        .iter()
        .map(|&v| {
            if range > f32::EPSILON {
                (v - min) / range
            } else {
                v.clamp(0.0, 1.0)
            }
        })
        .collect();

    let mask = Mask::from_raw(cols as u32, rows as u32, normalized).ok_or_else(|| {
        RecenterError::Model {
            operation: "マスク画像変換".to_string(),
            source: format!("{}x{} のマスクを作成できません", cols, rows).into(),
        }
    })?;

    // the model may emit a mask at a different resolution than its input
    let scale_x = cols as f32 / image_size as f32;
    let scale_y = rows as f32 / image_size as f32;
    let [x, y, w, h] = crop;
    let x = ((x as f32 * scale_x).round() as u32).min(cols.saturating_sub(1) as u32);
    let y = ((y as f32 * scale_y).round() as u32).min(rows.saturating_sub(1) as u32);
    let w = ((w as f32 * scale_x).round() as u32).clamp(1, cols as u32 - x);
    let h = ((h as f32 * scale_y).round() as u32).clamp(1, rows as u32 - y);

    let mask = imageops::crop_imm(&mask, x, y, w, h).to_image();
    Ok(imageops::resize(&mask, width, height, FilterType::Lanczos3))
}
