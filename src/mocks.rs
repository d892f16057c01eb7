use crate::errors::{RecenterError, Result};
use crate::traits::ImageSegmentationModel;
use image::{DynamicImage, GenericImageView, Rgba};

/// テスト用のモックセグメンテーションモデル
///
/// 入力を RGBA に変換して返す。`background` を指定すると、その色の画素を
/// 背景とみなして完全透過にする。
#[derive(Debug, Clone, Default)]
pub struct MockSegmentationModel {
    pub background: Option<Rgba<u8>>,
}

impl MockSegmentationModel {
    pub const fn new() -> Self {
        Self { background: None }
    }

    pub const fn with_background(mut self, background: Rgba<u8>) -> Self {
        self.background = Some(background);
        self
    }
}

impl ImageSegmentationModel for MockSegmentationModel {
    fn segment_image(&self, img: &DynamicImage) -> Result<DynamicImage> {
        let mut rgba = img.to_rgba8();
        if let Some(background) = self.background {
            for pixel in rgba.pixels_mut().filter(|p| **p == background) {
                *pixel = Rgba([0, 0, 0, 0]);
            }
        }
        Ok(DynamicImage::ImageRgba8(rgba))
    }
}

/// 常に失敗するモデル（エラー処理のテスト用）
#[derive(Debug, Clone, Default)]
pub struct FailingSegmentationModel;

impl ImageSegmentationModel for FailingSegmentationModel {
    fn segment_image(&self, img: &DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        Err(RecenterError::Model {
            operation: "モック推論".to_string(),
            source: format!("{}x{} の画像を処理できません", width, height).into(),
        })
    }
}

/// テスト用のファクトリー関数
pub const fn create_mock_model() -> MockSegmentationModel {
    MockSegmentationModel::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_mock_model_creation() {
        let mock = create_mock_model();
        assert_eq!(mock.background, None);
    }

    #[test]
    fn test_mock_model_segment_image() -> Result<()> {
        let mock = create_mock_model();
        let test_image = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([255, 0, 0])));

        let result = mock.segment_image(&test_image)?;
        assert_eq!(result.dimensions(), test_image.dimensions());
        assert_eq!(result.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        Ok(())
    }

    #[test]
    fn test_mock_model_clears_background() -> Result<()> {
        let mock = create_mock_model().with_background(Rgba([255, 255, 255, 255]));
        let mut test_image = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        test_image.put_pixel(1, 2, Rgb([0, 0, 255]));

        let result = mock.segment_image(&DynamicImage::ImageRgb8(test_image))?;
        assert_eq!(result.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(result.get_pixel(1, 2), Rgba([0, 0, 255, 255]));
        Ok(())
    }

    #[test]
    fn test_failing_model() {
        let image = DynamicImage::new_rgba8(3, 2);
        let err = FailingSegmentationModel.segment_image(&image).unwrap_err();
        assert!(matches!(err, RecenterError::Model { .. }));
    }
}
