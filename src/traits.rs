use crate::errors::Result;
use image::DynamicImage;

/// 背景除去モデルの抽象化
///
/// バッチ処理は具象モデルではなくこのトレイトに依存するため、
/// テストでは ONNX モデルの代わりにスタブを差し込める
pub trait ImageSegmentationModel: Send + Sync {
    /// 背景を完全透過にした同サイズの RGBA 画像を返す
    fn segment_image(&self, img: &DynamicImage) -> Result<DynamicImage>;
}

impl<M: ImageSegmentationModel + ?Sized> ImageSegmentationModel for Box<M> {
    fn segment_image(&self, img: &DynamicImage) -> Result<DynamicImage> {
        (**self).segment_image(img)
    }
}
