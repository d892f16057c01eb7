use anyhow::{anyhow, ensure, Result};
use image::{GenericImageView, ImageBuffer, Luma, Pixel, Primitive, Rgba};
use num_traits::AsPrimitive;

use crate::imageops_ai::get_max_value;

/// Multiplies the alpha channel of `image` by `mask`.
///
/// Mask values are rescaled from the mask's channel range to `[0, 1]` and
/// clamped, so a float mask that overshoots still yields a valid alpha.
/// Pixels that are already transparent stay transparent whatever the mask
/// says. With `apply_edit` the colour channels are premultiplied as well.
pub fn apply<I, M, SI, SM>(
    image: &I,
    mask: &M,
    apply_edit: bool,
) -> Result<ImageBuffer<Rgba<SI>, Vec<SI>>>
where
    I: GenericImageView<Pixel = Rgba<SI>>,
    M: GenericImageView<Pixel = Luma<SM>>,
    Rgba<SI>: Pixel<Subpixel = SI>,
    SI: Primitive + AsPrimitive<f32> + 'static,
    SM: Primitive + AsPrimitive<f32> + 'static,
    f32: AsPrimitive<SI>,
{
    ensure!(
        image.dimensions() == mask.dimensions(),
        "Image and mask dimensions do not match: image {:?}, mask {:?}",
        image.dimensions(),
        mask.dimensions()
    );

    let sm_max: f32 = get_max_value::<SM>().as_();
    let si_max: f32 = get_max_value::<SI>().as_();

    let processed_pixels = image
        .pixels()
        .zip(mask.pixels())
        .flat_map(|((_, _, image_pixel), (_, _, mask_pixel))| {
            let Rgba([red, green, blue, source_alpha]) = image_pixel;
            let Luma([mask_alpha]) = mask_pixel;
            let alpha = (mask_alpha.as_() / sm_max).clamp(0.0, 1.0)
                * (source_alpha.as_() / si_max).clamp(0.0, 1.0);
            let alpha_scaled: SI = (alpha * si_max).round().as_();

            if apply_edit {
                let edit = |c: SI| -> SI { (c.as_() * alpha).round().as_() };
                [edit(red), edit(green), edit(blue), alpha_scaled]
            } else {
                [red, green, blue, alpha_scaled]
            }
        })
        .collect::<Vec<SI>>();

    ImageBuffer::from_raw(image.width(), image.height(), processed_pixels)
        .ok_or_else(|| anyhow!("Failed to create ImageBuffer from processed pixels"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, RgbaImage};

    fn float_mask(values: &[f32]) -> ImageBuffer<Luma<f32>, Vec<f32>> {
        ImageBuffer::from_raw(values.len() as u32, 1, values.to_vec()).unwrap()
    }

    #[test]
    fn test_apply_float_mask() {
        let image = RgbaImage::from_pixel(2, 1, Rgba([200, 100, 50, 255]));
        let mask = float_mask(&[0.0, 1.2]);

        let result = apply(&image, &mask, false).unwrap();
        assert_eq!(*result.get_pixel(0, 0), Rgba([200, 100, 50, 0]));
        assert_eq!(*result.get_pixel(1, 0), Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn test_apply_keeps_transparent_pixels_transparent() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        let mask = float_mask(&[1.0]);

        let result = apply(&image, &mask, false).unwrap();
        assert_eq!(*result.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_apply_multiplies_partial_alpha() {
        let image = RgbaImage::from_pixel(2, 1, Rgba([9, 9, 9, 102]));
        let mask = float_mask(&[1.0, 0.5]);

        let result = apply(&image, &mask, false).unwrap();
        assert_eq!(result.get_pixel(0, 0)[3], 102);
        assert_eq!(result.get_pixel(1, 0)[3], 51);
    }

    #[test]
    fn test_apply_edit_premultiplies() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 50, 255]));
        let mask = GrayImage::from_pixel(1, 1, Luma([51]));

        let result = apply(&image, &mask, true).unwrap();
        assert_eq!(*result.get_pixel(0, 0), Rgba([40, 20, 10, 51]));
    }

    #[test]
    fn test_apply_dimension_mismatch() {
        let image = RgbaImage::new(2, 2);
        let mask = GrayImage::new(3, 2);
        assert!(apply(&image, &mask, false).is_err());
    }
}
