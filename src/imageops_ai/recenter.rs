use image::{imageops, Rgba, RgbaImage};

use crate::imageops_ai::padding::padding;

/// Minimal rectangle around the visible pixels. `right` and `bottom` are
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    pub const fn width(&self) -> u32 {
        self.right - self.left
    }

    pub const fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Bounding box of every pixel whose alpha is above `threshold`, or `None`
/// for an image with nothing visible.
pub fn bounding_box(image: &RgbaImage, threshold: u8) -> Option<BoundingBox> {
    let (width, height) = image.dimensions();
    let mut bounds = [width, height, 0, 0]; // [x1, y1, x2, y2]
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] > threshold {
            update_bounds(&mut bounds, x, y);
            found = true;
        }
    }

    found.then(|| BoundingBox {
        left: bounds[0],
        top: bounds[1],
        right: bounds[2] + 1,
        bottom: bounds[3] + 1,
    })
}

/// Moves the visible content of `image` to the middle of a transparent canvas
/// of the same size.
///
/// A fully transparent image is returned as is.
pub fn recenter(image: RgbaImage, threshold: u8) -> RgbaImage {
    let Some(bbox) = bounding_box(&image, threshold) else {
        return image;
    };

    let (width, height) = image.dimensions();
    let cropped =
        imageops::crop_imm(&image, bbox.left, bbox.top, bbox.width(), bbox.height()).to_image();

    // the crop is never larger than the canvas it came from
    padding(&cropped, width, height, Rgba([0, 0, 0, 0])).unwrap_or(image)
}

fn update_bounds(bounds: &mut [u32; 4], x: u32, y: u32) {
    bounds[0] = bounds[0].min(x);
    bounds[1] = bounds[1].min(y);
    bounds[2] = bounds[2].max(x);
    bounds[3] = bounds[3].max(y);
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn with_block(width: u32, height: u32, x: u32, y: u32, w: u32, h: u32) -> RgbaImage {
        let mut image = RgbaImage::from_pixel(width, height, CLEAR);
        for py in y..y + h {
            for px in x..x + w {
                image.put_pixel(px, py, RED);
            }
        }
        image
    }

    #[test]
    fn test_bounding_box() {
        let image = with_block(10, 8, 1, 2, 3, 4);
        let bbox = bounding_box(&image, 0).unwrap();

        assert_eq!(
            bbox,
            BoundingBox {
                left: 1,
                top: 2,
                right: 4,
                bottom: 6
            }
        );
        assert_eq!((bbox.width(), bbox.height()), (3, 4));
    }

    #[test]
    fn test_bounding_box_single_pixel() {
        let image = with_block(5, 5, 4, 4, 1, 1);
        let bbox = bounding_box(&image, 0).unwrap();
        assert_eq!((bbox.left, bbox.top, bbox.right, bbox.bottom), (4, 4, 5, 5));
    }

    #[test]
    fn test_bounding_box_threshold() {
        let mut image = with_block(6, 6, 3, 3, 2, 2);
        image.put_pixel(0, 0, Rgba([255, 255, 255, 4]));

        assert_eq!(bounding_box(&image, 0).unwrap().left, 0);
        assert_eq!(bounding_box(&image, 4).unwrap().left, 3);
    }

    #[test]
    fn test_bounding_box_ignores_color_of_transparent_pixels() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 0]));
        assert_eq!(bounding_box(&image, 0), None);
    }

    #[test]
    fn test_recenter_moves_block_to_center() {
        let image = with_block(10, 8, 0, 0, 4, 2);
        let centered = recenter(image, 0);

        assert_eq!(centered.dimensions(), (10, 8));
        let bbox = bounding_box(&centered, 0).unwrap();
        assert_eq!((bbox.left, bbox.top), ((10 - 4) / 2, (8 - 2) / 2));
        assert_eq!((bbox.width(), bbox.height()), (4, 2));
    }

    #[test]
    fn test_recenter_odd_difference_pads_bottom_right() {
        let image = with_block(10, 9, 6, 5, 3, 2);
        let centered = recenter(image, 0);

        let bbox = bounding_box(&centered, 0).unwrap();
        assert_eq!((bbox.left, bbox.top), (3, 3));
        assert_eq!((bbox.right, bbox.bottom), (6, 5));
        assert_eq!(10 - bbox.right, bbox.left + 1);
        assert_eq!(9 - bbox.bottom, bbox.top + 1);
    }

    #[test]
    fn test_recenter_fully_transparent_is_unchanged() {
        let mut image = RgbaImage::from_pixel(7, 5, CLEAR);
        image.put_pixel(2, 2, Rgba([9, 9, 9, 0]));
        let centered = recenter(image.clone(), 0);

        assert_eq!(centered, image);
    }

    #[test]
    fn test_recenter_already_centered_is_idempotent() {
        let image = with_block(9, 9, 3, 3, 3, 3);
        let centered = recenter(image.clone(), 0);

        assert_eq!(centered, image);
        assert_eq!(recenter(centered.clone(), 0), centered);
    }

    #[test]
    fn test_recenter_clears_pixels_below_threshold() {
        let mut image = with_block(8, 8, 0, 0, 2, 2);
        image.put_pixel(7, 7, Rgba([1, 2, 3, 3]));
        let centered = recenter(image, 3);

        assert_eq!(*centered.get_pixel(7, 7), CLEAR);
        assert_eq!(*centered.get_pixel(3, 3), RED);
        assert_eq!(*centered.get_pixel(4, 4), RED);
    }

    #[test]
    fn test_recenter_keeps_partial_alpha() {
        let mut image = RgbaImage::from_pixel(4, 4, CLEAR);
        image.put_pixel(0, 0, Rgba([10, 20, 30, 77]));
        let centered = recenter(image, 0);

        assert_eq!(*centered.get_pixel(1, 1), Rgba([10, 20, 30, 77]));
    }
}
