use crate::error::{Error, Result};
use crate::frame_source::frame::{Frame, CHANNELS};
use image::{imageops, DynamicImage};

/// How a source image of any aspect ratio becomes the square input frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizePolicy {
    /// Largest centered square, then resized.
    #[default]
    CenterCrop,
    /// Scaled to fit and padded with black.
    Letterbox,
    /// Resized without preserving aspect ratio.
    Stretch,
}

impl ResizePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "crop" | "center-crop" | "centercrop" => Some(Self::CenterCrop),
            "letterbox" | "pad" => Some(Self::Letterbox),
            "stretch" => Some(Self::Stretch),
            _ => None,
        }
    }
}

pub fn resize_image(image: &DynamicImage, size: u32, policy: ResizePolicy) -> DynamicImage {
    if image.width() == image.height() {
        return image.resize_exact(size, size, imageops::FilterType::Triangle);
    }

    match policy {
        ResizePolicy::Stretch => image.resize_exact(size, size, imageops::FilterType::Triangle),
        ResizePolicy::CenterCrop => {
            let side = image.width().min(image.height());
            let x = (image.width() - side) / 2;
            let y = (image.height() - side) / 2;
            image
                .crop_imm(x, y, side, side)
                .resize_exact(size, size, imageops::FilterType::Triangle)
        }
        ResizePolicy::Letterbox => {
            let (w, h) = (image.width() as f32, image.height() as f32);
            let scale = (size as f32 / w).min(size as f32 / h);
            let new_w = ((w * scale) as u32).clamp(1, size);
            let new_h = ((h * scale) as u32).clamp(1, size);

            let scaled = image
                .resize_exact(new_w, new_h, imageops::FilterType::Triangle)
                .to_rgb8();
            let mut padded = DynamicImage::new_rgb8(size, size).to_rgb8();
            let x_offset = (size - new_w) / 2;
            let y_offset = (size - new_h) / 2;
            imageops::overlay(&mut padded, &scaled, x_offset as i64, y_offset as i64);

            DynamicImage::from(padded)
        }
    }
}

pub fn normalize_channel(value: u8) -> f32 {
    value as f32 / 127.5 - 1.0
}

pub fn frame_from_image(image: &DynamicImage, size: u32, policy: ResizePolicy) -> Result<Frame> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::capture("image has no pixels"));
    }

    let rgb = resize_image(image, size, policy).to_rgb8();
    let mut data = Vec::with_capacity((size * size) as usize * CHANNELS);
    for pixel in rgb.pixels() {
        data.extend(pixel.0.iter().map(|&c| normalize_channel(c)));
    }

    Frame::new(size as usize, size as usize, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb(rgb)))
    }

    fn assert_rgb_close(actual: [f32; 3], expected: [f32; 3]) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 0.02, "{:?} != {:?}", actual, expected);
        }
    }

    fn split_red_blue(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_square_image_is_resized_and_normalized() {
        let frame = frame_from_image(&solid(100, 100, [255, 0, 0]), 32, ResizePolicy::CenterCrop)
            .unwrap();

        assert_eq!(frame.shape(), [32, 32, 3]);
        assert_rgb_close(frame.pixel(0, 0).unwrap(), [1.0, -1.0, -1.0]);
        assert_rgb_close(frame.pixel(31, 31).unwrap(), [1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_normalization_range() {
        assert_eq!(normalize_channel(0), -1.0);
        assert_eq!(normalize_channel(255), 1.0);
        let frame = frame_from_image(&solid(10, 10, [128, 128, 128]), 8, ResizePolicy::Stretch)
            .unwrap();
        let expected = 128.0 / 127.5 - 1.0;
        assert!((frame.pixel(4, 4).unwrap()[0] - expected).abs() < 0.01);
    }

    #[test]
    fn test_letterbox_pads_with_black() {
        let frame =
            frame_from_image(&solid(200, 100, [255, 0, 0]), 64, ResizePolicy::Letterbox).unwrap();

        assert_rgb_close(frame.pixel(32, 32).unwrap(), [1.0, -1.0, -1.0]);
        assert_rgb_close(frame.pixel(0, 0).unwrap(), [-1.0, -1.0, -1.0]);
        assert_rgb_close(frame.pixel(63, 0).unwrap(), [-1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_center_crop_keeps_middle_square() {
        // crop covers x in 50..150 of a 200 wide image: left part red, right part blue
        let frame =
            frame_from_image(&split_red_blue(200, 100), 50, ResizePolicy::CenterCrop).unwrap();

        assert_rgb_close(frame.pixel(25, 0).unwrap(), [1.0, -1.0, -1.0]);
        assert_rgb_close(frame.pixel(25, 49).unwrap(), [-1.0, -1.0, 1.0]);
        // no black padding on the top row
        assert!(frame.pixel(0, 0).unwrap()[0] > 0.9);
    }

    #[test]
    fn test_stretch_fills_whole_frame() {
        let frame =
            frame_from_image(&solid(300, 30, [0, 255, 0]), 16, ResizePolicy::Stretch).unwrap();
        assert_rgb_close(frame.pixel(0, 0).unwrap(), [-1.0, 1.0, -1.0]);
        assert_rgb_close(frame.pixel(15, 15).unwrap(), [-1.0, 1.0, -1.0]);
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!(ResizePolicy::parse("crop"), Some(ResizePolicy::CenterCrop));
        assert_eq!(ResizePolicy::parse("Letterbox"), Some(ResizePolicy::Letterbox));
        assert_eq!(ResizePolicy::parse("stretch"), Some(ResizePolicy::Stretch));
        assert_eq!(ResizePolicy::parse("squash"), None);
    }
}
