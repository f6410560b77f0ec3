use image::{GrayImage, imageops};
use imageproc::contrast::otsu_level;
use tapper_types::Polarity;

use crate::Bitmap;

pub trait Preprocessor {
    /// Turn a capture into the black-on-white binary image the OCR engine reads best
    fn prepare(&self, image: &Bitmap) -> GrayImage;
}

/// Grayscale, optional inversion, then a global Otsu threshold
pub struct Binarizer {
    pub polarity: Polarity,
}

impl Binarizer {
    pub fn new(polarity: Polarity) -> Self {
        Self { polarity }
    }
}

impl Preprocessor for Binarizer {
    fn prepare(&self, image: &Bitmap) -> GrayImage {
        let mut gray = imageops::grayscale(image);

        if self.polarity == Polarity::LightOnDark {
            imageops::invert(&mut gray);
        }

        let level = otsu_level(&gray);
        tracing::debug!("Otsu level {level} for {}x{}", gray.width(), gray.height());

        for pixel in gray.pixels_mut() {
            pixel.0[0] = if pixel.0[0] > level { 255 } else { 0 };
        }
        gray
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    /// Left half `left`, right half `right`
    fn split_image(left: u8, right: u8) -> Bitmap {
        Bitmap::from_fn(20, 10, |x, _| {
            let v = if x < 10 { left } else { right };
            Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn test_light_text_on_dark_becomes_black_on_white() {
        let image = split_image(40, 200);
        let out = Binarizer::new(Polarity::LightOnDark).prepare(&image);

        assert_eq!(out.dimensions(), (20, 10));
        assert_eq!(out.get_pixel(0, 0).0[0], 255);
        assert_eq!(out.get_pixel(19, 9).0[0], 0);
    }

    #[test]
    fn test_dark_text_on_light_is_not_inverted() {
        let image = split_image(40, 200);
        let out = Binarizer::new(Polarity::DarkOnLight).prepare(&image);

        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(19, 9).0[0], 255);
    }

    #[test]
    fn test_output_is_binary() {
        let image = Bitmap::from_fn(16, 16, |x, y| {
            let v = ((x * 16 + y) % 256) as u8;
            Rgba([v, v / 2, 255 - v, 255])
        });
        let out = Binarizer::new(Polarity::LightOnDark).prepare(&image);
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }
}
