//! Image content-block specs and the built-in RAW reader.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Grey8,
    Rgb8,
    Rgba8,
    Yuv420,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Grey8 => 1,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            // Reported for the luma plane; chroma planes are half-resolution.
            PixelFormat::Yuv420 => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub pixel_format: PixelFormat,
}

impl ImageSpec {
    pub fn expected_raw_size(&self) -> usize {
        self.stride as usize * self.height as usize
    }
}

/// A RAW image content block: spec plus a borrowed view into the record's
/// payload bytes. No decode step, since RAW pixels need none.
pub struct ImageRawView<'a> {
    pub spec: ImageSpec,
    pub data: &'a [u8],
}

impl<'a> ImageRawView<'a> {
    pub fn new(spec: ImageSpec, data: &'a [u8]) -> Option<Self> {
        if data.len() < spec.expected_raw_size() {
            return None;
        }
        Some(ImageRawView { spec, data })
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.spec.stride as usize;
        let width_bytes = self.spec.width as usize * self.spec.pixel_format.bytes_per_pixel();
        &self.data[start..start + width_bytes]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_view_rejects_undersized_buffers() {
        let spec = ImageSpec { width: 4, height: 4, stride: 4, pixel_format: PixelFormat::Grey8 };
        assert!(ImageRawView::new(spec, &[0u8; 4]).is_none());
    }

    #[test]
    fn raw_view_slices_rows_by_stride() {
        let spec = ImageSpec { width: 2, height: 2, stride: 3, pixel_format: PixelFormat::Grey8 };
        let data = [1, 2, 9, 3, 4, 9];
        let view = ImageRawView::new(spec, &data).unwrap();
        assert_eq!(view.row(0), &[1, 2]);
        assert_eq!(view.row(1), &[3, 4]);
    }
}
