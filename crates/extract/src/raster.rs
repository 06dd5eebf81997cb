use image::ImageFormat;

/// Sniff the MIME type of an image from its leading bytes.
///
/// Only formats the vision model accepts are recognised; anything else
/// (including a file whose extension lies about its content) yields `None`.
pub(crate) fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0";

    #[test]
    fn recognises_png_and_jpeg() {
        assert_eq!(sniff_mime(PNG_MAGIC), Some("image/png"));
        assert_eq!(sniff_mime(JPEG_MAGIC), Some("image/jpeg"));
    }

    #[test]
    fn text_is_not_an_image() {
        assert_eq!(sniff_mime(b"just some text pretending to be a png"), None);
        assert_eq!(sniff_mime(b""), None);
    }
}
