mod iptc;
mod xmp;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use img_parts::jpeg::{markers, Jpeg, JpegSegment};
use tempfile::NamedTempFile;

use crate::error::WriteError;
use crate::models::{DescriptionRecord, ImageFile};

pub use iptc::IptcFields;
use iptc::{ImageResource, IPTC_RESOURCE_ID, PHOTOSHOP_SIGNATURE};

/// Largest payload of one JPEG segment once the length field is counted.
const MAX_SEGMENT_CONTENTS: usize = 0xFFFF - 2;
/// APP0 to APP15.
const APP_MARKERS: std::ops::RangeInclusive<u8> = 0xE0..=0xEF;

/// Writes a description into an image stored in `destination`.
pub trait MetadataWriter {
    /// `data` is the current content of `image`. Returns the path of the
    /// written image.
    fn write(
        &self,
        image: &ImageFile,
        data: &Bytes,
        destination: &Path,
        record: &DescriptionRecord,
        author: Option<&str>,
    ) -> Result<PathBuf, WriteError>;
}

/// Embeds IPTC fields into JPEG files.
#[derive(Debug, Clone, Default)]
pub struct IptcWriter {
    keep_originals: bool,
}

impl IptcWriter {
    pub fn new(keep_originals: bool) -> Self {
        Self { keep_originals }
    }
}

impl MetadataWriter for IptcWriter {
    fn write(
        &self,
        image: &ImageFile,
        data: &Bytes,
        destination: &Path,
        record: &DescriptionRecord,
        author: Option<&str>,
    ) -> Result<PathBuf, WriteError> {
        if !image.is_jpeg() {
            return Err(WriteError::Unsupported(image.extension.clone()));
        }

        let mut jpeg = parse_jpeg(&image.path, data.clone())?;
        let fields = IptcFields {
            title: record.title.clone(),
            caption: record.description.clone(),
            keywords: record.keywords.clone(),
            byline: author.map(str::to_string),
        };
        embed_iptc(&mut jpeg, &fields).map_err(|message| WriteError::Malformed {
            path: image.path.clone(),
            message,
        })?;

        let target = destination.join(&image.base_name);
        let mut staged = NamedTempFile::new_in(destination)
            .map_err(|err| WriteError::io(destination, err))?;
        jpeg.encoder()
            .write_to(&mut staged)
            .and_then(|_| staged.flush())
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|err| WriteError::io(staged.path(), err))?;
        staged
            .persist(&target)
            .map_err(|err| WriteError::io(&target, err.error))?;

        if !self.keep_originals && !same_file(&image.path, &target) {
            if let Err(err) = fs::remove_file(&image.path) {
                log::warn!(
                    "Wrote '{}' but could not remove the original: {}",
                    target.display(),
                    err
                );
            }
        }

        log::debug!("Embedded metadata into {}", target.display());
        Ok(target)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn load_jpeg(path: &Path) -> Result<Jpeg, WriteError> {
    let data = fs::read(path).map_err(|err| WriteError::io(path, err))?;
    parse_jpeg(path, Bytes::from(data))
}

fn parse_jpeg(path: &Path, data: Bytes) -> Result<Jpeg, WriteError> {
    Jpeg::from_bytes(data).map_err(|err| WriteError::Malformed {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn is_photoshop_segment(segment: &JpegSegment) -> bool {
    segment.marker() == markers::APP13 && segment.contents().starts_with(PHOTOSHOP_SIGNATURE)
}

fn photoshop_resources(jpeg: &Jpeg) -> Result<Vec<ImageResource>, String> {
    let mut data = Vec::new();
    for segment in jpeg.segments().iter().filter(|s| is_photoshop_segment(s)) {
        data.extend_from_slice(&segment.contents()[PHOTOSHOP_SIGNATURE.len()..]);
    }
    iptc::parse_resources(&data)
}

/// Replaces the IPTC resource of `jpeg`, keeping its other Photoshop
/// resources and the IPTC datasets that `fields` does not cover.
fn embed_iptc(jpeg: &mut Jpeg, fields: &IptcFields) -> Result<(), String> {
    let mut resources = photoshop_resources(jpeg)?;

    let existing = match resources.iter().find(|r| r.id == IPTC_RESOURCE_ID) {
        Some(resource) => iptc::parse_datasets(&resource.data)?,
        None => Vec::new(),
    };
    let block = iptc::encode_datasets(&fields.merge_into(existing));

    match resources.iter_mut().find(|r| r.id == IPTC_RESOURCE_ID) {
        Some(resource) => resource.data = block,
        None => resources.push(ImageResource::iptc(block)),
    }

    let payload = iptc::encode_resources(&resources);
    let chunk_len = MAX_SEGMENT_CONTENTS - PHOTOSHOP_SIGNATURE.len();
    let new_segments = payload.chunks(chunk_len).map(|chunk| {
        let mut contents = PHOTOSHOP_SIGNATURE.to_vec();
        contents.extend_from_slice(chunk);
        JpegSegment::new_with_contents(markers::APP13, Bytes::from(contents))
    });

    let segments = jpeg.segments_mut();
    let position = segments
        .iter()
        .position(is_photoshop_segment)
        .unwrap_or_else(|| {
            segments
                .iter()
                .position(|s| !APP_MARKERS.contains(&s.marker()))
                .unwrap_or(segments.len())
        });
    segments.retain(|s| !is_photoshop_segment(s));
    let tail = segments.split_off(position.min(segments.len()));
    segments.extend(new_segments);
    segments.extend(tail);
    Ok(())
}

/// Reads the IPTC fields stored in a JPEG, if any.
pub fn read_iptc(path: &Path) -> Result<Option<IptcFields>, WriteError> {
    let jpeg = load_jpeg(path)?;
    let malformed = |message: String| WriteError::Malformed {
        path: path.to_path_buf(),
        message,
    };
    let resources = photoshop_resources(&jpeg).map_err(malformed)?;
    match resources.iter().find(|r| r.id == IPTC_RESOURCE_ID) {
        Some(resource) => {
            let datasets = iptc::parse_datasets(&resource.data).map_err(malformed)?;
            Ok(Some(IptcFields::from_datasets(&datasets)))
        }
        None => Ok(None),
    }
}

/// The caption already stored in JPEG `data`: the IPTC caption/abstract, else
/// the XMP `dc:description`. Data that is not a JPEG has no caption.
pub fn read_caption(data: &Bytes) -> Option<String> {
    let jpeg = match Jpeg::from_bytes(data.clone()) {
        Ok(jpeg) => jpeg,
        Err(err) => {
            log::debug!("No caption read: {}", err);
            return None;
        }
    };

    let iptc_caption = photoshop_resources(&jpeg)
        .ok()
        .and_then(|resources| resources.into_iter().find(|r| r.id == IPTC_RESOURCE_ID))
        .and_then(|resource| iptc::parse_datasets(&resource.data).ok())
        .map(|datasets| IptcFields::from_datasets(&datasets).caption)
        .map(|caption| caption.trim().to_string())
        .filter(|caption| !caption.is_empty());
    if iptc_caption.is_some() {
        return iptc_caption;
    }

    jpeg.segments()
        .iter()
        .filter(|s| s.marker() == markers::APP1)
        .filter_map(|s| s.contents().strip_prefix(xmp::XMP_SIGNATURE))
        .find_map(|packet| xmp::description(&String::from_utf8_lossy(packet)))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn jpeg_bytes() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 80, 40]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut out, image::ImageFormat::Jpeg)
            .unwrap();
        out.into_inner()
    }

    fn contents(path: &Path) -> Bytes {
        Bytes::from(fs::read(path).unwrap())
    }

    fn write_jpeg(dir: &Path, name: &str) -> ImageFile {
        let path = dir.join(name);
        fs::write(&path, jpeg_bytes()).unwrap();
        ImageFile::from_path(&path).unwrap()
    }

    fn with_segment(bytes: Vec<u8>, segment: JpegSegment) -> Vec<u8> {
        let mut jpeg = Jpeg::from_bytes(Bytes::from(bytes)).unwrap();
        jpeg.segments_mut().insert(1, segment);
        jpeg.encoder().bytes().to_vec()
    }

    fn record() -> DescriptionRecord {
        DescriptionRecord {
            title: "Sunset".into(),
            description: "A red sky.".into(),
            keywords: vec!["sky".into(), "red".into(), "sunset".into()],
        }
    }

    #[test]
    fn test_embeds_fields_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_jpeg(dir.path(), "a.jpg");

        let written = IptcWriter::default()
            .write(&image, &contents(&image.path), dir.path(), &record(), Some("Ann"))
            .unwrap();

        assert_eq!(written, image.path);
        let fields = read_iptc(&written).unwrap().unwrap();
        assert_eq!(fields.title, "Sunset");
        assert_eq!(fields.caption, "A red sky.");
        assert_eq!(fields.keywords, vec!["sky", "red", "sunset"]);
        assert_eq!(fields.byline.as_deref(), Some("Ann"));
        assert!(image::load_from_memory(&fs::read(&written).unwrap()).is_ok());
        assert_eq!(read_caption(&contents(&written)).as_deref(), Some("A red sky."));
        // only the image itself is left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_moves_to_destination_unless_keeping_originals() {
        let source = tempfile::tempdir().unwrap();
        let destination = tempfile::tempdir().unwrap();

        let moved = write_jpeg(source.path(), "moved.jpg");
        let written = IptcWriter::new(false)
            .write(&moved, &contents(&moved.path), destination.path(), &record(), None)
            .unwrap();
        assert_eq!(written, destination.path().join("moved.jpg"));
        assert!(!moved.path.exists());

        let kept = write_jpeg(source.path(), "kept.jpg");
        IptcWriter::new(true)
            .write(&kept, &contents(&kept.path), destination.path(), &record(), None)
            .unwrap();
        assert!(kept.path.exists());
        assert!(destination.path().join("kept.jpg").exists());
    }

    #[test]
    fn test_preserves_other_resources_and_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.jpg");

        let mut payload = PHOTOSHOP_SIGNATURE.to_vec();
        payload.extend(iptc::encode_resources(&[
            ImageResource {
                signature: *b"8BIM",
                id: 0x040C,
                name: Vec::new(),
                data: vec![7, 7, 7],
            },
            ImageResource::iptc(vec![0x1C, 2, 90, 0, 5, b'P', b'a', b'r', b'i', b's']),
        ]));
        let segment = JpegSegment::new_with_contents(markers::APP13, Bytes::from(payload));
        fs::write(&path, with_segment(jpeg_bytes(), segment)).unwrap();
        let image = ImageFile::from_path(&path).unwrap();

        IptcWriter::default()
            .write(&image, &contents(&image.path), dir.path(), &record(), None)
            .unwrap();

        let jpeg = load_jpeg(&path).unwrap();
        assert_eq!(
            jpeg.segments()
                .iter()
                .filter(|s| is_photoshop_segment(s))
                .count(),
            1
        );
        let resources = photoshop_resources(&jpeg).unwrap();
        assert!(resources.iter().any(|r| r.id == 0x040C && r.data == [7, 7, 7]));
        let iptc_block = &resources
            .iter()
            .find(|r| r.id == IPTC_RESOURCE_ID)
            .unwrap()
            .data;
        let datasets = iptc::parse_datasets(iptc_block).unwrap();
        assert!(datasets
            .iter()
            .any(|d| d.tag == iptc::Tag(2, 90) && d.decoded() == "Paris"));
    }

    #[test]
    fn test_long_fields_are_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_jpeg(dir.path(), "long.jpg");
        let mut long = record();
        long.title = "é".repeat(40);

        IptcWriter::default()
            .write(&image, &contents(&image.path), dir.path(), &long, None)
            .unwrap();

        let fields = read_iptc(&image.path).unwrap().unwrap();
        assert_eq!(fields.title, "é".repeat(32));
    }

    #[test]
    fn test_rejects_non_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.png");
        fs::write(&path, b"png").unwrap();
        let image = ImageFile::from_path(&path).unwrap();

        let err = IptcWriter::default()
            .write(&image, &contents(&image.path), dir.path(), &record(), None)
            .unwrap_err();
        assert!(matches!(err, WriteError::Unsupported(ext) if ext == "png"));
    }

    #[test]
    fn test_malformed_file_is_left_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"not a jpeg").unwrap();
        let image = ImageFile::from_path(&path).unwrap();

        let err = IptcWriter::default()
            .write(&image, &contents(&image.path), dir.path(), &record(), None)
            .unwrap_err();
        assert!(matches!(err, WriteError::Malformed { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"not a jpeg");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_caption_falls_back_to_xmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.jpg");
        let mut xmp_payload = xmp::XMP_SIGNATURE.to_vec();
        xmp_payload.extend_from_slice(
            br#"<x:xmpmeta><dc:description><rdf:Alt><rdf:li xml:lang="x-default">Old harbour</rdf:li></rdf:Alt></dc:description></x:xmpmeta>"#,
        );
        let segment = JpegSegment::new_with_contents(markers::APP1, Bytes::from(xmp_payload));
        fs::write(&path, with_segment(jpeg_bytes(), segment)).unwrap();

        assert_eq!(read_caption(&contents(&path)).as_deref(), Some("Old harbour"));
        assert_eq!(read_caption(&Bytes::from_static(b"not a jpeg")), None);
    }
}
