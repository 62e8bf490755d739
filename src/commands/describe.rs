use std::path::PathBuf;

use bytes::Bytes;

use crate::error::WriteError;
use crate::models::{BatchRequest, BatchResult, DescriptionRecord, ImageFile};
use crate::pipeline::BatchSink;
use crate::services::MetadataWriter;

/// Embeds each description into its image, then leaves the image in the
/// destination folder.
pub struct ImageDescriber<W> {
    writer: W,
    destination: PathBuf,
    author: Option<String>,
    written: Vec<PathBuf>,
}

impl<W: MetadataWriter> ImageDescriber<W> {
    pub fn new(writer: W, request: &BatchRequest) -> Self {
        Self {
            writer,
            destination: request.destination_directory.clone(),
            author: request.author_name.clone(),
            written: Vec::new(),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl<W: MetadataWriter> BatchSink for ImageDescriber<W> {
    fn accept(
        &mut self,
        image: &ImageFile,
        data: &Bytes,
        record: DescriptionRecord,
    ) -> Result<(), WriteError> {
        log::debug!("{}: title '{}', {} keyword(s)", image, record.title, record.keywords.len());
        let path = self.writer.write(
            image,
            data,
            &self.destination,
            &record,
            self.author.as_deref(),
        )?;
        self.written.push(path);
        Ok(())
    }

    fn finish(&mut self, result: &BatchResult) -> Result<Option<PathBuf>, WriteError> {
        log::info!(
            "Metadata embedded into {} of {} image(s) in {}",
            self.written.len(),
            result.total,
            self.destination.display()
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::DescribeError;
    use crate::models::{BatchMode, ErrorKind};
    use crate::pipeline::tests::FakeClient;
    use crate::pipeline::BatchRunner;
    use crate::services::metadata::read_iptc;
    use crate::services::{IptcWriter, ResponseParser};

    fn jpeg_bytes() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(4, 4, image::Rgb([10, 120, 200]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image)
            .write_to(&mut out, image::ImageFormat::Jpeg)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_three_file_batch_embeds_two() {
        let source = tempfile::tempdir().unwrap();
        let destination = tempfile::tempdir().unwrap();
        for name in ["1.jpg", "2.jpg", "3.jpg"] {
            std::fs::write(source.path().join(name), jpeg_bytes()).unwrap();
        }
        let request = BatchRequest::new(
            source.path(),
            Some(destination.path().to_path_buf()),
            BatchMode::EmbedMetadata,
        )
        .with_author(Some("Ann".into()));

        let client = FakeClient::default()
            .reply("1.jpg", Ok("Title: Sunset\nDescription: A red sky.\nKeywords: sky, red, sunset, red"))
            .reply("2.jpg", Err(DescribeError::InvalidImage("too small".into())));
        let mut describer = ImageDescriber::new(IptcWriter::new(false), &request);

        let result = BatchRunner::new(&client, ResponseParser::default(), vec!["jpg".into()], "Describe.")
            .run(&request, &mut describer)
            .await
            .unwrap();

        assert_eq!(result.processed_count, 2);
        assert_eq!(result.failed_kinds(), vec![("2.jpg", ErrorKind::InvalidImage)]);
        assert_eq!(describer.written().len(), 2);

        let first = read_iptc(&destination.path().join("1.jpg")).unwrap().unwrap();
        assert_eq!(first.title, "Sunset");
        assert_eq!(first.caption, "A red sky.");
        assert_eq!(first.keywords, vec!["sky", "red", "sunset"]);
        assert_eq!(first.byline.as_deref(), Some("Ann"));
        assert!(destination.path().join("3.jpg").exists());
        assert!(!destination.path().join("2.jpg").exists());
        // failed files stay where they were, processed ones were moved
        assert!(source.path().join("2.jpg").exists());
        assert!(!source.path().join("1.jpg").exists());
    }

    #[tokio::test]
    async fn test_existing_caption_enriches_the_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), jpeg_bytes()).unwrap();
        let request = BatchRequest::new(dir.path(), None, BatchMode::EmbedMetadata);
        let client = FakeClient::default();

        let mut describer = ImageDescriber::new(IptcWriter::default(), &request);
        let mut runner =
            BatchRunner::new(&client, ResponseParser::default(), vec!["jpg".into()], "Describe.");
        runner.run(&request, &mut describer).await.unwrap();
        // the second run sees the caption written by the first
        runner.run(&request, &mut describer).await.unwrap();

        let prompts = client.prompts.borrow();
        assert_eq!(prompts[0], "Describe.");
        assert_eq!(
            prompts[1],
            "Describe. Use the following context to enhance your response: About a.jpg."
        );
    }
}
