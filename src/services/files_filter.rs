use std::path::Path;

use tokio::fs;

use crate::error::AccessError;
use crate::models::ImageFile;

/// Lists the processable images of `dir`, sorted by file name.
///
/// A file is kept when its extension is in `extensions` (case-insensitive),
/// it is a regular file (symbolic links are followed and judged by their
/// target), it is not empty, and it can be opened for reading. Hidden files
/// are skipped.
pub async fn filter_files_by_extension(
    dir: &Path,
    extensions: &[String],
) -> Result<Vec<ImageFile>, AccessError> {
    let mut images = Vec::new();

    let mut entries = fs::read_dir(dir).await.map_err(|source| unreadable(dir, source))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| unreadable(dir, source))?
    {
        let path = entry.path();
        let Some(image) = ImageFile::from_path(&path) else {
            continue;
        };

        if image.base_name.starts_with('.') || !has_allowed_extension(&image.extension, extensions)
        {
            continue;
        }

        // fs::metadata follows links; a dangling link just gets skipped.
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("Skipping '{}': {}", image.base_name, err);
                continue;
            }
        };

        if !metadata.is_file() {
            continue;
        }

        if metadata.len() == 0 {
            log::warn!("Skipping empty file '{}'", image.base_name);
            continue;
        }

        if entry.file_type().await.is_ok_and(|kind| kind.is_symlink())
            && !symlink_target_allowed(&path, extensions).await
        {
            log::debug!(
                "Skipping link '{}': target is not an accepted image",
                image.base_name
            );
            continue;
        }

        if let Err(err) = fs::File::open(&path).await {
            log::warn!("Skipping unreadable file '{}': {}", image.base_name, err);
            continue;
        }

        images.push(image);
    }

    images.sort_by(|a, b| a.base_name.cmp(&b.base_name));
    Ok(images)
}

fn has_allowed_extension(extension: &str, extensions: &[String]) -> bool {
    extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(extension))
}

async fn symlink_target_allowed(path: &Path, extensions: &[String]) -> bool {
    match fs::canonicalize(path).await {
        Ok(target) => target
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| has_allowed_extension(ext, extensions)),
        Err(_) => false,
    }
}

fn unreadable(dir: &Path, source: std::io::Error) -> AccessError {
    if source.kind() == std::io::ErrorKind::NotFound {
        return AccessError::SourceMissing(dir.to_path_buf());
    }
    AccessError::Unreadable {
        path: dir.to_path_buf(),
        source,
    }
}
