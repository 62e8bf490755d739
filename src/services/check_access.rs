use std::io;
use std::path::Path;

use tokio::fs;

use crate::error::AccessError;

/// Verifies, once and before any work, that `source` can be listed and that
/// `destination` accepts new files. A missing destination is created.
pub async fn check_access(source: &Path, destination: &Path) -> Result<(), AccessError> {
    check_source(source).await?;
    check_destination(destination).await
}

async fn check_source(source: &Path) -> Result<(), AccessError> {
    let metadata = fs::metadata(source).await.map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            AccessError::SourceMissing(source.to_path_buf())
        } else {
            AccessError::Unreadable {
                path: source.to_path_buf(),
                source: err,
            }
        }
    })?;

    if !metadata.is_dir() {
        return Err(AccessError::NotADirectory(source.to_path_buf()));
    }

    fs::read_dir(source)
        .await
        .map(|_| ())
        .map_err(|err| AccessError::Unreadable {
            path: source.to_path_buf(),
            source: err,
        })
}

async fn check_destination(destination: &Path) -> Result<(), AccessError> {
    let unwritable = |err: io::Error| AccessError::Unwritable {
        path: destination.to_path_buf(),
        source: err,
    };

    match fs::metadata(destination).await {
        Ok(metadata) if !metadata.is_dir() => {
            return Err(AccessError::NotADirectory(destination.to_path_buf()));
        }
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::info!("Creating destination folder {}", destination.display());
            fs::create_dir_all(destination).await.map_err(unwritable)?;
        }
        Err(err) => return Err(unwritable(err)),
    }

    // Permission bits lie on some filesystems; creating a file does not.
    tempfile::Builder::new()
        .prefix(".smartvision-probe-")
        .tempfile_in(destination)
        .map(drop)
        .map_err(unwritable)
}
