use crate::error::Error;
use crate::fetcher::{gunzip, ExtractReader, Fetcher};

use async_trait::async_trait;

use tokio::fs::File;
use tokio::io::BufReader;
use tracing::info;

use std::path::PathBuf;

/// Reads an extract from disk. Files ending in `.gz` are decompressed on the fly.
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn is_gzip(&self) -> bool {
        self.path
            .extension()
            .map_or(false, |x| x.eq_ignore_ascii_case("gz"))
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    fn source(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<ExtractReader, Error> {
        info!("Reading CIF extract from {}", self.source());
        let file = BufReader::new(File::open(&self.path).await?);
        if self.is_gzip() {
            Ok(gunzip(file))
        } else {
            Ok(Box::new(file))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::AsyncReadExt;

    #[test]
    fn gzip_is_detected_by_extension() {
        assert!(FileFetcher::new("/tmp/toc-full.CIF.gz").is_gzip());
        assert!(FileFetcher::new("/tmp/toc-full.CIF.GZ").is_gzip());
        assert!(!FileFetcher::new("/tmp/toc-full.CIF").is_gzip());
    }

    #[tokio::test]
    async fn plain_files_are_passed_through() {
        let name = format!("railresolve-fetch-{}.CIF", std::process::id());
        let path = std::env::temp_dir().join(name);
        tokio::fs::write(&path, "ZZ\n").await.unwrap();

        let mut reader = FileFetcher::new(&path).fetch().await.unwrap();
        let mut contents = String::new();
        reader.read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "ZZ\n");

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let fetcher = FileFetcher::new("/nonexistent/railresolve/extract.CIF");
        let result = fetcher.fetch().await;
        assert!(matches!(result, Err(Error::IoError(_))));
    }
}
