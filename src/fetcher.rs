use crate::error::Error;

use async_compression::tokio::bufread::GzipDecoder;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, BufReader};

pub type ExtractReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Produces the lines of a full CIF extract, already decompressed.
#[async_trait]
pub trait Fetcher {
    /// Where the extract comes from, for logs.
    fn source(&self) -> String;

    async fn fetch(&self) -> Result<ExtractReader, Error>;
}

/// Decompresses a gzipped extract while it is being read.
pub fn gunzip<R>(reader: R) -> ExtractReader
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    Box::new(BufReader::new(GzipDecoder::new(reader)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_compression::tokio::bufread::GzipEncoder;
    use tokio::io::AsyncReadExt;

    use std::io::Cursor;

    #[tokio::test]
    async fn gunzip_restores_the_extract() {
        let extract = "HDTPS.UDFROC1.PD240101\nZZ\n";
        let mut compressed = Vec::new();
        GzipEncoder::new(extract.as_bytes())
            .read_to_end(&mut compressed)
            .await
            .unwrap();
        assert_ne!(compressed, extract.as_bytes());

        let mut contents = String::new();
        gunzip(Cursor::new(compressed))
            .read_to_string(&mut contents)
            .await
            .unwrap();
        assert_eq!(contents, extract);
    }
}
