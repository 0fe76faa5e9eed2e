use crate::error::Error;
use crate::store::Store;

use async_trait::async_trait;

use tokio::io::AsyncBufRead;

/// Builds a complete store from a full extract. Nothing is returned unless the
/// whole extract was read.
#[async_trait]
pub trait SlowImporter {
    async fn import<R>(&mut self, reader: R) -> Result<Store, Error>
    where
        R: AsyncBufRead + Unpin + Send;
}
