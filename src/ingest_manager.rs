use crate::cif_importer::CifImporter;
use crate::error::Error;
use crate::fetcher::Fetcher;
use crate::importer::SlowImporter;
use crate::schedule_manager::ScheduleManager;

use tracing::info;

use std::path::PathBuf;

/// Replaces the whole timetable with a freshly fetched full extract.
pub struct IngestManager<'a, F> {
    schedule_manager: &'a ScheduleManager,
    fetcher: F,
    snapshot: PathBuf,
}

impl<F> IngestManager<'_, F> {
    pub fn new(
        schedule_manager: &ScheduleManager,
        fetcher: F,
        snapshot: PathBuf,
    ) -> IngestManager<'_, F> {
        IngestManager {
            schedule_manager,
            fetcher,
            snapshot,
        }
    }
}

impl<F> IngestManager<'_, F>
where
    F: Fetcher + Send + Sync,
{
    pub async fn run(&mut self) -> Result<(), Error> {
        // held until commit, so a second ingest cannot interleave with this one
        let transaction = self.schedule_manager.transactional_write().await;

        let reader = self.fetcher.fetch().await?;
        let store = CifImporter::new().import(reader).await?;

        store.persist(&self.snapshot).await?;
        transaction.commit(store);

        info!(
            "Timetable replaced from {}; snapshot at {}",
            self.fetcher.source(),
            self.snapshot.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cif_importer::tests::EXTRACT;
    use crate::fetcher::ExtractReader;
    use crate::store::Store;

    use async_trait::async_trait;
    use tokio::io::BufReader;

    struct StaticFetcher(&'static str);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        fn source(&self) -> String {
            "memory".to_string()
        }

        async fn fetch(&self) -> Result<ExtractReader, Error> {
            Ok(Box::new(BufReader::new(self.0.as_bytes())))
        }
    }

    fn snapshot_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("railresolve-{}-{}.json", name, std::process::id()))
    }

    #[tokio::test]
    async fn ingest_commits_and_writes_a_loadable_snapshot() {
        let schedule_manager = ScheduleManager::new();
        let snapshot = snapshot_path("ingest");
        let fetcher = StaticFetcher(EXTRACT);
        let mut manager = IngestManager::new(&schedule_manager, fetcher, snapshot.clone());

        manager.run().await.unwrap();
        assert_eq!(schedule_manager.read().schedule_count(), 2);

        let reloaded = Store::load(&snapshot).await.unwrap();
        assert_eq!(reloaded.schedule_count(), 2);
        assert_eq!(reloaded.association_count(), 1);
        assert_eq!(reloaded.location_count(), 3);

        tokio::fs::remove_file(&snapshot).await.unwrap();
    }

    #[tokio::test]
    async fn failed_ingest_leaves_the_previous_store() {
        let schedule_manager = ScheduleManager::new();
        let snapshot = snapshot_path("failed");
        let truncated = &EXTRACT[..EXTRACT.len() - 81];
        let fetcher = StaticFetcher(truncated);
        let mut manager = IngestManager::new(&schedule_manager, fetcher, snapshot.clone());

        assert!(manager.run().await.is_err());
        assert_eq!(schedule_manager.read().schedule_count(), 0);
        assert!(!snapshot.exists());
    }
}
