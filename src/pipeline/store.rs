// src/pipeline/store.rs
use anyhow::Result;
use std::path::PathBuf;

use super::item::{is_valid_job_id, PipelineItem};
use crate::core::FsOps;

/// One JSON file per job under the request state directory.
#[derive(Debug, Clone)]
pub struct ItemStore {
    dir: PathBuf,
}

impl ItemStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, job_id: &str) -> Result<PathBuf> {
        if !is_valid_job_id(job_id) {
            anyhow::bail!("Invalid job id {:?}", job_id);
        }
        Ok(self.dir.join(format!("{}.json", job_id)))
    }

    pub async fn load(&self, job_id: &str) -> Result<Option<PipelineItem>> {
        FsOps::read_json(&self.path_for(job_id)?).await
    }

    /// Existing item, or a fresh pending one.
    pub async fn load_or_new(&self, job_id: &str) -> Result<PipelineItem> {
        Ok(self
            .load(job_id)
            .await?
            .unwrap_or_else(|| PipelineItem::new(job_id)))
    }

    pub async fn save(&self, item: &PipelineItem) -> Result<()> {
        FsOps::write_json_atomic(&self.path_for(&item.job_id)?, item).await?;
        app_log!(debug, "Saved job {} state {}", item.job_id, item.state);
        Ok(())
    }

    /// All readable items; unreadable files are logged and skipped.
    pub async fn list(&self) -> Result<Vec<PipelineItem>> {
        let mut items = Vec::new();
        for path in FsOps::list_json_files(&self.dir).await? {
            match FsOps::read_json::<PipelineItem>(&path).await {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {}
                Err(e) => app_log!(warn, "Skipping unreadable state file {}: {:#}", path.display(), e),
            }
        }
        Ok(items)
    }
}
