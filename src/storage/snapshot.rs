//! JSON snapshot files passed between pipeline stages

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    config::PathsConfig,
    domain::work::{PublicEntry, ResolvedWork},
    resolve::pipeline::Checkpoint,
    storage::error::StorageError,
};

/// Pipeline stage whose output lives in its own snapshot file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Crawled,
    Canonical,
    WithArt,
    Resolved,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Crawled,
        Stage::Canonical,
        Stage::WithArt,
        Stage::Resolved,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Stage::Crawled => "crawled.json",
            Stage::Canonical => "canonical.json",
            Stage::WithArt => "with_art.json",
            Stage::Resolved => "resolved.json",
        }
    }
}

#[derive(Debug)]
pub struct StageInfo {
    pub records: usize,
    pub modified: SystemTime,
}

pub struct SnapshotStore {
    output_dir: PathBuf,
    public_artifact: PathBuf,
}

impl SnapshotStore {
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            output_dir: paths.output_dir.clone(),
            public_artifact: paths.public_artifact.clone(),
        }
    }

    pub fn path(&self, stage: Stage) -> PathBuf {
        self.output_dir.join(stage.file_name())
    }

    pub fn public_artifact(&self) -> &Path {
        &self.public_artifact
    }

    pub fn exists(&self, stage: Stage) -> bool {
        self.path(stage).is_file()
    }

    pub fn load<T: DeserializeOwned>(&self, stage: Stage) -> Result<Vec<T>, StorageError> {
        read_records(&self.path(stage))
    }

    pub fn save<T: Serialize>(&self, stage: Stage, records: &[T]) -> Result<(), StorageError> {
        write_records(&self.path(stage), records)
    }

    /// Input of the video stage: its own earlier output when resuming
    pub fn load_resolution_input(&self) -> Result<(Stage, Vec<ResolvedWork>), StorageError> {
        let stage = if self.exists(Stage::Resolved) {
            Stage::Resolved
        } else {
            Stage::WithArt
        };
        Ok((stage, self.load(stage)?))
    }

    /// Writes the resolved snapshot together with the public artifact
    pub fn save_resolved(&self, works: &[ResolvedWork]) -> Result<(), StorageError> {
        self.save(Stage::Resolved, works)?;
        self.write_public(works)
    }

    pub fn write_public(&self, works: &[ResolvedWork]) -> Result<(), StorageError> {
        let entries: Vec<PublicEntry> = works.iter().map(ResolvedWork::to_public).collect();
        write_records(&self.public_artifact, &entries)
    }

    pub fn stage_info(&self, stage: Stage) -> Result<Option<StageInfo>, StorageError> {
        let path = self.path(stage);
        if !path.is_file() {
            return Ok(None);
        }
        let modified = fs::metadata(&path)?.modified()?;
        let records = read_records::<serde_json::Value>(&path)?.len();
        Ok(Some(StageInfo { records, modified }))
    }
}

impl Checkpoint for SnapshotStore {
    fn persist(&mut self, works: &[ResolvedWork]) -> Result<(), StorageError> {
        self.save_resolved(works)
    }
}

pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::SnapshotNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_reader(BufReader::new(file)).map_err(|source| StorageError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes through a sibling temp file so a crash never leaves a truncated snapshot
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let written = write_pretty(&tmp, records)
        .and_then(|()| fs::rename(&tmp, path).map_err(StorageError::from));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

fn write_pretty<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StorageError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
