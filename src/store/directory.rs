// Copyright (C) 2022 Quickwit, Inc.
//
// Quickwit is offered under the AGPL v3.0 and as commercial software.
// For commercial licensing, contact us at hello@quickwit.io.
//
// AGPL:
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};

const GENERATION_NUM_DIGITS: usize = 20;

/// The set of backing files of a queue.
///
/// Files are named `{prefix}{generation:020}`. Other files in the directory
/// are ignored.
pub struct Directory {
    dir: PathBuf,
    prefix: String,
    generations: BTreeSet<u64>,
    // No file with a generation >= next_generation should exist.
    next_generation: u64,
}

fn filename_to_generation(prefix: &str, file_name: &str) -> Option<u64> {
    let generation_str = file_name.strip_prefix(prefix)?;
    if generation_str.len() != GENERATION_NUM_DIGITS {
        return None;
    }
    if !generation_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    generation_str.parse::<u64>().ok()
}

fn generation_to_filename(prefix: &str, generation: u64) -> String {
    format!("{prefix}{generation:020}")
}

impl Directory {
    pub async fn open(dir: &Path, prefix: &str) -> io::Result<Directory> {
        let mut read_dir = tokio::fs::read_dir(dir).await?;
        let mut generations: BTreeSet<u64> = Default::default();
        while let Some(dir_entry) = read_dir.next_entry().await? {
            if !dir_entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = if let Some(file_name) = dir_entry.file_name().to_str() {
                file_name.to_string()
            } else {
                continue;
            };
            if let Some(generation) = filename_to_generation(prefix, &file_name) {
                generations.insert(generation);
            }
        }
        let next_generation = generations
            .iter()
            .last()
            .map(|generation| generation + 1)
            .unwrap_or(0u64);
        Ok(Directory {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            generations,
            next_generation,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn generations(&self) -> impl Iterator<Item = u64> + '_ {
        self.generations.iter().copied()
    }

    #[cfg(test)]
    pub fn num_files(&self) -> usize {
        self.generations.len()
    }

    pub fn next_generation(&self) -> u64 {
        self.next_generation
    }

    /// Makes sure generations below `generation` are never handed out again,
    /// even if their files are gone.
    pub fn ensure_next_generation_at_least(&mut self, generation: u64) {
        self.next_generation = self.next_generation.max(generation);
    }

    pub fn filepath(&self, generation: u64) -> PathBuf {
        filepath(&self.dir, &self.prefix, generation)
    }

    /// Creates the file of the next generation.
    pub async fn new_file(&mut self) -> io::Result<(u64, File)> {
        let generation = self.next_generation;
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(self.filepath(generation))
            .await?;
        self.next_generation = generation + 1;
        self.generations.insert(generation);
        Ok((generation, file))
    }

    /// Deletes the file of the given generation.
    ///
    /// A file that is already gone is considered deleted.
    pub async fn delete_file(&mut self, generation: u64) -> io::Result<()> {
        match tokio::fs::remove_file(self.filepath(generation)).await {
            Ok(()) => {}
            Err(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            Err(io_err) => return Err(io_err),
        }
        self.generations.remove(&generation);
        Ok(())
    }
}

pub(crate) fn filepath(dir: &Path, prefix: &str, generation: u64) -> PathBuf {
    dir.join(generation_to_filename(prefix, generation))
}
