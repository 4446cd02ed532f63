use std::collections::BTreeMap;
use std::ops::Bound;

/// Range of sequence numbers held by a backing file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FileRange {
    /// `first_seq` announced by the file header, if it could be read.
    pub header_first_seq: Option<u64>,
    /// Smallest and largest sequence numbers of the blobs in the file.
    pub seqs: Option<(u64, u64)>,
}

impl FileRange {
    fn max_seq(&self) -> Option<u64> {
        self.seqs.map(|(_, max_seq)| max_seq)
    }
}

/// In-memory index of the backing files, keyed by generation.
///
/// It tells which files can be deleted once records are confirmed.
#[derive(Default)]
pub struct FileIndex {
    files: BTreeMap<u64, FileRange>,
}

impl FileIndex {
    pub fn register_file(&mut self, generation: u64) {
        self.files.entry(generation).or_default();
    }

    pub fn set_header(&mut self, generation: u64, first_seq: u64) {
        self.files.entry(generation).or_default().header_first_seq = Some(first_seq);
    }

    pub fn record_appended(&mut self, generation: u64, seq: u64) {
        let file_range = self.files.entry(generation).or_default();
        file_range.seqs = Some(match file_range.seqs {
            Some((min_seq, max_seq)) => (min_seq.min(seq), max_seq.max(seq)),
            None => (seq, seq),
        });
    }

    pub fn remove_file(&mut self, generation: u64) {
        self.files.remove(&generation);
    }

    pub fn file_range(&self, generation: u64) -> Option<FileRange> {
        self.files.get(&generation).copied()
    }

    pub fn generations(&self) -> impl Iterator<Item = u64> + '_ {
        self.files.keys().copied()
    }

    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    /// Smallest sequence number held in any file.
    pub fn lowest_seq(&self) -> Option<u64> {
        self.files
            .values()
            .filter_map(|file_range| file_range.seqs)
            .map(|(min_seq, _)| min_seq)
            .min()
    }

    /// Lower bound for the next sequence number to assign, as witnessed by the files.
    pub fn next_seq_floor(&self) -> Option<u64> {
        self.files
            .values()
            .flat_map(|file_range| {
                let after_blobs = file_range.max_seq().map(|max_seq| max_seq + 1);
                after_blobs.into_iter().chain(file_range.header_first_seq)
            })
            .max()
    }

    /// Sequence number from which the blobs of `generation` are superseded.
    ///
    /// A file whose header announces `first_seq` holds the records from
    /// `first_seq` on. Blobs with such sequence numbers in an earlier file are
    /// leftovers of a failed append.
    pub fn seq_limit(&self, generation: u64) -> Option<u64> {
        self.files
            .range((Bound::Excluded(generation), Bound::Unbounded))
            .filter_map(|(_, file_range)| file_range.header_first_seq)
            .min()
    }

    /// Forgets the blobs superseded by a later file.
    ///
    /// Blobs of a file have consecutive sequence numbers, so only the end of
    /// the range can be superseded.
    pub fn drop_superseded(&mut self) {
        let mut seq_limit: Option<u64> = None;
        for file_range in self.files.values_mut().rev() {
            if let (Some(limit), Some((min_seq, max_seq))) = (seq_limit, file_range.seqs) {
                file_range.seqs = if min_seq >= limit {
                    None
                } else {
                    Some((min_seq, max_seq.min(limit - 1)))
                };
            }
            if let Some(first_seq) = file_range.header_first_seq {
                seq_limit = Some(seq_limit.map_or(first_seq, |limit| limit.min(first_seq)));
            }
        }
    }

    /// Returns the generations of the files that can be deleted.
    ///
    /// A file is reclaimable when all of its blobs are below `low_water_mark`.
    /// Files without any blob are only reclaimable if they are not the active file.
    pub fn reclaimable(&self, low_water_mark: u64, active_generation: Option<u64>) -> Vec<u64> {
        self.files
            .iter()
            .filter(|&(&generation, file_range)| match file_range.max_seq() {
                Some(max_seq) => max_seq < low_water_mark,
                None => Some(generation) != active_generation,
            })
            .map(|(&generation, _)| generation)
            .collect()
    }
}
