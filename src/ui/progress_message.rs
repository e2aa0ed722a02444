/// Indexing stage a progress message belongs to
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProgressPhase {
    /// Reading, parsing and storing changed files
    Parsing,
    /// Dropping files that vanished from disk
    Cleanup,
}

#[derive(Clone, Debug)]
pub enum ProgressMessage {
    Started {
        phase: ProgressPhase,
        total: usize,
    },
    Progress {
        phase: ProgressPhase,
        current: usize,
        file: Option<String>,
    },
    Finished {
        phase: ProgressPhase,
    },
    FileNew(String),
    FileModified(String),
    FileDeleted(String),
}
