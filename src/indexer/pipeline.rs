//! Parallel parse/extract workers
//!
//! Workers pull jobs from a crossbeam channel, each with its own
//! `GrammarParser`, and send one `IndexMessage` per file back to the
//! coordinator. Workers never touch the store.

use crossbeam::channel::{Receiver, Sender};
use tracing::{debug, trace};

use super::walker::DiscoveredFile;
use super::{FileError, FileErrorKind};
use crate::adapter::{AdapterRegistry, GrammarParser, extract};
use crate::storage::FileRecord;
use crate::{Error, FileStatus, IndexMessage};

/// A file that needs reading
#[derive(Debug, Clone)]
pub struct Job {
    pub file: DiscoveredFile,
    pub status: FileStatus,
    /// Content hash stored by the previous run
    pub previous_hash: Option<String>,
}

/// Settings every worker shares
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub keep_partial: bool,
    pub force: bool,
}

/// Worker loop: runs until the job channel is closed
pub fn worker(
    registry: &AdapterRegistry,
    settings: WorkerSettings,
    jobs: Receiver<Job>,
    results: Sender<IndexMessage>,
) {
    let mut parser = GrammarParser::new(registry);
    for job in jobs {
        let message = process(&mut parser, settings, job);
        if results.send(message).is_err() {
            // coordinator is gone; nothing left to report to
            break;
        }
    }
}

/// Read, hash, parse and extract one file
pub fn process(parser: &mut GrammarParser<'_>, settings: WorkerSettings, job: Job) -> IndexMessage {
    let Job { file, status, previous_hash } = job;

    let bytes = match std::fs::read(&file.absolute) {
        Ok(bytes) => bytes,
        Err(e) => return failed(&file.relative, FileErrorKind::Io, e.to_string()),
    };

    let hash = blake3::hash(&bytes).to_hex().to_string();
    if !settings.force && previous_hash.as_deref() == Some(hash.as_str()) {
        trace!("{} touched but content unchanged", file.relative);
        return IndexMessage::Touched {
            relative_path: file.relative,
            mtime: file.mtime,
            size: file.size,
        };
    }

    let parsed = match parser.parse(&bytes, &file.language) {
        Ok(parsed) => parsed,
        Err(e) => return failed(&file.relative, FileErrorKind::from_error(&e), message_of(e)),
    };

    let partial = parsed.error_summary();
    if let Some(summary) = &partial {
        if !settings.keep_partial {
            return failed(&file.relative, FileErrorKind::Parse, summary.clone());
        }
    }

    let facts = match parser
        .adapter(&file.language)
        .and_then(|adapter| extract(adapter, &parsed))
    {
        Ok(facts) => facts,
        Err(e) => return failed(&file.relative, FileErrorKind::from_error(&e), message_of(e)),
    };

    debug!(
        "{} parsed: {} symbols, {} imports, {} references",
        file.relative,
        facts.symbols.len(),
        facts.imports.len(),
        facts.references.len()
    );

    IndexMessage::Processed {
        record: FileRecord {
            path: file.relative,
            language: file.language,
            mtime: file.mtime,
            size: file.size,
            hash: Some(hash),
        },
        facts,
        status,
        partial,
    }
}

fn failed(path: &str, kind: FileErrorKind, message: String) -> IndexMessage {
    IndexMessage::Failed(FileError::new(path, kind, message))
}

/// Error text without the variant prefix added by `Display`
fn message_of(error: Error) -> String {
    match error {
        Error::Parse(msg) | Error::Extraction(msg) | Error::UnsupportedLanguage(msg) => msg,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::default_registry;
    use std::fs;
    use tempfile::TempDir;

    fn job(dir: &TempDir, name: &str, content: &str, previous_hash: Option<String>) -> Job {
        let absolute = dir.path().join(name);
        fs::write(&absolute, content).unwrap();
        Job {
            file: DiscoveredFile {
                absolute,
                relative: name.to_string(),
                language: "python".to_string(),
                mtime: 1,
                size: content.len() as i64,
            },
            status: FileStatus::New,
            previous_hash,
        }
    }

    const STRICT: WorkerSettings = WorkerSettings { keep_partial: false, force: false };

    #[test]
    fn test_process_clean_file() {
        let dir = TempDir::new().unwrap();
        let registry = default_registry();
        let mut parser = GrammarParser::new(&registry);

        let message = process(&mut parser, STRICT, job(&dir, "a.py", "def f():\n    g()\n", None));
        match message {
            IndexMessage::Processed { record, facts, partial, .. } => {
                assert_eq!(record.path, "a.py");
                assert_eq!(record.hash.unwrap().len(), 64);
                assert_eq!(facts.symbols.len(), 1);
                assert_eq!(facts.references.len(), 1);
                assert!(partial.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_process_unchanged_hash_is_touched() {
        let dir = TempDir::new().unwrap();
        let registry = default_registry();
        let mut parser = GrammarParser::new(&registry);
        let content = "x = 1\n";
        let hash = blake3::hash(content.as_bytes()).to_hex().to_string();

        let message = process(&mut parser, STRICT, job(&dir, "a.py", content, Some(hash.clone())));
        assert!(matches!(message, IndexMessage::Touched { .. }));

        let forced = WorkerSettings { keep_partial: false, force: true };
        let message = process(&mut parser, forced, job(&dir, "a.py", content, Some(hash)));
        assert!(matches!(message, IndexMessage::Processed { .. }));
    }

    #[test]
    fn test_process_syntax_error() {
        let dir = TempDir::new().unwrap();
        let registry = default_registry();
        let mut parser = GrammarParser::new(&registry);
        let broken = "def ok():\n    pass\n\ndef broken(:\n    pass\n";

        let message = process(&mut parser, STRICT, job(&dir, "b.py", broken, None));
        match message {
            IndexMessage::Failed(error) => {
                assert_eq!(error.kind, FileErrorKind::Parse);
                assert!(error.message.contains("line 4"));
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let lenient = WorkerSettings { keep_partial: true, force: false };
        let message = process(&mut parser, lenient, job(&dir, "b.py", broken, None));
        match message {
            IndexMessage::Processed { facts, partial, .. } => {
                assert!(partial.is_some());
                assert!(facts.symbol_named("ok").is_some());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_process_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let registry = default_registry();
        let mut parser = GrammarParser::new(&registry);
        let mut job = job(&dir, "gone.py", "x = 1\n", None);
        fs::remove_file(&job.file.absolute).unwrap();
        job.file.relative = "gone.py".to_string();

        match process(&mut parser, STRICT, job) {
            IndexMessage::Failed(error) => assert_eq!(error.kind, FileErrorKind::Io),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
