// Upload session controller. A session is single-use: it sweeps the cache,
// checks settings, then stages and uploads each shared file in order,
// stopping at the first failure.

use crate::api::{UploadedDocument, Uploader};
use crate::cache::{sweep_stale_uploads, StagedFile};
use crate::error::ShareError;
use crate::settings::{Settings, UploadTarget};
use crate::share::ShareSource;
use log::{error, info, warn};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Working on file `current` (zero-based) of `total`.
    Uploading { current: usize, total: usize },
    Success { uploaded: usize },
    Failed { reason: String },
    NotConfigured { missing: Vec<&'static str> },
    NothingToShare,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Uploading { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SessionState::Success { .. })
    }
}

/// Receives every state a session moves into.
pub trait SessionObserver {
    fn on_state(&mut self, state: &SessionState);
}

impl<F: FnMut(&SessionState)> SessionObserver for F {
    fn on_state(&mut self, state: &SessionState) {
        self(state)
    }
}

pub struct UploadSession<U> {
    uploader: U,
    cache_dir: PathBuf,
    state: SessionState,
}

impl<U: Uploader> UploadSession<U> {
    pub fn new(uploader: U, cache_dir: impl Into<PathBuf>) -> Self {
        UploadSession {
            uploader,
            cache_dir: cache_dir.into(),
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Drive the session to a terminal state. Only the first call does
    /// anything; later calls return the state the first one ended in.
    pub fn run<O: SessionObserver + ?Sized>(
        &mut self,
        settings: &Settings,
        sources: &[Box<dyn ShareSource>],
        observer: &mut O,
    ) -> &SessionState {
        if self.state != SessionState::Idle {
            warn!("upload session already ran, ignoring");
            return &self.state;
        }

        sweep_stale_uploads(&self.cache_dir);

        let target = match settings.upload_target() {
            Ok(target) => target,
            Err(missing) => {
                warn!("not configured, missing {}", missing.join(", "));
                self.transition(SessionState::NotConfigured { missing }, observer);
                return &self.state;
            }
        };

        if sources.is_empty() {
            self.transition(SessionState::NothingToShare, observer);
            return &self.state;
        }

        let total = sources.len();
        for (index, source) in sources.iter().enumerate() {
            self.transition(SessionState::Uploading { current: index, total }, observer);
            if let Err(e) = self.upload_one(&target, index, source.as_ref()) {
                error!("upload {} of {} failed: {}", index + 1, total, e);
                self.transition(SessionState::Failed { reason: e.to_string() }, observer);
                return &self.state;
            }
        }

        info!("uploaded {} file(s) to {}", total, target.server_url);
        self.transition(SessionState::Success { uploaded: total }, observer);
        &self.state
    }

    fn upload_one(
        &self,
        target: &UploadTarget,
        index: usize,
        source: &dyn ShareSource,
    ) -> Result<UploadedDocument, ShareError> {
        let name = source.display_name();
        let mut reader = source
            .open()
            .map_err(|e| ShareError::io(format!("Could not read {}", name), e))?;
        let staged = StagedFile::stage(&self.cache_dir, index, &name, &mut reader)?;
        drop(reader);
        self.uploader.upload(target, staged.path(), &name)
    }

    fn transition<O: SessionObserver + ?Sized>(&mut self, next: SessionState, observer: &mut O) {
        self.state = next;
        observer.on_state(&self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TEMP_PREFIX;
    use crate::share::{LocalFile, MemoryShare};
    use std::cell::RefCell;
    use std::fs;
    use tempfile::TempDir;

    /// Records every call and fails on a chosen (zero-based) attempt.
    #[derive(Default)]
    struct RecordingUploader {
        fail_on: Option<usize>,
        calls: RefCell<Vec<(String, String, Vec<u8>)>>,
    }

    impl Uploader for RecordingUploader {
        fn upload(
            &self,
            target: &UploadTarget,
            file: &Path,
            file_name: &str,
        ) -> Result<UploadedDocument, ShareError> {
            let mut calls = self.calls.borrow_mut();
            let temp_name = file.file_name().unwrap().to_string_lossy().into_owned();
            assert!(temp_name.starts_with(TEMP_PREFIX));
            assert_eq!(target.organization_id, "org_1");
            calls.push((temp_name, file_name.to_string(), fs::read(file).unwrap()));
            if self.fail_on == Some(calls.len() - 1) {
                return Err(ShareError::Http {
                    status: 500,
                    body: "internal error".into(),
                });
            }
            Ok(UploadedDocument::default())
        }
    }

    fn settings() -> Settings {
        Settings {
            server_url: "https://papra.example.com".into(),
            api_key: "key".into(),
            organization_id: "org_1".into(),
            use_https: true,
        }
    }

    fn sources(n: usize) -> Vec<Box<dyn ShareSource>> {
        (0..n)
            .map(|i| -> Box<dyn ShareSource> {
                Box::new(MemoryShare::new(format!("file{}.txt", i), format!("body {}", i)))
            })
            .collect()
    }

    fn temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .map(|entries| {
                entries
                    .flatten()
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .filter(|n| n.starts_with(TEMP_PREFIX))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn all_files_upload_in_order() {
        let cache = TempDir::new().unwrap();
        let uploader = RecordingUploader::default();
        let mut session = UploadSession::new(&uploader, cache.path());
        let mut seen = Vec::new();

        let end = session
            .run(&settings(), &sources(3), &mut |s: &SessionState| seen.push(s.clone()))
            .clone();

        assert_eq!(end, SessionState::Success { uploaded: 3 });
        assert_eq!(
            seen,
            vec![
                SessionState::Uploading { current: 0, total: 3 },
                SessionState::Uploading { current: 1, total: 3 },
                SessionState::Uploading { current: 2, total: 3 },
                SessionState::Success { uploaded: 3 },
            ]
        );

        let calls = uploader.calls.borrow();
        assert_eq!(calls.len(), 3);
        let names: Vec<&str> = calls.iter().map(|c| c.1.as_str()).collect();
        assert_eq!(names, vec!["file0.txt", "file1.txt", "file2.txt"]);
        assert_eq!(calls[1].2, b"body 1");
        let mut temp_names: Vec<&String> = calls.iter().map(|c| &c.0).collect();
        temp_names.dedup();
        assert_eq!(temp_names.len(), 3);
        assert!(temp_files(cache.path()).is_empty());
    }

    #[test]
    fn first_failure_stops_the_queue() {
        let cache = TempDir::new().unwrap();
        let uploader = RecordingUploader {
            fail_on: Some(1),
            ..Default::default()
        };
        let mut session = UploadSession::new(&uploader, cache.path());

        let end = session.run(&settings(), &sources(3), &mut |_: &SessionState| {});

        match end {
            SessionState::Failed { reason } => {
                assert!(reason.contains("500"));
                assert!(reason.contains("internal error"));
            }
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(uploader.calls.borrow().len(), 2);
        assert!(temp_files(cache.path()).is_empty());
    }

    #[test]
    fn missing_settings_never_reach_the_uploader() {
        let cache = TempDir::new().unwrap();
        let uploader = RecordingUploader::default();
        let mut session = UploadSession::new(&uploader, cache.path());
        let incomplete = Settings {
            api_key: String::new(),
            ..settings()
        };

        let end = session.run(&incomplete, &sources(2), &mut |_: &SessionState| {});

        assert_eq!(
            *end,
            SessionState::NotConfigured {
                missing: vec!["API key"]
            }
        );
        assert!(uploader.calls.borrow().is_empty());
    }

    #[test]
    fn no_sources_is_nothing_to_share() {
        let cache = TempDir::new().unwrap();
        let uploader = RecordingUploader::default();
        let mut session = UploadSession::new(&uploader, cache.path());
        assert_eq!(
            *session.run(&settings(), &[], &mut |_: &SessionState| {}),
            SessionState::NothingToShare
        );
    }

    #[test]
    fn unreadable_source_fails_the_session() {
        let cache = TempDir::new().unwrap();
        let uploader = RecordingUploader::default();
        let mut session = UploadSession::new(&uploader, cache.path());
        let mut srcs = sources(1);
        srcs.push(Box::new(LocalFile::new(cache.path().join("gone.pdf"))));
        srcs.extend(sources(1));

        let end = session.run(&settings(), &srcs, &mut |_: &SessionState| {});

        match end {
            SessionState::Failed { reason } => assert!(reason.contains("gone.pdf")),
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(uploader.calls.borrow().len(), 1);
    }

    #[test]
    fn long_name_is_staged_short_but_uploaded_whole() {
        let cache = TempDir::new().unwrap();
        let uploader = RecordingUploader::default();
        let mut session = UploadSession::new(&uploader, cache.path());
        let long = format!("{}.pdf", "a".repeat(246));
        let srcs: Vec<Box<dyn ShareSource>> = vec![Box::new(MemoryShare::new(long.clone(), "pdf"))];

        let end = session.run(&settings(), &srcs, &mut |_: &SessionState| {}).clone();

        assert_eq!(end, SessionState::Success { uploaded: 1 });
        let calls = uploader.calls.borrow();
        assert!(calls[0].0.len() <= crate::cache::MAX_FILE_NAME_BYTES);
        assert_eq!(calls[0].1, long);
        assert_eq!(calls[0].2, b"pdf");
    }

    #[test]
    fn start_sweeps_leftovers_from_a_crashed_run() {
        let cache = TempDir::new().unwrap();
        fs::write(cache.path().join("temp_1_0_old.pdf"), b"stale").unwrap();
        fs::write(cache.path().join("keep.me"), b"mine").unwrap();
        let uploader = RecordingUploader::default();
        let mut session = UploadSession::new(&uploader, cache.path());

        session.run(&settings(), &sources(1), &mut |_: &SessionState| {});

        assert!(temp_files(cache.path()).is_empty());
        assert!(cache.path().join("keep.me").exists());
    }

    #[test]
    fn a_session_only_runs_once() {
        let cache = TempDir::new().unwrap();
        let uploader = RecordingUploader::default();
        let mut session = UploadSession::new(&uploader, cache.path());
        session.run(&settings(), &sources(1), &mut |_: &SessionState| {});

        let mut notified = false;
        let end = session
            .run(&settings(), &sources(2), &mut |_: &SessionState| notified = true)
            .clone();

        assert_eq!(end, SessionState::Success { uploaded: 1 });
        assert!(!notified);
        assert_eq!(uploader.calls.borrow().len(), 1);
        assert!(end.is_terminal() && end.is_success());
    }
}
