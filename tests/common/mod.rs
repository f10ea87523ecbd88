#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use forcewatch::config::ConfigFile;
use forcewatch::engine::{PassReport, Runtime};
use forcewatch::fs::mock::MockFileSystem;
use forcewatch::fs::FileSystem;
use forcewatch::state::{decode, PersistedState};
use forcewatch::tracker::StepKey;
use forcewatch::types::IssueTime;

pub use forcewatch_test_utils::fixtures::{put_forcing, utc};
pub use forcewatch_test_utils::{init_tracing, ConfigFileBuilder, FakeInvoker, SourceBuilder};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const DATA_ROOT: &str = "/data";
pub const STATE_FILE: &str = "/state/forcing.state";

pub fn data_root() -> PathBuf {
    PathBuf::from(DATA_ROOT)
}

pub fn root(name: &str) -> PathBuf {
    data_root().join(name)
}

pub fn issue(s: &str) -> IssueTime {
    IssueTime::parse(s).expect("valid issue time")
}

pub fn key(issue_str: &str, offset: i32) -> StepKey {
    StepKey {
        issue: issue(issue_str),
        offset,
    }
}

/// A mock filesystem, a config and a fake invoker wired together. Each
/// `pass` builds a fresh `Runtime`, like one process invocation.
pub struct Harness {
    pub fs: MockFileSystem,
    pub cfg: ConfigFile,
    pub invoker: FakeInvoker,
}

impl Harness {
    pub fn new(cfg: ConfigFile) -> Self {
        Self::with_invoker(cfg, FakeInvoker::new())
    }

    pub fn with_invoker(cfg: ConfigFile, invoker: FakeInvoker) -> Self {
        init_tracing();
        let fs = MockFileSystem::new();
        fs.add_dir("/state");
        Self { fs, cfg, invoker }
    }

    /// Harness over the three-source analysis config (`HRRR`, `RAP`,
    /// `MRMS`) with default timing.
    pub fn analysis() -> Self {
        Self::new(ConfigFileBuilder::analysis(DATA_ROOT, STATE_FILE).build())
    }

    pub fn put(&self, input_root: &str, issue: &str, valid: &str) -> PathBuf {
        put_forcing(&self.fs, &root(input_root), issue, valid)
    }

    /// Put every file step 0 of cycle `2024010100` needs in the analysis
    /// config, except the inputs named in `skip`.
    pub fn put_analysis_step0(&self, skip: &[&str]) {
        let files = [
            ("hrrr0", "2024010100", "202401010000"),
            ("hrrr3", "2023123121", "202401010000"),
            ("rap0", "2024010100", "202401010000"),
            ("rap3", "2023123121", "202401010000"),
            ("mrms", "2024010100", "202401010000"),
        ];
        for (input, issue, valid) in files {
            if !skip.contains(&input) {
                self.put(input, issue, valid);
            }
        }
    }

    pub async fn pass(&self, now: DateTime<Utc>) -> PassReport {
        let mut runtime = Runtime::new(
            self.cfg.clone(),
            Arc::new(self.fs.clone()),
            self.invoker.clone(),
        )
        .expect("runtime from valid config");
        runtime.run_pass(now).await.expect("pass succeeds")
    }

    pub fn state_text(&self) -> String {
        self.fs
            .read_to_string(Path::new(STATE_FILE))
            .expect("state file written")
    }

    pub fn state(&self) -> PersistedState {
        decode(&self.state_text()).expect("state file decodes")
    }
}
