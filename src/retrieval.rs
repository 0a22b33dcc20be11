//! Downloading accepted links
//!
//! The network client itself is not part of this crate. Anything that can
//! fetch a URL into a file implements [`Retriever`]; [`fetch_with_retry`]
//! adds the rate-limit handling on top.

use log::{info, warn};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Result of a single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The body was written to the destination
    Saved { bytes: u64 },
    /// The destination already is the resource; nothing was written
    AlreadyPresent { bytes: u64 },
    /// The server asked us to slow down (HTTP 429)
    RateLimited { retry_after: Option<Duration> },
    /// Any other failure; not retried
    Failed { reason: String },
}

pub trait Retriever {
    fn fetch(&mut self, url: &str, dest: &Path) -> FetchOutcome;
}

/// Copies `file://` URLs from the local file system
///
/// Handy for mirrored pages; every other scheme fails, since there is no
/// network backend here.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalRetriever;

impl Retriever for LocalRetriever {
    fn fetch(&mut self, url: &str, dest: &Path) -> FetchOutcome {
        let Some(encoded) = url.strip_prefix("file://") else {
            return FetchOutcome::Failed {
                reason: "only file:// URLs can be retrieved locally".to_string(),
            };
        };
        let path = match percent_decode_str(encoded).decode_utf8() {
            Ok(path) => path,
            Err(err) => {
                return FetchOutcome::Failed {
                    reason: format!("cannot decode '{encoded}': {err}"),
                };
            }
        };
        let path = Path::new(path.as_ref());

        // Copying a file onto itself truncates it before reading
        if let (Ok(src), Ok(dst)) = (fs::canonicalize(path), fs::canonicalize(dest))
            && src == dst
        {
            return match fs::metadata(&src) {
                Ok(meta) => FetchOutcome::AlreadyPresent { bytes: meta.len() },
                Err(err) => FetchOutcome::Failed {
                    reason: format!("cannot inspect '{}': {err}", src.display()),
                },
            };
        }

        match fs::copy(path, dest) {
            Ok(bytes) => FetchOutcome::Saved { bytes },
            Err(err) => FetchOutcome::Failed {
                reason: format!("cannot copy '{}': {err}", path.display()),
            },
        }
    }
}

/// Bytes escaped when a local path becomes a URL path
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// `file://` URL for an absolute local path, the inverse of what [`LocalRetriever`] reads
pub fn file_url(path: &Path) -> String {
    let path = path.to_string_lossy();
    format!("file://{}", utf8_percent_encode(&path, PATH_ESCAPES))
}

/// How waiting between attempts happens
pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

/// Blocks the current thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed wait after a rate-limited attempt. Zero means "use the server's hint".
    pub wait: Duration,
    /// Wait used when the server sends no hint
    pub default_retry_after: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            wait: Duration::ZERO,
            default_retry_after: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// How long to back off after a rate-limited attempt
    pub fn delay_for(&self, retry_after: Option<Duration>) -> Duration {
        if !self.wait.is_zero() {
            self.wait
        } else {
            retry_after.unwrap_or(self.default_retry_after)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("Still rate limited after {attempts} attempts: {url}")]
    RateLimited { url: String, attempts: u32 },

    #[error("Failed to download {url}: {reason}")]
    Failed { url: String, reason: String },
}

/// What a successful retrieval left at the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retrieved {
    pub bytes: u64,
    /// The destination was the resource itself and was left untouched
    pub already_present: bool,
}

/// Fetch `url` into `dest`, backing off while the server rate-limits us
pub fn fetch_with_retry(
    retriever: &mut impl Retriever,
    pause: &mut impl Pause,
    url: &str,
    dest: &Path,
    policy: &RetryPolicy,
) -> Result<Retrieved, RetrievalError> {
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match retriever.fetch(url, dest) {
            FetchOutcome::Saved { bytes } => {
                return Ok(Retrieved {
                    bytes,
                    already_present: false,
                });
            }
            FetchOutcome::AlreadyPresent { bytes } => {
                info!("{url} is already at {}", dest.display());
                return Ok(Retrieved {
                    bytes,
                    already_present: true,
                });
            }
            FetchOutcome::Failed { reason } => {
                return Err(RetrievalError::Failed {
                    url: url.to_string(),
                    reason,
                });
            }
            FetchOutcome::RateLimited { retry_after } => {
                if attempt == max_attempts {
                    break;
                }
                let delay = policy.delay_for(retry_after);
                info!(
                    "rate limited on {url}, retrying after {}s (attempt {attempt}/{max_attempts})",
                    delay.as_secs()
                );
                pause.pause(delay);
            }
        }
    }

    warn!("giving up on {url} after {max_attempts} rate-limited attempts");
    Err(RetrievalError::RateLimited {
        url: url.to_string(),
        attempts: max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    struct Scripted {
        outcomes: VecDeque<FetchOutcome>,
        calls: Vec<(String, PathBuf)>,
    }

    impl Scripted {
        fn new(outcomes: Vec<FetchOutcome>) -> Self {
            Self {
                outcomes: outcomes.into(),
                calls: Vec::new(),
            }
        }
    }

    impl Retriever for Scripted {
        fn fetch(&mut self, url: &str, dest: &Path) -> FetchOutcome {
            self.calls.push((url.to_string(), dest.to_path_buf()));
            self.outcomes.pop_front().unwrap_or(FetchOutcome::Failed {
                reason: "script exhausted".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct Recorded(Vec<Duration>);

    impl Pause for Recorded {
        fn pause(&mut self, duration: Duration) {
            self.0.push(duration);
        }
    }

    fn limited(secs: Option<u64>) -> FetchOutcome {
        FetchOutcome::RateLimited {
            retry_after: secs.map(Duration::from_secs),
        }
    }

    #[test]
    fn test_local_retriever_copies_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let src = dir.path().join("src.txt");
        std::fs::write(&src, "hello").unwrap();
        let dest = dir.path().join("dest.txt");

        let mut local = LocalRetriever;
        let url = format!("file://{}", src.display());
        assert_eq!(local.fetch(&url, &dest), FetchOutcome::Saved { bytes: 5 });
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hello");

        assert!(matches!(
            local.fetch("https://example.com/a", &dest),
            FetchOutcome::Failed { .. }
        ));
        assert!(matches!(
            local.fetch("file:///definitely/not/here", &dest),
            FetchOutcome::Failed { .. }
        ));
    }

    #[test]
    fn test_local_retriever_never_copies_a_file_onto_itself() {
        let dir = tempfile::tempdir().expect("temp dir");
        let src = dir.path().join("a.pdf");
        std::fs::write(&src, "precious bytes").unwrap();

        let mut local = LocalRetriever;
        let url = format!("file://{}", src.display());
        // same file reached through a different spelling of the path
        let dest = dir.path().join(".").join("a.pdf");
        assert_eq!(
            local.fetch(&url, &dest),
            FetchOutcome::AlreadyPresent { bytes: 14 }
        );
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "precious bytes");
    }

    #[test]
    fn test_local_retriever_decodes_percent_escapes() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("my file.pdf"), "pdf").unwrap();
        let dest = dir.path().join("copy.pdf");

        let mut local = LocalRetriever;
        let url = format!("file://{}/my%20file.pdf", dir.path().display());
        assert_eq!(local.fetch(&url, &dest), FetchOutcome::Saved { bytes: 3 });
    }

    #[test]
    fn test_file_url_round_trips_through_local_retriever() {
        let dir = tempfile::tempdir().expect("temp dir");
        let src = dir.path().join("50% off #1.txt");
        std::fs::write(&src, "deal").unwrap();

        let url = file_url(&src);
        assert!(url.ends_with("/50%25%20off%20%231.txt"), "{url}");

        let mut local = LocalRetriever;
        let dest = dir.path().join("copy.txt");
        assert_eq!(local.fetch(&url, &dest), FetchOutcome::Saved { bytes: 4 });
    }

    #[test]
    fn test_already_present_is_a_success() {
        let mut retriever = Scripted::new(vec![FetchOutcome::AlreadyPresent { bytes: 9 }]);
        let mut pause = Recorded::default();
        let result = fetch_with_retry(
            &mut retriever,
            &mut pause,
            "file:///x/a.pdf",
            Path::new("a.pdf"),
            &RetryPolicy::default(),
        );
        assert_eq!(
            result,
            Ok(Retrieved {
                bytes: 9,
                already_present: true
            })
        );
    }

    #[test]
    fn test_success_on_first_attempt() {
        let mut retriever = Scripted::new(vec![FetchOutcome::Saved { bytes: 12 }]);
        let mut pause = Recorded::default();
        let result = fetch_with_retry(
            &mut retriever,
            &mut pause,
            "http://x/a.pdf",
            Path::new("a.pdf"),
            &RetryPolicy::default(),
        );
        assert_eq!(
            result,
            Ok(Retrieved {
                bytes: 12,
                already_present: false
            })
        );
        assert!(pause.0.is_empty());
        assert_eq!(retriever.calls.len(), 1);
    }

    #[test]
    fn test_server_hint_then_default_delay() {
        let mut retriever = Scripted::new(vec![
            limited(Some(7)),
            limited(None),
            FetchOutcome::Saved { bytes: 1 },
        ]);
        let mut pause = Recorded::default();
        let result = fetch_with_retry(
            &mut retriever,
            &mut pause,
            "http://x/a",
            Path::new("a"),
            &RetryPolicy::default(),
        );
        assert_eq!(result.map(|r| r.bytes), Ok(1));
        assert_eq!(pause.0, vec![Duration::from_secs(7), Duration::from_secs(30)]);
    }

    #[test]
    fn test_fixed_wait_overrides_server_hint() {
        let policy = RetryPolicy {
            wait: Duration::from_secs(2),
            ..RetryPolicy::default()
        };
        let mut retriever = Scripted::new(vec![limited(Some(60)), FetchOutcome::Saved { bytes: 3 }]);
        let mut pause = Recorded::default();
        fetch_with_retry(&mut retriever, &mut pause, "u", Path::new("d"), &policy).unwrap();
        assert_eq!(pause.0, vec![Duration::from_secs(2)]);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let mut retriever = Scripted::new(vec![limited(Some(1)); 5]);
        let mut pause = Recorded::default();
        let err = fetch_with_retry(&mut retriever, &mut pause, "u", Path::new("d"), &policy)
            .unwrap_err();
        assert_eq!(
            err,
            RetrievalError::RateLimited {
                url: "u".to_string(),
                attempts: 3
            }
        );
        assert_eq!(retriever.calls.len(), 3);
        assert_eq!(pause.0.len(), 2);
    }

    #[test]
    fn test_terminal_failure_is_not_retried() {
        let mut retriever = Scripted::new(vec![
            FetchOutcome::Failed {
                reason: "404 Not Found".to_string(),
            },
            FetchOutcome::Saved { bytes: 1 },
        ]);
        let mut pause = Recorded::default();
        let err = fetch_with_retry(
            &mut retriever,
            &mut pause,
            "u",
            Path::new("d"),
            &RetryPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RetrievalError::Failed { ref reason, .. } if reason == "404 Not Found"));
        assert_eq!(retriever.calls.len(), 1);
    }
}
