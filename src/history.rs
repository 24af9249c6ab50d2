//! Append-only JSON-lines log of finished sessions.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::app_dirs::AppDirs;
use crate::games::GameKind;
use crate::session::SessionResult;

#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    /// Log at the platform state dir, if one can be resolved
    pub fn new() -> Option<Self> {
        AppDirs::history_path().map(Self::at)
    }

    pub fn at<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, result: &SessionResult) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(result)?;
        writeln!(file, "{line}")?;
        debug!(path = %self.path.display(), game = %result.game, "session recorded");
        Ok(())
    }

    /// Every readable session, oldest first. A missing file is an empty history.
    pub fn sessions(&self) -> io::Result<Vec<SessionResult>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut sessions = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(result) => sessions.push(result),
                Err(err) => warn!(line = number + 1, %err, "skipping unreadable history entry"),
            }
        }
        Ok(sessions)
    }

    /// Highest recorded score for `kind`
    pub fn best_score(&self, kind: GameKind) -> io::Result<Option<i64>> {
        Ok(self
            .sessions()?
            .iter()
            .filter(|r| r.game == kind)
            .map(|r| r.score)
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::player::{PlayerProfile, SyntheticPlayer};
    use crate::scheduler::ManualClock;
    use crate::session::SessionController;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tempfile::tempdir;

    fn finished(kind: GameKind, seed: u64) -> SessionResult {
        let mut controller = SessionController::seeded(seed);
        controller.start(SessionConfig::preset(kind), 0).unwrap();
        SyntheticPlayer::new(PlayerProfile::default(), ChaCha8Rng::seed_from_u64(seed))
            .unwrap()
            .play(&mut controller, &ManualClock::new())
            .unwrap();
        controller.into_result().unwrap()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::at(dir.path().join("nope.jsonl"));
        assert!(log.sessions().unwrap().is_empty());
        assert_eq!(log.best_score(GameKind::Stroop).unwrap(), None);
    }

    #[test]
    fn test_record_and_read_back() {
        let dir = tempdir().unwrap();
        let log = HistoryLog::at(dir.path().join("nested").join("history.jsonl"));
        let first = finished(GameKind::Stroop, 1);
        let second = finished(GameKind::Rsvp, 2);
        log.record(&first).unwrap();
        log.record(&second).unwrap();

        let sessions = log.sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].game, GameKind::Stroop);
        assert_eq!(sessions[0].outcomes, first.outcomes);
        assert_eq!(sessions[1].score, second.score);
        assert_eq!(log.best_score(GameKind::Stroop).unwrap(), Some(first.score));
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let log = HistoryLog::at(&path);
        log.record(&finished(GameKind::DigitSpan, 3)).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        assert_eq!(log.sessions().unwrap().len(), 1);
    }
}
