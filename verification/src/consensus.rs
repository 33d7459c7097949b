//! Consensus over repeated live samples.

/// Where a tally stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsensusState {
    /// More samples are needed and the budget allows them.
    Pending,
    /// `required_successes` matches were seen.
    Reached,
    /// The attempt budget ran out first.
    Exhausted,
}

/// Counts matches across at most `max_attempts` samples.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsensusTally {
    max_attempts: u32,
    required_successes: u32,
    attempts: u32,
    successes: u32,
    last_match: Option<f64>,
    best: Option<f64>,
}

impl ConsensusTally {
    pub fn new(max_attempts: u32, required_successes: u32) -> Self {
        Self {
            max_attempts,
            required_successes,
            attempts: 0,
            successes: 0,
            last_match: None,
            best: None,
        }
    }

    /// Record a sample with an acceptable face. Ignored once decided.
    pub fn record_sample(&mut self, similarity: f64, matched: bool) -> ConsensusState {
        if self.state() != ConsensusState::Pending {
            return self.state();
        }
        self.attempts += 1;
        self.best = Some(self.best.map_or(similarity, |b| b.max(similarity)));
        if matched {
            self.successes += 1;
            self.last_match = Some(similarity);
        }
        self.state()
    }

    /// Record a sample without an acceptable face.
    pub fn record_miss(&mut self) -> ConsensusState {
        if self.state() != ConsensusState::Pending {
            return self.state();
        }
        self.attempts += 1;
        self.state()
    }

    pub fn state(&self) -> ConsensusState {
        if self.successes >= self.required_successes {
            ConsensusState::Reached
        } else if self.attempts >= self.max_attempts {
            ConsensusState::Exhausted
        } else {
            ConsensusState::Pending
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn successes(&self) -> u32 {
        self.successes
    }

    pub fn required_successes(&self) -> u32 {
        self.required_successes
    }

    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }

    /// Similarity of the most recent matching sample.
    pub fn last_match_similarity(&self) -> Option<f64> {
        self.last_match
    }

    /// Highest similarity seen, matching or not.
    pub fn best_similarity(&self) -> Option<f64> {
        self.best
    }
}
