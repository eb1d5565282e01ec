use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;

use super::results::{self, PollResult};
use super::roster::ConnectionId;
use crate::error::{PollError, Result};

/// Monotonic counter bumped on every poll creation; stale timers compare against it.
pub type Generation = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndTrigger {
    Timeout,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub student_id: ConnectionId,
    pub name: String,
    pub choice: Option<usize>,
    pub submitted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: Option<usize>,
    /// Configured length in seconds; 0 means the poll only ends manually.
    pub duration: u64,
    /// Unix epoch milliseconds.
    pub start_time: u64,
    pub votes: Vec<u32>,
    pub responses: Vec<Response>,
}

impl Poll {
    pub fn new(
        question: String,
        options: Vec<String>,
        correct_index: Option<usize>,
        duration: u64,
        start_time: u64,
    ) -> Result<Self> {
        if options.len() < 2 {
            return Err(PollError::invalid_poll(format!(
                "at least two options required, got {}",
                options.len()
            )));
        }
        if let Some(index) = correct_index {
            if index >= options.len() {
                return Err(PollError::invalid_poll(format!(
                    "correct index {} out of range",
                    index
                )));
            }
        }

        Ok(Self {
            question,
            votes: vec![0; options.len()],
            options,
            correct_index,
            duration,
            start_time,
            responses: Vec::new(),
        })
    }

    /// `max(duration - floor(elapsed_secs), 0)` at `now_ms`.
    pub fn remaining_secs_at(&self, now_ms: u64) -> u64 {
        let elapsed = now_ms.saturating_sub(self.start_time) / 1000;
        self.duration.saturating_sub(elapsed)
    }

    pub fn response(&self, student_id: &str) -> Option<&Response> {
        self.responses.iter().find(|r| r.student_id == student_id)
    }

    fn response_mut(&mut self, student_id: &str) -> Option<&mut Response> {
        self.responses.iter_mut().find(|r| r.student_id == student_id)
    }

    fn tally(&mut self, choice: Option<usize>) {
        if let Some(slot) = choice.and_then(|c| self.votes.get_mut(c)) {
            *slot += 1;
        }
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

struct ActivePoll {
    poll: Poll,
    generation: Generation,
    auto_end: Option<AbortHandle>,
}

/// Lifecycle of the single active poll plus the history of finished ones.
#[derive(Default)]
pub struct PollSession {
    active: Option<ActivePoll>,
    history: Vec<PollResult>,
    generation: Generation,
}

impl PollSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn current(&self) -> Option<&Poll> {
        self.active.as_ref().map(|a| &a.poll)
    }

    pub fn current_generation(&self) -> Option<Generation> {
        self.active.as_ref().map(|a| a.generation)
    }

    pub fn history(&self) -> &[PollResult] {
        &self.history
    }

    pub fn create(
        &mut self,
        question: String,
        options: Vec<String>,
        correct_index: Option<usize>,
        duration: u64,
    ) -> Result<(&Poll, Generation)> {
        self.create_at(question, options, correct_index, duration, now_millis())
    }

    /// Start a poll. Rejected while another one is active.
    pub fn create_at(
        &mut self,
        question: String,
        options: Vec<String>,
        correct_index: Option<usize>,
        duration: u64,
        start_time: u64,
    ) -> Result<(&Poll, Generation)> {
        if self.active.is_some() {
            return Err(PollError::PollAlreadyActive);
        }
        let poll = Poll::new(question, options, correct_index, duration, start_time)?;

        self.generation += 1;
        let generation = self.generation;
        tracing::info!(
            generation,
            question = %poll.question,
            options = poll.options.len(),
            duration_secs = duration,
            "Poll started"
        );

        let active = self.active.insert(ActivePoll {
            poll,
            generation,
            auto_end: None,
        });
        Ok((&active.poll, generation))
    }

    /// Attach the auto-end task of `generation`. A handle for a poll that is
    /// no longer active is aborted straight away.
    pub fn set_auto_end(&mut self, generation: Generation, handle: AbortHandle) {
        match self.active.as_mut() {
            Some(active) if active.generation == generation => {
                if let Some(previous) = active.auto_end.replace(handle) {
                    previous.abort();
                }
            }
            _ => handle.abort(),
        }
    }

    /// Record or change a student's pending choice.
    ///
    /// Changing the choice after submitting is accepted but the tally keeps
    /// the vote that was counted at submit time.
    pub fn record_choice(&mut self, student_id: &str, name: &str, choice: usize) -> Result<&Poll> {
        let active = self.active.as_mut().ok_or(PollError::NoActivePoll)?;
        let poll = &mut active.poll;
        if choice >= poll.options.len() {
            return Err(PollError::InvalidChoice {
                choice,
                options: poll.options.len(),
            });
        }

        match poll.response_mut(student_id) {
            Some(response) => {
                if response.submitted {
                    tracing::debug!(student_id = %student_id, choice, "Choice changed after submit");
                }
                response.choice = Some(choice);
            }
            None => poll.responses.push(Response {
                student_id: student_id.to_string(),
                name: name.to_string(),
                choice: Some(choice),
                submitted: false,
            }),
        }
        Ok(&active.poll)
    }

    /// Move a reconnected student's response over to their new connection.
    pub fn rebind_student(&mut self, previous_id: &str, new_id: &str) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.poll.response(new_id).is_some() {
            return;
        }
        if let Some(response) = active.poll.response_mut(previous_id) {
            response.student_id = new_id.to_string();
            tracing::debug!(previous_id = %previous_id, student_id = %new_id, "Response rebound");
        }
    }

    /// Lock in a student's choice. Counts at most once per student.
    pub fn submit(&mut self, student_id: &str) -> Result<&Poll> {
        let active = self.active.as_mut().ok_or(PollError::NoActivePoll)?;
        let poll = &mut active.poll;

        let response = poll
            .response_mut(student_id)
            .ok_or_else(|| PollError::UnknownStudent(student_id.to_string()))?;
        if response.submitted {
            return Err(PollError::AlreadySubmitted(student_id.to_string()));
        }
        response.submitted = true;
        let choice = response.choice;
        poll.tally(choice);

        tracing::debug!(student_id = %student_id, choice = ?choice, "Vote submitted");
        Ok(&active.poll)
    }

    /// Finish the active poll and archive its result.
    pub fn end(&mut self, trigger: EndTrigger, total_students: usize) -> Result<PollResult> {
        let mut active = self.active.take().ok_or(PollError::NoActivePoll)?;
        if let Some(handle) = active.auto_end.take() {
            // The timeout path runs inside the task itself.
            if trigger == EndTrigger::Manual {
                handle.abort();
            }
        }

        let poll = &mut active.poll;
        let mut auto_submitted = 0;
        for index in 0..poll.responses.len() {
            let response = &mut poll.responses[index];
            if !response.submitted && response.choice.is_some() {
                response.submitted = true;
                let choice = response.choice;
                poll.tally(choice);
                auto_submitted += 1;
            }
        }

        let result = results::compute(poll, total_students);
        self.history.push(result.clone());

        tracing::info!(
            generation = active.generation,
            trigger = ?trigger,
            auto_submitted,
            correct = result.stats.correct_count,
            wrong = result.stats.wrong_count,
            no_response = result.stats.no_response_count,
            "Poll ended"
        );
        Ok(result)
    }

    /// Timer entry point: only ends the poll the timer was scheduled for.
    pub fn end_if_current(&mut self, generation: Generation, total_students: usize) -> Result<PollResult> {
        match self.current_generation() {
            Some(current) if current == generation => self.end(EndTrigger::Timeout, total_students),
            _ => Err(PollError::NoActivePoll),
        }
    }
}
