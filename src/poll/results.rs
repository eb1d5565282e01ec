use serde::{Deserialize, Serialize};

use super::session::Poll;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStats {
    pub correct_count: u32,
    pub wrong_count: u32,
    pub no_response_count: u32,
    /// Share of all registered students per option, 0-100.
    pub percentages: Vec<u32>,
}

/// A poll snapshot plus its statistics, as sent on the wire and kept in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    #[serde(flatten)]
    pub poll: Poll,
    pub stats: PollStats,
}

impl PollResult {
    /// Copy with `duration` replaced by the seconds left at `now_ms`.
    pub fn with_remaining_at(mut self, now_ms: u64) -> Self {
        self.poll.duration = self.poll.remaining_secs_at(now_ms);
        self
    }
}

/// Tally a poll against the current number of registered students.
///
/// Percentages use the whole roster as denominator, so students joining
/// mid-poll dilute numbers that were already announced.
pub fn compute(poll: &Poll, total_students: usize) -> PollResult {
    let total = total_students as u32;

    let (submitted, correct) = poll
        .responses
        .iter()
        .filter(|r| r.submitted)
        .fold((0u32, 0u32), |(submitted, correct), r| {
            let is_correct = poll.correct_index.is_some() && r.choice == poll.correct_index;
            (submitted + 1, correct + u32::from(is_correct))
        });

    let percentages = poll
        .votes
        .iter()
        .map(|&votes| percentage(votes, total))
        .collect();

    PollResult {
        poll: poll.clone(),
        stats: PollStats {
            correct_count: correct,
            wrong_count: submitted - correct,
            no_response_count: total.saturating_sub(submitted),
            percentages,
        },
    }
}

fn percentage(votes: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = (f64::from(votes) / f64::from(total) * 100.0).round() as u32;
    pct.min(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::session::Response;

    fn poll_with(votes: Vec<u32>, correct_index: Option<usize>, responses: Vec<Response>) -> Poll {
        Poll {
            question: "2+2?".to_string(),
            options: vec!["3".to_string(), "4".to_string(), "5".to_string()],
            correct_index,
            duration: 30,
            start_time: 0,
            votes,
            responses,
        }
    }

    fn response(id: &str, choice: Option<usize>, submitted: bool) -> Response {
        Response {
            student_id: id.to_string(),
            name: id.to_uppercase(),
            choice,
            submitted,
        }
    }

    #[test]
    fn test_percentages_use_roster_size() {
        let poll = poll_with(
            vec![0, 1, 0],
            Some(1),
            vec![response("a", Some(1), true)],
        );
        let result = compute(&poll, 2);
        assert_eq!(result.stats.percentages, vec![0, 50, 0]);
        assert_eq!(result.stats.correct_count, 1);
        assert_eq!(result.stats.wrong_count, 0);
        assert_eq!(result.stats.no_response_count, 1);
    }

    #[test]
    fn test_percentages_round_half_up() {
        let poll = poll_with(vec![1, 2, 0], None, vec![]);
        // 1/3 -> 33.33, 2/3 -> 66.67
        assert_eq!(compute(&poll, 3).stats.percentages, vec![33, 67, 0]);

        let poll = poll_with(vec![1, 0, 0], None, vec![]);
        // 1/8 -> 12.5
        assert_eq!(compute(&poll, 8).stats.percentages, vec![13, 0, 0]);
    }

    #[test]
    fn test_no_students_yields_zero_percentages() {
        let poll = poll_with(vec![2, 1, 0], None, vec![]);
        let result = compute(&poll, 0);
        assert_eq!(result.stats.percentages, vec![0, 0, 0]);
    }

    #[test]
    fn test_percentages_stay_within_bounds_when_roster_shrinks() {
        let poll = poll_with(vec![3, 0, 0], None, vec![]);
        let result = compute(&poll, 1);
        assert_eq!(result.stats.percentages, vec![100, 0, 0]);
    }

    #[test]
    fn test_unset_correct_index_counts_everything_wrong() {
        let poll = poll_with(
            vec![1, 1, 0],
            None,
            vec![response("a", Some(0), true), response("b", Some(1), true)],
        );
        let stats = compute(&poll, 2).stats;
        assert_eq!(stats.correct_count, 0);
        assert_eq!(stats.wrong_count, 2);
        assert_eq!(stats.no_response_count, 0);
    }

    #[test]
    fn test_unsubmitted_responses_are_not_counted() {
        let poll = poll_with(
            vec![0, 0, 0],
            Some(0),
            vec![response("a", Some(0), false)],
        );
        let stats = compute(&poll, 1).stats;
        assert_eq!(stats.correct_count, 0);
        assert_eq!(stats.wrong_count, 0);
        assert_eq!(stats.no_response_count, 1);
    }

    #[test]
    fn test_no_response_count_saturates() {
        let poll = poll_with(
            vec![1, 1, 0],
            Some(0),
            vec![response("a", Some(0), true), response("b", Some(1), true)],
        );
        assert_eq!(compute(&poll, 1).stats.no_response_count, 0);
    }

    #[test]
    fn test_result_wire_shape() {
        let poll = poll_with(vec![0, 1, 0], Some(1), vec![response("a", Some(1), true)]);
        let json = serde_json::to_value(compute(&poll, 2)).unwrap();

        assert_eq!(json["question"], "2+2?");
        assert_eq!(json["correctIndex"], 1);
        assert_eq!(json["votes"], serde_json::json!([0, 1, 0]));
        assert_eq!(json["responses"][0]["studentId"], "a");
        assert_eq!(json["stats"]["noResponseCount"], 1);
        assert_eq!(json["stats"]["percentages"], serde_json::json!([0, 50, 0]));
    }

    #[test]
    fn test_with_remaining_replaces_duration() {
        let poll = poll_with(vec![0, 0, 0], None, vec![]);
        let result = compute(&poll, 0).with_remaining_at(12_500);
        assert_eq!(result.poll.duration, 18);
    }
}
