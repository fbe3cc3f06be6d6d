use crate::model::AttemptRecord;

/// Aggregate metrics over a finished session's attempt records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub total_questions: u32,
    pub total_attempts: u32,
    pub first_try_count: u32,
    /// `first_try_count / total_questions` as a whole percentage, rounded half up.
    pub first_try_percentage: u8,
}

impl SessionStats {
    /// Compute the metrics. Pure and deterministic.
    ///
    /// A question counts as a first-try success when it has exactly one attempt.
    #[must_use]
    pub fn from_attempts(records: &[AttemptRecord]) -> Self {
        let total_questions = u32::try_from(records.len()).unwrap_or(u32::MAX);
        let total_attempts = records
            .iter()
            .fold(0_u32, |sum, r| sum.saturating_add(r.attempts()));
        let first_try_count = u32::try_from(records.iter().filter(|r| r.attempts() == 1).count())
            .unwrap_or(u32::MAX);

        Self {
            total_questions,
            total_attempts,
            first_try_count,
            first_try_percentage: percentage(first_try_count, total_questions),
        }
    }
}

fn percentage(part: u32, whole: u32) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = u64::from(part.min(whole));
    let whole = u64::from(whole);
    let rounded = (part * 200 + whole) / (whole * 2);
    u8::try_from(rounded).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionId;

    fn rec(id: u64, attempts: u32) -> AttemptRecord {
        AttemptRecord::from_parts(QuestionId::new(id), attempts, attempts > 0, attempts > 1)
    }

    #[test]
    fn sums_attempts_and_counts_first_tries() {
        let stats = SessionStats::from_attempts(&[rec(1, 1), rec(2, 3), rec(3, 1)]);
        assert_eq!(stats.total_questions, 3);
        assert_eq!(stats.total_attempts, 5);
        assert_eq!(stats.first_try_count, 2);
        assert_eq!(stats.first_try_percentage, 67);
    }

    #[test]
    fn half_rounds_up() {
        let stats = SessionStats::from_attempts(&[rec(1, 1), rec(2, 2)]);
        assert_eq!(stats.first_try_percentage, 50);

        let eighths: Vec<_> = (0..8).map(|i| rec(i, if i == 0 { 1 } else { 2 })).collect();
        // 1/8 = 12.5%
        assert_eq!(SessionStats::from_attempts(&eighths).first_try_percentage, 13);
    }

    #[test]
    fn one_third_rounds_down() {
        let stats = SessionStats::from_attempts(&[rec(1, 1), rec(2, 2), rec(3, 4)]);
        assert_eq!(stats.first_try_percentage, 33);
    }

    #[test]
    fn all_first_try_is_hundred() {
        let stats = SessionStats::from_attempts(&[rec(1, 1)]);
        assert_eq!(stats.first_try_percentage, 100);
        assert_eq!(stats.total_attempts, 1);
    }

    #[test]
    fn empty_set_is_zero() {
        assert_eq!(SessionStats::from_attempts(&[]), SessionStats::default());
    }
}
