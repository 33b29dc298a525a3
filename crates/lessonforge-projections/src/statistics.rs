//! Aggregate-of-aggregates statistics projection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Running statistics over all quiz-generation streams. Singleton: there is
/// exactly one instance per projection state.
///
/// Rates and averages are pure functions of the stored counters, never
/// stored themselves, so they cannot drift from the counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizStatisticsProjection {
    /// Streams that have been initiated.
    pub total_initiated: u64,
    /// Streams that completed successfully.
    pub total_completed: u64,
    /// Streams that failed.
    pub total_failed: u64,
    /// Welford running mean of processing duration over completed streams,
    /// in milliseconds.
    pub mean_duration_ms: f64,
    /// Shortest processing duration over completed streams.
    pub min_duration_ms: Option<i64>,
    /// Longest processing duration over completed streams.
    pub max_duration_ms: Option<i64>,
    /// Questions generated across all completed streams.
    pub total_questions_generated: u64,
    /// Completions per grade level.
    pub grade_level_distribution: HashMap<String, u64>,
    /// Completions per topic.
    pub topic_counts: HashMap<String, u64>,
    /// Store time of the last applied event.
    pub last_updated: Option<DateTime<Utc>>,
}

impl QuizStatisticsProjection {
    /// Records an initiated stream.
    pub fn record_initiated(&mut self, at: DateTime<Utc>) {
        self.total_initiated += 1;
        self.last_updated = Some(at);
    }

    /// Records a completed stream, folding its duration into the running
    /// mean/min/max and its question count and descriptors into the
    /// frequency maps.
    pub fn record_completed(
        &mut self,
        duration_ms: i64,
        question_count: i32,
        topic: &str,
        grade_level: &str,
        at: DateTime<Utc>,
    ) {
        self.total_completed += 1;

        // Welford running mean: no per-stream history is retained.
        #[allow(clippy::cast_precision_loss)]
        let n = self.total_completed as f64;
        #[allow(clippy::cast_precision_loss)]
        let x = duration_ms as f64;
        self.mean_duration_ms += (x - self.mean_duration_ms) / n;

        self.min_duration_ms = Some(match self.min_duration_ms {
            Some(min) => min.min(duration_ms),
            None => duration_ms,
        });
        self.max_duration_ms = Some(match self.max_duration_ms {
            Some(max) => max.max(duration_ms),
            None => duration_ms,
        });

        self.total_questions_generated += u64::try_from(question_count.max(0)).unwrap_or(0);
        *self.topic_counts.entry(topic.to_owned()).or_insert(0) += 1;
        *self
            .grade_level_distribution
            .entry(grade_level.to_owned())
            .or_insert(0) += 1;
        self.last_updated = Some(at);
    }

    /// Records a failed stream.
    pub fn record_failed(&mut self, at: DateTime<Utc>) {
        self.total_failed += 1;
        self.last_updated = Some(at);
    }

    /// Completed / initiated; 0 when nothing has been initiated.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_initiated == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_completed as f64 / self.total_initiated as f64
        }
    }

    /// Mean questions generated per completed quiz; 0 when none completed.
    #[must_use]
    pub fn average_questions_per_quiz(&self) -> f64 {
        if self.total_completed == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_questions_generated as f64 / self.total_completed as f64
        }
    }

    /// Mean processing duration over completed streams; `None` when none
    /// completed.
    #[must_use]
    pub fn average_duration_ms(&self) -> Option<f64> {
        (self.total_completed > 0).then_some(self.mean_duration_ms)
    }

    /// The `n` most frequent topics, most frequent first; ties break
    /// alphabetically for deterministic output.
    #[must_use]
    pub fn top_topics(&self, n: usize) -> Vec<(String, u64)> {
        let mut topics: Vec<(String, u64)> = self
            .topic_counts
            .iter()
            .map(|(topic, count)| (topic.clone(), *count))
            .collect();
        topics.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        topics.truncate(n);
        topics
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_success_rate_is_zero_without_initiations() {
        // Arrange
        let stats = QuizStatisticsProjection::default();

        // Assert
        assert!((stats.success_rate() - 0.0).abs() < f64::EPSILON);
        assert!(stats.average_duration_ms().is_none());
    }

    #[test]
    fn test_record_completed_folds_duration_and_questions() {
        // Arrange
        let at = Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).unwrap();
        let mut stats = QuizStatisticsProjection::default();
        stats.record_initiated(at);
        stats.record_initiated(at);

        // Act
        stats.record_completed(2_000, 10, "Fractions", "Grade 5", at);
        stats.record_completed(4_000, 8, "Decimals", "Grade 5", at);

        // Assert
        assert_eq!(stats.total_completed, 2);
        assert!((stats.mean_duration_ms - 3_000.0).abs() < f64::EPSILON);
        assert_eq!(stats.min_duration_ms, Some(2_000));
        assert_eq!(stats.max_duration_ms, Some(4_000));
        assert_eq!(stats.total_questions_generated, 18);
        assert!((stats.average_questions_per_quiz() - 9.0).abs() < f64::EPSILON);
        assert!((stats.success_rate() - 1.0).abs() < f64::EPSILON);
        assert_eq!(stats.grade_level_distribution["Grade 5"], 2);
    }

    #[test]
    fn test_top_topics_orders_by_count_then_name() {
        // Arrange
        let at = Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).unwrap();
        let mut stats = QuizStatisticsProjection::default();
        for topic in ["Fractions", "Fractions", "Algebra", "Decimals"] {
            stats.record_completed(1_000, 5, topic, "Grade 6", at);
        }

        // Act
        let top = stats.top_topics(2);

        // Assert
        assert_eq!(
            top,
            vec![("Fractions".to_owned(), 2), ("Algebra".to_owned(), 1)]
        );
    }
}
