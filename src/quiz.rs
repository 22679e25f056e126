// Quiz question typing, answer validation and scoring.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::Lesson;

pub const DEFAULT_POINTS: u32 = 10;

fn default_points() -> u32 {
    DEFAULT_POINTS
}

/// One authored question, as stored in `lessons.quiz_questions`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub id: i64,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default = "default_points")]
    pub points: u32,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuizError {
    #[error("This lesson is not a quiz")]
    NotAQuiz,
    #[error("Quiz has no questions")]
    NoQuestions,
    #[error("unknown question id '{0}'")]
    UnknownQuestion(String),
    #[error("answer for question {question} must be a non-negative option index")]
    MalformedAnswer { question: i64 },
    #[error("option {index} is out of range for question {question} ({options} options)")]
    OptionOutOfRange {
        question: i64,
        index: usize,
        options: usize,
    },
    #[error("question {question} is answered more than once")]
    DuplicateAnswer { question: i64 },
    #[error("question {question} has no options")]
    NoOptions { question: i64 },
    #[error("quiz point total exceeds {}", i32::MAX)]
    PointsOverflow,
}

impl QuizError {
    /// Lesson-shape problems, as opposed to a bad submission body.
    pub fn is_quiz_state(&self) -> bool {
        matches!(
            self,
            QuizError::NotAQuiz
                | QuizError::NoQuestions
                | QuizError::NoOptions { .. }
                | QuizError::PointsOverflow
        )
    }
}

/// Validated answers: question id -> selected option index.
pub type QuizAnswers = BTreeMap<i64, usize>;

#[derive(Debug, Clone, PartialEq)]
pub struct QuizScore {
    pub points_earned: i32,
    pub points_possible: i32,
    pub score: f64,
    pub passed: bool,
    pub correct_answers: BTreeMap<String, usize>,
}

/// Check authored questions: every question offers options and the point
/// total fits the attempt columns. Returns the total.
pub fn validate_questions(questions: &[QuizQuestion]) -> Result<i32, QuizError> {
    let mut total: i32 = 0;
    for q in questions {
        if q.options.is_empty() {
            return Err(QuizError::NoOptions { question: q.id });
        }
        total = i32::try_from(q.points)
            .ok()
            .and_then(|points| total.checked_add(points))
            .ok_or(QuizError::PointsOverflow)?;
    }
    Ok(total)
}

pub fn ensure_gradable(lesson: &Lesson) -> Result<(), QuizError> {
    if !lesson.is_quiz() {
        return Err(QuizError::NotAQuiz);
    }
    if lesson.quiz_questions.is_empty() {
        return Err(QuizError::NoQuestions);
    }
    validate_questions(&lesson.quiz_questions)?;
    Ok(())
}

/// Turn the raw JSON answer map into typed answers.
///
/// Keys must name an authored question; values must be an option index that
/// exists for that question. Questions left unanswered are simply scored as
/// wrong.
pub fn parse_answers(
    questions: &[QuizQuestion],
    raw: &BTreeMap<String, serde_json::Value>,
) -> Result<QuizAnswers, QuizError> {
    let mut answers = QuizAnswers::new();
    for (key, value) in raw {
        let question = key
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|id| questions.iter().find(|q| q.id == id))
            .ok_or_else(|| QuizError::UnknownQuestion(key.clone()))?;

        let index = value
            .as_u64()
            .map(|v| v as usize)
            .ok_or(QuizError::MalformedAnswer {
                question: question.id,
            })?;

        if index >= question.options.len() {
            return Err(QuizError::OptionOutOfRange {
                question: question.id,
                index,
                options: question.options.len(),
            });
        }
        if answers.insert(question.id, index).is_some() {
            return Err(QuizError::DuplicateAnswer {
                question: question.id,
            });
        }
    }
    Ok(answers)
}

/// Score answers against the authored questions, in authored order.
///
/// Fails with [`QuizError::PointsOverflow`] when the point total does not fit
/// in an `i32`.
pub fn grade(
    questions: &[QuizQuestion],
    answers: &QuizAnswers,
    passing_score: i32,
) -> Result<QuizScore, QuizError> {
    let points_possible = validate_questions(questions)?;
    let mut points_earned: i32 = 0;
    let mut correct_answers = BTreeMap::new();

    for q in questions {
        correct_answers.insert(q.id.to_string(), q.correct_answer);
        if answers.get(&q.id) == Some(&q.correct_answer) {
            points_earned = i32::try_from(q.points)
                .ok()
                .and_then(|points| points_earned.checked_add(points))
                .ok_or(QuizError::PointsOverflow)?;
        }
    }

    let score = if points_possible > 0 {
        f64::from(points_earned) / f64::from(points_possible) * 100.0
    } else {
        0.0
    };

    Ok(QuizScore {
        points_earned,
        points_possible,
        score,
        passed: score >= f64::from(passing_score),
        correct_answers,
    })
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn q(id: i64, correct: usize, points: u32) -> QuizQuestion {
        QuizQuestion {
            id,
            question: format!("Q{id}"),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer: correct,
            points,
        }
    }

    fn raw(v: serde_json::Value) -> BTreeMap<String, serde_json::Value> {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn points_default_to_ten_when_missing() {
        let parsed: QuizQuestion =
            serde_json::from_value(json!({"id": 1, "question": "?", "options": ["x", "y"], "correct_answer": 1}))
                .unwrap();
        assert_eq!(parsed.points, 10);
    }

    #[test]
    fn weighted_scoring() {
        let questions = vec![q(1, 0, 10), q(2, 2, 30)];
        let answers = parse_answers(&questions, &raw(json!({"1": 1, "2": 2}))).unwrap();
        let s = grade(&questions, &answers, 70).unwrap();
        assert_eq!(s.points_earned, 30);
        assert_eq!(s.points_possible, 40);
        assert!((s.score - 75.0).abs() < 1e-9);
        assert!(s.passed);
        assert_eq!(s.correct_answers.get("2"), Some(&2));
    }

    #[test]
    fn pass_threshold_is_inclusive() {
        let questions = vec![q(1, 0, 7), q(2, 0, 3)];
        let answers = parse_answers(&questions, &raw(json!({"1": 0}))).unwrap();
        let s = grade(&questions, &answers, 70).unwrap();
        assert!((s.score - 70.0).abs() < 1e-9);
        assert!(s.passed);
    }

    #[test]
    fn zero_point_quiz_scores_zero() {
        let questions = vec![q(1, 0, 0)];
        let answers = parse_answers(&questions, &raw(json!({"1": 0}))).unwrap();
        let s = grade(&questions, &answers, 0).unwrap();
        assert_eq!(s.score, 0.0);
        assert!(s.passed);
    }

    #[test]
    fn unanswered_questions_count_as_wrong() {
        let questions = vec![q(1, 0, 10), q(2, 1, 10)];
        let s = grade(&questions, &QuizAnswers::new(), 50).unwrap();
        assert_eq!(s.points_earned, 0);
        assert_eq!(s.points_possible, 20);
        assert!(!s.passed);
    }

    #[test]
    fn rejects_unknown_question_ids() {
        let questions = vec![q(1, 0, 10)];
        let err = parse_answers(&questions, &raw(json!({"9": 0}))).unwrap_err();
        assert_eq!(err, QuizError::UnknownQuestion("9".into()));
        let err = parse_answers(&questions, &raw(json!({"abc": 0}))).unwrap_err();
        assert_eq!(err, QuizError::UnknownQuestion("abc".into()));
    }

    #[test]
    fn rejects_out_of_range_and_malformed_options() {
        let questions = vec![q(1, 0, 10)];
        let err = parse_answers(&questions, &raw(json!({"1": 3}))).unwrap_err();
        assert_eq!(
            err,
            QuizError::OptionOutOfRange {
                question: 1,
                index: 3,
                options: 3
            }
        );
        let err = parse_answers(&questions, &raw(json!({"1": -1}))).unwrap_err();
        assert_eq!(err, QuizError::MalformedAnswer { question: 1 });
        let err = parse_answers(&questions, &raw(json!({"1": "b"}))).unwrap_err();
        assert_eq!(err, QuizError::MalformedAnswer { question: 1 });
    }

    #[test]
    fn oversized_point_values_are_rejected_not_wrapped() {
        let questions = vec![q(1, 0, 3_000_000_000)];
        let answers = parse_answers(&questions, &raw(json!({"1": 0}))).unwrap();
        assert_eq!(grade(&questions, &answers, 70), Err(QuizError::PointsOverflow));

        let questions = vec![q(1, 0, 2_000_000_000), q(2, 0, 2_000_000_000)];
        let answers = parse_answers(&questions, &raw(json!({"1": 0, "2": 0}))).unwrap();
        assert_eq!(grade(&questions, &answers, 70), Err(QuizError::PointsOverflow));
        assert_eq!(validate_questions(&questions), Err(QuizError::PointsOverflow));
        assert!(QuizError::PointsOverflow.is_quiz_state());
    }

    #[test]
    fn largest_representable_total_still_grades() {
        let questions = vec![q(1, 0, 2_000_000_000), q(2, 1, 147_483_647)];
        let answers = parse_answers(&questions, &raw(json!({"1": 0, "2": 1}))).unwrap();
        let s = grade(&questions, &answers, 70).unwrap();
        assert_eq!(s.points_possible, i32::MAX);
        assert_eq!(s.points_earned, i32::MAX);
        assert!(s.passed);
    }

    #[test]
    fn same_question_answered_twice_is_rejected() {
        let questions = vec![q(1, 0, 10)];
        let err = parse_answers(&questions, &raw(json!({" 1": 0, "1": 1}))).unwrap_err();
        assert_eq!(err, QuizError::DuplicateAnswer { question: 1 });
    }

    #[test]
    fn questions_without_options_are_rejected() {
        let mut bare = q(1, 0, 10);
        bare.options.clear();
        assert_eq!(
            validate_questions(&[bare.clone()]),
            Err(QuizError::NoOptions { question: 1 })
        );
        let err = parse_answers(&[bare], &raw(json!({"1": 5}))).unwrap_err();
        assert_eq!(
            err,
            QuizError::OptionOutOfRange {
                question: 1,
                index: 5,
                options: 0
            }
        );
    }

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(round1(66.666_666), 66.7);
        assert_eq!(round1(33.333_333), 33.3);
        assert_eq!(round1(100.0), 100.0);
    }
}
