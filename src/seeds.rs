//! Built-in seed assessments that guarantee the app is useful even without
//! external config.

use chrono::Utc;

use crate::domain::{AssessmentType, Question, QuestionKind};

fn qtype(id: &str, name: &str, category: &str, description: &str, duration_minutes: u32, count: u32) -> AssessmentType {
  AssessmentType {
    id: id.into(),
    name: name.into(),
    category: category.into(),
    description: description.into(),
    duration_minutes,
    questions_count: count,
    is_active: true,
    created_at: Utc::now(),
  }
}

fn question(
  id: &str,
  assessment_type_id: &str,
  text: &str,
  options: &[&str],
  correct: &str,
  order_index: u32,
) -> Question {
  Question {
    id: id.into(),
    assessment_type_id: assessment_type_id.into(),
    question_text: text.into(),
    kind: QuestionKind::MultipleChoice,
    options: options.iter().map(|s| s.to_string()).collect(),
    correct_answer: Some(correct.into()),
    points: 1.0,
    order_index,
    is_active: true,
  }
}

pub fn seed_assessment_types() -> Vec<AssessmentType> {
  vec![
    qtype(
      "at-psychology",
      "Psychology Personality Test",
      "Psychology",
      "Comprehensive personality assessment based on psychological principles",
      15,
      5,
    ),
    qtype(
      "at-career",
      "Career Interest Inventory",
      "Career",
      "Discover your ideal career path based on interests and aptitudes",
      20,
      5,
    ),
    qtype(
      "at-skills",
      "Technical Skills Assessment",
      "Skills",
      "Evaluate your technical and soft skills for career development",
      25,
      5,
    ),
  ]
}

pub fn seed_questions() -> Vec<Question> {
  vec![
    // Psychology
    question(
      "q-psy-1", "at-psychology",
      "How do you typically react in social situations?",
      &["Very outgoing and sociable", "Comfortable with small groups", "Prefer one-on-one interactions", "Rather be alone"],
      "Comfortable with small groups", 1,
    ),
    question(
      "q-psy-2", "at-psychology",
      "When facing challenges, you usually:",
      &["Plan carefully before acting", "Jump right in and adapt", "Seek advice from others", "Avoid if possible"],
      "Plan carefully before acting", 2,
    ),
    question(
      "q-psy-3", "at-psychology",
      "How important is routine in your daily life?",
      &["Very important - I stick to schedules", "Somewhat important", "Flexible but like some structure", "Prefer spontaneity"],
      "Flexible but like some structure", 3,
    ),
    question(
      "q-psy-4", "at-psychology",
      "When making decisions, you rely more on:",
      &["Logic and facts", "Intuition and feelings", "Past experiences", "Others' opinions"],
      "Logic and facts", 4,
    ),
    question(
      "q-psy-5", "at-psychology",
      "Your ideal work environment would be:",
      &["Structured and predictable", "Dynamic and changing", "Collaborative team setting", "Independent and quiet"],
      "Collaborative team setting", 5,
    ),
    // Career
    question(
      "q-car-1", "at-career",
      "Which activity interests you most?",
      &["Solving technical problems", "Helping and teaching others", "Creating art or designs", "Analyzing data and trends"],
      "Solving technical problems", 1,
    ),
    question(
      "q-car-2", "at-career",
      "Your preferred work setting is:",
      &["Office environment", "Outdoor/field work", "Remote/flexible", "Laboratory/research facility"],
      "Office environment", 2,
    ),
    question(
      "q-car-3", "at-career",
      "What motivates you most in a job?",
      &["High salary and benefits", "Work-life balance", "Creative freedom", "Career advancement opportunities"],
      "Career advancement opportunities", 3,
    ),
    question(
      "q-car-4", "at-career",
      "Which skill do you consider your strongest?",
      &["Technical/analytical skills", "Communication skills", "Creative thinking", "Leadership and management"],
      "Technical/analytical skills", 4,
    ),
    question(
      "q-car-5", "at-career",
      "Your long-term career goal is:",
      &["Executive leadership", "Technical expertise", "Entrepreneurship", "Work-life balance"],
      "Technical expertise", 5,
    ),
    // Skills
    question(
      "q-skl-1", "at-skills",
      "How comfortable are you with learning new technologies?",
      &["Very uncomfortable", "Somewhat uncomfortable", "Neutral", "Comfortable", "Very comfortable"],
      "Comfortable", 1,
    ),
    question(
      "q-skl-2", "at-skills",
      "When working on projects, you prefer:",
      &["Working independently", "Collaborating with a small team", "Leading a team", "Following clear instructions"],
      "Collaborating with a small team", 2,
    ),
    question(
      "q-skl-3", "at-skills",
      "How do you handle tight deadlines?",
      &["Get stressed and anxious", "Work better under pressure", "Plan ahead to avoid last-minute work", "Delegate tasks to others"],
      "Plan ahead to avoid last-minute work", 3,
    ),
    question(
      "q-skl-4", "at-skills",
      "Your approach to problem-solving is:",
      &["Methodical and step-by-step", "Creative and out-of-the-box", "Collaborative and discussion-based", "Trial and error"],
      "Methodical and step-by-step", 4,
    ),
    question(
      "q-skl-5", "at-skills",
      "How important is continuous learning for your career?",
      &["Not important", "Somewhat important", "Important", "Very important", "Essential"],
      "Very important", 5,
    ),
  ]
}
