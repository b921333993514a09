//! Deterministic template generation for every activity type.
//!
//! Used whenever the external generator is disabled, fails, times out or
//! returns content that does not validate. All randomness (including ids)
//! is drawn from the caller's RNG, so a seeded RNG reproduces the output
//! byte for byte.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Builder;

use crate::domain::{clamp_difficulty, Activity, ActivitySource, ActivityType, QuestionData};

const COUNTING_CONTEXTS: &[&str] = &["apples", "stars", "balloons", "teddy bears", "cookies"];
const ADDITION_CONTEXTS: &[&str] = &["apples", "ducks", "blocks", "crayons", "cupcakes"];

/// Ordered by how early children usually meet them.
const SHAPES: &[&str] = &["circle", "square", "triangle", "rectangle", "star", "heart", "diamond"];

const PATTERN_FAMILIES: &[(&str, &[&str])] = &[
  ("colors", &["red", "blue", "green", "yellow", "purple"]),
  ("shapes", &["circle", "square", "triangle"]),
  ("animals", &["cat", "dog"]),
];
/// Padding when a family cannot supply three distractors.
const FILLER_TOKENS: &[&str] = &["sun", "moon", "cloud"];
const MAX_PATTERN_LEN: usize = 10;
const PATTERN_DISTRACTORS: usize = 3;
const MAX_OPTIONS: usize = 4;

pub fn counting_bound(difficulty: u8) -> u32 {
  (3 + difficulty as u32 * 2).min(15)
}

/// Upper bound for number recognition targets and addition sums.
pub fn number_bound(difficulty: u8) -> u32 {
  (5 + difficulty as u32 * 2).min(20)
}

pub fn active_shape_count(difficulty: u8) -> usize {
  SHAPES.len().min(2 + difficulty as usize).max(3)
}

/// Build exactly `count` activities of `activity_type` without any external dependency.
pub fn generate<R: Rng + ?Sized>(
  activity_type: ActivityType,
  difficulty: u8,
  age_group: &str,
  count: usize,
  now: DateTime<Utc>,
  rng: &mut R,
) -> Vec<Activity> {
  let difficulty = clamp_difficulty(difficulty as i64);
  (0..count)
    .map(|_| {
      let (question_text, question_data, correct_answer, hints) = match activity_type {
        ActivityType::Counting => counting(difficulty, rng),
        ActivityType::NumberRecognition => number_recognition(difficulty, rng),
        ActivityType::Shapes => shapes(difficulty, rng),
        ActivityType::SimpleAddition => simple_addition(difficulty, rng),
        ActivityType::Patterns => patterns(difficulty, rng),
      };
      Activity {
        id: Builder::from_random_bytes(rng.gen()).into_uuid().to_string(),
        activity_type,
        question_text,
        question_data,
        correct_answer,
        difficulty_level: difficulty,
        age_group: age_group.to_string(),
        hints,
        source: ActivitySource::Template,
        created_at: now,
      }
    })
    .collect()
}

type Parts = (String, QuestionData, String, Vec<String>);

fn counting<R: Rng + ?Sized>(difficulty: u8, rng: &mut R) -> Parts {
  let context = pick(COUNTING_CONTEXTS, rng);
  let count = rng.gen_range(1..=counting_bound(difficulty));
  (
    format!("Count the {}! How many are there?", context),
    QuestionData::Counting { count, context: context.to_string() },
    count.to_string(),
    vec![
      format!("Try pointing to each {} as you count!", context),
      "Count slowly and carefully!".to_string(),
    ],
  )
}

fn number_recognition<R: Rng + ?Sized>(difficulty: u8, rng: &mut R) -> Parts {
  let number = rng.gen_range(1..=number_bound(difficulty));
  let options = number_options(number);
  (
    format!("Can you find the number {}?", number),
    QuestionData::NumberRecognition { number, options },
    number.to_string(),
    vec![
      "Look at each number carefully!".to_string(),
      format!("Count up from 1 until you reach {}.", number),
    ],
  )
}

/// Target plus three close neighbours, never negative, ascending.
pub fn number_options(number: u32) -> Vec<u32> {
  let n = number as i64;
  let mut options = vec![number];
  for candidate in [n + 1, n - 1, n + 2, n - 2, n + 3, n + 4] {
    if options.len() == MAX_OPTIONS {
      break;
    }
    if candidate >= 0 && !options.contains(&(candidate as u32)) {
      options.push(candidate as u32);
    }
  }
  options.sort_unstable();
  options
}

fn shapes<R: Rng + ?Sized>(difficulty: u8, rng: &mut R) -> Parts {
  let active = &SHAPES[..active_shape_count(difficulty)];
  let shape = pick(active, rng);
  let mut options: Vec<String> =
    active.iter().filter(|s| **s != shape).map(|s| s.to_string()).collect();
  options.shuffle(rng);
  options.truncate(MAX_OPTIONS - 1);
  options.push(shape.to_string());
  options.shuffle(rng);
  (
    format!("Find the {}!", shape),
    QuestionData::Shapes { shape: shape.to_string(), options },
    shape.to_string(),
    vec![
      shape_hint(shape).to_string(),
      "Look for the special shape!".to_string(),
    ],
  )
}

fn shape_hint(shape: &str) -> &'static str {
  match shape {
    "circle" => "A circle is round like a ball!",
    "square" => "A square has 4 sides that are all the same!",
    "triangle" => "A triangle has 3 sides and 3 corners!",
    "rectangle" => "A rectangle looks like a door!",
    "star" => "A star has pointy tips like in the night sky!",
    "heart" => "A heart is the shape of love!",
    _ => "A diamond looks like a kite!",
  }
}

fn simple_addition<R: Rng + ?Sized>(difficulty: u8, rng: &mut R) -> Parts {
  let bound = number_bound(difficulty);
  let context = pick(ADDITION_CONTEXTS, rng);
  let a = rng.gen_range(1..bound);
  let b = rng.gen_range(1..=bound - a);
  let sum = a + b;
  (
    format!("You have {} {} and get {} more. How many {} do you have now?", a, context, b, context),
    QuestionData::Addition { addends: [a, b], context: context.to_string() },
    sum.to_string(),
    vec![
      format!("Start at {} and count up {} more!", a, b),
      "Use your fingers to help!".to_string(),
    ],
  )
}

fn patterns<R: Rng + ?Sized>(difficulty: u8, rng: &mut R) -> Parts {
  let (family, members) = PATTERN_FAMILIES.choose(rng).copied().unwrap_or(PATTERN_FAMILIES[0]);
  let unit_len = (2 + (difficulty as usize - 1) / 2).min(members.len());
  let mut shuffled = members.to_vec();
  shuffled.shuffle(rng);
  let unit = &shuffled[..unit_len];

  let total_len = (unit_len * 3).min(MAX_PATTERN_LEN);
  let full: Vec<String> = (0..total_len).map(|i| unit[i % unit_len].to_string()).collect();
  let answer = full[total_len - 1].clone();
  let shown = full[..total_len - 1].to_vec();

  let mut distractors: Vec<String> =
    members.iter().filter(|m| **m != answer).map(|m| m.to_string()).collect();
  distractors.shuffle(rng);
  distractors.truncate(PATTERN_DISTRACTORS);
  for filler in FILLER_TOKENS {
    if distractors.len() == PATTERN_DISTRACTORS {
      break;
    }
    if *filler != answer && !distractors.iter().any(|d| d == filler) {
      distractors.push(filler.to_string());
    }
  }
  let mut options = distractors;
  options.push(answer.clone());
  options.shuffle(rng);

  (
    format!("What comes next? {}, ...", shown.join(", ")),
    QuestionData::Pattern { family: family.to_string(), sequence: shown, options },
    answer,
    vec![
      format!("The first {} items repeat again and again!", unit_len),
      "Say the pattern out loud to hear what comes next!".to_string(),
    ],
  )
}

fn pick<'a, R: Rng + ?Sized>(items: &[&'a str], rng: &mut R) -> &'a str {
  items.choose(rng).copied().unwrap_or("")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::test_now;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn run(t: ActivityType, difficulty: u8, seed: u64) -> Vec<Activity> {
    let mut rng = StdRng::seed_from_u64(seed);
    generate(t, difficulty, "preschool_4-5", 6, test_now(), &mut rng)
  }

  #[test]
  fn produces_exact_count_for_every_type() {
    for t in ActivityType::ALL {
      for d in 1..=5 {
        let acts = run(t, d, 42);
        assert_eq!(acts.len(), 6);
        for a in &acts {
          assert_eq!(a.activity_type, t);
          assert_eq!(a.difficulty_level, d);
          assert!(!a.question_text.is_empty());
          assert!(!a.correct_answer.is_empty());
          assert!((1..=2).contains(&a.hints.len()));
          assert_eq!(a.source, ActivitySource::Template);
        }
      }
    }
    let mut rng = StdRng::seed_from_u64(1);
    assert!(generate(ActivityType::Shapes, 2, "x", 0, test_now(), &mut rng).is_empty());
  }

  #[test]
  fn same_seed_same_output() {
    for t in ActivityType::ALL {
      let a = serde_json::to_string(&run(t, 3, 2024)).unwrap();
      let b = serde_json::to_string(&run(t, 3, 2024)).unwrap();
      assert_eq!(a, b);
    }
    assert_ne!(run(ActivityType::Counting, 3, 1), run(ActivityType::Counting, 3, 2));
  }

  #[test]
  fn counting_respects_bound() {
    for seed in 0..50 {
      for a in run(ActivityType::Counting, 5, seed) {
        let QuestionData::Counting { count, context } = &a.question_data else { panic!() };
        assert!((1..=13).contains(count));
        assert!(COUNTING_CONTEXTS.contains(&context.as_str()));
        assert_eq!(a.correct_answer, count.to_string());
      }
    }
    assert_eq!(counting_bound(1), 5);
    assert_eq!(counting_bound(5), 13);
  }

  #[test]
  fn number_options_are_sorted_non_negative_and_contain_target() {
    assert_eq!(number_options(1), vec![0, 1, 2, 3]);
    assert_eq!(number_options(0), vec![0, 1, 2, 3]);
    assert_eq!(number_options(10), vec![9, 10, 11, 12]);
    for seed in 0..50 {
      for a in run(ActivityType::NumberRecognition, 2, seed) {
        let QuestionData::NumberRecognition { number, options } = &a.question_data else { panic!() };
        assert!(*number >= 1 && *number <= number_bound(2));
        assert_eq!(options.len(), 4);
        assert!(options.contains(number));
        assert!(options.windows(2).all(|w| w[0] < w[1]));
      }
    }
  }

  #[test]
  fn shapes_stay_in_active_subset() {
    assert_eq!(active_shape_count(1), 3);
    assert_eq!(active_shape_count(3), 5);
    assert_eq!(active_shape_count(5), 7);
    for seed in 0..50 {
      for a in run(ActivityType::Shapes, 1, seed) {
        let QuestionData::Shapes { shape, options } = &a.question_data else { panic!() };
        assert!(SHAPES[..3].contains(&shape.as_str()));
        assert_eq!(options.len(), 3);
        assert!(options.contains(shape));
      }
      for a in run(ActivityType::Shapes, 5, seed) {
        let QuestionData::Shapes { options, shape } = &a.question_data else { panic!() };
        assert_eq!(options.len(), 4);
        assert!(options.contains(shape));
      }
    }
  }

  #[test]
  fn addition_sum_is_bounded() {
    for d in 1..=5u8 {
      for seed in 0..40 {
        for a in run(ActivityType::SimpleAddition, d, seed) {
          let QuestionData::Addition { addends, .. } = &a.question_data else { panic!() };
          let sum = addends[0] + addends[1];
          assert!(addends[0] >= 1 && addends[1] >= 1);
          assert!(sum <= number_bound(d));
          assert_eq!(a.correct_answer, sum.to_string());
        }
      }
    }
  }

  #[test]
  fn patterns_hide_the_last_element() {
    for d in 1..=5u8 {
      for seed in 0..40 {
        for a in run(ActivityType::Patterns, d, seed) {
          let QuestionData::Pattern { family, sequence, options } = &a.question_data else { panic!() };
          assert!(sequence.len() + 1 <= MAX_PATTERN_LEN);
          assert_eq!(options.len(), 4);
          assert!(options.contains(&a.correct_answer));
          let unique: std::collections::HashSet<&String> = options.iter().collect();
          assert_eq!(unique.len(), 4);
          let members = PATTERN_FAMILIES.iter().find(|(n, _)| *n == family.as_str()).unwrap().1;
          assert!(members.contains(&a.correct_answer.as_str()));
        }
      }
    }
  }

  #[test]
  fn small_family_is_padded_with_fillers() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut seen_animals = false;
    for _ in 0..100 {
      let (_, data, answer, _) = patterns(1, &mut rng);
      let QuestionData::Pattern { family, options, .. } = data else { panic!() };
      if family == "animals" {
        seen_animals = true;
        let fillers = options.iter().filter(|o| FILLER_TOKENS.contains(&o.as_str())).count();
        assert_eq!(fillers, 2);
        assert!(options.contains(&answer));
      }
    }
    assert!(seen_animals);
  }
}
