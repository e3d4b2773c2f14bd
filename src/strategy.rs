//! Question strategy planning: pick 2-3 question types at random and
//! partition the requested total into contiguous numbered ranges.
//!
//! Pure over its inputs plus the injected RNG, so tests drive it with a
//! seeded `StdRng`.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::domain::TaskPlan;
use crate::question_types::{all_keys, type_info};

/// Plan the distribution of `total_questions` across question types.
///
/// When `num_types` is None, 2 or 3 is chosen at random; an explicit value
/// is clamped into [2, 3]. Types are drawn without replacement in random
/// order; that selection order is the task order. Even distribution with
/// the remainder going to the earliest tasks, then per-type bound clamping,
/// then contiguous numbering. If clamping left the sum off-target, the
/// signed difference lands on the LAST task; when that pushes it outside
/// its own bounds the task is flagged `out_of_bounds` rather than silently
/// accepted.
pub fn plan_question_strategy<R: Rng + ?Sized>(
  total_questions: usize,
  num_types: Option<usize>,
  rng: &mut R,
) -> Vec<TaskPlan> {
  let num_types = num_types.unwrap_or_else(|| rng.gen_range(2..=3)).clamp(2, 3);

  let mut pool = all_keys();
  pool.shuffle(rng);
  let selected = &pool[..num_types];

  let base_count = total_questions / num_types;
  let remainder = total_questions % num_types;

  let mut tasks = Vec::with_capacity(num_types);
  let mut question_number = 1usize;

  for (i, &key) in selected.iter().enumerate() {
    let raw = base_count + usize::from(i < remainder);

    let info = type_info(key);
    let count = raw.clamp(info.min_questions, info.max_questions);

    tasks.push(TaskPlan {
      type_key: key,
      type_name: info.name.to_string(),
      question_count: count,
      start_number: question_number,
      out_of_bounds: false,
    });
    question_number += count;
  }

  // Rebalance: the clamp above can leave the sum off-target. The signed
  // difference goes to the last task unconditionally (documented behavior);
  // a resulting bound violation is surfaced, not hidden.
  let actual_total: usize = tasks.iter().map(|t| t.question_count).sum();
  if actual_total != total_questions {
    if let Some(last) = tasks.last_mut() {
      let adjusted =
        (last.question_count as i64 + total_questions as i64 - actual_total as i64).max(0) as usize;
      last.question_count = adjusted;

      let info = type_info(last.type_key);
      if adjusted < info.min_questions || adjusted > info.max_questions {
        last.out_of_bounds = true;
        warn!(
          target: "exam",
          task = %last.type_name,
          count = adjusted,
          min = info.min_questions,
          max = info.max_questions,
          "Rebalanced task count falls outside its type bounds"
        );
      }
    }

    // Renumber from scratch so start numbers stay contiguous.
    let mut n = 1usize;
    for t in tasks.iter_mut() {
      t.start_number = n;
      n += t.question_count;
    }
  }

  tasks
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn assert_contiguous(tasks: &[TaskPlan], total: usize) {
    let mut expected_start = 1usize;
    for t in tasks {
      assert_eq!(t.start_number, expected_start, "start numbers must be contiguous");
      expected_start += t.question_count;
    }
    assert_eq!(expected_start - 1, total, "counts must sum to the requested total");
  }

  #[test]
  fn totals_sum_exactly_for_standard_range() {
    for total in 12..=15usize {
      for num_types in [2usize, 3] {
        for seed in 0..50u64 {
          let mut rng = StdRng::seed_from_u64(seed);
          let tasks = plan_question_strategy(total, Some(num_types), &mut rng);
          assert_eq!(tasks.len(), num_types);
          assert_contiguous(&tasks, total);
        }
      }
    }
  }

  #[test]
  fn unspecified_num_types_stays_in_two_to_three() {
    for seed in 0..30u64 {
      let mut rng = StdRng::seed_from_u64(seed);
      let tasks = plan_question_strategy(14, None, &mut rng);
      assert!(tasks.len() == 2 || tasks.len() == 3);
      assert_contiguous(&tasks, 14);
    }
  }

  #[test]
  fn explicit_num_types_is_clamped() {
    let mut rng = StdRng::seed_from_u64(7);
    assert_eq!(plan_question_strategy(14, Some(1), &mut rng).len(), 2);
    let mut rng = StdRng::seed_from_u64(7);
    assert_eq!(plan_question_strategy(14, Some(9), &mut rng).len(), 3);
  }

  #[test]
  fn selected_types_are_distinct() {
    for seed in 0..40u64 {
      let mut rng = StdRng::seed_from_u64(seed);
      let tasks = plan_question_strategy(15, Some(3), &mut rng);
      assert_ne!(tasks[0].type_key, tasks[1].type_key);
      assert_ne!(tasks[1].type_key, tasks[2].type_key);
      assert_ne!(tasks[0].type_key, tasks[2].type_key);
    }
  }

  #[test]
  fn fourteen_over_two_types_covers_one_to_fourteen() {
    // 14 over 2 types starts as 7/7; whatever clamping does, the rebalance
    // must restore the total and the ranges must tile [1, 14].
    for seed in 0..20u64 {
      let mut rng = StdRng::seed_from_u64(seed);
      let tasks = plan_question_strategy(14, Some(2), &mut rng);
      assert_eq!(tasks[0].start_number, 1);
      assert_eq!(tasks[1].start_number, tasks[0].question_count + 1);
      assert_eq!(tasks[0].question_count + tasks[1].question_count, 14);
      assert_eq!(tasks[1].end_number(), 14);
    }
  }

  #[test]
  fn rebalance_out_of_bounds_is_flagged() {
    // With 2 types and 15 questions, any pairing of types capped at 6+6
    // forces the last task past its max; the flag must be set then.
    let mut saw_flagged = false;
    for seed in 0..200u64 {
      let mut rng = StdRng::seed_from_u64(seed);
      let tasks = plan_question_strategy(15, Some(2), &mut rng);
      assert_contiguous(&tasks, 15);
      let last = tasks.last().unwrap();
      let info = crate::question_types::type_info(last.type_key);
      if last.question_count > info.max_questions || last.question_count < info.min_questions {
        assert!(last.out_of_bounds, "bound violation must be surfaced");
        saw_flagged = true;
      } else {
        assert!(!last.out_of_bounds);
      }
    }
    assert!(saw_flagged, "expected at least one seed to trigger the rebalance flag");
  }
}
