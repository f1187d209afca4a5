use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};

use orga_rust::{
    compute_cascade, compute_critical_path, DateField, Dependency, DependencyType,
    EngineConfig, GraphError, ScheduleGraph, SchedulingType, Task,
};

fn day(d: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap() + Duration::days(d)
}

fn name(i: usize) -> String {
    format!("task_{}", i)
}

#[derive(Debug, Clone)]
struct Plan {
    tasks: Vec<Task>,
    deps: Vec<Dependency>,
}

impl Plan {
    fn graph(&self) -> ScheduleGraph {
        ScheduleGraph::from_tasks(&self.tasks, &self.deps).unwrap()
    }
}

// Task N may only depend on tasks 0..N-1, so every plan is acyclic. Each
// task starts no earlier than its predecessors allow, so the schedule
// satisfies every FS constraint before any edit.
fn plan_strategy(max_tasks: usize) -> impl Strategy<Value = Plan> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let shapes = proptest::collection::vec((0i64..20, 0i64..6), num_tasks);
        let raw_deps = proptest::collection::vec(
            proptest::collection::vec((any::<usize>(), 0i64..3), 0..3),
            num_tasks,
        );
        (shapes, raw_deps).prop_map(|(shapes, raw_deps)| {
            let mut tasks: Vec<Task> = Vec::new();
            let mut deps = Vec::new();
            for (i, ((offset, duration), potential)) in
                shapes.into_iter().zip(raw_deps).enumerate()
            {
                let mut preds: BTreeMap<usize, i64> = BTreeMap::new();
                if i > 0 {
                    for (p, lag) in potential {
                        preds.insert(p % i, lag);
                    }
                }
                let mut start = day(offset);
                for (&p, &lag) in &preds {
                    let ready = tasks[p].finish_or_start() + Duration::days(lag);
                    start = start.max(ready);
                    deps.push(Dependency::new(
                        name(p),
                        name(i),
                        DependencyType::FinishToStart,
                        lag,
                    ));
                }
                tasks.push(Task::new(name(i), start, Some(start + Duration::days(duration))));
            }
            Plan { tasks, deps }
        })
    })
}

fn field_of(flag: bool) -> DateField {
    if flag {
        DateField::StartDate
    } else {
        DateField::EndDate
    }
}

proptest! {
    #[test]
    fn test_graph_stays_acyclic_under_insertions(
        n in 2usize..8,
        edges in proptest::collection::vec((0usize..8, 0usize..8), 1..30),
    ) {
        let tasks: Vec<Task> = (0..n).map(|i| Task::new(name(i), day(0), Some(day(1)))).collect();
        let mut graph = ScheduleGraph::from_tasks(&tasks, &[]).unwrap();

        for (a, b) in edges {
            let (a, b) = (name(a % n), name(b % n));
            let before = graph.dependencies().len();
            match graph.add_dependency(&Dependency::fs(a.clone(), b.clone())) {
                Ok(()) => {}
                Err(GraphError::SelfDependency(_)) => prop_assert_eq!(&a, &b),
                Err(GraphError::CircularDependency(path)) => {
                    prop_assert_eq!(path.first(), Some(&b));
                    prop_assert_eq!(path.last(), Some(&b));
                    prop_assert!(path.contains(&a));
                    prop_assert_eq!(graph.dependencies().len(), before);
                }
                Err(other) => prop_assert!(false, "unexpected error {}", other),
            }

            let order = graph.topological_order();
            prop_assert_eq!(order.len(), n);
            let position: HashMap<&str, usize> =
                order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
            for dep in graph.dependencies() {
                prop_assert!(position[dep.predecessor_id.as_str()] < position[dep.successor_id.as_str()]);
            }
        }
    }

    #[test]
    fn test_zero_shift_changes_nothing(
        plan in plan_strategy(10),
        pick in any::<prop::sample::Index>(),
        start in any::<bool>(),
    ) {
        let graph = plan.graph();
        let id = name(pick.index(plan.tasks.len()));
        let outcome = compute_cascade(&graph, &id, 0, field_of(start)).unwrap();
        prop_assert!(outcome.changes.is_empty());
        prop_assert!(outcome.buffer_updates.is_empty());
    }

    #[test]
    fn test_positive_shifts_are_additive(
        plan in plan_strategy(10),
        pick in any::<prop::sample::Index>(),
        start in any::<bool>(),
        d1 in 1i64..6,
        d2 in 1i64..6,
    ) {
        let graph = plan.graph();
        let id = name(pick.index(plan.tasks.len()));
        let field = field_of(start);

        let mut stepwise = graph.clone();
        for d in [d1, d2] {
            let outcome = compute_cascade(&stepwise, &id, d, field).unwrap();
            outcome.apply_to(&mut stepwise).unwrap();
        }

        let mut at_once = graph.clone();
        let outcome = compute_cascade(&at_once, &id, d1 + d2, field).unwrap();
        outcome.apply_to(&mut at_once).unwrap();

        for task in stepwise.tasks() {
            let other = at_once.task(&task.id).unwrap();
            prop_assert_eq!(task.start_date, other.start_date, "start of {}", task.id);
            prop_assert_eq!(task.end_date, other.end_date, "end of {}", task.id);
        }
    }

    #[test]
    fn test_mixed_sign_shifts_are_additive(
        plan in plan_strategy(10),
        pick in any::<prop::sample::Index>(),
        start in any::<bool>(),
        d1 in -6i64..7,
        d2 in -6i64..7,
    ) {
        let graph = plan.graph();
        let id = name(pick.index(plan.tasks.len()));
        let field = field_of(start);

        let mut stepwise = graph.clone();
        for d in [d1, d2] {
            // End edits that pass the task's own start are rejected; nothing to compare
            let Ok(outcome) = compute_cascade(&stepwise, &id, d, field) else {
                return Ok(());
            };
            outcome.apply_to(&mut stepwise).unwrap();
        }

        let mut at_once = graph.clone();
        let outcome = compute_cascade(&at_once, &id, d1 + d2, field).unwrap();
        outcome.apply_to(&mut at_once).unwrap();

        for task in stepwise.tasks() {
            let other = at_once.task(&task.id).unwrap();
            prop_assert_eq!(task.start_date, other.start_date, "start of {}", task.id);
            prop_assert_eq!(task.end_date, other.end_date, "end of {}", task.id);
        }
    }

    #[test]
    fn test_cascade_preserves_constraints(
        plan in plan_strategy(10),
        pick in any::<prop::sample::Index>(),
        shift in 1i64..10,
    ) {
        let mut graph = plan.graph();
        let id = name(pick.index(plan.tasks.len()));
        let outcome = compute_cascade(&graph, &id, shift, DateField::EndDate).unwrap();
        for change in &outcome.changes {
            prop_assert!(change.days_shift > 0);
            prop_assert!(change.days_shift <= shift);
        }
        outcome.apply_to(&mut graph).unwrap();

        for dep in graph.dependencies() {
            let pred = graph.task(&dep.predecessor_id).unwrap();
            let succ = graph.task(&dep.successor_id).unwrap();
            prop_assert!(succ.start_date >= pred.finish_or_start() + Duration::days(dep.lag_days));
        }
    }

    #[test]
    fn test_cpm_float_non_negative(plan in plan_strategy(12)) {
        let graph = plan.graph();
        let result = compute_critical_path(&graph, &EngineConfig::default());

        prop_assert_eq!(result.task_timings.len(), plan.tasks.len());
        prop_assert!(!result.critical_tasks.is_empty());
        for timing in &result.task_timings {
            prop_assert!(timing.float_days >= 0, "{} has float {}", timing.task_id, timing.float_days);
            prop_assert_eq!(timing.earliest_finish - timing.earliest_start, timing.duration_days);
            prop_assert!(timing.latest_finish <= result.project_end);
        }
        // Some task ending at the project end is critical
        prop_assert!(result
            .task_timings
            .iter()
            .any(|t| t.is_critical() && t.earliest_finish == result.project_end));

        let again = compute_critical_path(&graph, &EngineConfig::default());
        prop_assert_eq!(result, again);
    }

    #[test]
    fn test_buffer_consumption_is_monotonic(
        size in 1i64..8,
        consumed in 0i64..8,
        gap in 0i64..3,
        shifts in proptest::collection::vec(-6i64..10, 1..6),
    ) {
        let consumed = consumed.min(size);
        let tasks = vec![
            Task::new("work", day(0), Some(day(5))),
            Task::new("buffer", day(5 + gap), Some(day(5 + gap + size)))
                .with_scheduling_type(SchedulingType::Buffer)
                .with_buffer_consumed(consumed),
            Task::new("milestone", day(5 + gap + size), Some(day(6 + gap + size))),
        ];
        let deps = vec![Dependency::fs("work", "buffer"), Dependency::fs("buffer", "milestone")];
        let mut graph = ScheduleGraph::from_tasks(&tasks, &deps).unwrap();

        for shift in shifts {
            let before = graph.task("buffer").unwrap().buffer_consumed_days.unwrap_or(0);
            let outcome = compute_cascade(&graph, "work", shift, DateField::EndDate);
            // Pulls past the start of "work" are rejected, and that is fine here
            let Ok(outcome) = outcome else { continue };
            for update in &outcome.buffer_updates {
                prop_assert!(update.new_consumed_days >= update.old_consumed_days);
                prop_assert!(update.new_consumed_days <= size);
                prop_assert_eq!(update.old_consumed_days, before);
            }
            if shift <= 0 {
                prop_assert!(outcome.buffer_updates.is_empty());
            }
            outcome.apply_to(&mut graph).unwrap();
            let after = graph.task("buffer").unwrap().buffer_consumed_days.unwrap_or(0);
            prop_assert!(after >= before);
        }
    }
}
