// tests/collector_properties.rs

use proptest::prelude::*;
use pyscope::collector::{Collector, Event, OutputStream};

#[derive(Debug, Clone)]
enum Op {
    Call(u8),
    Return,
    Output,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..5).prop_map(Op::Call),
        3 => Just(Op::Return),
        1 => Just(Op::Output),
    ]
}

proptest! {
    #[test]
    fn ids_increase_and_parents_follow_the_stack(ops in proptest::collection::vec(op_strategy(), 0..200)) {
        let c = Collector::new();
        let mut model: Vec<u64> = Vec::new();
        let mut last_id = 0u64;

        for op in &ops {
            match op {
                Op::Call(n) => {
                    let id = c.add_call(format!("f{n}"), "p.py", u32::from(*n), vec![]);
                    prop_assert_eq!(id, last_id + 1);
                    last_id = id;

                    let call = c.history().calls.last().cloned().unwrap();
                    prop_assert_eq!(call.parent_id, model.last().copied());
                    model.push(id);
                }
                Op::Return => {
                    let popped = c.add_return("any", "None");
                    prop_assert_eq!(popped, model.pop());
                }
                Op::Output => c.add_output("line", OutputStream::Stdout),
            }
            prop_assert_eq!(c.active_stack(), model.clone());
        }

        // Live delivery mirrors the operations one to one, in order.
        let mut delivered = Vec::new();
        while let Some(event) = c.try_next_event() {
            delivered.push(event);
        }
        prop_assert_eq!(delivered.len(), ops.len());
        for (i, (event, op)) in delivered.iter().zip(&ops).enumerate() {
            prop_assert_eq!(event.seq(), i as u64 + 1);
            let matches = matches!(
                (event, op),
                (Event::Call(_), Op::Call(_)) | (Event::Return(_), Op::Return) | (Event::Output(_), Op::Output)
            );
            prop_assert!(matches);
        }
    }

    #[test]
    fn clear_always_restarts_ids_at_one(before in 0usize..50) {
        let c = Collector::new();
        for i in 0..before {
            c.add_call(format!("f{i}"), "p.py", 1, vec![]);
        }
        c.clear();
        prop_assert!(c.history().is_empty());
        prop_assert_eq!(c.add_call("g", "p.py", 1, vec![]), 1);
    }
}
