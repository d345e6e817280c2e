use hub_sequencer::CallMessage;
use proptest::prelude::*;

mod helpers;

use helpers::*;

const SEQUENCERS: [&str; 5] = ["alice", "bob", "carol", "dave", "erin"];

#[derive(Debug, Clone)]
enum Op {
    Create(usize, u64),
    Increase(usize, u64),
    Decrease(usize, u64),
    Unbond(usize),
    OptIn(usize, bool),
    Advance(u64),
    Slash,
    Kick(usize),
    Punish(usize, bool),
    LastBlock,
}

fn op() -> impl Strategy<Value = Op> {
    let who = 0..SEQUENCERS.len();
    prop_oneof![
        3 => (who.clone(), MIN_BOND..5 * MIN_BOND).prop_map(|(w, a)| Op::Create(w, a)),
        1 => (who.clone(), 1..MIN_BOND).prop_map(|(w, a)| Op::Increase(w, a)),
        1 => (who.clone(), 1..2 * MIN_BOND).prop_map(|(w, a)| Op::Decrease(w, a)),
        2 => who.clone().prop_map(Op::Unbond),
        1 => (who.clone(), any::<bool>()).prop_map(|(w, b)| Op::OptIn(w, b)),
        2 => (1..2 * UNBONDING_TIME).prop_map(Op::Advance),
        1 => Just(Op::Slash),
        1 => who.clone().prop_map(Op::Kick),
        1 => (who, any::<bool>()).prop_map(|(w, b)| Op::Punish(w, b)),
        1 => Just(Op::LastBlock),
    ]
}

fn apply(h: &mut Harness, op: &Op) {
    // Rejected operations are part of the exercise.
    let _ = match *op {
        Op::Create(who, bond) => h.create(SEQUENCERS[who], bond),
        Op::Increase(who, amount) => h.call(
            SEQUENCERS[who],
            CallMessage::IncreaseBond {
                amount: coins(amount),
            },
        ),
        Op::Decrease(who, amount) => h.call(
            SEQUENCERS[who],
            CallMessage::DecreaseBond {
                amount: coins(amount),
            },
        ),
        Op::Unbond(who) => h.call(SEQUENCERS[who], CallMessage::Unbond),
        Op::OptIn(who, opted_in) => {
            h.call(SEQUENCERS[who], CallMessage::UpdateOptInStatus { opted_in })
        }
        Op::Advance(secs) => {
            h.advance(secs);
            Ok(())
        }
        Op::Slash => {
            let _ = h.module.slash_liveness(ROLLAPP, &mut h.ws);
            Ok(())
        }
        Op::Kick(who) => h.call(SEQUENCERS[who], CallMessage::KickProposer),
        Op::Punish(who, rewarded) => h.call(
            "authority",
            CallMessage::PunishSequencer {
                sequencer: generate_address(SEQUENCERS[who]),
                rewardee: rewarded.then(|| generate_address("watcher")),
            },
        ),
        Op::LastBlock => {
            let proposer = h.proposer().address;
            let now = h.now;
            let _ = h
                .module
                .before_update_state(ROLLAPP, &proposer, true, now, &mut h.ws);
            Ok(())
        }
    };
}

fn held_by_accounts(h: &mut Harness) -> u64 {
    ACCOUNTS.iter().map(|key| h.balance(key)).sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn tokens_are_conserved_and_invariants_hold(ops in prop::collection::vec(op(), 1..40)) {
        let mut h = Harness::new();
        for op in &ops {
            apply(&mut h, op);
            if let Err(violations) = hub_sequencer::invariants::check_all(&h.module, &mut h.ws) {
                prop_assert!(false, "after {:?}:\n{}", op, violations);
            }
            let supply = h
                .module
                .bank()
                .get_total_supply_of(&token_address(), &mut h.ws)
                .expect("token exists");
            let accounted = held_by_accounts(&mut h) + h.escrowed();
            prop_assert_eq!(supply, accounted, "after {:?}", op);
        }
    }
}
