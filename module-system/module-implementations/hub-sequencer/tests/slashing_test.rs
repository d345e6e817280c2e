use hub_sequencer::{CallMessage, ErrorKind, OperatingStatus};

mod helpers;

use helpers::*;

fn total_supply(h: &mut Harness) -> u64 {
    h.module
        .bank()
        .get_total_supply_of(&token_address(), &mut h.ws)
        .expect("token exists")
}

fn punish(
    h: &mut Harness,
    sender: &str,
    sequencer: &str,
    rewardee: Option<&str>,
) -> Result<(), hub_modules_api::Error> {
    h.call(
        sender,
        CallMessage::PunishSequencer {
            sequencer: generate_address(sequencer),
            rewardee: rewardee.map(generate_address),
        },
    )
}

#[test]
fn liveness_slash_burns_the_larger_of_both_minimums() {
    let mut h = Harness::new();
    h.create("alice", 10_000).unwrap();
    let supply = total_supply(&mut h);

    h.module.slash_liveness(ROLLAPP, &mut h.ws).unwrap();
    let alice = h.seq("alice");
    assert_eq!(alice.tokens, 9_900);
    assert_eq!(alice.dishonor, 1);
    assert_eq!(total_supply(&mut h), supply - 100);
    h.assert_invariants();

    let mut params = test_params();
    params.liveness_slash_min_absolute = 500;
    h.call("authority", CallMessage::UpdateParams { params })
        .unwrap();
    h.module.slash_liveness(ROLLAPP, &mut h.ws).unwrap();
    let alice = h.seq("alice");
    assert_eq!(alice.tokens, 9_400);
    assert_eq!(alice.dishonor, 2);
    assert!(h.is_proposer("alice"));
    h.assert_invariants();
}

#[test]
fn liveness_slash_without_proposer_is_a_no_op() {
    let mut h = Harness::new();
    h.module.slash_liveness(ROLLAPP, &mut h.ws).unwrap();
    h.module.slash_liveness("rollapp_9-1", &mut h.ws).unwrap();
    h.assert_invariants();
}

#[test]
fn dishonored_proposer_is_kicked() {
    let mut h = Harness::new();
    h.create("alice", MIN_BOND).unwrap();
    h.create("bob", 2_000).unwrap();
    h.create("carol", 3_000).unwrap();

    let err = h.call("bob", CallMessage::KickProposer).unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::FailedPrecondition));

    h.module.slash_liveness(ROLLAPP, &mut h.ws).unwrap();
    assert_eq!(h.seq("alice").tokens, 990);

    let err = h.call("alice", CallMessage::KickProposer).unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::FailedPrecondition));
    let err = h.call("dave", CallMessage::KickProposer).unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::NotFound));

    h.call("bob", CallMessage::KickProposer)
        .expect("Kick should succeed");

    assert!(h.is_proposer("bob"));
    let alice = h.seq("alice");
    assert_eq!(alice.status, OperatingStatus::Unbonded);
    assert_eq!(alice.tokens, 0);
    assert_eq!(h.balance("alice"), INITIAL_BALANCE - 10);
    assert!(h.rollapps.was_kicked(&generate_address("alice"), &mut h.ws));
    assert_eq!(h.rollapps.hard_forks(ROLLAPP, &mut h.ws), 1);
    assert!(h.seq("bob").opted_in);
    assert!(!h.seq("carol").opted_in);
    h.assert_invariants();
}

#[test]
fn kick_drops_successor_notice() {
    let mut h = Harness::new();
    h.create("alice", MIN_BOND).unwrap();
    h.create("bob", 2_000).unwrap();
    h.create("carol", 3_000).unwrap();
    h.call("alice", CallMessage::Unbond).unwrap();
    h.advance(NOTICE_PERIOD);
    assert!(h.is_successor("carol"));
    h.call("carol", CallMessage::Unbond).unwrap();
    assert!(h.seq("carol").is_noticed());

    h.module.slash_liveness(ROLLAPP, &mut h.ws).unwrap();
    h.call("bob", CallMessage::KickProposer).unwrap();

    assert!(h.is_proposer("bob"));
    assert!(h.successor().is_sentinel());
    let carol = h.seq("carol");
    assert!(!carol.is_noticed());
    assert_eq!(carol.status, OperatingStatus::Bonded);
    h.assert_invariants();
}

#[test]
fn fraudulent_proposer_is_jailed_and_rewardee_paid() {
    let mut h = Harness::new();
    h.create("alice", 4_000).unwrap();
    h.create("bob", 2_000).unwrap();
    let supply = total_supply(&mut h);

    let err = punish(&mut h, "bob", "alice", Some("watcher")).unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::PermissionDenied));

    punish(&mut h, "authority", "alice", Some("watcher")).expect("Punish should succeed");

    let alice = h.seq("alice");
    assert!(alice.jailed);
    assert_eq!(alice.tokens, 0);
    assert_eq!(alice.status, OperatingStatus::Unbonded);
    assert_eq!(h.balance("watcher"), INITIAL_BALANCE + 2_000);
    assert_eq!(total_supply(&mut h), supply - 2_000);
    assert!(h.proposer().is_sentinel());
    assert!(!h.seq("bob").opted_in);
    assert_eq!(h.rollapps.hard_forks(ROLLAPP, &mut h.ws), 1);
    h.assert_invariants();

    // A second punishment finds nothing left to take.
    punish(&mut h, "authority", "alice", Some("watcher")).unwrap();
    h.module.slash_liveness(ROLLAPP, &mut h.ws).unwrap();
    assert_eq!(h.balance("watcher"), INITIAL_BALANCE + 2_000);
    assert_eq!(total_supply(&mut h), supply - 2_000);
    assert_eq!(h.rollapps.hard_forks(ROLLAPP, &mut h.ws), 1);

    let err = h.create("alice", MIN_BOND).unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::AlreadyExists));
    let err = h
        .call("alice", CallMessage::IncreaseBond { amount: coins(10) })
        .unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::FailedPrecondition));

    h.call("bob", CallMessage::UpdateOptInStatus { opted_in: true })
        .unwrap();
    assert!(h.is_proposer("bob"));
    h.assert_invariants();
}

#[test]
fn fraudulent_successor_is_replaced_at_rotation() {
    let mut h = Harness::new();
    h.create("alice", MIN_BOND).unwrap();
    h.create("bob", 5_000).unwrap();
    h.create("carol", MIN_BOND).unwrap();
    h.call("alice", CallMessage::Unbond).unwrap();
    h.advance(NOTICE_PERIOD);
    assert!(h.is_successor("bob"));
    let supply = total_supply(&mut h);

    punish(&mut h, "authority", "bob", None).unwrap();
    assert_eq!(total_supply(&mut h), supply - 5_000);
    assert!(h.successor().is_sentinel());
    assert!(h.is_proposer("alice"));
    assert_eq!(h.rollapps.hard_forks(ROLLAPP, &mut h.ws), 0);
    assert!(h.seq("carol").opted_in);
    h.assert_invariants();

    let now = h.now;
    h.module
        .before_update_state(ROLLAPP, &generate_address("alice"), true, now, &mut h.ws)
        .unwrap();
    assert!(h.is_proposer("carol"));
    h.assert_invariants();
}

#[test]
fn fraud_is_undone_when_hard_fork_fails() {
    let mut h = Harness::new();
    h.create("alice", 4_000).unwrap();
    h.create("bob", 2_000).unwrap();
    h.rollapps.fail_hard_forks(ROLLAPP, &mut h.ws);

    let alice = h.seq("alice");
    let bob = h.seq("bob");
    let supply = total_supply(&mut h);
    let escrowed = h.escrowed();
    let events = h.ws.events().len();

    let watcher = generate_address("watcher");
    h.module
        .handle_fraud(&alice.address, Some(&watcher), &mut h.ws)
        .unwrap_err();

    assert_eq!(h.seq("alice"), alice);
    assert_eq!(h.seq("bob"), bob);
    assert!(h.is_proposer("alice"));
    assert_eq!(h.balance("watcher"), INITIAL_BALANCE);
    assert_eq!(total_supply(&mut h), supply);
    assert_eq!(h.escrowed(), escrowed);
    assert_eq!(h.ws.events().len(), events);
    h.assert_invariants();
}

#[test]
fn kick_is_undone_when_hard_fork_fails() {
    let mut h = Harness::new();
    h.create("alice", MIN_BOND).unwrap();
    h.create("bob", 2_000).unwrap();
    h.module.slash_liveness(ROLLAPP, &mut h.ws).unwrap();
    h.rollapps.fail_hard_forks(ROLLAPP, &mut h.ws);

    let alice = h.seq("alice");
    let bob = h.seq("bob");
    let escrowed = h.escrowed();

    h.call("bob", CallMessage::KickProposer).unwrap_err();
    h.module
        .kick_proposer(&bob.address, &mut h.ws)
        .unwrap_err();

    assert_eq!(h.seq("alice"), alice);
    assert_eq!(h.seq("bob"), bob);
    assert!(h.is_proposer("alice"));
    assert_eq!(h.balance("alice"), INITIAL_BALANCE - MIN_BOND);
    assert_eq!(h.escrowed(), escrowed);
    assert!(!h.rollapps.was_kicked(&alice.address, &mut h.ws));
    h.assert_invariants();
}

#[test]
fn params_are_authority_only_and_validated() {
    let mut h = Harness::new();

    let mut params = test_params();
    params.notice_period = 60;
    let err = h
        .call(
            "alice",
            CallMessage::UpdateParams {
                params: params.clone(),
            },
        )
        .unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::PermissionDenied));

    let mut invalid = params.clone();
    invalid.unbonding_time = 0;
    let err = h
        .call("authority", CallMessage::UpdateParams { params: invalid })
        .unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::OutOfRange));

    let mut other_denom = params.clone();
    other_denom.min_bond.token_address = generate_address("not-a-token");
    let err = h
        .call(
            "authority",
            CallMessage::UpdateParams {
                params: other_denom,
            },
        )
        .unwrap_err();
    assert_eq!(kind(&err), Some(ErrorKind::OutOfRange));

    h.call(
        "authority",
        CallMessage::UpdateParams {
            params: params.clone(),
        },
    )
    .unwrap();
    assert_eq!(h.module.query_params(&mut h.ws).unwrap(), params);
}
