//! Runtime checks of the module's state invariants.
//!
//! Each check returns a list of violations. [`check_all`] runs every check.

use hub_bank::Amount;
use hub_modules_api::{Context, Spec, WorkingSet};

use crate::store::dymint_address;
use crate::types::OperatingStatus;
use crate::SequencerRegistry;

/// Every queued notice belongs to a proposer or successor whose notice end
/// matches the queue key, and every sequencer in notice is queued unless it
/// is a proposer whose notice already matured.
pub fn check_notice<C: Context>(
    module: &SequencerRegistry<C>,
    working_set: &mut WorkingSet<C::Storage>,
) -> Vec<String> {
    let mut violations = Vec::new();
    let entries = module.notice_queue.iter(working_set);
    for sequencer in module.list_all(working_set) {
        if sequencer.is_noticed()
            && !entries.iter().any(|(_, address, _)| address == &sequencer.address)
            && !module.is_proposer(&sequencer, working_set)
        {
            violations.push(format!(
                "{} is in notice but has no notice entry",
                sequencer.address
            ));
        }
    }
    for (ends_at, address, rollapp_id) in entries {
        let sequencer = module.get(&address, working_set);
        if sequencer.is_sentinel() {
            violations.push(format!("notice entry for unknown sequencer {address}"));
            continue;
        }
        if sequencer.notice_period_time != ends_at {
            violations.push(format!(
                "notice entry of {address} ends at {ends_at}, record says {}",
                sequencer.notice_period_time
            ));
        }
        if sequencer.rollapp_id != rollapp_id {
            violations.push(format!("notice entry of {address} names rollapp {rollapp_id}"));
        }
        if !module.is_proposer(&sequencer, working_set)
            && !module.is_successor(&sequencer, working_set)
        {
            violations.push(format!(
                "{address} is in the notice queue but is neither proposer nor successor"
            ));
        }
    }
    violations
}

/// Every sequencer is reachable through its consensus-key index and nothing else is.
pub fn check_hash_index<C: Context>(
    module: &SequencerRegistry<C>,
    working_set: &mut WorkingSet<C::Storage>,
) -> Vec<String> {
    let mut violations = Vec::new();
    let sequencers = module.list_all(working_set);
    for sequencer in &sequencers {
        let dymint_addr = dymint_address::<C>(&sequencer.dymint_pub_key);
        match module.get_by_dymint_addr(&dymint_addr, working_set) {
            Some(found) if found.address == sequencer.address => {}
            _ => violations.push(format!(
                "{} is not found through its consensus key",
                sequencer.address
            )),
        }
    }
    let indexed = module.sequencers_by_dymint_addr.iter(working_set).len();
    if indexed != sequencers.len() {
        violations.push(format!(
            "{indexed} consensus keys indexed for {} sequencers",
            sequencers.len()
        ));
    }
    violations
}

/// Proposers and successors are bonded and distinct, a rollapp without a
/// proposer has no successor, and the rollapp index matches the records.
pub fn check_status<C: Context>(
    module: &SequencerRegistry<C>,
    working_set: &mut WorkingSet<C::Storage>,
) -> Vec<String> {
    let mut violations = Vec::new();
    let mut rollapps: Vec<String> = module
        .proposers
        .iter(working_set)
        .into_iter()
        .chain(module.successors.iter(working_set))
        .map(|(rollapp_id, _)| rollapp_id)
        .collect();
    rollapps.sort();
    rollapps.dedup();

    for rollapp_id in &rollapps {
        let proposer = module.get_proposer(rollapp_id, working_set);
        let successor = module.get_successor(rollapp_id, working_set);
        for (role, sequencer) in [("proposer", &proposer), ("successor", &successor)] {
            if !sequencer.is_sentinel() && !sequencer.is_bonded() {
                violations.push(format!(
                    "{role} {} of {rollapp_id} is not bonded",
                    sequencer.address
                ));
            }
            if !sequencer.is_sentinel() && &sequencer.rollapp_id != rollapp_id {
                violations.push(format!(
                    "{role} {} of {rollapp_id} belongs to {}",
                    sequencer.address, sequencer.rollapp_id
                ));
            }
        }
        if !proposer.is_sentinel() && proposer.address == successor.address {
            violations.push(format!("{rollapp_id} has the same proposer and successor"));
        }
        if proposer.is_sentinel() && !successor.is_sentinel() {
            violations.push(format!("{rollapp_id} has a successor but no proposer"));
        }
    }

    let sequencers = module.list_all(working_set);
    let mut by_rollapp: Vec<&str> = sequencers.iter().map(|s| s.rollapp_id.as_str()).collect();
    by_rollapp.sort_unstable();
    by_rollapp.dedup();
    for rollapp_id in by_rollapp {
        let all = module.list_by_rollapp(rollapp_id, working_set).len();
        let per_status: usize = OperatingStatus::ALL
            .iter()
            .map(|status| {
                module
                    .list_by_rollapp_and_status(rollapp_id, *status, working_set)
                    .len()
            })
            .sum();
        let records = sequencers
            .iter()
            .filter(|s| s.rollapp_id == rollapp_id)
            .count();
        if all != per_status || all != records {
            violations.push(format!(
                "{rollapp_id} index has {all} entries, {per_status} by status, {records} records"
            ));
        }
    }
    let indexed = module.sequencers_by_rollapp.iter(working_set);
    for ((rollapp_id, status, address), _) in indexed {
        let sequencer = module.get(&address, working_set);
        if sequencer.rollapp_id != rollapp_id || sequencer.status != status {
            violations.push(format!("stale rollapp index entry for {address}"));
        }
    }
    violations
}

/// Escrowed tokens equal the sum of all bonds, and no jailed sequencer is bonded.
pub fn check_tokens<C: Context>(
    module: &SequencerRegistry<C>,
    working_set: &mut WorkingSet<C::Storage>,
) -> Vec<String> {
    let mut violations = Vec::new();
    let sequencers = module.list_all(working_set);
    let bonded: Amount = sequencers.iter().map(|s| s.tokens).sum();
    match module.escrowed(working_set) {
        Ok(escrowed) if escrowed == bonded => {}
        Ok(escrowed) => violations.push(format!(
            "module holds {escrowed} but sequencers have {bonded} bonded"
        )),
        Err(err) => violations.push(format!("cannot read escrow: {err}")),
    }
    for sequencer in sequencers.iter().filter(|s| s.jailed && s.is_bonded()) {
        violations.push(format!("{} is jailed but bonded", sequencer.address));
    }
    for sequencer in sequencers
        .iter()
        .filter(|s| s.status == OperatingStatus::Unbonded && s.tokens != 0)
    {
        violations.push(format!(
            "{} is unbonded with {} tokens",
            sequencer.address, sequencer.tokens
        ));
    }
    violations
}

type Check<C> = fn(&SequencerRegistry<C>, &mut WorkingSet<<C as Spec>::Storage>) -> Vec<String>;

/// Runs every check. Returns `Err` with all violations, one per line.
pub fn check_all<C: Context>(
    module: &SequencerRegistry<C>,
    working_set: &mut WorkingSet<C::Storage>,
) -> Result<(), String> {
    let checks: [(&str, Check<C>); 4] = [
        ("notice", check_notice),
        ("hash-index", check_hash_index),
        ("status", check_status),
        ("tokens", check_tokens),
    ];
    let mut violations = Vec::new();
    for (name, check) in checks {
        for violation in check(module, working_set) {
            violations.push(format!("{name}: {violation}"));
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations.join("\n"))
    }
}
