use hub_bank::call::CallMessage;
use hub_bank::Coins;
use hub_modules_api::{Module, WorkingSet};
use hub_state::MemoryStorage;

mod helpers;

use helpers::*;

#[test]
fn burn_reduces_balance_and_supply() {
    let bank = new_bank();
    let working_set = &mut WorkingSet::new(MemoryStorage::new());
    bank.genesis(&bank_config(&["alice", "bob"]), working_set)
        .unwrap();
    let token = token_address();

    bank.call(
        CallMessage::Burn {
            coins: Coins {
                amount: 400,
                token_address: token.clone(),
            },
        },
        &context_for("alice"),
        working_set,
    )
    .expect("Burn should succeed");

    assert_eq!(
        bank.get_balance_of(&generate_address("alice"), &token, working_set),
        Some(INITIAL_BALANCE - 400)
    );
    assert_eq!(
        bank.get_total_supply_of(&token, working_set),
        Some(2 * INITIAL_BALANCE - 400)
    );
}

#[test]
fn burn_more_than_balance_fails() {
    let bank = new_bank();
    let working_set = &mut WorkingSet::new(MemoryStorage::new());
    bank.genesis(&bank_config(&["alice"]), working_set).unwrap();
    let token = token_address();

    let result = bank.burn_from(
        &generate_address("alice"),
        &Coins {
            amount: INITIAL_BALANCE + 1,
            token_address: token.clone(),
        },
        working_set,
    );
    assert!(result.is_err());
    assert_eq!(
        bank.get_total_supply_of(&token, working_set),
        Some(INITIAL_BALANCE)
    );
}
