use hub_bank::{Bank, BankConfig, TokenConfig};
use hub_modules_api::default_context::DefaultContext;
use hub_modules_api::digest::Digest;
use hub_modules_api::{Context, Spec, Timestamp};

pub type C = DefaultContext;

pub const TOKEN_NAME: &str = "adym";
pub const SALT: u64 = 5;
pub const INITIAL_BALANCE: u64 = 1_000;

pub fn generate_address(key: &str) -> <C as Spec>::Address {
    let hash: [u8; 32] = <C as Spec>::Hasher::digest(key.as_bytes()).into();
    <C as Spec>::Address::from(hash)
}

pub fn context_for(key: &str) -> C {
    C::new(generate_address(key), 1, Timestamp::from_secs(1_700_000_000))
}

pub fn bank_config(holders: &[&str]) -> BankConfig<C> {
    BankConfig {
        tokens: vec![TokenConfig {
            token_name: TOKEN_NAME.to_owned(),
            salt: SALT,
            address_and_balances: holders
                .iter()
                .map(|key| (generate_address(key), INITIAL_BALANCE))
                .collect(),
        }],
    }
}

pub fn token_address() -> <C as Spec>::Address {
    hub_bank::get_genesis_token_address::<C>(TOKEN_NAME, SALT)
}

#[allow(dead_code)]
pub fn new_bank() -> Bank<C> {
    Bank::<C>::default()
}
