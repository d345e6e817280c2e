#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use hub_bank::{Amount, Bank, BankConfig, Coins, TokenConfig};
use hub_modules_api::default_context::DefaultContext;
use hub_modules_api::digest::Digest;
use hub_modules_api::{Context, Module, ModuleInfo, Spec, Timestamp, WorkingSet};
use hub_sequencer::invariants::check_all;
use hub_sequencer::{
    error_kind, CallMessage, Decimal, ErrorKind, Params, Registration, Rollapp, RollappKeeper,
    Sequencer, SequencerConfig, SequencerHooks, SequencerMetadata, SequencerRegistry,
    UnbondBlocker, VmType,
};
use hub_state::{MemoryStorage, Prefix, StateMap};

pub type C = DefaultContext;
pub type Address = <C as Spec>::Address;

pub const ROLLAPP: &str = "rollapp_1234-1";
pub const TOKEN_NAME: &str = "adym";
pub const SALT: u64 = 7;
pub const INITIAL_BALANCE: Amount = 100_000;
pub const MIN_BOND: Amount = 1_000;
pub const NOTICE_PERIOD: u64 = 600;
pub const UNBONDING_TIME: u64 = 3_600;
pub const LIVENESS_SLASH_MIN_ABSOLUTE: Amount = 5;
pub const GENESIS_TIME: Timestamp = Timestamp::from_secs(1_700_000_000);

/// Holders funded at genesis.
pub const ACCOUNTS: [&str; 8] = [
    "alice", "bob", "carol", "dave", "erin", "frank", "authority", "watcher",
];

pub fn generate_address(key: &str) -> Address {
    let hash: [u8; 32] = <C as Spec>::Hasher::digest(key.as_bytes()).into();
    Address::from(hash)
}

pub fn pub_key(key: &str) -> Vec<u8> {
    let hash: [u8; 32] = <C as Spec>::Hasher::digest(format!("consensus/{key}")).into();
    hash.to_vec()
}

pub fn token_address() -> Address {
    hub_bank::get_genesis_token_address::<C>(TOKEN_NAME, SALT)
}

pub fn coins(amount: Amount) -> Coins<C> {
    Coins {
        amount,
        token_address: token_address(),
    }
}

pub fn test_params() -> Params<C> {
    let mut params = Params::default_for(token_address());
    params.min_bond.amount = MIN_BOND;
    params.notice_period = NOTICE_PERIOD;
    params.unbonding_time = UNBONDING_TIME;
    params.liveness_slash_min_multiplier = Decimal::percent(1);
    params.liveness_slash_min_absolute = LIVENESS_SLASH_MIN_ABSOLUTE;
    params
}

/// A rollapp registry kept in state. Also records hard forks and rotations it
/// is notified about.
pub struct TestRollapps {
    rollapps: StateMap<String, Rollapp>,
    hard_forks: StateMap<String, u64>,
    rotations: StateMap<String, u64>,
    kicked: StateMap<Address, bool>,
    failing_hard_forks: StateMap<String, bool>,
}

impl TestRollapps {
    pub fn new() -> Self {
        Self {
            rollapps: StateMap::new(Prefix::new(b"test/rollapps/".to_vec())),
            hard_forks: StateMap::new(Prefix::new(b"test/hard_forks/".to_vec())),
            rotations: StateMap::new(Prefix::new(b"test/rotations/".to_vec())),
            kicked: StateMap::new(Prefix::new(b"test/kicked/".to_vec())),
            failing_hard_forks: StateMap::new(Prefix::new(b"test/failing_hard_forks/".to_vec())),
        }
    }

    pub fn insert(&self, rollapp: Rollapp, working_set: &mut WorkingSet<MemoryStorage>) {
        self.rollapps
            .set(&rollapp.rollapp_id, &rollapp, working_set);
    }

    pub fn hard_forks(&self, rollapp_id: &str, working_set: &mut WorkingSet<MemoryStorage>) -> u64 {
        self.hard_forks.get(rollapp_id, working_set).unwrap_or_default()
    }

    pub fn rotations(&self, rollapp_id: &str, working_set: &mut WorkingSet<MemoryStorage>) -> u64 {
        self.rotations.get(rollapp_id, working_set).unwrap_or_default()
    }

    /// Makes every later hard fork notification for `rollapp_id` fail.
    pub fn fail_hard_forks(&self, rollapp_id: &str, working_set: &mut WorkingSet<MemoryStorage>) {
        self.failing_hard_forks.set(rollapp_id, &true, working_set);
    }

    pub fn was_kicked(&self, address: &Address, working_set: &mut WorkingSet<MemoryStorage>) -> bool {
        self.kicked.contains(address, working_set)
    }
}

impl RollappKeeper<C> for TestRollapps {
    fn get_rollapp(
        &self,
        rollapp_id: &str,
        working_set: &mut WorkingSet<MemoryStorage>,
    ) -> Option<Rollapp> {
        self.rollapps.get(rollapp_id, working_set)
    }
}

impl SequencerHooks<C> for TestRollapps {
    fn after_kick_proposer(
        &self,
        kicked: &Sequencer<C>,
        working_set: &mut WorkingSet<MemoryStorage>,
    ) -> Result<()> {
        self.kicked.set(&kicked.address, &true, working_set);
        Ok(())
    }

    fn on_hard_fork(&self, rollapp_id: &str, working_set: &mut WorkingSet<MemoryStorage>) -> Result<()> {
        if self.failing_hard_forks.contains(rollapp_id, working_set) {
            anyhow::bail!("hard fork of {rollapp_id} rejected");
        }
        let count = self.hard_forks(rollapp_id, working_set);
        self.hard_forks.set(rollapp_id, &(count + 1), working_set);
        Ok(())
    }

    fn after_rotation(
        &self,
        rollapp_id: &str,
        _old_proposer: &Sequencer<C>,
        _new_proposer: &Sequencer<C>,
        working_set: &mut WorkingSet<MemoryStorage>,
    ) -> Result<()> {
        let count = self.rotations(rollapp_id, working_set);
        self.rotations.set(rollapp_id, &(count + 1), working_set);
        Ok(())
    }
}

/// Vetoes unbonds of sequencers with an open dispute.
pub struct DisputeBlocker {
    disputed: StateMap<Address, bool>,
}

impl DisputeBlocker {
    pub fn new() -> Self {
        Self {
            disputed: StateMap::new(Prefix::new(b"test/disputes/".to_vec())),
        }
    }

    pub fn open(&self, address: &Address, working_set: &mut WorkingSet<MemoryStorage>) {
        self.disputed.set(address, &true, working_set);
    }

    pub fn close(&self, address: &Address, working_set: &mut WorkingSet<MemoryStorage>) {
        self.disputed.delete(address, working_set);
    }
}

impl UnbondBlocker<C> for DisputeBlocker {
    fn can_unbond(
        &self,
        sequencer: &Sequencer<C>,
        working_set: &mut WorkingSet<MemoryStorage>,
    ) -> Result<()> {
        if self.disputed.contains(&sequencer.address, working_set) {
            anyhow::bail!("open dispute against {}", sequencer.address);
        }
        Ok(())
    }
}

pub fn rollapp(rollapp_id: &str, launched: bool) -> Rollapp {
    Rollapp {
        rollapp_id: rollapp_id.to_owned(),
        vm_type: VmType::Evm,
        launched,
        initial_sequencer: "*".to_owned(),
        min_sequencer_bond: None,
    }
}

/// A bank, a rollapp registry and the sequencer module over one working set,
/// with a block clock.
pub struct Harness {
    pub module: SequencerRegistry<C>,
    pub rollapps: Arc<TestRollapps>,
    pub blocker: Arc<DisputeBlocker>,
    pub ws: WorkingSet<MemoryStorage>,
    pub now: Timestamp,
    pub height: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut SequencerConfig<C>)) -> Self {
        let mut ws = WorkingSet::new(MemoryStorage::new());
        let bank = Bank::<C>::default();
        let bank_config = BankConfig {
            tokens: vec![TokenConfig {
                token_name: TOKEN_NAME.to_owned(),
                salt: SALT,
                address_and_balances: ACCOUNTS
                    .iter()
                    .map(|key| (generate_address(key), INITIAL_BALANCE))
                    .collect(),
            }],
        };
        bank.genesis(&bank_config, &mut ws).expect("bank genesis");

        let rollapps = Arc::new(TestRollapps::new());
        rollapps.insert(rollapp(ROLLAPP, true), &mut ws);
        let blocker = Arc::new(DisputeBlocker::new());

        let module = SequencerRegistry::new(bank, rollapps.clone())
            .with_unbond_blocker(blocker.clone())
            .with_hooks(rollapps.clone());
        let mut config = SequencerConfig::new(test_params(), generate_address("authority"));
        customize(&mut config);
        module.genesis(&config, &mut ws).expect("sequencer genesis");

        Self {
            module,
            rollapps,
            blocker,
            ws,
            now: GENESIS_TIME,
            height: 1,
        }
    }

    pub fn context(&self, key: &str) -> C {
        C::new(generate_address(key), self.height, self.now)
    }

    pub fn call(&mut self, key: &str, msg: CallMessage<C>) -> Result<(), hub_modules_api::Error> {
        let context = self.context(key);
        self.module.call(msg, &context, &mut self.ws).map(|_| ())
    }

    pub fn registration(&self, key: &str, rollapp_id: &str, bond: Amount) -> Registration<C> {
        Registration {
            rollapp_id: rollapp_id.to_owned(),
            dymint_pub_key: pub_key(key),
            bond: coins(bond),
            metadata: SequencerMetadata {
                moniker: key.to_owned(),
                ..Default::default()
            },
            reward_addr: None,
            whitelisted_relayers: Vec::new(),
        }
    }

    pub fn create(&mut self, key: &str, bond: Amount) -> Result<(), hub_modules_api::Error> {
        self.create_on(key, ROLLAPP, bond)
    }

    pub fn create_on(
        &mut self,
        key: &str,
        rollapp_id: &str,
        bond: Amount,
    ) -> Result<(), hub_modules_api::Error> {
        let registration = self.registration(key, rollapp_id, bond);
        self.call(key, CallMessage::CreateSequencer(registration))
    }

    /// Moves the clock forward and runs the end-of-block hook.
    pub fn advance(&mut self, secs: u64) {
        self.now = self.now.plus_secs(secs);
        self.height += 1;
        self.module.end_block(self.now, &mut self.ws);
    }

    pub fn seq(&mut self, key: &str) -> Sequencer<C> {
        self.module
            .get_real(&generate_address(key), &mut self.ws)
            .expect("sequencer exists")
    }

    pub fn proposer(&mut self) -> Sequencer<C> {
        self.module.get_proposer(ROLLAPP, &mut self.ws)
    }

    pub fn successor(&mut self) -> Sequencer<C> {
        self.module.get_successor(ROLLAPP, &mut self.ws)
    }

    pub fn is_proposer(&mut self, key: &str) -> bool {
        self.proposer().address == generate_address(key)
    }

    pub fn is_successor(&mut self, key: &str) -> bool {
        self.successor().address == generate_address(key)
    }

    pub fn balance(&mut self, key: &str) -> Amount {
        self.module
            .bank()
            .get_balance_of(&generate_address(key), &token_address(), &mut self.ws)
            .unwrap_or_default()
    }

    pub fn escrowed(&mut self) -> Amount {
        self.module.escrowed(&mut self.ws).expect("params initialized")
    }

    pub fn module_address(&self) -> Address {
        self.module.address().clone()
    }

    pub fn assert_invariants(&mut self) {
        if let Err(violations) = check_all(&self.module, &mut self.ws) {
            panic!("invariants violated:\n{violations}");
        }
    }
}

pub fn kind(err: &hub_modules_api::Error) -> Option<ErrorKind> {
    match err {
        hub_modules_api::Error::ModuleError(err) => error_kind(err),
    }
}

pub fn kind_of<T>(result: Result<T>) -> Option<ErrorKind> {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(err) => error_kind(&err),
    }
}
