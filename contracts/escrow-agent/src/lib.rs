//! Escrow Agent Contract
//!
//! A single privileged agent account brokers buyer/seller escrows: the agent
//! opens an escrow, the buyer funds it with the exact agreed amount, and the
//! agent then approves (releasing funds to the seller minus the agent fee),
//! rejects (refunding the buyer in full), or archives an unfunded escrow.
//! Accrued fees sit in a withdrawable pool until the agent drains it.

#![no_std]

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, token, Address, Env,
    String, Vec,
};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EscrowStatus {
    Pending = 0,
    Deposited = 1,
    Approved = 2,
    Rejected = 3,
    Archived = 4,
}

#[contracterror]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContractError {
    Unauthorized = 1,
    AlreadyInitialized = 2,
    NotInitialized = 3,
    EscrowNotFound = 4,
    InvalidStatus = 5,
    SellerIsBuyer = 6,
    WrongDepositAmount = 7,
    FeeOutOfRange = 8,
    InvalidAmount = 9,
}

/// A single escrow record. Only `status` and `updated_at` ever change after
/// creation; `agent_fee_percentage` is the ledger-wide fee snapshotted at
/// creation time, so later fee changes do not affect existing escrows.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Escrow {
    pub id: u64,
    pub seller: Address,
    pub buyer: Address,
    pub deposit_amount: i128,
    pub status: EscrowStatus,
    pub agent_fee_percentage: u32,
    pub description: String,
    pub created_at: u64,
    pub updated_at: u64,
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

#[contract]
pub struct EscrowAgent;

#[contractimpl]
impl EscrowAgent {
    /// Initialize the contract with the agent account, the payment token and
    /// the initial agent fee percentage (0-99).
    pub fn initialize(
        env: Env,
        agent: Address,
        token: Address,
        agent_fee_percentage: u32,
    ) -> Result<(), ContractError> {
        if env.storage().instance().has(&symbol_short!("agent")) {
            return Err(ContractError::AlreadyInitialized);
        }
        if agent_fee_percentage > 99 {
            return Err(ContractError::FeeOutOfRange);
        }

        env.storage().instance().set(&symbol_short!("agent"), &agent);
        env.storage().instance().set(&symbol_short!("token"), &token);
        env.storage()
            .instance()
            .set(&symbol_short!("fee"), &agent_fee_percentage);
        env.storage()
            .instance()
            .set(&symbol_short!("funds"), &0i128);
        env.storage()
            .instance()
            .set(&symbol_short!("next_id"), &0u64);

        Ok(())
    }

    /// Open a new escrow between `seller` and `buyer`. Agent only.
    ///
    /// The new record starts Pending and snapshots the current ledger-wide
    /// fee percentage. Note that a zero deposit amount is deliberately
    /// allowed; a negative one is not.
    pub fn initiate_escrow(
        env: Env,
        caller: Address,
        seller: Address,
        buyer: Address,
        deposit_amount: i128,
        description: String,
    ) -> Result<u64, ContractError> {
        require_agent(&env, &caller)?;

        if seller == buyer {
            return Err(ContractError::SellerIsBuyer);
        }
        if deposit_amount < 0 {
            return Err(ContractError::InvalidAmount);
        }

        let escrow_id: u64 = env
            .storage()
            .instance()
            .get(&symbol_short!("next_id"))
            .ok_or(ContractError::NotInitialized)?;
        let fee: u32 = env
            .storage()
            .instance()
            .get(&symbol_short!("fee"))
            .ok_or(ContractError::NotInitialized)?;

        let now = env.ledger().timestamp();
        let escrow = Escrow {
            id: escrow_id,
            seller: seller.clone(),
            buyer: buyer.clone(),
            deposit_amount,
            status: EscrowStatus::Pending,
            agent_fee_percentage: fee,
            description,
            created_at: now,
            updated_at: now,
        };

        env.storage().persistent().set(&escrow_id, &escrow);
        env.storage()
            .instance()
            .set(&symbol_short!("next_id"), &(escrow_id + 1));

        env.events().publish(
            (symbol_short!("esc_init"),),
            (escrow_id, seller, buyer, deposit_amount, now),
        );

        Ok(escrow_id)
    }

    /// Fund a Pending escrow. Buyer only, and the paid amount must equal the
    /// escrow's deposit amount exactly.
    pub fn deposit_escrow(
        env: Env,
        caller: Address,
        escrow_id: u64,
        amount: i128,
    ) -> Result<(), ContractError> {
        caller.require_auth();

        let mut escrow = read_escrow(&env, escrow_id)?;

        if caller != escrow.buyer {
            return Err(ContractError::Unauthorized);
        }
        if escrow.status != EscrowStatus::Pending {
            return Err(ContractError::InvalidStatus);
        }
        if amount != escrow.deposit_amount {
            return Err(ContractError::WrongDepositAmount);
        }

        let token_client = token::Client::new(&env, &read_token(&env)?);
        token_client.transfer(&caller, &env.current_contract_address(), &amount);

        let now = env.ledger().timestamp();
        escrow.status = EscrowStatus::Deposited;
        escrow.updated_at = now;
        env.storage().persistent().set(&escrow_id, &escrow);

        env.events()
            .publish((symbol_short!("esc_dep"),), (escrow_id, now));

        Ok(())
    }

    /// Approve a Deposited escrow. Agent only.
    ///
    /// The agent fee is `deposit_amount * fee / 100` with truncating
    /// division; the truncation remainder stays with the fee pool
    /// implicitly. The seller receives the rest.
    pub fn approve_escrow(env: Env, caller: Address, escrow_id: u64) -> Result<(), ContractError> {
        require_agent(&env, &caller)?;

        let mut escrow = read_escrow(&env, escrow_id)?;
        if escrow.status != EscrowStatus::Deposited {
            return Err(ContractError::InvalidStatus);
        }

        let fee = escrow.deposit_amount * (escrow.agent_fee_percentage as i128) / 100;
        let payout = escrow.deposit_amount - fee;

        let funds: i128 = env
            .storage()
            .instance()
            .get(&symbol_short!("funds"))
            .ok_or(ContractError::NotInitialized)?;
        env.storage()
            .instance()
            .set(&symbol_short!("funds"), &(funds + fee));

        let token_client = token::Client::new(&env, &read_token(&env)?);
        token_client.transfer(&env.current_contract_address(), &escrow.seller, &payout);

        let now = env.ledger().timestamp();
        escrow.status = EscrowStatus::Approved;
        escrow.updated_at = now;
        env.storage().persistent().set(&escrow_id, &escrow);

        env.events()
            .publish((symbol_short!("esc_appr"),), (escrow_id, now));

        Ok(())
    }

    /// Reject a Deposited escrow. Agent only. Refunds the buyer in full; no
    /// fee is charged.
    pub fn reject_escrow(env: Env, caller: Address, escrow_id: u64) -> Result<(), ContractError> {
        require_agent(&env, &caller)?;

        let mut escrow = read_escrow(&env, escrow_id)?;
        if escrow.status != EscrowStatus::Deposited {
            return Err(ContractError::InvalidStatus);
        }

        let token_client = token::Client::new(&env, &read_token(&env)?);
        token_client.transfer(
            &env.current_contract_address(),
            &escrow.buyer,
            &escrow.deposit_amount,
        );

        let now = env.ledger().timestamp();
        escrow.status = EscrowStatus::Rejected;
        escrow.updated_at = now;
        env.storage().persistent().set(&escrow_id, &escrow);

        env.events()
            .publish((symbol_short!("esc_rej"),), (escrow_id, now));

        Ok(())
    }

    /// Archive a Pending escrow. Agent only. A funded escrow cannot be
    /// archived; no funds move.
    pub fn archive_escrow(env: Env, caller: Address, escrow_id: u64) -> Result<(), ContractError> {
        require_agent(&env, &caller)?;

        let mut escrow = read_escrow(&env, escrow_id)?;
        if escrow.status != EscrowStatus::Pending {
            return Err(ContractError::InvalidStatus);
        }

        let now = env.ledger().timestamp();
        escrow.status = EscrowStatus::Archived;
        escrow.updated_at = now;
        env.storage().persistent().set(&escrow_id, &escrow);

        env.events()
            .publish((symbol_short!("esc_arch"),), (escrow_id, now));

        Ok(())
    }

    /// Hand the agent role to another account. Current agent only.
    pub fn change_agent(env: Env, caller: Address, new_agent: Address) -> Result<(), ContractError> {
        require_agent(&env, &caller)?;

        env.storage()
            .instance()
            .set(&symbol_short!("agent"), &new_agent);

        env.events().publish(
            (symbol_short!("agnt_chg"),),
            (new_agent, env.ledger().timestamp()),
        );

        Ok(())
    }

    /// Change the ledger-wide fee percentage (0-99). Agent only. Applies to
    /// future escrows only.
    pub fn change_agent_fee_percentage(
        env: Env,
        caller: Address,
        new_fee: u32,
    ) -> Result<(), ContractError> {
        require_agent(&env, &caller)?;

        if new_fee > 99 {
            return Err(ContractError::FeeOutOfRange);
        }

        env.storage().instance().set(&symbol_short!("fee"), &new_fee);

        env.events().publish(
            (symbol_short!("fee_chg"),),
            (new_fee, env.ledger().timestamp()),
        );

        Ok(())
    }

    /// Drain the accrued fee pool to the agent. Agent only. Calling with a
    /// zero balance is a permitted no-op.
    pub fn withdraw_funds(env: Env, caller: Address) -> Result<(), ContractError> {
        require_agent(&env, &caller)?;

        let funds: i128 = env
            .storage()
            .instance()
            .get(&symbol_short!("funds"))
            .ok_or(ContractError::NotInitialized)?;

        let token_client = token::Client::new(&env, &read_token(&env)?);
        token_client.transfer(&env.current_contract_address(), &caller, &funds);

        env.storage()
            .instance()
            .set(&symbol_short!("funds"), &0i128);

        env.events().publish(
            (symbol_short!("wthdrw"),),
            (funds, env.ledger().timestamp()),
        );

        Ok(())
    }

    /// All escrows in creation order.
    pub fn get_all_escrows(env: Env) -> Vec<Escrow> {
        let next_id: u64 = env
            .storage()
            .instance()
            .get(&symbol_short!("next_id"))
            .unwrap_or(0);

        let mut escrows = Vec::new(&env);
        for id in 0..next_id {
            if let Some(escrow) = env.storage().persistent().get(&id) {
                escrows.push_back(escrow);
            }
        }
        escrows
    }

    /// A single escrow by id.
    pub fn get_escrow_by_id(env: Env, escrow_id: u64) -> Result<Escrow, ContractError> {
        read_escrow(&env, escrow_id)
    }

    /// The current agent account.
    pub fn agent(env: Env) -> Result<Address, ContractError> {
        env.storage()
            .instance()
            .get(&symbol_short!("agent"))
            .ok_or(ContractError::NotInitialized)
    }

    /// The ledger-wide fee percentage applied to newly initiated escrows.
    pub fn agent_fee_percentage(env: Env) -> Result<u32, ContractError> {
        env.storage()
            .instance()
            .get(&symbol_short!("fee"))
            .ok_or(ContractError::NotInitialized)
    }

    /// The accrued fee balance the agent can withdraw.
    pub fn withdrawable_funds(env: Env) -> Result<i128, ContractError> {
        env.storage()
            .instance()
            .get(&symbol_short!("funds"))
            .ok_or(ContractError::NotInitialized)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require_agent(env: &Env, caller: &Address) -> Result<(), ContractError> {
    caller.require_auth();

    let agent: Address = env
        .storage()
        .instance()
        .get(&symbol_short!("agent"))
        .ok_or(ContractError::NotInitialized)?;

    if *caller != agent {
        return Err(ContractError::Unauthorized);
    }
    Ok(())
}

fn read_escrow(env: &Env, escrow_id: u64) -> Result<Escrow, ContractError> {
    env.storage()
        .persistent()
        .get(&escrow_id)
        .ok_or(ContractError::EscrowNotFound)
}

fn read_token(env: &Env) -> Result<Address, ContractError> {
    env.storage()
        .instance()
        .get(&symbol_short!("token"))
        .ok_or(ContractError::NotInitialized)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use soroban_sdk::{
        testutils::Address as _, testutils::Ledger as _, token, Address, Env, String,
    };

    struct TestEnv<'a> {
        env: Env,
        client: EscrowAgentClient<'a>,
        contract_addr: Address,
        token_addr: Address,
        agent: Address,
        seller: Address,
        buyer: Address,
        outsider: Address,
    }

    fn setup() -> TestEnv<'static> {
        let env = Env::default();
        env.mock_all_auths();
        env.ledger().with_mut(|li| {
            li.timestamp = 1_700_000_000;
        });

        let agent = Address::generate(&env);
        let seller = Address::generate(&env);
        let buyer = Address::generate(&env);
        let outsider = Address::generate(&env);

        let contract_addr = env.register(EscrowAgent, ());
        let client = EscrowAgentClient::new(&env, &contract_addr);

        let token_admin = Address::generate(&env);
        let token_contract = env.register_stellar_asset_contract_v2(token_admin);
        let token_addr = token_contract.address();
        let token_admin_client = token::StellarAssetClient::new(&env, &token_addr);
        token_admin_client.mint(&buyer, &1_000_000);

        client.initialize(&agent, &token_addr, &20u32);

        let client = unsafe {
            core::mem::transmute::<EscrowAgentClient<'_>, EscrowAgentClient<'static>>(client)
        };

        TestEnv {
            env,
            client,
            contract_addr,
            token_addr,
            agent,
            seller,
            buyer,
            outsider,
        }
    }

    fn initiate_test_escrow(t: &TestEnv, deposit_amount: i128) -> u64 {
        t.client.initiate_escrow(
            &t.agent,
            &t.seller,
            &t.buyer,
            &deposit_amount,
            &String::from_str(&t.env, "test escrow"),
        )
    }

    fn advance_time(t: &TestEnv, secs: u64) {
        t.env.ledger().with_mut(|li| {
            li.timestamp += secs;
        });
    }

    // -- Initialization ----------------------------------------------------

    #[test]
    fn test_initialize() {
        let t = setup();
        assert_eq!(t.client.agent(), t.agent);
        assert_eq!(t.client.agent_fee_percentage(), 20);
        assert_eq!(t.client.withdrawable_funds(), 0);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #2)")]
    fn test_initialize_twice() {
        let t = setup();
        t.client.initialize(&t.agent, &t.token_addr, &10u32);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #8)")]
    fn test_initialize_fee_out_of_range() {
        let env = Env::default();
        env.mock_all_auths();
        let agent = Address::generate(&env);
        let token = Address::generate(&env);
        let contract_addr = env.register(EscrowAgent, ());
        let client = EscrowAgentClient::new(&env, &contract_addr);
        client.initialize(&agent, &token, &100u32);
    }

    // -- initiate_escrow ---------------------------------------------------

    #[test]
    fn test_initiate_escrow() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        assert_eq!(id, 0);

        let escrow = t.client.get_escrow_by_id(&id);
        assert_eq!(escrow.id, 0);
        assert_eq!(escrow.seller, t.seller);
        assert_eq!(escrow.buyer, t.buyer);
        assert_eq!(escrow.deposit_amount, 5000);
        assert_eq!(escrow.status, EscrowStatus::Pending);
        assert_eq!(escrow.agent_fee_percentage, 20);
        assert_eq!(escrow.created_at, 1_700_000_000);
        assert_eq!(escrow.updated_at, escrow.created_at);
    }

    #[test]
    fn test_initiate_ids_sequential() {
        let t = setup();
        assert_eq!(initiate_test_escrow(&t, 5000), 0);
        assert_eq!(initiate_test_escrow(&t, 4000), 1);
        assert_eq!(initiate_test_escrow(&t, 3000), 2);
        assert_eq!(t.client.get_all_escrows().len(), 3);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #1)")]
    fn test_initiate_as_non_agent() {
        let t = setup();
        t.client.initiate_escrow(
            &t.outsider,
            &t.seller,
            &t.buyer,
            &5000i128,
            &String::from_str(&t.env, "test"),
        );
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #6)")]
    fn test_initiate_same_seller_and_buyer() {
        let t = setup();
        t.client.initiate_escrow(
            &t.agent,
            &t.seller,
            &t.seller,
            &5000i128,
            &String::from_str(&t.env, "test"),
        );
    }

    #[test]
    fn test_initiate_zero_amount_is_allowed() {
        // deposit_amount is not checked for positivity at initiation; a
        // zero-value escrow is constructible.
        let t = setup();
        let id = initiate_test_escrow(&t, 0);
        assert_eq!(t.client.get_escrow_by_id(&id).deposit_amount, 0);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #9)")]
    fn test_initiate_negative_amount_rejected() {
        let t = setup();
        initiate_test_escrow(&t, -5000);
    }

    // -- deposit_escrow ----------------------------------------------------

    #[test]
    fn test_deposit_escrow() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);

        advance_time(&t, 60);
        t.client.deposit_escrow(&t.buyer, &id, &5000i128);

        let escrow = t.client.get_escrow_by_id(&id);
        assert_eq!(escrow.status, EscrowStatus::Deposited);
        assert_eq!(escrow.updated_at, 1_700_000_060);
        assert_eq!(escrow.created_at, 1_700_000_000);

        let token = token::Client::new(&t.env, &t.token_addr);
        assert_eq!(token.balance(&t.contract_addr), 5000);
        assert_eq!(token.balance(&t.buyer), 1_000_000 - 5000);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #1)")]
    fn test_deposit_as_non_buyer() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.deposit_escrow(&t.seller, &id, &5000i128);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #7)")]
    fn test_deposit_wrong_amount() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.deposit_escrow(&t.buyer, &id, &3000i128);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #5)")]
    fn test_deposit_on_archived_escrow() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.archive_escrow(&t.agent, &id);
        t.client.deposit_escrow(&t.buyer, &id, &5000i128);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #5)")]
    fn test_deposit_twice() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.deposit_escrow(&t.buyer, &id, &5000i128);
        t.client.deposit_escrow(&t.buyer, &id, &5000i128);
    }

    // -- approve_escrow ----------------------------------------------------

    #[test]
    fn test_approve_escrow() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.deposit_escrow(&t.buyer, &id, &5000i128);
        t.client.approve_escrow(&t.agent, &id);

        // 20% fee: 1000 stays with the contract, 4000 goes to the seller.
        let token = token::Client::new(&t.env, &t.token_addr);
        assert_eq!(token.balance(&t.seller), 4000);
        assert_eq!(token.balance(&t.contract_addr), 1000);
        assert_eq!(t.client.withdrawable_funds(), 1000);
        assert_eq!(
            t.client.get_escrow_by_id(&id).status,
            EscrowStatus::Approved
        );
    }

    #[test]
    fn test_approve_fee_truncates() {
        let t = setup();
        let id = initiate_test_escrow(&t, 333);
        t.client.deposit_escrow(&t.buyer, &id, &333i128);
        t.client.approve_escrow(&t.agent, &id);

        // 333 * 20 / 100 = 66 (truncated), seller gets 267; the 0.6
        // remainder stays in the fee pool's favor implicitly.
        let token = token::Client::new(&t.env, &t.token_addr);
        assert_eq!(t.client.withdrawable_funds(), 66);
        assert_eq!(token.balance(&t.seller), 267);
    }

    #[test]
    fn test_fee_snapshot_unaffected_by_later_change() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.change_agent_fee_percentage(&t.agent, &50u32);

        t.client.deposit_escrow(&t.buyer, &id, &5000i128);
        t.client.approve_escrow(&t.agent, &id);

        // Approved with the 20% fee captured at creation, not the current 50%.
        assert_eq!(t.client.withdrawable_funds(), 1000);

        let id2 = initiate_test_escrow(&t, 5000);
        assert_eq!(t.client.get_escrow_by_id(&id2).agent_fee_percentage, 50);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #1)")]
    fn test_approve_as_non_agent() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.deposit_escrow(&t.buyer, &id, &5000i128);
        t.client.approve_escrow(&t.outsider, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #5)")]
    fn test_approve_on_pending_escrow() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.approve_escrow(&t.agent, &id);
    }

    // -- reject_escrow -----------------------------------------------------

    #[test]
    fn test_reject_escrow() {
        let t = setup();
        let id = initiate_test_escrow(&t, 4000);
        t.client.deposit_escrow(&t.buyer, &id, &4000i128);
        t.client.reject_escrow(&t.agent, &id);

        // Full refund, no fee.
        let token = token::Client::new(&t.env, &t.token_addr);
        assert_eq!(token.balance(&t.buyer), 1_000_000);
        assert_eq!(token.balance(&t.contract_addr), 0);
        assert_eq!(t.client.withdrawable_funds(), 0);
        assert_eq!(
            t.client.get_escrow_by_id(&id).status,
            EscrowStatus::Rejected
        );
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #1)")]
    fn test_reject_as_non_agent() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.deposit_escrow(&t.buyer, &id, &5000i128);
        t.client.reject_escrow(&t.outsider, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #5)")]
    fn test_reject_on_pending_escrow() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.reject_escrow(&t.agent, &id);
    }

    // -- archive_escrow ----------------------------------------------------

    #[test]
    fn test_archive_escrow() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.archive_escrow(&t.agent, &id);
        assert_eq!(
            t.client.get_escrow_by_id(&id).status,
            EscrowStatus::Archived
        );
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #5)")]
    fn test_archive_deposited_escrow() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.deposit_escrow(&t.buyer, &id, &5000i128);
        t.client.archive_escrow(&t.agent, &id);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #1)")]
    fn test_archive_as_non_agent() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.archive_escrow(&t.outsider, &id);
    }

    // -- agent administration ----------------------------------------------

    #[test]
    fn test_change_agent() {
        let t = setup();
        t.client.change_agent(&t.agent, &t.outsider);
        assert_eq!(t.client.agent(), t.outsider);

        // The new agent can initiate.
        let id = t.client.initiate_escrow(
            &t.outsider,
            &t.seller,
            &t.buyer,
            &1000i128,
            &String::from_str(&t.env, "after handover"),
        );
        assert_eq!(id, 0);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #1)")]
    fn test_old_agent_loses_role() {
        let t = setup();
        t.client.change_agent(&t.agent, &t.outsider);
        initiate_test_escrow(&t, 5000);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #1)")]
    fn test_change_agent_as_non_agent() {
        let t = setup();
        t.client.change_agent(&t.outsider, &t.outsider);
    }

    #[test]
    fn test_change_fee_percentage() {
        let t = setup();
        t.client.change_agent_fee_percentage(&t.agent, &24u32);
        assert_eq!(t.client.agent_fee_percentage(), 24);
    }

    #[test]
    fn test_change_fee_boundary() {
        let t = setup();
        t.client.change_agent_fee_percentage(&t.agent, &99u32);
        assert_eq!(t.client.agent_fee_percentage(), 99);
        t.client.change_agent_fee_percentage(&t.agent, &0u32);
        assert_eq!(t.client.agent_fee_percentage(), 0);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #8)")]
    fn test_change_fee_out_of_range() {
        let t = setup();
        t.client.change_agent_fee_percentage(&t.agent, &100u32);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #1)")]
    fn test_change_fee_as_non_agent() {
        let t = setup();
        t.client.change_agent_fee_percentage(&t.outsider, &24u32);
    }

    // -- withdraw_funds ----------------------------------------------------

    #[test]
    fn test_withdraw_funds() {
        let t = setup();
        let id = initiate_test_escrow(&t, 5000);
        t.client.deposit_escrow(&t.buyer, &id, &5000i128);
        t.client.approve_escrow(&t.agent, &id);

        t.client.withdraw_funds(&t.agent);

        let token = token::Client::new(&t.env, &t.token_addr);
        assert_eq!(token.balance(&t.agent), 1000);
        assert_eq!(token.balance(&t.contract_addr), 0);
        assert_eq!(t.client.withdrawable_funds(), 0);
    }

    #[test]
    fn test_withdraw_with_zero_balance_is_noop() {
        let t = setup();
        t.client.withdraw_funds(&t.agent);

        let token = token::Client::new(&t.env, &t.token_addr);
        assert_eq!(token.balance(&t.agent), 0);
        assert_eq!(t.client.withdrawable_funds(), 0);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #1)")]
    fn test_withdraw_as_non_agent() {
        let t = setup();
        t.client.withdraw_funds(&t.outsider);
    }

    // -- views ---------------------------------------------------------------

    #[test]
    fn test_get_all_escrows_is_stable() {
        let t = setup();
        initiate_test_escrow(&t, 5000);
        initiate_test_escrow(&t, 4000);

        let first = t.client.get_all_escrows();
        let second = t.client.get_all_escrows();
        assert_eq!(first, second);
        assert_eq!(first.get(0).unwrap().id, 0);
        assert_eq!(first.get(1).unwrap().id, 1);
    }

    #[test]
    #[should_panic(expected = "Error(Contract, #4)")]
    fn test_get_escrow_by_id_not_found() {
        let t = setup();
        t.client.get_escrow_by_id(&999u64);
    }
}
