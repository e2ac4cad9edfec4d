//! # Signed Dispatch Tests
//!
//! These tests attack the signed-instruction entry points.
//!
//! ## Test Categories
//!
//! 1. **Authentication** - forged signatures, wrong program, tampering
//! 2. **Replay Prevention** - reused nonces, expiry, bounded cache
//! 3. **Batch Conflicts** - contended records, retry after rejection

use escrow_engine::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

type TestService = EscrowService<InMemoryLedger, KeccakAddressSpace, Ed25519Verifier>;

const USDC: AssetId = AssetId::new([0x0C; 32]);
const CUSTODY: Address = Address::new([0xCC; 32]);
const MIN_STAKE: Amount = 1_000_000;

// =============================================================================
// TEST HELPERS
// =============================================================================

fn signer(seed: u8) -> Ed25519Signer {
    Ed25519Signer::from_seed([seed; 32])
}

fn authority() -> Ed25519Signer {
    signer(0xA0)
}

fn pool_params() -> PoolParams {
    PoolParams {
        asset_type: USDC,
        custody_address: CUSTODY,
        min_stake: MIN_STAKE,
        decimals: 6,
    }
}

fn sign(service: &TestService, who: &Ed25519Signer, instruction: Instruction) -> SignedInstruction {
    who.sign_instruction(&service.config().program_id, instruction)
        .unwrap()
}

async fn make_pool_with(config: EngineConfig) -> TestService {
    let service = EscrowService::new(
        Arc::new(InMemoryLedger::with_asset(USDC)),
        KeccakAddressSpace::new(config.program_id),
        Ed25519Verifier::new(),
        config,
    )
    .unwrap();
    let init = sign(&service, &authority(), Instruction::InitializePool(pool_params()));
    service.submit(init).await.unwrap();
    service
}

async fn make_pool() -> TestService {
    make_pool_with(EngineConfig::default()).await
}

async fn join(service: &TestService, who: &Ed25519Signer, funds: Amount) {
    service
        .ledger()
        .mint(USDC, who.identity().wallet_address(), funds)
        .unwrap();
    service
        .submit(sign(service, who, Instruction::RegisterParticipant))
        .await
        .unwrap();
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

#[tokio::test]
async fn test_signed_round_trip() {
    let service = make_pool().await;
    let alice = signer(1);
    join(&service, &alice, MIN_STAKE).await;

    service
        .submit(sign(&service, &alice, Instruction::PlaceStake))
        .await
        .unwrap();
    service
        .submit(sign(&service, &authority(), Instruction::ResetRound))
        .await
        .unwrap();
    service
        .submit(sign(
            &service,
            &authority(),
            Instruction::MarkEligible {
                participant: service.participant_address(&alice.identity()),
                amount: MIN_STAKE,
            },
        ))
        .await
        .unwrap();
    let receipt = service
        .submit(sign(&service, &alice, Instruction::Withdraw))
        .await
        .unwrap();

    assert_eq!(receipt.operation, OperationKind::Withdraw);
    assert_eq!(receipt.signer, alice.identity());
    assert_eq!(
        service
            .ledger()
            .balance(&USDC, &alice.identity().wallet_address()),
        MIN_STAKE
    );
    assert_eq!(service.escrow_state().await.authority, authority().identity());
}

#[tokio::test]
async fn test_tampered_instruction_rejected() {
    let service = make_pool().await;
    let alice = signer(1);
    join(&service, &alice, MIN_STAKE).await;

    let mut signed = sign(
        &service,
        &authority(),
        Instruction::MarkEligible {
            participant: service.participant_address(&alice.identity()),
            amount: 1,
        },
    );
    signed.instruction = Instruction::MarkEligible {
        participant: service.participant_address(&alice.identity()),
        amount: 1_000_000_000,
    };

    let err = service.submit(signed).await.unwrap_err();
    assert_eq!(
        err,
        EscrowError::InvalidSignature {
            signer: authority().identity()
        }
    );
    let state = service
        .participant_state_of(&alice.identity())
        .await
        .unwrap();
    assert!(!state.is_eligible);
}

#[tokio::test]
async fn test_signature_for_other_program_rejected() {
    let service = make_pool().await;
    let alice = signer(1);
    let signed = alice
        .sign_instruction(&[0xEE; 32], Instruction::RegisterParticipant)
        .unwrap();

    let err = service.submit(signed).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSignature);
    assert!(service.participant_state_of(&alice.identity()).await.is_none());
}

#[tokio::test]
async fn test_impersonating_authority_fails() {
    let service = make_pool().await;
    let mallory = signer(6);

    // Correctly signed by mallory, so it authenticates, but mallory is not the authority.
    let err = service
        .submit(sign(&service, &mallory, Instruction::ResetRound))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EscrowError::Unauthorized {
            caller: mallory.identity()
        }
    );
}

// =============================================================================
// REPLAY PREVENTION
// =============================================================================

#[tokio::test]
async fn test_replayed_stake_rejected() {
    let service = make_pool().await;
    let alice = signer(1);
    join(&service, &alice, 3 * MIN_STAKE).await;

    let stake = sign(&service, &alice, Instruction::PlaceStake);
    service.submit(stake.clone()).await.unwrap();

    let err = service.submit(stake.clone()).await.unwrap_err();
    assert_eq!(err, EscrowError::ReplayDetected { nonce: stake.nonce });
    assert_eq!(service.escrow_state().await.pot, MIN_STAKE);
    assert_eq!(service.stats().rejections(ErrorKind::ReplayDetected), 1);
}

#[tokio::test]
async fn test_forged_signature_does_not_burn_nonce() {
    let service = make_pool().await;
    let alice = signer(1);
    join(&service, &alice, MIN_STAKE).await;

    let program = service.config().program_id;
    let nonce = Uuid::new_v4();
    let until = unix_timestamp() + 60;
    let mut forged = signer(2)
        .sign_instruction_with(&program, nonce, until, Instruction::PlaceStake)
        .unwrap();
    forged.signer = alice.identity();
    assert!(service.submit(forged).await.is_err());

    let genuine = alice
        .sign_instruction_with(&program, nonce, until, Instruction::PlaceStake)
        .unwrap();
    service.submit(genuine).await.unwrap();
}

#[tokio::test]
async fn test_expired_stake_rejected() {
    let service = make_pool().await;
    let alice = signer(1);
    join(&service, &alice, MIN_STAKE).await;

    let stale = alice
        .sign_instruction_with(
            &service.config().program_id,
            Uuid::new_v4(),
            unix_timestamp() - 5,
            Instruction::PlaceStake,
        )
        .unwrap();
    let err = service.submit(stale).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Expired);
    assert_eq!(service.escrow_state().await.pot, 0);
}

#[tokio::test]
async fn test_stretched_expiry_rejected() {
    let service = make_pool().await;
    let alice = signer(1);
    join(&service, &alice, MIN_STAKE).await;

    let far = alice
        .sign_instruction_with(
            &service.config().program_id,
            Uuid::new_v4(),
            u64::MAX,
            Instruction::PlaceStake,
        )
        .unwrap();
    let err = service.submit(far).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidParameters);
    assert_eq!(service.escrow_state().await.pot, 0);
}

#[tokio::test]
async fn test_full_replay_cache_never_forgets_live_nonces() {
    let mut config = EngineConfig::default();
    config.replay_cache_capacity = 3;
    let service = make_pool_with(config).await;
    let alice = signer(1);
    join(&service, &alice, 10 * MIN_STAKE).await;

    // Bootstrap, registration and this stake fill the cache.
    let stake = sign(&service, &alice, Instruction::PlaceStake);
    service.submit(stake.clone()).await.unwrap();

    for _ in 0..5 {
        let err = service.submit(stake.clone()).await.unwrap_err();
        assert_eq!(err, EscrowError::ReplayDetected { nonce: stake.nonce });
    }
    assert_eq!(service.escrow_state().await.pot, MIN_STAKE);
    assert_eq!(
        service
            .ledger()
            .balance(&USDC, &alice.identity().wallet_address()),
        9 * MIN_STAKE
    );

    // New work waits for live nonces to expire instead of evicting them.
    let bob = signer(2);
    let err = service
        .submit(sign(&service, &bob, Instruction::RegisterParticipant))
        .await
        .unwrap_err();
    assert_eq!(err, EscrowError::ReplayCacheFull);
    assert!(err.is_retryable());
    assert!(service.participant_state_of(&bob.identity()).await.is_none());
}

// =============================================================================
// BATCH CONFLICTS
// =============================================================================

#[tokio::test]
async fn test_disjoint_registrations_run_together() {
    let service = make_pool().await;
    let batch: Vec<SignedInstruction> = (1..=5u8)
        .map(|seed| sign(&service, &signer(seed), Instruction::RegisterParticipant))
        .collect();

    assert!(service.batch_conflicts(&batch).is_empty());
    let results = service.execute_batch(batch).await.unwrap();

    assert_eq!(results.len(), 5);
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(service.records().await.participant_count(), 5);
}

#[tokio::test]
async fn test_stakes_contend_for_escrow_record() {
    let service = make_pool().await;
    let alice = signer(1);
    let bob = signer(2);
    join(&service, &alice, MIN_STAKE).await;
    join(&service, &bob, MIN_STAKE).await;

    let bob_stake = sign(&service, &bob, Instruction::PlaceStake);
    let batch = vec![
        sign(&service, &alice, Instruction::PlaceStake),
        bob_stake.clone(),
    ];
    let conflicts = service.batch_conflicts(&batch);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflict_type, ConflictType::WriteWrite);
    assert_eq!(conflicts[0].conflicting_address, service.escrow_address());

    let results = service.execute_batch(batch).await.unwrap();
    assert!(results[0].is_ok());
    let err = results[1].clone().unwrap_err();
    assert_eq!(
        err,
        EscrowError::Conflict {
            address: service.escrow_address()
        }
    );
    assert!(err.is_retryable());

    // Nonce was not consumed, so the same signed instruction retries cleanly.
    service.submit(bob_stake).await.unwrap();
    assert_eq!(service.escrow_state().await.pot, 2 * MIN_STAKE);
}

/// Two winners staked and the round reset; custody holds `2 * MIN_STAKE`.
async fn settled_round(service: &TestService, alice: &Ed25519Signer, bob: &Ed25519Signer) {
    join(service, alice, MIN_STAKE).await;
    join(service, bob, MIN_STAKE).await;
    for who in [alice, bob] {
        service
            .submit(sign(service, who, Instruction::PlaceStake))
            .await
            .unwrap();
    }
    service
        .submit(sign(service, &authority(), Instruction::ResetRound))
        .await
        .unwrap();
}

fn mark_batch(
    service: &TestService,
    alice: &Ed25519Signer,
    bob: &Ed25519Signer,
) -> Vec<SignedInstruction> {
    vec![
        sign(
            service,
            &authority(),
            Instruction::MarkEligible {
                participant: service.participant_address(&alice.identity()),
                amount: 1_500_000,
            },
        ),
        sign(
            service,
            &authority(),
            Instruction::MarkEligible {
                participant: service.participant_address(&bob.identity()),
                amount: 1_000_000,
            },
        ),
    ]
}

#[tokio::test]
async fn test_capped_marks_serialize_on_escrow_record() {
    let service = make_pool().await;
    let (alice, bob) = (signer(1), signer(2));
    settled_round(&service, &alice, &bob).await;

    let batch = mark_batch(&service, &alice, &bob);
    let conflicts = service.batch_conflicts(&batch);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflicting_address, service.escrow_address());

    let results = service.execute_batch(batch).await.unwrap();
    assert!(results[0].is_ok());
    assert_eq!(
        results[1].clone().unwrap_err(),
        EscrowError::Conflict {
            address: service.escrow_address()
        }
    );

    // Retried alone, the second mark sees the first and hits the cap.
    let retry = mark_batch(&service, &alice, &bob).remove(1);
    let err = service.submit(retry).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OverAllocation);
    assert!(service.verify_invariants().await.is_valid());
}

#[tokio::test]
async fn test_uncapped_marks_for_different_winners_run_together() {
    let mut config = EngineConfig::default();
    config.enforce_allocation_cap = false;
    let service = make_pool_with(config).await;
    let (alice, bob) = (signer(1), signer(2));
    settled_round(&service, &alice, &bob).await;

    let batch = mark_batch(&service, &alice, &bob);
    assert!(service.batch_conflicts(&batch).is_empty());
    let results = service.execute_batch(batch).await.unwrap();
    assert!(results.iter().all(Result::is_ok));
}

#[tokio::test]
async fn test_withdraw_conflicts_with_mark_of_same_participant() {
    let service = make_pool().await;
    let alice = signer(1);
    join(&service, &alice, MIN_STAKE).await;
    let alice_addr = service.participant_address(&alice.identity());

    let batch = vec![
        sign(
            &service,
            &authority(),
            Instruction::MarkEligible {
                participant: alice_addr,
                amount: 0,
            },
        ),
        sign(&service, &alice, Instruction::Withdraw),
    ];
    let results = service.execute_batch(batch).await.unwrap();

    assert!(results[0].is_ok());
    assert_eq!(
        results[1].clone().unwrap_err().kind(),
        ErrorKind::Conflict
    );
}

#[tokio::test]
async fn test_oversized_batch_rejected_whole() {
    let mut config = EngineConfig::default();
    config.max_batch_size = 2;
    let service = make_pool_with(config).await;

    let batch: Vec<SignedInstruction> = (1..=3u8)
        .map(|seed| sign(&service, &signer(seed), Instruction::RegisterParticipant))
        .collect();

    let err = service.execute_batch(batch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameters);
    assert_eq!(service.records().await.participant_count(), 0);
}
