//! Staking status evaluation: state classification, reward extraction, epoch
//! KPI progress, collateral checks and checkpoint timing.
//!
//! The state read is the only fatal contract call. Every later step is
//! independent; a single failing view degrades its own field to
//! `Reading::Unavailable` and the rest of the report still gets produced.

use crate::chain::Reading;
use crate::contracts::{ServiceInfoView, StakingViews};
use crate::descriptor::ServiceDescriptor;
use crate::error::{ChainError, ReportError};
use alloy::primitives::{Address, U256};

pub const SECONDS_PER_DAY: u64 = 86_400;
/// Threshold under which the "epoch ending soon" advisory fires.
pub const EPOCH_ENDING_SOON_SECS: i64 = 3_600;

/// Verbatim mapping of the contract's `getStakingState` return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakingState {
    Unstaked,
    Staked,
    Evicted,
}

impl StakingState {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Unstaked),
            1 => Some(Self::Staked),
            2 => Some(Self::Evicted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unstaked => "UNSTAKED",
            Self::Staked => "STAKED",
            Self::Evicted => "EVICTED",
        }
    }

    /// Evicted services still hold a stake; they just stopped accruing KPI.
    pub fn is_staked(self) -> bool {
        matches!(self, Self::Staked | Self::Evicted)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochProgress {
    pub required_transactions: u64,
    pub checkpoint_nonce: u64,
    pub current_nonce: u64,
    pub transactions_since_checkpoint: u64,
    /// Unclamped ratio; the renderer clamps to [0,1] for display only.
    pub progress_fraction: f64,
    pub kpi_met: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EpochStatus {
    Progress(EpochProgress),
    /// KPI tracking is suspended on-chain for evicted services.
    Skipped,
    Unavailable { reason: String },
    /// The run stopped before epoch evaluation (unstaked service).
    NotEvaluated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositHolder {
    Owner,
    Agent,
}

impl DepositHolder {
    pub fn label(self) -> &'static str {
        match self {
            Self::Owner => "Security deposit (owner)",
            Self::Agent => "Security deposit (agent)",
        }
    }
}

/// One collateral candidate. The on-chain owner and the configured agent
/// signer are checked independently, never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEntry {
    pub holder: DepositHolder,
    pub address: Address,
    pub amount: Reading<U256>,
    /// `Some(true)` iff the amount is strictly below the contract minimum.
    /// `None` when either side of the comparison is unavailable.
    pub below_minimum: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositInfo {
    pub entries: Vec<DepositEntry>,
    pub agent_bond: Reading<U256>,
    pub agent_bond_below_minimum: Option<bool>,
    pub min_required: Reading<U256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointTiming {
    /// Wall clock captured once per run; every displayed duration is derived
    /// from this single sample.
    pub sampled_at: u64,
    pub next_checkpoint_timestamp: u64,
    /// Negative means the epoch has ended and the checkpoint call is overdue.
    pub time_remaining_seconds: i64,
}

/// Expected business conditions surfaced as warnings, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    Evicted,
    KpiShortfall { missing: u64 },
    LowDeposit { holder: DepositHolder },
    LowAgentBond,
    EpochEndingSoon { remaining_seconds: i64 },
    EpochOverdue,
}

impl Advisory {
    pub fn text(&self) -> String {
        match self {
            Self::Evicted => {
                "Service has been evicted for missing KPI requirements; \
                 unstake and re-stake to resume earning rewards"
                    .to_string()
            }
            Self::KpiShortfall { missing } => {
                format!("Need {missing} more transactions to meet the epoch KPI")
            }
            Self::LowDeposit { holder } => {
                format!("{} is below the contract minimum", holder.label())
            }
            Self::LowAgentBond => "Agent bond is below the contract minimum".to_string(),
            Self::EpochEndingSoon { remaining_seconds } => format!(
                "Epoch ending soon ({remaining_seconds}s left); checkpoint will finalize rewards"
            ),
            Self::EpochOverdue => {
                "Epoch has ended; waiting for the checkpoint call".to_string()
            }
        }
    }
}

/// Aggregated facts for the renderer. Unstaked runs carry only the state.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub service_id: u64,
    pub staking_program_id: String,
    pub staking_contract: Address,
    pub multisig: Option<Address>,
    pub agent_address: Option<Address>,
    pub agent_id: u64,
    pub state: StakingState,
    pub rewards: Option<Reading<U256>>,
    pub deposits: Option<Reading<DepositInfo>>,
    pub epoch: EpochStatus,
    pub timing: Option<Reading<CheckpointTiming>>,
    pub advisories: Vec<Advisory>,
}

impl Report {
    fn stub(descriptor: &ServiceDescriptor, state: StakingState) -> Self {
        Self {
            service_id: descriptor.service_id,
            staking_program_id: descriptor.staking_program_id.clone(),
            staking_contract: descriptor.staking_contract_address,
            multisig: descriptor.multisig_address,
            agent_address: descriptor.agent_address,
            agent_id: descriptor.agent_id,
            state,
            rewards: None,
            deposits: None,
            epoch: EpochStatus::NotEvaluated,
            timing: None,
            advisories: Vec::new(),
        }
    }
}

/// `ceil(liveness_ratio * 86400 / 1e18)` in exact U256 arithmetic. Rounding
/// up matters: under-counting the requirement would falsely report KPI met.
pub fn required_transactions(liveness_ratio: U256) -> u64 {
    let scale = U256::from(10u64).pow(U256::from(18u64));
    let numerator = liveness_ratio.saturating_mul(U256::from(SECONDS_PER_DAY));
    let ceiling = numerator.saturating_add(scale - U256::from(1u64)) / scale;
    u64::try_from(ceiling).unwrap_or(u64::MAX)
}

/// Clamped non-negative: nonce data sources can race and momentarily report
/// a live nonce behind the checkpoint snapshot.
pub fn transactions_since_checkpoint(current_nonce: u64, checkpoint_nonce: u64) -> u64 {
    current_nonce.saturating_sub(checkpoint_nonce)
}

/// Strict comparison: equal-to-minimum is NOT flagged. `None` when either
/// reading is unavailable, so unknown never masquerades as healthy or low.
pub fn below_minimum(amount: &Reading<U256>, min_required: &Reading<U256>) -> Option<bool> {
    match (amount.value(), min_required.value()) {
        (Some(amount), Some(min)) => Some(amount < min),
        _ => None,
    }
}

fn u256_to_u64_saturating(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

pub struct Evaluator<'a, V: StakingViews> {
    views: &'a V,
    descriptor: &'a ServiceDescriptor,
}

impl<'a, V: StakingViews> Evaluator<'a, V> {
    pub fn new(views: &'a V, descriptor: &'a ServiceDescriptor) -> Self {
        Self { views, descriptor }
    }

    /// Runs the full evaluation state machine against a wall clock sampled
    /// once by the caller.
    pub async fn run(&self, now: u64) -> Result<Report, ReportError> {
        let state = self.evaluate_state().await?;
        let mut report = Report::stub(self.descriptor, state);

        if state == StakingState::Unstaked {
            tracing::info!("[REPORT] Service {} is unstaked; nothing further to query", report.service_id);
            return Ok(report);
        }
        if state == StakingState::Evicted {
            report.advisories.push(Advisory::Evicted);
        }

        // Shared tuple read: rewards, owner and checkpoint nonce all come
        // from the same getServiceInfo response.
        let service_info = self.views.service_info(self.descriptor.service_id).await;

        report.rewards = Some(self.evaluate_rewards(&service_info).await);

        let deposits = self.evaluate_deposits(&service_info).await;
        if let Some(info) = deposits.value() {
            for entry in &info.entries {
                if entry.below_minimum == Some(true) {
                    report.advisories.push(Advisory::LowDeposit {
                        holder: entry.holder,
                    });
                }
            }
            if info.agent_bond_below_minimum == Some(true) {
                report.advisories.push(Advisory::LowAgentBond);
            }
        }
        report.deposits = Some(deposits);

        report.epoch = self.evaluate_epoch_progress(&service_info, state).await;
        if let EpochStatus::Progress(progress) = &report.epoch {
            if !progress.kpi_met {
                report.advisories.push(Advisory::KpiShortfall {
                    missing: progress
                        .required_transactions
                        .saturating_sub(progress.transactions_since_checkpoint),
                });
            }
        }

        let timing = self.evaluate_checkpoint_timing(now).await;
        if let Some(timing) = timing.value() {
            if timing.time_remaining_seconds < 0 {
                report.advisories.push(Advisory::EpochOverdue);
            } else if timing.time_remaining_seconds < EPOCH_ENDING_SOON_SECS {
                report.advisories.push(Advisory::EpochEndingSoon {
                    remaining_seconds: timing.time_remaining_seconds,
                });
            }
        }
        report.timing = Some(timing);

        Ok(report)
    }

    /// Without a state nothing else is meaningful, so this is the one read
    /// whose failure aborts the whole report.
    async fn evaluate_state(&self) -> Result<StakingState, ReportError> {
        match self.views.staking_state(self.descriptor.service_id).await {
            Reading::Value(raw) => StakingState::from_u8(raw)
                .ok_or_else(|| ChainError::UnknownStakingState(raw).into()),
            Reading::Unavailable { reason } => {
                Err(ChainError::StateUnavailable(reason).into())
            }
        }
    }

    /// Reward from the service-info tuple, falling back to the flat
    /// `mapServiceInfo` getter on shape mismatch. Zero and unavailable are
    /// never conflated: a genuine zero reward stays `Value(0)`.
    async fn evaluate_rewards(&self, service_info: &Reading<ServiceInfoView>) -> Reading<U256> {
        match service_info {
            Reading::Value(info) => Reading::Value(info.reward),
            Reading::Unavailable { reason } => {
                tracing::debug!(
                    "[REPORT] getServiceInfo unavailable ({}); trying mapServiceInfo fallback",
                    reason
                );
                match self
                    .views
                    .map_service_info_reward(self.descriptor.service_id)
                    .await
                {
                    Reading::Value(reward) => Reading::Value(reward),
                    Reading::Unavailable { .. } => Reading::Unavailable {
                        reason: reason.clone(),
                    },
                }
            }
        }
    }

    async fn evaluate_deposits(
        &self,
        service_info: &Reading<ServiceInfoView>,
    ) -> Reading<DepositInfo> {
        let registry = match self.views.registry_token_utility().await {
            Reading::Value(registry) => registry,
            Reading::Unavailable { reason } => return Reading::Unavailable { reason },
        };

        let min_required = self.views.min_staking_deposit().await;
        let owner = service_info.value().map(|info| info.owner);

        let mut entries = Vec::new();
        if let Some(owner) = owner {
            entries.push(
                self.deposit_entry(DepositHolder::Owner, registry, owner, &min_required)
                    .await,
            );
        }
        // A service may have been registered by an address different from its
        // runtime agent signer; check both as independent candidates.
        if let Some(agent) = self.descriptor.agent_address {
            if owner != Some(agent) {
                entries.push(
                    self.deposit_entry(DepositHolder::Agent, registry, agent, &min_required)
                        .await,
                );
            }
        }

        let agent_bond = self
            .views
            .agent_bond(registry, self.descriptor.service_id, self.descriptor.agent_id)
            .await;
        let agent_bond_below_minimum = below_minimum(&agent_bond, &min_required);

        Reading::Value(DepositInfo {
            entries,
            agent_bond,
            agent_bond_below_minimum,
            min_required,
        })
    }

    async fn deposit_entry(
        &self,
        holder: DepositHolder,
        registry: Address,
        operator: Address,
        min_required: &Reading<U256>,
    ) -> DepositEntry {
        let amount = self
            .views
            .operator_balance(registry, operator, self.descriptor.service_id)
            .await;
        let flag = below_minimum(&amount, min_required);
        DepositEntry {
            holder,
            address: operator,
            amount,
            below_minimum: flag,
        }
    }

    async fn evaluate_epoch_progress(
        &self,
        service_info: &Reading<ServiceInfoView>,
        state: StakingState,
    ) -> EpochStatus {
        if state == StakingState::Evicted {
            return EpochStatus::Skipped;
        }
        let Some(multisig) = self.descriptor.multisig_address else {
            return EpochStatus::Unavailable {
                reason: "multisig address not configured".to_string(),
            };
        };

        let checker = match self.views.activity_checker().await {
            Reading::Value(checker) => checker,
            Reading::Unavailable { reason } => return EpochStatus::Unavailable { reason },
        };
        let ratio = match self.views.liveness_ratio(checker).await {
            Reading::Value(ratio) => ratio,
            Reading::Unavailable { reason } => return EpochStatus::Unavailable { reason },
        };
        let required = required_transactions(ratio);

        let live_nonces = match self.views.multisig_nonces(checker, multisig).await {
            Reading::Value(nonces) => nonces,
            Reading::Unavailable { reason } => return EpochStatus::Unavailable { reason },
        };
        let current_nonce = live_nonces
            .first()
            .copied()
            .map(u256_to_u64_saturating)
            .unwrap_or(0);
        // Second element of the stored nonce array; absent means a fresh
        // stake with no checkpoint snapshot yet.
        let checkpoint_nonce = service_info
            .value()
            .and_then(|info| info.nonces.get(1))
            .copied()
            .map(u256_to_u64_saturating)
            .unwrap_or(0);

        let since = transactions_since_checkpoint(current_nonce, checkpoint_nonce);
        let progress_fraction = if required == 0 {
            0.0
        } else {
            since as f64 / required as f64
        };

        EpochStatus::Progress(EpochProgress {
            required_transactions: required,
            checkpoint_nonce,
            current_nonce,
            transactions_since_checkpoint: since,
            progress_fraction,
            kpi_met: since >= required,
        })
    }

    async fn evaluate_checkpoint_timing(&self, now: u64) -> Reading<CheckpointTiming> {
        self.views.next_checkpoint_timestamp().await.map(|ts| {
            let next = u256_to_u64_saturating(ts);
            let remaining = (next as i128 - now as i128)
                .clamp(i64::MIN as i128, i64::MAX as i128) as i64;
            CheckpointTiming {
                sampled_at: now,
                next_checkpoint_timestamp: next,
                time_remaining_seconds: remaining,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(n: u64) -> U256 {
        U256::from(n)
    }

    #[test]
    fn required_transactions_rounds_up() {
        // ~1 tx/day: 11574074074074 * 86400 = 999999999999993600, just shy
        // of 1e18, so the ceiling is 1.
        let ratio = U256::from(11_574_074_074_074u64);
        assert_eq!(required_transactions(ratio), 1);
    }

    #[test]
    fn required_transactions_exact_division_does_not_round_up() {
        // 312500000000000 * 86400 == 27e18 exactly (86400 = 2^7*3^3*5^2,
        // and the 3^3 factor comes from the 27).
        let scale = U256::from(10u64).pow(U256::from(18u64));
        let ratio = U256::from(312_500_000_000_000u64);
        assert_eq!(
            ratio * U256::from(SECONDS_PER_DAY),
            scale * U256::from(27u64)
        );
        assert_eq!(required_transactions(ratio), 27);
    }

    #[test]
    fn required_transactions_one_over_exact_rounds_up() {
        let ratio = U256::from(312_500_000_000_000u64) + U256::from(1u64);
        assert_eq!(required_transactions(ratio), 28);
    }

    #[test]
    fn required_transactions_zero_ratio_is_zero() {
        assert_eq!(required_transactions(U256::ZERO), 0);
    }

    #[test]
    fn since_checkpoint_clamps_negative_skew() {
        assert_eq!(transactions_since_checkpoint(5, 2), 3);
        assert_eq!(transactions_since_checkpoint(2, 5), 0);
        assert_eq!(transactions_since_checkpoint(0, u64::MAX), 0);
        assert_eq!(transactions_since_checkpoint(7, 7), 0);
    }

    #[test]
    fn below_minimum_is_strict() {
        let min = Reading::Value(wei(100));
        assert_eq!(below_minimum(&Reading::Value(wei(99)), &min), Some(true));
        assert_eq!(below_minimum(&Reading::Value(wei(100)), &min), Some(false));
        assert_eq!(below_minimum(&Reading::Value(wei(101)), &min), Some(false));
    }

    #[test]
    fn below_minimum_unknown_when_either_side_unavailable() {
        let min = Reading::Value(wei(100));
        let gone: Reading<U256> = Reading::unavailable("revert");
        assert_eq!(below_minimum(&gone, &min), None);
        assert_eq!(below_minimum(&Reading::Value(wei(1)), &gone), None);
    }

    #[test]
    fn staking_state_mapping_is_verbatim() {
        assert_eq!(StakingState::from_u8(0), Some(StakingState::Unstaked));
        assert_eq!(StakingState::from_u8(1), Some(StakingState::Staked));
        assert_eq!(StakingState::from_u8(2), Some(StakingState::Evicted));
        assert_eq!(StakingState::from_u8(3), None);
        assert!(StakingState::Evicted.is_staked());
        assert!(!StakingState::Unstaked.is_staked());
    }

    #[test]
    fn eviction_advisory_names_the_recovery_action() {
        assert!(Advisory::Evicted.text().contains("unstake and re-stake"));
    }
}
