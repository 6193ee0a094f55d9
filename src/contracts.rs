//! Typed view surface of the staking stack: the staking contract itself, the
//! activity checker it points at, and the service registry token utility.
//!
//! ABI fragments mirror the deployed contracts. `mapServiceInfo` is the flat
//! public-mapping getter kept as a reward fallback for staking contract
//! versions whose `getServiceInfo` tuple shape differs.

use crate::chain::{Connection, Reading};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;

alloy::sol! {
    struct StoredServiceInfo {
        address multisig;
        address owner;
        uint256[] nonces;
        uint256 tsStart;
        uint256 reward;
        uint256[] inactivity;
    }

    // Staking contract
    function getStakingState(uint256 serviceId) external view returns (uint8 state);
    function getServiceInfo(uint256 serviceId) external view returns (StoredServiceInfo info);
    function mapServiceInfo(uint256 serviceId) external view
        returns (address multisig, address owner, uint256[] memory nonces, uint256 reward, uint256[] memory inactivity);
    function minStakingDeposit() external view returns (uint256 amount);
    function activityChecker() external view returns (address checker);
    function serviceRegistryTokenUtility() external view returns (address registry);
    function getNextRewardCheckpointTimestamp() external view returns (uint256 timestamp);

    // Activity checker
    function livenessRatio() external view returns (uint256 ratio);
    function getMultisigNonces(address multisig) external view returns (uint256[] memory nonces);

    // Service registry token utility
    function getOperatorBalance(address operator, uint256 serviceId) external view returns (uint256 balance);
    function getAgentBond(uint256 serviceId, uint256 agentId) external view returns (uint256 bond);
}

/// Decoded `getServiceInfo` tuple, minus fields the report never uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfoView {
    pub multisig: Address,
    pub owner: Address,
    /// Nonce snapshot recorded at the last checkpoint.
    pub nonces: Vec<U256>,
    pub reward: U256,
}

/// The evaluator's seam onto the chain. Every method is a single view call
/// whose failure degrades to `Reading::Unavailable`.
#[async_trait]
pub trait StakingViews: Send + Sync {
    async fn staking_state(&self, service_id: u64) -> Reading<u8>;
    async fn service_info(&self, service_id: u64) -> Reading<ServiceInfoView>;
    async fn map_service_info_reward(&self, service_id: u64) -> Reading<U256>;
    async fn min_staking_deposit(&self) -> Reading<U256>;
    async fn activity_checker(&self) -> Reading<Address>;
    async fn registry_token_utility(&self) -> Reading<Address>;
    async fn next_checkpoint_timestamp(&self) -> Reading<U256>;
    async fn liveness_ratio(&self, checker: Address) -> Reading<U256>;
    async fn multisig_nonces(&self, checker: Address, multisig: Address) -> Reading<Vec<U256>>;
    async fn operator_balance(
        &self,
        registry: Address,
        operator: Address,
        service_id: u64,
    ) -> Reading<U256>;
    async fn agent_bond(&self, registry: Address, service_id: u64, agent_id: u64) -> Reading<U256>;
}

/// Live implementation over an established RPC connection.
pub struct OnchainViews {
    connection: Connection,
    staking_contract: Address,
}

impl OnchainViews {
    pub fn new(connection: Connection, staking_contract: Address) -> Self {
        Self {
            connection,
            staking_contract,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.connection.endpoint()
    }
}

#[async_trait]
impl StakingViews for OnchainViews {
    async fn staking_state(&self, service_id: u64) -> Reading<u8> {
        self.connection
            .view_call(
                self.staking_contract,
                getStakingStateCall {
                    serviceId: U256::from(service_id),
                },
            )
            .await
            .map(|ret| ret.state)
    }

    async fn service_info(&self, service_id: u64) -> Reading<ServiceInfoView> {
        self.connection
            .view_call(
                self.staking_contract,
                getServiceInfoCall {
                    serviceId: U256::from(service_id),
                },
            )
            .await
            .map(|ret| ServiceInfoView {
                multisig: ret.info.multisig,
                owner: ret.info.owner,
                nonces: ret.info.nonces,
                reward: ret.info.reward,
            })
    }

    async fn map_service_info_reward(&self, service_id: u64) -> Reading<U256> {
        self.connection
            .view_call(
                self.staking_contract,
                mapServiceInfoCall {
                    serviceId: U256::from(service_id),
                },
            )
            .await
            .map(|ret| ret.reward)
    }

    async fn min_staking_deposit(&self) -> Reading<U256> {
        self.connection
            .view_call(self.staking_contract, minStakingDepositCall {})
            .await
            .map(|ret| ret.amount)
    }

    async fn activity_checker(&self) -> Reading<Address> {
        self.connection
            .view_call(self.staking_contract, activityCheckerCall {})
            .await
            .map(|ret| ret.checker)
    }

    async fn registry_token_utility(&self) -> Reading<Address> {
        self.connection
            .view_call(self.staking_contract, serviceRegistryTokenUtilityCall {})
            .await
            .map(|ret| ret.registry)
    }

    async fn next_checkpoint_timestamp(&self) -> Reading<U256> {
        self.connection
            .view_call(self.staking_contract, getNextRewardCheckpointTimestampCall {})
            .await
            .map(|ret| ret.timestamp)
    }

    async fn liveness_ratio(&self, checker: Address) -> Reading<U256> {
        self.connection
            .view_call(checker, livenessRatioCall {})
            .await
            .map(|ret| ret.ratio)
    }

    async fn multisig_nonces(&self, checker: Address, multisig: Address) -> Reading<Vec<U256>> {
        self.connection
            .view_call(checker, getMultisigNoncesCall { multisig })
            .await
            .map(|ret| ret.nonces)
    }

    async fn operator_balance(
        &self,
        registry: Address,
        operator: Address,
        service_id: u64,
    ) -> Reading<U256> {
        self.connection
            .view_call(
                registry,
                getOperatorBalanceCall {
                    operator,
                    serviceId: U256::from(service_id),
                },
            )
            .await
            .map(|ret| ret.balance)
    }

    async fn agent_bond(&self, registry: Address, service_id: u64, agent_id: u64) -> Reading<U256> {
        self.connection
            .view_call(
                registry,
                getAgentBondCall {
                    serviceId: U256::from(service_id),
                    agentId: U256::from(agent_id),
                },
            )
            .await
            .map(|ret| ret.bond)
    }
}
