//! Terminal rendering of a computed report. Consumes facts only; no contract
//! access happens here.

use crate::chain::Reading;
use crate::config::chains::ChainConfig;
use crate::evaluator::{EpochStatus, Report, StakingState};
use alloy::primitives::U256;
use chrono::DateTime;

const BANNER_WIDTH: usize = 70;
const LABEL_WIDTH: usize = 45;
const BAR_CELLS: usize = 50;

/// Explicit ANSI table passed into the renderer; no process-wide color state.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub red: &'static str,
    pub yellow: &'static str,
    pub green: &'static str,
    pub cyan: &'static str,
    pub bold: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn ansi() -> Self {
        Self {
            red: "\x1b[91m",
            yellow: "\x1b[93m",
            green: "\x1b[92m",
            cyan: "\x1b[96m",
            bold: "\x1b[1m",
            reset: "\x1b[0m",
        }
    }

    /// For NO_COLOR and non-tty output.
    pub fn plain() -> Self {
        Self {
            red: "",
            yellow: "",
            green: "",
            cyan: "",
            bold: "",
            reset: "",
        }
    }
}

/// Controls which report sections are rendered; one code path with
/// profile-gated sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportProfile {
    /// Status and timing only.
    Minimal,
    /// Everything: deposits, bonds and epoch progress included.
    Full,
}

impl ReportProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Full => "full",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "minimal" => Some(Self::Minimal),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    pub fn from_env() -> Self {
        std::env::var("STAKING_REPORT_PROFILE")
            .ok()
            .and_then(|raw| Self::parse(&raw))
            .unwrap_or(Self::Full)
    }
}

/// Exact wei-to-token display with six fractional digits. Integer div/rem
/// only; float rounding must not touch amounts compared against minimums.
pub fn format_token(wei: U256, symbol: &str) -> String {
    let scale = U256::from(10u64).pow(U256::from(18u64));
    let whole = wei / scale;
    let frac_unit = U256::from(10u64).pow(U256::from(12u64));
    let frac = (wei % scale) / frac_unit;
    format!(
        "{whole}.{:06} {symbol}",
        u64::try_from(frac).unwrap_or(0)
    )
}

pub fn format_duration(seconds: i64) -> String {
    if seconds < 0 {
        return "Epoch ended".to_string();
    }
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || parts.is_empty() {
        parts.push(format!("{minutes}m"));
    }
    parts.join(" ")
}

pub fn format_timestamp(unix_seconds: u64) -> String {
    match DateTime::from_timestamp(unix_seconds as i64, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("@{unix_seconds}"),
    }
}

/// 50-cell bar over a fraction clamped to [0,1] for display.
pub fn progress_bar(fraction: f64) -> String {
    let clamped = fraction.clamp(0.0, 1.0);
    let filled = (clamped * BAR_CELLS as f64).floor() as usize;
    let filled = filled.min(BAR_CELLS);
    format!(
        "[{}{}]",
        "█".repeat(filled),
        "░".repeat(BAR_CELLS - filled)
    )
}

pub struct Renderer<'a> {
    palette: Palette,
    profile: ReportProfile,
    chain: &'a ChainConfig,
}

impl<'a> Renderer<'a> {
    pub fn new(palette: Palette, profile: ReportProfile, chain: &'a ChainConfig) -> Self {
        Self {
            palette,
            profile,
            chain,
        }
    }

    pub fn render(&self, report: &Report) -> String {
        let mut out = String::new();
        self.header(&mut out, "STAKING STATUS REPORT");
        self.identity_section(&mut out, report);
        self.status_section(&mut out, report);

        if report.state == StakingState::Unstaked {
            out.push_str(&format!(
                "\n{}Service is not staked. Nothing to report.{}\n",
                self.palette.yellow, self.palette.reset
            ));
            return out;
        }

        if self.profile == ReportProfile::Full {
            self.deposits_section(&mut out, report);
            self.epoch_section(&mut out, report);
        }
        self.timing_section(&mut out, report);
        self.summary_section(&mut out, report);
        out
    }

    fn header(&self, out: &mut String, title: &str) {
        let rule = "=".repeat(BANNER_WIDTH);
        out.push_str(&format!(
            "\n{}{}{}{}\n{}{}{:^width$}{}\n{}{}{}{}\n\n",
            self.palette.bold,
            self.palette.cyan,
            rule,
            self.palette.reset,
            self.palette.bold,
            self.palette.cyan,
            title,
            self.palette.reset,
            self.palette.bold,
            self.palette.cyan,
            rule,
            self.palette.reset,
            width = BANNER_WIDTH
        ));
    }

    fn item(&self, out: &mut String, label: &str, value: &str) {
        out.push_str(&format!(
            "  {:.<width$} {}\n",
            label,
            value,
            width = LABEL_WIDTH
        ));
    }

    fn warn(&self, out: &mut String, message: &str) {
        out.push_str(&format!(
            "  {}⚠ {}{}\n",
            self.palette.yellow, message, self.palette.reset
        ));
    }

    fn ok(&self, out: &mut String, message: &str) {
        out.push_str(&format!(
            "  {}✓ {}{}\n",
            self.palette.green, message, self.palette.reset
        ));
    }

    fn unavailable(&self, reason: &str) -> String {
        format!(
            "{}Unable to retrieve ({}){}",
            self.palette.yellow, reason, self.palette.reset
        )
    }

    fn token_reading(&self, reading: &Reading<U256>) -> String {
        match reading {
            Reading::Value(wei) => format_token(*wei, &self.chain.staking_token_symbol),
            Reading::Unavailable { reason } => self.unavailable(reason),
        }
    }

    fn identity_section(&self, out: &mut String, report: &Report) {
        self.item(out, "Service ID", &report.service_id.to_string());
        self.item(
            out,
            "Staking program",
            &format!("{} ({})", report.staking_program_id, self.chain.name),
        );
        self.item(
            out,
            "Staking contract",
            &format!("{:#x}", report.staking_contract),
        );
        if let Some(multisig) = report.multisig {
            self.item(out, "Multisig", &format!("{multisig:#x}"));
        }
        if let Some(agent) = report.agent_address {
            self.item(out, "Agent address", &format!("{agent:#x}"));
        }
        self.item(out, "Agent ID", &report.agent_id.to_string());
    }

    fn status_section(&self, out: &mut String, report: &Report) {
        self.header(out, "STAKING STATUS");
        let state_color = match report.state {
            StakingState::Unstaked => self.palette.yellow,
            StakingState::Staked => self.palette.green,
            StakingState::Evicted => self.palette.red,
        };
        let staked = if report.state.is_staked() {
            format!("{}Yes{}", self.palette.green, self.palette.reset)
        } else {
            format!("{}No{}", self.palette.red, self.palette.reset)
        };
        self.item(out, "Service staked?", &staked);
        self.item(
            out,
            "Staking state",
            &format!("{}{}{}", state_color, report.state.as_str(), self.palette.reset),
        );
        if let Some(rewards) = &report.rewards {
            self.item(out, "Accrued rewards", &self.token_reading(rewards));
        }
    }

    fn deposits_section(&self, out: &mut String, report: &Report) {
        self.header(out, "SECURITY DEPOSITS & BONDS");
        let Some(deposits) = &report.deposits else {
            return;
        };
        match deposits {
            Reading::Unavailable { reason } => {
                self.warn(out, &format!("Could not retrieve deposit information ({reason})"));
            }
            Reading::Value(info) => {
                if info.entries.is_empty() {
                    self.warn(out, "Could not retrieve deposit balances");
                }
                for entry in &info.entries {
                    let mut value = self.token_reading(&entry.amount);
                    if entry.below_minimum == Some(true) {
                        value.push_str(&format!(
                            " {}(Too low!){}",
                            self.palette.yellow, self.palette.reset
                        ));
                    }
                    self.item(out, entry.holder.label(), &value);
                }
                let mut bond = self.token_reading(&info.agent_bond);
                if info.agent_bond_below_minimum == Some(true) {
                    bond.push_str(&format!(
                        " {}(Too low!){}",
                        self.palette.yellow, self.palette.reset
                    ));
                }
                self.item(out, "Agent bond", &bond);
                self.item(out, "Min deposit required", &self.token_reading(&info.min_required));
            }
        }
    }

    fn epoch_section(&self, out: &mut String, report: &Report) {
        self.header(out, "EPOCH PROGRESS");
        match &report.epoch {
            EpochStatus::Skipped => {
                self.warn(out, "Epoch tracking suspended for evicted services");
            }
            EpochStatus::Unavailable { reason } => {
                self.warn(out, &format!("Could not compute epoch progress ({reason})"));
            }
            EpochStatus::NotEvaluated => {}
            EpochStatus::Progress(progress) => {
                self.item(out, "Total transactions", &progress.current_nonce.to_string());
                self.item(out, "Checkpoint nonce", &progress.checkpoint_nonce.to_string());
                self.item(
                    out,
                    "Transactions since checkpoint",
                    &progress.transactions_since_checkpoint.to_string(),
                );
                self.item(
                    out,
                    "Required per epoch",
                    &progress.required_transactions.to_string(),
                );
                let pct = (progress.progress_fraction * 100.0).clamp(0.0, 100.0);
                let color = if progress.kpi_met {
                    self.palette.green
                } else {
                    self.palette.yellow
                };
                self.item(
                    out,
                    "KPI status",
                    &format!(
                        "{} {}{:.1}%{}",
                        progress_bar(progress.progress_fraction),
                        color,
                        pct,
                        self.palette.reset
                    ),
                );
                if progress.kpi_met {
                    self.ok(
                        out,
                        &format!(
                            "KPI met ({} transactions above threshold)",
                            progress
                                .transactions_since_checkpoint
                                .saturating_sub(progress.required_transactions)
                        ),
                    );
                }
            }
        }
    }

    fn timing_section(&self, out: &mut String, report: &Report) {
        self.header(out, "EPOCH TIMING");
        let Some(timing) = &report.timing else {
            return;
        };
        match timing {
            Reading::Unavailable { reason } => {
                self.warn(out, &format!("Could not fetch epoch timing ({reason})"));
            }
            Reading::Value(timing) => {
                self.item(out, "Current time", &format_timestamp(timing.sampled_at));
                self.item(
                    out,
                    "Epoch ends at",
                    &format_timestamp(timing.next_checkpoint_timestamp),
                );
                self.item(
                    out,
                    "Time remaining",
                    &format_duration(timing.time_remaining_seconds),
                );
            }
        }
    }

    fn summary_section(&self, out: &mut String, report: &Report) {
        self.header(out, "SUMMARY");
        match report.state {
            StakingState::Staked => {
                self.ok(out, "Service is actively staked and earning rewards");
            }
            StakingState::Evicted => {
                out.push_str(&format!(
                    "  {}✗ Service has been evicted - action required{}\n",
                    self.palette.red, self.palette.reset
                ));
            }
            StakingState::Unstaked => {}
        }
        if let EpochStatus::Progress(progress) = &report.epoch {
            self.item(
                out,
                "Epoch KPI",
                &format!(
                    "{} / {} txs",
                    progress.transactions_since_checkpoint, progress.required_transactions
                ),
            );
        }
        for advisory in &report.advisories {
            self.warn(out, &advisory.text());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Advisory, EpochProgress};
    use alloy::primitives::Address;

    #[test]
    fn token_formatting_is_exact_at_the_boundary() {
        let one = U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(format_token(one, "OLAS"), "1.000000 OLAS");
        assert_eq!(
            format_token(one - U256::from(1u64), "OLAS"),
            "0.999999 OLAS"
        );
        assert_eq!(format_token(U256::ZERO, "OLAS"), "0.000000 OLAS");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(-5), "Epoch ended");
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(1_800), "30m");
        assert_eq!(format_duration(90_061), "1d 1h 1m");
        assert_eq!(format_duration(3_600), "1h");
    }

    #[test]
    fn timestamp_formatting_is_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn progress_bar_clamps_display_only() {
        assert_eq!(progress_bar(0.0), format!("[{}]", "░".repeat(50)));
        assert_eq!(progress_bar(1.0), format!("[{}]", "█".repeat(50)));
        // Over-achievement renders full, never overflows the bar.
        assert_eq!(progress_bar(3.5), format!("[{}]", "█".repeat(50)));
        let half = progress_bar(0.5);
        assert_eq!(half.chars().filter(|c| *c == '█').count(), 25);
    }

    #[test]
    fn minimal_profile_omits_deposit_and_epoch_sections() {
        let chain = ChainConfig::gnosis();
        let report = Report {
            service_id: 7,
            staking_program_id: "test".to_string(),
            staking_contract: Address::ZERO,
            multisig: None,
            agent_address: None,
            agent_id: 14,
            state: StakingState::Staked,
            rewards: Some(Reading::Value(U256::ZERO)),
            deposits: Some(Reading::unavailable("revert")),
            epoch: EpochStatus::Progress(EpochProgress {
                required_transactions: 1,
                checkpoint_nonce: 0,
                current_nonce: 1,
                transactions_since_checkpoint: 1,
                progress_fraction: 1.0,
                kpi_met: true,
            }),
            timing: None,
            advisories: vec![Advisory::EpochOverdue],
        };
        let minimal = Renderer::new(Palette::plain(), ReportProfile::Minimal, &chain)
            .render(&report);
        assert!(!minimal.contains("SECURITY DEPOSITS"));
        assert!(!minimal.contains("EPOCH PROGRESS"));
        let full = Renderer::new(Palette::plain(), ReportProfile::Full, &chain).render(&report);
        assert!(full.contains("SECURITY DEPOSITS"));
        assert!(full.contains("EPOCH PROGRESS"));
    }

    #[test]
    fn unavailable_reward_is_not_rendered_as_zero() {
        let chain = ChainConfig::gnosis();
        let renderer = Renderer::new(Palette::plain(), ReportProfile::Full, &chain);
        let gone: Reading<U256> = Reading::unavailable("decode mismatch");
        let rendered = renderer.token_reading(&gone);
        assert!(rendered.contains("Unable to retrieve"));
        assert!(!rendered.contains("0.000000"));
    }
}
