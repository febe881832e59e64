//! Simulation report generation.

use crate::core::types::Tier;
use serde::Serialize;

/// Counters collected during one simulated playthrough.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub actions: u64,
    pub clicks: u64,
    /// Actions spent waiting for regeneration
    pub idle_actions: u64,
    /// Unlocks by tier: cheap, moderate, epic
    pub unlocks: [u64; 3],
    pub draws: u64,
    pub redraws: u64,
    pub refreshes: u64,
    pub power_earned: u64,
    pub keys_earned: u64,
    pub key_items_played: u64,
    pub cleared: bool,
    pub library_size: usize,
}

impl RunStats {
    pub fn record_unlock(&mut self, tier: Tier) {
        let index = match tier {
            Tier::Cheap => 0,
            Tier::Moderate => 1,
            Tier::Epic => 2,
        };
        self.unlocks[index] += 1;
    }

    pub fn total_unlocks(&self) -> u64 {
        self.unlocks.iter().sum()
    }
}

/// Aggregated results from multiple simulation runs.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub num_runs: u32,
    pub runs_cleared: u32,
    pub runs_timed_out: u32,

    // Aggregated stats
    pub avg_actions: f64,
    pub avg_actions_to_clear: f64,
    pub avg_clicks: f64,
    pub avg_idle_share: f64,
    pub avg_unlocks_by_tier: [f64; 3],
    pub avg_draws: f64,
    pub avg_redraws: f64,
    pub avg_refreshes: f64,
    pub avg_power_earned: f64,
    pub avg_keys_earned: f64,
    pub completion_rate: f64,

    // Individual run stats for detailed analysis
    #[serde(skip)]
    pub run_stats: Vec<RunStats>,
}

fn average(runs: &[RunStats], value: impl Fn(&RunStats) -> f64) -> f64 {
    if runs.is_empty() {
        return 0.0;
    }
    runs.iter().map(value).sum::<f64>() / runs.len() as f64
}

impl SimReport {
    /// Create a new report from completed run stats.
    pub fn from_runs(runs: Vec<RunStats>, max_actions: u64) -> Self {
        let num_runs = runs.len() as u32;
        let runs_cleared = runs.iter().filter(|r| r.cleared).count() as u32;
        let runs_timed_out = runs
            .iter()
            .filter(|r| !r.cleared && r.actions >= max_actions)
            .count() as u32;

        let cleared: Vec<RunStats> = runs.iter().filter(|r| r.cleared).cloned().collect();
        let mut avg_unlocks_by_tier = [0.0; 3];
        for (tier, avg) in avg_unlocks_by_tier.iter_mut().enumerate() {
            *avg = average(&runs, |r| r.unlocks[tier] as f64);
        }

        Self {
            num_runs,
            runs_cleared,
            runs_timed_out,
            avg_actions: average(&runs, |r| r.actions as f64),
            avg_actions_to_clear: average(&cleared, |r| r.actions as f64),
            avg_clicks: average(&runs, |r| r.clicks as f64),
            avg_idle_share: average(&runs, |r| r.idle_actions as f64 / r.actions.max(1) as f64),
            avg_unlocks_by_tier,
            avg_draws: average(&runs, |r| r.draws as f64),
            avg_redraws: average(&runs, |r| r.redraws as f64),
            avg_refreshes: average(&runs, |r| r.refreshes as f64),
            avg_power_earned: average(&runs, |r| r.power_earned as f64),
            avg_keys_earned: average(&runs, |r| r.keys_earned as f64),
            completion_rate: runs_cleared as f64 / num_runs.max(1) as f64 * 100.0,
            run_stats: runs,
        }
    }

    /// Generate a text report.
    pub fn to_text(&self) -> String {
        let mut report = String::new();

        report.push_str("═══════════════════════════════════════════════════════════════\n");
        report.push_str("                    VAULT SIMULATION REPORT\n");
        report.push_str("═══════════════════════════════════════════════════════════════\n\n");

        report.push_str(&format!(
            "Runs: {} total, {} cleared, {} timed out\n\n",
            self.num_runs, self.runs_cleared, self.runs_timed_out
        ));

        report.push_str("── PACING ───────────────────────────────────────────────────────\n");
        report.push_str(&format!("  Avg Actions:          {:.0}\n", self.avg_actions));
        report.push_str(&format!(
            "  Avg Actions to Clear: {:.0}\n",
            self.avg_actions_to_clear
        ));
        report.push_str(&format!("  Avg Clicks:           {:.0}\n", self.avg_clicks));
        report.push_str(&format!(
            "  Idle Share:           {:.1}%\n\n",
            self.avg_idle_share * 100.0
        ));

        report.push_str("── UNLOCKS ──────────────────────────────────────────────────────\n");
        for (tier, avg) in Tier::ALL.iter().zip(self.avg_unlocks_by_tier) {
            report.push_str(&format!("  {:<9} {:>7.1}\n", tier.name(), avg));
        }
        report.push('\n');

        report.push_str("── ECONOMY ──────────────────────────────────────────────────────\n");
        report.push_str(&format!(
            "  Avg Power Earned:     {:.0}\n",
            self.avg_power_earned
        ));
        report.push_str(&format!("  Avg Keys Earned:      {:.1}\n", self.avg_keys_earned));
        report.push_str(&format!("  Avg Draws:            {:.1}\n", self.avg_draws));
        report.push_str(&format!("  Avg Redraws:          {:.1}\n", self.avg_redraws));
        report.push_str(&format!("  Avg Refreshes:        {:.1}\n\n", self.avg_refreshes));

        report.push_str("── BALANCE ASSESSMENT ───────────────────────────────────────────\n");
        report.push_str(&format!("  Completion Rate: {:.1}%\n", self.completion_rate));

        if self.avg_idle_share > 0.5 {
            report.push_str("  ⚠️  Players idle most of the time - drain too fast?\n");
        }
        if self.avg_unlocks_by_tier[2] < 1.0 && self.runs_cleared < self.num_runs {
            report.push_str("  ⚠️  Epic items rarely unlocked - epic costs too high?\n");
        }
        if self.runs_timed_out > self.num_runs / 2 {
            report.push_str("  ⚠️  Most runs never cleared the vault\n");
        }

        report.push_str("\n═══════════════════════════════════════════════════════════════\n");

        report
    }

    /// Generate a JSON report for further analysis.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
