//! Session risk statistics
//!
//! Monotone within a session: trade counts, win/loss tallies and fees
//! never decrease. The daily P&L itself lives in the ledger; this
//! module tracks the execution-derived tallies the risk report needs.

#[derive(Debug, Clone, Default)]
pub struct SessionRisk {
    pub trades_today: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub consecutive_losses: u32,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
    pub last_trade_ns: u64,
    pub session_start_ns: u64,
    pub halted: bool,
    pub halt_reason: Option<String>,
}

impl SessionRisk {
    pub fn new(session_start_ns: u64) -> Self {
        Self { session_start_ns, ..Self::default() }
    }

    /// Record one execution's realised P&L contribution and fee
    pub fn record_execution(&mut self, realized_delta: f64, fee: f64, now_ns: u64) {
        self.trades_today += 1;
        self.total_fees += fee.max(0.0);
        self.last_trade_ns = now_ns;

        if realized_delta > 0.0 {
            self.winning_trades += 1;
            self.consecutive_losses = 0;
            if realized_delta > self.largest_win {
                self.largest_win = realized_delta;
            }
        } else if realized_delta < 0.0 {
            self.losing_trades += 1;
            self.consecutive_losses += 1;
            if realized_delta < self.largest_loss {
                self.largest_loss = realized_delta;
            }
        }
    }

    pub fn set_halted(&mut self, reason: Option<String>) {
        self.halted = reason.is_some();
        self.halt_reason = reason;
    }

    pub fn win_rate(&self) -> f64 {
        let decided = self.winning_trades + self.losing_trades;
        if decided == 0 {
            return 0.0;
        }
        self.winning_trades as f64 / decided as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_monotone() {
        let mut session = SessionRisk::new(0);
        session.record_execution(10.0, 0.5, 1);
        session.record_execution(-4.0, 0.5, 2);
        session.record_execution(-6.0, 0.5, 3);

        assert_eq!(session.trades_today, 3);
        assert_eq!(session.winning_trades, 1);
        assert_eq!(session.losing_trades, 2);
        assert_eq!(session.consecutive_losses, 2);
        assert_eq!(session.largest_win, 10.0);
        assert_eq!(session.largest_loss, -6.0);
        assert!((session.total_fees - 1.5).abs() < 1e-12);
        assert_eq!(session.last_trade_ns, 3);
    }

    #[test]
    fn test_win_resets_consecutive_losses() {
        let mut session = SessionRisk::new(0);
        session.record_execution(-1.0, 0.0, 1);
        session.record_execution(-1.0, 0.0, 2);
        assert_eq!(session.consecutive_losses, 2);
        session.record_execution(2.0, 0.0, 3);
        assert_eq!(session.consecutive_losses, 0);
    }

    #[test]
    fn test_flat_trades_do_not_count_as_wins_or_losses() {
        let mut session = SessionRisk::new(0);
        session.record_execution(0.0, 0.1, 1);
        assert_eq!(session.winning_trades, 0);
        assert_eq!(session.losing_trades, 0);
        assert_eq!(session.trades_today, 1);
        assert_eq!(session.win_rate(), 0.0);
    }

    #[test]
    fn test_rebates_do_not_reduce_fee_total() {
        let mut session = SessionRisk::new(0);
        session.record_execution(1.0, 0.3, 1);
        session.record_execution(1.0, -0.2, 2);
        assert!((session.total_fees - 0.3).abs() < 1e-12);
    }
}
