//! The buy-lot store.
//!
//! An ordered sequence of [`BuyLot`] keyed uniquely by `order_link_id`.
//! Every mutation persists the full file atomically: serialize to a
//! sibling temp file, then rename over the original, so a crash never
//! leaves a partial write observable.

use crate::error::{LedgerError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use trail_core::{BuyLot, ClientOrderId, LotStatus, Qty};

/// The buy-lot ledger.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    lots: Vec<BuyLot>,
}

impl Ledger {
    /// Load the ledger from disk.
    ///
    /// A missing file is fatal; empty or malformed content is treated as
    /// an empty lot list (the file may simply not have been filled yet).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LedgerError::FileMissing(path));
            }
            Err(e) => return Err(e.into()),
        };

        let lots: Vec<BuyLot> = if content.trim().is_empty() {
            Vec::new()
        } else {
            match serde_json::from_str(&content) {
                Ok(lots) => lots,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ledger file unreadable, starting with an empty lot list");
                    Vec::new()
                }
            }
        };

        let ledger = Self { path, lots };
        ledger.announce_stats();
        Ok(ledger)
    }

    /// Create an empty ledger at a path, writing the (empty) file.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let ledger = Self {
            path: path.into(),
            lots: Vec::new(),
        };
        ledger.save()?;
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lots(&self) -> &[BuyLot] {
        &self.lots
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Total executed quantity across all lots, in base units.
    pub fn total_qty(&self) -> Qty {
        Qty::new(self.lots.iter().map(|lot| lot.cum_exec_qty.inner()).sum())
    }

    /// Register a buy lot. If a lot with the same link id exists it is
    /// replaced, otherwise the lot is appended; the ledger never holds
    /// two lots with one link id.
    pub fn register_buy(&mut self, lot: BuyLot) -> Result<()> {
        match self
            .lots
            .iter_mut()
            .find(|existing| existing.order_link_id == lot.order_link_id)
        {
            Some(existing) => *existing = lot,
            None => self.lots.push(lot),
        }
        self.save()
    }

    /// Remove the lot carrying an exchange order id. Reports whether
    /// anything was removed; a miss is logged, not an error.
    pub fn remove_by_order_id(&mut self, order_id: &str) -> Result<bool> {
        let before = self.lots.len();
        self.lots.retain(|lot| lot.order_id != order_id);
        let removed = self.lots.len() < before;
        if removed {
            info!(order_id, "Lot removed from ledger");
        } else {
            warn!(order_id, "Lot slated for removal was not in the ledger");
        }
        self.save()?;
        Ok(removed)
    }

    /// Remove all lots matched by a completed sell.
    pub fn register_sell(&mut self, sold: &[ClientOrderId]) -> Result<usize> {
        let before = self.lots.len();
        self.lots
            .retain(|lot| !sold.contains(&lot.order_link_id));
        let removed = before - self.lots.len();
        info!(removed, "Lots sold off via trailing sell");
        self.save()?;
        Ok(removed)
    }

    /// Mark a lot as closed after its buy order filled, refreshing the
    /// execution fields from the final order snapshot.
    pub fn close_lot(&mut self, lot: BuyLot) -> Result<()> {
        debug_assert_eq!(lot.status, LotStatus::Closed);
        self.register_buy(lot)
    }

    /// Reconcile against the wallet: while the ledger claims more base
    /// quantity than the wallet holds, discard the highest-priced lot.
    ///
    /// Returns the discarded quantity. The highest-price policy is kept
    /// as observed in production; see DESIGN.md for the trade-off.
    pub fn rebalance(&mut self, wallet_qty: Qty) -> Result<Qty> {
        let initial = self.total_qty();
        let mut total = initial;

        while total > wallet_qty {
            let highest = self
                .lots
                .iter()
                .enumerate()
                .max_by_key(|(_, lot)| lot.avg_price);
            match highest {
                Some((idx, _)) => {
                    let lot = self.lots.remove(idx);
                    info!(
                        link_id = %lot.order_link_id,
                        avg_price = %lot.avg_price,
                        qty = %lot.cum_exec_qty,
                        "Rebalance discarded lot"
                    );
                }
                None => break,
            }
            total = self.total_qty();
        }

        let discarded = initial - total;
        if discarded.is_positive() {
            warn!(
                discarded = %discarded,
                wallet = %wallet_qty,
                "Ledger rebalanced against exchange holdings"
            );
            self.save()?;
        } else {
            info!(
                ledger = %total,
                wallet = %wallet_qty,
                "Ledger consistent with exchange holdings"
            );
        }
        Ok(discarded)
    }

    /// Replace the whole lot list (startup order verification).
    pub fn replace_all(&mut self, lots: Vec<BuyLot>) -> Result<()> {
        self.lots = lots;
        self.save()
    }

    /// Persist the current lot list: temp file in the same directory,
    /// then atomic rename.
    fn save(&self) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        let json = serde_json::to_string(&self.lots)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        self.announce_stats();
        Ok(())
    }

    fn announce_stats(&self) {
        info!(
            lots = self.lots.len(),
            total_qty = %self.total_qty(),
            "Ledger state"
        );
    }
}
