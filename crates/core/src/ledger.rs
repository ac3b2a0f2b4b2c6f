use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoryforgeError};

/// Credit balance owned outside the pipeline.
pub trait CreditLedger: Send + Sync {
    fn balance(&self) -> u64;

    /// Take `amount` if the balance covers it. Returns `false` and leaves the
    /// balance untouched otherwise.
    fn debit(&self, amount: u64) -> bool;

    fn credit(&self, amount: u64);
}

pub struct InMemoryLedger {
    balance: AtomicU64,
}

impl InMemoryLedger {
    pub fn new(balance: u64) -> Self {
        Self {
            balance: AtomicU64::new(balance),
        }
    }
}

impl CreditLedger for InMemoryLedger {
    fn balance(&self) -> u64 {
        self.balance.load(Ordering::SeqCst)
    }

    fn debit(&self, amount: u64) -> bool {
        self.balance
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| b.checked_sub(amount))
            .is_ok()
    }

    fn credit(&self, amount: u64) {
        let _ = self
            .balance
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| {
                Some(b.saturating_add(amount))
            });
    }
}

#[derive(Serialize, Deserialize)]
struct LedgerFile {
    balance: u64,
}

/// Ledger persisted as a small JSON file after every change.
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    balance: Mutex<u64>,
}

impl FileLedger {
    /// Open the ledger at `path`, creating it with `initial` credits if it
    /// does not exist yet.
    pub fn open(path: &Path, initial: u64) -> Result<Self> {
        let balance = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<LedgerFile>(&content)?.balance,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                write_ledger(path, initial)?;
                initial
            }
            Err(e) => return Err(StoryforgeError::io(path, e)),
        };
        Ok(Self {
            path: path.to_path_buf(),
            balance: Mutex::new(balance),
        })
    }

    fn persist(&self, balance: u64) {
        if let Err(e) = write_ledger(&self.path, balance) {
            tracing::error!(error = %e, path = %self.path.display(), "Failed to persist credit balance");
        }
    }
}

impl CreditLedger for FileLedger {
    fn balance(&self) -> u64 {
        *self.balance.lock().expect("FileLedger poisoned")
    }

    fn debit(&self, amount: u64) -> bool {
        let mut balance = self.balance.lock().expect("FileLedger poisoned");
        let Some(next) = balance.checked_sub(amount) else {
            return false;
        };
        *balance = next;
        self.persist(next);
        true
    }

    fn credit(&self, amount: u64) {
        let mut balance = self.balance.lock().expect("FileLedger poisoned");
        *balance = balance.saturating_add(amount);
        self.persist(*balance);
    }
}

fn write_ledger(path: &Path, balance: u64) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoryforgeError::io(parent, e))?;
    }
    let content = serde_json::to_string_pretty(&LedgerFile { balance })?;
    std::fs::write(path, content).map_err(|e| StoryforgeError::io(path, e))
}

/// Credits debited for one run. Committing keeps the debit; dropping the
/// reservation any other way credits the amount back, once.
pub struct Reservation {
    ledger: Arc<dyn CreditLedger>,
    amount: u64,
    settled: bool,
}

impl Reservation {
    pub fn acquire(ledger: Arc<dyn CreditLedger>, amount: u64) -> Result<Self> {
        if !ledger.debit(amount) {
            return Err(StoryforgeError::InsufficientCredit {
                required: amount,
                available: ledger.balance(),
            });
        }
        tracing::debug!(amount, balance = ledger.balance(), "Credits debited");
        Ok(Self {
            ledger,
            amount,
            settled: false,
        })
    }

    pub fn commit(mut self) {
        self.settled = true;
    }

    pub fn refund(self) {
        drop(self);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.settled = true;
        self.ledger.credit(self.amount);
        tracing::info!(
            amount = self.amount,
            balance = self.ledger.balance(),
            "Credits refunded"
        );
    }
}
