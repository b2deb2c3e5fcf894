//! # Ledger Adapter
//!
//! The engine's seam to wherever balances actually live. Two operations
//! only:
//!
//! - `debit` — fallible: the party may not exist or may lack funds.
//! - `credit` — infallible by contract: a credit to an unknown party
//!   creates the account at zero and applies the credit.
//!
//! The infallible credit is what makes the settlement paths sound: once
//! a terminal transition has committed, the follow-up credits cannot be
//! refused, so an escrow can never strand funds between accounts.
//!
//! [`MemoryLedger`] is the in-process implementation used in production
//! when no database is configured, and in every test.

use dashmap::DashMap;
use sekur_core::{CurrencyCode, MinorAmount, PartyId};

// ── Errors ─────────────────────────────────────────────────────────────

/// Failure modes of a ledger debit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// No account exists for the party in this currency.
    #[error("no account for party {party} in {currency}")]
    UnknownAccount {
        party: PartyId,
        currency: CurrencyCode,
    },
    /// The account exists but cannot cover the debit.
    #[error("insufficient funds for {party}: required {required}, available {available}")]
    InsufficientFunds {
        party: PartyId,
        required: i64,
        available: i64,
    },
}

// ── Trait ──────────────────────────────────────────────────────────────

/// Balance storage seam. Implementations must make `debit` atomic with
/// respect to concurrent debits of the same account: the check and the
/// subtraction happen under one lock or one compare-and-swap.
pub trait LedgerAdapter: Send + Sync {
    /// Remove `amount` from the party's balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownAccount`] if the account does not exist,
    /// [`LedgerError::InsufficientFunds`] if the balance cannot cover
    /// the debit. On error the balance is unchanged.
    fn debit(
        &self,
        party: &PartyId,
        currency: &CurrencyCode,
        amount: MinorAmount,
    ) -> Result<(), LedgerError>;

    /// Add `amount` to the party's balance, creating the account at
    /// zero if it does not exist. Cannot fail.
    fn credit(&self, party: &PartyId, currency: &CurrencyCode, amount: i64);

    /// Current balance, zero for unknown accounts.
    fn balance_of(&self, party: &PartyId, currency: &CurrencyCode) -> i64;
}

// ── In-Memory Implementation ───────────────────────────────────────────

/// Concurrent in-memory ledger keyed by `(party, currency)`.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    accounts: DashMap<(PartyId, CurrencyCode), i64>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a balance directly. Test and bootstrap helper.
    pub fn deposit(&self, party: &PartyId, currency: &CurrencyCode, amount: i64) {
        self.credit(party, currency, amount);
    }

    /// Snapshot of all non-zero accounts, for diagnostics.
    pub fn snapshot(&self) -> Vec<(PartyId, CurrencyCode, i64)> {
        self.accounts
            .iter()
            .filter(|entry| *entry.value() != 0)
            .map(|entry| {
                let (party, currency) = entry.key().clone();
                (party, currency, *entry.value())
            })
            .collect()
    }

    /// Sum of every balance in the given currency. Conservation checks.
    pub fn total(&self, currency: &CurrencyCode) -> i64 {
        self.accounts
            .iter()
            .filter(|entry| &entry.key().1 == currency)
            .map(|entry| *entry.value())
            .sum()
    }
}

impl LedgerAdapter for MemoryLedger {
    fn debit(
        &self,
        party: &PartyId,
        currency: &CurrencyCode,
        amount: MinorAmount,
    ) -> Result<(), LedgerError> {
        let key = (party.clone(), currency.clone());
        // Entry lock makes the check-and-subtract atomic per account.
        match self.accounts.get_mut(&key) {
            None => Err(LedgerError::UnknownAccount {
                party: party.clone(),
                currency: currency.clone(),
            }),
            Some(mut balance) => {
                let required = amount.get();
                if *balance < required {
                    return Err(LedgerError::InsufficientFunds {
                        party: party.clone(),
                        required,
                        available: *balance,
                    });
                }
                *balance -= required;
                Ok(())
            }
        }
    }

    fn credit(&self, party: &PartyId, currency: &CurrencyCode, amount: i64) {
        let key = (party.clone(), currency.clone());
        *self.accounts.entry(key).or_insert(0) += amount;
    }

    fn balance_of(&self, party: &PartyId, currency: &CurrencyCode) -> i64 {
        self.accounts
            .get(&(party.clone(), currency.clone()))
            .map(|b| *b)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn party(s: &str) -> PartyId {
        PartyId::new(s).unwrap()
    }

    fn gnf() -> CurrencyCode {
        CurrencyCode::new("GNF").unwrap()
    }

    fn amt(n: i64) -> MinorAmount {
        MinorAmount::new(n).unwrap()
    }

    #[test]
    fn debit_unknown_account() {
        let ledger = MemoryLedger::new();
        let err = ledger.debit(&party("ghost"), &gnf(), amt(100)).unwrap_err();
        assert!(matches!(err, LedgerError::UnknownAccount { .. }));
    }

    #[test]
    fn debit_insufficient_funds_leaves_balance() {
        let ledger = MemoryLedger::new();
        ledger.deposit(&party("alice"), &gnf(), 50);
        let err = ledger.debit(&party("alice"), &gnf(), amt(100)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                party: party("alice"),
                required: 100,
                available: 50,
            }
        );
        assert_eq!(ledger.balance_of(&party("alice"), &gnf()), 50);
    }

    #[test]
    fn debit_then_credit() {
        let ledger = MemoryLedger::new();
        ledger.deposit(&party("alice"), &gnf(), 10_000);
        ledger.debit(&party("alice"), &gnf(), amt(2_500)).unwrap();
        assert_eq!(ledger.balance_of(&party("alice"), &gnf()), 7_500);

        ledger.credit(&party("bob"), &gnf(), 2_500);
        assert_eq!(ledger.balance_of(&party("bob"), &gnf()), 2_500);
    }

    #[test]
    fn credit_creates_account() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.balance_of(&party("new"), &gnf()), 0);
        ledger.credit(&party("new"), &gnf(), 42);
        assert_eq!(ledger.balance_of(&party("new"), &gnf()), 42);
    }

    #[test]
    fn balances_are_per_currency() {
        let ledger = MemoryLedger::new();
        let usd = CurrencyCode::new("USD").unwrap();
        ledger.deposit(&party("alice"), &gnf(), 100);
        assert_eq!(ledger.balance_of(&party("alice"), &usd), 0);
        let err = ledger.debit(&party("alice"), &usd, amt(1)).unwrap_err();
        assert!(matches!(err, LedgerError::UnknownAccount { .. }));
    }

    #[test]
    fn total_sums_currency() {
        let ledger = MemoryLedger::new();
        ledger.deposit(&party("a"), &gnf(), 100);
        ledger.deposit(&party("b"), &gnf(), 250);
        ledger.deposit(&party("c"), &CurrencyCode::new("USD").unwrap(), 999);
        assert_eq!(ledger.total(&gnf()), 350);
    }

    #[test]
    fn concurrent_debits_never_overdraw() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.deposit(&party("alice"), &gnf(), 1_000);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    let mut succeeded = 0u32;
                    for _ in 0..100 {
                        if ledger.debit(&party("alice"), &gnf(), amt(10)).is_ok() {
                            succeeded += 1;
                        }
                    }
                    succeeded
                })
            })
            .collect();

        let total_succeeded: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total_succeeded, 100);
        assert_eq!(ledger.balance_of(&party("alice"), &gnf()), 0);
    }
}
