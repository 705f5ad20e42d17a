use log::{debug, info, warn};

use super::Account;
use crate::config::AccountSeed;

/// The fixed roster of accounts, keyed by derived username
#[derive(Debug, Clone, Default)]
pub struct AccountStore {
    accounts: Vec<Account>,
}

impl AccountStore {
    /// Build a store from already constructed accounts.
    ///
    /// Username uniqueness is a property of the roster, not something the
    /// store enforces; a collision is logged and the first account wins
    /// every lookup.
    pub fn new(accounts: Vec<Account>) -> Self {
        for (i, account) in accounts.iter().enumerate() {
            if accounts[..i].iter().any(|a| a.username() == account.username()) {
                warn!(
                    "Username {} of {} collides with an earlier account",
                    account.username(),
                    account.owner()
                );
            }
        }

        debug!("Account store created with {} accounts", accounts.len());
        Self { accounts }
    }

    pub fn from_seeds(seeds: &[AccountSeed]) -> Self {
        Self::new(seeds.iter().map(Account::from_seed).collect())
    }

    /// Look up an account by username
    pub fn find(&self, username: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.username() == username)
    }

    pub fn find_mut(&mut self, username: &str) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|a| a.username() == username)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.find(username).is_some()
    }

    /// Mutable access to two distinct accounts at once.
    ///
    /// Returns `None` if either is missing or both names are the same.
    pub fn find_pair_mut(&mut self, first: &str, second: &str) -> Option<(&mut Account, &mut Account)> {
        if first == second {
            return None;
        }

        let i = self.position(first)?;
        let j = self.position(second)?;

        if i < j {
            let (head, tail) = self.accounts.split_at_mut(j);
            Some((&mut head[i], &mut tail[0]))
        } else {
            let (head, tail) = self.accounts.split_at_mut(i);
            Some((&mut tail[0], &mut head[j]))
        }
    }

    /// Remove the account with `username` and hand it back.
    ///
    /// An absent username is not an error here: `None` tells the caller
    /// nothing was removed and the roster is unchanged.
    pub fn remove(&mut self, username: &str) -> Option<Account> {
        match self.position(username) {
            Some(index) => {
                let account = self.accounts.remove(index);
                info!("Account {} removed from store", username);
                Some(account)
            }
            None => {
                debug!("No account {} to remove", username);
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn position(&self, username: &str) -> Option<usize> {
        self.accounts.iter().position(|a| a.username() == username)
    }
}
