//! Balance verification
//!
//! Read-only feasibility checks run before a transaction record is created.

use super::traits::AccountStore;
use crate::types::{Account, AccountId, PaymentError};
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BalanceVerifier {
    accounts: Arc<dyn AccountStore>,
}

impl BalanceVerifier {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Load the paying account and check it can cover `required`
    ///
    /// Funds already held by in-flight transactions are not available.
    pub fn verify(&self, account_id: AccountId, required: Decimal) -> Result<Account, PaymentError> {
        let account = self.load(account_id)?;

        let available = account.available();
        if available < required {
            return Err(PaymentError::insufficient_balance(
                account_id, available, required,
            ));
        }

        Ok(account)
    }

    /// Load the receiving account and check it can accept `amount`
    ///
    /// DEBIT accounts accept any amount. CREDIT and LOAN accounts are paid
    /// down, so the payment may not exceed the outstanding balance.
    pub fn verify_recipient(
        &self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Account, PaymentError> {
        let account = self.load(account_id)?;

        if !account.account_type.is_asset() && account.balance < amount {
            return Err(PaymentError::overpayment(account_id, account.balance, amount));
        }

        Ok(account)
    }

    fn load(&self, account_id: AccountId) -> Result<Account, PaymentError> {
        self.accounts
            .find(account_id)
            .ok_or_else(|| PaymentError::account_not_found(account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::account_store::InMemoryAccountStore;
    use crate::types::{AccountType, NewAccount};
    use rstest::rstest;

    fn setup() -> (BalanceVerifier, Arc<InMemoryAccountStore>) {
        let store = Arc::new(InMemoryAccountStore::new());
        (BalanceVerifier::new(store.clone()), store)
    }

    #[test]
    fn test_verify_missing_account() {
        let (verifier, _) = setup();
        assert_eq!(
            verifier.verify(1, Decimal::ONE),
            Err(PaymentError::account_not_found(1))
        );
    }

    #[rstest]
    #[case::exact(100, 100, true)]
    #[case::below(100, 50, true)]
    #[case::above(5, 50, false)]
    fn test_verify_sufficiency(#[case] balance: i64, #[case] required: i64, #[case] ok: bool) {
        let (verifier, store) = setup();
        let account = store.create(NewAccount::new(
            1,
            AccountType::Debit,
            Decimal::new(balance, 0),
            "SGD",
        ));

        let result = verifier.verify(account.id, Decimal::new(required, 0));
        assert_eq!(result.is_ok(), ok);
        if !ok {
            assert!(matches!(
                result,
                Err(PaymentError::InsufficientBalance { .. })
            ));
        }
    }

    #[test]
    fn test_verify_counts_held_funds() {
        let (verifier, store) = setup();
        let account = store.create(NewAccount::new(
            1,
            AccountType::Debit,
            Decimal::new(100, 0),
            "SGD",
        ));
        store.hold(account.id, Decimal::new(80, 0)).unwrap();

        assert_eq!(
            verifier.verify(account.id, Decimal::new(30, 0)),
            Err(PaymentError::insufficient_balance(
                account.id,
                Decimal::new(20, 0),
                Decimal::new(30, 0)
            ))
        );
    }

    #[rstest]
    #[case::debit_accepts_anything(AccountType::Debit, 0, 500, true)]
    #[case::loan_within_outstanding(AccountType::Loan, 300, 300, true)]
    #[case::loan_overpaid(AccountType::Loan, 100, 300, false)]
    #[case::credit_overpaid(AccountType::Credit, -10, 1, false)]
    fn test_verify_recipient(
        #[case] account_type: AccountType,
        #[case] balance: i64,
        #[case] amount: i64,
        #[case] ok: bool,
    ) {
        let (verifier, store) = setup();
        let account = store.create(NewAccount::new(
            1,
            account_type,
            Decimal::new(balance, 0),
            "SGD",
        ));

        let result = verifier.verify_recipient(account.id, Decimal::new(amount, 0));
        assert_eq!(result.is_ok(), ok);
    }
}
