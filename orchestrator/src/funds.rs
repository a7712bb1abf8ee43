//! Shared pre-transfer checks: balance first, then allowance.

use tracing::debug;

use crate::allowance::AllowanceGuard;
use crate::classifier::ErrorClassifier;
use crate::error::ErrorKind;
use crate::ledger::{Address, PaymentAsset, TokenAmount, TokenLedger};
use crate::session::Session;

/// Fails with [`ErrorKind::InsufficientBalance`] unless the session can
/// cover `amount` in `asset`. Read-only.
pub(crate) async fn ensure_balance(
    session: &Session,
    asset: PaymentAsset,
    amount: TokenAmount,
) -> Result<(), ErrorKind> {
    let owner = session.address();
    let ledger = session.ledger();
    let available = match asset {
        PaymentAsset::Token => ledger.balance_of(owner).await,
        PaymentAsset::Native => ledger.native_balance_of(owner).await,
    }
    .map_err(ErrorClassifier::classify_read)?;
    debug!(%owner, %available, required = %amount, ?asset, "balance read");

    if available < amount {
        return Err(ErrorKind::InsufficientBalance {
            required: amount,
            available: Some(available),
        });
    }
    Ok(())
}

/// Balance check followed, for token payments, by the allowance guard.
pub(crate) async fn ensure_funded(
    session: &Session,
    asset: PaymentAsset,
    guard: &AllowanceGuard,
    spender: Address,
    amount: TokenAmount,
) -> Result<(), ErrorKind> {
    ensure_balance(session, asset, amount).await?;
    if asset == PaymentAsset::Token {
        guard.ensure_allowance(session, spender, amount).await?;
    }
    Ok(())
}
