//! Refresh state machine for stored access/refresh token pairs.

/// Where a token pair stands relative to the configured refresh margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    /// Access token is still comfortably valid; nothing to do.
    Valid,
    /// Access token expired or inside the margin; the refresh token can
    /// still be spent.
    NeedsRefresh,
    /// Refresh token itself expired. Terminal for the session: the
    /// principal must authenticate from scratch.
    Expired,
}

/// Decide between reuse, refresh and forced re-authentication.
///
/// `refresh_exp` is the refresh token's `exp` claim when it carries one.
/// Offline-access style refresh tokens come without `exp`; with
/// `missing_exp_valid` (the default policy) they are treated as
/// non-expiring, otherwise as already expired.
pub fn evaluate(
    access_exp: Option<u64>,
    refresh_exp: Option<u64>,
    now: u64,
    refresh_margin_secs: u64,
    missing_exp_valid: bool,
) -> RefreshDecision {
    // A missing access expiry is treated as already due: the token cannot
    // be proven fresh, so it is refreshed rather than trusted.
    let diff_access = access_exp.map(|exp| exp as i64 - now as i64).unwrap_or(0);

    let diff_refresh = match refresh_exp {
        Some(exp) => exp as i64 - now as i64,
        None if missing_exp_valid => 0,
        None => -1,
    };

    if diff_access > refresh_margin_secs as i64 {
        RefreshDecision::Valid
    } else if diff_refresh < 0 {
        RefreshDecision::Expired
    } else {
        RefreshDecision::NeedsRefresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;
    const MARGIN: u64 = 60;

    #[test]
    fn test_fresh_access_token_is_valid() {
        let decision = evaluate(Some(NOW + 3600), Some(NOW + 7200), NOW, MARGIN, true);
        assert_eq!(decision, RefreshDecision::Valid);
    }

    #[test]
    fn test_access_token_inside_margin_refreshes() {
        let decision = evaluate(Some(NOW + 30), Some(NOW + 7200), NOW, MARGIN, true);
        assert_eq!(decision, RefreshDecision::NeedsRefresh);
    }

    #[test]
    fn test_expired_access_token_refreshes() {
        let decision = evaluate(Some(NOW - 300), Some(NOW + 7200), NOW, MARGIN, true);
        assert_eq!(decision, RefreshDecision::NeedsRefresh);
    }

    #[test]
    fn test_expired_refresh_token_is_terminal() {
        // Refresh token 10 seconds past expiry: forced re-authentication.
        let decision = evaluate(Some(NOW - 300), Some(NOW - 10), NOW, MARGIN, true);
        assert_eq!(decision, RefreshDecision::Expired);
    }

    #[test]
    fn test_missing_refresh_exp_defaults_to_non_expiring() {
        let decision = evaluate(Some(NOW - 300), None, NOW, MARGIN, true);
        assert_eq!(decision, RefreshDecision::NeedsRefresh);
    }

    #[test]
    fn test_missing_refresh_exp_strict_policy() {
        let decision = evaluate(Some(NOW - 300), None, NOW, MARGIN, false);
        assert_eq!(decision, RefreshDecision::Expired);
    }

    #[test]
    fn test_valid_access_short_circuits_expired_refresh() {
        // While the access token is fresh the refresh token's expiry is
        // irrelevant; no transition happens.
        let decision = evaluate(Some(NOW + 3600), Some(NOW - 10), NOW, MARGIN, true);
        assert_eq!(decision, RefreshDecision::Valid);
    }

    #[test]
    fn test_missing_access_exp_is_due() {
        let decision = evaluate(None, Some(NOW + 7200), NOW, MARGIN, true);
        assert_eq!(decision, RefreshDecision::NeedsRefresh);
    }
}
