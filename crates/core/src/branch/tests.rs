//! Tests for branch authorization and selection negotiation.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use rstest::rstest;
use vitrine_shared::types::{BranchId, TenantId, UserId};

use super::*;

fn b(code: &str) -> BranchId {
    code.parse().unwrap()
}

fn restricted(codes: &[&str]) -> AuthorizationScope {
    AuthorizationScope::Restricted(codes.iter().map(|c| b(c)).collect())
}

fn specific(codes: &[&str]) -> BranchSelection {
    BranchSelection::Specific(codes.iter().map(|c| b(c)).collect())
}

struct FixedGrants(Vec<BranchId>);

#[async_trait]
impl BranchGrantSource for FixedGrants {
    async fn branch_grants(
        &self,
        _tenant: TenantId,
        _user: UserId,
    ) -> Result<Vec<BranchId>, GrantLookupError> {
        Ok(self.0.clone())
    }
}

struct BrokenGrants;

#[async_trait]
impl BranchGrantSource for BrokenGrants {
    async fn branch_grants(
        &self,
        _tenant: TenantId,
        _user: UserId,
    ) -> Result<Vec<BranchId>, GrantLookupError> {
        Err(GrantLookupError("connection reset".to_string()))
    }
}

fn caller() -> CallerContext {
    CallerContext::new(TenantId::new(), UserId::new())
}

// ============================================================================
// Resolver
// ============================================================================

#[tokio::test]
async fn test_zero_grants_resolve_to_unrestricted() {
    let resolver = BranchAuthorizationResolver::new(Arc::new(FixedGrants(vec![])));
    let scope = resolver.resolve(&caller()).await.unwrap();
    assert_eq!(scope, AuthorizationScope::Unrestricted);
}

#[tokio::test]
async fn test_grants_resolve_to_restricted_set() {
    let resolver =
        BranchAuthorizationResolver::new(Arc::new(FixedGrants(vec![b("20"), b("10"), b("20")])));
    let scope = resolver.resolve(&caller()).await.unwrap();
    assert_eq!(scope, restricted(&["10", "20"]));
}

#[tokio::test]
async fn test_failed_lookup_never_grants_access() {
    let resolver = BranchAuthorizationResolver::new(Arc::new(BrokenGrants));
    let ctx = caller();
    let err = resolver.resolve(&ctx).await.unwrap_err();
    match err {
        AuthorizationError::LookupFailed { user, .. } => assert_eq!(user, ctx.user),
    }
}

// ============================================================================
// Selection parsing
// ============================================================================

#[rstest]
#[case(None)]
#[case(Some(""))]
#[case(Some("   "))]
#[case(Some("all"))]
#[case(Some("ALL"))]
#[case(Some("todas"))]
#[case(Some(" , ,"))]
fn test_parse_means_all(#[case] raw: Option<&str>) {
    assert_eq!(BranchSelection::parse(raw).unwrap(), BranchSelection::All);
}

#[test]
fn test_parse_keeps_order_and_dedupes() {
    let selection = BranchSelection::parse(Some("30, 10,30,20")).unwrap();
    assert_eq!(selection, specific(&["30", "10", "20"]));
    assert_eq!(selection.requested_len(), 3);
}

#[test]
fn test_parse_rejects_bad_code() {
    assert!(BranchSelection::parse(Some("10,../etc")).is_err());
}

#[test]
fn test_require_specific() {
    assert!(BranchSelection::All.require_specific().is_none());
    assert_eq!(
        specific(&["10"]).require_specific().unwrap(),
        &[b("10")][..]
    );
}

// ============================================================================
// Negotiation
// ============================================================================

#[test]
fn test_unrestricted_all_means_no_filter() {
    assert_eq!(
        negotiate(&BranchSelection::All, &AuthorizationScope::Unrestricted),
        None
    );
}

#[test]
fn test_unrestricted_specific_is_verbatim() {
    let result = negotiate(&specific(&["99", "10"]), &AuthorizationScope::Unrestricted);
    assert_eq!(result, Some(vec![b("99"), b("10")]));
}

#[test]
fn test_restricted_all_returns_allowed() {
    let result = negotiate(&BranchSelection::All, &restricted(&["20", "10"]));
    assert_eq!(result, Some(vec![b("10"), b("20")]));
}

#[test]
fn test_restricted_specific_intersects() {
    let result = negotiate(&specific(&["30", "20", "40"]), &restricted(&["10", "20", "30"]));
    assert_eq!(result, Some(vec![b("30"), b("20")]));
}

/// A caller restricted to {A, B} asking only for C silently gets {A, B}.
/// This is the documented fallback behaviour of the report endpoints.
#[test]
fn test_disjoint_request_falls_back_to_allowed_set() {
    let result = negotiate(&specific(&["C"]), &restricted(&["A", "B"]));
    assert_eq!(result, Some(vec![b("A"), b("B")]));
}

#[test]
fn test_scope_allows() {
    let scope = restricted(&["10"]);
    assert!(scope.allows(&b("10")));
    assert!(!scope.allows(&b("010")));
    assert!(AuthorizationScope::Unrestricted.allows(&b("010")));
}

proptest! {
    /// A restricted caller never receives a branch outside their allowed set,
    /// and never receives an empty set.
    #[test]
    fn test_restricted_result_is_nonempty_subset(
        allowed in prop::collection::btree_set("[A-F]", 1..5),
        requested in prop::collection::vec("[A-H]", 0..6),
    ) {
        let allowed: BTreeSet<BranchId> = allowed.iter().map(|c| b(c)).collect();
        let scope = AuthorizationScope::Restricted(allowed.clone());
        let selection = if requested.is_empty() {
            BranchSelection::All
        } else {
            BranchSelection::parse(Some(&requested.join(","))).unwrap()
        };

        let result = negotiate(&selection, &scope).unwrap();
        prop_assert!(!result.is_empty());
        prop_assert!(result.iter().all(|branch| allowed.contains(branch)));
    }
}
