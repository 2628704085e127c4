//! Authorization scope and branch selection negotiation.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::info;
use vitrine_shared::types::{BranchId, InvalidBranchId};

/// What a caller is allowed to see, computed once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tipo", content = "filiais", rename_all = "snake_case")]
pub enum AuthorizationScope {
    /// No branch restriction is configured for the caller.
    Unrestricted,
    /// The caller may only see these branches. Never empty.
    Restricted(BTreeSet<BranchId>),
}

impl AuthorizationScope {
    /// Builds a scope from the caller's explicit grants.
    ///
    /// Zero grants means no restriction has been configured.
    #[must_use]
    pub fn from_grants(grants: impl IntoIterator<Item = BranchId>) -> Self {
        let allowed: BTreeSet<BranchId> = grants.into_iter().collect();
        if allowed.is_empty() {
            Self::Unrestricted
        } else {
            Self::Restricted(allowed)
        }
    }

    /// Returns true if the caller may see `branch`.
    #[must_use]
    pub fn allows(&self, branch: &BranchId) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Restricted(allowed) => allowed.contains(branch),
        }
    }
}

/// The branch filter a caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BranchSelection {
    /// No filter, or the literal `all`.
    #[default]
    All,
    /// An explicit list of branches, deduplicated, in request order.
    Specific(Vec<BranchId>),
}

impl BranchSelection {
    /// Parses a query value such as `all`, `10`, or `10,20,30`.
    ///
    /// Missing or blank values and the words `all` / `todas` mean no filter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBranchId` for the first code that is not a valid branch code.
    pub fn parse(raw: Option<&str>) -> Result<Self, InvalidBranchId> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Self::All);
        };
        if raw.eq_ignore_ascii_case("all") || raw.eq_ignore_ascii_case("todas") {
            return Ok(Self::All);
        }

        let mut seen = HashSet::new();
        let mut branches = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let branch: BranchId = part.parse()?;
            if seen.insert(branch.clone()) {
                branches.push(branch);
            }
        }

        if branches.is_empty() {
            Ok(Self::All)
        } else {
            Ok(Self::Specific(branches))
        }
    }

    /// Returns the requested branches for reports that cannot run over "all".
    ///
    /// `None` means the caller did not name any branch.
    #[must_use]
    pub fn require_specific(&self) -> Option<&[BranchId]> {
        match self {
            Self::All => None,
            Self::Specific(branches) => Some(branches),
        }
    }

    /// Number of explicitly requested branches.
    #[must_use]
    pub fn requested_len(&self) -> usize {
        match self {
            Self::All => 0,
            Self::Specific(branches) => branches.len(),
        }
    }
}

/// Reconciles the requested branch filter with the caller's scope.
///
/// Returns `None` when no branch filter applies (unrestricted caller asking for
/// everything). A restricted caller who asks only for branches outside their
/// scope gets their whole allowed set back instead of an empty result or an
/// error; callers of the HTTP API rely on this.
#[must_use]
pub fn negotiate(requested: &BranchSelection, scope: &AuthorizationScope) -> Option<Vec<BranchId>> {
    match (scope, requested) {
        (AuthorizationScope::Unrestricted, BranchSelection::All) => None,
        (AuthorizationScope::Unrestricted, BranchSelection::Specific(branches)) => {
            Some(branches.clone())
        }
        (AuthorizationScope::Restricted(allowed), BranchSelection::All) => {
            Some(allowed.iter().cloned().collect())
        }
        (AuthorizationScope::Restricted(allowed), BranchSelection::Specific(branches)) => {
            let visible: Vec<BranchId> = branches
                .iter()
                .filter(|b| scope.allows(b))
                .cloned()
                .collect();

            if visible.is_empty() {
                info!(
                    requested = branches.len(),
                    allowed = allowed.len(),
                    "No requested branch is visible to caller; using all allowed branches"
                );
                Some(allowed.iter().cloned().collect())
            } else {
                Some(visible)
            }
        }
    }
}
