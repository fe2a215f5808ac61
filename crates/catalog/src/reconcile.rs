//! Category assignment reconciliation for shop-scoped products.
//!
//! One edit submission carries an optional primary category and an ordered list
//! of member categories. [`reconcile`] turns that request into the complete
//! assignment to persist; the previous assignment is only kept around to report
//! what changed, never merged with the request.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use shopcat_core::ValueObject;

use crate::category::CategoryId;

/// Policy knobs for [`reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// When set, the primary category is always a member, and a request without
    /// a primary promotes its first submitted member.
    pub auto_assign_categories: bool,
}

impl ReconciliationConfig {
    pub fn auto_assign() -> Self {
        Self {
            auto_assign_categories: true,
        }
    }

    pub fn manual() -> Self {
        Self {
            auto_assign_categories: false,
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self::auto_assign()
    }
}

/// Persisted category state of a shop product.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryAssignment {
    primary: Option<CategoryId>,
    categories: BTreeSet<CategoryId>,
}

impl ValueObject for CategoryAssignment {}

impl CategoryAssignment {
    /// No primary category, no membership.
    pub fn cleared() -> Self {
        Self::default()
    }

    pub fn new(primary: Option<CategoryId>, categories: impl IntoIterator<Item = CategoryId>) -> Self {
        Self {
            primary,
            categories: categories.into_iter().collect(),
        }
    }

    pub fn primary(&self) -> Option<CategoryId> {
        self.primary
    }

    pub fn categories(&self) -> &BTreeSet<CategoryId> {
        &self.categories
    }

    pub fn contains(&self, category_id: &CategoryId) -> bool {
        self.categories.contains(category_id)
    }

    pub fn is_cleared(&self) -> bool {
        self.primary.is_none() && self.categories.is_empty()
    }

    /// Whether the primary (if any) is also a member.
    pub fn primary_is_member(&self) -> bool {
        self.primary.is_none_or(|p| self.categories.contains(&p))
    }
}

/// What one edit submission asks for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub primary: Option<CategoryId>,
    /// Members in submission order; the order decides which one gets promoted.
    pub members: Vec<CategoryId>,
}

impl AssignmentRequest {
    pub fn new(primary: Option<CategoryId>, members: impl IntoIterator<Item = CategoryId>) -> Self {
        Self {
            primary,
            members: members.into_iter().collect(),
        }
    }

    /// A request that clears everything.
    pub fn clear() -> Self {
        Self::default()
    }

    /// Members with repeats removed, each kept at its first position.
    pub fn ordered_members(&self) -> Vec<CategoryId> {
        let mut seen = BTreeSet::new();
        self.members
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Outcome of [`reconcile`]: the new assignment and the one it replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    previous: CategoryAssignment,
    next: CategoryAssignment,
}

impl Reconciliation {
    pub fn assignment(&self) -> &CategoryAssignment {
        &self.next
    }

    pub fn into_assignment(self) -> CategoryAssignment {
        self.next
    }

    pub fn changed(&self) -> bool {
        self.previous != self.next
    }

    pub fn primary_changed(&self) -> bool {
        self.previous.primary != self.next.primary
    }

    /// Categories gaining membership.
    pub fn added(&self) -> Vec<CategoryId> {
        self.next
            .categories
            .difference(&self.previous.categories)
            .copied()
            .collect()
    }

    /// Categories losing membership.
    pub fn removed(&self) -> Vec<CategoryId> {
        self.previous
            .categories
            .difference(&self.next.categories)
            .copied()
            .collect()
    }
}

/// Compute the assignment a submission results in.
///
/// - Membership is exactly the submitted members. Under `auto_assign_categories`
///   the primary is added to it as well.
/// - An explicit primary is always kept. Without one, `auto_assign_categories`
///   promotes the first submitted member; otherwise the primary stays unset.
/// - `current` never leaks into the result: a submission replaces the whole
///   assignment, so applying the same request twice is the same as once.
pub fn reconcile(
    current: &CategoryAssignment,
    request: &AssignmentRequest,
    config: ReconciliationConfig,
) -> Reconciliation {
    let members = request.ordered_members();

    let primary = match request.primary {
        Some(primary) => Some(primary),
        None if config.auto_assign_categories => members.first().copied(),
        None => None,
    };

    let mut categories: BTreeSet<CategoryId> = members.into_iter().collect();
    if config.auto_assign_categories {
        if let Some(primary) = primary {
            categories.insert(primary);
        }
    }

    Reconciliation {
        previous: current.clone(),
        next: CategoryAssignment { primary, categories },
    }
}
