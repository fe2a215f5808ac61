//! Category fields of the shop product edit form.
//!
//! Field names are scoped per shop: `shop-<shop_id>-primary_category` and
//! `shop-<shop_id>-categories`. Submissions arrive as `(name, value)` pairs in
//! body order, so a multi-valued field keeps the order the user selected in.

use std::collections::BTreeMap;

use serde::Serialize;

use shopcat_catalog::{AssignmentRequest, CategoryAssignment, CategoryId};
use shopcat_core::{ShopId, TenantId};
use shopcat_infra::projections::CategoryDirectoryProjection;
use shopcat_infra::projections::CategoryReadModel;
use shopcat_infra::read_model::TenantStore;

pub const PRIMARY_CATEGORY_FIELD: &str = "primary_category";
pub const CATEGORIES_FIELD: &str = "categories";

/// Name of the form part holding one shop's fields.
pub fn form_prefix(shop_id: ShopId) -> String {
    format!("shop-{shop_id}")
}

/// Full form field name for one shop.
pub fn field_name(shop_id: ShopId, field: &str) -> String {
    format!("{}-{field}", form_prefix(shop_id))
}

/// Validation errors grouped by form part, then by field.
///
/// Serializes as `{"shop-<id>": {"categories": ["..."]}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct FormErrors {
    groups: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl FormErrors {
    pub fn add(&mut self, group: &str, field: &str, message: impl Into<String>) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, group: &str, field: &str) -> bool {
        self.groups.get(group).is_some_and(|g| g.contains_key(field))
    }

    pub fn get(&self, group: &str, field: &str) -> &[String] {
        self.groups
            .get(group)
            .and_then(|g| g.get(field))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Errors of one form part, keyed by field.
    pub fn group(&self, group: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        self.groups.get(group)
    }

    /// `(group, field, messages)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &[String])> {
        self.groups.iter().flat_map(|(group, fields)| {
            fields
                .iter()
                .map(move |(field, messages)| (group.as_str(), field.as_str(), messages.as_slice()))
        })
    }
}

impl core::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for (group, field, messages) in self.iter() {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{group}-{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FormErrors {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CategoryStatus {
    Assignable,
    Archived,
    Unknown,
}

/// Where the form checks submitted category ids.
pub trait CategoryLookup {
    fn status(&self, tenant_id: TenantId, category_id: &CategoryId) -> CategoryStatus;
}

impl<S> CategoryLookup for CategoryDirectoryProjection<S>
where
    S: TenantStore<CategoryId, CategoryReadModel>,
{
    fn status(&self, tenant_id: TenantId, category_id: &CategoryId) -> CategoryStatus {
        match self.get(tenant_id, category_id) {
            Some(c) if c.archived => CategoryStatus::Archived,
            Some(_) => CategoryStatus::Assignable,
            None => CategoryStatus::Unknown,
        }
    }
}

/// A validated category submission for one shop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopProductForm {
    shop_id: ShopId,
    request: AssignmentRequest,
}

impl ShopProductForm {
    /// Field values that pre-fill the form for the current assignment.
    ///
    /// The primary field is always present (empty when unset); the categories
    /// field appears once per member.
    pub fn initial(shop_id: ShopId, assignment: &CategoryAssignment) -> Vec<(String, String)> {
        let mut fields = vec![(
            field_name(shop_id, PRIMARY_CATEGORY_FIELD),
            assignment.primary().map(|c| c.to_string()).unwrap_or_default(),
        )];
        let categories = field_name(shop_id, CATEGORIES_FIELD);
        fields.extend(
            assignment
                .categories()
                .iter()
                .map(|c| (categories.clone(), c.to_string())),
        );
        fields
    }

    /// Validate the category fields of a submission.
    ///
    /// Fields of other shops and other form parts are ignored; empty values
    /// count as "nothing selected". Archived categories are accepted only when
    /// `current` already contains them.
    pub fn bind(
        tenant_id: TenantId,
        shop_id: ShopId,
        pairs: &[(String, String)],
        current: &CategoryAssignment,
        lookup: &impl CategoryLookup,
    ) -> Result<Self, FormErrors> {
        let group = form_prefix(shop_id);
        let mut errors = FormErrors::default();

        let check = |field: &str, raw: &str, errors: &mut FormErrors| -> Option<CategoryId> {
            let Ok(id) = raw.parse::<CategoryId>() else {
                errors.add(&group, field, format!("'{raw}' is not a valid category id"));
                return None;
            };
            match lookup.status(tenant_id, &id) {
                CategoryStatus::Assignable => Some(id),
                CategoryStatus::Archived if current.contains(&id) || current.primary() == Some(id) => Some(id),
                CategoryStatus::Archived => {
                    errors.add(&group, field, format!("category {id} is archived"));
                    None
                }
                CategoryStatus::Unknown => {
                    errors.add(&group, field, format!("category {id} does not exist"));
                    None
                }
            }
        };

        let values = |field: &str| -> Vec<&str> {
            let name = field_name(shop_id, field);
            pairs
                .iter()
                .filter(|(k, _)| *k == name)
                .map(|(_, v)| v.trim())
                .filter(|v| !v.is_empty())
                .collect()
        };

        let primary_values = values(PRIMARY_CATEGORY_FIELD);
        if primary_values.len() > 1 {
            errors.add(&group, PRIMARY_CATEGORY_FIELD, "select at most one primary category");
        }
        let primary = primary_values
            .first()
            .and_then(|raw| check(PRIMARY_CATEGORY_FIELD, raw, &mut errors));

        let members: Vec<CategoryId> = values(CATEGORIES_FIELD)
            .into_iter()
            .filter_map(|raw| check(CATEGORIES_FIELD, raw, &mut errors))
            .collect();

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            shop_id,
            request: AssignmentRequest::new(primary, members),
        })
    }

    pub fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    pub fn request(&self) -> &AssignmentRequest {
        &self.request
    }

    pub fn into_request(self) -> AssignmentRequest {
        self.request
    }
}
