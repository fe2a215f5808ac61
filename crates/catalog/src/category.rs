use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopcat_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shopcat_events::Event;

/// Category identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub AggregateId);

impl CategoryId {
    pub const AGGREGATE_TYPE: &'static str = "catalog.category";

    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for CategoryId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Aggregate root: Category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    id: CategoryId,
    tenant_id: Option<TenantId>,
    name: String,
    archived: bool,
    version: u64,
    created: bool,
}

impl Category {
    /// Not-yet-created instance for rehydration.
    pub fn empty(id: CategoryId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            archived: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CategoryId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }
}

impl AggregateRoot for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameCategory {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveCategory {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryCommand {
    CreateCategory(CreateCategory),
    RenameCategory(RenameCategory),
    ArchiveCategory(ArchiveCategory),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCreated {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRenamed {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryArchived {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryEvent {
    CategoryCreated(CategoryCreated),
    CategoryRenamed(CategoryRenamed),
    CategoryArchived(CategoryArchived),
}

impl CategoryEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            CategoryEvent::CategoryCreated(e) => e.tenant_id,
            CategoryEvent::CategoryRenamed(e) => e.tenant_id,
            CategoryEvent::CategoryArchived(e) => e.tenant_id,
        }
    }

    pub fn category_id(&self) -> CategoryId {
        match self {
            CategoryEvent::CategoryCreated(e) => e.category_id,
            CategoryEvent::CategoryRenamed(e) => e.category_id,
            CategoryEvent::CategoryArchived(e) => e.category_id,
        }
    }
}

impl Event for CategoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CategoryEvent::CategoryCreated(_) => "catalog.category.created",
            CategoryEvent::CategoryRenamed(_) => "catalog.category.renamed",
            CategoryEvent::CategoryArchived(_) => "catalog.category.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CategoryEvent::CategoryCreated(e) => e.occurred_at,
            CategoryEvent::CategoryRenamed(e) => e.occurred_at,
            CategoryEvent::CategoryArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Category {
    type Command = CategoryCommand;
    type Event = CategoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CategoryEvent::CategoryCreated(e) => {
                self.id = e.category_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.archived = false;
                self.created = true;
            }
            CategoryEvent::CategoryRenamed(e) => {
                self.name = e.name.clone();
            }
            CategoryEvent::CategoryArchived(_) => {
                self.archived = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CategoryCommand::CreateCategory(cmd) => self.handle_create(cmd),
            CategoryCommand::RenameCategory(cmd) => self.handle_rename(cmd),
            CategoryCommand::ArchiveCategory(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Category {
    fn ensure_target(&self, tenant_id: TenantId, category_id: CategoryId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != category_id {
            return Err(DomainError::invariant("category_id mismatch"));
        }
        Ok(())
    }

    fn validated_name(name: &str) -> Result<String, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        Ok(name.to_string())
    }

    fn handle_create(&self, cmd: &CreateCategory) -> Result<Vec<CategoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("category already exists"));
        }
        let name = Self::validated_name(&cmd.name)?;

        Ok(vec![CategoryEvent::CategoryCreated(CategoryCreated {
            tenant_id: cmd.tenant_id,
            category_id: cmd.category_id,
            name,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rename(&self, cmd: &RenameCategory) -> Result<Vec<CategoryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.category_id)?;
        if self.archived {
            return Err(DomainError::invariant("archived categories cannot be renamed"));
        }
        let name = Self::validated_name(&cmd.name)?;
        if name == self.name {
            return Ok(vec![]);
        }

        Ok(vec![CategoryEvent::CategoryRenamed(CategoryRenamed {
            tenant_id: cmd.tenant_id,
            category_id: cmd.category_id,
            name,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveCategory) -> Result<Vec<CategoryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.category_id)?;
        if self.archived {
            return Err(DomainError::conflict("category is already archived"));
        }

        Ok(vec![CategoryEvent::CategoryArchived(CategoryArchived {
            tenant_id: cmd.tenant_id,
            category_id: cmd.category_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
