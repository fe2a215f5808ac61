//! Replays a product edit session from a JSON scenario and prints what the
//! shop product's categories look like after each submission.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use shopcat_admin::{AdminError, AdminServices, FormErrors, ProductEditView};
use shopcat_admin::forms::{CATEGORIES_FIELD, PRIMARY_CATEGORY_FIELD, field_name};
use shopcat_catalog::{CategoryAssignment, CategoryId, ProductId};
use shopcat_core::{AggregateId, ShopId, TenantId};
use shopcat_infra::config::Settings;

#[derive(Parser)]
#[command(name = "shopcat-admin")]
#[command(about = "Replay shop product category edits")]
#[command(version)]
struct Cli {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Override SHOPCAT_AUTO_SHOP_PRODUCT_CATEGORIES
    #[arg(long)]
    auto_categories: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    /// Category names created before the session starts.
    categories: Vec<String>,
    submissions: Vec<Submission>,
}

/// One form submission; categories are referred to by name.
#[derive(Debug, Deserialize)]
struct Submission {
    #[serde(default)]
    primary_category: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum StepReport {
    Saved {
        step: usize,
        changed: bool,
        primary_category: Option<String>,
        categories: Vec<String>,
    },
    Rejected {
        step: usize,
        errors: FormErrors,
    },
}

fn main() -> Result<()> {
    shopcat_observability::init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env().context("reading settings")?;
    if let Some(auto) = cli.auto_categories {
        settings.auto_shop_product_categories = auto;
    }

    let raw = std::fs::read_to_string(&cli.scenario)
        .with_context(|| format!("reading {}", cli.scenario.display()))?;
    let scenario: Scenario =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", cli.scenario.display()))?;

    let reports = run(&scenario, settings)?;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn run(scenario: &Scenario, settings: Settings) -> Result<Vec<StepReport>> {
    let services = AdminServices::in_memory(settings);
    let view = ProductEditView::new(&services);
    let tenant_id = TenantId::new();
    let shop_id = ShopId::new();

    let mut by_name = BTreeMap::new();
    for name in &scenario.categories {
        let id = services
            .create_category(tenant_id, name)
            .with_context(|| format!("creating category {name:?}"))?;
        by_name.insert(name.clone(), id);
    }
    let names: BTreeMap<CategoryId, &str> = by_name.iter().map(|(n, id)| (*id, n.as_str())).collect();

    let shop_product_id = services.create_shop_product(tenant_id, shop_id, ProductId::new(AggregateId::new()))?;
    tracing::info!(%tenant_id, %shop_id, %shop_product_id, auto_assign = settings.auto_shop_product_categories, "replaying edit session");

    // Unknown names go through verbatim so the form reports them.
    let value = |name: &str| by_name.get(name).map(|id| id.to_string()).unwrap_or_else(|| name.to_string());

    let mut reports = Vec::with_capacity(scenario.submissions.len());
    for (i, submission) in scenario.submissions.iter().enumerate() {
        let step = i + 1;
        let mut pairs = vec![(
            field_name(shop_id, PRIMARY_CATEGORY_FIELD),
            submission.primary_category.as_deref().map(value).unwrap_or_default(),
        )];
        pairs.extend(
            submission
                .categories
                .iter()
                .map(|name| (field_name(shop_id, CATEGORIES_FIELD), value(name))),
        );

        match view.submit(tenant_id, shop_product_id, &pairs) {
            Ok(outcome) => reports.push(StepReport::Saved {
                step,
                changed: outcome.changed,
                primary_category: outcome.assignment.primary().map(|id| label(&names, id)),
                categories: labels(&names, &outcome.assignment),
            }),
            Err(AdminError::Form(errors)) => reports.push(StepReport::Rejected { step, errors }),
            Err(e) => return Err(e).with_context(|| format!("submission {step}")),
        }
    }
    Ok(reports)
}

fn label(names: &BTreeMap<CategoryId, &str>, id: CategoryId) -> String {
    names.get(&id).map(|n| n.to_string()).unwrap_or_else(|| id.to_string())
}

fn labels(names: &BTreeMap<CategoryId, &str>, assignment: &CategoryAssignment) -> Vec<String> {
    let mut out: Vec<String> = assignment.categories().iter().map(|id| label(names, *id)).collect();
    out.sort();
    out
}
