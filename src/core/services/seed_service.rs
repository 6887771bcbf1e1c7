use chrono::{DateTime, Utc};
use tracing::info;

use crate::core::errors::Result;
use crate::core::models::catalog::{CatalogRecord, Format, Project, User};
use crate::core::services::entity_store::EntityStore;
use crate::core::traits::kv_store::WriteBatch;

/// Which default lists a seeding run created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub projects: usize,
    pub users: usize,
    pub formats: usize,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        self.projects == 0 && self.users == 0 && self.formats == 0
    }
}

fn default_projects(now: DateTime<Utc>) -> Vec<Project> {
    [
        ("proj_1", "Kohinoor Reina", 78),
        ("proj_2", "KWT Phase 2", 62),
        ("proj_3", "KBT", 91),
        ("proj_4", "KWT Mundhwa", 45),
    ]
    .into_iter()
    .map(|(id, name, completion)| Project {
        id: id.into(),
        name: name.into(),
        status: "Active".into(),
        completion,
        created_at: now,
        updated_at: None,
    })
    .collect()
}

fn default_users(now: DateTime<Utc>) -> Vec<User> {
    [
        ("user_1", "Prasad Kulkarni", "Admin", "Head of QA", "prasad.kulkarni@company.com"),
        ("user_2", "Atharva Mane", "Inspector", "QA Engineer", "atharva.mane@company.com"),
        ("user_3", "Aryan Patil", "Inspector", "QA Specialist", "aryan.patil@company.com"),
    ]
    .into_iter()
    .map(|(id, name, role, title, email)| User {
        id: id.into(),
        name: name.into(),
        email: email.into(),
        role: role.into(),
        title: title.into(),
        created_at: now,
        updated_at: None,
    })
    .collect()
}

fn default_formats(now: DateTime<Utc>) -> Vec<Format> {
    [
        (
            "fmt_1",
            "Concrete Quality Inspection",
            "Structural",
            [
                "Concrete mix design approved",
                "Formwork alignment verified",
                "Rebar spacing and coverage confirmed",
            ],
        ),
        (
            "fmt_2",
            "Structural Steel Inspection",
            "Structural",
            [
                "Steel grade verification",
                "Welding quality inspection",
                "Bolt torque verification",
            ],
        ),
        (
            "fmt_3",
            "Electrical Rough-in",
            "MEP",
            ["Conduit installation", "Wire sizing verification", "Box placement"],
        ),
    ]
    .into_iter()
    .map(|(id, name, category, items)| Format {
        id: id.into(),
        name: name.into(),
        category: category.into(),
        items: items.into_iter().map(String::from).collect(),
        created_at: now,
        updated_at: None,
    })
    .collect()
}

/// Stage `defaults` unless the list already exists. Returns how many rows were staged.
fn stage_if_absent<T: CatalogRecord>(
    store: &EntityStore,
    batch: &mut WriteBatch,
    defaults: Vec<T>,
) -> Result<usize> {
    if store.contains(T::LIST_KEY)? {
        return Ok(0);
    }
    EntityStore::stage_list(batch, T::LIST_KEY, &defaults)?;
    Ok(defaults.len())
}

/// Create the default projects, users and formats.
///
/// Each list is seeded only if its key is absent, so running this on every
/// start is safe and never overwrites user data. Nothing is logged to the
/// activity log.
pub fn seed_defaults(store: &EntityStore) -> Result<SeedReport> {
    let now = Utc::now();
    let mut batch = WriteBatch::new();
    let report = SeedReport {
        projects: stage_if_absent(store, &mut batch, default_projects(now))?,
        users: stage_if_absent(store, &mut batch, default_users(now))?,
        formats: stage_if_absent(store, &mut batch, default_formats(now))?,
    };

    if !batch.is_empty() {
        store.commit(batch)?;
        info!(
            projects = report.projects,
            users = report.users,
            formats = report.formats,
            "Seeded default data"
        );
    }
    Ok(report)
}
