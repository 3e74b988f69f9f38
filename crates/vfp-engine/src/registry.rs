//! Write-once job template registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use vfp_core::{CoreError, JobTemplate, TemplateId};

/// Registry of immutable job templates.
///
/// Templates are write-once: [`register`](TemplateRegistry::register) hands
/// ownership to the registry and every reader gets a shared
/// `Arc<JobTemplate>`. There is deliberately no update or remove API;
/// changing job behavior means registering a new template and repointing
/// the dispatcher.
pub struct TemplateRegistry {
    templates: Mutex<HashMap<TemplateId, Arc<JobTemplate>>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            templates: Mutex::new(HashMap::new()),
        }
    }

    /// Register a template, returning its id.
    pub fn register(&self, template: JobTemplate) -> TemplateId {
        let id = template.id;
        self.templates
            .lock()
            .expect("template registry lock poisoned")
            .insert(id, Arc::new(template));
        id
    }

    /// Look up a template by id.
    pub fn get(&self, id: TemplateId) -> Result<Arc<JobTemplate>, CoreError> {
        self.templates
            .lock()
            .expect("template registry lock poisoned")
            .get(&id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "JobTemplate",
                id: id.to_string(),
            })
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}
